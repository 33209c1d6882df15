use axum::{Json, extract::State, http::HeaderMap};
use serde::Deserialize;

use crate::error::AppError;
use crate::handlers::device::device_id_from_headers;
use crate::models::UserSessionView;
use crate::state::AppState;

/// ログインリクエスト
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    /// ユーザーのメールアドレス
    pub email: String,
    /// ユーザーのパスワード
    pub password: String,
}

/// ログインハンドラー
///
/// POST /login
///
/// 処理フロー:
/// 1. リクエストバリデーション
/// 2. ヘッダーからデバイスID取得
/// 3. パスワード照合 + セッション find-or-create（オーケストレーター）
/// 4. ユーザー公開ビュー + セッション状態を返却
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<LoginRequest>,
) -> Result<Json<UserSessionView>, AppError> {
    validate_login_request(&request)?;
    let device_id = device_id_from_headers(&headers)?;

    let view = state
        .auth
        .login(&request.email, &request.password, &device_id)
        .await?;

    Ok(Json(view))
}

/// ログインリクエストのバリデーション
fn validate_login_request(request: &LoginRequest) -> Result<(), AppError> {
    if request.email.trim().is_empty() {
        return Err(AppError::Validation("メールアドレスは必須です".to_string()));
    }

    // 簡易的なメール形式チェック（@ が含まれているか）
    if !request.email.contains('@') {
        return Err(AppError::Validation(
            "有効なメールアドレスを入力してください".to_string(),
        ));
    }

    if request.password.is_empty() {
        return Err(AppError::Validation("パスワードは必須です".to_string()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(email: &str, password: &str) -> LoginRequest {
        LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    #[test]
    fn test_validate_empty_email() {
        assert!(validate_login_request(&request("", "password123")).is_err());
    }

    #[test]
    fn test_validate_invalid_email() {
        assert!(validate_login_request(&request("invalid-email", "password123")).is_err());
    }

    #[test]
    fn test_validate_empty_password() {
        assert!(validate_login_request(&request("test@example.com", "")).is_err());
    }

    #[test]
    fn test_validate_valid_request() {
        assert!(validate_login_request(&request("test@example.com", "password123")).is_ok());
    }
}
