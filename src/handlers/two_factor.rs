use axum::{
    Json,
    extract::{Path, State},
    http::HeaderMap,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::handlers::device::device_id_from_headers;
use crate::models::UserSessionView;
use crate::state::AppState;

// === QRコード発行 ===

#[derive(Debug, Serialize)]
pub struct QrCodeResponse {
    /// data:image/png;base64 形式のQRコード
    pub qrcode: String,
}

/// 2FA QRコード発行ハンドラー
///
/// GET /{id}/get_2fa_qr_code
///
/// シークレットを issue-once で取得し、QRコードにして返す。
/// セッション状態・require_2fa には触れない。何度呼んでも同じQRが返る。
///
/// # Security
/// - シークレット平文はレスポンスに直接含めない（QR経由のみ）
pub async fn get_2fa_qr_code(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<QrCodeResponse>, AppError> {
    let qrcode = state.auth.issue_qr_code(user_id).await?;

    Ok(Json(QrCodeResponse { qrcode }))
}

// === セットアップ / 検証 ===

#[derive(Debug, Deserialize)]
pub struct OtpTokenRequest {
    /// クライアントの認証アプリが表示した6桁コード
    #[serde(default)]
    pub otp_token: Option<String>,
}

/// 2FAセットアップハンドラー
///
/// POST /{id}/setup_2fa
///
/// 発行済みシークレットに対する初回コード検証。成功で require_2fa が
/// 有効になり、このデバイスのセッションが検証済みになる。
///
/// # Security
/// - コードはログ出力禁止
pub async fn setup_2fa(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    headers: HeaderMap,
    Json(request): Json<OtpTokenRequest>,
) -> Result<Json<UserSessionView>, AppError> {
    let device_id = device_id_from_headers(&headers)?;
    let code = request.otp_token.as_deref().unwrap_or("");

    let view = state.auth.setup_2fa(user_id, &device_id, code).await?;

    Ok(Json(view))
}

/// 2FA検証ハンドラー
///
/// PUT /{id}/verify_2fa
///
/// ログイン済みデバイスのセッションを検証済みにする。
/// 先行ログインの無いデバイスからの検証は 404。
pub async fn verify_2fa(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    headers: HeaderMap,
    Json(request): Json<OtpTokenRequest>,
) -> Result<Json<UserSessionView>, AppError> {
    let device_id = device_id_from_headers(&headers)?;
    let code = request.otp_token.as_deref().unwrap_or("");

    let view = state.auth.verify_2fa(user_id, &device_id, code).await?;

    Ok(Json(view))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_otp_token_is_optional_in_body() {
        // otp_token 欠落は deserialization では弾かず、
        // オーケストレーター側で Validation エラーにする
        let request: OtpTokenRequest = serde_json::from_str("{}").unwrap();
        assert!(request.otp_token.is_none());

        let request: OtpTokenRequest =
            serde_json::from_str(r#"{"otp_token":"123456"}"#).unwrap();
        assert_eq!(request.otp_token.as_deref(), Some("123456"));
    }
}
