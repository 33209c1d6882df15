use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::repositories::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// 必須のリソース（ユーザー・シークレット・セッション）が存在しない
    #[error("{0} が見つかりません")]
    NotFound(&'static str),

    /// パスワード不一致
    #[error("パスワードが正しくありません")]
    WrongCredential,

    /// リクエストの必須項目欠落・形式不正
    #[error("バリデーションエラー: {0}")]
    Validation(String),

    /// OTPコード検証失敗
    #[error("認証コードが無効です")]
    TotpInvalid,

    #[error("データベースエラー")]
    Database(#[from] sqlx::Error),

    #[error("内部エラー")]
    Internal(#[from] anyhow::Error),
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            // コンテキストなしの NotFound は呼び出し側で変換するのが原則。
            // ここを通るのは想定外の経路のみ。
            StoreError::NotFound => Self::NotFound("レコード"),
            StoreError::Unexpected(err) => Self::Internal(err),
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // エラー種別ごとに固有のステータスを返す。
        // シークレット値・パスワードはメッセージに含めない。
        let (status, message) = match &self {
            Self::NotFound(what) => (
                StatusCode::NOT_FOUND,
                format!("{what} が見つかりません"),
            ),
            Self::WrongCredential => (
                StatusCode::UNAUTHORIZED,
                "パスワードが正しくありません".to_string(),
            ),
            Self::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::TotpInvalid => (
                StatusCode::NOT_ACCEPTABLE,
                "認証コードが正しくありません".to_string(),
            ),
            Self::Database(e) => {
                tracing::error!(error = ?e, "データベースエラー");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "内部エラーが発生しました".to_string(),
                )
            }
            Self::Internal(e) => {
                tracing::error!(error = ?e, "内部エラー");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "内部エラーが発生しました".to_string(),
                )
            }
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}
