use axum::{
    Json,
    extract::{Path, State},
    http::HeaderMap,
};
use serde::Serialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::handlers::device::device_id_from_headers;
use crate::state::AppState;

/// ログアウトレスポンス
#[derive(Debug, Serialize)]
pub struct LogoutResponse {
    pub logged_out: bool,
}

/// ログアウトハンドラー
///
/// DELETE /{id}/logout
///
/// リクエスト元デバイスのセッションのみ削除する。
/// セッションが存在しなくても成功を返す（冪等）。
pub async fn logout(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<LogoutResponse>, AppError> {
    let device_id = device_id_from_headers(&headers)?;

    state.auth.logout(user_id, &device_id).await?;

    Ok(Json(LogoutResponse { logged_out: true }))
}
