use axum::{
    Json,
    extract::{Path, State},
    http::HeaderMap,
};
use uuid::Uuid;

use crate::error::AppError;
use crate::handlers::device::device_id_from_headers;
use crate::models::UserSessionView;
use crate::state::AppState;

/// ユーザー取得ハンドラー
///
/// GET /{id}
///
/// リクエスト元デバイスのセッション状態をマージして返す。
/// 未知のデバイスからの取得では is_2fa_verified / last_login は null。
pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<UserSessionView>, AppError> {
    let device_id = device_id_from_headers(&headers)?;

    let view = state.auth.get_user(user_id, &device_id).await?;

    Ok(Json(view))
}
