use axum::http::HeaderMap;

use crate::error::AppError;

/// リクエストヘッダーからデバイスIDを取り出す
///
/// クライアントが提示する不透明な文字列キーで、パースはしない。
/// x-device-id を優先し、無ければ user-agent で代用する。
/// セッションキー (user_id, device_id) が意味を持つよう、
/// タイムスタンプ等で揺らがない安定した値であること。
pub fn device_id_from_headers(headers: &HeaderMap) -> Result<String, AppError> {
    let raw = headers
        .get("x-device-id")
        .or_else(|| headers.get("user-agent"))
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    match raw {
        Some(device_id) => Ok(device_id.to_string()),
        None => Err(AppError::Validation(
            "デバイスID（x-device-id または user-agent ヘッダー）は必須です".to_string(),
        )),
    }
}
