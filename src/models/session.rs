use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// デバイスごとのログインセッション
///
/// キーは (user_id, device_id) の組で一意。
/// verified はログインサイクル内で単調: OTP 検証成功時のみ false → true、
/// true → false はセッション削除（ログアウト）によってのみ起こる。
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct DeviceSession {
    pub user_id: Uuid,
    pub device_id: String,
    pub verified: bool,
    pub last_login: OffsetDateTime,
}
