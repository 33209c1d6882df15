use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// ユーザーの二要素認証（TOTP）シークレット
///
/// user_id につき最大1行。一度作成されたら変更・ローテーションされない。
/// シークレットは AES-256-GCM で暗号化されて保存される。
/// 平文シークレットはログに出力禁止。
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct TwoFactorSecret {
    pub user_id: Uuid,
    #[serde(skip)]
    pub secret_encrypted: Vec<u8>,
    pub created_at: OffsetDateTime,
}
