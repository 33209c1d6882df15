use sqlx::PgPool;
use uuid::Uuid;

use super::StoreError;
use crate::models::TwoFactorSecret;

/// 2FAシークレットストア（Secret Registry の永続化層）
///
/// user_id につき最大1行。作成後は不変。
#[async_trait::async_trait]
pub trait TwoFactorSecretStore {
    /// ユーザーIDでシークレットを検索（不在はエラーではなく None）
    async fn find_by_user_id(&self, user_id: Uuid) -> Result<Option<TwoFactorSecret>, StoreError>;

    /// アトミックな find-or-insert
    ///
    /// 既に行が存在すればその行を返し、candidate は破棄する。
    /// 存在しなければ candidate を挿入して返す。
    /// 同一 user_id への同時呼び出しが2行を生むことは許されない。
    async fn get_or_insert(
        &mut self,
        user_id: Uuid,
        candidate_encrypted: Vec<u8>,
    ) -> Result<TwoFactorSecret, StoreError>;
}

#[derive(Clone)]
pub struct PostgresTwoFactorSecretStore {
    pool: PgPool,
}

impl PostgresTwoFactorSecretStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl TwoFactorSecretStore for PostgresTwoFactorSecretStore {
    async fn find_by_user_id(&self, user_id: Uuid) -> Result<Option<TwoFactorSecret>, StoreError> {
        let secret = sqlx::query_as::<_, TwoFactorSecret>(
            r#"
            SELECT user_id, secret_encrypted, created_at
            FROM two_factor_secrets
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(secret)
    }

    async fn get_or_insert(
        &mut self,
        user_id: Uuid,
        candidate_encrypted: Vec<u8>,
    ) -> Result<TwoFactorSecret, StoreError> {
        // 1文の upsert で check-then-insert の競合を排除する。
        // 衝突時の DO UPDATE は no-op（user_id を自分自身で上書き）だが、
        // これにより既存行が RETURNING で必ず返る。
        let secret = sqlx::query_as::<_, TwoFactorSecret>(
            r#"
            INSERT INTO two_factor_secrets (user_id, secret_encrypted)
            VALUES ($1, $2)
            ON CONFLICT (user_id) DO UPDATE SET user_id = EXCLUDED.user_id
            RETURNING user_id, secret_encrypted, created_at
            "#,
        )
        .bind(user_id)
        .bind(candidate_encrypted)
        .fetch_one(&self.pool)
        .await?;

        Ok(secret)
    }
}
