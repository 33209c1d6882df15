use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use super::StoreError;
use crate::models::DeviceSession;

/// デバイスセッションストア
///
/// 全操作のキーは (user_id, device_id) の組。同一キーの行は高々1つ。
#[async_trait::async_trait]
pub trait SessionStore {
    /// セッションを検索（不在はエラーではなく None）
    async fn find(
        &self,
        user_id: Uuid,
        device_id: &str,
    ) -> Result<Option<DeviceSession>, StoreError>;

    /// アトミックな find-or-create
    ///
    /// 既存行があれば last_login のみ now に更新して返す（verified は保持）。
    /// なければ verified = false, last_login = now で新規作成。
    async fn find_or_create(
        &mut self,
        user_id: Uuid,
        device_id: &str,
        now: OffsetDateTime,
    ) -> Result<DeviceSession, StoreError>;

    /// verified = true に更新し、更新後のセッションを返す
    ///
    /// 対象セッションが存在しない場合は NotFound。
    /// 検証が無からセッションを作ることはない。
    async fn mark_verified(
        &mut self,
        user_id: Uuid,
        device_id: &str,
    ) -> Result<DeviceSession, StoreError>;

    /// (user_id, device_id) に一致するセッションを削除（冪等）
    async fn delete_all(&mut self, user_id: Uuid, device_id: &str) -> Result<(), StoreError>;
}

#[derive(Clone)]
pub struct PostgresSessionStore {
    pool: PgPool,
}

impl PostgresSessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl SessionStore for PostgresSessionStore {
    async fn find(
        &self,
        user_id: Uuid,
        device_id: &str,
    ) -> Result<Option<DeviceSession>, StoreError> {
        let session = sqlx::query_as::<_, DeviceSession>(
            r#"
            SELECT user_id, device_id, verified, last_login
            FROM device_sessions
            WHERE user_id = $1 AND device_id = $2
            "#,
        )
        .bind(user_id)
        .bind(device_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(session)
    }

    async fn find_or_create(
        &mut self,
        user_id: Uuid,
        device_id: &str,
        now: OffsetDateTime,
    ) -> Result<DeviceSession, StoreError> {
        // 1文の upsert で check-then-insert の競合を排除する。
        // 既存行は last_login のみ更新され、verified は保持される。
        let session = sqlx::query_as::<_, DeviceSession>(
            r#"
            INSERT INTO device_sessions (user_id, device_id, verified, last_login)
            VALUES ($1, $2, false, $3)
            ON CONFLICT (user_id, device_id) DO UPDATE SET last_login = EXCLUDED.last_login
            RETURNING user_id, device_id, verified, last_login
            "#,
        )
        .bind(user_id)
        .bind(device_id)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(session)
    }

    async fn mark_verified(
        &mut self,
        user_id: Uuid,
        device_id: &str,
    ) -> Result<DeviceSession, StoreError> {
        let session = sqlx::query_as::<_, DeviceSession>(
            r#"
            UPDATE device_sessions
            SET verified = true
            WHERE user_id = $1 AND device_id = $2
            RETURNING user_id, device_id, verified, last_login
            "#,
        )
        .bind(user_id)
        .bind(device_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(session)
    }

    async fn delete_all(&mut self, user_id: Uuid, device_id: &str) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            DELETE FROM device_sessions
            WHERE user_id = $1 AND device_id = $2
            "#,
        )
        .bind(user_id)
        .bind(device_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
