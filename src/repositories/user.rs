use sqlx::PgPool;
use uuid::Uuid;

use super::StoreError;
use crate::models::User;

/// ユーザーストア（Credential Store）
///
/// ユーザーの作成・削除は外部の責務。このサービスが使うのは
/// 検索2種と require_2fa の更新のみ。
#[async_trait::async_trait]
pub trait UserStore {
    /// メールアドレスでユーザーを検索（不在はエラーではなく None）
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    /// ユーザーIDでユーザーを検索（不在はエラーではなく None）
    async fn find_by_id(&self, user_id: Uuid) -> Result<Option<User>, StoreError>;

    /// require_2fa フラグを更新し、更新後のユーザーを返す
    ///
    /// 対象ユーザーが存在しない場合は NotFound
    async fn set_require_2fa(&mut self, user_id: Uuid, require_2fa: bool)
    -> Result<User, StoreError>;
}

#[derive(Clone)]
pub struct PostgresUserStore {
    pool: PgPool,
}

impl PostgresUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl UserStore for PostgresUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, require_2fa, created_at, updated_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn find_by_id(&self, user_id: Uuid) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, require_2fa, created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn set_require_2fa(
        &mut self,
        user_id: Uuid,
        require_2fa: bool,
    ) -> Result<User, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET require_2fa = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING id, email, password_hash, require_2fa, created_at, updated_at
            "#,
        )
        .bind(user_id)
        .bind(require_2fa)
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }
}
