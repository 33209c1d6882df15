use std::collections::HashMap;

use time::OffsetDateTime;
use uuid::Uuid;

use super::{SessionStore, StoreError, TwoFactorSecretStore, UserStore};
use crate::models::{DeviceSession, TwoFactorSecret, User};

/// インメモリのユーザーストア
///
/// テスト・ローカル実行用。トレイトオブジェクトを包む RwLock の
/// write ロックが書き込みを直列化する前提。
#[derive(Default)]
pub struct MemoryUserStore {
    users: HashMap<Uuid, User>,
}

impl MemoryUserStore {
    /// ユーザーをシードする（ユーザー作成はサービスの範囲外のため、
    /// トレイトではなく具象型のみが持つ）
    pub fn seed(&mut self, user: User) {
        self.users.insert(user.id, user);
    }
}

#[async_trait::async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self.users.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, user_id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.users.get(&user_id).cloned())
    }

    async fn set_require_2fa(
        &mut self,
        user_id: Uuid,
        require_2fa: bool,
    ) -> Result<User, StoreError> {
        let user = self.users.get_mut(&user_id).ok_or(StoreError::NotFound)?;
        user.require_2fa = require_2fa;
        user.updated_at = OffsetDateTime::now_utc();
        Ok(user.clone())
    }
}

/// インメモリの2FAシークレットストア
#[derive(Default)]
pub struct MemoryTwoFactorSecretStore {
    secrets: HashMap<Uuid, TwoFactorSecret>,
}

#[async_trait::async_trait]
impl TwoFactorSecretStore for MemoryTwoFactorSecretStore {
    async fn find_by_user_id(&self, user_id: Uuid) -> Result<Option<TwoFactorSecret>, StoreError> {
        Ok(self.secrets.get(&user_id).cloned())
    }

    async fn get_or_insert(
        &mut self,
        user_id: Uuid,
        candidate_encrypted: Vec<u8>,
    ) -> Result<TwoFactorSecret, StoreError> {
        // 既存行が勝ち、candidate は破棄される
        let secret = self
            .secrets
            .entry(user_id)
            .or_insert_with(|| TwoFactorSecret {
                user_id,
                secret_encrypted: candidate_encrypted,
                created_at: OffsetDateTime::now_utc(),
            });
        Ok(secret.clone())
    }
}

/// インメモリのデバイスセッションストア
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: HashMap<(Uuid, String), DeviceSession>,
}

#[async_trait::async_trait]
impl SessionStore for MemorySessionStore {
    async fn find(
        &self,
        user_id: Uuid,
        device_id: &str,
    ) -> Result<Option<DeviceSession>, StoreError> {
        Ok(self.sessions.get(&(user_id, device_id.to_string())).cloned())
    }

    async fn find_or_create(
        &mut self,
        user_id: Uuid,
        device_id: &str,
        now: OffsetDateTime,
    ) -> Result<DeviceSession, StoreError> {
        let session = self
            .sessions
            .entry((user_id, device_id.to_string()))
            .and_modify(|s| s.last_login = now)
            .or_insert_with(|| DeviceSession {
                user_id,
                device_id: device_id.to_string(),
                verified: false,
                last_login: now,
            });
        Ok(session.clone())
    }

    async fn mark_verified(
        &mut self,
        user_id: Uuid,
        device_id: &str,
    ) -> Result<DeviceSession, StoreError> {
        let session = self
            .sessions
            .get_mut(&(user_id, device_id.to_string()))
            .ok_or(StoreError::NotFound)?;
        session.verified = true;
        Ok(session.clone())
    }

    async fn delete_all(&mut self, user_id: Uuid, device_id: &str) -> Result<(), StoreError> {
        self.sessions.remove(&(user_id, device_id.to_string()));
        Ok(())
    }
}
