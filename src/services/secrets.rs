use uuid::Uuid;

use crate::error::AppError;
use crate::repositories::{TwoFactorSecretStore, TwoFactorSecretStoreType};
use crate::services::TotpService;

/// シークレットレジストリ
///
/// ユーザーごとのTOTPシークレットのライフサイクル（issue-once / fetch）を所有する。
/// 保存形式（AES-GCM暗号化）はこのサービス内に閉じ、
/// 呼び出し側には常にBase32平文を返す。
#[derive(Clone)]
pub struct SecretRegistry {
    store: TwoFactorSecretStoreType,
    totp: TotpService,
}

impl SecretRegistry {
    pub fn new(store: TwoFactorSecretStoreType, totp: TotpService) -> Self {
        Self { store, totp }
    }

    /// ユーザーのシークレットを取得し、なければ新規発行する
    ///
    /// ストアのアトミックな get_or_insert に委ねるため、
    /// 同一ユーザーへの同時呼び出しでも行は1つしか生まれない。
    /// 勝った行を復号して返すので、全呼び出し側が同じ値を観測する。
    pub async fn get_or_create_secret(&self, user_id: Uuid) -> Result<String, AppError> {
        let candidate = TotpService::generate_secret();
        let candidate_encrypted = self.totp.encrypt_secret(&candidate)?;

        let row = self
            .store
            .write()
            .await
            .get_or_insert(user_id, candidate_encrypted)
            .await
            .map_err(AppError::from)?;

        // candidate ではなく、ストアが返した行を復号する。
        // 既存行があった場合 candidate は破棄されている。
        self.totp.decrypt_secret(&row.secret_encrypted)
    }

    /// ユーザーのシークレットを取得（副作用なし、不在は None）
    pub async fn get_secret(&self, user_id: Uuid) -> Result<Option<String>, AppError> {
        let row = self
            .store
            .read()
            .await
            .find_by_user_id(user_id)
            .await
            .map_err(AppError::from)?;

        match row {
            Some(row) => Ok(Some(self.totp.decrypt_secret(&row.secret_encrypted)?)),
            None => Ok(None),
        }
    }
}
