use std::sync::Arc;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use tokio::sync::RwLock;

use crate::config::Config;
use crate::error::AppError;
use crate::repositories::{
    PostgresSessionStore, PostgresTwoFactorSecretStore, PostgresUserStore, SessionStoreType,
    TwoFactorSecretStoreType, UserStoreType,
};
use crate::services::{AuthService, SecretRegistry, TotpService};

/// アプリケーション共有状態
///
/// axum の State として全ハンドラーで共有される。
/// Clone は必須（axum が内部で clone するため）。
#[derive(Clone)]
pub struct AppState {
    /// 認証オーケストレーター
    pub auth: AuthService,
    /// アプリケーション設定（Arc で共有）
    pub config: Arc<Config>,
}

impl AppState {
    /// Postgres ストアで AppState を作成
    pub fn new(db_pool: PgPool, config: Config) -> Result<Self, AppError> {
        let user_store: UserStoreType =
            Arc::new(RwLock::new(PostgresUserStore::new(db_pool.clone())));
        let secret_store: TwoFactorSecretStoreType = Arc::new(RwLock::new(
            PostgresTwoFactorSecretStore::new(db_pool.clone()),
        ));
        let session_store: SessionStoreType =
            Arc::new(RwLock::new(PostgresSessionStore::new(db_pool)));

        Self::with_stores(user_store, secret_store, session_store, config)
    }

    /// 注入されたストアで AppState を作成
    ///
    /// テストやローカル実行ではインメモリ実装を渡す
    pub fn with_stores(
        user_store: UserStoreType,
        secret_store: TwoFactorSecretStoreType,
        session_store: SessionStoreType,
        config: Config,
    ) -> Result<Self, AppError> {
        let config = Arc::new(config);
        let totp = TotpService::new(
            config.totp_issuer.clone(),
            config.encryption_key.expose_secret(),
        )?;
        let secrets = SecretRegistry::new(secret_store, totp.clone());
        let auth = AuthService::new(user_store, session_store, secrets, totp);

        Ok(Self { auth, config })
    }
}
