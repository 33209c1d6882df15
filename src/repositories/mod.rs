use std::sync::Arc;

use tokio::sync::RwLock;

pub mod memory;
pub mod session;
pub mod two_factor_secret;
pub mod user;

pub use memory::{MemorySessionStore, MemoryTwoFactorSecretStore, MemoryUserStore};
pub use session::{PostgresSessionStore, SessionStore};
pub use two_factor_secret::{PostgresTwoFactorSecretStore, TwoFactorSecretStore};
pub use user::{PostgresUserStore, UserStore};

/// ストア共通エラー
///
/// 各ストアの実装詳細（sqlx エラー等）を呼び出し側に漏らさないための型。
/// NotFound は「必須の行が存在しない」場合のみ（Option を返す検索は対象外）。
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("レコードが見つかりません")]
    NotFound,

    #[error("ストアエラー")]
    Unexpected(#[source] anyhow::Error),
}

impl PartialEq for StoreError {
    fn eq(&self, other: &Self) -> bool {
        matches!(
            (self, other),
            (Self::NotFound, Self::NotFound) | (Self::Unexpected(_), Self::Unexpected(_))
        )
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => Self::NotFound,
            err => Self::Unexpected(anyhow::anyhow!(err)),
        }
    }
}

// ハンドラー・サービス間で共有するトレイトオブジェクト型
//
// 書き込み系メソッドは &mut self を取るため、write ロックが
// インメモリ実装の check-then-insert を直列化する。
pub type UserStoreType = Arc<RwLock<dyn UserStore + Send + Sync>>;
pub type TwoFactorSecretStoreType = Arc<RwLock<dyn TwoFactorSecretStore + Send + Sync>>;
pub type SessionStoreType = Arc<RwLock<dyn SessionStore + Send + Sync>>;
