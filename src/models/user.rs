use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// ユーザーアカウント
///
/// 作成・削除はこのサービスの範囲外（外部でシードされる）。
/// このサービスが変更するのは `require_2fa` のみ（setup_2fa で false → true）。
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip)]
    pub password_hash: String,
    pub require_2fa: bool,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// ユーザーの公開ビュー
///
/// レスポンスに含めてよいフィールドのみを持つ。
/// password_hash は絶対に含めないこと。
#[derive(Debug, Serialize)]
pub struct UserView {
    pub id: Uuid,
    pub email: String,
    pub require_2fa: bool,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            require_2fa: user.require_2fa,
        }
    }
}

/// ユーザー公開ビュー + デバイスセッション状態のマージ結果
///
/// セッションが存在しないデバイスでは is_2fa_verified / last_login は null
#[derive(Debug, Serialize)]
pub struct UserSessionView {
    pub id: Uuid,
    pub email: String,
    pub require_2fa: bool,
    pub is_2fa_verified: Option<bool>,
    pub last_login: Option<OffsetDateTime>,
}

impl UserSessionView {
    /// ユーザーとセッション（存在すれば）からビューを構築
    pub fn merge(user: &User, session: Option<&super::DeviceSession>) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            require_2fa: user.require_2fa,
            is_2fa_verified: session.map(|s| s.verified),
            last_login: session.map(|s| s.last_login),
        }
    }
}
