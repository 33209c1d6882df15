use argon2::password_hash::SaltString;
use argon2::password_hash::rand_core::OsRng;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{User, UserSessionView};
use crate::repositories::{SessionStore, SessionStoreType, StoreError, UserStore, UserStoreType};
use crate::services::{SecretRegistry, TotpService};

/// パスワードをargon2idでハッシュ化
///
/// ユーザー作成はこのサービスの範囲外だが、シード処理とテストが使う
pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| {
            tracing::error!(error = ?e, "パスワードハッシュ生成エラー");
            AppError::Internal(anyhow::anyhow!("password hash error"))
        })?;
    Ok(hash.to_string())
}

/// パスワードをハッシュと照合
fn verify_password(password: &str, hash: &str) -> Result<bool, AppError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|e| {
        tracing::error!(error = ?e, "パスワードハッシュのパースエラー");
        AppError::Internal(anyhow::anyhow!("password hash parse error"))
    })?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// 認証オーケストレーター
///
/// 6操作（login / get_user / logout / issue_qr_code / setup_2fa / verify_2fa）を
/// 実装する。各ストアとシークレットレジストリは構築時に注入され、
/// テストではインメモリ実装に差し替えられる。
///
/// 全操作はまず対象ユーザーを解決し、不在なら NotFound で中断する。
#[derive(Clone)]
pub struct AuthService {
    user_store: UserStoreType,
    session_store: SessionStoreType,
    secrets: SecretRegistry,
    totp: TotpService,
}

impl AuthService {
    pub fn new(
        user_store: UserStoreType,
        session_store: SessionStoreType,
        secrets: SecretRegistry,
        totp: TotpService,
    ) -> Self {
        Self {
            user_store,
            session_store,
            secrets,
            totp,
        }
    }

    /// ログイン
    ///
    /// パスワード照合成功でデバイスセッションを find-or-create し、
    /// ユーザー公開ビュー + セッション状態を返す。
    /// 既存セッションは last_login のみ更新される（verified は保持）。
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        device_id: &str,
    ) -> Result<UserSessionView, AppError> {
        let user = self
            .user_store
            .read()
            .await
            .find_by_email(email)
            .await?
            .ok_or(AppError::NotFound("ユーザー"))?;

        if !verify_password(password, &user.password_hash)? {
            tracing::warn!(user_id = %user.id, "ログイン失敗: パスワード不一致");
            return Err(AppError::WrongCredential);
        }

        let session = self
            .session_store
            .write()
            .await
            .find_or_create(user.id, device_id, OffsetDateTime::now_utc())
            .await?;

        tracing::info!(user_id = %user.id, verified = session.verified, "ログイン成功");

        Ok(UserSessionView::merge(&user, Some(&session)))
    }

    /// ユーザー取得
    ///
    /// 指定デバイスのセッション状態をマージして返す。
    /// セッションが無いデバイスでは is_2fa_verified / last_login は None。
    pub async fn get_user(
        &self,
        user_id: Uuid,
        device_id: &str,
    ) -> Result<UserSessionView, AppError> {
        let user = self.resolve_user(user_id).await?;

        let session = self
            .session_store
            .read()
            .await
            .find(user.id, device_id)
            .await?;

        Ok(UserSessionView::merge(&user, session.as_ref()))
    }

    /// ログアウト
    ///
    /// 指定デバイスのセッションのみ削除する。他デバイスの検証状態は不変。
    /// セッションが元々無くても成功を返す（冪等）。
    pub async fn logout(&self, user_id: Uuid, device_id: &str) -> Result<(), AppError> {
        let user = self.resolve_user(user_id).await?;

        self.session_store
            .write()
            .await
            .delete_all(user.id, device_id)
            .await?;

        tracing::info!(user_id = %user.id, "ログアウト完了");

        Ok(())
    }

    /// QRコード発行
    ///
    /// シークレットを issue-once で取得し、プロビジョニングURIを
    /// QRコード（data URI）にして返す。セッションにも require_2fa にも
    /// 触れない純粋な発行操作で、何度呼んでも同じシークレットを返す。
    pub async fn issue_qr_code(&self, user_id: Uuid) -> Result<String, AppError> {
        let user = self.resolve_user(user_id).await?;

        let secret = self.secrets.get_or_create_secret(user.id).await?;
        let qr_code = self.totp.generate_qr_code(&user.email, &secret)?;

        tracing::info!(user_id = %user.id, "2FA QRコード発行");

        Ok(format!("data:image/png;base64,{qr_code}"))
    }

    /// 2FAセットアップ（初回検証）
    ///
    /// 発行済みシークレットに対する最初のコード検証。成功で
    /// require_2fa を true にし、このデバイスのセッションを検証済みにする。
    /// セットアップがユーザーの最初の操作になり得るため、
    /// セッションが無ければ find-or-create で作ってから検証済みにする。
    pub async fn setup_2fa(
        &self,
        user_id: Uuid,
        device_id: &str,
        code: &str,
    ) -> Result<UserSessionView, AppError> {
        let user = self.resolve_user(user_id).await?;
        let secret = self.require_secret(user.id).await?;
        self.check_code(&secret, code)?;

        // require_2fa: false → true（この範囲では一方向）
        let user = self
            .user_store
            .write()
            .await
            .set_require_2fa(user.id, true)
            .await?;

        let mut sessions = self.session_store.write().await;
        sessions
            .find_or_create(user.id, device_id, OffsetDateTime::now_utc())
            .await?;
        let session = sessions.mark_verified(user.id, device_id).await?;
        drop(sessions);

        tracing::info!(user_id = %user.id, "2FAセットアップ完了");

        Ok(UserSessionView::merge(&user, Some(&session)))
    }

    /// 2FA検証
    ///
    /// ログイン済みデバイスのセッションを検証済みにする。
    /// セットアップと違い、セッションを新規に作ることはない
    /// （先行ログインが無ければ NotFound）。
    pub async fn verify_2fa(
        &self,
        user_id: Uuid,
        device_id: &str,
        code: &str,
    ) -> Result<UserSessionView, AppError> {
        let user = self.resolve_user(user_id).await?;
        let secret = self.require_secret(user.id).await?;
        self.check_code(&secret, code)?;

        let session = self
            .session_store
            .write()
            .await
            .mark_verified(user.id, device_id)
            .await
            .map_err(|e| match e {
                StoreError::NotFound => AppError::NotFound("セッション"),
                err => err.into(),
            })?;

        tracing::info!(user_id = %user.id, "2FA検証完了");

        Ok(UserSessionView::merge(&user, Some(&session)))
    }

    /// ユーザーIDを解決（不在なら NotFound）
    async fn resolve_user(&self, user_id: Uuid) -> Result<User, AppError> {
        self.user_store
            .read()
            .await
            .find_by_id(user_id)
            .await?
            .ok_or(AppError::NotFound("ユーザー"))
    }

    /// 発行済みシークレットを要求（未発行なら NotFound）
    ///
    /// issue_qr_code を先に呼んでいない限り setup / verify はできない
    async fn require_secret(&self, user_id: Uuid) -> Result<String, AppError> {
        self.secrets
            .get_secret(user_id)
            .await?
            .ok_or(AppError::NotFound("2FAシークレット"))
    }

    /// コードの存在チェックと検証
    fn check_code(&self, secret: &str, code: &str) -> Result<(), AppError> {
        if code.is_empty() {
            return Err(AppError::Validation("認証コードは必須です".to_string()));
        }
        if !self.totp.verify_code(secret, code)? {
            return Err(AppError::TotpInvalid);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use base64::{Engine as _, engine::general_purpose::STANDARD};
    use data_encoding::BASE32;
    use tokio::sync::RwLock;
    use totp_rs::{Algorithm, TOTP};

    use super::*;
    use crate::repositories::{
        MemorySessionStore, MemoryTwoFactorSecretStore, MemoryUserStore, SessionStore,
    };

    const EMAIL: &str = "a@x.com";
    const PASSWORD: &str = "p";
    const DEVICE: &str = "D1";

    struct Harness {
        service: AuthService,
        registry: SecretRegistry,
        session_store: SessionStoreType,
        user_id: Uuid,
    }

    /// インメモリストアでオーケストレーターを組み立て、ユーザーを1人シードする
    fn harness() -> Harness {
        let key_base64 = STANDARD.encode([0u8; 32]);
        let totp = TotpService::new("TestApp".to_string(), &key_base64).unwrap();

        let now = OffsetDateTime::now_utc();
        let user = User {
            id: Uuid::new_v4(),
            email: EMAIL.to_string(),
            password_hash: hash_password(PASSWORD).unwrap(),
            require_2fa: false,
            created_at: now,
            updated_at: now,
        };
        let user_id = user.id;

        let mut user_store = MemoryUserStore::default();
        user_store.seed(user);
        let user_store: UserStoreType = Arc::new(RwLock::new(user_store));
        let session_store: SessionStoreType =
            Arc::new(RwLock::new(MemorySessionStore::default()));
        let secret_store = Arc::new(RwLock::new(MemoryTwoFactorSecretStore::default()));

        let registry = SecretRegistry::new(secret_store, totp.clone());
        let service = AuthService::new(
            user_store,
            session_store.clone(),
            registry.clone(),
            totp,
        );

        Harness {
            service,
            registry,
            session_store,
            user_id,
        }
    }

    /// シークレットから現在有効なコードを生成
    fn current_code(secret: &str) -> String {
        build_totp(secret).generate_current().unwrap()
    }

    /// 指定時刻のコードを生成（ウィンドウ外テスト用）
    fn code_at(secret: &str, timestamp: u64) -> String {
        build_totp(secret).generate(timestamp)
    }

    fn build_totp(secret: &str) -> TOTP {
        let secret_bytes = BASE32.decode(secret.as_bytes()).unwrap();
        TOTP::new(Algorithm::SHA1, 6, 1, 30, secret_bytes, None, String::new()).unwrap()
    }

    fn unix_now() -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_secs()
    }

    #[tokio::test]
    async fn login_creates_unverified_session() {
        let h = harness();

        let view = h.service.login(EMAIL, PASSWORD, DEVICE).await.unwrap();
        assert_eq!(view.is_2fa_verified, Some(false));
        assert!(view.last_login.is_some());
        assert!(!view.require_2fa);
    }

    #[tokio::test]
    async fn login_unknown_email_is_not_found() {
        let h = harness();

        let result = h.service.login("nobody@x.com", PASSWORD, DEVICE).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn login_wrong_password_creates_no_session() {
        let h = harness();

        let result = h.service.login(EMAIL, "wrong-password", DEVICE).await;
        assert!(matches!(result, Err(AppError::WrongCredential)));

        // セッションは作られていない
        let session = h
            .session_store
            .read()
            .await
            .find(h.user_id, DEVICE)
            .await
            .unwrap();
        assert!(session.is_none());
    }

    #[tokio::test]
    async fn get_user_without_session_reports_none() {
        let h = harness();

        let view = h.service.get_user(h.user_id, "unseen-device").await.unwrap();
        assert!(view.is_2fa_verified.is_none());
        assert!(view.last_login.is_none());
    }

    #[tokio::test]
    async fn logout_removes_only_that_device() {
        let h = harness();

        h.service.login(EMAIL, PASSWORD, "D1").await.unwrap();
        h.service.login(EMAIL, PASSWORD, "D2").await.unwrap();

        h.service.logout(h.user_id, "D1").await.unwrap();

        let d1 = h.service.get_user(h.user_id, "D1").await.unwrap();
        let d2 = h.service.get_user(h.user_id, "D2").await.unwrap();
        assert!(d1.is_2fa_verified.is_none());
        assert_eq!(d2.is_2fa_verified, Some(false));

        // 冪等: もう一度ログアウトしても成功
        h.service.logout(h.user_id, "D1").await.unwrap();
    }

    #[tokio::test]
    async fn issue_qr_code_is_idempotent() {
        let h = harness();

        let first = h.service.issue_qr_code(h.user_id).await.unwrap();
        let secret_after_first = h.registry.get_secret(h.user_id).await.unwrap().unwrap();

        let second = h.service.issue_qr_code(h.user_id).await.unwrap();
        let secret_after_second = h.registry.get_secret(h.user_id).await.unwrap().unwrap();

        // シークレットは再発行されず、QRも同一
        assert_eq!(secret_after_first, secret_after_second);
        assert_eq!(first, second);
        assert!(first.starts_with("data:image/png;base64,"));
    }

    #[tokio::test]
    async fn concurrent_issuance_yields_single_secret() {
        let h = harness();
        let user_id = h.user_id;

        let (a, b) = tokio::join!(
            {
                let service = h.service.clone();
                tokio::spawn(async move { service.issue_qr_code(user_id).await })
            },
            {
                let service = h.service.clone();
                tokio::spawn(async move { service.issue_qr_code(user_id).await })
            },
        );

        // どちらの呼び出しも同じシークレット由来のQRを受け取る
        assert_eq!(a.unwrap().unwrap(), b.unwrap().unwrap());
    }

    #[tokio::test]
    async fn issue_qr_code_touches_no_session_state() {
        let h = harness();

        h.service.issue_qr_code(h.user_id).await.unwrap();

        let view = h.service.get_user(h.user_id, DEVICE).await.unwrap();
        assert!(!view.require_2fa);
        assert!(view.is_2fa_verified.is_none());
    }

    #[tokio::test]
    async fn setup_without_secret_is_not_found() {
        let h = harness();

        let result = h.service.setup_2fa(h.user_id, DEVICE, "123456").await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn setup_with_empty_code_is_validation_error() {
        let h = harness();

        h.service.issue_qr_code(h.user_id).await.unwrap();
        let result = h.service.setup_2fa(h.user_id, DEVICE, "").await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn setup_then_verify_with_valid_code() {
        let h = harness();

        h.service.login(EMAIL, PASSWORD, DEVICE).await.unwrap();
        h.service.issue_qr_code(h.user_id).await.unwrap();
        let secret = h.registry.get_secret(h.user_id).await.unwrap().unwrap();

        let view = h
            .service
            .setup_2fa(h.user_id, DEVICE, &current_code(&secret))
            .await
            .unwrap();
        assert!(view.require_2fa);
        assert_eq!(view.is_2fa_verified, Some(true));

        // 直後の verify_2fa も成功し、状態は維持される
        let view = h
            .service
            .verify_2fa(h.user_id, DEVICE, &current_code(&secret))
            .await
            .unwrap();
        assert!(view.require_2fa);
        assert_eq!(view.is_2fa_verified, Some(true));
    }

    #[tokio::test]
    async fn setup_may_originate_the_session() {
        let h = harness();

        // ログインなしでセットアップ: セッションはここで生まれる
        h.service.issue_qr_code(h.user_id).await.unwrap();
        let secret = h.registry.get_secret(h.user_id).await.unwrap().unwrap();

        let view = h
            .service
            .setup_2fa(h.user_id, DEVICE, &current_code(&secret))
            .await
            .unwrap();
        assert_eq!(view.is_2fa_verified, Some(true));
        assert!(view.last_login.is_some());
    }

    #[tokio::test]
    async fn verify_rejects_code_outside_window() {
        let h = harness();

        h.service.login(EMAIL, PASSWORD, DEVICE).await.unwrap();
        h.service.issue_qr_code(h.user_id).await.unwrap();
        let secret = h.registry.get_secret(h.user_id).await.unwrap().unwrap();

        // ±1ステップの外（2分前）のコードは拒否される
        let stale = code_at(&secret, unix_now() - 120);
        let result = h.service.verify_2fa(h.user_id, DEVICE, &stale).await;
        assert!(matches!(result, Err(AppError::TotpInvalid)));

        let view = h.service.get_user(h.user_id, DEVICE).await.unwrap();
        assert_eq!(view.is_2fa_verified, Some(false));
    }

    #[tokio::test]
    async fn verify_without_session_fabricates_nothing() {
        let h = harness();

        h.service.issue_qr_code(h.user_id).await.unwrap();
        let secret = h.registry.get_secret(h.user_id).await.unwrap().unwrap();

        let result = h
            .service
            .verify_2fa(h.user_id, DEVICE, &current_code(&secret))
            .await;
        assert!(matches!(result, Err(AppError::NotFound(_))));

        let session = h
            .session_store
            .read()
            .await
            .find(h.user_id, DEVICE)
            .await
            .unwrap();
        assert!(session.is_none());
    }

    /// 仕様のフルシナリオ: login → QR発行 → setup → logout → get_user
    #[tokio::test]
    async fn full_device_lifecycle() {
        let h = harness();

        let view = h.service.login(EMAIL, PASSWORD, DEVICE).await.unwrap();
        assert_eq!(view.is_2fa_verified, Some(false));

        h.service.issue_qr_code(h.user_id).await.unwrap();
        let secret = h.registry.get_secret(h.user_id).await.unwrap().unwrap();

        let view = h
            .service
            .setup_2fa(h.user_id, DEVICE, &current_code(&secret))
            .await
            .unwrap();
        assert!(view.require_2fa);
        assert_eq!(view.is_2fa_verified, Some(true));

        h.service.logout(h.user_id, DEVICE).await.unwrap();

        let view = h.service.get_user(h.user_id, DEVICE).await.unwrap();
        assert!(view.is_2fa_verified.is_none());
        assert!(view.last_login.is_none());
        // require_2fa はユーザー属性なのでログアウト後も残る
        assert!(view.require_2fa);
    }

    #[tokio::test]
    async fn relogin_after_logout_starts_unverified() {
        let h = harness();

        h.service.login(EMAIL, PASSWORD, DEVICE).await.unwrap();
        h.service.issue_qr_code(h.user_id).await.unwrap();
        let secret = h.registry.get_secret(h.user_id).await.unwrap().unwrap();
        h.service
            .setup_2fa(h.user_id, DEVICE, &current_code(&secret))
            .await
            .unwrap();
        h.service.logout(h.user_id, DEVICE).await.unwrap();

        // 再ログインで新しいサイクルが始まり、verified は false に戻る
        let view = h.service.login(EMAIL, PASSWORD, DEVICE).await.unwrap();
        assert_eq!(view.is_2fa_verified, Some(false));
        assert!(view.require_2fa);
    }
}
