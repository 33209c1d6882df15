use aes_gcm::{
    Aes256Gcm, KeyInit, Nonce,
    aead::{Aead, OsRng},
};
use data_encoding::BASE32;
use rand::RngCore;
use totp_rs::{Algorithm, TOTP};

use crate::error::AppError;

// TOTP パラメータ（認証アプリの一般的なデフォルトに揃える）
const TOTP_DIGITS: usize = 6;
const TOTP_SKEW: u8 = 1; // 前後1ステップ許容
const TOTP_STEP: u64 = 30; // 秒

/// TOTPサービス（OTP Verifier）
///
/// シークレット生成、コード検証、プロビジョニングURI / QRコードの
/// 組み立てを担う。保存用のシークレット暗号化もここに閉じる。
///
/// # Security
/// - シークレットはAES-256-GCMで暗号化してストアに保存
/// - シークレット平文はログに出力しない
#[derive(Clone)]
pub struct TotpService {
    issuer: String,
    encryption_key: [u8; 32],
}

impl TotpService {
    /// 新しい TotpService を作成
    ///
    /// # Arguments
    /// * `issuer` - TOTP発行者名（認証アプリに表示されるサービスラベル）
    /// * `encryption_key_base64` - Base64エンコードされた32バイトの暗号化キー
    pub fn new(issuer: String, encryption_key_base64: &str) -> Result<Self, AppError> {
        use base64::{Engine as _, engine::general_purpose::STANDARD};

        let key_bytes = STANDARD.decode(encryption_key_base64).map_err(|e| {
            tracing::error!(error = ?e, "TOTP暗号化キーのBase64デコードエラー");
            AppError::Internal(anyhow::anyhow!("invalid encryption key format"))
        })?;

        let encryption_key: [u8; 32] = key_bytes.try_into().map_err(|bytes: Vec<u8>| {
            tracing::error!(expected = 32, actual = bytes.len(), "TOTP暗号化キーの長さが不正");
            AppError::Internal(anyhow::anyhow!("encryption key must be 32 bytes"))
        })?;

        Ok(Self {
            issuer,
            encryption_key,
        })
    }

    /// 20バイトのランダムシークレットを生成し、Base32でエンコード
    pub fn generate_secret() -> String {
        let mut bytes = [0u8; 20];
        rand::thread_rng().fill_bytes(&mut bytes);
        BASE32.encode(&bytes)
    }

    /// シークレットをAES-256-GCMで暗号化
    ///
    /// # Returns
    /// 96ビットnonce (12バイト) + 暗号文
    pub fn encrypt_secret(&self, secret: &str) -> Result<Vec<u8>, AppError> {
        let cipher = Aes256Gcm::new_from_slice(&self.encryption_key).map_err(|e| {
            tracing::error!(error = ?e, "AES-GCM暗号化器の初期化エラー");
            AppError::Internal(anyhow::anyhow!("cipher initialization error"))
        })?;

        // 96ビット (12バイト) のランダムnonce生成
        let mut nonce_bytes = [0u8; 12];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher.encrypt(nonce, secret.as_bytes()).map_err(|e| {
            tracing::error!(error = ?e, "シークレット暗号化エラー");
            AppError::Internal(anyhow::anyhow!("encryption error"))
        })?;

        // nonce + ciphertext を結合
        let mut result = Vec::with_capacity(12 + ciphertext.len());
        result.extend_from_slice(&nonce_bytes);
        result.extend_from_slice(&ciphertext);

        Ok(result)
    }

    /// 暗号化されたシークレットを復号
    pub fn decrypt_secret(&self, encrypted: &[u8]) -> Result<String, AppError> {
        if encrypted.len() < 12 {
            tracing::error!(len = encrypted.len(), "暗号化データが短すぎる");
            return Err(AppError::Internal(anyhow::anyhow!(
                "encrypted data too short"
            )));
        }

        let cipher = Aes256Gcm::new_from_slice(&self.encryption_key).map_err(|e| {
            tracing::error!(error = ?e, "AES-GCM暗号化器の初期化エラー");
            AppError::Internal(anyhow::anyhow!("cipher initialization error"))
        })?;

        let (nonce_bytes, ciphertext) = encrypted.split_at(12);
        let nonce = Nonce::from_slice(nonce_bytes);

        let plaintext = cipher.decrypt(nonce, ciphertext).map_err(|e| {
            tracing::error!(error = ?e, "シークレット復号エラー");
            AppError::Internal(anyhow::anyhow!("decryption error"))
        })?;

        String::from_utf8(plaintext).map_err(|e| {
            tracing::error!(error = ?e, "復号データのUTF-8変換エラー");
            AppError::Internal(anyhow::anyhow!("invalid utf8 after decryption"))
        })
    }

    /// プロビジョニングURI（otpauth://）を組み立て
    ///
    /// 認証アプリが読み取る標準形式。保存される値ではなく、
    /// (issuer, email, secret) から決定的に導出される。
    pub fn provisioning_uri(&self, email: &str, secret: &str) -> Result<String, AppError> {
        let totp = self.create_totp(email, secret)?;
        Ok(totp.get_url())
    }

    /// QRコードを生成（PNG形式、Base64エンコード）
    ///
    /// # Arguments
    /// * `email` - ユーザーのメールアドレス（アカウント識別子）
    /// * `secret` - Base32エンコードされたシークレット
    pub fn generate_qr_code(&self, email: &str, secret: &str) -> Result<String, AppError> {
        let totp = self.create_totp(email, secret)?;

        let qr_code = totp.get_qr_base64().map_err(|e| {
            tracing::error!(error = %e, "QRコード生成エラー");
            AppError::Internal(anyhow::anyhow!("qr code generation error"))
        })?;

        Ok(qr_code)
    }

    /// TOTPコードを現在時刻で検証
    ///
    /// # Note
    /// 前後1ステップの時間ウィンドウを許容（±30秒）
    pub fn verify_code(&self, secret: &str, code: &str) -> Result<bool, AppError> {
        let current_time = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map_err(|e| {
                tracing::error!(error = ?e, "システム時刻取得エラー");
                AppError::Internal(anyhow::anyhow!("system time error"))
            })?
            .as_secs();

        self.verify_code_at(secret, code, current_time)
    }

    /// TOTPコードを指定時刻（UNIX秒）で検証
    ///
    /// 形式不正（6桁数字以外）・不一致はエラーではなく false
    pub fn verify_code_at(
        &self,
        secret: &str,
        code: &str,
        timestamp: u64,
    ) -> Result<bool, AppError> {
        // 入力検証: コードは6桁の数字のみ
        if code.len() != TOTP_DIGITS || !code.chars().all(|c| c.is_ascii_digit()) {
            return Ok(false);
        }

        let totp = self.create_totp_for_verify(secret)?;

        // check は内部で skew を考慮して検証
        Ok(totp.check(code, timestamp))
    }

    /// TOTP オブジェクトを作成（QRコード・URI生成用）
    fn create_totp(&self, email: &str, secret: &str) -> Result<TOTP, AppError> {
        self.build_totp(secret, Some(self.issuer.clone()), email.to_string())
    }

    /// TOTP オブジェクトを作成（検証用、ラベル不要）
    fn create_totp_for_verify(&self, secret: &str) -> Result<TOTP, AppError> {
        self.build_totp(secret, None, String::new())
    }

    fn build_totp(
        &self,
        secret: &str,
        issuer: Option<String>,
        account_name: String,
    ) -> Result<TOTP, AppError> {
        let secret_bytes = BASE32.decode(secret.as_bytes()).map_err(|e| {
            tracing::error!(error = ?e, "シークレットのBase32デコードエラー");
            AppError::Internal(anyhow::anyhow!("invalid base32 secret"))
        })?;

        TOTP::new(
            Algorithm::SHA1,
            TOTP_DIGITS,
            TOTP_SKEW,
            TOTP_STEP,
            secret_bytes,
            issuer,
            account_name,
        )
        .map_err(|e| {
            tracing::error!(error = %e, "TOTP作成エラー");
            AppError::Internal(anyhow::anyhow!("totp creation error"))
        })
    }
}
