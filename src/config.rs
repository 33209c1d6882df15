use secrecy::SecretBox;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub database_url: SecretBox<String>,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,

    // 2FA (TOTP) 設定
    /// TOTP発行者名（認証アプリとQRコードに表示されるサービスラベル）
    #[serde(default = "default_totp_issuer")]
    pub totp_issuer: String,
    /// AES-256暗号化キー（Base64エンコード、32バイト）
    pub encryption_key: SecretBox<String>,
}

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8017;
const DEFAULT_TOTP_ISSUER: &str = "2FA-Demo (Dev)";

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_totp_issuer() -> String {
    DEFAULT_TOTP_ISSUER.to_string()
}

impl Config {
    pub fn load() -> Result<Self, envy::Error> {
        envy::from_env()
    }
}
