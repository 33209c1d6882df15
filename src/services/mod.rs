pub mod auth;
pub mod secrets;
pub mod totp;

pub use auth::AuthService;
pub use secrets::SecretRegistry;
pub use totp::TotpService;
