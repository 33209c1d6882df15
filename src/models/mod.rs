pub mod session;
pub mod two_factor_secret;
pub mod user;

pub use session::DeviceSession;
pub use two_factor_secret::TwoFactorSecret;
pub use user::{User, UserSessionView, UserView};
