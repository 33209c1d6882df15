pub mod device;
pub mod health;
pub mod login;
pub mod logout;
pub mod two_factor;
pub mod user;

pub use health::health_check;
pub use login::login;
pub use logout::logout;
pub use two_factor::{get_2fa_qr_code, setup_2fa, verify_2fa};
pub use user::get_user;
