pub mod password;
pub mod registration;
pub mod session;

pub use password::{
    check_mobile_code, new_password, request_mobile_code, request_reset, validate_reset_token,
};
pub use registration::{confirm_registration, register};
pub use session::{login, logout, refresh, verify_token};
