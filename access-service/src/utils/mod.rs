pub mod password;
pub mod validation;

pub use password::{
    check_password_strength, hash_password, password_fingerprint, verify_password, Password,
    PasswordHashString,
};
pub use validation::{
    client_account_id_from_query, parse_client_account_id, JsonBody, ValidatedJson,
};
