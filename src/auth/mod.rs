pub mod cookies;
pub mod google;
pub mod handlers;
pub mod password;
pub mod tokens;
