pub mod auth;
pub mod dao;

pub use auth::AuthService;
pub use dao::*;
