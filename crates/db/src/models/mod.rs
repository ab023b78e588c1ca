pub mod consultation;
pub mod user;

pub use consultation::*;
pub use user::User;
