pub mod base;
pub mod consultation;
pub mod user;

pub use base::BaseDao;
