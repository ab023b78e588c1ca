pub mod handler;
pub mod outbound;
