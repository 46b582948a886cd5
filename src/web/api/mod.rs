pub mod error;
pub mod telescope;
