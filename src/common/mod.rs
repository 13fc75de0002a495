//! Common module
//!
//! Shared error types and logging setup.

pub mod error;
pub mod log;

pub use error::{FactoryError, Result};
pub use self::log::init_logger;
