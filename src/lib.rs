pub mod api;
pub mod config;
pub mod error;
pub mod errors;
pub mod models;

pub use config::Config;
pub use error::{GenerationError, NativeError, Result};
pub use errors::AppError;
