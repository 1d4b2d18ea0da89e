pub mod config;
pub mod error;
pub mod types;

pub use config::TercihConfig;
pub use error::{Result, TercihError};
pub use types::*;
