pub mod config;
pub mod error;
pub mod thresholds;
pub mod types;
pub mod util;

pub use config::{Config, Environment};
pub use error::WealthSignalError;
pub use thresholds::Thresholds;
pub use types::*;
pub use util::*;
