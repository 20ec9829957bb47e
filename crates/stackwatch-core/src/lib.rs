//! stackwatch-core — shared model, configuration and HTTP plumbing.
//!
//! Every other stackwatch crate builds on the types defined here:
//! [`ServiceSpec`] and [`ServiceStatus`] for readiness checks,
//! [`ValidationResult`] for metric validation and [`LoadReport`] for
//! synthetic traffic.

pub mod config;
pub mod error;
pub mod http;
pub mod order;
pub mod types;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use config::{StackConfig, DEFAULT_CONFIG_FILE};
pub use error::{ConfigError, ConfigResult, TransportError};
pub use order::plan_startup_order;
pub use types::*;
