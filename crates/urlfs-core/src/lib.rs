//! urlfs core - Foundation types for the URL-addressed file system layer
//!
//! Provides the cancellation/deadline [`Context`] threaded through every
//! blocking call, the shared error type, and configuration.

pub mod config;
pub mod context;
pub mod error;

pub use config::{LocalConfig, UrlfsConfig};
pub use context::Context;
pub use error::{Error, Operation, Result};
