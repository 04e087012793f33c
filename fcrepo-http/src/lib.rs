//! HTTP access to a Fedora Commons repository
//!
//! Pairs the core object model with a reqwest transport and a client
//! configuration loaded from TOML and the environment.

pub mod config;
pub mod transport;

pub use config::{ClientConfig, ConfigError};
pub use transport::HttpTransport;

use fcrepo_core::RepositoryApi;
use std::sync::Arc;

/// Repository API over HTTP for the given configuration
pub fn connect(config: &ClientConfig) -> anyhow::Result<Arc<RepositoryApi>> {
    let transport = HttpTransport::new(config)?;
    tracing::debug!("Connecting to {}", transport.base_url());
    Ok(Arc::new(RepositoryApi::new(Arc::new(transport))))
}
