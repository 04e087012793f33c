//! Transport adapter interface
//!
//! All network access goes through this trait so the object model can be
//! driven by an in-memory implementation in tests.

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::TransportError;
use crate::locator::Request;

/// Executes a request and returns the raw response body
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fails with a [`TransportError`] on non-2xx responses or connection faults
    async fn execute(&self, request: &Request) -> Result<Bytes, TransportError>;
}
