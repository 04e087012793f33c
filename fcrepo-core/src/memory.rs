//! In-memory transport with scripted responses
//!
//! Routes are keyed by method and path. Queued replies are consumed in
//! order; the last reply of a route keeps answering. Unrouted requests get a
//! 404, like a repository that holds nothing. Every request is recorded.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use crate::error::TransportError;
use crate::locator::{Method, Request};
use crate::transport::Transport;

#[derive(Debug, Clone)]
enum Reply {
    Body(Bytes),
    Status(u16, String),
    Connection(String),
}

#[derive(Debug, Default)]
pub struct MemoryTransport {
    routes: Mutex<HashMap<(Method, String), VecDeque<Reply>>>,
    log: Mutex<Vec<Request>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `method path` with a body
    pub fn respond(&self, method: Method, path: &str, body: impl Into<Bytes>) -> &Self {
        self.push(method, path, Reply::Body(body.into()))
    }

    /// Answer `method path` with an HTTP error status
    pub fn fail(&self, method: Method, path: &str, status: u16) -> &Self {
        self.push(method, path, Reply::Status(status, String::new()))
    }

    /// Answer `method path` with a connection-level fault
    pub fn disconnect(&self, method: Method, path: &str) -> &Self {
        self.push(method, path, Reply::Connection("connection reset".to_string()))
    }

    /// Every request executed so far
    pub fn requests(&self) -> Vec<Request> {
        lock(&self.log).clone()
    }

    /// Requests executed against `method path`
    pub fn requests_to(&self, method: Method, path: &str) -> Vec<Request> {
        lock(&self.log)
            .iter()
            .filter(|r| r.method == method && r.path == path)
            .cloned()
            .collect()
    }

    pub fn count(&self, method: Method, path: &str) -> usize {
        self.requests_to(method, path).len()
    }

    fn push(&self, method: Method, path: &str, reply: Reply) -> &Self {
        lock(&self.routes)
            .entry((method, path.to_string()))
            .or_default()
            .push_back(reply);
        self
    }

    fn next_reply(&self, request: &Request) -> Option<Reply> {
        let mut routes = lock(&self.routes);
        let queue = routes.get_mut(&(request.method, request.path.clone()))?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn execute(&self, request: &Request) -> Result<Bytes, TransportError> {
        lock(&self.log).push(request.clone());
        let target = request.target();

        match self.next_reply(request) {
            Some(Reply::Body(body)) => Ok(body),
            Some(Reply::Status(status, body)) => Err(TransportError::Status { status, target, body }),
            Some(Reply::Connection(message)) => Err(TransportError::Connection { target, message }),
            None => Err(TransportError::Status {
                status: 404,
                target,
                body: "Not Found".to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locator::{self, Operation, Params};

    #[tokio::test]
    async fn test_replies_are_consumed_in_order() {
        let transport = MemoryTransport::new();
        transport
            .respond(Method::Get, "objects/a", "first")
            .respond(Method::Get, "objects/a", "second");
        let req = locator::build(Operation::Object { pid: "a" }, &Params::new());

        assert_eq!(transport.execute(&req).await.unwrap().as_ref(), b"first");
        assert_eq!(transport.execute(&req).await.unwrap().as_ref(), b"second");
        assert_eq!(transport.execute(&req).await.unwrap().as_ref(), b"second");
        assert_eq!(transport.count(Method::Get, "objects/a"), 3);
    }

    #[tokio::test]
    async fn test_unrouted_requests_are_not_found() {
        let transport = MemoryTransport::new();
        let req = locator::build(Operation::Object { pid: "missing" }, &Params::new());
        let err = transport.execute(&req).await.unwrap_err();
        assert_eq!(err.status(), Some(404));
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_scripted_failures() {
        let transport = MemoryTransport::new();
        transport.fail(Method::Put, "objects/a", 500);
        transport.disconnect(Method::Delete, "objects/a");

        let put = locator::build(Operation::ModifyObject { pid: "a" }, &Params::new());
        assert_eq!(transport.execute(&put).await.unwrap_err().status(), Some(500));

        let delete = locator::build(Operation::PurgeObject { pid: "a" }, &Params::new());
        let err = transport.execute(&delete).await.unwrap_err();
        assert!(matches!(err, TransportError::Connection { .. }));
    }
}
