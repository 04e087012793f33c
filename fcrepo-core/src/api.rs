//! Error-translating repository API
//!
//! Every transport call passes through [`translate`]:
//! - 404 surfaces as `NotFound`, which callers use to detect resources that
//!   do not exist yet
//! - 401 is logged once at error level and surfaces as `Unauthorized`
//! - every other failure becomes `InvalidRequest` with the transport error
//!   as its cause

use bytes::Bytes;
use std::sync::Arc;
use std::time::Instant;

use crate::error::{FedoraError, Result, TransportError};
use crate::locator::{self, Operation, Params, Request};
use crate::profile::Profile;
use crate::transport::Transport;
use crate::xml::{self, ListedDatastream};

/// Predicate linking an object to its content models
pub const HAS_MODEL: &str = "info:fedora/fedora-system:def/model#hasModel";

/// Map a raw transport outcome onto the error taxonomy
pub fn translate(
    request: &Request,
    outcome: std::result::Result<Bytes, TransportError>,
) -> Result<Bytes> {
    match outcome {
        Ok(body) => Ok(body),
        Err(err) => match err.status() {
            Some(404) => Err(FedoraError::NotFound(err)),
            Some(401) => {
                tracing::error!("Unauthorized at {}", request.target());
                Err(FedoraError::Unauthorized(err))
            }
            _ => Err(FedoraError::InvalidRequest {
                target: request.target(),
                source: err,
            }),
        },
    }
}

/// Fedora REST API client over a transport adapter
#[derive(Clone)]
pub struct RepositoryApi {
    transport: Arc<dyn Transport>,
}

impl std::fmt::Debug for RepositoryApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepositoryApi").finish_non_exhaustive()
    }
}

impl RepositoryApi {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Execute a prepared request through the error translator
    pub async fn execute(&self, request: &Request) -> Result<Bytes> {
        let started = Instant::now();
        let body = translate(request, self.transport.execute(request).await)?;
        tracing::debug!(
            "Loaded {} {} ({:?})",
            request.method,
            request.target(),
            started.elapsed()
        );
        Ok(body)
    }

    /// Build and execute an operation
    pub async fn call(&self, operation: Operation<'_>, params: &Params) -> Result<Bytes> {
        self.execute(&locator::build(operation, params)).await
    }

    async fn call_text(&self, operation: Operation<'_>, params: &Params) -> Result<String> {
        let request = locator::build(operation, params);
        let body = self.execute(&request).await?;
        String::from_utf8(body.to_vec()).map_err(|e| FedoraError::malformed(&request.target(), e))
    }

    async fn call_profile(&self, operation: Operation<'_>, params: &Params) -> Result<Option<Profile>> {
        let request = locator::build(operation, params);
        let body = match self.execute(&request).await {
            Ok(body) => body,
            Err(err) if err.is_not_found() => return Ok(None),
            Err(err) => return Err(err),
        };
        parse_profile_body(&request, &body).map(Some)
    }

    /// Ask the server to mint a new pid
    pub async fn next_pid(&self, namespace: Option<&str>) -> Result<String> {
        let mut params = Params::new();
        if let Some(namespace) = namespace {
            params.insert("namespace".to_string(), namespace.to_string());
        }
        let request = locator::build(Operation::NextPid, &params);
        let body = self.execute(&request).await?;
        let profile = parse_profile_body(&request, &body)?;
        profile
            .text("pid")
            .map(str::to_string)
            .ok_or_else(|| FedoraError::malformed(&request.target(), "pid list without a pid"))
    }

    /// Object profile; `None` when the object does not exist
    pub async fn object_profile(&self, pid: &str, as_of: Option<&str>) -> Result<Option<Profile>> {
        self.call_profile(Operation::Object { pid }, &as_of_params(as_of))
            .await
    }

    /// Create an object; returns the pid assigned by the server
    pub async fn ingest(&self, pid: Option<&str>, params: &Params) -> Result<String> {
        let returned = self.call_text(Operation::Ingest { pid }, params).await?;
        let returned = returned.trim();
        match (returned.is_empty(), pid) {
            (false, _) => Ok(returned.to_string()),
            (true, Some(pid)) => Ok(pid.to_string()),
            (true, None) => Err(FedoraError::malformed("objects/new", "ingest returned no pid")),
        }
    }

    /// Update an object; returns the modification timestamp, if reported
    pub async fn modify_object(&self, pid: &str, params: &Params) -> Result<Option<String>> {
        let body = self.call_text(Operation::ModifyObject { pid }, params).await?;
        let stamp = body.trim();
        Ok((!stamp.is_empty()).then(|| stamp.to_string()))
    }

    pub async fn purge_object(&self, pid: &str) -> Result<()> {
        self.call(Operation::PurgeObject { pid }, &Params::new())
            .await
            .map(|_| ())
    }

    /// Change dates of an object, in the order the server lists them
    pub async fn object_versions(&self, pid: &str) -> Result<Vec<String>> {
        let request = locator::build(Operation::ObjectVersions { pid }, &Params::new());
        let body = self.execute(&request).await?;
        Ok(parse_profile_body(&request, &body)?.values("objectChangeDate"))
    }

    /// Datastream listing; empty when the object does not exist
    pub async fn datastreams(&self, pid: &str, as_of: Option<&str>) -> Result<Vec<ListedDatastream>> {
        let request = locator::build(Operation::Datastreams { pid }, &as_of_params(as_of));
        match self.execute(&request).await {
            Ok(body) => parse_listing_body(&request, &body),
            Err(err) if err.is_not_found() => Ok(Vec::new()),
            Err(err) => Err(err),
        }
    }

    /// Datastream profile; `None` when the datastream does not exist
    pub async fn datastream_profile(
        &self,
        pid: &str,
        dsid: &str,
        as_of: Option<&str>,
    ) -> Result<Option<Profile>> {
        self.call_profile(Operation::Datastream { pid, dsid }, &as_of_params(as_of))
            .await
    }

    pub async fn datastream_content(&self, pid: &str, dsid: &str, as_of: Option<&str>) -> Result<Bytes> {
        self.call(Operation::DatastreamContent { pid, dsid }, &as_of_params(as_of))
            .await
    }

    /// Historical profiles of a datastream; empty when there is no history
    pub async fn datastream_history(&self, pid: &str, dsid: &str) -> Result<Vec<ListedDatastream>> {
        let request = locator::build(Operation::DatastreamHistory { pid, dsid }, &Params::new());
        match self.execute(&request).await {
            Ok(body) => parse_listing_body(&request, &body),
            Err(err) if err.is_not_found() => Ok(Vec::new()),
            Err(err) => Err(err),
        }
    }

    /// Create a datastream; returns the new datastream profile body
    pub async fn add_datastream(
        &self,
        pid: &str,
        dsid: &str,
        params: &Params,
        content: Option<Bytes>,
    ) -> Result<Bytes> {
        let request = with_content(locator::build(Operation::AddDatastream { pid, dsid }, params), content);
        self.execute(&request).await
    }

    /// Update a datastream; returns the updated datastream profile body
    pub async fn modify_datastream(
        &self,
        pid: &str,
        dsid: &str,
        params: &Params,
        content: Option<Bytes>,
    ) -> Result<Bytes> {
        let request = with_content(
            locator::build(Operation::ModifyDatastream { pid, dsid }, params),
            content,
        );
        self.execute(&request).await
    }

    pub async fn purge_datastream(&self, pid: &str, dsid: &str) -> Result<()> {
        self.call(Operation::PurgeDatastream { pid, dsid }, &Params::new())
            .await
            .map(|_| ())
    }

    pub async fn add_relationship(&self, pid: &str, predicate: &str, object: &str) -> Result<()> {
        self.call(Operation::AddRelationship { pid }, &relationship_params(pid, predicate, object))
            .await
            .map(|_| ())
    }

    pub async fn purge_relationship(&self, pid: &str, predicate: &str, object: &str) -> Result<()> {
        self.call(Operation::PurgeRelationship { pid }, &relationship_params(pid, predicate, object))
            .await
            .map(|_| ())
    }
}

/// Subject URI of an object
pub fn object_uri(pid: &str) -> String {
    format!("info:fedora/{}", pid)
}

fn as_of_params(as_of: Option<&str>) -> Params {
    let mut params = Params::new();
    if let Some(as_of) = as_of {
        params.insert("asOfDateTime".to_string(), as_of.to_string());
    }
    params
}

fn relationship_params(pid: &str, predicate: &str, object: &str) -> Params {
    let mut params = Params::new();
    params.insert("subject".to_string(), object_uri(pid));
    params.insert("predicate".to_string(), predicate.to_string());
    params.insert("object".to_string(), object.to_string());
    params
}

fn with_content(request: Request, content: Option<Bytes>) -> Request {
    match content {
        Some(content) => {
            let mime = request
                .param("mimeType")
                .unwrap_or("application/octet-stream")
                .to_string();
            request.with_body(content, mime)
        }
        None => request,
    }
}

fn body_text<'a>(request: &Request, body: &'a Bytes) -> Result<&'a str> {
    std::str::from_utf8(body).map_err(|e| FedoraError::malformed(&request.target(), e))
}

fn parse_profile_body(request: &Request, body: &Bytes) -> Result<Profile> {
    xml::flatten_profile(body_text(request, body)?)
        .map_err(|e| FedoraError::malformed(&request.target(), e))
}

fn parse_listing_body(request: &Request, body: &Bytes) -> Result<Vec<ListedDatastream>> {
    xml::parse_datastream_listing(body_text(request, body)?)
        .map_err(|e| FedoraError::malformed(&request.target(), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locator::Method;
    use std::error::Error;

    fn request() -> Request {
        locator::build(Operation::Datastream { pid: "mypid", dsid: "aaa" }, &Params::new())
    }

    fn status(code: u16) -> TransportError {
        TransportError::Status {
            status: code,
            target: request().target(),
            body: String::new(),
        }
    }

    #[test]
    fn test_success_passes_body_through() {
        let body = translate(&request(), Ok(Bytes::from_static(b"<x/>"))).unwrap();
        assert_eq!(body.as_ref(), b"<x/>");
    }

    #[test]
    fn test_not_found_is_preserved() {
        match translate(&request(), Err(status(404))) {
            Err(FedoraError::NotFound(inner)) => assert_eq!(inner, status(404)),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_unauthorized_is_preserved() {
        match translate(&request(), Err(status(401))) {
            Err(FedoraError::Unauthorized(inner)) => assert_eq!(inner.status(), Some(401)),
            other => panic!("unexpected {:?}", other),
        }
    }

    type Events = std::sync::Arc<std::sync::Mutex<Vec<(tracing::Level, String)>>>;

    struct Capture(Events);

    struct MessageVisitor<'a>(&'a mut String);

    impl tracing::field::Visit for MessageVisitor<'_> {
        fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
            if field.name() == "message" {
                *self.0 = format!("{:?}", value);
            }
        }
    }

    impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for Capture {
        fn on_event(
            &self,
            event: &tracing::Event<'_>,
            _ctx: tracing_subscriber::layer::Context<'_, S>,
        ) {
            let mut message = String::new();
            event.record(&mut MessageVisitor(&mut message));
            self.0.lock().unwrap().push((*event.metadata().level(), message));
        }
    }

    #[test]
    fn test_unauthorized_logs_target() {
        use tracing_subscriber::layer::SubscriberExt;

        let events = Events::default();
        let subscriber = tracing_subscriber::registry().with(Capture(events.clone()));
        let result = tracing::subscriber::with_default(subscriber, || {
            translate(&request(), Err(status(401)))
        });
        assert!(matches!(result, Err(FedoraError::Unauthorized(_))));

        let events = events.lock().unwrap();
        let errors: Vec<_> = events
            .iter()
            .filter(|(level, _)| *level == tracing::Level::ERROR)
            .collect();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].1.contains("Unauthorized at objects/mypid/datastreams/aaa"));
    }

    #[test]
    fn test_not_found_is_not_logged_as_error() {
        use tracing_subscriber::layer::SubscriberExt;

        let events = Events::default();
        let subscriber = tracing_subscriber::registry().with(Capture(events.clone()));
        tracing::subscriber::with_default(subscriber, || {
            let _ = translate(&request(), Err(status(404)));
        });
        assert!(events
            .lock()
            .unwrap()
            .iter()
            .all(|(level, _)| *level != tracing::Level::ERROR));
    }

    #[test]
    fn test_other_failures_collapse_to_invalid_request() {
        let failures = vec![
            status(500),
            status(409),
            TransportError::Connection {
                target: "x".to_string(),
                message: "refused".to_string(),
            },
            TransportError::Malformed {
                target: "x".to_string(),
                message: "bad".to_string(),
            },
        ];
        for failure in failures {
            let err = translate(&request(), Err(failure.clone())).unwrap_err();
            assert!(matches!(err, FedoraError::InvalidRequest { .. }));
            let cause = err.source().unwrap().downcast_ref::<TransportError>().unwrap();
            assert_eq!(cause, &failure);
        }
    }

    #[test]
    fn test_relationship_params() {
        let params = relationship_params("mypid", HAS_MODEL, "asdf");
        assert_eq!(params.get("subject"), Some(&"info:fedora/mypid".to_string()));
        assert_eq!(params.get("predicate"), Some(&HAS_MODEL.to_string()));
        assert_eq!(params.get("object"), Some(&"asdf".to_string()));
    }

    #[test]
    fn test_content_uses_declared_mime_type() {
        let mut params = Params::new();
        params.insert("mimeType".to_string(), "image/tiff".to_string());
        let req = with_content(
            locator::build(Operation::AddDatastream { pid: "p", dsid: "d" }, &params),
            Some(Bytes::from_static(b"x")),
        );
        assert_eq!(req.method, Method::Post);
        assert_eq!(req.content_type.as_deref(), Some("image/tiff"));

        let req = with_content(
            locator::build(Operation::AddDatastream { pid: "p", dsid: "d" }, &Params::new()),
            Some(Bytes::from_static(b"x")),
        );
        assert_eq!(req.content_type.as_deref(), Some("application/octet-stream"));
    }
}
