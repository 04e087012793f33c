//! Request descriptors for the Fedora 3 REST API
//!
//! `build` is a pure function of its inputs: the same operation and
//! parameters always produce the same request.

use bytes::Bytes;
use std::collections::BTreeMap;
use std::fmt;

/// Query parameters, kept sorted so request targets are deterministic
pub type Params = BTreeMap<String, String>;

/// HTTP method of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request ready for a transport adapter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: Method,
    /// Path relative to the repository base URL
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Bytes>,
    pub content_type: Option<String>,
}

impl Request {
    fn new(method: Method, path: String) -> Self {
        Self {
            method,
            path,
            query: Vec::new(),
            body: None,
            content_type: None,
        }
    }

    /// Attach a payload
    pub fn with_body(mut self, body: Bytes, content_type: impl Into<String>) -> Self {
        self.body = Some(body);
        self.content_type = Some(content_type.into());
        self
    }

    /// Value of a query parameter
    pub fn param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Path plus query string, used in logs and error messages
    pub fn target(&self) -> String {
        if self.query.is_empty() {
            return self.path.clone();
        }
        let query: Vec<String> = self
            .query
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        format!("{}?{}", self.path, query.join("&"))
    }
}

/// Logical repository operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation<'a> {
    NextPid,
    Object { pid: &'a str },
    /// Ingest a new object; without a pid the server mints one
    Ingest { pid: Option<&'a str> },
    ModifyObject { pid: &'a str },
    PurgeObject { pid: &'a str },
    ObjectVersions { pid: &'a str },
    Datastreams { pid: &'a str },
    Datastream { pid: &'a str, dsid: &'a str },
    DatastreamContent { pid: &'a str, dsid: &'a str },
    DatastreamHistory { pid: &'a str, dsid: &'a str },
    AddDatastream { pid: &'a str, dsid: &'a str },
    ModifyDatastream { pid: &'a str, dsid: &'a str },
    PurgeDatastream { pid: &'a str, dsid: &'a str },
    AddRelationship { pid: &'a str },
    PurgeRelationship { pid: &'a str },
}

/// Build the request for an operation
pub fn build(operation: Operation<'_>, params: &Params) -> Request {
    use Operation::*;

    let (method, path, xml_format) = match operation {
        NextPid => (Method::Post, "objects/nextPID".to_string(), true),
        Object { pid } => (Method::Get, object_path(pid), true),
        Ingest { pid: Some(pid) } => (Method::Post, object_path(pid), false),
        Ingest { pid: None } => (Method::Post, "objects/new".to_string(), false),
        ModifyObject { pid } => (Method::Put, object_path(pid), false),
        PurgeObject { pid } => (Method::Delete, object_path(pid), false),
        ObjectVersions { pid } => (Method::Get, format!("{}/versions", object_path(pid)), true),
        Datastreams { pid } => (Method::Get, format!("{}/datastreams", object_path(pid)), true),
        Datastream { pid, dsid } => (Method::Get, datastream_path(pid, dsid), true),
        DatastreamContent { pid, dsid } => (
            Method::Get,
            format!("{}/content", datastream_path(pid, dsid)),
            false,
        ),
        DatastreamHistory { pid, dsid } => (
            Method::Get,
            format!("{}/history", datastream_path(pid, dsid)),
            true,
        ),
        AddDatastream { pid, dsid } => (Method::Post, datastream_path(pid, dsid), false),
        ModifyDatastream { pid, dsid } => (Method::Put, datastream_path(pid, dsid), false),
        PurgeDatastream { pid, dsid } => (Method::Delete, datastream_path(pid, dsid), false),
        AddRelationship { pid } => (
            Method::Post,
            format!("{}/relationships/new", object_path(pid)),
            false,
        ),
        PurgeRelationship { pid } => (
            Method::Delete,
            format!("{}/relationships", object_path(pid)),
            false,
        ),
    };

    let mut request = Request::new(method, path);
    let mut query = params.clone();
    if xml_format {
        query.insert("format".to_string(), "xml".to_string());
    }
    if matches!(operation, Datastreams { .. }) {
        query.insert("profiles".to_string(), "true".to_string());
    }
    request.query = query.into_iter().collect();
    request
}

fn object_path(pid: &str) -> String {
    format!("objects/{}", pid)
}

fn datastream_path(pid: &str, dsid: &str) -> String {
    format!("objects/{}/datastreams/{}", pid, dsid)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> Params {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_object_profile_request() {
        let req = build(Operation::Object { pid: "z" }, &Params::new());
        assert_eq!(req.method, Method::Get);
        assert_eq!(req.target(), "objects/z?format=xml");
    }

    #[test]
    fn test_ingest_with_and_without_pid() {
        let minted = build(Operation::Ingest { pid: None }, &Params::new());
        assert_eq!(minted.path, "objects/new");

        let named = build(Operation::Ingest { pid: Some("mypid") }, &Params::new());
        assert_eq!(named.method, Method::Post);
        assert_eq!(named.path, "objects/mypid");
    }

    #[test]
    fn test_modify_object_carries_params() {
        let req = build(
            Operation::ModifyObject { pid: "mypid" },
            &params(&[("state", "Z"), ("label", "x")]),
        );
        assert_eq!(req.method, Method::Put);
        assert_eq!(req.param("state"), Some("Z"));
        assert_eq!(req.target(), "objects/mypid?label=x&state=Z");
    }

    #[test]
    fn test_datastream_listing_requests_profiles() {
        let req = build(
            Operation::Datastreams { pid: "mypid" },
            &params(&[("asOfDateTime", "2011-09-26T20:41:02.450Z")]),
        );
        assert_eq!(req.path, "objects/mypid/datastreams");
        assert_eq!(req.param("profiles"), Some("true"));
        assert_eq!(req.param("format"), Some("xml"));
        assert_eq!(req.param("asOfDateTime"), Some("2011-09-26T20:41:02.450Z"));
    }

    #[test]
    fn test_datastream_paths() {
        let none = Params::new();
        assert_eq!(
            build(Operation::DatastreamContent { pid: "p", dsid: "aaa" }, &none).path,
            "objects/p/datastreams/aaa/content"
        );
        assert_eq!(
            build(Operation::DatastreamHistory { pid: "p", dsid: "aaa" }, &none).target(),
            "objects/p/datastreams/aaa/history?format=xml"
        );
        assert_eq!(
            build(Operation::PurgeDatastream { pid: "p", dsid: "aaa" }, &none).method,
            Method::Delete
        );
    }

    #[test]
    fn test_relationship_requests() {
        let add = build(
            Operation::AddRelationship { pid: "mypid" },
            &params(&[("subject", "z")]),
        );
        assert_eq!(add.target(), "objects/mypid/relationships/new?subject=z");

        let purge = build(
            Operation::PurgeRelationship { pid: "mypid" },
            &params(&[("subject", "z")]),
        );
        assert_eq!(purge.method, Method::Delete);
        assert_eq!(purge.target(), "objects/mypid/relationships?subject=z");
    }

    #[test]
    fn test_build_is_deterministic() {
        let p = params(&[("b", "2"), ("a", "1")]);
        let first = build(Operation::ModifyDatastream { pid: "p", dsid: "d" }, &p);
        let second = build(Operation::ModifyDatastream { pid: "p", dsid: "d" }, &p);
        assert_eq!(first, second);
    }
}
