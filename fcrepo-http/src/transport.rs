//! reqwest-backed transport

use async_trait::async_trait;
use bytes::Bytes;
use fcrepo_core::{Method, Request, Transport, TransportError};
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;

use crate::config::ClientConfig;

/// HTTP transport for a Fedora REST endpoint
#[derive(Debug, Clone)]
pub struct HttpTransport {
    base: reqwest::Url,
    http: reqwest::Client,
    user: Option<String>,
    password: Option<String>,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> anyhow::Result<Self> {
        let base = config.base_url()?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            base,
            http,
            user: config.user.clone(),
            password: config.password.clone(),
        })
    }

    pub fn base_url(&self) -> &reqwest::Url {
        &self.base
    }

    /// Absolute URL of a request, without its query
    pub fn url_for(&self, request: &Request) -> Result<reqwest::Url, TransportError> {
        self.base
            .join(&request.path)
            .map_err(|e| TransportError::Malformed {
                target: request.target(),
                message: e.to_string(),
            })
    }
}

fn http_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Delete => reqwest::Method::DELETE,
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: &Request) -> Result<Bytes, TransportError> {
        let target = request.target();
        let url = self.url_for(request)?;
        tracing::debug!("{} {}", request.method, url);

        let mut builder = self
            .http
            .request(http_method(request.method), url)
            .query(&request.query);
        if let Some(user) = &self.user {
            builder = builder.basic_auth(user, self.password.as_ref());
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
            if let Some(content_type) = &request.content_type {
                builder = builder.header(CONTENT_TYPE, content_type);
            }
        }

        let resp = builder
            .send()
            .await
            .map_err(|e| TransportError::Connection {
                target: target.clone(),
                message: e.to_string(),
            })?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                status: status.as_u16(),
                target,
                body,
            });
        }
        resp.bytes().await.map_err(|e| TransportError::Malformed {
            target,
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fcrepo_core::locator::{self, Operation, Params};

    #[test]
    fn test_urls_are_relative_to_base() {
        let config = ClientConfig {
            url: "http://localhost:8080/fedora".to_string(),
            ..ClientConfig::default()
        };
        let transport = HttpTransport::new(&config).unwrap();
        let request = locator::build(
            Operation::DatastreamContent { pid: "test:1", dsid: "DC" },
            &Params::new(),
        );
        assert_eq!(
            transport.url_for(&request).unwrap().as_str(),
            "http://localhost:8080/fedora/objects/test:1/datastreams/DC/content"
        );
    }

    #[test]
    fn test_method_mapping() {
        assert_eq!(http_method(Method::Get), reqwest::Method::GET);
        assert_eq!(http_method(Method::Delete), reqwest::Method::DELETE);
    }

    #[tokio::test]
    async fn test_unreachable_server_is_connection_error() {
        let config = ClientConfig {
            url: "http://127.0.0.1:1/fedora".to_string(),
            timeout_secs: 5,
            ..ClientConfig::default()
        };
        let transport = HttpTransport::new(&config).unwrap();
        let request = locator::build(Operation::Object { pid: "test:1" }, &Params::new());
        let err = transport.execute(&request).await.unwrap_err();
        assert!(matches!(err, TransportError::Connection { .. }));
    }
}
