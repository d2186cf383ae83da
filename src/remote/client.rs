// ABOUTME: HTTP transport and auxiliary backend calls (connection test, table listing, queries)
// ABOUTME: Every call goes through the retrying invoker; the transport only moves bytes

use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::models::{ConnectionTestResponse, QueryResponse, TablesResponse};
use super::retry::RetryingInvoker;
use crate::connection::{ConnectionConfigResolver, ConnectionDescriptor};
use crate::error::{DiffError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// One outbound backend request, relative to the API base URL.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestSpec {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
}

impl RequestSpec {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            path: path.into(),
            body: None,
        }
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::Post,
            path: path.into(),
            body: Some(body),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_str(&self.body).map_err(|e| {
            DiffError::InvalidPayload(format!("backend returned unparseable JSON: {}", e))
        })
    }
}

/// A request that produced no HTTP response at all.
#[derive(Debug, Clone, PartialEq)]
pub enum NetworkFailure {
    Timeout(String),
    Connect(String),
    Other(String),
}

impl NetworkFailure {
    pub fn message(&self) -> &str {
        match self {
            NetworkFailure::Timeout(msg) | NetworkFailure::Connect(msg) | NetworkFailure::Other(msg) => {
                msg
            }
        }
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Returns any HTTP response, successful or not; only failures to obtain
    /// a response are errors.
    async fn send(&self, request: &RequestSpec) -> std::result::Result<HttpResponse, NetworkFailure>;
}

pub struct HttpTransport {
    client: Client,
    api_base_url: String,
}

impl HttpTransport {
    pub fn new(api_base_url: String, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.api_base_url
    }
}

/// Joins an error with its causes, leaving out the request URL.
fn describe(err: reqwest::Error) -> String {
    let err = err.without_url();
    let mut message = err.to_string();
    let mut source = std::error::Error::source(&err);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &RequestSpec) -> std::result::Result<HttpResponse, NetworkFailure> {
        let url = format!("{}{}", self.api_base_url, request.path);
        debug!("{:?} {}", request.method, url);

        let builder = match request.method {
            Method::Get => self.client.get(&url),
            Method::Post => self.client.post(&url),
        };
        let builder = match &request.body {
            Some(body) => builder.json(body),
            None => builder,
        };

        let response = builder.send().await.map_err(|e| {
            warn!("{:?} {} failed", request.method, url);
            if e.is_timeout() {
                NetworkFailure::Timeout(describe(e))
            } else if e.is_connect() {
                NetworkFailure::Connect(describe(e))
            } else {
                NetworkFailure::Other(describe(e))
            }
        })?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                NetworkFailure::Timeout(describe(e))
            } else {
                NetworkFailure::Other(describe(e))
            }
        })?;
        Ok(HttpResponse { status, body })
    }
}

/// Outcome of `POST /connections/test`.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ConnectionTestOutcome {
    pub success: bool,
    pub message: Option<String>,
}

/// Backend calls that are not part of a comparison job.
#[derive(Clone)]
pub struct BackendClient {
    invoker: RetryingInvoker,
    resolver: ConnectionConfigResolver,
}

impl BackendClient {
    pub fn new(invoker: RetryingInvoker, resolver: ConnectionConfigResolver) -> Self {
        Self { invoker, resolver }
    }

    pub async fn test_connection(&self, descriptor: &ConnectionDescriptor) -> Result<ConnectionTestOutcome> {
        let config = self.resolver.to_canonical(descriptor)?;
        let response = self
            .invoker
            .invoke(&RequestSpec::post("/connections/test", config.to_json()))
            .await?;
        let parsed: ConnectionTestResponse = response.json()?;
        info!(
            "Connection test for {} {}",
            config.database_type,
            if parsed.success { "succeeded" } else { "failed" }
        );
        Ok(ConnectionTestOutcome {
            success: parsed.success,
            message: parsed.message,
        })
    }

    pub async fn list_tables(&self, descriptor: &ConnectionDescriptor, schema: Option<&str>) -> Result<Vec<String>> {
        let config = self.resolver.to_canonical(descriptor)?;
        let schema = schema.unwrap_or_else(|| config.schema()).to_string();
        let mut body = config.to_json();
        if let Value::Object(map) = &mut body {
            map.insert("schema".to_string(), Value::String(schema));
        }
        let response = self
            .invoker
            .invoke(&RequestSpec::post("/tables/list", body))
            .await?;
        let parsed: TablesResponse = response.json()?;
        Ok(parsed.tables)
    }

    pub async fn execute_query(&self, descriptor: &ConnectionDescriptor, query: &str) -> Result<Value> {
        let config = self.resolver.to_canonical(descriptor)?;
        let body = json!({ "connection": config.to_json(), "query": query });
        let response = self
            .invoker
            .invoke(&RequestSpec::post("/query/execute", body))
            .await?;
        let parsed: QueryResponse = response.json()?;
        if !parsed.success {
            return Err(DiffError::Permanent {
                status: None,
                message: parsed
                    .error
                    .unwrap_or_else(|| "query failed without an error message".to_string()),
            });
        }
        Ok(parsed.result.unwrap_or(Value::Null))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::retry::{classify, ErrorClass, Failure, RetryPolicy};
    use crate::remote::testing::ScriptedTransport;
    use std::sync::Arc;

    fn client(transport: Arc<ScriptedTransport>) -> BackendClient {
        let invoker = RetryingInvoker::new(transport, RetryPolicy::immediate(0));
        BackendClient::new(invoker, ConnectionConfigResolver::default())
    }

    fn postgres() -> ConnectionDescriptor {
        crate::connection::url::parse_url("postgresql://u:p@h:5432/db").unwrap()
    }

    #[test]
    fn test_transport_creation() {
        let transport = HttpTransport::new("https://api.example.com/".to_string(), Duration::from_secs(30));
        assert!(transport.is_ok());
        assert_eq!(transport.unwrap().base_url(), "https://api.example.com");
    }

    #[tokio::test]
    async fn test_network_failure_text_omits_request_url() {
        let transport = HttpTransport::new("http://127.0.0.1:1".to_string(), Duration::from_secs(5)).unwrap();
        let failure = transport
            .send(&RequestSpec::get("/forbidden/not-found"))
            .await
            .unwrap_err();
        assert!(!failure.message().contains("forbidden"), "{}", failure.message());
        assert!(!failure.message().contains("not-found"), "{}", failure.message());
        assert_eq!(classify(&Failure::Network(failure)), ErrorClass::Retryable);
    }

    #[tokio::test]
    async fn test_connection_test_posts_canonical_config() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_json(200, json!({"success": true, "message": "ok"}));
        let outcome = client(transport.clone()).test_connection(&postgres()).await.unwrap();
        assert!(outcome.success);

        let sent = transport.requests();
        assert_eq!(sent[0].path, "/connections/test");
        assert_eq!(sent[0].body.as_ref().unwrap()["database_type"], "postgresql");
    }

    #[tokio::test]
    async fn test_list_tables_sends_default_schema() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_json(200, json!({"tables": ["orders", "customers"]}));
        let tables = client(transport.clone()).list_tables(&postgres(), None).await.unwrap();
        assert_eq!(tables, vec!["orders", "customers"]);
        assert_eq!(transport.requests()[0].body.as_ref().unwrap()["schema"], "public");
    }

    #[tokio::test]
    async fn test_query_failure_is_permanent() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_json(200, json!({"success": false, "error": "relation does not exist"}));
        let err = client(transport).execute_query(&postgres(), "select 1").await.unwrap_err();
        assert!(err.to_string().contains("relation does not exist"));
    }

    #[tokio::test]
    async fn test_missing_field_fails_before_network() {
        let transport = Arc::new(ScriptedTransport::new());
        let incomplete = ConnectionDescriptor::new("postgresql").with("host", "h");
        let err = client(transport.clone()).test_connection(&incomplete).await.unwrap_err();
        assert!(matches!(err, DiffError::MissingConnectionField { .. }));
        assert!(transport.requests().is_empty());
    }
}
