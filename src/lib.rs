// ABOUTME: Library root for diffbridge, the layer between workflow nodes and a data-comparison backend
// ABOUTME: Wires resolver, extractor, invoker, job client, retriever and summarizer from one config

pub mod comparison;
pub mod config;
pub mod connection;
pub mod error;
pub mod extract;
pub mod remote;
pub mod results;
pub mod schema_diff;

pub use comparison::{ComparisonJobClient, ComparisonSide, JobHandle, SchemaSubmission, TableComparisonOptions};
pub use config::AppConfig;
pub use connection::{ConnectionConfigResolver, ConnectionDescriptor, Dialect, TableReference};
pub use error::{DiffError, Result, Side};
pub use extract::UpstreamConfigExtractor;
pub use remote::{BackendClient, HttpTransport, RetryingInvoker, Transport};
pub use results::{ComparisonOutcome, ComparisonResult, ComparisonResultRetriever, FetchOutcome};
pub use schema_diff::{SchemaDiffSummarizer, SchemaDiffSummary};

use anyhow::Context;
use std::sync::Arc;

use config::PollingConfig;

/// Every component, sharing one invoker and one set of resolver defaults.
pub struct DiffBridge {
    resolver: ConnectionConfigResolver,
    extractor: UpstreamConfigExtractor,
    backend: BackendClient,
    jobs: ComparisonJobClient,
    retriever: ComparisonResultRetriever,
    summarizer: SchemaDiffSummarizer,
    polling: PollingConfig,
}

impl DiffBridge {
    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        config.validate().context("Invalid configuration")?;
        let transport = HttpTransport::new(config.backend.base_url.clone(), config.request_timeout())?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    pub fn with_transport(config: &AppConfig, transport: Arc<dyn Transport>) -> Self {
        let resolver = ConnectionConfigResolver::new(config.resolver.clone());
        let invoker = RetryingInvoker::new(transport, config.retry.policy());
        Self {
            extractor: UpstreamConfigExtractor::new(resolver.clone()),
            backend: BackendClient::new(invoker.clone(), resolver.clone()),
            jobs: ComparisonJobClient::new(invoker.clone(), resolver.clone())
                .with_callback_base_url(config.backend.callback_base_url.clone()),
            retriever: ComparisonResultRetriever::new(invoker),
            summarizer: SchemaDiffSummarizer::new(),
            polling: config.polling.clone(),
            resolver,
        }
    }

    pub fn resolver(&self) -> &ConnectionConfigResolver {
        &self.resolver
    }

    pub fn extractor(&self) -> &UpstreamConfigExtractor {
        &self.extractor
    }

    pub fn backend(&self) -> &BackendClient {
        &self.backend
    }

    pub fn jobs(&self) -> &ComparisonJobClient {
        &self.jobs
    }

    pub fn retriever(&self) -> &ComparisonResultRetriever {
        &self.retriever
    }

    pub fn summarizer(&self) -> &SchemaDiffSummarizer {
        &self.summarizer
    }

    /// Waits for a job using the configured polling budget.
    pub async fn wait_for(&self, job_id: &str) -> Result<ComparisonOutcome> {
        self.retriever
            .await_completion(job_id, self.polling.max_wait(), self.polling.poll_interval())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::testing::ScriptedTransport;
    use serde_json::json;

    #[tokio::test]
    async fn test_configured_default_schema_reaches_backend_calls() {
        let mut config = AppConfig::default();
        config.resolver.default_schema = Some("analytics".to_string());
        config.retry.max_retries = 0;

        let transport = Arc::new(ScriptedTransport::new());
        transport.push_json(200, json!({"tables": []}));
        let bridge = DiffBridge::with_transport(&config, transport.clone());

        let descriptor = bridge
            .resolver()
            .parse(&json!("postgresql://u:p@h:5432/db"))
            .unwrap();
        bridge.backend().list_tables(&descriptor, None).await.unwrap();
        assert_eq!(transport.requests()[0].body.as_ref().unwrap()["schema"], "analytics");
    }

    #[tokio::test]
    async fn test_submit_then_wait() {
        let mut config = AppConfig::default();
        config.retry.max_retries = 0;
        config.polling.poll_interval_secs = 1;

        let transport = Arc::new(ScriptedTransport::new());
        transport.push_json(200, json!({"comparison_id": "job-7"}));
        transport.push_json(
            200,
            json!({"status": "completed", "result": {"source_row_count": 1, "target_row_count": 1}}),
        );
        let bridge = DiffBridge::with_transport(&config, transport.clone());

        let (source, target) = bridge
            .extractor()
            .resolve_pair(
                &json!({"json": {"connection_url": "postgresql://u:p@h:5432/db", "table": "orders"}}),
                &json!({"connection_url": "mysql://u:p@m:3306/shop", "table": "orders"}),
            )
            .unwrap();
        let handle = bridge
            .jobs()
            .submit_table_comparison(&source.into(), &target.into(), &TableComparisonOptions::default())
            .await
            .unwrap();
        let outcome = bridge.wait_for(&handle.id).await.unwrap();
        assert_eq!(outcome.job_id.as_deref(), Some("job-7"));
    }

    #[test]
    fn test_from_config_rejects_bad_url() {
        let mut config = AppConfig::default();
        config.backend.base_url = "not a url".to_string();
        assert!(DiffBridge::from_config(&config).is_err());
    }
}
