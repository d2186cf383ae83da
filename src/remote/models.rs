// ABOUTME: Wire structures exchanged with the comparison backend
// ABOUTME: Request bodies are serialized to JSON; responses tolerate missing optional fields

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::comparison::options::ComparisonConfig;

#[derive(Debug, Clone, Serialize)]
pub struct TableComparisonRequest {
    pub source_config: Value,
    pub target_config: Value,
    pub comparison_config: ComparisonConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct SchemaComparisonRequest {
    pub source_config: Value,
    pub target_config: Value,
}

/// Response to a comparison submission. Schema comparisons answer
/// synchronously, so `result` may already be present.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitResponse {
    #[serde(alias = "job_id")]
    pub comparison_id: Option<String>,
    pub status: Option<String>,
    pub result: Option<Value>,
    pub error: Option<String>,
}

/// Body of `GET /compare/results/{id}` and of webhook callbacks.
#[derive(Debug, Clone, Deserialize)]
pub struct ResultEnvelope {
    #[serde(alias = "job_id", alias = "id")]
    pub comparison_id: Option<String>,
    pub status: String,
    pub result: Option<Value>,
    pub error: Option<String>,
    #[serde(default)]
    pub materialized_from_db: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionTestResponse {
    pub success: bool,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TablesResponse {
    #[serde(default)]
    pub tables: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueryResponse {
    pub success: bool,
    pub result: Option<Value>,
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_envelope_accepts_job_id_alias() {
        let envelope: ResultEnvelope =
            serde_json::from_value(json!({"job_id": "abc", "status": "running"})).unwrap();
        assert_eq!(envelope.comparison_id.as_deref(), Some("abc"));
        assert!(!envelope.materialized_from_db);
    }

    #[test]
    fn test_envelope_requires_status() {
        let parsed: Result<ResultEnvelope, _> = serde_json::from_value(json!({"result": {}}));
        assert!(parsed.is_err());
    }
}
