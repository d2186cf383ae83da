// ABOUTME: Submits table and schema comparison jobs to the backend without waiting on them
// ABOUTME: Validates descriptors and options locally so bad input never reaches the network

pub mod options;

pub use options::{
    Algorithm, ComparisonConfig, JsonComparisonMode, SampleSize, SamplingMethod, SamplingOptions,
    TableComparisonOptions, DEFAULT_KEY_COLUMN,
};

use serde::Serialize;
use tracing::info;

use crate::connection::{CanonicalConfig, ConnectionConfigResolver, ConnectionDescriptor, TableReference};
use crate::error::{DiffError, Result, Side};
use crate::extract::Extraction;
use crate::remote::models::{SchemaComparisonRequest, SubmitResponse, TableComparisonRequest};
use crate::remote::{RequestSpec, RetryingInvoker};
use crate::results::{normalize_result, ComparisonOutcome, JobStatus, OperationKind, Provenance};

pub const CALLBACK_PATH: &str = "/comparison-callback";

/// Backend-minted job identifier plus the kind of comparison it tracks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobHandle {
    pub id: String,
    pub kind: OperationKind,
}

/// One side of a table comparison: where to connect and which table to read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComparisonSide {
    pub descriptor: ConnectionDescriptor,
    pub table: Option<String>,
}

impl ComparisonSide {
    pub fn new(descriptor: ConnectionDescriptor, table: impl Into<String>) -> Self {
        Self {
            descriptor,
            table: Some(table.into()),
        }
    }
}

impl From<Extraction> for ComparisonSide {
    fn from(extraction: Extraction) -> Self {
        Self {
            descriptor: extraction.descriptor,
            table: extraction.table,
        }
    }
}

/// Schema comparisons are answered inline by the backend, but a queued
/// answer is still accepted.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaSubmission {
    Queued(JobHandle),
    Completed(ComparisonOutcome),
}

#[derive(Clone)]
pub struct ComparisonJobClient {
    invoker: RetryingInvoker,
    resolver: ConnectionConfigResolver,
    callback_base_url: Option<String>,
}

impl ComparisonJobClient {
    pub fn new(invoker: RetryingInvoker, resolver: ConnectionConfigResolver) -> Self {
        Self {
            invoker,
            resolver,
            callback_base_url: None,
        }
    }

    pub fn with_callback_base_url(mut self, base_url: Option<String>) -> Self {
        self.callback_base_url = base_url
            .map(|url| url.trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty());
        self
    }

    /// Explicit option first, then the configured callback base.
    fn callback_url(&self, options: &TableComparisonOptions) -> Option<String> {
        options
            .callback_url
            .clone()
            .filter(|url| !url.trim().is_empty())
            .or_else(|| {
                self.callback_base_url
                    .as_ref()
                    .map(|base| format!("{}{}", base, CALLBACK_PATH))
            })
    }

    fn canonical_pair(
        &self,
        source: &ConnectionDescriptor,
        target: &ConnectionDescriptor,
    ) -> Result<(CanonicalConfig, CanonicalConfig)> {
        match (source.is_empty(), target.is_empty()) {
            (true, true) => return Err(DiffError::UnresolvedUpstream { side: Side::Both }),
            (true, false) => return Err(DiffError::UnresolvedUpstream { side: Side::Source }),
            (false, true) => return Err(DiffError::UnresolvedUpstream { side: Side::Target }),
            (false, false) => {}
        }
        Ok((
            self.resolver.to_canonical(source)?,
            self.resolver.to_canonical(target)?,
        ))
    }

    /// Submits a table comparison and returns as soon as the backend has
    /// queued it.
    pub async fn submit_table_comparison(
        &self,
        source: &ComparisonSide,
        target: &ComparisonSide,
        options: &TableComparisonOptions,
    ) -> Result<JobHandle> {
        let (source_config, target_config) =
            self.canonical_pair(&source.descriptor, &target.descriptor)?;
        let source_table = qualify(source.table.as_deref(), &source_config, Side::Source)?;
        let target_table = qualify(target.table.as_deref(), &target_config, Side::Target)?;
        options.validate()?;

        let comparison_config =
            ComparisonConfig::build(source_table, target_table, options, self.callback_url(options));
        info!(
            "Submitting {} {} -> {} {} comparison keyed on {:?}",
            source_config.database_type,
            comparison_config.source_table,
            target_config.database_type,
            comparison_config.target_table,
            comparison_config.key_columns
        );

        let request = TableComparisonRequest {
            source_config: source_config.to_json(),
            target_config: target_config.to_json(),
            comparison_config,
        };
        let body = serde_json::to_value(&request)
            .map_err(|e| DiffError::InvalidPayload(format!("could not encode submission: {}", e)))?;
        let response = self
            .invoker
            .invoke(&RequestSpec::post("/compare/tables/nested", body))
            .await?;

        let parsed: SubmitResponse = response.json()?;
        let id = parsed
            .comparison_id
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| {
                DiffError::InvalidPayload(
                    "backend accepted the comparison but returned no comparison_id".to_string(),
                )
            })?;
        info!("Table comparison queued as {}", id);
        Ok(JobHandle {
            id,
            kind: OperationKind::Table,
        })
    }

    pub async fn submit_schema_comparison(
        &self,
        source: &ConnectionDescriptor,
        target: &ConnectionDescriptor,
    ) -> Result<SchemaSubmission> {
        let (source_config, target_config) = self.canonical_pair(source, target)?;
        info!(
            "Submitting schema comparison {} -> {}",
            source_config.database_type, target_config.database_type
        );

        let request = SchemaComparisonRequest {
            source_config: source_config.to_json(),
            target_config: target_config.to_json(),
        };
        let body = serde_json::to_value(&request)
            .map_err(|e| DiffError::InvalidPayload(format!("could not encode submission: {}", e)))?;
        let response = self
            .invoker
            .invoke(&RequestSpec::post("/compare/schemas/nested", body))
            .await?;

        let parsed: SubmitResponse = response.json()?;
        let id = parsed.comparison_id.filter(|id| !id.trim().is_empty());
        let status = parsed.status.as_deref().and_then(JobStatus::parse);

        if status == Some(JobStatus::Failed) {
            return Err(DiffError::ComparisonFailed {
                job_id: id.unwrap_or_else(|| "schema comparison".to_string()),
                message: parsed
                    .error
                    .unwrap_or_else(|| "schema comparison failed without an error message".to_string()),
            });
        }
        if let Some(raw) = parsed.result {
            return Ok(SchemaSubmission::Completed(ComparisonOutcome {
                job_id: id,
                provenance: Provenance::Sync,
                result: normalize_result(&raw, Some(OperationKind::Schema))?,
            }));
        }
        match id {
            Some(id) => Ok(SchemaSubmission::Queued(JobHandle {
                id,
                kind: OperationKind::Schema,
            })),
            None => Err(DiffError::InvalidPayload(
                "schema comparison returned neither a result nor a comparison_id".to_string(),
            )),
        }
    }
}

fn qualify(table: Option<&str>, config: &CanonicalConfig, side: Side) -> Result<String> {
    let table = table
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| DiffError::MissingTable(format!("no table given for the {} side", side)))?;
    Ok(TableReference::parse(table)?
        .qualified_with(config.schema())
        .to_string())
}
