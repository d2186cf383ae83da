// ABOUTME: Comparison results: typed shapes, normalization, sampling math and retrieval
// ABOUTME: Exposes ComparisonResultRetriever for polling and webhook delivery

pub mod normalize;
pub mod retriever;
pub mod sampling;
pub mod types;

pub use normalize::normalize_result;
pub use retriever::ComparisonResultRetriever;
pub use types::{
    ColumnDef, ComparisonOutcome, ComparisonResult, ConfidenceInterval, DifferenceKind,
    FetchOutcome, JobStatus, OperationKind, Provenance, RowDifference, SamplingEstimate,
    SchemaResult, TableResult, TableSchemaDiff, TableStatus, TypeDifference,
};
