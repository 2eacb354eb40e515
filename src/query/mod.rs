//! Report lookup pipeline.
//!
//! [`QueryOrchestrator::query_report_data`] runs one query end to end:
//! token, instance listing, batch fetch, attachment extraction and
//! temporary URL minting.

pub mod extract;
pub mod orchestrator;
pub mod types;

use thiserror::Error;

use crate::vendor::TokenError;

pub use extract::{Lookup, extract_attachments, format_create_time};
pub use orchestrator::{QueryOrchestrator, QuerySettings, build_search_filter};
pub use types::{AttachmentReport, AttachmentShell, FormInstanceRecord, QueryParameters, QueryResult};

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("authentication failed: {0}")]
    Auth(#[from] TokenError),

    #[error("failed to list form instances: {0}")]
    ListFailure(String),

    #[error("failed to fetch form instances: {0}")]
    BatchFetchFailure(String),

    /// One record could not be parsed; the record is skipped.
    #[error("malformed form instance: {0}")]
    ParseFailure(String),

    /// One attachment could not be given a download URL.
    #[error("failed to get download url: {0}")]
    AttachmentUrlFailure(String),
}
