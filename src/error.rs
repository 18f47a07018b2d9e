use std::path::PathBuf;

use thiserror::Error;

/// Failures at the boundaries of the extraction pipeline.
///
/// Parsing itself never fails: a sparse or empty extraction still yields a
/// table. Only the document source and the extraction backend can stop a
/// document from being processed.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The input file is missing or unreadable.
    #[error("source unavailable: {}: {source}", path.display())]
    SourceUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The document is not a type any backend accepts.
    #[error("unsupported document type: {0}")]
    UnsupportedDocument(String),

    /// The extraction backend failed or returned an error payload.
    #[error("extraction failed: {0}")]
    ExtractionFailed(String),

    /// The backend is not usable with the current configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

impl PipelineError {
    pub fn extraction(message: impl Into<String>) -> Self {
        Self::ExtractionFailed(message.into())
    }
}
