//! Error types for document generation.
//!
//! Almost every failure inside a render pass is recovered locally (placeholder
//! nodes, promoted sections, default styles). What remains here are the
//! failures a caller has to see.

/// Result type alias for generation operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The request body could not be decoded.
    #[error("invalid generation request: {0}")]
    InvalidRequest(#[from] serde_json::Error),

    #[error("request has no sections")]
    NoSections,

    /// The assembled tree could not be turned into a .docx file.
    #[error("failed to serialize document: {0}")]
    Serialize(#[source] anyhow::Error),

    /// The artifact store rejected the finished file.
    #[error("failed to persist artifact `{name}`: {source}")]
    Persist {
        name: String,
        #[source]
        source: anyhow::Error,
    },
}
