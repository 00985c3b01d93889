use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconError {
    /// TOML parse / deserialization error.
    #[error("config parse error: {0}")]
    ConfigParse(String),
    /// Config validation error (unknown namespace name, overlapping policy lists, etc.).
    #[error("config validation error: {0}")]
    ConfigValidation(String),
    /// A namespace seen in input belongs to neither policy set.
    #[error(
        "namespace {namespace_key} must be configured to allow either single or multiple associations"
    )]
    UnclassifiedNamespace { namespace_key: i64 },
    /// A namespace key is listed as both single and multiple.
    #[error("namespace {namespace_key} is listed under both single and multiple associations")]
    PolicyOverlap { namespace_key: i64 },
    /// A reconciliation key reappeared after another key had been seen.
    #[error("reconciliation key {key} is not contiguous in the candidate row source")]
    NonContiguousKey { key: i64 },
    /// A row that breaks the row contract (half-filled registry match, etc.).
    #[error("reconciliation key {key}: malformed candidate row: {reason}")]
    MalformedRow { key: i64, reason: String },
    /// The row source produced input it could not decode.
    #[error("candidate source error: {0}")]
    Source(String),
    /// The sink rejected a write or failed to commit.
    #[error("sink error: {0}")]
    Sink(String),
    /// IO error (file read, etc.).
    #[error("IO error: {0}")]
    Io(String),
}

impl ReconError {
    /// True for errors that stem from deployment configuration rather than data.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            Self::ConfigParse(_)
                | Self::ConfigValidation(_)
                | Self::UnclassifiedNamespace { .. }
                | Self::PolicyOverlap { .. }
        )
    }
}
