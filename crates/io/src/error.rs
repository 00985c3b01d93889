use std::path::PathBuf;

use assocload_recon::ReconError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IoError {
    #[error("cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    /// Provider file layout error.
    #[error("line {line}: {message}")]
    Format { line: usize, message: String },
    /// A namespace name that the config does not define.
    #[error("unknown namespace '{0}'")]
    UnknownNamespace(String),
    #[error(transparent)]
    Recon(#[from] ReconError),
}

impl From<IoError> for ReconError {
    fn from(err: IoError) -> Self {
        match err {
            IoError::Recon(e) => e,
            IoError::UnknownNamespace(name) => {
                ReconError::ConfigValidation(format!("unknown namespace '{name}'"))
            }
            err @ (IoError::Csv(_) | IoError::Format { .. }) => ReconError::Source(err.to_string()),
            other => ReconError::Io(other.to_string()),
        }
    }
}
