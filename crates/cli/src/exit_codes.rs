//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract; load scripts rely on them.
//!
//! | Code | Meaning                                                     |
//! |------|-------------------------------------------------------------|
//! | 0    | Success                                                     |
//! | 1    | General error (unspecified)                                 |
//! | 2    | CLI usage error (bad args)                                  |
//! | 3    | Invalid configuration                                       |
//! | 4    | Namespace in input is neither single nor multiple           |
//! | 5    | Candidate source broke its contract or could not be decoded |
//! | 6    | Sink write or commit failed                                 |
//! | 7    | File I/O error                                              |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Wire it into `recon_exit_code`

use assocload_recon::ReconError;

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
/// Avoid using this; prefer a specific error code.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, missing required options.
/// clap exits with this code itself when argument parsing fails.
#[allow(dead_code)]
pub const EXIT_USAGE: u8 = 2;

/// Config file does not parse or does not validate.
pub const EXIT_INVALID_CONFIG: u8 = 3;

/// A namespace in the input belongs to neither policy list.
pub const EXIT_UNCLASSIFIED_NAMESPACE: u8 = 4;

/// Non-contiguous reconciliation key, half-filled match, undecodable row,
/// or a malformed provider file.
pub const EXIT_SOURCE: u8 = 5;

/// Output could not be written or committed. Nothing is partially visible.
pub const EXIT_SINK: u8 = 6;

/// Input or output file could not be read or written.
pub const EXIT_IO: u8 = 7;

/// Map an engine error to its exit code.
pub fn recon_exit_code(err: &ReconError) -> u8 {
    match err {
        ReconError::UnclassifiedNamespace { .. } => EXIT_UNCLASSIFIED_NAMESPACE,
        ReconError::ConfigParse(_)
        | ReconError::ConfigValidation(_)
        | ReconError::PolicyOverlap { .. } => EXIT_INVALID_CONFIG,
        ReconError::NonContiguousKey { .. }
        | ReconError::MalformedRow { .. }
        | ReconError::Source(_) => EXIT_SOURCE,
        ReconError::Sink(_) => EXIT_SINK,
        ReconError::Io(_) => EXIT_IO,
    }
}

/// Operator hint for errors with an obvious next step.
pub fn recon_hint(err: &ReconError) -> Option<&'static str> {
    match err {
        ReconError::UnclassifiedNamespace { .. } => {
            Some("add the namespace to [policy] single or multiple in the config")
        }
        ReconError::NonContiguousKey { .. } => {
            Some("sort the candidate rows by reconciliation_key before loading")
        }
        _ => None,
    }
}
