//! `assocload-io`: file formats around the reconciliation engine.
//!
//! Readers for provider files, registry snapshots, staged candidates and the
//! aux link store, plus the bulk CSV sink.

pub mod aux_links;
pub mod candidates;
pub mod csv_sink;
pub mod error;
pub mod provider;
pub mod registry;
pub mod source;

pub use candidates::{write_candidates, CandidateReader};
pub use csv_sink::{split_identifier, CsvSink, SinkSettings};
pub use error::IoError;
pub use source::{annotate_files, load_aux_cache, open_source, output_dir, CandidateSource};
