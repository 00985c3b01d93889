//! `assocload-recon`: identifier association reconciliation engine.
//!
//! Pure engine crate: receives annotated candidate rows, decides which
//! associations exist, which to create and which to report, and hands the
//! results to a [`Sink`]. No file paths or formats live here.

pub mod cache;
pub mod classify;
pub mod config;
pub mod engine;
pub mod error;
pub mod group;
pub mod model;
pub mod policy;
pub mod sink;

pub use cache::AuxLinkCache;
pub use config::ReconConfig;
pub use engine::{run, Reconciler, UnitOutcome};
pub use error::ReconError;
pub use group::UnitBuilder;
pub use model::{CandidateRow, ReconResult, ReconSummary, ReconciliationUnit};
pub use policy::{AssociationMode, NamespacePolicy};
pub use sink::{MemorySink, Sink};
