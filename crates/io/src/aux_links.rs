//! Existing auxiliary links, read once to prime the run's cache.

use assocload_recon::AuxLinkCache;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::IoError;

/// Column layout shared by the aux link store and the sink's output file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuxLinkRow {
    pub subject_key: i64,
    pub reference_key: i64,
    #[serde(default)]
    pub created_by: Option<String>,
}

/// Subject keys already linked to `reference_key`.
///
/// Rows created by `exclude_created_by` are ignored; a delete-reload run
/// treats its own previous output as gone.
pub fn load_aux_links(
    csv_data: &str,
    reference_key: i64,
    exclude_created_by: Option<&str>,
) -> Result<AuxLinkCache, IoError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(csv_data.as_bytes());

    let mut keys = Vec::new();
    for record in reader.deserialize::<AuxLinkRow>() {
        let row = record?;
        if row.reference_key != reference_key {
            continue;
        }
        if exclude_created_by.is_some() && row.created_by.as_deref() == exclude_created_by {
            continue;
        }
        keys.push(row.subject_key);
    }

    let cache = AuxLinkCache::primed(keys);
    info!(subjects = cache.len(), reference_key, "primed aux link cache");
    Ok(cache)
}
