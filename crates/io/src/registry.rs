//! Registry snapshot lookups: annotate provider entries with the entities
//! their identifiers already resolve to.

use std::collections::HashMap;

use assocload_recon::model::RegistryMatch;
use assocload_recon::{CandidateRow, ReconConfig};
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::IoError;
use crate::provider::ProviderFile;

#[derive(Debug, Deserialize)]
struct RegistryCsvRow {
    identifier: String,
    namespace: String,
    entity_type: i64,
    entity_key: i64,
    #[serde(default)]
    created_by: Option<String>,
}

/// Which registry rows are invisible to lookups.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegistryFilter<'a> {
    pub excluded_types: &'a [i64],
    /// Rows created by this job stream (a previous run being reloaded).
    pub exclude_created_by: Option<&'a str>,
}

impl<'a> RegistryFilter<'a> {
    pub fn for_config(config: &'a ReconConfig) -> Self {
        Self {
            excluded_types: &config.excluded_entity_types,
            exclude_created_by: config.delete_reload.then_some(config.job_stream.as_str()),
        }
    }
}

/// (identifier, namespace key) → registry matches, sorted by entity.
#[derive(Debug, Default)]
pub struct RegistryIndex {
    matches: HashMap<(String, i64), Vec<RegistryMatch>>,
}

impl RegistryIndex {
    pub fn from_csv(
        csv_data: &str,
        config: &ReconConfig,
        filter: RegistryFilter<'_>,
    ) -> Result<Self, IoError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(csv_data.as_bytes());

        let mut matches: HashMap<(String, i64), Vec<RegistryMatch>> = HashMap::new();
        let mut excluded = 0usize;
        let mut foreign = 0usize;

        for record in reader.deserialize::<RegistryCsvRow>() {
            let row = record?;
            if filter.excluded_types.contains(&row.entity_type) {
                excluded += 1;
                continue;
            }
            if let (Some(job), Some(created_by)) = (filter.exclude_created_by, row.created_by.as_deref()) {
                if job == created_by {
                    excluded += 1;
                    continue;
                }
            }
            // Namespaces the run does not know about can never be looked up
            let Some(ns) = config.namespace_key(&row.namespace) else {
                foreign += 1;
                continue;
            };
            matches
                .entry((row.identifier, ns))
                .or_default()
                .push(RegistryMatch { entity_type: row.entity_type, entity_key: row.entity_key });
        }

        for list in matches.values_mut() {
            list.sort_by_key(|m| (m.entity_type, m.entity_key));
            list.dedup();
        }

        info!(
            identifiers = matches.len(),
            excluded,
            foreign,
            "loaded registry snapshot"
        );
        Ok(Self { matches })
    }

    pub fn lookup(&self, identifier: &str, namespace_key: i64) -> &[RegistryMatch] {
        self.matches
            .get(&(identifier.to_string(), namespace_key))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }
}

/// Resolve every provider entry against the registry.
///
/// An entry without matches yields one unmatched row; an entry with k matches
/// yields k rows. Rows come out ordered by (record, identifier, namespace),
/// so each record's rows are contiguous.
pub fn annotate(
    provider: &ProviderFile,
    registry: &RegistryIndex,
    config: &ReconConfig,
) -> Result<Vec<CandidateRow>, IoError> {
    let mut ns_keys: HashMap<&str, i64> = HashMap::new();
    for name in &provider.namespaces {
        let key = config
            .namespace_key(name)
            .ok_or_else(|| IoError::UnknownNamespace(name.clone()))?;
        ns_keys.insert(name.as_str(), key);
    }

    let mut rows = Vec::new();
    for record in &provider.records {
        let start = rows.len();
        for entry in &record.entries {
            let ns = ns_keys
                .get(entry.namespace.as_str())
                .copied()
                .ok_or_else(|| IoError::UnknownNamespace(entry.namespace.clone()))?;
            let found = registry.lookup(&entry.identifier, ns);
            if found.is_empty() {
                rows.push(CandidateRow {
                    reconciliation_key: record.record_key,
                    identifier: entry.identifier.clone(),
                    namespace_key: ns,
                    is_subject: entry.is_subject,
                    matched: None,
                });
            }
            for m in found {
                rows.push(CandidateRow {
                    reconciliation_key: record.record_key,
                    identifier: entry.identifier.clone(),
                    namespace_key: ns,
                    is_subject: entry.is_subject,
                    matched: Some(*m),
                });
            }
        }
        rows[start..].sort_by(|a, b| {
            (a.identifier.as_str(), a.namespace_key).cmp(&(b.identifier.as_str(), b.namespace_key))
        });
        debug!(record = record.record_key, rows = rows.len() - start, "annotated record");
    }
    Ok(rows)
}
