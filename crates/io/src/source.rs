//! Assemble a run's inputs from the paths named in its config.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use assocload_recon::config::RowSource;
use assocload_recon::{AuxLinkCache, CandidateRow, ReconConfig, ReconError};
use tracing::info;

use crate::aux_links::load_aux_links;
use crate::candidates::CandidateReader;
use crate::error::IoError;
use crate::provider::parse_provider;
use crate::registry::{annotate, RegistryFilter, RegistryIndex};

/// Candidate rows for one run, either streamed from a staged CSV or built in
/// memory from a provider file and a registry snapshot.
pub enum CandidateSource {
    Staged(CandidateReader<File>),
    Annotated(std::vec::IntoIter<CandidateRow>),
}

impl Iterator for CandidateSource {
    type Item = Result<CandidateRow, ReconError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            Self::Staged(reader) => reader.next(),
            Self::Annotated(rows) => rows.next().map(Ok),
        }
    }
}

/// Relative paths are taken from the config file's directory.
pub fn resolve(base_dir: &Path, path: &str) -> PathBuf {
    let p = Path::new(path);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        base_dir.join(p)
    }
}

pub fn read_text(path: &Path) -> Result<String, IoError> {
    fs::read_to_string(path).map_err(|source| IoError::Read {
        path: path.to_path_buf(),
        source,
    })
}

/// Annotate a provider file against a registry snapshot.
pub fn annotate_files(
    config: &ReconConfig,
    provider: &Path,
    registry: &Path,
) -> Result<Vec<CandidateRow>, IoError> {
    let provider_file = parse_provider(&read_text(provider)?)?;
    info!(
        path = %provider.display(),
        records = provider_file.records.len(),
        namespaces = provider_file.namespaces.len(),
        "read provider file"
    );
    let index = RegistryIndex::from_csv(&read_text(registry)?, config, RegistryFilter::for_config(config))?;
    annotate(&provider_file, &index, config)
}

pub fn open_source(config: &ReconConfig, base_dir: &Path) -> Result<CandidateSource, IoError> {
    match config.files.row_source()? {
        RowSource::Candidates(path) => {
            let path = resolve(base_dir, path);
            info!(path = %path.display(), "streaming staged candidates");
            Ok(CandidateSource::Staged(CandidateReader::open(&path)?))
        }
        RowSource::Provider { provider, registry } => {
            let rows = annotate_files(config, &resolve(base_dir, provider), &resolve(base_dir, registry))?;
            Ok(CandidateSource::Annotated(rows.into_iter()))
        }
    }
}

/// Prime the aux link cache. No configured store means no existing links.
pub fn load_aux_cache(config: &ReconConfig, base_dir: &Path) -> Result<AuxLinkCache, IoError> {
    let Some(path) = config.files.aux_links.as_deref() else {
        return Ok(AuxLinkCache::new());
    };
    let exclude = config.delete_reload.then_some(config.job_stream.as_str());
    load_aux_links(&read_text(&resolve(base_dir, path))?, config.reference_key, exclude)
}

pub fn output_dir(config: &ReconConfig, base_dir: &Path) -> PathBuf {
    resolve(base_dir, &config.files.output_dir)
}
