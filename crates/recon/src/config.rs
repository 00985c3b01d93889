use std::collections::BTreeMap;

use serde::Deserialize;

use crate::error::ReconError;
use crate::policy::NamespacePolicy;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ReconConfig {
    pub name: String,
    /// Creator name stamped on written rows; also identifies a previous run's rows.
    pub job_stream: String,
    pub subject_type: SubjectType,
    /// Entity type whose subjects get a once-per-subject auxiliary link.
    #[serde(default)]
    pub linkable_type: Option<i64>,
    /// Reference stamped on association and auxiliary link rows.
    pub reference_key: i64,
    #[serde(default)]
    pub private_identifiers: bool,
    /// Ignore rows this job stream created in earlier runs.
    #[serde(default)]
    pub delete_reload: bool,
    /// Registry matches of these entity types are invisible to lookups.
    #[serde(default)]
    pub excluded_entity_types: Vec<i64>,
    /// Namespace name → namespace key.
    pub namespaces: BTreeMap<String, i64>,
    pub policy: PolicyConfig,
    #[serde(default)]
    pub files: FilesConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubjectType {
    pub name: String,
    pub key: i64,
}

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

/// Namespace names allowed one vs. many linked entities.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PolicyConfig {
    #[serde(default)]
    pub single: Vec<String>,
    #[serde(default)]
    pub multiple: Vec<String>,
}

// ---------------------------------------------------------------------------
// Files
// ---------------------------------------------------------------------------

/// Input and output locations, relative to the config file.
///
/// The row source is either a pre-staged `candidates` CSV or a `provider`
/// file resolved against a `registry` snapshot.
#[derive(Debug, Clone, Deserialize)]
pub struct FilesConfig {
    #[serde(default)]
    pub candidates: Option<String>,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub registry: Option<String>,
    #[serde(default)]
    pub aux_links: Option<String>,
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
}

fn default_output_dir() -> String {
    "out".into()
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            candidates: None,
            provider: None,
            registry: None,
            aux_links: None,
            output_dir: default_output_dir(),
        }
    }
}

/// Where candidate rows come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowSource<'a> {
    Candidates(&'a str),
    Provider { provider: &'a str, registry: &'a str },
}

impl FilesConfig {
    pub fn row_source(&self) -> Result<RowSource<'_>, ReconError> {
        match (&self.candidates, &self.provider, &self.registry) {
            (Some(c), None, None) => Ok(RowSource::Candidates(c)),
            (None, Some(p), Some(r)) => Ok(RowSource::Provider { provider: p, registry: r }),
            (Some(_), _, _) => Err(ReconError::ConfigValidation(
                "files: `candidates` cannot be combined with `provider`/`registry`".into(),
            )),
            (None, Some(_), None) => Err(ReconError::ConfigValidation(
                "files: `provider` requires `registry`".into(),
            )),
            (None, None, Some(_)) => Err(ReconError::ConfigValidation(
                "files: `registry` requires `provider`".into(),
            )),
            (None, None, None) => Err(ReconError::ConfigValidation(
                "files: set either `candidates` or `provider` + `registry`".into(),
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl ReconConfig {
    pub fn from_toml(input: &str) -> Result<Self, ReconError> {
        let config: ReconConfig =
            toml::from_str(input).map_err(|e| ReconError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        if self.job_stream.trim().is_empty() {
            return Err(ReconError::ConfigValidation("job_stream must not be empty".into()));
        }

        if self.namespaces.is_empty() {
            return Err(ReconError::ConfigValidation(
                "at least one namespace is required".into(),
            ));
        }

        // Two names for one key would make reports ambiguous
        let mut by_key: BTreeMap<i64, &str> = BTreeMap::new();
        for (name, key) in &self.namespaces {
            if let Some(other) = by_key.insert(*key, name) {
                return Err(ReconError::ConfigValidation(format!(
                    "namespaces '{other}' and '{name}' share key {key}"
                )));
            }
        }

        self.namespace_policy()?;
        self.files.row_source()?;
        Ok(())
    }

    pub fn namespace_key(&self, name: &str) -> Option<i64> {
        self.namespaces.get(name.trim()).copied()
    }

    pub fn namespace_name(&self, key: i64) -> Option<&str> {
        self.namespaces
            .iter()
            .find(|(_, k)| **k == key)
            .map(|(name, _)| name.as_str())
    }

    /// Resolve the policy name lists into namespace keys.
    pub fn namespace_policy(&self) -> Result<NamespacePolicy, ReconError> {
        let keys = |list: &str, names: &[String]| -> Result<Vec<i64>, ReconError> {
            names
                .iter()
                .map(|name| {
                    self.namespace_key(name).ok_or_else(|| {
                        ReconError::ConfigValidation(format!(
                            "policy.{list}: unknown namespace '{name}'"
                        ))
                    })
                })
                .collect()
        };
        let single = keys("single", &self.policy.single)?;
        let multiple = keys("multiple", &self.policy.multiple)?;
        NamespacePolicy::new(single, multiple)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
