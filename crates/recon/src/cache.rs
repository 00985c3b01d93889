use std::collections::HashSet;

/// Run-scoped set of subject keys that already have an auxiliary link.
///
/// Primed once from storage. Keys are recorded as soon as a link is emitted,
/// because the sink's writes are not readable back until its commit.
#[derive(Debug, Clone, Default)]
pub struct AuxLinkCache {
    keys: HashSet<i64>,
}

impl AuxLinkCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn primed(keys: impl IntoIterator<Item = i64>) -> Self {
        Self { keys: keys.into_iter().collect() }
    }

    pub fn contains(&self, subject_key: i64) -> bool {
        self.keys.contains(&subject_key)
    }

    /// Returns true if the key was not present before.
    pub fn record(&mut self, subject_key: i64) -> bool {
        self.keys.insert(subject_key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
