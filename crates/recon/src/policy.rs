//! Namespace policy: which namespaces may link an identifier to one entity vs. many.

use std::collections::BTreeSet;

use crate::error::ReconError;

/// Decision table a namespace is evaluated under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssociationMode {
    Single,
    Multiple,
}

impl std::fmt::Display for AssociationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Single => write!(f, "single"),
            Self::Multiple => write!(f, "multiple"),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct NamespacePolicy {
    single: BTreeSet<i64>,
    multiple: BTreeSet<i64>,
}

impl NamespacePolicy {
    /// Build a policy from the two key sets. A key in both sets is rejected.
    pub fn new(
        single: impl IntoIterator<Item = i64>,
        multiple: impl IntoIterator<Item = i64>,
    ) -> Result<Self, ReconError> {
        let single: BTreeSet<i64> = single.into_iter().collect();
        let multiple: BTreeSet<i64> = multiple.into_iter().collect();
        if let Some(&namespace_key) = single.intersection(&multiple).next() {
            return Err(ReconError::PolicyOverlap { namespace_key });
        }
        Ok(Self { single, multiple })
    }

    pub fn mode(&self, namespace_key: i64) -> Result<AssociationMode, ReconError> {
        if self.single.contains(&namespace_key) {
            Ok(AssociationMode::Single)
        } else if self.multiple.contains(&namespace_key) {
            Ok(AssociationMode::Multiple)
        } else {
            Err(ReconError::UnclassifiedNamespace { namespace_key })
        }
    }

    pub fn single(&self) -> &BTreeSet<i64> {
        &self.single
    }

    pub fn multiple(&self) -> &BTreeSet<i64> {
        &self.multiple
    }
}
