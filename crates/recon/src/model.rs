use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::ReconError;

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// An existing registry entity an identifier already resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct RegistryMatch {
    pub entity_type: i64,
    pub entity_key: i64,
}

/// A single annotated input row.
///
/// `matched` is `None` when the identifier has no entity in the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateRow {
    pub reconciliation_key: i64,
    pub identifier: String,
    pub namespace_key: i64,
    pub is_subject: bool,
    pub matched: Option<RegistryMatch>,
}

impl CandidateRow {
    /// Build a row from loose columns, rejecting a type without a key (or vice versa).
    pub fn from_columns(
        reconciliation_key: i64,
        identifier: impl Into<String>,
        namespace_key: i64,
        is_subject: bool,
        entity_type: Option<i64>,
        entity_key: Option<i64>,
    ) -> Result<Self, ReconError> {
        let matched = match (entity_type, entity_key) {
            (Some(entity_type), Some(entity_key)) => Some(RegistryMatch { entity_type, entity_key }),
            (None, None) => None,
            (Some(_), None) => {
                return Err(ReconError::MalformedRow {
                    key: reconciliation_key,
                    reason: "entity type present without entity key".into(),
                })
            }
            (None, Some(_)) => {
                return Err(ReconError::MalformedRow {
                    key: reconciliation_key,
                    reason: "entity key present without entity type".into(),
                })
            }
        };
        Ok(Self {
            reconciliation_key,
            identifier: identifier.into(),
            namespace_key,
            is_subject,
            matched,
        })
    }

    pub fn entity_type(&self) -> Option<i64> {
        self.matched.map(|m| m.entity_type)
    }

    pub fn entity_key(&self) -> Option<i64> {
        self.matched.map(|m| m.entity_key)
    }

    fn is_pair(&self, pair: &CandidatePair) -> bool {
        self.namespace_key == pair.namespace_key && self.identifier == pair.identifier
    }
}

/// A distinct (identifier, namespace) to be linked to the subject.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct CandidatePair {
    pub identifier: String,
    pub namespace_key: i64,
}

/// All rows sharing one reconciliation key, in source order.
#[derive(Debug, Clone)]
pub struct ReconciliationUnit {
    pub key: i64,
    pub expected_subject_type: i64,
    pub rows: Vec<CandidateRow>,
}

impl ReconciliationUnit {
    pub fn subject_rows(&self) -> impl Iterator<Item = &CandidateRow> {
        self.rows.iter().filter(|r| r.is_subject)
    }

    /// Distinct non-subject (identifier, namespace) pairs, in order of first occurrence.
    pub fn distinct_pairs(&self) -> Vec<CandidatePair> {
        let mut pairs: Vec<CandidatePair> = Vec::new();
        for row in self.rows.iter().filter(|r| !r.is_subject) {
            if !pairs.iter().any(|p| row.is_pair(p)) {
                pairs.push(CandidatePair {
                    identifier: row.identifier.clone(),
                    namespace_key: row.namespace_key,
                });
            }
        }
        pairs
    }

    /// Every row (subject rows included) carrying the pair's identifier and namespace.
    pub fn rows_for<'a>(&'a self, pair: &'a CandidatePair) -> impl Iterator<Item = &'a CandidateRow> {
        self.rows.iter().filter(move |r| r.is_pair(pair))
    }
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Match count bucket used by both decision tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Count {
    Zero,
    One,
    Many,
}

impl Count {
    pub fn of(n: usize) -> Self {
        match n {
            0 => Self::Zero,
            1 => Self::One,
            _ => Self::Many,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Zero => "0",
            Self::One => "1",
            Self::Many => ">1",
        }
    }
}

/// Subject resolution discrepancy (A–H).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum SubjectCode {
    A,
    B,
    C,
    D,
    E,
    F,
    G,
    H,
}

impl SubjectCode {
    /// The (same type, different type) buckets this code stands for.
    pub fn buckets(self) -> (Count, Count) {
        use Count::*;
        match self {
            Self::A => (Zero, Zero),
            Self::B => (Zero, One),
            Self::C => (Zero, Many),
            Self::D => (One, One),
            Self::E => (One, Many),
            Self::F => (Many, Zero),
            Self::G => (Many, One),
            Self::H => (Many, Many),
        }
    }

    pub fn message(self) -> String {
        let (same, diff) = self.buckets();
        format!("{self}: Same type ({}), different type ({})", same.label(), diff.label())
    }
}

impl std::fmt::Display for SubjectCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Candidate pair discrepancy (A–M).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum PairCode {
    A,
    B,
    C,
    D,
    E,
    F,
    G,
    H,
    I,
    J,
    K,
    L,
    M,
}

impl PairCode {
    /// The (same type, same object, different type) pattern this code stands for.
    /// `same object` is `None` for A/B, where there is no same-type match to compare.
    pub fn pattern(self) -> (Count, Option<bool>, Count) {
        use Count::*;
        match self {
            Self::A => (Zero, None, One),
            Self::B => (Zero, None, Many),
            Self::C => (One, Some(true), One),
            Self::D => (One, Some(true), Many),
            Self::E => (One, Some(false), Zero),
            Self::F => (One, Some(false), One),
            Self::G => (One, Some(false), Many),
            Self::H => (Many, Some(true), Zero),
            Self::I => (Many, Some(true), One),
            Self::J => (Many, Some(true), Many),
            Self::K => (Many, Some(false), Zero),
            Self::L => (Many, Some(false), One),
            Self::M => (Many, Some(false), Many),
        }
    }

    pub fn message(self) -> String {
        let (same, obj, diff) = self.pattern();
        match obj {
            None => format!("{self}: Same type ({}), different type ({})", same.label(), diff.label()),
            Some(obj) => format!(
                "{self}: Same type ({}), same object ({}), different type ({})",
                same.label(),
                u8::from(obj),
                diff.label()
            ),
        }
    }
}

impl std::fmt::Display for PairCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

/// What to do with one distinct candidate pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "action", content = "code")]
pub enum Decision {
    /// Association already present; nothing to do.
    Exists,
    /// Conflict; report every row of the pair and block writes for the whole unit.
    SkipWithReport(PairCode),
    Associate,
    /// Report every row of the pair, then associate unless the unit is suppressed.
    AssociateWithReport(PairCode),
}

impl Decision {
    pub fn code(&self) -> Option<PairCode> {
        match self {
            Self::SkipWithReport(c) | Self::AssociateWithReport(c) => Some(*c),
            Self::Exists | Self::Associate => None,
        }
    }

    pub fn wants_write(&self) -> bool {
        matches!(self, Self::Associate | Self::AssociateWithReport(_))
    }

    pub fn blocks_unit(&self) -> bool {
        matches!(self, Self::SkipWithReport(_))
    }
}

// ---------------------------------------------------------------------------
// Sink records
// ---------------------------------------------------------------------------

/// A new identifier → entity link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssociationRecord {
    pub identifier: String,
    pub namespace_key: i64,
    pub entity_type: i64,
    pub entity_key: i64,
}

/// Once-per-subject secondary link for the linkable entity type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AuxLinkRecord {
    pub subject_key: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case", tag = "phase", content = "code")]
pub enum DiscrepancyCode {
    Subject(SubjectCode),
    Candidate(PairCode),
}

impl DiscrepancyCode {
    pub fn message(&self) -> String {
        match self {
            Self::Subject(c) => c.message(),
            Self::Candidate(c) => c.message(),
        }
    }
}

/// One discrepancy report row. Candidate columns are empty for subject reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscrepancyReport {
    pub subject_identifier: String,
    pub subject_namespace: i64,
    pub subject_entity_key: Option<i64>,
    pub subject_entity_type: Option<i64>,
    pub candidate_identifier: Option<String>,
    pub candidate_namespace: Option<i64>,
    pub candidate_entity_key: Option<i64>,
    pub candidate_entity_type: Option<i64>,
    pub expected_type: i64,
    pub code: DiscrepancyCode,
    pub message: String,
}

// ---------------------------------------------------------------------------
// Summary + Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconSummary {
    pub units: usize,
    pub existing: usize,
    pub skipped: usize,
    pub associated: usize,
    pub reported: usize,
    pub aux_links: usize,
    pub subject_codes: BTreeMap<String, usize>,
    pub candidate_codes: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconMeta {
    pub config_name: String,
    pub engine_version: String,
    pub run_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconResult {
    pub meta: ReconMeta,
    pub summary: ReconSummary,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(key: i64, id: &str, ns: i64, subject: bool) -> CandidateRow {
        CandidateRow::from_columns(key, id, ns, subject, None, None).unwrap()
    }

    #[test]
    fn half_filled_match_rejected() {
        let err = CandidateRow::from_columns(7, "X:1", 1, false, Some(2), None).unwrap_err();
        assert!(err.to_string().contains("key 7"));
        assert!(CandidateRow::from_columns(7, "X:1", 1, false, None, Some(9)).is_err());
    }

    #[test]
    fn distinct_pairs_keep_first_occurrence_order() {
        let unit = ReconciliationUnit {
            key: 1,
            expected_subject_type: 3,
            rows: vec![
                row(1, "S1", 10, true),
                row(1, "B", 20, false),
                row(1, "A", 20, false),
                row(1, "B", 20, false),
                row(1, "B", 21, false),
                row(1, "S1", 10, true),
            ],
        };
        let pairs = unit.distinct_pairs();
        let flat: Vec<(&str, i64)> = pairs.iter().map(|p| (p.identifier.as_str(), p.namespace_key)).collect();
        assert_eq!(flat, vec![("B", 20), ("A", 20), ("B", 21)]);
        assert_eq!(unit.rows_for(&pairs[0]).count(), 2);
    }

    #[test]
    fn subject_identifier_is_not_a_candidate() {
        let unit = ReconciliationUnit {
            key: 1,
            expected_subject_type: 3,
            rows: vec![row(1, "S1", 10, true)],
        };
        assert!(unit.distinct_pairs().is_empty());
        assert_eq!(unit.subject_rows().count(), 1);
    }

    #[test]
    fn code_messages() {
        assert_eq!(SubjectCode::C.message(), "C: Same type (0), different type (>1)");
        assert_eq!(PairCode::A.message(), "A: Same type (0), different type (1)");
        assert_eq!(
            PairCode::L.message(),
            "L: Same type (>1), same object (0), different type (1)"
        );
    }

    #[test]
    fn result_json_shape() {
        let mut summary = ReconSummary { units: 2, associated: 1, ..Default::default() };
        summary.candidate_codes.insert("K".into(), 2);
        let result = ReconResult {
            meta: ReconMeta {
                config_name: "load".into(),
                engine_version: "0.0.0".into(),
                run_at: "2026-10-19T00:00:00+00:00".into(),
            },
            summary,
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["meta"]["config_name"], "load");
        assert_eq!(json["summary"]["associated"], 1);
        assert_eq!(json["summary"]["candidate_codes"]["K"], 2);
        assert!(json["summary"]["subject_codes"].as_object().unwrap().is_empty());

        let code = serde_json::to_value(DiscrepancyCode::Subject(SubjectCode::C)).unwrap();
        assert_eq!(code, serde_json::json!({ "phase": "subject", "code": "C" }));
    }
}
