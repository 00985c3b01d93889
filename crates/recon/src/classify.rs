//! Decision tables for subject resolution and candidate pair classification.
//!
//! Both tables are plain matches over count buckets so every row can be
//! tested on its own, without building units.

use crate::model::{
    CandidatePair, Count, Decision, PairCode, ReconciliationUnit, RegistryMatch, SubjectCode,
};
use crate::policy::AssociationMode;

// ---------------------------------------------------------------------------
// Subject resolution
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubjectResolution {
    /// Exactly one subject row resolves to the expected type and none to another.
    Resolved(RegistryMatch),
    Discrepancy(SubjectCode),
}

/// Same/different-type counts over the subject rows. Unmatched rows count toward neither.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubjectTally {
    pub same_type: usize,
    pub diff_type: usize,
}

pub fn tally_subject(unit: &ReconciliationUnit) -> (SubjectTally, Option<RegistryMatch>) {
    let mut tally = SubjectTally::default();
    let mut target = None;
    for m in unit.subject_rows().filter_map(|r| r.matched) {
        if m.entity_type == unit.expected_subject_type {
            tally.same_type += 1;
            target = Some(m);
        } else {
            tally.diff_type += 1;
        }
    }
    (tally, target)
}

/// Subject table. `None` means the subject resolved cleanly.
pub fn subject_code(same_type: Count, diff_type: Count) -> Option<SubjectCode> {
    use Count::*;
    match (same_type, diff_type) {
        (One, Zero) => None,
        (Zero, Zero) => Some(SubjectCode::A),
        (Zero, One) => Some(SubjectCode::B),
        (Zero, Many) => Some(SubjectCode::C),
        (One, One) => Some(SubjectCode::D),
        (One, Many) => Some(SubjectCode::E),
        (Many, Zero) => Some(SubjectCode::F),
        (Many, One) => Some(SubjectCode::G),
        (Many, Many) => Some(SubjectCode::H),
    }
}

pub fn resolve_subject(unit: &ReconciliationUnit) -> SubjectResolution {
    let (tally, target) = tally_subject(unit);
    match (subject_code(Count::of(tally.same_type), Count::of(tally.diff_type)), target) {
        (None, Some(target)) => SubjectResolution::Resolved(target),
        (Some(code), _) => SubjectResolution::Discrepancy(code),
        // same_type == 1 always records a target
        (None, None) => SubjectResolution::Discrepancy(SubjectCode::A),
    }
}

// ---------------------------------------------------------------------------
// Candidate pairs
// ---------------------------------------------------------------------------

/// Registry matches of one candidate pair, relative to the resolved subject.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PairTally {
    pub same_type: usize,
    pub same_obj: usize,
    pub diff_type: usize,
}

impl PairTally {
    pub fn buckets(&self) -> (Count, bool, Count) {
        (Count::of(self.same_type), self.same_obj > 0, Count::of(self.diff_type))
    }
}

pub fn tally_pair(unit: &ReconciliationUnit, pair: &CandidatePair, target: RegistryMatch) -> PairTally {
    let mut tally = PairTally::default();
    for m in unit.rows_for(pair).filter_map(|r| r.matched) {
        if m.entity_type == target.entity_type {
            tally.same_type += 1;
            if m.entity_key == target.entity_key {
                tally.same_obj += 1;
            }
        } else {
            tally.diff_type += 1;
        }
    }
    tally
}

pub fn decide(mode: AssociationMode, tally: &PairTally) -> Decision {
    let (same, obj, diff) = tally.buckets();
    match mode {
        AssociationMode::Single => decide_single(same, obj, diff),
        AssociationMode::Multiple => decide_multiple(same, obj, diff),
    }
}

/// Table for namespaces where an identifier may belong to one entity only.
pub fn decide_single(same: Count, same_obj: bool, diff: Count) -> Decision {
    use Count::*;
    use Decision::{Associate, Exists, SkipWithReport as Skip};
    match (same, same_obj, diff) {
        (Zero, _, Zero) => Associate,
        (Zero, _, One) => Skip(PairCode::A),
        (Zero, _, Many) => Skip(PairCode::B),
        (One, true, Zero) => Exists,
        (One, true, One) => Skip(PairCode::C),
        (One, true, Many) => Skip(PairCode::D),
        (One, false, Zero) => Skip(PairCode::E),
        (One, false, One) => Skip(PairCode::F),
        (One, false, Many) => Skip(PairCode::G),
        (Many, true, Zero) => Skip(PairCode::H),
        (Many, true, One) => Skip(PairCode::I),
        (Many, true, Many) => Skip(PairCode::J),
        (Many, false, Zero) => Skip(PairCode::K),
        (Many, false, One) => Skip(PairCode::L),
        (Many, false, Many) => Skip(PairCode::M),
    }
}

/// Table for namespaces where an identifier may belong to several entities.
///
/// With no same-type match the different-type count is not consulted.
pub fn decide_multiple(same: Count, same_obj: bool, diff: Count) -> Decision {
    use Count::*;
    use Decision::{Associate, AssociateWithReport as Flag, Exists, SkipWithReport as Skip};
    match (same, same_obj, diff) {
        (Zero, _, _) => Associate,
        (One, true, _) => Exists,
        (One, false, Zero) => Flag(PairCode::E),
        (One, false, One) => Flag(PairCode::F),
        (One, false, Many) => Flag(PairCode::G),
        (Many, true, Zero) => Skip(PairCode::H),
        (Many, true, One) => Skip(PairCode::I),
        (Many, true, Many) => Skip(PairCode::J),
        (Many, false, Zero) => Flag(PairCode::K),
        (Many, false, One) => Flag(PairCode::L),
        (Many, false, Many) => Flag(PairCode::M),
    }
}
