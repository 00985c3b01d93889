use std::collections::HashSet;

use crate::error::ReconError;
use crate::model::{CandidateRow, ReconciliationUnit};

/// Fold contiguous same-key rows into reconciliation units, lazily.
///
/// The source must keep all rows of a key together. A key that shows up again
/// after another key yields `NonContiguousKey`, and the iterator ends after the
/// first error.
pub struct UnitBuilder<I> {
    rows: I,
    expected_subject_type: i64,
    pending: Option<CandidateRow>,
    seen: HashSet<i64>,
    done: bool,
}

impl<I> UnitBuilder<I>
where
    I: Iterator<Item = Result<CandidateRow, ReconError>>,
{
    pub fn new(rows: I, expected_subject_type: i64) -> Self {
        Self {
            rows,
            expected_subject_type,
            pending: None,
            seen: HashSet::new(),
            done: false,
        }
    }

    fn fail(&mut self, err: ReconError) -> Option<Result<ReconciliationUnit, ReconError>> {
        self.done = true;
        Some(Err(err))
    }
}

impl<I> Iterator for UnitBuilder<I>
where
    I: Iterator<Item = Result<CandidateRow, ReconError>>,
{
    type Item = Result<ReconciliationUnit, ReconError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let first = match self.pending.take() {
            Some(row) => row,
            None => match self.rows.next()? {
                Ok(row) => row,
                Err(e) => return self.fail(e),
            },
        };

        let key = first.reconciliation_key;
        if !self.seen.insert(key) {
            return self.fail(ReconError::NonContiguousKey { key });
        }

        let mut rows = vec![first];
        loop {
            match self.rows.next() {
                None => break,
                Some(Err(e)) => return self.fail(e),
                Some(Ok(row)) if row.reconciliation_key == key => rows.push(row),
                Some(Ok(row)) => {
                    self.pending = Some(row);
                    break;
                }
            }
        }

        Some(Ok(ReconciliationUnit {
            key,
            expected_subject_type: self.expected_subject_type,
            rows,
        }))
    }
}
