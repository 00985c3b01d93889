//! Output seam: where decided rows go.
//!
//! Writes are fire-and-forget until `commit`; nothing written in a run is
//! visible to storage reads before then.

use crate::error::ReconError;
use crate::model::{AssociationRecord, AuxLinkRecord, DiscrepancyReport};

pub trait Sink {
    fn associate(&mut self, record: AssociationRecord) -> Result<(), ReconError>;
    fn aux_link(&mut self, record: AuxLinkRecord) -> Result<(), ReconError>;
    fn report(&mut self, report: DiscrepancyReport) -> Result<(), ReconError>;
    /// Make everything written so far durable.
    fn commit(&mut self) -> Result<(), ReconError>;
}

/// In-memory sink. Used for dry runs and tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub associations: Vec<AssociationRecord>,
    pub aux_links: Vec<AuxLinkRecord>,
    pub reports: Vec<DiscrepancyReport>,
    pub commits: usize,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Sink for MemorySink {
    fn associate(&mut self, record: AssociationRecord) -> Result<(), ReconError> {
        self.associations.push(record);
        Ok(())
    }

    fn aux_link(&mut self, record: AuxLinkRecord) -> Result<(), ReconError> {
        self.aux_links.push(record);
        Ok(())
    }

    fn report(&mut self, report: DiscrepancyReport) -> Result<(), ReconError> {
        self.reports.push(report);
        Ok(())
    }

    fn commit(&mut self) -> Result<(), ReconError> {
        self.commits += 1;
        Ok(())
    }
}

impl<S: Sink + ?Sized> Sink for &mut S {
    fn associate(&mut self, record: AssociationRecord) -> Result<(), ReconError> {
        (**self).associate(record)
    }

    fn aux_link(&mut self, record: AuxLinkRecord) -> Result<(), ReconError> {
        (**self).aux_link(record)
    }

    fn report(&mut self, report: DiscrepancyReport) -> Result<(), ReconError> {
        (**self).report(report)
    }

    fn commit(&mut self) -> Result<(), ReconError> {
        (**self).commit()
    }
}
