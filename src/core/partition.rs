//! Splits validated records into the accepted and rejected output sets.

use crate::core::models::{ContactRecord, VerificationVerdict};

/// The two output collections of a run, each in input order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Partition {
    pub accepted: Vec<ContactRecord>,
    pub rejected: Vec<ContactRecord>,
}

impl Partition {
    pub fn new() -> Self {
        Self::default()
    }

    /// Files `record` according to `verdict`.
    ///
    /// Accepted records are kept verbatim. Rejected ones get the reason appended as
    /// their last field under `reason_field` (or `reason_field_N` if that name is taken).
    pub fn push(&mut self, record: ContactRecord, verdict: &VerificationVerdict, reason_field: &str) {
        if verdict.is_accepted() {
            self.accepted.push(record);
        } else {
            self.rejected
                .push(record.with_appended(reason_field, verdict.reason().to_string()));
        }
    }

    pub fn len(&self) -> usize {
        self.accepted.len() + self.rejected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
