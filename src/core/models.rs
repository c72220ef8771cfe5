//! Data types shared by the validation pipeline.

use crate::core::error::{AppError, Result};
use indexmap::IndexMap;
use serde::{Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;

/// One harvested contact row.
///
/// Field order is significant and is carried through to both output sets unchanged.
///
/// Only built through [`ContactRecord::try_from_fields`], so the email field is
/// always present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ContactRecord {
    fields: IndexMap<String, String>,
}

impl ContactRecord {
    /// Builds a record, requiring `email_field` to be present.
    ///
    /// `index` is the position of the record in its input collection and only
    /// serves the error message.
    pub fn try_from_fields(
        fields: IndexMap<String, String>,
        email_field: &str,
        index: usize,
    ) -> Result<Self> {
        if !fields.contains_key(email_field) {
            return Err(AppError::MissingEmailField {
                index,
                field: email_field.to_string(),
            });
        }
        Ok(Self { fields })
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    pub fn fields(&self) -> &IndexMap<String, String> {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Appends `value` after the existing fields under `name`, or under the first
    /// free `name_N` (N >= 2) when `name` is already taken.
    pub(crate) fn with_appended(mut self, name: &str, value: String) -> Self {
        let mut key = name.to_string();
        let mut suffix = 2;
        while self.fields.contains_key(&key) {
            key = format!("{}_{}", name, suffix);
            suffix += 1;
        }
        self.fields.insert(key, value);
        self
    }
}

/// A normalized address that passed the syntax and policy checks.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EmailAddress {
    address: String,
    at: usize,
}

impl EmailAddress {
    /// Wraps an already trimmed, lower-cased `local@domain` string.
    /// Callers are expected to have run the shape checks first.
    pub(crate) fn from_normalized(address: String) -> Option<Self> {
        let at = address.find('@')?;
        if address[at + 1..].contains('@') {
            return None;
        }
        Some(Self { address, at })
    }

    pub fn local(&self) -> &str {
        &self.address[..self.at]
    }

    pub fn domain(&self) -> &str {
        &self.address[self.at + 1..]
    }

    pub fn as_str(&self) -> &str {
        &self.address
    }
}

impl fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.address)
    }
}

/// Closed vocabulary explaining a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ReasonCode {
    Ok,
    Empty,
    Syntax,
    LocalInvalid,
    Disposable,
    NoMx,
    Disconnected,
    ConnectError,
    Timeout,
    Error,
    /// The exchange answered RCPT TO with this code.
    Rejected(u16),
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReasonCode::Ok => f.write_str("ok"),
            ReasonCode::Empty => f.write_str("empty"),
            ReasonCode::Syntax => f.write_str("syntax"),
            ReasonCode::LocalInvalid => f.write_str("local_invalid"),
            ReasonCode::Disposable => f.write_str("disposable"),
            ReasonCode::NoMx => f.write_str("no_mx"),
            ReasonCode::Disconnected => f.write_str("disconnected"),
            ReasonCode::ConnectError => f.write_str("connect_error"),
            ReasonCode::Timeout => f.write_str("timeout"),
            ReasonCode::Error => f.write_str("error"),
            ReasonCode::Rejected(code) => write!(f, "reject_{}", code),
        }
    }
}

impl Serialize for ReasonCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Final outcome for one address. Built once, never mutated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VerificationVerdict {
    accepted: bool,
    reason: ReasonCode,
}

impl VerificationVerdict {
    pub fn accepted() -> Self {
        Self {
            accepted: true,
            reason: ReasonCode::Ok,
        }
    }

    pub fn rejected(reason: ReasonCode) -> Self {
        debug_assert!(reason != ReasonCode::Ok, "rejection needs a failure reason");
        Self {
            accepted: false,
            reason,
        }
    }

    pub fn is_accepted(&self) -> bool {
        self.accepted
    }

    pub fn reason(&self) -> ReasonCode {
        self.reason
    }
}

/// Per-run counters keyed by reason code (`ok` for acceptances).
#[derive(Debug, Clone, Default)]
pub struct RunStatistics {
    counts: HashMap<ReasonCode, usize>,
}

impl RunStatistics {
    pub fn record(&mut self, verdict: &VerificationVerdict) {
        *self.counts.entry(verdict.reason()).or_insert(0) += 1;
    }

    pub fn count(&self, reason: ReasonCode) -> usize {
        self.counts.get(&reason).copied().unwrap_or(0)
    }

    pub fn accepted(&self) -> usize {
        self.count(ReasonCode::Ok)
    }

    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    pub fn rejected(&self) -> usize {
        self.total() - self.accepted()
    }

    /// Rejection reasons with their counts, most frequent first.
    pub fn rejection_breakdown(&self) -> Vec<(ReasonCode, usize)> {
        let mut entries: Vec<(ReasonCode, usize)> = self
            .counts
            .iter()
            .filter(|(reason, _)| **reason != ReasonCode::Ok)
            .map(|(reason, count)| (*reason, *count))
            .collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(pairs: &[(&str, &str)]) -> IndexMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_record_requires_email_field() {
        let err = ContactRecord::try_from_fields(fields(&[("Club", "AC Lyon")]), "Email", 3)
            .unwrap_err();
        assert!(matches!(err, AppError::MissingEmailField { index: 3, .. }));
        assert!(
            ContactRecord::try_from_fields(fields(&[("Email", "")]), "Email", 0).is_ok()
        );
    }

    #[test]
    fn test_record_serializes_as_flat_object() {
        let record = ContactRecord::try_from_fields(
            fields(&[("Club", "AC Lyon"), ("Email", "Contact@AC-Lyon.fr")]),
            "Email",
            0,
        )
        .unwrap();
        assert_eq!(
            serde_json::to_string(&record).unwrap(),
            r#"{"Club":"AC Lyon","Email":"Contact@AC-Lyon.fr"}"#
        );
    }

    #[test]
    fn test_appended_field_keeps_order_and_existing_values() {
        let record = ContactRecord::try_from_fields(
            fields(&[("Club", "AC Lyon"), ("email", "x@y.fr"), ("reason", "imported")]),
            "email",
            0,
        )
        .unwrap();
        let tagged = record.with_appended("reason", "no_mx".to_string());
        let keys: Vec<&str> = tagged.fields().keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["Club", "email", "reason", "reason_2"]);
        assert_eq!(tagged.get("reason"), Some("imported"));
        assert_eq!(tagged.get("reason_2"), Some("no_mx"));
    }

    #[test]
    fn test_reason_code_labels() {
        assert_eq!(ReasonCode::Ok.to_string(), "ok");
        assert_eq!(ReasonCode::LocalInvalid.to_string(), "local_invalid");
        assert_eq!(ReasonCode::ConnectError.to_string(), "connect_error");
        assert_eq!(ReasonCode::Rejected(550).to_string(), "reject_550");
        assert_eq!(
            serde_json::to_string(&ReasonCode::Rejected(451)).unwrap(),
            "\"reject_451\""
        );
    }

    #[test]
    fn test_email_address_parts() {
        let addr = EmailAddress::from_normalized("jean.dupont@club-auto.fr".to_string()).unwrap();
        assert_eq!(addr.local(), "jean.dupont");
        assert_eq!(addr.domain(), "club-auto.fr");
        assert!(EmailAddress::from_normalized("no-at-sign".to_string()).is_none());
        assert!(EmailAddress::from_normalized("a@b@c.fr".to_string()).is_none());
    }

    #[test]
    fn test_statistics_breakdown_sorted_by_count() {
        let mut stats = RunStatistics::default();
        stats.record(&VerificationVerdict::accepted());
        stats.record(&VerificationVerdict::rejected(ReasonCode::NoMx));
        stats.record(&VerificationVerdict::rejected(ReasonCode::Syntax));
        stats.record(&VerificationVerdict::rejected(ReasonCode::Syntax));

        assert_eq!(stats.total(), 4);
        assert_eq!(stats.accepted(), 1);
        assert_eq!(stats.rejected(), 3);
        assert_eq!(
            stats.rejection_breakdown(),
            vec![(ReasonCode::Syntax, 2), (ReasonCode::NoMx, 1)]
        );
    }
}
