//! # Email Sieve Core Library
//!
//! This crate validates harvested contact email addresses and splits the records
//! into a deliverable set and a rejected set, each rejection tagged with a reason code.
//!
//! Every address goes through a cheap local policy filter, an MX lookup, and either the
//! trusted-provider fast path or a live SMTP `RCPT TO` probe. No message is ever sent.
//!
//! It is designed to be used either directly as a library or via the `email-sieve`
//! command-line tool (which uses this library).

mod core;
mod utils;

pub use crate::core::config::{Config, ConfigBuilder, ConfigFile};
pub use crate::core::error::{AppError, Result};
pub use crate::core::models::{
    ContactRecord, EmailAddress, ReasonCode, RunStatistics, VerificationVerdict,
};
pub use crate::core::partition::Partition;
pub use crate::core::sieve::{EmailSieve, ValidationState};
pub use crate::utils::dns::{MxLookup, MxRecord, MxResolver};
pub use crate::utils::policy::{check_address, check_local_part, normalize_email};
pub use crate::utils::smtp::{
    rcpt_verdict, LettreConnector, MailboxProbe, ProbeSession, ProbeSettings, SessionConnector,
    SessionError, SmtpProber,
};

use crate::utils::smtp::test_smtp_connectivity;
use indexmap::IndexMap;
use serde_json::Value;
use std::sync::Arc;

/// Builds the sieve with the system DNS resolver and live SMTP probing.
pub async fn initialize_sieve(config: Arc<Config>) -> Result<EmailSieve> {
    EmailSieve::new(config).await
}

/// Performs an early check for outbound SMTP connectivity.
pub async fn check_smtp_connectivity(config: &Config) -> Result<()> {
    test_smtp_connectivity(config).await
}

fn field_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Turns a parsed JSON document (an array of flat objects) into contact records.
///
/// Field order is kept. Strings are taken as-is, `null` becomes an empty string, and
/// any other value is stored as its JSON text. Every object must carry `email_field`.
pub fn records_from_json(document: Value, email_field: &str) -> Result<Vec<ContactRecord>> {
    let Value::Array(items) = document else {
        return Err(AppError::InvalidInput(
            "expected a JSON array of objects".to_string(),
        ));
    };

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            let Value::Object(map) = item else {
                return Err(AppError::InvalidInput(format!(
                    "record {} is not a JSON object",
                    index
                )));
            };
            let fields: IndexMap<String, String> = map
                .into_iter()
                .map(|(key, value)| (key, field_text(value)))
                .collect();
            ContactRecord::try_from_fields(fields, email_field, index)
        })
        .collect()
}

/// Validates one address with a fresh, single-use state.
pub async fn validate_single_email(sieve: &EmailSieve, email: &str) -> VerificationVerdict {
    let mut state = ValidationState::new();
    sieve.validate(email, &mut state).await
}

/// Validates `records` one at a time, in input order, and partitions them.
///
/// `on_record` is called after each verdict (before the record is filed), which lets
/// callers drive a progress display. Returns the partition and the run's counters.
pub async fn process_records<F>(
    sieve: &EmailSieve,
    records: Vec<ContactRecord>,
    mut on_record: F,
) -> (Partition, RunStatistics)
where
    F: FnMut(&ContactRecord, &VerificationVerdict),
{
    let total_records = records.len();
    let config = sieve.config();
    let mut state = ValidationState::new();
    let mut partition = Partition::new();

    tracing::info!(target: "sieve_task", "Validating {} records sequentially...", total_records);

    for (index, record) in records.into_iter().enumerate() {
        let verdict = sieve.validate_record(&record, &mut state).await;
        on_record(&record, &verdict);
        partition.push(record, &verdict, &config.reason_field);

        let done = index + 1;
        if config.progress_interval > 0 && done % config.progress_interval == 0 {
            let accepted = state.stats().accepted();
            tracing::info!(target: "sieve_task",
                "Progress: {}/{} records, {} accepted ({:.1}%)",
                done,
                total_records,
                accepted,
                accepted as f64 * 100.0 / done as f64
            );
        }
    }

    tracing::info!(target: "sieve_task",
        "Validation done: {} MX lookups, {} mailbox probes.",
        state.resolved_domains(),
        state.probed_addresses()
    );
    (partition, state.into_stats())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::dns::tests::FakeLookup;
    use crate::utils::smtp::ScriptedConnector;
    use serde_json::json;
    use std::time::Duration;

    fn sieve_answering(rcpt_code: u16) -> EmailSieve {
        let config = ConfigBuilder::new()
            .skip_default_files()
            .progress_interval(2)
            .build()
            .expect("config");
        let lookup = FakeLookup::default()
            .with("gmail.com", &[(5, "gmail-smtp-in.l.google.com.")])
            .with("retro-club.fr", &[(10, "mx1.retro-club.fr.")]);
        let prober = SmtpProber::with_connector(
            Arc::new(ScriptedConnector::answering(rcpt_code)),
            ProbeSettings {
                port: 25,
                timeout: Duration::from_secs(8),
                helo_name: "verify.local".to_string(),
                sender: "test@verify.local".to_string(),
            },
        );
        EmailSieve::with_components(Arc::new(config), Arc::new(lookup), Arc::new(prober))
    }

    #[test]
    fn test_records_from_json_keeps_order_and_stringifies() {
        let document = json!([
            {"club": "Retro Club", "email": "a@gmail.com", "members": 42, "site": null},
            {"email": "b@retro-club.fr", "active": true}
        ]);
        let records = records_from_json(document, "email").unwrap();

        let keys: Vec<&str> = records[0].fields().keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["club", "email", "members", "site"]);
        assert_eq!(records[0].get("members"), Some("42"));
        assert_eq!(records[0].get("site"), Some(""));
        assert_eq!(records[1].get("active"), Some("true"));
    }

    #[test]
    fn test_records_from_json_boundary_errors() {
        assert!(matches!(
            records_from_json(json!({"email": "a@b.fr"}), "email"),
            Err(AppError::InvalidInput(_))
        ));
        assert!(matches!(
            records_from_json(json!([{"email": "a@b.fr"}, "oops"]), "email"),
            Err(AppError::InvalidInput(_))
        ));
        assert!(matches!(
            records_from_json(json!([{"email": "a@b.fr"}, {"mail": "c@d.fr"}]), "email"),
            Err(AppError::MissingEmailField { index: 1, .. })
        ));
    }

    #[tokio::test]
    async fn test_process_records_partitions_everything() {
        let sieve = sieve_answering(550);
        let records = records_from_json(
            json!([
                {"club": "A", "email": "a@gmail.com"},
                {"club": "B", "email": "not-an-email"},
                {"club": "C", "email": "ghost@retro-club.fr"},
                {"club": "D", "email": ""},
                {"club": "E", "email": "x@mailinator.com"}
            ]),
            "email",
        )
        .unwrap();
        let total = records.len();

        let mut seen = 0;
        let (partition, stats) = process_records(&sieve, records, |_, _| seen += 1).await;

        assert_eq!(seen, total);
        assert_eq!(partition.len(), total);
        assert_eq!(stats.total(), total);
        assert_eq!(partition.accepted.len(), 1);
        assert_eq!(partition.accepted[0].get("club"), Some("A"));

        let reasons: Vec<&str> = partition
            .rejected
            .iter()
            .map(|r| r.get("reason").unwrap_or_default())
            .collect();
        assert_eq!(reasons, vec!["syntax", "reject_550", "empty", "disposable"]);
    }

    #[tokio::test]
    async fn test_single_email_mode() {
        let sieve = sieve_answering(250);
        assert!(validate_single_email(&sieve, "marie@retro-club.fr")
            .await
            .is_accepted());
        assert_eq!(
            validate_single_email(&sieve, "x@no-such-domain-xyz123.invalid")
                .await
                .reason(),
            ReasonCode::NoMx
        );
    }
}
