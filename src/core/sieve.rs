use crate::core::config::Config;
use crate::core::error::Result;
use crate::core::models::{ContactRecord, ReasonCode, RunStatistics, VerificationVerdict};
use crate::utils::dns::{create_resolver, MxLookup, MxResolver};
use crate::utils::policy::{check_address, check_local_part, is_trusted_provider, normalize_email};
use crate::utils::smtp::{MailboxProbe, SmtpProber};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

/// Per-run memory of the pipeline: MX answers by domain, probe verdicts by address,
/// and outcome counters.
///
/// Owned by the caller and lent to each validation call. Nothing here outlives the run.
#[derive(Debug, Default)]
pub struct ValidationState {
    domain_cache: HashMap<String, Option<String>>,
    probe_cache: HashMap<String, VerificationVerdict>,
    stats: RunStatistics,
}

impl ValidationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> &RunStatistics {
        &self.stats
    }

    pub fn into_stats(self) -> RunStatistics {
        self.stats
    }

    /// Cached preferred exchange for `domain`: `Some(None)` means "known to have none".
    pub fn cached_exchange(&self, domain: &str) -> Option<Option<&str>> {
        self.domain_cache.get(domain).map(Option::as_deref)
    }

    pub fn cached_verdict(&self, email: &str) -> Option<VerificationVerdict> {
        self.probe_cache.get(email).copied()
    }

    pub fn resolved_domains(&self) -> usize {
        self.domain_cache.len()
    }

    pub fn probed_addresses(&self) -> usize {
        self.probe_cache.len()
    }
}

/// The validation pipeline: policy filter, MX resolution, trusted fast path, mailbox probe.
#[derive(Clone)]
pub struct EmailSieve {
    config: Arc<Config>,
    resolver: MxResolver,
    prober: Arc<dyn MailboxProbe>,
}

impl EmailSieve {
    /// Creates a sieve backed by the system resolver and live SMTP probing.
    pub async fn new(config: Arc<Config>) -> Result<Self> {
        tracing::debug!("Initializing EmailSieve components...");
        let resolver = create_resolver(&config).await?;
        tracing::debug!("DNS resolver initialized.");
        let prober = SmtpProber::new(&config);
        tracing::debug!("SMTP prober initialized.");

        tracing::info!("EmailSieve initialized successfully.");
        Ok(Self::with_components(
            config,
            Arc::new(resolver),
            Arc::new(prober),
        ))
    }

    /// Assembles a sieve from explicit collaborators.
    pub fn with_components(
        config: Arc<Config>,
        lookup: Arc<dyn MxLookup>,
        prober: Arc<dyn MailboxProbe>,
    ) -> Self {
        let resolver = MxResolver::new(lookup, config.dns_timeout);
        Self {
            config,
            resolver,
            prober,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Validates the email field of `record`. A blank field is rejected as `empty`.
    pub async fn validate_record(
        &self,
        record: &ContactRecord,
        state: &mut ValidationState,
    ) -> VerificationVerdict {
        let raw = record.get(&self.config.email_field).unwrap_or_default();
        self.validate(raw, state).await
    }

    /// Runs one raw address through the pipeline and counts the outcome exactly once.
    pub async fn validate(&self, raw_email: &str, state: &mut ValidationState) -> VerificationVerdict {
        let start = Instant::now();
        let email = normalize_email(raw_email);
        let verdict = self.evaluate(&email, state).await;
        state.stats.record(&verdict);

        tracing::debug!(target: "validate_record",
            "<{}> => {} ({} in {:.2?})",
            email,
            verdict.reason(),
            if verdict.is_accepted() { "accepted" } else { "rejected" },
            start.elapsed()
        );
        verdict
    }

    async fn evaluate(&self, email: &str, state: &mut ValidationState) -> VerificationVerdict {
        let address = match check_address(&self.config, email) {
            Ok(address) => address,
            Err(reason) => return VerificationVerdict::rejected(reason),
        };
        let domain = address.domain();

        let exchange = match state.domain_cache.get(domain) {
            Some(cached) => {
                tracing::trace!(target: "sieve_task", "MX cache hit for {}", domain);
                cached.clone()
            }
            None => {
                let resolved = self.resolver.preferred_exchange(domain).await;
                state
                    .domain_cache
                    .insert(domain.to_string(), resolved.clone());
                resolved
            }
        };
        let Some(exchange) = exchange else {
            return VerificationVerdict::rejected(ReasonCode::NoMx);
        };

        if is_trusted_provider(&self.config, domain) {
            tracing::debug!(target: "sieve_task",
                "{} is a trusted provider; skipping mailbox probe for <{}>", domain, email);
            return VerificationVerdict::accepted();
        }

        if let Err(reason) = check_local_part(&address) {
            return VerificationVerdict::rejected(reason);
        }

        if let Some(verdict) = state.probe_cache.get(email) {
            tracing::trace!(target: "sieve_task", "Probe cache hit for <{}>", email);
            return *verdict;
        }

        tracing::debug!(target: "sieve_task", "Probing <{}> via {}", email, exchange);
        let verdict = self.prober.probe(&address, &exchange).await;
        state.probe_cache.insert(email.to_string(), verdict);
        verdict
    }
}
