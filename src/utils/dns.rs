//! MX resolution: the lookup seam, its trust-dns implementation, and preferred-exchange selection.

use crate::core::config::Config;
use crate::core::error::{AppError, Result};

use async_trait::async_trait;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use trust_dns_resolver::config::{NameServerConfigGroup, ResolverConfig, ResolverOpts};
use trust_dns_resolver::error::ResolveErrorKind;
use trust_dns_resolver::proto::op::ResponseCode;
use trust_dns_resolver::TokioAsyncResolver;

/// One MX answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MxRecord {
    pub preference: u16,
    /// Exchange host as returned by the resolver, possibly with a trailing root dot.
    pub exchange: String,
}

/// Source of MX records for a domain.
#[async_trait]
pub trait MxLookup: Send + Sync {
    async fn lookup_mx(&self, domain: &str) -> Result<Vec<MxRecord>>;
}

#[async_trait]
impl MxLookup for TokioAsyncResolver {
    async fn lookup_mx(&self, domain: &str) -> Result<Vec<MxRecord>> {
        match self.mx_lookup(domain).await {
            Ok(lookup) => Ok(lookup
                .iter()
                .map(|mx| MxRecord {
                    preference: mx.preference(),
                    exchange: mx.exchange().to_utf8(),
                })
                .collect()),
            Err(e) => {
                let nxdomain = match e.kind() {
                    ResolveErrorKind::NoRecordsFound { response_code, .. } => {
                        Some(*response_code == ResponseCode::NXDomain)
                    }
                    _ => None,
                };
                match nxdomain {
                    Some(true) => Err(AppError::NxDomain(domain.to_string())),
                    Some(false) => Err(AppError::NoDnsRecords(format!(
                        "no MX records for {}",
                        domain
                    ))),
                    None => Err(AppError::Dns(e)),
                }
            }
        }
    }
}

/// Builds the async resolver used for MX lookups.
///
/// Uses the configured name servers when present, otherwise the system configuration,
/// falling back to Google's public resolvers if that cannot be read.
pub async fn create_resolver(config: &Config) -> Result<TokioAsyncResolver> {
    let (resolver_config, mut opts) = if config.dns_servers.is_empty() {
        match trust_dns_resolver::system_conf::read_system_conf() {
            Ok(system) => {
                tracing::debug!(target: "dns_task", "Using system DNS configuration.");
                system
            }
            Err(e) => {
                tracing::warn!(target: "dns_task",
                    "Could not read system DNS configuration ({}). Falling back to Google DNS.", e);
                (ResolverConfig::google(), ResolverOpts::default())
            }
        }
    } else {
        let ips = config
            .dns_servers
            .iter()
            .map(|s| {
                s.parse::<IpAddr>().map_err(|e| {
                    AppError::Initialization(format!("Invalid DNS server '{}': {}", s, e))
                })
            })
            .collect::<Result<Vec<IpAddr>>>()?;
        tracing::debug!(target: "dns_task", "Using configured DNS servers: {:?}", ips);
        let group = NameServerConfigGroup::from_ips_clear(&ips, 53, true);
        (
            ResolverConfig::from_parts(None, vec![], group),
            ResolverOpts::default(),
        )
    };

    opts.timeout = config.dns_timeout;
    opts.attempts = 1;

    tracing::info!(target: "dns_task",
        "DNS resolver ready (timeout {:?}, {} custom servers).",
        config.dns_timeout,
        config.dns_servers.len()
    );
    Ok(TokioAsyncResolver::tokio(resolver_config, opts))
}

/// Resolves a domain to the host of its most preferred mail exchange.
///
/// Stateless: memoization belongs to the caller.
#[derive(Clone)]
pub struct MxResolver {
    lookup: Arc<dyn MxLookup>,
    timeout: Duration,
}

impl MxResolver {
    pub fn new(lookup: Arc<dyn MxLookup>, timeout: Duration) -> Self {
        Self { lookup, timeout }
    }

    /// Returns the exchange with the lowest preference value, without its trailing dot.
    ///
    /// Every failure (NXDOMAIN, empty answer, timeout, resolver error, null MX) yields
    /// `None`. Among equal preferences the resolver's answer order decides.
    pub async fn preferred_exchange(&self, domain: &str) -> Option<String> {
        tracing::debug!(target: "dns_task", "Resolving MX for {}...", domain);

        let records = match tokio::time::timeout(self.timeout, self.lookup.lookup_mx(domain)).await
        {
            Ok(Ok(records)) => records,
            Ok(Err(e @ AppError::NxDomain(_))) | Ok(Err(e @ AppError::NoDnsRecords(_))) => {
                tracing::info!(target: "dns_task", "No usable MX for {}: {}", domain, e);
                return None;
            }
            Ok(Err(e)) => {
                tracing::warn!(target: "dns_task", "MX lookup failed for {}: {}", domain, e);
                return None;
            }
            Err(_) => {
                tracing::warn!(target: "dns_task",
                    "MX lookup for {} timed out after {:?}", domain, self.timeout);
                return None;
            }
        };

        let best = records.iter().min_by_key(|mx| mx.preference)?;
        let host = best.exchange.trim_end_matches('.');
        if host.is_empty() {
            // RFC 7505 null MX: the domain explicitly accepts no mail.
            tracing::info!(target: "dns_task", "Domain {} publishes a null MX.", domain);
            return None;
        }

        tracing::debug!(target: "dns_task",
            "Preferred MX for {}: {} (preference {})", domain, host, best.preference);
        Some(host.to_string())
    }
}
