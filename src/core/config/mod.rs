//! Runtime configuration: defaults, the TOML file layout, and the builder that merges them.

mod builder;
mod loading;
mod validation;

pub use builder::ConfigBuilder;
pub(crate) use crate::core::error::Result;

use regex::Regex;
use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;

/// Address shape accepted by the syntax filter.
pub const DEFAULT_EMAIL_PATTERN: &str = r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$";

/// Domains handing out short-lived mailboxes.
pub const DEFAULT_DISPOSABLE_DOMAINS: &[&str] = &[
    "mailinator.com",
    "guerrillamail.com",
    "tempmail.com",
    "yopmail.com",
    "temp-mail.org",
    "getnada.com",
    "trashmail.com",
    "10minutemail.com",
    "fakeinbox.com",
    "sharklasers.com",
    "throwaway.email",
];

/// Large consumer providers accepted once their MX resolves, without an SMTP probe.
pub const DEFAULT_TRUSTED_PROVIDERS: &[&str] = &[
    "gmail.com",
    "yahoo.com",
    "yahoo.fr",
    "hotmail.com",
    "hotmail.fr",
    "outlook.com",
    "outlook.fr",
    "live.com",
    "live.fr",
    "msn.com",
    "orange.fr",
    "wanadoo.fr",
    "free.fr",
    "sfr.fr",
    "laposte.net",
    "neuf.fr",
    "bbox.fr",
    "numericable.fr",
    "aol.com",
    "icloud.com",
    "me.com",
    "mac.com",
    "protonmail.com",
    "gmx.fr",
    "gmx.com",
    "club-internet.fr",
    "cegetel.net",
    "aliceadsl.fr",
    "nordnet.fr",
];

/// Effective settings for a run.
#[derive(Debug, Clone)]
pub struct Config {
    pub dns_timeout: Duration,
    /// Upstream name servers (IP addresses). Empty means system configuration.
    pub dns_servers: Vec<String>,

    pub smtp_timeout: Duration,
    pub smtp_port: u16,
    pub smtp_sender_email: String,
    pub helo_name: String,

    pub email_pattern: String,
    pub email_regex: Regex,
    pub disposable_domains: HashSet<String>,
    pub trusted_providers: HashSet<String>,

    /// Name of the record field holding the address.
    pub email_field: String,
    /// Name of the field appended to rejected records.
    pub reason_field: String,
    /// Log a progress line every N records; 0 disables it.
    pub progress_interval: usize,

    pub loaded_config_path: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dns_timeout: Duration::from_secs(5),
            dns_servers: Vec::new(),
            smtp_timeout: Duration::from_secs(8),
            smtp_port: 25,
            smtp_sender_email: "test@verify.local".to_string(),
            helo_name: "verify.local".to_string(),
            email_pattern: DEFAULT_EMAIL_PATTERN.to_string(),
            email_regex: Regex::new(DEFAULT_EMAIL_PATTERN)
                .expect("default email pattern is a valid regex"),
            disposable_domains: DEFAULT_DISPOSABLE_DOMAINS
                .iter()
                .map(|d| d.to_string())
                .collect(),
            trusted_providers: DEFAULT_TRUSTED_PROVIDERS
                .iter()
                .map(|d| d.to_string())
                .collect(),
            email_field: "email".to_string(),
            reason_field: "reason".to_string(),
            progress_interval: 100,
            loaded_config_path: None,
        }
    }
}

/// On-disk configuration layout. Every key is optional; missing keys keep their defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub dns: DnsSection,
    pub smtp: SmtpSection,
    pub policy: PolicySection,
    pub records: RecordsSection,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DnsSection {
    /// Seconds.
    pub dns_timeout: Option<u64>,
    pub dns_servers: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SmtpSection {
    /// Seconds.
    pub smtp_timeout: Option<u64>,
    pub smtp_port: Option<u16>,
    pub smtp_sender_email: Option<String>,
    pub helo_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PolicySection {
    pub email_pattern: Option<String>,
    /// Replaces the built-in disposable list.
    pub disposable_domains: Option<Vec<String>>,
    /// Added on top of whichever disposable list is in effect.
    pub extra_disposable_domains: Option<Vec<String>>,
    /// Replaces the built-in trusted provider list.
    pub trusted_providers: Option<Vec<String>>,
    pub extra_trusted_providers: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RecordsSection {
    pub email_field: Option<String>,
    pub reason_field: Option<String>,
    pub progress_interval: Option<usize>,
}
