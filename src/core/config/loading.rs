//! Handles loading configuration from files and applying it to the Config struct.

use super::{Config, ConfigFile};
use anyhow::Context;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Loads configuration settings from a TOML file.
/// Returns the parsed `ConfigFile` content.
pub(crate) fn load_config_file(file_path: &str) -> anyhow::Result<ConfigFile> {
    let path = Path::new(file_path);
    if !path.is_file() {
        return Err(anyhow::anyhow!(
            "File not found or is not a file: {}",
            file_path
        ));
    }
    tracing::debug!("Attempting to read config file: {}", file_path);
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read configuration file: {}", file_path))?;

    let config_file_content: ConfigFile = toml::from_str(&content)
        .with_context(|| format!("Failed to parse TOML configuration from {}", file_path))?;

    tracing::debug!("Successfully parsed configuration file: {}", file_path);
    Ok(config_file_content)
}

fn normalized_domains(domains: &[String]) -> HashSet<String> {
    domains
        .iter()
        .map(|d| d.trim().to_lowercase())
        .filter(|d| !d.is_empty())
        .collect()
}

/// Merges the settings present in `file_config` onto `config`.
/// Used both for file contents and for builder overrides.
pub(crate) fn apply_file_config(config: &mut Config, file_config: &ConfigFile) {
    // DNS
    if let Some(timeout) = file_config.dns.dns_timeout {
        config.dns_timeout = Duration::from_secs(timeout);
    }
    if let Some(ref servers) = file_config.dns.dns_servers {
        config.dns_servers = servers
            .iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
    }

    // SMTP
    if let Some(timeout) = file_config.smtp.smtp_timeout {
        config.smtp_timeout = Duration::from_secs(timeout);
    }
    if let Some(port) = file_config.smtp.smtp_port {
        config.smtp_port = port;
    }
    if let Some(ref sender) = file_config.smtp.smtp_sender_email {
        config.smtp_sender_email = sender.trim().to_string();
    }
    if let Some(ref helo) = file_config.smtp.helo_name {
        config.helo_name = helo.trim().to_string();
    }

    // Policy
    if let Some(ref pattern) = file_config.policy.email_pattern {
        config.email_pattern = pattern.clone();
    }
    if let Some(ref domains) = file_config.policy.disposable_domains {
        config.disposable_domains = normalized_domains(domains);
    }
    if let Some(ref domains) = file_config.policy.extra_disposable_domains {
        config.disposable_domains.extend(normalized_domains(domains));
    }
    if let Some(ref domains) = file_config.policy.trusted_providers {
        config.trusted_providers = normalized_domains(domains);
    }
    if let Some(ref domains) = file_config.policy.extra_trusted_providers {
        config.trusted_providers.extend(normalized_domains(domains));
    }

    // Records
    if let Some(ref field) = file_config.records.email_field {
        config.email_field = field.trim().to_string();
    }
    if let Some(ref field) = file_config.records.reason_field {
        config.reason_field = field.trim().to_string();
    }
    if let Some(interval) = file_config.records.progress_interval {
        config.progress_interval = interval;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_and_apply_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[smtp]
smtp_timeout = 12
helo_name = "probe.example.org"

[policy]
extra_disposable_domains = ["  Spam4.ME "]
trusted_providers = ["gmail.com"]

[records]
email_field = "Email"
"#
        )
        .unwrap();

        let parsed = load_config_file(file.path().to_str().unwrap()).unwrap();
        let mut config = Config::default();
        apply_file_config(&mut config, &parsed);

        assert_eq!(config.smtp_timeout, Duration::from_secs(12));
        assert_eq!(config.dns_timeout, Duration::from_secs(5));
        assert_eq!(config.helo_name, "probe.example.org");
        assert!(config.disposable_domains.contains("spam4.me"));
        assert!(config.disposable_domains.contains("mailinator.com"));
        assert_eq!(config.trusted_providers.len(), 1);
        assert_eq!(config.email_field, "Email");
        assert_eq!(config.reason_field, "reason");
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(load_config_file("/definitely/not/here/email-sieve.toml").is_err());
    }

    #[test]
    fn test_malformed_toml_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[smtp\nsmtp_timeout = ").unwrap();
        assert!(load_config_file(file.path().to_str().unwrap()).is_err());
    }
}
