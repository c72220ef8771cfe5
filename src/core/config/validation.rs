//! Contains validation logic for the final Config struct.

use super::{Config, Result};
use crate::core::error::AppError;
use regex::Regex;
use std::net::IpAddr;

/// Validates the configuration after loading and overrides.
/// Recompiles the address pattern and repairs harmless inconsistencies.
pub(crate) fn validate_config(config: &mut Config) -> Result<()> {
    if config.dns_timeout.is_zero() {
        return Err(AppError::Config("DNS timeout must be positive.".to_string()));
    }
    if config.smtp_timeout.is_zero() {
        return Err(AppError::Config(
            "SMTP timeout must be positive.".to_string(),
        ));
    }
    if config.smtp_port == 0 {
        return Err(AppError::Config("SMTP port cannot be 0.".to_string()));
    }
    for server in &config.dns_servers {
        if server.parse::<IpAddr>().is_err() {
            return Err(AppError::Config(format!(
                "DNS server '{}' is not an IP address.",
                server
            )));
        }
    }
    if !config.smtp_sender_email.contains('@') || !config.smtp_sender_email.contains('.') {
        return Err(AppError::Config(format!(
            "Invalid SMTP sender email format: {}",
            config.smtp_sender_email
        )));
    }
    if config.helo_name.is_empty() {
        return Err(AppError::Config("HELO name cannot be empty.".to_string()));
    }

    config.email_regex = Regex::new(&config.email_pattern).map_err(|e| {
        AppError::Config(format!(
            "Invalid email pattern '{}': {}",
            config.email_pattern, e
        ))
    })?;

    if config.email_field.is_empty() || config.reason_field.is_empty() {
        return Err(AppError::Config(
            "Email and reason field names cannot be empty.".to_string(),
        ));
    }
    if config.email_field == config.reason_field {
        return Err(AppError::Config(format!(
            "Email field and reason field are both named '{}'.",
            config.email_field
        )));
    }

    let overlap: Vec<String> = config
        .trusted_providers
        .intersection(&config.disposable_domains)
        .cloned()
        .collect();
    for domain in overlap {
        tracing::warn!(
            "Domain '{}' is listed as both trusted and disposable. Treating it as disposable.",
            domain
        );
        config.trusted_providers.remove(&domain);
    }

    if config.progress_interval == 0 {
        tracing::debug!("Progress logging disabled (interval 0).");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_default_config_is_valid() {
        let mut config = Config::default();
        assert!(validate_config(&mut config).is_ok());
    }

    #[test]
    fn test_rejects_bad_values() {
        let mut config = Config {
            smtp_timeout: Duration::ZERO,
            ..Config::default()
        };
        assert!(validate_config(&mut config).is_err());

        let mut config = Config {
            smtp_sender_email: "nobody".to_string(),
            ..Config::default()
        };
        assert!(validate_config(&mut config).is_err());

        let mut config = Config {
            email_pattern: "([a-z".to_string(),
            ..Config::default()
        };
        assert!(validate_config(&mut config).is_err());

        let mut config = Config {
            dns_servers: vec!["resolver.local".to_string()],
            ..Config::default()
        };
        assert!(validate_config(&mut config).is_err());

        let mut config = Config {
            reason_field: "email".to_string(),
            ..Config::default()
        };
        assert!(validate_config(&mut config).is_err());
    }

    #[test]
    fn test_recompiles_pattern() {
        let mut config = Config {
            email_pattern: r"^[a-z]+@example\.org$".to_string(),
            ..Config::default()
        };
        validate_config(&mut config).unwrap();
        assert!(config.email_regex.is_match("abc@example.org"));
        assert!(!config.email_regex.is_match("abc@example.com"));
    }

    #[test]
    fn test_overlap_resolved_as_disposable() {
        let mut config = Config::default();
        config.trusted_providers.insert("yopmail.com".to_string());
        validate_config(&mut config).unwrap();
        assert!(!config.trusted_providers.contains("yopmail.com"));
        assert!(config.disposable_domains.contains("yopmail.com"));
    }
}
