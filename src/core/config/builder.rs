//! Provides the `ConfigBuilder` for fluent configuration construction.

use super::loading::{apply_file_config, load_config_file};
use super::validation::validate_config;
use super::{Config, ConfigFile, Result};
use crate::AppError;
use std::path::Path;
use std::time::Duration;

/// Builder pattern for creating `Config` instances fluently.
///
/// Handles loading from files, applying overrides, and validation.
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
    config_file_path: Option<String>,
    skip_default_files: bool,
    overrides: ConfigFile,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Specify an optional configuration file path to load.
    pub fn config_file(mut self, path: impl Into<String>) -> Self {
        self.config_file_path = Some(path.into());
        self
    }

    /// Do not look for `./email-sieve.toml` or `./config.toml` when no file was given.
    pub fn skip_default_files(mut self) -> Self {
        self.skip_default_files = true;
        self
    }

    pub fn dns_timeout(mut self, duration: Duration) -> Self {
        self.overrides.dns.dns_timeout = Some(duration.as_secs());
        self
    }
    pub fn dns_servers(mut self, servers: Vec<String>) -> Self {
        self.overrides.dns.dns_servers = Some(servers);
        self
    }
    pub fn smtp_timeout(mut self, duration: Duration) -> Self {
        self.overrides.smtp.smtp_timeout = Some(duration.as_secs());
        self
    }
    pub fn smtp_port(mut self, port: u16) -> Self {
        self.overrides.smtp.smtp_port = Some(port);
        self
    }
    pub fn smtp_sender_email(mut self, value: impl Into<String>) -> Self {
        self.overrides.smtp.smtp_sender_email = Some(value.into());
        self
    }
    pub fn helo_name(mut self, value: impl Into<String>) -> Self {
        self.overrides.smtp.helo_name = Some(value.into());
        self
    }
    pub fn email_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.overrides.policy.email_pattern = Some(pattern.into());
        self
    }
    pub fn disposable_domains(mut self, domains: Vec<String>) -> Self {
        self.overrides.policy.disposable_domains = Some(domains);
        self
    }
    pub fn extra_disposable_domains(mut self, domains: Vec<String>) -> Self {
        self.overrides.policy.extra_disposable_domains = Some(domains);
        self
    }
    pub fn trusted_providers(mut self, domains: Vec<String>) -> Self {
        self.overrides.policy.trusted_providers = Some(domains);
        self
    }
    pub fn extra_trusted_providers(mut self, domains: Vec<String>) -> Self {
        self.overrides.policy.extra_trusted_providers = Some(domains);
        self
    }
    pub fn email_field(mut self, name: impl Into<String>) -> Self {
        self.overrides.records.email_field = Some(name.into());
        self
    }
    pub fn reason_field(mut self, name: impl Into<String>) -> Self {
        self.overrides.records.reason_field = Some(name.into());
        self
    }
    pub fn progress_interval(mut self, every: usize) -> Self {
        self.overrides.records.progress_interval = Some(every);
        self
    }

    /// Builds the final `Config`: defaults, then file settings, then overrides, then validation.
    pub fn build(mut self) -> Result<Config> {
        let mut loaded_path: Option<String> = None;

        if let Some(ref path) = self.config_file_path {
            match load_config_file(path) {
                Ok(file_config) => {
                    apply_file_config(&mut self.config, &file_config);
                    loaded_path = Some(path.clone());
                    tracing::info!("Loaded base configuration from specified file: {}", path);
                }
                Err(e) => {
                    tracing::error!("Failed to load specified config file '{}': {}", path, e);
                    return Err(AppError::Config(format!(
                        "Failed to load specified configuration file '{}': {}",
                        path, e
                    )));
                }
            }
        } else if !self.skip_default_files {
            tracing::debug!("No config file specified, checking default locations.");
            for path_str in ["./email-sieve.toml", "./config.toml"] {
                if !Path::new(path_str).exists() {
                    continue;
                }
                match load_config_file(path_str) {
                    Ok(file_config) => {
                        apply_file_config(&mut self.config, &file_config);
                        loaded_path = Some(path_str.to_string());
                        tracing::info!(
                            "Loaded base configuration from default location: {}",
                            path_str
                        );
                        break;
                    }
                    Err(e) => {
                        tracing::warn!(
                            "Failed to load or parse default config '{}': {}",
                            path_str,
                            e
                        );
                    }
                }
            }
            if loaded_path.is_none() {
                tracing::info!("No configuration file found. Using default values and overrides.");
            }
        }

        apply_file_config(&mut self.config, &self.overrides);
        self.config.loaded_config_path = loaded_path;
        validate_config(&mut self.config)?;

        tracing::debug!("Final configuration built successfully.");
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_overrides_win_over_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[dns]\ndns_timeout = 9\n[smtp]\nsmtp_timeout = 20").unwrap();

        let config = ConfigBuilder::new()
            .config_file(file.path().to_str().unwrap())
            .smtp_timeout(Duration::from_secs(3))
            .email_field("Email")
            .build()
            .unwrap();

        assert_eq!(config.dns_timeout, Duration::from_secs(9));
        assert_eq!(config.smtp_timeout, Duration::from_secs(3));
        assert_eq!(config.email_field, "Email");
        assert!(config.loaded_config_path.is_some());
    }

    #[test]
    fn test_missing_explicit_file_fails() {
        let result = ConfigBuilder::new()
            .config_file("/no/such/dir/email-sieve.toml")
            .build();
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn test_invalid_override_fails_validation() {
        let result = ConfigBuilder::new()
            .skip_default_files()
            .smtp_sender_email("not-an-address")
            .build();
        assert!(result.is_err());
    }
}
