//! Library error type.
//!
//! Per-record failures never surface here: they are folded into reason codes by the
//! pipeline. `AppError` covers setup and I/O boundary problems only.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Initialization error: {0}")]
    Initialization(String),

    #[error("Domain does not exist: {0}")]
    NxDomain(String),

    #[error("No DNS records found: {0}")]
    NoDnsRecords(String),

    #[error("DNS resolver error: {0}")]
    Dns(#[from] trust_dns_resolver::error::ResolveError),

    #[error("SMTP check inconclusive: {0}")]
    SmtpInconclusive(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Record {index} has no '{field}' field")]
    MissingEmailField { index: usize, field: String },
}

pub type Result<T> = std::result::Result<T, AppError>;
