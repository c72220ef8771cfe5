//! Error handling utilities for SMTP probe sessions.

use crate::core::models::ReasonCode;
use lettre::transport::smtp::Error as SmtpError;
use std::io;
use thiserror::Error;

/// Where in the session a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStage {
    /// TCP connect, banner and greeting.
    Open,
    /// Any command after the greeting.
    Command,
}

/// Transport-level failure of a probe session. Protocol replies are not errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("connection closed by peer: {0}")]
    Disconnected(String),
    #[error("could not open session: {0}")]
    Connect(String),
    #[error("no response before timeout: {0}")]
    Timeout(String),
    #[error("unexpected session failure: {0}")]
    Other(String),
}

impl SessionError {
    pub fn reason(&self) -> ReasonCode {
        match self {
            SessionError::Disconnected(_) => ReasonCode::Disconnected,
            SessionError::Connect(_) => ReasonCode::ConnectError,
            SessionError::Timeout(_) => ReasonCode::Timeout,
            SessionError::Other(_) => ReasonCode::Error,
        }
    }
}

fn io_error_kind(error: &(dyn std::error::Error + 'static)) -> Option<io::ErrorKind> {
    let mut current = Some(error);
    while let Some(err) = current {
        if let Some(io_err) = err.downcast_ref::<io::Error>() {
            return Some(io_err.kind());
        }
        current = err.source();
    }
    None
}

/// Maps an I/O failure kind onto the session taxonomy.
pub(crate) fn classify_io_error(
    kind: io::ErrorKind,
    stage: SessionStage,
    message: String,
) -> SessionError {
    match kind {
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => SessionError::Timeout(message),
        io::ErrorKind::UnexpectedEof
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::BrokenPipe
        | io::ErrorKind::NotConnected => SessionError::Disconnected(message),
        io::ErrorKind::ConnectionRefused
        | io::ErrorKind::AddrNotAvailable
        | io::ErrorKind::AddrInUse
        | io::ErrorKind::NotFound => SessionError::Connect(message),
        _ if stage == SessionStage::Open => SessionError::Connect(message),
        _ => SessionError::Other(message),
    }
}

/// Interprets a `lettre` SMTP error raised at `stage`.
///
/// Negative replies to commands never reach this function: callers turn them into
/// reply codes first.
pub(crate) fn classify_smtp_error(error: &SmtpError, stage: SessionStage) -> SessionError {
    let message = error.to_string();

    if let Some(kind) = io_error_kind(error) {
        return classify_io_error(kind, stage, message);
    }

    let lower = message.to_lowercase();
    // lettre reports a peer that hung up mid-reply as an incomplete response.
    if lower.contains("incomplete response") || lower.contains("connection closed") {
        return SessionError::Disconnected(message);
    }
    if lower.contains("timed out") {
        return SessionError::Timeout(message);
    }
    if stage == SessionStage::Open {
        // Refused, unreachable, or a banner/greeting the server answered negatively.
        return SessionError::Connect(message);
    }

    tracing::debug!(target: "smtp_task", "Unclassified SMTP error: {}", message);
    SessionError::Other(message)
}
