//! One SMTP dialogue with a mail exchange, and its `lettre` implementation.

use super::error::{classify_smtp_error, SessionError, SessionStage};

use lettre::transport::smtp::client::SmtpConnection;
use lettre::transport::smtp::commands::{Mail, Rcpt};
use lettre::transport::smtp::extension::ClientId;
use lettre::transport::smtp::response::Code;
use lettre::Address;
use std::ops::{Deref, DerefMut};
use std::str::FromStr;
use std::time::Duration;

/// An open session past the greeting.
///
/// Commands return the server's reply code, positive or negative. `Err` is reserved
/// for transport failures.
pub trait ProbeSession: Send {
    fn mail_from(&mut self, sender: &str) -> Result<u16, SessionError>;
    fn rcpt_to(&mut self, recipient: &str) -> Result<u16, SessionError>;
    /// Sends QUIT if still possible. Must be safe to call more than once.
    fn close(&mut self);
}

/// Opens sessions: connect, read the banner, greet with EHLO and the configured name.
pub trait SessionConnector: Send + Sync {
    fn open(
        &self,
        host: &str,
        port: u16,
        helo_name: &str,
        timeout: Duration,
    ) -> Result<Box<dyn ProbeSession>, SessionError>;
}

/// Owns an open session and closes it when dropped, whatever path the probe took.
pub(crate) struct SessionGuard(Box<dyn ProbeSession>);

impl SessionGuard {
    pub(crate) fn new(session: Box<dyn ProbeSession>) -> Self {
        Self(session)
    }
}

impl Deref for SessionGuard {
    type Target = dyn ProbeSession;

    fn deref(&self) -> &Self::Target {
        self.0.as_ref()
    }
}

impl DerefMut for SessionGuard {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.0.as_mut()
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.0.close();
    }
}

fn code_value(code: Code) -> Result<u16, SessionError> {
    code.to_string()
        .parse::<u16>()
        .map_err(|_| SessionError::Other(format!("Unparseable reply code '{}'", code)))
}

/// Plain-text sessions over `lettre`'s blocking `SmtpConnection`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LettreConnector;

impl SessionConnector for LettreConnector {
    fn open(
        &self,
        host: &str,
        port: u16,
        helo_name: &str,
        timeout: Duration,
    ) -> Result<Box<dyn ProbeSession>, SessionError> {
        let client_id = ClientId::Domain(helo_name.to_string());

        // connect() reads the banner and sends EHLO before returning.
        let conn = SmtpConnection::connect((host, port), Some(timeout), &client_id, None, None)
            .map_err(|e| {
                tracing::warn!(target: "smtp_task",
                    "SMTP connection to {}:{} failed: {}", host, port, e);
                classify_smtp_error(&e, SessionStage::Open)
            })?;

        tracing::debug!(target: "smtp_task", "Session open with {}:{}", host, port);
        Ok(Box::new(LettreSession {
            conn,
            host: host.to_string(),
            closed: false,
        }))
    }
}

struct LettreSession {
    conn: SmtpConnection,
    host: String,
    closed: bool,
}

impl LettreSession {
    fn reply_code<C: std::fmt::Display>(&mut self, command: C) -> Result<u16, SessionError> {
        match self.conn.command(command) {
            Ok(response) => code_value(response.code()),
            Err(e) => match e.status() {
                // A negative reply is an answer, not a failure.
                Some(code) => code_value(code),
                None => {
                    self.closed = true;
                    Err(classify_smtp_error(&e, SessionStage::Command))
                }
            },
        }
    }
}

fn parse_address(raw: &str) -> Result<Address, SessionError> {
    Address::from_str(raw).map_err(|e| SessionError::Other(format!("Invalid address '{}': {}", raw, e)))
}

impl ProbeSession for LettreSession {
    fn mail_from(&mut self, sender: &str) -> Result<u16, SessionError> {
        let sender = parse_address(sender)?;
        tracing::debug!(target: "smtp_task", "MAIL FROM:<{}> to {}", sender, self.host);
        self.reply_code(Mail::new(Some(sender), vec![]))
    }

    fn rcpt_to(&mut self, recipient: &str) -> Result<u16, SessionError> {
        let recipient = parse_address(recipient)?;
        tracing::debug!(target: "smtp_task", "RCPT TO:<{}> to {}", recipient, self.host);
        self.reply_code(Rcpt::new(recipient, vec![]))
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(e) = self.conn.quit() {
            tracing::debug!(target: "smtp_task", "QUIT to {} failed (ignored): {}", self.host, e);
        }
    }
}
