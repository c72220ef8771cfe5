//! SMTP mailbox probing.

mod client;
mod error;
mod result;
mod session;

pub use client::{test_smtp_connectivity, ProbeSettings, SmtpProber};
pub use error::SessionError;
pub use result::rcpt_verdict;
pub use session::{LettreConnector, ProbeSession, SessionConnector};

#[cfg(test)]
pub(crate) use client::tests::ScriptedConnector;

use crate::core::models::{EmailAddress, VerificationVerdict};
use async_trait::async_trait;

/// Asks the exchange whether it would accept mail for an address.
///
/// Never fails: transport problems come back as rejections with a reason code.
#[async_trait]
pub trait MailboxProbe: Send + Sync {
    async fn probe(&self, email: &EmailAddress, exchange: &str) -> VerificationVerdict;
}
