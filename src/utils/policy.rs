//! Local, network-free address checks: shape, disposable domains, local-part length.

use crate::core::config::Config;
use crate::core::models::{EmailAddress, ReasonCode};

const MIN_LOCAL_LEN: usize = 2;
const MAX_LOCAL_LEN: usize = 64;

/// Trims and lower-cases a raw address.
pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Runs the shape, local-part ceiling and disposable-domain checks on an already
/// normalized address.
///
/// The first failing check decides the reason. On success the validated address is
/// returned and downstream stages take over; the local-part floor is judged
/// separately by [`check_local_part`].
pub fn check_address(config: &Config, email: &str) -> Result<EmailAddress, ReasonCode> {
    if email.trim().is_empty() {
        return Err(ReasonCode::Empty);
    }

    if !config.email_regex.is_match(email) {
        tracing::trace!("Address failed shape pattern: {}", email);
        return Err(ReasonCode::Syntax);
    }

    if email.contains("..") || email.starts_with('.') || email.contains("@.") {
        tracing::trace!("Address has a misplaced dot: {}", email);
        return Err(ReasonCode::Syntax);
    }

    let address = EmailAddress::from_normalized(email.to_string()).ok_or(ReasonCode::Syntax)?;

    if address.local().len() > MAX_LOCAL_LEN {
        return Err(ReasonCode::LocalInvalid);
    }

    if config.disposable_domains.contains(address.domain()) {
        return Err(ReasonCode::Disposable);
    }

    Ok(address)
}

/// Local part must be 2 to 64 characters long.
///
/// [`check_address`] already rejects over-long local parts. Domain-level outcomes
/// (disposable, no MX, trusted provider) take precedence over a too-short one, so the
/// pipeline only runs this right before probing the mailbox.
pub fn check_local_part(address: &EmailAddress) -> Result<(), ReasonCode> {
    if (MIN_LOCAL_LEN..=MAX_LOCAL_LEN).contains(&address.local().len()) {
        Ok(())
    } else {
        Err(ReasonCode::LocalInvalid)
    }
}

/// Whether `domain` skips the mailbox probe.
pub fn is_trusted_provider(config: &Config, domain: &str) -> bool {
    config.trusted_providers.contains(domain)
}
