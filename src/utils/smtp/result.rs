//! Turns the exchange's answer to RCPT TO into a verdict.

use crate::core::models::{ReasonCode, VerificationVerdict};

/// Replies to RCPT TO that count as "recipient accepted".
pub const ACCEPTED_RCPT_CODES: [u16; 2] = [250, 251];

/// Strict reading: only 250 and 251 accept. Everything else, greylisting 4xx
/// included, is a rejection carrying the code.
pub fn rcpt_verdict(code: u16) -> VerificationVerdict {
    if ACCEPTED_RCPT_CODES.contains(&code) {
        VerificationVerdict::accepted()
    } else {
        VerificationVerdict::rejected(ReasonCode::Rejected(code))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rcpt_codes() {
        assert!(rcpt_verdict(250).is_accepted());
        assert!(rcpt_verdict(251).is_accepted());
        assert_eq!(rcpt_verdict(252).reason(), ReasonCode::Rejected(252));
        assert_eq!(rcpt_verdict(450).reason(), ReasonCode::Rejected(450));
        assert_eq!(rcpt_verdict(550).reason(), ReasonCode::Rejected(550));
    }
}
