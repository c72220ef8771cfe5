//! Provides the SmtpProber, which asks a mail exchange whether it accepts a recipient.

use super::error::SessionError;
use super::result::rcpt_verdict;
use super::session::{LettreConnector, SessionConnector, SessionGuard};
use super::MailboxProbe;
use crate::core::config::Config;
use crate::core::error::{AppError, Result};
use crate::core::models::{EmailAddress, ReasonCode, VerificationVerdict};

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Fixed parameters of every probe session.
#[derive(Debug, Clone)]
pub struct ProbeSettings {
    pub port: u16,
    pub timeout: Duration,
    pub helo_name: String,
    pub sender: String,
}

impl ProbeSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            port: config.smtp_port,
            timeout: config.smtp_timeout,
            helo_name: config.helo_name.clone(),
            sender: config.smtp_sender_email.clone(),
        }
    }
}

/// Runs the connect, greet, MAIL FROM, RCPT TO, QUIT dialogue. No message is ever sent.
#[derive(Clone)]
pub struct SmtpProber {
    connector: Arc<dyn SessionConnector>,
    settings: Arc<ProbeSettings>,
}

impl SmtpProber {
    /// A prober speaking plain SMTP through `lettre`.
    pub fn new(config: &Config) -> Self {
        Self::with_connector(Arc::new(LettreConnector), ProbeSettings::from_config(config))
    }

    pub fn with_connector(connector: Arc<dyn SessionConnector>, settings: ProbeSettings) -> Self {
        Self {
            connector,
            settings: Arc::new(settings),
        }
    }

    /// Blocking probe. Every failure is folded into the verdict.
    pub fn probe_blocking(&self, email: &str, exchange: &str) -> VerificationVerdict {
        run_probe(self.connector.as_ref(), &self.settings, email, exchange)
    }
}

fn run_probe(
    connector: &dyn SessionConnector,
    settings: &ProbeSettings,
    email: &str,
    exchange: &str,
) -> VerificationVerdict {
    let fail = |stage: &str, e: SessionError| {
        tracing::info!(target: "smtp_task",
            "Probe of <{}> via {} failed at {}: {}", email, exchange, stage, e);
        VerificationVerdict::rejected(e.reason())
    };

    let mut session = match connector.open(
        exchange,
        settings.port,
        &settings.helo_name,
        settings.timeout,
    ) {
        Ok(session) => SessionGuard::new(session),
        Err(e) => return fail("connect", e),
    };

    match session.mail_from(&settings.sender) {
        Ok(code) if (200..300).contains(&code) => {}
        Ok(code) => {
            // Some servers refuse the sender yet still answer RCPT truthfully.
            tracing::warn!(target: "smtp_task",
                "MAIL FROM:<{}> refused by {} with {}; continuing to RCPT.",
                settings.sender, exchange, code);
        }
        Err(e) => return fail("MAIL FROM", e),
    }

    let code = match session.rcpt_to(email) {
        Ok(code) => code,
        Err(e) => return fail("RCPT TO", e),
    };
    drop(session);

    let verdict = rcpt_verdict(code);
    tracing::info!(target: "smtp_task",
        "RCPT TO:<{}> answered {} by {} => {}", email, code, exchange, verdict.reason());
    verdict
}

#[async_trait]
impl MailboxProbe for SmtpProber {
    async fn probe(&self, email: &EmailAddress, exchange: &str) -> VerificationVerdict {
        let connector = Arc::clone(&self.connector);
        let settings = Arc::clone(&self.settings);
        let email = email.as_str().to_string();
        let exchange = exchange.to_string();

        // lettre's connection is blocking; keep it off the async workers.
        match tokio::task::spawn_blocking(move || {
            run_probe(connector.as_ref(), &settings, &email, &exchange)
        })
        .await
        {
            Ok(verdict) => verdict,
            Err(e) => {
                tracing::error!(target: "smtp_task", "SMTP probe task failed: {}", e);
                VerificationVerdict::rejected(ReasonCode::Error)
            }
        }
    }
}

/// Tests basic SMTP connectivity to a known reliable server (Google).
/// This helps diagnose if outbound port 25 is generally blocked.
pub async fn test_smtp_connectivity(config: &Config) -> Result<()> {
    let test_server = "gmail-smtp-in.l.google.com";
    tracing::info!(
        "Testing outbound SMTP (port {}) connectivity to {}...",
        config.smtp_port,
        test_server
    );

    let port = config.smtp_port;
    let helo_name = config.helo_name.clone();
    let timeout = config.smtp_timeout;

    let outcome = tokio::task::spawn_blocking(move || {
        LettreConnector
            .open(test_server, port, &helo_name, timeout)
            .map(|session| drop(SessionGuard::new(session)))
    })
    .await
    .map_err(|e| AppError::Initialization(format!("Connectivity check task failed: {}", e)))?;

    match outcome {
        Ok(()) => {
            tracing::info!("SMTP connectivity test successful (connected to {}).", test_server);
            Ok(())
        }
        Err(SessionError::Timeout(msg)) => {
            tracing::error!(
                "SMTP connectivity test timed out connecting to {}. Outbound port {} is likely blocked by ISP, firewall, or network provider.",
                test_server, port
            );
            Err(AppError::SmtpInconclusive(format!(
                "SMTP connection timed out, port {} is likely blocked ({})",
                port, msg
            )))
        }
        Err(e) => {
            tracing::error!("SMTP connectivity test failed against {}: {}", test_server, e);
            Err(AppError::SmtpInconclusive(format!(
                "Connection to {} failed: {}. Check firewall or network settings.",
                test_server, e
            )))
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::utils::smtp::ProbeSession;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Scripted connector: fixed answers for open, MAIL FROM and RCPT TO.
    pub(crate) struct ScriptedConnector {
        pub(crate) open: std::result::Result<(), SessionError>,
        pub(crate) mail_from: std::result::Result<u16, SessionError>,
        pub(crate) rcpt_to: std::result::Result<u16, SessionError>,
        pub(crate) opens: Arc<AtomicUsize>,
        pub(crate) closes: Arc<AtomicUsize>,
        pub(crate) recipients: Arc<Mutex<Vec<String>>>,
    }

    impl ScriptedConnector {
        pub(crate) fn answering(rcpt_code: u16) -> Self {
            Self {
                open: Ok(()),
                mail_from: Ok(250),
                rcpt_to: Ok(rcpt_code),
                opens: Arc::default(),
                closes: Arc::default(),
                recipients: Arc::default(),
            }
        }
    }

    struct ScriptedSession {
        mail_from: std::result::Result<u16, SessionError>,
        rcpt_to: std::result::Result<u16, SessionError>,
        closes: Arc<AtomicUsize>,
        recipients: Arc<Mutex<Vec<String>>>,
    }

    impl ProbeSession for ScriptedSession {
        fn mail_from(&mut self, _sender: &str) -> std::result::Result<u16, SessionError> {
            self.mail_from.clone()
        }

        fn rcpt_to(&mut self, recipient: &str) -> std::result::Result<u16, SessionError> {
            self.recipients.lock().unwrap().push(recipient.to_string());
            self.rcpt_to.clone()
        }

        fn close(&mut self) {
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    impl SessionConnector for ScriptedConnector {
        fn open(
            &self,
            _host: &str,
            _port: u16,
            _helo_name: &str,
            _timeout: Duration,
        ) -> std::result::Result<Box<dyn ProbeSession>, SessionError> {
            self.opens.fetch_add(1, Ordering::SeqCst);
            self.open.clone()?;
            Ok(Box::new(ScriptedSession {
                mail_from: self.mail_from.clone(),
                rcpt_to: self.rcpt_to.clone(),
                closes: Arc::clone(&self.closes),
                recipients: Arc::clone(&self.recipients),
            }))
        }
    }

    fn settings() -> ProbeSettings {
        ProbeSettings {
            port: 25,
            timeout: Duration::from_secs(8),
            helo_name: "verify.local".to_string(),
            sender: "test@verify.local".to_string(),
        }
    }

    fn probe(connector: ScriptedConnector) -> (ReasonCode, usize, usize) {
        let opens = Arc::clone(&connector.opens);
        let closes = Arc::clone(&connector.closes);
        let prober = SmtpProber::with_connector(Arc::new(connector), settings());
        let verdict = prober.probe_blocking("marie.dupont@retro-club.fr", "mx1.retro-club.fr");
        (
            verdict.reason(),
            opens.load(Ordering::SeqCst),
            closes.load(Ordering::SeqCst),
        )
    }

    #[test]
    fn test_accepting_codes() {
        assert_eq!(probe(ScriptedConnector::answering(250)).0, ReasonCode::Ok);
        assert_eq!(probe(ScriptedConnector::answering(251)).0, ReasonCode::Ok);
    }

    #[test]
    fn test_rejecting_codes_carry_the_code() {
        assert_eq!(
            probe(ScriptedConnector::answering(550)).0,
            ReasonCode::Rejected(550)
        );
        assert_eq!(
            probe(ScriptedConnector::answering(451)).0,
            ReasonCode::Rejected(451)
        );
    }

    #[test]
    fn test_refused_sender_still_probes_recipient() {
        let connector = ScriptedConnector {
            mail_from: Ok(553),
            ..ScriptedConnector::answering(250)
        };
        let recipients = Arc::clone(&connector.recipients);
        assert_eq!(probe(connector).0, ReasonCode::Ok);
        assert_eq!(
            *recipients.lock().unwrap(),
            vec!["marie.dupont@retro-club.fr".to_string()]
        );
    }

    #[test]
    fn test_transport_failures() {
        let refused = ScriptedConnector {
            open: Err(SessionError::Connect("refused".into())),
            ..ScriptedConnector::answering(250)
        };
        assert_eq!(probe(refused), (ReasonCode::ConnectError, 1, 0));

        let hung_up = ScriptedConnector {
            rcpt_to: Err(SessionError::Disconnected("eof".into())),
            ..ScriptedConnector::answering(250)
        };
        assert_eq!(probe(hung_up).0, ReasonCode::Disconnected);

        let slow = ScriptedConnector {
            mail_from: Err(SessionError::Timeout("read".into())),
            ..ScriptedConnector::answering(250)
        };
        assert_eq!(probe(slow).0, ReasonCode::Timeout);

        let odd = ScriptedConnector {
            rcpt_to: Err(SessionError::Other("garbage".into())),
            ..ScriptedConnector::answering(250)
        };
        assert_eq!(probe(odd).0, ReasonCode::Error);
    }

    #[test]
    fn test_session_closed_on_every_path() {
        assert_eq!(probe(ScriptedConnector::answering(250)), (ReasonCode::Ok, 1, 1));
        let failing = ScriptedConnector {
            rcpt_to: Err(SessionError::Timeout("read".into())),
            ..ScriptedConnector::answering(250)
        };
        assert_eq!(probe(failing), (ReasonCode::Timeout, 1, 1));
    }

    #[tokio::test]
    async fn test_async_probe_runs_off_the_runtime() {
        let prober =
            SmtpProber::with_connector(Arc::new(ScriptedConnector::answering(550)), settings());
        let email = EmailAddress::from_normalized("jean@retro-club.fr".to_string()).unwrap();
        let verdict = prober.probe(&email, "mx1.retro-club.fr").await;
        assert_eq!(verdict.reason(), ReasonCode::Rejected(550));
    }
}
