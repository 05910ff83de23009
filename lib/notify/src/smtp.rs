//! SMTP delivery of arrival notices.

use crate::error::NotifyError;
use crate::notice::ArrivalNotice;
use crate::notifier::ArrivalNotifier;
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use tracing::{debug, instrument};

/// How the connection to the SMTP server is secured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SmtpSecurity {
    /// Plain connection upgraded with STARTTLS (usually port 587).
    #[default]
    StartTls,
    /// TLS from the first byte (usually port 465).
    Implicit,
}

/// SMTP configuration.
#[derive(Clone, Deserialize)]
pub struct SmtpConfig {
    /// SMTP server host name.
    #[serde(default = "default_host")]
    pub host: String,

    /// SMTP server port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Connection security.
    #[serde(default)]
    pub security: SmtpSecurity,

    /// Account used to authenticate; also the sender unless `from` is set.
    pub username: String,

    /// Password for `username`.
    pub password: String,

    /// Optional sender mailbox, e.g. `Gate <gate@example.com>`.
    #[serde(default)]
    pub from: Option<String>,

    /// Mailbox that receives every arrival notice.
    pub recipient: String,

    /// Timeout for a single send, in seconds.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

fn default_host() -> String {
    "smtp.gmail.com".to_string()
}

fn default_port() -> u16 {
    587
}

fn default_timeout_seconds() -> u64 {
    20
}

impl fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("security", &self.security)
            .field("username", &self.username)
            .field("password", &"[redacted]")
            .field("from", &self.from)
            .field("recipient", &self.recipient)
            .field("timeout_seconds", &self.timeout_seconds)
            .finish()
    }
}

/// Sends arrival notices by email to a single recipient.
#[derive(Clone)]
pub struct SmtpArrivalNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    recipient: Mailbox,
}

impl SmtpArrivalNotifier {
    /// Creates a notifier from configuration.
    ///
    /// No connection is made until the first notice is sent.
    ///
    /// # Errors
    ///
    /// Returns an error if an address cannot be parsed or the relay host is
    /// not usable for TLS.
    pub fn new(config: &SmtpConfig) -> Result<Self, NotifyError> {
        let from_text = config.from.as_deref().unwrap_or(&config.username);
        let from: Mailbox = from_text
            .parse()
            .map_err(|e: lettre::address::AddressError| NotifyError::InvalidAddress {
                field: "sender",
                reason: e.to_string(),
            })?;
        let recipient: Mailbox = config.recipient.parse().map_err(
            |e: lettre::address::AddressError| NotifyError::InvalidAddress {
                field: "recipient",
                reason: e.to_string(),
            },
        )?;

        let builder = match config.security {
            SmtpSecurity::StartTls => {
                AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            }
            SmtpSecurity::Implicit => AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host),
        }
        .map_err(|e| NotifyError::InvalidTransport {
            reason: e.to_string(),
        })?;

        let transport = builder
            .port(config.port)
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .timeout(Some(Duration::from_secs(config.timeout_seconds)))
            .build();

        Ok(Self {
            transport,
            from,
            recipient,
        })
    }

    fn compose(&self, notice: &ArrivalNotice) -> Result<Message, NotifyError> {
        Message::builder()
            .from(self.from.clone())
            .to(self.recipient.clone())
            .subject(notice.subject())
            .header(ContentType::TEXT_PLAIN)
            .body(notice.body())
            .map_err(|e| NotifyError::BuildFailed {
                reason: e.to_string(),
            })
    }
}

#[async_trait]
impl ArrivalNotifier for SmtpArrivalNotifier {
    #[instrument(skip_all, fields(dni = %notice.dni, recipient = %self.recipient))]
    async fn notify(&self, notice: &ArrivalNotice) -> Result<(), NotifyError> {
        let message = self.compose(notice)?;
        let response = self
            .transport
            .send(message)
            .await
            .map_err(|e| NotifyError::TransportFailed {
                reason: e.to_string(),
            })?;
        debug!(code = %response.code(), "arrival notice accepted");
        Ok(())
    }
}
