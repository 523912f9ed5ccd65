use crate::error::PriceWatchError;
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use log::info;

pub const DEFAULT_SMTP_SERVER: &str = "smtp.gmail.com";
pub const DEFAULT_SMTP_PORT: u16 = 465;

#[derive(Clone, Default, PartialEq)]
pub struct SmtpSettings {
    pub server: String,
    pub port: u16,
    pub sender: String,
    pub password: String,
    pub receiver: String,
}

impl SmtpSettings {
    /// Every field is needed before a delivery is attempted.
    pub fn is_complete(&self) -> bool {
        self.port != 0
            && [&self.server, &self.sender, &self.password, &self.receiver]
                .iter()
                .all(|field| !field.trim().is_empty())
    }
}

// Password stays out of logs.
impl std::fmt::Debug for SmtpSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpSettings")
            .field("server", &self.server)
            .field("port", &self.port)
            .field("sender", &self.sender)
            .field("password", &if self.password.is_empty() { "" } else { "***" })
            .field("receiver", &self.receiver)
            .finish()
    }
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, subject: &str, body: &str) -> Result<(), PriceWatchError>;
}

/// Implicit-TLS SMTP session, authenticated as the sender.
pub struct SmtpMailer {
    settings: SmtpSettings,
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    pub fn new(settings: SmtpSettings) -> Result<Self, PriceWatchError> {
        if !settings.is_complete() {
            return Err(PriceWatchError::ConfigError(
                "SMTP server, port, sender, password and receiver are all required".to_string(),
            ));
        }

        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.server)?
            .port(settings.port)
            .credentials(Credentials::new(
                settings.sender.clone(),
                settings.password.clone(),
            ))
            .build();

        Ok(Self { settings, transport })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, subject: &str, body: &str) -> Result<(), PriceWatchError> {
        let message = build_message(&self.settings, subject, body)?;
        self.transport.send(message).await?;
        info!("Email '{}' sent to {}", subject, self.settings.receiver);
        Ok(())
    }
}

pub fn build_message(
    settings: &SmtpSettings,
    subject: &str,
    body: &str,
) -> Result<Message, PriceWatchError> {
    Ok(Message::builder()
        .from(settings.sender.parse()?)
        .to(settings.receiver.parse()?)
        .subject(subject)
        .header(ContentType::TEXT_PLAIN)
        .body(body.to_string())?)
}
