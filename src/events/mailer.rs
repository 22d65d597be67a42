use async_trait::async_trait;
use lettre::{
    Message, SmtpTransport, Transport, message::Mailbox,
    transport::smtp::authentication::Credentials,
};

use crate::config::Mail;
use crate::events::{MailError, RenderedEmail};

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, email: RenderedEmail) -> Result<(), MailError>;
}

/// Sends mail through an SMTP relay.
#[derive(Clone)]
pub struct SmtpMailer {
    transport: SmtpTransport,
    from: Mailbox,
}

impl std::fmt::Debug for SmtpMailer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpMailer").field("from", &self.from).finish()
    }
}

impl SmtpMailer {
    pub fn new(config: &Mail) -> Result<Self, MailError> {
        let from: Mailbox = format!("{} <{}>", config.from_name(), config.from_email()).parse()?;
        let credentials = Credentials::new(
            config.smtp_username().to_string(),
            config.smtp_password().to_string(),
        );
        let transport = SmtpTransport::relay(config.smtp_host())?
            .credentials(credentials)
            .build();

        Ok(Self { transport, from })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, to: &str, email: RenderedEmail) -> Result<(), MailError> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(to.parse()?)
            .subject(email.subject)
            .body(email.body)?;

        // the smtp transport is blocking
        let transport = self.transport.clone();
        tokio::task::spawn_blocking(move || transport.send(&message)).await??;
        Ok(())
    }
}

/// Writes mail to the log instead of sending it. Used outside production.
#[derive(Debug, Default, Clone)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, to: &str, email: RenderedEmail) -> Result<(), MailError> {
        tracing::info!(%to, subject = %email.subject, "mail (not sent)\n{}", email.body);
        Ok(())
    }
}
