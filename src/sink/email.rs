use crate::config::EmailSinkConfig;
use crate::feed::FeedEntry;
use crate::sink::{DeliveryError, Sink};
use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use secrecy::ExposeSecret;

/// Render one entry as an email body fragment.
///
/// Fragments are comma-terminated; a batch body is their plain
/// concatenation.
fn format_fragment(entry: &FeedEntry) -> String {
    format!("《{}》 {},", entry.title, entry.link)
}

/// Build the email body for a batch of entries.
pub fn build_body(batch: &[FeedEntry]) -> String {
    batch.iter().map(format_fragment).collect()
}

/// Transport seam so tests can record messages instead of speaking SMTP.
pub trait EmailTransport: Send {
    fn send_mail(&self, message: &Message) -> Result<(), DeliveryError>;
}

impl EmailTransport for SmtpTransport {
    fn send_mail(&self, message: &Message) -> Result<(), DeliveryError> {
        self.send(message)?;
        Ok(())
    }
}

/// Build the SMTP transport described by the config.
///
/// `smtp_tls = true` uses an implicit-TLS relay connection; otherwise the
/// connection is plain, matching the classic port-25 relay setup.
pub fn smtp_transport(config: &EmailSinkConfig) -> Result<SmtpTransport, DeliveryError> {
    let builder = if config.smtp_tls {
        SmtpTransport::relay(&config.smtp_host)?
    } else {
        SmtpTransport::builder_dangerous(&config.smtp_host)
    };

    let mut builder = builder.port(config.smtp_port);
    if let (Some(username), Some(password)) = (&config.username, &config.password) {
        builder = builder.credentials(Credentials::new(
            username.clone(),
            password.expose_secret().to_string(),
        ));
    }
    Ok(builder.build())
}

/// Sends one email per batch, with fixed subject, sender, and recipient.
pub struct EmailSink<T: EmailTransport> {
    name: String,
    transport: T,
    from: Mailbox,
    to: Mailbox,
    subject: String,
}

impl<T: EmailTransport> std::fmt::Debug for EmailSink<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailSink")
            .field("name", &self.name)
            .field("from", &self.from)
            .field("to", &self.to)
            .field("subject", &self.subject)
            .finish_non_exhaustive()
    }
}

impl EmailSink<SmtpTransport> {
    /// Build the sink and its SMTP transport from config.
    pub fn from_config(name: String, config: &EmailSinkConfig) -> Result<Self, DeliveryError> {
        let transport = smtp_transport(config)?;
        Self::new(
            name,
            transport,
            &config.from,
            &config.to,
            config.subject.clone(),
        )
    }
}

impl<T: EmailTransport> EmailSink<T> {
    pub fn new(
        name: String,
        transport: T,
        from: &str,
        to: &str,
        subject: String,
    ) -> Result<Self, DeliveryError> {
        Ok(Self {
            name,
            transport,
            from: from.parse()?,
            to: to.parse()?,
            subject,
        })
    }
}

#[async_trait]
impl<T: EmailTransport> Sink for EmailSink<T> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn deliver(&mut self, batch: Vec<FeedEntry>) -> Result<(), DeliveryError> {
        if batch.is_empty() {
            return Ok(());
        }

        let message = Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(self.subject.clone())
            .body(build_body(&batch))?;

        self.transport.send_mail(&message)?;

        tracing::info!(
            sink = %self.name,
            to = %self.to,
            entries = batch.len(),
            "Email sent"
        );
        Ok(())
    }
}
