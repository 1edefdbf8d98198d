#[cfg(feature = "web")]
use crate::config::SmtpSettings;
#[cfg(feature = "web")]
use crate::error::{DashboardError, Result};
#[cfg(feature = "web")]
use lettre::message::header::ContentType;
#[cfg(feature = "web")]
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
#[cfg(feature = "web")]
use lettre::transport::smtp::authentication::Credentials;
#[cfg(feature = "web")]
use lettre::{Message, SmtpTransport, Transport};
#[cfg(feature = "web")]
use log::info;

/// A file attached to a report email
#[cfg(feature = "web")]
#[derive(Clone, Debug)]
pub struct MailAttachment {
    pub filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

#[cfg(feature = "web")]
pub struct Mailer {
    smtp: SmtpTransport,
    from: Mailbox,
}

#[cfg(feature = "web")]
impl Mailer {
    /// Connect settings for the configured relay
    ///
    /// Port 465 uses implicit TLS, any other port STARTTLS. Credentials are
    /// only sent when a username is configured.
    pub fn new(settings: &SmtpSettings) -> Result<Self> {
        if !settings.is_configured() {
            return Err(DashboardError::Mail("mail relay is not configured".to_string()));
        }

        let relay = if settings.port == 465 {
            SmtpTransport::relay(&settings.host)
        } else {
            SmtpTransport::starttls_relay(&settings.host)
        };
        let builder = relay.map_err(mail_err)?.port(settings.port);

        let builder = if settings.username.is_empty() {
            builder
        } else {
            builder.credentials(Credentials::new(
                settings.username.clone(),
                settings.password.clone(),
            ))
        };

        Ok(Mailer {
            smtp: builder.build(),
            from: settings.from.parse().map_err(mail_err)?,
        })
    }

    pub fn send_report(
        &self,
        to: &str,
        subject: &str,
        body: &str,
        attachments: &[MailAttachment],
    ) -> Result<()> {
        let email = build_report_message(&self.from, to, subject, body, attachments)?;
        self.smtp.send(&email).map_err(mail_err)?;
        info!("Sent report {:?} to {}", subject, to);
        Ok(())
    }
}

/// Assemble a plain text email with attachments
#[cfg(feature = "web")]
pub fn build_report_message(
    from: &Mailbox,
    to: &str,
    subject: &str,
    body: &str,
    attachments: &[MailAttachment],
) -> Result<Message> {
    let mut parts = MultiPart::mixed().singlepart(SinglePart::plain(body.to_string()));
    for attachment in attachments {
        let content_type = ContentType::parse(&attachment.content_type).map_err(mail_err)?;
        parts = parts.singlepart(
            Attachment::new(attachment.filename.clone())
                .body(attachment.data.clone(), content_type),
        );
    }

    Message::builder()
        .from(from.clone())
        .to(to.parse().map_err(mail_err)?)
        .subject(subject)
        .multipart(parts)
        .map_err(mail_err)
}

#[cfg(feature = "web")]
fn mail_err<E: std::fmt::Display>(e: E) -> DashboardError {
    DashboardError::Mail(e.to_string())
}
