//! Mail transport layer.
//!
//! [`OutgoingMail`] is the fully assembled message handed to a [`Mailer`].
//! [`TransportFactory`] turns the system mail settings into a concrete
//! mailer; the default [`LettreTransports`] implementation dispatches on the
//! tagged [`MailProtocol`] variant, one constructor per variant.

pub mod pop3;
pub mod sendmail;
pub mod smtp;

use std::collections::HashMap;

use lettre::message::header::{ContentType, HeaderName, HeaderValue};
use lettre::message::{Mailbox, Message};
use lettre::Address;
use tracing::debug;

use crate::config::{MailProtocol, MailSettings};
use crate::errors::{DispatchError, TransportError};
use crate::models::EmailRecipient;

pub use pop3::PopSmtpMailer;
pub use sendmail::{LocalMailer, SendmailMailer};
pub use smtp::SmtpMailer;

// ---------------------------------------------------------------------------
// Outgoing mail
// ---------------------------------------------------------------------------

/// A fully assembled message, ready for a [`Mailer`].
///
/// Subject and body are already rendered; recipients already reflect any
/// test-destination override.
#[derive(Debug, Clone, Default)]
pub struct OutgoingMail {
    pub from_email: String,
    pub from_name: Option<String>,
    pub reply_to: Option<String>,
    pub to: Vec<EmailRecipient>,
    pub cc: Vec<EmailRecipient>,
    pub bcc: Vec<EmailRecipient>,
    pub headers: HashMap<String, String>,
    pub subject: String,
    pub body: String,
    pub html: bool,
}

// ---------------------------------------------------------------------------
// Mailer
// ---------------------------------------------------------------------------

/// A configured mail channel that can deliver one [`OutgoingMail`].
pub trait Mailer {
    /// Deliver the message. A failure carries the transport diagnostic.
    fn send(&self, mail: &OutgoingMail) -> Result<(), TransportError>;
}

/// Builder of [`Mailer`]s from the system mail settings.
pub trait TransportFactory: Send + Sync {
    /// Configure a mailer for the given protocol.
    ///
    /// `verbose` raises handshake logging where a transport has one (POP
    /// authorization).
    fn create(
        &self,
        protocol: &MailProtocol,
        settings: &MailSettings,
        verbose: bool,
    ) -> Result<Box<dyn Mailer>, DispatchError>;
}

/// The default factory, backed by `lettre` transports.
#[derive(Debug, Default)]
pub struct LettreTransports;

impl TransportFactory for LettreTransports {
    fn create(
        &self,
        protocol: &MailProtocol,
        settings: &MailSettings,
        verbose: bool,
    ) -> Result<Box<dyn Mailer>, DispatchError> {
        debug!(%protocol, "configuring mail transport");
        let mailer: Box<dyn Mailer> = match protocol {
            MailProtocol::Smtp | MailProtocol::Gmail => {
                Box::new(SmtpMailer::from_settings(settings)?)
            }
            MailProtocol::Pop => Box::new(PopSmtpMailer::from_settings(settings, verbose)?),
            MailProtocol::Sendmail => Box::new(SendmailMailer::from_settings(settings)),
            MailProtocol::Mail | MailProtocol::Other => Box::new(LocalMailer::new()),
        };
        Ok(mailer)
    }
}

// ---------------------------------------------------------------------------
// Message assembly
// ---------------------------------------------------------------------------

/// Parse an address/display-name pair into a mailbox. Empty display names
/// are dropped rather than rendered as `"" <addr>`.
fn mailbox(address: &str, name: Option<&str>) -> Result<Mailbox, TransportError> {
    let parsed = address
        .parse::<Address>()
        .map_err(|e| TransportError::InvalidAddress {
            address: address.to_string(),
            detail: e.to_string(),
        })?;
    let name = name.filter(|n| !n.is_empty()).map(str::to_string);
    Ok(Mailbox::new(name, parsed))
}

/// Assemble the MIME message. Output is UTF-8 throughout; the body content
/// type follows the `html` flag.
pub(crate) fn build_message(mail: &OutgoingMail) -> Result<Message, TransportError> {
    let mut builder = Message::builder()
        .from(mailbox(&mail.from_email, mail.from_name.as_deref())?)
        .subject(mail.subject.clone());

    if let Some(ref reply_to) = mail.reply_to {
        builder = builder.reply_to(mailbox(reply_to, None)?);
    }
    for rcpt in &mail.to {
        builder = builder.to(mailbox(&rcpt.email, rcpt.name.as_deref())?);
    }
    for rcpt in &mail.cc {
        builder = builder.cc(mailbox(&rcpt.email, rcpt.name.as_deref())?);
    }
    for rcpt in &mail.bcc {
        builder = builder.bcc(mailbox(&rcpt.email, rcpt.name.as_deref())?);
    }

    let content_type = if mail.html {
        ContentType::TEXT_HTML
    } else {
        ContentType::TEXT_PLAIN
    };

    let mut message = builder
        .header(content_type)
        .body(mail.body.clone())
        .map_err(|e| TransportError::BuildFailed(e.to_string()))?;

    for (name, value) in &mail.headers {
        let header_name = HeaderName::new_from_ascii(name.clone())
            .map_err(|_| TransportError::InvalidHeader(name.clone()))?;
        message
            .headers_mut()
            .insert_raw(HeaderValue::new(header_name, value.clone()));
    }

    Ok(message)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_mail() -> OutgoingMail {
        OutgoingMail {
            from_email: "noreply@example.com".into(),
            from_name: Some("Example".into()),
            reply_to: Some("support@example.com".into()),
            to: vec![EmailRecipient::new("ada@example.com", Some("Ada Lovelace".into()))],
            cc: vec![EmailRecipient::new("cc@example.com", None)],
            bcc: vec![EmailRecipient::new("bcc@example.com", None)],
            headers: HashMap::from([("X-Form-Entry".to_string(), "42".to_string())]),
            subject: "Hello".into(),
            body: "Plain text body".into(),
            html: false,
        }
    }

    #[test]
    fn test_build_message_includes_fields() {
        let message = build_message(&sample_mail()).unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();

        assert!(raw.contains("Subject: Hello"));
        assert!(raw.contains("ada@example.com"));
        assert!(raw.contains("X-Form-Entry: 42"));
        assert!(raw.contains("text/plain"));
        assert!(raw.contains("Plain text body"));
    }

    #[test]
    fn test_build_message_rejects_bad_address() {
        let mut mail = sample_mail();
        mail.to = vec![EmailRecipient::new("not-an-address", None)];
        let result = build_message(&mail);
        assert!(matches!(
            result,
            Err(TransportError::InvalidAddress { ref address, .. }) if address == "not-an-address"
        ));
    }

    #[test]
    fn test_build_message_rejects_bad_header_name() {
        let mut mail = sample_mail();
        mail.headers = HashMap::from([("Bad\nHeader".to_string(), "x".to_string())]);
        let result = build_message(&mail);
        assert!(matches!(result, Err(TransportError::InvalidHeader(_))));
    }

    #[test]
    fn test_mailbox_drops_empty_display_name() {
        let mb = mailbox("ada@example.com", Some("")).unwrap();
        assert!(mb.name.is_none());

        let mb = mailbox("ada@example.com", Some("Ada")).unwrap();
        assert_eq!(mb.name.as_deref(), Some("Ada"));
    }

    #[test]
    fn test_html_flag_switches_content_type() {
        let mut mail = sample_mail();
        mail.headers.clear();
        mail.html = true;
        let raw = String::from_utf8(build_message(&mail).unwrap().formatted()).unwrap();
        assert!(raw.contains("text/html"));
    }
}
