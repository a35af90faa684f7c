//! Local delivery via the sendmail interface.
//!
//! [`SendmailMailer`] drives the configured sendmail binary; [`LocalMailer`]
//! hands the message to the system MTA and is the fallback for protocols we
//! do not recognize.

use lettre::{SendmailTransport, Transport};
use tracing::debug;

use crate::config::MailSettings;
use crate::errors::TransportError;

use super::{build_message, Mailer, OutgoingMail};

/// Mailer backed by the sendmail binary.
pub struct SendmailMailer {
    transport: SendmailTransport,
}

impl SendmailMailer {
    /// Use the configured sendmail binary path, or the system default when
    /// none is set.
    pub fn from_settings(settings: &MailSettings) -> Self {
        let transport = match MailSettings::non_empty(&settings.sendmail_command) {
            Some(command) => {
                debug!(command, "configuring sendmail transport");
                SendmailTransport::new_with_command(command.to_string())
            }
            None => {
                debug!("configuring sendmail transport with system default");
                SendmailTransport::new()
            }
        };
        Self { transport }
    }
}

impl Mailer for SendmailMailer {
    fn send(&self, mail: &OutgoingMail) -> Result<(), TransportError> {
        let message = build_message(mail)?;
        debug!(subject = %mail.subject, "sending message via sendmail");
        self.transport
            .send(&message)
            .map_err(|e| TransportError::SendFailed(e.to_string()))
    }
}

/// Mailer that hands the message to the local MTA.
pub struct LocalMailer {
    transport: SendmailTransport,
}

impl LocalMailer {
    pub fn new() -> Self {
        debug!("configuring local mail transport");
        Self {
            transport: SendmailTransport::new(),
        }
    }
}

impl Default for LocalMailer {
    fn default() -> Self {
        Self::new()
    }
}

impl Mailer for LocalMailer {
    fn send(&self, mail: &OutgoingMail) -> Result<(), TransportError> {
        let message = build_message(mail)?;
        debug!(subject = %mail.subject, "sending message via local MTA");
        self.transport
            .send(&message)
            .map_err(|e| TransportError::SendFailed(e.to_string()))
    }
}
