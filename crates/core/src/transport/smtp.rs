//! SMTP mailer configuration.
//!
//! Applies the system mail settings to a blocking `lettre` SMTP transport:
//! credentials when the server requires auth, TLS mode, host, port, and
//! timeout. Used directly for the SMTP and Gmail protocols and reused by the
//! POP-before-SMTP mailer after authorization.

use std::time::Duration;

use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::transport::smtp::PoolConfig;
use lettre::{SmtpTransport, Transport};
use tracing::debug;

use crate::config::{MailSettings, SecureTransport};
use crate::errors::{DispatchError, TransportError};

use super::{build_message, Mailer, OutgoingMail};

/// Blocking SMTP mailer.
pub struct SmtpMailer {
    transport: SmtpTransport,
}

impl SmtpMailer {
    /// Configure an SMTP transport from the system mail settings.
    ///
    /// Requires host and port; requires non-empty username and password when
    /// `smtp_auth` is set. The timeout defaults when unset.
    pub fn from_settings(settings: &MailSettings) -> Result<Self, DispatchError> {
        let host = MailSettings::require(&settings.host, "host")?;
        let port = settings.require_port()?;
        let timeout = Duration::from_secs(settings.timeout_secs());

        debug!(
            host,
            port,
            timeout_secs = settings.timeout_secs(),
            auth = settings.smtp_auth,
            keep_alive = settings.smtp_keep_alive,
            tls = ?settings.smtp_secure_transport_type,
            "configuring SMTP transport"
        );

        let mut builder = SmtpTransport::builder_dangerous(host)
            .port(port)
            .timeout(Some(timeout));

        if settings.smtp_auth {
            let username = MailSettings::require(&settings.username, "username")?;
            let password = MailSettings::require(&settings.password, "password")?;
            builder = builder.credentials(Credentials::new(
                username.to_string(),
                password.to_string(),
            ));
        }

        builder = match settings.smtp_secure_transport_type {
            SecureTransport::None => builder.tls(Tls::None),
            SecureTransport::Ssl => builder.tls(Tls::Wrapper(tls_parameters(host)?)),
            SecureTransport::Tls => builder.tls(Tls::Required(tls_parameters(host)?)),
        };

        // Connection reuse across sends on this mailer rides on the
        // transport pool; without keep-alive, cap it at one connection.
        builder = if settings.smtp_keep_alive {
            builder.pool_config(PoolConfig::new())
        } else {
            builder.pool_config(PoolConfig::new().max_size(1))
        };

        Ok(Self {
            transport: builder.build(),
        })
    }
}

fn tls_parameters(host: &str) -> Result<TlsParameters, TransportError> {
    TlsParameters::new(host.to_string()).map_err(|e| TransportError::SmtpSetup(e.to_string()))
}

impl Mailer for SmtpMailer {
    fn send(&self, mail: &OutgoingMail) -> Result<(), TransportError> {
        let message = build_message(mail)?;
        debug!(subject = %mail.subject, "sending message over SMTP");

        match self.transport.send(&message) {
            Ok(response) => {
                debug!(code = %response.code(), "SMTP server accepted message");
                Ok(())
            }
            Err(e) => Err(TransportError::SendFailed(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MailProtocol;

    fn smtp_settings() -> MailSettings {
        MailSettings {
            protocol: Some(MailProtocol::Smtp),
            host: Some("smtp.example.com".into()),
            port: Some(587),
            username: Some("mailer".into()),
            password: Some("hunter2".into()),
            smtp_auth: true,
            smtp_secure_transport_type: SecureTransport::Tls,
            ..Default::default()
        }
    }

    #[test]
    fn test_from_settings_accepts_valid_config() {
        assert!(SmtpMailer::from_settings(&smtp_settings()).is_ok());
    }

    #[test]
    fn test_auth_requires_username() {
        let mut settings = smtp_settings();
        settings.username = Some(String::new());
        let result = SmtpMailer::from_settings(&settings);
        assert!(matches!(
            result,
            Err(DispatchError::Config(crate::errors::ConfigError::MissingField { ref field }))
                if field == "username"
        ));
    }

    #[test]
    fn test_auth_requires_password() {
        let mut settings = smtp_settings();
        settings.password = None;
        let result = SmtpMailer::from_settings(&settings);
        assert!(matches!(
            result,
            Err(DispatchError::Config(crate::errors::ConfigError::MissingField { ref field }))
                if field == "password"
        ));
    }

    #[test]
    fn test_no_auth_skips_credential_check() {
        let mut settings = smtp_settings();
        settings.smtp_auth = false;
        settings.username = None;
        settings.password = None;
        assert!(SmtpMailer::from_settings(&settings).is_ok());
    }

    #[test]
    fn test_requires_host_and_port() {
        let mut settings = smtp_settings();
        settings.host = None;
        assert!(matches!(
            SmtpMailer::from_settings(&settings),
            Err(DispatchError::Config(crate::errors::ConfigError::MissingField { ref field }))
                if field == "host"
        ));

        let mut settings = smtp_settings();
        settings.port = None;
        assert!(matches!(
            SmtpMailer::from_settings(&settings),
            Err(DispatchError::Config(crate::errors::ConfigError::MissingField { ref field }))
                if field == "port"
        ));
    }
}
