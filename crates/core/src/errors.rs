//! Error types for the FormRelay core library.
//!
//! Each subsystem has its own error type derived with `thiserror`, and a
//! top-level [`CoreError`] enum unifies them all for callers that want a
//! single error type.

use thiserror::Error;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Unified error type for the entire core library.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// TOML parse error.
    #[error("configuration parse error: {0}")]
    ParseError(String),

    /// The email settings carry no transport protocol, so there is no way
    /// to determine how to send the message.
    #[error("could not determine how to send the email; no protocol is set in the email settings")]
    MissingProtocol,

    /// A field required by the selected transport is missing or empty.
    #[error("'{field}' must be configured under your email settings")]
    MissingField {
        field: String,
    },

    /// A config value is invalid.
    #[error("invalid configuration value for '{field}': {detail}")]
    InvalidValue {
        field: String,
        detail: String,
    },

    /// Generic I/O error reading the config file.
    #[error("configuration I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Template errors
// ---------------------------------------------------------------------------

/// Errors from subject/body template rendering.
#[derive(Debug, Error)]
pub enum TemplateError {
    /// The template failed to parse or render.
    #[error("template render error: {0}")]
    Render(String),

    /// A template variable could not be serialized into the render context.
    #[error("template context error: {0}")]
    Context(String),
}

// ---------------------------------------------------------------------------
// Transport errors
// ---------------------------------------------------------------------------

/// Errors from mail transport configuration and delivery.
#[derive(Debug, Error)]
pub enum TransportError {
    /// An email address could not be parsed into a mailbox.
    #[error("invalid email address '{address}': {detail}")]
    InvalidAddress {
        address: String,
        detail: String,
    },

    /// A custom header name was not valid.
    #[error("invalid header name '{0}'")]
    InvalidHeader(String),

    /// The MIME message could not be assembled.
    #[error("failed to build email message: {0}")]
    BuildFailed(String),

    /// SMTP transport construction failed (TLS parameters, relay setup).
    #[error("SMTP transport error: {0}")]
    SmtpSetup(String),

    /// The POP-before-SMTP authorization handshake failed.
    #[error("POP authorization failed against {host}:{port}: {detail}")]
    PopAuthorization {
        host: String,
        port: u16,
        detail: String,
    },

    /// The transport's send operation reported failure.
    #[error("email error: {0}")]
    SendFailed(String),
}

// ---------------------------------------------------------------------------
// Dispatch errors
// ---------------------------------------------------------------------------

/// Errors surfaced by the override service while handling a claimed send.
///
/// A send that the service does not claim is not an error; the host simply
/// proceeds with its own default path.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_messages() {
        let err = ConfigError::MissingProtocol;
        assert!(err.to_string().contains("no protocol"));

        let err = ConfigError::MissingField {
            field: "host".into(),
        };
        assert_eq!(
            err.to_string(),
            "'host' must be configured under your email settings"
        );

        let err = TransportError::SendFailed("connection refused".into());
        assert_eq!(err.to_string(), "email error: connection refused");

        let err = TransportError::PopAuthorization {
            host: "pop.example.com".into(),
            port: 110,
            detail: "bad password".into(),
        };
        assert!(err.to_string().contains("pop.example.com:110"));
    }

    #[test]
    fn test_dispatch_error_from_subsystem() {
        let cfg_err = ConfigError::MissingProtocol;
        let dispatch: DispatchError = cfg_err.into();
        assert!(matches!(dispatch, DispatchError::Config(_)));

        let tpl_err = TemplateError::Render("unexpected '}'".into());
        let dispatch: DispatchError = tpl_err.into();
        assert!(matches!(dispatch, DispatchError::Template(_)));
    }

    #[test]
    fn test_core_error_from_subsystem() {
        let err = TransportError::SendFailed("x".into());
        let core: CoreError = err.into();
        assert!(matches!(core, CoreError::Transport(_)));
    }
}
