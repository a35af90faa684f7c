//! TOML-based configuration for FormRelay.
//!
//! Two sections: `[email]` holds the system mail transport settings
//! ([`MailSettings`]), `[relay]` holds the override behaviour
//! ([`RelayConfig`]). The mail password may be given literally or as a
//! `password_env` field referencing an environment variable, resolved at
//! runtime via [`AppConfig::resolve_env_vars`].

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::errors::ConfigError;

/// Connect/read timeout applied when the settings leave it unset, in seconds.
pub const DEFAULT_MAIL_TIMEOUT_SECS: u64 = 10;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level application configuration loaded from a TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// System mail transport settings.
    pub email: MailSettings,

    /// Override behaviour settings.
    pub relay: RelayConfig,
}

// ---------------------------------------------------------------------------
// Transport protocol
// ---------------------------------------------------------------------------

/// The mail transport discriminator.
///
/// Unrecognized values deserialize to [`MailProtocol::Other`], which the
/// transport factory treats the same as [`MailProtocol::Mail`]: hand the
/// message to the local MTA.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MailProtocol {
    /// Plain SMTP relay.
    Smtp,
    /// Gmail's SMTP endpoint; configured exactly like [`MailProtocol::Smtp`].
    Gmail,
    /// POP-before-SMTP: authorize against a POP server, then relay over SMTP.
    Pop,
    /// The local `sendmail` binary.
    Sendmail,
    /// The local MTA via its sendmail-compatible interface.
    #[default]
    Mail,
    /// Anything we do not recognize; falls back to the local MTA.
    #[serde(other)]
    Other,
}

impl std::fmt::Display for MailProtocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Smtp => write!(f, "smtp"),
            Self::Gmail => write!(f, "gmail"),
            Self::Pop => write!(f, "pop"),
            Self::Sendmail => write!(f, "sendmail"),
            Self::Mail => write!(f, "mail"),
            Self::Other => write!(f, "other"),
        }
    }
}

/// TLS mode for the SMTP connection.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SecureTransport {
    /// Cleartext connection.
    #[default]
    None,
    /// Implicit TLS from the first byte (usually port 465).
    Ssl,
    /// STARTTLS upgrade (usually port 587).
    Tls,
}

// ---------------------------------------------------------------------------
// Mail settings
// ---------------------------------------------------------------------------

/// System email transport settings.
///
/// Which fields are required depends on the selected `protocol`; validation
/// happens when a transport is built, not at load time, so a partially
/// configured bag parses fine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MailSettings {
    /// Transport protocol. Dispatch refuses to proceed when absent.
    #[serde(default)]
    pub protocol: Option<MailProtocol>,

    /// Mail server hostname.
    #[serde(default)]
    pub host: Option<String>,

    /// Mail server port.
    #[serde(default)]
    pub port: Option<u16>,

    /// Account username (SMTP auth and POP authorization).
    #[serde(default)]
    pub username: Option<String>,

    /// Account password, given literally.
    #[serde(default)]
    pub password: Option<String>,

    /// Environment variable holding the account password. Resolved into
    /// `password` by [`AppConfig::resolve_env_vars`] when `password` is not
    /// set literally.
    #[serde(default)]
    pub password_env: Option<String>,

    /// Connect/read timeout in seconds. Defaults to
    /// [`DEFAULT_MAIL_TIMEOUT_SECS`] when unset.
    #[serde(default)]
    pub timeout: Option<u64>,

    /// Whether the SMTP server requires authentication.
    #[serde(default)]
    pub smtp_auth: bool,

    /// Keep the SMTP connection open across sends on one mailer.
    #[serde(default)]
    pub smtp_keep_alive: bool,

    /// TLS mode for the SMTP connection.
    #[serde(default)]
    pub smtp_secure_transport_type: SecureTransport,

    /// Path to the sendmail binary for the `sendmail` protocol. The system
    /// default is used when unset.
    #[serde(default)]
    pub sendmail_command: Option<String>,
}

impl MailSettings {
    /// The effective timeout in seconds.
    pub fn timeout_secs(&self) -> u64 {
        self.timeout.unwrap_or(DEFAULT_MAIL_TIMEOUT_SECS)
    }

    /// Non-empty value of an optional string field.
    pub(crate) fn non_empty(value: &Option<String>) -> Option<&str> {
        value.as_deref().filter(|s| !s.is_empty())
    }

    /// Require a non-empty string field, erroring with the field name.
    pub(crate) fn require<'a>(
        value: &'a Option<String>,
        field: &str,
    ) -> Result<&'a str, ConfigError> {
        Self::non_empty(value).ok_or_else(|| ConfigError::MissingField {
            field: field.into(),
        })
    }

    /// Require the port to be set, erroring with the field name.
    pub(crate) fn require_port(&self) -> Result<u16, ConfigError> {
        self.port.ok_or_else(|| ConfigError::MissingField {
            field: "port".into(),
        })
    }
}

// ---------------------------------------------------------------------------
// Relay behaviour
// ---------------------------------------------------------------------------

/// Test-destination override: a single address or a list of addresses that
/// replace every real recipient for diagnostic/staging purposes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum TestRecipients {
    /// One address replaces all recipients.
    Single(String),
    /// Each listed address becomes a recipient.
    List(Vec<String>),
}

/// Override behaviour configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Handle of the form whose notification emails are claimed. Submissions
    /// from any other form pass through untouched.
    pub target_form_handle: String,

    /// When set, replaces the To/CC/BCC recipients with the configured
    /// test address(es).
    #[serde(default)]
    pub test_to_address: Option<TestRecipients>,

    /// Raises POP handshake logging verbosity.
    #[serde(default)]
    pub dev_mode: bool,
}

// ---------------------------------------------------------------------------
// Loading & resolving
// ---------------------------------------------------------------------------

impl AppConfig {
    /// Load an [`AppConfig`] from a TOML file at the given path.
    ///
    /// This does **not** resolve environment variables -- call
    /// [`resolve_env_vars`](Self::resolve_env_vars) afterwards.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading configuration");

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        debug!("configuration parsed successfully");
        Ok(config)
    }

    /// Resolve the mail password from `password_env` when no literal
    /// password is configured.
    pub fn resolve_env_vars(&mut self) {
        if self.email.password.is_some() {
            return;
        }
        if let Some(ref env_name) = self.email.password_env {
            self.email.password = resolve_optional_env(env_name, "email.password_env");
        }
    }

    /// Validate that all required fields are present and sane.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.relay.target_form_handle.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "relay.target_form_handle".into(),
                detail: "target form handle must not be empty".into(),
            });
        }
        if let Some(TestRecipients::List(ref list)) = self.relay.test_to_address {
            if list.iter().any(|addr| addr.is_empty()) {
                return Err(ConfigError::InvalidValue {
                    field: "relay.test_to_address".into(),
                    detail: "test addresses must not be empty".into(),
                });
            }
        }
        if self.email.timeout == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "email.timeout".into(),
                detail: "timeout must be > 0".into(),
            });
        }
        Ok(())
    }

    /// Convenience: load, resolve, and validate in one call.
    pub fn load_and_resolve<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut config = Self::load_from_file(path)?;
        config.resolve_env_vars();
        config.validate()?;
        Ok(config)
    }
}

/// Try to read an environment variable by name. Returns `Some(value)` on
/// success; logs a warning and returns `None` if the variable is unset.
fn resolve_optional_env(env_name: &str, field: &str) -> Option<String> {
    match std::env::var(env_name) {
        Ok(val) if !val.is_empty() => {
            debug!(field, env_name, "resolved env var");
            Some(val)
        }
        Ok(_) => {
            warn!(field, env_name, "env var is set but empty");
            None
        }
        Err(_) => {
            warn!(field, env_name, "env var not set");
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Settings source
// ---------------------------------------------------------------------------

/// Supplier of the system mail settings.
///
/// The override service loads settings through this trait exactly once per
/// service instance and memoizes the result for its lifetime.
pub trait SettingsSource: Send + Sync {
    /// Produce the system email settings.
    fn email_settings(&self) -> Result<MailSettings, ConfigError>;
}

/// A settings source backed by an already-loaded value.
#[derive(Debug, Clone)]
pub struct StaticSettings(pub MailSettings);

impl SettingsSource for StaticSettings {
    fn email_settings(&self) -> Result<MailSettings, ConfigError> {
        Ok(self.0.clone())
    }
}

/// A settings source that re-reads a config file on first use.
#[derive(Debug, Clone)]
pub struct FileSettings {
    path: std::path::PathBuf,
}

impl FileSettings {
    pub fn new(path: impl Into<std::path::PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SettingsSource for FileSettings {
    fn email_settings(&self) -> Result<MailSettings, ConfigError> {
        let mut config = AppConfig::load_from_file(&self.path)?;
        config.resolve_env_vars();
        config.validate()?;
        Ok(config.email)
    }
}
