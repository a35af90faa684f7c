//! The email override service.
//!
//! [`OverrideService`] is the heart of FormRelay. For each intercepted
//! outgoing-email event it:
//!
//! 1. Decides whether to claim the send (a form submission from the
//!    configured target form must be attached).
//! 2. Resolves the recipient through the user directory, falling back to a
//!    transient recipient built from the request.
//! 3. Configures a mailer from the system mail settings and dispatches the
//!    message, honoring the test-destination override.
//! 4. Notifies registered listeners on success.
//!
//! Sends the service does not claim are left entirely to the host.

use chrono::Utc;
use once_cell::sync::OnceCell;
use serde_json::{Map, Value};
use tracing::{debug, error, info};

use crate::config::{MailSettings, RelayConfig, SettingsSource};
use crate::directory::UserDirectory;
use crate::errors::{ConfigError, DispatchError, TemplateError};
use crate::models::{EmailRecipient, EmailSent, InterceptContext, OutboundEmail, Recipient};
use crate::recipients::{test_destination, transient_recipient};
use crate::render::TemplateRenderer;
use crate::transport::{LettreTransports, OutgoingMail, TransportFactory};

// ---------------------------------------------------------------------------
// Handler outcome
// ---------------------------------------------------------------------------

/// What the integration layer should do with the host's send event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandlerOutcome {
    /// Suppress the host's default send path.
    pub suppress_default: bool,
    /// The send has been fully handled by the override service.
    pub handled: bool,
}

impl HandlerOutcome {
    /// The service did not claim the send; the host proceeds as usual.
    pub fn pass() -> Self {
        Self {
            suppress_default: false,
            handled: false,
        }
    }

    /// The service claimed and performed the send.
    pub fn overridden() -> Self {
        Self {
            suppress_default: true,
            handled: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Send listener
// ---------------------------------------------------------------------------

/// Observer of completed override sends. No listener is required to exist.
pub trait SendListener: Send + Sync {
    fn email_sent(&self, notice: &EmailSent);
}

// ---------------------------------------------------------------------------
// Override service
// ---------------------------------------------------------------------------

/// Decides whether to intercept a send and performs the override dispatch.
pub struct OverrideService {
    relay: RelayConfig,
    settings_source: Box<dyn SettingsSource>,
    settings: OnceCell<MailSettings>,
    directory: Box<dyn UserDirectory>,
    transports: Box<dyn TransportFactory>,
    renderer: TemplateRenderer,
    listeners: Vec<Box<dyn SendListener>>,
}

impl OverrideService {
    /// Create a service with the default lettre-backed transports and
    /// template renderer.
    pub fn new(
        relay: RelayConfig,
        settings_source: Box<dyn SettingsSource>,
        directory: Box<dyn UserDirectory>,
    ) -> Self {
        info!(
            target_form_handle = %relay.target_form_handle,
            "creating override service"
        );
        Self {
            relay,
            settings_source,
            settings: OnceCell::new(),
            directory,
            transports: Box::new(LettreTransports),
            renderer: TemplateRenderer::default(),
            listeners: Vec::new(),
        }
    }

    /// Replace the transport factory (tests inject a recording one here).
    pub fn with_transports(mut self, transports: Box<dyn TransportFactory>) -> Self {
        self.transports = transports;
        self
    }

    /// Replace the template renderer.
    pub fn with_renderer(mut self, renderer: TemplateRenderer) -> Self {
        self.renderer = renderer;
        self
    }

    /// Register a listener for completed override sends.
    pub fn add_listener(&mut self, listener: Box<dyn SendListener>) {
        self.listeners.push(listener);
    }

    /// The relay behaviour configuration this service runs with.
    pub fn relay_config(&self) -> &RelayConfig {
        &self.relay
    }

    /// The system mail settings, loaded on first use and memoized for the
    /// lifetime of this service.
    fn settings(&self) -> Result<&MailSettings, ConfigError> {
        self.settings
            .get_or_try_init(|| self.settings_source.email_settings())
    }

    // -----------------------------------------------------------------------
    // Eligibility
    // -----------------------------------------------------------------------

    /// Whether this service claims the intercepted send.
    ///
    /// True only when a form submission is attached and its form handle
    /// matches the configured target. Integration layers must apply the
    /// claim to the host event *before* calling
    /// [`send_override`](Self::send_override), so the default send stays
    /// suppressed even when dispatch fails.
    pub fn claims(&self, ctx: &InterceptContext) -> bool {
        let Some(submission) = ctx.submission.as_ref() else {
            debug!("no form submission attached; letting the default send proceed");
            return false;
        };

        if submission.form.handle != self.relay.target_form_handle {
            debug!(
                handle = %submission.form.handle,
                "form handle does not match; letting the default send proceed"
            );
            return false;
        }

        info!(
            form_id = submission.form.id,
            submission_id = submission.id,
            "claiming form notification send"
        );
        true
    }

    // -----------------------------------------------------------------------
    // Recipient resolution
    // -----------------------------------------------------------------------

    /// Resolve the destination user: directory entry when one exists for the
    /// address, transient recipient built from the request otherwise.
    pub fn resolve_recipient(&self, email: &OutboundEmail) -> Recipient {
        match self.directory.find_by_email(&email.to_email) {
            Some(user) => {
                debug!(email = %user.email, "resolved recipient from directory");
                user
            }
            None => {
                debug!(
                    email = %email.to_email,
                    "no directory entry for address; using transient recipient"
                );
                transient_recipient(email)
            }
        }
    }

    // -----------------------------------------------------------------------
    // Dispatch
    // -----------------------------------------------------------------------

    /// Perform the override send to the resolved recipient.
    pub fn send_override(
        &self,
        recipient: &Recipient,
        email: &OutboundEmail,
        variables: &Map<String, Value>,
    ) -> Result<(), DispatchError> {
        let settings = self.settings()?;

        let Some(protocol) = settings.protocol.clone() else {
            error!("no transport protocol configured; check your email settings");
            return Err(ConfigError::MissingProtocol.into());
        };

        let mailer = self
            .transports
            .create(&protocol, settings, self.relay.dev_mode)?;

        let mut mail = OutgoingMail {
            from_email: email.from_email.clone(),
            from_name: email.from_name.clone(),
            reply_to: email.reply_to.clone().filter(|r| !r.is_empty()),
            ..Default::default()
        };

        let test_to = self.relay.test_to_address.as_ref();

        // Primary destination: the test override wins over the resolved
        // recipient.
        match test_destination(test_to) {
            Some(routed) => {
                info!(count = routed.len(), "routing To to the test destination");
                mail.to = routed;
            }
            None => {
                let full_name = recipient.full_name();
                let name = (!full_name.is_empty()).then_some(full_name);
                mail.to = vec![EmailRecipient::new(recipient.email.clone(), name)];
            }
        }

        mail.headers = email.custom_headers.clone();

        if !email.bcc.is_empty() {
            mail.bcc = match test_destination(test_to) {
                Some(routed) => {
                    info!(count = routed.len(), "routing BCC to the test destination");
                    routed
                }
                None => literal_recipients(&email.bcc),
            };
        }

        if !email.cc.is_empty() {
            mail.cc = match test_destination(test_to) {
                Some(routed) => {
                    info!(count = routed.len(), "routing CC to the test destination");
                    routed
                }
                None => literal_recipients(&email.cc),
            };
        }

        let mut variables = variables.clone();
        let user = serde_json::to_value(recipient)
            .map_err(|e| TemplateError::Context(e.to_string()))?;
        variables.insert("user".into(), user);

        let locale = recipient.preferred_locale.as_deref();
        mail.subject = self.renderer.render(&email.subject, &variables, locale)?;
        mail.body = self.renderer.render(&email.body, &variables, locale)?;
        mail.html = false;

        if let Err(e) = mailer.send(&mail) {
            error!(error = %e, "override send failed");
            return Err(e.into());
        }

        info!(subject = %mail.subject, to = %recipient.email, "override email sent");

        let notice = EmailSent {
            user: recipient.clone(),
            email: email.clone(),
            variables,
            sent_at: Utc::now(),
        };
        for listener in &self.listeners {
            listener.email_sent(&notice);
        }

        Ok(())
    }

    // -----------------------------------------------------------------------
    // Handler
    // -----------------------------------------------------------------------

    /// Handle one intercepted send event end to end.
    ///
    /// Returns [`HandlerOutcome::pass`] when the send is not claimed. When
    /// it is, the override send runs to completion before the claimed
    /// outcome is returned; dispatch failures propagate as errors, and the
    /// caller is responsible for still treating the send as claimed (see
    /// [`claims`](Self::claims)).
    pub fn handle(
        &self,
        email: &OutboundEmail,
        ctx: &InterceptContext,
    ) -> Result<HandlerOutcome, DispatchError> {
        if !self.claims(ctx) {
            return Ok(HandlerOutcome::pass());
        }

        let recipient = self.resolve_recipient(email);
        self.send_override(&recipient, email, &ctx.variables)?;

        Ok(HandlerOutcome::overridden())
    }
}

/// Keep the entries that actually carry an address.
fn literal_recipients(entries: &[EmailRecipient]) -> Vec<EmailRecipient> {
    entries
        .iter()
        .filter(|r| !r.email.is_empty())
        .map(|r| EmailRecipient::new(r.email.clone(), r.name.clone().filter(|n| !n.is_empty())))
        .collect()
}
