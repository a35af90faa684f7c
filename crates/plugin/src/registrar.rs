//! Plugin registrar.
//!
//! Binds the override service to the host's before-send event. The
//! subscriber applies the service's claim to the event flags *before*
//! dispatching the override send, so a transport failure still leaves the
//! host's default send suppressed and the event marked handled.

use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use formrelay_core::OverrideService;

use crate::event::{BeforeSendEmail, EmailEvents};

/// Descriptive plugin metadata, used purely for registration logging.
#[derive(Debug, Clone)]
pub struct PluginInfo {
    pub name: String,
    pub version: String,
    pub developer: String,
    pub developer_url: String,
}

impl Default for PluginInfo {
    fn default() -> Self {
        Self {
            name: "Form Relay".into(),
            version: env!("CARGO_PKG_VERSION").into(),
            developer: "Heimdal IT".into(),
            developer_url: "https://www.heimdalit.no".into(),
        }
    }
}

/// The FormRelay plugin: metadata plus the service it installs.
pub struct FormRelayPlugin {
    info: PluginInfo,
    service: Arc<OverrideService>,
}

impl FormRelayPlugin {
    pub fn new(service: Arc<OverrideService>) -> Self {
        Self {
            info: PluginInfo::default(),
            service,
        }
    }

    pub fn with_info(mut self, info: PluginInfo) -> Self {
        self.info = info;
        self
    }

    pub fn info(&self) -> &PluginInfo {
        &self.info
    }

    /// Register exactly one before-send subscriber on the bus.
    pub fn register(&self, events: &EmailEvents) {
        info!(
            name = %self.info.name,
            version = %self.info.version,
            developer = %self.info.developer,
            "registering before-send subscriber"
        );

        let service = Arc::clone(&self.service);
        events.on_before_send(move |event| handle_before_send(&service, event));
    }
}

/// The installed subscriber: claim first, then dispatch.
fn handle_before_send(service: &OverrideService, event: &mut BeforeSendEmail) -> Result<()> {
    if !service.claims(&event.context) {
        return Ok(());
    }

    // Claim the send before attempting dispatch; these flags must hold even
    // when the transport errors out below.
    event.perform_action = false;
    event.handled = true;

    let recipient = service.resolve_recipient(&event.email);
    service.send_override(&recipient, &event.email, &event.context.variables)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use formrelay_core::config::{MailProtocol, MailSettings, RelayConfig, StaticSettings};
    use formrelay_core::directory::EmptyDirectory;

    fn service() -> Arc<OverrideService> {
        let relay = RelayConfig {
            target_form_handle: "prospekt".into(),
            test_to_address: None,
            dev_mode: false,
        };
        let settings = MailSettings {
            protocol: Some(MailProtocol::Mail),
            ..Default::default()
        };
        Arc::new(OverrideService::new(
            relay,
            Box::new(StaticSettings(settings)),
            Box::new(EmptyDirectory),
        ))
    }

    #[test]
    fn test_register_installs_one_subscriber() {
        let events = EmailEvents::new();
        let plugin = FormRelayPlugin::new(service());

        plugin.register(&events);
        assert_eq!(events.before_send_count(), 1);
    }

    #[test]
    fn test_default_info() {
        let plugin = FormRelayPlugin::new(service());
        assert_eq!(plugin.info().name, "Form Relay");
        assert_eq!(plugin.info().version, env!("CARGO_PKG_VERSION"));
    }
}
