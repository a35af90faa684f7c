//! FormRelay host integration.
//!
//! The host owns an [`event::EmailEvents`] bus and fires a
//! [`event::BeforeSendEmail`] for every outgoing message. The
//! [`registrar::FormRelayPlugin`] subscribes the override service to that
//! bus at startup and applies the service's claim to the event flags.

pub mod event;
pub mod registrar;

pub use event::{BeforeSendEmail, BusNotifier, EmailEvents};
pub use registrar::{FormRelayPlugin, PluginInfo};
