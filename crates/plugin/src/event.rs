//! Email events and the in-process event bus.
//!
//! [`BeforeSendEmail`] mirrors the host's outgoing-email event: subscribers
//! may flip `perform_action` off to suppress the host's default send and set
//! `handled` once they have taken over. [`EmailEvents`] is the subscriber
//! list the host dispatches through; a failing subscriber aborts dispatch
//! and the error propagates to the host.

use std::sync::{Arc, Mutex, PoisonError};

use anyhow::Result;
use tracing::debug;

use formrelay_core::models::{EmailSent, InterceptContext, OutboundEmail};
use formrelay_core::service::SendListener;

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// The intercepted outgoing-email event.
#[derive(Debug, Clone)]
pub struct BeforeSendEmail {
    /// The message the host is about to send.
    pub email: OutboundEmail,

    /// Ambient variables attached to the send.
    pub context: InterceptContext,

    /// When false, the host must skip its default send path.
    pub perform_action: bool,

    /// True once a subscriber has fully handled the send.
    pub handled: bool,
}

impl BeforeSendEmail {
    pub fn new(email: OutboundEmail, context: InterceptContext) -> Self {
        Self {
            email,
            context,
            perform_action: true,
            handled: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Bus
// ---------------------------------------------------------------------------

type BeforeSendSubscriber = Box<dyn Fn(&mut BeforeSendEmail) -> Result<()> + Send + Sync>;
type SentSubscriber = Box<dyn Fn(&EmailSent) + Send + Sync>;

/// In-process email event bus.
///
/// Stands in for the host's event dispatcher: the host fires
/// [`fire_before_send`](Self::fire_before_send) inline before sending, and
/// the override path fires [`fire_sent`](Self::fire_sent) after a completed
/// override send. Neither event requires any subscriber to exist.
#[derive(Default)]
pub struct EmailEvents {
    before_send: Mutex<Vec<BeforeSendSubscriber>>,
    sent: Mutex<Vec<SentSubscriber>>,
}

impl EmailEvents {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to the before-send event.
    pub fn on_before_send<F>(&self, subscriber: F)
    where
        F: Fn(&mut BeforeSendEmail) -> Result<()> + Send + Sync + 'static,
    {
        self.before_send
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Box::new(subscriber));
    }

    /// Subscribe to the send-completed event.
    pub fn on_sent<F>(&self, subscriber: F)
    where
        F: Fn(&EmailSent) + Send + Sync + 'static,
    {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Box::new(subscriber));
    }

    /// Dispatch a before-send event to all subscribers, in registration
    /// order. The first subscriber error aborts dispatch and propagates.
    pub fn fire_before_send(&self, event: &mut BeforeSendEmail) -> Result<()> {
        let subscribers = self
            .before_send
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        debug!(
            subscribers = subscribers.len(),
            to = %event.email.to_email,
            "dispatching before-send event"
        );
        for subscriber in subscribers.iter() {
            subscriber(event)?;
        }
        Ok(())
    }

    /// Dispatch a send-completed notification to all subscribers.
    pub fn fire_sent(&self, notice: &EmailSent) {
        let subscribers = self.sent.lock().unwrap_or_else(PoisonError::into_inner);
        for subscriber in subscribers.iter() {
            subscriber(notice);
        }
    }

    /// Number of before-send subscribers currently registered.
    pub fn before_send_count(&self) -> usize {
        self.before_send
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

// ---------------------------------------------------------------------------
// Listener bridge
// ---------------------------------------------------------------------------

/// Forwards the core service's send notifications onto the bus.
///
/// Register it on the override service to surface [`EmailSent`] as a bus
/// event: `service.add_listener(Box::new(BusNotifier::new(events)))`.
pub struct BusNotifier {
    events: Arc<EmailEvents>,
}

impl BusNotifier {
    pub fn new(events: Arc<EmailEvents>) -> Self {
        Self { events }
    }
}

impl SendListener for BusNotifier {
    fn email_sent(&self, notice: &EmailSent) {
        self.events.fire_sent(notice);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_fire_with_no_subscribers_is_fine() {
        let events = EmailEvents::new();
        let mut event =
            BeforeSendEmail::new(OutboundEmail::default(), InterceptContext::default());
        assert!(events.fire_before_send(&mut event).is_ok());
        assert!(event.perform_action);
        assert!(!event.handled);
    }

    #[test]
    fn test_subscribers_run_in_order_and_see_mutations() {
        let events = EmailEvents::new();
        events.on_before_send(|event| {
            event.perform_action = false;
            Ok(())
        });
        events.on_before_send(|event| {
            assert!(!event.perform_action);
            event.handled = true;
            Ok(())
        });

        let mut event =
            BeforeSendEmail::new(OutboundEmail::default(), InterceptContext::default());
        events.fire_before_send(&mut event).unwrap();
        assert!(!event.perform_action);
        assert!(event.handled);
    }

    #[test]
    fn test_subscriber_error_aborts_dispatch() {
        let reached = Arc::new(AtomicUsize::new(0));
        let events = EmailEvents::new();
        events.on_before_send(|_| anyhow::bail!("boom"));
        {
            let reached = Arc::clone(&reached);
            events.on_before_send(move |_| {
                reached.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
        }

        let mut event =
            BeforeSendEmail::new(OutboundEmail::default(), InterceptContext::default());
        assert!(events.fire_before_send(&mut event).is_err());
        assert_eq!(reached.load(Ordering::SeqCst), 0);
    }
}
