//! Domain model types used throughout FormRelay.
//!
//! These types bridge the host's outgoing-email event, the override service,
//! and the transport layer.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// Outbound email
// ---------------------------------------------------------------------------

/// One CC/BCC/To entry: an address with an optional display name.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EmailRecipient {
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
}

impl EmailRecipient {
    pub fn new(email: impl Into<String>, name: Option<String>) -> Self {
        Self {
            email: email.into(),
            name,
        }
    }
}

/// The message the host was about to send.
///
/// Subject and body are template strings rendered against the event's
/// variables at dispatch time. Immutable input to the override service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutboundEmail {
    /// Sender address.
    pub from_email: String,

    /// Sender display name.
    #[serde(default)]
    pub from_name: Option<String>,

    /// Optional reply-to address.
    #[serde(default)]
    pub reply_to: Option<String>,

    /// Destination address.
    pub to_email: String,

    /// Destination first name, used when no directory entry matches.
    #[serde(default)]
    pub to_first_name: Option<String>,

    /// Destination last name, used when no directory entry matches.
    #[serde(default)]
    pub to_last_name: Option<String>,

    /// Subject template.
    pub subject: String,

    /// Body template.
    pub body: String,

    /// Custom headers attached verbatim to the outgoing message.
    #[serde(default)]
    pub custom_headers: HashMap<String, String>,

    /// Carbon-copy entries.
    #[serde(default)]
    pub cc: Vec<EmailRecipient>,

    /// Blind-carbon-copy entries.
    #[serde(default)]
    pub bcc: Vec<EmailRecipient>,
}

// ---------------------------------------------------------------------------
// Recipient
// ---------------------------------------------------------------------------

/// The resolved destination user.
///
/// Serializes with camelCase field names so templates can address fields as
/// `{{ user.firstName }}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Recipient {
    pub email: String,

    #[serde(default)]
    pub first_name: Option<String>,

    #[serde(default)]
    pub last_name: Option<String>,

    /// Locale tag used for rendering this recipient's subject and body.
    #[serde(default)]
    pub preferred_locale: Option<String>,
}

impl Recipient {
    /// First and last name joined with a space; empty parts are skipped.
    pub fn full_name(&self) -> String {
        let mut parts = Vec::new();
        if let Some(first) = self.first_name.as_deref().filter(|s| !s.is_empty()) {
            parts.push(first);
        }
        if let Some(last) = self.last_name.as_deref().filter(|s| !s.is_empty()) {
            parts.push(last);
        }
        parts.join(" ")
    }
}

// ---------------------------------------------------------------------------
// Form submission
// ---------------------------------------------------------------------------

/// Reference to a form definition in the host's form subsystem.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FormRef {
    pub id: i64,
    /// Symbolic identifier distinguishing this form from others.
    pub handle: String,
}

/// A form submission entry attached to the intercepted send.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FormSubmission {
    pub id: i64,
    /// The form this submission belongs to.
    pub form: FormRef,
}

// ---------------------------------------------------------------------------
// Intercept context
// ---------------------------------------------------------------------------

/// Ambient variables supplied with the intercepted send event.
///
/// Read-only; used to decide override eligibility and to supply template
/// variables.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InterceptContext {
    /// The form submission that triggered the send, if any.
    #[serde(default)]
    pub submission: Option<FormSubmission>,

    /// Template variables for subject/body rendering.
    #[serde(default)]
    pub variables: Map<String, Value>,
}

impl InterceptContext {
    pub fn new(submission: Option<FormSubmission>, variables: Map<String, Value>) -> Self {
        Self {
            submission,
            variables,
        }
    }
}

// ---------------------------------------------------------------------------
// Sent notification
// ---------------------------------------------------------------------------

/// Payload of the "send completed" notification fired after a successful
/// override send.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailSent {
    /// The resolved recipient the message went to.
    pub user: Recipient,

    /// The original outbound request.
    pub email: OutboundEmail,

    /// The variable set the templates were rendered against, including the
    /// injected `user` entry.
    pub variables: Map<String, Value>,

    pub sent_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_name_joins_parts() {
        let user = Recipient {
            email: "ada@example.com".into(),
            first_name: Some("Ada".into()),
            last_name: Some("Lovelace".into()),
            preferred_locale: None,
        };
        assert_eq!(user.full_name(), "Ada Lovelace");
    }

    #[test]
    fn test_full_name_skips_empty_parts() {
        let user = Recipient {
            email: "ada@example.com".into(),
            first_name: Some("Ada".into()),
            last_name: Some(String::new()),
            preferred_locale: None,
        };
        assert_eq!(user.full_name(), "Ada");

        let nameless = Recipient {
            email: "x@example.com".into(),
            ..Default::default()
        };
        assert_eq!(nameless.full_name(), "");
    }

    #[test]
    fn test_recipient_serializes_camel_case() {
        let user = Recipient {
            email: "ada@example.com".into(),
            first_name: Some("Ada".into()),
            last_name: None,
            preferred_locale: Some("en-GB".into()),
        };
        let value = serde_json::to_value(&user).unwrap();
        assert_eq!(value["firstName"], "Ada");
        assert_eq!(value["preferredLocale"], "en-GB");
    }

    #[test]
    fn test_intercept_context_default_is_empty() {
        let ctx = InterceptContext::default();
        assert!(ctx.submission.is_none());
        assert!(ctx.variables.is_empty());
    }
}
