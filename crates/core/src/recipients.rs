//! Recipient resolution helpers.
//!
//! Covers the two recipient-shaping concerns of an override send: building a
//! transient [`Recipient`] when the directory has no entry for the
//! destination address, and routing To/CC/BCC to the configured
//! test-destination override instead of the literal recipients.

use crate::config::TestRecipients;
use crate::models::{EmailRecipient, OutboundEmail, Recipient};

/// Display name attached to every test-destination override entry.
pub const TEST_EMAIL_NAME: &str = "Test Email";

/// Build a transient recipient from the outbound request's destination
/// fields. Used when the user directory has no entry for the address; the
/// result is never persisted.
pub fn transient_recipient(email: &OutboundEmail) -> Recipient {
    Recipient {
        email: email.to_email.clone(),
        first_name: email.to_first_name.clone(),
        last_name: email.to_last_name.clone(),
        preferred_locale: None,
    }
}

/// Resolve the test-destination override into concrete recipients.
///
/// A configured non-empty string yields one entry; a non-empty list yields
/// one entry per address. All entries carry the "Test Email" display name.
/// Returns `None` when no override is configured, in which case the caller
/// uses the literal recipient data.
pub fn test_destination(test: Option<&TestRecipients>) -> Option<Vec<EmailRecipient>> {
    match test {
        Some(TestRecipients::Single(addr)) if !addr.is_empty() => Some(vec![EmailRecipient::new(
            addr.clone(),
            Some(TEST_EMAIL_NAME.into()),
        )]),
        Some(TestRecipients::List(list)) if !list.is_empty() => Some(
            list.iter()
                .map(|addr| EmailRecipient::new(addr.clone(), Some(TEST_EMAIL_NAME.into())))
                .collect(),
        ),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_recipient_copies_destination_fields() {
        let email = OutboundEmail {
            to_email: "new@example.com".into(),
            to_first_name: Some("New".into()),
            to_last_name: Some("User".into()),
            ..Default::default()
        };
        let user = transient_recipient(&email);
        assert_eq!(user.email, "new@example.com");
        assert_eq!(user.first_name.as_deref(), Some("New"));
        assert_eq!(user.last_name.as_deref(), Some("User"));
        assert!(user.preferred_locale.is_none());
    }

    #[test]
    fn test_single_override() {
        let test = TestRecipients::Single("qa@example.com".into());
        let routed = test_destination(Some(&test)).unwrap();
        assert_eq!(routed.len(), 1);
        assert_eq!(routed[0].email, "qa@example.com");
        assert_eq!(routed[0].name.as_deref(), Some(TEST_EMAIL_NAME));
    }

    #[test]
    fn test_list_override() {
        let test = TestRecipients::List(vec!["a@example.com".into(), "b@example.com".into()]);
        let routed = test_destination(Some(&test)).unwrap();
        assert_eq!(routed.len(), 2);
        assert!(routed.iter().all(|r| r.name.as_deref() == Some(TEST_EMAIL_NAME)));
    }

    #[test]
    fn test_empty_values_mean_no_override() {
        assert!(test_destination(None).is_none());

        let empty = TestRecipients::Single(String::new());
        assert!(test_destination(Some(&empty)).is_none());

        let empty_list = TestRecipients::List(Vec::new());
        assert!(test_destination(Some(&empty_list)).is_none());
    }
}
