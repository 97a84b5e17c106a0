use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{address::validate_address, error::RecordError};

/// An authenticated mailbox that batches are sent from.
///
/// Loaded once from the senders file (`email,password,name`) and shared by
/// reference for the rest of the run.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SenderIdentity {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub name: Option<String>,
}

impl SenderIdentity {
    #[must_use]
    pub fn new(
        email: impl Into<String>,
        password: impl Into<String>,
        name: Option<String>,
    ) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            name,
        }
    }

    /// The value of the `From` header: `Name <email>`, or the bare address when the
    /// sender has no display name.
    #[must_use]
    pub fn mailbox(&self) -> String {
        match self.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => format!("{name} <{}>", self.email),
            _ => self.email.clone(),
        }
    }

    /// # Errors
    ///
    /// Returns [`RecordError::InvalidAddress`] if the email is not a single mailbox.
    pub fn validate(&self) -> Result<(), RecordError> {
        validate_address(&self.email)
    }
}

impl fmt::Debug for SenderIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SenderIdentity")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("name", &self.name)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mailbox_with_and_without_name() {
        let named = SenderIdentity::new("emma@example.com", "pw", Some("Emma Anderson".into()));
        assert_eq!(named.mailbox(), "Emma Anderson <emma@example.com>");

        let bare = SenderIdentity::new("emma@example.com", "pw", None);
        assert_eq!(bare.mailbox(), "emma@example.com");

        let blank = SenderIdentity::new("emma@example.com", "pw", Some("  ".into()));
        assert_eq!(blank.mailbox(), "emma@example.com");
    }

    #[test]
    fn test_debug_redacts_password() {
        let sender = SenderIdentity::new("emma@example.com", "AndersonPW456", None);
        let debug = format!("{sender:?}");
        assert!(!debug.contains("AndersonPW456"));
        assert!(debug.contains("<redacted>"));
    }
}
