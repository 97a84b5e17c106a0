use serde::{Deserialize, Serialize};

use crate::{
    address::{AddressList, validate_address},
    error::RecordError,
    variables::Variables,
};

/// One addressee with its own cc/bcc lists and template variables.
///
/// The serialized shape is the recipient record: `email,cc,bcc,variables`. The same
/// shape is used for the failed-recipient output so it can be fed back in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub email: String,
    #[serde(default)]
    pub cc: AddressList,
    #[serde(default)]
    pub bcc: AddressList,
    #[serde(default)]
    pub variables: Variables,
}

impl Recipient {
    #[must_use]
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_cc(mut self, cc: AddressList) -> Self {
        self.cc = cc;
        self
    }

    #[must_use]
    pub fn with_bcc(mut self, bcc: AddressList) -> Self {
        self.bcc = bcc;
        self
    }

    #[must_use]
    pub fn with_variables(mut self, variables: Variables) -> Self {
        self.variables = variables;
        self
    }

    /// Every address the message is delivered to: the recipient, then cc, then bcc.
    pub fn envelope(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.email.as_str())
            .chain(self.cc.iter().map(String::as_str))
            .chain(self.bcc.iter().map(String::as_str))
    }

    /// # Errors
    ///
    /// Returns [`RecordError::InvalidAddress`] for the first address that is not a
    /// single mailbox.
    pub fn validate(&self) -> Result<(), RecordError> {
        validate_address(&self.email)?;
        self.cc.validate()?;
        self.bcc.validate()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_order() {
        let recipient = Recipient::new("sarah@example.com")
            .with_cc("tom@example.com".parse().unwrap())
            .with_bcc("mark@example.com;emma@example.com".parse().unwrap());

        let envelope: Vec<_> = recipient.envelope().collect();
        assert_eq!(
            envelope,
            vec![
                "sarah@example.com",
                "tom@example.com",
                "mark@example.com",
                "emma@example.com"
            ]
        );
    }

    #[test]
    fn test_validate_checks_copies() {
        let recipient =
            Recipient::new("sarah@example.com").with_bcc("mark@example.com;nope".parse().unwrap());
        assert!(recipient.validate().is_err());
    }
}
