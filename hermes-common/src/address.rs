//! Mailbox validation and the semicolon separated address lists used by recipient
//! records for `cc` and `bcc`.

use std::{fmt, str::FromStr};

use mailparse::MailAddr;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::RecordError;

/// Separator between entries of a list field in a record.
pub const LIST_SEPARATOR: char = ';';

/// Checks that `address` is exactly one mailbox with a domain.
///
/// # Errors
///
/// Returns [`RecordError::InvalidAddress`] for anything that is not a single
/// `local@domain` mailbox (groups, lists, bare names).
pub fn validate_address(address: &str) -> Result<(), RecordError> {
    let invalid = || RecordError::InvalidAddress(address.to_string());

    let parsed = mailparse::addrparse(address).map_err(|_| invalid())?;
    if parsed.len() != 1 {
        return Err(invalid());
    }

    match parsed.first() {
        Some(MailAddr::Single(info))
            if info.display_name.is_none()
                && info
                    .addr
                    .split_once('@')
                    .is_some_and(|(local, domain)| !local.is_empty() && !domain.is_empty()) =>
        {
            Ok(())
        }
        _ => Err(invalid()),
    }
}

/// An ordered list of addresses, encoded in records as `a@x;b@y`.
///
/// The empty string is the empty list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct AddressList(Vec<String>);

impl AddressList {
    #[must_use]
    pub const fn new(addresses: Vec<String>) -> Self {
        Self(addresses)
    }

    #[must_use]
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.0.iter()
    }

    /// Validates every entry with [`validate_address`].
    ///
    /// # Errors
    ///
    /// Returns the first invalid entry.
    pub fn validate(&self) -> Result<(), RecordError> {
        self.0.iter().try_for_each(|address| validate_address(address))
    }
}

impl From<Vec<String>> for AddressList {
    fn from(addresses: Vec<String>) -> Self {
        Self(addresses)
    }
}

impl<'a> IntoIterator for &'a AddressList {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl FromStr for AddressList {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Ok(Self::default());
        }

        Ok(Self(s.split(LIST_SEPARATOR).map(str::to_string).collect()))
    }
}

impl fmt::Display for AddressList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, address) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "{LIST_SEPARATOR}")?;
            }
            f.write_str(address)?;
        }
        Ok(())
    }
}

impl Serialize for AddressList {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for AddressList {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        let Ok(list) = raw.parse::<Self>();
        Ok(list)
    }
}
