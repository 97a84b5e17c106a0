//! SMTP AUTH mechanisms (RFC 4954).
//!
//! Only the client side is implemented: building the initial response for PLAIN, the
//! username/password answers for LOGIN and the keyed digest for CRAM-MD5 (RFC 2195).

use std::{fmt, str::FromStr};

use base64::{Engine as _, engine::general_purpose::STANDARD};
use hmac::{Hmac, Mac};
use md5::Md5;
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

use crate::client::ClientError;

type HmacMd5 = Hmac<Md5>;

/// Serialized as a lowercase string: `"plain"`, `"login"` or `"cram-md5"`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthMechanism {
    #[default]
    Plain,
    Login,
    CramMd5,
}

impl AuthMechanism {
    /// The mechanism name as it appears on the wire and in EHLO.
    #[must_use]
    pub const fn keyword(self) -> &'static str {
        match self {
            Self::Plain => "PLAIN",
            Self::Login => "LOGIN",
            Self::CramMd5 => "CRAM-MD5",
        }
    }
}

impl fmt::Display for AuthMechanism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

impl FromStr for AuthMechanism {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "plain" => Ok(Self::Plain),
            "login" => Ok(Self::Login),
            "cram-md5" | "crammd5" => Ok(Self::CramMd5),
            other => Err(format!(
                "unknown authentication mechanism '{other}', expected one of plain, login, cram-md5"
            )),
        }
    }
}

impl Serialize for AuthMechanism {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.keyword().to_ascii_lowercase())
    }
}

impl<'de> Deserialize<'de> for AuthMechanism {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

/// Base64 of `value`, as used for every AUTH exchange line.
#[must_use]
pub fn encode(value: &str) -> String {
    STANDARD.encode(value)
}

/// The PLAIN initial response: `base64("\0user\0password")` with an empty authzid.
#[must_use]
pub fn plain_initial_response(username: &str, password: &str) -> String {
    STANDARD.encode(format!("\0{username}\0{password}"))
}

/// Answers a CRAM-MD5 server challenge.
///
/// `challenge` is the base64 text of the server's 334 reply. The answer is
/// `base64("user " + hex(hmac_md5(password, challenge)))`.
///
/// # Errors
///
/// Returns [`ClientError::AuthError`] if the challenge is not valid base64.
pub fn cram_md5_response(
    username: &str,
    password: &str,
    challenge: &str,
) -> Result<String, ClientError> {
    let challenge = STANDARD
        .decode(challenge.trim())
        .map_err(|e| ClientError::AuthError(format!("Invalid CRAM-MD5 challenge: {e}")))?;

    let mut mac = HmacMd5::new_from_slice(password.as_bytes())
        .map_err(|e| ClientError::AuthError(e.to_string()))?;
    mac.update(&challenge);
    let digest = hex::encode(mac.finalize().into_bytes());

    Ok(STANDARD.encode(format!("{username} {digest}")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mechanism() {
        assert_eq!("PLAIN".parse::<AuthMechanism>(), Ok(AuthMechanism::Plain));
        assert_eq!("login".parse::<AuthMechanism>(), Ok(AuthMechanism::Login));
        assert_eq!(
            "Cram-MD5".parse::<AuthMechanism>(),
            Ok(AuthMechanism::CramMd5)
        );
        assert!("xoauth2".parse::<AuthMechanism>().is_err());
    }

    #[test]
    fn test_plain_initial_response() {
        assert_eq!(
            plain_initial_response("tim", "tanstaaftanstaaf"),
            "AHRpbQB0YW5zdGFhZnRhbnN0YWFm"
        );
    }

    #[test]
    fn test_cram_md5_rfc2195_vector() {
        let challenge = STANDARD.encode("<1896.697170952@postoffice.reston.mci.net>");
        let response = cram_md5_response("tim", "tanstaaftanstaaf", &challenge).unwrap();
        let decoded = String::from_utf8(STANDARD.decode(response).unwrap()).unwrap();
        assert_eq!(decoded, "tim b913a602c7eda7a495b4e6e7334d3890");
    }

    #[test]
    fn test_cram_md5_rejects_garbage_challenge() {
        assert!(matches!(
            cram_md5_response("tim", "pw", "!!not base64!!"),
            Err(ClientError::AuthError(_))
        ));
    }

    #[test]
    fn test_serde_names() {
        use serde::de::{IntoDeserializer, value::StrDeserializer};

        let de: StrDeserializer<'_, serde::de::value::Error> = "cram-md5".into_deserializer();
        assert_eq!(AuthMechanism::deserialize(de).unwrap(), AuthMechanism::CramMd5);

        let de: StrDeserializer<'_, serde::de::value::Error> = "login".into_deserializer();
        assert_eq!(AuthMechanism::deserialize(de).unwrap(), AuthMechanism::Login);
    }
}
