//! Secure string handling with redacted display and serialization.
//!
//! Provides `RedactedString` for holding an encryption passphrase while preventing
//! accidental exposure in logs, debug output, or serialized target dumps.

use bon::Builder;
use derive_more::From;
use getset::Getters;
use serde::{Serialize, Serializer};
use std::fmt::{Debug, Formatter};
use std::result;
use zeroize::{Zeroize, Zeroizing};

/// Placeholder text shown instead of actual passphrase in logs/debug output
pub static REDACTED_PASSPHRASE: &str = "###REDACTED_PASSPHRASE###";

/// A string that gets redacted in debug output and serialization
///
/// The inner value is zeroed on drop. Any length is accepted, including the empty
/// string, since the encryption program decides what it considers acceptable.
#[derive(Clone, Zeroize, From, Builder, PartialEq, Eq, Getters)]
#[getset(get = "pub")]
pub struct RedactedString {
    #[builder(into)]
    inner: String,
}

impl RedactedString {
    /// Bytes of the secret followed by a newline, the way a terminal would submit it.
    pub fn as_line_bytes(&self) -> Zeroizing<Vec<u8>> {
        let mut bytes = Zeroizing::new(Vec::with_capacity(self.inner.len() + 1));
        bytes.extend_from_slice(self.inner.as_bytes());
        bytes.push(b'\n');
        bytes
    }
}

impl From<&str> for RedactedString {
    fn from(value: &str) -> Self {
        RedactedString::builder().inner(value).build()
    }
}

impl Debug for RedactedString {
    /// Always shows redacted placeholder instead of actual value
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", REDACTED_PASSPHRASE)
    }
}

impl Serialize for RedactedString {
    /// Always serializes as redacted placeholder
    fn serialize<S: Serializer>(&self, serializer: S) -> result::Result<S::Ok, S::Error> {
        serializer.serialize_str(REDACTED_PASSPHRASE)
    }
}

impl Drop for RedactedString {
    fn drop(&mut self) {
        self.zeroize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redacted_string_debug() {
        let redacted = RedactedString::from("secret_password");
        assert_eq!(format!("{:?}", redacted), REDACTED_PASSPHRASE);
        assert_eq!(
            format!("{:?}", Some(redacted)),
            format!("Some({REDACTED_PASSPHRASE})")
        );
    }

    #[test]
    fn test_redacted_string_serialize() {
        let redacted = RedactedString::from("secret_password");
        let serialized = serde_yml::to_string(&redacted).unwrap();
        assert!(serialized.contains(REDACTED_PASSPHRASE));
        assert!(!serialized.contains("secret_password"));
    }

    #[test]
    fn test_as_line_bytes_appends_newline() {
        let redacted = RedactedString::from("pa ss\nword");
        assert_eq!(redacted.as_line_bytes().as_slice(), b"pa ss\nword\n");
    }

    #[test]
    fn test_as_line_bytes_empty_passphrase() {
        let redacted = RedactedString::from("");
        assert_eq!(redacted.as_line_bytes().as_slice(), b"\n");
    }

    #[test]
    fn test_redacted_string_zeroize() {
        let mut redacted = RedactedString::builder().inner("secret_password").build();
        redacted.zeroize();
        assert!(redacted.inner().is_empty());
    }
}
