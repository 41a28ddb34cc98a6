//! Branded identifier types.
//!
//! [`ConnectionId`] follows the `<prefix>_<uuid v7>` convention so IDs sort by
//! creation time. [`SessionCode`] is the short code participants type in to
//! join a session; it is case-insensitive and always stored uppercase.

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! branded_id {
    ($(#[$meta:meta])* $name:ident, $prefix:expr) => {
        $(#[$meta])*
        #[derive(Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Generate a fresh, time-ordered identifier.
            pub fn new() -> Self {
                Self(format!("{}_{}", $prefix, Uuid::now_v7()))
            }

            /// Wrap an existing string without validation.
            pub fn from_raw(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            /// Borrow the underlying string.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

branded_id!(
    /// Identity of one participant's WebSocket connection.
    ConnectionId,
    "conn"
);

/// Length of a generated session code.
pub const SESSION_CODE_LEN: usize = 7;

const SESSION_CODE_ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Short, human-typable session identifier.
///
/// Codes compare case-insensitively: every constructor uppercases its input,
/// so `"ab12cd3"` and `"AB12CD3"` name the same session.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionCode(String);

impl SessionCode {
    /// Generate a random code of [`SESSION_CODE_LEN`] uppercase alphanumerics.
    ///
    /// Uniqueness is not guaranteed here; the registry retries on collision.
    pub fn generate() -> Self {
        Self::generate_with(&mut rand::rng())
    }

    /// Generate a code from the supplied random source.
    pub fn generate_with<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let code = (0..SESSION_CODE_LEN)
            .map(|_| char::from(SESSION_CODE_ALPHABET[rng.random_range(0..SESSION_CODE_ALPHABET.len())]))
            .collect();
        Self(code)
    }

    /// Normalize client-supplied input into a code (uppercased, no other validation).
    pub fn parse(raw: &str) -> Self {
        Self(raw.to_ascii_uppercase())
    }

    /// Borrow the underlying string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SessionCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
