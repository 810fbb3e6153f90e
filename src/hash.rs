//! Fixed-size hash types used on the wire and in the Ethash routines.
//!
//! Both types are opaque big-endian byte arrays. Comparison is lexicographic
//! over the bytes, which for big-endian values is numeric comparison; this is
//! what makes `result <= boundary` share checks a plain `<=`.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Error parsing a hash from a hex string.
#[derive(Error, Debug, PartialEq)]
pub enum ParseHashError {
    /// Input was longer than the target width.
    #[error("hex string too long: {0} nibbles")]
    TooLong(usize),

    /// Input contained a non-hex character.
    #[error("invalid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),
}

macro_rules! impl_hash {
    ($name:ident, $bytes:expr) => {
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
        pub struct $name(pub [u8; $bytes]);

        impl $name {
            /// Width in bytes.
            pub const LEN: usize = $bytes;

            /// The all-zero hash.
            pub const ZERO: Self = Self([0u8; $bytes]);

            /// The all-ones hash.
            pub const MAX: Self = Self([0xff; $bytes]);

            pub fn from_bytes(bytes: [u8; $bytes]) -> Self {
                Self(bytes)
            }

            pub fn as_bytes(&self) -> &[u8; $bytes] {
                &self.0
            }

            /// Parse from hex, tolerating an `0x` prefix and short input.
            ///
            /// Short input is left-padded with zeros, i.e. treated as a
            /// number. Pools disagree on whether to zero-fill job ids and
            /// targets, so the permissive read keeps sessions alive against
            /// servers the strict one would kill.
            pub fn from_hex(s: &str) -> Result<Self, ParseHashError> {
                let s = s.strip_prefix("0x").unwrap_or(s);
                if s.len() > $bytes * 2 {
                    return Err(ParseHashError::TooLong(s.len()));
                }
                let mut padded = String::with_capacity($bytes * 2);
                for _ in 0..($bytes * 2 - s.len()) {
                    padded.push('0');
                }
                padded.push_str(s);
                let mut out = [0u8; $bytes];
                hex::decode_to_slice(&padded, &mut out)?;
                Ok(Self(out))
            }

            /// Lowercase hex, no prefix.
            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.to_hex())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "0x{}", self.to_hex())
            }
        }

        impl FromStr for $name {
            type Err = ParseHashError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::from_hex(s)
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }
    };
}

impl_hash!(Hash256, 32);
impl_hash!(Hash64, 8);
