// crates/reward-audit-core/src/blob.rs
//
// Opaque byte blobs moved between the live chain and replay forks.
//
// Neither blob is interpreted: the runtime is injected verbatim into each
// fork, and the tier configuration is read from one fork and written back
// byte-for-byte into the next.

use std::fmt;

use serde::{de::Error, Deserialize, Deserializer, Serialize, Serializer};

use crate::error::AuditError;

macro_rules! opaque_blob {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, Hash)]
        pub struct $name(Vec<u8>);

        impl $name {
            pub fn new(bytes: Vec<u8>) -> Self {
                Self(bytes)
            }

            /// Parse a `0x`-prefixed (or bare) hex string.
            pub fn from_hex(s: &str) -> Result<Self, AuditError> {
                let trimmed = s.trim();
                let digits = trimmed.strip_prefix("0x").unwrap_or(trimmed);
                Ok(Self(hex::decode(digits)?))
            }

            /// `0x`-prefixed lowercase hex.
            pub fn to_hex(&self) -> String {
                format!("0x{}", hex::encode(&self.0))
            }

            pub fn as_bytes(&self) -> &[u8] {
                &self.0
            }

            pub fn into_bytes(self) -> Vec<u8> {
                self.0
            }

            pub fn len(&self) -> usize {
                self.0.len()
            }

            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl fmt::Debug for $name {
            // Runtimes are megabytes; print a bounded preview.
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                let preview: String = hex::encode(&self.0[..self.0.len().min(16)]);
                write!(f, "{}(0x{}.., {} bytes)", stringify!($name), preview, self.0.len())
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_hex())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                Self::from_hex(&s).map_err(D::Error::custom)
            }
        }
    };
}

opaque_blob!(
    /// Compiled runtime (wasm) extracted from the chain's `:code` entry.
    RuntimeCode
);

opaque_blob!(
    /// SCALE-encoded reward-tier threshold configuration.
    TierConfigBlob
);
