use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Prefixed, time-ordered identifiers. UUIDv7 keeps ids sortable by mint
/// time; the prefix makes a bare id readable in logs and JSON dumps.
macro_rules! prefixed_id {
    ($name:ident, $prefix:literal, $doc:literal) => {
        #[doc = $doc]
        #[derive(Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub const PREFIX: &'static str = $prefix;

            pub fn new() -> Self {
                Self(format!(concat!($prefix, "_{}"), Uuid::now_v7()))
            }

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
    };
}

prefixed_id!(UserId, "user", "Stable account identifier, minted at registration.");
prefixed_id!(SessionId, "sess", "Login session token, minted per successful login.");
