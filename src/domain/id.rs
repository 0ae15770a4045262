//! Domain identifier types with proper encapsulation.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            /// Create an id from an existing string.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Get the id as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

macro_rules! generated_id {
    ($name:ident) => {
        impl $name {
            /// Create a fresh id with a generated UUID v4.
            #[must_use]
            pub fn generate() -> Self {
                Self(uuid::Uuid::new_v4().to_string())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::generate()
            }
        }
    };
}

string_id! {
    /// Identifier of a user holding a ledger account or placing wagers.
    UserId
}

string_id! {
    /// Identifier of an event being wagered on (a match or a tournament).
    EventId
}
generated_id!(EventId);

string_id! {
    /// Identifier of a wager.
    WagerId
}
generated_id!(WagerId);

string_id! {
    /// Identifier of a profit approval record.
    ApprovalId
}
generated_id!(ApprovalId);

string_id! {
    /// Identifier of a sector (team) competing in matches and tournaments.
    SectorId
}

string_id! {
    /// Identifier of a player in a scorer market.
    PlayerId
}
