//! Strongly-typed identifiers (avoid mixing opaque strings arbitrarily).
//!
//! User and group ids are owned by the remote user and group services, so they
//! are treated as opaque text. Encounter and proposal ids are assigned by the
//! store backend, which may impose its own format.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

string_id!(
    /// User identifier (issued by the user service).
    UserId
);

string_id!(
    /// Group identifier (issued by the group service).
    GroupId
);

string_id!(
    /// Encounter identifier.
    EncounterId
);

string_id!(
    /// Encounter proposal identifier.
    ProposalId
);
