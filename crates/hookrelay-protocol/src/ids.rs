//! Canonical ID types for the hook relay.
//!
//! IDs are opaque String wrappers (serde-transparent). The agent runtime owns
//! session ids; trace ids fall back to session ids; intercept ids are minted by
//! the decision service. None of them are parsed or validated here.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! typed_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create from any string value.
            pub fn from_string(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            /// Create a new ID using UUID v4 (random).
            pub fn new_uuid() -> Self {
                Self(uuid::Uuid::new_v4().to_string())
            }

            /// View as string slice.
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

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

typed_id!(
    /// Agent session identifier. Sentinel is "unknown".
    SessionId
);
typed_id!(
    /// Correlation id grouping the events of one trace.
    TraceId
);
typed_id!(
    /// Decision-service handle for one intercepted action.
    InterceptId
);

impl SessionId {
    /// Sentinel used when the agent runtime did not supply a session id.
    pub const UNKNOWN: &'static str = "unknown";

    pub fn unknown() -> Self {
        Self(Self::UNKNOWN.to_owned())
    }

    pub fn is_unknown(&self) -> bool {
        self.0 == Self::UNKNOWN
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::unknown()
    }
}

impl Default for TraceId {
    fn default() -> Self {
        Self::new_uuid()
    }
}
