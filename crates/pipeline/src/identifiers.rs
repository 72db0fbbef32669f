//! Newtype domain identifiers.
//!
//! Every domain concept that has an identity is represented as a distinct newtype
//! wrapping a primitive, so an [`ObjectId`] cannot be passed where a
//! [`BucketId`] is expected even though both are strings on the wire.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Macro for String-wrapped newtypes.
// Generates: struct, new() returning Option<Self>, as_str(),
// Display, and a serde representation that rejects the empty string.
// ---------------------------------------------------------------------------
macro_rules! string_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier, returning `None` if the value is empty.
            pub fn new(value: impl Into<String>) -> Option<Self> {
                let v = value.into();
                if v.is_empty() { None } else { Some(Self(v)) }
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = String;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
                    .ok_or_else(|| concat!(stringify!($name), " must not be empty").to_string())
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Identifiers: UUID-backed (internally generated)
// ---------------------------------------------------------------------------

/// Identifies a single webhook delivery (one inbound HTTP request).
///
/// Generated fresh by the listener for every request; propagated through spans
/// so all activity for a delivery can be correlated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeliveryId(Uuid);

impl DeliveryId {
    /// Generates a new random delivery identifier.
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for DeliveryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Identifiers: String-backed (storage records / configuration)
// ---------------------------------------------------------------------------

string_id! {
    /// Identifies a stored object. Assigned by the storage service on upload
    /// and reused as the primary key of the caption row.
    ObjectId
}

string_id! {
    /// Identifies a storage bucket (e.g. `"images"`).
    BucketId
}

string_id! {
    /// Identifies an inference model on the provider's hub
    /// (e.g. `"nlpconnect/vit-gpt2-image-captioning"`).
    ModelId
}

string_id! {
    /// A database table name, used both for the caption table and for the
    /// table a webhook event is expected to originate from.
    TableName
}

// ---------------------------------------------------------------------------
// Identifiers with compile-time defaults
// ---------------------------------------------------------------------------

macro_rules! static_default {
    ($($name:ident),+ $(,)?) => {
        $(
            impl $name {
                /// Creates an identifier from a non-empty compile-time constant.
                pub(crate) fn from_static(value: &'static str) -> Self {
                    debug_assert!(!value.is_empty());
                    Self(value.to_string())
                }
            }
        )+
    };
}

static_default!(ModelId, TableName);
