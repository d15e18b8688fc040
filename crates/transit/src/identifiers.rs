//! Type-safe, cheaply clonable identifiers for transit entities.
//!
//! The upstream service is inconsistent about identifier types (stop ids are
//! strings in one system and integers in another), so every identifier
//! deserializes from either a JSON string or a JSON number and is stored as
//! an `Arc<str>`.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum RawIdentifier {
    Text(String),
    Integer(i64),
    Float(f64),
}

impl RawIdentifier {
    fn into_string(self) -> String {
        match self {
            RawIdentifier::Text(s) => s,
            RawIdentifier::Integer(n) => n.to_string(),
            RawIdentifier::Float(n) => n.to_string(),
        }
    }
}

macro_rules! impl_identifier {
    ($name:ident) => {
        #[derive(Clone, Debug)]
        pub struct $name(Arc<str>);

        impl $name {
            pub fn new(s: impl AsRef<str>) -> Self {
                Self(s.as_ref().into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl PartialEq for $name {
            fn eq(&self, other: &Self) -> bool {
                Arc::ptr_eq(&self.0, &other.0) || self.0 == other.0
            }
        }

        impl Eq for $name {}

        impl Hash for $name {
            fn hash<H: Hasher>(&self, state: &mut H) {
                self.0.hash(state);
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self::new(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self::new(s)
            }
        }

        impl From<u32> for $name {
            fn from(n: u32) -> Self {
                Self::new(n.to_string())
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.0)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                RawIdentifier::deserialize(deserializer).map(|raw| Self::new(raw.into_string()))
            }
        }
    };
}

impl_identifier!(StopIdentifier);
impl_identifier!(VehicleIdentifier);
impl_identifier!(RouteIdentifier);
impl_identifier!(SystemIdentifier);
