//! Credentials that never show up in logs or serialized output.

use derive_more::From;
use serde::de::Visitor;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{Debug, Formatter};
use std::result;
use zeroize::{Zeroize, ZeroizeOnDrop};

pub static REDACTED: &str = "###REDACTED###";

/// A secret string. `Debug` and `Serialize` print a placeholder and the
/// memory is zeroed on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop, From, PartialEq, Eq)]
pub struct RedactedString {
    inner: String,
}

impl RedactedString {
    pub fn new<S: Into<String>>(inner: S) -> Self {
        Self {
            inner: inner.into(),
        }
    }

    pub fn expose(&self) -> &str {
        &self.inner
    }
}

impl From<&str> for RedactedString {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl Debug for RedactedString {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(REDACTED)
    }
}

impl Serialize for RedactedString {
    fn serialize<S: Serializer>(&self, serializer: S) -> result::Result<S::Ok, S::Error> {
        serializer.serialize_str(REDACTED)
    }
}

struct RedactedStringVisitor;

impl Visitor<'_> for RedactedStringVisitor {
    type Value = RedactedString;

    fn expecting(&self, formatter: &mut Formatter) -> std::fmt::Result {
        formatter.write_str("a string")
    }

    fn visit_str<E>(self, v: &str) -> result::Result<Self::Value, E>
    where
        E: serde::de::Error,
    {
        Ok(RedactedString::new(v))
    }
}

impl<'de> Deserialize<'de> for RedactedString {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> result::Result<Self, D::Error> {
        deserializer.deserialize_str(RedactedStringVisitor)
    }
}
