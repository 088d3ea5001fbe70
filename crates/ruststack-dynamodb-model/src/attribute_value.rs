//! DynamoDB `AttributeValue`.
//!
//! On the wire an attribute value is a single-key object such as
//! `{"S": "hello"}`. Binary values travel base64-encoded.

use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// A typed DynamoDB attribute value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttributeValue {
    /// String.
    #[serde(rename = "S")]
    S(String),
    /// Number, kept in its decimal string form.
    #[serde(rename = "N")]
    N(String),
    /// Binary.
    #[serde(rename = "B", with = "base64_bytes")]
    B(Bytes),
    /// String set.
    #[serde(rename = "SS")]
    Ss(Vec<String>),
    /// Number set.
    #[serde(rename = "NS")]
    Ns(Vec<String>),
    /// Binary set.
    #[serde(rename = "BS", with = "base64_bytes_list")]
    Bs(Vec<Bytes>),
    /// Boolean.
    #[serde(rename = "BOOL")]
    Bool(bool),
    /// Null marker. DynamoDB only ever sends `true`.
    #[serde(rename = "NULL")]
    Null(bool),
    /// List.
    #[serde(rename = "L")]
    L(Vec<AttributeValue>),
    /// Map.
    #[serde(rename = "M")]
    M(HashMap<String, AttributeValue>),
}

impl AttributeValue {
    /// The null value.
    #[must_use]
    pub fn null() -> Self {
        Self::Null(true)
    }

    /// A number from anything that renders as a decimal.
    #[must_use]
    pub fn number(value: impl fmt::Display) -> Self {
        Self::N(value.to_string())
    }

    /// Whether this is the null value.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null(true))
    }

    /// The string, for `S` values.
    #[must_use]
    pub fn as_s(&self) -> Option<&str> {
        match self {
            Self::S(s) => Some(s),
            _ => None,
        }
    }

    /// The decimal string, for `N` values.
    #[must_use]
    pub fn as_n(&self) -> Option<&str> {
        match self {
            Self::N(n) => Some(n),
            _ => None,
        }
    }

    /// The boolean, for `BOOL` values.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// The list, for `L` values.
    #[must_use]
    pub fn as_l(&self) -> Option<&[AttributeValue]> {
        match self {
            Self::L(l) => Some(l),
            _ => None,
        }
    }

    /// The map, for `M` values.
    #[must_use]
    pub fn as_m(&self) -> Option<&HashMap<String, AttributeValue>> {
        match self {
            Self::M(m) => Some(m),
            _ => None,
        }
    }

    /// Wire type descriptor, e.g. `S` or `BOOL`.
    #[must_use]
    pub fn type_descriptor(&self) -> &'static str {
        match self {
            Self::S(_) => "S",
            Self::N(_) => "N",
            Self::B(_) => "B",
            Self::Ss(_) => "SS",
            Self::Ns(_) => "NS",
            Self::Bs(_) => "BS",
            Self::Bool(_) => "BOOL",
            Self::Null(_) => "NULL",
            Self::L(_) => "L",
            Self::M(_) => "M",
        }
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        Self::S(value)
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::S(value.to_owned())
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        Self::number(value)
    }
}

impl Hash for AttributeValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_descriptor().hash(state);
        match self {
            Self::S(s) | Self::N(s) => s.hash(state),
            Self::B(b) => b.hash(state),
            Self::Ss(v) | Self::Ns(v) => v.hash(state),
            Self::Bs(v) => v.hash(state),
            Self::Bool(b) | Self::Null(b) => b.hash(state),
            Self::L(v) => v.hash(state),
            Self::M(m) => hash_attribute_map(m, state),
        }
    }
}

/// Hash an attribute map independently of its iteration order.
pub fn hash_attribute_map<H: Hasher>(map: &HashMap<String, AttributeValue>, state: &mut H) {
    let mut entries: Vec<_> = map.iter().collect();
    entries.sort_unstable_by(|a, b| a.0.cmp(b.0));
    entries.len().hash(state);
    for (name, value) in entries {
        name.hash(state);
        value.hash(state);
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::S(s) => write!(f, "S({s})"),
            Self::N(n) => write!(f, "N({n})"),
            Self::B(b) => write!(f, "B({} bytes)", b.len()),
            Self::Ss(v) => write!(f, "SS({})", v.join(", ")),
            Self::Ns(v) => write!(f, "NS({})", v.join(", ")),
            Self::Bs(v) => write!(f, "BS({} values)", v.len()),
            Self::Bool(b) => write!(f, "BOOL({b})"),
            Self::Null(_) => f.write_str("NULL"),
            Self::L(v) => {
                f.write_str("L[")?;
                for (i, value) in v.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{value}")?;
                }
                f.write_str("]")
            }
            Self::M(m) => {
                let mut names: Vec<_> = m.keys().collect();
                names.sort_unstable();
                f.write_str("M{")?;
                for (i, name) in names.into_iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{name}={}", m[name])?;
                }
                f.write_str("}")
            }
        }
    }
}

mod base64_bytes {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use bytes::Bytes;
    use serde::{Deserialize, Deserializer, Serializer, de};

    pub(super) fn serialize<S: Serializer>(value: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(value))
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Bytes, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded)
            .map(Bytes::from)
            .map_err(de::Error::custom)
    }
}

mod base64_bytes_list {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use bytes::Bytes;
    use serde::ser::SerializeSeq;
    use serde::{Deserialize, Deserializer, Serializer, de};

    pub(super) fn serialize<S: Serializer>(
        values: &[Bytes],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(values.len()))?;
        for value in values {
            seq.serialize_element(&STANDARD.encode(value))?;
        }
        seq.end()
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<Bytes>, D::Error> {
        Vec::<String>::deserialize(deserializer)?
            .into_iter()
            .map(|encoded| {
                STANDARD
                    .decode(encoded)
                    .map(Bytes::from)
                    .map_err(de::Error::custom)
            })
            .collect()
    }
}
