//! Request body shapes and the JSON codec.
//!
//! A [`Body`] is one of four shapes: raw bytes passed through untouched,
//! plain text, an insertion-ordered map of scalar [`Fields`], or an
//! arbitrary serializable record. Encoding happens exactly once per
//! request, before any network I/O, so a malformed body can never burn a
//! retry attempt.

use bytes::Bytes;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};

/// A single field value: JSON's scalar subset.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Scalar::Bool(value)
    }
}

impl From<i32> for Scalar {
    fn from(value: i32) -> Self {
        Scalar::Integer(value.into())
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Scalar::Integer(value)
    }
}

impl From<u32> for Scalar {
    fn from(value: u32) -> Self {
        Scalar::Integer(value.into())
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Scalar::Float(value)
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::String(value.to_owned())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Scalar::String(value)
    }
}

impl Serialize for Scalar {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Scalar::Null => serializer.serialize_unit(),
            Scalar::Bool(value) => serializer.serialize_bool(*value),
            Scalar::Integer(value) => serializer.serialize_i64(*value),
            Scalar::Float(value) => serializer.serialize_f64(*value),
            Scalar::String(value) => serializer.serialize_str(value),
        }
    }
}

impl<'de> Deserialize<'de> for Scalar {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(ScalarVisitor)
    }
}

struct ScalarVisitor;

impl<'de> Visitor<'de> for ScalarVisitor {
    type Value = Scalar;

    fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "null, a boolean, a number, or a string")
    }

    fn visit_unit<E>(self) -> std::result::Result<Scalar, E> {
        Ok(Scalar::Null)
    }

    fn visit_bool<E>(self, value: bool) -> std::result::Result<Scalar, E> {
        Ok(Scalar::Bool(value))
    }

    fn visit_i64<E>(self, value: i64) -> std::result::Result<Scalar, E> {
        Ok(Scalar::Integer(value))
    }

    fn visit_u64<E>(self, value: u64) -> std::result::Result<Scalar, E>
    where
        E: serde::de::Error,
    {
        i64::try_from(value)
            .map(Scalar::Integer)
            .map_err(|_| E::custom(format!("integer {value} out of range")))
    }

    fn visit_f64<E>(self, value: f64) -> std::result::Result<Scalar, E> {
        Ok(Scalar::Float(value))
    }

    fn visit_str<E>(self, value: &str) -> std::result::Result<Scalar, E> {
        Ok(Scalar::String(value.to_owned()))
    }

    fn visit_string<E>(self, value: String) -> std::result::Result<Scalar, E> {
        Ok(Scalar::String(value))
    }
}

/// An insertion-ordered map of scalar fields.
///
/// Unlike a plain JSON map, `Fields` remembers the order keys were
/// inserted, and encoding then decoding a value reproduces it exactly,
/// order included. Re-inserting an existing key replaces its value but
/// keeps its original position.
///
/// # Examples
///
/// ```
/// use recall::Fields;
///
/// let mut fields = Fields::new();
/// fields.insert("name", "ada");
/// fields.insert("attempts", 3);
/// fields.insert("active", true);
///
/// let keys: Vec<&str> = fields.iter().map(|(key, _)| key).collect();
/// assert_eq!(keys, ["name", "attempts", "active"]);
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Fields {
    entries: Vec<(String, Scalar)>,
}

impl Fields {
    /// Creates an empty field map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a field, replacing the value in place if the key exists.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Scalar>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == key) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Looks up a field by key.
    pub fn get(&self, key: &str) -> Option<&Scalar> {
        self.entries
            .iter()
            .find_map(|(existing, value)| (existing == key).then_some(value))
    }

    /// Iterates fields in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Scalar)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for Fields {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Fields {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_map(FieldsVisitor)
    }
}

struct FieldsVisitor;

impl<'de> Visitor<'de> for FieldsVisitor {
    type Value = Fields;

    fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "a map of scalar fields")
    }

    fn visit_map<A>(self, mut access: A) -> std::result::Result<Fields, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut fields = Fields {
            entries: Vec::with_capacity(access.size_hint().unwrap_or(0)),
        };
        while let Some((key, value)) = access.next_entry::<String, Scalar>()? {
            fields.insert(key, value);
        }
        Ok(fields)
    }
}

/// A request body in one of the supported shapes.
///
/// # Examples
///
/// ```
/// use recall::{Body, Fields};
///
/// let mut fields = Fields::new();
/// fields.insert("query", "rust");
/// let body = Body::fields(fields);
///
/// let body = Body::text("plain text payload");
///
/// #[derive(serde::Serialize)]
/// struct NewUser {
///     name: String,
/// }
/// let body = Body::record(&NewUser { name: "ada".into() }).unwrap();
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    /// Opaque bytes, passed through without re-encoding.
    Raw(Bytes),
    /// UTF-8 text.
    Text(String),
    /// An insertion-ordered scalar map, encoded as a JSON object.
    Fields(Fields),
    /// An arbitrary record, captured as a JSON value at construction.
    Record(serde_json::Value),
}

impl Body {
    /// A body of opaque bytes.
    pub fn raw(payload: impl Into<Bytes>) -> Self {
        Body::Raw(payload.into())
    }

    /// A plain text body.
    pub fn text(text: impl Into<String>) -> Self {
        Body::Text(text.into())
    }

    /// A body built from an ordered field map.
    pub fn fields(fields: Fields) -> Self {
        Body::Fields(fields)
    }

    /// A body built from any serializable value.
    ///
    /// Serialization to a JSON value happens here, so an unencodable body
    /// fails before a request is ever constructed around it.
    pub fn record<T: Serialize>(value: &T) -> Result<Self> {
        let value = serde_json::to_value(value).map_err(|source| Error::EncodingFailed { source })?;
        Ok(Body::Record(value))
    }
}

/// The wire form of a body: payload bytes plus the content type the client
/// applies when the caller has not set one.
#[derive(Debug, Clone)]
pub(crate) struct Encoded {
    pub payload: Bytes,
    pub content_type: &'static str,
}

/// Encodes a body to its wire form.
pub(crate) fn encode(body: &Body) -> Result<Encoded> {
    use serde::ser::Error as _;

    match body {
        Body::Raw(payload) => Ok(Encoded {
            payload: payload.clone(),
            content_type: "application/octet-stream",
        }),
        Body::Text(text) => Ok(Encoded {
            payload: Bytes::copy_from_slice(text.as_bytes()),
            content_type: "text/plain; charset=utf-8",
        }),
        Body::Fields(fields) => {
            // serde_json renders non-finite floats as null, which would
            // silently change the value; reject them up front.
            for (key, value) in fields.iter() {
                if let Scalar::Float(f) = value {
                    if !f.is_finite() {
                        return Err(Error::EncodingFailed {
                            source: serde_json::Error::custom(format!(
                                "field `{key}` is not a finite number"
                            )),
                        });
                    }
                }
            }
            let payload =
                serde_json::to_vec(fields).map_err(|source| Error::EncodingFailed { source })?;
            Ok(Encoded {
                payload: payload.into(),
                content_type: "application/json",
            })
        }
        Body::Record(value) => {
            let payload =
                serde_json::to_vec(value).map_err(|source| Error::EncodingFailed { source })?;
            Ok(Encoded {
                payload: payload.into(),
                content_type: "application/json",
            })
        }
    }
}

/// Decodes response bytes into the target type.
pub(crate) fn decode<T: serde::de::DeserializeOwned>(payload: &[u8]) -> serde_json::Result<T> {
    serde_json::from_slice(payload)
}
