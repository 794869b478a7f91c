//! Binary encoding of documents.
//!
//! The collection layer never looks at stored bytes directly; it goes through a
//! [`DocumentCodec`]. The default [`BsonCodec`] stores every document as a BSON document.

use bson::{Bson, Document as BsonDocument};
use std::fmt::Debug;

use crate::{
    error::{DocumentStoreError, DocumentStoreResult},
    value::{Object, Timestamp, Value},
};

/// Converts document trees to bytes and back.
///
/// Implementations must round-trip every [`Value`] kind faithfully, including nested arrays,
/// objects and timestamps.
pub trait DocumentCodec: Send + Sync + Debug {
    /// Encodes a document. The root must be an object.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Serialization`] if the value cannot be encoded.
    fn encode(&self, document: &Value) -> DocumentStoreResult<Vec<u8>>;

    /// Decodes bytes previously produced by [`DocumentCodec::encode`].
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Decode`] if the bytes are not a valid document.
    fn decode(&self, bytes: &[u8]) -> DocumentStoreResult<Value>;
}

/// Stores documents as BSON.
///
/// Integers are written as `int64`, floats as `double` and timestamps as UTC datetimes.
/// `int32` values written by other producers decode as integers; any BSON type that has no
/// [`Value`] counterpart is rejected.
#[derive(Debug, Clone, Copy, Default)]
pub struct BsonCodec;

impl BsonCodec {
    fn to_bson(value: &Value) -> Bson {
        match value {
            Value::Null => Bson::Null,
            Value::Boolean(value) => Bson::Boolean(*value),
            Value::Integer(value) => Bson::Int64(*value),
            Value::Float(value) => Bson::Double(*value),
            Value::String(value) => Bson::String(value.clone()),
            Value::Timestamp(value) => {
                Bson::DateTime(bson::DateTime::from_millis(value.timestamp_millis()))
            }
            Value::Array(values) => Bson::Array(values.iter().map(Self::to_bson).collect()),
            Value::Object(map) => Bson::Document(Self::to_document(map)),
        }
    }

    fn to_document(map: &Object) -> BsonDocument {
        map.iter()
            .map(|(key, value)| (key.clone(), Self::to_bson(value)))
            .collect()
    }

    fn from_bson(bson: Bson) -> DocumentStoreResult<Value> {
        Ok(match bson {
            Bson::Null => Value::Null,
            Bson::Boolean(value) => Value::Boolean(value),
            Bson::Int32(value) => Value::Integer(value.into()),
            Bson::Int64(value) => Value::Integer(value),
            Bson::Double(value) => Value::Float(value),
            Bson::String(value) => Value::String(value),
            Bson::DateTime(value) => Value::Timestamp(Timestamp::from_millis(value.timestamp_millis())),
            Bson::Array(values) => Value::Array(
                values
                    .into_iter()
                    .map(Self::from_bson)
                    .collect::<DocumentStoreResult<Vec<_>>>()?,
            ),
            Bson::Document(document) => Self::from_document(document)?,
            other => {
                return Err(DocumentStoreError::Decode(format!(
                    "unsupported BSON element type {:?}",
                    other.element_type()
                )));
            }
        })
    }

    fn from_document(document: BsonDocument) -> DocumentStoreResult<Value> {
        Ok(Value::Object(
            document
                .into_iter()
                .map(|(key, value)| Self::from_bson(value).map(|value| (key, value)))
                .collect::<DocumentStoreResult<Object>>()?,
        ))
    }

    /// Converts a BSON value (e.g. from a serde type) into a document tree.
    pub(crate) fn value_from_bson(bson: Bson) -> DocumentStoreResult<Value> {
        Self::from_bson(bson).map_err(|err| match err {
            DocumentStoreError::Decode(message) => DocumentStoreError::Serialization(message),
            other => other,
        })
    }

    /// Converts a document tree into BSON (e.g. to deserialize a serde type from it).
    pub(crate) fn value_to_bson(value: &Value) -> Bson {
        Self::to_bson(value)
    }
}

impl DocumentCodec for BsonCodec {
    fn encode(&self, document: &Value) -> DocumentStoreResult<Vec<u8>> {
        let map = document.as_object().ok_or_else(|| {
            DocumentStoreError::Serialization(format!(
                "document root must be an object, found {}",
                document.kind()
            ))
        })?;

        let mut bytes = Vec::new();
        Self::to_document(map).to_writer(&mut bytes)?;

        Ok(bytes)
    }

    fn decode(&self, bytes: &[u8]) -> DocumentStoreResult<Value> {
        let document = BsonDocument::from_reader(bytes)
            .map_err(|err| DocumentStoreError::Decode(err.to_string()))?;

        Self::from_document(document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn preserves_every_value_kind() {
        let mut document: Value = json!({
            "_id": "abc",
            "count": 3,
            "ratio": 0.25,
            "active": true,
            "missing": null,
            "tags": ["a", 1, 2.5, [true]],
            "nested": { "deep": { "value": "x" } },
        })
        .into();
        document
            .set_path("seenAt", Value::Timestamp(Timestamp::from_millis(1_700_000_000_123)))
            .unwrap();

        let bytes = BsonCodec.encode(&document).unwrap();

        assert_eq!(BsonCodec.decode(&bytes).unwrap(), document);
    }

    #[test]
    fn keeps_member_order() {
        let mut document: Value = json!({ "_id": "abc" }).into();
        document.set_path("zeta", 1.into()).unwrap();
        document.set_path("alpha", 2.into()).unwrap();

        let decoded = BsonCodec.decode(&BsonCodec.encode(&document).unwrap()).unwrap();
        let keys: Vec<_> = decoded.as_object().unwrap().keys().cloned().collect();

        assert_eq!(keys, vec!["_id", "zeta", "alpha"]);
    }

    #[test]
    fn int32_decodes_as_integer() {
        let mut bytes = Vec::new();
        bson::doc! { "n": 7_i32 }.to_writer(&mut bytes).unwrap();

        assert_eq!(BsonCodec.decode(&bytes).unwrap().get("n"), Some(&Value::Integer(7)));
    }

    #[test]
    fn rejects_foreign_bson_types() {
        let mut bytes = Vec::new();
        bson::doc! { "id": bson::oid::ObjectId::new() }
            .to_writer(&mut bytes)
            .unwrap();

        assert!(matches!(BsonCodec.decode(&bytes), Err(DocumentStoreError::Decode(_))));
    }

    #[test]
    fn rejects_garbage_and_non_objects() {
        assert!(matches!(
            BsonCodec.decode(b"not a document"),
            Err(DocumentStoreError::Decode(_))
        ));
        assert!(matches!(
            BsonCodec.encode(&Value::Integer(1)),
            Err(DocumentStoreError::Serialization(_))
        ));
    }
}
