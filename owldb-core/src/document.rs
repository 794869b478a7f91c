//! Core traits for typed documents.
//!
//! Any serde type can be stored through a [`TypedCollection`](crate::collection::TypedCollection)
//! once it implements [`Document`]. Conversion to and from the [`Value`] tree goes through BSON
//! serialization, so BSON serde helpers (for example `bson::serde_helpers`) work on document
//! fields.

use bson::{de::deserialize_from_bson, ser::serialize_to_bson};
use serde::{Deserialize, Serialize};

use crate::{codec::BsonCodec, error::DocumentStoreResult, value::Value};

/// Core trait that all typed documents must implement.
///
/// The identifier lives in the `_id` field. Declare it as `Option<String>` with
/// `skip_serializing_if = "Option::is_none"` to let inserts generate it.
///
/// # Example
///
/// ```ignore
/// use owldb::document::Document;
/// use serde::{Serialize, Deserialize};
///
/// #[derive(Debug, Clone, Serialize, Deserialize)]
/// pub struct Product {
///     #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
///     pub id: Option<String>,
///     pub name: String,
///     pub price: i64,
/// }
///
/// impl Document for Product {
///     fn collection_name() -> &'static str {
///         "products"
///     }
/// }
/// ```
pub trait Document: Serialize + for<'de> Deserialize<'de> + Send + Sync + Clone + 'static {
    /// Returns the name of the collection this document belongs to.
    fn collection_name() -> &'static str;
}

/// Conversion helpers implemented for every [`Document`].
pub trait DocumentExt: Document {
    /// Converts this document into a value tree for storage.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Serialization`](crate::error::DocumentStoreError::Serialization)
    /// if the type cannot be represented.
    fn to_value(&self) -> DocumentStoreResult<Value>;

    /// Creates a document from a value tree.
    ///
    /// # Errors
    ///
    /// Returns an error if deserialization fails or the structure does not match.
    fn from_value(value: Value) -> DocumentStoreResult<Self>;

    fn to_json(&self) -> DocumentStoreResult<serde_json::Value> {
        Ok(self.to_value()?.to_json())
    }
}

impl<D: Document> DocumentExt for D {
    fn to_value(&self) -> DocumentStoreResult<Value> {
        BsonCodec::value_from_bson(serialize_to_bson(self)?)
    }

    fn from_value(value: Value) -> DocumentStoreResult<Self> {
        Ok(deserialize_from_bson(BsonCodec::value_to_bson(&value))?)
    }
}
