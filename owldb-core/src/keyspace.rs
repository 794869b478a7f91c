//! Layout of documents and index entries in the key-value store.
//!
//! Two disjoint key families share the store:
//!
//! - primary records: `d:<collection>|<id>` holding the encoded document
//! - index entries: `i:<collection>|<field>|<value>|<id>` holding the document ID
//!
//! Every segment escapes `\` and `|` with a backslash, so each key decodes to exactly one
//! tuple and a collection prefix never reaches into another collection or family.

use crate::value::Value;

const PRIMARY_FAMILY: &[u8] = b"d:";
const INDEX_FAMILY: &[u8] = b"i:";
const SEPARATOR: u8 = b'|';
const ESCAPE: u8 = b'\\';

fn push_segment(key: &mut Vec<u8>, segment: &[u8]) {
    for &byte in segment {
        if byte == SEPARATOR || byte == ESCAPE {
            key.push(ESCAPE);
        }
        key.push(byte);
    }
}

fn build(family: &[u8], segments: &[&[u8]], trailing_separator: bool) -> Vec<u8> {
    let capacity = family.len() + segments.iter().map(|s| s.len() + 1).sum::<usize>();
    let mut key = Vec::with_capacity(capacity);
    key.extend_from_slice(family);

    for (position, segment) in segments.iter().enumerate() {
        if position > 0 {
            key.push(SEPARATOR);
        }
        push_segment(&mut key, segment);
    }

    if trailing_separator {
        key.push(SEPARATOR);
    }

    key
}

/// Key of the primary record for document `id` in `collection`.
pub fn primary_key(collection: &str, id: &str) -> Vec<u8> {
    build(PRIMARY_FAMILY, &[collection.as_bytes(), id.as_bytes()], false)
}

/// Prefix bounding exactly the primary records of `collection`.
pub fn collection_prefix(collection: &str) -> Vec<u8> {
    build(PRIMARY_FAMILY, &[collection.as_bytes()], true)
}

/// Key of the index entry for `field = value` on document `id`.
pub fn index_key(collection: &str, field: &str, value: &Value, id: &str) -> Vec<u8> {
    let rendered = render_index_value(value);

    build(
        INDEX_FAMILY,
        &[collection.as_bytes(), field.as_bytes(), rendered.as_bytes(), id.as_bytes()],
        false,
    )
}

/// Prefix of every index entry of `field` in `collection`.
pub fn index_field_prefix(collection: &str, field: &str) -> Vec<u8> {
    build(INDEX_FAMILY, &[collection.as_bytes(), field.as_bytes()], true)
}

/// Prefix of the index entries recording `field = value` in `collection`.
pub fn index_value_prefix(collection: &str, field: &str, value: &Value) -> Vec<u8> {
    let rendered = render_index_value(value);

    build(
        INDEX_FAMILY,
        &[collection.as_bytes(), field.as_bytes(), rendered.as_bytes()],
        true,
    )
}

/// Renders an indexed value with a kind tag, so `1`, `1.0` and `"1"` stay distinct.
///
/// Arrays and objects render their elements recursively, each quoted as a JSON string. Object
/// members are sorted by name so equal objects always share one rendering.
pub fn render_index_value(value: &Value) -> String {
    match value {
        Value::Null => "n:".to_string(),
        Value::Boolean(value) => format!("b:{value}"),
        Value::Integer(value) => format!("i:{value}"),
        Value::Float(value) => format!("f:{value:?}"),
        Value::String(value) => format!("s:{value}"),
        Value::Timestamp(value) => format!("t:{}", value.timestamp_millis()),
        Value::Array(items) => {
            let items: Vec<String> = items.iter().map(|item| quoted(&render_index_value(item))).collect();
            format!("a:[{}]", items.join(","))
        }
        Value::Object(members) => {
            let mut members: Vec<_> = members.iter().collect();
            members.sort_by(|(left, _), (right, _)| left.cmp(right));

            let members: Vec<String> = members
                .into_iter()
                .map(|(name, member)| format!("{}:{}", quoted(name), quoted(&render_index_value(member))))
                .collect();
            format!("o:{{{}}}", members.join(","))
        }
    }
}

fn quoted(text: &str) -> String {
    serde_json::Value::from(text).to_string()
}
