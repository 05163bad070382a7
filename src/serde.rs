//! Serde integration.
//!
//! Views and values serialize as maps and sequences for human-readable
//! formats, and as their raw bytes for binary formats. Deserialization is
//! out of scope: this crate's decode path is the zero-copy reader.

use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

use crate::{
    array::{Array, ArrayBuf},
    buffer::Storage,
    builder::DocumentBuilder,
    document::Document,
    oid::ObjectId,
    value::{Timestamp, ValueRef},
};

impl Serialize for &Document {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            let mut map = serializer.serialize_map(None)?;
            for pair in self.iter() {
                let (key, value) = pair.map_err(serde::ser::Error::custom)?;
                map.serialize_entry(key, &value)?;
            }
            map.end()
        } else {
            serializer.serialize_bytes(self.as_bytes())
        }
    }
}

impl Serialize for &Array {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            let mut seq = serializer.serialize_seq(None)?;
            for value in self.iter() {
                let value = value.map_err(serde::ser::Error::custom)?;
                seq.serialize_element(&value)?;
            }
            seq.end()
        } else {
            serializer.serialize_bytes(self.as_bytes())
        }
    }
}

impl<St: Storage> Serialize for DocumentBuilder<St> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.as_document().serialize(serializer)
    }
}

impl Serialize for ArrayBuf {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.as_array().serialize(serializer)
    }
}

impl Serialize for ObjectId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.to_hex())
        } else {
            serializer.serialize_bytes(&self.bytes())
        }
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry("t", &self.time)?;
        map.serialize_entry("i", &self.increment)?;
        map.end()
    }
}

impl Serialize for ValueRef<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match *self {
            ValueRef::Double(v) => serializer.serialize_f64(v),
            ValueRef::String(v) => serializer.serialize_str(v),
            ValueRef::Document(v) => v.serialize(serializer),
            ValueRef::Array(v) => v.serialize(serializer),
            ValueRef::Binary(v) => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("$type", &hex::encode([u8::from(v.subtype)]))?;
                map.serialize_entry("$binary", &crate::base64::encode(v.bytes))?;
                map.end()
            }
            ValueRef::Undefined => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("$undefined", &true)?;
                map.end()
            }
            ValueRef::ObjectId(v) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("$oid", &v.to_hex())?;
                map.end()
            }
            ValueRef::Boolean(v) => serializer.serialize_bool(v),
            ValueRef::DateTime(v) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("$date", &v)?;
                map.end()
            }
            ValueRef::Null => serializer.serialize_unit(),
            ValueRef::RegularExpression(v) => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("$regex", v.pattern)?;
                map.serialize_entry("$options", v.options)?;
                map.end()
            }
            ValueRef::DbPointer(v) => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("$ref", v.namespace)?;
                map.serialize_entry("$id", &v.id.to_hex())?;
                map.end()
            }
            ValueRef::JavaScriptCode(v) => serializer.serialize_str(v),
            ValueRef::Symbol(v) => serializer.serialize_str(v),
            ValueRef::JavaScriptCodeWithScope(v) => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("$code", v.code)?;
                map.serialize_entry("$scope", &v.scope)?;
                map.end()
            }
            ValueRef::Int32(v) => serializer.serialize_i32(v),
            ValueRef::Timestamp(v) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("$timestamp", &v)?;
                map.end()
            }
            ValueRef::Int64(v) => serializer.serialize_i64(v),
            ValueRef::MaxKey => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("$maxKey", &1)?;
                map.end()
            }
            ValueRef::MinKey => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("$minKey", &1)?;
                map.end()
            }
        }
    }
}
