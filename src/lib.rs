//! BSON, short for Binary JSON, is a binary-encoded serialization of
//! JSON-like documents: length-prefixed, typed key/value elements that can
//! nest documents and arrays.
//!
//! ```text
//! // JSON equivalent
//! {"hello": "world"}
//!
//! // BSON encoding
//! \x16\x00\x00\x00                   // total document size
//! \x02                               // 0x02 = type String
//! hello\x00                          // field name
//! \x06\x00\x00\x00world\x00          // field value
//! \x00                               // 0x00 = type EOO ('end of object')
//! ```
//!
//! This crate works on that encoding directly, with no intermediate tree:
//!
//! - [`DocumentBuf`] builds documents by appending typed elements in
//!   place. Sub-documents and arrays are built inside the same buffer —
//!   [`DocumentBuilder::begin_document`] opens a frame, appends land in
//!   it, and every enclosing length prefix is kept correct after each
//!   append, so the bytes always parse.
//! - [`Document`] is a zero-copy view over existing bytes (an unsized
//!   type, like [`str`]). Iteration parses lazily and borrows from the
//!   buffer; nothing is decoded until asked for.
//! - [`Visitor`] and [`visit_all`] drive per-type callbacks over a
//!   document, powering [`Document::validate`] and [`Document::to_json`].
//!
//! # Building and reading
//!
//! ```
//! use bsonbuf::{cstr, DocumentBuf};
//!
//! let mut doc = DocumentBuf::new();
//! doc.append_utf8(cstr!("crate"), "bsonbuf")?;
//! doc.begin_array(cstr!("versions"))?;
//! doc.append_int32(cstr!("0"), 1)?;
//! doc.append_int32(cstr!("1"), 2)?;
//! doc.end_array()?;
//!
//! for entry in doc.iter() {
//!     let (key, value) = entry?;
//!     if key == "crate" {
//!         assert_eq!(value.as_str(), Some("bsonbuf"));
//!     }
//! }
//! assert_eq!(
//!     doc.to_json()?,
//!     r#"{ "crate" : "bsonbuf", "versions" : [ 1, 2 ] }"#,
//! );
//! # Ok::<(), bsonbuf::Error>(())
//! ```
//!
//! # Borrowing foreign bytes
//!
//! ```
//! use bsonbuf::Document;
//!
//! let bytes = b"\x0e\x00\x00\x00\x10seq\x00\x07\x00\x00\x00\x00";
//! let doc = Document::from_bytes(bytes)?;
//! assert_eq!(doc.get_i32("seq")?, 7);
//! # Ok::<(), bsonbuf::Error>(())
//! ```
//!
//! Element keys are [`CStr`] values — UTF-8 with no interior NUL, checked
//! at compile time by [`cstr!`] for literals and by fallible conversions
//! for runtime strings.

pub mod array;
mod base64;
pub mod buffer;
pub mod builder;
pub mod cstr;
pub mod document;
pub mod error;
pub mod iter;
mod json;
pub mod oid;
#[cfg(feature = "serde")]
mod serde;
pub mod spec;
pub mod validate;
pub mod value;
pub mod visitor;
pub mod writer;

#[cfg(test)]
mod tests;

#[doc(inline)]
pub use self::{
    array::{Array, ArrayBuf},
    buffer::{OwnedBuffer, Storage, INLINE_CAPACITY},
    builder::{DocumentBuf, DocumentBuilder},
    cstr::{CStr, CString},
    document::Document,
    error::{Error, ErrorKind, Result, ValueAccessErrorKind},
    iter::{Element, Elements, Iter},
    oid::ObjectId,
    spec::{BinarySubtype, ElementType, MAX_DOCUMENT_SIZE, MIN_DOCUMENT_SIZE},
    validate::ValidateOptions,
    value::{BinaryRef, CodeWithScopeRef, DbPointerRef, RegexRef, Timestamp, ValueRef},
    visitor::{visit_all, Visitor},
    writer::{DocumentWriter, WriterSlot},
};
