//! In-place document construction.
//!
//! A [`DocumentBuilder`] owns a [`Storage`] window and appends typed
//! elements to the tail of the document inside it. Nested documents and
//! arrays are built in place: [`DocumentBuilder::begin_document`] opens a
//! frame and subsequent appends land inside it, with every enclosing
//! length prefix re-stamped after each append. The buffer therefore parses
//! as a well-formed document between any two operations, even with
//! sub-documents still open.
//!
//! [`DocumentBuf`] is the common case — a builder over handle-owned
//! storage. [`crate::writer::DocumentWriter`] hands out builders over a
//! shared buffer instead.
//!
//! ```
//! use bsonbuf::{cstr, DocumentBuf};
//!
//! let mut doc = DocumentBuf::new();
//! doc.append_utf8(cstr!("name"), "herman")?;
//! doc.begin_document(cstr!("book"))?;
//! doc.append_int32(cstr!("year"), 1851)?;
//! doc.end_document()?;
//! assert_eq!(doc.get_document("book")?.get_i32("year")?, 1851);
//! # Ok::<(), bsonbuf::Error>(())
//! ```

use std::ops::Deref;

use crate::{
    array::Array,
    buffer::{OwnedBuffer, Storage},
    cstr::CStr,
    document::Document,
    error::{Error, Result},
    oid::ObjectId,
    spec::{BinarySubtype, ElementType, EMPTY_DOCUMENT_BYTES, MIN_DOCUMENT_SIZE},
    value::{Timestamp, ValueRef},
};

const ZERO: [u8; 1] = [0];

/// An open sub-document: where its length prefix sits and how long it
/// currently is.
#[derive(Debug, Clone)]
struct Frame {
    offset: usize,
    len: usize,
    array: bool,
}

/// A document being built into some [`Storage`].
///
/// All append operations target the innermost open frame; closing frames
/// in order is the only way to get back to an enclosing document, so a
/// non-innermost document can never be appended to.
#[derive(Clone)]
pub struct DocumentBuilder<S: Storage> {
    storage: S,
    len: usize,
    frames: Vec<Frame>,
}

/// An owned document backed by [`OwnedBuffer`]: inline up to
/// [`crate::buffer::INLINE_CAPACITY`] bytes, heap-allocated beyond.
pub type DocumentBuf = DocumentBuilder<OwnedBuffer>;

impl DocumentBuf {
    /// An empty document, `05 00 00 00 00`.
    pub fn new() -> DocumentBuf {
        let mut storage = OwnedBuffer::new();
        storage.bytes_mut()[..MIN_DOCUMENT_SIZE].copy_from_slice(&EMPTY_DOCUMENT_BYTES);
        DocumentBuf {
            storage,
            len: MIN_DOCUMENT_SIZE,
            frames: Vec::new(),
        }
    }

    /// An empty document whose buffer is pre-grown to hold `capacity`
    /// bytes.
    pub fn with_capacity(capacity: usize) -> Result<DocumentBuf> {
        let mut doc = DocumentBuf::new();
        doc.storage.reserve(capacity)?;
        Ok(doc)
    }

    /// Adopts `data` as a document, applying the framing checks of
    /// [`Document::from_bytes`]. Buffers that fit stay inline.
    pub fn from_bytes(data: impl Into<Vec<u8>>) -> Result<DocumentBuf> {
        let data = data.into();
        Document::from_bytes(&data)?;

        let mut doc = DocumentBuf::new();
        doc.len = data.len();
        if data.len() <= doc.storage.bytes().len() {
            doc.storage.bytes_mut()[..data.len()].copy_from_slice(&data);
        } else {
            doc.storage = OwnedBuffer::from_vec(data);
        }
        Ok(doc)
    }

    /// The document's bytes, trimmed to its length.
    pub fn into_vec(self) -> Vec<u8> {
        let len = self.len;
        self.storage.into_vec(len)
    }
}

impl Default for DocumentBuf {
    fn default() -> DocumentBuf {
        DocumentBuf::new()
    }
}

impl<S: Storage> DocumentBuilder<S> {
    /// Initializes an empty document at the start of `storage`'s window.
    pub(crate) fn new_in(mut storage: S) -> Result<DocumentBuilder<S>> {
        storage.reserve(MIN_DOCUMENT_SIZE)?;
        storage.bytes_mut()[..MIN_DOCUMENT_SIZE].copy_from_slice(&EMPTY_DOCUMENT_BYTES);
        Ok(DocumentBuilder {
            storage,
            len: MIN_DOCUMENT_SIZE,
            frames: Vec::new(),
        })
    }

    /// The document view over everything built so far, open frames
    /// included.
    pub fn as_document(&self) -> &Document {
        Document::from_bytes_unchecked(&self.storage.bytes()[..self.len])
    }

    /// How many sub-documents are currently open.
    pub fn open_frames(&self) -> usize {
        self.frames.len()
    }

    pub(crate) fn into_storage_len(self) -> Result<(S, usize)> {
        if let Some(frame) = self.frames.last() {
            return Err(Error::invalid_state(format!(
                "document still has an open {}",
                if frame.array { "array" } else { "sub-document" }
            )));
        }
        Ok((self.storage, self.len))
    }

    /// The appender spine shared by every typed append: writes
    /// `[tag][key][NUL][payload…]` over the innermost terminator, restores
    /// one terminator per open document, bumps every open length and
    /// re-stamps every open length prefix.
    fn append_element(&mut self, tag: ElementType, key: &CStr, payload: &[&[u8]]) -> Result<()> {
        let payload_len: usize = payload.iter().map(|part| part.len()).sum();
        let total = 1 + key.len() + 1 + payload_len;
        let new_len = self
            .len
            .checked_add(total)
            .ok_or_else(|| Error::size_exceeded(usize::MAX))?;
        self.storage.reserve(new_len)?;

        let depth = self.frames.len();
        let mut pos = self.len - 1 - depth;
        let bytes = self.storage.bytes_mut();
        bytes[pos] = tag as u8;
        pos += 1;
        bytes[pos..pos + key.len()].copy_from_slice(key.as_bytes());
        pos += key.len();
        bytes[pos] = 0;
        pos += 1;
        for part in payload {
            bytes[pos..pos + part.len()].copy_from_slice(part);
            pos += part.len();
        }
        // one terminator for the innermost document, one per ancestor
        for _ in 0..=depth {
            bytes[pos] = 0;
            pos += 1;
        }
        debug_assert_eq!(pos, new_len);

        self.len = new_len;
        for frame in &mut self.frames {
            frame.len += total;
        }
        self.stamp_lengths();
        Ok(())
    }

    fn stamp_lengths(&mut self) {
        let root = (self.len as i32).to_le_bytes();
        let bytes = self.storage.bytes_mut();
        bytes[..4].copy_from_slice(&root);
        for frame in &self.frames {
            bytes[frame.offset..frame.offset + 4]
                .copy_from_slice(&(frame.len as i32).to_le_bytes());
        }
    }

    fn string_payload_len(value: &str) -> Result<i32> {
        i32::try_from(value.len() + 1).map_err(|_| Error::size_exceeded(value.len()))
    }

    /// Appends an IEEE-754 double.
    pub fn append_double(&mut self, key: &CStr, value: f64) -> Result<()> {
        self.append_element(ElementType::Double, key, &[&value.to_le_bytes()])
    }

    /// Appends a UTF-8 string.
    pub fn append_utf8(&mut self, key: &CStr, value: &str) -> Result<()> {
        let len = Self::string_payload_len(value)?;
        self.append_element(
            ElementType::String,
            key,
            &[&len.to_le_bytes(), value.as_bytes(), &ZERO],
        )
    }

    /// Appends a finished document as an embedded document.
    pub fn append_document(&mut self, key: &CStr, value: &Document) -> Result<()> {
        self.append_element(ElementType::EmbeddedDocument, key, &[value.as_bytes()])
    }

    /// Appends a finished array.
    pub fn append_array(&mut self, key: &CStr, value: &Array) -> Result<()> {
        self.append_element(ElementType::Array, key, &[value.as_bytes()])
    }

    /// Appends binary data under the given subtype.
    pub fn append_binary(
        &mut self,
        key: &CStr,
        subtype: BinarySubtype,
        value: &[u8],
    ) -> Result<()> {
        let len =
            i32::try_from(value.len()).map_err(|_| Error::size_exceeded(value.len()))?;
        let subtype = [u8::from(subtype)];
        self.append_element(
            ElementType::Binary,
            key,
            &[&len.to_le_bytes(), &subtype, value],
        )
    }

    /// Appends the deprecated undefined value.
    pub fn append_undefined(&mut self, key: &CStr) -> Result<()> {
        self.append_element(ElementType::Undefined, key, &[])
    }

    /// Appends an object id.
    pub fn append_oid(&mut self, key: &CStr, value: &ObjectId) -> Result<()> {
        self.append_element(ElementType::ObjectId, key, &[&value.bytes()])
    }

    /// Appends a boolean.
    pub fn append_bool(&mut self, key: &CStr, value: bool) -> Result<()> {
        self.append_element(ElementType::Boolean, key, &[&[u8::from(value)]])
    }

    /// Appends a datetime as milliseconds since the Unix epoch.
    pub fn append_datetime(&mut self, key: &CStr, millis: i64) -> Result<()> {
        self.append_element(ElementType::DateTime, key, &[&millis.to_le_bytes()])
    }

    /// Appends a null.
    pub fn append_null(&mut self, key: &CStr) -> Result<()> {
        self.append_element(ElementType::Null, key, &[])
    }

    /// Appends a regular expression. Both components travel as cstrings,
    /// so neither may contain a NUL.
    pub fn append_regex(&mut self, key: &CStr, pattern: &CStr, options: &CStr) -> Result<()> {
        self.append_element(
            ElementType::RegularExpression,
            key,
            &[pattern.as_bytes(), &ZERO, options.as_bytes(), &ZERO],
        )
    }

    /// Appends the deprecated dbpointer value.
    pub fn append_dbpointer(
        &mut self,
        key: &CStr,
        namespace: &str,
        id: &ObjectId,
    ) -> Result<()> {
        let len = Self::string_payload_len(namespace)?;
        self.append_element(
            ElementType::DbPointer,
            key,
            &[&len.to_le_bytes(), namespace.as_bytes(), &ZERO, &id.bytes()],
        )
    }

    /// Appends JavaScript code.
    pub fn append_code(&mut self, key: &CStr, code: &str) -> Result<()> {
        let len = Self::string_payload_len(code)?;
        self.append_element(
            ElementType::JavaScriptCode,
            key,
            &[&len.to_le_bytes(), code.as_bytes(), &ZERO],
        )
    }

    /// Appends JavaScript code closing over `scope`. An empty scope
    /// degrades to a plain code element, matching the reference encoders
    /// for this format.
    pub fn append_code_with_scope(
        &mut self,
        key: &CStr,
        code: &str,
        scope: &Document,
    ) -> Result<()> {
        if scope.is_empty() {
            return self.append_code(key, code);
        }

        let code_len = Self::string_payload_len(code)?;
        let total = i32::try_from(4 + 4 + code.len() + 1 + scope.len())
            .map_err(|_| Error::size_exceeded(code.len() + scope.len()))?;
        self.append_element(
            ElementType::JavaScriptCodeWithScope,
            key,
            &[
                &total.to_le_bytes(),
                &code_len.to_le_bytes(),
                code.as_bytes(),
                &ZERO,
                scope.as_bytes(),
            ],
        )
    }

    /// Appends a symbol (deprecated; encoded like a string).
    pub fn append_symbol(&mut self, key: &CStr, value: &str) -> Result<()> {
        let len = Self::string_payload_len(value)?;
        self.append_element(
            ElementType::Symbol,
            key,
            &[&len.to_le_bytes(), value.as_bytes(), &ZERO],
        )
    }

    /// Appends a 32-bit integer.
    pub fn append_int32(&mut self, key: &CStr, value: i32) -> Result<()> {
        self.append_element(ElementType::Int32, key, &[&value.to_le_bytes()])
    }

    /// Appends an internal timestamp.
    pub fn append_timestamp(&mut self, key: &CStr, value: Timestamp) -> Result<()> {
        self.append_element(ElementType::Timestamp, key, &[&value.to_le_bytes()])
    }

    /// Appends a 64-bit integer.
    pub fn append_int64(&mut self, key: &CStr, value: i64) -> Result<()> {
        self.append_element(ElementType::Int64, key, &[&value.to_le_bytes()])
    }

    /// Appends the max-key sentinel.
    pub fn append_maxkey(&mut self, key: &CStr) -> Result<()> {
        self.append_element(ElementType::MaxKey, key, &[])
    }

    /// Appends the min-key sentinel.
    pub fn append_minkey(&mut self, key: &CStr) -> Result<()> {
        self.append_element(ElementType::MinKey, key, &[])
    }

    /// Appends any decoded value.
    pub fn append(&mut self, key: &CStr, value: ValueRef<'_>) -> Result<()> {
        match value {
            ValueRef::Double(v) => self.append_double(key, v),
            ValueRef::String(v) => self.append_utf8(key, v),
            ValueRef::Document(v) => self.append_document(key, v),
            ValueRef::Array(v) => self.append_array(key, v),
            ValueRef::Binary(v) => self.append_binary(key, v.subtype, v.bytes),
            ValueRef::Undefined => self.append_undefined(key),
            ValueRef::ObjectId(v) => self.append_oid(key, &v),
            ValueRef::Boolean(v) => self.append_bool(key, v),
            ValueRef::DateTime(v) => self.append_datetime(key, v),
            ValueRef::Null => self.append_null(key),
            ValueRef::RegularExpression(v) => {
                let pattern: &CStr = v.pattern.try_into()?;
                let options: &CStr = v.options.try_into()?;
                self.append_regex(key, pattern, options)
            }
            ValueRef::DbPointer(v) => self.append_dbpointer(key, v.namespace, &v.id),
            ValueRef::JavaScriptCode(v) => self.append_code(key, v),
            ValueRef::Symbol(v) => self.append_symbol(key, v),
            ValueRef::JavaScriptCodeWithScope(v) => {
                self.append_code_with_scope(key, v.code, v.scope)
            }
            ValueRef::Int32(v) => self.append_int32(key, v),
            ValueRef::Timestamp(v) => self.append_timestamp(key, v),
            ValueRef::Int64(v) => self.append_int64(key, v),
            ValueRef::MaxKey => self.append_maxkey(key),
            ValueRef::MinKey => self.append_minkey(key),
        }
    }

    /// Opens an embedded document under `key`. Appends now target it
    /// until the matching [`end_document`](Self::end_document).
    pub fn begin_document(&mut self, key: &CStr) -> Result<()> {
        self.begin(ElementType::EmbeddedDocument, key, false)
    }

    /// Opens an array under `key`. The caller supplies the index keys of
    /// its elements.
    pub fn begin_array(&mut self, key: &CStr) -> Result<()> {
        self.begin(ElementType::Array, key, true)
    }

    fn begin(&mut self, tag: ElementType, key: &CStr, array: bool) -> Result<()> {
        // the skeleton lands where the element header's payload begins
        let offset = self.len - 1 - self.frames.len() + 1 + key.len() + 1;
        self.append_element(tag, key, &[&EMPTY_DOCUMENT_BYTES])?;
        self.frames.push(Frame {
            offset,
            len: MIN_DOCUMENT_SIZE,
            array,
        });
        Ok(())
    }

    /// Closes the innermost open sub-document.
    pub fn end_document(&mut self) -> Result<()> {
        self.end(false)
    }

    /// Closes the innermost open array.
    pub fn end_array(&mut self) -> Result<()> {
        self.end(true)
    }

    fn end(&mut self, array: bool) -> Result<()> {
        let frame = self
            .frames
            .last()
            .ok_or_else(|| Error::invalid_state("no open sub-document to end"))?;
        if frame.array != array {
            return Err(Error::invalid_state(if frame.array {
                "innermost open frame is an array, not a sub-document"
            } else {
                "innermost open frame is a sub-document, not an array"
            }));
        }

        // lengths and terminators are maintained on every append; closing
        // re-stamps once more as a normalization step
        let frame = self.frames.pop().unwrap();
        let bytes = self.storage.bytes_mut();
        bytes[frame.offset..frame.offset + 4].copy_from_slice(&(frame.len as i32).to_le_bytes());
        bytes[frame.offset + frame.len - 1] = 0;
        self.stamp_lengths();
        Ok(())
    }
}

impl<S: Storage> Deref for DocumentBuilder<S> {
    type Target = Document;

    fn deref(&self) -> &Document {
        self.as_document()
    }
}

impl<S: Storage> AsRef<Document> for DocumentBuilder<S> {
    fn as_ref(&self) -> &Document {
        self.as_document()
    }
}

impl<S: Storage> std::borrow::Borrow<Document> for DocumentBuilder<S> {
    fn borrow(&self) -> &Document {
        self.as_document()
    }
}

impl<S: Storage, T: AsRef<Document>> PartialEq<T> for DocumentBuilder<S> {
    fn eq(&self, other: &T) -> bool {
        self.as_document() == other.as_ref()
    }
}

impl<S: Storage> Eq for DocumentBuilder<S> {}

impl<S: Storage> std::fmt::Debug for DocumentBuilder<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentBuilder")
            .field("data", &hex::encode(self.as_bytes()))
            .field("open_frames", &self.frames.len())
            .finish()
    }
}

impl From<&Document> for DocumentBuf {
    fn from(doc: &Document) -> DocumentBuf {
        doc.to_document_buf()
    }
}
