//! Forward-only cursors over a document's elements.
//!
//! [`Elements`] walks the framing of a document — tags, keys and value
//! extents — without decoding values or requiring their text to be valid
//! UTF-8. Each yielded [`Element`] remembers where it sits in the document
//! and decodes on demand, either wholesale through [`Element::value`] or
//! piecemeal through the typed accessors.
//!
//! Corruption (an unknown tag, an unterminated key, a length field running
//! past the buffer) poisons the cursor: the error is yielded once, with the
//! byte offset of the offending element, and iteration then ends. A fresh
//! cursor can always be obtained from [`Document::elements`].

use crate::{
    array::Array,
    document::Document,
    error::{Error, Result},
    oid::ObjectId,
    spec::{BinarySubtype, ElementType, MIN_DOCUMENT_SIZE},
    value::{BinaryRef, CodeWithScopeRef, DbPointerRef, RegexRef, Timestamp, ValueRef},
};

/// The smallest code-with-scope value: two length prefixes, an empty code
/// string and an empty scope document.
const MIN_CODE_WITH_SCOPE_SIZE: usize = 4 + 4 + 1 + MIN_DOCUMENT_SIZE;

pub(crate) fn read_i32_le(bytes: &[u8], at: usize) -> i32 {
    // the caller has bounds-checked `at + 4`
    i32::from_le_bytes(bytes[at..at + 4].try_into().unwrap())
}

pub(crate) fn read_i64_le(bytes: &[u8], at: usize) -> i64 {
    i64::from_le_bytes(bytes[at..at + 8].try_into().unwrap())
}

pub(crate) fn read_u32_le(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes(bytes[at..at + 4].try_into().unwrap())
}

pub(crate) fn read_f64_le(bytes: &[u8], at: usize) -> f64 {
    f64::from_le_bytes(bytes[at..at + 8].try_into().unwrap())
}

/// A cursor yielding the structural elements of a document in buffer
/// order.
pub struct Elements<'a> {
    doc: &'a Document,
    offset: usize,

    /// Cleared once corruption is seen; all later iterations return
    /// `None`.
    valid: bool,
}

impl<'a> Elements<'a> {
    pub(crate) fn new(doc: &'a Document) -> Elements<'a> {
        Elements {
            doc,
            offset: 4,
            valid: true,
        }
    }
}

impl<'a> Iterator for Elements<'a> {
    type Item = Result<Element<'a>>;

    fn next(&mut self) -> Option<Result<Element<'a>>> {
        if !self.valid {
            return None;
        }

        // the trailing byte was checked to be the NUL terminator when the
        // document view was created
        if self.offset >= self.doc.as_bytes().len() - 1 {
            return None;
        }

        match Element::parse(self.doc, self.offset) {
            Ok(element) => {
                self.offset = element.end();
                Some(Ok(element))
            }
            Err(e) => {
                self.valid = false;
                Some(Err(e))
            }
        }
    }
}

/// A decoded-pair cursor: yields `(key, value)` with keys as `&str` and
/// values as [`ValueRef`].
///
/// Unlike [`Elements`], this requires keys and textual values to be valid
/// UTF-8 and reports [`crate::ErrorKind::Utf8Encoding`] when they are not.
pub struct Iter<'a> {
    elements: Elements<'a>,
}

impl<'a> Iter<'a> {
    pub(crate) fn new(doc: &'a Document) -> Iter<'a> {
        Iter {
            elements: Elements::new(doc),
        }
    }
}

impl<'a> Iterator for Iter<'a> {
    type Item = Result<(&'a str, ValueRef<'a>)>;

    fn next(&mut self) -> Option<Result<(&'a str, ValueRef<'a>)>> {
        let element = self.elements.next()?;
        Some(element.and_then(|el| Ok((el.key()?, el.value()?))))
    }
}

/// One element of a document: a `(type, key, value)` triple located at a
/// known byte offset.
///
/// Creating an element checks only framing: the tag is known, the key is
/// NUL-terminated, and every length field fits the enclosing document.
/// Value decoding happens on demand.
#[derive(Clone, Copy)]
pub struct Element<'a> {
    doc: &'a Document,
    tag: ElementType,
    offset: usize,
    key_len: usize,
    value_len: usize,
}

impl<'a> Element<'a> {
    pub(crate) fn parse(doc: &'a Document, offset: usize) -> Result<Element<'a>> {
        let bytes = doc.as_bytes();
        let end = bytes.len() - 1;
        let corrupt = |message: String| Error::malformed(message).with_offset(offset);

        let tag_byte = bytes[offset];
        let tag = ElementType::from_u8(tag_byte)
            .ok_or_else(|| corrupt(format!("invalid element type {tag_byte:#04x}")))?;

        let key_start = offset + 1;
        let key_len = bytes[key_start..end]
            .iter()
            .position(|b| *b == 0)
            .ok_or_else(|| corrupt("unterminated element key".to_string()))?;

        let value_offset = key_start + key_len + 1;
        let remaining = end - value_offset;

        let value_len = match tag {
            ElementType::Double
            | ElementType::DateTime
            | ElementType::Timestamp
            | ElementType::Int64 => 8,
            ElementType::Int32 => 4,
            ElementType::Boolean => 1,
            ElementType::ObjectId => 12,
            ElementType::Null
            | ElementType::Undefined
            | ElementType::MinKey
            | ElementType::MaxKey => 0,
            ElementType::String | ElementType::JavaScriptCode | ElementType::Symbol => {
                if remaining < 4 {
                    return Err(corrupt("string length truncated".to_string()));
                }
                let len = read_i32_le(bytes, value_offset);
                if len < 1 {
                    return Err(corrupt(format!("string length {len} too small")));
                }
                let len = len as usize;
                if 4 + len > remaining {
                    return Err(corrupt(format!(
                        "string length {len} exceeds remaining {remaining} bytes"
                    )));
                }
                if bytes[value_offset + 4 + len - 1] != 0 {
                    return Err(corrupt("string not NUL terminated".to_string()));
                }
                4 + len
            }
            ElementType::EmbeddedDocument | ElementType::Array => {
                if remaining < MIN_DOCUMENT_SIZE {
                    return Err(corrupt("embedded document truncated".to_string()));
                }
                let len = read_i32_le(bytes, value_offset);
                if len < MIN_DOCUMENT_SIZE as i32 {
                    return Err(corrupt(format!("embedded document length {len} too small")));
                }
                let len = len as usize;
                if len > remaining {
                    return Err(corrupt(format!(
                        "embedded document length {len} exceeds remaining {remaining} bytes"
                    )));
                }
                if bytes[value_offset + len - 1] != 0 {
                    return Err(corrupt("embedded document not NUL terminated".to_string()));
                }
                len
            }
            ElementType::Binary => {
                if remaining < 5 {
                    return Err(corrupt("binary header truncated".to_string()));
                }
                let len = read_i32_le(bytes, value_offset);
                if len < 0 {
                    return Err(corrupt(format!("negative binary length {len}")));
                }
                let total = 4 + 1 + len as usize;
                if total > remaining {
                    return Err(corrupt(format!(
                        "binary length {len} exceeds remaining {remaining} bytes"
                    )));
                }
                total
            }
            ElementType::RegularExpression => {
                let pattern_len = bytes[value_offset..end]
                    .iter()
                    .position(|b| *b == 0)
                    .ok_or_else(|| corrupt("unterminated regex pattern".to_string()))?;
                let options_start = value_offset + pattern_len + 1;
                let options_len = bytes[options_start..end]
                    .iter()
                    .position(|b| *b == 0)
                    .ok_or_else(|| corrupt("unterminated regex options".to_string()))?;
                pattern_len + 1 + options_len + 1
            }
            ElementType::DbPointer => {
                if remaining < 4 {
                    return Err(corrupt("dbpointer truncated".to_string()));
                }
                let len = read_i32_le(bytes, value_offset);
                if len < 1 {
                    return Err(corrupt(format!("dbpointer namespace length {len} too small")));
                }
                let len = len as usize;
                if 4 + len + 12 > remaining {
                    return Err(corrupt(format!(
                        "dbpointer length {len} exceeds remaining {remaining} bytes"
                    )));
                }
                if bytes[value_offset + 4 + len - 1] != 0 {
                    return Err(corrupt("dbpointer namespace not NUL terminated".to_string()));
                }
                4 + len + 12
            }
            ElementType::JavaScriptCodeWithScope => {
                if remaining < 4 {
                    return Err(corrupt("code with scope truncated".to_string()));
                }
                let total = read_i32_le(bytes, value_offset);
                if total < MIN_CODE_WITH_SCOPE_SIZE as i32 {
                    return Err(corrupt(format!("code with scope length {total} too small")));
                }
                let total = total as usize;
                if total > remaining {
                    return Err(corrupt(format!(
                        "code with scope length {total} exceeds remaining {remaining} bytes"
                    )));
                }
                total
            }
        };

        if value_len > remaining {
            return Err(corrupt(format!(
                "value of {value_len} bytes exceeds remaining {remaining} bytes"
            )));
        }

        Ok(Element {
            doc,
            tag,
            offset,
            key_len,
            value_len,
        })
    }

    /// The type tag of this element.
    pub fn element_type(&self) -> ElementType {
        self.tag
    }

    /// Byte offset of this element (its tag byte) within the document it
    /// was parsed from.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// The key, without its NUL terminator, as raw bytes.
    pub fn key_bytes(&self) -> &'a [u8] {
        let start = self.offset + 1;
        &self.doc.as_bytes()[start..start + self.key_len]
    }

    /// The key as text.
    pub fn key(&self) -> Result<&'a str> {
        std::str::from_utf8(self.key_bytes())
            .map_err(|_| Error::utf8_encoding().with_offset(self.offset))
    }

    pub(crate) fn value_offset(&self) -> usize {
        self.offset + 1 + self.key_len + 1
    }

    /// The encoded value, exactly as it sits in the buffer.
    pub fn value_bytes(&self) -> &'a [u8] {
        let start = self.value_offset();
        &self.doc.as_bytes()[start..start + self.value_len]
    }

    pub(crate) fn end(&self) -> usize {
        self.value_offset() + self.value_len
    }

    /// Decodes the value.
    pub fn value(&self) -> Result<ValueRef<'a>> {
        let result = match self.tag {
            ElementType::Double => Ok(ValueRef::Double(self.f64_value())),
            ElementType::String => self.str_value().map(ValueRef::String),
            ElementType::EmbeddedDocument => Ok(ValueRef::Document(self.document_value())),
            ElementType::Array => Ok(ValueRef::Array(self.array_value())),
            ElementType::Binary => self.binary_raw().map(|(subtype, bytes)| {
                ValueRef::Binary(BinaryRef { subtype, bytes })
            }),
            ElementType::Undefined => Ok(ValueRef::Undefined),
            ElementType::ObjectId => Ok(ValueRef::ObjectId(self.oid_value())),
            ElementType::Boolean => match self.value_bytes()[0] {
                0 => Ok(ValueRef::Boolean(false)),
                1 => Ok(ValueRef::Boolean(true)),
                b => Err(Error::malformed(format!("boolean byte {b} is not 0 or 1"))
                    .with_offset(self.offset)),
            },
            ElementType::DateTime => Ok(ValueRef::DateTime(self.i64_value())),
            ElementType::Null => Ok(ValueRef::Null),
            ElementType::RegularExpression => {
                let (pattern, options) = self.regex_raw();
                match (self.str_from(pattern), self.str_from(options)) {
                    (Ok(pattern), Ok(options)) => {
                        Ok(ValueRef::RegularExpression(RegexRef { pattern, options }))
                    }
                    (Err(e), _) | (_, Err(e)) => Err(e),
                }
            }
            ElementType::DbPointer => {
                let (namespace, id) = self.dbpointer_raw();
                self.str_from(namespace)
                    .map(|namespace| ValueRef::DbPointer(DbPointerRef { namespace, id }))
            }
            ElementType::JavaScriptCode => self.str_value().map(ValueRef::JavaScriptCode),
            ElementType::Symbol => self.str_value().map(ValueRef::Symbol),
            ElementType::JavaScriptCodeWithScope => {
                self.code_with_scope_raw().and_then(|(code, scope)| {
                    Ok(ValueRef::JavaScriptCodeWithScope(CodeWithScopeRef {
                        code: self.str_from(code)?,
                        scope,
                    }))
                })
            }
            ElementType::Int32 => Ok(ValueRef::Int32(self.i32_value())),
            ElementType::Timestamp => Ok(ValueRef::Timestamp(self.timestamp_value())),
            ElementType::Int64 => Ok(ValueRef::Int64(self.i64_value())),
            ElementType::MaxKey => Ok(ValueRef::MaxKey),
            ElementType::MinKey => Ok(ValueRef::MinKey),
        };

        result.map_err(|e| self.attach_key(e))
    }

    fn attach_key(&self, e: Error) -> Error {
        if e.key.is_none() {
            if let Ok(key) = self.key() {
                return e.with_key(key);
            }
        }
        e
    }

    fn str_from(&self, bytes: &'a [u8]) -> Result<&'a str> {
        std::str::from_utf8(bytes).map_err(|_| Error::utf8_encoding().with_offset(self.offset))
    }

    fn str_value(&self) -> Result<&'a str> {
        self.str_from(self.utf8_raw())
    }

    pub(crate) fn f64_value(&self) -> f64 {
        read_f64_le(self.value_bytes(), 0)
    }

    pub(crate) fn i32_value(&self) -> i32 {
        read_i32_le(self.value_bytes(), 0)
    }

    pub(crate) fn i64_value(&self) -> i64 {
        read_i64_le(self.value_bytes(), 0)
    }

    pub(crate) fn timestamp_value(&self) -> Timestamp {
        let bytes = self.value_bytes();
        Timestamp {
            time: read_u32_le(bytes, 4),
            increment: read_u32_le(bytes, 0),
        }
    }

    pub(crate) fn oid_value(&self) -> ObjectId {
        // the value is exactly 12 bytes once parsed
        ObjectId::from_bytes(self.value_bytes().try_into().unwrap())
    }

    pub(crate) fn bool_raw(&self) -> bool {
        self.value_bytes()[0] != 0
    }

    /// The bytes of a string-shaped value (utf8, code, symbol), without the
    /// length prefix and NUL terminator. No UTF-8 requirement.
    pub(crate) fn utf8_raw(&self) -> &'a [u8] {
        let bytes = self.value_bytes();
        &bytes[4..bytes.len() - 1]
    }

    pub(crate) fn document_value(&self) -> &'a Document {
        // framing of the embedded document was checked during parse
        Document::from_bytes_unchecked(self.value_bytes())
    }

    pub(crate) fn array_value(&self) -> &'a Array {
        Array::from_document(self.document_value())
    }

    /// Pattern and options of a regex value, without their terminators.
    pub(crate) fn regex_raw(&self) -> (&'a [u8], &'a [u8]) {
        let bytes = self.value_bytes();
        // both NULs were located during parse
        let pattern_len = bytes.iter().position(|b| *b == 0).unwrap();
        let pattern = &bytes[..pattern_len];
        let options = &bytes[pattern_len + 1..bytes.len() - 1];
        (pattern, options)
    }

    /// Namespace bytes (no terminator) and id of a dbpointer value.
    pub(crate) fn dbpointer_raw(&self) -> (&'a [u8], ObjectId) {
        let bytes = self.value_bytes();
        let namespace = &bytes[4..bytes.len() - 13];
        let id = ObjectId::from_bytes(bytes[bytes.len() - 12..].try_into().unwrap());
        (namespace, id)
    }

    /// Subtype and payload of a binary value, unwrapping the legacy
    /// `BinaryOld` inner length prefix.
    pub(crate) fn binary_raw(&self) -> Result<(BinarySubtype, &'a [u8])> {
        let bytes = self.value_bytes();
        let subtype = BinarySubtype::from(bytes[4]);
        let data = &bytes[5..];
        let data = match subtype {
            BinarySubtype::BinaryOld => {
                if data.len() < 4 {
                    return Err(Error::malformed(
                        "old binary subtype has no inner declared length",
                    )
                    .with_offset(self.offset));
                }
                let inner = read_i32_le(data, 0);
                if inner < 0 || inner as usize + 4 != data.len() {
                    return Err(Error::malformed(
                        "old binary subtype has wrong inner declared length",
                    )
                    .with_offset(self.offset));
                }
                &data[4..]
            }
            _ => data,
        };
        Ok((subtype, data))
    }

    /// Code bytes (no terminator) and scope document of a code-with-scope
    /// value. The scope's framing is only checked here, not during parse.
    pub(crate) fn code_with_scope_raw(&self) -> Result<(&'a [u8], &'a Document)> {
        let bytes = self.value_bytes();
        let code_len = read_i32_le(bytes, 4);
        if code_len < 1 || 4 + 4 + code_len as usize + MIN_DOCUMENT_SIZE > bytes.len() {
            return Err(
                Error::malformed(format!("code with scope code length {code_len} out of range"))
                    .with_offset(self.offset),
            );
        }
        let code_len = code_len as usize;
        if bytes[8 + code_len - 1] != 0 {
            return Err(
                Error::malformed("code with scope code not NUL terminated")
                    .with_offset(self.offset),
            );
        }
        let code = &bytes[8..8 + code_len - 1];
        let scope = Document::from_bytes(&bytes[8 + code_len..])
            .map_err(|e| e.with_offset(self.offset))?;
        Ok((code, scope))
    }
}

impl std::fmt::Debug for Element<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Element")
            .field("type", &self.tag)
            .field("key", &String::from_utf8_lossy(self.key_bytes()))
            .field("offset", &self.offset)
            .finish()
    }
}
