//! Constants of version 1.0 of the BSON wire format.
//!
//! See <http://bsonspec.org/spec.html> for the binary layout each tag
//! implies.

/// The smallest well-formed document: a four byte length prefix plus the
/// trailing NUL.
pub const MIN_DOCUMENT_SIZE: usize = 5;

/// The largest document the wire format can express; lengths are carried in
/// a signed 32-bit prefix.
pub const MAX_DOCUMENT_SIZE: usize = i32::MAX as usize;

/// The encoded form of an empty document.
pub(crate) const EMPTY_DOCUMENT_BYTES: [u8; MIN_DOCUMENT_SIZE] = [5, 0, 0, 0, 0];

/// The type tag of an element.
///
/// The discriminants are the on-wire tag bytes.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementType {
    Double = 0x01,
    String = 0x02,
    EmbeddedDocument = 0x03,
    Array = 0x04,
    Binary = 0x05,
    /// Deprecated in the BSON spec, still seen in the wild.
    Undefined = 0x06,
    ObjectId = 0x07,
    Boolean = 0x08,
    DateTime = 0x09,
    Null = 0x0A,
    RegularExpression = 0x0B,
    /// Deprecated in the BSON spec, still seen in the wild.
    DbPointer = 0x0C,
    JavaScriptCode = 0x0D,
    Symbol = 0x0E,
    JavaScriptCodeWithScope = 0x0F,
    Int32 = 0x10,
    Timestamp = 0x11,
    Int64 = 0x12,
    MaxKey = 0x7F,
    MinKey = 0xFF,
}

impl ElementType {
    /// Decodes a tag byte, returning `None` for tags outside the
    /// specification.
    pub fn from_u8(tag: u8) -> Option<ElementType> {
        use ElementType::*;
        Some(match tag {
            0x01 => Double,
            0x02 => String,
            0x03 => EmbeddedDocument,
            0x04 => Array,
            0x05 => Binary,
            0x06 => Undefined,
            0x07 => ObjectId,
            0x08 => Boolean,
            0x09 => DateTime,
            0x0A => Null,
            0x0B => RegularExpression,
            0x0C => DbPointer,
            0x0D => JavaScriptCode,
            0x0E => Symbol,
            0x0F => JavaScriptCodeWithScope,
            0x10 => Int32,
            0x11 => Timestamp,
            0x12 => Int64,
            0x7F => MaxKey,
            0xFF => MinKey,
            _ => return None,
        })
    }
}

/// The subtype byte carried by a binary element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinarySubtype {
    Generic,
    Function,
    /// The pre-2012 binary encoding, which nests a second length prefix
    /// inside the payload.
    BinaryOld,
    UuidOld,
    Uuid,
    Md5,
    UserDefined(u8),
}

impl From<BinarySubtype> for u8 {
    fn from(subtype: BinarySubtype) -> u8 {
        match subtype {
            BinarySubtype::Generic => 0x00,
            BinarySubtype::Function => 0x01,
            BinarySubtype::BinaryOld => 0x02,
            BinarySubtype::UuidOld => 0x03,
            BinarySubtype::Uuid => 0x04,
            BinarySubtype::Md5 => 0x05,
            BinarySubtype::UserDefined(b) => b,
        }
    }
}

impl From<u8> for BinarySubtype {
    fn from(byte: u8) -> BinarySubtype {
        match byte {
            0x00 => BinarySubtype::Generic,
            0x01 => BinarySubtype::Function,
            0x02 => BinarySubtype::BinaryOld,
            0x03 => BinarySubtype::UuidOld,
            0x04 => BinarySubtype::Uuid,
            0x05 => BinarySubtype::Md5,
            b => BinarySubtype::UserDefined(b),
        }
    }
}
