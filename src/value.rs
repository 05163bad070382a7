//! Zero-copy decoded values.

use crate::{
    array::Array,
    document::Document,
    error::{Error, Result},
    oid::ObjectId,
    spec::{BinarySubtype, ElementType},
};

/// A decoded element value borrowing from the document's buffer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ValueRef<'a> {
    Double(f64),
    String(&'a str),
    Document(&'a Document),
    Array(&'a Array),
    Binary(BinaryRef<'a>),
    Undefined,
    ObjectId(ObjectId),
    Boolean(bool),
    /// Milliseconds since the Unix epoch.
    DateTime(i64),
    Null,
    RegularExpression(RegexRef<'a>),
    DbPointer(DbPointerRef<'a>),
    JavaScriptCode(&'a str),
    Symbol(&'a str),
    JavaScriptCodeWithScope(CodeWithScopeRef<'a>),
    Int32(i32),
    Timestamp(Timestamp),
    Int64(i64),
    MaxKey,
    MinKey,
}

impl<'a> ValueRef<'a> {
    /// The type tag this value encodes as.
    pub fn element_type(&self) -> ElementType {
        match self {
            ValueRef::Double(..) => ElementType::Double,
            ValueRef::String(..) => ElementType::String,
            ValueRef::Document(..) => ElementType::EmbeddedDocument,
            ValueRef::Array(..) => ElementType::Array,
            ValueRef::Binary(..) => ElementType::Binary,
            ValueRef::Undefined => ElementType::Undefined,
            ValueRef::ObjectId(..) => ElementType::ObjectId,
            ValueRef::Boolean(..) => ElementType::Boolean,
            ValueRef::DateTime(..) => ElementType::DateTime,
            ValueRef::Null => ElementType::Null,
            ValueRef::RegularExpression(..) => ElementType::RegularExpression,
            ValueRef::DbPointer(..) => ElementType::DbPointer,
            ValueRef::JavaScriptCode(..) => ElementType::JavaScriptCode,
            ValueRef::Symbol(..) => ElementType::Symbol,
            ValueRef::JavaScriptCodeWithScope(..) => ElementType::JavaScriptCodeWithScope,
            ValueRef::Int32(..) => ElementType::Int32,
            ValueRef::Timestamp(..) => ElementType::Timestamp,
            ValueRef::Int64(..) => ElementType::Int64,
            ValueRef::MaxKey => ElementType::MaxKey,
            ValueRef::MinKey => ElementType::MinKey,
        }
    }

    pub fn as_f64(self) -> Option<f64> {
        match self {
            ValueRef::Double(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_str(self) -> Option<&'a str> {
        match self {
            ValueRef::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_document(self) -> Option<&'a Document> {
        match self {
            ValueRef::Document(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_array(self) -> Option<&'a Array> {
        match self {
            ValueRef::Array(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_binary(self) -> Option<BinaryRef<'a>> {
        match self {
            ValueRef::Binary(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_object_id(self) -> Option<ObjectId> {
        match self {
            ValueRef::ObjectId(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bool(self) -> Option<bool> {
        match self {
            ValueRef::Boolean(v) => Some(v),
            _ => None,
        }
    }

    /// Milliseconds since the Unix epoch for datetime values.
    pub fn as_datetime(self) -> Option<i64> {
        match self {
            ValueRef::DateTime(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_null(self) -> Option<()> {
        match self {
            ValueRef::Null => Some(()),
            _ => None,
        }
    }

    pub fn as_regex(self) -> Option<RegexRef<'a>> {
        match self {
            ValueRef::RegularExpression(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_javascript(self) -> Option<&'a str> {
        match self {
            ValueRef::JavaScriptCode(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_symbol(self) -> Option<&'a str> {
        match self {
            ValueRef::Symbol(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_javascript_with_scope(self) -> Option<CodeWithScopeRef<'a>> {
        match self {
            ValueRef::JavaScriptCodeWithScope(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_i32(self) -> Option<i32> {
        match self {
            ValueRef::Int32(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_timestamp(self) -> Option<Timestamp> {
        match self {
            ValueRef::Timestamp(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_i64(self) -> Option<i64> {
        match self {
            ValueRef::Int64(v) => Some(v),
            _ => None,
        }
    }

    pub(crate) fn expect<T>(
        self,
        expected: ElementType,
        f: impl FnOnce(ValueRef<'a>) -> Option<T>,
    ) -> Result<T> {
        let actual = self.element_type();
        f(self).ok_or_else(|| Error::value_access_unexpected_type(actual, expected))
    }
}

/// A binary value referencing bytes stored in a document.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BinaryRef<'a> {
    pub subtype: BinarySubtype,
    pub bytes: &'a [u8],
}

/// A regular expression value: pattern and options.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RegexRef<'a> {
    pub pattern: &'a str,
    pub options: &'a str,
}

/// A deprecated dbpointer value: a namespace and an id.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DbPointerRef<'a> {
    pub namespace: &'a str,
    pub id: ObjectId,
}

/// A code-with-scope value: JavaScript source plus the document it closes
/// over.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CodeWithScopeRef<'a> {
    pub code: &'a str,
    pub scope: &'a Document,
}

/// An internal MongoDB timestamp: seconds and an ordinal increment packed
/// into a u64 on the wire (seconds in the high half).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Timestamp {
    pub time: u32,
    pub increment: u32,
}

impl Timestamp {
    pub(crate) fn to_le_bytes(self) -> [u8; 8] {
        ((u64::from(self.time) << 32) | u64::from(self.increment)).to_le_bytes()
    }
}
