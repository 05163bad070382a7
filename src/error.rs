use thiserror::Error;

use crate::spec::ElementType;

pub type Result<T> = std::result::Result<T, Error>;

/// An error produced by any fallible operation in this crate.
#[derive(Debug, Error)]
#[non_exhaustive]
pub struct Error {
    /// The kind of error that occurred.
    pub kind: ErrorKind,

    /// The document key associated with the error, if any.
    pub key: Option<String>,

    /// The byte offset of the offending element, if any. For iteration and
    /// validation failures this is relative to the document the operation
    /// was invoked on.
    pub offset: Option<usize>,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(key) = self.key.as_deref() {
            write!(f, "error at key \"{key}\": ")?;
        } else if let Some(offset) = self.offset {
            write!(f, "error at byte offset {offset}: ")?;
        }

        write!(f, "{}", self.kind)
    }
}

/// The types of errors that can occur in this crate.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Bytes that do not obey the BSON framing rules were encountered.
    #[error("malformed BSON: {message}")]
    #[non_exhaustive]
    MalformedValue { message: String },

    /// Invalid UTF-8 bytes were encountered where text was required.
    #[error("invalid UTF-8")]
    Utf8Encoding,

    /// A key was rejected by the active validation policy.
    #[error("key rejected by validation policy: {message}")]
    #[non_exhaustive]
    IllegalKey { message: String },

    /// A document would have grown past the wire format's signed 32-bit
    /// length limit.
    #[error("document of {requested} bytes exceeds the signed 32-bit length limit")]
    #[non_exhaustive]
    SizeExceeded { requested: usize },

    /// A builder operation was called in a state that cannot accept it,
    /// such as ending a sub-document that was never begun.
    #[error("invalid builder state: {message}")]
    #[non_exhaustive]
    InvalidState { message: String },

    /// An error occurred when attempting to access a value in a document.
    #[error("value access failed: {kind}")]
    #[non_exhaustive]
    ValueAccess { kind: ValueAccessErrorKind },
}

/// The ways a typed value lookup can fail.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ValueAccessErrorKind {
    /// No value for the specified key was present in the document.
    #[error("the key was not present in the document")]
    NotPresent,

    /// The type of the value in the document did not match the requested
    /// type.
    #[error("expected type {expected:?}, got type {actual:?}")]
    #[non_exhaustive]
    UnexpectedType {
        /// The actual type of the value.
        actual: ElementType,

        /// The expected type of the value.
        expected: ElementType,
    },
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Self {
            kind,
            key: None,
            offset: None,
        }
    }
}

impl Error {
    pub(crate) fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub(crate) fn with_offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    pub(crate) fn malformed(message: impl ToString) -> Self {
        ErrorKind::MalformedValue {
            message: message.to_string(),
        }
        .into()
    }

    pub(crate) fn utf8_encoding() -> Self {
        ErrorKind::Utf8Encoding.into()
    }

    pub(crate) fn illegal_key(message: impl ToString) -> Self {
        ErrorKind::IllegalKey {
            message: message.to_string(),
        }
        .into()
    }

    pub(crate) fn size_exceeded(requested: usize) -> Self {
        ErrorKind::SizeExceeded { requested }.into()
    }

    pub(crate) fn invalid_state(message: impl ToString) -> Self {
        ErrorKind::InvalidState {
            message: message.to_string(),
        }
        .into()
    }

    pub(crate) fn value_access_not_present() -> Self {
        ErrorKind::ValueAccess {
            kind: ValueAccessErrorKind::NotPresent,
        }
        .into()
    }

    pub(crate) fn value_access_unexpected_type(actual: ElementType, expected: ElementType) -> Self {
        ErrorKind::ValueAccess {
            kind: ValueAccessErrorKind::UnexpectedType { actual, expected },
        }
        .into()
    }

    #[cfg(test)]
    pub(crate) fn is_malformed(&self) -> bool {
        matches!(self.kind, ErrorKind::MalformedValue { .. })
    }

    #[cfg(test)]
    pub(crate) fn is_size_exceeded(&self) -> bool {
        matches!(self.kind, ErrorKind::SizeExceeded { .. })
    }
}
