//! Array views and builders.
//!
//! On the wire an array is a document whose keys are ASCII decimal indices
//! (`"0"`, `"1"`, …). [`Array`] is a view that drops the keys on
//! iteration; [`ArrayBuf`] is an owned builder that supplies them.

use crate::{
    builder::DocumentBuf,
    cstr::CString,
    document::Document,
    error::Result,
    iter::Elements,
    value::ValueRef,
};

/// An array borrowed as raw bytes. Like [`Document`], this is an unsized
/// view type.
///
/// Nothing enforces the index-key convention on the underlying bytes; the
/// iterator simply ignores whatever keys are present, mirroring how readers
/// of the format treat arrays.
#[derive(PartialEq)]
#[repr(transparent)]
pub struct Array {
    doc: Document,
}

impl Array {
    /// Constructs an array view over `data` with the same framing checks
    /// as [`Document::from_bytes`].
    pub fn from_bytes<D: AsRef<[u8]> + ?Sized>(data: &D) -> Result<&Array> {
        Ok(Array::from_document(Document::from_bytes(data)?))
    }

    pub(crate) fn from_document(doc: &Document) -> &Array {
        // Safety: Array is repr(transparent) over Document, so the layouts
        // are identical, and the pointer comes from a safe reference.
        unsafe { &*(doc as *const Document as *const Array) }
    }

    /// The array as a plain document, keys included.
    pub fn as_document(&self) -> &Document {
        &self.doc
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.doc.as_bytes()
    }

    /// Total size of the array in bytes.
    pub fn len(&self) -> usize {
        self.doc.len()
    }

    pub fn is_empty(&self) -> bool {
        self.doc.is_empty()
    }

    /// Number of elements reachable before the end or the first
    /// corruption.
    pub fn count(&self) -> usize {
        self.doc.count_fields()
    }

    /// Iterates the values in buffer order, ignoring keys.
    pub fn iter(&self) -> ArrayIter<'_> {
        ArrayIter {
            elements: self.doc.elements(),
        }
    }

    /// Gets the value at `index` by position (keys are not consulted).
    pub fn get(&self, index: usize) -> Result<Option<ValueRef<'_>>> {
        for (i, element) in self.doc.elements().enumerate() {
            let element = element?;
            if i == index {
                return element.value().map(Some);
            }
        }
        Ok(None)
    }
}

impl std::fmt::Debug for Array {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Array")
            .field("data", &hex::encode(self.as_bytes()))
            .finish()
    }
}

impl<'a> IntoIterator for &'a Array {
    type IntoIter = ArrayIter<'a>;
    type Item = Result<ValueRef<'a>>;

    fn into_iter(self) -> ArrayIter<'a> {
        self.iter()
    }
}

/// Iterator over the values of an [`Array`].
pub struct ArrayIter<'a> {
    elements: Elements<'a>,
}

impl<'a> Iterator for ArrayIter<'a> {
    type Item = Result<ValueRef<'a>>;

    fn next(&mut self) -> Option<Result<ValueRef<'a>>> {
        let element = self.elements.next()?;
        Some(element.and_then(|el| el.value()))
    }
}

/// An owned array under construction: a [`DocumentBuf`] whose keys are
/// generated decimal indices.
///
/// ```
/// use bsonbuf::{ArrayBuf, ValueRef};
///
/// let mut array = ArrayBuf::new();
/// array.push(ValueRef::Int32(4))?;
/// array.push(ValueRef::String("quux"))?;
/// assert_eq!(array.as_array().get(1)?.unwrap().as_str(), Some("quux"));
/// # Ok::<(), bsonbuf::Error>(())
/// ```
#[derive(Clone, Default)]
pub struct ArrayBuf {
    inner: DocumentBuf,
    len: usize,
}

impl ArrayBuf {
    pub fn new() -> ArrayBuf {
        ArrayBuf {
            inner: DocumentBuf::new(),
            len: 0,
        }
    }

    /// Appends `value` under the next index key.
    pub fn push(&mut self, value: ValueRef<'_>) -> Result<()> {
        // decimal digits never contain a NUL
        let key = CString::from_unchecked(self.len.to_string());
        self.inner.append(key.as_ref(), value)?;
        self.len += 1;
        Ok(())
    }

    /// Number of values pushed so far.
    pub fn count(&self) -> usize {
        self.len
    }

    pub fn as_array(&self) -> &Array {
        Array::from_document(&self.inner)
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.inner.as_bytes()
    }

    /// The finished array as a plain owned document.
    pub fn into_document_buf(self) -> DocumentBuf {
        self.inner
    }
}

impl std::fmt::Debug for ArrayBuf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArrayBuf")
            .field("data", &hex::encode(self.as_bytes()))
            .finish()
    }
}
