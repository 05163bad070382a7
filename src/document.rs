//! Borrowed document views.

use std::cmp::Ordering;

use crate::{
    array::Array,
    builder::DocumentBuf,
    error::{Error, Result},
    iter::{Element, Elements, Iter},
    oid::ObjectId,
    spec::{ElementType, MIN_DOCUMENT_SIZE},
    validate::ValidateOptions,
    value::{BinaryRef, RegexRef, Timestamp, ValueRef},
};

/// A BSON document borrowed as raw bytes (akin to [`str`]). This is an
/// _unsized_ type and is always used behind a reference; the owned
/// counterpart is [`DocumentBuf`].
///
/// Creating a view checks only the framing of the document itself: the
/// length prefix matches the slice, the slice is at least five bytes, and
/// the trailing byte is NUL. The elements inside are parsed during
/// iteration, so format errors can surface from any accessor.
///
/// ```
/// use bsonbuf::Document;
///
/// let bytes = b"\x13\x00\x00\x00\x02hi\x00\x06\x00\x00\x00y'all\x00\x00";
/// let doc = Document::from_bytes(bytes)?;
/// assert_eq!(doc.get_str("hi")?, "y'all");
/// # Ok::<(), bsonbuf::Error>(())
/// ```
#[derive(PartialEq)]
#[repr(transparent)]
pub struct Document {
    data: [u8],
}

impl Document {
    /// Constructs a read-only view over `data`, validating that:
    ///   * `data` is at least five bytes long,
    ///   * the four-byte little-endian prefix equals `data.len()`,
    ///   * the last byte is NUL.
    ///
    /// The interior is not validated here; see [`Document::validate`].
    pub fn from_bytes<D: AsRef<[u8]> + ?Sized>(data: &D) -> Result<&Document> {
        let data = data.as_ref();

        if data.len() < MIN_DOCUMENT_SIZE {
            return Err(Error::malformed(format!(
                "document too short: {} bytes",
                data.len()
            )));
        }

        let length = crate::iter::read_i32_le(data, 0);
        if length < 0 || length as usize != data.len() {
            return Err(Error::malformed(format!(
                "document length prefix {length} does not match buffer of {} bytes",
                data.len()
            )));
        }

        if data[data.len() - 1] != 0 {
            return Err(Error::malformed("document not NUL terminated"));
        }

        Ok(Document::from_bytes_unchecked(data))
    }

    /// Creates a view without the framing checks.
    pub(crate) fn from_bytes_unchecked<D: AsRef<[u8]> + ?Sized>(data: &D) -> &Document {
        // Safety: Document is repr(transparent) over [u8], so the layouts
        // are identical, and the pointer comes from a safe reference.
        unsafe { &*(data.as_ref() as *const [u8] as *const Document) }
    }

    /// The raw bytes of the document, including the length prefix and the
    /// trailing NUL.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Total size of the document in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the document holds no elements.
    pub fn is_empty(&self) -> bool {
        self.data.len() == MIN_DOCUMENT_SIZE
    }

    /// Counts the elements that can be walked before the end of the
    /// document or the first corruption.
    pub fn count_fields(&self) -> usize {
        self.elements().map_while(|r| r.ok()).count()
    }

    /// A structural cursor over the elements; see [`Elements`].
    pub fn elements(&self) -> Elements<'_> {
        Elements::new(self)
    }

    /// A decoded cursor yielding `(key, value)` pairs; see [`Iter`].
    pub fn iter(&self) -> Iter<'_> {
        Iter::new(self)
    }

    /// Orders two documents the way the wire format compares them: shorter
    /// documents first, ties broken bytewise.
    pub fn compare(&self, other: &Document) -> Ordering {
        self.len()
            .cmp(&other.len())
            .then_with(|| self.data.cmp(&other.data))
    }

    /// Renders the document as extended JSON.
    pub fn to_json(&self) -> Result<String> {
        crate::json::document_to_json(self)
    }

    /// Checks structural well-formedness of every nested document, plus
    /// whatever `options` enables. On failure the returned error carries
    /// the byte offset of the offending element within this document.
    pub fn validate(&self, options: ValidateOptions) -> Result<()> {
        crate::validate::validate(self, options)
    }

    /// Copies the document into an owned buffer.
    pub fn to_document_buf(&self) -> DocumentBuf {
        // the bytes came from a validated view, so from_bytes cannot fail
        DocumentBuf::from_bytes(self.data.to_vec()).unwrap()
    }

    /// Finds the value for `key` by scanning from the front.
    pub fn get(&self, key: impl AsRef<str>) -> Result<Option<ValueRef<'_>>> {
        let key = key.as_ref();
        for element in self.elements() {
            let element = element?;
            if element.key_bytes() == key.as_bytes() {
                return element.value().map(Some);
            }
        }
        Ok(None)
    }

    /// Finds the structural element for `key` without decoding its value.
    pub fn get_element(&self, key: impl AsRef<str>) -> Result<Option<Element<'_>>> {
        let key = key.as_ref();
        for element in self.elements() {
            let element = element?;
            if element.key_bytes() == key.as_bytes() {
                return Ok(Some(element));
            }
        }
        Ok(None)
    }

    fn get_with<'a, T>(
        &'a self,
        key: impl AsRef<str>,
        expected: ElementType,
        f: impl FnOnce(ValueRef<'a>) -> Option<T>,
    ) -> Result<T> {
        let key = key.as_ref();
        let value = self
            .get(key)?
            .ok_or_else(Error::value_access_not_present)
            .map_err(|e| e.with_key(key))?;
        value.expect(expected, f).map_err(|e| e.with_key(key))
    }

    /// Gets the double for `key`, or an error if it is missing or another
    /// type.
    pub fn get_f64(&self, key: impl AsRef<str>) -> Result<f64> {
        self.get_with(key, ElementType::Double, ValueRef::as_f64)
    }

    /// Gets the string for `key`, or an error if it is missing or another
    /// type.
    pub fn get_str(&self, key: impl AsRef<str>) -> Result<&'_ str> {
        self.get_with(key, ElementType::String, ValueRef::as_str)
    }

    /// Gets the embedded document for `key`, or an error if it is missing
    /// or another type.
    pub fn get_document(&self, key: impl AsRef<str>) -> Result<&'_ Document> {
        self.get_with(key, ElementType::EmbeddedDocument, ValueRef::as_document)
    }

    /// Gets the array for `key`, or an error if it is missing or another
    /// type.
    pub fn get_array(&self, key: impl AsRef<str>) -> Result<&'_ Array> {
        self.get_with(key, ElementType::Array, ValueRef::as_array)
    }

    /// Gets the binary value for `key`, or an error if it is missing or
    /// another type.
    pub fn get_binary(&self, key: impl AsRef<str>) -> Result<BinaryRef<'_>> {
        self.get_with(key, ElementType::Binary, ValueRef::as_binary)
    }

    /// Gets the object id for `key`, or an error if it is missing or
    /// another type.
    pub fn get_object_id(&self, key: impl AsRef<str>) -> Result<ObjectId> {
        self.get_with(key, ElementType::ObjectId, ValueRef::as_object_id)
    }

    /// Gets the boolean for `key`, or an error if it is missing or another
    /// type.
    pub fn get_bool(&self, key: impl AsRef<str>) -> Result<bool> {
        self.get_with(key, ElementType::Boolean, ValueRef::as_bool)
    }

    /// Gets the datetime for `key` in milliseconds since the epoch, or an
    /// error if it is missing or another type.
    pub fn get_datetime(&self, key: impl AsRef<str>) -> Result<i64> {
        self.get_with(key, ElementType::DateTime, ValueRef::as_datetime)
    }

    /// Gets the regex for `key`, or an error if it is missing or another
    /// type.
    pub fn get_regex(&self, key: impl AsRef<str>) -> Result<RegexRef<'_>> {
        self.get_with(key, ElementType::RegularExpression, ValueRef::as_regex)
    }

    /// Gets the timestamp for `key`, or an error if it is missing or
    /// another type.
    pub fn get_timestamp(&self, key: impl AsRef<str>) -> Result<Timestamp> {
        self.get_with(key, ElementType::Timestamp, ValueRef::as_timestamp)
    }

    /// Gets the i32 for `key`, or an error if it is missing or another
    /// type.
    pub fn get_i32(&self, key: impl AsRef<str>) -> Result<i32> {
        self.get_with(key, ElementType::Int32, ValueRef::as_i32)
    }

    /// Gets the i64 for `key`, or an error if it is missing or another
    /// type.
    pub fn get_i64(&self, key: impl AsRef<str>) -> Result<i64> {
        self.get_with(key, ElementType::Int64, ValueRef::as_i64)
    }
}

impl Eq for Document {}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("data", &hex::encode(&self.data))
            .finish()
    }
}

impl AsRef<Document> for Document {
    fn as_ref(&self) -> &Document {
        self
    }
}

impl ToOwned for Document {
    type Owned = DocumentBuf;

    fn to_owned(&self) -> DocumentBuf {
        self.to_document_buf()
    }
}

impl<'a> IntoIterator for &'a Document {
    type IntoIter = Iter<'a>;
    type Item = Result<(&'a str, ValueRef<'a>)>;

    fn into_iter(self) -> Iter<'a> {
        self.iter()
    }
}
