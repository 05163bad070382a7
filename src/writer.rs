//! Packing multiple documents into one shared buffer.
//!
//! A [`DocumentWriter`] owns a single growable allocation and appends
//! finished documents to it back to back, the layout network and storage
//! layers expect for document streams. [`DocumentWriter::begin_document`]
//! hands out an ordinary [`DocumentBuilder`] whose storage is a
//! [`WriterSlot`] windowing the shared buffer at the current tail;
//! [`finish`](DocumentBuilder::finish) commits the window and advances the
//! tail, while dropping the builder without finishing abandons the
//! document and leaves the buffer as it was.
//!
//! ```
//! use bsonbuf::{cstr, DocumentWriter};
//!
//! let mut writer = DocumentWriter::new();
//! let mut doc = writer.begin_document()?;
//! doc.append_int32(cstr!("seq"), 1)?;
//! doc.finish()?;
//! let mut doc = writer.begin_document()?;
//! doc.append_int32(cstr!("seq"), 2)?;
//! doc.finish()?;
//! assert_eq!(writer.documents().count(), 2);
//! # Ok::<(), bsonbuf::Error>(())
//! ```

use crate::{
    buffer::{Storage, MIN_ALLOCATION},
    builder::DocumentBuilder,
    document::Document,
    error::{Error, Result},
    iter::read_i32_le,
    spec::{MAX_DOCUMENT_SIZE, MIN_DOCUMENT_SIZE},
};

/// A buffer that documents are written into consecutively.
pub struct DocumentWriter {
    data: Vec<u8>,

    /// End of the last committed document; everything past it is scratch.
    tail: usize,
}

impl DocumentWriter {
    pub fn new() -> DocumentWriter {
        DocumentWriter {
            data: Vec::new(),
            tail: 0,
        }
    }

    /// A writer whose allocation starts at `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> DocumentWriter {
        DocumentWriter {
            data: vec![0; capacity],
            tail: 0,
        }
    }

    /// Continues writing after the documents already in `data`.
    pub fn from_vec(data: Vec<u8>) -> DocumentWriter {
        let tail = data.len();
        DocumentWriter { data, tail }
    }

    /// Starts a document at the current tail. The writer is exclusively
    /// borrowed until the returned builder is finished or dropped.
    pub fn begin_document(&mut self) -> Result<DocumentBuilder<WriterSlot<'_>>> {
        DocumentBuilder::new_in(WriterSlot { writer: self })
    }

    /// All committed bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data[..self.tail]
    }

    /// Consumes the writer, returning the committed bytes.
    pub fn into_vec(mut self) -> Vec<u8> {
        self.data.truncate(self.tail);
        self.data
    }

    /// Walks the committed documents in write order.
    pub fn documents(&self) -> WriterDocuments<'_> {
        WriterDocuments {
            data: self.as_bytes(),
        }
    }
}

impl Default for DocumentWriter {
    fn default() -> DocumentWriter {
        DocumentWriter::new()
    }
}

impl std::fmt::Debug for DocumentWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentWriter")
            .field("data", &hex::encode(self.as_bytes()))
            .finish()
    }
}

/// Storage windowing a [`DocumentWriter`]'s buffer at its tail.
pub struct WriterSlot<'w> {
    writer: &'w mut DocumentWriter,
}

impl Storage for WriterSlot<'_> {
    fn reserve(&mut self, total: usize) -> Result<()> {
        if total > MAX_DOCUMENT_SIZE {
            return Err(Error::size_exceeded(total));
        }
        let needed = self.writer.tail + total;
        if self.writer.data.len() < needed {
            let mut size = self.writer.data.len().max(MIN_ALLOCATION);
            while size < needed {
                size *= 2;
            }
            self.writer.data.resize(size, 0);
        }
        Ok(())
    }

    fn bytes(&self) -> &[u8] {
        &self.writer.data[self.writer.tail..]
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.writer.data[self.writer.tail..]
    }
}

impl<'w> DocumentBuilder<WriterSlot<'w>> {
    /// Commits the document to the writer and advances its tail. Every
    /// sub-document must be closed first.
    pub fn finish(self) -> Result<()> {
        let (slot, len) = self.into_storage_len()?;
        slot.writer.tail += len;
        Ok(())
    }
}

/// Iterator over the documents committed to a [`DocumentWriter`].
pub struct WriterDocuments<'a> {
    data: &'a [u8],
}

impl<'a> Iterator for WriterDocuments<'a> {
    type Item = Result<&'a Document>;

    fn next(&mut self) -> Option<Result<&'a Document>> {
        if self.data.is_empty() {
            return None;
        }
        if self.data.len() < MIN_DOCUMENT_SIZE {
            let data = std::mem::take(&mut self.data);
            return Some(Err(Error::malformed(format!(
                "trailing {} bytes are not a document",
                data.len()
            ))));
        }
        let len = read_i32_le(self.data, 0);
        if len < MIN_DOCUMENT_SIZE as i32 || len as usize > self.data.len() {
            self.data = &[];
            return Some(Err(Error::malformed(format!(
                "document length prefix {len} does not fit the remaining buffer"
            ))));
        }
        let (head, rest) = self.data.split_at(len as usize);
        self.data = rest;
        Some(Document::from_bytes(head))
    }
}
