//! Backing storage for documents under construction.
//!
//! A builder owns some [`Storage`] and writes the document into the window
//! of bytes it exposes. The stock implementation, [`OwnedBuffer`], keeps
//! small documents inline in the handle and promotes to a heap allocation
//! when they outgrow it; [`crate::writer::WriterSlot`] windows a shared
//! buffer holding many documents instead.

use crate::{
    error::{Error, Result},
    spec::MAX_DOCUMENT_SIZE,
};

/// Documents up to this size never touch the heap.
pub const INLINE_CAPACITY: usize = 120;

/// Heap allocations never shrink below this.
pub(crate) const MIN_ALLOCATION: usize = 64;

/// A growable window of bytes a document is built into.
///
/// `reserve` is called with the total number of bytes the document is about
/// to occupy; after it returns `Ok`, `bytes`/`bytes_mut` expose a window of
/// at least that many bytes. Requests past [`MAX_DOCUMENT_SIZE`] fail with
/// [`crate::ErrorKind::SizeExceeded`] and must leave the window untouched.
pub trait Storage {
    fn reserve(&mut self, total: usize) -> Result<()>;
    fn bytes(&self) -> &[u8];
    fn bytes_mut(&mut self) -> &mut [u8];
}

/// Picks the allocation size for a document of `total` bytes: the next
/// power of two, floored at [`MIN_ALLOCATION`].
pub(crate) fn allocation_size(total: usize) -> Result<usize> {
    if total > MAX_DOCUMENT_SIZE {
        return Err(Error::size_exceeded(total));
    }
    Ok(total
        .checked_next_power_of_two()
        .unwrap_or(MAX_DOCUMENT_SIZE)
        .clamp(MIN_ALLOCATION, MAX_DOCUMENT_SIZE))
}

/// Handle-owned storage: a fixed inline array promoted to a heap buffer on
/// first overflow.
#[derive(Clone)]
pub enum OwnedBuffer {
    Inline([u8; INLINE_CAPACITY]),
    Heap(Vec<u8>),
}

impl OwnedBuffer {
    pub(crate) fn new() -> OwnedBuffer {
        OwnedBuffer::Inline([0; INLINE_CAPACITY])
    }

    /// Adopts an existing allocation wholesale.
    pub(crate) fn from_vec(data: Vec<u8>) -> OwnedBuffer {
        OwnedBuffer::Heap(data)
    }

    /// Moves the first `len` bytes out of the buffer.
    pub(crate) fn into_vec(self, len: usize) -> Vec<u8> {
        match self {
            OwnedBuffer::Inline(buf) => buf[..len].to_vec(),
            OwnedBuffer::Heap(mut data) => {
                data.truncate(len);
                data
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn is_inline(&self) -> bool {
        matches!(self, OwnedBuffer::Inline(_))
    }
}

impl Storage for OwnedBuffer {
    fn reserve(&mut self, total: usize) -> Result<()> {
        match self {
            OwnedBuffer::Inline(buf) => {
                if total <= INLINE_CAPACITY {
                    return Ok(());
                }
                let size = allocation_size(total)?;
                let mut data = vec![0u8; size];
                data[..INLINE_CAPACITY].copy_from_slice(buf);
                *self = OwnedBuffer::Heap(data);
                Ok(())
            }
            OwnedBuffer::Heap(data) => {
                if total <= data.len() {
                    return Ok(());
                }
                let size = allocation_size(total)?;
                data.resize(size, 0);
                Ok(())
            }
        }
    }

    fn bytes(&self) -> &[u8] {
        match self {
            OwnedBuffer::Inline(buf) => buf,
            OwnedBuffer::Heap(data) => data,
        }
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        match self {
            OwnedBuffer::Inline(buf) => buf,
            OwnedBuffer::Heap(data) => data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_requests_stay_inline() {
        let mut buf = OwnedBuffer::new();
        buf.reserve(5).unwrap();
        buf.reserve(INLINE_CAPACITY).unwrap();
        assert!(buf.is_inline());
        assert_eq!(buf.bytes().len(), INLINE_CAPACITY);
    }

    #[test]
    fn promotion_copies_the_inline_prefix() {
        let mut buf = OwnedBuffer::new();
        buf.bytes_mut()[..4].copy_from_slice(&[9, 8, 7, 6]);
        buf.reserve(INLINE_CAPACITY + 1).unwrap();
        assert!(!buf.is_inline());
        // 121 rounds up to the next power of two
        assert_eq!(buf.bytes().len(), 128);
        assert_eq!(&buf.bytes()[..4], &[9, 8, 7, 6]);
    }

    #[test]
    fn heap_growth_doubles() {
        let mut buf = OwnedBuffer::new();
        buf.reserve(200).unwrap();
        assert_eq!(buf.bytes().len(), 256);
        buf.reserve(257).unwrap();
        assert_eq!(buf.bytes().len(), 512);
    }

    #[test]
    fn oversized_requests_fail_without_mutating() {
        let mut buf = OwnedBuffer::new();
        buf.reserve(200).unwrap();
        let err = buf.reserve(MAX_DOCUMENT_SIZE + 1).unwrap_err();
        assert!(err.is_size_exceeded());
        assert_eq!(buf.bytes().len(), 256);
    }

    #[test]
    fn allocation_floor_is_64() {
        assert_eq!(allocation_size(1).unwrap(), MIN_ALLOCATION);
        assert_eq!(allocation_size(65).unwrap(), 128);
    }
}
