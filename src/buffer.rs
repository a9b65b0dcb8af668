//! Immutable byte buffer views.
//!
//! `BufferView` is the unit of data crossing every transport boundary: send
//! input, received-data notifications, and hook payloads. Cloning a view is
//! cheap (shared storage); the bytes themselves are never mutated.

use std::fmt;
use std::ops::Range;
use std::sync::Arc;

/// An immutable, cheaply shareable view over a contiguous byte range.
///
/// A zero-length view is a valid "empty" value, distinct from the absence of
/// a buffer. Hooks return an empty view to suppress data.
#[derive(Clone)]
pub struct BufferView {
    storage: Arc<[u8]>,
    offset: usize,
    len: usize,
}

impl BufferView {
    /// Returns an empty view.
    pub fn empty() -> Self {
        Self {
            storage: Arc::from(Vec::new()),
            offset: 0,
            len: 0,
        }
    }

    /// Returns the viewed bytes as a slice.
    pub fn as_slice(&self) -> &[u8] {
        &self.storage[self.offset..self.offset + self.len]
    }

    /// Number of bytes in the view.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the view contains no bytes.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns a sub-view over `range`, sharing the same storage.
    ///
    /// # Panics
    ///
    /// Panics if `range` lies outside the view, mirroring slice indexing.
    pub fn slice(&self, range: Range<usize>) -> Self {
        assert!(
            range.start <= range.end && range.end <= self.len,
            "range {range:?} out of bounds for view of {} bytes",
            self.len
        );

        Self {
            storage: Arc::clone(&self.storage),
            offset: self.offset + range.start,
            len: range.end - range.start,
        }
    }

    /// Returns a new view holding the bytes of `self` followed by `other`.
    ///
    /// Used by callers accumulating multi-chunk reads; allocates fresh
    /// storage for the combined bytes.
    pub fn concat(&self, other: &BufferView) -> Self {
        let mut combined = Vec::with_capacity(self.len + other.len);
        combined.extend_from_slice(self.as_slice());
        combined.extend_from_slice(other.as_slice());
        Self::from(combined)
    }
}

impl From<Vec<u8>> for BufferView {
    fn from(bytes: Vec<u8>) -> Self {
        let len = bytes.len();
        Self {
            storage: Arc::from(bytes),
            offset: 0,
            len,
        }
    }
}

impl From<&[u8]> for BufferView {
    fn from(bytes: &[u8]) -> Self {
        Self::from(bytes.to_vec())
    }
}

impl<const N: usize> From<&[u8; N]> for BufferView {
    fn from(bytes: &[u8; N]) -> Self {
        Self::from(bytes.as_slice())
    }
}

impl AsRef<[u8]> for BufferView {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl PartialEq for BufferView {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl Eq for BufferView {}

/// Hex descriptor used as a structured log field, e.g. `<3> 41-42-43`.
/// Long buffers are truncated after 32 bytes.
impl fmt::Display for BufferView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const MAX_SHOWN: usize = 32;

        write!(f, "<{}>", self.len)?;

        for (i, byte) in self.as_slice().iter().take(MAX_SHOWN).enumerate() {
            let sep = if i == 0 { ' ' } else { '-' };
            write!(f, "{sep}{byte:02X}")?;
        }

        if self.len > MAX_SHOWN {
            write!(f, "..")?;
        }

        Ok(())
    }
}

impl fmt::Debug for BufferView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BufferView({self})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_view() {
        let view = BufferView::empty();
        assert_eq!(view.len(), 0);
        assert!(view.is_empty());
        assert_eq!(view.as_slice(), &[] as &[u8]);
    }

    #[test]
    fn test_from_vec_and_slice() {
        let a = BufferView::from(vec![1, 2, 3]);
        let b = BufferView::from(&[1u8, 2, 3][..]);
        assert_eq!(a.len(), 3);
        assert_eq!(a, b);
    }

    #[test]
    fn test_clone_shares_storage() {
        let view = BufferView::from(vec![1, 2, 3, 4]);
        let clone = view.clone();
        assert!(Arc::ptr_eq(&view.storage, &clone.storage));
        assert_eq!(view, clone);
    }

    #[test]
    fn test_slice() {
        let view = BufferView::from(b"hello world");
        let word = view.slice(6..11);
        assert_eq!(word.as_slice(), b"world");

        // Sub-slicing a sub-view stays relative to the view.
        let tail = word.slice(1..5);
        assert_eq!(tail.as_slice(), b"orld");
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn test_slice_out_of_bounds() {
        BufferView::from(b"abc").slice(0..4);
    }

    #[test]
    fn test_concat() {
        let head = BufferView::from(b"AB");
        let tail = BufferView::from(b"CD");
        assert_eq!(head.concat(&tail).as_slice(), b"ABCD");
        assert_eq!(head.concat(&BufferView::empty()), head);
    }

    #[test]
    fn test_eq_ignores_storage_layout() {
        let whole = BufferView::from(b"xabcx");
        let inner = whole.slice(1..4);
        assert_eq!(inner, BufferView::from(b"abc"));
        assert_ne!(inner, whole);
    }

    #[test]
    fn test_display_hex() {
        assert_eq!(BufferView::from(b"ABC").to_string(), "<3> 41-42-43");
        assert_eq!(BufferView::empty().to_string(), "<0>");

        let long = BufferView::from(vec![0u8; 40]);
        let rendered = long.to_string();
        assert!(rendered.starts_with("<40> 00-"));
        assert!(rendered.ends_with(".."));
    }
}
