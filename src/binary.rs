//! Immutable byte container shared across nested views.

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

/// Cheap-to-clone view into shared immutable bytes.
///
/// Sub-containers reference the same allocation; decoded archive payloads get
/// their own.
#[derive(Clone)]
pub struct Binary {
    buffer: Arc<[u8]>,
    offset: usize,
    size: usize,
}

impl Binary {
    /// Take ownership of `data`.
    pub fn new(data: Vec<u8>) -> Self {
        let size = data.len();
        Self {
            buffer: Arc::from(data),
            offset: 0,
            size,
        }
    }

    /// Bytes of this view.
    pub fn start(&self) -> &[u8] {
        &self.buffer[self.offset..self.offset + self.size]
    }

    /// Length of this view.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Whether the view has no bytes.
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// View of `[offset, offset + size)`, truncated to the available bytes.
    ///
    /// Returns `None` when `offset` is past the end or `size` is zero.
    pub fn sub_container(&self, offset: usize, size: usize) -> Option<Binary> {
        if offset >= self.size || size == 0 {
            return None;
        }
        let size = size.min(self.size - offset);
        Some(Self {
            buffer: Arc::clone(&self.buffer),
            offset: self.offset + offset,
            size,
        })
    }

    /// View from `offset` to the end.
    pub fn tail(&self, offset: usize) -> Option<Binary> {
        self.sub_container(offset, self.size.saturating_sub(offset))
    }
}

impl Deref for Binary {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.start()
    }
}

impl AsRef<[u8]> for Binary {
    fn as_ref(&self) -> &[u8] {
        self.start()
    }
}

impl From<Vec<u8>> for Binary {
    fn from(data: Vec<u8>) -> Self {
        Self::new(data)
    }
}

impl From<&[u8]> for Binary {
    fn from(data: &[u8]) -> Self {
        Self::new(data.to_vec())
    }
}

impl fmt::Debug for Binary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binary")
            .field("offset", &self.offset)
            .field("size", &self.size)
            .finish()
    }
}
