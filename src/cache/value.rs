//! Cache Value Module
//!
//! Immutable byte payload handed out by cache groups.

use std::borrow::Cow;
use std::fmt;

use bytes::Bytes;

// == Cache Value ==
/// An immutable byte payload.
///
/// Values never alias a caller's mutable buffer: borrowed input is copied on
/// construction, and readers only ever get shared read-only views or fresh
/// copies. Cloning is cheap because the underlying buffer is immutable.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct CacheValue {
    bytes: Bytes,
}

impl CacheValue {
    /// Creates a value by copying `data`.
    pub fn copy_from(data: &[u8]) -> Self {
        Self {
            bytes: Bytes::copy_from_slice(data),
        }
    }

    /// Size in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Read-only view of the payload.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Returns a fresh, independently owned copy of the payload.
    pub fn to_vec(&self) -> Vec<u8> {
        self.bytes.to_vec()
    }

    /// Text view of the payload, replacing invalid UTF-8 sequences.
    pub fn to_string_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.bytes)
    }

    /// Returns the payload as `Bytes` for zero-copy transmission.
    pub fn into_bytes(self) -> Bytes {
        self.bytes
    }
}

impl From<Vec<u8>> for CacheValue {
    fn from(data: Vec<u8>) -> Self {
        // The vector is moved in, so no outside handle can mutate it.
        Self {
            bytes: Bytes::from(data),
        }
    }
}

impl From<String> for CacheValue {
    fn from(data: String) -> Self {
        Self::from(data.into_bytes())
    }
}

impl From<&str> for CacheValue {
    fn from(data: &str) -> Self {
        Self::copy_from(data.as_bytes())
    }
}

impl From<&[u8]> for CacheValue {
    fn from(data: &[u8]) -> Self {
        Self::copy_from(data)
    }
}

impl From<Bytes> for CacheValue {
    fn from(bytes: Bytes) -> Self {
        Self { bytes }
    }
}

impl AsRef<[u8]> for CacheValue {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl fmt::Display for CacheValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_string_lossy())
    }
}

impl fmt::Debug for CacheValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheValue")
            .field("len", &self.len())
            .field("text", &self.to_string_lossy())
            .finish()
    }
}
