//! StreamKey - Cheap-to-clone stream identifier
//!
//! The partition key shared by events, change markers and offsets.
//! Conventionally `"{streamType}:{streamId}"`, but any non-empty string is accepted.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::borrow::Borrow;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::sync::Arc;

/// Separator between stream type and stream id in a composite key.
pub const STREAM_KEY_SEPARATOR: char = ':';

/// Stream (aggregate) identifier.
///
/// Backed by `Arc<str>`: a dispatch fans the same key out to the event log,
/// the offset store and log fields, so clones only bump a reference count.
///
/// # Examples
/// ```
/// use contracts::StreamKey;
///
/// let key = StreamKey::compose("order", "42");
/// assert_eq!(key, "order:42");
/// assert_eq!(key.parts(), Some(("order", "42")));
/// ```
#[derive(Clone, Default)]
pub struct StreamKey(Arc<str>);

impl StreamKey {
    #[inline]
    pub fn new(s: &str) -> Self {
        Self(Arc::from(s))
    }

    /// Build the composite `"{stream_type}:{stream_id}"` key.
    pub fn compose(stream_type: &str, stream_id: &str) -> Self {
        Self::from(format!("{stream_type}{STREAM_KEY_SEPARATOR}{stream_id}"))
    }

    /// Split a composite key at the first separator.
    ///
    /// Returns `None` for keys that were not built with [`StreamKey::compose`].
    pub fn parts(&self) -> Option<(&str, &str)> {
        self.0.split_once(STREAM_KEY_SEPARATOR)
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Deref for StreamKey {
    type Target = str;

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<str> for StreamKey {
    #[inline]
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for StreamKey {
    #[inline]
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for StreamKey {
    #[inline]
    fn from(s: &str) -> Self {
        Self(Arc::from(s))
    }
}

impl From<String> for StreamKey {
    #[inline]
    fn from(s: String) -> Self {
        Self(Arc::from(s))
    }
}

impl From<&String> for StreamKey {
    #[inline]
    fn from(s: &String) -> Self {
        Self(Arc::from(s.as_str()))
    }
}

impl fmt::Display for StreamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for StreamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StreamKey({:?})", self.0)
    }
}

impl PartialEq for StreamKey {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.0 == other.0
    }
}

impl Eq for StreamKey {}

impl PartialEq<str> for StreamKey {
    #[inline]
    fn eq(&self, other: &str) -> bool {
        self.0.as_ref() == other
    }
}

impl PartialEq<&str> for StreamKey {
    #[inline]
    fn eq(&self, other: &&str) -> bool {
        self.0.as_ref() == *other
    }
}

impl PartialEq<String> for StreamKey {
    #[inline]
    fn eq(&self, other: &String) -> bool {
        self.0.as_ref() == other
    }
}

// Ordered like the underlying str so keys can index ordered maps.
impl PartialOrd for StreamKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for StreamKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.as_ref().cmp(other.0.as_ref())
    }
}

// Must hash exactly like str so `HashMap<StreamKey, _>::get(&str)` works.
impl Hash for StreamKey {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash(state)
    }
}

impl Serialize for StreamKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for StreamKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Self::from(s))
    }
}
