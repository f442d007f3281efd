//! Offset - per-stream forwarding cursor

use serde::{Deserialize, Serialize};

use crate::StreamKey;

/// Version of the last event forwarded for a stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offset {
    pub id: StreamKey,
    pub version: i64,
}

impl Offset {
    pub fn new(id: impl Into<StreamKey>, version: i64) -> Self {
        Self {
            id: id.into(),
            version,
        }
    }

    /// Offset of a stream that has never been forwarded.
    pub fn initial(id: impl Into<StreamKey>) -> Self {
        Self::new(id, 0)
    }

    /// Same stream, advanced to `version`.
    pub fn advanced_to(&self, version: i64) -> Self {
        Self::new(self.id.clone(), version)
    }
}

/// How the dispatcher writes offsets back
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitMode {
    /// Plain upsert; overlapping dispatchers for one stream race last-write-wins
    #[default]
    Unconditional,
    /// Put only if the stored version still equals the one read at dispatch start
    Conditional,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_and_advance() {
        let start = Offset::initial("s:1");
        assert_eq!(start.version, 0);
        let next = start.advanced_to(5);
        assert_eq!(next, Offset::new("s:1", 5));
    }

    #[test]
    fn test_commit_mode_serde() {
        let mode: CommitMode = serde_json::from_str("\"conditional\"").unwrap();
        assert_eq!(mode, CommitMode::Conditional);
        assert_eq!(CommitMode::default(), CommitMode::Unconditional);
    }
}
