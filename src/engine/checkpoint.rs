//! Resumable batch processing state.
//!
//! A long linkage run walks many trip files; the checkpoint records which
//! file identifiers are fully processed so an interrupted run restarts
//! where it stopped instead of reprocessing. Persisted as a JSON set next
//! to the output table. Marking is idempotent: appending an id that is
//! already present is a no-op.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Set of completed file identifiers, persisted between runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    completed: BTreeSet<String>,
}

impl Checkpoint {
    /// Create an empty checkpoint.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a checkpoint from disk.
    ///
    /// A missing file yields an empty checkpoint (first run). A present
    /// but unreadable file is an error; the caller decides whether to
    /// start fresh.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let contents = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Persist the checkpoint atomically (write-then-rename).
    ///
    /// A crash mid-save leaves the previous checkpoint intact.
    pub fn save(&self, path: &Path) -> Result<()> {
        let serialized = serde_json::to_string_pretty(self)?;
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, serialized)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Whether a file identifier is recorded as completed.
    pub fn is_done(&self, id: &str) -> bool {
        self.completed.contains(id)
    }

    /// Record a file identifier as completed.
    ///
    /// Returns `true` if the id was newly added, `false` if it was
    /// already present.
    pub fn mark_done(&mut self, id: &str) -> bool {
        self.completed.insert(id.to_string())
    }

    /// Completed identifiers in sorted order.
    pub fn completed(&self) -> impl Iterator<Item = &String> {
        self.completed.iter()
    }

    pub fn len(&self) -> usize {
        self.completed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.completed.is_empty()
    }
}
