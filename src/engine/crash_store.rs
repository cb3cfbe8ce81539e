//! Crash record storage and lookup.
//!
//! Owns the loaded crash set for the lifetime of an analysis run. Crashes
//! are immutable once loaded; the store keeps them in load order so the
//! spatial index can refer to them by position.

use std::collections::HashMap;

use log::warn;

use crate::{Crash, Severity};

/// Storage for the loaded crash set.
///
/// Keyed both positionally (for the spatial index) and by crash id
/// (for joins when writing output tables).
#[derive(Debug, Default)]
pub struct CrashStore {
    crashes: Vec<Crash>,
    by_id: HashMap<String, usize>,
}

impl CrashStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            crashes: Vec::new(),
            by_id: HashMap::new(),
        }
    }

    /// Build a store from loaded crash records.
    ///
    /// Crash ids are unique: a duplicate id keeps the first record and
    /// logs a warning.
    pub fn from_crashes(crashes: Vec<Crash>) -> Self {
        let mut store = Self::new();
        for crash in crashes {
            store.add(crash);
        }
        store
    }

    /// Add one crash. Duplicate ids keep the first record.
    pub fn add(&mut self, crash: Crash) {
        if self.by_id.contains_key(&crash.id) {
            warn!("duplicate crash id '{}' ignored", crash.id);
            return;
        }
        self.by_id.insert(crash.id.clone(), self.crashes.len());
        self.crashes.push(crash);
    }

    /// Get a crash by its position in load order.
    pub fn get(&self, index: usize) -> Option<&Crash> {
        self.crashes.get(index)
    }

    /// Get a crash by id.
    pub fn get_by_id(&self, id: &str) -> Option<&Crash> {
        self.by_id.get(id).and_then(|&i| self.crashes.get(i))
    }

    /// Severity of a crash by id.
    pub fn severity_of(&self, id: &str) -> Option<Severity> {
        self.get_by_id(id).map(|c| c.severity)
    }

    /// All crashes in load order.
    pub fn iter(&self) -> impl Iterator<Item = &Crash> {
        self.crashes.iter()
    }

    /// All crashes as a slice, in load order.
    pub fn as_slice(&self) -> &[Crash] {
        &self.crashes
    }

    /// Number of crashes with a known datetime.
    pub fn dated_count(&self) -> usize {
        self.crashes.iter().filter(|c| c.datetime.is_some()).count()
    }

    pub fn len(&self) -> usize {
        self.crashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.crashes.is_empty()
    }
}
