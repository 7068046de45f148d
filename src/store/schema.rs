//! Store schema versions and additive migrations.
//!
//! Each schema version may only add collections. Migrating from an older
//! version creates whatever collections were introduced since, leaving
//! existing records untouched.

use serde::{Deserialize, Serialize};

/// Schema version written by this build.
pub const SCHEMA_VERSION: u32 = 2;

/// A named collection of records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    /// File records keyed by file id
    Files,
    /// The singleton session metadata record
    Meta,
}

impl Collection {
    /// Every collection known to this build, in introduction order.
    pub const ALL: [Collection; 2] = [Collection::Files, Collection::Meta];

    /// Storage name of the collection.
    pub fn name(&self) -> &'static str {
        match self {
            Collection::Files => "files",
            Collection::Meta => "meta",
        }
    }

    /// Schema version that introduced the collection.
    pub fn introduced_in(&self) -> u32 {
        match self {
            Collection::Files => 1,
            Collection::Meta => 2,
        }
    }
}

/// Collections that exist at `version`.
pub fn collections_at(version: u32) -> Vec<Collection> {
    Collection::ALL
        .into_iter()
        .filter(|c| c.introduced_in() <= version)
        .collect()
}

/// Collections to create when moving from `from` to `to`.
///
/// Empty when `to <= from`; downgrades never remove anything.
pub fn migration_steps(from: u32, to: u32) -> Vec<Collection> {
    Collection::ALL
        .into_iter()
        .filter(|c| c.introduced_in() > from && c.introduced_in() <= to)
        .collect()
}

/// Version marker persisted alongside the collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaMarker {
    pub version: u32,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
