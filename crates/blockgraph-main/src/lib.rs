//! Blockgraph: data-block registry with a rebuildable relation index
//!
//! A [`Main`] owns every data block of a session, grouped per [`IdKind`], and
//! an optional [`RelationIndex`] answering two questions in O(1) lookup:
//!
//! - which reference slots does a block hold (and what do they point at);
//! - which slots, in any block, point at a given block.
//!
//! The index is a snapshot built by walking every block's reference fields
//! through the static per-kind descriptor tables in [`kinds`]. Edge records
//! live in a chunked [`EdgePool`] that is released in one step.
//!
//! ## Module Organization
//!
//! - `id`, `kinds`, `datablock`: identity, field tables, and block storage
//! - `registry`: per-kind block lists with slot recycling
//! - `walker`: generic traversal of reference slots
//! - `pool`, `relations`: the relation index and its edge storage
//! - `membership`: roaring-bitmap snapshots of the live block set
//! - `config`: JSON configuration with environment overrides

pub mod config;
pub mod datablock;
pub mod error;
pub mod id;
pub mod kinds;
pub mod membership;
pub mod pool;
pub mod registry;
pub mod relations;
pub mod walker;

use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;

// Re-export key types
pub use config::{RelationsConfig, POOL_CHUNK_SIZE_ENV};
pub use datablock::{DataBlock, FieldPath, FieldRef, FieldStep, FieldValue};
pub use error::{MainError, Result};
pub use id::{DataBlockId, IdKind, SessionUuid, KIND_COUNT};
pub use kinds::{fields_of, FieldDescriptor, FieldShape, UsageFlags, MAX_FIELD_DEPTH};
pub use membership::{collect_ids, IdSet};
pub use pool::{EdgeHandle, EdgePool, EdgeRecord, PoolStats, DEFAULT_CHUNK_SIZE};
pub use registry::Registry;
pub use relations::{BuildStats, Edges, EntryTags, RelationEntry, RelationIndex, RelationsFlags};
pub use walker::{foreach_id_link, foreach_id_link_mut, IdLink, IdLinkMut, WalkControl, WalkOptions};

// ============================================================================
// Main aggregate
// ============================================================================

/// One session's worth of data blocks plus their relation index.
#[derive(Debug)]
pub struct Main {
    registry: Registry,
    relations: RelationIndex,
    filepath: Option<PathBuf>,
    config: RelationsConfig,
}

/// Coarse lock around a [`Main`] shared between threads.
pub type SharedMain = Arc<Mutex<Main>>;

impl Default for Main {
    fn default() -> Self {
        Self::new()
    }
}

impl Main {
    pub fn new() -> Self {
        Self::with_config(RelationsConfig::default())
    }

    pub fn with_config(config: RelationsConfig) -> Self {
        Self {
            registry: Registry::new(),
            relations: RelationIndex::with_config(&config),
            filepath: None,
            config,
        }
    }

    pub fn config(&self) -> &RelationsConfig {
        &self.config
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Mutable registry access. A built relation index does not follow the
    /// changes; call [`Main::relations_create`] again afterwards.
    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    pub fn relations(&self) -> &RelationIndex {
        &self.relations
    }

    /// Build (or rebuild) the relation index over the current registry.
    pub fn relations_create(&mut self, flags: RelationsFlags) -> Result<BuildStats> {
        self.relations.build(&self.registry, flags)
    }

    /// Build with the flags implied by this main's configuration.
    pub fn relations_create_default(&mut self) -> Result<BuildStats> {
        let flags = self.config.flags();
        self.relations_create(flags)
    }

    pub fn relations_free(&mut self) {
        self.relations.free();
    }

    /// Set or clear `tag` on every relation entry. No-op when not built.
    pub fn relations_tag_set(&mut self, tag: EntryTags, value: bool) {
        self.relations.tag_all(tag, value);
    }

    /// Set or clear `tag` on the entry of `id`. Returns false if there is none.
    pub fn relations_entry_tag_set(&mut self, id: DataBlockId, tag: EntryTags, value: bool) -> bool {
        self.relations.tag_set(id, tag, value)
    }

    /// Snapshot of every block id, added to `into` when given.
    pub fn gset_create(&self, into: Option<IdSet>) -> IdSet {
        collect_ids(&self.registry, into)
    }

    pub fn blendfile_path(&self) -> Option<&Path> {
        self.filepath.as_deref()
    }

    pub fn set_blendfile_path(&mut self, path: Option<PathBuf>) {
        self.filepath = path;
    }

    /// Free the relation index, then every block. Returns the number of
    /// blocks freed.
    pub fn clear(&mut self) -> usize {
        self.relations.free();
        let freed = self.registry.teardown();
        tracing::debug!(freed, "cleared main");
        freed
    }

    pub fn into_shared(self) -> SharedMain {
        Arc::new(Mutex::new(self))
    }
}

// ============================================================================
// Tests
// ============================================================================
