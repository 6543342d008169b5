//! Relation index: who references whom, and who is referenced by whom.
//!
//! A build walks every block of a [`Registry`] and records each reference
//! slot it finds:
//!
//! - a populated slot yields an outgoing record on the owner's entry and an
//!   incoming record on the target's entry;
//! - a null slot yields only an outgoing record, stamped
//!   [`SessionUuid::UNSET`], so the field can be found again if it is set later.
//!
//! Every block of the registry gets exactly one entry, edges or not. Records
//! live in an [`EdgePool`] and are chained per entry as singly linked lists,
//! most recently discovered first.
//!
//! The index is a snapshot. It does not follow registry mutations; rebuild it
//! after changing the registry.

use ahash::AHashMap;
use serde::Serialize;
use std::time::Instant;

use crate::config::RelationsConfig;
use crate::error::{MainError, Result};
use crate::id::{DataBlockId, SessionUuid};
use crate::pool::{EdgeHandle, EdgePool, EdgeRecord, PoolStats};
use crate::registry::Registry;
use crate::walker::{foreach_id_link, IdLink, WalkControl, WalkOptions};

bitflags::bitflags! {
    /// Options a relation index was built with.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct RelationsFlags: u32 {
        /// Record UI-only references too.
        const INCLUDE_UI = 1 << 0;
    }
}

bitflags::bitflags! {
    /// Scratch tags consumers set on entries while walking the graph.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct EntryTags: u32 {
        /// Outgoing relations of the entry have been processed.
        const PROCESSED_TO = 1 << 0;
        /// Incoming relations of the entry have been processed.
        const PROCESSED_FROM = 1 << 1;
        const PROCESSED = Self::PROCESSED_TO.bits() | Self::PROCESSED_FROM.bits();
        /// Outgoing relations are being processed (cycle detection).
        const INPROGRESS_TO = 1 << 2;
        /// Incoming relations are being processed (cycle detection).
        const INPROGRESS_FROM = 1 << 3;
        const INPROGRESS = Self::INPROGRESS_TO.bits() | Self::INPROGRESS_FROM.bits();
    }
}

/// Relations of one data block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationEntry {
    session_uuid: SessionUuid,
    to_head: Option<EdgeHandle>,
    from_head: Option<EdgeHandle>,
    to_len: usize,
    from_len: usize,
    pub tags: EntryTags,
}

impl RelationEntry {
    fn new(session_uuid: SessionUuid) -> Self {
        Self {
            session_uuid,
            to_head: None,
            from_head: None,
            to_len: 0,
            from_len: 0,
            tags: EntryTags::empty(),
        }
    }

    /// Stamp of the block this entry was created for.
    pub fn session_uuid(&self) -> SessionUuid {
        self.session_uuid
    }

    /// Number of reference slots this block holds (null ones included).
    pub fn outgoing_len(&self) -> usize {
        self.to_len
    }

    /// Number of populated slots, in any block, pointing at this block.
    pub fn incoming_len(&self) -> usize {
        self.from_len
    }
}

/// Counts gathered by one build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct BuildStats {
    pub entries: usize,
    pub outgoing: usize,
    pub incoming: usize,
    /// Outgoing records of null slots.
    pub unset: usize,
    /// Outgoing records of slots pointing at a vacant registry slot.
    pub dangling: usize,
}

/// Iterator over one linked list of edge records.
#[derive(Debug, Clone)]
pub struct Edges<'a> {
    pool: &'a EdgePool,
    next: Option<EdgeHandle>,
    remaining: usize,
}

impl<'a> Iterator for Edges<'a> {
    type Item = &'a EdgeRecord;

    fn next(&mut self) -> Option<Self::Item> {
        let record = self.pool.get(self.next?)?;
        self.next = record.next;
        self.remaining = self.remaining.saturating_sub(1);
        Some(record)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.remaining))
    }
}

#[derive(Debug)]
struct RelationMap {
    entries: AHashMap<DataBlockId, RelationEntry>,
    flags: RelationsFlags,
}

/// Bidirectional relation index over a [`Registry`].
///
/// Either built (holding one entry per block) or not built. `build`, `free`
/// and the tagging calls need exclusive access; callers sharing a [`crate::Main`]
/// across threads go through its lock.
#[derive(Debug)]
pub struct RelationIndex {
    map: Option<RelationMap>,
    pool: EdgePool,
    entry_capacity_hint: usize,
}

impl Default for RelationIndex {
    fn default() -> Self {
        Self::new()
    }
}

fn ensure_entry(
    entries: &mut AHashMap<DataBlockId, RelationEntry>,
    id: DataBlockId,
    session_uuid: SessionUuid,
) -> &mut RelationEntry {
    let entry = entries
        .entry(id)
        .or_insert_with(|| RelationEntry::new(session_uuid));
    assert_eq!(
        entry.session_uuid, session_uuid,
        "relation entry of {id} is stamped {} but the block there is {}",
        entry.session_uuid, session_uuid
    );
    entry
}

fn record_link(
    entries: &mut AHashMap<DataBlockId, RelationEntry>,
    pool: &mut EdgePool,
    registry: &Registry,
    link: &IdLink,
    stats: &mut BuildStats,
) -> Result<()> {
    let target = link
        .target
        .and_then(|id| registry.get(id).map(|block| (id, block.session_uuid())));

    if link.target.is_some() && target.is_none() {
        tracing::warn!(
            owner = %link.owner,
            field = %link.field,
            referenced = ?link.target,
            "reference to a vacant registry slot, recorded as unset"
        );
        stats.dangling += 1;
    }

    let source = ensure_entry(entries, link.owner, link.owner_uuid);
    let mut outgoing = EdgeRecord::new(
        link.field,
        link.target,
        target.map(|(_, uuid)| uuid).unwrap_or(SessionUuid::UNSET),
        link.usage,
    );
    outgoing.next = source.to_head;
    source.to_head = Some(pool.allocate(outgoing)?);
    source.to_len += 1;
    stats.outgoing += 1;

    let Some((target_id, target_uuid)) = target else {
        if link.target.is_none() {
            stats.unset += 1;
        }
        return Ok(());
    };

    let target_entry = ensure_entry(entries, target_id, target_uuid);
    let mut incoming = EdgeRecord::new(link.field, Some(link.owner), link.owner_uuid, link.usage);
    incoming.next = target_entry.from_head;
    target_entry.from_head = Some(pool.allocate(incoming)?);
    target_entry.from_len += 1;
    stats.incoming += 1;
    Ok(())
}

impl RelationIndex {
    pub fn new() -> Self {
        Self::with_config(&RelationsConfig::default())
    }

    pub fn with_config(config: &RelationsConfig) -> Self {
        let mut pool = EdgePool::new(config.pool_chunk_size);
        if let Some(max_records) = config.max_edge_records {
            pool = pool.with_max_records(max_records);
        }
        Self {
            map: None,
            pool,
            entry_capacity_hint: config.entry_capacity_hint,
        }
    }

    pub fn is_built(&self) -> bool {
        self.map.is_some()
    }

    /// Flags of the current build.
    pub fn flags(&self) -> Option<RelationsFlags> {
        self.map.as_ref().map(|map| map.flags)
    }

    /// (Re)build the index from `registry`, discarding any previous build.
    ///
    /// On error the index is left unbuilt, and its pool keeps the records of
    /// the partial build until the next `free` or `build`.
    pub fn build(&mut self, registry: &Registry, flags: RelationsFlags) -> Result<BuildStats> {
        self.free();
        let start = Instant::now();

        let mut entries: AHashMap<DataBlockId, RelationEntry> = AHashMap::default();
        let capacity = registry.len() + self.entry_capacity_hint;
        entries
            .try_reserve(capacity)
            .map_err(|source| MainError::ResourceExhausted {
                what: "relation entries",
                requested: capacity,
                source,
            })?;

        let options = if flags.contains(RelationsFlags::INCLUDE_UI) {
            WalkOptions::INCLUDE_UI
        } else {
            WalkOptions::empty()
        };

        let mut stats = BuildStats::default();
        let mut failure: Option<MainError> = None;
        let pool = &mut self.pool;

        for block in registry.iter() {
            // Blocks without any reference field still get an entry.
            ensure_entry(&mut entries, block.id(), block.session_uuid());

            foreach_id_link(block, options, |link| {
                match record_link(&mut entries, pool, registry, link, &mut stats) {
                    Ok(()) => WalkControl::Continue,
                    Err(err) => {
                        failure = Some(err);
                        WalkControl::Stop
                    }
                }
            });

            if let Some(err) = failure.take() {
                tracing::error!(error = %err, "relation build aborted");
                return Err(err);
            }
        }

        stats.entries = entries.len();
        tracing::debug!(
            entries = stats.entries,
            outgoing = stats.outgoing,
            incoming = stats.incoming,
            unset = stats.unset,
            elapsed_us = start.elapsed().as_micros() as u64,
            "built relation index"
        );

        self.map = Some(RelationMap { entries, flags });
        Ok(stats)
    }

    /// Drop the current build and release every edge record at once.
    /// Does nothing when the index is not built.
    pub fn free(&mut self) {
        let was_built = self.map.take().is_some();
        if was_built || !self.pool.is_empty() {
            let records = self.pool.len();
            self.pool.release_all();
            tracing::debug!(records, "freed relation index");
        }
    }

    /// Set or clear `tag` on every entry.
    pub fn tag_all(&mut self, tag: EntryTags, value: bool) {
        let Some(map) = self.map.as_mut() else {
            return;
        };
        for entry in map.entries.values_mut() {
            entry.tags.set(tag, value);
        }
    }

    /// Set or clear `tag` on the entry of `id`. Returns false if there is none.
    pub fn tag_set(&mut self, id: DataBlockId, tag: EntryTags, value: bool) -> bool {
        let Some(entry) = self.map.as_mut().and_then(|map| map.entries.get_mut(&id)) else {
            return false;
        };
        entry.tags.set(tag, value);
        true
    }

    pub fn lookup(&self, id: DataBlockId) -> Option<&RelationEntry> {
        self.map.as_ref()?.entries.get(&id)
    }

    /// Number of entries (0 when not built).
    pub fn len(&self) -> usize {
        self.map.as_ref().map(|map| map.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All entries, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (DataBlockId, &RelationEntry)> + '_ {
        self.map
            .iter()
            .flat_map(|map| map.entries.iter().map(|(id, entry)| (*id, entry)))
    }

    /// Slots held by the block of `entry`.
    pub fn outgoing(&self, entry: &RelationEntry) -> Edges<'_> {
        Edges {
            pool: &self.pool,
            next: entry.to_head,
            remaining: entry.to_len,
        }
    }

    /// Populated slots pointing at the block of `entry`.
    pub fn incoming(&self, entry: &RelationEntry) -> Edges<'_> {
        Edges {
            pool: &self.pool,
            next: entry.from_head,
            remaining: entry.from_len,
        }
    }

    pub fn edge(&self, handle: EdgeHandle) -> Option<&EdgeRecord> {
        self.pool.get(handle)
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }
}
