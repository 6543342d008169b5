//! Edge pool: chunked arena for edge records with bulk release.
//!
//! Records are appended into fixed-capacity chunks and never freed one by one.
//! [`EdgePool::release_all`] drops every chunk at once and bumps the pool
//! generation, so handles issued before the release stop resolving.

use serde::Serialize;

use crate::datablock::FieldRef;
use crate::error::{MainError, Result};
use crate::id::{DataBlockId, SessionUuid};
use crate::kinds::UsageFlags;
use crate::registry::Registry;

/// Records per chunk when no configuration says otherwise.
pub const DEFAULT_CHUNK_SIZE: usize = 128;

/// Handle to a record in an [`EdgePool`], valid for one pool generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EdgeHandle {
    index: u32,
    generation: u32,
}

impl EdgeHandle {
    pub fn generation(self) -> u32 {
        self.generation
    }
}

/// One discovered reference-field occurrence, seen from one of its ends.
///
/// On an outgoing list, `peer` is the block the field points at; on an
/// incoming list, `peer` is the block owning the field. `field` always names
/// the slot in the owning block, so both records of a pair share it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeRecord {
    pub field: FieldRef,
    pub peer: Option<DataBlockId>,
    /// Stamp of `peer` when the edge was recorded, `SessionUuid::UNSET` for
    /// a null slot.
    pub session_uuid: SessionUuid,
    pub usage: UsageFlags,
    pub(crate) next: Option<EdgeHandle>,
}

impl EdgeRecord {
    pub fn new(
        field: FieldRef,
        peer: Option<DataBlockId>,
        session_uuid: SessionUuid,
        usage: UsageFlags,
    ) -> Self {
        Self {
            field,
            peer,
            session_uuid,
            usage,
            next: None,
        }
    }

    /// Whether the field was null when recorded.
    pub fn is_unset(&self) -> bool {
        self.session_uuid.is_unset()
    }

    /// Next record of the same list.
    pub fn next(&self) -> Option<EdgeHandle> {
        self.next
    }

    /// Whether `peer` still holds the block this record was stamped with.
    /// Always false for null slots.
    pub fn peer_is_current(&self, registry: &Registry) -> bool {
        match self.peer {
            Some(peer) if !self.is_unset() => registry.is_current(peer, self.session_uuid),
            _ => false,
        }
    }
}

/// Allocation bookkeeping of an [`EdgePool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct PoolStats {
    pub generation: u32,
    pub live_records: usize,
    pub chunks: usize,
    pub capacity: usize,
    /// Chunks allocated over the pool's whole life.
    pub chunks_allocated: u64,
    /// Chunks dropped by `release_all` over the pool's whole life.
    pub chunks_released: u64,
}

impl PoolStats {
    /// Every chunk ever allocated is either live or released.
    pub fn is_balanced(&self) -> bool {
        self.chunks_allocated == self.chunks_released + self.chunks as u64
    }
}

#[derive(Debug)]
pub struct EdgePool {
    chunks: Vec<Vec<EdgeRecord>>,
    chunk_size: usize,
    /// Records one generation may hold.
    max_records: usize,
    generation: u32,
    live: usize,
    chunks_allocated: u64,
    chunks_released: u64,
}

impl Default for EdgePool {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE)
    }
}

impl EdgePool {
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunks: Vec::new(),
            chunk_size: chunk_size.max(1),
            max_records: u32::MAX as usize,
            generation: 0,
            live: 0,
            chunks_allocated: 0,
            chunks_released: 0,
        }
    }

    /// Cap the records per generation below the 32-bit handle limit.
    pub fn with_max_records(mut self, max_records: usize) -> Self {
        self.max_records = max_records.min(u32::MAX as usize);
        self
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Number of records allocated in the current generation.
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    fn grow(&mut self) -> Result<()> {
        let mut chunk = Vec::new();
        chunk
            .try_reserve_exact(self.chunk_size)
            .map_err(|source| MainError::ResourceExhausted {
                what: "edge pool chunk",
                requested: self.chunk_size,
                source,
            })?;
        self.chunks
            .try_reserve(1)
            .map_err(|source| MainError::ResourceExhausted {
                what: "edge pool chunk table",
                requested: 1,
                source,
            })?;
        self.chunks.push(chunk);
        self.chunks_allocated += 1;
        Ok(())
    }

    /// Store `record` and return its handle.
    pub fn allocate(&mut self, record: EdgeRecord) -> Result<EdgeHandle> {
        if self.live >= self.max_records {
            return Err(MainError::CapacityOverflow {
                what: "edge pool",
                limit: self.max_records as u64,
            });
        }
        // max_records never exceeds u32::MAX.
        let index = self.live as u32;

        let full = self
            .chunks
            .last()
            .map(|chunk| chunk.len() == self.chunk_size)
            .unwrap_or(true);
        if full {
            self.grow()?;
        }

        match self.chunks.last_mut() {
            Some(chunk) => chunk.push(record),
            None => unreachable!("grow() always leaves a chunk with room"),
        }
        self.live += 1;
        Ok(EdgeHandle {
            index,
            generation: self.generation,
        })
    }

    fn locate(&self, handle: EdgeHandle) -> Option<(usize, usize)> {
        if handle.generation != self.generation {
            return None;
        }
        let index = handle.index as usize;
        Some((index / self.chunk_size, index % self.chunk_size))
    }

    /// Record behind `handle`, or `None` if it was issued before the last
    /// `release_all`.
    pub fn get(&self, handle: EdgeHandle) -> Option<&EdgeRecord> {
        let (chunk, offset) = self.locate(handle)?;
        self.chunks.get(chunk)?.get(offset)
    }

    /// Drop every record and invalidate all outstanding handles.
    pub fn release_all(&mut self) {
        self.chunks_released += self.chunks.len() as u64;
        self.chunks = Vec::new();
        self.live = 0;
        self.generation = self.generation.wrapping_add(1);
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            generation: self.generation,
            live_records: self.live,
            chunks: self.chunks.len(),
            capacity: self.chunks.len() * self.chunk_size,
            chunks_allocated: self.chunks_allocated,
            chunks_released: self.chunks_released,
        }
    }
}
