//! Membership snapshots of a registry.
//!
//! An [`IdSet`] answers "is this block one of the live ones" in O(1). It is
//! collected once and does not track later registry changes.

use roaring::RoaringBitmap;

use crate::datablock::DataBlock;
use crate::id::DataBlockId;
use crate::registry::Registry;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IdSet(RoaringBitmap);

impl IdSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: DataBlockId) -> bool {
        self.0.insert(id.raw())
    }

    pub fn contains(&self, id: DataBlockId) -> bool {
        self.0.contains(id.raw())
    }

    pub fn len(&self) -> u64 {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Ids in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = DataBlockId> + '_ {
        self.0.iter().map(DataBlockId::new)
    }
}

impl FromIterator<DataBlockId> for IdSet {
    fn from_iter<I: IntoIterator<Item = DataBlockId>>(iter: I) -> Self {
        Self(iter.into_iter().map(DataBlockId::raw).collect())
    }
}

/// Ids of every block in `registry`, added to `into` when given.
pub fn collect_ids(registry: &Registry, into: Option<IdSet>) -> IdSet {
    match into {
        Some(mut set) => {
            for block in registry.iter() {
                set.insert(block.id());
            }
            set
        }
        None => registry.iter().map(DataBlock::id).collect(),
    }
}
