//! Registry: owns every live data block, grouped by kind.
//!
//! Blocks live in a slot table. A block's [`DataBlockId`] is its slot, and a
//! slot is handed out again after the block in it is removed, so an id alone
//! does not tell two blocks apart over time. The [`SessionUuid`] does.
//!
//! Within a kind, blocks are listed in insertion order. Across kinds, the
//! order is [`IdKind::ALL`].

use crate::datablock::{DataBlock, FieldPath, FieldRef};
use crate::error::{MainError, Result};
use crate::id::{DataBlockId, IdKind, SessionUuid, KIND_COUNT};
use crate::kinds::{FieldDescriptor, FieldShape};

static KIND_ORDER: [IdKind; KIND_COUNT] = IdKind::ALL;

#[derive(Debug)]
pub struct Registry {
    slots: Vec<Option<DataBlock>>,
    /// Vacant slots, reused most-recently-freed first.
    free_slots: Vec<DataBlockId>,
    /// Per-kind listing, insertion order.
    lists: [Vec<DataBlockId>; KIND_COUNT],
    next_session_uuid: u32,
    len: usize,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_slots: Vec::new(),
            lists: std::array::from_fn(|_| Vec::new()),
            // 0 is `SessionUuid::UNSET`.
            next_session_uuid: 1,
            len: 0,
        }
    }

    /// Number of live blocks.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn count_of_kind(&self, kind: IdKind) -> usize {
        self.lists[kind.list_index()].len()
    }

    /// Create a block of `kind` with all reference fields null.
    ///
    /// Fails once every session stamp has been handed out; stamps are never
    /// reused, even for freed blocks.
    pub fn add(&mut self, kind: IdKind, name: impl Into<String>) -> Result<DataBlockId> {
        let session_uuid = SessionUuid::new(self.next_session_uuid);
        self.next_session_uuid = self
            .next_session_uuid
            .checked_add(1)
            .ok_or(MainError::CapacityOverflow {
                what: "session uuids",
                limit: u64::from(u32::MAX),
            })?;

        let id = match self.free_slots.pop() {
            Some(id) => id,
            None => {
                let id = DataBlockId::new(self.slots.len() as u32);
                self.slots.push(None);
                id
            }
        };

        self.slots[id.index()] = Some(DataBlock::new(id, session_uuid, kind, name.into()));
        self.lists[kind.list_index()].push(id);
        self.len += 1;
        Ok(id)
    }

    /// Remove a block and free its slot for reuse.
    ///
    /// References held by other blocks are left untouched; they now point at
    /// a vacant (or, after the next `add`, a different) block. Relation indexes
    /// built earlier are stale until rebuilt.
    pub fn remove(&mut self, id: DataBlockId) -> Option<DataBlock> {
        let block = self.slots.get_mut(id.index())?.take()?;
        let list = &mut self.lists[block.kind().list_index()];
        if let Some(pos) = list.iter().position(|&listed| listed == id) {
            list.remove(pos);
        }
        self.free_slots.push(id);
        self.len -= 1;
        tracing::trace!(id = %id, kind = %block.kind(), "removed data block");
        Some(block)
    }

    pub fn get(&self, id: DataBlockId) -> Option<&DataBlock> {
        self.slots.get(id.index())?.as_ref()
    }

    pub fn get_mut(&mut self, id: DataBlockId) -> Option<&mut DataBlock> {
        self.slots.get_mut(id.index())?.as_mut()
    }

    pub fn contains(&self, id: DataBlockId) -> bool {
        self.get(id).is_some()
    }

    /// Whether `id` still holds the block that was stamped `session_uuid`.
    pub fn is_current(&self, id: DataBlockId, session_uuid: SessionUuid) -> bool {
        self.get(id)
            .map(|block| block.session_uuid() == session_uuid)
            .unwrap_or(false)
    }

    /// Blocks of one kind, in insertion order.
    pub fn iter_kind(&self, kind: IdKind) -> impl Iterator<Item = &DataBlock> + '_ {
        self.lists[kind.list_index()]
            .iter()
            .filter_map(move |&id| self.get(id))
    }

    /// Blocks of `kind_filter`, or of every kind in listing order when `None`.
    pub fn blocks(&self, kind_filter: Option<IdKind>) -> impl Iterator<Item = &DataBlock> + '_ {
        let kinds: &'static [IdKind] = match kind_filter {
            Some(kind) => std::slice::from_ref(&KIND_ORDER[kind.list_index()]),
            None => &KIND_ORDER,
        };
        kinds.iter().flat_map(move |&kind| self.iter_kind(kind))
    }

    /// Every block, kinds in listing order.
    pub fn iter(&self) -> impl Iterator<Item = &DataBlock> + '_ {
        self.blocks(None)
    }

    pub fn find_by_name(&self, kind: IdKind, name: &str) -> Option<DataBlockId> {
        self.iter_kind(kind)
            .find(|block| block.name() == name)
            .map(DataBlock::id)
    }

    fn field_named(
        &self,
        owner: DataBlockId,
        name: &str,
    ) -> Result<(FieldPath, &'static FieldDescriptor)> {
        let block = self.get(owner).ok_or(MainError::UnknownDataBlock(owner))?;
        block
            .field_by_name(name)
            .ok_or_else(|| MainError::UnknownField {
                kind: block.kind(),
                name: name.to_string(),
            })
    }

    fn check_target(
        &self,
        field: FieldRef,
        descriptor: &FieldDescriptor,
        target: Option<DataBlockId>,
    ) -> Result<()> {
        let Some(target) = target else {
            return Ok(());
        };
        let block = self.get(target).ok_or(MainError::UnknownDataBlock(target))?;
        if !descriptor.accepts(block.kind()) {
            return Err(MainError::FieldTargetKind {
                field,
                actual: block.kind(),
            });
        }
        Ok(())
    }

    /// Point the single-reference field `name` of `owner` at `target`.
    pub fn link(
        &mut self,
        owner: DataBlockId,
        name: &str,
        target: Option<DataBlockId>,
    ) -> Result<FieldRef> {
        let (path, descriptor) = self.field_named(owner, name)?;
        let field = FieldRef { owner, path };
        if !matches!(descriptor.shape, FieldShape::Single) {
            return Err(MainError::InvalidFieldPath { field });
        }
        self.set_field(field, target)?;
        Ok(field)
    }

    /// Append a new slot holding `target` to the array field `name` of `owner`.
    pub fn append(
        &mut self,
        owner: DataBlockId,
        name: &str,
        target: Option<DataBlockId>,
    ) -> Result<FieldRef> {
        let (path, descriptor) = self.field_named(owner, name)?;
        if !matches!(descriptor.shape, FieldShape::Array) {
            return Err(MainError::InvalidFieldPath {
                field: FieldRef { owner, path },
            });
        }
        self.check_target(FieldRef { owner, path }, descriptor, target)?;

        let block = self.get_mut(owner).ok_or(MainError::UnknownDataBlock(owner))?;
        let slots = block
            .array_mut(&path)
            .ok_or(MainError::InvalidFieldPath {
                field: FieldRef { owner, path },
            })?;
        let element = slots.len() as u32;
        slots.push(target);

        let steps = path.steps();
        let (last, parent) = steps
            .split_last()
            .ok_or(MainError::InvalidFieldPath {
                field: FieldRef { owner, path },
            })?;
        let path = FieldPath::from_steps(parent)
            .and_then(|parent| parent.child(last.field, element))
            .ok_or(MainError::InvalidFieldPath {
                field: FieldRef { owner, path },
            })?;
        Ok(FieldRef { owner, path })
    }

    /// Rewrite the slot addressed by `field`, returning its previous value.
    pub fn set_field(
        &mut self,
        field: FieldRef,
        target: Option<DataBlockId>,
    ) -> Result<Option<DataBlockId>> {
        let block = self
            .get(field.owner)
            .ok_or(MainError::UnknownDataBlock(field.owner))?;
        let descriptor = block
            .descriptor(&field.path)
            .ok_or(MainError::InvalidFieldPath { field })?;
        self.check_target(field, descriptor, target)?;

        let slot = self
            .get_mut(field.owner)
            .and_then(|block| block.slot_mut(&field.path))
            .ok_or(MainError::InvalidFieldPath { field })?;
        Ok(std::mem::replace(slot, target))
    }

    /// Current value of the slot addressed by `field`.
    pub fn field_value(&self, field: FieldRef) -> Option<Option<DataBlockId>> {
        self.get(field.owner)?.slot(&field.path)
    }

    /// Free every block, kind by kind in reverse listing order so users go
    /// before the blocks they use. Returns the number of blocks freed.
    pub fn teardown(&mut self) -> usize {
        let mut freed = 0;
        for kind in IdKind::ALL.iter().rev() {
            let ids = std::mem::take(&mut self.lists[kind.list_index()]);
            for id in &ids {
                if self.slots[id.index()].take().is_some() {
                    freed += 1;
                }
            }
            if !ids.is_empty() {
                tracing::trace!(kind = %kind, count = ids.len(), "freed data blocks");
            }
        }
        self.slots.clear();
        self.free_slots.clear();
        self.len = 0;
        freed
    }
}
