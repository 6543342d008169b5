//! Generic traversal of a data block's reference fields.
//!
//! The walker is the only place that interprets [`crate::kinds`] tables. It
//! reports every declared reference slot exactly once per walk, null slots
//! included, in table order (array elements in index order, embedded tables
//! depth-first at the position of their field).

use crate::datablock::{DataBlock, FieldPath, FieldRef, FieldValue};
use crate::id::{DataBlockId, SessionUuid};
use crate::kinds::{fields_of, FieldDescriptor, FieldShape, UsageFlags};

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct WalkOptions: u32 {
        /// Also visit fields flagged [`UsageFlags::UI_ONLY`].
        const INCLUDE_UI = 1 << 0;
        /// Let the mutable walk hand out fields flagged [`UsageFlags::READ_ONLY`].
        const INCLUDE_READ_ONLY = 1 << 1;
    }
}

/// Returned by walk callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkControl {
    Continue,
    /// Stop visiting further fields of this block.
    Stop,
}

/// One reference slot, as seen by a read-only walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdLink {
    pub owner: DataBlockId,
    pub owner_uuid: SessionUuid,
    pub field: FieldRef,
    pub target: Option<DataBlockId>,
    pub usage: UsageFlags,
}

/// One reference slot, as seen by a mutable walk.
#[derive(Debug)]
pub struct IdLinkMut<'a> {
    pub owner: DataBlockId,
    pub owner_uuid: SessionUuid,
    pub field: FieldRef,
    pub target: &'a mut Option<DataBlockId>,
    pub usage: UsageFlags,
}

fn child_path(parent: &FieldPath, index: usize, element: usize) -> FieldPath {
    // Tables are checked against MAX_FIELD_DEPTH in `kinds`.
    parent
        .child(index as u16, element as u32)
        .expect("field tables nest within MAX_FIELD_DEPTH")
}

fn skip(usage: UsageFlags, options: WalkOptions) -> bool {
    usage.contains(UsageFlags::UI_ONLY) && !options.contains(WalkOptions::INCLUDE_UI)
}

struct Owner {
    id: DataBlockId,
    uuid: SessionUuid,
}

fn walk_table<F>(
    owner: &Owner,
    table: &'static [FieldDescriptor],
    values: &[FieldValue],
    parent: FieldPath,
    inherited: UsageFlags,
    options: WalkOptions,
    callback: &mut F,
) -> WalkControl
where
    F: FnMut(&IdLink) -> WalkControl,
{
    for (index, (descriptor, value)) in table.iter().zip(values).enumerate() {
        let usage = descriptor.usage | inherited;
        if skip(usage, options) {
            continue;
        }

        let link = |element: usize, target: Option<DataBlockId>| IdLink {
            owner: owner.id,
            owner_uuid: owner.uuid,
            field: FieldRef {
                owner: owner.id,
                path: child_path(&parent, index, element),
            },
            target,
            usage,
        };

        let control = match (descriptor.shape, value) {
            (FieldShape::Single, FieldValue::Single(target)) => callback(&link(0, *target)),
            (FieldShape::Array, FieldValue::Array(slots)) => {
                let mut control = WalkControl::Continue;
                for (element, target) in slots.iter().enumerate() {
                    control = callback(&link(element, *target));
                    if control == WalkControl::Stop {
                        break;
                    }
                }
                control
            }
            (FieldShape::Embedded(inner), FieldValue::Embedded(inner_values)) => walk_table(
                owner,
                inner,
                inner_values,
                child_path(&parent, index, 0),
                usage,
                options,
                callback,
            ),
            _ => unreachable!("field layout diverged from its descriptor table"),
        };

        if control == WalkControl::Stop {
            return WalkControl::Stop;
        }
    }
    WalkControl::Continue
}

fn walk_table_mut<F>(
    owner: &Owner,
    table: &'static [FieldDescriptor],
    values: &mut [FieldValue],
    parent: FieldPath,
    inherited: UsageFlags,
    options: WalkOptions,
    callback: &mut F,
) -> WalkControl
where
    F: FnMut(IdLinkMut<'_>) -> WalkControl,
{
    for (index, (descriptor, value)) in table.iter().zip(values.iter_mut()).enumerate() {
        let usage = descriptor.usage | inherited;
        if skip(usage, options) {
            continue;
        }
        if usage.contains(UsageFlags::READ_ONLY) && !options.contains(WalkOptions::INCLUDE_READ_ONLY)
        {
            continue;
        }

        let field = |element: usize| FieldRef {
            owner: owner.id,
            path: child_path(&parent, index, element),
        };

        let control = match (descriptor.shape, value) {
            (FieldShape::Single, FieldValue::Single(target)) => callback(IdLinkMut {
                owner: owner.id,
                owner_uuid: owner.uuid,
                field: field(0),
                target,
                usage,
            }),
            (FieldShape::Array, FieldValue::Array(slots)) => {
                let mut control = WalkControl::Continue;
                for (element, target) in slots.iter_mut().enumerate() {
                    control = callback(IdLinkMut {
                        owner: owner.id,
                        owner_uuid: owner.uuid,
                        field: field(element),
                        target,
                        usage,
                    });
                    if control == WalkControl::Stop {
                        break;
                    }
                }
                control
            }
            (FieldShape::Embedded(inner), FieldValue::Embedded(inner_values)) => walk_table_mut(
                owner,
                inner,
                inner_values,
                child_path(&parent, index, 0),
                usage,
                options,
                callback,
            ),
            _ => unreachable!("field layout diverged from its descriptor table"),
        };

        if control == WalkControl::Stop {
            return WalkControl::Stop;
        }
    }
    WalkControl::Continue
}

/// Report every reference slot of `block` to `callback`, null slots included.
pub fn foreach_id_link<F>(block: &DataBlock, options: WalkOptions, mut callback: F) -> WalkControl
where
    F: FnMut(&IdLink) -> WalkControl,
{
    let owner = Owner {
        id: block.id(),
        uuid: block.session_uuid(),
    };
    walk_table(
        &owner,
        fields_of(block.kind()),
        block.fields(),
        FieldPath::root(),
        UsageFlags::empty(),
        options,
        &mut callback,
    )
}

/// Like [`foreach_id_link`], but lets `callback` rewrite each slot in place.
///
/// Fields flagged [`UsageFlags::READ_ONLY`] are skipped unless
/// [`WalkOptions::INCLUDE_READ_ONLY`] is set.
pub fn foreach_id_link_mut<F>(
    block: &mut DataBlock,
    options: WalkOptions,
    mut callback: F,
) -> WalkControl
where
    F: FnMut(IdLinkMut<'_>) -> WalkControl,
{
    let owner = Owner {
        id: block.id(),
        uuid: block.session_uuid(),
    };
    let table = fields_of(block.kind());
    walk_table_mut(
        &owner,
        table,
        block.fields_mut(),
        FieldPath::root(),
        UsageFlags::empty(),
        options,
        &mut callback,
    )
}
