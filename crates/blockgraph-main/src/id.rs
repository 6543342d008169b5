//! Identities for data blocks.
//!
//! Two different notions of "who is this block" coexist:
//!
//! - [`DataBlockId`]: the registry slot a block lives in. This is what reference
//!   fields hold and what the relation index is keyed by. Slots are recycled
//!   once a block is removed, exactly like a heap address can be handed out
//!   again after a free.
//! - [`SessionUuid`]: a stamp assigned once per block for the lifetime of the
//!   session and never reused. Edge records carry the stamp of the block they
//!   point to so consumers can tell a recycled slot from the original block.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Registry slot handle of a data block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct DataBlockId(u32);

impl DataBlockId {
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for DataBlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Session-unique stamp of a data block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct SessionUuid(u32);

impl SessionUuid {
    /// Stamp recorded for reference fields that currently point at nothing.
    pub const UNSET: SessionUuid = SessionUuid(0);

    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    pub const fn is_unset(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for SessionUuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unset() {
            f.write_str("uuid:unset")
        } else {
            write!(f, "uuid:{}", self.0)
        }
    }
}

/// Closed set of data-block kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum IdKind {
    Library,
    Action,
    Palette,
    NodeTree,
    Image,
    Texture,
    Material,
    Mesh,
    Light,
    Camera,
    Collection,
    Brush,
    World,
    Screen,
    Object,
    Scene,
    WorkSpace,
    WindowManager,
}

/// Number of kinds in [`IdKind::ALL`].
pub const KIND_COUNT: usize = 18;

impl IdKind {
    /// Listing order of the registry.
    ///
    /// Kinds that are referenced by many others come first: libraries can be
    /// used by anything, node trees and images by materials and textures, and
    /// so on up to the window manager. Teardown walks this list backwards so
    /// users are always freed before the blocks they use.
    pub const ALL: [IdKind; KIND_COUNT] = [
        IdKind::Library,
        IdKind::Action,
        IdKind::Palette,
        IdKind::NodeTree,
        IdKind::Image,
        IdKind::Texture,
        IdKind::Material,
        IdKind::Mesh,
        IdKind::Light,
        IdKind::Camera,
        IdKind::Collection,
        IdKind::Brush,
        IdKind::World,
        IdKind::Screen,
        IdKind::Object,
        IdKind::Scene,
        IdKind::WorkSpace,
        IdKind::WindowManager,
    ];

    /// Position of this kind in [`IdKind::ALL`].
    pub const fn list_index(self) -> usize {
        self as usize
    }

    /// Two-letter code used as a name prefix.
    pub const fn code(self) -> &'static str {
        match self {
            IdKind::Library => "LI",
            IdKind::Action => "AC",
            IdKind::Palette => "PL",
            IdKind::NodeTree => "NT",
            IdKind::Image => "IM",
            IdKind::Texture => "TE",
            IdKind::Material => "MA",
            IdKind::Mesh => "ME",
            IdKind::Light => "LA",
            IdKind::Camera => "CA",
            IdKind::Collection => "GR",
            IdKind::Brush => "BR",
            IdKind::World => "WO",
            IdKind::Screen => "SR",
            IdKind::Object => "OB",
            IdKind::Scene => "SC",
            IdKind::WorkSpace => "WS",
            IdKind::WindowManager => "WM",
        }
    }

    pub fn from_code(code: &str) -> Option<IdKind> {
        IdKind::ALL.iter().copied().find(|kind| kind.code() == code)
    }
}

impl fmt::Display for IdKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}
