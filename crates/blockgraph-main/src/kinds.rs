//! Static field-descriptor tables, one per [`IdKind`].
//!
//! Every kind declares, in a fixed order, which of its fields hold references
//! to other data blocks, what they may point at, and how the reference is used.
//! Fields of sub-objects a block owns outright (an embedded node tree, a
//! scene's master collection) are declared through [`FieldShape::Embedded`]
//! with their own table.
//!
//! The walker only ever looks at these tables. Adding a kind means adding a
//! table here; nothing downstream needs per-kind code.

use crate::id::IdKind;

/// Maximum nesting of embedded tables (each level consumes one path step,
/// plus one for the leaf reference field).
pub const MAX_FIELD_DEPTH: usize = 4;

bitflags::bitflags! {
    /// How a reference field is used by its owner.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct UsageFlags: u32 {
        /// Does not count as a real user of the target.
        const WEAK = 1 << 0;
        /// Counts as a user of the target.
        const USER = 1 << 1;
        /// Ensures the target has at least one user, without adding more.
        const USER_ONE = 1 << 2;
        /// Never expected to be null once the owner is valid.
        const NEVER_NULL = 1 << 3;
        /// Never expected to point back at its owner.
        const NEVER_SELF = 1 << 4;
        /// The target is used through another block, not directly.
        const INDIRECT = 1 << 5;
        /// Field belongs to an embedded sub-object of the owner.
        const EMBEDDED = 1 << 6;
        /// Back-pointer maintained automatically from the target side.
        const LOOPBACK = 1 << 7;
        /// Only used by editors and window layout.
        const UI_ONLY = 1 << 8;
        /// Must never be rewritten through a mutable walk.
        const READ_ONLY = 1 << 9;
    }
}

/// Layout of a reference field.
#[derive(Debug, Clone, Copy)]
pub enum FieldShape {
    /// One reference slot.
    Single,
    /// A growable list of reference slots.
    Array,
    /// An owned sub-object with its own reference fields.
    Embedded(&'static [FieldDescriptor]),
}

#[derive(Debug, Clone, Copy)]
pub struct FieldDescriptor {
    pub name: &'static str,
    /// Kinds this field may point at. Empty for embedded fields.
    pub targets: &'static [IdKind],
    pub usage: UsageFlags,
    pub shape: FieldShape,
}

impl FieldDescriptor {
    pub const fn single(name: &'static str, targets: &'static [IdKind], usage: UsageFlags) -> Self {
        Self {
            name,
            targets,
            usage,
            shape: FieldShape::Single,
        }
    }

    pub const fn array(name: &'static str, targets: &'static [IdKind], usage: UsageFlags) -> Self {
        Self {
            name,
            targets,
            usage,
            shape: FieldShape::Array,
        }
    }

    pub const fn embedded(name: &'static str, fields: &'static [FieldDescriptor]) -> Self {
        Self {
            name,
            targets: &[],
            usage: UsageFlags::EMBEDDED,
            shape: FieldShape::Embedded(fields),
        }
    }

    /// Whether a block of `kind` may be stored in this field.
    pub fn accepts(&self, kind: IdKind) -> bool {
        self.targets.contains(&kind)
    }
}

const NONE: &[FieldDescriptor] = &[];

const NODE_ID_TARGETS: &[IdKind] = &[
    IdKind::Image,
    IdKind::Texture,
    IdKind::Material,
    IdKind::Object,
    IdKind::Collection,
    IdKind::NodeTree,
    IdKind::Scene,
];

const NODE_TREE: &[FieldDescriptor] = &[FieldDescriptor::array(
    "node_ids",
    NODE_ID_TARGETS,
    UsageFlags::USER,
)];

const LIBRARY: &[FieldDescriptor] = &[FieldDescriptor::single(
    "parent",
    &[IdKind::Library],
    UsageFlags::WEAK.union(UsageFlags::NEVER_SELF),
)];

const TEXTURE: &[FieldDescriptor] = &[
    FieldDescriptor::single("image", &[IdKind::Image], UsageFlags::USER),
    FieldDescriptor::embedded("nodetree", NODE_TREE),
];

const MATERIAL: &[FieldDescriptor] = &[
    FieldDescriptor::embedded("nodetree", NODE_TREE),
    FieldDescriptor::array("texpaint_images", &[IdKind::Image], UsageFlags::WEAK),
];

const MESH: &[FieldDescriptor] = &[
    FieldDescriptor::array("materials", &[IdKind::Material], UsageFlags::USER),
    FieldDescriptor::single(
        "texcomesh",
        &[IdKind::Mesh],
        UsageFlags::WEAK
            .union(UsageFlags::NEVER_SELF)
            .union(UsageFlags::INDIRECT),
    ),
];

const LIGHT: &[FieldDescriptor] = &[FieldDescriptor::embedded("nodetree", NODE_TREE)];

const CAMERA: &[FieldDescriptor] = &[
    FieldDescriptor::single("dof_object", &[IdKind::Object], UsageFlags::WEAK),
    FieldDescriptor::array("background_images", &[IdKind::Image], UsageFlags::USER),
];

const COLLECTION: &[FieldDescriptor] = &[
    FieldDescriptor::array("objects", &[IdKind::Object], UsageFlags::USER),
    FieldDescriptor::array(
        "children",
        &[IdKind::Collection],
        UsageFlags::USER.union(UsageFlags::NEVER_SELF),
    ),
];

const BRUSH: &[FieldDescriptor] = &[
    FieldDescriptor::single("texture", &[IdKind::Texture], UsageFlags::USER),
    FieldDescriptor::single("palette", &[IdKind::Palette], UsageFlags::USER),
    FieldDescriptor::single(
        "toggle_brush",
        &[IdKind::Brush],
        UsageFlags::WEAK.union(UsageFlags::NEVER_SELF),
    ),
];

const WORLD: &[FieldDescriptor] = &[FieldDescriptor::embedded("nodetree", NODE_TREE)];

const SCREEN: &[FieldDescriptor] = &[
    FieldDescriptor::array(
        "space_images",
        &[IdKind::Image],
        UsageFlags::WEAK.union(UsageFlags::UI_ONLY),
    ),
    FieldDescriptor::single(
        "view_object",
        &[IdKind::Object],
        UsageFlags::WEAK.union(UsageFlags::UI_ONLY),
    ),
];

const OBJECT: &[FieldDescriptor] = &[
    FieldDescriptor::single(
        "data",
        &[IdKind::Mesh, IdKind::Camera, IdKind::Light],
        UsageFlags::USER,
    ),
    FieldDescriptor::single(
        "parent",
        &[IdKind::Object],
        UsageFlags::WEAK.union(UsageFlags::NEVER_SELF),
    ),
    FieldDescriptor::array("materials", &[IdKind::Material], UsageFlags::USER),
    FieldDescriptor::single(
        "proxy_from",
        &[IdKind::Object],
        UsageFlags::WEAK
            .union(UsageFlags::NEVER_SELF)
            .union(UsageFlags::LOOPBACK)
            .union(UsageFlags::READ_ONLY),
    ),
];

const SCENE_COLLECTION: &[FieldDescriptor] = &[
    FieldDescriptor::array("objects", &[IdKind::Object], UsageFlags::USER),
    FieldDescriptor::array("children", &[IdKind::Collection], UsageFlags::USER),
];

const SCENE: &[FieldDescriptor] = &[
    FieldDescriptor::single("camera", &[IdKind::Object], UsageFlags::WEAK),
    FieldDescriptor::single("world", &[IdKind::World], UsageFlags::USER),
    FieldDescriptor::single(
        "set",
        &[IdKind::Scene],
        UsageFlags::WEAK.union(UsageFlags::NEVER_SELF),
    ),
    FieldDescriptor::embedded("master_collection", SCENE_COLLECTION),
];

const WORKSPACE: &[FieldDescriptor] = &[
    FieldDescriptor::array("screens", &[IdKind::Screen], UsageFlags::USER),
    FieldDescriptor::single("pin_scene", &[IdKind::Scene], UsageFlags::WEAK),
];

const WINDOW_MANAGER: &[FieldDescriptor] = &[
    FieldDescriptor::array("window_scenes", &[IdKind::Scene], UsageFlags::USER_ONE),
    FieldDescriptor::array("window_workspaces", &[IdKind::WorkSpace], UsageFlags::WEAK),
];

/// Reference-field table of `kind`, in visiting order.
pub fn fields_of(kind: IdKind) -> &'static [FieldDescriptor] {
    match kind {
        IdKind::Library => LIBRARY,
        IdKind::Action => NONE,
        IdKind::Palette => NONE,
        IdKind::NodeTree => NODE_TREE,
        IdKind::Image => NONE,
        IdKind::Texture => TEXTURE,
        IdKind::Material => MATERIAL,
        IdKind::Mesh => MESH,
        IdKind::Light => LIGHT,
        IdKind::Camera => CAMERA,
        IdKind::Collection => COLLECTION,
        IdKind::Brush => BRUSH,
        IdKind::World => WORLD,
        IdKind::Screen => SCREEN,
        IdKind::Object => OBJECT,
        IdKind::Scene => SCENE,
        IdKind::WorkSpace => WORKSPACE,
        IdKind::WindowManager => WINDOW_MANAGER,
    }
}

/// Path depth needed to address the deepest reference slot of a table.
pub fn table_depth(fields: &[FieldDescriptor]) -> usize {
    fields
        .iter()
        .map(|field| match field.shape {
            FieldShape::Single | FieldShape::Array => 1,
            FieldShape::Embedded(inner) => 1 + table_depth(inner),
        })
        .max()
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_table_fits_in_a_field_path() {
        for kind in IdKind::ALL {
            assert!(
                table_depth(fields_of(kind)) <= MAX_FIELD_DEPTH,
                "{kind} nests deeper than MAX_FIELD_DEPTH"
            );
        }
    }

    #[test]
    fn reference_fields_declare_targets() {
        fn check(fields: &[FieldDescriptor]) {
            for field in fields {
                match field.shape {
                    FieldShape::Embedded(inner) => {
                        assert!(field.targets.is_empty());
                        check(inner);
                    }
                    _ => assert!(!field.targets.is_empty(), "{} has no targets", field.name),
                }
            }
        }
        for kind in IdKind::ALL {
            check(fields_of(kind));
        }
    }

    #[test]
    fn object_data_accepts_obdata_kinds_only() {
        let data = &fields_of(IdKind::Object)[0];
        assert_eq!(data.name, "data");
        assert!(data.accepts(IdKind::Mesh));
        assert!(data.accepts(IdKind::Camera));
        assert!(!data.accepts(IdKind::Scene));
    }
}
