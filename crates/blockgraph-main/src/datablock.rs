//! Data blocks and index-based handles to their reference fields.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::id::{DataBlockId, IdKind, SessionUuid};
use crate::kinds::{fields_of, FieldDescriptor, FieldShape, MAX_FIELD_DEPTH};

/// Current value of one declared reference field.
///
/// The layout of `DataBlock::fields` mirrors the kind's descriptor table entry
/// for entry, so the `n`-th value always belongs to the `n`-th descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldValue {
    Single(Option<DataBlockId>),
    Array(Vec<Option<DataBlockId>>),
    Embedded(Vec<FieldValue>),
}

impl FieldValue {
    /// All-null values laid out for `fields`. Arrays start empty.
    pub fn layout(fields: &[FieldDescriptor]) -> Vec<FieldValue> {
        fields
            .iter()
            .map(|field| match field.shape {
                FieldShape::Single => FieldValue::Single(None),
                FieldShape::Array => FieldValue::Array(Vec::new()),
                FieldShape::Embedded(inner) => FieldValue::Embedded(FieldValue::layout(inner)),
            })
            .collect()
    }
}

/// One step of a [`FieldPath`]: which field of the current table, and which
/// element when that field is an array (always 0 otherwise).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct FieldStep {
    pub field: u16,
    pub element: u32,
}

/// Location of a reference slot inside its owner, as a short inline list of
/// steps through the owner's (possibly embedded) field tables.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct FieldPath {
    steps: [FieldStep; MAX_FIELD_DEPTH],
    len: u8,
}

impl FieldPath {
    pub const fn root() -> Self {
        Self {
            steps: [FieldStep {
                field: 0,
                element: 0,
            }; MAX_FIELD_DEPTH],
            len: 0,
        }
    }

    /// Path extended by one step, or `None` once `MAX_FIELD_DEPTH` is reached.
    pub fn child(&self, field: u16, element: u32) -> Option<FieldPath> {
        let len = self.len as usize;
        if len == MAX_FIELD_DEPTH {
            return None;
        }
        let mut out = *self;
        out.steps[len] = FieldStep { field, element };
        out.len += 1;
        Some(out)
    }

    pub fn from_steps(steps: &[FieldStep]) -> Option<FieldPath> {
        steps
            .iter()
            .try_fold(FieldPath::root(), |path, step| path.child(step.field, step.element))
    }

    pub fn steps(&self) -> &[FieldStep] {
        &self.steps[..self.len as usize]
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Human-readable form using the field names of `kind`, e.g.
    /// `master_collection.objects[2]`.
    pub fn describe(&self, kind: IdKind) -> String {
        let mut out = String::new();
        let mut table = fields_of(kind);
        for step in self.steps() {
            let Some(field) = table.get(step.field as usize) else {
                out.push('?');
                break;
            };
            if !out.is_empty() {
                out.push('.');
            }
            out.push_str(field.name);
            match field.shape {
                FieldShape::Single => {}
                FieldShape::Array => out.push_str(&format!("[{}]", step.element)),
                FieldShape::Embedded(inner) => table = inner,
            }
        }
        out
    }
}

impl fmt::Debug for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FieldPath({self})")
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, step) in self.steps().iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{}[{}]", step.field, step.element)?;
        }
        Ok(())
    }
}

/// Handle to one reference slot of one data block.
///
/// Edges carry this instead of an address so consumers can find the field
/// again later (to rewrite or clear it) through the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldRef {
    pub owner: DataBlockId,
    pub path: FieldPath,
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.owner, self.path)
    }
}

/// Descriptor of the slot addressed by `steps` in `table`.
pub(crate) fn descriptor_at(
    table: &'static [FieldDescriptor],
    steps: &[FieldStep],
) -> Option<&'static FieldDescriptor> {
    let (first, rest) = steps.split_first()?;
    let field = table.get(first.field as usize)?;
    match field.shape {
        FieldShape::Single | FieldShape::Array if rest.is_empty() => Some(field),
        FieldShape::Embedded(inner) => descriptor_at(inner, rest),
        _ => None,
    }
}

fn slot_in<'a>(values: &'a [FieldValue], steps: &[FieldStep]) -> Option<&'a Option<DataBlockId>> {
    let (first, rest) = steps.split_first()?;
    match values.get(first.field as usize)? {
        FieldValue::Single(slot) if rest.is_empty() && first.element == 0 => Some(slot),
        FieldValue::Array(slots) if rest.is_empty() => slots.get(first.element as usize),
        FieldValue::Embedded(inner) if first.element == 0 => slot_in(inner, rest),
        _ => None,
    }
}

fn slot_in_mut<'a>(
    values: &'a mut [FieldValue],
    steps: &[FieldStep],
) -> Option<&'a mut Option<DataBlockId>> {
    let (first, rest) = steps.split_first()?;
    match values.get_mut(first.field as usize)? {
        FieldValue::Single(slot) if rest.is_empty() && first.element == 0 => Some(slot),
        FieldValue::Array(slots) if rest.is_empty() => slots.get_mut(first.element as usize),
        FieldValue::Embedded(inner) if first.element == 0 => slot_in_mut(inner, rest),
        _ => None,
    }
}

fn array_in_mut<'a>(
    values: &'a mut [FieldValue],
    steps: &[FieldStep],
) -> Option<&'a mut Vec<Option<DataBlockId>>> {
    let (first, rest) = steps.split_first()?;
    match values.get_mut(first.field as usize)? {
        FieldValue::Array(slots) if rest.is_empty() => Some(slots),
        FieldValue::Embedded(inner) if first.element == 0 => array_in_mut(inner, rest),
        _ => None,
    }
}

/// A typed, identity-bearing node of the graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataBlock {
    id: DataBlockId,
    session_uuid: SessionUuid,
    kind: IdKind,
    name: String,
    fields: Vec<FieldValue>,
    /// Kind-specific data this crate never looks into.
    pub payload: serde_json::Value,
}

impl DataBlock {
    pub(crate) fn new(id: DataBlockId, session_uuid: SessionUuid, kind: IdKind, name: String) -> Self {
        Self {
            id,
            session_uuid,
            kind,
            name,
            fields: FieldValue::layout(fields_of(kind)),
            payload: serde_json::Value::Null,
        }
    }

    pub fn id(&self) -> DataBlockId {
        self.id
    }

    pub fn session_uuid(&self) -> SessionUuid {
        self.session_uuid
    }

    pub fn kind(&self) -> IdKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[FieldValue] {
        &self.fields
    }

    pub(crate) fn fields_mut(&mut self) -> &mut [FieldValue] {
        &mut self.fields
    }

    /// Current value of the slot at `path`, or `None` if `path` does not
    /// address a slot of this block.
    pub fn slot(&self, path: &FieldPath) -> Option<Option<DataBlockId>> {
        slot_in(&self.fields, path.steps()).copied()
    }

    pub(crate) fn slot_mut(&mut self, path: &FieldPath) -> Option<&mut Option<DataBlockId>> {
        slot_in_mut(&mut self.fields, path.steps())
    }

    pub(crate) fn array_mut(&mut self, path: &FieldPath) -> Option<&mut Vec<Option<DataBlockId>>> {
        array_in_mut(&mut self.fields, path.steps())
    }

    /// Descriptor of the slot at `path`.
    pub fn descriptor(&self, path: &FieldPath) -> Option<&'static FieldDescriptor> {
        descriptor_at(fields_of(self.kind), path.steps())
    }

    /// Resolve a dotted field name (`"data"`, `"nodetree.node_ids"`) to the
    /// path of that field and its descriptor.
    ///
    /// The returned path addresses the field itself; for arrays, the last
    /// step's element is 0 and callers pick the element they want.
    pub fn field_by_name(&self, name: &str) -> Option<(FieldPath, &'static FieldDescriptor)> {
        let mut table = fields_of(self.kind);
        let mut path = FieldPath::root();
        let mut parts = name.split('.').peekable();
        while let Some(part) = parts.next() {
            let index = table.iter().position(|field| field.name == part)?;
            let field = &table[index];
            path = path.child(u16::try_from(index).ok()?, 0)?;
            match field.shape {
                FieldShape::Embedded(inner) if parts.peek().is_some() => table = inner,
                FieldShape::Single | FieldShape::Array if parts.peek().is_none() => {
                    return Some((path, field));
                }
                _ => return None,
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(kind: IdKind) -> DataBlock {
        DataBlock::new(DataBlockId::new(0), SessionUuid::new(1), kind, "test".to_string())
    }

    #[test]
    fn layout_mirrors_descriptor_table() {
        let scene = block(IdKind::Scene);
        assert_eq!(scene.fields().len(), fields_of(IdKind::Scene).len());
        assert!(matches!(scene.fields()[0], FieldValue::Single(None)));
        assert!(matches!(scene.fields()[3], FieldValue::Embedded(ref inner) if inner.len() == 2));
    }

    #[test]
    fn field_by_name_walks_into_embedded_tables() {
        let scene = block(IdKind::Scene);
        let (path, field) = scene
            .field_by_name("master_collection.objects")
            .expect("nested field");
        assert_eq!(field.name, "objects");
        assert_eq!(path.len(), 2);
        assert_eq!(path.describe(IdKind::Scene), "master_collection.objects[0]");

        assert!(scene.field_by_name("master_collection").is_none());
        assert!(scene.field_by_name("camera.objects").is_none());
        assert!(scene.field_by_name("nope").is_none());
    }

    #[test]
    fn slot_addresses_only_existing_elements() {
        let mut object = block(IdKind::Object);
        let (materials, _) = object.field_by_name("materials").expect("materials");
        assert_eq!(object.slot(&materials), None);

        object
            .array_mut(&materials)
            .expect("array")
            .push(Some(DataBlockId::new(4)));
        assert_eq!(object.slot(&materials), Some(Some(DataBlockId::new(4))));

        let (data, _) = object.field_by_name("data").expect("data");
        assert_eq!(object.slot(&data), Some(None));
        let bad = FieldPath::root().child(0, 3).expect("step");
        assert_eq!(object.slot(&bad), None);
    }

    #[test]
    fn path_depth_is_bounded() {
        let mut path = FieldPath::root();
        for i in 0..MAX_FIELD_DEPTH {
            path = path.child(i as u16, 0).expect("within depth");
        }
        assert!(path.child(0, 0).is_none());
        assert_eq!(FieldPath::from_steps(path.steps()), Some(path));
    }
}
