//! Ordered list of objects with optional holes.

use std::mem::size_of;

use crate::core::object::{self, object_accessors};
use crate::core::{
    CopyContext, LoadContext, MemoryAccumulator, Object, ObjectPtr, ObjectType, SaveContext,
    TypeDescription, TypeId, OBJECT,
};
use crate::hash::MurmurHash;
use crate::io::IndexedIoPtr;
use crate::util::{Error, Result};

pub static OBJECT_VECTOR: TypeDescription =
    TypeDescription::new(TypeId::OBJECT_VECTOR, "ObjectVector", Some(&OBJECT));

const IO_VERSION: u32 = 0;
const SIZE_ENTRY: &str = "size";
const MEMBERS_ENTRY: &str = "members";

/// Vector of objects. `None` entries are holes.
#[derive(Debug, Default)]
pub struct ObjectVector {
    members: Vec<Option<ObjectPtr>>,
}

impl ObjectVector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_len(len: usize) -> Self {
        Self {
            members: vec![None; len],
        }
    }

    pub fn members(&self) -> &[Option<ObjectPtr>] {
        &self.members
    }

    pub fn members_mut(&mut self) -> &mut Vec<Option<ObjectPtr>> {
        &mut self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn push(&mut self, value: Option<ObjectPtr>) {
        self.members.push(value);
    }

    pub fn get(&self, index: usize) -> Result<Option<&ObjectPtr>> {
        self.members
            .get(index)
            .map(Option::as_ref)
            .ok_or(Error::IndexOutOfRange {
                index,
                size: self.members.len(),
            })
    }

    /// Member at `index`, failing on holes.
    pub fn get_required(&self, index: usize) -> Result<&ObjectPtr> {
        self.get(index)?
            .ok_or_else(|| Error::NullChild(format!("ObjectVector[{}]", index)))
    }

    pub fn set(&mut self, index: usize, value: Option<ObjectPtr>) -> Result<()> {
        let size = self.members.len();
        let slot = self
            .members
            .get_mut(index)
            .ok_or(Error::IndexOutOfRange { index, size })?;
        *slot = value;
        Ok(())
    }

    pub fn resize(&mut self, len: usize) {
        self.members.resize(len, None);
    }
}

// ============================================================================
// Slot helpers shared with ObjectMatrix
// ============================================================================

pub(crate) fn copy_slots(slots: &[Option<ObjectPtr>], ctx: &mut CopyContext) -> Result<Vec<Option<ObjectPtr>>> {
    slots
        .iter()
        .map(|slot| slot.as_ref().map(|p| ctx.copy(p)).transpose())
        .collect()
}

pub(crate) fn slots_equal(a: &[Option<ObjectPtr>], b: &[Option<ObjectPtr>]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| object::option_ptr_eq(x, y))
}

pub(crate) fn hash_slots(slots: &[Option<ObjectPtr>], h: &mut MurmurHash) {
    for slot in slots {
        match slot {
            Some(p) => {
                h.append(&1u8);
                p.read().hash(h);
            }
            None => {
                h.append(&0u8);
            }
        }
    }
}

pub(crate) fn slots_memory(slots: &[Option<ObjectPtr>], acc: &mut MemoryAccumulator) {
    acc.accumulate(slots.len() * size_of::<Option<ObjectPtr>>());
    for p in slots.iter().flatten() {
        acc.accumulate_object(p);
    }
}

pub(crate) fn save_slots(slots: &[Option<ObjectPtr>], ctx: &mut SaveContext<'_>, container: &IndexedIoPtr) -> Result<()> {
    let members = container.create_subdirectory(MEMBERS_ENTRY)?;
    for (i, slot) in slots.iter().enumerate() {
        if let Some(p) = slot {
            ctx.save(p, &members, &i.to_string())?;
        }
    }
    Ok(())
}

pub(crate) fn load_slots(len: usize, ctx: &mut LoadContext<'_>, container: &IndexedIoPtr) -> Result<Vec<Option<ObjectPtr>>> {
    let mut slots = vec![None; len];
    let members = container.subdirectory(MEMBERS_ENTRY)?;
    for name in members.entry_ids() {
        let index: usize = name
            .parse()
            .map_err(|_| Error::invalid(format!("member name {} is not an index", name)))?;
        if index >= len {
            return Err(Error::IndexOutOfRange { index, size: len });
        }
        slots[index] = Some(ctx.load(&members, &name)?);
    }
    Ok(slots)
}

impl Object for ObjectVector {
    object_accessors!(OBJECT_VECTOR);

    fn copy_from(&mut self, other: &dyn Object, ctx: &mut CopyContext) -> Result<()> {
        let other = object::expect_type::<Self>(&OBJECT_VECTOR, other)?;
        self.members = copy_slots(&other.members, ctx)?;
        Ok(())
    }

    fn is_equal_to(&self, other: &dyn Object) -> bool {
        object::is_equal_to(self, other)
            && other
                .downcast_ref::<Self>()
                .is_some_and(|o| slots_equal(&self.members, &o.members))
    }

    fn hash(&self, h: &mut MurmurHash) {
        object::hash(self, h);
        h.append(&self.members.len());
        hash_slots(&self.members, h);
    }

    fn memory_usage(&self, acc: &mut MemoryAccumulator) {
        object::memory_usage(acc);
        slots_memory(&self.members, acc);
    }

    fn save(&self, ctx: &mut SaveContext<'_>) -> Result<()> {
        let container = ctx.container(OBJECT_VECTOR.name, IO_VERSION)?;
        container.write_value(SIZE_ENTRY, self.members.len() as u32)?;
        save_slots(&self.members, ctx, &container)
    }

    fn load(&mut self, ctx: &mut LoadContext<'_>) -> Result<()> {
        let mut version = IO_VERSION;
        let container = ctx.container(OBJECT_VECTOR.name, &mut version)?;
        let len = container.read_u32(SIZE_ENTRY)? as usize;
        self.members = load_slots(len, ctx, &container)?;
        Ok(())
    }
}

impl ObjectType for ObjectVector {
    fn static_description() -> &'static TypeDescription {
        &OBJECT_VECTOR
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::IntData;
    use crate::io::MemoryIndexedIo;

    #[test]
    fn test_holes_round_trip() {
        let shared = ObjectPtr::new(IntData::new(7));
        let mut v = ObjectVector::with_len(4);
        v.set(0, Some(shared.clone())).unwrap();
        v.set(3, Some(shared)).unwrap();
        let src = ObjectPtr::new(v);

        let io = MemoryIndexedIo::create();
        src.save(&io, "v").unwrap();
        let loaded = ObjectPtr::load(&io, "v").unwrap();
        assert!(loaded.is_equal_to(&src));

        let v = loaded.downcast_ref::<ObjectVector>().unwrap();
        assert_eq!(v.len(), 4);
        assert!(v.get(1).unwrap().is_none());
        assert!(v.get(0).unwrap().unwrap().ptr_eq(v.get(3).unwrap().unwrap()));
    }

    #[test]
    fn test_bounds() {
        let mut v = ObjectVector::with_len(1);
        assert!(matches!(v.get(1), Err(Error::IndexOutOfRange { index: 1, size: 1 })));
        assert!(matches!(v.set(5, None), Err(Error::IndexOutOfRange { .. })));
        assert!(matches!(v.get_required(0), Err(Error::NullChild(_))));
    }

    #[test]
    fn test_hole_position_matters() {
        let one = || Some(ObjectPtr::new(IntData::new(1)));
        let a = ObjectVector {
            members: vec![one(), None],
        };
        let b = ObjectVector {
            members: vec![None, one()],
        };
        assert_ne!(ObjectPtr::new(a).hash(), ObjectPtr::new(b).hash());
    }
}
