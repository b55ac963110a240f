//! Named collection of objects.

use std::collections::btree_map;
use std::collections::BTreeMap;
use std::mem::size_of;
use std::sync::OnceLock;

use crate::core::object::{self, object_accessors};
use crate::core::{
    CopyContext, LoadContext, MemoryAccumulator, Object, ObjectPtr, ObjectType, SaveContext,
    TypeDescription, TypeId, OBJECT,
};
use crate::hash::MurmurHash;
use crate::util::{InternedString, Result};

pub static COMPOUND_OBJECT: TypeDescription =
    TypeDescription::new(TypeId::COMPOUND_OBJECT, "CompoundObject", Some(&OBJECT));

const IO_VERSION: u32 = 0;
const MEMBERS_ENTRY: &str = "members";

/// Map from name to object. Members are never null.
#[derive(Debug, Default)]
pub struct CompoundObject {
    members: BTreeMap<InternedString, ObjectPtr>,
}

impl CompoundObject {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide shared empty instance.
    pub fn default_instance() -> ObjectPtr {
        static INSTANCE: OnceLock<ObjectPtr> = OnceLock::new();
        INSTANCE.get_or_init(|| ObjectPtr::new(Self::new())).clone()
    }

    pub fn members(&self) -> &BTreeMap<InternedString, ObjectPtr> {
        &self.members
    }

    pub fn members_mut(&mut self) -> &mut BTreeMap<InternedString, ObjectPtr> {
        &mut self.members
    }

    pub fn get(&self, name: &str) -> Option<&ObjectPtr> {
        self.members.get(name)
    }

    /// Insert or replace a member, returning the previous one.
    pub fn insert(&mut self, name: impl Into<InternedString>, value: ObjectPtr) -> Option<ObjectPtr> {
        self.members.insert(name.into(), value)
    }

    pub fn remove(&mut self, name: &str) -> Option<ObjectPtr> {
        self.members.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.members.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn clear(&mut self) {
        self.members.clear();
    }

    pub fn iter(&self) -> btree_map::Iter<'_, InternedString, ObjectPtr> {
        self.members.iter()
    }
}

impl<'a> IntoIterator for &'a CompoundObject {
    type Item = (&'a InternedString, &'a ObjectPtr);
    type IntoIter = btree_map::Iter<'a, InternedString, ObjectPtr>;

    fn into_iter(self) -> Self::IntoIter {
        self.members.iter()
    }
}

impl<K: Into<InternedString>> FromIterator<(K, ObjectPtr)> for CompoundObject {
    fn from_iter<I: IntoIterator<Item = (K, ObjectPtr)>>(iter: I) -> Self {
        Self {
            members: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// Equality of two member maps, compared by value.
pub(crate) fn members_equal(a: &BTreeMap<InternedString, ObjectPtr>, b: &BTreeMap<InternedString, ObjectPtr>) -> bool {
    a.len() == b.len()
        && a.iter()
            .all(|(k, v)| b.get(k).is_some_and(|o| v.is_equal_to(o)))
}

/// Hash of a member map in key order.
pub(crate) fn hash_members(members: &BTreeMap<InternedString, ObjectPtr>, h: &mut MurmurHash) {
    for (name, value) in members {
        h.append(name);
        value.read().hash(h);
    }
}

impl Object for CompoundObject {
    object_accessors!(COMPOUND_OBJECT);

    fn copy_from(&mut self, other: &dyn Object, ctx: &mut CopyContext) -> Result<()> {
        let other = object::expect_type::<Self>(&COMPOUND_OBJECT, other)?;
        self.members.clear();
        for (name, value) in &other.members {
            self.members.insert(name.clone(), ctx.copy(value)?);
        }
        Ok(())
    }

    fn is_equal_to(&self, other: &dyn Object) -> bool {
        object::is_equal_to(self, other)
            && other
                .downcast_ref::<Self>()
                .is_some_and(|o| members_equal(&self.members, &o.members))
    }

    fn hash(&self, h: &mut MurmurHash) {
        object::hash(self, h);
        hash_members(&self.members, h);
    }

    fn memory_usage(&self, acc: &mut MemoryAccumulator) {
        object::memory_usage(acc);
        acc.accumulate(self.members.len() * (size_of::<InternedString>() + size_of::<ObjectPtr>()));
        for value in self.members.values() {
            acc.accumulate_object(value);
        }
    }

    fn save(&self, ctx: &mut SaveContext<'_>) -> Result<()> {
        let container = ctx.container(COMPOUND_OBJECT.name, IO_VERSION)?;
        let members = container.create_subdirectory(MEMBERS_ENTRY)?;
        for (name, value) in &self.members {
            ctx.save(value, &members, name)?;
        }
        Ok(())
    }

    fn load(&mut self, ctx: &mut LoadContext<'_>) -> Result<()> {
        let mut version = IO_VERSION;
        let container = ctx.container(COMPOUND_OBJECT.name, &mut version)?;
        let members = container.subdirectory(MEMBERS_ENTRY)?;
        self.members.clear();
        for name in members.entry_ids() {
            let value = ctx.load(&members, &name)?;
            self.members.insert(name, value);
        }
        Ok(())
    }
}

impl ObjectType for CompoundObject {
    fn static_description() -> &'static TypeDescription {
        &COMPOUND_OBJECT
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{FloatData, IntData, StringData};
    use crate::io::MemoryIndexedIo;

    fn sample() -> CompoundObject {
        let mut c = CompoundObject::new();
        c.insert("i", ObjectPtr::new(IntData::new(1)));
        c.insert("f", ObjectPtr::new(FloatData::new(2.0)));
        c.insert("s", ObjectPtr::new(StringData::new("three".into())));
        c
    }

    #[test]
    fn test_hash_ignores_insertion_order() {
        let a = ObjectPtr::new(sample());
        let b: CompoundObject = [
            ("s", ObjectPtr::new(StringData::new("three".into()))),
            ("f", ObjectPtr::new(FloatData::new(2.0))),
            ("i", ObjectPtr::new(IntData::new(1))),
        ]
        .into_iter()
        .collect();
        let b = ObjectPtr::new(b);
        assert_eq!(a.hash(), b.hash());
        assert!(a.is_equal_to(&b));
    }

    #[test]
    fn test_member_change_changes_hash() {
        let a = ObjectPtr::new(sample());
        let mut changed = sample();
        changed.insert("i", ObjectPtr::new(IntData::new(2)));
        let b = ObjectPtr::new(changed);
        assert_ne!(a.hash(), b.hash());
        assert!(!a.is_equal_to(&b));
    }

    #[test]
    fn test_key_contributes_to_hash() {
        let mut a = CompoundObject::new();
        a.insert("x", ObjectPtr::new(IntData::new(1)));
        let mut b = CompoundObject::new();
        b.insert("y", ObjectPtr::new(IntData::new(1)));
        assert_ne!(ObjectPtr::new(a).hash(), ObjectPtr::new(b).hash());
    }

    #[test]
    fn test_round_trip() {
        let src = ObjectPtr::new(sample());
        let io = MemoryIndexedIo::create();
        src.save(&io, "c").unwrap();
        assert!(ObjectPtr::load(&io, "c").unwrap().is_equal_to(&src));
    }

    #[test]
    fn test_default_instance_is_shared() {
        let a = CompoundObject::default_instance();
        let b = CompoundObject::default_instance();
        assert!(a.ptr_eq(&b));
    }

    #[test]
    fn test_accessors() {
        let mut c = sample();
        assert_eq!(c.len(), 3);
        assert!(c.contains("f"));
        assert!(c.remove("f").is_some());
        assert!(c.get("f").is_none());
        assert_eq!(c.iter().map(|(k, _)| k.as_str()).collect::<Vec<_>>(), ["i", "s"]);
        c.clear();
        assert!(c.is_empty());
    }
}
