//! The polymorphic object trait and its shared handle.

use std::any::Any;
use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::{
    MappedRwLockReadGuard, MappedRwLockWriteGuard, RwLock, RwLockReadGuard, RwLockWriteGuard,
};

use super::copy::CopyContext;
use super::load::LoadContext;
use super::memory::MemoryAccumulator;
use super::registry::TypeRegistry;
use super::save::SaveContext;
use super::type_ids::{TypeDescription, TypeId};
use crate::data::Data;
use crate::geom::Primitive;
use crate::hash::MurmurHash;
use crate::io::IndexedIoPtr;
use crate::render::{StateRenderable, Transform, VisibleRenderable};
use crate::util::{Error, Result};

/// A runtime-typed value that can be copied, compared, hashed and persisted.
///
/// Implementors start every operation with the matching base helper
/// ([`is_equal_to`], [`hash`], [`memory_usage`]) and then handle their own
/// fields in a fixed order.
pub trait Object: Send + Sync + fmt::Debug + 'static {
    /// Static type identity of the concrete type.
    fn description(&self) -> &'static TypeDescription;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Replace own state with a deep copy of `other`.
    ///
    /// Fails with [`Error::TypeMismatch`] when `other` is another type.
    fn copy_from(&mut self, other: &dyn Object, ctx: &mut CopyContext) -> Result<()>;

    fn is_equal_to(&self, other: &dyn Object) -> bool;

    fn hash(&self, h: &mut MurmurHash);

    fn memory_usage(&self, acc: &mut MemoryAccumulator);

    fn save(&self, ctx: &mut SaveContext<'_>) -> Result<()>;

    fn load(&mut self, ctx: &mut LoadContext<'_>) -> Result<()>;

    fn as_data(&self) -> Option<&dyn Data> {
        None
    }

    fn as_visible_renderable(&self) -> Option<&dyn VisibleRenderable> {
        None
    }

    fn as_state_renderable(&self) -> Option<&dyn StateRenderable> {
        None
    }

    fn as_transform(&self) -> Option<&dyn Transform> {
        None
    }

    fn as_primitive(&self) -> Option<&dyn Primitive> {
        None
    }

    fn as_primitive_mut(&mut self) -> Option<&mut dyn Primitive> {
        None
    }
}

/// Concrete object types known at compile time.
pub trait ObjectType: Object + Default {
    fn static_description() -> &'static TypeDescription;

    /// Creator used when registering the type.
    fn create(_data: Option<&super::registry::CreatorData>) -> ObjectPtr {
        ObjectPtr::new(Self::default())
    }
}

impl dyn Object {
    #[inline]
    pub fn type_id(&self) -> TypeId {
        self.description().id
    }

    #[inline]
    pub fn type_name(&self) -> &'static str {
        self.description().name
    }

    /// True when the concrete type is `id` or derives from it.
    #[inline]
    pub fn is_instance_of(&self, id: TypeId) -> bool {
        self.description().is_a(id)
    }

    pub fn is<T: Object>(&self) -> bool {
        self.as_any().is::<T>()
    }

    pub fn downcast_ref<T: Object>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    pub fn downcast_mut<T: Object>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut::<T>()
    }
}

/// Fill in the boilerplate accessors of an [`Object`] impl.
macro_rules! object_accessors {
    ($desc:expr) => {
        fn description(&self) -> &'static $crate::core::TypeDescription {
            &$desc
        }

        fn as_any(&self) -> &dyn ::std::any::Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn ::std::any::Any {
            self
        }
    };
}
pub(crate) use object_accessors;

// ============================================================================
// Base layer helpers
// ============================================================================

/// Object-level equality: both sides share a concrete type.
pub fn is_equal_to(this: &dyn Object, other: &dyn Object) -> bool {
    this.description().id == other.description().id
}

/// Object-level hash contribution: the type id.
pub fn hash(this: &dyn Object, h: &mut MurmurHash) {
    h.append(&this.description().id.value());
}

/// Object-level memory: the reference counts and lock word of the handle.
pub fn memory_usage(acc: &mut MemoryAccumulator) {
    acc.accumulate(std::mem::size_of::<usize>() * 3);
}

/// Borrow `other` as `T`, or fail with the two type names.
pub fn expect_type<'a, T: Object>(expected: &'static TypeDescription, other: &'a dyn Object) -> Result<&'a T> {
    other
        .downcast_ref::<T>()
        .ok_or_else(|| Error::type_mismatch(expected.name, other.type_name()))
}

/// Equality of two optional handles, `None` only matching `None`.
pub fn option_ptr_eq(a: &Option<ObjectPtr>, b: &Option<ObjectPtr>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a.is_equal_to(b),
        (None, None) => true,
        _ => false,
    }
}

// ============================================================================
// ObjectPtr
// ============================================================================

/// Shared, reference counted handle to an object.
///
/// Clones share one allocation. Content operations go through a read or
/// write guard on the inner lock.
#[derive(Clone)]
pub struct ObjectPtr(Arc<RwLock<dyn Object>>);

/// Non-owning handle, used for back references.
#[derive(Clone, Default)]
pub struct WeakObjectPtr(Option<Weak<RwLock<dyn Object>>>);

impl ObjectPtr {
    pub fn new<T: Object>(object: T) -> Self {
        Self(Arc::new(RwLock::new(object)))
    }

    /// Shared access. Recursive, so nested reads from one thread never block.
    #[inline]
    pub fn read(&self) -> RwLockReadGuard<'_, dyn Object> {
        self.0.read_recursive()
    }

    #[inline]
    pub fn write(&self) -> RwLockWriteGuard<'_, dyn Object> {
        self.0.write()
    }

    pub fn downcast_ref<T: Object>(&self) -> Option<MappedRwLockReadGuard<'_, T>> {
        RwLockReadGuard::try_map(self.read(), |o| o.as_any().downcast_ref::<T>()).ok()
    }

    pub fn downcast_mut<T: Object>(&self) -> Option<MappedRwLockWriteGuard<'_, T>> {
        RwLockWriteGuard::try_map(self.write(), |o| o.as_any_mut().downcast_mut::<T>()).ok()
    }

    pub fn is<T: Object>(&self) -> bool {
        self.read().is::<T>()
    }

    pub fn type_id(&self) -> TypeId {
        self.read().description().id
    }

    pub fn type_name(&self) -> &'static str {
        self.read().type_name()
    }

    pub fn is_instance_of(&self, id: TypeId) -> bool {
        self.read().is_instance_of(id)
    }

    /// Same allocation.
    #[inline]
    pub fn ptr_eq(&self, other: &ObjectPtr) -> bool {
        self.addr() == other.addr()
    }

    /// Identity key of the shared allocation.
    #[inline]
    pub fn addr(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }

    /// Number of strong handles.
    #[inline]
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.0)
    }

    pub fn downgrade(&self) -> WeakObjectPtr {
        WeakObjectPtr(Some(Arc::downgrade(&self.0)))
    }

    /// Deep copy preserving internal sharing, created through the global registry.
    pub fn copy(&self) -> Result<ObjectPtr> {
        CopyContext::new().copy(self)
    }

    /// Deep copy creating objects through `registry`.
    pub fn copy_with(&self, registry: &TypeRegistry) -> Result<ObjectPtr> {
        CopyContext::with_registry(registry).copy(self)
    }

    pub fn is_equal_to(&self, other: &ObjectPtr) -> bool {
        self.ptr_eq(other) || self.read().is_equal_to(&*other.read())
    }

    /// Structural fingerprint of the whole graph below this object.
    pub fn hash(&self) -> MurmurHash {
        let mut h = MurmurHash::new();
        self.read().hash(&mut h);
        h
    }

    /// Bytes used by the graph, counting shared objects once.
    pub fn memory_usage(&self) -> usize {
        let mut acc = MemoryAccumulator::new();
        acc.accumulate_object(self);
        acc.total()
    }

    /// Save under `io/name` and commit that directory.
    pub fn save(&self, io: &IndexedIoPtr, name: &str) -> Result<()> {
        super::save::save_object(self, io, name)
    }

    /// Load the object stored under `io/name`.
    pub fn load(io: &IndexedIoPtr, name: &str) -> Result<ObjectPtr> {
        super::load::load_object(io, name, TypeRegistry::global())
    }

    /// Load creating objects through `registry`.
    pub fn load_with(io: &IndexedIoPtr, name: &str, registry: &TypeRegistry) -> Result<ObjectPtr> {
        super::load::load_object(io, name, registry)
    }
}

impl PartialEq for ObjectPtr {
    fn eq(&self, other: &Self) -> bool {
        self.is_equal_to(other)
    }
}

impl fmt::Debug for ObjectPtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.read(), f)
    }
}

impl<T: Object> From<T> for ObjectPtr {
    fn from(object: T) -> Self {
        Self::new(object)
    }
}

impl WeakObjectPtr {
    pub fn new() -> Self {
        Self(None)
    }

    pub fn upgrade(&self) -> Option<ObjectPtr> {
        self.0.as_ref()?.upgrade().map(ObjectPtr)
    }

    pub fn is_dangling(&self) -> bool {
        self.upgrade().is_none()
    }
}

impl fmt::Debug for WeakObjectPtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.upgrade() {
            Some(p) => write!(f, "Weak({:#x})", p.addr()),
            None => f.write_str("Weak(None)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{FloatData, IntData, IntVectorData};

    #[test]
    fn test_handle_identity() {
        let a = ObjectPtr::new(IntData::new(3));
        let b = a.clone();
        let c = ObjectPtr::new(IntData::new(3));

        assert!(a.ptr_eq(&b));
        assert!(!a.ptr_eq(&c));
        assert_eq!(a.ref_count(), 2);
        assert!(a.is_equal_to(&c));
        assert_eq!(a, c);
    }

    #[test]
    fn test_downcast() {
        let p = ObjectPtr::new(IntVectorData::new(vec![1, 2, 3]));
        assert!(p.is::<IntVectorData>());
        assert!(p.downcast_ref::<FloatData>().is_none());

        p.downcast_mut::<IntVectorData>().unwrap().value_mut().push(4);
        assert_eq!(p.downcast_ref::<IntVectorData>().unwrap().value().len(), 4);
        assert_eq!(p.type_name(), "IntVectorData");
        assert!(p.is_instance_of(TypeId::DATA));
    }

    #[test]
    fn test_handle_type_id() {
        let p = ObjectPtr::new(IntVectorData::new(vec![1]));
        assert_eq!(p.type_id(), TypeId::INT_VECTOR_DATA);
        assert_eq!(p.copy().unwrap().type_id(), TypeId::INT_VECTOR_DATA);
        assert_ne!(p.type_id(), ObjectPtr::new(FloatData::new(0.0)).type_id());
    }

    #[test]
    fn test_weak_handle() {
        let p = ObjectPtr::new(IntData::new(1));
        let w = p.downgrade();
        assert!(w.upgrade().unwrap().ptr_eq(&p));
        drop(p);
        assert!(w.is_dangling());
        assert!(WeakObjectPtr::new().upgrade().is_none());
    }

    #[test]
    fn test_expect_type() {
        let f = FloatData::new(1.0);
        let err = expect_type::<IntData>(IntData::static_description(), &f).unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { .. }));
    }
}
