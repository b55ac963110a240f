//! Type registry: maps type ids and names to creation functions.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;
use tracing::trace;

use super::object::{ObjectPtr, ObjectType};
use super::type_ids::{abstract_types, TypeId};
use crate::util::{Error, Result};

/// Opaque payload handed to a creator on every call.
pub type CreatorData = Arc<dyn Any + Send + Sync>;

/// Builds a fresh default instance of one type.
pub type CreatorFn = fn(Option<&CreatorData>) -> ObjectPtr;

#[derive(Clone)]
struct Registration {
    creator: Option<CreatorFn>,
    data: Option<CreatorData>,
}

#[derive(Default)]
struct Maps {
    by_id: HashMap<TypeId, Registration>,
    by_name: HashMap<String, Registration>,
    names: HashMap<TypeId, String>,
    ids: HashMap<String, TypeId>,
}

/// Registry of object types.
///
/// Cheap to clone; clones share the same tables. A `None` creator marks an
/// abstract type.
#[derive(Clone, Default)]
pub struct TypeRegistry {
    maps: Arc<RwLock<Maps>>,
}

impl std::fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let maps = self.maps.read();
        f.debug_struct("TypeRegistry")
            .field("types", &maps.by_id.len())
            .finish()
    }
}

impl TypeRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with every built-in type.
    pub fn with_builtin_types() -> Self {
        let registry = Self::new();
        for desc in abstract_types() {
            registry.register_type(desc.id, desc.name, None, None);
        }
        crate::data::register_types(&registry);
        crate::objects::register_types(&registry);
        crate::render::register_types(&registry);
        crate::geom::register_types(&registry);
        registry
    }

    /// Process-wide registry, initialised on first use.
    pub fn global() -> &'static TypeRegistry {
        static GLOBAL: OnceLock<TypeRegistry> = OnceLock::new();
        GLOBAL.get_or_init(Self::with_builtin_types)
    }

    /// Register or replace a type under both its id and name.
    pub fn register_type(&self, id: TypeId, name: &str, creator: Option<CreatorFn>, data: Option<CreatorData>) {
        trace!(%id, name, is_abstract = creator.is_none(), "register type");
        let registration = Registration { creator, data };
        let mut maps = self.maps.write();
        maps.by_id.insert(id, registration.clone());
        maps.by_name.insert(name.to_string(), registration);
        maps.names.insert(id, name.to_string());
        maps.ids.insert(name.to_string(), id);
    }

    /// Register a concrete type with its default creator.
    pub fn register<T: ObjectType>(&self) {
        let desc = T::static_description();
        self.register_type(desc.id, desc.name, Some(T::create), None);
    }

    pub fn is_type(&self, id: TypeId) -> bool {
        self.maps.read().by_id.contains_key(&id)
    }

    pub fn is_type_named(&self, name: &str) -> bool {
        self.maps.read().by_name.contains_key(name)
    }

    /// Registered without a creator. Unregistered types are not abstract.
    pub fn is_abstract_type(&self, id: TypeId) -> bool {
        self.maps
            .read()
            .by_id
            .get(&id)
            .is_some_and(|r| r.creator.is_none())
    }

    pub fn is_abstract_type_named(&self, name: &str) -> bool {
        self.maps
            .read()
            .by_name
            .get(name)
            .is_some_and(|r| r.creator.is_none())
    }

    pub fn type_name(&self, id: TypeId) -> Option<String> {
        self.maps.read().names.get(&id).cloned()
    }

    pub fn type_id(&self, name: &str) -> Option<TypeId> {
        self.maps.read().ids.get(name).copied()
    }

    /// Ids of all registered types, ascending.
    pub fn registered_ids(&self) -> Vec<TypeId> {
        let mut ids: Vec<_> = self.maps.read().by_id.keys().copied().collect();
        ids.sort();
        ids
    }

    /// New default instance of the type registered under `id`.
    pub fn create(&self, id: TypeId) -> Result<ObjectPtr> {
        let registration = self.maps.read().by_id.get(&id).cloned();
        match registration {
            None => Err(Error::unregistered_id(id)),
            Some(r) => Self::invoke(r, || id.to_string()),
        }
    }

    /// New default instance of the type registered under `name`.
    pub fn create_named(&self, name: &str) -> Result<ObjectPtr> {
        let registration = self.maps.read().by_name.get(name).cloned();
        match registration {
            None => Err(Error::UnregisteredType(name.to_string())),
            Some(r) => Self::invoke(r, || name.to_string()),
        }
    }

    // Called with the lock released so creators may use the registry.
    fn invoke(registration: Registration, label: impl FnOnce() -> String) -> Result<ObjectPtr> {
        match registration.creator {
            Some(create) => Ok(create(registration.data.as_ref())),
            None => Err(Error::AbstractTypeInstantiation(label())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::IntData;

    #[test]
    fn test_empty_registry() {
        let r = TypeRegistry::new();
        assert!(!r.is_type(TypeId::INT_DATA));
        assert!(!r.is_abstract_type(TypeId::INT_DATA));
        assert!(matches!(r.create(TypeId::INT_DATA), Err(Error::UnregisteredType(_))));
        assert!(matches!(r.create_named("IntData"), Err(Error::UnregisteredType(_))));
    }

    #[test]
    fn test_abstract_and_concrete() {
        let r = TypeRegistry::new();
        r.register_type(TypeId::DATA, "Data", None, None);
        r.register::<IntData>();

        assert!(r.is_abstract_type(TypeId::DATA));
        assert!(r.is_abstract_type_named("Data"));
        assert!(matches!(r.create(TypeId::DATA), Err(Error::AbstractTypeInstantiation(_))));

        let obj = r.create_named("IntData").unwrap();
        assert_eq!(obj.type_id(), TypeId::INT_DATA);
        assert_eq!(r.type_name(TypeId::INT_DATA).as_deref(), Some("IntData"));
        assert_eq!(r.type_id("IntData"), Some(TypeId::INT_DATA));
    }

    #[test]
    fn test_creator_data() {
        fn create_seven(data: Option<&CreatorData>) -> ObjectPtr {
            let v = data.and_then(|d| d.downcast_ref::<i32>()).copied().unwrap_or(0);
            ObjectPtr::new(IntData::new(v))
        }

        let r = TypeRegistry::new();
        r.register_type(TypeId(9000), "Seven", Some(create_seven), Some(Arc::new(7i32)));
        let obj = r.create(TypeId(9000)).unwrap();
        assert_eq!(*obj.downcast_ref::<IntData>().unwrap().value(), 7);
    }

    #[test]
    fn test_clones_share_tables() {
        let a = TypeRegistry::new();
        let b = a.clone();
        a.register::<IntData>();
        assert!(b.is_type(TypeId::INT_DATA));
    }

    #[test]
    fn test_global_has_builtins() {
        let g = TypeRegistry::global();
        assert!(g.is_abstract_type(TypeId::OBJECT));
        assert!(g.is_abstract_type(TypeId::PRIMITIVE));
        assert!(g.is_type(TypeId::MESH_PRIMITIVE));
        assert!(!g.is_abstract_type(TypeId::GROUP));
    }
}
