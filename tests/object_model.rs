//! Integration tests for type registration, copying, hashing and memory accounting.

use rayon::prelude::*;
use scene_object::prelude::*;

#[test]
fn test_every_registered_type_creates() {
    let registry = TypeRegistry::global();
    let mut concrete = 0;
    for id in registry.registered_ids() {
        if registry.is_abstract_type(id) {
            assert!(matches!(registry.create(id), Err(Error::AbstractTypeInstantiation(_))));
            continue;
        }
        let object = registry.create(id).expect("create registered type");
        assert_eq!(object.type_id(), id);
        let name = registry.type_name(id).expect("registered name");
        assert_eq!(object.type_name(), name);
        assert!(object.is_instance_of(TypeId::OBJECT));
        concrete += 1;
    }
    // 16 simple data types, 16 vector data types, 3 containers, 3 render types, 5 primitives
    assert_eq!(concrete, 43);
}

#[test]
fn test_unregistered_and_abstract_errors() {
    let registry = TypeRegistry::global();
    assert!(matches!(registry.create(TypeId(424242)), Err(Error::UnregisteredType(_))));
    assert!(matches!(registry.create_named("NotAType"), Err(Error::UnregisteredType(_))));
    assert!(matches!(registry.create(TypeId::PRIMITIVE), Err(Error::AbstractTypeInstantiation(_))));
    assert!(matches!(registry.create_named("Data"), Err(Error::AbstractTypeInstantiation(_))));
}

#[test]
fn test_type_hierarchy() {
    let mesh = ObjectPtr::new(MeshPrimitive::create_box(Box3f::new(Vec3::ZERO, Vec3::ONE)));
    assert!(mesh.is_instance_of(TypeId::PRIMITIVE));
    assert!(mesh.is_instance_of(TypeId::VISIBLE_RENDERABLE));
    assert!(mesh.is_instance_of(TypeId::RENDERABLE));
    assert!(!mesh.is_instance_of(TypeId::DATA));

    let value = ObjectPtr::new(FloatData::new(1.0));
    assert!(value.is_instance_of(TypeId::DATA));
    assert!(value.is::<FloatData>());
    assert!(!value.is::<IntData>());
}

#[test]
fn test_copy_preserves_sharing() {
    let shared = ObjectPtr::new(IntVectorData::new(vec![1, 2, 3]));
    let mut inner = CompoundObject::new();
    inner.insert("x", shared.clone());
    let mut outer = CompoundObject::new();
    outer.insert("a", shared.clone());
    outer.insert("b", shared.clone());
    outer.insert("inner", ObjectPtr::new(inner));
    let src = ObjectPtr::new(outer);

    let copy = src.copy().expect("copy");
    assert!(!copy.ptr_eq(&src));
    assert!(copy.is_equal_to(&src));
    assert_eq!(copy.hash(), src.hash());

    let c = copy.downcast_ref::<CompoundObject>().expect("compound");
    let a = c.get("a").expect("a");
    assert!(a.ptr_eq(c.get("b").expect("b")));
    assert!(!a.ptr_eq(&shared));

    let inner = c.get("inner").expect("inner").downcast_ref::<CompoundObject>().expect("inner compound");
    assert!(inner.get("x").expect("x").ptr_eq(a));
}

#[test]
fn test_copy_is_independent() {
    let src = ObjectPtr::new(IntVectorData::new(vec![1, 2, 3]));
    let copy = src.copy().expect("copy");
    copy.downcast_mut::<IntVectorData>().expect("vector").value_mut().push(4);

    assert_eq!(src.downcast_ref::<IntVectorData>().expect("vector").value().len(), 3);
    assert!(!copy.is_equal_to(&src));
    assert_ne!(copy.hash(), src.hash());
}

#[test]
fn test_compound_hash_ignores_insertion_order() {
    let forward: CompoundObject = [
        ("alpha", ObjectPtr::new(IntData::new(1))),
        ("beta", ObjectPtr::new(StringData::new("b".to_string()))),
        ("gamma", ObjectPtr::new(FloatData::new(0.5))),
    ]
    .into_iter()
    .collect();

    let mut reverse = CompoundObject::new();
    reverse.insert("gamma", ObjectPtr::new(FloatData::new(0.5)));
    reverse.insert("beta", ObjectPtr::new(StringData::new("b".to_string())));
    reverse.insert("alpha", ObjectPtr::new(IntData::new(1)));

    let forward = ObjectPtr::new(forward);
    let reverse = ObjectPtr::new(reverse);
    assert!(forward.is_equal_to(&reverse));
    assert_eq!(forward.hash(), reverse.hash());
}

#[test]
fn test_hash_sensitivity() {
    let a = ObjectPtr::new(FloatVectorData::new(vec![1.0, 2.0, 3.0]));
    let b = ObjectPtr::new(FloatVectorData::new(vec![1.0, 2.0, f32::from_bits(3.0f32.to_bits() + 1)]));
    assert!(!a.is_equal_to(&b));
    assert_ne!(a.hash(), b.hash());

    // Same bits, different type
    let int = ObjectPtr::new(IntData::new(7));
    let uint = ObjectPtr::new(UIntData::new(7));
    assert_ne!(int.hash(), uint.hash());

    assert_eq!(MurmurHash::new().to_string(), "0".repeat(32));
    assert_eq!(a.hash().to_string().len(), 32);
}

#[test]
fn test_memory_counts_shared_once() {
    let shared = ObjectPtr::new(FloatVectorData::new(vec![0.0; 1000]));
    let single = shared.memory_usage();
    assert!(single >= 1000 * std::mem::size_of::<f32>());

    let mut once = CompoundObject::new();
    once.insert("a", shared.clone());
    let once = ObjectPtr::new(once).memory_usage();

    let mut twice = CompoundObject::new();
    twice.insert("a", shared.clone());
    twice.insert("b", shared);
    let twice = ObjectPtr::new(twice).memory_usage();

    // The second key costs a map slot, never the payload again.
    assert!(twice > once);
    assert!(twice - once < single);
}

#[test]
fn test_object_matrix_resize() {
    let mut m = ObjectMatrix::new(2, 2);
    m.set(0, 0, Some(ObjectPtr::new(IntData::new(0)))).expect("set");
    m.set(1, 1, Some(ObjectPtr::new(IntData::new(3)))).expect("set");
    m.resize(3, 3);

    assert_eq!((m.rows(), m.cols()), (3, 3));
    assert_eq!(m.members().len(), 9);
    let at = |m: &ObjectMatrix, r, c| -> Option<i32> {
        m.get(r, c)
            .expect("in range")
            .map(|p| *p.downcast_ref::<IntData>().expect("int").value())
    };
    assert_eq!(at(&m, 0, 0), Some(0));
    assert_eq!(at(&m, 1, 1), Some(3));
    assert_eq!(at(&m, 2, 2), None);
    assert!(matches!(m.get(3, 0), Err(Error::IndexOutOfRange { .. })));
}

#[test]
fn test_parallel_hashing_of_shared_graph() {
    let leaf = ObjectPtr::new(V3fVectorData::new(vec![Vec3::X, Vec3::Y, Vec3::Z]));
    let mut root = CompoundObject::new();
    for i in 0..16 {
        root.insert(format!("member{i}"), leaf.clone());
    }
    let root = ObjectPtr::new(root);
    let expected = root.hash();

    let hashes: Vec<MurmurHash> = (0..64).into_par_iter().map(|_| root.hash()).collect();
    assert!(hashes.iter().all(|h| *h == expected));

    let copies: Vec<ObjectPtr> = (0..8)
        .into_par_iter()
        .map(|_| root.copy().expect("copy"))
        .collect();
    assert!(copies.iter().all(|c| c.hash() == expected));
}
