//! Integration tests for primitives, groups and rendering.

use scene_object::prelude::*;

fn leaf_group(name: &str) -> ObjectPtr {
    let mut group = Group::new();
    group
        .set_attribute("name", &ObjectPtr::new(StringData::new(name.to_string())))
        .expect("name attribute");
    ObjectPtr::new(group)
}

fn parent_of(child: &ObjectPtr) -> Option<ObjectPtr> {
    child.downcast_ref::<Group>().expect("group").parent()
}

fn child_count(group: &ObjectPtr) -> usize {
    group.downcast_ref::<Group>().expect("group").children().len()
}

#[test]
fn test_mesh_variable_validity() {
    let mut mesh = MeshPrimitive::new(vec![4], vec![0, 1, 2, 3], LINEAR_INTERPOLATION).expect("quad");

    let three = ObjectPtr::new(FloatVectorData::new(vec![0.0; 3]));
    let four = ObjectPtr::new(FloatVectorData::new(vec![0.0; 4]));
    let two = ObjectPtr::new(FloatVectorData::new(vec![0.0; 2]));
    let indices = ObjectPtr::new(IntVectorData::new(vec![0, 1, 1, 0]));

    assert!(!mesh.is_primitive_variable_valid(&PrimitiveVariable::new(Interpolation::Vertex, three)));
    assert!(mesh.is_primitive_variable_valid(&PrimitiveVariable::new(Interpolation::Vertex, four)));
    assert!(mesh.is_primitive_variable_valid(&PrimitiveVariable::indexed(
        Interpolation::Vertex,
        two.clone(),
        indices
    )));

    let out_of_range = ObjectPtr::new(IntVectorData::new(vec![0, 1, 2, 0]));
    let bad = PrimitiveVariable::indexed(Interpolation::Vertex, two, out_of_range);
    assert!(!mesh.is_primitive_variable_valid(&bad));

    mesh.variables_mut().insert("bad".to_string(), bad);
    assert!(!mesh.are_primitive_variables_valid());
}

#[test]
fn test_primitive_sizes() {
    let points = PointsPrimitive::new(5);
    assert_eq!(points.variable_size(Interpolation::Vertex), 5);
    assert_eq!(points.variable_size(Interpolation::Uniform), 1);

    let curves = CurvesPrimitive::new(vec![4, 4], CubicBasis::Bezier, false).expect("curves");
    assert_eq!(curves.num_curves(), 2);
    assert_eq!(curves.variable_size(Interpolation::Vertex), 8);
    assert_eq!(curves.variable_size(Interpolation::Uniform), 2);
    assert_eq!(curves.variable_size(Interpolation::Varying), 4);

    let mesh = MeshPrimitive::create_box(Box3f::new(Vec3::ZERO, Vec3::ONE));
    assert_eq!(mesh.variable_size(Interpolation::Uniform), 6);
    assert_eq!(mesh.variable_size(Interpolation::Vertex), 8);
    assert_eq!(mesh.variable_size(Interpolation::FaceVarying), 24);
    assert!(mesh.are_primitive_variables_valid());
    assert_eq!(mesh.bound(), Box3f::new(Vec3::ZERO, Vec3::ONE));
}

#[test]
fn test_group_reparenting() {
    let a = ObjectPtr::new(Group::new());
    let b = ObjectPtr::new(Group::new());
    let child = leaf_group("child");

    Group::add_child(&a, child.clone()).expect("add to a");
    assert!(parent_of(&child).expect("parent").ptr_eq(&a));

    Group::add_child(&b, child.clone()).expect("move to b");
    assert!(parent_of(&child).expect("parent").ptr_eq(&b));
    assert_eq!(child_count(&a), 0);
    assert_eq!(child_count(&b), 1);

    assert!(matches!(Group::remove_child(&a, &child), Err(Error::NotAChild)));
    Group::remove_child(&b, &child).expect("remove");
    assert!(parent_of(&child).is_none());
}

#[test]
fn test_group_rejects_cycles() {
    let root = ObjectPtr::new(Group::new());
    let mid = ObjectPtr::new(Group::new());
    Group::add_child(&root, mid.clone()).expect("add mid");

    assert!(Group::add_child(&mid, root.clone()).is_err());
    assert!(Group::add_child(&mid, mid.clone()).is_err());
    assert!(Group::add_child(&root, ObjectPtr::new(IntData::new(1))).is_err());
    assert_eq!(child_count(&mid), 0);
}

#[test]
fn test_group_dropping_parent_releases_children() {
    let child = leaf_group("orphan");
    {
        let parent = ObjectPtr::new(Group::new());
        Group::add_child(&parent, child.clone()).expect("add");
        assert_eq!(child.ref_count(), 2);
    }
    assert_eq!(child.ref_count(), 1);
    assert!(parent_of(&child).is_none());
}

#[test]
fn test_group_attributes_and_transforms() {
    let root = leaf_group("root");
    {
        let mut g = root.downcast_mut::<Group>().expect("group");
        g.set_transform(Some(ObjectPtr::new(MatrixTransform::new(Mat4::from_translation(Vec3::X)))))
            .expect("transform");
    }

    let child = ObjectPtr::new(Group::new());
    {
        let mut g = child.downcast_mut::<Group>().expect("group");
        g.set_transform(Some(ObjectPtr::new(MatrixTransform::new(Mat4::from_translation(Vec3::Y)))))
            .expect("transform");
    }
    Group::add_child(&root, child.clone()).expect("add");

    let g = child.downcast_ref::<Group>().expect("group");
    let name = g.get_attribute("name").expect("inherited");
    assert_eq!(name.downcast_ref::<StringData>().expect("string").value(), "root");

    let global = g.global_transform_matrix(0.0);
    assert_eq!(global.transform_point3(Vec3::ZERO), Vec3::new(1.0, 1.0, 0.0));
}

#[test]
fn test_render_scene() {
    let root = ObjectPtr::new(Group::new());
    let mesh = MeshPrimitive::create_box(Box3f::new(Vec3::ZERO, Vec3::ONE));
    Group::add_child(&root, ObjectPtr::new(mesh)).expect("mesh");
    Group::add_child(&root, ObjectPtr::new(DiskPrimitive::default())).expect("disk");

    let mut r = RecordingRenderer::new();
    render(&root, &mut r).expect("render");
    assert_eq!(r.depth(), 0);
    assert_eq!(r.calls.first(), Some(&RenderCall::AttributeBegin));
    assert_eq!(r.calls.last(), Some(&RenderCall::AttributeEnd));
    assert!(r
        .calls
        .iter()
        .any(|c| matches!(c, RenderCall::Mesh { num_faces: 6, .. })));
}

struct RefuseMeshes(RecordingRenderer);

impl Renderer for RefuseMeshes {
    fn attribute_begin(&mut self) -> Result<()> {
        self.0.attribute_begin()
    }
    fn attribute_end(&mut self) -> Result<()> {
        self.0.attribute_end()
    }
    fn transform_begin(&mut self) -> Result<()> {
        self.0.transform_begin()
    }
    fn transform_end(&mut self) -> Result<()> {
        self.0.transform_end()
    }
    fn motion_begin(&mut self, times: &[f32]) -> Result<()> {
        self.0.motion_begin(times)
    }
    fn motion_end(&mut self) -> Result<()> {
        self.0.motion_end()
    }
    fn concat_transform(&mut self, matrix: Mat4) -> Result<()> {
        self.0.concat_transform(matrix)
    }
    fn set_attribute(&mut self, name: &str, value: &ObjectPtr) -> Result<()> {
        self.0.set_attribute(name, value)
    }
    fn points(&mut self, n: usize, vars: &PrimitiveVariableMap) -> Result<()> {
        self.0.points(n, vars)
    }
    fn curves(&mut self, b: CubicBasis, p: bool, v: &[i32], vars: &PrimitiveVariableMap) -> Result<()> {
        self.0.curves(b, p, v, vars)
    }
    fn mesh(&mut self, _f: &[i32], _ids: &[i32], _i: &str, _vars: &PrimitiveVariableMap) -> Result<()> {
        Err(Error::other("meshes not supported"))
    }
    fn disk(&mut self, r: f32, z: f32, t: f32, vars: &PrimitiveVariableMap) -> Result<()> {
        self.0.disk(r, z, t, vars)
    }
    fn nurbs(&mut self, u: &NurbsDirection, v: &NurbsDirection, vars: &PrimitiveVariableMap) -> Result<()> {
        self.0.nurbs(u, v, vars)
    }
}

#[test]
fn test_render_error_keeps_brackets_balanced() {
    let root = leaf_group("root");
    let inner = ObjectPtr::new(Group::new());
    {
        let mut g = inner.downcast_mut::<Group>().expect("group");
        g.set_transform(Some(ObjectPtr::new(MatrixTransform::new(Mat4::from_scale(Vec3::splat(2.0))))))
            .expect("transform");
    }
    Group::add_child(&root, inner.clone()).expect("inner");
    let mesh = MeshPrimitive::create_box(Box3f::new(Vec3::ZERO, Vec3::ONE));
    Group::add_child(&inner, ObjectPtr::new(mesh)).expect("mesh");

    let mut r = RefuseMeshes(RecordingRenderer::new());
    assert!(render(&root, &mut r).is_err());
    assert_eq!(r.0.depth(), 0);
    assert_eq!(r.0.calls.last(), Some(&RenderCall::AttributeEnd));
}

#[test]
fn test_group_copy_round_trip() {
    let root = leaf_group("root");
    let detail = ObjectPtr::new(Group::new());
    Group::add_child(&detail, ObjectPtr::new(PointsPrimitive::from_positions(vec![Vec3::ZERO, Vec3::ONE])))
        .expect("points");
    Group::add_child(&root, detail).expect("detail");

    let copy = root.copy().expect("copy");
    assert!(copy.is_equal_to(&root));

    let io = MemoryIndexedIo::create();
    root.save(&io, "scene").expect("save");
    let loaded = ObjectPtr::load(&io, "scene").expect("load");
    assert_eq!(loaded.hash(), root.hash());

    for tree in [&copy, &loaded] {
        let g = tree.downcast_ref::<Group>().expect("group");
        let child = &g.children()[0];
        assert!(parent_of(child).expect("parent").ptr_eq(tree));
    }
}
