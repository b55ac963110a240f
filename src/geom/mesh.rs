//! Polygon mesh primitive.

use std::mem::size_of;

use crate::core::object::{self, object_accessors};
use crate::core::{
    CopyContext, LoadContext, MemoryAccumulator, Object, ObjectPtr, ObjectType, SaveContext,
    TypeDescription, TypeId, PRIMITIVE,
};
use crate::data::V3fVectorData;
use crate::hash::MurmurHash;
use crate::render::{Renderer, VisibleRenderable};
use crate::util::{Box3f, Error, Result, Vec3};

use super::{Interpolation, Primitive, PrimitiveBase, PrimitiveVariable};

pub static MESH_PRIMITIVE: TypeDescription =
    TypeDescription::new(TypeId::MESH_PRIMITIVE, "MeshPrimitive", Some(&PRIMITIVE));

const IO_VERSION: u32 = 0;
const VERTICES_PER_FACE_ENTRY: &str = "verticesPerFace";
const VERTEX_IDS_ENTRY: &str = "vertexIds";
const NUM_VERTICES_ENTRY: &str = "numVertices";
const INTERPOLATION_ENTRY: &str = "interpolation";

/// Subdivision scheme used when no other is given.
pub const LINEAR_INTERPOLATION: &str = "linear";

/// Faces described by per-face vertex counts and a flat list of vertex ids.
#[derive(Debug)]
pub struct MeshPrimitive {
    base: PrimitiveBase,
    vertices_per_face: Vec<i32>,
    vertex_ids: Vec<i32>,
    num_vertices: usize,
    interpolation: String,
}

impl Default for MeshPrimitive {
    fn default() -> Self {
        Self {
            base: PrimitiveBase::default(),
            vertices_per_face: Vec::new(),
            vertex_ids: Vec::new(),
            num_vertices: 0,
            interpolation: LINEAR_INTERPOLATION.to_string(),
        }
    }
}

impl MeshPrimitive {
    pub fn new(vertices_per_face: Vec<i32>, vertex_ids: Vec<i32>, interpolation: &str) -> Result<Self> {
        let mut mesh = Self::default();
        mesh.set_topology(vertices_per_face, vertex_ids, interpolation)?;
        Ok(mesh)
    }

    /// Six-faced box covering `b`, with `P` set.
    pub fn create_box(b: Box3f) -> Self {
        let (lo, hi) = (b.min, b.max);
        let points = vec![
            Vec3::new(lo.x, lo.y, lo.z),
            Vec3::new(hi.x, lo.y, lo.z),
            Vec3::new(hi.x, hi.y, lo.z),
            Vec3::new(lo.x, hi.y, lo.z),
            Vec3::new(lo.x, lo.y, hi.z),
            Vec3::new(hi.x, lo.y, hi.z),
            Vec3::new(hi.x, hi.y, hi.z),
            Vec3::new(lo.x, hi.y, hi.z),
        ];
        let vertex_ids = vec![
            3, 2, 1, 0, // -z
            4, 5, 6, 7, // +z
            0, 1, 5, 4, // -y
            2, 3, 7, 6, // +y
            1, 2, 6, 5, // +x
            0, 4, 7, 3, // -x
        ];
        let mut mesh = Self {
            vertices_per_face: vec![4; 6],
            vertex_ids,
            num_vertices: points.len(),
            ..Self::default()
        };
        mesh.base.variables.insert(
            "P".to_string(),
            PrimitiveVariable::new(Interpolation::Vertex, ObjectPtr::new(V3fVectorData::new(points))),
        );
        mesh
    }

    /// Replace the topology.
    ///
    /// Faces need at least three vertices, ids must be non-negative and the
    /// face counts must add up to the number of ids. The vertex count
    /// becomes the highest id plus one.
    pub fn set_topology(&mut self, vertices_per_face: Vec<i32>, vertex_ids: Vec<i32>, interpolation: &str) -> Result<()> {
        let mut total = 0usize;
        for &n in &vertices_per_face {
            if n < 3 {
                return Err(Error::argument(format!("face with {n} vertices, at least 3 required")));
            }
            total += n as usize;
        }
        if total != vertex_ids.len() {
            return Err(Error::argument(format!(
                "face vertex counts sum to {total} but {} vertex ids given",
                vertex_ids.len()
            )));
        }
        let mut num_vertices = 0usize;
        for &id in &vertex_ids {
            if id < 0 {
                return Err(Error::argument(format!("negative vertex id {id}")));
            }
            num_vertices = num_vertices.max(id as usize + 1);
        }

        self.vertices_per_face = vertices_per_face;
        self.vertex_ids = vertex_ids;
        self.num_vertices = num_vertices;
        self.interpolation = interpolation.to_string();
        Ok(())
    }

    pub fn vertices_per_face(&self) -> &[i32] {
        &self.vertices_per_face
    }

    pub fn vertex_ids(&self) -> &[i32] {
        &self.vertex_ids
    }

    pub fn num_faces(&self) -> usize {
        self.vertices_per_face.len()
    }

    pub fn num_vertices(&self) -> usize {
        self.num_vertices
    }

    pub fn interpolation(&self) -> &str {
        &self.interpolation
    }

    pub fn set_interpolation(&mut self, interpolation: &str) {
        self.interpolation = interpolation.to_string();
    }
}

impl VisibleRenderable for MeshPrimitive {
    fn render(&self, renderer: &mut dyn Renderer) -> Result<()> {
        renderer.mesh(&self.vertices_per_face, &self.vertex_ids, &self.interpolation, &self.base.variables)
    }

    fn bound(&self) -> Box3f {
        self.base.bound()
    }
}

impl Primitive for MeshPrimitive {
    fn base(&self) -> &PrimitiveBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut PrimitiveBase {
        &mut self.base
    }

    fn variable_size(&self, interpolation: Interpolation) -> usize {
        match interpolation {
            Interpolation::Invalid => 0,
            Interpolation::Constant => 1,
            Interpolation::Uniform => self.num_faces(),
            Interpolation::Vertex | Interpolation::Varying => self.num_vertices,
            Interpolation::FaceVarying => self.vertex_ids.len(),
        }
    }
}

impl Object for MeshPrimitive {
    object_accessors!(MESH_PRIMITIVE);

    fn copy_from(&mut self, other: &dyn Object, ctx: &mut CopyContext) -> Result<()> {
        let other = object::expect_type::<Self>(&MESH_PRIMITIVE, other)?;
        self.base.copy_from(&other.base, ctx)?;
        self.vertices_per_face = other.vertices_per_face.clone();
        self.vertex_ids = other.vertex_ids.clone();
        self.num_vertices = other.num_vertices;
        self.interpolation = other.interpolation.clone();
        Ok(())
    }

    fn is_equal_to(&self, other: &dyn Object) -> bool {
        object::is_equal_to(self, other)
            && other.downcast_ref::<Self>().is_some_and(|o| {
                o.num_vertices == self.num_vertices
                    && o.interpolation == self.interpolation
                    && o.vertices_per_face == self.vertices_per_face
                    && o.vertex_ids == self.vertex_ids
                    && self.base.is_equal_to(&o.base)
            })
    }

    fn hash(&self, h: &mut MurmurHash) {
        object::hash(self, h);
        self.base.hash(h);
        h.append(self.vertices_per_face.as_slice());
        h.append(self.vertex_ids.as_slice());
        h.append(&self.num_vertices);
        h.append(self.interpolation.as_str());
    }

    fn memory_usage(&self, acc: &mut MemoryAccumulator) {
        object::memory_usage(acc);
        self.base.memory_usage(acc);
        acc.accumulate(
            (self.vertices_per_face.capacity() + self.vertex_ids.capacity()) * size_of::<i32>()
                + size_of::<usize>()
                + self.interpolation.capacity(),
        );
    }

    fn save(&self, ctx: &mut SaveContext<'_>) -> Result<()> {
        self.base.save(ctx)?;
        let container = ctx.container(MESH_PRIMITIVE.name, IO_VERSION)?;
        container.write_value(VERTICES_PER_FACE_ENTRY, self.vertices_per_face.clone())?;
        container.write_value(VERTEX_IDS_ENTRY, self.vertex_ids.clone())?;
        container.write_value(NUM_VERTICES_ENTRY, self.num_vertices as u32)?;
        container.write_value(INTERPOLATION_ENTRY, self.interpolation.clone())
    }

    fn load(&mut self, ctx: &mut LoadContext<'_>) -> Result<()> {
        self.base.load(ctx)?;
        let mut version = IO_VERSION;
        let container = ctx.container(MESH_PRIMITIVE.name, &mut version)?;
        let vertices_per_face: Vec<i32> = container.read_value(VERTICES_PER_FACE_ENTRY)?;
        let vertex_ids: Vec<i32> = container.read_value(VERTEX_IDS_ENTRY)?;
        let interpolation = container.read_string(INTERPOLATION_ENTRY)?;
        self.set_topology(vertices_per_face, vertex_ids, &interpolation)?;
        // Unreferenced trailing vertices are only recorded in the stored count.
        let stored = container.read_u32(NUM_VERTICES_ENTRY)? as usize;
        self.num_vertices = self.num_vertices.max(stored);
        Ok(())
    }

    fn as_visible_renderable(&self) -> Option<&dyn VisibleRenderable> {
        Some(self)
    }

    fn as_primitive(&self) -> Option<&dyn Primitive> {
        Some(self)
    }

    fn as_primitive_mut(&mut self) -> Option<&mut dyn Primitive> {
        Some(self)
    }
}

impl ObjectType for MeshPrimitive {
    fn static_description() -> &'static TypeDescription {
        &MESH_PRIMITIVE
    }
}
