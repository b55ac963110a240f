//! Point cloud primitive.

use crate::core::object::{self, object_accessors};
use crate::core::{
    CopyContext, LoadContext, MemoryAccumulator, Object, ObjectPtr, ObjectType, SaveContext,
    TypeDescription, TypeId, PRIMITIVE,
};
use crate::data::{FloatData, V3fVectorData};
use crate::hash::MurmurHash;
use crate::render::{Renderer, VisibleRenderable};
use crate::util::{Box3f, Result, Vec3};

use super::{Interpolation, Primitive, PrimitiveBase, PrimitiveVariable};

pub static POINTS_PRIMITIVE: TypeDescription =
    TypeDescription::new(TypeId::POINTS_PRIMITIVE, "PointsPrimitive", Some(&PRIMITIVE));

const IO_VERSION: u32 = 0;
const NUM_POINTS_ENTRY: &str = "numPoints";

/// Unconnected points, optionally with a constant `width`.
#[derive(Debug, Default)]
pub struct PointsPrimitive {
    base: PrimitiveBase,
    num_points: usize,
}

impl PointsPrimitive {
    pub fn new(num_points: usize) -> Self {
        Self {
            base: PrimitiveBase::default(),
            num_points,
        }
    }

    /// Points with `P` set from `positions`.
    pub fn from_positions(positions: Vec<Vec3>) -> Self {
        let mut points = Self::new(positions.len());
        points.base.variables.insert(
            "P".to_string(),
            PrimitiveVariable::new(Interpolation::Vertex, ObjectPtr::new(V3fVectorData::new(positions))),
        );
        points
    }

    pub fn num_points(&self) -> usize {
        self.num_points
    }

    pub fn set_num_points(&mut self, num_points: usize) {
        self.num_points = num_points;
    }

    fn constant_width(&self) -> Option<f32> {
        let var = self.base.variables.get("width")?;
        if var.interpolation != Interpolation::Constant {
            return None;
        }
        let data = var.data.as_ref()?;
        let width = data.downcast_ref::<FloatData>().map(|w| *w.value());
        width
    }
}

impl VisibleRenderable for PointsPrimitive {
    fn render(&self, renderer: &mut dyn Renderer) -> Result<()> {
        renderer.points(self.num_points, &self.base.variables)
    }

    fn bound(&self) -> Box3f {
        let mut b = self.base.bound();
        if let Some(width) = self.constant_width() {
            b.grow(width * 0.5);
        }
        b
    }
}

impl Primitive for PointsPrimitive {
    fn base(&self) -> &PrimitiveBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut PrimitiveBase {
        &mut self.base
    }

    fn variable_size(&self, interpolation: Interpolation) -> usize {
        match interpolation {
            Interpolation::Invalid => 0,
            Interpolation::Constant | Interpolation::Uniform => 1,
            _ => self.num_points,
        }
    }
}

impl Object for PointsPrimitive {
    object_accessors!(POINTS_PRIMITIVE);

    fn copy_from(&mut self, other: &dyn Object, ctx: &mut CopyContext) -> Result<()> {
        let other = object::expect_type::<Self>(&POINTS_PRIMITIVE, other)?;
        self.base.copy_from(&other.base, ctx)?;
        self.num_points = other.num_points;
        Ok(())
    }

    fn is_equal_to(&self, other: &dyn Object) -> bool {
        object::is_equal_to(self, other)
            && other
                .downcast_ref::<Self>()
                .is_some_and(|o| o.num_points == self.num_points && self.base.is_equal_to(&o.base))
    }

    fn hash(&self, h: &mut MurmurHash) {
        object::hash(self, h);
        self.base.hash(h);
        h.append(&self.num_points);
    }

    fn memory_usage(&self, acc: &mut MemoryAccumulator) {
        object::memory_usage(acc);
        self.base.memory_usage(acc);
        acc.accumulate(std::mem::size_of::<usize>());
    }

    fn save(&self, ctx: &mut SaveContext<'_>) -> Result<()> {
        self.base.save(ctx)?;
        let container = ctx.container(POINTS_PRIMITIVE.name, IO_VERSION)?;
        container.write_value(NUM_POINTS_ENTRY, self.num_points as u32)
    }

    fn load(&mut self, ctx: &mut LoadContext<'_>) -> Result<()> {
        self.base.load(ctx)?;
        let mut version = IO_VERSION;
        let container = ctx.container(POINTS_PRIMITIVE.name, &mut version)?;
        self.num_points = container.read_u32(NUM_POINTS_ENTRY)? as usize;
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

impl ObjectType for PointsPrimitive {
    fn static_description() -> &'static TypeDescription {
        &POINTS_PRIMITIVE
    }
}
