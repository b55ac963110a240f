//! NURBS surface primitive.

use std::mem::size_of;

use crate::core::object::{self, object_accessors};
use crate::core::{
    CopyContext, LoadContext, MemoryAccumulator, Object, ObjectType, SaveContext, TypeDescription,
    TypeId, PRIMITIVE,
};
use crate::hash::MurmurHash;
use crate::io::IndexedIoPtr;
use crate::render::{Renderer, VisibleRenderable};
use crate::util::{Box3f, Error, Result};

use super::{Interpolation, Primitive, PrimitiveBase};

pub static NURBS_PRIMITIVE: TypeDescription =
    TypeDescription::new(TypeId::NURBS_PRIMITIVE, "NURBSPrimitive", Some(&PRIMITIVE));

const IO_VERSION: u32 = 0;

/// Order, knot vector and parametric range along one surface direction.
#[derive(Clone, Debug, PartialEq)]
pub struct NurbsDirection {
    pub order: i32,
    pub knot: Vec<f32>,
    pub min: f32,
    pub max: f32,
}

impl Default for NurbsDirection {
    /// A single cubic span over `[0, 1]`.
    fn default() -> Self {
        Self {
            order: 4,
            knot: vec![0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0],
            min: 0.0,
            max: 1.0,
        }
    }
}

impl NurbsDirection {
    pub fn new(order: i32, knot: Vec<f32>, min: f32, max: f32) -> Self {
        Self { order, knot, min, max }
    }

    /// Control vertex count along this direction.
    pub fn num_vertices(&self) -> usize {
        self.knot.len().saturating_sub(self.order.max(0) as usize)
    }

    pub fn num_segments(&self) -> usize {
        (self.num_vertices() + 1).saturating_sub(self.order.max(0) as usize)
    }

    fn validate(&self, axis: char) -> Result<()> {
        if self.order < 2 {
            return Err(Error::argument(format!("{axis} order {} is less than 2", self.order)));
        }
        let order = self.order as usize;
        if self.num_vertices() < order {
            return Err(Error::argument(format!(
                "{axis} knot vector of length {} too short for order {order}",
                self.knot.len()
            )));
        }
        if self.knot.windows(2).any(|w| w[1] < w[0]) {
            return Err(Error::argument(format!("{axis} knot vector is decreasing")));
        }
        let (lo, hi) = (self.knot[order - 1], self.knot[self.num_vertices()]);
        if self.min < lo || self.max > hi || self.min >= self.max {
            return Err(Error::argument(format!(
                "{axis} range [{}, {}] outside knot range [{lo}, {hi}]",
                self.min, self.max
            )));
        }
        Ok(())
    }

    fn hash(&self, h: &mut MurmurHash) {
        h.append(&self.order)
            .append(self.knot.as_slice())
            .append(&self.min)
            .append(&self.max);
    }

    fn save(&self, container: &IndexedIoPtr, axis: char) -> Result<()> {
        container.write_value(&format!("{axis}Order"), self.order)?;
        container.write_value(&format!("{axis}Knot"), self.knot.clone())?;
        container.write_value(&format!("{axis}Min"), self.min)?;
        container.write_value(&format!("{axis}Max"), self.max)
    }

    fn load(container: &IndexedIoPtr, axis: char) -> Result<Self> {
        Ok(Self {
            order: container.read_i32(&format!("{axis}Order"))?,
            knot: container.read_value(&format!("{axis}Knot"))?,
            min: container.read_value(&format!("{axis}Min"))?,
            max: container.read_value(&format!("{axis}Max"))?,
        })
    }
}

/// A rational B-spline surface patch.
#[derive(Debug, Default)]
pub struct NurbsPrimitive {
    base: PrimitiveBase,
    u: NurbsDirection,
    v: NurbsDirection,
}

impl NurbsPrimitive {
    pub fn new(u: NurbsDirection, v: NurbsDirection) -> Result<Self> {
        let mut nurbs = Self::default();
        nurbs.set_topology(u, v)?;
        Ok(nurbs)
    }

    /// Replace both directions; knots must be non-decreasing and cover the range.
    pub fn set_topology(&mut self, u: NurbsDirection, v: NurbsDirection) -> Result<()> {
        u.validate('u')?;
        v.validate('v')?;
        self.u = u;
        self.v = v;
        Ok(())
    }

    pub fn u(&self) -> &NurbsDirection {
        &self.u
    }

    pub fn v(&self) -> &NurbsDirection {
        &self.v
    }
}

impl VisibleRenderable for NurbsPrimitive {
    fn render(&self, renderer: &mut dyn Renderer) -> Result<()> {
        renderer.nurbs(&self.u, &self.v, &self.base.variables)
    }

    fn bound(&self) -> Box3f {
        self.base.bound()
    }
}

impl Primitive for NurbsPrimitive {
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
            Interpolation::Uniform => self.u.num_segments() * self.v.num_segments(),
            Interpolation::Vertex => self.u.num_vertices() * self.v.num_vertices(),
            Interpolation::Varying | Interpolation::FaceVarying => {
                (self.u.num_segments() + 1) * (self.v.num_segments() + 1)
            }
        }
    }
}

impl Object for NurbsPrimitive {
    object_accessors!(NURBS_PRIMITIVE);

    fn copy_from(&mut self, other: &dyn Object, ctx: &mut CopyContext) -> Result<()> {
        let other = object::expect_type::<Self>(&NURBS_PRIMITIVE, other)?;
        self.base.copy_from(&other.base, ctx)?;
        self.u = other.u.clone();
        self.v = other.v.clone();
        Ok(())
    }

    fn is_equal_to(&self, other: &dyn Object) -> bool {
        object::is_equal_to(self, other)
            && other
                .downcast_ref::<Self>()
                .is_some_and(|o| o.u == self.u && o.v == self.v && self.base.is_equal_to(&o.base))
    }

    fn hash(&self, h: &mut MurmurHash) {
        object::hash(self, h);
        self.base.hash(h);
        self.u.hash(h);
        self.v.hash(h);
    }

    fn memory_usage(&self, acc: &mut MemoryAccumulator) {
        object::memory_usage(acc);
        self.base.memory_usage(acc);
        acc.accumulate(2 * size_of::<NurbsDirection>() + (self.u.knot.capacity() + self.v.knot.capacity()) * size_of::<f32>());
    }

    fn save(&self, ctx: &mut SaveContext<'_>) -> Result<()> {
        self.base.save(ctx)?;
        let container = ctx.container(NURBS_PRIMITIVE.name, IO_VERSION)?;
        self.u.save(&container, 'u')?;
        self.v.save(&container, 'v')
    }

    fn load(&mut self, ctx: &mut LoadContext<'_>) -> Result<()> {
        self.base.load(ctx)?;
        let mut version = IO_VERSION;
        let container = ctx.container(NURBS_PRIMITIVE.name, &mut version)?;
        let u = NurbsDirection::load(&container, 'u')?;
        let v = NurbsDirection::load(&container, 'v')?;
        self.set_topology(u, v)
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

impl ObjectType for NurbsPrimitive {
    fn static_description() -> &'static TypeDescription {
        &NURBS_PRIMITIVE
    }
}
