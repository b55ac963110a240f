//! Curves primitive.
//!
//! A batch of curves sharing one cubic basis. Each curve lists its vertex
//! count; variable sizes follow from the counts, the basis step and
//! periodicity.

use std::mem::size_of;

use crate::core::object::{self, object_accessors};
use crate::core::{
    CopyContext, LoadContext, MemoryAccumulator, Object, ObjectType, SaveContext, TypeDescription,
    TypeId, PRIMITIVE,
};
use crate::hash::MurmurHash;
use crate::render::{Renderer, VisibleRenderable};
use crate::util::{Box3f, Error, Result};

use super::{Interpolation, Primitive, PrimitiveBase};

pub static CURVES_PRIMITIVE: TypeDescription =
    TypeDescription::new(TypeId::CURVES_PRIMITIVE, "CurvesPrimitive", Some(&PRIMITIVE));

const IO_VERSION: u32 = 0;
const VERTICES_PER_CURVE_ENTRY: &str = "verticesPerCurve";
const BASIS_ENTRY: &str = "basis";
const PERIODIC_ENTRY: &str = "periodic";

/// Interpolating basis of a curve.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum CubicBasis {
    #[default]
    Linear = 0,
    Bezier = 1,
    BSpline = 2,
    CatmullRom = 3,
}

impl CubicBasis {
    pub fn from_i32(v: i32) -> Option<Self> {
        match v {
            0 => Some(Self::Linear),
            1 => Some(Self::Bezier),
            2 => Some(Self::BSpline),
            3 => Some(Self::CatmullRom),
            _ => None,
        }
    }

    /// Vertices to advance between consecutive segments.
    pub fn step(&self) -> usize {
        match self {
            Self::Bezier => 3,
            _ => 1,
        }
    }

    pub fn is_linear(&self) -> bool {
        *self == Self::Linear
    }

    /// Fewest vertices a single curve may have.
    pub fn min_vertices(&self, periodic: bool) -> usize {
        match (self, periodic) {
            (Self::Linear, _) => 2,
            (_, true) => 3,
            (_, false) => 4,
        }
    }
}

/// Curves sharing a basis.
#[derive(Debug, Default)]
pub struct CurvesPrimitive {
    base: PrimitiveBase,
    vertices_per_curve: Vec<i32>,
    basis: CubicBasis,
    periodic: bool,
}

impl CurvesPrimitive {
    pub fn new(vertices_per_curve: Vec<i32>, basis: CubicBasis, periodic: bool) -> Result<Self> {
        let mut curves = Self::default();
        curves.set_topology(vertices_per_curve, basis, periodic)?;
        Ok(curves)
    }

    /// Replace the topology. Each curve needs enough vertices for the basis.
    pub fn set_topology(&mut self, vertices_per_curve: Vec<i32>, basis: CubicBasis, periodic: bool) -> Result<()> {
        let min = basis.min_vertices(periodic);
        if let Some(n) = vertices_per_curve.iter().find(|&&n| n < 0 || (n as usize) < min) {
            return Err(Error::argument(format!(
                "curve with {n} vertices, {basis:?} curves need at least {min}"
            )));
        }
        self.vertices_per_curve = vertices_per_curve;
        self.basis = basis;
        self.periodic = periodic;
        Ok(())
    }

    pub fn vertices_per_curve(&self) -> &[i32] {
        &self.vertices_per_curve
    }

    pub fn basis(&self) -> CubicBasis {
        self.basis
    }

    pub fn periodic(&self) -> bool {
        self.periodic
    }

    pub fn num_curves(&self) -> usize {
        self.vertices_per_curve.len()
    }

    /// Segment count of a curve with `num_vertices` vertices.
    pub fn num_segments(&self, num_vertices: usize) -> usize {
        if self.basis.is_linear() {
            return if self.periodic {
                num_vertices
            } else {
                num_vertices.saturating_sub(1)
            };
        }
        let step = self.basis.step();
        if self.periodic {
            num_vertices / step
        } else if num_vertices < 4 {
            0
        } else {
            (num_vertices - 4) / step + 1
        }
    }

    fn counts(&self) -> impl Iterator<Item = usize> + '_ {
        self.vertices_per_curve.iter().map(|&n| n.max(0) as usize)
    }
}

impl VisibleRenderable for CurvesPrimitive {
    fn render(&self, renderer: &mut dyn Renderer) -> Result<()> {
        renderer.curves(self.basis, self.periodic, &self.vertices_per_curve, &self.base.variables)
    }

    fn bound(&self) -> Box3f {
        self.base.bound()
    }
}

impl Primitive for CurvesPrimitive {
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
            Interpolation::Uniform => self.num_curves(),
            Interpolation::Vertex => self.counts().sum(),
            Interpolation::Varying | Interpolation::FaceVarying => {
                let end = usize::from(!self.periodic);
                self.counts().map(|n| self.num_segments(n) + end).sum()
            }
        }
    }
}

impl Object for CurvesPrimitive {
    object_accessors!(CURVES_PRIMITIVE);

    fn copy_from(&mut self, other: &dyn Object, ctx: &mut CopyContext) -> Result<()> {
        let other = object::expect_type::<Self>(&CURVES_PRIMITIVE, other)?;
        self.base.copy_from(&other.base, ctx)?;
        self.vertices_per_curve = other.vertices_per_curve.clone();
        self.basis = other.basis;
        self.periodic = other.periodic;
        Ok(())
    }

    fn is_equal_to(&self, other: &dyn Object) -> bool {
        object::is_equal_to(self, other)
            && other.downcast_ref::<Self>().is_some_and(|o| {
                o.basis == self.basis
                    && o.periodic == self.periodic
                    && o.vertices_per_curve == self.vertices_per_curve
                    && self.base.is_equal_to(&o.base)
            })
    }

    fn hash(&self, h: &mut MurmurHash) {
        object::hash(self, h);
        self.base.hash(h);
        h.append(self.vertices_per_curve.as_slice());
        h.append(&(self.basis as i32));
        h.append(&self.periodic);
    }

    fn memory_usage(&self, acc: &mut MemoryAccumulator) {
        object::memory_usage(acc);
        self.base.memory_usage(acc);
        acc.accumulate(self.vertices_per_curve.capacity() * size_of::<i32>() + size_of::<CubicBasis>() + 1);
    }

    fn save(&self, ctx: &mut SaveContext<'_>) -> Result<()> {
        self.base.save(ctx)?;
        let container = ctx.container(CURVES_PRIMITIVE.name, IO_VERSION)?;
        container.write_value(VERTICES_PER_CURVE_ENTRY, self.vertices_per_curve.clone())?;
        container.write_value(BASIS_ENTRY, self.basis as i32)?;
        container.write_value(PERIODIC_ENTRY, u8::from(self.periodic))
    }

    fn load(&mut self, ctx: &mut LoadContext<'_>) -> Result<()> {
        self.base.load(ctx)?;
        let mut version = IO_VERSION;
        let container = ctx.container(CURVES_PRIMITIVE.name, &mut version)?;
        let vertices_per_curve: Vec<i32> = container.read_value(VERTICES_PER_CURVE_ENTRY)?;
        let code = container.read_i32(BASIS_ENTRY)?;
        let basis = CubicBasis::from_i32(code).ok_or_else(|| Error::invalid(format!("unknown curve basis {code}")))?;
        let periodic = container.read_value::<u8>(PERIODIC_ENTRY)? != 0;
        self.set_topology(vertices_per_curve, basis, periodic)
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

impl ObjectType for CurvesPrimitive {
    fn static_description() -> &'static TypeDescription {
        &CURVES_PRIMITIVE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_sizes() {
        let c = CurvesPrimitive::new(vec![2, 4], CubicBasis::Linear, false).unwrap();
        assert_eq!(c.variable_size(Interpolation::Uniform), 2);
        assert_eq!(c.variable_size(Interpolation::Vertex), 6);
        // segments 1 + 3, plus one end each
        assert_eq!(c.variable_size(Interpolation::Varying), 6);

        let c = CurvesPrimitive::new(vec![4], CubicBasis::Linear, true).unwrap();
        assert_eq!(c.variable_size(Interpolation::Varying), 4);
    }

    #[test]
    fn test_cubic_sizes() {
        let c = CurvesPrimitive::new(vec![7], CubicBasis::Bezier, false).unwrap();
        assert_eq!(c.num_segments(7), 2);
        assert_eq!(c.variable_size(Interpolation::Varying), 3);

        let c = CurvesPrimitive::new(vec![6, 4], CubicBasis::BSpline, false).unwrap();
        assert_eq!(c.variable_size(Interpolation::FaceVarying), 4 + 2);

        let c = CurvesPrimitive::new(vec![6], CubicBasis::CatmullRom, true).unwrap();
        assert_eq!(c.variable_size(Interpolation::Varying), 6);
    }

    #[test]
    fn test_topology_validation() {
        assert!(CurvesPrimitive::new(vec![1], CubicBasis::Linear, false).is_err());
        assert!(CurvesPrimitive::new(vec![3], CubicBasis::BSpline, false).is_err());
        assert!(CurvesPrimitive::new(vec![3], CubicBasis::BSpline, true).is_ok());
        assert!(CurvesPrimitive::new(vec![-4], CubicBasis::Linear, false).is_err());
    }

    #[test]
    fn test_basis_changes_hash() {
        let a = crate::core::ObjectPtr::new(CurvesPrimitive::new(vec![4], CubicBasis::BSpline, false).unwrap());
        let b = crate::core::ObjectPtr::new(CurvesPrimitive::new(vec![4], CubicBasis::CatmullRom, false).unwrap());
        assert!(!a.is_equal_to(&b));
        assert_ne!(a.hash(), b.hash());
    }
}
