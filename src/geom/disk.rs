//! Disk quadric primitive.

use std::mem::size_of;

use crate::core::object::{self, object_accessors};
use crate::core::{
    CopyContext, LoadContext, MemoryAccumulator, Object, ObjectType, SaveContext, TypeDescription,
    TypeId, PRIMITIVE,
};
use crate::hash::MurmurHash;
use crate::render::{Renderer, VisibleRenderable};
use crate::util::{Box3f, Result, Vec3};

use super::{Interpolation, Primitive, PrimitiveBase};

pub static DISK_PRIMITIVE: TypeDescription =
    TypeDescription::new(TypeId::DISK_PRIMITIVE, "DiskPrimitive", Some(&PRIMITIVE));

const IO_VERSION: u32 = 0;
const RADIUS_ENTRY: &str = "radius";
const Z_ENTRY: &str = "z";
const THETA_MAX_ENTRY: &str = "thetaMax";

/// A disk of `radius` at height `z`, swept through `theta_max` degrees.
#[derive(Debug)]
pub struct DiskPrimitive {
    base: PrimitiveBase,
    pub radius: f32,
    pub z: f32,
    pub theta_max: f32,
}

impl Default for DiskPrimitive {
    fn default() -> Self {
        Self::new(1.0, 0.0, 360.0)
    }
}

impl DiskPrimitive {
    pub fn new(radius: f32, z: f32, theta_max: f32) -> Self {
        Self {
            base: PrimitiveBase::default(),
            radius,
            z,
            theta_max,
        }
    }
}

impl VisibleRenderable for DiskPrimitive {
    fn render(&self, renderer: &mut dyn Renderer) -> Result<()> {
        renderer.disk(self.radius, self.z, self.theta_max, &self.base.variables)
    }

    fn bound(&self) -> Box3f {
        let r = self.radius.abs();
        Box3f::new(Vec3::new(-r, -r, self.z), Vec3::new(r, r, self.z))
    }
}

impl Primitive for DiskPrimitive {
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
            _ => 4,
        }
    }
}

impl Object for DiskPrimitive {
    object_accessors!(DISK_PRIMITIVE);

    fn copy_from(&mut self, other: &dyn Object, ctx: &mut CopyContext) -> Result<()> {
        let other = object::expect_type::<Self>(&DISK_PRIMITIVE, other)?;
        self.base.copy_from(&other.base, ctx)?;
        self.radius = other.radius;
        self.z = other.z;
        self.theta_max = other.theta_max;
        Ok(())
    }

    fn is_equal_to(&self, other: &dyn Object) -> bool {
        object::is_equal_to(self, other)
            && other.downcast_ref::<Self>().is_some_and(|o| {
                o.radius == self.radius
                    && o.z == self.z
                    && o.theta_max == self.theta_max
                    && self.base.is_equal_to(&o.base)
            })
    }

    fn hash(&self, h: &mut MurmurHash) {
        object::hash(self, h);
        self.base.hash(h);
        h.append(&self.radius).append(&self.z).append(&self.theta_max);
    }

    fn memory_usage(&self, acc: &mut MemoryAccumulator) {
        object::memory_usage(acc);
        self.base.memory_usage(acc);
        acc.accumulate(3 * size_of::<f32>());
    }

    fn save(&self, ctx: &mut SaveContext<'_>) -> Result<()> {
        self.base.save(ctx)?;
        let container = ctx.container(DISK_PRIMITIVE.name, IO_VERSION)?;
        container.write_value(RADIUS_ENTRY, self.radius)?;
        container.write_value(Z_ENTRY, self.z)?;
        container.write_value(THETA_MAX_ENTRY, self.theta_max)
    }

    fn load(&mut self, ctx: &mut LoadContext<'_>) -> Result<()> {
        self.base.load(ctx)?;
        let mut version = IO_VERSION;
        let container = ctx.container(DISK_PRIMITIVE.name, &mut version)?;
        self.radius = container.read_value(RADIUS_ENTRY)?;
        self.z = container.read_value(Z_ENTRY)?;
        self.theta_max = container.read_value(THETA_MAX_ENTRY)?;
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

impl ObjectType for DiskPrimitive {
    fn static_description() -> &'static TypeDescription {
        &DISK_PRIMITIVE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ObjectPtr;
    use crate::render::{RecordingRenderer, RenderCall};

    #[test]
    fn test_defaults_and_bound() {
        let d = DiskPrimitive::default();
        assert_eq!(d.theta_max, 360.0);
        let d = DiskPrimitive::new(2.0, 0.5, 180.0);
        assert_eq!(d.bound(), Box3f::new(Vec3::new(-2.0, -2.0, 0.5), Vec3::new(2.0, 2.0, 0.5)));
        assert_eq!(d.variable_size(Interpolation::Varying), 4);
    }

    #[test]
    fn test_round_trip_and_render() {
        let src = ObjectPtr::new(DiskPrimitive::new(3.0, 1.0, 90.0));
        let io = crate::io::MemoryIndexedIo::create();
        src.save(&io, "disk").unwrap();
        let loaded = ObjectPtr::load(&io, "disk").unwrap();
        assert!(loaded.is_equal_to(&src));

        let mut r = RecordingRenderer::new();
        crate::render::render(&loaded, &mut r).unwrap();
        assert_eq!(r.calls, [RenderCall::Disk { radius: 3.0, z: 1.0, theta_max: 90.0 }]);
    }
}
