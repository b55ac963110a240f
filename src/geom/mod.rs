//! Geometric primitives.
//!
//! Every primitive embeds a [`PrimitiveBase`] holding its named
//! [`PrimitiveVariable`]s and implements [`Primitive::variable_size`] from
//! its own topology:
//!
//! - [`PointsPrimitive`] - unconnected points
//! - [`CurvesPrimitive`] - linear or cubic curves
//! - [`MeshPrimitive`] - polygon meshes
//! - [`DiskPrimitive`] - partial disks
//! - [`NurbsPrimitive`] - NURBS surface patches

mod curves;
mod disk;
mod mesh;
mod nurbs;
mod points;
mod primitive;

pub use curves::{CubicBasis, CurvesPrimitive, CURVES_PRIMITIVE};
pub use disk::{DiskPrimitive, DISK_PRIMITIVE};
pub use mesh::{MeshPrimitive, LINEAR_INTERPOLATION, MESH_PRIMITIVE};
pub use nurbs::{NurbsDirection, NurbsPrimitive, NURBS_PRIMITIVE};
pub use points::{PointsPrimitive, POINTS_PRIMITIVE};
pub use primitive::{
    migrate_variables, Interpolation, Primitive, PrimitiveBase, PrimitiveVariable, PrimitiveVariableMap,
    PRIMITIVE_IO_VERSION,
};

use crate::core::TypeRegistry;

pub(crate) fn register_types(registry: &TypeRegistry) {
    registry.register::<PointsPrimitive>();
    registry.register::<CurvesPrimitive>();
    registry.register::<MeshPrimitive>();
    registry.register::<DiskPrimitive>();
    registry.register::<NurbsPrimitive>();
}
