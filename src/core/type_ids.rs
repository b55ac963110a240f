//! Runtime type identity for objects.
//!
//! Every object type, abstract or concrete, has a dense numeric [`TypeId`],
//! a name and an optional base. Built-in ids are grouped:
//!
//! - `1..=99` - object model, containers, rendering and geometry
//! - `100..=149` - simple typed data
//! - `150..=199` - vector typed data

use std::fmt;

/// Dense integer identifying an object type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TypeId(pub u32);

impl TypeId {
    pub const INVALID: Self = Self(0);
    pub const OBJECT: Self = Self(1);
    pub const DATA: Self = Self(2);
    pub const COMPOUND_OBJECT: Self = Self(3);
    pub const OBJECT_VECTOR: Self = Self(4);
    pub const OBJECT_MATRIX: Self = Self(5);
    pub const RENDERABLE: Self = Self(6);
    pub const VISIBLE_RENDERABLE: Self = Self(7);
    pub const STATE_RENDERABLE: Self = Self(8);
    pub const TRANSFORM: Self = Self(9);
    pub const MATRIX_TRANSFORM: Self = Self(10);
    pub const ATTRIBUTE_STATE: Self = Self(11);
    pub const GROUP: Self = Self(12);
    pub const PRIMITIVE: Self = Self(13);
    pub const POINTS_PRIMITIVE: Self = Self(14);
    pub const CURVES_PRIMITIVE: Self = Self(15);
    pub const MESH_PRIMITIVE: Self = Self(16);
    pub const DISK_PRIMITIVE: Self = Self(17);
    pub const NURBS_PRIMITIVE: Self = Self(18);

    pub const BOOL_DATA: Self = Self(100);
    pub const INT_DATA: Self = Self(101);
    pub const UINT_DATA: Self = Self(102);
    pub const INT64_DATA: Self = Self(103);
    pub const UINT64_DATA: Self = Self(104);
    pub const HALF_DATA: Self = Self(105);
    pub const FLOAT_DATA: Self = Self(106);
    pub const DOUBLE_DATA: Self = Self(107);
    pub const STRING_DATA: Self = Self(108);
    pub const INTERNED_STRING_DATA: Self = Self(109);
    pub const V2F_DATA: Self = Self(110);
    pub const V3F_DATA: Self = Self(111);
    pub const V3D_DATA: Self = Self(112);
    pub const QUATF_DATA: Self = Self(113);
    pub const M44F_DATA: Self = Self(114);
    pub const BOX3F_DATA: Self = Self(115);

    pub const BOOL_VECTOR_DATA: Self = Self(150);
    pub const INT_VECTOR_DATA: Self = Self(151);
    pub const UINT_VECTOR_DATA: Self = Self(152);
    pub const INT64_VECTOR_DATA: Self = Self(153);
    pub const UINT64_VECTOR_DATA: Self = Self(154);
    pub const HALF_VECTOR_DATA: Self = Self(155);
    pub const FLOAT_VECTOR_DATA: Self = Self(156);
    pub const DOUBLE_VECTOR_DATA: Self = Self(157);
    pub const STRING_VECTOR_DATA: Self = Self(158);
    pub const INTERNED_STRING_VECTOR_DATA: Self = Self(159);
    pub const V2F_VECTOR_DATA: Self = Self(160);
    pub const V3F_VECTOR_DATA: Self = Self(161);
    pub const V3D_VECTOR_DATA: Self = Self(162);
    pub const QUATF_VECTOR_DATA: Self = Self(163);
    pub const M44F_VECTOR_DATA: Self = Self(164);
    pub const BOX3F_VECTOR_DATA: Self = Self(165);

    #[inline]
    pub const fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Static description of one object type and its place in the hierarchy.
#[derive(Debug)]
pub struct TypeDescription {
    pub id: TypeId,
    pub name: &'static str,
    pub base: Option<&'static TypeDescription>,
}

impl TypeDescription {
    pub const fn new(id: TypeId, name: &'static str, base: Option<&'static TypeDescription>) -> Self {
        Self { id, name, base }
    }

    /// True when this type is `id` or derives from it.
    pub fn is_a(&self, id: TypeId) -> bool {
        let mut current = Some(self);
        while let Some(desc) = current {
            if desc.id == id {
                return true;
            }
            current = desc.base;
        }
        false
    }

    /// True when this type derives from `name` (or is it).
    pub fn is_a_named(&'static self, name: &str) -> bool {
        self.ancestors().any(|d| d.name == name)
    }

    /// This type followed by its bases, most derived first.
    pub fn ancestors(&'static self) -> impl Iterator<Item = &'static TypeDescription> {
        std::iter::successors(Some(self), |d| d.base)
    }
}

/// Root of the hierarchy.
pub static OBJECT: TypeDescription = TypeDescription::new(TypeId::OBJECT, "Object", None);

/// Base of all typed data.
pub static DATA: TypeDescription = TypeDescription::new(TypeId::DATA, "Data", Some(&OBJECT));

pub static RENDERABLE: TypeDescription =
    TypeDescription::new(TypeId::RENDERABLE, "Renderable", Some(&OBJECT));

pub static VISIBLE_RENDERABLE: TypeDescription =
    TypeDescription::new(TypeId::VISIBLE_RENDERABLE, "VisibleRenderable", Some(&RENDERABLE));

pub static STATE_RENDERABLE: TypeDescription =
    TypeDescription::new(TypeId::STATE_RENDERABLE, "StateRenderable", Some(&RENDERABLE));

pub static TRANSFORM: TypeDescription =
    TypeDescription::new(TypeId::TRANSFORM, "Transform", Some(&STATE_RENDERABLE));

pub static PRIMITIVE: TypeDescription =
    TypeDescription::new(TypeId::PRIMITIVE, "Primitive", Some(&VISIBLE_RENDERABLE));

/// Types that exist only as bases and cannot be instantiated.
pub fn abstract_types() -> [&'static TypeDescription; 7] {
    [
        &OBJECT,
        &DATA,
        &RENDERABLE,
        &VISIBLE_RENDERABLE,
        &STATE_RENDERABLE,
        &TRANSFORM,
        &PRIMITIVE,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hierarchy_walk() {
        assert!(PRIMITIVE.is_a(TypeId::OBJECT));
        assert!(PRIMITIVE.is_a(TypeId::VISIBLE_RENDERABLE));
        assert!(!PRIMITIVE.is_a(TypeId::STATE_RENDERABLE));
        assert!(TRANSFORM.is_a_named("Renderable"));

        let names: Vec<_> = TRANSFORM.ancestors().map(|d| d.name).collect();
        assert_eq!(names, ["Transform", "StateRenderable", "Renderable", "Object"]);
    }

    #[test]
    fn test_display() {
        assert_eq!(TypeId::GROUP.to_string(), "12");
        assert_eq!(TypeId(4242).value(), 4242);
    }
}
