//! Objects wrapping a single typed value or a vector of values.

use std::fmt;
use std::mem::size_of;

use half::f16;
use serde_json::Value;

use crate::core::object::{self, object_accessors};
use crate::core::{
    CopyContext, LoadContext, MemoryAccumulator, Object, ObjectType, SaveContext, TypeDescription,
    TypeId, DATA,
};
use crate::hash::MurmurHash;
use crate::io::{Leaf, LeafValue};
use crate::util::{Box3f, DVec3, Error, InternedString, Mat4, Quat, Result, Vec2, Vec3};

const IO_VERSION: u32 = 1;
const VALUE_ENTRY: &str = "value";

/// Capabilities shared by every data object, independent of its value type.
pub trait Data: Send + Sync {
    /// Element count of vector data, `None` for simple data.
    fn array_len(&self) -> Option<usize>;

    /// JSON rendition of the value.
    fn to_json(&self) -> Value;
}

/// A value type that can be held by [`TypedData`].
pub trait DataValue: Clone + PartialEq + fmt::Debug + Default + Send + Sync + 'static {
    fn description() -> &'static TypeDescription;

    fn hash_value(&self, h: &mut MurmurHash);

    /// Heap bytes owned beyond `size_of::<Self>()`.
    fn heap_size(&self) -> usize;

    fn to_leaf(&self) -> Leaf;

    fn from_leaf(leaf: Leaf) -> Result<Self>;

    fn to_json(&self) -> Value;

    fn array_len(&self) -> Option<usize> {
        None
    }
}

/// An object holding one value of `T`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TypedData<T: DataValue> {
    value: T,
}

impl<T: DataValue> TypedData<T> {
    pub fn new(value: T) -> Self {
        Self { value }
    }

    #[inline]
    pub fn value(&self) -> &T {
        &self.value
    }

    #[inline]
    pub fn value_mut(&mut self) -> &mut T {
        &mut self.value
    }

    pub fn set_value(&mut self, value: T) {
        self.value = value;
    }

    pub fn into_inner(self) -> T {
        self.value
    }
}

impl<T: DataValue> From<T> for TypedData<T> {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

impl<T: DataValue> Object for TypedData<T> {
    object_accessors!(*T::description());

    fn copy_from(&mut self, other: &dyn Object, _ctx: &mut CopyContext) -> Result<()> {
        let other = object::expect_type::<Self>(T::description(), other)?;
        self.value = other.value.clone();
        Ok(())
    }

    fn is_equal_to(&self, other: &dyn Object) -> bool {
        object::is_equal_to(self, other)
            && other
                .downcast_ref::<Self>()
                .is_some_and(|o| o.value == self.value)
    }

    fn hash(&self, h: &mut MurmurHash) {
        object::hash(self, h);
        self.value.hash_value(h);
    }

    fn memory_usage(&self, acc: &mut MemoryAccumulator) {
        object::memory_usage(acc);
        acc.accumulate(size_of::<T>() + self.value.heap_size());
    }

    fn save(&self, ctx: &mut SaveContext<'_>) -> Result<()> {
        let container = ctx.container(T::description().name, IO_VERSION)?;
        container.write(VALUE_ENTRY, self.value.to_leaf())
    }

    fn load(&mut self, ctx: &mut LoadContext<'_>) -> Result<()> {
        let mut version = IO_VERSION;
        let container = ctx.container(T::description().name, &mut version)?;
        self.value = T::from_leaf(container.read(VALUE_ENTRY)?)?;
        Ok(())
    }

    fn as_data(&self) -> Option<&dyn Data> {
        Some(self)
    }
}

impl<T: DataValue> ObjectType for TypedData<T> {
    fn static_description() -> &'static TypeDescription {
        T::description()
    }
}

impl<T: DataValue> Data for TypedData<T> {
    fn array_len(&self) -> Option<usize> {
        self.value.array_len()
    }

    fn to_json(&self) -> Value {
        self.value.to_json()
    }
}

fn leaf_mismatch(expected: &str, leaf: &Leaf) -> Error {
    Error::EntryTypeMismatch {
        name: VALUE_ENTRY.to_string(),
        expected: expected.to_string(),
        actual: leaf.data_type().to_string(),
    }
}

// ============================================================================
// Element encodings
// ============================================================================

/// Per-element encoding shared by the simple and vector forms of a type.
trait Element: Clone + Sized {
    const LEAF_NAME: &'static str;

    fn hash_slice(values: &[Self], h: &mut MurmurHash);

    fn heap(&self) -> usize {
        0
    }

    fn encode_one(&self) -> Leaf;

    fn encode(values: &[Self]) -> Leaf;

    fn decode_one(leaf: Leaf) -> Result<Self>;

    fn decode(leaf: Leaf) -> Result<Vec<Self>>;

    fn json(&self) -> Value;
}

macro_rules! leaf_element {
    ($($t:ty: $name:literal, |$v:ident| $json:expr, |$h:ident| $heap:expr;)*) => {$(
        impl Element for $t {
            const LEAF_NAME: &'static str = $name;

            fn hash_slice(values: &[Self], h: &mut MurmurHash) {
                h.append(values);
            }

            fn heap(&self) -> usize {
                let $h = self;
                $heap
            }

            fn encode_one(&self) -> Leaf {
                self.clone().into_leaf()
            }

            fn encode(values: &[Self]) -> Leaf {
                values.to_vec().into_leaf()
            }

            fn decode_one(leaf: Leaf) -> Result<Self> {
                <$t as LeafValue>::from_leaf(leaf).map_err(|l| leaf_mismatch($name, &l))
            }

            fn decode(leaf: Leaf) -> Result<Vec<Self>> {
                <Vec<$t> as LeafValue>::from_leaf(leaf).map_err(|l| leaf_mismatch($name, &l))
            }

            fn json(&self) -> Value {
                let $v = self;
                $json
            }
        }
    )*};
}

leaf_element! {
    i32: "Int", |v| Value::from(*v), |_s| 0;
    u32: "UInt", |v| Value::from(*v), |_s| 0;
    i64: "Int64", |v| Value::from(*v), |_s| 0;
    u64: "UInt64", |v| Value::from(*v), |_s| 0;
    f16: "Half", |v| Value::from(v.to_f32()), |_s| 0;
    f32: "Float", |v| Value::from(*v), |_s| 0;
    f64: "Double", |v| Value::from(*v), |_s| 0;
    String: "String", |v| Value::from(v.as_str()), |s| s.capacity();
    InternedString: "InternedString", |v| Value::from(v.as_str()), |_s| 0;
}

impl Element for bool {
    const LEAF_NAME: &'static str = "UChar";

    fn hash_slice(values: &[Self], h: &mut MurmurHash) {
        h.append(values);
    }

    fn encode_one(&self) -> Leaf {
        Leaf::UChar(u8::from(*self))
    }

    fn encode(values: &[Self]) -> Leaf {
        Leaf::UCharArray(values.iter().map(|b| u8::from(*b)).collect())
    }

    fn decode_one(leaf: Leaf) -> Result<Self> {
        match leaf {
            Leaf::UChar(v) => Ok(v != 0),
            other => Err(leaf_mismatch(Self::LEAF_NAME, &other)),
        }
    }

    fn decode(leaf: Leaf) -> Result<Vec<Self>> {
        match leaf {
            Leaf::UCharArray(v) => Ok(v.into_iter().map(|b| b != 0).collect()),
            other => Err(leaf_mismatch("UCharArray", &other)),
        }
    }

    fn json(&self) -> Value {
        Value::Bool(*self)
    }
}

// Math types are stored as flat arrays of their components.
macro_rules! component_element {
    ($($t:ty: $leaf:ident($s:ty) x $n:literal, |$v:ident| $flat:expr, |$c:ident| $build:expr;)*) => {$(
        impl Element for $t {
            const LEAF_NAME: &'static str = stringify!($leaf);

            fn hash_slice(values: &[Self], h: &mut MurmurHash) {
                h.append(values);
            }

            fn encode_one(&self) -> Leaf {
                Self::encode(std::slice::from_ref(self))
            }

            fn encode(values: &[Self]) -> Leaf {
                Leaf::$leaf(values.iter().flat_map(|$v| $flat).collect())
            }

            fn decode_one(leaf: Leaf) -> Result<Self> {
                let mut values = Self::decode(leaf)?;
                match values.len() {
                    1 => Ok(values.remove(0)),
                    n => Err(Error::invalid(format!(
                        "{}: expected one value, found {}",
                        stringify!($t),
                        n
                    ))),
                }
            }

            fn decode(leaf: Leaf) -> Result<Vec<Self>> {
                let components: Vec<$s> = match leaf {
                    Leaf::$leaf(v) => v,
                    other => return Err(leaf_mismatch(Self::LEAF_NAME, &other)),
                };
                if components.len() % $n != 0 {
                    return Err(Error::invalid(format!(
                        "{}: {} components is not a multiple of {}",
                        stringify!($t),
                        components.len(),
                        $n
                    )));
                }
                Ok(components.chunks_exact($n).map(|$c| $build).collect())
            }

            fn json(&self) -> Value {
                let $v = self;
                Value::from($flat.to_vec())
            }
        }
    )*};
}

component_element! {
    Vec2: FloatArray(f32) x 2, |v| v.to_array(), |c| Vec2::from_slice(c);
    Vec3: FloatArray(f32) x 3, |v| v.to_array(), |c| Vec3::from_slice(c);
    DVec3: DoubleArray(f64) x 3, |v| v.to_array(), |c| DVec3::from_slice(c);
    Quat: FloatArray(f32) x 4, |v| v.to_array(), |c| Quat::from_slice(c);
    Mat4: FloatArray(f32) x 16, |v| v.to_cols_array(), |c| Mat4::from_cols_slice(c);
    Box3f: FloatArray(f32) x 6,
        |v| [v.min.x, v.min.y, v.min.z, v.max.x, v.max.y, v.max.z],
        |c| Box3f::new(Vec3::from_slice(&c[..3]), Vec3::from_slice(&c[3..]));
}

// ============================================================================
// Registered data types
// ============================================================================

macro_rules! data_types {
    ($($t:ty => $simple:ident / $vector:ident,
        $simple_desc:ident($simple_id:ident, $simple_name:literal),
        $vector_desc:ident($vector_id:ident, $vector_name:literal);)*) => {
        $(
            pub static $simple_desc: TypeDescription =
                TypeDescription::new(TypeId::$simple_id, $simple_name, Some(&DATA));
            pub static $vector_desc: TypeDescription =
                TypeDescription::new(TypeId::$vector_id, $vector_name, Some(&DATA));

            pub type $simple = TypedData<$t>;
            pub type $vector = TypedData<Vec<$t>>;

            impl DataValue for $t {
                fn description() -> &'static TypeDescription {
                    &$simple_desc
                }

                fn hash_value(&self, h: &mut MurmurHash) {
                    <$t as Element>::hash_slice(std::slice::from_ref(self), h);
                }

                fn heap_size(&self) -> usize {
                    self.heap()
                }

                fn to_leaf(&self) -> Leaf {
                    self.encode_one()
                }

                fn from_leaf(leaf: Leaf) -> Result<Self> {
                    <$t as Element>::decode_one(leaf)
                }

                fn to_json(&self) -> Value {
                    self.json()
                }
            }

            impl DataValue for Vec<$t> {
                fn description() -> &'static TypeDescription {
                    &$vector_desc
                }

                fn hash_value(&self, h: &mut MurmurHash) {
                    <$t as Element>::hash_slice(self, h);
                }

                fn heap_size(&self) -> usize {
                    self.capacity() * size_of::<$t>() + self.iter().map(Element::heap).sum::<usize>()
                }

                fn to_leaf(&self) -> Leaf {
                    <$t as Element>::encode(self)
                }

                fn from_leaf(leaf: Leaf) -> Result<Self> {
                    <$t as Element>::decode(leaf)
                }

                fn to_json(&self) -> Value {
                    Value::Array(self.iter().map(Element::json).collect())
                }

                fn array_len(&self) -> Option<usize> {
                    Some(self.len())
                }
            }
        )*

        /// Register every typed data type.
        pub(crate) fn register_types(registry: &crate::core::TypeRegistry) {
            $(
                registry.register::<$simple>();
                registry.register::<$vector>();
            )*
        }
    };
}

data_types! {
    bool => BoolData / BoolVectorData,
        BOOL_DATA(BOOL_DATA, "BoolData"),
        BOOL_VECTOR_DATA(BOOL_VECTOR_DATA, "BoolVectorData");
    i32 => IntData / IntVectorData,
        INT_DATA(INT_DATA, "IntData"),
        INT_VECTOR_DATA(INT_VECTOR_DATA, "IntVectorData");
    u32 => UIntData / UIntVectorData,
        UINT_DATA(UINT_DATA, "UIntData"),
        UINT_VECTOR_DATA(UINT_VECTOR_DATA, "UIntVectorData");
    i64 => Int64Data / Int64VectorData,
        INT64_DATA(INT64_DATA, "Int64Data"),
        INT64_VECTOR_DATA(INT64_VECTOR_DATA, "Int64VectorData");
    u64 => UInt64Data / UInt64VectorData,
        UINT64_DATA(UINT64_DATA, "UInt64Data"),
        UINT64_VECTOR_DATA(UINT64_VECTOR_DATA, "UInt64VectorData");
    f16 => HalfData / HalfVectorData,
        HALF_DATA(HALF_DATA, "HalfData"),
        HALF_VECTOR_DATA(HALF_VECTOR_DATA, "HalfVectorData");
    f32 => FloatData / FloatVectorData,
        FLOAT_DATA(FLOAT_DATA, "FloatData"),
        FLOAT_VECTOR_DATA(FLOAT_VECTOR_DATA, "FloatVectorData");
    f64 => DoubleData / DoubleVectorData,
        DOUBLE_DATA(DOUBLE_DATA, "DoubleData"),
        DOUBLE_VECTOR_DATA(DOUBLE_VECTOR_DATA, "DoubleVectorData");
    String => StringData / StringVectorData,
        STRING_DATA(STRING_DATA, "StringData"),
        STRING_VECTOR_DATA(STRING_VECTOR_DATA, "StringVectorData");
    InternedString => InternedStringData / InternedStringVectorData,
        INTERNED_STRING_DATA(INTERNED_STRING_DATA, "InternedStringData"),
        INTERNED_STRING_VECTOR_DATA(INTERNED_STRING_VECTOR_DATA, "InternedStringVectorData");
    Vec2 => V2fData / V2fVectorData,
        V2F_DATA(V2F_DATA, "V2fData"),
        V2F_VECTOR_DATA(V2F_VECTOR_DATA, "V2fVectorData");
    Vec3 => V3fData / V3fVectorData,
        V3F_DATA(V3F_DATA, "V3fData"),
        V3F_VECTOR_DATA(V3F_VECTOR_DATA, "V3fVectorData");
    DVec3 => V3dData / V3dVectorData,
        V3D_DATA(V3D_DATA, "V3dData"),
        V3D_VECTOR_DATA(V3D_VECTOR_DATA, "V3dVectorData");
    Quat => QuatfData / QuatfVectorData,
        QUATF_DATA(QUATF_DATA, "QuatfData"),
        QUATF_VECTOR_DATA(QUATF_VECTOR_DATA, "QuatfVectorData");
    Mat4 => M44fData / M44fVectorData,
        M44F_DATA(M44F_DATA, "M44fData"),
        M44F_VECTOR_DATA(M44F_VECTOR_DATA, "M44fVectorData");
    Box3f => Box3fData / Box3fVectorData,
        BOX3F_DATA(BOX3F_DATA, "Box3fData"),
        BOX3F_VECTOR_DATA(BOX3F_VECTOR_DATA, "Box3fVectorData");
}
