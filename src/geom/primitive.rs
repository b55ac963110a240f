//! Primitive variables and the behaviour shared by every primitive.
//!
//! A primitive holds named [`PrimitiveVariable`]s whose element count is
//! tied to the primitive's topology through an [`Interpolation`] class.
//! Concrete primitives embed a [`PrimitiveBase`] and call its helpers from
//! their own `Object` implementation before handling their topology.

use std::collections::BTreeMap;
use std::fmt;
use std::mem::size_of;

use tracing::debug;

use crate::core::{CopyContext, LoadContext, MemoryAccumulator, ObjectPtr, SaveContext};
use crate::data::{FloatVectorData, IntVectorData, V2fVectorData, V3fVectorData};
use crate::hash::MurmurHash;
use crate::render::VisibleRenderable;
use crate::util::{Box3f, Error, Result, Vec2};

/// Stored version of the primitive variable layer.
pub const PRIMITIVE_IO_VERSION: u32 = 2;

const PRIMITIVE_TYPE_NAME: &str = "Primitive";
const VARIABLES_ENTRY: &str = "variables";
const INTERPOLATION_ENTRY: &str = "interpolation";
const DATA_ENTRY: &str = "data";
const INDICES_ENTRY: &str = "indices";

/// How many elements a primitive variable carries relative to topology.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(i32)]
pub enum Interpolation {
    #[default]
    Invalid = 0,
    /// One value for the whole primitive.
    Constant = 1,
    /// One value per face, curve or patch.
    Uniform = 2,
    /// One value per control vertex.
    Vertex = 3,
    /// One value per segment end, interpolated linearly.
    Varying = 4,
    /// One value per face corner.
    FaceVarying = 5,
}

impl Interpolation {
    /// Parse the stored integer code.
    pub fn from_i32(v: i32) -> Option<Self> {
        match v {
            0 => Some(Self::Invalid),
            1 => Some(Self::Constant),
            2 => Some(Self::Uniform),
            3 => Some(Self::Vertex),
            4 => Some(Self::Varying),
            5 => Some(Self::FaceVarying),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Invalid => "Invalid",
            Self::Constant => "Constant",
            Self::Uniform => "Uniform",
            Self::Vertex => "Vertex",
            Self::Varying => "Varying",
            Self::FaceVarying => "FaceVarying",
        }
    }
}

impl fmt::Display for Interpolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named value on a primitive.
///
/// `indices`, when present, is an `IntVectorData` mapping each element to
/// a position in `data`.
#[derive(Clone, Debug, Default)]
pub struct PrimitiveVariable {
    pub interpolation: Interpolation,
    pub data: Option<ObjectPtr>,
    pub indices: Option<ObjectPtr>,
}

impl PrimitiveVariable {
    pub fn new(interpolation: Interpolation, data: ObjectPtr) -> Self {
        Self {
            interpolation,
            data: Some(data),
            indices: None,
        }
    }

    pub fn indexed(interpolation: Interpolation, data: ObjectPtr, indices: ObjectPtr) -> Self {
        Self {
            interpolation,
            data: Some(data),
            indices: Some(indices),
        }
    }

    fn is_equal_to(&self, other: &Self) -> bool {
        use crate::core::object::option_ptr_eq;
        self.interpolation == other.interpolation
            && option_ptr_eq(&self.data, &other.data)
            && option_ptr_eq(&self.indices, &other.indices)
    }
}

/// Variables of a primitive, ordered by name.
pub type PrimitiveVariableMap = BTreeMap<String, PrimitiveVariable>;

/// Element count of array data, `None` for anything else.
fn array_len(object: &ObjectPtr) -> Option<usize> {
    object.read().as_data().and_then(|d| d.array_len())
}

/// State and persistence shared by all primitives.
#[derive(Clone, Debug, Default)]
pub struct PrimitiveBase {
    pub variables: PrimitiveVariableMap,
}

impl PrimitiveBase {
    pub fn copy_from(&mut self, other: &PrimitiveBase, ctx: &mut CopyContext) -> Result<()> {
        let mut variables = PrimitiveVariableMap::new();
        for (name, var) in &other.variables {
            let data = var
                .data
                .as_ref()
                .ok_or_else(|| Error::NullChild(format!("primitive variable {name} has no data")))?;
            variables.insert(
                name.clone(),
                PrimitiveVariable {
                    interpolation: var.interpolation,
                    data: Some(ctx.copy(data)?),
                    indices: var.indices.as_ref().map(|i| ctx.copy(i)).transpose()?,
                },
            );
        }
        self.variables = variables;
        Ok(())
    }

    pub fn is_equal_to(&self, other: &PrimitiveBase) -> bool {
        self.variables.len() == other.variables.len()
            && self
                .variables
                .iter()
                .zip(&other.variables)
                .all(|((na, a), (nb, b))| na == nb && a.is_equal_to(b))
    }

    pub fn hash(&self, h: &mut MurmurHash) {
        for (name, var) in &self.variables {
            h.append(name.as_str());
            h.append(&(var.interpolation as i32));
            for part in [&var.data, &var.indices] {
                match part {
                    Some(p) => {
                        h.append(&1u8);
                        p.read().hash(h);
                    }
                    None => {
                        h.append(&0u8);
                    }
                }
            }
        }
    }

    pub fn memory_usage(&self, acc: &mut MemoryAccumulator) {
        for (name, var) in &self.variables {
            acc.accumulate(name.capacity() + size_of::<PrimitiveVariable>());
            for p in var.data.iter().chain(&var.indices) {
                acc.accumulate_object(p);
            }
        }
    }

    pub fn save(&self, ctx: &mut SaveContext<'_>) -> Result<()> {
        let container = ctx.container(PRIMITIVE_TYPE_NAME, PRIMITIVE_IO_VERSION)?;
        let variables = container.create_subdirectory(VARIABLES_ENTRY)?;
        for (name, var) in &self.variables {
            let data = var
                .data
                .as_ref()
                .ok_or_else(|| Error::NullChild(format!("primitive variable {name} has no data")))?;
            let dir = variables.create_subdirectory(name)?;
            dir.write_value(INTERPOLATION_ENTRY, var.interpolation as i32)?;
            ctx.save(data, &dir, DATA_ENTRY)?;
            if let Some(indices) = &var.indices {
                ctx.save(indices, &dir, INDICES_ENTRY)?;
            }
        }
        Ok(())
    }

    /// Load the variable layer, migrating layouts older than the current version.
    pub fn load(&mut self, ctx: &mut LoadContext<'_>) -> Result<()> {
        let mut version = PRIMITIVE_IO_VERSION;
        let container = ctx.container(PRIMITIVE_TYPE_NAME, &mut version)?;
        let variables = container.subdirectory(VARIABLES_ENTRY)?;

        let mut loaded = PrimitiveVariableMap::new();
        for name in variables.entry_ids() {
            let dir = variables.subdirectory(&name)?;
            let code = dir.read_i32(INTERPOLATION_ENTRY)?;
            let interpolation = Interpolation::from_i32(code)
                .ok_or_else(|| Error::invalid(format!("variable {name}: unknown interpolation {code}")))?;
            let data = ctx.load(&dir, DATA_ENTRY)?;
            let indices = if dir.has_entry(INDICES_ENTRY) {
                Some(ctx.load(&dir, INDICES_ENTRY)?)
            } else {
                None
            };
            loaded.insert(
                name.to_string(),
                PrimitiveVariable {
                    interpolation,
                    data: Some(data),
                    indices,
                },
            );
        }

        self.variables = migrate_variables(version, loaded)?;
        Ok(())
    }

    /// Bound of the `P` variable when it holds points.
    pub fn bound(&self) -> Box3f {
        self.variables
            .get("P")
            .and_then(|v| v.data.as_ref())
            .and_then(|d| d.downcast_ref::<V3fVectorData>().map(|p| Box3f::from_points(p.value())))
            .unwrap_or(Box3f::EMPTY)
    }
}

/// A renderable with topology and primitive variables.
pub trait Primitive: VisibleRenderable {
    fn base(&self) -> &PrimitiveBase;

    fn base_mut(&mut self) -> &mut PrimitiveBase;

    /// Expected element count for `interpolation`, derived from topology.
    fn variable_size(&self, interpolation: Interpolation) -> usize;

    fn variables(&self) -> &PrimitiveVariableMap {
        &self.base().variables
    }

    fn variables_mut(&mut self) -> &mut PrimitiveVariableMap {
        &mut self.base_mut().variables
    }

    /// Whether `var` has the element count this primitive's topology implies.
    ///
    /// Never fails; invalid data is reported as `false`.
    fn is_primitive_variable_valid(&self, var: &PrimitiveVariable) -> bool {
        let Some(data) = &var.data else {
            return false;
        };
        match var.interpolation {
            Interpolation::Invalid => return false,
            Interpolation::Constant if var.indices.is_none() => return true,
            _ => {}
        }

        let Some(data_len) = array_len(data) else {
            return false;
        };
        let expected = self.variable_size(var.interpolation);
        match &var.indices {
            None => data_len == expected,
            Some(indices) => indices.downcast_ref::<IntVectorData>().is_some_and(|ids| {
                ids.value().len() == expected
                    && ids.value().iter().all(|&i| i >= 0 && (i as usize) < data_len)
            }),
        }
    }

    fn are_primitive_variables_valid(&self) -> bool {
        self.variables().values().all(|v| self.is_primitive_variable_valid(v))
    }
}

/// Bring variables stored at layer `version` to the current representation.
///
/// Before version 2 indices were stored as separate `<name>Indices`
/// variables and texture coordinates as separate `s` and `t` floats with V
/// pointing down. Variables matching neither pattern pass through.
pub fn migrate_variables(version: u32, mut variables: PrimitiveVariableMap) -> Result<PrimitiveVariableMap> {
    if version >= PRIMITIVE_IO_VERSION {
        return Ok(variables);
    }
    debug!(version, count = variables.len(), "migrate primitive variables");

    let sidecars: Vec<String> = variables
        .iter()
        .filter_map(|(name, var)| {
            let base = name.strip_suffix("Indices")?;
            let is_ids = var.data.as_ref().is_some_and(|d| d.is::<IntVectorData>());
            (is_ids && !base.is_empty() && variables.contains_key(base)).then(|| name.clone())
        })
        .collect();
    for name in sidecars {
        if let Some(sidecar) = variables.remove(&name) {
            let base = &name[..name.len() - "Indices".len()];
            if let Some(target) = variables.get_mut(base) {
                target.indices = sidecar.data;
            }
        }
    }

    if let Some(uv) = combine_st(&variables) {
        variables.remove("s");
        variables.remove("t");
        variables.remove("stIndices");
        variables.insert("uv".to_string(), uv);
    }
    Ok(variables)
}

// Split s/t floats into one uv variable with V flipped.
fn combine_st(variables: &PrimitiveVariableMap) -> Option<PrimitiveVariable> {
    let s = variables.get("s")?;
    let t = variables.get("t")?;
    if s.interpolation != t.interpolation {
        return None;
    }

    let uvs: Vec<Vec2> = {
        let s_data = s.data.as_ref()?.downcast_ref::<FloatVectorData>()?;
        let t_data = t.data.as_ref()?.downcast_ref::<FloatVectorData>()?;
        if s_data.value().len() != t_data.value().len() {
            return None;
        }
        let combined = s_data
            .value()
            .iter()
            .zip(t_data.value())
            .map(|(&u, &v)| Vec2::new(u, 1.0 - v))
            .collect();
        combined
    };

    let indices = match variables.get("stIndices") {
        Some(st) => st.data.clone().filter(|d| d.is::<IntVectorData>()),
        None => s.indices.clone(),
    };
    Some(PrimitiveVariable {
        interpolation: s.interpolation,
        data: Some(ObjectPtr::new(V2fVectorData::new(uvs))),
        indices,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::IntData;

    fn floats(v: &[f32]) -> ObjectPtr {
        ObjectPtr::new(FloatVectorData::new(v.to_vec()))
    }

    fn ints(v: &[i32]) -> ObjectPtr {
        ObjectPtr::new(IntVectorData::new(v.to_vec()))
    }

    #[test]
    fn test_interpolation_codes() {
        for code in 0..=5 {
            assert_eq!(Interpolation::from_i32(code).unwrap() as i32, code);
        }
        assert_eq!(Interpolation::from_i32(6), None);
        assert_eq!(Interpolation::FaceVarying.to_string(), "FaceVarying");
    }

    #[test]
    fn test_current_version_is_identity() {
        let mut vars = PrimitiveVariableMap::new();
        vars.insert("s".into(), PrimitiveVariable::new(Interpolation::Vertex, floats(&[0.5])));
        vars.insert("t".into(), PrimitiveVariable::new(Interpolation::Vertex, floats(&[0.25])));
        let out = migrate_variables(PRIMITIVE_IO_VERSION, vars).unwrap();
        assert!(out.contains_key("s") && out.contains_key("t"));
        assert!(!out.contains_key("uv"));
    }

    #[test]
    fn test_sidecar_indices_are_attached() {
        let mut vars = PrimitiveVariableMap::new();
        vars.insert("N".into(), PrimitiveVariable::new(Interpolation::FaceVarying, floats(&[1.0, 2.0])));
        vars.insert("NIndices".into(), PrimitiveVariable::new(Interpolation::FaceVarying, ints(&[0, 1, 1, 0])));
        vars.insert("orphanIndices".into(), PrimitiveVariable::new(Interpolation::Vertex, ints(&[0])));

        let out = migrate_variables(1, vars).unwrap();
        assert!(!out.contains_key("NIndices"));
        let indices = out["N"].indices.as_ref().unwrap();
        assert_eq!(indices.downcast_ref::<IntVectorData>().unwrap().value(), &[0, 1, 1, 0]);
        assert!(out.contains_key("orphanIndices"));
    }

    #[test]
    fn test_split_uvs_are_combined() {
        let mut vars = PrimitiveVariableMap::new();
        vars.insert("s".into(), PrimitiveVariable::new(Interpolation::FaceVarying, floats(&[0.0, 1.0])));
        vars.insert("t".into(), PrimitiveVariable::new(Interpolation::FaceVarying, floats(&[0.25, 1.0])));
        vars.insert("stIndices".into(), PrimitiveVariable::new(Interpolation::FaceVarying, ints(&[1, 0, 1])));

        let out = migrate_variables(0, vars).unwrap();
        assert_eq!(out.keys().map(String::as_str).collect::<Vec<_>>(), ["uv"]);
        let uv = &out["uv"];
        assert_eq!(uv.interpolation, Interpolation::FaceVarying);
        let data = uv.data.as_ref().unwrap();
        assert_eq!(
            data.downcast_ref::<V2fVectorData>().unwrap().value(),
            &[Vec2::new(0.0, 0.75), Vec2::new(1.0, 0.0)]
        );
        let indices = uv.indices.as_ref().unwrap();
        assert_eq!(indices.downcast_ref::<IntVectorData>().unwrap().value(), &[1, 0, 1]);
    }

    #[test]
    fn test_mismatched_st_left_alone() {
        let mut vars = PrimitiveVariableMap::new();
        vars.insert("s".into(), PrimitiveVariable::new(Interpolation::Vertex, floats(&[0.0, 1.0])));
        vars.insert("t".into(), PrimitiveVariable::new(Interpolation::Vertex, floats(&[0.0])));
        let out = migrate_variables(1, vars).unwrap();
        assert!(out.contains_key("s") && out.contains_key("t"));

        let mut vars = PrimitiveVariableMap::new();
        vars.insert("s".into(), PrimitiveVariable::new(Interpolation::Vertex, floats(&[0.0])));
        vars.insert("t".into(), PrimitiveVariable::new(Interpolation::Vertex, ObjectPtr::new(IntData::new(0))));
        let out = migrate_variables(1, vars).unwrap();
        assert!(!out.contains_key("uv"));
    }

    #[test]
    fn test_base_equality_and_hash() {
        let mut a = PrimitiveBase::default();
        a.variables
            .insert("P".into(), PrimitiveVariable::new(Interpolation::Vertex, floats(&[1.0])));
        let mut b = PrimitiveBase::default();
        b.variables
            .insert("P".into(), PrimitiveVariable::new(Interpolation::Vertex, floats(&[1.0])));
        assert!(a.is_equal_to(&b));

        let hash = |p: &PrimitiveBase| {
            let mut h = MurmurHash::default();
            p.hash(&mut h);
            h
        };
        assert_eq!(hash(&a), hash(&b));

        b.variables.get_mut("P").unwrap().interpolation = Interpolation::Varying;
        assert!(!a.is_equal_to(&b));
        assert_ne!(hash(&a), hash(&b));
    }

    #[test]
    fn test_copy_requires_data() {
        let mut src = PrimitiveBase::default();
        src.variables.insert("x".into(), PrimitiveVariable::default());
        let mut dst = PrimitiveBase::default();
        let mut ctx = CopyContext::new();
        assert!(matches!(dst.copy_from(&src, &mut ctx), Err(Error::NullChild(_))));
    }
}
