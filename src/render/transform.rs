//! A fixed matrix transform.

use crate::core::object::{self, object_accessors};
use crate::core::{
    CopyContext, LoadContext, MemoryAccumulator, Object, ObjectType, SaveContext, TypeDescription,
    TypeId, TRANSFORM,
};
use crate::hash::MurmurHash;
use crate::io::Leaf;
use crate::util::{Error, Mat4, Result};

use super::{Renderer, StateRenderable, Transform};

pub static MATRIX_TRANSFORM: TypeDescription =
    TypeDescription::new(TypeId::MATRIX_TRANSFORM, "MatrixTransform", Some(&TRANSFORM));

const IO_VERSION: u32 = 0;
const MATRIX_ENTRY: &str = "matrix";

/// Transform by a constant matrix.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MatrixTransform {
    pub matrix: Mat4,
}

impl MatrixTransform {
    pub fn new(matrix: Mat4) -> Self {
        Self { matrix }
    }
}

impl StateRenderable for MatrixTransform {
    fn render(&self, renderer: &mut dyn Renderer) -> Result<()> {
        renderer.concat_transform(self.matrix)
    }
}

impl Transform for MatrixTransform {
    fn transform(&self, _time: f32) -> Mat4 {
        self.matrix
    }
}

impl Object for MatrixTransform {
    object_accessors!(MATRIX_TRANSFORM);

    fn copy_from(&mut self, other: &dyn Object, _ctx: &mut CopyContext) -> Result<()> {
        self.matrix = object::expect_type::<Self>(&MATRIX_TRANSFORM, other)?.matrix;
        Ok(())
    }

    fn is_equal_to(&self, other: &dyn Object) -> bool {
        object::is_equal_to(self, other) && other.downcast_ref::<Self>().is_some_and(|o| o == self)
    }

    fn hash(&self, h: &mut MurmurHash) {
        object::hash(self, h);
        h.append(&self.matrix);
    }

    fn memory_usage(&self, acc: &mut MemoryAccumulator) {
        object::memory_usage(acc);
        acc.accumulate(std::mem::size_of::<Mat4>());
    }

    fn save(&self, ctx: &mut SaveContext<'_>) -> Result<()> {
        let container = ctx.container(MATRIX_TRANSFORM.name, IO_VERSION)?;
        container.write(MATRIX_ENTRY, Leaf::FloatArray(self.matrix.to_cols_array().to_vec()))
    }

    fn load(&mut self, ctx: &mut LoadContext<'_>) -> Result<()> {
        let mut version = IO_VERSION;
        let container = ctx.container(MATRIX_TRANSFORM.name, &mut version)?;
        let values: Vec<f32> = container.read_value(MATRIX_ENTRY)?;
        if values.len() != 16 {
            return Err(Error::invalid(format!("matrix has {} elements", values.len())));
        }
        self.matrix = Mat4::from_cols_slice(&values);
        Ok(())
    }

    fn as_state_renderable(&self) -> Option<&dyn StateRenderable> {
        Some(self)
    }

    fn as_transform(&self) -> Option<&dyn Transform> {
        Some(self)
    }
}

impl ObjectType for MatrixTransform {
    fn static_description() -> &'static TypeDescription {
        &MATRIX_TRANSFORM
    }
}
