//! Renderables and the renderer protocol.
//!
//! - [`Renderer`] - the calls renderables emit, with RAII block guards
//! - [`VisibleRenderable`] / [`StateRenderable`] / [`Transform`] - capabilities
//! - [`Group`] - transform, state and children with parent links
//! - [`MatrixTransform`] / [`AttributeState`] - concrete state

mod attribute_state;
mod group;
mod renderable;
mod renderer;
mod transform;

pub use attribute_state::{AttributeState, ATTRIBUTE_STATE};
pub use group::{Group, GROUP};
pub use renderable::{bound, render, transform_matrix, StateRenderable, Transform, VisibleRenderable};
pub use renderer::{AttributeBlock, MotionBlock, RecordingRenderer, RenderCall, Renderer, TransformBlock};
pub use transform::{MatrixTransform, MATRIX_TRANSFORM};

use crate::core::TypeRegistry;

pub(crate) fn register_types(registry: &TypeRegistry) {
    registry.register::<MatrixTransform>();
    registry.register::<AttributeState>();
    registry.register::<Group>();
}
