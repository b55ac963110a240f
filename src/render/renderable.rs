//! Capabilities of objects that can be described to a [`Renderer`].

use super::Renderer;
use crate::core::ObjectPtr;
use crate::util::{Box3f, Error, Mat4, Result};

/// Geometry or hierarchy that produces visible output.
pub trait VisibleRenderable: Send + Sync {
    fn render(&self, renderer: &mut dyn Renderer) -> Result<()>;

    /// Bounding box in object space.
    fn bound(&self) -> Box3f;
}

/// Objects that modify renderer state for the geometry that follows.
pub trait StateRenderable: Send + Sync {
    fn render(&self, renderer: &mut dyn Renderer) -> Result<()>;
}

/// State that changes the current transform.
pub trait Transform: StateRenderable {
    /// Local matrix at `time`.
    fn transform(&self, time: f32) -> Mat4;
}

/// Render any renderable object.
pub fn render(object: &ObjectPtr, renderer: &mut dyn Renderer) -> Result<()> {
    let guard = object.read();
    if let Some(visible) = guard.as_visible_renderable() {
        visible.render(renderer)
    } else if let Some(state) = guard.as_state_renderable() {
        state.render(renderer)
    } else {
        Err(Error::type_mismatch("Renderable", guard.type_name()))
    }
}

/// Bound of a visible renderable, `None` for anything else.
pub fn bound(object: &ObjectPtr) -> Option<Box3f> {
    object.read().as_visible_renderable().map(|v| v.bound())
}

/// Local matrix of a transform, `None` for anything else.
pub fn transform_matrix(object: &ObjectPtr, time: f32) -> Option<Mat4> {
    object.read().as_transform().map(|t| t.transform(time))
}
