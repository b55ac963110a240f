//! The rendering protocol renderables drive.

use std::fmt;
use std::ops::{Deref, DerefMut};

use tracing::warn;

use crate::core::ObjectPtr;
use crate::geom::{CubicBasis, NurbsDirection, PrimitiveVariableMap};
use crate::util::{Mat4, Result};

/// Receiver of scene description calls.
///
/// Begin/end calls nest. Renderables bracket them with [`AttributeBlock`],
/// [`TransformBlock`] and [`MotionBlock`] so every begin is matched on all
/// exit paths.
pub trait Renderer {
    fn attribute_begin(&mut self) -> Result<()>;

    fn attribute_end(&mut self) -> Result<()>;

    fn transform_begin(&mut self) -> Result<()>;

    fn transform_end(&mut self) -> Result<()>;

    /// Start a motion block sampled at `times` (ascending).
    fn motion_begin(&mut self, times: &[f32]) -> Result<()>;

    fn motion_end(&mut self) -> Result<()>;

    fn concat_transform(&mut self, matrix: Mat4) -> Result<()>;

    fn set_attribute(&mut self, name: &str, value: &ObjectPtr) -> Result<()>;

    fn points(&mut self, num_points: usize, variables: &PrimitiveVariableMap) -> Result<()>;

    fn curves(
        &mut self,
        basis: CubicBasis,
        periodic: bool,
        vertices_per_curve: &[i32],
        variables: &PrimitiveVariableMap,
    ) -> Result<()>;

    fn mesh(
        &mut self,
        vertices_per_face: &[i32],
        vertex_ids: &[i32],
        interpolation: &str,
        variables: &PrimitiveVariableMap,
    ) -> Result<()>;

    fn disk(&mut self, radius: f32, z: f32, theta_max: f32, variables: &PrimitiveVariableMap) -> Result<()>;

    fn nurbs(&mut self, u: &NurbsDirection, v: &NurbsDirection, variables: &PrimitiveVariableMap) -> Result<()>;
}

macro_rules! render_block {
    ($(#[$doc:meta])* $name:ident, $end:ident) => {
        $(#[$doc])*
        pub struct $name<'a> {
            renderer: &'a mut dyn Renderer,
            open: bool,
        }

        impl<'a> $name<'a> {
            /// Close the block now, reporting the renderer's error.
            pub fn end(mut self) -> Result<()> {
                if std::mem::take(&mut self.open) {
                    self.renderer.$end()
                } else {
                    Ok(())
                }
            }
        }

        impl<'a> Deref for $name<'a> {
            type Target = dyn Renderer + 'a;

            fn deref(&self) -> &Self::Target {
                &*self.renderer
            }
        }

        impl<'a> DerefMut for $name<'a> {
            fn deref_mut(&mut self) -> &mut Self::Target {
                &mut *self.renderer
            }
        }

        impl Drop for $name<'_> {
            fn drop(&mut self) {
                if self.open {
                    if let Err(err) = self.renderer.$end() {
                        warn!("{} failed while unwinding: {}", stringify!($end), err);
                    }
                }
            }
        }
    };
}

render_block!(
    /// Attribute scope, closed on drop.
    AttributeBlock,
    attribute_end
);

render_block!(
    /// Transform scope, closed on drop.
    TransformBlock,
    transform_end
);

render_block!(
    /// Motion sample scope, closed on drop.
    MotionBlock,
    motion_end
);

impl<'a> AttributeBlock<'a> {
    pub fn new(renderer: &'a mut dyn Renderer) -> Result<Self> {
        Self::conditional(renderer, true)
    }

    /// Open the scope only when `enabled`; otherwise a pass-through.
    pub fn conditional(renderer: &'a mut dyn Renderer, enabled: bool) -> Result<Self> {
        if enabled {
            renderer.attribute_begin()?;
        }
        Ok(Self { renderer, open: enabled })
    }
}

impl<'a> TransformBlock<'a> {
    pub fn new(renderer: &'a mut dyn Renderer) -> Result<Self> {
        renderer.transform_begin()?;
        Ok(Self { renderer, open: true })
    }
}

impl<'a> MotionBlock<'a> {
    pub fn new(renderer: &'a mut dyn Renderer, times: &[f32]) -> Result<Self> {
        renderer.motion_begin(times)?;
        Ok(Self { renderer, open: true })
    }
}

// ============================================================================
// Recording renderer
// ============================================================================

/// One call received by a [`RecordingRenderer`].
#[derive(Clone, Debug, PartialEq)]
pub enum RenderCall {
    AttributeBegin,
    AttributeEnd,
    TransformBegin,
    TransformEnd,
    MotionBegin(Vec<f32>),
    MotionEnd,
    ConcatTransform(Mat4),
    SetAttribute(String),
    Points { num_points: usize, variables: Vec<String> },
    Curves { basis: CubicBasis, periodic: bool, num_curves: usize, variables: Vec<String> },
    Mesh { num_faces: usize, interpolation: String, variables: Vec<String> },
    Disk { radius: f32, z: f32, theta_max: f32 },
    Nurbs { u_order: i32, v_order: i32, variables: Vec<String> },
}

impl fmt::Display for RenderCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AttributeBegin => f.write_str("attributeBegin"),
            Self::AttributeEnd => f.write_str("attributeEnd"),
            Self::TransformBegin => f.write_str("transformBegin"),
            Self::TransformEnd => f.write_str("transformEnd"),
            Self::MotionBegin(times) => write!(f, "motionBegin {:?}", times),
            Self::MotionEnd => f.write_str("motionEnd"),
            Self::ConcatTransform(m) => write!(f, "concatTransform {:?}", m.to_cols_array()),
            Self::SetAttribute(name) => write!(f, "setAttribute {}", name),
            Self::Points { num_points, variables } => {
                write!(f, "points {} [{}]", num_points, variables.join(", "))
            }
            Self::Curves { basis, periodic, num_curves, variables } => write!(
                f,
                "curves {:?} periodic={} curves={} [{}]",
                basis,
                periodic,
                num_curves,
                variables.join(", ")
            ),
            Self::Mesh { num_faces, interpolation, variables } => write!(
                f,
                "mesh {} faces={} [{}]",
                interpolation,
                num_faces,
                variables.join(", ")
            ),
            Self::Disk { radius, z, theta_max } => {
                write!(f, "disk radius={} z={} thetaMax={}", radius, z, theta_max)
            }
            Self::Nurbs { u_order, v_order, variables } => {
                write!(f, "nurbs {}x{} [{}]", u_order, v_order, variables.join(", "))
            }
        }
    }
}

/// Renderer that records every call, for inspection and debugging.
#[derive(Debug, Default)]
pub struct RecordingRenderer {
    pub calls: Vec<RenderCall>,
    depth: i32,
}

fn names(variables: &PrimitiveVariableMap) -> Vec<String> {
    variables.keys().cloned().collect()
}

impl RecordingRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Nesting depth of open attribute, transform and motion blocks.
    pub fn depth(&self) -> i32 {
        self.depth
    }

    fn push(&mut self, call: RenderCall) -> Result<()> {
        self.calls.push(call);
        Ok(())
    }
}

impl Renderer for RecordingRenderer {
    fn attribute_begin(&mut self) -> Result<()> {
        self.depth += 1;
        self.push(RenderCall::AttributeBegin)
    }

    fn attribute_end(&mut self) -> Result<()> {
        self.depth -= 1;
        self.push(RenderCall::AttributeEnd)
    }

    fn transform_begin(&mut self) -> Result<()> {
        self.depth += 1;
        self.push(RenderCall::TransformBegin)
    }

    fn transform_end(&mut self) -> Result<()> {
        self.depth -= 1;
        self.push(RenderCall::TransformEnd)
    }

    fn motion_begin(&mut self, times: &[f32]) -> Result<()> {
        self.depth += 1;
        self.push(RenderCall::MotionBegin(times.to_vec()))
    }

    fn motion_end(&mut self) -> Result<()> {
        self.depth -= 1;
        self.push(RenderCall::MotionEnd)
    }

    fn concat_transform(&mut self, matrix: Mat4) -> Result<()> {
        self.push(RenderCall::ConcatTransform(matrix))
    }

    fn set_attribute(&mut self, name: &str, _value: &ObjectPtr) -> Result<()> {
        self.push(RenderCall::SetAttribute(name.to_string()))
    }

    fn points(&mut self, num_points: usize, variables: &PrimitiveVariableMap) -> Result<()> {
        self.push(RenderCall::Points {
            num_points,
            variables: names(variables),
        })
    }

    fn curves(
        &mut self,
        basis: CubicBasis,
        periodic: bool,
        vertices_per_curve: &[i32],
        variables: &PrimitiveVariableMap,
    ) -> Result<()> {
        self.push(RenderCall::Curves {
            basis,
            periodic,
            num_curves: vertices_per_curve.len(),
            variables: names(variables),
        })
    }

    fn mesh(
        &mut self,
        vertices_per_face: &[i32],
        _vertex_ids: &[i32],
        interpolation: &str,
        variables: &PrimitiveVariableMap,
    ) -> Result<()> {
        self.push(RenderCall::Mesh {
            num_faces: vertices_per_face.len(),
            interpolation: interpolation.to_string(),
            variables: names(variables),
        })
    }

    fn disk(&mut self, radius: f32, z: f32, theta_max: f32, _variables: &PrimitiveVariableMap) -> Result<()> {
        self.push(RenderCall::Disk { radius, z, theta_max })
    }

    fn nurbs(&mut self, u: &NurbsDirection, v: &NurbsDirection, variables: &PrimitiveVariableMap) -> Result<()> {
        self.push(RenderCall::Nurbs {
            u_order: u.order,
            v_order: v.order,
            variables: names(variables),
        })
    }
}
