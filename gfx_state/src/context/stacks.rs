use ultraviolet::Mat4;

use super::{RenderingContext, StateScope};
use crate::{
    device::Device,
    diagnostics::Diagnostic,
    params::{
        BlendingParameters, ColorBufferParameters, CullFaceParameters, DepthBufferParameters,
        ImageBindParameters, LineParameters, PointParameters, PolygonModeParameters,
        PolygonOffsetParameters, Rect, ScissorParameters, StencilParameters,
    },
    records::MaterialData,
    resource::{FramebufferRef, ShaderRef, TextureRef},
    stack::{StateCategory, StateStack},
    MAX_BOUND_IMAGES, MAX_TEXTURES,
};

/// The save stacks of every state category.
#[derive(Debug, Default)]
pub(crate) struct StateStacks {
    pub blending: StateStack<BlendingParameters>,
    pub color_buffer: StateStack<ColorBufferParameters>,
    pub cull_face: StateStack<CullFaceParameters>,
    pub depth_buffer: StateStack<DepthBufferParameters>,
    pub line: StateStack<LineParameters>,
    pub point: StateStack<PointParameters>,
    pub polygon_mode: StateStack<PolygonModeParameters>,
    pub polygon_offset: StateStack<PolygonOffsetParameters>,
    pub scissor: StateStack<ScissorParameters>,
    pub stencil: StateStack<StencilParameters>,
    pub viewport: StateStack<Rect>,
    pub shader: StateStack<Option<ShaderRef>>,
    pub fbo: StateStack<Option<FramebufferRef>>,
    pub material: StateStack<MaterialData>,
    pub projection: StateStack<Mat4>,
    pub model_to_camera: StateStack<Mat4>,
    pub textures: [StateStack<Option<TextureRef>>; MAX_TEXTURES],
    pub images: [StateStack<ImageBindParameters>; MAX_BOUND_IMAGES],
}

impl StateStacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

/// Generates `push_*`, `set_*`, `push_and_set_*`, `pop_*` and `scoped_*` for pipeline
/// state fields that have a stack of the same name.
macro_rules! pipeline_stacks {
    ($(
        $field:ident: $ty:ty => $category:ident,
        $push:ident, $set:ident, $push_and_set:ident, $pop:ident, $scoped:ident;
    )*) => {
        impl<D: Device> RenderingContext<D> {
            $(
                #[doc = concat!("Saves the current ", stringify!($field), " state.")]
                pub fn $push(&mut self) {
                    let value = self.target.$field.clone();
                    self.stacks.$field.push(value);
                }

                #[doc = concat!("Sets the ", stringify!($field), " state. Applied lazily.")]
                pub fn $set(&mut self, value: $ty) {
                    self.target.$field = value;
                }

                #[allow(missing_docs)]
                pub fn $push_and_set(&mut self, value: $ty) {
                    self.$push();
                    self.$set(value);
                }

                #[doc = concat!(
                    "Restores the last saved ", stringify!($field), " state. ",
                    "Popping an empty stack reports a diagnostic and changes nothing."
                )]
                pub fn $pop(&mut self) {
                    match self.stacks.$field.pop() {
                        Some(value) => self.target.$field = value,
                        None => self.report(Diagnostic::EmptyStack(StateCategory::$category)),
                    }
                }

                #[doc = concat!(
                    "Like `", stringify!($push_and_set), "`, restoring the saved state ",
                    "when the returned guard is dropped."
                )]
                pub fn $scoped(&mut self, value: $ty) -> StateScope<'_, D> {
                    self.$push_and_set(value);
                    StateScope::new(self, StateCategory::$category)
                }
            )*
        }
    };
}

pipeline_stacks! {
    blending: BlendingParameters => Blending,
        push_blending, set_blending, push_and_set_blending, pop_blending, scoped_blending;
    color_buffer: ColorBufferParameters => ColorBuffer,
        push_color_buffer, set_color_buffer, push_and_set_color_buffer, pop_color_buffer,
        scoped_color_buffer;
    cull_face: CullFaceParameters => CullFace,
        push_cull_face, set_cull_face, push_and_set_cull_face, pop_cull_face, scoped_cull_face;
    depth_buffer: DepthBufferParameters => DepthBuffer,
        push_depth_buffer, set_depth_buffer, push_and_set_depth_buffer, pop_depth_buffer,
        scoped_depth_buffer;
    line: LineParameters => Line,
        push_line, set_line, push_and_set_line, pop_line, scoped_line;
    point: PointParameters => PointSize,
        push_point, set_point, push_and_set_point, pop_point, scoped_point;
    polygon_mode: PolygonModeParameters => PolygonMode,
        push_polygon_mode, set_polygon_mode, push_and_set_polygon_mode, pop_polygon_mode,
        scoped_polygon_mode;
    polygon_offset: PolygonOffsetParameters => PolygonOffset,
        push_polygon_offset, set_polygon_offset, push_and_set_polygon_offset,
        pop_polygon_offset, scoped_polygon_offset;
    scissor: ScissorParameters => Scissor,
        push_scissor, set_scissor, push_and_set_scissor, pop_scissor, scoped_scissor;
    stencil: StencilParameters => Stencil,
        push_stencil, set_stencil, push_and_set_stencil, pop_stencil, scoped_stencil;
    viewport: Rect => Viewport,
        push_viewport, set_viewport, push_and_set_viewport, pop_viewport, scoped_viewport;
    shader: Option<ShaderRef> => Shader,
        push_shader, set_shader, push_and_set_shader, pop_shader, scoped_shader;
    fbo: Option<FramebufferRef> => Fbo,
        push_fbo, set_fbo, push_and_set_fbo, pop_fbo, scoped_fbo;
}
