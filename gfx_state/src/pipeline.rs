//! The device-visible pipeline state, and diffing/applying it.

use bitflags::bitflags;

use crate::{
    device::{BufferId, Capability, Device, ImageBinding, VertexBinding, VertexFormat},
    diagnostics::{Diagnostic, Diagnostics},
    error::StateError,
    params::{
        BlendingParameters, ColorBufferParameters, CullFaceParameters, DepthBufferParameters,
        ImageBindParameters, LineParameters, PointParameters, PolygonMode, PolygonModeParameters,
        PolygonOffsetParameters, Rect, ScissorParameters, StencilParameters,
    },
    resource::{FramebufferRef, FramebufferStatus, ShaderRef, TextureRef},
    MAX_BOUND_IMAGES, MAX_TEXTURES, MAX_VERTEX_ATTRIBS, MAX_VERTEX_BINDINGS,
};

/// Everything the device needs to know to run a draw or dispatch.
///
/// Two equal states produce identical device behavior. Resources compare by identity.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PipelineState {
    pub shader: Option<ShaderRef>,
    pub fbo: Option<FramebufferRef>,
    pub viewport: Rect,
    pub scissor: ScissorParameters,
    pub vertex_formats: [Option<VertexFormat>; MAX_VERTEX_ATTRIBS],
    pub vertex_bindings: [VertexBinding; MAX_VERTEX_BINDINGS],
    pub index_buffer: Option<BufferId>,
    pub blending: BlendingParameters,
    pub color_buffer: ColorBufferParameters,
    pub cull_face: CullFaceParameters,
    pub depth_buffer: DepthBufferParameters,
    pub line: LineParameters,
    pub point: PointParameters,
    pub polygon_mode: PolygonModeParameters,
    pub polygon_offset: PolygonOffsetParameters,
    pub stencil: StencilParameters,
    pub textures: [Option<TextureRef>; MAX_TEXTURES],
    pub images: [ImageBindParameters; MAX_BOUND_IMAGES],
}

bitflags! {
    /// Categories of [PipelineState] that differ between two states.
    pub struct StateFlags: u32 {
        const SHADER          = 1 << 0;
        const FBO             = 1 << 1;
        const VIEWPORT        = 1 << 2;
        const SCISSOR         = 1 << 3;
        const VERTEX_FORMATS  = 1 << 4;
        const VERTEX_BINDINGS = 1 << 5;
        const INDEX_BUFFER    = 1 << 6;
        const BLEND_ENABLED   = 1 << 7;
        const BLEND_FUNC      = 1 << 8;
        const BLEND_COLOR     = 1 << 9;
        const BLEND_EQUATION  = 1 << 10;
        const COLOR_MASK      = 1 << 11;
        const CULL_FACE       = 1 << 12;
        const DEPTH           = 1 << 13;
        const LINE            = 1 << 14;
        const POINT           = 1 << 15;
        const STENCIL_ENABLED = 1 << 16;
        const STENCIL_FUNC    = 1 << 17;
        const STENCIL_OP      = 1 << 18;
        const POLYGON_MODE    = 1 << 19;
        const POLYGON_OFFSET  = 1 << 20;
        const TEXTURES        = 1 << 21;
        const IMAGES          = 1 << 22;
    }
}

impl Default for StateFlags {
    fn default() -> Self {
        Self::empty()
    }
}

/// The changed categories between two states, with per-slot masks for the indexed
/// categories (bit `i` set means slot `i` changed).
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StateDiff {
    pub flags: StateFlags,
    pub vertex_formats: u32,
    pub vertex_bindings: u32,
    pub textures: u32,
    pub images: u32,
}

impl StateDiff {
    /// Every category and every slot.
    pub fn full() -> Self {
        Self {
            flags: StateFlags::all(),
            vertex_formats: all_slots(MAX_VERTEX_ATTRIBS),
            vertex_bindings: all_slots(MAX_VERTEX_BINDINGS),
            textures: all_slots(MAX_TEXTURES),
            images: all_slots(MAX_BOUND_IMAGES),
        }
    }

    #[allow(missing_docs)]
    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    #[allow(missing_docs)]
    pub fn contains(&self, flags: StateFlags) -> bool {
        self.flags.contains(flags)
    }
}

fn all_slots(count: usize) -> u32 {
    if count >= 32 {
        u32::MAX
    } else {
        (1 << count) - 1
    }
}

fn changed_slots<T: PartialEq>(current: &[T], target: &[T]) -> u32 {
    current
        .iter()
        .zip(target)
        .enumerate()
        .filter(|(_, (a, b))| a != b)
        .fold(0, |mask, (i, _)| mask | (1 << i))
}

fn slots(mask: u32) -> impl Iterator<Item = usize> {
    (0..32).filter(move |&i| mask & (1 << i) != 0)
}

/// Computes which categories of `target` differ from `current`.
///
/// With `forced`, every category is reported regardless of equality.
pub fn diff(current: &PipelineState, target: &PipelineState, forced: bool) -> StateDiff {
    if forced {
        return StateDiff::full();
    }

    let mut flags = StateFlags::empty();
    let mut set = |flag: StateFlags, changed: bool| flags.set(flag, changed);

    set(StateFlags::SHADER, current.shader != target.shader);
    set(StateFlags::FBO, current.fbo != target.fbo);
    set(StateFlags::VIEWPORT, current.viewport != target.viewport);
    set(StateFlags::SCISSOR, current.scissor != target.scissor);
    set(StateFlags::INDEX_BUFFER, current.index_buffer != target.index_buffer);

    let (a, b) = (&current.blending, &target.blending);
    set(StateFlags::BLEND_ENABLED, a.enabled != b.enabled);
    set(StateFlags::BLEND_FUNC, a.func() != b.func());
    set(StateFlags::BLEND_COLOR, a.color != b.color);
    set(
        StateFlags::BLEND_EQUATION,
        a.equation_rgb != b.equation_rgb || a.equation_alpha != b.equation_alpha,
    );

    set(StateFlags::COLOR_MASK, current.color_buffer != target.color_buffer);
    set(StateFlags::CULL_FACE, current.cull_face != target.cull_face);
    set(StateFlags::DEPTH, current.depth_buffer != target.depth_buffer);
    set(StateFlags::LINE, current.line != target.line);
    set(StateFlags::POINT, current.point != target.point);

    let (a, b) = (&current.stencil, &target.stencil);
    set(StateFlags::STENCIL_ENABLED, a.enabled != b.enabled);
    set(StateFlags::STENCIL_FUNC, a.different_function(b));
    set(StateFlags::STENCIL_OP, a.different_actions(b));

    set(StateFlags::POLYGON_MODE, current.polygon_mode != target.polygon_mode);
    set(StateFlags::POLYGON_OFFSET, current.polygon_offset != target.polygon_offset);

    let vertex_formats = changed_slots(&current.vertex_formats, &target.vertex_formats);
    let vertex_bindings = changed_slots(&current.vertex_bindings, &target.vertex_bindings);
    let textures = changed_slots(&current.textures, &target.textures);
    let images = changed_slots(&current.images, &target.images);
    flags.set(StateFlags::VERTEX_FORMATS, vertex_formats != 0);
    flags.set(StateFlags::VERTEX_BINDINGS, vertex_bindings != 0);
    flags.set(StateFlags::TEXTURES, textures != 0);
    flags.set(StateFlags::IMAGES, images != 0);

    StateDiff {
        flags,
        vertex_formats,
        vertex_bindings,
        textures,
        images,
    }
}

fn poll_errors(device: &mut dyn Device, sink: &mut Diagnostics, context: &'static str) {
    while let Some(error) = device.take_error() {
        sink.report(Diagnostic::Device { context, error });
    }
}

impl PipelineState {
    /// Issues the device calls for every category flagged in `diff`, using the values
    /// of `self`.
    ///
    /// Categories are applied in phases: shader, then framebuffer/viewport/scissor,
    /// then vertex input, then per-fragment state, then texture and image units.
    /// Device errors are collected after every phase and reported to `sink`.
    ///
    /// Returns the framebuffer status if the framebuffer was (re)bound.
    pub fn apply(
        &self,
        device: &mut dyn Device,
        diff: &StateDiff,
        sink: &mut Diagnostics,
    ) -> Option<FramebufferStatus> {
        if diff.is_empty() {
            return None;
        }

        if diff.contains(StateFlags::SHADER) {
            self.apply_shader(device, sink);
            poll_errors(device, sink, "applying shader");
        }

        let status = self.apply_framebuffer(device, diff, sink);
        poll_errors(device, sink, "applying framebuffer state");

        self.apply_vertex_input(device, diff);
        poll_errors(device, sink, "applying vertex input");

        self.apply_fragment_state(device, diff, sink);
        poll_errors(device, sink, "applying fragment state");

        self.apply_textures(device, diff, sink);
        self.apply_images(device, diff, sink);
        poll_errors(device, sink, "applying texture units");

        status
    }

    fn apply_shader(&self, device: &mut dyn Device, sink: &mut Diagnostics) {
        let program = match &self.shader {
            Some(shader) if shader.is_valid() => match shader.prepare_for_binding(device) {
                Ok(handle) => Some(handle),
                Err(error) => {
                    sink.report(Diagnostic::Device {
                        context: "preparing shader",
                        error,
                    });
                    None
                }
            },
            Some(_) => {
                tracing::warn!("binding an invalid shader; using no program");
                None
            }
            None => None,
        };
        device.use_program(program);
    }

    fn apply_framebuffer(
        &self,
        device: &mut dyn Device,
        diff: &StateDiff,
        sink: &mut Diagnostics,
    ) -> Option<FramebufferStatus> {
        let mut status = None;
        if diff.contains(StateFlags::FBO) {
            match &self.fbo {
                Some(fbo) => match fbo.prepare_for_binding(device) {
                    Ok(handle) => {
                        device.bind_framebuffer(Some(handle));
                        let fbo_status = fbo.status(device);
                        if let FramebufferStatus::Incomplete(reason) = &fbo_status {
                            sink.report(Diagnostic::IncompleteFramebuffer(reason.clone()));
                        }
                        status = Some(fbo_status);
                    }
                    Err(error) => {
                        sink.report(Diagnostic::Device {
                            context: "preparing framebuffer",
                            error,
                        });
                        device.bind_framebuffer(None);
                        status = Some(FramebufferStatus::Complete);
                    }
                },
                None => {
                    device.bind_framebuffer(None);
                    status = Some(FramebufferStatus::Complete);
                }
            }
        }
        if diff.contains(StateFlags::VIEWPORT) {
            device.set_viewport(self.viewport);
        }
        if diff.contains(StateFlags::SCISSOR) {
            device.set_scissor(self.scissor.active_rect());
        }
        status
    }

    fn apply_vertex_input(&self, device: &mut dyn Device, diff: &StateDiff) {
        if diff.contains(StateFlags::VERTEX_FORMATS) {
            let locations = slots(diff.vertex_formats).take_while(|&i| i < MAX_VERTEX_ATTRIBS);
            for location in locations {
                let format = self.vertex_formats[location].as_ref();
                device.set_vertex_format(location as u32, format);
            }
        }
        if diff.contains(StateFlags::VERTEX_BINDINGS) {
            let bindings = slots(diff.vertex_bindings).take_while(|&i| i < MAX_VERTEX_BINDINGS);
            for binding in bindings {
                device.bind_vertex_buffer(binding as u32, &self.vertex_bindings[binding]);
            }
        }
        if diff.contains(StateFlags::INDEX_BUFFER) {
            device.bind_index_buffer(self.index_buffer);
        }
    }

    fn apply_fragment_state(
        &self,
        device: &mut dyn Device,
        diff: &StateDiff,
        sink: &mut Diagnostics,
    ) {
        let blending = &self.blending;
        if diff.contains(StateFlags::BLEND_ENABLED) {
            device.set_blend_enabled(blending.enabled);
        }
        if diff.contains(StateFlags::BLEND_FUNC) {
            device.set_blend_func(blending.func());
        }
        if diff.contains(StateFlags::BLEND_COLOR) {
            device.set_blend_color(blending.color);
        }
        if diff.contains(StateFlags::BLEND_EQUATION) {
            device.set_blend_equation(blending.equation_rgb, blending.equation_alpha);
        }
        if diff.contains(StateFlags::COLOR_MASK) {
            device.set_color_mask(self.color_buffer);
        }
        if diff.contains(StateFlags::CULL_FACE) {
            device.set_cull_face(self.cull_face);
        }
        if diff.contains(StateFlags::DEPTH) {
            device.set_depth(self.depth_buffer);
        }
        if diff.contains(StateFlags::LINE) {
            device.set_line_width(self.line.width);
        }
        if diff.contains(StateFlags::POINT) {
            device.set_point_size(self.point.size);
        }

        let stencil = &self.stencil;
        if diff.contains(StateFlags::STENCIL_ENABLED) {
            device.set_stencil_enabled(stencil.enabled);
        }
        if diff.contains(StateFlags::STENCIL_FUNC) {
            device.set_stencil_func(stencil.function, stencil.reference, stencil.mask);
        }
        if diff.contains(StateFlags::STENCIL_OP) {
            device.set_stencil_op(stencil.fail, stencil.depth_fail, stencil.depth_pass);
        }

        if diff.contains(StateFlags::POLYGON_MODE) {
            if device.supports(Capability::PolygonMode) {
                device.set_polygon_mode(self.polygon_mode.mode);
            } else if self.polygon_mode.mode != PolygonMode::Fill {
                sink.report(Diagnostic::CapabilityUnsupported(Capability::PolygonMode));
            }
        }
        if diff.contains(StateFlags::POLYGON_OFFSET) {
            let offset = &self.polygon_offset;
            device.set_polygon_offset(offset.enabled.then(|| (offset.factor, offset.units)));
        }
    }

    fn apply_textures(&self, device: &mut dyn Device, diff: &StateDiff, sink: &mut Diagnostics) {
        if !diff.contains(StateFlags::TEXTURES) {
            return;
        }
        for unit in slots(diff.textures).take_while(|&i| i < MAX_TEXTURES) {
            let binding = match &self.textures[unit] {
                Some(texture) => match texture.prepare_for_binding(device) {
                    Ok(handle) => Some((texture.texture_type(), handle)),
                    Err(error) => {
                        sink.report(Diagnostic::Device {
                            context: "preparing texture",
                            error,
                        });
                        None
                    }
                },
                None => None,
            };
            device.bind_texture(unit as u32, binding);
        }
    }

    fn apply_images(&self, device: &mut dyn Device, diff: &StateDiff, sink: &mut Diagnostics) {
        if !diff.contains(StateFlags::IMAGES) {
            return;
        }
        if !device.supports(Capability::ImageLoadStore) {
            let any_bound = slots(diff.images)
                .take_while(|&i| i < MAX_BOUND_IMAGES)
                .any(|unit| self.images[unit].texture.is_some());
            if any_bound {
                sink.report(Diagnostic::CapabilityUnsupported(Capability::ImageLoadStore));
            }
            return;
        }

        for unit in slots(diff.images).take_while(|&i| i < MAX_BOUND_IMAGES) {
            let params = &self.images[unit];
            let binding = match &params.texture {
                Some(texture) => match resolve_image(device, texture, params) {
                    Ok(binding) => Some(binding),
                    Err(StateError::Device(error)) => {
                        sink.report(Diagnostic::Device {
                            context: "preparing image texture",
                            error,
                        });
                        None
                    }
                    Err(error) => {
                        sink.report(Diagnostic::State(error));
                        None
                    }
                },
                None => None,
            };
            if let Err(error) = device.bind_image(unit as u32, binding.as_ref()) {
                sink.report(Diagnostic::Device {
                    context: "binding image",
                    error,
                });
            }
        }
    }
}

fn resolve_image(
    device: &mut dyn Device,
    texture: &TextureRef,
    params: &ImageBindParameters,
) -> Result<ImageBinding, StateError> {
    let format = texture
        .image_format()
        .ok_or(StateError::UnsupportedImageFormat)?;
    let handle = texture.prepare_for_binding(device)?;
    Ok(ImageBinding {
        texture: handle,
        level: params.level,
        layered: params.multi_layer,
        layer: params.layer,
        access: params.access(),
        format,
    })
}
