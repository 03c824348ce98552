use std::mem::size_of;

use bytemuck::Pod;
use derivative::Derivative;
use ultraviolet::Mat4;

pub use scope::*;

use crate::{
    cache::ParameterCache,
    device::{
        BarrierFlags, BufferId, Capability, ClearRequest, Device, IndexType, PrimitiveMode,
        UsageHint, VertexBinding, VertexFormat,
    },
    diagnostics::{Diagnostic, Diagnostics},
    error::StateError,
    lights::{LightError, LightId, LightRegistry},
    params::{
        BlendingParameters, Color4f, ColorBufferParameters, CullFaceParameters,
        DepthBufferParameters, ImageBindParameters, LightParameters, LineParameters,
        MaterialParameters, PointParameters, PolygonModeParameters, PolygonOffsetParameters, Rect,
        ScissorParameters, StencilParameters,
    },
    pipeline::{diff, PipelineState},
    records::{slot, FrameData, LightSetData, MaterialData, ObjectData, TextureSetData},
    resource::{Drawable, FramebufferRef, FramebufferStatus, ShaderRef, TextureRef, VertexDescription},
    stack::StateCategory,
    MAX_BOUND_IMAGES, MAX_ENABLED_LIGHTS, MAX_TEXTURES, MAX_VERTEX_ATTRIBS, MAX_VERTEX_BINDINGS,
};

use stacks::StateStacks;

mod scope;
mod stacks;

/// Sizes of the context's parameter cache slots.
#[derive(Debug, Clone, PartialEq, Eq, Derivative)]
#[derivative(Default)]
pub struct ContextConfig {
    /// Object data records per buffer. A swap happens after this many draws.
    #[derivative(Default(value = "512"))]
    pub object_capacity: usize,
    /// Number of object data buffers used round robin.
    #[derivative(Default(value = "2"))]
    pub object_buffering: usize,
    /// Number of light ids (at most 256).
    #[derivative(Default(value = "256"))]
    pub light_capacity: usize,
    /// Maximum number of simultaneously enabled lights (at most [MAX_ENABLED_LIGHTS]).
    #[derivative(Default(value = "MAX_ENABLED_LIGHTS"))]
    pub max_enabled_lights: usize,
}

/// How a texture unit is used.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureUsage {
    Disabled,
    TextureMapping,
}

/// The last value written to each singleton cache slot.
#[derive(Debug, Default)]
struct Published {
    frame: Option<FrameData>,
    material: Option<MaterialData>,
    light_set: Option<LightSetData>,
    texture_set: Option<TextureSetData>,
}

/// Tracks requested rendering state and brings the device in line with it on demand.
///
/// State setters only change the *target* state. Before every draw, dispatch, clear or
/// sync call the target is diffed against the *active* state (what the device has) and
/// only the changed categories are sent to the device; see
/// [RenderingContext::apply_changes].
///
/// Every category has a save/restore stack (`push_*`, `set_*`, `push_and_set_*`,
/// `pop_*`), and `scoped_*` variants that restore the saved value when the returned
/// guard is dropped.
#[derive(Debug)]
pub struct RenderingContext<D: Device> {
    device: D,
    config: ContextConfig,
    target: PipelineState,
    active: PipelineState,
    needs_forced_apply: bool,
    stacks: StateStacks,
    cache: ParameterCache,
    lights: LightRegistry,
    frame_data: FrameData,
    object_data: ObjectData,
    material: MaterialData,
    published: Published,
    framebuffer_status: FramebufferStatus,
    window_client_area: Rect,
    diagnostics: Diagnostics,
}

impl<D: Device> RenderingContext<D> {
    /// Creates a context with the default [ContextConfig].
    pub fn new(device: D) -> Result<Self, StateError> {
        Self::with_config(device, ContextConfig::default())
    }

    /// Creates a context and allocates its parameter cache slots.
    ///
    /// Fails if the device cannot allocate the slot buffers.
    pub fn with_config(mut device: D, config: ContextConfig) -> Result<Self, StateError> {
        let slots = [
            (slot::FRAME_DATA, size_of::<FrameData>(), 1, UsageHint::Dynamic, 1),
            (
                slot::OBJECT_DATA,
                size_of::<ObjectData>(),
                config.object_capacity,
                UsageHint::Stream,
                config.object_buffering,
            ),
            (slot::MATERIAL_DATA, size_of::<MaterialData>(), 1, UsageHint::Dynamic, 1),
            (
                slot::LIGHT_DATA,
                size_of::<LightParameters>(),
                config.light_capacity,
                UsageHint::Dynamic,
                1,
            ),
            (slot::LIGHT_SET_DATA, size_of::<LightSetData>(), 1, UsageHint::Dynamic, 1),
            (slot::TEXTURE_SET_DATA, size_of::<TextureSetData>(), 1, UsageHint::Dynamic, 1),
        ];

        let mut cache = ParameterCache::new();
        for &(name, record_size, capacity, usage, buffering) in &slots {
            if let Err(error) =
                cache.create_cache(&mut device, name, record_size, capacity, usage, buffering)
            {
                tracing::error!("failed to allocate cache '{}': {}", name, error);
                cache.clear(&mut device);
                return Err(error.into());
            }
        }

        Ok(Self {
            device,
            lights: LightRegistry::new(config.light_capacity, config.max_enabled_lights),
            config,
            target: PipelineState::default(),
            active: PipelineState::default(),
            needs_forced_apply: true,
            stacks: StateStacks::new(),
            cache,
            frame_data: FrameData::default(),
            object_data: ObjectData::default(),
            material: MaterialData::default(),
            published: Published::default(),
            framebuffer_status: FramebufferStatus::Complete,
            window_client_area: Rect::default(),
            diagnostics: Diagnostics::new(),
        })
    }

    #[allow(missing_docs)]
    pub fn device(&self) -> &D {
        &self.device
    }

    /// Direct device access. State changed behind the context's back is not tracked;
    /// call [RenderingContext::apply_changes] with `forced` afterwards.
    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    #[allow(missing_docs)]
    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    /// The parameter cache holding the context's record slots.
    pub fn cache(&self) -> &ParameterCache {
        &self.cache
    }

    /// The state requested by the caller.
    pub fn target_state(&self) -> &PipelineState {
        &self.target
    }

    /// The state last applied to the device.
    pub fn active_state(&self) -> &PipelineState {
        &self.active
    }

    /// Diagnostics reported so far.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        self.diagnostics.entries()
    }

    /// Removes and returns the diagnostics reported so far.
    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        self.diagnostics.take()
    }

    fn report(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.report(diagnostic);
    }

    fn poll_errors(&mut self, context: &'static str) {
        while let Some(error) = self.device.take_error() {
            self.diagnostics.report(Diagnostic::Device { context, error });
        }
    }

    /// Brings the device in line with the target state.
    ///
    /// Applies the changed pipeline categories, publishes the frame, material, light
    /// set and texture set records, binds every cache slot the active shader declares
    /// an interface block for, and synchronizes the shader's uniforms.
    ///
    /// With `forced`, everything is sent regardless of what the device is believed to
    /// have. The first apply of a context is always forced.
    pub fn apply_changes(&mut self, forced: bool) {
        let forced = forced || self.needs_forced_apply;
        self.needs_forced_apply = false;

        let diff = diff(&self.active, &self.target, forced);
        self.active = self.target.clone();
        if let Some(status) = self
            .active
            .apply(&mut self.device, &diff, &mut self.diagnostics)
        {
            self.framebuffer_status = status;
        }

        self.publish_records(forced);
        self.bind_shader_resources(forced);
        self.poll_errors("publishing parameters");
    }

    fn publish_records(&mut self, forced: bool) {
        let frame = FrameData {
            viewport: self.target.viewport.to_vec4(),
            ..self.frame_data
        };
        let mut texture_set = TextureSetData::default();
        for (enabled, texture) in texture_set.enabled.iter_mut().zip(&self.target.textures) {
            *enabled = texture.is_some() as u32;
        }
        let light_set = *self.lights.light_set();

        let mut publisher = Publisher {
            cache: &mut self.cache,
            device: &mut self.device,
            sink: &mut self.diagnostics,
            forced,
        };
        publisher.publish(slot::FRAME_DATA, &mut self.published.frame, frame);
        publisher.publish(slot::MATERIAL_DATA, &mut self.published.material, self.material);
        publisher.publish(slot::LIGHT_SET_DATA, &mut self.published.light_set, light_set);
        publisher.publish(slot::TEXTURE_SET_DATA, &mut self.published.texture_set, texture_set);
    }

    fn bind_shader_resources(&mut self, forced: bool) {
        let shader = match &self.active.shader {
            Some(shader) if shader.is_valid() => shader.clone(),
            _ => return,
        };
        for block in shader.interface_blocks() {
            let location = match block.location {
                Some(location) => location,
                None => continue,
            };
            if !self.cache.is_cache(&block.name) {
                continue;
            }
            if let Err(error) =
                self.cache
                    .bind(&mut self.device, &block.name, location, block.target, forced)
            {
                self.report(Diagnostic::State(error));
            }
        }
        if let Err(error) = shader.sync_uniforms(&mut self.device, forced) {
            self.report(Diagnostic::Device {
                context: "synchronizing uniforms",
                error,
            });
        }
    }

    // Framebuffer and window

    /// The framebuffer bound by the target state, if any.
    pub fn active_fbo(&self) -> Option<&FramebufferRef> {
        self.target.fbo.as_ref()
    }

    /// Completeness of the framebuffer as of the last apply that bound it.
    pub fn framebuffer_status(&self) -> &FramebufferStatus {
        &self.framebuffer_status
    }

    #[allow(missing_docs)]
    pub fn window_client_area(&self) -> Rect {
        self.window_client_area
    }

    /// Records the size of the window's drawable area.
    pub fn set_window_client_area(&mut self, rect: Rect) {
        self.window_client_area = rect;
    }

    // Shader

    /// The shader of the target state, if any.
    pub fn active_shader(&self) -> Option<&ShaderRef> {
        self.target.shader.as_ref()
    }

    /// True if a valid shader is set.
    pub fn is_shader_enabled(&self) -> bool {
        self.target
            .shader
            .as_ref()
            .map_or(false, |shader| shader.is_valid())
    }

    // Fixed function state getters

    #[allow(missing_docs)]
    pub fn blending(&self) -> &BlendingParameters {
        &self.target.blending
    }

    #[allow(missing_docs)]
    pub fn color_buffer(&self) -> &ColorBufferParameters {
        &self.target.color_buffer
    }

    #[allow(missing_docs)]
    pub fn cull_face(&self) -> &CullFaceParameters {
        &self.target.cull_face
    }

    #[allow(missing_docs)]
    pub fn depth_buffer(&self) -> &DepthBufferParameters {
        &self.target.depth_buffer
    }

    #[allow(missing_docs)]
    pub fn line(&self) -> &LineParameters {
        &self.target.line
    }

    #[allow(missing_docs)]
    pub fn point(&self) -> &PointParameters {
        &self.target.point
    }

    #[allow(missing_docs)]
    pub fn polygon_mode(&self) -> &PolygonModeParameters {
        &self.target.polygon_mode
    }

    #[allow(missing_docs)]
    pub fn polygon_offset(&self) -> &PolygonOffsetParameters {
        &self.target.polygon_offset
    }

    #[allow(missing_docs)]
    pub fn scissor(&self) -> &ScissorParameters {
        &self.target.scissor
    }

    #[allow(missing_docs)]
    pub fn stencil(&self) -> &StencilParameters {
        &self.target.stencil
    }

    #[allow(missing_docs)]
    pub fn viewport(&self) -> Rect {
        self.target.viewport
    }

    // Matrices

    /// The camera to clipping space (projection) matrix.
    pub fn projection(&self) -> Mat4 {
        self.frame_data.camera_to_clipping
    }

    #[allow(missing_docs)]
    pub fn push_projection(&mut self) {
        self.stacks.projection.push(self.frame_data.camera_to_clipping);
    }

    /// Sets the projection matrix; its inverse is kept alongside in the frame data.
    pub fn set_projection(&mut self, matrix: Mat4) {
        self.frame_data.camera_to_clipping = matrix;
        self.frame_data.clipping_to_camera = matrix.inversed();
    }

    #[allow(missing_docs)]
    pub fn push_and_set_projection(&mut self, matrix: Mat4) {
        self.push_projection();
        self.set_projection(matrix);
    }

    #[allow(missing_docs)]
    pub fn pop_projection(&mut self) {
        match self.stacks.projection.pop() {
            Some(matrix) => self.set_projection(matrix),
            None => self.report(Diagnostic::EmptyStack(StateCategory::Projection)),
        }
    }

    #[allow(missing_docs)]
    pub fn camera_to_world(&self) -> Mat4 {
        self.frame_data.camera_to_world
    }

    #[allow(missing_docs)]
    pub fn world_to_camera(&self) -> Mat4 {
        self.frame_data.world_to_camera
    }

    /// Sets the camera transform; the world to camera matrix is its inverse.
    pub fn set_camera_to_world(&mut self, matrix: Mat4) {
        self.frame_data.camera_to_world = matrix;
        self.frame_data.world_to_camera = matrix.inversed();
    }

    /// Sets the view matrix; the camera to world matrix is its inverse.
    pub fn set_world_to_camera(&mut self, matrix: Mat4) {
        self.frame_data.world_to_camera = matrix;
        self.frame_data.camera_to_world = matrix.inversed();
    }

    #[allow(missing_docs)]
    pub fn model_to_camera(&self) -> Mat4 {
        self.object_data.model_to_camera
    }

    #[allow(missing_docs)]
    pub fn push_model_to_camera(&mut self) {
        self.stacks
            .model_to_camera
            .push(self.object_data.model_to_camera);
    }

    #[allow(missing_docs)]
    pub fn set_model_to_camera(&mut self, matrix: Mat4) {
        self.object_data.model_to_camera = matrix;
    }

    #[allow(missing_docs)]
    pub fn push_and_set_model_to_camera(&mut self, matrix: Mat4) {
        self.push_model_to_camera();
        self.set_model_to_camera(matrix);
    }

    /// Right-multiplies the model to camera matrix: `current * matrix`.
    pub fn mult_model_to_camera(&mut self, matrix: Mat4) {
        self.object_data.model_to_camera = self.object_data.model_to_camera * matrix;
    }

    /// Resets the model to camera matrix to identity.
    pub fn reset_model_to_camera(&mut self) {
        self.object_data.model_to_camera = Mat4::identity();
    }

    #[allow(missing_docs)]
    pub fn pop_model_to_camera(&mut self) {
        match self.stacks.model_to_camera.pop() {
            Some(matrix) => self.object_data.model_to_camera = matrix,
            None => self.report(Diagnostic::EmptyStack(StateCategory::ModelToCamera)),
        }
    }

    // Material

    /// The active material, or `None` if materials are disabled.
    pub fn material(&self) -> Option<&MaterialParameters> {
        self.material
            .is_enabled()
            .then(|| &self.material.material)
    }

    #[allow(missing_docs)]
    pub fn push_material(&mut self) {
        self.stacks.material.push(self.material);
    }

    /// Sets and enables a material.
    pub fn set_material(&mut self, material: MaterialParameters) {
        self.material = MaterialData::new(material);
    }

    #[allow(missing_docs)]
    pub fn push_and_set_material(&mut self, material: MaterialParameters) {
        self.push_material();
        self.set_material(material);
    }

    /// Saves the material and sets one whose ambient and diffuse terms are `color`.
    pub fn push_and_set_color_material(&mut self, color: Color4f) {
        self.push_and_set_material(MaterialParameters::from_color(color));
    }

    /// Disables materials.
    pub fn disable_material(&mut self) {
        self.material = MaterialData::default();
    }

    #[allow(missing_docs)]
    pub fn pop_material(&mut self) {
        match self.stacks.material.pop() {
            Some(material) => self.material = material,
            None => self.report(Diagnostic::EmptyStack(StateCategory::Material)),
        }
    }

    // Lights

    /// The light registry and active light set.
    pub fn lights(&self) -> &LightRegistry {
        &self.lights
    }

    /// The enabled light ids, in unspecified order.
    pub fn enabled_lights(&self) -> Vec<LightId> {
        self.lights.enabled().collect()
    }

    fn write_light(&mut self, id: LightId, params: &LightParameters) {
        let index = id.0 as usize;
        match self
            .cache
            .set_record(&mut self.device, slot::LIGHT_DATA, index, params)
        {
            Ok(true) => {}
            Ok(false) => self.report(Diagnostic::CacheIndexOutOfRange {
                cache: slot::LIGHT_DATA,
                index,
            }),
            Err(error) => self.report(Diagnostic::State(error)),
        }
    }

    /// Registers a light, reusing the id of an equal registered light.
    ///
    /// Returns `None` if no ids are left.
    pub fn register_light(&mut self, params: LightParameters) -> Option<LightId> {
        match self.lights.register(params) {
            Ok((id, leased)) => {
                if leased {
                    self.write_light(id, &params);
                }
                Some(id)
            }
            Err(_) => {
                self.report(Diagnostic::LightPoolExhausted);
                None
            }
        }
    }

    /// Registers (or finds) a light and enables it.
    ///
    /// Returns the light's id even if it could not be enabled because too many lights
    /// are enabled; returns `None` if it could not be registered.
    pub fn enable_light(&mut self, params: LightParameters) -> Option<LightId> {
        let id = self.register_light(params)?;
        self.enable_light_id(id);
        Some(id)
    }

    /// Writes `params` to a specific light id.
    pub fn set_light(&mut self, id: LightId, params: LightParameters) {
        self.lights.set(id, params);
        self.write_light(id, &params);
    }

    /// Enables a registered light.
    pub fn enable_light_id(&mut self, id: LightId) {
        if let Err(LightError::TooManyEnabled) = self.lights.enable(id) {
            self.report(Diagnostic::TooManyEnabledLights);
        }
    }

    /// Disables a light without unregistering it.
    pub fn disable_light(&mut self, id: LightId) {
        self.lights.disable(id);
    }

    /// Returns a light's id to the pool. An enabled light is disabled first.
    pub fn unregister_light(&mut self, id: LightId) {
        if self.lights.unregister(id) {
            self.report(Diagnostic::UnregisteredActiveLight(id));
        }
    }

    // Textures

    fn check_texture_unit(unit: usize) -> Result<(), StateError> {
        if unit >= MAX_TEXTURES {
            return Err(StateError::InvalidTextureUnit(unit));
        }
        Ok(())
    }

    /// The texture set on a unit.
    pub fn texture(&self, unit: usize) -> Result<Option<&TextureRef>, StateError> {
        Self::check_texture_unit(unit)?;
        Ok(self.target.textures[unit].as_ref())
    }

    #[allow(missing_docs)]
    pub fn texture_usage(&self, unit: usize) -> Result<TextureUsage, StateError> {
        Ok(match self.texture(unit)? {
            Some(_) => TextureUsage::TextureMapping,
            None => TextureUsage::Disabled,
        })
    }

    #[allow(missing_docs)]
    pub fn push_texture(&mut self, unit: usize) -> Result<(), StateError> {
        Self::check_texture_unit(unit)?;
        let texture = self.target.textures[unit].clone();
        self.stacks.textures[unit].push(texture);
        Ok(())
    }

    /// Sets or clears the texture of a unit.
    pub fn set_texture(&mut self, unit: usize, texture: Option<TextureRef>) -> Result<(), StateError> {
        Self::check_texture_unit(unit)?;
        self.target.textures[unit] = texture;
        Ok(())
    }

    #[allow(missing_docs)]
    pub fn push_and_set_texture(
        &mut self,
        unit: usize,
        texture: Option<TextureRef>,
    ) -> Result<(), StateError> {
        self.push_texture(unit)?;
        self.set_texture(unit, texture)
    }

    #[allow(missing_docs)]
    pub fn pop_texture(&mut self, unit: usize) -> Result<(), StateError> {
        Self::check_texture_unit(unit)?;
        match self.stacks.textures[unit].pop() {
            Some(texture) => self.target.textures[unit] = texture,
            None => self.report(Diagnostic::EmptyStack(StateCategory::Texture(unit as u8))),
        }
        Ok(())
    }

    // Bound images

    fn check_image_unit(unit: usize) -> Result<(), StateError> {
        if unit >= MAX_BOUND_IMAGES {
            return Err(StateError::InvalidImageUnit(unit));
        }
        Ok(())
    }

    /// The image binding of a unit.
    pub fn bound_image(&self, unit: usize) -> Result<&ImageBindParameters, StateError> {
        Self::check_image_unit(unit)?;
        Ok(&self.target.images[unit])
    }

    #[allow(missing_docs)]
    pub fn push_bound_image(&mut self, unit: usize) -> Result<(), StateError> {
        Self::check_image_unit(unit)?;
        let image = self.target.images[unit].clone();
        self.stacks.images[unit].push(image);
        Ok(())
    }

    /// Sets the image binding of a unit.
    ///
    /// Fails if the texture has no image format. Whether the device supports image
    /// load/store is only checked when the state is applied.
    pub fn set_bound_image(
        &mut self,
        unit: usize,
        params: ImageBindParameters,
    ) -> Result<(), StateError> {
        Self::check_image_unit(unit)?;
        if let Some(texture) = &params.texture {
            if texture.image_format().is_none() {
                return Err(StateError::UnsupportedImageFormat);
            }
        }
        self.target.images[unit] = params;
        Ok(())
    }

    #[allow(missing_docs)]
    pub fn push_and_set_bound_image(
        &mut self,
        unit: usize,
        params: ImageBindParameters,
    ) -> Result<(), StateError> {
        Self::check_image_unit(unit)?;
        if let Some(texture) = &params.texture {
            if texture.image_format().is_none() {
                return Err(StateError::UnsupportedImageFormat);
            }
        }
        self.push_bound_image(unit)?;
        self.set_bound_image(unit, params)
    }

    #[allow(missing_docs)]
    pub fn pop_bound_image(&mut self, unit: usize) -> Result<(), StateError> {
        Self::check_image_unit(unit)?;
        match self.stacks.images[unit].pop() {
            Some(image) => self.target.images[unit] = image,
            None => self.report(Diagnostic::EmptyStack(StateCategory::BoundImage(unit as u8))),
        }
        Ok(())
    }

    // Stacks

    /// Pops the stack of one category.
    pub fn pop_state(&mut self, category: StateCategory) {
        match category {
            StateCategory::Blending => self.pop_blending(),
            StateCategory::ColorBuffer => self.pop_color_buffer(),
            StateCategory::CullFace => self.pop_cull_face(),
            StateCategory::DepthBuffer => self.pop_depth_buffer(),
            StateCategory::Line => self.pop_line(),
            StateCategory::PointSize => self.pop_point(),
            StateCategory::PolygonMode => self.pop_polygon_mode(),
            StateCategory::PolygonOffset => self.pop_polygon_offset(),
            StateCategory::Scissor => self.pop_scissor(),
            StateCategory::Stencil => self.pop_stencil(),
            StateCategory::Viewport => self.pop_viewport(),
            StateCategory::Shader => self.pop_shader(),
            StateCategory::Fbo => self.pop_fbo(),
            StateCategory::Material => self.pop_material(),
            StateCategory::Projection => self.pop_projection(),
            StateCategory::ModelToCamera => self.pop_model_to_camera(),
            StateCategory::Texture(unit) => {
                if let Err(error) = self.pop_texture(unit as usize) {
                    self.report(Diagnostic::State(error));
                }
            }
            StateCategory::BoundImage(unit) => {
                if let Err(error) = self.pop_bound_image(unit as usize) {
                    self.report(Diagnostic::State(error));
                }
            }
        }
    }

    /// Drops every saved value of every stack. The current state is kept.
    pub fn reset_stacks(&mut self) {
        self.stacks.reset();
    }

    /// Saves the texture of a unit, sets a new one, and restores it when the guard is
    /// dropped.
    pub fn scoped_texture(
        &mut self,
        unit: usize,
        texture: Option<TextureRef>,
    ) -> Result<StateScope<'_, D>, StateError> {
        self.push_and_set_texture(unit, texture)?;
        Ok(StateScope::new(self, StateCategory::Texture(unit as u8)))
    }

    /// Saves the image binding of a unit, sets a new one, and restores it when the
    /// guard is dropped.
    pub fn scoped_bound_image(
        &mut self,
        unit: usize,
        params: ImageBindParameters,
    ) -> Result<StateScope<'_, D>, StateError> {
        self.push_and_set_bound_image(unit, params)?;
        Ok(StateScope::new(self, StateCategory::BoundImage(unit as u8)))
    }

    /// Saves the material, sets a new one, and restores it when the guard is dropped.
    pub fn scoped_material(&mut self, material: MaterialParameters) -> StateScope<'_, D> {
        self.push_and_set_material(material);
        StateScope::new(self, StateCategory::Material)
    }

    /// Saves the model to camera matrix, multiplies it by `matrix`, and restores it
    /// when the guard is dropped.
    pub fn scoped_model_to_camera(&mut self, matrix: Mat4) -> StateScope<'_, D> {
        self.push_model_to_camera();
        self.mult_model_to_camera(matrix);
        StateScope::new(self, StateCategory::ModelToCamera)
    }

    // Vertex input

    /// Describes the vertex layout read from a vertex buffer binding point.
    ///
    /// Attribute locations are looked up by name in the target shader; attributes the
    /// shader does not use are skipped. Without a shader, attribute `i` goes to
    /// location `i`. Locations previously fed from `binding` are disabled first.
    pub fn set_vertex_format(
        &mut self,
        binding: usize,
        description: &VertexDescription,
    ) -> Result<(), StateError> {
        if binding >= MAX_VERTEX_BINDINGS {
            return Err(StateError::InvalidVertexBinding(binding));
        }

        let mut formats = self.target.vertex_formats;
        for format in formats.iter_mut() {
            if format.map_or(false, |format| format.binding == binding as u32) {
                *format = None;
            }
        }

        for (i, attribute) in description.attributes().iter().enumerate() {
            let location = match &self.target.shader {
                Some(shader) => match shader.vertex_attribute_location(&attribute.name) {
                    Some(location) => location as usize,
                    None => continue,
                },
                None => i,
            };
            if location >= MAX_VERTEX_ATTRIBS {
                return Err(StateError::InvalidVertexAttribute(location));
            }
            formats[location] = Some(VertexFormat {
                num_values: attribute.num_values,
                data_type: attribute.data_type,
                normalize: attribute.normalize,
                convert_to_float: attribute.convert_to_float,
                relative_offset: attribute.offset,
                binding: binding as u32,
            });
        }

        self.target.vertex_formats = formats;
        Ok(())
    }

    /// Attaches a vertex buffer to a binding point.
    pub fn bind_vertex_buffer(
        &mut self,
        binding: usize,
        buffer: Option<BufferId>,
        offset: u64,
        stride: u32,
        divisor: u32,
    ) -> Result<(), StateError> {
        if binding >= MAX_VERTEX_BINDINGS {
            return Err(StateError::InvalidVertexBinding(binding));
        }
        self.target.vertex_bindings[binding] = VertexBinding {
            buffer,
            offset,
            stride,
            divisor,
        };
        Ok(())
    }

    #[allow(missing_docs)]
    pub fn bind_index_buffer(&mut self, buffer: Option<BufferId>) {
        self.target.index_buffer = buffer;
    }

    /// The vertex buffer attached to a binding point.
    pub fn vertex_binding(&self, binding: usize) -> Result<&VertexBinding, StateError> {
        self.target
            .vertex_bindings
            .get(binding)
            .ok_or(StateError::InvalidVertexBinding(binding))
    }

    #[allow(missing_docs)]
    pub fn index_buffer(&self) -> Option<BufferId> {
        self.target.index_buffer
    }

    // Draws

    /// Writes the current object data at the next draw id and returns the id.
    fn push_object_data(&mut self) -> u32 {
        let draw_id = match self.cache.next_index(slot::OBJECT_DATA) {
            Ok(index) => index as u32,
            Err(error) => {
                self.report(Diagnostic::State(error));
                return 0;
            }
        };
        self.object_data.draw_id = draw_id;
        self.object_data.point_size = self.target.point.size;

        let result = self
            .cache
            .add_record(&mut self.device, slot::OBJECT_DATA, &self.object_data);
        match result {
            Ok(index) => index as u32,
            Err(error) => {
                self.report(Diagnostic::State(error));
                draw_id
            }
        }
    }

    /// Starts a new object data generation once the current buffer is about to fill.
    fn finish_draw(&mut self, draw_id: u32) {
        let capacity = self.cache.capacity(slot::OBJECT_DATA).unwrap_or(1);
        if draw_id as usize + 1 >= capacity {
            if let Err(error) = self.cache.swap(&mut self.device, slot::OBJECT_DATA) {
                self.report(Diagnostic::State(error));
            }
        }
        self.poll_errors("drawing");
    }

    /// Applies pending state and draws `count` vertices starting at `first`.
    ///
    /// Returns the draw id, which the shader sees as its base instance.
    pub fn draw_arrays(&mut self, mode: PrimitiveMode, first: u32, count: u32) -> u32 {
        self.apply_changes(false);
        let draw_id = self.push_object_data();
        self.device.draw_arrays(mode, first, count, 1, draw_id);
        self.finish_draw(draw_id);
        draw_id
    }

    /// Applies pending state and draws `count` indices of the bound index buffer,
    /// starting at index `first`.
    ///
    /// Returns the draw id, which the shader sees as its base instance.
    pub fn draw_elements(
        &mut self,
        mode: PrimitiveMode,
        index_type: IndexType,
        first: u32,
        count: u32,
    ) -> u32 {
        self.apply_changes(false);
        let draw_id = self.push_object_data();
        self.device
            .draw_elements(mode, index_type, first, count, 1, 0, draw_id);
        self.finish_draw(draw_id);
        draw_id
    }

    /// Draws a whole mesh.
    pub fn display_mesh(&mut self, mesh: &dyn Drawable) -> Result<u32, StateError> {
        self.display_mesh_range(mesh, 0, mesh.element_count())
    }

    /// Draws `count` elements of a mesh starting at `first`, using binding point 0.
    pub fn display_mesh_range(
        &mut self,
        mesh: &dyn Drawable,
        first: u32,
        count: u32,
    ) -> Result<u32, StateError> {
        let description = mesh.vertex_description();
        self.set_vertex_format(0, description)?;
        self.bind_vertex_buffer(0, Some(mesh.vertex_buffer()), 0, description.vertex_size(), 0)?;
        Ok(match mesh.index_buffer() {
            Some((buffer, index_type)) => {
                self.bind_index_buffer(Some(buffer));
                self.draw_elements(mesh.primitive_mode(), index_type, first, count)
            }
            None => {
                self.bind_index_buffer(None);
                self.draw_arrays(mesh.primitive_mode(), first, count)
            }
        })
    }

    // Compute

    fn check_compute(&mut self, operation: &'static str) -> bool {
        if !self.device.supports(Capability::ComputeShader) {
            self.report(Diagnostic::CapabilityUnsupported(Capability::ComputeShader));
            return false;
        }
        self.apply_changes(false);
        if self.active.shader.is_none() {
            self.report(Diagnostic::NoActiveShader(operation));
            return false;
        }
        true
    }

    /// Dispatches the active compute shader. Skipped with a diagnostic if compute is
    /// unsupported or no shader is active.
    pub fn dispatch_compute(&mut self, groups: [u32; 3]) {
        if self.check_compute("dispatch_compute") {
            self.device.dispatch_compute(groups);
            self.poll_errors("dispatching compute");
        }
    }

    /// Dispatches the active compute shader with group counts read from the bound
    /// indirect buffer.
    pub fn dispatch_compute_indirect(&mut self, offset: usize) {
        if self.check_compute("dispatch_compute_indirect") {
            self.device.dispatch_compute_indirect(offset);
            self.poll_errors("dispatching compute");
        }
    }

    // Clears and synchronization

    fn clear(&mut self, request: ClearRequest) {
        self.apply_changes(false);
        self.device.clear(&request);
        self.poll_errors("clearing");
    }

    /// Clears the color and depth buffers.
    pub fn clear_screen(&mut self, color: Color4f) {
        self.clear(ClearRequest {
            color: Some(color),
            depth: Some(1.0),
            stencil: None,
        });
    }

    /// Clears a rectangle of the color buffer, and optionally of the depth buffer.
    pub fn clear_screen_rect(&mut self, rect: Rect, color: Color4f, clear_depth: bool) {
        self.push_and_set_scissor(ScissorParameters::new(rect));
        self.clear(ClearRequest {
            color: Some(color),
            depth: clear_depth.then(|| 1.0),
            stencil: None,
        });
        self.pop_scissor();
    }

    #[allow(missing_docs)]
    pub fn clear_color(&mut self, color: Color4f) {
        self.clear(ClearRequest {
            color: Some(color),
            ..Default::default()
        });
    }

    #[allow(missing_docs)]
    pub fn clear_depth(&mut self, depth: f32) {
        self.clear(ClearRequest {
            depth: Some(depth),
            ..Default::default()
        });
    }

    #[allow(missing_docs)]
    pub fn clear_stencil(&mut self, stencil: i32) {
        self.clear(ClearRequest {
            stencil: Some(stencil),
            ..Default::default()
        });
    }

    /// Applies pending state and flushes the device command queue.
    pub fn flush(&mut self) {
        self.apply_changes(false);
        self.device.flush();
    }

    /// Applies pending state and blocks until the device is idle.
    pub fn finish(&mut self) {
        self.apply_changes(false);
        self.device.finish();
    }

    /// Applies pending state and inserts a memory barrier. Empty flags mean every
    /// barrier.
    pub fn barrier(&mut self, flags: BarrierFlags) {
        self.apply_changes(false);
        let flags = if flags.is_empty() {
            BarrierFlags::all()
        } else {
            flags
        };
        self.device.memory_barrier(flags);
    }
}

impl<D: Device> Drop for RenderingContext<D> {
    fn drop(&mut self) {
        self.cache.clear(&mut self.device);
    }
}

struct Publisher<'a> {
    cache: &'a mut ParameterCache,
    device: &'a mut dyn Device,
    sink: &'a mut Diagnostics,
    forced: bool,
}

impl<'a> Publisher<'a> {
    /// Writes a singleton record unless it equals the last one written.
    fn publish<T: Pod + PartialEq>(&mut self, name: &str, last: &mut Option<T>, record: T) {
        if !self.forced && last.as_ref() == Some(&record) {
            return;
        }
        match self.cache.set_record(self.device, name, 0, &record) {
            Ok(_) => *last = Some(record),
            Err(error) => self.sink.report(Diagnostic::State(error)),
        }
    }
}

#[cfg(test)]
mod test;
