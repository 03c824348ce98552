use std::mem::size_of;

use ultraviolet::Vec3;

use super::*;
use crate::{
    params::{Comparison, PolygonMode},
    recording::{DeviceCall, RecordingDevice},
    test_util::{TestFramebuffer, TestShader, TestTexture},
    BufferTarget, DeviceError, DeviceHandle,
};

fn context() -> RenderingContext<RecordingDevice> {
    RenderingContext::new(RecordingDevice::new()).unwrap()
}

fn read_record<T: Pod>(ctx: &RenderingContext<RecordingDevice>, name: &str, index: usize) -> T {
    let buffer = ctx.cache().current_buffer(name).unwrap();
    let data = ctx.device().buffer_data(buffer).unwrap();
    let start = index * size_of::<T>();
    bytemuck::pod_read_unaligned(&data[start..start + size_of::<T>()])
}

fn uploads_to(ctx: &RenderingContext<RecordingDevice>, name: &str) -> usize {
    let target = ctx.cache().current_buffer(name).unwrap();
    ctx.device().count_calls(|c: &DeviceCall| {
        matches!(c, DeviceCall::UploadBuffer { buffer, .. } if *buffer == target)
    })
}

fn light(x: f32) -> LightParameters {
    LightParameters::point([x, 0.0, 0.0], Color4f::WHITE)
}

struct TestMesh {
    description: VertexDescription,
    indexed: bool,
}

impl TestMesh {
    fn new(indexed: bool) -> Self {
        let mut description = VertexDescription::new();
        description
            .append_float("sg_Position", 3)
            .append_float("sg_Normal", 3);
        Self {
            description,
            indexed,
        }
    }
}

impl Drawable for TestMesh {
    fn vertex_description(&self) -> &VertexDescription {
        &self.description
    }

    fn vertex_buffer(&self) -> BufferId {
        BufferId(100)
    }

    fn index_buffer(&self) -> Option<(BufferId, IndexType)> {
        self.indexed
            .then(|| (BufferId(101), IndexType::UnsignedShort))
    }

    fn primitive_mode(&self) -> PrimitiveMode {
        PrimitiveMode::Triangles
    }

    fn element_count(&self) -> u32 {
        36
    }
}

#[test]
fn test_creates_cache_slots() {
    let ctx = context();
    let mut names: Vec<&str> = ctx.cache().names().collect();
    names.sort_unstable();
    assert_eq!(
        names,
        vec![
            slot::FRAME_DATA,
            slot::LIGHT_DATA,
            slot::LIGHT_SET_DATA,
            slot::MATERIAL_DATA,
            slot::OBJECT_DATA,
            slot::TEXTURE_SET_DATA,
        ]
    );
    assert_eq!(ctx.cache().capacity(slot::OBJECT_DATA), Ok(512));
    assert_eq!(ctx.cache().buffers(slot::OBJECT_DATA).unwrap().len(), 2);
    assert_eq!(ctx.cache().capacity(slot::LIGHT_DATA), Ok(256));
    assert_eq!(ctx.device().live_buffers(), 7);
}

#[test]
fn test_creation_failure() {
    let mut device = RecordingDevice::new();
    device.set_fail_buffer_creation(true);
    let result = RenderingContext::new(device);
    assert_eq!(
        result.err(),
        Some(StateError::Device(DeviceError::OutOfMemory))
    );
}

#[test]
fn test_first_apply_is_forced() {
    let mut ctx = context();
    ctx.device_mut().clear_calls();
    ctx.apply_changes(false);
    assert_eq!(
        ctx.device()
            .count_calls(|c: &DeviceCall| matches!(c, DeviceCall::SetDepth(_))),
        1
    );
    assert_eq!(ctx.device().calls()[0], DeviceCall::UseProgram(None));

    ctx.device_mut().clear_calls();
    ctx.apply_changes(false);
    assert!(ctx.device().calls().is_empty());

    ctx.apply_changes(true);
    assert_eq!(
        ctx.device()
            .count_calls(|c: &DeviceCall| matches!(c, DeviceCall::SetDepth(_))),
        1
    );
}

#[test]
fn test_setters_are_lazy() {
    let mut ctx = context();
    ctx.apply_changes(false);
    ctx.device_mut().clear_calls();

    ctx.set_line(LineParameters { width: 3.0 });
    assert!(ctx.device().calls().is_empty());
    assert_eq!(ctx.line().width, 3.0);
    assert_eq!(ctx.active_state().line.width, 1.0);

    ctx.apply_changes(false);
    assert_eq!(ctx.device().calls(), &[DeviceCall::SetLineWidth(3.0)]);
}

#[test]
fn test_depth_push_draw_pop() {
    let mut ctx = context();
    let custom = DepthBufferParameters::new(true, false, Comparison::LessOrEqual);
    ctx.push_and_set_depth_buffer(custom);
    ctx.draw_arrays(PrimitiveMode::Triangles, 0, 3);
    assert_eq!(ctx.active_state().depth_buffer, custom);

    ctx.pop_depth_buffer();
    ctx.device_mut().clear_calls();
    ctx.draw_arrays(PrimitiveMode::Triangles, 0, 3);

    let restored = ctx.active_state().depth_buffer;
    assert!(restored.test);
    assert!(restored.write);
    assert_eq!(restored.function, Comparison::Less);
    assert_eq!(
        ctx.device()
            .count_calls(|c: &DeviceCall| *c == DeviceCall::SetDepth(restored)),
        1
    );
}

#[test]
fn test_stack_lifo() {
    let mut ctx = context();
    ctx.push_and_set_line(LineParameters { width: 2.0 });
    ctx.push_and_set_line(LineParameters { width: 3.0 });
    ctx.pop_line();
    assert_eq!(ctx.line().width, 2.0);
    ctx.pop_line();
    assert_eq!(ctx.line().width, 1.0);
    assert!(ctx.diagnostics().is_empty());
}

#[test]
fn test_empty_pop_reports() {
    let mut ctx = context();
    ctx.set_blending(BlendingParameters::alpha());
    ctx.pop_blending();
    assert_eq!(ctx.blending(), &BlendingParameters::alpha());
    assert_eq!(
        ctx.take_diagnostics(),
        vec![Diagnostic::EmptyStack(StateCategory::Blending)]
    );

    ctx.pop_state(StateCategory::Texture(3));
    assert_eq!(
        ctx.take_diagnostics(),
        vec![Diagnostic::EmptyStack(StateCategory::Texture(3))]
    );
}

#[test]
fn test_reset_stacks() {
    let mut ctx = context();
    ctx.push_and_set_viewport(Rect::new(0, 0, 10, 10));
    ctx.push_projection();
    ctx.reset_stacks();
    ctx.pop_viewport();
    ctx.pop_projection();
    assert_eq!(ctx.viewport(), Rect::new(0, 0, 10, 10));
    assert_eq!(ctx.diagnostics().len(), 2);
}

#[test]
fn test_scoped_state() {
    let mut ctx = context();
    {
        let mut scope = ctx.scoped_depth_buffer(DepthBufferParameters::disabled());
        scope.draw_arrays(PrimitiveMode::Triangles, 0, 3);
        assert_eq!(scope.depth_buffer(), &DepthBufferParameters::disabled());
        assert_eq!(scope.category(), StateCategory::DepthBuffer);
    }
    assert_eq!(ctx.depth_buffer(), &DepthBufferParameters::default());
    // Restoring only changes the target state.
    assert_eq!(ctx.active_state().depth_buffer, DepthBufferParameters::disabled());

    {
        let _scope = ctx.scoped_texture(2, Some(TestTexture::new(4))).unwrap();
    }
    assert_eq!(ctx.texture(2), Ok(None));
    assert!(ctx.diagnostics().is_empty());
}

#[test]
fn test_invalid_units() {
    let mut ctx = context();
    assert_eq!(
        ctx.set_texture(MAX_TEXTURES, None),
        Err(StateError::InvalidTextureUnit(MAX_TEXTURES))
    );
    assert_eq!(
        ctx.push_texture(MAX_TEXTURES),
        Err(StateError::InvalidTextureUnit(MAX_TEXTURES))
    );
    assert_eq!(
        ctx.push_bound_image(MAX_BOUND_IMAGES),
        Err(StateError::InvalidImageUnit(MAX_BOUND_IMAGES))
    );
    assert_eq!(
        ctx.set_vertex_format(MAX_VERTEX_BINDINGS, &VertexDescription::new()),
        Err(StateError::InvalidVertexBinding(MAX_VERTEX_BINDINGS))
    );
    assert_eq!(
        ctx.bind_vertex_buffer(MAX_VERTEX_BINDINGS, None, 0, 0, 0),
        Err(StateError::InvalidVertexBinding(MAX_VERTEX_BINDINGS))
    );
}

#[test]
fn test_texture_usage() {
    let mut ctx = context();
    assert_eq!(ctx.texture_usage(0), Ok(TextureUsage::Disabled));
    ctx.push_and_set_texture(0, Some(TestTexture::new(9))).unwrap();
    assert_eq!(ctx.texture_usage(0), Ok(TextureUsage::TextureMapping));

    ctx.apply_changes(false);
    let set: TextureSetData = read_record(&ctx, slot::TEXTURE_SET_DATA, 0);
    assert_eq!(set.enabled[0], 1);
    assert_eq!(set.enabled[1], 0);

    ctx.pop_texture(0).unwrap();
    assert_eq!(ctx.texture_usage(0), Ok(TextureUsage::Disabled));
}

#[test]
fn test_draw_ids_and_swap() {
    let mut ctx = context();
    let first_buffer = ctx.cache().current_buffer(slot::OBJECT_DATA).unwrap();

    for expected in 0..511 {
        assert_eq!(ctx.draw_arrays(PrimitiveMode::Triangles, 0, 3), expected);
    }
    assert_eq!(
        ctx.cache().current_buffer(slot::OBJECT_DATA),
        Ok(first_buffer)
    );

    assert_eq!(ctx.draw_arrays(PrimitiveMode::Triangles, 0, 3), 511);
    let second_buffer = ctx.cache().current_buffer(slot::OBJECT_DATA).unwrap();
    assert_ne!(second_buffer, first_buffer);

    assert_eq!(ctx.draw_arrays(PrimitiveMode::Triangles, 0, 3), 0);
    let last = ctx.device().calls().iter().rev().find(|c| c.is_command());
    assert_eq!(
        last,
        Some(&DeviceCall::DrawArrays {
            mode: PrimitiveMode::Triangles,
            first: 0,
            count: 3,
            instances: 1,
            base_instance: 0,
        })
    );
}

#[test]
fn test_object_record_contents() {
    let mut ctx = context();
    let translation = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0));
    ctx.set_model_to_camera(translation);
    ctx.set_point(PointParameters { size: 4.0 });
    ctx.draw_arrays(PrimitiveMode::Points, 0, 1);
    let id = ctx.draw_arrays(PrimitiveMode::Points, 0, 1);

    let record: ObjectData = read_record(&ctx, slot::OBJECT_DATA, id as usize);
    assert_eq!(record.draw_id, 1);
    assert_eq!(record.point_size, 4.0);
    assert_eq!(record.model_to_camera, translation);
}

#[test]
fn test_singletons_published_on_change() {
    let mut ctx = context();
    ctx.draw_arrays(PrimitiveMode::Triangles, 0, 3);
    assert_eq!(uploads_to(&ctx, slot::FRAME_DATA), 1);
    assert_eq!(uploads_to(&ctx, slot::MATERIAL_DATA), 1);

    ctx.device_mut().clear_calls();
    ctx.draw_arrays(PrimitiveMode::Triangles, 0, 3);
    assert_eq!(uploads_to(&ctx, slot::FRAME_DATA), 0);
    assert_eq!(uploads_to(&ctx, slot::MATERIAL_DATA), 0);

    ctx.set_viewport(Rect::new(0, 0, 640, 480));
    ctx.draw_arrays(PrimitiveMode::Triangles, 0, 3);
    assert_eq!(uploads_to(&ctx, slot::FRAME_DATA), 1);
    let frame: FrameData = read_record(&ctx, slot::FRAME_DATA, 0);
    assert_eq!(frame.viewport, [0.0, 0.0, 640.0, 480.0]);
}

#[test]
fn test_projection_inverse() {
    let mut ctx = context();
    let projection = Mat4::from_translation(Vec3::new(4.0, 0.0, -2.0));
    ctx.push_and_set_projection(projection);
    ctx.apply_changes(false);

    let frame: FrameData = read_record(&ctx, slot::FRAME_DATA, 0);
    assert_eq!(frame.camera_to_clipping, projection);
    let inverse: [f32; 16] = bytemuck::cast(frame.clipping_to_camera);
    let expected: [f32; 16] = bytemuck::cast(Mat4::from_translation(Vec3::new(-4.0, 0.0, 2.0)));
    for (a, b) in inverse.iter().zip(&expected) {
        assert!((a - b).abs() < 1e-5);
    }

    ctx.pop_projection();
    assert_eq!(ctx.projection(), Mat4::identity());
}

#[test]
fn test_model_to_camera_stack() {
    let mut ctx = context();
    let view = Mat4::from_translation(Vec3::new(0.0, 0.0, -5.0));
    ctx.set_world_to_camera(view);
    ctx.set_model_to_camera(ctx.world_to_camera());
    assert_eq!(ctx.model_to_camera(), view);

    let offset = Mat4::from_translation(Vec3::new(1.0, 0.0, 0.0));
    {
        let scope = ctx.scoped_model_to_camera(offset);
        assert_eq!(scope.model_to_camera(), view * offset);
    }
    assert_eq!(ctx.model_to_camera(), view);

    ctx.reset_model_to_camera();
    assert_eq!(ctx.model_to_camera(), Mat4::identity());
}

#[test]
fn test_material_stack() {
    let mut ctx = context();
    assert_eq!(ctx.material(), None);

    ctx.push_and_set_color_material(Color4f::new(1.0, 0.0, 0.0, 1.0));
    let material = ctx.material().copied().unwrap();
    assert_eq!(material.diffuse, Color4f::new(1.0, 0.0, 0.0, 1.0));

    ctx.apply_changes(false);
    let record: MaterialData = read_record(&ctx, slot::MATERIAL_DATA, 0);
    assert!(record.is_enabled());

    ctx.pop_material();
    assert_eq!(ctx.material(), None);
    ctx.pop_material();
    assert_eq!(
        ctx.diagnostics(),
        &[Diagnostic::EmptyStack(StateCategory::Material)]
    );
}

#[test]
fn test_disable_middle_light() {
    let mut ctx = context();
    let ids: Vec<LightId> = (0..3)
        .map(|i| ctx.enable_light(light(i as f32)).unwrap())
        .collect();
    ctx.disable_light(ids[1]);
    assert_eq!(ctx.enabled_lights().len(), 2);

    ctx.apply_changes(false);
    let set: LightSetData = read_record(&ctx, slot::LIGHT_SET_DATA, 0);
    assert_eq!(set.count, 2);
    assert!(set.contains(ids[0].0 as u32));
    assert!(set.contains(ids[2].0 as u32));
}

#[test]
fn test_enable_light_dedups() {
    let mut ctx = context();
    let a = ctx.enable_light(light(1.0)).unwrap();
    let b = ctx.enable_light(light(1.0)).unwrap();
    assert_eq!(a, b);
    assert_eq!(ctx.enabled_lights(), vec![a]);
    assert_eq!(uploads_to(&ctx, slot::LIGHT_DATA), 1);

    let record: LightParameters = read_record(&ctx, slot::LIGHT_DATA, a.0 as usize);
    assert_eq!(record, light(1.0));

    ctx.disable_light(a);
    assert_eq!(ctx.enable_light(light(1.0)), Some(a));
    assert_eq!(uploads_to(&ctx, slot::LIGHT_DATA), 1);
}

#[test]
fn test_too_many_lights() {
    let mut ctx = context();
    for i in 0..MAX_ENABLED_LIGHTS {
        ctx.enable_light(light(i as f32)).unwrap();
    }
    let extra = ctx.enable_light(light(100.0));
    assert!(extra.is_some());
    assert_eq!(ctx.enabled_lights().len(), MAX_ENABLED_LIGHTS);
    assert_eq!(ctx.diagnostics(), &[Diagnostic::TooManyEnabledLights]);
}

#[test]
fn test_light_pool_exhausted() {
    let config = ContextConfig {
        light_capacity: 2,
        ..Default::default()
    };
    let mut ctx = RenderingContext::with_config(RecordingDevice::new(), config).unwrap();
    ctx.register_light(light(1.0)).unwrap();
    ctx.register_light(light(2.0)).unwrap();
    assert_eq!(ctx.register_light(light(3.0)), None);
    assert_eq!(ctx.diagnostics(), &[Diagnostic::LightPoolExhausted]);
}

#[test]
fn test_unregister_enabled_light() {
    let mut ctx = context();
    let id = ctx.enable_light(light(1.0)).unwrap();
    ctx.unregister_light(id);
    assert!(ctx.enabled_lights().is_empty());
    assert_eq!(
        ctx.diagnostics(),
        &[Diagnostic::UnregisteredActiveLight(id)]
    );
    assert_eq!(ctx.lights().free_count(), 256);
}

#[test]
fn test_set_light_writes_record() {
    let mut ctx = context();
    ctx.set_light(LightId(5), light(7.0));
    let record: LightParameters = read_record(&ctx, slot::LIGHT_DATA, 5);
    assert_eq!(record, light(7.0));
    assert_eq!(ctx.register_light(light(7.0)), Some(LightId(5)));
}

#[test]
fn test_set_light_past_capacity() {
    let config = ContextConfig {
        light_capacity: 4,
        ..Default::default()
    };
    let mut ctx = RenderingContext::with_config(RecordingDevice::new(), config).unwrap();
    ctx.set_light(LightId(9), light(1.0));
    assert_eq!(
        ctx.diagnostics(),
        &[Diagnostic::CacheIndexOutOfRange {
            cache: slot::LIGHT_DATA,
            index: 9,
        }]
    );
}

#[test]
fn test_shader_resources() {
    let mut ctx = context();
    let shader = TestShader::new(7);
    ctx.set_shader(Some(shader.clone().into_ref()));
    assert!(ctx.is_shader_enabled());

    ctx.draw_arrays(PrimitiveMode::Triangles, 0, 3);
    let binds = |ctx: &RenderingContext<RecordingDevice>| {
        ctx.device()
            .count_calls(|c: &DeviceCall| matches!(c, DeviceCall::BindBufferRange { .. }))
    };
    assert_eq!(binds(&ctx), 6);
    assert_eq!(shader.syncs.get(), 1);
    assert!(ctx
        .device()
        .calls()
        .contains(&DeviceCall::UseProgram(Some(DeviceHandle(7)))));

    ctx.device_mut().clear_calls();
    ctx.draw_arrays(PrimitiveMode::Triangles, 0, 3);
    assert_eq!(binds(&ctx), 0);
    assert_eq!(shader.syncs.get(), 2);
}

#[test]
fn test_shaders_sharing_a_binding_point() {
    let mut ctx = context();
    let frame_shader = TestShader::with_blocks(1, &[(slot::FRAME_DATA, 0)]).into_ref();
    let material_shader = TestShader::with_blocks(2, &[(slot::MATERIAL_DATA, 0)]).into_ref();

    ctx.set_shader(Some(frame_shader.clone()));
    ctx.draw_arrays(PrimitiveMode::Triangles, 0, 3);
    ctx.set_shader(Some(material_shader));
    ctx.draw_arrays(PrimitiveMode::Triangles, 0, 3);
    let material = ctx.cache().current_buffer(slot::MATERIAL_DATA).unwrap();
    assert_eq!(
        ctx.cache().bound_buffer(BufferTarget::ShaderStorage, 0),
        Some(material)
    );

    ctx.device_mut().clear_calls();
    ctx.set_shader(Some(frame_shader));
    ctx.draw_arrays(PrimitiveMode::Triangles, 0, 3);
    let frame = ctx.cache().current_buffer(slot::FRAME_DATA).unwrap();
    let rebinds = ctx.device().count_calls(|c: &DeviceCall| {
        matches!(c, DeviceCall::BindBufferRange { buffer, location: 0, .. } if *buffer == frame)
    });
    assert_eq!(rebinds, 1);
    assert_eq!(
        ctx.cache().bound_buffer(BufferTarget::ShaderStorage, 0),
        Some(frame)
    );
}

#[test]
fn test_swap_rebinds_object_data() {
    let config = ContextConfig {
        object_capacity: 2,
        ..Default::default()
    };
    let mut ctx = RenderingContext::with_config(RecordingDevice::new(), config).unwrap();
    ctx.set_shader(Some(TestShader::new(1).into_ref()));
    ctx.draw_arrays(PrimitiveMode::Triangles, 0, 3);
    ctx.device_mut().clear_calls();

    ctx.draw_arrays(PrimitiveMode::Triangles, 0, 3);
    let current = ctx.cache().current_buffer(slot::OBJECT_DATA).unwrap();
    let rebinds = ctx.device().count_calls(|c: &DeviceCall| {
        matches!(c, DeviceCall::BindBufferRange { buffer, location: 1, .. } if *buffer == current)
    });
    assert_eq!(rebinds, 1);
}

#[test]
fn test_vertex_format_from_shader() {
    let mut ctx = context();
    ctx.set_shader(Some(TestShader::new(1).into_ref()));
    let mut description = VertexDescription::new();
    description
        .append_float("sg_Normal", 3)
        .append_float("sg_Unused", 2)
        .append_float("sg_Position", 3);
    ctx.set_vertex_format(0, &description).unwrap();

    let formats = &ctx.target_state().vertex_formats;
    assert_eq!(formats[0].map(|f| f.relative_offset), Some(20));
    assert_eq!(formats[1].map(|f| f.relative_offset), Some(0));
    assert_eq!(formats[2], None);

    // Redefining the binding drops its previous locations.
    let mut position_only = VertexDescription::new();
    position_only.append_float("sg_Position", 3);
    ctx.set_vertex_format(0, &position_only).unwrap();
    let formats = &ctx.target_state().vertex_formats;
    assert_eq!(formats[0].map(|f| f.relative_offset), Some(0));
    assert_eq!(formats[1], None);
}

#[test]
fn test_vertex_format_without_shader() {
    let mut ctx = context();
    let mut description = VertexDescription::new();
    description.append_float("a", 2).append_float("b", 4);
    ctx.set_vertex_format(3, &description).unwrap();

    let formats = &ctx.target_state().vertex_formats;
    assert_eq!(formats[0].map(|f| (f.binding, f.num_values)), Some((3, 2)));
    assert_eq!(formats[1].map(|f| (f.binding, f.relative_offset)), Some((3, 8)));
}

#[test]
fn test_display_mesh() {
    let mut ctx = context();
    ctx.set_shader(Some(TestShader::new(1).into_ref()));
    ctx.display_mesh(&TestMesh::new(true)).unwrap();

    let calls = ctx.device().calls();
    assert!(calls.contains(&DeviceCall::BindVertexBuffer {
        binding: 0,
        vertex_binding: VertexBinding {
            buffer: Some(BufferId(100)),
            offset: 0,
            stride: 24,
            divisor: 0,
        },
    }));
    assert!(calls.contains(&DeviceCall::BindIndexBuffer(Some(BufferId(101)))));
    assert_eq!(ctx.index_buffer(), Some(BufferId(101)));
    assert_eq!(ctx.vertex_binding(0).unwrap().stride, 24);
    assert_eq!(
        calls.iter().find(|c| c.is_command()),
        Some(&DeviceCall::DrawElements {
            mode: PrimitiveMode::Triangles,
            index_type: IndexType::UnsignedShort,
            first: 0,
            count: 36,
            instances: 1,
            base_vertex: 0,
            base_instance: 0,
        })
    );

    ctx.device_mut().clear_calls();
    let id = ctx.display_mesh_range(&TestMesh::new(false), 6, 12).unwrap();
    assert_eq!(id, 1);
    assert!(ctx
        .device()
        .calls()
        .contains(&DeviceCall::BindIndexBuffer(None)));
    assert!(ctx.device().calls().contains(&DeviceCall::DrawArrays {
        mode: PrimitiveMode::Triangles,
        first: 6,
        count: 12,
        instances: 1,
        base_instance: 1,
    }));
}

#[test]
fn test_compute_requires_capability() {
    let device = RecordingDevice::new().without(Capability::ComputeShader);
    let mut ctx = RenderingContext::new(device).unwrap();
    ctx.set_shader(Some(TestShader::new(1).into_ref()));
    ctx.dispatch_compute([4, 1, 1]);
    assert_eq!(
        ctx.device()
            .count_calls(|c: &DeviceCall| matches!(c, DeviceCall::DispatchCompute(_))),
        0
    );
    assert_eq!(
        ctx.diagnostics(),
        &[Diagnostic::CapabilityUnsupported(Capability::ComputeShader)]
    );
}

#[test]
fn test_compute_requires_shader() {
    let mut ctx = context();
    ctx.dispatch_compute_indirect(0);
    assert_eq!(
        ctx.diagnostics(),
        &[Diagnostic::NoActiveShader("dispatch_compute_indirect")]
    );

    ctx.set_shader(Some(TestShader::new(1).into_ref()));
    ctx.dispatch_compute([4, 2, 1]);
    assert!(ctx
        .device()
        .calls()
        .contains(&DeviceCall::DispatchCompute([4, 2, 1])));
}

#[test]
fn test_images_require_capability() {
    let device = RecordingDevice::new().without(Capability::ImageLoadStore);
    let mut ctx = RenderingContext::new(device).unwrap();
    ctx.set_bound_image(0, ImageBindParameters::new(TestTexture::storage(5)))
        .unwrap();
    ctx.draw_arrays(PrimitiveMode::Triangles, 0, 3);

    assert_eq!(
        ctx.device().count_calls(
            |c: &DeviceCall| matches!(c, DeviceCall::BindImage { image: Some(_), .. })
        ),
        0
    );
    assert!(ctx
        .diagnostics()
        .contains(&Diagnostic::CapabilityUnsupported(Capability::ImageLoadStore)));
    // Drawing still happened.
    assert_eq!(
        ctx.device()
            .count_calls(|c: &DeviceCall| matches!(c, DeviceCall::DrawArrays { .. })),
        1
    );
}

#[test]
fn test_bound_image_needs_format() {
    let mut ctx = context();
    assert_eq!(
        ctx.push_and_set_bound_image(0, ImageBindParameters::new(TestTexture::new(5))),
        Err(StateError::UnsupportedImageFormat)
    );
    // Nothing was pushed.
    ctx.pop_bound_image(0).unwrap();
    assert_eq!(
        ctx.diagnostics(),
        &[Diagnostic::EmptyStack(StateCategory::BoundImage(0))]
    );

    let storage = TestTexture::storage(6);
    ctx.set_bound_image(1, ImageBindParameters::new(storage.clone()))
        .unwrap();
    assert_eq!(ctx.bound_image(1).unwrap().texture, Some(storage));
}

#[test]
fn test_incomplete_framebuffer() {
    let mut ctx = context();
    let status = FramebufferStatus::Incomplete("missing attachment".to_string());
    ctx.set_fbo(Some(TestFramebuffer::new(3, status.clone())));
    ctx.draw_arrays(PrimitiveMode::Triangles, 0, 3);

    assert_eq!(ctx.framebuffer_status(), &status);
    assert!(ctx
        .diagnostics()
        .iter()
        .any(|d| matches!(d, Diagnostic::IncompleteFramebuffer(_))));
    assert!(ctx.active_fbo().is_some());

    ctx.set_fbo(None);
    ctx.draw_arrays(PrimitiveMode::Triangles, 0, 3);
    assert_eq!(ctx.framebuffer_status(), &FramebufferStatus::Complete);
}

#[test]
fn test_clear_screen_rect() {
    let mut ctx = context();
    let rect = Rect::new(10, 10, 100, 50);
    ctx.clear_screen_rect(rect, Color4f::BLACK, true);

    assert_eq!(ctx.scissor(), &ScissorParameters::default());
    let calls = ctx.device().calls();
    let scissor = calls
        .iter()
        .position(|c| *c == DeviceCall::SetScissor(Some(rect)))
        .unwrap();
    let clear = calls
        .iter()
        .position(|c| {
            *c == DeviceCall::Clear(ClearRequest {
                color: Some(Color4f::BLACK),
                depth: Some(1.0),
                stencil: None,
            })
        })
        .unwrap();
    assert!(scissor < clear);
    assert!(ctx.diagnostics().is_empty());
}

#[test]
fn test_clears() {
    let mut ctx = context();
    ctx.clear_screen(Color4f::WHITE);
    ctx.clear_stencil(3);
    let clears: Vec<&DeviceCall> = ctx
        .device()
        .calls()
        .iter()
        .filter(|c| matches!(c, DeviceCall::Clear(_)))
        .collect();
    assert_eq!(
        clears,
        vec![
            &DeviceCall::Clear(ClearRequest {
                color: Some(Color4f::WHITE),
                depth: Some(1.0),
                stencil: None,
            }),
            &DeviceCall::Clear(ClearRequest {
                stencil: Some(3),
                ..Default::default()
            }),
        ]
    );
}

#[test]
fn test_sync_calls_apply() {
    let mut ctx = context();
    ctx.barrier(BarrierFlags::empty());
    ctx.flush();
    ctx.finish();
    let calls = ctx.device().calls();
    assert!(calls.contains(&DeviceCall::MemoryBarrier(BarrierFlags::all())));
    assert_eq!(calls.last(), Some(&DeviceCall::Finish));
    // The barrier's apply was the first, forced one.
    assert!(calls.iter().any(|c| matches!(c, DeviceCall::SetDepth(_))));
}

#[test]
fn test_device_errors_reported() {
    let mut ctx = context();
    ctx.apply_changes(false);
    ctx.device_mut().push_error(DeviceError::InvalidOperation);
    ctx.draw_arrays(PrimitiveMode::Triangles, 0, 3);
    assert_eq!(
        ctx.diagnostics(),
        &[Diagnostic::Device {
            context: "publishing parameters",
            error: DeviceError::InvalidOperation,
        }]
    );
}

#[test]
fn test_polygon_mode_capability() {
    let device = RecordingDevice::new().without(Capability::PolygonMode);
    let mut ctx = RenderingContext::new(device).unwrap();
    ctx.draw_arrays(PrimitiveMode::Triangles, 0, 3);
    assert!(ctx.diagnostics().is_empty());

    ctx.set_polygon_mode(PolygonModeParameters {
        mode: PolygonMode::Line,
    });
    ctx.draw_arrays(PrimitiveMode::Triangles, 0, 3);
    assert!(ctx
        .diagnostics()
        .contains(&Diagnostic::CapabilityUnsupported(Capability::PolygonMode)));
}
