use std::{
    collections::{HashMap, VecDeque},
    mem::{self, Discriminant},
};

use enum_map::{enum_map, EnumMap};

use crate::{
    device::{
        BarrierFlags, BufferId, BufferTarget, Capability, ClearRequest, Device, DeviceHandle,
        FenceId, ImageBinding, IndexType, PrimitiveMode, TextureType, UsageHint, VertexBinding,
        VertexFormat, WaitResult,
    },
    error::DeviceError,
    params::{
        BlendEquation, BlendFunc, Color4f, ColorBufferParameters, Comparison, CullFaceParameters,
        DepthBufferParameters, PolygonMode, Rect, StencilAction,
    },
};

/// One call made on a [RecordingDevice].
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCall {
    UseProgram(Option<DeviceHandle>),
    BindFramebuffer(Option<DeviceHandle>),
    SetViewport(Rect),
    SetScissor(Option<Rect>),
    SetVertexFormat {
        location: u32,
        format: Option<VertexFormat>,
    },
    BindVertexBuffer {
        binding: u32,
        vertex_binding: VertexBinding,
    },
    BindIndexBuffer(Option<BufferId>),
    SetBlendEnabled(bool),
    SetBlendFunc(BlendFunc),
    SetBlendColor(Color4f),
    SetBlendEquation(BlendEquation, BlendEquation),
    SetColorMask(ColorBufferParameters),
    SetCullFace(CullFaceParameters),
    SetDepth(DepthBufferParameters),
    SetLineWidth(f32),
    SetPointSize(f32),
    SetStencilEnabled(bool),
    SetStencilFunc {
        function: Comparison,
        reference: i32,
        mask: u32,
    },
    SetStencilOp {
        fail: StencilAction,
        depth_fail: StencilAction,
        depth_pass: StencilAction,
    },
    SetPolygonMode(PolygonMode),
    SetPolygonOffset(Option<(f32, f32)>),
    BindTexture {
        unit: u32,
        texture: Option<(TextureType, DeviceHandle)>,
    },
    BindImage {
        unit: u32,
        image: Option<ImageBinding>,
    },
    CreateBuffer {
        buffer: BufferId,
        size: usize,
        usage: UsageHint,
    },
    DeleteBuffer(BufferId),
    UploadBuffer {
        buffer: BufferId,
        offset: usize,
        len: usize,
    },
    CopyBuffer {
        src: BufferId,
        dst: BufferId,
        src_offset: usize,
        dst_offset: usize,
        size: usize,
    },
    BindBufferRange {
        target: BufferTarget,
        location: u32,
        buffer: BufferId,
        offset: usize,
        size: usize,
    },
    Fence(FenceId),
    ClientWait {
        fence: FenceId,
        flush: bool,
        timeout_ns: u64,
    },
    DeleteFence(FenceId),
    DrawArrays {
        mode: PrimitiveMode,
        first: u32,
        count: u32,
        instances: u32,
        base_instance: u32,
    },
    DrawElements {
        mode: PrimitiveMode,
        index_type: IndexType,
        first: u32,
        count: u32,
        instances: u32,
        base_vertex: i32,
        base_instance: u32,
    },
    DispatchCompute([u32; 3]),
    DispatchComputeIndirect(usize),
    Clear(ClearRequest),
    Flush,
    Finish,
    MemoryBarrier(BarrierFlags),
}

impl DeviceCall {
    /// True for draw and compute commands.
    pub fn is_command(&self) -> bool {
        matches!(
            self,
            DeviceCall::DrawArrays { .. }
                | DeviceCall::DrawElements { .. }
                | DeviceCall::DispatchCompute(_)
                | DeviceCall::DispatchComputeIndirect(_)
        )
    }
}

/// A headless [Device] that records every call.
///
/// Buffer contents are kept in memory so they can be read back. Fences are never
/// signaled by a non-flushing poll and always by a flushing wait, which exercises the
/// slow path of fence waits. Errors can be queued with [RecordingDevice::push_error]
/// and are returned by [Device::take_error] in order.
#[derive(Debug)]
pub struct RecordingDevice {
    calls: Vec<DeviceCall>,
    capabilities: EnumMap<Capability, bool>,
    buffers: HashMap<BufferId, Vec<u8>>,
    next_buffer: u32,
    next_fence: u64,
    errors: VecDeque<DeviceError>,
    fail_buffer_creation: bool,
    buffer_budget: Option<usize>,
    fence_result: Option<WaitResult>,
    error_triggers: Vec<(Discriminant<DeviceCall>, DeviceError)>,
}

impl Default for RecordingDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingDevice {
    /// A device that supports every capability.
    pub fn new() -> Self {
        Self {
            calls: Vec::new(),
            capabilities: enum_map! { _ => true },
            buffers: HashMap::new(),
            next_buffer: 1,
            next_fence: 1,
            errors: VecDeque::new(),
            fail_buffer_creation: false,
            buffer_budget: None,
            fence_result: None,
            error_triggers: Vec::new(),
        }
    }

    /// Removes a capability.
    pub fn without(mut self, capability: Capability) -> Self {
        self.capabilities[capability] = false;
        self
    }

    /// Every call recorded so far, oldest first.
    pub fn calls(&self) -> &[DeviceCall] {
        &self.calls
    }

    #[allow(missing_docs)]
    pub fn take_calls(&mut self) -> Vec<DeviceCall> {
        std::mem::take(&mut self.calls)
    }

    #[allow(missing_docs)]
    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    /// Number of recorded calls matching `pred`.
    pub fn count_calls(&self, pred: impl Fn(&DeviceCall) -> bool) -> usize {
        self.calls.iter().filter(|call| pred(call)).count()
    }

    /// The current contents of a buffer.
    pub fn buffer_data(&self, buffer: BufferId) -> Option<&[u8]> {
        self.buffers.get(&buffer).map(Vec::as_slice)
    }

    /// Number of buffers that have been created and not deleted.
    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    /// Queues an error to be returned by [Device::take_error].
    pub fn push_error(&mut self, error: DeviceError) {
        self.errors.push_back(error);
    }

    /// Makes subsequent buffer creation fail with [DeviceError::OutOfMemory].
    pub fn set_fail_buffer_creation(&mut self, fail: bool) {
        self.fail_buffer_creation = fail;
    }

    /// Lets `count` more buffers be created; later creations fail with
    /// [DeviceError::OutOfMemory].
    pub fn limit_buffer_creation(&mut self, count: usize) {
        self.buffer_budget = Some(count);
    }

    /// Queues `error` the next time a call of the same kind as `call` is recorded.
    /// Only the variant of `call` matters, not its arguments.
    pub fn fail_on(&mut self, call: &DeviceCall, error: DeviceError) {
        self.error_triggers.push((mem::discriminant(call), error));
    }

    /// Makes every fence wait return `result`.
    pub fn set_fence_result(&mut self, result: WaitResult) {
        self.fence_result = Some(result);
    }

    fn record(&mut self, call: DeviceCall) {
        tracing::trace!("{:?}", call);
        let kind = mem::discriminant(&call);
        if let Some(i) = self.error_triggers.iter().position(|(k, _)| *k == kind) {
            let (_, error) = self.error_triggers.remove(i);
            self.errors.push_back(error);
        }
        self.calls.push(call);
    }
}

impl Device for RecordingDevice {
    fn supports(&self, capability: Capability) -> bool {
        self.capabilities[capability]
    }

    fn take_error(&mut self) -> Option<DeviceError> {
        self.errors.pop_front()
    }

    fn use_program(&mut self, program: Option<DeviceHandle>) {
        self.record(DeviceCall::UseProgram(program));
    }

    fn bind_framebuffer(&mut self, framebuffer: Option<DeviceHandle>) {
        self.record(DeviceCall::BindFramebuffer(framebuffer));
    }

    fn set_viewport(&mut self, rect: Rect) {
        self.record(DeviceCall::SetViewport(rect));
    }

    fn set_scissor(&mut self, rect: Option<Rect>) {
        self.record(DeviceCall::SetScissor(rect));
    }

    fn set_vertex_format(&mut self, location: u32, format: Option<&VertexFormat>) {
        self.record(DeviceCall::SetVertexFormat {
            location,
            format: format.copied(),
        });
    }

    fn bind_vertex_buffer(&mut self, binding: u32, vertex_binding: &VertexBinding) {
        self.record(DeviceCall::BindVertexBuffer {
            binding,
            vertex_binding: *vertex_binding,
        });
    }

    fn bind_index_buffer(&mut self, buffer: Option<BufferId>) {
        self.record(DeviceCall::BindIndexBuffer(buffer));
    }

    fn set_blend_enabled(&mut self, enabled: bool) {
        self.record(DeviceCall::SetBlendEnabled(enabled));
    }

    fn set_blend_func(&mut self, func: BlendFunc) {
        self.record(DeviceCall::SetBlendFunc(func));
    }

    fn set_blend_color(&mut self, color: Color4f) {
        self.record(DeviceCall::SetBlendColor(color));
    }

    fn set_blend_equation(&mut self, rgb: BlendEquation, alpha: BlendEquation) {
        self.record(DeviceCall::SetBlendEquation(rgb, alpha));
    }

    fn set_color_mask(&mut self, mask: ColorBufferParameters) {
        self.record(DeviceCall::SetColorMask(mask));
    }

    fn set_cull_face(&mut self, params: CullFaceParameters) {
        self.record(DeviceCall::SetCullFace(params));
    }

    fn set_depth(&mut self, params: DepthBufferParameters) {
        self.record(DeviceCall::SetDepth(params));
    }

    fn set_line_width(&mut self, width: f32) {
        self.record(DeviceCall::SetLineWidth(width));
    }

    fn set_point_size(&mut self, size: f32) {
        self.record(DeviceCall::SetPointSize(size));
    }

    fn set_stencil_enabled(&mut self, enabled: bool) {
        self.record(DeviceCall::SetStencilEnabled(enabled));
    }

    fn set_stencil_func(&mut self, function: Comparison, reference: i32, mask: u32) {
        self.record(DeviceCall::SetStencilFunc {
            function,
            reference,
            mask,
        });
    }

    fn set_stencil_op(
        &mut self,
        fail: StencilAction,
        depth_fail: StencilAction,
        depth_pass: StencilAction,
    ) {
        self.record(DeviceCall::SetStencilOp {
            fail,
            depth_fail,
            depth_pass,
        });
    }

    fn set_polygon_mode(&mut self, mode: PolygonMode) {
        if !self.supports(Capability::PolygonMode) {
            self.errors
                .push_back(DeviceError::Unsupported(Capability::PolygonMode));
            return;
        }
        self.record(DeviceCall::SetPolygonMode(mode));
    }

    fn set_polygon_offset(&mut self, offset: Option<(f32, f32)>) {
        self.record(DeviceCall::SetPolygonOffset(offset));
    }

    fn bind_texture(&mut self, unit: u32, texture: Option<(TextureType, DeviceHandle)>) {
        self.record(DeviceCall::BindTexture { unit, texture });
    }

    fn bind_image(&mut self, unit: u32, image: Option<&ImageBinding>) -> Result<(), DeviceError> {
        if !self.supports(Capability::ImageLoadStore) {
            return Err(DeviceError::Unsupported(Capability::ImageLoadStore));
        }
        self.record(DeviceCall::BindImage {
            unit,
            image: image.copied(),
        });
        Ok(())
    }

    fn create_buffer(&mut self, size: usize, usage: UsageHint) -> Result<BufferId, DeviceError> {
        if self.fail_buffer_creation || self.buffer_budget == Some(0) {
            return Err(DeviceError::OutOfMemory);
        }
        if let Some(budget) = &mut self.buffer_budget {
            *budget -= 1;
        }
        let buffer = BufferId(self.next_buffer);
        self.next_buffer += 1;
        self.buffers.insert(buffer, vec![0; size]);
        self.record(DeviceCall::CreateBuffer {
            buffer,
            size,
            usage,
        });
        Ok(buffer)
    }

    fn delete_buffer(&mut self, buffer: BufferId) {
        self.buffers.remove(&buffer);
        self.record(DeviceCall::DeleteBuffer(buffer));
    }

    fn upload_buffer(&mut self, buffer: BufferId, offset: usize, data: &[u8]) {
        self.record(DeviceCall::UploadBuffer {
            buffer,
            offset,
            len: data.len(),
        });
        match self.buffers.get_mut(&buffer) {
            Some(contents) if offset + data.len() <= contents.len() => {
                contents[offset..offset + data.len()].copy_from_slice(data);
            }
            _ => self.errors.push_back(DeviceError::InvalidValue),
        }
    }

    fn copy_buffer(
        &mut self,
        src: BufferId,
        dst: BufferId,
        src_offset: usize,
        dst_offset: usize,
        size: usize,
    ) {
        self.record(DeviceCall::CopyBuffer {
            src,
            dst,
            src_offset,
            dst_offset,
            size,
        });
        let data = match self.buffers.get(&src) {
            Some(contents) if src_offset + size <= contents.len() => {
                contents[src_offset..src_offset + size].to_vec()
            }
            _ => {
                self.errors.push_back(DeviceError::InvalidValue);
                return;
            }
        };
        match self.buffers.get_mut(&dst) {
            Some(contents) if dst_offset + size <= contents.len() => {
                contents[dst_offset..dst_offset + size].copy_from_slice(&data);
            }
            _ => self.errors.push_back(DeviceError::InvalidValue),
        }
    }

    fn bind_buffer_range(
        &mut self,
        target: BufferTarget,
        location: u32,
        buffer: BufferId,
        offset: usize,
        size: usize,
    ) {
        self.record(DeviceCall::BindBufferRange {
            target,
            location,
            buffer,
            offset,
            size,
        });
    }

    fn fence(&mut self) -> FenceId {
        let fence = FenceId(self.next_fence);
        self.next_fence += 1;
        self.record(DeviceCall::Fence(fence));
        fence
    }

    fn client_wait(&mut self, fence: FenceId, flush: bool, timeout_ns: u64) -> WaitResult {
        self.record(DeviceCall::ClientWait {
            fence,
            flush,
            timeout_ns,
        });
        match self.fence_result {
            Some(result) => result,
            None if flush => WaitResult::ConditionSatisfied,
            None => WaitResult::TimeoutExpired,
        }
    }

    fn delete_fence(&mut self, fence: FenceId) {
        self.record(DeviceCall::DeleteFence(fence));
    }

    fn draw_arrays(
        &mut self,
        mode: PrimitiveMode,
        first: u32,
        count: u32,
        instances: u32,
        base_instance: u32,
    ) {
        self.record(DeviceCall::DrawArrays {
            mode,
            first,
            count,
            instances,
            base_instance,
        });
    }

    fn draw_elements(
        &mut self,
        mode: PrimitiveMode,
        index_type: IndexType,
        first: u32,
        count: u32,
        instances: u32,
        base_vertex: i32,
        base_instance: u32,
    ) {
        self.record(DeviceCall::DrawElements {
            mode,
            index_type,
            first,
            count,
            instances,
            base_vertex,
            base_instance,
        });
    }

    fn dispatch_compute(&mut self, groups: [u32; 3]) {
        self.record(DeviceCall::DispatchCompute(groups));
    }

    fn dispatch_compute_indirect(&mut self, offset: usize) {
        self.record(DeviceCall::DispatchComputeIndirect(offset));
    }

    fn clear(&mut self, request: &ClearRequest) {
        self.record(DeviceCall::Clear(*request));
    }

    fn flush(&mut self) {
        self.record(DeviceCall::Flush);
    }

    fn finish(&mut self) {
        self.record(DeviceCall::Finish);
    }

    fn memory_barrier(&mut self, flags: BarrierFlags) {
        self.record(DeviceCall::MemoryBarrier(flags));
    }
}
