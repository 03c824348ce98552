use bitflags::bitflags;
use enum_map::Enum;
use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::{
    error::DeviceError,
    params::{
        BlendEquation, BlendFunc, Color4f, ColorBufferParameters, Comparison, CullFaceParameters,
        DepthBufferParameters, ImageAccess, PolygonMode, Rect, StencilAction,
    },
    resource::AttributeType,
};

/// A device object name (program, framebuffer, texture).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceHandle(pub u32);

/// A device buffer object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(pub u32);

/// A fence sync object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FenceId(pub u64);

/// Optional device features that a context checks before using them.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Enum)]
pub enum Capability {
    ImageLoadStore,
    ComputeShader,
    PolygonMode,
}

#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[repr(u32)]
pub enum PrimitiveMode {
    Points = 0,
    Lines = 1,
    LineLoop = 2,
    LineStrip = 3,
    Triangles = 4,
    TriangleStrip = 5,
    TriangleFan = 6,
}

#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[repr(u32)]
pub enum IndexType {
    UnsignedByte = 0x1401,
    UnsignedShort = 0x1403,
    UnsignedInt = 0x1405,
}

impl IndexType {
    /// Size of one index in bytes.
    pub fn size(self) -> u32 {
        match self {
            IndexType::UnsignedByte => 1,
            IndexType::UnsignedShort => 2,
            IndexType::UnsignedInt => 4,
        }
    }
}

/// Indexed binding targets for buffer ranges.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[repr(u32)]
pub enum BufferTarget {
    Uniform = 0x8A11,
    ShaderStorage = 0x90D2,
    AtomicCounter = 0x92C0,
}

#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[repr(u32)]
pub enum TextureType {
    Texture1D = 0x0DE0,
    Texture2D = 0x0DE1,
    Texture3D = 0x806F,
    CubeMap = 0x8513,
    Texture1DArray = 0x8C18,
    Texture2DArray = 0x8C1A,
    TextureBuffer = 0x8C2A,
    CubeMapArray = 0x9009,
    Texture2DMultisample = 0x9100,
}

/// How often a buffer's contents are expected to change.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[repr(u32)]
pub enum UsageHint {
    Stream = 0x88E0,
    Static = 0x88E4,
    Dynamic = 0x88E8,
}

#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[repr(u32)]
pub enum WaitResult {
    AlreadySignaled = 0x911A,
    TimeoutExpired = 0x911B,
    ConditionSatisfied = 0x911C,
    WaitFailed = 0x911D,
}

impl WaitResult {
    /// True if the fence has been reached.
    pub fn is_signaled(self) -> bool {
        matches!(
            self,
            WaitResult::AlreadySignaled | WaitResult::ConditionSatisfied
        )
    }
}

bitflags! {
    /// Memory barrier bits. An empty set means every barrier.
    pub struct BarrierFlags: u32 {
        const VERTEX_ATTRIB_ARRAY  = 0x00000001;
        const ELEMENT_ARRAY        = 0x00000002;
        const UNIFORM              = 0x00000004;
        const TEXTURE_FETCH        = 0x00000008;
        const SHADER_IMAGE_ACCESS  = 0x00000020;
        const COMMAND              = 0x00000040;
        const PIXEL_BUFFER         = 0x00000080;
        const TEXTURE_UPDATE       = 0x00000100;
        const BUFFER_UPDATE        = 0x00000200;
        const FRAMEBUFFER          = 0x00000400;
        const TRANSFORM_FEEDBACK   = 0x00000800;
        const ATOMIC_COUNTER       = 0x00001000;
        const SHADER_STORAGE       = 0x00002000;
    }
}

impl Default for BarrierFlags {
    fn default() -> Self {
        Self::all()
    }
}

/// The format of one vertex attribute location, as the device sees it.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexFormat {
    pub num_values: u8,
    pub data_type: AttributeType,
    pub normalize: bool,
    pub convert_to_float: bool,
    pub relative_offset: u32,
    /// The vertex buffer binding point the attribute reads from.
    pub binding: u32,
}

/// A vertex buffer attached to a binding point.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct VertexBinding {
    pub buffer: Option<BufferId>,
    pub offset: u64,
    pub stride: u32,
    /// Instancing divisor; 0 advances per vertex.
    pub divisor: u32,
}

/// A texture level attached to an image unit, resolved to device values.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageBinding {
    pub texture: DeviceHandle,
    pub level: u32,
    pub layered: bool,
    pub layer: u32,
    pub access: ImageAccess,
    pub format: u32,
}

/// Buffers to clear and the values to clear them to.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ClearRequest {
    pub color: Option<Color4f>,
    pub depth: Option<f32>,
    pub stencil: Option<i32>,
}

/// The stateful graphics device a context drives.
///
/// Every method maps to one device command. Setters never fail directly; like the
/// underlying API, errors accumulate and are picked up with [Device::take_error] after
/// each apply phase. Only operations whose result the caller needs (buffer creation,
/// image binding) return a `Result`.
pub trait Device {
    /// Returns true if the optional feature is available.
    fn supports(&self, capability: Capability) -> bool;

    /// Returns and clears the oldest pending error.
    fn take_error(&mut self) -> Option<DeviceError>;

    /// Makes `program` current, or unbinds the current program.
    fn use_program(&mut self, program: Option<DeviceHandle>);

    /// Binds `framebuffer` for drawing, or the default framebuffer.
    fn bind_framebuffer(&mut self, framebuffer: Option<DeviceHandle>);

    #[allow(missing_docs)]
    fn set_viewport(&mut self, rect: Rect);

    /// Enables the scissor test with the given rect, or disables it.
    fn set_scissor(&mut self, rect: Option<Rect>);

    /// Sets or disables the vertex attribute at `location`.
    fn set_vertex_format(&mut self, location: u32, format: Option<&VertexFormat>);

    /// Attaches a vertex buffer to a binding point.
    fn bind_vertex_buffer(&mut self, binding: u32, vertex_binding: &VertexBinding);

    #[allow(missing_docs)]
    fn bind_index_buffer(&mut self, buffer: Option<BufferId>);

    #[allow(missing_docs)]
    fn set_blend_enabled(&mut self, enabled: bool);
    #[allow(missing_docs)]
    fn set_blend_func(&mut self, func: BlendFunc);
    #[allow(missing_docs)]
    fn set_blend_color(&mut self, color: Color4f);
    #[allow(missing_docs)]
    fn set_blend_equation(&mut self, rgb: BlendEquation, alpha: BlendEquation);
    #[allow(missing_docs)]
    fn set_color_mask(&mut self, mask: ColorBufferParameters);
    #[allow(missing_docs)]
    fn set_cull_face(&mut self, params: CullFaceParameters);
    #[allow(missing_docs)]
    fn set_depth(&mut self, params: DepthBufferParameters);
    #[allow(missing_docs)]
    fn set_line_width(&mut self, width: f32);
    #[allow(missing_docs)]
    fn set_point_size(&mut self, size: f32);
    #[allow(missing_docs)]
    fn set_stencil_enabled(&mut self, enabled: bool);
    #[allow(missing_docs)]
    fn set_stencil_func(&mut self, function: Comparison, reference: i32, mask: u32);
    #[allow(missing_docs)]
    fn set_stencil_op(
        &mut self,
        fail: StencilAction,
        depth_fail: StencilAction,
        depth_pass: StencilAction,
    );
    #[allow(missing_docs)]
    fn set_polygon_mode(&mut self, mode: PolygonMode);

    /// Sets the polygon offset factor and units, or disables the offset.
    fn set_polygon_offset(&mut self, offset: Option<(f32, f32)>);

    /// Binds a texture to a texture unit, or clears the unit.
    fn bind_texture(&mut self, unit: u32, texture: Option<(TextureType, DeviceHandle)>);

    /// Binds a texture level to an image unit, or clears the unit.
    fn bind_image(&mut self, unit: u32, image: Option<&ImageBinding>) -> Result<(), DeviceError>;

    /// Allocates an uninitialized buffer of `size` bytes.
    fn create_buffer(&mut self, size: usize, usage: UsageHint) -> Result<BufferId, DeviceError>;

    #[allow(missing_docs)]
    fn delete_buffer(&mut self, buffer: BufferId);

    /// Writes `data` to the buffer starting at `offset`.
    fn upload_buffer(&mut self, buffer: BufferId, offset: usize, data: &[u8]);

    /// Copies `size` bytes between buffers on the device.
    fn copy_buffer(
        &mut self,
        src: BufferId,
        dst: BufferId,
        src_offset: usize,
        dst_offset: usize,
        size: usize,
    );

    /// Binds a range of a buffer to an indexed binding point.
    fn bind_buffer_range(
        &mut self,
        target: BufferTarget,
        location: u32,
        buffer: BufferId,
        offset: usize,
        size: usize,
    );

    /// Inserts a fence after all commands issued so far.
    fn fence(&mut self) -> FenceId;

    /// Waits for a fence up to `timeout_ns`, optionally flushing the command queue first.
    fn client_wait(&mut self, fence: FenceId, flush: bool, timeout_ns: u64) -> WaitResult;

    #[allow(missing_docs)]
    fn delete_fence(&mut self, fence: FenceId);

    #[allow(missing_docs)]
    fn draw_arrays(
        &mut self,
        mode: PrimitiveMode,
        first: u32,
        count: u32,
        instances: u32,
        base_instance: u32,
    );

    /// Draws `count` indices starting at index `first`.
    fn draw_elements(
        &mut self,
        mode: PrimitiveMode,
        index_type: IndexType,
        first: u32,
        count: u32,
        instances: u32,
        base_vertex: i32,
        base_instance: u32,
    );

    #[allow(missing_docs)]
    fn dispatch_compute(&mut self, groups: [u32; 3]);

    /// Dispatches with group counts read from the bound indirect buffer at `offset`.
    fn dispatch_compute_indirect(&mut self, offset: usize);

    #[allow(missing_docs)]
    fn clear(&mut self, request: &ClearRequest);
    #[allow(missing_docs)]
    fn flush(&mut self);
    #[allow(missing_docs)]
    fn finish(&mut self);
    #[allow(missing_docs)]
    fn memory_barrier(&mut self, flags: BarrierFlags);
}
