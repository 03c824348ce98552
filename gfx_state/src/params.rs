//! Value types for each orthogonal category of rendering state.
//!
//! Every type here is plain data, compared by value, and its [Default] is the
//! baseline a fresh [crate::RenderingContext] starts from.

use bytemuck::{Pod, Zeroable};
use derivative::Derivative;
use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::resource::TextureRef;

/// An rgba color with float components.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Zeroable, Pod)]
#[repr(C)]
pub struct Color4f {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

#[allow(missing_docs)]
impl Color4f {
    pub const BLACK: Self = Self::new(0.0, 0.0, 0.0, 1.0);
    pub const WHITE: Self = Self::new(1.0, 1.0, 1.0, 1.0);
    pub const TRANSPARENT: Self = Self::new(0.0, 0.0, 0.0, 0.0);

    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

/// A rectangle in window coordinates.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

#[allow(missing_docs)]
impl Rect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn to_vec4(self) -> [f32; 4] {
        [
            self.x as f32,
            self.y as f32,
            self.width as f32,
            self.height as f32,
        ]
    }
}

/// A comparison function used by depth and stencil tests.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[repr(u32)]
pub enum Comparison {
    Never = 0x0200,
    Less = 0x0201,
    Equal = 0x0202,
    LessOrEqual = 0x0203,
    Greater = 0x0204,
    NotEqual = 0x0205,
    GreaterOrEqual = 0x0206,
    Always = 0x0207,
}

impl Default for Comparison {
    fn default() -> Self {
        Self::Less
    }
}

#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[repr(u32)]
pub enum BlendFunction {
    Zero = 0,
    One = 1,
    SrcColor = 0x0300,
    OneMinusSrcColor = 0x0301,
    SrcAlpha = 0x0302,
    OneMinusSrcAlpha = 0x0303,
    DstAlpha = 0x0304,
    OneMinusDstAlpha = 0x0305,
    DstColor = 0x0306,
    OneMinusDstColor = 0x0307,
    SrcAlphaSaturate = 0x0308,
    ConstantColor = 0x8001,
    OneMinusConstantColor = 0x8002,
    ConstantAlpha = 0x8003,
    OneMinusConstantAlpha = 0x8004,
}

#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[repr(u32)]
pub enum BlendEquation {
    Add = 0x8006,
    Min = 0x8007,
    Max = 0x8008,
    Subtract = 0x800A,
    ReverseSubtract = 0x800B,
}

/// The four blend factors, grouped because the device sets them together.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlendFunc {
    pub src_rgb: BlendFunction,
    pub dst_rgb: BlendFunction,
    pub src_alpha: BlendFunction,
    pub dst_alpha: BlendFunction,
}

#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Derivative)]
#[derivative(Default)]
pub struct BlendingParameters {
    pub enabled: bool,
    #[derivative(Default(value = "BlendFunction::One"))]
    pub src_rgb: BlendFunction,
    #[derivative(Default(value = "BlendFunction::Zero"))]
    pub dst_rgb: BlendFunction,
    #[derivative(Default(value = "BlendFunction::One"))]
    pub src_alpha: BlendFunction,
    #[derivative(Default(value = "BlendFunction::Zero"))]
    pub dst_alpha: BlendFunction,
    #[derivative(Default(value = "BlendEquation::Add"))]
    pub equation_rgb: BlendEquation,
    #[derivative(Default(value = "BlendEquation::Add"))]
    pub equation_alpha: BlendEquation,
    pub color: Color4f,
}

impl BlendingParameters {
    /// Enabled blending using the same factors for rgb and alpha.
    pub fn enabled(src: BlendFunction, dst: BlendFunction) -> Self {
        Self {
            enabled: true,
            src_rgb: src,
            dst_rgb: dst,
            src_alpha: src,
            dst_alpha: dst,
            ..Default::default()
        }
    }

    /// Standard `src * a + dst * (1 - a)` blending.
    pub fn alpha() -> Self {
        Self::enabled(BlendFunction::SrcAlpha, BlendFunction::OneMinusSrcAlpha)
    }

    #[allow(missing_docs)]
    pub fn func(&self) -> BlendFunc {
        BlendFunc {
            src_rgb: self.src_rgb,
            dst_rgb: self.dst_rgb,
            src_alpha: self.src_alpha,
            dst_alpha: self.dst_alpha,
        }
    }
}

/// Per-channel color write mask.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Derivative)]
#[derivative(Default)]
pub struct ColorBufferParameters {
    #[derivative(Default(value = "true"))]
    pub red: bool,
    #[derivative(Default(value = "true"))]
    pub green: bool,
    #[derivative(Default(value = "true"))]
    pub blue: bool,
    #[derivative(Default(value = "true"))]
    pub alpha: bool,
}

impl ColorBufferParameters {
    /// Disables writes to every channel.
    pub fn none() -> Self {
        Self {
            red: false,
            green: false,
            blue: false,
            alpha: false,
        }
    }
}

#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[repr(u32)]
pub enum CullFaceMode {
    Front = 0x0404,
    Back = 0x0405,
    FrontAndBack = 0x0408,
}

/// Face culling. Back faces are culled by default.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Derivative)]
#[derivative(Default)]
pub struct CullFaceParameters {
    #[derivative(Default(value = "true"))]
    pub enabled: bool,
    #[derivative(Default(value = "CullFaceMode::Back"))]
    pub mode: CullFaceMode,
}

#[allow(missing_docs)]
impl CullFaceParameters {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }

    pub fn cull(mode: CullFaceMode) -> Self {
        Self {
            enabled: true,
            mode,
        }
    }
}

/// Depth test and depth writes. Both are enabled by default with [Comparison::Less].
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Derivative)]
#[derivative(Default)]
pub struct DepthBufferParameters {
    #[derivative(Default(value = "true"))]
    pub test: bool,
    #[derivative(Default(value = "true"))]
    pub write: bool,
    pub function: Comparison,
}

#[allow(missing_docs)]
impl DepthBufferParameters {
    pub fn new(test: bool, write: bool, function: Comparison) -> Self {
        Self {
            test,
            write,
            function,
        }
    }

    pub fn disabled() -> Self {
        Self::new(false, false, Comparison::Less)
    }
}

#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Derivative)]
#[derivative(Default)]
pub struct LineParameters {
    #[derivative(Default(value = "1.0"))]
    pub width: f32,
}

#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Derivative)]
#[derivative(Default)]
pub struct PointParameters {
    #[derivative(Default(value = "1.0"))]
    pub size: f32,
}

#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[repr(u32)]
pub enum PolygonMode {
    Point = 0x1B00,
    Line = 0x1B01,
    Fill = 0x1B02,
}

#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Derivative)]
#[derivative(Default)]
pub struct PolygonModeParameters {
    #[derivative(Default(value = "PolygonMode::Fill"))]
    pub mode: PolygonMode,
}

#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PolygonOffsetParameters {
    pub enabled: bool,
    pub factor: f32,
    pub units: f32,
}

impl PolygonOffsetParameters {
    /// Enabled polygon offset with the given factor and units.
    pub fn new(factor: f32, units: f32) -> Self {
        Self {
            enabled: true,
            factor,
            units,
        }
    }
}

/// Scissor test. When disabled, the rect is ignored.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ScissorParameters {
    pub enabled: bool,
    pub rect: Rect,
}

impl ScissorParameters {
    /// An enabled scissor test limited to `rect`.
    pub fn new(rect: Rect) -> Self {
        Self {
            enabled: true,
            rect,
        }
    }

    /// The rect the device should use, if the test is enabled.
    pub fn active_rect(&self) -> Option<Rect> {
        self.enabled.then(|| self.rect)
    }
}

#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[repr(u32)]
pub enum StencilAction {
    Zero = 0,
    Invert = 0x150A,
    Keep = 0x1E00,
    Replace = 0x1E01,
    Increment = 0x1E02,
    Decrement = 0x1E03,
    IncrementWrap = 0x8507,
    DecrementWrap = 0x8508,
}

#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Derivative)]
#[derivative(Default)]
pub struct StencilParameters {
    pub enabled: bool,
    #[derivative(Default(value = "Comparison::Always"))]
    pub function: Comparison,
    pub reference: i32,
    #[derivative(Default(value = "u32::MAX"))]
    pub mask: u32,
    #[derivative(Default(value = "StencilAction::Keep"))]
    pub fail: StencilAction,
    #[derivative(Default(value = "StencilAction::Keep"))]
    pub depth_fail: StencilAction,
    #[derivative(Default(value = "StencilAction::Keep"))]
    pub depth_pass: StencilAction,
}

impl StencilParameters {
    /// True if the comparison function, reference or mask differ.
    pub fn different_function(&self, other: &Self) -> bool {
        self.function != other.function
            || self.reference != other.reference
            || self.mask != other.mask
    }

    /// True if any of the three stencil actions differ.
    pub fn different_actions(&self, other: &Self) -> bool {
        self.fail != other.fail
            || self.depth_fail != other.depth_fail
            || self.depth_pass != other.depth_pass
    }
}

/// A texture bound to an image unit for load/store access from shaders.
///
/// A `None` texture unbinds the unit.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Derivative)]
#[derivative(Default)]
pub struct ImageBindParameters {
    pub texture: Option<TextureRef>,
    pub level: u32,
    pub layer: u32,
    pub multi_layer: bool,
    #[derivative(Default(value = "true"))]
    pub read: bool,
    #[derivative(Default(value = "true"))]
    pub write: bool,
}

impl ImageBindParameters {
    /// Binds level 0 of `texture` with read/write access.
    pub fn new(texture: TextureRef) -> Self {
        Self {
            texture: Some(texture),
            ..Default::default()
        }
    }

    /// The access mode implied by the read/write flags.
    pub fn access(&self) -> ImageAccess {
        match (self.read, self.write) {
            (false, _) => ImageAccess::WriteOnly,
            (true, false) => ImageAccess::ReadOnly,
            (true, true) => ImageAccess::ReadWrite,
        }
    }
}

#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[repr(u32)]
pub enum ImageAccess {
    ReadOnly = 0x88B8,
    WriteOnly = 0x88B9,
    ReadWrite = 0x88BA,
}

/// Surface material used by lighting shaders.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Zeroable, Pod, Derivative)]
#[derivative(Default)]
#[repr(C)]
pub struct MaterialParameters {
    #[derivative(Default(value = "Color4f::new(0.2, 0.2, 0.2, 1.0)"))]
    pub ambient: Color4f,
    #[derivative(Default(value = "Color4f::new(0.8, 0.8, 0.8, 1.0)"))]
    pub diffuse: Color4f,
    #[derivative(Default(value = "Color4f::BLACK"))]
    pub specular: Color4f,
    #[derivative(Default(value = "Color4f::BLACK"))]
    pub emission: Color4f,
    pub shininess: f32,
}

impl MaterialParameters {
    /// A material whose ambient and diffuse terms are `color` and with no specular.
    pub fn from_color(color: Color4f) -> Self {
        Self {
            ambient: color,
            diffuse: color,
            specular: Color4f::BLACK,
            ..Default::default()
        }
    }
}

#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[repr(u32)]
pub enum LightType {
    Directional = 1,
    Point = 2,
    Spot = 3,
}

/// Parameters of one light, in the layout the light data cache stores.
///
/// Equality and hashing are bitwise, so two lights are the same light exactly when
/// every field has the same bit pattern.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, Zeroable, Pod, Derivative)]
#[derivative(Default)]
#[repr(C)]
pub struct LightParameters {
    pub position: [f32; 4],
    #[derivative(Default(value = "[0.0, 0.0, -1.0, 0.0]"))]
    pub direction: [f32; 4],
    #[derivative(Default(value = "Color4f::new(0.2, 0.2, 0.2, 1.0)"))]
    pub ambient: Color4f,
    #[derivative(Default(value = "Color4f::new(0.8, 0.8, 0.8, 1.0)"))]
    pub diffuse: Color4f,
    #[derivative(Default(value = "Color4f::WHITE"))]
    pub specular: Color4f,
    /// Constant, linear and quadratic attenuation; the fourth component is unused.
    #[derivative(Default(value = "[1.0, 0.0, 0.0, 0.0]"))]
    pub attenuation: [f32; 4],
    pub exponent: f32,
    #[derivative(Default(value = "-1.0"))]
    pub cos_cutoff: f32,
    #[derivative(Default(value = "LightType::Point as u32"))]
    pub light_type: u32,
    pub _pad: u32,
}

#[allow(missing_docs)]
impl LightParameters {
    pub fn directional(direction: [f32; 3], color: Color4f) -> Self {
        Self {
            direction: [direction[0], direction[1], direction[2], 0.0],
            diffuse: color,
            specular: color,
            light_type: LightType::Directional.into(),
            ..Default::default()
        }
    }

    pub fn point(position: [f32; 3], color: Color4f) -> Self {
        Self {
            position: [position[0], position[1], position[2], 1.0],
            diffuse: color,
            specular: color,
            light_type: LightType::Point.into(),
            ..Default::default()
        }
    }

    pub fn spot(position: [f32; 3], direction: [f32; 3], cos_cutoff: f32, color: Color4f) -> Self {
        Self {
            position: [position[0], position[1], position[2], 1.0],
            direction: [direction[0], direction[1], direction[2], 0.0],
            diffuse: color,
            specular: color,
            cos_cutoff,
            light_type: LightType::Spot.into(),
            ..Default::default()
        }
    }

    pub fn light_type(&self) -> Option<LightType> {
        LightType::try_from(self.light_type).ok()
    }
}

impl PartialEq for LightParameters {
    fn eq(&self, other: &Self) -> bool {
        bytemuck::bytes_of(self) == bytemuck::bytes_of(other)
    }
}

impl Eq for LightParameters {}

impl std::hash::Hash for LightParameters {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        bytemuck::bytes_of(self).hash(state);
    }
}
