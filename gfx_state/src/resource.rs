//! Narrow contracts for the resources a context binds but does not own.
//!
//! Textures, shaders and framebuffers are created and managed elsewhere. The context
//! only holds reference-counted handles to them ([ResourceRef]), so a resource stays
//! alive while it is bound or saved on a stack.

use core::fmt;
use std::{ops::Deref, rc::Rc};

use crate::{
    device::{BufferId, BufferTarget, Device, DeviceHandle, PrimitiveMode, TextureType},
    error::DeviceError,
};

/// A reference-counted handle to a resource, compared by identity.
///
/// Two refs are equal when they point at the same resource object, which is what the
/// device cares about: rebinding the same texture is redundant no matter what its
/// contents are.
pub struct ResourceRef<T: ?Sized>(Rc<T>);

/// A bound texture.
pub type TextureRef = ResourceRef<dyn Texture>;
/// A bound shader program.
pub type ShaderRef = ResourceRef<dyn Shader>;
/// A bound framebuffer object.
pub type FramebufferRef = ResourceRef<dyn Framebuffer>;

impl<T: ?Sized> ResourceRef<T> {
    #[allow(missing_docs)]
    pub fn new(resource: Rc<T>) -> Self {
        Self(resource)
    }

    /// Returns true if both refs point at the same object.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::as_ptr(&self.0) as *const () == Rc::as_ptr(&other.0) as *const ()
    }

    #[allow(missing_docs)]
    pub fn as_rc(&self) -> &Rc<T> {
        &self.0
    }
}

impl<T: ?Sized> Clone for ResourceRef<T> {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

impl<T: ?Sized> PartialEq for ResourceRef<T> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl<T: ?Sized> Eq for ResourceRef<T> {}

impl<T: ?Sized> Deref for ResourceRef<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for ResourceRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ResourceRef({:p}, {:?})", Rc::as_ptr(&self.0) as *const (), &self.0)
    }
}

impl<T: ?Sized> From<Rc<T>> for ResourceRef<T> {
    fn from(v: Rc<T>) -> Self {
        Self(v)
    }
}

/// A texture object that can be bound to a texture or image unit.
pub trait Texture: fmt::Debug {
    /// The binding target of the texture.
    fn texture_type(&self) -> TextureType;

    /// Returns false if the texture has no valid device storage.
    fn is_valid(&self) -> bool {
        true
    }

    /// Makes sure the texture exists on the device (uploading pending data if needed)
    /// and returns its device handle.
    fn prepare_for_binding(&self, device: &mut dyn Device) -> Result<DeviceHandle, DeviceError>;

    /// The sized internal format to use when binding the texture as an image, or `None`
    /// if the texture cannot be used for image load/store.
    fn image_format(&self) -> Option<u32> {
        None
    }
}

/// A named uniform/storage block declared by a shader.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InterfaceBlock {
    pub name: String,
    /// The binding point, or `None` if the block is not bound to a fixed location.
    pub location: Option<u32>,
    pub target: BufferTarget,
}

/// A linked shader program.
pub trait Shader: fmt::Debug {
    /// Returns false if the program failed to compile or link.
    fn is_valid(&self) -> bool {
        true
    }

    /// Makes sure the program is linked and returns its device handle.
    fn prepare_for_binding(&self, device: &mut dyn Device) -> Result<DeviceHandle, DeviceError>;

    /// The location of the vertex attribute with the given name, if the program uses it.
    fn vertex_attribute_location(&self, name: &str) -> Option<u32>;

    /// The interface blocks declared by the program.
    fn interface_blocks(&self) -> Vec<InterfaceBlock>;

    /// Uploads any uniform values that changed since the last call.
    ///
    /// Called after the program was made active. `forced` requests a full upload.
    fn sync_uniforms(&self, device: &mut dyn Device, forced: bool) -> Result<(), DeviceError> {
        let _ = (device, forced);
        Ok(())
    }
}

/// Completeness of a framebuffer object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FramebufferStatus {
    /// The framebuffer can be rendered to.
    Complete,
    /// The framebuffer is incomplete; the string explains why.
    Incomplete(String),
}

impl Default for FramebufferStatus {
    fn default() -> Self {
        Self::Complete
    }
}

/// A framebuffer object.
pub trait Framebuffer: fmt::Debug {
    /// Makes sure the framebuffer exists on the device and returns its handle.
    fn prepare_for_binding(&self, device: &mut dyn Device) -> Result<DeviceHandle, DeviceError>;

    /// Checks completeness. Called while the framebuffer is bound.
    fn status(&self, device: &mut dyn Device) -> FramebufferStatus;
}

/// The component type of a vertex attribute.
#[allow(missing_docs)]
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, num_enum::TryFromPrimitive, num_enum::IntoPrimitive,
)]
#[repr(u32)]
pub enum AttributeType {
    Byte = 0x1400,
    UnsignedByte = 0x1401,
    Short = 0x1402,
    UnsignedShort = 0x1403,
    Int = 0x1404,
    UnsignedInt = 0x1405,
    Float = 0x1406,
    Double = 0x140A,
}

impl AttributeType {
    /// Size of one component in bytes.
    pub fn size(self) -> u32 {
        match self {
            AttributeType::Byte | AttributeType::UnsignedByte => 1,
            AttributeType::Short | AttributeType::UnsignedShort => 2,
            AttributeType::Int | AttributeType::UnsignedInt | AttributeType::Float => 4,
            AttributeType::Double => 8,
        }
    }
}

/// One attribute of a vertex layout.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VertexAttribute {
    pub name: String,
    pub num_values: u8,
    pub data_type: AttributeType,
    /// Byte offset inside one vertex.
    pub offset: u32,
    /// Normalize integer values when converting to float.
    pub normalize: bool,
    /// Convert to float in the shader; otherwise the attribute is read as an integer.
    pub convert_to_float: bool,
}

impl VertexAttribute {
    /// A float attribute with `num_values` components.
    pub fn float(name: &str, num_values: u8, offset: u32) -> Self {
        Self {
            name: name.to_string(),
            num_values,
            data_type: AttributeType::Float,
            offset,
            normalize: false,
            convert_to_float: true,
        }
    }

    /// Size of the attribute in bytes.
    pub fn size(&self) -> u32 {
        self.num_values as u32 * self.data_type.size()
    }
}

/// A vertex layout: an ordered list of attributes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct VertexDescription {
    attributes: Vec<VertexAttribute>,
    vertex_size: u32,
}

impl VertexDescription {
    #[allow(missing_docs)]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a float attribute right after the previous one.
    pub fn append_float(&mut self, name: &str, num_values: u8) -> &mut Self {
        let attr = VertexAttribute::float(name, num_values, self.vertex_size);
        self.push(attr)
    }

    /// Appends an attribute; the vertex size grows to cover it.
    pub fn push(&mut self, attr: VertexAttribute) -> &mut Self {
        self.vertex_size = self.vertex_size.max(attr.offset + attr.size());
        self.attributes.push(attr);
        self
    }

    #[allow(missing_docs)]
    pub fn attributes(&self) -> &[VertexAttribute] {
        &self.attributes
    }

    /// Size of one vertex in bytes.
    pub fn vertex_size(&self) -> u32 {
        self.vertex_size
    }
}

/// Something the context can draw: a mesh with its vertex (and optional index) data
/// already on the device.
pub trait Drawable {
    /// The vertex layout of the vertex buffer.
    fn vertex_description(&self) -> &VertexDescription;
    /// The buffer holding the vertices.
    fn vertex_buffer(&self) -> BufferId;
    /// The index buffer and index type, for indexed meshes.
    fn index_buffer(&self) -> Option<(BufferId, crate::device::IndexType)>;
    /// The primitive type to draw.
    fn primitive_mode(&self) -> PrimitiveMode;
    /// The number of indices for indexed meshes, otherwise the number of vertices.
    fn element_count(&self) -> u32;
}

#[cfg(test)]
mod test {
    use super::*;

    #[derive(Debug)]
    struct DummyTexture(u32);

    impl Texture for DummyTexture {
        fn texture_type(&self) -> TextureType {
            TextureType::Texture2D
        }

        fn prepare_for_binding(
            &self,
            _device: &mut dyn Device,
        ) -> Result<DeviceHandle, DeviceError> {
            Ok(DeviceHandle(self.0))
        }
    }

    #[test]
    fn test_resource_ref_identity() {
        let texture = |handle| -> TextureRef {
            let texture: Rc<dyn Texture> = Rc::new(DummyTexture(handle));
            texture.into()
        };
        let a = texture(1);
        let b = texture(1);
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }

    #[test]
    fn test_vertex_description_layout() {
        let mut desc = VertexDescription::new();
        desc.append_float("sg_Position", 3)
            .append_float("sg_Normal", 3)
            .append_float("sg_TexCoord", 2);
        assert_eq!(desc.vertex_size(), 32);
        assert_eq!(desc.attributes()[1].offset, 12);
        assert_eq!(desc.attributes()[2].offset, 24);
    }
}
