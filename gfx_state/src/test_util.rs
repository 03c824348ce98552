use std::{cell::Cell, rc::Rc};

use crate::{
    device::{BufferTarget, Device, DeviceHandle, TextureType},
    error::DeviceError,
    records::slot,
    resource::{
        Framebuffer, FramebufferRef, FramebufferStatus, InterfaceBlock, ResourceRef, Shader,
        ShaderRef, Texture, TextureRef,
    },
};

#[derive(Debug)]
pub struct TestTexture {
    handle: u32,
    image_format: Option<u32>,
}

impl TestTexture {
    pub const IMAGE_FORMAT: u32 = 0x8814;

    pub fn new(handle: u32) -> TextureRef {
        let texture: Rc<dyn Texture> = Rc::new(Self {
            handle,
            image_format: None,
        });
        ResourceRef::new(texture)
    }

    /// A texture that can be bound as an image.
    pub fn storage(handle: u32) -> TextureRef {
        let texture: Rc<dyn Texture> = Rc::new(Self {
            handle,
            image_format: Some(Self::IMAGE_FORMAT),
        });
        ResourceRef::new(texture)
    }
}

impl Texture for TestTexture {
    fn texture_type(&self) -> TextureType {
        TextureType::Texture2D
    }

    fn prepare_for_binding(&self, _device: &mut dyn Device) -> Result<DeviceHandle, DeviceError> {
        Ok(DeviceHandle(self.handle))
    }

    fn image_format(&self) -> Option<u32> {
        self.image_format
    }
}

#[derive(Debug)]
pub struct TestShader {
    handle: u32,
    attributes: Vec<&'static str>,
    blocks: Vec<InterfaceBlock>,
    pub syncs: Cell<u32>,
}

impl TestShader {
    /// A shader using every context cache slot and three vertex attributes.
    pub fn new(handle: u32) -> Rc<Self> {
        Self::with_blocks(
            handle,
            &[
                (slot::FRAME_DATA, 0),
                (slot::OBJECT_DATA, 1),
                (slot::MATERIAL_DATA, 2),
                (slot::LIGHT_DATA, 3),
                (slot::LIGHT_SET_DATA, 4),
                (slot::TEXTURE_SET_DATA, 5),
            ],
        )
    }

    /// A shader with the given storage blocks and their binding locations.
    pub fn with_blocks(handle: u32, blocks: &[(&str, u32)]) -> Rc<Self> {
        let blocks = blocks
            .iter()
            .map(|&(name, location)| InterfaceBlock {
                name: name.to_string(),
                location: Some(location),
                target: BufferTarget::ShaderStorage,
            })
            .collect();
        Rc::new(Self {
            handle,
            attributes: vec!["sg_Position", "sg_Normal", "sg_TexCoord0"],
            blocks,
            syncs: Cell::new(0),
        })
    }

    pub fn into_ref(self: Rc<Self>) -> ShaderRef {
        let shader: Rc<dyn Shader> = self;
        ResourceRef::new(shader)
    }
}

impl Shader for TestShader {
    fn prepare_for_binding(&self, _device: &mut dyn Device) -> Result<DeviceHandle, DeviceError> {
        Ok(DeviceHandle(self.handle))
    }

    fn vertex_attribute_location(&self, name: &str) -> Option<u32> {
        self.attributes
            .iter()
            .position(|&attribute| attribute == name)
            .map(|location| location as u32)
    }

    fn interface_blocks(&self) -> Vec<InterfaceBlock> {
        self.blocks.clone()
    }

    fn sync_uniforms(&self, _device: &mut dyn Device, _forced: bool) -> Result<(), DeviceError> {
        self.syncs.set(self.syncs.get() + 1);
        Ok(())
    }
}

#[derive(Debug)]
pub struct TestFramebuffer {
    handle: u32,
    status: FramebufferStatus,
}

impl TestFramebuffer {
    pub fn new(handle: u32, status: FramebufferStatus) -> FramebufferRef {
        let fbo: Rc<dyn Framebuffer> = Rc::new(Self { handle, status });
        ResourceRef::new(fbo)
    }
}

impl Framebuffer for TestFramebuffer {
    fn prepare_for_binding(&self, _device: &mut dyn Device) -> Result<DeviceHandle, DeviceError> {
        Ok(DeviceHandle(self.handle))
    }

    fn status(&self, _device: &mut dyn Device) -> FramebufferStatus {
        self.status.clone()
    }
}
