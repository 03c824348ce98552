//! Stand-in resources for driving a context without a real graphics API.

use std::{cell::Cell, rc::Rc};

use gfx_state::{
    slot, BufferId, BufferTarget, Device, DeviceError, DeviceHandle, Drawable, IndexType,
    InterfaceBlock, PrimitiveMode, ResourceRef, Shader, ShaderRef, Texture, TextureRef,
    TextureType, UsageHint, VertexDescription,
};

/// A shader program that reads every context record from storage buffers 0 to 5.
#[derive(Debug)]
pub struct DemoShader {
    program: DeviceHandle,
    uniform_syncs: Cell<u32>,
}

impl DemoShader {
    pub fn new(program: u32) -> Rc<Self> {
        Rc::new(Self {
            program: DeviceHandle(program),
            uniform_syncs: Cell::new(0),
        })
    }

    pub fn uniform_syncs(&self) -> u32 {
        self.uniform_syncs.get()
    }

    pub fn shader_ref(shader: &Rc<Self>) -> ShaderRef {
        let shader: Rc<dyn Shader> = shader.clone();
        ResourceRef::new(shader)
    }
}

impl Shader for DemoShader {
    fn prepare_for_binding(&self, _device: &mut dyn Device) -> Result<DeviceHandle, DeviceError> {
        Ok(self.program)
    }

    fn vertex_attribute_location(&self, name: &str) -> Option<u32> {
        match name {
            "sg_Position" => Some(0),
            "sg_Normal" => Some(1),
            _ => None,
        }
    }

    fn interface_blocks(&self) -> Vec<InterfaceBlock> {
        [
            slot::FRAME_DATA,
            slot::OBJECT_DATA,
            slot::MATERIAL_DATA,
            slot::LIGHT_DATA,
            slot::LIGHT_SET_DATA,
            slot::TEXTURE_SET_DATA,
        ]
        .iter()
        .enumerate()
        .map(|(location, name)| InterfaceBlock {
            name: name.to_string(),
            location: Some(location as u32),
            target: BufferTarget::ShaderStorage,
        })
        .collect()
    }

    fn sync_uniforms(&self, _device: &mut dyn Device, _forced: bool) -> Result<(), DeviceError> {
        self.uniform_syncs.set(self.uniform_syncs.get() + 1);
        Ok(())
    }
}

#[derive(Debug)]
pub struct DemoTexture {
    handle: DeviceHandle,
}

impl DemoTexture {
    pub fn new(handle: u32) -> TextureRef {
        let texture: Rc<dyn Texture> = Rc::new(Self {
            handle: DeviceHandle(handle),
        });
        ResourceRef::new(texture)
    }
}

impl Texture for DemoTexture {
    fn texture_type(&self) -> TextureType {
        TextureType::Texture2D
    }

    fn prepare_for_binding(&self, _device: &mut dyn Device) -> Result<DeviceHandle, DeviceError> {
        Ok(self.handle)
    }
}

/// A unit cube with per-face normals, drawn as indexed triangles.
#[derive(Debug)]
pub struct Cube {
    description: VertexDescription,
    vertices: BufferId,
    indices: BufferId,
}

impl Cube {
    pub fn upload(device: &mut dyn Device) -> Result<Self, DeviceError> {
        let faces: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
            ([1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]),
            ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
            ([0.0, 1.0, 0.0], [0.0, 0.0, 1.0], [1.0, 0.0, 0.0]),
            ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
            ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
            ([0.0, 0.0, -1.0], [0.0, 1.0, 0.0], [1.0, 0.0, 0.0]),
        ];

        let mut vertices: Vec<[f32; 6]> = Vec::with_capacity(24);
        let mut indices: Vec<u16> = Vec::with_capacity(36);
        for (normal, u, v) in faces {
            let base = vertices.len() as u16;
            for (su, sv) in [(-0.5, -0.5), (0.5, -0.5), (0.5, 0.5), (-0.5, 0.5)] {
                let p = |i: usize| normal[i] * 0.5 + u[i] * su + v[i] * sv;
                vertices.push([p(0), p(1), p(2), normal[0], normal[1], normal[2]]);
            }
            indices.extend([0, 1, 2, 0, 2, 3].iter().map(|i| base + i));
        }

        let vertex_bytes: &[u8] = bytemuck::cast_slice(&vertices);
        let index_bytes: &[u8] = bytemuck::cast_slice(&indices);

        let vertex_buffer = device.create_buffer(vertex_bytes.len(), UsageHint::Static)?;
        device.upload_buffer(vertex_buffer, 0, vertex_bytes);
        let index_buffer = match device.create_buffer(index_bytes.len(), UsageHint::Static) {
            Ok(buffer) => buffer,
            Err(error) => {
                device.delete_buffer(vertex_buffer);
                return Err(error);
            }
        };
        device.upload_buffer(index_buffer, 0, index_bytes);

        let mut description = VertexDescription::new();
        description
            .append_float("sg_Position", 3)
            .append_float("sg_Normal", 3);

        Ok(Self {
            description,
            vertices: vertex_buffer,
            indices: index_buffer,
        })
    }
}

impl Drawable for Cube {
    fn vertex_description(&self) -> &VertexDescription {
        &self.description
    }

    fn vertex_buffer(&self) -> BufferId {
        self.vertices
    }

    fn index_buffer(&self) -> Option<(BufferId, IndexType)> {
        Some((self.indices, IndexType::UnsignedShort))
    }

    fn primitive_mode(&self) -> PrimitiveMode {
        PrimitiveMode::Triangles
    }

    fn element_count(&self) -> u32 {
        36
    }
}
