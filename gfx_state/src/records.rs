//! Records streamed to the device through the parameter cache.
//!
//! Layouts are `#[repr(C)]` and padded to 16 byte multiples so they can be read as
//! std140/std430 arrays from shaders.

use bytemuck::{Pod, Zeroable};
use ultraviolet::Mat4;

use crate::{params::MaterialParameters, MAX_ENABLED_LIGHTS, MAX_TEXTURES};

/// Cache slot names used by the context. Shaders see them as interface block names.
pub mod slot {
    #![allow(missing_docs)]

    pub const FRAME_DATA: &str = "FrameData";
    pub const OBJECT_DATA: &str = "ObjectData";
    pub const MATERIAL_DATA: &str = "MaterialData";
    pub const LIGHT_DATA: &str = "LightData";
    pub const LIGHT_SET_DATA: &str = "LightSetData";
    pub const TEXTURE_SET_DATA: &str = "TextureSetData";
}

/// Per-frame camera and viewport data.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Zeroable, Pod)]
#[repr(C)]
pub struct FrameData {
    pub world_to_camera: Mat4,
    pub camera_to_world: Mat4,
    pub camera_to_clipping: Mat4,
    pub clipping_to_camera: Mat4,
    /// x, y, width, height.
    pub viewport: [f32; 4],
}

impl Default for FrameData {
    fn default() -> Self {
        Self {
            world_to_camera: Mat4::identity(),
            camera_to_world: Mat4::identity(),
            camera_to_clipping: Mat4::identity(),
            clipping_to_camera: Mat4::identity(),
            viewport: [0.0; 4],
        }
    }
}

/// Per-draw data. `draw_id` is the record's own index in the object data slot.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Zeroable, Pod)]
#[repr(C)]
pub struct ObjectData {
    pub model_to_camera: Mat4,
    pub point_size: f32,
    pub material_id: u32,
    pub light_set_id: u32,
    pub draw_id: u32,
}

impl Default for ObjectData {
    fn default() -> Self {
        Self {
            model_to_camera: Mat4::identity(),
            point_size: 1.0,
            material_id: 0,
            light_set_id: 0,
            draw_id: 0,
        }
    }
}

/// The active material. Shaders skip material lighting when `enabled` is 0.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Zeroable, Pod)]
#[repr(C)]
pub struct MaterialData {
    pub material: MaterialParameters,
    pub enabled: u32,
    pub _pad: [u32; 2],
}

impl MaterialData {
    /// An enabled material record.
    pub fn new(material: MaterialParameters) -> Self {
        Self {
            material,
            enabled: 1,
            _pad: [0; 2],
        }
    }

    #[allow(missing_docs)]
    pub fn is_enabled(&self) -> bool {
        self.enabled != 0
    }
}

/// The ids of the enabled lights. Only the first `count` entries are meaningful.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Zeroable, Pod)]
#[repr(C)]
pub struct LightSetData {
    pub count: u32,
    pub _pad: [u32; 3],
    pub lights: [u32; MAX_ENABLED_LIGHTS],
}

impl LightSetData {
    /// The enabled light ids, in slot order.
    pub fn ids(&self) -> &[u32] {
        &self.lights[..self.count as usize]
    }

    #[allow(missing_docs)]
    pub fn contains(&self, id: u32) -> bool {
        self.ids().contains(&id)
    }

    /// Adds `id` if it is not already present. Returns false if the set is full.
    pub fn insert(&mut self, id: u32) -> bool {
        if self.contains(id) {
            return true;
        }
        if self.count as usize >= MAX_ENABLED_LIGHTS {
            return false;
        }
        self.lights[self.count as usize] = id;
        self.count += 1;
        true
    }

    /// Removes `id` by moving the last entry into its slot. Returns false if absent.
    pub fn remove(&mut self, id: u32) -> bool {
        match self.ids().iter().position(|&other| other == id) {
            Some(index) => {
                let last = self.count as usize - 1;
                self.lights[index] = self.lights[last];
                self.lights[last] = 0;
                self.count -= 1;
                true
            }
            None => false,
        }
    }
}

/// Which texture units have a texture bound (1) or not (0).
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Zeroable, Pod)]
#[repr(C)]
pub struct TextureSetData {
    pub enabled: [u32; MAX_TEXTURES],
}
