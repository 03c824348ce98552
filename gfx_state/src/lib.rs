//! State tracking and command submission for a stateful graphics device.
//!
//! Callers describe the rendering state they want on a [RenderingContext] using
//! push/set/pop stacks. Nothing reaches the device until a draw, compute, clear or
//! sync call, at which point the requested [PipelineState] is diffed against the
//! state the device already has and only the changed categories are applied.
//!
//! Per-frame, per-object, material, light and texture records are streamed to the
//! device through a [ParameterCache] of named, optionally multi-buffered buffers.
//!
//! The device itself is abstracted behind the [Device] trait. [RecordingDevice] is a
//! headless implementation that records every call, which is useful for tests and
//! for inspecting the command stream a frame produces.

#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]
#![allow(clippy::too_many_arguments)]

pub use cache::*;
pub use context::*;
pub use device::*;
pub use diagnostics::*;
pub use error::*;
pub use lights::*;
pub use lock::*;
pub use params::*;
pub use pipeline::*;
pub use records::*;
pub use recording::*;
pub use resource::*;
pub use stack::*;

mod cache;
mod context;
mod device;
mod diagnostics;
mod error;
mod lights;
mod lock;
mod params;
mod pipeline;
mod records;
mod recording;
mod resource;
mod stack;
#[cfg(test)]
mod test_util;

/// Number of texture units tracked by a context.
pub const MAX_TEXTURES: usize = 8;
/// Number of image units tracked by a context.
pub const MAX_BOUND_IMAGES: usize = 8;
/// Number of vertex attribute locations tracked by a context.
pub const MAX_VERTEX_ATTRIBS: usize = 16;
/// Number of vertex buffer binding points tracked by a context.
pub const MAX_VERTEX_BINDINGS: usize = 16;
/// Maximum number of lights that can be enabled at the same time.
pub const MAX_ENABLED_LIGHTS: usize = 8;
