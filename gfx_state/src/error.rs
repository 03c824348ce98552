#![allow(missing_docs)]

use core::fmt;
use std::error;

use crate::device::Capability;

/// A programming error, or a failure that leaves the context unusable.
///
/// Recoverable conditions (empty stacks, missing capabilities, driver errors during
/// an apply) are not errors; they are reported through [crate::Diagnostics].
#[derive(Debug, Clone, PartialEq)]
pub enum StateError {
    InvalidTextureUnit(usize),
    InvalidImageUnit(usize),
    InvalidVertexAttribute(usize),
    InvalidVertexBinding(usize),
    UnknownCache(String),
    RecordSizeMismatch {
        cache: String,
        expected: usize,
        actual: usize,
    },
    UnsupportedImageFormat,
    Device(DeviceError),
}

impl fmt::Display for StateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateError::InvalidTextureUnit(unit) => write!(f, "invalid texture unit: {}", unit),
            StateError::InvalidImageUnit(unit) => write!(f, "invalid image unit: {}", unit),
            StateError::InvalidVertexAttribute(location) => {
                write!(f, "invalid vertex attribute location: {}", location)
            }
            StateError::InvalidVertexBinding(binding) => {
                write!(f, "invalid vertex binding index: {}", binding)
            }
            StateError::UnknownCache(name) => write!(f, "no parameter cache named '{}'", name),
            StateError::RecordSizeMismatch {
                cache,
                expected,
                actual,
            } => write!(
                f,
                "record size mismatch for cache '{}': expected {} bytes, got {}",
                cache, expected, actual
            ),
            StateError::UnsupportedImageFormat => {
                write!(f, "texture cannot be bound as an image (no image format)")
            }
            StateError::Device(error) => write!(f, "device error: {}", error),
        }
    }
}

impl error::Error for StateError {}

impl From<DeviceError> for StateError {
    fn from(v: DeviceError) -> Self {
        Self::Device(v)
    }
}

/// An error reported by the device layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    InvalidEnum,
    InvalidValue,
    InvalidOperation,
    OutOfMemory,
    Unsupported(Capability),
    IncompleteFramebuffer(String),
    Other(String),
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceError::InvalidEnum => write!(f, "invalid enum"),
            DeviceError::InvalidValue => write!(f, "invalid value"),
            DeviceError::InvalidOperation => write!(f, "invalid operation"),
            DeviceError::OutOfMemory => write!(f, "out of memory"),
            DeviceError::Unsupported(capability) => {
                write!(f, "unsupported feature: {:?}", capability)
            }
            DeviceError::IncompleteFramebuffer(reason) => {
                write!(f, "incomplete framebuffer: {}", reason)
            }
            DeviceError::Other(message) => write!(f, "{}", message),
        }
    }
}

impl error::Error for DeviceError {}
