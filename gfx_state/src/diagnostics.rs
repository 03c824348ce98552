use core::fmt;
use std::{collections::HashSet, sync::Mutex};

use once_cell::sync::Lazy;

use crate::{
    device::Capability,
    error::{DeviceError, StateError},
    lights::LightId,
    stack::StateCategory,
};

/// Diagnostics kept per context before further ones are only counted.
const MAX_STORED_DIAGNOSTICS: usize = 1024;

static WARNED_CAPABILITIES: Lazy<Mutex<HashSet<Capability>>> =
    Lazy::new(|| Mutex::new(HashSet::new()));

/// A recoverable condition reported by a context.
///
/// None of these interrupt rendering: the offending operation is skipped or degraded
/// and the frame continues.
#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    /// A pop on a state stack with no saved value. The state was left unchanged.
    EmptyStack(StateCategory),
    /// An operation needed an optional device feature that is missing and was skipped.
    CapabilityUnsupported(Capability),
    /// The device reported an error while applying state or issuing a command.
    Device {
        /// The operation that was running when the error was picked up.
        context: &'static str,
        #[allow(missing_docs)]
        error: DeviceError,
    },
    /// No free light ids are left; the light was not registered.
    LightPoolExhausted,
    /// The active light set is full; the light was not enabled.
    TooManyEnabledLights,
    /// A recoverable misuse of a strongly typed operation.
    State(StateError),
    /// A shader-dependent operation ran without an active shader and was skipped.
    NoActiveShader(&'static str),
    /// The bound framebuffer is not complete.
    IncompleteFramebuffer(String),
    /// A light was unregistered while still enabled; it was disabled first.
    UnregisteredActiveLight(LightId),
    /// A record write addressed an index past the end of a cache slot and was dropped.
    CacheIndexOutOfRange {
        #[allow(missing_docs)]
        cache: &'static str,
        #[allow(missing_docs)]
        index: usize,
    },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::EmptyStack(category) => {
                write!(f, "pop on empty {:?} stack ignored", category)
            }
            Diagnostic::CapabilityUnsupported(capability) => {
                write!(f, "device does not support {:?}, operation skipped", capability)
            }
            Diagnostic::Device { context, error } => write!(f, "{}: {}", context, error),
            Diagnostic::LightPoolExhausted => write!(f, "no free light ids left"),
            Diagnostic::TooManyEnabledLights => write!(f, "too many enabled lights"),
            Diagnostic::State(error) => write!(f, "{}", error),
            Diagnostic::NoActiveShader(operation) => {
                write!(f, "{} requires an active shader", operation)
            }
            Diagnostic::IncompleteFramebuffer(reason) => {
                write!(f, "framebuffer incomplete: {}", reason)
            }
            Diagnostic::UnregisteredActiveLight(id) => {
                write!(f, "light {} unregistered while enabled", id.0)
            }
            Diagnostic::CacheIndexOutOfRange { cache, index } => {
                write!(f, "index {} is out of range for cache '{}'", index, cache)
            }
        }
    }
}

/// Per-context sink for [Diagnostic]s.
///
/// Every report is logged with `tracing::warn!` and stored so it can be inspected later.
/// Missing capabilities are logged only once per process, but still stored by every
/// context that runs into them.
#[derive(Debug, Default)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
    dropped: usize,
}

impl Diagnostics {
    #[allow(missing_docs)]
    pub fn new() -> Self {
        Self::default()
    }

    /// Logs and stores a diagnostic.
    pub fn report(&mut self, diagnostic: Diagnostic) {
        match &diagnostic {
            Diagnostic::CapabilityUnsupported(capability) => {
                let first = WARNED_CAPABILITIES
                    .lock()
                    .map(|mut warned| warned.insert(*capability))
                    .unwrap_or(true);
                if first {
                    tracing::warn!("{}", diagnostic);
                }
            }
            _ => tracing::warn!("{}", diagnostic),
        }

        if self.entries.len() < MAX_STORED_DIAGNOSTICS {
            self.entries.push(diagnostic);
        } else {
            self.dropped += 1;
        }
    }

    /// The stored diagnostics, oldest first.
    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    /// Removes and returns the stored diagnostics.
    pub fn take(&mut self) -> Vec<Diagnostic> {
        self.dropped = 0;
        std::mem::take(&mut self.entries)
    }

    /// Number of diagnostics that were logged but not stored because the sink was full.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    #[allow(missing_docs)]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[allow(missing_docs)]
    pub fn clear(&mut self) {
        self.entries.clear();
        self.dropped = 0;
    }
}
