use std::collections::{BTreeSet, HashMap};

use crate::{params::LightParameters, records::LightSetData, MAX_ENABLED_LIGHTS};

/// The id of a registered light: its index in the light data cache slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LightId(pub u8);

/// Why a light could not be enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightError {
    /// Every light id is leased.
    PoolExhausted,
    /// The active light set is full.
    TooManyEnabled,
}

/// Deduplicating light id allocator and the set of enabled lights.
///
/// Equal light parameters (bitwise) share an id. Ids come from a bounded free pool and
/// go back to it on [LightRegistry::unregister]. This type only does the bookkeeping;
/// the context writes the light records to the device.
#[derive(Debug, Clone)]
pub struct LightRegistry {
    ids: HashMap<LightParameters, LightId>,
    params: HashMap<LightId, LightParameters>,
    free: BTreeSet<u8>,
    capacity: usize,
    max_enabled: usize,
    active: LightSetData,
}

impl LightRegistry {
    /// A registry handing out ids `0..capacity` (at most 256) and allowing up to
    /// `max_enabled` lights (at most [MAX_ENABLED_LIGHTS]) to be enabled at once.
    pub fn new(capacity: usize, max_enabled: usize) -> Self {
        let capacity = capacity.min(u8::MAX as usize + 1);
        Self {
            ids: HashMap::new(),
            params: HashMap::new(),
            free: (0..capacity).map(|id| id as u8).collect(),
            capacity,
            max_enabled: max_enabled.min(MAX_ENABLED_LIGHTS),
            active: LightSetData::default(),
        }
    }

    /// Forgets every light and returns all ids to the pool.
    pub fn reset(&mut self) {
        *self = Self::new(self.capacity, self.max_enabled);
    }

    /// The id of a registered light equal to `params`.
    pub fn lookup(&self, params: &LightParameters) -> Option<LightId> {
        self.ids.get(params).copied()
    }

    /// The parameters registered under `id`.
    pub fn params(&self, id: LightId) -> Option<&LightParameters> {
        self.params.get(&id)
    }

    /// Registers a light and returns its id, reusing the id of an equal light.
    ///
    /// The second value is true if a new id was leased, in which case the light record
    /// still has to be written.
    pub fn register(&mut self, params: LightParameters) -> Result<(LightId, bool), LightError> {
        if let Some(id) = self.lookup(&params) {
            return Ok((id, false));
        }
        let id = *self.free.iter().next().ok_or(LightError::PoolExhausted)?;
        self.free.remove(&id);
        let id = LightId(id);
        self.ids.insert(params, id);
        self.params.insert(id, params);
        Ok((id, true))
    }

    /// Assigns `params` to a specific id, claiming it from the pool if it was free.
    pub fn set(&mut self, id: LightId, params: LightParameters) {
        self.free.remove(&id.0);
        if let Some(old) = self.params.insert(id, params) {
            if self.ids.get(&old) == Some(&id) {
                self.ids.remove(&old);
            }
        }
        self.ids.insert(params, id);
    }

    /// Returns `id` to the free pool.
    ///
    /// If the light was still enabled it is disabled first and `true` is returned, so
    /// the id is never handed out while an enabled light set refers to it.
    pub fn unregister(&mut self, id: LightId) -> bool {
        let was_enabled = self.active.remove(id.0 as u32);
        if let Some(params) = self.params.remove(&id) {
            if self.ids.get(&params) == Some(&id) {
                self.ids.remove(&params);
            }
        }
        if (id.0 as usize) < self.capacity {
            self.free.insert(id.0);
        }
        was_enabled
    }

    /// Adds `id` to the active light set. Enabling an enabled light does nothing.
    pub fn enable(&mut self, id: LightId) -> Result<(), LightError> {
        let id = id.0 as u32;
        if !self.active.contains(id) && self.active.count as usize >= self.max_enabled {
            return Err(LightError::TooManyEnabled);
        }
        if self.active.insert(id) {
            Ok(())
        } else {
            Err(LightError::TooManyEnabled)
        }
    }

    /// Removes `id` from the active light set. Returns false if it was not enabled.
    pub fn disable(&mut self, id: LightId) -> bool {
        self.active.remove(id.0 as u32)
    }

    #[allow(missing_docs)]
    pub fn is_enabled(&self, id: LightId) -> bool {
        self.active.contains(id.0 as u32)
    }

    /// The enabled light ids, in unspecified order.
    pub fn enabled(&self) -> impl Iterator<Item = LightId> + '_ {
        self.active.ids().iter().map(|&id| LightId(id as u8))
    }

    /// The active light set as written to the device.
    pub fn light_set(&self) -> &LightSetData {
        &self.active
    }

    /// Number of ids left in the pool.
    pub fn free_count(&self) -> usize {
        self.free.len()
    }
}
