use std::collections::HashMap;

use bytemuck::Pod;

use crate::{
    device::{BufferId, BufferTarget, Device, UsageHint},
    error::{DeviceError, StateError},
    lock::BufferLockManager,
};

#[derive(Debug)]
struct CacheSlot {
    record_size: usize,
    capacity: usize,
    usage: UsageHint,
    head: usize,
    buffers: Vec<BufferId>,
    locks: Vec<BufferLockManager>,
    current: usize,
    /// The binding point the slot was last bound to.
    binding: Option<BindingPoint>,
}

/// An indexed buffer binding point.
type BindingPoint = (BufferTarget, u32);

impl CacheSlot {
    fn byte_size(&self) -> usize {
        self.record_size * self.capacity
    }

    fn current_buffer(&self) -> BufferId {
        self.buffers[self.current]
    }

    fn write(&mut self, device: &mut dyn Device, index: usize, data: &[u8]) {
        let offset = index * self.record_size;
        if !self.locks[self.current].wait_for_locked_range(device, offset, data.len()) {
            tracing::warn!("writing cache record {} without a completed fence wait", index);
        }
        device.upload_buffer(self.current_buffer(), offset, data);
    }

    fn release(&mut self, device: &mut dyn Device) {
        for locks in &mut self.locks {
            locks.clear(device);
        }
        for &buffer in &self.buffers {
            device.delete_buffer(buffer);
        }
        self.buffers.clear();
    }
}

/// Named device buffers used to stream fixed-size records to shaders.
///
/// Each slot holds `capacity` records of `record_size` bytes, split over `buffering`
/// device buffers that are used round robin. Records are appended with
/// [ParameterCache::add_parameter], which wraps back to index 0 when the current buffer
/// is full, or written in place with [ParameterCache::set_parameter].
///
/// [ParameterCache::swap] moves to the next buffer. The buffer being left is fenced, so
/// writes that come back around to it wait until the device has finished the draws
/// that read it.
///
/// The cache tracks which buffer every binding point holds, so binding a slot is
/// skipped only when the device already has that slot's current buffer there.
#[derive(Debug, Default)]
pub struct ParameterCache {
    slots: HashMap<String, CacheSlot>,
    bindings: HashMap<BindingPoint, BufferId>,
}

impl ParameterCache {
    #[allow(missing_docs)]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a slot.
    ///
    /// If a slot with this name exists it is kept as is; a warning is logged if its
    /// geometry differs from the requested one.
    pub fn create_cache(
        &mut self,
        device: &mut dyn Device,
        name: &str,
        record_size: usize,
        capacity: usize,
        usage: UsageHint,
        buffering: usize,
    ) -> Result<(), DeviceError> {
        let capacity = capacity.max(1);
        let buffering = buffering.max(1);

        if let Some(slot) = self.slots.get(name) {
            if slot.record_size != record_size
                || slot.capacity != capacity
                || slot.usage != usage
                || slot.buffers.len() != buffering
            {
                tracing::warn!(
                    "a cache named '{}' already exists with a different size or usage",
                    name
                );
            }
            return Ok(());
        }

        let mut buffers = Vec::with_capacity(buffering);
        for _ in 0..buffering {
            match device.create_buffer(record_size * capacity, usage) {
                Ok(buffer) => buffers.push(buffer),
                Err(error) => {
                    for buffer in buffers {
                        device.delete_buffer(buffer);
                    }
                    return Err(error);
                }
            }
        }

        tracing::debug!(
            "created cache '{}': {} x {} bytes, {} buffer(s)",
            name,
            capacity,
            record_size,
            buffering
        );
        self.slots.insert(
            name.to_string(),
            CacheSlot {
                record_size,
                capacity,
                usage,
                head: 0,
                locks: (0..buffering).map(|_| BufferLockManager::new()).collect(),
                buffers,
                current: 0,
                binding: None,
            },
        );
        Ok(())
    }

    /// Deletes a slot and its device buffers. Does nothing if the slot does not exist.
    pub fn delete_cache(&mut self, device: &mut dyn Device, name: &str) {
        if let Some(mut slot) = self.slots.remove(name) {
            forget_buffers(&mut self.bindings, &slot.buffers);
            slot.release(device);
        }
    }

    #[allow(missing_docs)]
    pub fn is_cache(&self, name: &str) -> bool {
        self.slots.contains_key(name)
    }

    /// Changes the capacity of a slot, keeping the records that still fit.
    pub fn resize_cache(
        &mut self,
        device: &mut dyn Device,
        name: &str,
        capacity: usize,
    ) -> Result<(), StateError> {
        let slot = slot_mut(&mut self.slots, name)?;
        let capacity = capacity.max(1);
        if capacity == slot.capacity {
            return Ok(());
        }

        let kept = slot.capacity.min(capacity) * slot.record_size;
        let mut resized = Vec::with_capacity(slot.buffers.len());
        for &old in &slot.buffers {
            match device.create_buffer(capacity * slot.record_size, slot.usage) {
                Ok(new) => {
                    device.copy_buffer(old, new, 0, 0, kept);
                    resized.push(new);
                }
                Err(error) => {
                    for new in resized {
                        device.delete_buffer(new);
                    }
                    return Err(error.into());
                }
            }
        }
        for (locks, &old) in slot.locks.iter_mut().zip(&slot.buffers) {
            locks.clear(device);
            device.delete_buffer(old);
        }

        let held = held_point(&self.bindings, slot, slot.current_buffer());
        forget_buffers(&mut self.bindings, &slot.buffers);
        slot.buffers = resized;
        slot.capacity = capacity;
        slot.head = slot.head.min(capacity);
        if let Some(point) = held {
            bind_at(&mut self.bindings, device, slot, point);
        }
        Ok(())
    }

    /// Moves the write cursor back to the start of the current buffer.
    pub fn reset_cache(&mut self, name: &str) -> Result<(), StateError> {
        slot_mut(&mut self.slots, name)?.head = 0;
        Ok(())
    }

    /// Writes a record at the cursor and returns its index.
    ///
    /// When the current buffer is full the cursor wraps to 0 and older records of
    /// the same generation are overwritten.
    pub fn add_parameter(
        &mut self,
        device: &mut dyn Device,
        name: &str,
        data: &[u8],
    ) -> Result<usize, StateError> {
        let slot = slot_mut(&mut self.slots, name)?;
        check_size(name, slot, data)?;
        if slot.head >= slot.capacity {
            slot.head = 0;
        }
        let index = slot.head;
        slot.write(device, index, data);
        slot.head += 1;
        Ok(index)
    }

    /// Overwrites the record at `index` without moving the cursor.
    ///
    /// Returns false and writes nothing if `index` is out of range.
    pub fn set_parameter(
        &mut self,
        device: &mut dyn Device,
        name: &str,
        index: usize,
        data: &[u8],
    ) -> Result<bool, StateError> {
        let slot = slot_mut(&mut self.slots, name)?;
        check_size(name, slot, data)?;
        if index >= slot.capacity {
            tracing::warn!(
                "cache '{}': index {} out of range (capacity {})",
                name,
                index,
                slot.capacity
            );
            return Ok(false);
        }
        slot.write(device, index, data);
        Ok(true)
    }

    /// Typed form of [ParameterCache::add_parameter].
    pub fn add_record<T: Pod>(
        &mut self,
        device: &mut dyn Device,
        name: &str,
        record: &T,
    ) -> Result<usize, StateError> {
        self.add_parameter(device, name, bytemuck::bytes_of(record))
    }

    /// Typed form of [ParameterCache::set_parameter].
    pub fn set_record<T: Pod>(
        &mut self,
        device: &mut dyn Device,
        name: &str,
        index: usize,
        record: &T,
    ) -> Result<bool, StateError> {
        self.set_parameter(device, name, index, bytemuck::bytes_of(record))
    }

    /// Binds the slot's current buffer to an indexed binding point.
    ///
    /// Returns false without touching the device if exactly this buffer is already
    /// bound there, unless `forced`.
    pub fn bind(
        &mut self,
        device: &mut dyn Device,
        name: &str,
        location: u32,
        target: BufferTarget,
        forced: bool,
    ) -> Result<bool, StateError> {
        let slot = slot_mut(&mut self.slots, name)?;
        let point = (target, location);
        if !forced && self.bindings.get(&point) == Some(&slot.current_buffer()) {
            slot.binding = Some(point);
            return Ok(false);
        }
        bind_at(&mut self.bindings, device, slot, point);
        Ok(true)
    }

    /// Starts a new generation: fences the current buffer, moves to the next one and
    /// resets the cursor.
    ///
    /// If the slot's old buffer is still bound, the new buffer is bound in its place.
    /// A binding point another slot has taken since is left alone.
    pub fn swap(&mut self, device: &mut dyn Device, name: &str) -> Result<(), StateError> {
        let slot = slot_mut(&mut self.slots, name)?;
        let size = slot.byte_size();
        let previous = slot.current_buffer();
        slot.locks[slot.current].lock_range(device, 0, size);
        slot.current = (slot.current + 1) % slot.buffers.len();
        slot.head = 0;
        rebind_if_held(&mut self.bindings, device, slot, previous);
        tracing::trace!("cache '{}' swapped to buffer {}", name, slot.current);
        Ok(())
    }

    /// The index the next [ParameterCache::add_parameter] will write to.
    pub fn next_index(&self, name: &str) -> Result<usize, StateError> {
        let slot = slot_ref(&self.slots, name)?;
        Ok(if slot.head >= slot.capacity { 0 } else { slot.head })
    }

    /// The write cursor: the number of records added in this generation, up to wraps.
    pub fn head(&self, name: &str) -> Result<usize, StateError> {
        Ok(slot_ref(&self.slots, name)?.head)
    }

    #[allow(missing_docs)]
    pub fn capacity(&self, name: &str) -> Result<usize, StateError> {
        Ok(slot_ref(&self.slots, name)?.capacity)
    }

    #[allow(missing_docs)]
    pub fn record_size(&self, name: &str) -> Result<usize, StateError> {
        Ok(slot_ref(&self.slots, name)?.record_size)
    }

    /// The buffer the slot currently writes to.
    pub fn current_buffer(&self, name: &str) -> Result<BufferId, StateError> {
        Ok(slot_ref(&self.slots, name)?.current_buffer())
    }

    /// Every buffer of the slot, in rotation order.
    pub fn buffers(&self, name: &str) -> Result<&[BufferId], StateError> {
        Ok(&slot_ref(&self.slots, name)?.buffers)
    }

    /// The names of all slots.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.slots.keys().map(String::as_str)
    }

    /// The buffer the cache last bound at a binding point.
    pub fn bound_buffer(&self, target: BufferTarget, location: u32) -> Option<BufferId> {
        self.bindings.get(&(target, location)).copied()
    }

    /// Deletes every slot.
    pub fn clear(&mut self, device: &mut dyn Device) {
        for (_, mut slot) in self.slots.drain() {
            slot.release(device);
        }
        self.bindings.clear();
    }
}

fn bind_at(
    bindings: &mut HashMap<BindingPoint, BufferId>,
    device: &mut dyn Device,
    slot: &mut CacheSlot,
    point: BindingPoint,
) {
    let (target, location) = point;
    let buffer = slot.current_buffer();
    device.bind_buffer_range(target, location, buffer, 0, slot.byte_size());
    bindings.insert(point, buffer);
    slot.binding = Some(point);
}

/// The slot's last binding point, if `previous` is still what it holds.
fn held_point(
    bindings: &HashMap<BindingPoint, BufferId>,
    slot: &CacheSlot,
    previous: BufferId,
) -> Option<BindingPoint> {
    slot.binding.filter(|point| bindings.get(point) == Some(&previous))
}

/// Binds the slot's current buffer where `previous` is still bound.
fn rebind_if_held(
    bindings: &mut HashMap<BindingPoint, BufferId>,
    device: &mut dyn Device,
    slot: &mut CacheSlot,
    previous: BufferId,
) {
    if let Some(point) = held_point(bindings, slot, previous) {
        bind_at(bindings, device, slot, point);
    }
}

fn forget_buffers(bindings: &mut HashMap<BindingPoint, BufferId>, buffers: &[BufferId]) {
    bindings.retain(|_, buffer| !buffers.contains(buffer));
}

fn slot_ref<'a>(
    slots: &'a HashMap<String, CacheSlot>,
    name: &str,
) -> Result<&'a CacheSlot, StateError> {
    slots
        .get(name)
        .ok_or_else(|| StateError::UnknownCache(name.to_string()))
}

fn slot_mut<'a>(
    slots: &'a mut HashMap<String, CacheSlot>,
    name: &str,
) -> Result<&'a mut CacheSlot, StateError> {
    slots
        .get_mut(name)
        .ok_or_else(|| StateError::UnknownCache(name.to_string()))
}

fn check_size(name: &str, slot: &CacheSlot, data: &[u8]) -> Result<(), StateError> {
    if data.len() != slot.record_size {
        return Err(StateError::RecordSizeMismatch {
            cache: name.to_string(),
            expected: slot.record_size,
            actual: data.len(),
        });
    }
    Ok(())
}
