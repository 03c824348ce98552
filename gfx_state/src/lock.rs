use std::ops::Range;

use crate::device::{Device, FenceId, WaitResult};

const ONE_SECOND_NS: u64 = 1_000_000_000;

#[derive(Debug, Clone)]
struct BufferLock {
    range: Range<usize>,
    fence: FenceId,
}

fn overlaps(a: &Range<usize>, b: &Range<usize>) -> bool {
    a.start < b.end && b.start < a.end
}

/// Tracks byte ranges of a buffer that the device may still be reading.
///
/// A range is locked by placing a fence after the commands that read it. Writers wait
/// for every fence overlapping the range they are about to write.
#[derive(Debug, Default)]
pub struct BufferLockManager {
    locks: Vec<BufferLock>,
}

impl BufferLockManager {
    #[allow(missing_docs)]
    pub fn new() -> Self {
        Self::default()
    }

    /// Places a fence guarding `start..start + len`. Empty ranges are ignored.
    pub fn lock_range(&mut self, device: &mut dyn Device, start: usize, len: usize) {
        if len == 0 {
            return;
        }
        let fence = device.fence();
        self.locks.push(BufferLock {
            range: start..start + len,
            fence,
        });
    }

    /// Blocks until every fence overlapping `start..start + len` is signaled, then
    /// retires those fences.
    ///
    /// Returns false if a wait failed. The fence is retired either way.
    pub fn wait_for_locked_range(
        &mut self,
        device: &mut dyn Device,
        start: usize,
        len: usize,
    ) -> bool {
        if len == 0 {
            return true;
        }
        let range = start..start + len;
        let mut ok = true;
        let mut remaining = Vec::with_capacity(self.locks.len());
        for lock in self.locks.drain(..) {
            if overlaps(&range, &lock.range) {
                ok &= wait(device, lock.fence);
                device.delete_fence(lock.fence);
            } else {
                remaining.push(lock);
            }
        }
        self.locks = remaining;
        ok
    }

    /// Number of outstanding locks.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    #[allow(missing_docs)]
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }

    /// Deletes every fence without waiting.
    pub fn clear(&mut self, device: &mut dyn Device) {
        for lock in self.locks.drain(..) {
            device.delete_fence(lock.fence);
        }
    }
}

fn wait(device: &mut dyn Device, fence: FenceId) -> bool {
    // First poll without flushing. If that times out, flush and wait in long steps.
    let mut flush = false;
    let mut timeout = 0;
    loop {
        match device.client_wait(fence, flush, timeout) {
            WaitResult::AlreadySignaled | WaitResult::ConditionSatisfied => return true,
            WaitResult::WaitFailed => {
                tracing::warn!("waiting for buffer lock failed");
                return false;
            }
            WaitResult::TimeoutExpired => {
                flush = true;
                timeout = ONE_SECOND_NS;
            }
        }
    }
}
