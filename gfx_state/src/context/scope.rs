use std::{
    fmt,
    ops::{Deref, DerefMut},
};

use super::RenderingContext;
use crate::{device::Device, stack::StateCategory};

/// Pops one state category when dropped.
///
/// Returned by the `scoped_*` methods of [RenderingContext]. The guard derefs to the
/// context, so drawing continues through it:
///
/// ```ignore
/// let mut scope = context.scoped_depth_buffer(DepthBufferParameters::disabled());
/// scope.draw_arrays(PrimitiveMode::Triangles, 0, 3);
/// // depth state restored here
/// ```
pub struct StateScope<'a, D: Device> {
    context: &'a mut RenderingContext<D>,
    category: StateCategory,
}

impl<'a, D: Device> StateScope<'a, D> {
    pub(crate) fn new(context: &'a mut RenderingContext<D>, category: StateCategory) -> Self {
        Self { context, category }
    }

    /// The category restored on drop.
    pub fn category(&self) -> StateCategory {
        self.category
    }
}

impl<'a, D: Device> Deref for StateScope<'a, D> {
    type Target = RenderingContext<D>;

    fn deref(&self) -> &Self::Target {
        self.context
    }
}

impl<'a, D: Device> DerefMut for StateScope<'a, D> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.context
    }
}

impl<'a, D: Device> Drop for StateScope<'a, D> {
    fn drop(&mut self) {
        self.context.pop_state(self.category);
    }
}

impl<'a, D: Device> fmt::Debug for StateScope<'a, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateScope")
            .field("category", &self.category)
            .finish_non_exhaustive()
    }
}
