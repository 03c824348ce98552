/// A save/restore stack for one category of state.
///
/// The current value is not stored here; the stack only holds values saved by pushes.
#[derive(Debug, Clone)]
pub struct StateStack<T> {
    saved: Vec<T>,
}

impl<T> Default for StateStack<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> StateStack<T> {
    #[allow(missing_docs)]
    pub fn new() -> Self {
        Self { saved: Vec::new() }
    }

    /// Saves a value.
    pub fn push(&mut self, value: T) {
        self.saved.push(value);
    }

    /// Returns the most recently saved value, or `None` if nothing is saved.
    pub fn pop(&mut self) -> Option<T> {
        self.saved.pop()
    }

    /// The most recently saved value.
    pub fn top(&self) -> Option<&T> {
        self.saved.last()
    }

    /// The number of saved values.
    pub fn len(&self) -> usize {
        self.saved.len()
    }

    #[allow(missing_docs)]
    pub fn is_empty(&self) -> bool {
        self.saved.is_empty()
    }

    /// Drops every saved value.
    pub fn reset(&mut self) {
        self.saved.clear();
    }
}

/// A category of context state with its own save/restore stack.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateCategory {
    Blending,
    ColorBuffer,
    CullFace,
    DepthBuffer,
    Line,
    PointSize,
    PolygonMode,
    PolygonOffset,
    Scissor,
    Stencil,
    Viewport,
    Shader,
    Fbo,
    Material,
    Projection,
    ModelToCamera,
    /// The texture bound to a texture unit.
    Texture(u8),
    /// The image bound to an image unit.
    BoundImage(u8),
}
