//! Resource state masks for transition planning.
//!
//! A subresource occupies exactly one state mask at any point of the pass
//! timeline. The empty mask is the `Common` state every resource starts its
//! life in; the optimizer plans transitions between masks so that each pass
//! observes at least the states it requested.

use bitflags::bitflags;

bitflags! {
    /// States a subresource can be transitioned into.
    ///
    /// Several read-only states may be combined into one mask (a texture can
    /// be simultaneously readable by shaders and a copy source); write states
    /// are exclusive.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ResourceState: u32 {
        /// Readable from shaders (sampled or typed read).
        const SHADER_RESOURCE = 1 << 0;
        /// Read/write as an unordered-access view.
        const UNORDERED_ACCESS = 1 << 1;
        /// Written as a color render target.
        const RENDER_TARGET = 1 << 2;
        /// Written as a depth/stencil target.
        const DEPTH_WRITE = 1 << 3;
        /// Read-only depth/stencil (depth test without write).
        const DEPTH_READ = 1 << 4;
        /// Source of a copy operation.
        const COPY_SOURCE = 1 << 5;
        /// Destination of a copy operation.
        const COPY_DEST = 1 << 6;
        /// Presented by the swap chain.
        const PRESENT = 1 << 7;
    }
}

impl ResourceState {
    /// The `Common` state: no access declared, the state resources decay to
    /// before their first use.
    pub const COMMON: Self = Self::empty();

    const READ_ONLY_MASK: Self = Self::SHADER_RESOURCE
        .union(Self::DEPTH_READ)
        .union(Self::COPY_SOURCE)
        .union(Self::PRESENT);

    const WRITE_MASK: Self = Self::UNORDERED_ACCESS
        .union(Self::RENDER_TARGET)
        .union(Self::DEPTH_WRITE)
        .union(Self::COPY_DEST);

    /// Check if the mask consists purely of read-only states.
    ///
    /// `Common` is neither read-only nor writable.
    pub fn is_read_only(self) -> bool {
        !self.is_empty() && Self::READ_ONLY_MASK.contains(self)
    }

    /// Check if the mask contains any write state.
    pub fn has_writes(self) -> bool {
        self.intersects(Self::WRITE_MASK)
    }
}

impl Default for ResourceState {
    fn default() -> Self {
        Self::COMMON
    }
}

/// A `(from, to)` state pair describing one transition barrier.
pub type StatePair = (ResourceState, ResourceState);
