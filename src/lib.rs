//! # Garnet Graphics
//!
//! The render-graph core of the Garnet renderer.
//!
//! Passes declare the logical textures and buffers they read and write; the
//! core turns those declarations into an executable plan: a concrete memory
//! layout in which transient resources are aliased into shared heaps, and a
//! per-pass sequence of state-transition barriers. Across frames a diff over
//! the scheduled resources decides whether the previous frame's GPU handles
//! can be transferred or everything must be reallocated.
//!
//! # Architecture
//!
//! | Layer | Type | Purpose |
//! |-------|------|---------|
//! | Executor | [`RenderExecutor`] | Per-frame driving and barrier emission |
//! | Storage | [`ResourceStorage`] | Scheduling infos, heaps, frame diff |
//! | Planning | [`StateTransitionOptimizer`], [`MemoryAliaser`] | Barriers and packing |
//! | Graph | [`PassGraph`] | Pass order and usage timelines |
//! | Backend | [`RenderBackend`] | GPU capability boundary |
//!
//! # Example
//!
//! ```ignore
//! let mut graph = PassGraph::new();
//! graph.add_pass("gbuffer")?;
//! graph.add_pass("lighting")?;
//!
//! let mut storage = ResourceStorage::new(graph);
//! let mut executor = RenderExecutor::new();
//! let backend = NullBackend::new();
//!
//! for frame in 0.. {
//!     executor.execute_frame(frame, &passes, &mut storage, &backend)?;
//! }
//! ```

pub mod aliaser;
pub mod backend;
pub mod diff;
pub mod error;
pub mod executor;
pub mod format;
pub mod optimizer;
pub mod pass_graph;
pub mod scheduler;
pub mod scheduling;
pub mod state;
pub mod storage;

pub use aliaser::{AliasingEntry, AliasingOutcome, MemoryAliaser, Placement};
pub use backend::null::NullBackend;
pub use backend::{
    BackendError, BackendResult, Barrier, CommandList, CommandListKind, DescriptorHandle,
    DescriptorKind, HeapHandle, RenderBackend, ResourceHandle,
};
pub use diff::{diff_edit_script, DiffKey, EditOp, EditScript};
pub use error::{GraphError, GraphResult};
pub use executor::{RenderContext, RenderExecutor, RenderPass};
pub use format::{
    AliasingGroup, BufferProperties, ClearValue, PixelFormat, ResourceFormat, TextureKind,
    TextureProperties,
};
pub use optimizer::StateTransitionOptimizer;
pub use pass_graph::{PassGraph, PassNode};
pub use scheduler::ResourceScheduler;
pub use scheduling::{GpuResource, PassInfo, SchedulingInfo, SubresourceInfo, UploadStrategy};
pub use state::{ResourceState, StatePair};
pub use storage::{PassBarrierList, ResourceStorage};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Log the library version; useful at host startup.
pub fn init() {
    log::info!("Garnet Graphics v{VERSION} initialized");
}
