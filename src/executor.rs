//! Render executor: drives per-frame scheduling and command recording.
//!
//! The executor owns no resources; it walks the pass graph in order, lets
//! each pass declare its resources, asks the storage to allocate or transfer
//! them, and then records the precomputed barriers around each pass callback.

use std::collections::VecDeque;

use crate::backend::{
    BackendError, CommandList, CommandListKind, DescriptorHandle, DescriptorKind, RenderBackend,
    ResourceHandle,
};
use crate::error::{GraphError, GraphResult};
use crate::scheduler::ResourceScheduler;
use crate::storage::ResourceStorage;

/// A render pass: a name, a scheduling callback, and an execution callback.
///
/// Scheduling declares the pass's resource usages; execution records the
/// pass's GPU work through the [`RenderContext`]. The core calls both in
/// pass-graph order and never reorders passes.
pub trait RenderPass {
    /// The pass name; must match a pass in the storage's graph.
    fn name(&self) -> &str;

    /// Declare created resources and usages for this frame.
    fn schedule(&self, scheduler: &mut ResourceScheduler<'_>) -> GraphResult<()>;

    /// Record the pass's GPU work. Barriers are already in place.
    fn execute(&self, ctx: &mut RenderContext<'_>) -> GraphResult<()>;
}

/// Execution-time view of the frame handed to a pass callback.
///
/// Valid only for the duration of the callback.
pub struct RenderContext<'a> {
    pass: &'a str,
    storage: &'a ResourceStorage,
    backend: &'a dyn RenderBackend,
    list: &'a CommandList,
}

impl<'a> RenderContext<'a> {
    /// The currently executing pass.
    pub fn pass_name(&self) -> &str {
        self.pass
    }

    /// The GPU handle bound to a resource name (aliases resolve).
    pub fn resource(&self, name: &str) -> GraphResult<ResourceHandle> {
        self.storage.resource_handle(name)
    }

    /// The descriptor allocated for this pass's use of a resource.
    pub fn descriptor(&self, name: &str, kind: DescriptorKind) -> GraphResult<DescriptorHandle> {
        self.descriptor_for_subresource(name, 0, kind)
    }

    /// The descriptor for a specific subresource.
    pub fn descriptor_for_subresource(
        &self,
        name: &str,
        subresource: u32,
        kind: DescriptorKind,
    ) -> GraphResult<DescriptorHandle> {
        let info = self.storage.scheduling_info(name)?;
        info.descriptor(self.pass, subresource, kind)
            .ok_or_else(|| GraphError::Misconfiguration(format!(
                "pass {} requested no {kind:?} descriptor for {name}[{subresource}]",
                self.pass
            )))
    }

    /// The frame's command list.
    pub fn command_list(&self) -> &CommandList {
        self.list
    }

    /// The backend recording this frame.
    pub fn backend(&self) -> &dyn RenderBackend {
        self.backend
    }
}

/// Drives frames through scheduling, allocation, and execution.
#[derive(Debug, Default)]
pub struct RenderExecutor {
    last_fence_value: u64,
    pending_fences: VecDeque<u64>,
}

impl RenderExecutor {
    /// Create an executor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run one frame end to end and return the fence value it signals.
    ///
    /// The pass list must match the storage's pass graph in names and order.
    /// Throttles so that at most `storage.frames_in_flight()` submissions are
    /// outstanding before scheduling begins.
    pub fn execute_frame(
        &mut self,
        frame_index: u64,
        passes: &[Box<dyn RenderPass>],
        storage: &mut ResourceStorage,
        backend: &dyn RenderBackend,
    ) -> GraphResult<u64> {
        self.validate_pass_list(passes, storage)?;

        while self.pending_fences.len() >= storage.frames_in_flight() as usize {
            if let Some(fence) = self.pending_fences.pop_front() {
                backend.wait(fence);
            }
        }

        log::trace!("frame {frame_index}: scheduling {} passes", passes.len());
        storage.begin_frame();
        for pass in passes {
            let mut scheduler = storage.scheduler_for_pass(pass.name())?;
            pass.schedule(&mut scheduler)?;
        }
        storage.end_scheduling()?;
        storage.allocate_scheduled_resources(backend)?;

        let list = backend.create_command_list(CommandListKind::Direct);
        self.record_frame(passes, storage, backend, &list)?;

        let fence_value = backend
            .submit(list)
            .map_err(|source| self.backend_failure(source))?;
        log::trace!("frame {frame_index}: submitted at fence {fence_value}");
        self.last_fence_value = fence_value;
        self.pending_fences.push_back(fence_value);
        Ok(fence_value)
    }

    /// Block until every outstanding submission has completed.
    pub fn wait_idle(&mut self, backend: &dyn RenderBackend) {
        while let Some(fence) = self.pending_fences.pop_front() {
            backend.wait(fence);
        }
    }

    fn validate_pass_list(
        &self,
        passes: &[Box<dyn RenderPass>],
        storage: &ResourceStorage,
    ) -> GraphResult<()> {
        if passes.len() != storage.graph().pass_count() {
            return Err(GraphError::Misconfiguration(format!(
                "pass list has {} entries but the graph has {}",
                passes.len(),
                storage.graph().pass_count()
            )));
        }
        for (index, pass) in passes.iter().enumerate() {
            let expected = storage.graph().pass(index).name();
            if pass.name() != expected {
                return Err(GraphError::Misconfiguration(format!(
                    "pass {} is {} but the graph expects {expected}",
                    index,
                    pass.name()
                )));
            }
        }
        Ok(())
    }

    fn record_frame(
        &self,
        passes: &[Box<dyn RenderPass>],
        storage: &ResourceStorage,
        backend: &dyn RenderBackend,
        list: &CommandList,
    ) -> GraphResult<()> {
        if !list.kind().supports_barriers() {
            return Err(GraphError::IncompatibleUsage {
                resource: "command list".to_string(),
                detail: format!("{:?} lists cannot record barriers", list.kind()),
            });
        }

        // One-time transitions open the layout epoch.
        if storage.has_memory_layout_change() && !storage.one_time_barriers().is_empty() {
            backend
                .record_barriers(list, storage.one_time_barriers())
                .map_err(|source| self.backend_failure(source))?;
        }

        for (index, pass) in passes.iter().enumerate() {
            let barriers = storage.pass_barriers(index);
            for &after in &barriers.aliasing {
                backend
                    .record_aliasing_barrier(list, after)
                    .map_err(|source| self.backend_failure(source))?;
            }
            if !barriers.transitions.is_empty() {
                backend
                    .record_barriers(list, &barriers.transitions)
                    .map_err(|source| self.backend_failure(source))?;
            }

            let mut ctx = RenderContext {
                pass: pass.name(),
                storage,
                backend,
                list,
            };
            pass.execute(&mut ctx)?;

            if !barriers.uav_flushes.is_empty() {
                backend
                    .record_barriers(list, &barriers.uav_flushes)
                    .map_err(|source| self.backend_failure(source))?;
            }
        }
        Ok(())
    }

    fn backend_failure(&self, source: BackendError) -> GraphError {
        GraphError::BackendFailure {
            fence_value: self.last_fence_value + 1,
            source,
        }
    }
}
