//! No-op backend for testing and headless runs.
//!
//! This backend performs no GPU work but provides a valid implementation of
//! the [`RenderBackend`] trait: handles are numbered monotonically, fences
//! signal immediately, and every recorded command is journaled so tests can
//! assert on the exact barrier stream a frame produced.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::format::{AliasingGroup, PixelFormat, ResourceFormat};

use super::{
    BackendResult, Barrier, CommandList, CommandListKind, DescriptorHandle, DescriptorKind,
    HeapHandle, RenderBackend, ResourceHandle,
};

/// One entry of the recorded command journal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JournalEntry {
    Barrier(Barrier),
    AliasingBarrier { after: ResourceHandle },
    Submit { list_kind: CommandListKind, fence_value: u64 },
}

/// No-op GPU backend.
#[derive(Debug)]
pub struct NullBackend {
    universal_heaps: bool,
    next_handle: AtomicU64,
    next_fence: AtomicU64,
    completed_fence: AtomicU64,
    heaps_created: AtomicU64,
    journal: Mutex<Vec<JournalEntry>>,
    heap_log: Mutex<Vec<(AliasingGroup, u64)>>,
}

impl NullBackend {
    /// Create a backend without universal heap support (groups stay split).
    pub fn new() -> Self {
        Self {
            universal_heaps: false,
            next_handle: AtomicU64::new(1),
            next_fence: AtomicU64::new(0),
            completed_fence: AtomicU64::new(0),
            heaps_created: AtomicU64::new(0),
            journal: Mutex::new(Vec::new()),
            heap_log: Mutex::new(Vec::new()),
        }
    }

    /// Create a backend reporting universal heap support.
    pub fn with_universal_heaps() -> Self {
        Self {
            universal_heaps: true,
            ..Self::new()
        }
    }

    fn next_handle(&self) -> u64 {
        self.next_handle.fetch_add(1, Ordering::Relaxed)
    }

    /// Number of heaps created over the backend's lifetime.
    pub fn heaps_created(&self) -> u64 {
        self.heaps_created.load(Ordering::Relaxed)
    }

    /// Heap creations in order: `(group, size)`.
    pub fn heap_log(&self) -> Vec<(AliasingGroup, u64)> {
        self.heap_log.lock().clone()
    }

    /// Snapshot of the recorded command journal.
    pub fn journal(&self) -> Vec<JournalEntry> {
        self.journal.lock().clone()
    }

    /// Drop all journal entries.
    pub fn clear_journal(&self) {
        self.journal.lock().clear();
    }
}

impl Default for NullBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderBackend for NullBackend {
    fn name(&self) -> &'static str {
        "Null Backend"
    }

    fn supports_universal_heaps(&self) -> bool {
        self.universal_heaps
    }

    fn create_heap(&self, group: AliasingGroup, size_bytes: u64) -> BackendResult<HeapHandle> {
        log::trace!("NullBackend: creating {group:?} heap of {size_bytes} bytes");
        self.heaps_created.fetch_add(1, Ordering::Relaxed);
        self.heap_log.lock().push((group, size_bytes));
        Ok(HeapHandle(self.next_handle()))
    }

    fn release_heap(&self, heap: HeapHandle) {
        log::trace!("NullBackend: releasing heap {}", heap.raw());
    }

    fn allocate_resource(
        &self,
        debug_name: &str,
        format: &ResourceFormat,
        heap: HeapHandle,
        offset: u64,
    ) -> BackendResult<ResourceHandle> {
        log::trace!(
            "NullBackend: placing {debug_name} ({} bytes) on heap {} at offset {offset}",
            format.size_in_bytes(),
            heap.raw()
        );
        Ok(ResourceHandle(self.next_handle()))
    }

    fn allocate_committed_resource(
        &self,
        debug_name: &str,
        format: &ResourceFormat,
    ) -> BackendResult<ResourceHandle> {
        log::trace!(
            "NullBackend: committed allocation for {debug_name} ({} bytes)",
            format.size_in_bytes()
        );
        Ok(ResourceHandle(self.next_handle()))
    }

    fn release_resource(&self, resource: ResourceHandle) {
        log::trace!("NullBackend: releasing resource {}", resource.raw());
    }

    fn allocate_descriptor(
        &self,
        kind: DescriptorKind,
        resource: ResourceHandle,
        view_format: Option<PixelFormat>,
    ) -> BackendResult<DescriptorHandle> {
        log::trace!(
            "NullBackend: {kind:?} descriptor for resource {} (view format {view_format:?})",
            resource.raw()
        );
        Ok(DescriptorHandle(self.next_handle()))
    }

    fn create_command_list(&self, kind: CommandListKind) -> CommandList {
        CommandList::new(kind, self.next_handle())
    }

    fn record_barriers(&self, _list: &CommandList, barriers: &[Barrier]) -> BackendResult<()> {
        let mut journal = self.journal.lock();
        journal.extend(barriers.iter().copied().map(JournalEntry::Barrier));
        Ok(())
    }

    fn record_aliasing_barrier(
        &self,
        _list: &CommandList,
        after: ResourceHandle,
    ) -> BackendResult<()> {
        self.journal.lock().push(JournalEntry::AliasingBarrier { after });
        Ok(())
    }

    fn submit(&self, list: CommandList) -> BackendResult<u64> {
        let fence_value = self.next_fence.fetch_add(1, Ordering::Relaxed) + 1;
        self.journal.lock().push(JournalEntry::Submit {
            list_kind: list.kind(),
            fence_value,
        });
        // No GPU: work completes as soon as it is submitted.
        self.completed_fence.store(fence_value, Ordering::Release);
        log::trace!("NullBackend: submitted list {} at fence {fence_value}", list.id());
        Ok(fence_value)
    }

    fn wait(&self, fence_value: u64) {
        debug_assert!(fence_value <= self.completed_fence.load(Ordering::Acquire));
    }
}
