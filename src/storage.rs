//! Resource storage and cross-frame orchestration.
//!
//! The storage owns the scheduling infos of the current and previous frames
//! and drives the scheduling → optimization → allocation sequence. Per frame
//! it materializes creation requests into scheduling infos, resolves alias
//! chains, runs the transfer test against the previous frame, and either
//! transfers the previous frame's GPU handles (stable layout) or repacks the
//! aliasing heaps and allocates everything fresh (layout change).

use std::collections::BTreeMap;

use crate::aliaser::{AliasingEntry, MemoryAliaser};
use crate::backend::{Barrier, DescriptorKind, HeapHandle, RenderBackend, ResourceHandle};
use crate::diff::{diff_edit_script, DiffKey, EditOp};
use crate::error::{GraphError, GraphResult};
use crate::format::{AliasingGroup, PixelFormat, ResourceFormat};
use crate::optimizer::StateTransitionOptimizer;
use crate::pass_graph::PassGraph;
use crate::scheduler::{Configurator, ResourceScheduler};
use crate::scheduling::{GpuResource, SchedulingInfo};
use crate::state::ResourceState;

/// A queued resource creation.
#[derive(Debug)]
enum CreationRequest {
    Primary { name: String, format: ResourceFormat },
    Clone { name: String, source: String },
}

/// A queued usage declaration with its configurator.
struct UsageRequest {
    pass: String,
    name: String,
    declared: Vec<(u32, ResourceState)>,
    register_reference: bool,
    configurator: Configurator,
}

/// Barriers planned for one pass, in emission order.
#[derive(Debug, Default)]
pub struct PassBarrierList {
    /// Aliasing barriers for resources whose lifetime starts at this pass.
    pub aliasing: Vec<ResourceHandle>,
    /// State transitions to apply before the pass callback.
    pub transitions: Vec<Barrier>,
    /// UAV flushes to apply after the pass callback.
    pub uav_flushes: Vec<Barrier>,
}

/// Owner of per-frame scheduling infos, heaps, and GPU handles.
pub struct ResourceStorage {
    graph: PassGraph,
    frames_in_flight: u32,
    current: BTreeMap<String, SchedulingInfo>,
    previous: BTreeMap<String, SchedulingInfo>,
    /// Any valid name (primary or alias) to the primary name.
    name_index: BTreeMap<String, String>,
    /// Raw alias declarations: alias -> target, possibly another alias.
    alias_map: BTreeMap<String, String>,
    creation_requests: Vec<CreationRequest>,
    usage_requests: Vec<UsageRequest>,
    heaps: BTreeMap<AliasingGroup, (HeapHandle, u64)>,
    per_pass_barriers: Vec<PassBarrierList>,
    one_time_barriers: Vec<Barrier>,
    layout_changed: bool,
    /// Whether the current frame reached the end of resource allocation.
    current_allocated: bool,
    /// Whether the previous frame did; transfer requires live handles.
    previous_allocated: bool,
}

impl ResourceStorage {
    /// Create a storage over a frozen pass order.
    pub fn new(graph: PassGraph) -> Self {
        Self {
            graph,
            frames_in_flight: 2,
            current: BTreeMap::new(),
            previous: BTreeMap::new(),
            name_index: BTreeMap::new(),
            alias_map: BTreeMap::new(),
            creation_requests: Vec::new(),
            usage_requests: Vec::new(),
            heaps: BTreeMap::new(),
            per_pass_barriers: Vec::new(),
            one_time_barriers: Vec::new(),
            layout_changed: false,
            current_allocated: false,
            previous_allocated: false,
        }
    }

    /// Set how many frames may be in flight simultaneously.
    pub fn with_frames_in_flight(mut self, frames: u32) -> Self {
        self.frames_in_flight = frames.max(1);
        self
    }

    /// The configured frames-in-flight count.
    pub fn frames_in_flight(&self) -> u32 {
        self.frames_in_flight
    }

    /// The pass graph this storage schedules against.
    pub fn graph(&self) -> &PassGraph {
        &self.graph
    }

    /// Start a new frame: the current frame becomes the previous one and all
    /// partial scheduling state (including that of an aborted frame) is
    /// discarded.
    pub fn begin_frame(&mut self) {
        std::mem::swap(&mut self.current, &mut self.previous);
        self.current.clear();
        self.name_index.clear();
        self.alias_map.clear();
        self.creation_requests.clear();
        self.usage_requests.clear();
        self.per_pass_barriers.clear();
        self.one_time_barriers.clear();
        self.layout_changed = false;
        self.previous_allocated = self.current_allocated;
        self.current_allocated = false;
        self.graph.clear_resource_references();
    }

    /// Open the scheduling surface for one pass.
    pub fn scheduler_for_pass(&mut self, pass: &str) -> GraphResult<ResourceScheduler<'_>> {
        self.graph.index_of_pass(pass)?;
        Ok(ResourceScheduler::new(self, pass))
    }

    pub(crate) fn enqueue_primary_creation(&mut self, name: &str, format: ResourceFormat) {
        self.creation_requests.push(CreationRequest::Primary {
            name: name.to_string(),
            format,
        });
    }

    pub(crate) fn enqueue_clone(&mut self, name: &str, source: &str) {
        self.creation_requests.push(CreationRequest::Clone {
            name: name.to_string(),
            source: source.to_string(),
        });
    }

    pub(crate) fn register_alias(&mut self, alias: &str, target: &str) {
        self.alias_map.insert(alias.to_string(), target.to_string());
    }

    pub(crate) fn enqueue_usage(
        &mut self,
        pass: String,
        name: &str,
        declared: Vec<(u32, ResourceState)>,
        register_reference: bool,
        configurator: Configurator,
    ) {
        self.usage_requests.push(UsageRequest {
            pass,
            name: name.to_string(),
            declared,
            register_reference,
            configurator,
        });
    }

    /// Materialize all queued requests into scheduling infos.
    ///
    /// Primary creations run first, then clones (copying the source's
    /// format), then configurators in declaration order. Scheduling runs in
    /// pass-graph order, so creator passes configure before user passes.
    pub fn end_scheduling(&mut self) -> GraphResult<()> {
        let creations = std::mem::take(&mut self.creation_requests);

        for request in &creations {
            if let CreationRequest::Primary { name, format } = request {
                if self.current.contains_key(name) {
                    return Err(GraphError::DuplicateCreation(name.clone()));
                }
                self.current
                    .insert(name.clone(), SchedulingInfo::new(name.clone(), format.clone()));
            }
        }
        for request in &creations {
            if let CreationRequest::Clone { name, source } = request {
                if self.current.contains_key(name) {
                    return Err(GraphError::DuplicateCreation(name.clone()));
                }
                let format = self
                    .current
                    .get(source)
                    .map(|info| info.format().clone())
                    .ok_or_else(|| GraphError::MissingDependency {
                        resource: name.clone(),
                        dependency: source.clone(),
                    })?;
                self.current
                    .insert(name.clone(), SchedulingInfo::new(name.clone(), format));
            }
        }

        for name in self.current.keys() {
            self.name_index.insert(name.clone(), name.clone());
        }
        self.resolve_aliases()?;

        let requests = std::mem::take(&mut self.usage_requests);
        for request in requests {
            let primary = self
                .name_index
                .get(&request.name)
                .cloned()
                .ok_or_else(|| GraphError::UnknownResource(request.name.clone()))?;
            let info = self
                .current
                .get_mut(&primary)
                .ok_or_else(|| GraphError::UnknownResource(primary.clone()))?;
            (request.configurator)(info)?;

            if request.register_reference {
                let pass_index = self.graph.index_of_pass(&request.pass)?;
                if request.declared.is_empty() {
                    self.graph.register_resource_reference(
                        pass_index,
                        request.name.clone(),
                        0,
                        ResourceState::COMMON,
                    );
                } else {
                    for (subresource, states) in request.declared {
                        self.graph.register_resource_reference(
                            pass_index,
                            request.name.clone(),
                            subresource,
                            states,
                        );
                    }
                }
            }
        }

        for info in self.current.values_mut() {
            info.apply_expected_states();
        }
        Ok(())
    }

    /// Resolve alias chains transitively and attach aliases to their infos.
    fn resolve_aliases(&mut self) -> GraphResult<()> {
        let aliases: Vec<String> = self.alias_map.keys().cloned().collect();
        for alias in aliases {
            if self.current.contains_key(&alias) {
                return Err(GraphError::Misconfiguration(format!(
                    "alias {alias} shadows a created resource"
                )));
            }
            let mut visited = vec![alias.clone()];
            let mut target = self.alias_map[&alias].clone();
            while let Some(next) = self.alias_map.get(&target) {
                if visited.contains(&target) {
                    return Err(GraphError::Misconfiguration(format!(
                        "alias cycle involving {alias}"
                    )));
                }
                visited.push(target.clone());
                target = next.clone();
            }
            let info = self
                .current
                .get_mut(&target)
                .ok_or_else(|| GraphError::MissingDependency {
                    resource: alias.clone(),
                    dependency: target.clone(),
                })?;
            info.add_name_alias(alias.clone());
            self.name_index.insert(alias, target);
        }
        Ok(())
    }

    /// Run the transfer test, then allocate or transfer every resource and
    /// plan the frame's barriers.
    pub fn allocate_scheduled_resources(&mut self, backend: &dyn RenderBackend) -> GraphResult<()> {
        self.compute_aliasing_lifetimes();

        // Transfer test: carry the previous frame's capability so frames
        // whose usage shrinks keep a stable diff key instead of ping-pong
        // reallocating.
        for (name, info) in self.current.iter_mut() {
            if let Some(prev) = self.previous.get(name) {
                info.add_expected_states(prev.expected_states());
            }
        }

        let current_keys = Self::diff_keys(&self.current);
        let previous_keys = Self::diff_keys(&self.previous);
        let script = diff_edit_script(&previous_keys, &current_keys);
        // An aborted previous frame has no handles to transfer, so a stable
        // diff still forces reallocation then.
        self.layout_changed = !script.is_all_common() || !self.previous_allocated;

        if self.layout_changed {
            let changes = script
                .ops()
                .iter()
                .filter(|(op, _)| *op != EditOp::Common)
                .count();
            log::debug!(
                "memory layout changed ({changes} of {} entries); reallocating",
                script.ops().len()
            );
            self.reallocate(backend)?;
        } else {
            log::trace!(
                "memory layout stable; transferring {} resources",
                self.current.len()
            );
            self.transfer_from_previous();
        }

        let optimizer = StateTransitionOptimizer::new(&self.graph);
        for info in self.current.values_mut() {
            optimizer.optimize(info)?;
        }
        self.build_barrier_lists()?;
        self.current_allocated = true;
        Ok(())
    }

    /// True when this frame ended the previous layout epoch.
    pub fn has_memory_layout_change(&self) -> bool {
        self.layout_changed
    }

    fn compute_aliasing_lifetimes(&mut self) {
        let graph = &self.graph;
        for info in self.current.values_mut() {
            let mut timeline = graph.resource_usage_timeline(info.name());
            for alias in info.aliases() {
                if let Some((first, last)) = graph.resource_usage_timeline(alias) {
                    timeline = Some(match timeline {
                        None => (first, last),
                        Some((f, l)) => (f.min(first), l.max(last)),
                    });
                }
            }
            if let Some(lifetime) = timeline {
                info.set_aliasing_lifetime(lifetime);
            }
        }
    }

    fn diff_keys(infos: &BTreeMap<String, SchedulingInfo>) -> Vec<DiffKey> {
        infos
            .iter()
            .map(|(name, info)| DiffKey {
                name: name.clone(),
                format: info.format().clone(),
                expected_states: info.expected_states(),
            })
            .collect()
    }

    /// Move GPU handles and descriptors from the previous frame's infos.
    fn transfer_from_previous(&mut self) {
        for (name, info) in self.current.iter_mut() {
            if let Some(prev) = self.previous.get_mut(name) {
                info.copy_aliasing_placement(prev);
                if let GpuResource::Allocated(handle) = prev.take_resource() {
                    info.attach_resource(handle);
                }
                info.set_descriptors(prev.take_descriptors());
            }
        }
    }

    /// Discard the previous layout and allocate the current one from scratch.
    fn reallocate(&mut self, backend: &dyn RenderBackend) -> GraphResult<()> {
        for info in self.previous.values_mut() {
            if let GpuResource::Allocated(handle) = info.take_resource() {
                backend.release_resource(handle);
            }
        }
        for (_, (heap, _)) in std::mem::take(&mut self.heaps) {
            backend.release_heap(heap);
        }

        let supports_universal = backend.supports_universal_heaps();
        let mut aliasers: BTreeMap<AliasingGroup, MemoryAliaser> = BTreeMap::new();
        for (name, info) in self.current.iter() {
            if !info.can_be_aliased() {
                continue;
            }
            let Some(lifetime) = info.aliasing_lifetime() else {
                log::warn!("resource {name} was created but never used by any pass");
                continue;
            };
            let group = info.format().aliasing_group(supports_universal);
            aliasers.entry(group).or_default().add_entry(AliasingEntry::new(
                name.clone(),
                lifetime,
                info.format().size_in_bytes(),
            ));
        }

        for (group, aliaser) in aliasers {
            if aliaser.is_empty() {
                continue;
            }
            let outcome = aliaser.alias();
            let heap = backend
                .create_heap(group, outcome.heap_size)
                .map_err(|source| GraphError::AllocationFailure {
                    resource: format!("{group:?} heap"),
                    source,
                })?;
            self.heaps.insert(group, (heap, outcome.heap_size));

            for placement in outcome.placements {
                let info = self
                    .current
                    .get_mut(&placement.key)
                    .ok_or_else(|| GraphError::UnknownResource(placement.key.clone()))?;
                info.set_heap_offset(placement.heap_offset);
                info.set_needs_aliasing_barrier(placement.needs_aliasing_barrier);
                let handle = backend
                    .allocate_resource(info.name(), info.format(), heap, placement.heap_offset)
                    .map_err(|source| GraphError::AllocationFailure {
                        resource: placement.key.clone(),
                        source,
                    })?;
                info.attach_resource(handle);
            }
        }

        // Everything left over owns a committed allocation.
        for info in self.current.values_mut() {
            if info.resource_handle().is_none() {
                let handle = backend
                    .allocate_committed_resource(info.name(), info.format())
                    .map_err(|source| GraphError::AllocationFailure {
                        resource: info.name().to_string(),
                        source,
                    })?;
                info.attach_resource(handle);
            }
        }

        self.allocate_descriptors(backend)
    }

    fn allocate_descriptors(&mut self, backend: &dyn RenderBackend) -> GraphResult<()> {
        for info in self.current.values_mut() {
            let Some(handle) = info.resource_handle() else {
                continue;
            };
            let mut requests: Vec<(String, u32, DescriptorKind, Option<PixelFormat>)> = Vec::new();
            for (pass, pass_info) in info.pass_infos() {
                for (subresource, sub) in pass_info.subresources() {
                    for kind in &sub.descriptor_requests {
                        requests.push((
                            pass.to_string(),
                            subresource,
                            *kind,
                            sub.shader_visible_format,
                        ));
                    }
                }
            }
            for (pass, subresource, kind, view_format) in requests {
                let descriptor = backend
                    .allocate_descriptor(kind, handle, view_format)
                    .map_err(|source| GraphError::AllocationFailure {
                        resource: info.name().to_string(),
                        source,
                    })?;
                info.attach_descriptor(&pass, subresource, kind, descriptor);
            }
        }
        Ok(())
    }

    /// Turn optimizer and aliaser results into concrete per-pass barriers.
    fn build_barrier_lists(&mut self) -> GraphResult<()> {
        self.per_pass_barriers = (0..self.graph.pass_count())
            .map(|_| PassBarrierList::default())
            .collect();
        self.one_time_barriers.clear();

        for info in self.current.values() {
            let Some(handle) = info.resource_handle() else {
                continue;
            };

            if self.layout_changed {
                for &(subresource, (from, to)) in info.one_time_transitions() {
                    self.one_time_barriers.push(Barrier::Transition {
                        resource: handle,
                        subresource,
                        from,
                        to,
                    });
                }
            }

            if info.needs_aliasing_barrier() {
                if let Some((first, _)) = info.aliasing_lifetime() {
                    self.per_pass_barriers[first].aliasing.push(handle);
                }
            }

            for (pass_name, pass_info) in info.pass_infos() {
                let pass_index = self.graph.index_of_pass(pass_name)?;
                let mut wrote_unordered = false;
                for (subresource, sub) in pass_info.subresources() {
                    if let Some((from, to)) = sub.optimized_transition {
                        self.per_pass_barriers[pass_index].transitions.push(
                            Barrier::Transition {
                                resource: handle,
                                subresource,
                                from,
                                to,
                            },
                        );
                    }
                    if sub.requested_states.contains(ResourceState::UNORDERED_ACCESS) {
                        wrote_unordered = true;
                    }
                }
                if wrote_unordered {
                    self.per_pass_barriers[pass_index]
                        .uav_flushes
                        .push(Barrier::UavFlush { resource: handle });
                }
            }
        }
        Ok(())
    }

    /// The scheduling info for a resource, resolving aliases.
    pub fn scheduling_info(&self, name: &str) -> GraphResult<&SchedulingInfo> {
        let primary = self
            .name_index
            .get(name)
            .ok_or_else(|| GraphError::UnknownResource(name.to_string()))?;
        self.current
            .get(primary)
            .ok_or_else(|| GraphError::UnknownResource(name.to_string()))
    }

    /// The GPU handle for a resource, once allocated or transferred.
    pub fn resource_handle(&self, name: &str) -> GraphResult<ResourceHandle> {
        let info = self.scheduling_info(name)?;
        info.resource_handle().ok_or_else(|| {
            GraphError::Misconfiguration(format!("resource {name} has no GPU allocation yet"))
        })
    }

    /// Size of the heap created for an aliasing group this epoch.
    pub fn heap_size(&self, group: AliasingGroup) -> Option<u64> {
        self.heaps.get(&group).map(|(_, size)| *size)
    }

    pub(crate) fn pass_barriers(&self, pass_index: usize) -> &PassBarrierList {
        &self.per_pass_barriers[pass_index]
    }

    pub(crate) fn one_time_barriers(&self) -> &[Barrier] {
        &self.one_time_barriers
    }

    /// Iterate the current frame's scheduling infos in name order.
    pub fn scheduling_infos(&self) -> impl Iterator<Item = &SchedulingInfo> {
        self.current.values()
    }
}
