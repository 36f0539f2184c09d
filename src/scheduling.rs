//! Per-resource scheduling information.
//!
//! A [`SchedulingInfo`] is the intermediate record every other part of the
//! core communicates through: passes accumulate usage declarations into it
//! during the scheduling phase, the state-transition optimizer and the memory
//! aliaser consume it read-only, and the storage attaches the final GPU
//! allocation to it. It is a mutable builder while the frame is being
//! scheduled and frozen afterwards.

use std::collections::{BTreeMap, HashMap};

use crate::backend::{DescriptorHandle, DescriptorKind, ResourceHandle};
use crate::error::{GraphError, GraphResult};
use crate::format::{PixelFormat, ResourceFormat};
use crate::state::{ResourceState, StatePair};

/// How the resource's memory is expected to be filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UploadStrategy {
    /// The scheduler decides; the resource is a normal aliasing candidate.
    #[default]
    Automatic,
    /// CPU-visible memory written directly; never aliased.
    DirectAccess,
}

/// Requested usage of a single subresource within one pass.
#[derive(Debug, Clone, Default)]
pub struct SubresourceInfo {
    /// Union of all state masks requested for this subresource in this pass.
    pub requested_states: ResourceState,
    /// Format override for typeless resources.
    pub shader_visible_format: Option<PixelFormat>,
    /// Descriptors the pass asked for, in request order.
    pub descriptor_requests: Vec<DescriptorKind>,
    /// Filled in by the optimizer: the transition to apply before the pass.
    pub optimized_transition: Option<StatePair>,
}

/// Per-pass usage record: one [`SubresourceInfo`] per subresource.
#[derive(Debug, Clone)]
pub struct PassInfo {
    subresources: Vec<SubresourceInfo>,
}

impl PassInfo {
    fn new(subresource_count: u32) -> Self {
        Self {
            subresources: vec![SubresourceInfo::default(); subresource_count as usize],
        }
    }

    /// Usage of one subresource, if in range.
    pub fn subresource(&self, index: u32) -> Option<&SubresourceInfo> {
        self.subresources.get(index as usize)
    }

    /// Iterate `(subresource_index, info)` in index order.
    pub fn subresources(&self) -> impl Iterator<Item = (u32, &SubresourceInfo)> {
        self.subresources
            .iter()
            .enumerate()
            .map(|(i, info)| (i as u32, info))
    }
}

/// Whether the GPU allocation for a resource exists yet.
///
/// Scheduling infos start out planned; the storage either allocates them
/// fresh or transfers the previous frame's handle into them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GpuResource {
    /// Not yet backed by GPU memory.
    #[default]
    Planned,
    /// Backed by a live backend allocation.
    Allocated(ResourceHandle),
}

impl GpuResource {
    /// The backend handle, if allocated.
    pub fn handle(self) -> Option<ResourceHandle> {
        match self {
            Self::Planned => None,
            Self::Allocated(handle) => Some(handle),
        }
    }
}

/// The per-resource record driving optimization, aliasing, and allocation.
#[derive(Debug)]
pub struct SchedulingInfo {
    name: String,
    aliases: Vec<String>,
    format: ResourceFormat,
    can_be_aliased: bool,
    persistent: bool,
    upload_strategy: UploadStrategy,
    pass_infos: BTreeMap<String, PassInfo>,
    added_expected_states: ResourceState,
    expected_states: ResourceState,
    aliasing_lifetime: Option<(usize, usize)>,
    one_time_transitions: Vec<(u32, StatePair)>,
    heap_offset: Option<u64>,
    needs_aliasing_barrier: bool,
    resource: GpuResource,
    descriptors: HashMap<(String, u32, DescriptorKind), DescriptorHandle>,
}

impl SchedulingInfo {
    /// Create a planned resource record.
    pub fn new(name: impl Into<String>, format: ResourceFormat) -> Self {
        Self {
            name: name.into(),
            aliases: Vec::new(),
            format,
            can_be_aliased: true,
            persistent: false,
            upload_strategy: UploadStrategy::Automatic,
            pass_infos: BTreeMap::new(),
            added_expected_states: ResourceState::COMMON,
            expected_states: ResourceState::COMMON,
            aliasing_lifetime: None,
            one_time_transitions: Vec::new(),
            heap_offset: None,
            needs_aliasing_barrier: false,
            resource: GpuResource::Planned,
            descriptors: HashMap::new(),
        }
    }

    /// The resource's primary name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Alternate names registered for this resource.
    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    /// The declared format.
    pub fn format(&self) -> &ResourceFormat {
        &self.format
    }

    /// Number of subresources derived from the format.
    pub fn subresource_count(&self) -> u32 {
        self.format.subresource_count()
    }

    /// Merge a usage declaration into the pass's subresource record.
    ///
    /// Accumulation is idempotent: the same state requested twice by the same
    /// or different call sites ORs into the same mask. Fails with
    /// [`GraphError::IncompatibleUsage`] when the requested states or the
    /// format override contradict the declared format.
    pub fn request_subresource_usage(
        &mut self,
        pass: &str,
        subresource: u32,
        states: ResourceState,
        shader_visible_format: Option<PixelFormat>,
    ) -> GraphResult<()> {
        if subresource >= self.subresource_count() {
            return Err(GraphError::IncompatibleUsage {
                resource: self.name.clone(),
                detail: format!(
                    "subresource {subresource} out of range (count {})",
                    self.subresource_count()
                ),
            });
        }
        self.validate_states(states)?;
        if shader_visible_format.is_some() {
            match self.format.pixel_format() {
                Some(declared) if declared.is_typeless() => {}
                _ => {
                    return Err(GraphError::IncompatibleUsage {
                        resource: self.name.clone(),
                        detail: "format override requires a typeless declared format".to_string(),
                    })
                }
            }
        }

        let count = self.subresource_count();
        let pass_info = self
            .pass_infos
            .entry(pass.to_string())
            .or_insert_with(|| PassInfo::new(count));
        let sub = &mut pass_info.subresources[subresource as usize];
        sub.requested_states |= states;
        if let Some(format) = shader_visible_format {
            match sub.shader_visible_format {
                Some(existing) if existing != format => {
                    return Err(GraphError::IncompatibleUsage {
                        resource: self.name.clone(),
                        detail: format!(
                            "conflicting shader-visible formats {existing:?} and {format:?}"
                        ),
                    })
                }
                _ => sub.shader_visible_format = Some(format),
            }
        }
        self.expected_states |= states;
        Ok(())
    }

    fn validate_states(&self, states: ResourceState) -> GraphResult<()> {
        let incompatible = |detail: String| GraphError::IncompatibleUsage {
            resource: self.name.clone(),
            detail,
        };
        if states.contains(ResourceState::UNORDERED_ACCESS)
            && !self.format.allows_unordered_access()
        {
            return Err(incompatible(
                "unordered access requested on a format without UA capability".to_string(),
            ));
        }
        match &self.format {
            ResourceFormat::Texture(tex) => {
                if states.contains(ResourceState::RENDER_TARGET) && !tex.is_render_target {
                    return Err(incompatible(
                        "render-target write on a non-render-target format".to_string(),
                    ));
                }
                if states.intersects(ResourceState::DEPTH_WRITE | ResourceState::DEPTH_READ)
                    && !tex.is_depth_stencil
                {
                    return Err(incompatible(
                        "depth-stencil access on a non-depth-stencil format".to_string(),
                    ));
                }
            }
            ResourceFormat::Buffer(_) => {
                if states.intersects(
                    ResourceState::RENDER_TARGET
                        | ResourceState::DEPTH_WRITE
                        | ResourceState::DEPTH_READ,
                ) {
                    return Err(incompatible(
                        "render-target or depth-stencil access on a buffer".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Ask for a descriptor of the given kind for `(pass, subresource)`.
    pub fn request_descriptor(&mut self, pass: &str, subresource: u32, kind: DescriptorKind) {
        let count = self.subresource_count();
        let pass_info = self
            .pass_infos
            .entry(pass.to_string())
            .or_insert_with(|| PassInfo::new(count));
        if let Some(sub) = pass_info.subresources.get_mut(subresource as usize) {
            if !sub.descriptor_requests.contains(&kind) {
                sub.descriptor_requests.push(kind);
            }
        }
    }

    /// Widen the resource-wide capability beyond what passes requested.
    pub fn add_expected_states(&mut self, states: ResourceState) {
        self.added_expected_states |= states;
        self.expected_states |= states;
    }

    /// Recompute the resource-wide capability from every per-pass mask plus
    /// any explicitly added states.
    pub fn apply_expected_states(&mut self) {
        let mut states = self.added_expected_states;
        for pass_info in self.pass_infos.values() {
            for sub in &pass_info.subresources {
                states |= sub.requested_states;
            }
        }
        self.expected_states = states;
    }

    /// Union of every state ever requested; sizes the backend allocation.
    pub fn expected_states(&self) -> ResourceState {
        self.expected_states
    }

    /// Register an alternate name for this resource.
    pub fn add_name_alias(&mut self, alias: impl Into<String>) {
        let alias = alias.into();
        if !self.aliases.contains(&alias) {
            self.aliases.push(alias);
        }
    }

    /// Exclude this resource from aliasing permanently.
    pub fn mark_persistent(&mut self) {
        self.persistent = true;
    }

    /// Check if the resource was marked persistent.
    pub fn is_persistent(&self) -> bool {
        self.persistent
    }

    /// Set how the resource's memory is filled.
    pub fn set_upload_strategy(&mut self, strategy: UploadStrategy) {
        self.upload_strategy = strategy;
    }

    /// The configured upload strategy.
    pub fn upload_strategy(&self) -> UploadStrategy {
        self.upload_strategy
    }

    /// Whether the resource may share heap memory with others.
    ///
    /// Direct-access and persistent resources own committed allocations.
    pub fn can_be_aliased(&self) -> bool {
        self.can_be_aliased
            && !self.persistent
            && self.upload_strategy != UploadStrategy::DirectAccess
    }

    /// Per-pass usage records keyed by pass name, in name order.
    pub fn pass_infos(&self) -> impl Iterator<Item = (&str, &PassInfo)> {
        self.pass_infos.iter().map(|(name, info)| (name.as_str(), info))
    }

    /// The usage record for one pass, if the pass touches this resource.
    pub fn pass_info(&self, pass: &str) -> Option<&PassInfo> {
        self.pass_infos.get(pass)
    }

    /// Check if any pass references this resource.
    pub fn is_used(&self) -> bool {
        !self.pass_infos.is_empty()
    }

    /// Closed interval of pass indices during which contents must survive.
    pub fn aliasing_lifetime(&self) -> Option<(usize, usize)> {
        self.aliasing_lifetime
    }

    pub(crate) fn set_aliasing_lifetime(&mut self, lifetime: (usize, usize)) {
        debug_assert!(lifetime.0 <= lifetime.1);
        self.aliasing_lifetime = Some(lifetime);
    }

    /// Initial transitions out of `Common`, one per used subresource.
    ///
    /// Emitted as a single batch at the start of a layout epoch.
    pub fn one_time_transitions(&self) -> &[(u32, StatePair)] {
        &self.one_time_transitions
    }

    pub(crate) fn push_one_time_transition(&mut self, subresource: u32, pair: StatePair) {
        self.one_time_transitions.push((subresource, pair));
    }

    pub(crate) fn set_optimized_transition(
        &mut self,
        pass: &str,
        subresource: u32,
        pair: StatePair,
    ) {
        if let Some(pass_info) = self.pass_infos.get_mut(pass) {
            if let Some(sub) = pass_info.subresources.get_mut(subresource as usize) {
                sub.optimized_transition = Some(pair);
            }
        }
    }

    pub(crate) fn clear_optimization(&mut self) {
        self.one_time_transitions.clear();
        for pass_info in self.pass_infos.values_mut() {
            for sub in &mut pass_info.subresources {
                sub.optimized_transition = None;
            }
        }
    }

    /// Offset within the aliasing group's heap, when placed.
    pub fn heap_offset(&self) -> Option<u64> {
        self.heap_offset
    }

    pub(crate) fn set_heap_offset(&mut self, offset: u64) {
        self.heap_offset = Some(offset);
    }

    /// Whether an aliasing barrier must precede this resource's first use.
    pub fn needs_aliasing_barrier(&self) -> bool {
        self.needs_aliasing_barrier
    }

    pub(crate) fn set_needs_aliasing_barrier(&mut self, needs: bool) {
        self.needs_aliasing_barrier = needs;
    }

    pub(crate) fn copy_aliasing_placement(&mut self, other: &SchedulingInfo) {
        self.heap_offset = other.heap_offset;
        self.needs_aliasing_barrier = other.needs_aliasing_barrier;
    }

    /// The GPU allocation state.
    pub fn gpu_resource(&self) -> GpuResource {
        self.resource
    }

    /// The backend handle, if the resource has been allocated.
    pub fn resource_handle(&self) -> Option<ResourceHandle> {
        self.resource.handle()
    }

    pub(crate) fn attach_resource(&mut self, handle: ResourceHandle) {
        self.resource = GpuResource::Allocated(handle);
    }

    pub(crate) fn take_resource(&mut self) -> GpuResource {
        std::mem::take(&mut self.resource)
    }

    /// Look up an allocated descriptor.
    pub fn descriptor(
        &self,
        pass: &str,
        subresource: u32,
        kind: DescriptorKind,
    ) -> Option<DescriptorHandle> {
        self.descriptors
            .get(&(pass.to_string(), subresource, kind))
            .copied()
    }

    pub(crate) fn attach_descriptor(
        &mut self,
        pass: &str,
        subresource: u32,
        kind: DescriptorKind,
        handle: DescriptorHandle,
    ) {
        self.descriptors
            .insert((pass.to_string(), subresource, kind), handle);
    }

    pub(crate) fn take_descriptors(
        &mut self,
    ) -> HashMap<(String, u32, DescriptorKind), DescriptorHandle> {
        std::mem::take(&mut self.descriptors)
    }

    pub(crate) fn set_descriptors(
        &mut self,
        descriptors: HashMap<(String, u32, DescriptorKind), DescriptorHandle>,
    ) {
        self.descriptors = descriptors;
    }
}
