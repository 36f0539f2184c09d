//! Pass-author scheduling surface.
//!
//! Passes receive a [`ResourceScheduler`] during the scheduling phase and use
//! it to create transient resources and to declare how they will access them.
//! Nothing happens immediately: every call queues a creation request or a
//! configurator closure on the storage, and the whole batch is materialized
//! deterministically at end-of-scheduling (creations first, then clones, then
//! configurators in declaration order).

use crate::backend::DescriptorKind;
use crate::error::GraphResult;
use crate::format::{BufferProperties, PixelFormat, ResourceFormat, TextureProperties};
use crate::scheduling::{SchedulingInfo, UploadStrategy};
use crate::state::ResourceState;
use crate::storage::ResourceStorage;

/// A deferred mutation of a scheduling info, run once creations resolve.
pub(crate) type Configurator = Box<dyn FnOnce(&mut SchedulingInfo) -> GraphResult<()>>;

/// The scheduling surface handed to a pass.
///
/// Valid only for the duration of the pass's `schedule` callback.
pub struct ResourceScheduler<'a> {
    storage: &'a mut ResourceStorage,
    pass: String,
}

impl<'a> ResourceScheduler<'a> {
    pub(crate) fn new(storage: &'a mut ResourceStorage, pass: impl Into<String>) -> Self {
        Self {
            storage,
            pass: pass.into(),
        }
    }

    /// The pass this scheduler belongs to.
    pub fn pass_name(&self) -> &str {
        &self.pass
    }

    /// Request creation of a transient texture.
    pub fn new_texture(&mut self, name: &str, properties: TextureProperties) {
        self.storage
            .enqueue_primary_creation(name, ResourceFormat::Texture(properties));
    }

    /// Request creation of a transient buffer.
    pub fn new_buffer(&mut self, name: &str, properties: BufferProperties) {
        self.storage
            .enqueue_primary_creation(name, ResourceFormat::Buffer(properties));
    }

    /// Request creation of a resource whose format copies another's.
    ///
    /// The source must exist by end-of-scheduling or the frame fails with
    /// `MissingDependency`.
    pub fn clone_resource(&mut self, name: &str, source: &str) {
        self.storage.enqueue_clone(name, source);
    }

    /// Register `alias` as an alternate name for `original` and read it.
    ///
    /// Alias chains resolve transitively; a cycle is a misconfiguration.
    pub fn read_alias(&mut self, original: &str, alias: &str) {
        self.storage.register_alias(alias, original);
        self.declare(
            alias,
            0,
            ResourceState::SHADER_RESOURCE,
            Some(DescriptorKind::ShaderResource),
            None,
        );
    }

    /// Declare a shader-resource read of subresource 0.
    pub fn will_read(&mut self, name: &str) {
        self.declare(
            name,
            0,
            ResourceState::SHADER_RESOURCE,
            Some(DescriptorKind::ShaderResource),
            None,
        );
    }

    /// Declare a shader-resource read of a specific subresource.
    pub fn will_read_subresource(&mut self, name: &str, subresource: u32) {
        self.declare(
            name,
            subresource,
            ResourceState::SHADER_RESOURCE,
            Some(DescriptorKind::ShaderResource),
            None,
        );
    }

    /// Declare a shader-resource read through a format override.
    ///
    /// Only valid for resources declared with a typeless format.
    pub fn will_read_as(&mut self, name: &str, view_format: PixelFormat) {
        self.declare(
            name,
            0,
            ResourceState::SHADER_RESOURCE,
            Some(DescriptorKind::ShaderResource),
            Some(view_format),
        );
    }

    /// Declare a render-target write of mip 0.
    pub fn will_write_rt(&mut self, name: &str) {
        self.declare(
            name,
            0,
            ResourceState::RENDER_TARGET,
            Some(DescriptorKind::RenderTarget),
            None,
        );
    }

    /// Declare a render-target write of a specific mip.
    pub fn will_write_rt_mip(&mut self, name: &str, mip: u32) {
        self.declare(
            name,
            mip,
            ResourceState::RENDER_TARGET,
            Some(DescriptorKind::RenderTarget),
            None,
        );
    }

    /// Declare a depth-stencil write.
    pub fn will_write_ds(&mut self, name: &str) {
        self.declare(
            name,
            0,
            ResourceState::DEPTH_WRITE,
            Some(DescriptorKind::DepthStencil),
            None,
        );
    }

    /// Declare a read-only depth-stencil use.
    pub fn will_read_ds(&mut self, name: &str) {
        self.declare(
            name,
            0,
            ResourceState::DEPTH_READ,
            Some(DescriptorKind::DepthStencil),
            None,
        );
    }

    /// Declare an unordered-access write of mip 0.
    pub fn will_write_ua(&mut self, name: &str) {
        self.declare(
            name,
            0,
            ResourceState::UNORDERED_ACCESS,
            Some(DescriptorKind::UnorderedAccess),
            None,
        );
    }

    /// Declare an unordered-access write of a specific mip.
    pub fn will_write_ua_mip(&mut self, name: &str, mip: u32) {
        self.declare(
            name,
            mip,
            ResourceState::UNORDERED_ACCESS,
            Some(DescriptorKind::UnorderedAccess),
            None,
        );
    }

    /// Declare the resource as the source of a copy.
    pub fn will_copy_from(&mut self, name: &str) {
        self.declare(name, 0, ResourceState::COPY_SOURCE, None, None);
    }

    /// Declare the resource as the destination of a copy.
    pub fn will_copy_to(&mut self, name: &str) {
        self.declare(name, 0, ResourceState::COPY_DEST, None, None);
    }

    /// Exclude a resource from aliasing for its whole life.
    pub fn mark_persistent(&mut self, name: &str) {
        self.configure(name, |info| {
            info.mark_persistent();
            Ok(())
        });
    }

    /// Choose how the resource's memory is filled.
    pub fn set_upload_strategy(&mut self, name: &str, strategy: UploadStrategy) {
        self.configure(name, move |info| {
            info.set_upload_strategy(strategy);
            Ok(())
        });
    }

    /// Queue an arbitrary configurator against a resource.
    ///
    /// The closure runs after all creation requests have resolved, in
    /// declaration order, and marks the resource as referenced by this pass.
    pub fn use_resource(
        &mut self,
        name: &str,
        configurator: impl FnOnce(&mut SchedulingInfo) -> GraphResult<()> + 'static,
    ) {
        self.storage.enqueue_usage(
            self.pass.clone(),
            name,
            vec![(0, ResourceState::COMMON)],
            true,
            Box::new(configurator),
        );
    }

    fn declare(
        &mut self,
        name: &str,
        subresource: u32,
        states: ResourceState,
        descriptor: Option<DescriptorKind>,
        view_format: Option<PixelFormat>,
    ) {
        let pass = self.pass.clone();
        let configurator: Configurator = Box::new(move |info| {
            info.request_subresource_usage(&pass, subresource, states, view_format)?;
            if let Some(kind) = descriptor {
                info.request_descriptor(&pass, subresource, kind);
            }
            Ok(())
        });
        self.storage.enqueue_usage(
            self.pass.clone(),
            name,
            vec![(subresource, states)],
            true,
            configurator,
        );
    }

    /// Queue a configurator that does not count as a pass reference.
    fn configure(
        &mut self,
        name: &str,
        configurator: impl FnOnce(&mut SchedulingInfo) -> GraphResult<()> + 'static,
    ) {
        self.storage.enqueue_usage(
            self.pass.clone(),
            name,
            Vec::new(),
            false,
            Box::new(configurator),
        );
    }
}
