//! Pass graph: a stable total order over render passes.
//!
//! The graph owns only names, indices, and the per-pass resource references
//! registered during scheduling. Ordering is given by the caller and is
//! assumed topologically valid; the graph never reorders passes.

use std::collections::HashMap;

use crate::error::{GraphError, GraphResult};
use crate::state::ResourceState;

/// One resource reference declared by a pass.
#[derive(Debug, Clone)]
pub struct PassResourceReference {
    pub resource: String,
    pub subresource: u32,
    pub states: ResourceState,
}

/// A pass in the graph: a name, its index, and its declared references.
#[derive(Debug)]
pub struct PassNode {
    name: String,
    index: usize,
    references: Vec<PassResourceReference>,
}

impl PassNode {
    /// The pass name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The pass's position in the execution order.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Resource references registered for this pass.
    pub fn references(&self) -> &[PassResourceReference] {
        &self.references
    }

    /// Check if this pass references a resource by the given name.
    pub fn references_resource(&self, resource: &str) -> bool {
        self.references.iter().any(|r| r.resource == resource)
    }
}

/// The ordered sequence of render passes for one frame layout.
#[derive(Debug, Default)]
pub struct PassGraph {
    passes: Vec<PassNode>,
    name_to_index: HashMap<String, usize>,
}

impl PassGraph {
    /// Create an empty pass graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a pass to the execution order.
    ///
    /// Pass names must be unique within a graph.
    pub fn add_pass(&mut self, name: impl Into<String>) -> GraphResult<usize> {
        let name = name.into();
        if self.name_to_index.contains_key(&name) {
            return Err(GraphError::Misconfiguration(format!(
                "pass {name} added twice"
            )));
        }
        let index = self.passes.len();
        self.name_to_index.insert(name.clone(), index);
        self.passes.push(PassNode {
            name,
            index,
            references: Vec::new(),
        });
        Ok(index)
    }

    /// Look up a pass index by name.
    pub fn index_of_pass(&self, name: &str) -> GraphResult<usize> {
        self.name_to_index
            .get(name)
            .copied()
            .ok_or_else(|| GraphError::UnknownPass(name.to_string()))
    }

    /// Number of passes in the graph.
    pub fn pass_count(&self) -> usize {
        self.passes.len()
    }

    /// The pass at the given index.
    pub fn pass(&self, index: usize) -> &PassNode {
        &self.passes[index]
    }

    /// Iterate passes in execution order.
    pub fn iter(&self) -> impl Iterator<Item = &PassNode> {
        self.passes.iter()
    }

    /// Record that a pass references a resource by the given name.
    ///
    /// Registered during the scheduling phase; drives
    /// [`resource_usage_timeline`](Self::resource_usage_timeline).
    pub(crate) fn register_resource_reference(
        &mut self,
        pass_index: usize,
        resource: impl Into<String>,
        subresource: u32,
        states: ResourceState,
    ) {
        self.passes[pass_index].references.push(PassResourceReference {
            resource: resource.into(),
            subresource,
            states,
        });
    }

    /// The first and last pass indices referencing a resource by this name.
    ///
    /// Returns `None` if no pass references the name.
    pub fn resource_usage_timeline(&self, resource: &str) -> Option<(usize, usize)> {
        let mut timeline: Option<(usize, usize)> = None;
        for pass in &self.passes {
            if pass.references_resource(resource) {
                timeline = Some(match timeline {
                    None => (pass.index, pass.index),
                    Some((first, _)) => (first, pass.index),
                });
            }
        }
        timeline
    }

    /// Forget all registered resource references, keeping the pass order.
    pub(crate) fn clear_resource_references(&mut self) {
        for pass in &mut self.passes {
            pass.references.clear();
        }
    }
}
