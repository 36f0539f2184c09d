//! Error types for the render-graph core.

use std::fmt;

use crate::backend::BackendError;

/// Errors that can occur while scheduling, allocating, or executing a frame.
///
/// Scheduling-time errors are fatal for the frame: the partial scheduling
/// state is discarded by the next `begin_frame` and nothing reaches the GPU.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// A pass name was not found in the pass graph.
    UnknownPass(String),
    /// A resource name was not found in the current frame.
    UnknownResource(String),
    /// `new_texture`/`new_buffer` was called twice for the same name in a frame.
    DuplicateCreation(String),
    /// A requested usage contradicts the resource's declared format.
    IncompatibleUsage { resource: String, detail: String },
    /// Cloning from or aliasing a resource that does not exist.
    MissingDependency { resource: String, dependency: String },
    /// The frame was set up inconsistently (alias cycles, pass list mismatch).
    Misconfiguration(String),
    /// The backend refused to create a heap, resource, or descriptor.
    AllocationFailure {
        resource: String,
        source: BackendError,
    },
    /// The backend failed while recording or submitting command lists.
    ///
    /// Carries the fence value the failed submission would have signaled.
    BackendFailure {
        fence_value: u64,
        source: BackendError,
    },
}

impl fmt::Display for GraphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownPass(name) => write!(f, "unknown pass: {name}"),
            Self::UnknownResource(name) => write!(f, "unknown resource: {name}"),
            Self::DuplicateCreation(name) => {
                write!(f, "resource {name} was already created this frame")
            }
            Self::IncompatibleUsage { resource, detail } => {
                write!(f, "incompatible usage of {resource}: {detail}")
            }
            Self::MissingDependency {
                resource,
                dependency,
            } => write!(f, "{resource} depends on missing resource {dependency}"),
            Self::Misconfiguration(msg) => write!(f, "misconfiguration: {msg}"),
            Self::AllocationFailure { resource, source } => {
                write!(f, "failed to allocate {resource}: {source}")
            }
            Self::BackendFailure {
                fence_value,
                source,
            } => write!(f, "backend failure at fence {fence_value}: {source}"),
        }
    }
}

impl std::error::Error for GraphError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::AllocationFailure { source, .. } | Self::BackendFailure { source, .. } => {
                Some(source)
            }
            _ => None,
        }
    }
}

/// Convenience alias used throughout the crate.
pub type GraphResult<T> = Result<T, GraphError>;
