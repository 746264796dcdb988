//! Error types for merger resolving
//!
//! Every stage of the pipeline reports failures through [`ResolveError`].
//! Plugins report through [`PluginError`], which the core wraps together
//! with the frame/node context it was processing.

use std::fmt;

/// Errors that can occur while resolving mergers
#[derive(Debug, Clone)]
pub enum ResolveError {
    /// Input model or result could not be interpreted
    MalformedModel {
        /// Description of the malformed input
        description: String,
    },

    /// Upstream data violates an invariant the pipeline relies on
    InvariantViolation {
        /// Description of the violated invariant
        description: String,
    },

    /// An external plugin call failed
    PluginFailure {
        /// Name of the failing plugin
        plugin: String,
        /// Where the call happened (frame, node, requested count)
        context: String,
        /// Error reported by the plugin
        source: PluginError,
    },

    /// The residual flow network contains a negative-cost cycle
    NegativeCycle {
        /// Number of nodes in the flow network
        num_nodes: usize,
    },

    /// File system or encoding failure outside the core
    Io {
        /// Path being read or written
        path: String,
        /// Description of the failure
        description: String,
    },
}

impl ResolveError {
    /// Shorthand for [`ResolveError::MalformedModel`]
    pub fn malformed(description: impl Into<String>) -> Self {
        ResolveError::MalformedModel {
            description: description.into(),
        }
    }

    /// Shorthand for [`ResolveError::InvariantViolation`]
    pub fn invariant(description: impl Into<String>) -> Self {
        ResolveError::InvariantViolation {
            description: description.into(),
        }
    }

    /// Wrap a plugin error with the context of the failing call
    pub fn plugin(
        plugin: impl Into<String>,
        context: impl Into<String>,
        source: PluginError,
    ) -> Self {
        ResolveError::PluginFailure {
            plugin: plugin.into(),
            context: context.into(),
            source,
        }
    }
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolveError::MalformedModel { description } => {
                write!(f, "Malformed model: {}", description)
            }
            ResolveError::InvariantViolation { description } => {
                write!(f, "Invariant violation: {}", description)
            }
            ResolveError::PluginFailure {
                plugin,
                context,
                source,
            } => {
                write!(f, "Plugin '{}' failed ({}): {}", plugin, context, source)
            }
            ResolveError::NegativeCycle { num_nodes } => {
                write!(
                    f,
                    "Flow network with {} nodes contains a negative-cost cycle",
                    num_nodes
                )
            }
            ResolveError::Io { path, description } => {
                write!(f, "I/O error for '{}': {}", path, description)
            }
        }
    }
}

impl std::error::Error for ResolveError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ResolveError::PluginFailure { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Errors reported by plugin implementations
#[derive(Debug, Clone)]
pub enum PluginError {
    /// Requested frame is not available
    FrameUnavailable {
        /// Frame index
        timestep: usize,
    },

    /// Label does not occur in the label image
    LabelNotFound {
        /// Missing label
        label: u32,
    },

    /// Image data has an unsupported shape or type
    UnsupportedImage {
        /// Description of the problem
        description: String,
    },

    /// Any other plugin specific failure
    Failed {
        /// Description of the failure
        description: String,
    },
}

impl fmt::Display for PluginError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PluginError::FrameUnavailable { timestep } => {
                write!(f, "frame {} is not available", timestep)
            }
            PluginError::LabelNotFound { label } => {
                write!(f, "label {} not found in label image", label)
            }
            PluginError::UnsupportedImage { description } => {
                write!(f, "unsupported image: {}", description)
            }
            PluginError::Failed { description } => write!(f, "{}", description),
        }
    }
}

impl std::error::Error for PluginError {}

impl From<serde_json::Error> for ResolveError {
    fn from(e: serde_json::Error) -> Self {
        ResolveError::malformed(format!("invalid JSON: {}", e))
    }
}
