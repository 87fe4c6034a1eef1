//! Graphics error types.

use thiserror::Error;

use crate::types::TextureFormat;

/// Errors that can occur in the graphics system.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GraphicsError {
    /// A buffer, texture or other GPU object could not be created.
    #[error("failed to create '{label}' ({size} bytes{}): {reason}", format_suffix(.format))]
    ResourceCreation {
        label: String,
        size: u64,
        format: Option<TextureFormat>,
        reason: String,
    },
    /// A descriptor table or linear allocator has no room left.
    #[error("{resource} capacity exceeded: requested {requested}, {used} of {capacity} in use")]
    CapacityExceeded {
        resource: &'static str,
        requested: u64,
        used: u64,
        capacity: u64,
    },
    /// Memory still referenced by the GPU was about to be reused.
    #[error("{resource} reused before fence {required} completed (completed value: {completed})")]
    SynchronizationViolation {
        resource: &'static str,
        required: u64,
        completed: u64,
    },
    /// The GPU device was lost. Nothing submitted afterwards will run.
    #[error("GPU device lost")]
    DeviceLost,
    /// An invalid parameter was provided.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    /// A named object was not found in a registry.
    #[error("{kind} '{name}' not found")]
    NotFound { kind: &'static str, name: String },
}

fn format_suffix(format: &Option<TextureFormat>) -> String {
    match format {
        Some(format) => format!(", format {format:?}"),
        None => String::new(),
    }
}

impl GraphicsError {
    /// Returns true for errors after which the device cannot be used.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::DeviceLost)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = GraphicsError::DeviceLost;
        assert_eq!(err.to_string(), "GPU device lost");

        let err = GraphicsError::InvalidParameter("buffer size cannot be zero".to_string());
        assert_eq!(
            err.to_string(),
            "invalid parameter: buffer size cannot be zero"
        );
    }

    #[test]
    fn test_resource_creation_carries_size_and_format() {
        let err = GraphicsError::ResourceCreation {
            label: "depth".into(),
            size: 4096,
            format: Some(TextureFormat::Depth32Float),
            reason: "out of memory".into(),
        };
        assert_eq!(
            err.to_string(),
            "failed to create 'depth' (4096 bytes, format Depth32Float): out of memory"
        );

        let err = GraphicsError::ResourceCreation {
            label: "vertices".into(),
            size: 64,
            format: None,
            reason: "out of memory".into(),
        };
        assert_eq!(
            err.to_string(),
            "failed to create 'vertices' (64 bytes): out of memory"
        );
    }

    #[test]
    fn test_capacity_exceeded_display() {
        let err = GraphicsError::CapacityExceeded {
            resource: "linear allocator",
            requested: 100,
            used: 228,
            capacity: 256,
        };
        assert_eq!(
            err.to_string(),
            "linear allocator capacity exceeded: requested 100, 228 of 256 in use"
        );
        assert!(!err.is_fatal());
        assert!(GraphicsError::DeviceLost.is_fatal());
    }
}
