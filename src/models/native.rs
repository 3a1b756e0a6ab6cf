//! Native Generation Port
//!
//! The capability boundary to a native text-generation library. Load and
//! unload come in pairs around a [`ModelHandle`]; the zero handle is the
//! sentinel the native layer returns when a load did not produce a model.
//!
//! Implementations are called from the blocking thread pool. They must be
//! safe for concurrent `generate_text` calls on one loaded handle, but are
//! never called concurrently with `load_model`/`unload_model`; the
//! [`ModelAccessGate`](super::gate::ModelAccessGate) guarantees that.

use std::fmt;

use crate::error::NativeError;

/// Opaque token naming a loaded native model instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ModelHandle(i64);

impl ModelHandle {
    /// "No model loaded."
    pub const SENTINEL: ModelHandle = ModelHandle(0);

    pub const fn from_raw(raw: i64) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> i64 {
        self.0
    }

    pub const fn is_sentinel(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for ModelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

pub trait NativeGenerationPort: Send + Sync {
    /// Load the model at `path`. Returning [`ModelHandle::SENTINEL`] or an
    /// error are both load failures.
    fn load_model(&self, path: &str) -> Result<ModelHandle, NativeError>;

    fn generate_text(&self, handle: ModelHandle, prompt: &str) -> Result<String, NativeError>;

    fn unload_model(&self, handle: ModelHandle) -> Result<(), NativeError>;

    fn model_info(&self, handle: ModelHandle) -> String;

    fn is_model_loaded(&self, handle: ModelHandle) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[allow(dead_code)]
    fn assert_object_safe(_: &dyn NativeGenerationPort) {}

    #[test]
    fn test_sentinel_is_zero() {
        assert!(ModelHandle::SENTINEL.is_sentinel());
        assert!(ModelHandle::default().is_sentinel());
        assert!(!ModelHandle::from_raw(1).is_sentinel());
        assert_eq!(ModelHandle::from_raw(255).to_string(), "0xff");
    }
}
