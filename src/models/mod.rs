pub mod gate;
pub mod mock_native;
pub mod native;
pub mod remote;
pub mod router;
pub mod sanitizer;
pub mod traits;

#[cfg(feature = "native-ffi")]
pub mod ffi;

pub use gate::{GateStatus, ModelAccessGate};
pub use mock_native::EnhancedMockPort;
pub use native::{ModelHandle, NativeGenerationPort};
pub use remote::RemoteBackendClient;
pub use router::{RemoteFailurePolicy, RequestRouter, RoutedGeneration, ServiceMode, ServiceStatus};
pub use sanitizer::PromptSanitizer;
pub use traits::TextBackend;

#[cfg(feature = "native-ffi")]
pub use ffi::FfiLlamaPort;

use std::sync::Arc;

/// The native port compiled into this build: the shim binding with the
/// `native-ffi` feature, the enhanced mock otherwise.
pub fn default_native_port() -> Arc<dyn NativeGenerationPort> {
    #[cfg(feature = "native-ffi")]
    {
        tracing::info!("🔗 Using native llama shim binding");
        Arc::new(FfiLlamaPort::new())
    }

    #[cfg(not(feature = "native-ffi"))]
    {
        tracing::info!("🧪 Using enhanced mock native port");
        Arc::new(EnhancedMockPort::new())
    }
}
