//! Error types reported by foreign runtime implementations

/// Result type for foreign runtime calls
pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// Errors a [`ForeignRuntime`](crate::ForeignRuntime) implementation can report.
///
/// A `Fault` means the runtime now holds a pending fault (an exception in JVM
/// terms). The caller must clear it with
/// [`take_fault`](crate::ForeignRuntime::take_fault) before issuing any other
/// call.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RuntimeError {
    /// The runtime raised a fault during the call
    #[error("Runtime fault: {0}")]
    Fault(String),

    /// A call was issued while a previous fault was still pending
    #[error("Call issued with a pending fault")]
    FaultPending,

    /// The requested type, member, or field does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// A value had the wrong shape for the requested operation
    #[error("Type mismatch: expected {expected}, got {got}")]
    TypeMismatch {
        /// Expected kind
        expected: String,
        /// Actual kind
        got: String,
    },

    /// The connection to the runtime is unusable (detached thread, dead VM)
    #[error("Runtime unavailable: {0}")]
    Unavailable(String),
}

impl RuntimeError {
    /// Whether this error left a fault pending in the runtime.
    pub fn is_fault(&self) -> bool {
        matches!(self, RuntimeError::Fault(_))
    }
}

impl From<String> for RuntimeError {
    fn from(s: String) -> Self {
        RuntimeError::Fault(s)
    }
}

impl From<&str> for RuntimeError {
    fn from(s: &str) -> Self {
        RuntimeError::Fault(s.to_string())
    }
}
