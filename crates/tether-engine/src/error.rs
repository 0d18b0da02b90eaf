//! Error types for the bridge engine

use tether_sdk::RuntimeError;

use crate::instruction::ParseError;
use crate::signature::DescriptorError;

/// Result type for engine operations
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Errors raised while discovering members or evaluating an instruction.
///
/// Discovery-time errors (`Descriptor`, `ResolutionFailure`) are local: the
/// offending member is skipped and discovery continues. Every other variant
/// aborts the current evaluation only; the cache is left intact.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BridgeError {
    /// Malformed type descriptor reported by the runtime
    #[error(transparent)]
    Descriptor(#[from] DescriptorError),

    /// Member exists but binds neither as instance nor as static member
    #[error("Cannot resolve {type_name}.{member}{signature} as instance or static member")]
    ResolutionFailure {
        /// Type the resolution was attempted against
        type_name: String,
        /// Member name
        member: String,
        /// Full signature that was looked up
        signature: String,
    },

    /// A hop's key is absent after discovery
    #[error("Member not found: {type_name}.{member}")]
    MemberNotFound {
        /// Concrete type of the receiver
        type_name: String,
        /// Member name
        member: String,
    },

    /// The runtime raised a fault during a call; the fault has been cleared
    #[error("Fault in {member}: {description}")]
    InvocationFault {
        /// Member key (`Type.name`)
        member: String,
        /// Fault description reported by the runtime
        description: String,
    },

    /// Result could not be converted to the declared kind
    #[error("Cannot convert result of {member}: expected {expected}, got {got}")]
    Conversion {
        /// Member key (`Type.name`)
        member: String,
        /// Declared kind
        expected: String,
        /// Kind actually produced
        got: String,
    },

    /// Malformed instruction text
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// No overload accepts the supplied arguments
    #[error("No overload of {member} accepts ({args})")]
    NoMatchingOverload {
        /// Member key (`Type.name`)
        member: String,
        /// Supplied arguments, comma separated
        args: String,
    },

    /// A hop returned null but further hops remain
    #[error("{member} returned null; cannot continue the chain")]
    NullReceiver {
        /// Member key (`Type.name`)
        member: String,
    },

    /// A hop returned a non-object value but further hops remain
    #[error("{member} returned {kind}; cannot continue the chain")]
    NotAReceiver {
        /// Member key (`Type.name`)
        member: String,
        /// Kind of the returned value
        kind: String,
    },

    /// Root label or handle is not registered
    #[error("Unknown root: {0}")]
    UnknownRoot(String),

    /// Runtime error outside of a member invocation
    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    /// The bridge worker thread is gone
    #[error("Bridge worker disconnected")]
    Disconnected,
}

impl BridgeError {
    /// Whether this error is local to discovery (the member is skipped).
    pub fn is_discovery_local(&self) -> bool {
        matches!(
            self,
            BridgeError::Descriptor(_) | BridgeError::ResolutionFailure { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_member_not_found() {
        let err = BridgeError::MemberNotFound {
            type_name: "com.example.Root".to_string(),
            member: "missing".to_string(),
        };
        assert_eq!(err.to_string(), "Member not found: com.example.Root.missing");
    }

    #[test]
    fn test_discovery_local_classification() {
        let err = BridgeError::from(DescriptorError::Empty);
        assert!(err.is_discovery_local());
        assert!(!BridgeError::Disconnected.is_discovery_local());
    }
}
