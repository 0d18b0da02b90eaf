//! Closed set of value kinds a member can produce

use std::fmt;

/// The kind of value a method returns or a field holds.
///
/// Every conversion in the engine is a `match` over this enum, one arm per
/// variant, instead of string comparisons on encoded type tokens.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ReturnKind {
    /// No value
    Void,
    /// 32-bit signed integer
    Int,
    /// 64-bit signed integer
    Long,
    /// Boolean
    Bool,
    /// 64-bit float
    Double,
    /// 8-bit signed integer
    Byte,
    /// 16-bit signed integer
    Short,
    /// UTF-16 code unit
    Char,
    /// 32-bit float
    Float,
    /// Runtime string, converted to Rust text by the runtime
    String,
    /// Any other reference type; carries the declared type name in host form
    /// (`com.example.Foo`, or the descriptor for arrays)
    Object(String),
}

impl ReturnKind {
    /// Whether values of this kind are primitives (neither void nor references).
    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            ReturnKind::Int
                | ReturnKind::Long
                | ReturnKind::Bool
                | ReturnKind::Double
                | ReturnKind::Byte
                | ReturnKind::Short
                | ReturnKind::Char
                | ReturnKind::Float
        )
    }

    /// Whether values of this kind are object references (strings included).
    pub fn is_reference(&self) -> bool {
        matches!(self, ReturnKind::String | ReturnKind::Object(_))
    }
}

impl fmt::Display for ReturnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReturnKind::Void => write!(f, "void"),
            ReturnKind::Int => write!(f, "int"),
            ReturnKind::Long => write!(f, "long"),
            ReturnKind::Bool => write!(f, "boolean"),
            ReturnKind::Double => write!(f, "double"),
            ReturnKind::Byte => write!(f, "byte"),
            ReturnKind::Short => write!(f, "short"),
            ReturnKind::Char => write!(f, "char"),
            ReturnKind::Float => write!(f, "float"),
            ReturnKind::String => write!(f, "java.lang.String"),
            ReturnKind::Object(name) => write!(f, "{}", name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitive_classification() {
        assert!(ReturnKind::Int.is_primitive());
        assert!(ReturnKind::Char.is_primitive());
        assert!(!ReturnKind::Void.is_primitive());
        assert!(!ReturnKind::String.is_primitive());
        assert!(!ReturnKind::Object("a.B".to_string()).is_primitive());
    }

    #[test]
    fn test_reference_classification() {
        assert!(ReturnKind::String.is_reference());
        assert!(ReturnKind::Object("a.B".to_string()).is_reference());
        assert!(!ReturnKind::Bool.is_reference());
    }

    #[test]
    fn test_display_uses_host_names() {
        assert_eq!(ReturnKind::Bool.to_string(), "boolean");
        assert_eq!(ReturnKind::Object("com.example.Foo".to_string()).to_string(), "com.example.Foo");
    }
}
