//! NativeValue - values crossing the runtime boundary
//!
//! Primitives and strings are copied out of the foreign runtime into Rust
//! values. References stay opaque: `O` is the runtime's own object reference
//! type, only meaningful when handed back to the same runtime.

use crate::kind::ReturnKind;

/// A value produced by, or passed into, a foreign runtime call.
#[derive(Debug, Clone, PartialEq)]
pub enum NativeValue<O> {
    /// Result of a `void` call
    Void,
    /// Null reference
    Null,
    /// Boolean
    Bool(bool),
    /// 8-bit signed integer
    Byte(i8),
    /// 16-bit signed integer
    Short(i16),
    /// UTF-16 code unit
    Char(u16),
    /// 32-bit signed integer
    Int(i32),
    /// 64-bit signed integer
    Long(i64),
    /// 32-bit float
    Float(f32),
    /// 64-bit float
    Double(f64),
    /// Runtime string, already decoded
    Str(String),
    /// Opaque object reference
    Object(O),
}

impl<O> NativeValue<O> {
    /// Check if value is null
    pub fn is_null(&self) -> bool {
        matches!(self, NativeValue::Null)
    }

    /// Check if value is void
    pub fn is_void(&self) -> bool {
        matches!(self, NativeValue::Void)
    }

    /// Extract boolean value
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            NativeValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Extract an integer of any width, sign-extended to i64
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            NativeValue::Byte(v) => Some(i64::from(*v)),
            NativeValue::Short(v) => Some(i64::from(*v)),
            NativeValue::Int(v) => Some(i64::from(*v)),
            NativeValue::Long(v) => Some(*v),
            _ => None,
        }
    }

    /// Extract a floating point value of either width
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            NativeValue::Float(v) => Some(f64::from(*v)),
            NativeValue::Double(v) => Some(*v),
            _ => None,
        }
    }

    /// Borrow the string payload
    pub fn as_str(&self) -> Option<&str> {
        match self {
            NativeValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Borrow the object reference
    pub fn as_object(&self) -> Option<&O> {
        match self {
            NativeValue::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Take the object reference
    pub fn into_object(self) -> Option<O> {
        match self {
            NativeValue::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Get type name for diagnostics
    pub fn type_name(&self) -> &'static str {
        match self {
            NativeValue::Void => "void",
            NativeValue::Null => "null",
            NativeValue::Bool(_) => "boolean",
            NativeValue::Byte(_) => "byte",
            NativeValue::Short(_) => "short",
            NativeValue::Char(_) => "char",
            NativeValue::Int(_) => "int",
            NativeValue::Long(_) => "long",
            NativeValue::Float(_) => "float",
            NativeValue::Double(_) => "double",
            NativeValue::Str(_) => "string",
            NativeValue::Object(_) => "object",
        }
    }

    /// Whether this value can be produced by a member of the given kind.
    ///
    /// Null is accepted for every reference kind.
    pub fn fits(&self, kind: &ReturnKind) -> bool {
        match (self, kind) {
            (NativeValue::Void, ReturnKind::Void) => true,
            (NativeValue::Bool(_), ReturnKind::Bool) => true,
            (NativeValue::Byte(_), ReturnKind::Byte) => true,
            (NativeValue::Short(_), ReturnKind::Short) => true,
            (NativeValue::Char(_), ReturnKind::Char) => true,
            (NativeValue::Int(_), ReturnKind::Int) => true,
            (NativeValue::Long(_), ReturnKind::Long) => true,
            (NativeValue::Float(_), ReturnKind::Float) => true,
            (NativeValue::Double(_), ReturnKind::Double) => true,
            (NativeValue::Str(_), ReturnKind::String) => true,
            (NativeValue::Object(_), ReturnKind::Object(_)) => true,
            (NativeValue::Null, k) => k.is_reference(),
            _ => false,
        }
    }
}

impl<O> Default for NativeValue<O> {
    fn default() -> Self {
        NativeValue::Null
    }
}

impl<O> From<bool> for NativeValue<O> {
    fn from(b: bool) -> Self {
        NativeValue::Bool(b)
    }
}

impl<O> From<i32> for NativeValue<O> {
    fn from(i: i32) -> Self {
        NativeValue::Int(i)
    }
}

impl<O> From<i64> for NativeValue<O> {
    fn from(i: i64) -> Self {
        NativeValue::Long(i)
    }
}

impl<O> From<f64> for NativeValue<O> {
    fn from(f: f64) -> Self {
        NativeValue::Double(f)
    }
}

impl<O> From<String> for NativeValue<O> {
    fn from(s: String) -> Self {
        NativeValue::Str(s)
    }
}

impl<O> From<&str> for NativeValue<O> {
    fn from(s: &str) -> Self {
        NativeValue::Str(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Value = NativeValue<u32>;

    #[test]
    fn test_null_and_void() {
        let null = Value::Null;
        assert!(null.is_null());
        assert!(!null.is_void());
        assert!(Value::Void.is_void());
        assert!(Value::default().is_null());
    }

    #[test]
    fn test_integer_widening() {
        assert_eq!(Value::Byte(-3).as_i64(), Some(-3));
        assert_eq!(Value::Short(300).as_i64(), Some(300));
        assert_eq!(Value::Int(42).as_i64(), Some(42));
        assert_eq!(Value::Long(9_999_999_999).as_i64(), Some(9_999_999_999));
        assert_eq!(Value::Bool(true).as_i64(), None);
    }

    #[test]
    fn test_object_extraction() {
        let v = Value::Object(7);
        assert_eq!(v.as_object(), Some(&7));
        assert_eq!(v.into_object(), Some(7));
        assert_eq!(Value::Null.into_object(), None);
    }

    #[test]
    fn test_fits_kind() {
        assert!(Value::Int(1).fits(&ReturnKind::Int));
        assert!(!Value::Int(1).fits(&ReturnKind::Long));
        assert!(Value::Null.fits(&ReturnKind::String));
        assert!(Value::Null.fits(&ReturnKind::Object("a.B".into())));
        assert!(!Value::Null.fits(&ReturnKind::Int));
        assert!(Value::Str("x".into()).fits(&ReturnKind::String));
    }

    #[test]
    fn test_from_conversions() {
        assert_eq!(Value::from(true), Value::Bool(true));
        assert_eq!(Value::from(5i32), Value::Int(5));
        assert_eq!(Value::from("hi"), Value::Str("hi".to_string()));
    }
}
