//! Value conversion at the runtime boundary
//!
//! Results flow out through [`convert_result`], one arm per [`ReturnKind`].
//! Literal arguments flow in through [`literal_cost`] (overload matching) and
//! [`coerce_literal`].

use tether_sdk::{NativeValue, ReturnKind};

use crate::error::BridgeError;
use crate::instruction::Literal;
use crate::signature::STRING_TOKEN;

/// Text produced by a hop returning `void`
pub const VOID_TEXT: &str = "void";

/// Text produced for a null reference
pub const NULL_TEXT: &str = "null";

/// Outcome of converting one hop's native result
#[derive(Debug, Clone, PartialEq)]
pub enum Converted<O> {
    /// The member returned nothing
    Void,
    /// Final textual form of a primitive or string
    Text(String),
    /// A null reference
    Null,
    /// An object that becomes the next receiver
    Receiver(O),
}

/// Convert a native result according to the member's declared kind.
pub fn convert_result<O>(
    member: &str,
    kind: &ReturnKind,
    value: NativeValue<O>,
) -> Result<Converted<O>, BridgeError> {
    let converted = match (kind, value) {
        (ReturnKind::Void, _) => Converted::Void,
        (ReturnKind::Int, NativeValue::Int(v)) => Converted::Text(v.to_string()),
        (ReturnKind::Long, NativeValue::Long(v)) => Converted::Text(v.to_string()),
        (ReturnKind::Bool, NativeValue::Bool(v)) => Converted::Text(v.to_string()),
        (ReturnKind::Double, NativeValue::Double(v)) => Converted::Text(render_double(v)),
        (ReturnKind::Float, NativeValue::Float(v)) => Converted::Text(render_float(v)),
        (ReturnKind::Byte, NativeValue::Byte(v)) => Converted::Text(v.to_string()),
        (ReturnKind::Short, NativeValue::Short(v)) => Converted::Text(v.to_string()),
        (ReturnKind::Char, NativeValue::Char(v)) => {
            Converted::Text(String::from_utf16_lossy(&[v]))
        }
        (ReturnKind::String, NativeValue::Str(s)) => Converted::Text(s),
        (ReturnKind::String | ReturnKind::Object(_), NativeValue::Null) => Converted::Null,
        (ReturnKind::Object(_), NativeValue::Object(o)) => Converted::Receiver(o),
        (kind, value) => {
            return Err(BridgeError::Conversion {
                member: member.to_string(),
                expected: kind.to_string(),
                got: value.type_name().to_string(),
            })
        }
    };
    Ok(converted)
}

/// Render a double the way the host runtime prints it (`1.0`, `1.0E20`, `NaN`).
pub fn render_double(v: f64) -> String {
    render_floating(v, format!("{}", v), format!("{:E}", v))
}

/// Render a float the way the host runtime prints it.
pub fn render_float(v: f32) -> String {
    render_floating(f64::from(v), format!("{}", v), format!("{:E}", v))
}

fn render_floating(v: f64, plain: String, scientific: String) -> String {
    if v.is_nan() {
        return "NaN".to_string();
    }
    if v.is_infinite() {
        return if v > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }

    let magnitude = v.abs();
    if magnitude != 0.0 && !(1e-3..1e7).contains(&magnitude) {
        // Mantissa always carries a fractional digit: 1E20 -> 1.0E20
        return match scientific.split_once('E') {
            Some((mantissa, exp)) if !mantissa.contains('.') => {
                format!("{}.0E{}", mantissa, exp)
            }
            _ => scientific,
        };
    }

    if plain.contains('.') {
        plain
    } else {
        format!("{}.0", plain)
    }
}

// ============================================================================
// Arguments
// ============================================================================

/// Cost of passing `literal` to a parameter with signature token `token`.
///
/// `Some(0)` is an exact match, `Some(1)` a widening conversion, `None`
/// means the literal is not assignable.
pub fn literal_cost(literal: &Literal, token: &str) -> Option<u32> {
    let reference = token.starts_with('L') || token.starts_with('[');
    match (literal, token) {
        (Literal::Int(_), "I") => Some(0),
        (Literal::Int(v), "S") => i16::try_from(*v).ok().map(|_| 1),
        (Literal::Int(v), "B") => i8::try_from(*v).ok().map(|_| 1),
        (Literal::Int(_), "J" | "F" | "D") => Some(1),
        (Literal::Long(_), "J") => Some(0),
        (Literal::Long(_), "F" | "D") => Some(1),
        (Literal::Float(_), "F") => Some(0),
        (Literal::Float(_), "D") => Some(1),
        (Literal::Double(_), "D") => Some(0),
        (Literal::Bool(_), "Z") => Some(0),
        (Literal::Char(_), "C") => Some(0),
        (Literal::Str(_), STRING_TOKEN) => Some(0),
        (Literal::Str(_), "Ljava/lang/Object;" | "Ljava/lang/CharSequence;") => Some(1),
        (Literal::Null, _) if reference => Some(0),
        _ => None,
    }
}

/// Convert a literal to the native value expected by parameter `token`.
///
/// Callers must have checked assignability with [`literal_cost`].
pub fn coerce_literal<O>(literal: &Literal, token: &str) -> NativeValue<O> {
    match (literal, token) {
        (Literal::Int(v), "S") => NativeValue::Short(*v as i16),
        (Literal::Int(v), "B") => NativeValue::Byte(*v as i8),
        (Literal::Int(v), "J") => NativeValue::Long(i64::from(*v)),
        (Literal::Int(v), "F") => NativeValue::Float(*v as f32),
        (Literal::Int(v), "D") => NativeValue::Double(f64::from(*v)),
        (Literal::Int(v), _) => NativeValue::Int(*v),
        (Literal::Long(v), "F") => NativeValue::Float(*v as f32),
        (Literal::Long(v), "D") => NativeValue::Double(*v as f64),
        (Literal::Long(v), _) => NativeValue::Long(*v),
        (Literal::Float(v), "D") => NativeValue::Double(f64::from(*v)),
        (Literal::Float(v), _) => NativeValue::Float(*v),
        (Literal::Double(v), _) => NativeValue::Double(*v),
        (Literal::Bool(v), _) => NativeValue::Bool(*v),
        (Literal::Char(v), _) => NativeValue::Char(*v),
        (Literal::Str(v), _) => NativeValue::Str(v.clone()),
        (Literal::Null, _) => NativeValue::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Value = NativeValue<u32>;

    #[test]
    fn test_boolean_renders_as_words() {
        let t = convert_result("R.ok", &ReturnKind::Bool, Value::Bool(true)).unwrap();
        let f = convert_result("R.ok", &ReturnKind::Bool, Value::Bool(false)).unwrap();
        assert_eq!(t, Converted::Text("true".to_string()));
        assert_eq!(f, Converted::Text("false".to_string()));
    }

    #[test]
    fn test_object_becomes_receiver() {
        let kind = ReturnKind::Object("com.example.Foo".to_string());
        assert_eq!(
            convert_result("R.get", &kind, Value::Object(9)).unwrap(),
            Converted::Receiver(9)
        );
        assert_eq!(convert_result("R.get", &kind, Value::Null).unwrap(), Converted::Null);
    }

    #[test]
    fn test_object_kind_never_flattens_text() {
        let kind = ReturnKind::Object("java.lang.Object".to_string());
        let err = convert_result("R.label", &kind, Value::Str("abc".to_string())).unwrap_err();
        assert!(matches!(err, BridgeError::Conversion { ref got, .. } if got == "string"));
    }

    #[test]
    fn test_void_and_char() {
        assert_eq!(
            convert_result("R.run", &ReturnKind::Void, Value::Void).unwrap(),
            Converted::Void
        );
        assert_eq!(
            convert_result("R.c", &ReturnKind::Char, Value::Char(u16::from(b'A'))).unwrap(),
            Converted::Text("A".to_string())
        );
    }

    #[test]
    fn test_mismatch_is_conversion_error() {
        let err = convert_result("R.n", &ReturnKind::Int, Value::Bool(true)).unwrap_err();
        assert!(matches!(err, BridgeError::Conversion { ref expected, .. } if expected == "int"));
    }

    #[test]
    fn test_floating_rendering() {
        assert_eq!(render_double(1.0), "1.0");
        assert_eq!(render_double(-2.5), "-2.5");
        assert_eq!(render_double(0.0), "0.0");
        assert_eq!(render_double(1e20), "1.0E20");
        assert_eq!(render_double(1.5e-5), "1.5E-5");
        assert_eq!(render_double(f64::NAN), "NaN");
        assert_eq!(render_double(f64::NEG_INFINITY), "-Infinity");
        assert_eq!(render_float(1.1), "1.1");
        assert_eq!(render_float(3.0), "3.0");
    }

    #[test]
    fn test_literal_costs() {
        assert_eq!(literal_cost(&Literal::Int(1), "I"), Some(0));
        assert_eq!(literal_cost(&Literal::Int(1), "J"), Some(1));
        assert_eq!(literal_cost(&Literal::Int(100), "B"), Some(1));
        assert_eq!(literal_cost(&Literal::Int(1000), "B"), None);
        assert_eq!(literal_cost(&Literal::Long(1), "I"), None);
        assert_eq!(literal_cost(&Literal::Str("a".into()), STRING_TOKEN), Some(0));
        assert_eq!(literal_cost(&Literal::Str("a".into()), "Ljava/lang/Object;"), Some(1));
        assert_eq!(literal_cost(&Literal::Null, "[I"), Some(0));
        assert_eq!(literal_cost(&Literal::Null, "I"), None);
        assert_eq!(literal_cost(&Literal::Bool(true), "I"), None);
    }

    #[test]
    fn test_coercion_widens() {
        assert_eq!(coerce_literal::<u32>(&Literal::Int(7), "J"), Value::Long(7));
        assert_eq!(coerce_literal::<u32>(&Literal::Int(7), "D"), Value::Double(7.0));
        assert_eq!(coerce_literal::<u32>(&Literal::Float(0.5), "D"), Value::Double(0.5));
        assert_eq!(coerce_literal::<u32>(&Literal::Int(7), "I"), Value::Int(7));
    }
}
