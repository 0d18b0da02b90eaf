//! Signature resolver
//!
//! Converts host-form type names (`int`, `com.example.Foo`, `[I`) into the
//! canonical encoded signature tokens used to resolve members, and back into
//! [`ReturnKind`]s. Everything here is pure; nothing is cached.

use tether_sdk::ReturnKind;

/// Token of `java.lang.String`, the one reference type converted to text
pub const STRING_TOKEN: &str = "Ljava/lang/String;";

/// Closed table of primitive type names and their tokens
const PRIMITIVES: [(&str, char); 9] = [
    ("int", 'I'),
    ("long", 'J'),
    ("boolean", 'Z'),
    ("void", 'V'),
    ("double", 'D'),
    ("byte", 'B'),
    ("short", 'S'),
    ("char", 'C'),
    ("float", 'F'),
];

/// Error for a type descriptor that cannot be encoded
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DescriptorError {
    /// Empty or blank descriptor
    #[error("Empty type descriptor")]
    Empty,

    /// Descriptor contains a character no type name may contain
    #[error("Illegal character {ch:?} in type descriptor '{descriptor}'")]
    IllegalCharacter {
        /// The offending descriptor
        descriptor: String,
        /// The offending character
        ch: char,
    },

    /// Structurally invalid descriptor or signature
    #[error("Malformed type descriptor '{0}'")]
    Malformed(String),
}

/// Encode one host-form type name as a signature token.
///
/// Primitives map through the closed table, array descriptors pass through
/// with dots normalized to slashes, and anything else becomes `L<name>;`.
pub fn class_to_signature_token(descriptor: &str) -> Result<String, DescriptorError> {
    let descriptor = descriptor.trim();
    if descriptor.is_empty() {
        return Err(DescriptorError::Empty);
    }

    if let Some(&(_, token)) = PRIMITIVES.iter().find(|(name, _)| *name == descriptor) {
        return Ok(token.to_string());
    }

    if descriptor.starts_with('[') {
        let normalized = descriptor.replace('.', "/");
        let (token, end) = read_token(&normalized, 0)?;
        if end != normalized.len() {
            return Err(DescriptorError::Malformed(descriptor.to_string()));
        }
        return Ok(token);
    }

    validate_object_name(descriptor)?;
    Ok(format!("L{};", descriptor.replace('.', "/")))
}

/// Encode a parameter list as `(` + tokens + `)`.
pub fn parameter_list_to_signature<S: AsRef<str>>(params: &[S]) -> Result<String, DescriptorError> {
    let mut out = String::from("(");
    for param in params {
        out.push_str(&class_to_signature_token(param.as_ref())?);
    }
    out.push(')');
    Ok(out)
}

/// Encode a full method signature: parameters followed by the return token.
pub fn full_signature<S: AsRef<str>>(params: &[S], returns: &str) -> Result<String, DescriptorError> {
    let mut out = parameter_list_to_signature(params)?;
    out.push_str(&class_to_signature_token(returns)?);
    Ok(out)
}

/// Map a single signature token to the kind of value it denotes.
pub fn return_kind(token: &str) -> Result<ReturnKind, DescriptorError> {
    let kind = match token {
        "V" => ReturnKind::Void,
        "I" => ReturnKind::Int,
        "J" => ReturnKind::Long,
        "Z" => ReturnKind::Bool,
        "D" => ReturnKind::Double,
        "B" => ReturnKind::Byte,
        "S" => ReturnKind::Short,
        "C" => ReturnKind::Char,
        "F" => ReturnKind::Float,
        STRING_TOKEN => ReturnKind::String,
        _ => {
            let (parsed, end) = read_token(token, 0)?;
            if end != token.len() {
                return Err(DescriptorError::Malformed(token.to_string()));
            }
            if parsed.starts_with('[') {
                ReturnKind::Object(parsed.replace('/', "."))
            } else {
                ReturnKind::Object(parsed[1..parsed.len() - 1].replace('/', "."))
            }
        }
    };
    Ok(kind)
}

/// Split a method signature into its parameter tokens.
///
/// Accepts a bare parameter signature (`"(IJ)"`) or a full one
/// (`"(IJ)Ljava/lang/String;"`).
pub fn parse_parameter_tokens(signature: &str) -> Result<Vec<String>, DescriptorError> {
    let malformed = || DescriptorError::Malformed(signature.to_string());

    if !signature.starts_with('(') {
        return Err(malformed());
    }

    let mut tokens = Vec::new();
    let mut pos = 1;
    loop {
        match signature[pos..].chars().next() {
            None => return Err(malformed()),
            Some(')') => {
                pos += 1;
                break;
            }
            Some(_) => {
                let (token, next) = read_token(signature, pos)?;
                if token == "V" {
                    return Err(malformed());
                }
                tokens.push(token);
                pos = next;
            }
        }
    }

    if pos < signature.len() {
        let (_, end) = read_token(signature, pos)?;
        if end != signature.len() {
            return Err(malformed());
        }
    }

    Ok(tokens)
}

/// Whether a token denotes a reference type (object or array).
pub fn is_reference_token(token: &str) -> bool {
    token.starts_with('L') || token.starts_with('[')
}

/// Read one token starting at byte offset `start`; returns it and the offset after it.
fn read_token(s: &str, start: usize) -> Result<(String, usize), DescriptorError> {
    let malformed = || DescriptorError::Malformed(s.to_string());
    let bytes = s.as_bytes();

    let mut pos = start;
    while pos < bytes.len() && bytes[pos] == b'[' {
        pos += 1;
    }
    let dims = pos - start;

    match bytes.get(pos).copied() {
        None => Err(malformed()),
        Some(b'L') => {
            let close = s[pos..].find(';').ok_or_else(malformed)? + pos;
            let name = &s[pos + 1..close];
            if name.is_empty() {
                return Err(malformed());
            }
            validate_object_name(name)?;
            Ok((s[start..=close].to_string(), close + 1))
        }
        Some(b'V') if dims > 0 => Err(malformed()),
        Some(c) if b"IJZVDBSCF".contains(&c) => Ok((s[start..=pos].to_string(), pos + 1)),
        Some(_) => Err(malformed()),
    }
}

fn validate_object_name(name: &str) -> Result<(), DescriptorError> {
    if let Some(ch) = name
        .chars()
        .find(|c| c.is_whitespace() || matches!(*c, ';' | '[' | ']' | '(' | ')' | '<' | '>' | ','))
    {
        return Err(DescriptorError::IllegalCharacter {
            descriptor: name.to_string(),
            ch,
        });
    }
    if name.split(['.', '/']).any(str::is_empty) {
        return Err(DescriptorError::Malformed(name.to_string()));
    }
    Ok(())
}
