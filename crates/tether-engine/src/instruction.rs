//! Instruction parser
//!
//! An instruction is a dot-separated chain of segments:
//!
//! ```text
//! instruction := segment ('.' segment)*
//! segment     := ident [ '(' [ literal (',' literal)* ] ')' ]
//! literal     := int | int 'L' | float | float 'f' | 'true' | 'false' | 'null'
//!              | '"' chars '"' | '\'' char '\''
//! ```
//!
//! A leading segment without an argument list names a root; later segments
//! without one are field reads. Dots and commas inside parentheses or quotes
//! do not split.

use std::fmt;

/// Instruction parse errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseError {
    /// Blank instruction
    #[error("Empty instruction")]
    Empty,

    /// Two separators in a row, or a leading/trailing separator
    #[error("Empty segment at position {0}")]
    EmptySegment(usize),

    /// Segment name is not an identifier
    #[error("Invalid member name '{0}'")]
    InvalidName(String),

    /// Parentheses do not balance
    #[error("Unbalanced parentheses in '{0}'")]
    Unbalanced(String),

    /// String or char literal is missing its closing quote
    #[error("Unterminated literal in '{0}'")]
    UnterminatedLiteral(String),

    /// Argument is not a recognized literal
    #[error("Invalid literal '{0}'")]
    InvalidLiteral(String),

    /// Text follows the closing parenthesis of a segment
    #[error("Trailing characters after ')' in '{0}'")]
    Trailing(String),
}

/// A typed literal argument
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// `42`
    Int(i32),
    /// `42L`
    Long(i64),
    /// `1.5f`
    Float(f32),
    /// `1.5`
    Double(f64),
    /// `true` / `false`
    Bool(bool),
    /// `'c'`
    Char(u16),
    /// `"text"`
    Str(String),
    /// `null`
    Null,
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Int(v) => write!(f, "{}", v),
            Literal::Long(v) => write!(f, "{}L", v),
            Literal::Float(v) => write!(f, "{}f", v),
            Literal::Double(v) => write!(f, "{:?}", v),
            Literal::Bool(v) => write!(f, "{}", v),
            Literal::Char(v) => write!(f, "'{}'", String::from_utf16_lossy(&[*v])),
            Literal::Str(v) => write!(f, "{:?}", v),
            Literal::Null => write!(f, "null"),
        }
    }
}

/// What a hop does with its receiver
#[derive(Debug, Clone, PartialEq)]
pub enum HopKind {
    /// Method call with literal arguments
    Call(Vec<Literal>),
    /// Field read
    Field,
}

/// One segment of the chain
#[derive(Debug, Clone, PartialEq)]
pub struct Hop {
    /// Member name
    pub name: String,
    /// Call or field read
    pub kind: HopKind,
}

impl Hop {
    /// Arguments of a call hop; empty for field reads
    pub fn args(&self) -> &[Literal] {
        match &self.kind {
            HopKind::Call(args) => args,
            HopKind::Field => &[],
        }
    }

    /// Whether this hop reads a field
    pub fn is_field(&self) -> bool {
        matches!(self.kind, HopKind::Field)
    }
}

impl fmt::Display for Hop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            HopKind::Field => write!(f, "{}", self.name),
            HopKind::Call(args) => {
                write!(f, "{}(", self.name)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
        }
    }
}

/// A parsed instruction
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    /// Root label, when the first segment has no argument list
    pub root: Option<String>,
    /// Hops in evaluation order
    pub hops: Vec<Hop>,
}

impl Instruction {
    /// Parse instruction text
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ParseError::Empty);
        }

        let segments = split_top_level(text, '.')?;
        let mut root = None;
        let mut hops = Vec::with_capacity(segments.len());

        for (index, segment) in segments.iter().enumerate() {
            let segment = segment.trim();
            if segment.is_empty() {
                return Err(ParseError::EmptySegment(index));
            }
            let hop = parse_segment(segment)?;
            if index == 0 && hop.is_field() {
                root = Some(hop.name);
            } else {
                hops.push(hop);
            }
        }

        Ok(Instruction { root, hops })
    }
}

/// Split on `sep` outside parentheses and quotes.
fn split_top_level(text: &str, sep: char) -> Result<Vec<&str>, ParseError> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut start = 0;

    for (i, c) in text.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '(' => depth += 1,
            ')' => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| ParseError::Unbalanced(text.to_string()))?;
            }
            c if c == sep && depth == 0 => {
                parts.push(&text[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }

    if quote.is_some() {
        return Err(ParseError::UnterminatedLiteral(text.to_string()));
    }
    if depth != 0 {
        return Err(ParseError::Unbalanced(text.to_string()));
    }
    parts.push(&text[start..]);
    Ok(parts)
}

fn parse_segment(segment: &str) -> Result<Hop, ParseError> {
    let Some(open) = segment.find('(') else {
        validate_name(segment)?;
        return Ok(Hop {
            name: segment.to_string(),
            kind: HopKind::Field,
        });
    };

    let name = segment[..open].trim();
    validate_name(name)?;

    if !segment.ends_with(')') {
        return Err(ParseError::Trailing(segment.to_string()));
    }
    // `a()b()` survives the top-level split as one segment
    check_single_group(segment, open)?;
    let inner = &segment[open + 1..segment.len() - 1];

    let args = if inner.trim().is_empty() {
        Vec::new()
    } else {
        split_top_level(inner, ',')?
            .into_iter()
            .map(|arg| parse_literal(arg.trim()))
            .collect::<Result<Vec<_>, _>>()?
    };

    Ok(Hop {
        name: name.to_string(),
        kind: HopKind::Call(args),
    })
}

/// The group opened at `open` must close at the final character.
fn check_single_group(segment: &str, open: usize) -> Result<(), ParseError> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (i, c) in segment[open..].char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '(' => depth += 1,
            ')' => {
                depth = depth.saturating_sub(1);
                if depth == 0 && open + i + 1 != segment.len() {
                    return Err(ParseError::Trailing(segment.to_string()));
                }
            }
            _ => {}
        }
    }
    Ok(())
}

fn validate_name(name: &str) -> Result<(), ParseError> {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .map(|c| c.is_alphabetic() || c == '_' || c == '$')
        .unwrap_or(false);
    if !valid_start || !chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$') {
        return Err(ParseError::InvalidName(name.to_string()));
    }
    Ok(())
}

fn parse_literal(text: &str) -> Result<Literal, ParseError> {
    let invalid = || ParseError::InvalidLiteral(text.to_string());

    match text {
        "" => return Err(invalid()),
        "null" => return Ok(Literal::Null),
        "true" => return Ok(Literal::Bool(true)),
        "false" => return Ok(Literal::Bool(false)),
        _ => {}
    }

    if let Some(body) = text.strip_prefix('"') {
        let body = body
            .strip_suffix('"')
            .ok_or_else(|| ParseError::UnterminatedLiteral(text.to_string()))?;
        return unescape(body).map(Literal::Str).ok_or_else(invalid);
    }

    if let Some(body) = text.strip_prefix('\'') {
        let body = body
            .strip_suffix('\'')
            .ok_or_else(|| ParseError::UnterminatedLiteral(text.to_string()))?;
        let decoded = unescape(body).ok_or_else(invalid)?;
        let units: Vec<u16> = decoded.encode_utf16().collect();
        return match units.as_slice() {
            [unit] => Ok(Literal::Char(*unit)),
            _ => Err(invalid()),
        };
    }

    parse_number(text).ok_or_else(invalid)
}

fn parse_number(text: &str) -> Option<Literal> {
    if let Some(digits) = text.strip_suffix(['L', 'l']) {
        return digits.parse::<i64>().ok().map(Literal::Long);
    }
    if let Some(digits) = text.strip_suffix(['f', 'F']) {
        return digits.parse::<f32>().ok().filter(|v| v.is_finite()).map(Literal::Float);
    }
    if let Some(digits) = text.strip_suffix(['d', 'D']) {
        return digits.parse::<f64>().ok().filter(|v| v.is_finite()).map(Literal::Double);
    }
    if text.contains(['.', 'e', 'E']) {
        return text.parse::<f64>().ok().filter(|v| v.is_finite()).map(Literal::Double);
    }
    text.parse::<i32>().ok().map(Literal::Int)
}

fn unescape(body: &str) -> Option<String> {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next()? {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            '0' => out.push('\0'),
            '\\' => out.push('\\'),
            '"' => out.push('"'),
            '\'' => out.push('\''),
            _ => return None,
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str, args: Vec<Literal>) -> Hop {
        Hop {
            name: name.to_string(),
            kind: HopKind::Call(args),
        }
    }

    #[test]
    fn test_root_label_and_hops() {
        let parsed = Instruction::parse("Root.getName()").unwrap();
        assert_eq!(parsed.root.as_deref(), Some("Root"));
        assert_eq!(parsed.hops, vec![call("getName", vec![])]);
    }

    #[test]
    fn test_leading_call_has_no_root() {
        let parsed = Instruction::parse("getPlayer().getName()").unwrap();
        assert_eq!(parsed.root, None);
        assert_eq!(parsed.hops.len(), 2);
    }

    #[test]
    fn test_field_hops() {
        let parsed = Instruction::parse("client.world.getSize()").unwrap();
        assert_eq!(parsed.root.as_deref(), Some("client"));
        assert!(parsed.hops[0].is_field());
        assert_eq!(parsed.hops[0].name, "world");
        assert!(!parsed.hops[1].is_field());
    }

    #[test]
    fn test_separators_inside_arguments() {
        let parsed = Instruction::parse(r#"Root.format("a.b, c", 1.5).length()"#).unwrap();
        assert_eq!(
            parsed.hops[0],
            call(
                "format",
                vec![Literal::Str("a.b, c".to_string()), Literal::Double(1.5)]
            )
        );
        assert_eq!(parsed.hops[1], call("length", vec![]));
    }

    #[test]
    fn test_literals() {
        let parsed =
            Instruction::parse(r#"Root.m(1, -2L, 3.0f, 4e2, true, false, null, 'x', "q\"t")"#)
                .unwrap();
        assert_eq!(
            parsed.hops[0].args(),
            &[
                Literal::Int(1),
                Literal::Long(-2),
                Literal::Float(3.0),
                Literal::Double(400.0),
                Literal::Bool(true),
                Literal::Bool(false),
                Literal::Null,
                Literal::Char(u16::from(b'x')),
                Literal::Str("q\"t".to_string()),
            ]
        );
    }

    #[test]
    fn test_int_overflow_is_invalid() {
        assert!(matches!(
            Instruction::parse("Root.m(3000000000)"),
            Err(ParseError::InvalidLiteral(_))
        ));
        assert!(Instruction::parse("Root.m(3000000000L)").is_ok());
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(Instruction::parse("  "), Err(ParseError::Empty));
        assert_eq!(Instruction::parse("Root..a()"), Err(ParseError::EmptySegment(1)));
        assert_eq!(Instruction::parse("Root.a()."), Err(ParseError::EmptySegment(2)));
        assert!(matches!(Instruction::parse("Root.a("), Err(ParseError::Unbalanced(_))));
        assert!(matches!(Instruction::parse("Root.a())"), Err(ParseError::Unbalanced(_))));
        assert!(matches!(
            Instruction::parse("Root.a(\"x)"),
            Err(ParseError::UnterminatedLiteral(_))
        ));
        assert!(matches!(Instruction::parse("Root.9a()"), Err(ParseError::InvalidName(_))));
        assert!(matches!(Instruction::parse("Root.a()b"), Err(ParseError::Trailing(_))));
        assert!(matches!(Instruction::parse("Root.a()b()"), Err(ParseError::Trailing(_))));
        assert!(matches!(Instruction::parse("Root.a(foo)"), Err(ParseError::InvalidLiteral(_))));
        assert!(matches!(Instruction::parse("Root.a('xy')"), Err(ParseError::InvalidLiteral(_))));
    }

    #[test]
    fn test_display_round_trip() {
        let parsed = Instruction::parse(r#"Root.m(1, "a", 2L)"#).unwrap();
        assert_eq!(parsed.hops[0].to_string(), r#"m(1, "a", 2L)"#);
    }
}
