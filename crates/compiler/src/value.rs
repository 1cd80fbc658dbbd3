//! Runtime values
//!
//! A `Value` is a tagged payload carrying its `Type`. Payloads are only
//! produced through the constructor functions here, which keep the tag
//! and the type in agreement: numeric constructors re-shrink the type to
//! the smallest specifier that holds the payload.
//!
//! Integer arithmetic wraps (two's complement); float arithmetic follows
//! IEEE 754. Division by zero is the caller's problem to rule out first.

use crate::token::{Token, TokenKind};
use crate::types::{Type, TypeCategory};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Default)]
pub enum Payload {
    #[default]
    None,
    Int(i64),
    Uint(u64),
    Float(f64),
    Char(char),
    Str(String),
    Bool(bool),
    Array(Vec<Value>),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Value {
    pub ty: Type,
    pub payload: Payload,
}

/// Numeric base implied by a literal's token kind.
pub fn base_of(kind: TokenKind) -> u32 {
    match kind {
        TokenKind::HexLiteral => 16,
        TokenKind::BinaryLiteral => 2,
        _ => 10,
    }
}

/// Parse a literal token's text as a signed 64-bit integer.
/// `None` means the text does not fit (or is not a number at all).
pub fn parse_i64(text: &str, base: u32) -> Option<i64> {
    let cleaned = clean_numeric(text, base);
    i64::from_str_radix(&cleaned, base).ok()
}

/// Parse a literal token's text as an unsigned 64-bit integer.
pub fn parse_u64(text: &str, base: u32) -> Option<u64> {
    let cleaned = clean_numeric(text, base);
    u64::from_str_radix(&cleaned, base).ok()
}

/// Parse a float literal. Infinite results signal textual overflow.
pub fn parse_f64(text: &str) -> Option<f64> {
    match text.parse::<f64>() {
        Ok(v) if v.is_finite() => Some(v),
        _ => None,
    }
}

/// Strip the `0x` prefix from hex literals and the digit-group spaces
/// from binary literals before handing the text to `from_str_radix`.
fn clean_numeric(text: &str, base: u32) -> String {
    match base {
        16 => text
            .strip_prefix("0x")
            .or_else(|| text.strip_prefix("0X"))
            .unwrap_or(text)
            .to_string(),
        2 => text.chars().filter(|c| *c != ' ').collect(),
        _ => text.to_string(),
    }
}

impl Value {
    pub fn none() -> Self {
        Value::default()
    }

    pub fn int(i: i64) -> Self {
        Value {
            ty: Type::smallest_int(i),
            payload: Payload::Int(i),
        }
    }

    pub fn uint(u: u64) -> Self {
        Value {
            ty: Type::smallest_uint(u),
            payload: Payload::Uint(u),
        }
    }

    pub fn float(f: f64) -> Self {
        Value {
            ty: Type::smallest_float(f),
            payload: Payload::Float(f),
        }
    }

    pub fn char_value(c: char) -> Self {
        Value {
            ty: Type::from_token_kind(TokenKind::Char),
            payload: Payload::Char(c),
        }
    }

    pub fn string(s: impl Into<String>) -> Self {
        let s = s.into();
        let mut ty = Type::from_token_kind(TokenKind::String);
        ty.array_size = s.len();
        Value {
            ty,
            payload: Payload::Str(s),
        }
    }

    pub fn bool_value(b: bool) -> Self {
        Value {
            ty: Type::from_token_kind(TokenKind::Bool),
            payload: Payload::Bool(b),
        }
    }

    pub fn array(element: Type, items: Vec<Value>) -> Self {
        let ty = Type {
            specifier: element.specifier,
            category: TypeCategory::Array,
            array_size: items.len(),
            ..Type::default()
        };
        Value {
            ty,
            payload: Payload::Array(items),
        }
    }

    /// Materialize a Value from a literal token, converting the text
    /// according to the family of `ty`. Errors report the condition the
    /// conversion tripped over.
    pub fn from_token(ty: &Type, token: &Token) -> Result<Value, String> {
        if ty.is_none() {
            return Ok(Value::none());
        }

        let base = base_of(token.kind);

        if ty.is_int() {
            return parse_i64(&token.lexeme, base)
                .map(Value::int)
                .ok_or_else(|| format!("Integer literal '{}' overflows 64 bits", token.lexeme));
        }

        if ty.is_uint() {
            return parse_u64(&token.lexeme, base)
                .map(Value::uint)
                .ok_or_else(|| format!("Unsigned literal '{}' overflows 64 bits", token.lexeme));
        }

        if ty.is_float() {
            return parse_f64(&token.lexeme)
                .map(Value::float)
                .ok_or_else(|| format!("Float literal '{}' overflows f64", token.lexeme));
        }

        if ty.is_bool() {
            return Ok(Value::bool_value(token.lexeme == "true"));
        }

        if ty.is_char() {
            return Ok(Value::char_value(unescape_char(&token.lexeme)));
        }

        if ty.is_string() {
            return Ok(Value::string(token.lexeme.clone()));
        }

        Err(format!(
            "Cannot build a value of type '{}' from '{}'",
            ty, token.lexeme
        ))
    }

    pub fn as_i64(&self) -> i64 {
        match &self.payload {
            Payload::Int(i) => *i,
            Payload::Uint(u) => *u as i64,
            Payload::Char(c) => *c as i64,
            Payload::Bool(b) => *b as i64,
            _ => 0,
        }
    }

    pub fn as_u64(&self) -> u64 {
        match &self.payload {
            Payload::Uint(u) => *u,
            Payload::Int(i) => *i as u64,
            _ => 0,
        }
    }

    pub fn as_f64(&self) -> f64 {
        match &self.payload {
            Payload::Float(f) => *f,
            Payload::Int(i) => *i as f64,
            Payload::Uint(u) => *u as f64,
            _ => 0.0,
        }
    }

    pub fn as_bool(&self) -> bool {
        matches!(self.payload, Payload::Bool(true))
    }

    pub fn is_zero(&self) -> bool {
        matches!(self.payload, Payload::Int(0) | Payload::Uint(0))
    }

    /// Dispatch on the left operand's family, the way every binary
    /// arithmetic node does after type checking.
    pub fn add(&self, other: &Value) -> Value {
        if self.ty.is_int() {
            Value::int(self.as_i64().wrapping_add(other.as_i64()))
        } else if self.ty.is_uint() {
            Value::uint(self.as_u64().wrapping_add(other.as_u64()))
        } else if self.ty.is_float() {
            Value::float(self.as_f64() + other.as_f64())
        } else {
            Value::none()
        }
    }

    pub fn sub(&self, other: &Value) -> Value {
        if self.ty.is_int() {
            Value::int(self.as_i64().wrapping_sub(other.as_i64()))
        } else if self.ty.is_uint() {
            Value::uint(self.as_u64().wrapping_sub(other.as_u64()))
        } else if self.ty.is_float() {
            Value::float(self.as_f64() - other.as_f64())
        } else {
            Value::none()
        }
    }

    pub fn mul(&self, other: &Value) -> Value {
        if self.ty.is_int() {
            Value::int(self.as_i64().wrapping_mul(other.as_i64()))
        } else if self.ty.is_uint() {
            Value::uint(self.as_u64().wrapping_mul(other.as_u64()))
        } else if self.ty.is_float() {
            Value::float(self.as_f64() * other.as_f64())
        } else {
            Value::none()
        }
    }

    /// Integer division truncates; callers must rule out a zero divisor.
    pub fn div(&self, other: &Value) -> Value {
        if self.ty.is_int() {
            Value::int(self.as_i64().wrapping_div(other.as_i64()))
        } else if self.ty.is_uint() {
            Value::uint(self.as_u64() / other.as_u64())
        } else if self.ty.is_float() {
            Value::float(self.as_f64() / other.as_f64())
        } else {
            Value::none()
        }
    }

    pub fn rem(&self, other: &Value) -> Value {
        if self.ty.is_int() {
            Value::int(self.as_i64().wrapping_rem(other.as_i64()))
        } else if self.ty.is_uint() {
            Value::uint(self.as_u64() % other.as_u64())
        } else {
            Value::none()
        }
    }

    pub fn equals(&self, other: &Value) -> Value {
        let eq = if self.ty.is_int() {
            self.as_i64() == other.as_i64()
        } else if self.ty.is_uint() {
            self.as_u64() == other.as_u64()
        } else if self.ty.is_float() {
            self.as_f64() == other.as_f64()
        } else {
            match (&self.payload, &other.payload) {
                (Payload::Char(a), Payload::Char(b)) => a == b,
                (Payload::Bool(a), Payload::Bool(b)) => a == b,
                (Payload::Str(a), Payload::Str(b)) => a == b,
                _ => false,
            }
        };
        Value::bool_value(eq)
    }

    pub fn greater_than(&self, other: &Value) -> Value {
        let gt = if self.ty.is_int() {
            self.as_i64() > other.as_i64()
        } else if self.ty.is_uint() {
            self.as_u64() > other.as_u64()
        } else if self.ty.is_float() {
            self.as_f64() > other.as_f64()
        } else {
            false
        };
        Value::bool_value(gt)
    }

    pub fn less_than(&self, other: &Value) -> Value {
        let lt = if self.ty.is_int() {
            self.as_i64() < other.as_i64()
        } else if self.ty.is_uint() {
            self.as_u64() < other.as_u64()
        } else if self.ty.is_float() {
            self.as_f64() < other.as_f64()
        } else {
            false
        };
        Value::bool_value(lt)
    }

    pub fn not(&self) -> Value {
        Value::bool_value(!self.as_bool())
    }

    pub fn logical_and(&self, other: &Value) -> Value {
        Value::bool_value(self.as_bool() && other.as_bool())
    }

    pub fn logical_or(&self, other: &Value) -> Value {
        Value::bool_value(self.as_bool() || other.as_bool())
    }

    /// Keep only the low `bits` of an unsigned payload. Used by unary
    /// `~` and the terse bitwise assignments on fixed-width targets.
    pub fn truncated_to(u: u64, bits: u32) -> Value {
        let masked = match bits {
            8 => u & 0xFF,
            16 => u & 0xFFFF,
            32 => u & 0xFFFF_FFFF,
            _ => u,
        };
        Value::uint(masked)
    }
}

/// Translate the one-character (or escaped) body of a char literal.
fn unescape_char(body: &str) -> char {
    let mut chars = body.chars();
    match (chars.next(), chars.next()) {
        (Some('\\'), Some(esc)) => match esc {
            'n' => '\n',
            't' => '\t',
            'r' => '\r',
            '0' => '\0',
            other => other,
        },
        (Some(c), _) => c,
        (None, _) => '\0',
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.payload {
            Payload::None => write!(f, "NONE"),
            Payload::Int(i) => write!(f, "{}", i),
            Payload::Uint(u) => write!(f, "{}", u),
            Payload::Float(v) => write!(f, "{:.6}", v),
            Payload::Char(c) => write!(f, "{}", c),
            Payload::Str(s) => write!(f, "{}", s),
            Payload::Bool(b) => write!(f, "{}", b),
            Payload::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TypeSpecifier;

    fn literal(kind: TokenKind, text: &str) -> Token {
        Token::new(kind, text, 1, 0)
    }

    #[test]
    fn test_constructors_shrink() {
        assert_eq!(Value::int(5).ty.specifier, TypeSpecifier::I8);
        assert_eq!(Value::int(300).ty.specifier, TypeSpecifier::I16);
        assert_eq!(Value::uint(255).ty.specifier, TypeSpecifier::U8);
        assert_eq!(Value::float(4.5).ty.specifier, TypeSpecifier::F32);
        assert_eq!(Value::float(1e300).ty.specifier, TypeSpecifier::F64);
    }

    #[test]
    fn test_parse_bases() {
        assert_eq!(parse_u64("0xFF", 16), Some(255));
        assert_eq!(parse_u64("0X10", 16), Some(16));
        assert_eq!(parse_u64("1111 0000", 2), Some(0xF0));
        assert_eq!(parse_i64("-42", 10), Some(-42));
        assert_eq!(parse_i64("9223372036854775808", 10), None);
        assert_eq!(parse_u64("18446744073709551616", 10), None);
    }

    #[test]
    fn test_parse_f64_overflow() {
        assert!(parse_f64("1e400").is_none());
        assert_eq!(parse_f64("4.5"), Some(4.5));
    }

    #[test]
    fn test_from_token_families() {
        let int_ty = Type::from_token_kind(TokenKind::IntLiteral);
        let v = Value::from_token(&int_ty, &literal(TokenKind::IntLiteral, "15")).unwrap();
        assert_eq!(v.payload, Payload::Int(15));

        let uint_ty = Type::from_token_kind(TokenKind::HexLiteral);
        let v = Value::from_token(&uint_ty, &literal(TokenKind::HexLiteral, "0x1FF")).unwrap();
        assert_eq!(v.payload, Payload::Uint(511));

        let bool_ty = Type::from_token_kind(TokenKind::BoolLiteral);
        let v = Value::from_token(&bool_ty, &literal(TokenKind::BoolLiteral, "true")).unwrap();
        assert_eq!(v.payload, Payload::Bool(true));

        let str_ty = Type::from_token_kind(TokenKind::StringLiteral);
        let v = Value::from_token(&str_ty, &literal(TokenKind::StringLiteral, "hi")).unwrap();
        assert_eq!(v.ty.array_size, 2);
    }

    #[test]
    fn test_char_escapes() {
        let ty = Type::from_token_kind(TokenKind::CharLiteral);
        let v = Value::from_token(&ty, &literal(TokenKind::CharLiteral, "\\n")).unwrap();
        assert_eq!(v.payload, Payload::Char('\n'));
        let v = Value::from_token(&ty, &literal(TokenKind::CharLiteral, "a")).unwrap();
        assert_eq!(v.payload, Payload::Char('a'));
    }

    #[test]
    fn test_arithmetic_dispatches_on_left_family() {
        let sum = Value::int(10).add(&Value::int(5));
        assert_eq!(sum.payload, Payload::Int(15));

        let diff = Value::uint(5).sub(&Value::uint(7));
        assert_eq!(diff.payload, Payload::Uint(u64::MAX - 1));

        let prod = Value::float(1.5).mul(&Value::float(2.0));
        assert_eq!(prod.payload, Payload::Float(3.0));
    }

    #[test]
    fn test_comparisons() {
        assert!(Value::int(3).less_than(&Value::int(4)).as_bool());
        assert!(Value::uint(9).greater_than(&Value::uint(2)).as_bool());
        assert!(Value::float(1.25).equals(&Value::float(1.25)).as_bool());
        assert!(Value::bool_value(true)
            .equals(&Value::bool_value(true))
            .as_bool());
        assert!(!Value::char_value('a')
            .equals(&Value::char_value('b'))
            .as_bool());
    }

    #[test]
    fn test_truncation_masks_width() {
        assert_eq!(Value::truncated_to(!0u64, 8).payload, Payload::Uint(0xFF));
        assert_eq!(
            Value::truncated_to(0x3C0, 8).payload,
            Payload::Uint(0xC0)
        );
        assert_eq!(
            Value::truncated_to(!0u64, 32).payload,
            Payload::Uint(0xFFFF_FFFF)
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::float(4.5).to_string(), "4.500000");
        assert_eq!(Value::bool_value(false).to_string(), "false");
        assert_eq!(Value::string("abc").to_string(), "abc");
    }
}
