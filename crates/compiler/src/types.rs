//! Static types for Cedar
//!
//! A `Type` pairs a specifier (which primitive family) with a category
//! (plain value, array, function, or enum member). Struct field types and
//! function parameter types ride along as ordered member lists, so the
//! checker can validate field access and call arity without chasing the
//! symbol table.

use crate::token::{Token, TokenKind};
use std::fmt;

/// Which primitive a type names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TypeSpecifier {
    #[default]
    None,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    Bool,
    Char,
    String,
    Enum,
    Struct,
    Void,
}

/// How the specifier is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TypeCategory {
    #[default]
    None,
    Array,
    Function,
    /// An identifier that names an integer constant belonging to an enum.
    EnumMember,
}

/// One named slot in a struct (a field) or in a function signature
/// (a parameter).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Member {
    pub token: Token,
    pub ty: Type,
}

impl Member {
    pub fn new(token: Token, ty: Type) -> Self {
        Member { token, ty }
    }
}

/// A static type descriptor.
///
/// `array_size` is a property of the declared value, not of assignment
/// compatibility: two types match exactly when specifier and category
/// agree, regardless of size.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Type {
    pub specifier: TypeSpecifier,
    pub category: TypeCategory,
    pub array_size: usize,
    /// Struct field declarations, in source order.
    pub members: Vec<Member>,
    /// Function parameter declarations, in source order. For function
    /// types the specifier is the declared return type.
    pub params: Vec<Member>,
}

impl Type {
    pub fn none() -> Self {
        Type::default()
    }

    fn with_specifier(specifier: TypeSpecifier) -> Self {
        Type {
            specifier,
            ..Type::default()
        }
    }

    /// Map a token kind onto the type it denotes. Literal kinds map to
    /// their widest family member; the shrink pass narrows them later.
    pub fn from_token_kind(kind: TokenKind) -> Self {
        match kind {
            TokenKind::I8 => Type::with_specifier(TypeSpecifier::I8),
            TokenKind::I16 => Type::with_specifier(TypeSpecifier::I16),
            TokenKind::I32 => Type::with_specifier(TypeSpecifier::I32),
            TokenKind::I64 => Type::with_specifier(TypeSpecifier::I64),

            TokenKind::U8 => Type::with_specifier(TypeSpecifier::U8),
            TokenKind::U16 => Type::with_specifier(TypeSpecifier::U16),
            TokenKind::U32 => Type::with_specifier(TypeSpecifier::U32),
            TokenKind::U64 => Type::with_specifier(TypeSpecifier::U64),

            TokenKind::F32 => Type::with_specifier(TypeSpecifier::F32),
            TokenKind::F64 | TokenKind::FloatLiteral => Type::with_specifier(TypeSpecifier::F64),

            // Hex and binary literals are unsigned by definition.
            TokenKind::HexLiteral | TokenKind::BinaryLiteral => {
                Type::with_specifier(TypeSpecifier::U64)
            }

            TokenKind::IntLiteral => Type::with_specifier(TypeSpecifier::I64),
            TokenKind::EnumLiteral => Type {
                specifier: TypeSpecifier::I64,
                category: TypeCategory::EnumMember,
                ..Type::default()
            },

            TokenKind::Bool | TokenKind::BoolLiteral => Type::with_specifier(TypeSpecifier::Bool),
            TokenKind::Char | TokenKind::CharLiteral => Type::with_specifier(TypeSpecifier::Char),

            TokenKind::String | TokenKind::StringLiteral => Type {
                specifier: TypeSpecifier::String,
                category: TypeCategory::Array,
                ..Type::default()
            },

            TokenKind::Void => Type::with_specifier(TypeSpecifier::Void),
            TokenKind::Enum => Type::with_specifier(TypeSpecifier::Enum),
            TokenKind::Struct => Type::with_specifier(TypeSpecifier::Struct),

            _ => Type::none(),
        }
    }

    /// A fixed-size array of the type the token kind names.
    pub fn array_of(kind: TokenKind, size: usize) -> Self {
        let mut ty = Type::from_token_kind(kind);
        ty.category = TypeCategory::Array;
        ty.array_size = size;
        ty
    }

    /// A function type whose return type the token kind names.
    pub fn function(return_kind: TokenKind) -> Self {
        let mut ty = Type::from_token_kind(return_kind);
        ty.category = TypeCategory::Function;
        ty
    }

    /// The same type reinterpreted as an enum member constant.
    pub fn as_enum_member(mut self) -> Self {
        self.category = TypeCategory::EnumMember;
        self
    }

    /// 8/16/32/64 for sized numerics, 0 for everything else.
    pub fn bit_width(&self) -> u32 {
        match self.specifier {
            TypeSpecifier::I8 | TypeSpecifier::U8 => 8,
            TypeSpecifier::I16 | TypeSpecifier::U16 => 16,
            TypeSpecifier::I32 | TypeSpecifier::U32 | TypeSpecifier::F32 => 32,
            TypeSpecifier::I64 | TypeSpecifier::U64 | TypeSpecifier::F64 => 64,
            _ => 0,
        }
    }

    /// Narrowest signed type whose range contains `value`.
    pub fn smallest_int(value: i64) -> Self {
        if value >= i8::MIN as i64 && value <= i8::MAX as i64 {
            Type::with_specifier(TypeSpecifier::I8)
        } else if value >= i16::MIN as i64 && value <= i16::MAX as i64 {
            Type::with_specifier(TypeSpecifier::I16)
        } else if value >= i32::MIN as i64 && value <= i32::MAX as i64 {
            Type::with_specifier(TypeSpecifier::I32)
        } else {
            Type::with_specifier(TypeSpecifier::I64)
        }
    }

    /// Narrowest unsigned type whose range contains `value`.
    pub fn smallest_uint(value: u64) -> Self {
        if value <= u8::MAX as u64 {
            Type::with_specifier(TypeSpecifier::U8)
        } else if value <= u16::MAX as u64 {
            Type::with_specifier(TypeSpecifier::U16)
        } else if value <= u32::MAX as u64 {
            Type::with_specifier(TypeSpecifier::U32)
        } else {
            Type::with_specifier(TypeSpecifier::U64)
        }
    }

    /// f32 when the value fits its finite range, f64 otherwise.
    pub fn smallest_float(value: f64) -> Self {
        if value >= -(f32::MAX as f64) && value <= f32::MAX as f64 {
            Type::with_specifier(TypeSpecifier::F32)
        } else {
            Type::with_specifier(TypeSpecifier::F64)
        }
    }

    /// Exact match: specifier and category agree. Array size and member
    /// lists do not participate.
    pub fn matches_exactly(&self, other: &Type) -> bool {
        self.specifier == other.specifier && self.category == other.category
    }

    pub fn is_none(&self) -> bool {
        self.specifier == TypeSpecifier::None
    }

    pub fn is_int(&self) -> bool {
        matches!(
            self.specifier,
            TypeSpecifier::I8 | TypeSpecifier::I16 | TypeSpecifier::I32 | TypeSpecifier::I64
        )
    }

    pub fn is_uint(&self) -> bool {
        matches!(
            self.specifier,
            TypeSpecifier::U8 | TypeSpecifier::U16 | TypeSpecifier::U32 | TypeSpecifier::U64
        )
    }

    pub fn is_float(&self) -> bool {
        matches!(self.specifier, TypeSpecifier::F32 | TypeSpecifier::F64)
    }

    pub fn is_numeric(&self) -> bool {
        self.is_int() || self.is_uint() || self.is_float()
    }

    pub fn is_signed(&self) -> bool {
        self.is_int() || self.is_float()
    }

    pub fn is_bool(&self) -> bool {
        self.specifier == TypeSpecifier::Bool
    }

    pub fn is_char(&self) -> bool {
        self.specifier == TypeSpecifier::Char
    }

    pub fn is_string(&self) -> bool {
        self.specifier == TypeSpecifier::String
    }

    pub fn is_enum(&self) -> bool {
        self.specifier == TypeSpecifier::Enum
    }

    pub fn is_struct(&self) -> bool {
        self.specifier == TypeSpecifier::Struct
    }

    pub fn is_void(&self) -> bool {
        self.specifier == TypeSpecifier::Void
    }

    pub fn is_array(&self) -> bool {
        self.category == TypeCategory::Array
    }

    pub fn is_function(&self) -> bool {
        self.category == TypeCategory::Function
    }

    pub fn is_enum_member(&self) -> bool {
        self.category == TypeCategory::EnumMember
    }

    /// The type of one slot of an array type.
    pub fn element_type(&self) -> Type {
        Type::with_specifier(self.specifier)
    }

    pub fn add_member(&mut self, token: Token, ty: Type) {
        self.members.push(Member::new(token, ty));
    }

    pub fn find_member(&self, name: &str) -> Option<&Member> {
        self.members.iter().find(|m| m.token.lexeme == name)
    }

    pub fn add_param(&mut self, token: Token, ty: Type) {
        self.params.push(Member::new(token, ty));
    }

    pub fn find_param(&self, name: &str) -> Option<&Member> {
        self.params.iter().find(|p| p.token.lexeme == name)
    }
}

impl fmt::Display for TypeSpecifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TypeSpecifier::None => "NONE",
            TypeSpecifier::I8 => "I8",
            TypeSpecifier::I16 => "I16",
            TypeSpecifier::I32 => "I32",
            TypeSpecifier::I64 => "I64",
            TypeSpecifier::U8 => "U8",
            TypeSpecifier::U16 => "U16",
            TypeSpecifier::U32 => "U32",
            TypeSpecifier::U64 => "U64",
            TypeSpecifier::F32 => "F32",
            TypeSpecifier::F64 => "F64",
            TypeSpecifier::Bool => "bool",
            TypeSpecifier::Char => "char",
            TypeSpecifier::String => "string",
            TypeSpecifier::Enum => "enum",
            TypeSpecifier::Struct => "struct",
            TypeSpecifier::Void => "void",
        };
        write!(f, "{}", name)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_function() {
            write!(f, "Fn::")?;
        }
        write!(f, "{}", self.specifier)?;
        if self.is_array() {
            write!(f, "[{}]", self.array_size)?;
        }
        Ok(())
    }
}
