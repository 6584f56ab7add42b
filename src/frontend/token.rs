//! Token definitions for OxC Lang

use std::borrow::Cow;
use std::fmt;

use serde::ser::{Serialize, SerializeStruct, Serializer};

use crate::utils::Span;

/// A token produced by the lexer
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Exact source text (literals keep their quotes and sign)
    pub lexeme: String,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, lexeme: impl Into<String>, span: Span) -> Self {
        Self { kind, lexeme: lexeme.into(), span }
    }

    /// An error token carrying its diagnostic
    pub fn error(message: impl Into<String>, lexeme: impl Into<String>, span: Span) -> Self {
        Self::new(TokenKind::Error(message.into()), lexeme, span)
    }

    pub fn is_error(&self) -> bool {
        matches!(self.kind, TokenKind::Error(_))
    }

    /// The diagnostic of an error token
    pub fn message(&self) -> Option<&str> {
        match &self.kind {
            TokenKind::Error(message) => Some(message),
            _ => None,
        }
    }

    /// Terminal tag used by the grammar
    pub fn tag(&self) -> Cow<'static, str> {
        self.kind.tag()
    }
}

impl Serialize for Token {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Token", 6)?;
        state.serialize_field("type", &self.tag())?;
        state.serialize_field("value", &self.lexeme)?;
        state.serialize_field("line", &self.span.line)?;
        state.serialize_field("column", &self.span.column)?;
        state.serialize_field("is_error", &self.is_error())?;
        if let Some(message) = self.message() {
            state.serialize_field("message", message)?;
        } else {
            state.skip_field("message")?;
        }
        state.end()
    }
}

/// Token kinds
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TokenKind {
    // ============ Data Types ============
    /// int
    IntType,
    /// float
    FloatType,
    /// char
    CharType,
    /// string
    StringType,
    /// bool
    BoolType,

    // ============ Keywords ============
    /// universal (global declaration)
    Universal,
    /// air (function)
    Air,
    /// atmosphere (entry block)
    Atmosphere,
    /// vacuum (no return value)
    Vacuum,
    /// gust (structure)
    Gust,
    /// wind (constant)
    Wind,
    /// inhale (input)
    Inhale,
    /// exhale (output)
    Exhale,
    If,
    Elseif,
    Else,
    /// stream (switch)
    Stream,
    Case,
    /// diffuse (default)
    Diffuse,
    /// resist (break)
    Resist,
    /// flow (continue)
    Flow,
    /// cycle (while)
    Cycle,
    /// echo (for)
    Echo,
    Do,
    /// gasp (return)
    Gasp,
    /// yuh (true)
    Yuh,
    /// naur (false)
    Naur,

    // ============ Builtins ============
    ToRise,
    ToFall,
    Horizon,
    SizeOf,
    ToInt,
    ToFloat,
    ToString,
    ToChar,
    ToBool,
    Waft,

    // ============ Literals ============
    IntLit,
    FloatLit,
    CharLit,
    StringLit,
    /// Identifier, numbered per lexer run in first-seen order
    Ident(usize),

    // ============ Operators ============
    /// +
    Plus,
    /// -
    Minus,
    /// *
    Star,
    /// /
    Slash,
    /// %
    Percent,
    /// =
    Assign,
    /// +=
    PlusAssign,
    /// -=
    MinusAssign,
    /// *=
    StarAssign,
    /// /=
    SlashAssign,
    /// %=
    PercentAssign,
    /// ==
    EqEq,
    /// !=
    NotEq,
    /// <
    Lt,
    /// >
    Gt,
    /// <=
    LtEq,
    /// >=
    GtEq,
    /// &&
    AndAnd,
    /// ||
    OrOr,
    /// !
    Not,
    /// & (concatenation)
    Amp,
    /// ++
    PlusPlus,
    /// --
    MinusMinus,

    // ============ Punctuation ============
    /// ~ (statement terminator)
    Tilde,
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Dot,
    Colon,

    /// Lexical error with its diagnostic
    Error(String),
}

/// Keyword spellings, tried in order by the lexer
pub const KEYWORDS: &[&str] = &[
    "int", "float", "char", "string", "bool",
    "universal", "air", "atmosphere", "vacuum", "gust", "wind",
    "inhale", "exhale", "if", "elseif", "else", "stream", "case", "diffuse",
    "resist", "flow", "cycle", "echo", "do", "gasp", "yuh", "naur",
    "toRise", "toFall", "horizon", "sizeOf", "toInt", "toFloat", "toString", "toChar",
    "toBool", "waft",
];

/// Two-character operators
pub const DOUBLE_SYMBOLS: &[&str] = &[
    "+=", "-=", "*=", "/=", "%=", "==", "!=", "<=", ">=", "&&", "||", "++", "--",
];

impl TokenKind {
    pub fn keyword_from_str(s: &str) -> Option<TokenKind> {
        let kind = match s {
            "int" => TokenKind::IntType,
            "float" => TokenKind::FloatType,
            "char" => TokenKind::CharType,
            "string" => TokenKind::StringType,
            "bool" => TokenKind::BoolType,
            "universal" => TokenKind::Universal,
            "air" => TokenKind::Air,
            "atmosphere" => TokenKind::Atmosphere,
            "vacuum" => TokenKind::Vacuum,
            "gust" => TokenKind::Gust,
            "wind" => TokenKind::Wind,
            "inhale" => TokenKind::Inhale,
            "exhale" => TokenKind::Exhale,
            "if" => TokenKind::If,
            "elseif" => TokenKind::Elseif,
            "else" => TokenKind::Else,
            "stream" => TokenKind::Stream,
            "case" => TokenKind::Case,
            "diffuse" => TokenKind::Diffuse,
            "resist" => TokenKind::Resist,
            "flow" => TokenKind::Flow,
            "cycle" => TokenKind::Cycle,
            "echo" => TokenKind::Echo,
            "do" => TokenKind::Do,
            "gasp" => TokenKind::Gasp,
            "yuh" => TokenKind::Yuh,
            "naur" => TokenKind::Naur,
            "toRise" => TokenKind::ToRise,
            "toFall" => TokenKind::ToFall,
            "horizon" => TokenKind::Horizon,
            "sizeOf" => TokenKind::SizeOf,
            "toInt" => TokenKind::ToInt,
            "toFloat" => TokenKind::ToFloat,
            "toString" => TokenKind::ToString,
            "toChar" => TokenKind::ToChar,
            "toBool" => TokenKind::ToBool,
            "waft" => TokenKind::Waft,
            _ => return None,
        };
        Some(kind)
    }

    pub fn symbol_from_str(s: &str) -> Option<TokenKind> {
        let kind = match s {
            "+" => TokenKind::Plus,
            "-" => TokenKind::Minus,
            "*" => TokenKind::Star,
            "/" => TokenKind::Slash,
            "%" => TokenKind::Percent,
            "=" => TokenKind::Assign,
            "+=" => TokenKind::PlusAssign,
            "-=" => TokenKind::MinusAssign,
            "*=" => TokenKind::StarAssign,
            "/=" => TokenKind::SlashAssign,
            "%=" => TokenKind::PercentAssign,
            "==" => TokenKind::EqEq,
            "!=" => TokenKind::NotEq,
            "<" => TokenKind::Lt,
            ">" => TokenKind::Gt,
            "<=" => TokenKind::LtEq,
            ">=" => TokenKind::GtEq,
            "&&" => TokenKind::AndAnd,
            "||" => TokenKind::OrOr,
            "!" => TokenKind::Not,
            "&" => TokenKind::Amp,
            "++" => TokenKind::PlusPlus,
            "--" => TokenKind::MinusMinus,
            "~" => TokenKind::Tilde,
            "(" => TokenKind::LParen,
            ")" => TokenKind::RParen,
            "{" => TokenKind::LBrace,
            "}" => TokenKind::RBrace,
            "[" => TokenKind::LBracket,
            "]" => TokenKind::RBracket,
            "," => TokenKind::Comma,
            "." => TokenKind::Dot,
            ":" => TokenKind::Colon,
            _ => return None,
        };
        Some(kind)
    }

    /// Fixed spelling of keywords, builtins and symbols
    pub fn spelling(&self) -> Option<&'static str> {
        let s = match self {
            TokenKind::IntType => "int",
            TokenKind::FloatType => "float",
            TokenKind::CharType => "char",
            TokenKind::StringType => "string",
            TokenKind::BoolType => "bool",
            TokenKind::Universal => "universal",
            TokenKind::Air => "air",
            TokenKind::Atmosphere => "atmosphere",
            TokenKind::Vacuum => "vacuum",
            TokenKind::Gust => "gust",
            TokenKind::Wind => "wind",
            TokenKind::Inhale => "inhale",
            TokenKind::Exhale => "exhale",
            TokenKind::If => "if",
            TokenKind::Elseif => "elseif",
            TokenKind::Else => "else",
            TokenKind::Stream => "stream",
            TokenKind::Case => "case",
            TokenKind::Diffuse => "diffuse",
            TokenKind::Resist => "resist",
            TokenKind::Flow => "flow",
            TokenKind::Cycle => "cycle",
            TokenKind::Echo => "echo",
            TokenKind::Do => "do",
            TokenKind::Gasp => "gasp",
            TokenKind::Yuh => "yuh",
            TokenKind::Naur => "naur",
            TokenKind::ToRise => "toRise",
            TokenKind::ToFall => "toFall",
            TokenKind::Horizon => "horizon",
            TokenKind::SizeOf => "sizeOf",
            TokenKind::ToInt => "toInt",
            TokenKind::ToFloat => "toFloat",
            TokenKind::ToString => "toString",
            TokenKind::ToChar => "toChar",
            TokenKind::ToBool => "toBool",
            TokenKind::Waft => "waft",
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Star => "*",
            TokenKind::Slash => "/",
            TokenKind::Percent => "%",
            TokenKind::Assign => "=",
            TokenKind::PlusAssign => "+=",
            TokenKind::MinusAssign => "-=",
            TokenKind::StarAssign => "*=",
            TokenKind::SlashAssign => "/=",
            TokenKind::PercentAssign => "%=",
            TokenKind::EqEq => "==",
            TokenKind::NotEq => "!=",
            TokenKind::Lt => "<",
            TokenKind::Gt => ">",
            TokenKind::LtEq => "<=",
            TokenKind::GtEq => ">=",
            TokenKind::AndAnd => "&&",
            TokenKind::OrOr => "||",
            TokenKind::Not => "!",
            TokenKind::Amp => "&",
            TokenKind::PlusPlus => "++",
            TokenKind::MinusMinus => "--",
            TokenKind::Tilde => "~",
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::LBrace => "{",
            TokenKind::RBrace => "}",
            TokenKind::LBracket => "[",
            TokenKind::RBracket => "]",
            TokenKind::Comma => ",",
            TokenKind::Dot => ".",
            TokenKind::Colon => ":",
            TokenKind::IntLit
            | TokenKind::FloatLit
            | TokenKind::CharLit
            | TokenKind::StringLit
            | TokenKind::Ident(_)
            | TokenKind::Error(_) => return None,
        };
        Some(s)
    }

    /// Terminal tag: the spelling, a literal class, or `idN`
    pub fn tag(&self) -> Cow<'static, str> {
        match self {
            TokenKind::IntLit => Cow::Borrowed("int_lit"),
            TokenKind::FloatLit => Cow::Borrowed("float_lit"),
            TokenKind::CharLit => Cow::Borrowed("char_lit"),
            TokenKind::StringLit => Cow::Borrowed("string_lit"),
            TokenKind::Ident(n) => Cow::Owned(format!("id{}", n)),
            TokenKind::Error(_) => Cow::Borrowed("error"),
            other => Cow::Borrowed(other.spelling().unwrap_or("?")),
        }
    }

    pub fn is_data_type(&self) -> bool {
        matches!(
            self,
            TokenKind::IntType
                | TokenKind::FloatType
                | TokenKind::CharType
                | TokenKind::StringType
                | TokenKind::BoolType
        )
    }

    pub fn is_builtin(&self) -> bool {
        matches!(
            self,
            TokenKind::ToRise
                | TokenKind::ToFall
                | TokenKind::Horizon
                | TokenKind::SizeOf
                | TokenKind::ToInt
                | TokenKind::ToFloat
                | TokenKind::ToString
                | TokenKind::ToChar
                | TokenKind::ToBool
                | TokenKind::Waft
        )
    }

    pub fn is_ident(&self) -> bool {
        matches!(self, TokenKind::Ident(_))
    }

    pub fn is_keyword(&self) -> bool {
        self.spelling()
            .map_or(false, |s| s.starts_with(|c: char| c.is_ascii_alphabetic()))
    }

    pub fn is_assign_op(&self) -> bool {
        matches!(
            self,
            TokenKind::Assign
                | TokenKind::PlusAssign
                | TokenKind::MinusAssign
                | TokenKind::StarAssign
                | TokenKind::SlashAssign
                | TokenKind::PercentAssign
        )
    }

    pub fn is_relational(&self) -> bool {
        matches!(
            self,
            TokenKind::Gt
                | TokenKind::Lt
                | TokenKind::GtEq
                | TokenKind::LtEq
                | TokenKind::EqEq
                | TokenKind::NotEq
        )
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tag())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_keyword_table_is_consistent() {
        for spelling in KEYWORDS {
            let kind = TokenKind::keyword_from_str(spelling).unwrap();
            assert_eq!(kind.spelling(), Some(*spelling));
            assert!(kind.is_keyword());
        }
    }

    #[test]
    fn test_double_symbols_resolve() {
        for spelling in DOUBLE_SYMBOLS {
            let kind = TokenKind::symbol_from_str(spelling).unwrap();
            assert_eq!(kind.tag(), *spelling);
        }
    }

    #[test]
    fn test_identifier_tag() {
        assert_eq!(TokenKind::Ident(3).tag(), "id3");
        assert_eq!(TokenKind::StringLit.tag(), "string_lit");
        assert!(!TokenKind::Ident(1).is_keyword());
    }
}
