//! Follow-delimiter predicates
//!
//! Each lexeme class restricts the character allowed right after it.
//! `None` stands for end of input and is always accepted.

use crate::frontend::token::TokenKind;

/// A follow-delimiter predicate
pub type Delimiter = fn(Option<char>) -> bool;

const OPERATOR: &str = "+-*/%<>&|=!";
const LOGICAL: &str = "&|";

fn accepts(c: Option<char>, test: impl Fn(char) -> bool) -> bool {
    match c {
        None => true,
        Some(c) => test(c),
    }
}

fn is_operator(c: char) -> bool {
    OPERATOR.contains(c)
}

// ==================== Keywords ====================

pub fn space_only(c: Option<char>) -> bool {
    accepts(c, char::is_whitespace)
}

pub fn function(c: Option<char>) -> bool {
    accepts(c, |c| c.is_whitespace() || c == '(')
}

pub fn do_block(c: Option<char>) -> bool {
    accepts(c, |c| c.is_whitespace() || c == '{')
}

pub fn control(c: Option<char>) -> bool {
    accepts(c, |c| c.is_whitespace() || c == '~')
}

pub fn stream(c: Option<char>) -> bool {
    accepts(c, |c| c.is_whitespace() || c == ':')
}

pub fn boolean(c: Option<char>) -> bool {
    accepts(c, |c| c.is_whitespace() || "~,)".contains(c) || LOGICAL.contains(c))
}

// ==================== Literals and identifiers ====================

pub fn number(c: Option<char>) -> bool {
    accepts(c, |c| c.is_whitespace() || is_operator(c) || ",~)]}:".contains(c))
}

pub fn single_quote(c: Option<char>) -> bool {
    accepts(c, |c| c.is_whitespace() || c == '=' || ",~)}:".contains(c))
}

pub fn double_quote(c: Option<char>) -> bool {
    accepts(c, |c| c.is_whitespace() || c == '=' || ",~+)}&".contains(c))
}

pub fn identifier(c: Option<char>) -> bool {
    accepts(c, |c| c.is_whitespace() || is_operator(c) || "(),.~[]{}".contains(c))
}

// ==================== Operators ====================

pub fn terminator(c: Option<char>) -> bool {
    accepts(c, |c| c.is_whitespace() || c.is_alphabetic() || c == '}')
}

pub fn assign(c: Option<char>) -> bool {
    accepts(c, |c| c.is_whitespace() || c.is_alphanumeric() || "({-".contains(c))
}

pub fn equal(c: Option<char>) -> bool {
    accepts(c, |c| c.is_whitespace() || c.is_alphanumeric() || "(\"'{-".contains(c))
}

/// `!` must touch its operand
pub fn not(c: Option<char>) -> bool {
    accepts(c, |c| c.is_alphabetic() || c == '(')
}

pub fn equality(c: Option<char>) -> bool {
    accepts(c, |c| c.is_whitespace() || c.is_alphanumeric() || "\"'(-".contains(c))
}

pub fn relational(c: Option<char>) -> bool {
    accepts(c, |c| c.is_whitespace() || c.is_alphanumeric() || "-('".contains(c))
}

pub fn logical(c: Option<char>) -> bool {
    accepts(c, |c| c.is_whitespace() || c.is_alphanumeric() || "-(!".contains(c))
}

pub fn colon(c: Option<char>) -> bool {
    accepts(c, |c| c.is_whitespace() || c.is_alphabetic())
}

pub fn arithmetic(c: Option<char>) -> bool {
    accepts(c, |c| c.is_whitespace() || c.is_alphanumeric() || "('-".contains(c))
}

pub fn subtract(c: Option<char>) -> bool {
    accepts(c, |c| c.is_whitespace() || c.is_alphanumeric() || "('".contains(c))
}

pub fn ampersand(c: Option<char>) -> bool {
    accepts(c, |c| c.is_whitespace() || "\"'".contains(c))
}

pub fn unary(c: Option<char>) -> bool {
    accepts(c, |c| c.is_whitespace() || c.is_alphabetic() || "~)],".contains(c))
}

pub fn comma(c: Option<char>) -> bool {
    accepts(c, |c| c.is_whitespace() || c.is_alphanumeric() || "\"'-{(".contains(c))
}

/// `.` must touch the member name
pub fn dot(c: Option<char>) -> bool {
    accepts(c, char::is_alphabetic)
}

// ==================== Brackets ====================

pub fn close_curly(c: Option<char>) -> bool {
    accepts(c, |c| c.is_whitespace() || c.is_alphabetic() || "~},".contains(c))
}

pub fn close_paren(c: Option<char>) -> bool {
    accepts(c, |c| c.is_whitespace() || is_operator(c) || "~}{)],".contains(c))
}

pub fn close_square(c: Option<char>) -> bool {
    accepts(c, |c| c.is_whitespace() || is_operator(c) || ",~)[]".contains(c))
}

pub fn open_curly(c: Option<char>) -> bool {
    accepts(c, |c| c.is_whitespace() || c.is_alphanumeric() || "\"'}{-".contains(c))
}

pub fn open_paren(c: Option<char>) -> bool {
    accepts(c, |c| c.is_whitespace() || c.is_alphanumeric() || "\"'()-!".contains(c))
}

pub fn open_square(c: Option<char>) -> bool {
    accepts(c, |c| c.is_whitespace() || c.is_alphanumeric() || "(]".contains(c))
}

// ==================== Lookup ====================

/// Delimiter rule for a keyword or builtin
pub fn for_keyword(kind: &TokenKind) -> Delimiter {
    match kind {
        TokenKind::Atmosphere
        | TokenKind::Inhale
        | TokenKind::Exhale
        | TokenKind::If
        | TokenKind::Elseif
        | TokenKind::Cycle
        | TokenKind::Stream
        | TokenKind::Echo => function,
        k if k.is_builtin() => function,
        TokenKind::Else | TokenKind::Do => do_block,
        TokenKind::Resist | TokenKind::Flow => control,
        TokenKind::Diffuse => stream,
        TokenKind::Yuh | TokenKind::Naur => boolean,
        _ => space_only,
    }
}

/// Delimiter rule for an operator or punctuation symbol
pub fn for_symbol(kind: &TokenKind) -> Delimiter {
    match kind {
        TokenKind::Assign => equal,
        TokenKind::PlusAssign
        | TokenKind::MinusAssign
        | TokenKind::StarAssign
        | TokenKind::SlashAssign
        | TokenKind::PercentAssign => assign,
        TokenKind::EqEq | TokenKind::NotEq => equality,
        TokenKind::Lt | TokenKind::Gt | TokenKind::LtEq | TokenKind::GtEq => relational,
        TokenKind::AndAnd | TokenKind::OrOr => logical,
        TokenKind::Plus | TokenKind::Star | TokenKind::Slash | TokenKind::Percent => arithmetic,
        TokenKind::Minus => subtract,
        TokenKind::PlusPlus | TokenKind::MinusMinus => unary,
        TokenKind::Not => not,
        TokenKind::Amp => ampersand,
        TokenKind::Comma => comma,
        TokenKind::Tilde => terminator,
        TokenKind::Colon => colon,
        TokenKind::Dot => dot,
        TokenKind::LBrace => open_curly,
        TokenKind::RBrace => close_curly,
        TokenKind::LParen => open_paren,
        TokenKind::RParen => close_paren,
        TokenKind::LBracket => open_square,
        TokenKind::RBracket => close_square,
        _ => space_only,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_end_of_input_always_accepted() {
        let rules: [Delimiter; 5] = [space_only, not, dot, ampersand, colon];
        for rule in rules {
            assert!(rule(None));
        }
    }

    #[test]
    fn test_keyword_rules() {
        assert!(for_keyword(&TokenKind::If)(Some('(')));
        assert!(!for_keyword(&TokenKind::IntType)(Some('(')));
        assert!(for_keyword(&TokenKind::Resist)(Some('~')));
        assert!(for_keyword(&TokenKind::Diffuse)(Some(':')));
        assert!(for_keyword(&TokenKind::Yuh)(Some('|')));
        assert!(for_keyword(&TokenKind::Waft)(Some('(')));
    }

    #[test]
    fn test_not_and_dot_require_contact() {
        assert!(!not(Some(' ')));
        assert!(not(Some('x')));
        assert!(!dot(Some(' ')));
        assert!(dot(Some('m')));
    }

    #[test]
    fn test_symbol_rules() {
        assert!(for_symbol(&TokenKind::Tilde)(Some('}')));
        assert!(!for_symbol(&TokenKind::Tilde)(Some('1')));
        assert!(for_symbol(&TokenKind::Minus)(Some('1')));
        assert!(!for_symbol(&TokenKind::Minus)(Some('-')));
        assert!(for_symbol(&TokenKind::RBracket)(Some('[')));
    }
}
