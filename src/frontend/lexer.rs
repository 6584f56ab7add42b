//! Lexer for OxC Lang
//!
//! Converts source code into a stream of tokens. Lexical errors become
//! error tokens and scanning continues.

use std::collections::HashMap;

use crate::frontend::delimiters::{self, Delimiter};
use crate::frontend::token::{Token, TokenKind, DOUBLE_SYMBOLS, KEYWORDS};
use crate::utils::Span;

const MAX_IDENT_LEN: usize = 15;
const MAX_INT_DIGITS: usize = 10;
const MAX_FRACTION_DIGITS: usize = 6;

/// Characters accepted after a backslash in string and character literals
const ESCAPES: &str = "\\\"'@nt";

/// Saved scanner position, used to rewind a speculative keyword match
#[derive(Debug, Clone, Copy)]
struct Checkpoint {
    pos: usize,
    line: usize,
    column: usize,
}

/// The lexer state
pub struct Lexer {
    source: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
    /// Identifier name to its synthetic tag number, owned by this run
    identifiers: HashMap<String, usize>,
    tokens: Vec<Token>,
}

impl Lexer {
    /// Create a new lexer for the given source code
    pub fn new(source: &str) -> Self {
        Self {
            source: source.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
            identifiers: HashMap::new(),
            tokens: Vec::new(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.source.get(self.pos).copied()
    }

    fn peek_next(&self) -> Option<char> {
        self.source.get(self.pos + 1).copied()
    }

    /// Advance to the next character, tracking line and column
    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn advance_if(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn is_at_end(&self) -> bool {
        self.pos >= self.source.len()
    }

    fn checkpoint(&self) -> Checkpoint {
        Checkpoint { pos: self.pos, line: self.line, column: self.column }
    }

    fn rewind(&mut self, mark: Checkpoint) {
        self.pos = mark.pos;
        self.line = mark.line;
        self.column = mark.column;
    }

    fn span_at(mark: Checkpoint) -> Span {
        Span::new(mark.line, mark.column)
    }

    fn text_from(&self, mark: Checkpoint) -> String {
        self.source[mark.pos..self.pos].iter().collect()
    }

    fn push(&mut self, token: Token) {
        log::trace!("{} {:?} at {}", token.tag(), token.lexeme, token.span);
        self.tokens.push(token);
    }

    /// Push `token` if the next character satisfies `rule`, else an error in its place
    fn push_checked(&mut self, token: Token, rule: Delimiter) {
        let next = self.peek();
        if rule(next) {
            self.push(token);
        } else {
            let c = next.unwrap_or(' ');
            let message = format!("Invalid delimiter '{}' after '{}'", c, token.lexeme);
            self.push(Token::error(message, token.lexeme, token.span));
        }
    }

    /// Tokenize the entire source
    pub fn tokenize(&mut self) -> Vec<Token> {
        while !self.is_at_end() {
            if self.skip_trivia() {
                continue;
            }
            self.next_token();
        }

        let errors = self.tokens.iter().filter(|t| t.is_error()).count();
        log::debug!(
            "lexed {} tokens ({} errors, {} identifiers)",
            self.tokens.len(),
            errors,
            self.identifiers.len()
        );
        std::mem::take(&mut self.tokens)
    }

    /// Skip one run of whitespace or one comment. Returns false if nothing was skipped.
    fn skip_trivia(&mut self) -> bool {
        match (self.peek(), self.peek_next()) {
            (Some(c), _) if c.is_whitespace() => {
                while matches!(self.peek(), Some(c) if c.is_whitespace()) {
                    self.advance();
                }
                true
            }
            // Line comment
            (Some('/'), Some('/')) => {
                while matches!(self.peek(), Some(c) if c != '\n') {
                    self.advance();
                }
                true
            }
            // Block comment, \* ... *\ with nesting
            (Some('\\'), Some('*')) => {
                let start = self.checkpoint();
                self.advance();
                self.advance();
                let mut depth = 1;
                while depth > 0 && !self.is_at_end() {
                    match (self.peek(), self.peek_next()) {
                        (Some('*'), Some('\\')) => {
                            self.advance();
                            self.advance();
                            depth -= 1;
                        }
                        (Some('\\'), Some('*')) => {
                            self.advance();
                            self.advance();
                            depth += 1;
                        }
                        _ => {
                            self.advance();
                        }
                    }
                }
                if depth > 0 {
                    self.push(Token::error(
                        "Unterminated block comment",
                        "\\*",
                        Self::span_at(start),
                    ));
                }
                true
            }
            _ => false,
        }
    }

    /// Scan the token at the current position
    fn next_token(&mut self) {
        let Some(c) = self.peek() else { return };

        if c == '"' {
            self.scan_quoted('"');
        } else if c == '\'' {
            self.scan_quoted('\'');
        } else if c.is_ascii_digit() || (c == '-' && self.starts_negative_number()) {
            self.scan_number();
        } else if c.is_ascii_alphabetic() {
            if let Some(token) = self.scan_keyword() {
                self.push(token);
            } else {
                self.scan_identifier();
            }
        } else if self.scan_symbol() {
            // pushed
        } else if c == '_' {
            self.scan_invalid_identifier();
        } else {
            let start = self.checkpoint();
            self.advance();
            self.push(Token::error(
                format!("Invalid character '{}'", c),
                c.to_string(),
                Self::span_at(start),
            ));
        }
    }

    /// A `-` starts a negative literal when a digit follows and the previous
    /// non-whitespace character cannot end an operand
    fn starts_negative_number(&self) -> bool {
        if !matches!(self.peek_next(), Some(d) if d.is_ascii_digit()) {
            return false;
        }
        let previous = self.source[..self.pos].iter().rev().find(|c| !c.is_whitespace());
        match previous {
            Some(p) => !(p.is_alphanumeric() || matches!(p, ')' | ']' | '}')),
            None => true,
        }
    }

    // ==================== Literals ====================

    fn scan_number(&mut self) {
        let start = self.checkpoint();
        self.advance_if('-');

        let mut dots = 0;
        while let Some(c) = self.peek() {
            if c == '.' {
                dots += 1;
            } else if !c.is_ascii_digit() {
                break;
            }
            self.advance();
        }

        let text = self.text_from(start);
        let span = Self::span_at(start);

        if dots == 1 && text.ends_with('.') {
            let message = format!("Invalid number '{}': number after dot expected", text);
            self.push(Token::error(message, text, span));
            return;
        }
        if dots > 1 {
            let message = format!("Invalid number '{}': multiple decimal points", text);
            self.push(Token::error(message, text, span));
            return;
        }
        if matches!(self.peek(), Some(c) if c.is_alphanumeric() || c == '_') {
            while matches!(self.peek(), Some(c) if c.is_alphanumeric() || c == '_' || c == '.') {
                self.advance();
            }
            let text = self.text_from(start);
            let message = format!("Invalid number '{}'", text);
            self.push(Token::error(message, text, span));
            return;
        }

        let unsigned = text.trim_start_matches('-');
        let token = match unsigned.split_once('.') {
            None if unsigned.len() > MAX_INT_DIGITS => {
                let message = format!("Integer literal '{}' exceeds {} digits", text, MAX_INT_DIGITS);
                Token::error(message, text, span)
            }
            None => Token::new(TokenKind::IntLit, text, span),
            Some((int, frac)) if int.len() > MAX_INT_DIGITS || frac.len() > MAX_FRACTION_DIGITS => {
                let message = format!(
                    "Float literal '{}' exceeds {} integer or {} fractional digits",
                    text, MAX_INT_DIGITS, MAX_FRACTION_DIGITS
                );
                Token::error(message, text, span)
            }
            Some(_) => Token::new(TokenKind::FloatLit, text, span),
        };

        if token.is_error() {
            self.push(token);
        } else {
            self.push_checked(token, delimiters::number);
        }
    }

    /// Scan a string (`"`) or character (`'`) literal
    fn scan_quoted(&mut self, quote: char) {
        let start = self.checkpoint();
        let is_char = quote == '\'';
        let what = if is_char { "character" } else { "string" };
        self.advance();

        let mut content = String::new();
        let mut logical_chars = 0;
        let mut escape_errors = Vec::new();
        let mut closed = false;

        while let Some(c) = self.peek() {
            if c == quote {
                self.advance();
                closed = true;
                break;
            }
            if c == '\n' {
                break;
            }
            if c == '\\' {
                let escape = self.checkpoint();
                self.advance();
                match self.peek() {
                    Some(e) if ESCAPES.contains(e) => {
                        self.advance();
                        content.push('\\');
                        content.push(e);
                    }
                    Some(e) if e != '\n' => {
                        self.advance();
                        content.push('\\');
                        content.push(e);
                        escape_errors.push(Token::error(
                            format!("Unknown escape sequence '\\{}'", e),
                            format!("\\{}", e),
                            Self::span_at(escape),
                        ));
                    }
                    _ => content.push('\\'),
                }
                logical_chars += 1;
                continue;
            }
            self.advance();
            content.push(c);
            logical_chars += 1;
        }

        let text = self.text_from(start);
        let span = Self::span_at(start);

        if !closed {
            let message = if content.is_empty() {
                format!("Unterminated {} literal", what)
            } else {
                format!("Unterminated {} literal {}{}{}", what, quote, content, quote)
            };
            self.push(Token::error(message, text, span));
            self.tokens.extend(escape_errors);
            return;
        }

        if is_char && logical_chars > 1 {
            let message = format!("Character literal {} must contain at most one character", text);
            self.push(Token::error(message, text, span));
            self.tokens.extend(escape_errors);
            return;
        }

        let (kind, rule): (TokenKind, Delimiter) = if is_char {
            (TokenKind::CharLit, delimiters::single_quote)
        } else {
            (TokenKind::StringLit, delimiters::double_quote)
        };
        self.push_checked(Token::new(kind, text, span), rule);
        self.tokens.extend(escape_errors);
    }

    // ==================== Words ====================

    /// Try each keyword spelling; rewinds and returns None if no exact word matches
    fn scan_keyword(&mut self) -> Option<Token> {
        for spelling in KEYWORDS {
            let mark = self.checkpoint();
            let consumed = spelling.chars().all(|k| self.advance_if(k));
            let extends = matches!(self.peek(), Some(c) if c.is_alphanumeric() || c == '_');
            if !consumed || extends {
                self.rewind(mark);
                continue;
            }

            let kind = TokenKind::keyword_from_str(spelling)?;
            let span = Self::span_at(mark);
            let token = match self.peek() {
                None => Token::error(
                    format!("Missing delimiter after keyword '{}' at end of input", spelling),
                    *spelling,
                    span,
                ),
                Some(c) if !delimiters::for_keyword(&kind)(Some(c)) => Token::error(
                    format!("Invalid character '{}' after keyword '{}'", c, spelling),
                    *spelling,
                    span,
                ),
                Some(_) => Token::new(kind, *spelling, span),
            };
            return Some(token);
        }
        None
    }

    fn scan_word(&mut self) -> String {
        let start = self.checkpoint();
        while matches!(self.peek(), Some(c) if c.is_alphanumeric() || c == '_') {
            self.advance();
        }
        self.text_from(start)
    }

    fn scan_identifier(&mut self) {
        let start = self.checkpoint();
        let name = self.scan_word();
        let span = Self::span_at(start);

        if name.chars().count() > MAX_IDENT_LEN {
            let message = format!("Identifier '{}' exceeds maximum length of {}", name, MAX_IDENT_LEN);
            self.push(Token::error(message, name, span));
            return;
        }

        let next_tag = self.identifiers.len() + 1;
        let tag = *self.identifiers.entry(name.clone()).or_insert(next_tag);
        self.push_checked(Token::new(TokenKind::Ident(tag), name, span), delimiters::identifier);
    }

    fn scan_invalid_identifier(&mut self) {
        let start = self.checkpoint();
        let word = self.scan_word();
        let message = format!("Invalid identifier '{}': identifiers cannot start with '_'", word);
        self.push(Token::error(message, word, Self::span_at(start)));
    }

    // ==================== Symbols ====================

    /// Scan an operator or punctuation symbol. Returns false if none starts here.
    fn scan_symbol(&mut self) -> bool {
        let Some(c) = self.peek() else { return false };
        let start = self.checkpoint();

        let pair: Option<String> = self.peek_next().map(|n| [c, n].iter().collect());
        let (text, kind) = match pair
            .filter(|p| DOUBLE_SYMBOLS.contains(&p.as_str()))
            .and_then(|p| TokenKind::symbol_from_str(&p).map(|k| (p, k)))
        {
            Some(found) => found,
            None => match TokenKind::symbol_from_str(&c.to_string()) {
                Some(kind) => (c.to_string(), kind),
                None => return false,
            },
        };

        for _ in text.chars() {
            self.advance();
        }
        let rule = delimiters::for_symbol(&kind);
        self.push_checked(Token::new(kind, text, Self::span_at(start)), rule);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn lex(source: &str) -> Vec<Token> {
        Lexer::new(source).tokenize()
    }

    fn tags(source: &str) -> Vec<String> {
        lex(source).iter().map(|t| t.tag().into_owned()).collect()
    }

    fn errors(source: &str) -> Vec<String> {
        lex(source)
            .iter()
            .filter_map(|t| t.message().map(str::to_string))
            .collect()
    }

    #[test]
    fn test_simple_declaration() {
        assert_eq!(tags("int x = 5~"), vec!["int", "id1", "=", "int_lit", "~"]);
    }

    #[test]
    fn test_keyword_prefix_is_identifier() {
        let tokens = lex("integer~");
        assert!(matches!(tokens[0].kind, TokenKind::Ident(1)));
        assert_eq!(tokens[0].lexeme, "integer");
        assert_eq!(tokens.len(), 2);
    }

    #[test]
    fn test_else_and_elseif() {
        assert_eq!(tags("} elseif (x) { } else {"), vec!["}", "elseif", "(", "id1", ")", "{", "}", "else", "{"]);
    }

    #[test]
    fn test_identifier_numbering_restarts() {
        let source = "a b a c";
        assert_eq!(tags(source), vec!["id1", "id2", "id1", "id3"]);
        assert_eq!(lex(source), lex(source));
    }

    #[test]
    fn test_positions() {
        let tokens = lex("int x~\n  x++~");
        assert_eq!(tokens[0].span, Span::new(1, 1));
        assert_eq!(tokens[1].span, Span::new(1, 5));
        assert_eq!(tokens[3].span, Span::new(2, 3));
        assert_eq!(tokens[4].lexeme, "++");
    }

    #[test]
    fn test_minus_disambiguation() {
        assert_eq!(tags("x-1"), vec!["id1", "-", "int_lit"]);
        let tokens = lex("(-1)");
        assert_eq!(tokens[1].kind, TokenKind::IntLit);
        assert_eq!(tokens[1].lexeme, "-1");
    }

    #[test]
    fn test_number_errors() {
        assert_eq!(errors("12345678901~"), vec!["Integer literal '12345678901' exceeds 10 digits"]);
        assert_eq!(
            errors("1.1234567~"),
            vec!["Float literal '1.1234567' exceeds 10 integer or 6 fractional digits"]
        );
        assert_eq!(errors("12. "), vec!["Invalid number '12.': number after dot expected"]);
        assert_eq!(errors("1.2.3~"), vec!["Invalid number '1.2.3': multiple decimal points"]);
        assert_eq!(errors("12abc~"), vec!["Invalid number '12abc'"]);
        assert!(errors("1234567890 3.141592~").is_empty());
    }

    #[test]
    fn test_string_and_char_literals() {
        let tokens = lex(r#""hi \n @{x}" 'a' '\t'"#);
        assert_eq!(tokens[0].kind, TokenKind::StringLit);
        assert_eq!(tokens[0].lexeme, r#""hi \n @{x}""#);
        assert_eq!(tokens[1].kind, TokenKind::CharLit);
        assert_eq!(tokens[2].kind, TokenKind::CharLit);
    }

    #[test]
    fn test_literal_errors() {
        assert_eq!(errors("\"abc"), vec!["Unterminated string literal \"abc\""]);
        assert_eq!(errors("\""), vec!["Unterminated string literal"]);
        assert_eq!(errors("'ab' "), vec!["Character literal 'ab' must contain at most one character"]);
        assert_eq!(errors("\"a\\qb\" "), vec!["Unknown escape sequence '\\q'"]);
    }

    #[test]
    fn test_identifier_errors() {
        assert_eq!(
            errors("abcdefghijklmnop~"),
            vec!["Identifier 'abcdefghijklmnop' exceeds maximum length of 15"]
        );
        assert_eq!(
            errors("_tmp~"),
            vec!["Invalid identifier '_tmp': identifiers cannot start with '_'"]
        );
        assert_eq!(errors("$"), vec!["Invalid character '$'"]);
    }

    #[test]
    fn test_keyword_delimiters() {
        assert_eq!(errors("int("), vec!["Invalid character '(' after keyword 'int'"]);
        assert_eq!(errors("gasp"), vec!["Missing delimiter after keyword 'gasp' at end of input"]);
        assert!(errors("if(x)").is_empty());
    }

    #[test]
    fn test_symbol_delimiters() {
        assert_eq!(errors("x = 1~5"), vec!["Invalid delimiter '5' after '~'"]);
        assert_eq!(errors("! x"), vec!["Invalid delimiter ' ' after '!'"]);
        assert!(errors("x += 2~ y == -3~").is_empty());
    }

    #[test]
    fn test_comments() {
        let source = "// line\nint \\* outer \\* inner *\\ still *\\ x~";
        assert_eq!(tags(source), vec!["int", "id1", "~"]);
        assert_eq!(errors("\\* open"), vec!["Unterminated block comment"]);
    }
}
