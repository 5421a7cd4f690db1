//! Byte-level lexer: UTF-8 source text → token stream.
//!
//! Newlines and semicolons are statement terminators and lex to a single
//! [`TokenKind::Newline`] per run. Comments (`#` to end of line) produce no
//! token. Identifiers may end in `?` or `!`; `!` only attaches when it is
//! not the start of `!=`.

use crate::error::{Error, Result};
use crate::token::{Token, TokenKind, keyword_kind};

/// Tokenize a whole source string, appending a trailing `Eof` token.
pub fn tokenize(source: &str) -> Result<Vec<Token>> {
    Lexer::new(source).run()
}

struct Lexer<'a> {
    source: &'a str,
    bytes: &'a [u8],
    position: usize,
    line: u32,
    column: u32,
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            bytes: source.as_bytes(),
            position: 0,
            line: 1,
            column: 1,
        }
    }

    fn run(mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                return Ok(tokens);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Cursor helpers
    // -----------------------------------------------------------------------

    fn peek(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.position + offset).copied()
    }

    fn current(&self) -> Option<u8> {
        self.peek(0)
    }

    /// Advance one byte, maintaining the line/column counters.
    fn advance(&mut self) {
        if let Some(b) = self.current() {
            if b == b'\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
            self.position += 1;
        }
    }

    fn error(&self, message: impl Into<String>) -> Error {
        Error::Lex {
            line: self.line,
            column: self.column,
            message: message.into(),
        }
    }

    /// Skip horizontal whitespace and comments. Stops at newlines, which are
    /// tokens of their own.
    fn skip_insignificant(&mut self) {
        while let Some(b) = self.current() {
            match b {
                b' ' | b'\t' | b'\r' => self.advance(),
                b'#' => {
                    while let Some(c) = self.current() {
                        if c == b'\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    // -----------------------------------------------------------------------
    // Token scanning
    // -----------------------------------------------------------------------

    fn next_token(&mut self) -> Result<Token> {
        self.skip_insignificant();

        let line = self.line;
        let column = self.column;

        let Some(b) = self.current() else {
            return Ok(Token::new(TokenKind::Eof, "", line, column));
        };

        // A run of newlines and semicolons collapses into one terminator.
        if b == b'\n' || b == b';' {
            while let Some(c) = self.current() {
                match c {
                    b'\n' | b';' => self.advance(),
                    b' ' | b'\t' | b'\r' => self.advance(),
                    b'#' => self.skip_insignificant(),
                    _ => break,
                }
            }
            return Ok(Token::new(TokenKind::Newline, "\n", line, column));
        }

        if b.is_ascii_digit() {
            return self.read_number(line, column);
        }
        if b.is_ascii_lowercase() || b == b'_' {
            return Ok(self.read_name(line, column));
        }
        if b.is_ascii_uppercase() {
            return Ok(self.read_constant(line, column));
        }

        match b {
            b'"' => self.read_string(line, column, b'"'),
            b'\'' => self.read_string(line, column, b'\''),
            b'@' => self.read_instance_variable(line, column),
            b':' => Ok(self.read_colon(line, column)),
            _ => self.read_operator(line, column),
        }
    }

    fn read_number(&mut self, line: u32, column: u32) -> Result<Token> {
        let start = self.position;
        self.consume_digits()?;

        // A dot only continues the number when a digit follows; `1..5` and
        // `1.succ` must leave the dot for the parser.
        let is_float = self.current() == Some(b'.')
            && self.peek(1).is_some_and(|c| c.is_ascii_digit());
        if is_float {
            self.advance();
            self.consume_digits()?;
        }

        let literal: String = self.source[start..self.position]
            .chars()
            .filter(|c| *c != '_')
            .collect();
        let kind = if is_float { TokenKind::Float } else { TokenKind::Int };
        Ok(Token::new(kind, literal, line, column))
    }

    fn consume_digits(&mut self) -> Result<()> {
        while let Some(c) = self.current() {
            match c {
                b'0'..=b'9' => self.advance(),
                b'_' => {
                    if !self.peek(1).is_some_and(|n| n.is_ascii_digit()) {
                        return Err(self.error("malformed number: dangling underscore"));
                    }
                    self.advance();
                }
                _ => break,
            }
        }
        Ok(())
    }

    fn read_name(&mut self, line: u32, column: u32) -> Token {
        let start = self.position;
        while self.current().is_some_and(is_name_byte) {
            self.advance();
        }
        // `?` always ends a method name; `!` only when it is not `!=`.
        match self.current() {
            Some(b'?') => self.advance(),
            Some(b'!') if self.peek(1) != Some(b'=') => self.advance(),
            _ => {}
        }

        let literal = &self.source[start..self.position];
        match keyword_kind(literal) {
            Some(kind) => Token::new(kind, literal, line, column),
            None => Token::new(TokenKind::Ident, literal, line, column),
        }
    }

    fn read_constant(&mut self, line: u32, column: u32) -> Token {
        let start = self.position;
        while self.current().is_some_and(is_name_byte) {
            self.advance();
        }
        Token::new(
            TokenKind::Constant,
            &self.source[start..self.position],
            line,
            column,
        )
    }

    fn read_instance_variable(&mut self, line: u32, column: u32) -> Result<Token> {
        let start = self.position;
        self.advance(); // @
        if !self.current().is_some_and(|c| c.is_ascii_lowercase() || c == b'_') {
            return Err(self.error("instance variable name expected after `@`"));
        }
        while self.current().is_some_and(is_name_byte) {
            self.advance();
        }
        Ok(Token::new(
            TokenKind::InstanceVariable,
            &self.source[start..self.position],
            line,
            column,
        ))
    }

    fn read_string(&mut self, line: u32, column: u32, quote: u8) -> Result<Token> {
        self.advance(); // opening quote
        let mut literal = String::new();
        loop {
            match self.current() {
                None | Some(b'\n') => {
                    return Err(Error::Lex {
                        line,
                        column,
                        message: "unterminated string literal".into(),
                    });
                }
                Some(c) if c == quote => {
                    self.advance();
                    return Ok(Token::new(TokenKind::Str, literal, line, column));
                }
                Some(b'\\') => {
                    self.advance();
                    let Some(escaped) = self.current() else {
                        return Err(Error::Lex {
                            line,
                            column,
                            message: "unterminated string literal".into(),
                        });
                    };
                    // Single-quoted strings are raw except for \' and \\.
                    let replacement = match (quote, escaped) {
                        (b'"', b'n') => '\n',
                        (b'"', b't') => '\t',
                        (b'"', b'r') => '\r',
                        (b'"', b'0') => '\0',
                        (_, b'\\') => '\\',
                        (b'"', b'"') | (b'\'', b'\'') => quote as char,
                        (b'\'', other) => {
                            literal.push('\\');
                            other as char
                        }
                        (_, other) => other as char,
                    };
                    literal.push(replacement);
                    self.advance();
                }
                Some(_) => {
                    // Consume a full UTF-8 scalar so multi-byte characters
                    // survive intact.
                    let rest = &self.source[self.position..];
                    let ch = rest.chars().next().unwrap_or('\u{fffd}');
                    literal.push(ch);
                    for _ in 0..ch.len_utf8() {
                        self.advance();
                    }
                }
            }
        }
    }

    fn read_colon(&mut self, line: u32, column: u32) -> Token {
        if self.peek(1) == Some(b':') {
            self.advance();
            self.advance();
            return Token::new(TokenKind::Scope, "::", line, column);
        }
        // `:name` is a symbol literal; a bare colon is a hash-label /
        // keyword-argument separator.
        if self.peek(1).is_some_and(|c| c.is_ascii_lowercase() || c == b'_') {
            self.advance(); // :
            let start = self.position;
            while self.current().is_some_and(is_name_byte) {
                self.advance();
            }
            if self.current() == Some(b'?') || self.current() == Some(b'!') {
                self.advance();
            }
            return Token::new(
                TokenKind::Symbol,
                &self.source[start..self.position],
                line,
                column,
            );
        }
        self.advance();
        Token::new(TokenKind::Colon, ":", line, column)
    }

    fn read_operator(&mut self, line: u32, column: u32) -> Result<Token> {
        let b = self.current().unwrap_or(0);
        let two = self.peek(1);

        let (kind, len) = match (b, two) {
            (b'=', Some(b'=')) => (TokenKind::Eq, 2),
            (b'=', _) => (TokenKind::Assign, 1),
            (b'!', Some(b'=')) => (TokenKind::NotEq, 2),
            (b'!', _) => (TokenKind::Bang, 1),
            (b'<', Some(b'=')) => (TokenKind::LtEq, 2),
            (b'<', Some(b'<')) => (TokenKind::Shl, 2),
            (b'<', _) => (TokenKind::Lt, 1),
            (b'>', Some(b'=')) => (TokenKind::GtEq, 2),
            (b'>', _) => (TokenKind::Gt, 1),
            (b'&', Some(b'&')) => (TokenKind::And, 2),
            (b'&', _) => (TokenKind::Amp, 1),
            (b'|', Some(b'|')) => (TokenKind::Or, 2),
            (b'|', _) => (TokenKind::Bar, 1),
            (b'+', Some(b'+')) => (TokenKind::Incr, 2),
            (b'+', _) => (TokenKind::Plus, 1),
            (b'-', Some(b'-')) => (TokenKind::Decr, 2),
            (b'-', _) => (TokenKind::Minus, 1),
            (b'*', Some(b'*')) => (TokenKind::Pow, 2),
            (b'*', _) => (TokenKind::Star, 1),
            (b'/', _) => (TokenKind::Slash, 1),
            (b'%', _) => (TokenKind::Percent, 1),
            (b'.', Some(b'.')) => {
                if self.peek(2) == Some(b'.') {
                    (TokenKind::DotDotDot, 3)
                } else {
                    (TokenKind::DotDot, 2)
                }
            }
            (b'.', _) => (TokenKind::Dot, 1),
            (b',', _) => (TokenKind::Comma, 1),
            (b'(', _) => (TokenKind::LParen, 1),
            (b')', _) => (TokenKind::RParen, 1),
            (b'[', _) => (TokenKind::LBracket, 1),
            (b']', _) => (TokenKind::RBracket, 1),
            (b'{', _) => (TokenKind::LBrace, 1),
            (b'}', _) => (TokenKind::RBrace, 1),
            _ => {
                return Err(self.error(format!("unexpected character `{}`", b as char)));
            }
        };

        let literal = &self.source[self.position..self.position + len];
        let token = Token::new(kind, literal, line, column);
        for _ in 0..len {
            self.advance();
        }
        Ok(token)
    }
}

fn is_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source)
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    fn literals(source: &str) -> Vec<String> {
        tokenize(source)
            .unwrap()
            .into_iter()
            .map(|t| t.literal)
            .collect()
    }

    #[test]
    fn lexes_assignment_and_arithmetic() {
        assert_eq!(
            kinds("i = 10 + 2 * 3"),
            vec![
                TokenKind::Ident,
                TokenKind::Assign,
                TokenKind::Int,
                TokenKind::Plus,
                TokenKind::Int,
                TokenKind::Star,
                TokenKind::Int,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn lexes_keywords_and_constants() {
        assert_eq!(
            kinds("class Foo < Bar\nend"),
            vec![
                TokenKind::Class,
                TokenKind::Constant,
                TokenKind::Lt,
                TokenKind::Constant,
                TokenKind::Newline,
                TokenKind::End,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn collapses_newlines_and_semicolons() {
        assert_eq!(
            kinds("a\n\n;\nb"),
            vec![
                TokenKind::Ident,
                TokenKind::Newline,
                TokenKind::Ident,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn method_name_suffixes() {
        let lits = literals("empty? save! a != b");
        assert_eq!(lits[0], "empty?");
        assert_eq!(lits[1], "save!");
        assert_eq!(lits[2], "a");
        assert_eq!(lits[3], "!=");
    }

    #[test]
    fn numbers_with_underscores_and_floats() {
        let lits = literals("1_000 3.14");
        assert_eq!(lits[0], "1000");
        assert_eq!(lits[1], "3.14");
        assert_eq!(
            kinds("1..5"),
            vec![
                TokenKind::Int,
                TokenKind::DotDot,
                TokenKind::Int,
                TokenKind::Eof
            ]
        );
        assert_eq!(
            kinds("1.succ"),
            vec![
                TokenKind::Int,
                TokenKind::Dot,
                TokenKind::Ident,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn string_escapes() {
        assert_eq!(literals(r#""a\nb""#)[0], "a\nb");
        assert_eq!(literals(r"'a\nb'")[0], r"a\nb");
    }

    #[test]
    fn symbols_labels_and_scope() {
        assert_eq!(
            kinds(":sym a: Foo::Bar"),
            vec![
                TokenKind::Symbol,
                TokenKind::Ident,
                TokenKind::Colon,
                TokenKind::Constant,
                TokenKind::Scope,
                TokenKind::Constant,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn comments_produce_no_tokens() {
        assert_eq!(
            kinds("a # trailing\nb"),
            vec![
                TokenKind::Ident,
                TokenKind::Newline,
                TokenKind::Ident,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn unterminated_string_is_an_error() {
        let err = tokenize("\"abc").unwrap_err();
        assert!(err.to_string().contains("unterminated"));
    }

    #[test]
    fn increment_and_power_operators() {
        assert_eq!(
            kinds("i++ 2 ** 8"),
            vec![
                TokenKind::Ident,
                TokenKind::Incr,
                TokenKind::Int,
                TokenKind::Pow,
                TokenKind::Int,
                TokenKind::Eof,
            ]
        );
    }
}
