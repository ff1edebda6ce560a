//! Tokens produced by the scanner.
//!
//! A token is `(kind, lexeme, row, col)` and is immutable once produced.
//! Char literals keep their quoted lexeme; [`Token::to_int`] decodes the
//! C-style escapes when the value is needed.

use std::fmt;

use crate::error::CompileError;

/// Source position of a token, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub row: u32,
    pub col: u32,
}

impl Position {
    pub fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.row, self.col)
    }
}

/// Classification of a token.
///
/// Keywords get their own kind so the parser can match on kind instead of
/// comparing lexemes; everything else falls into the generic categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Null,
    Identifier,
    IntLit,
    Keyword,
    Operator,
    Separator,
    EndOfFile,
    Synthetic,
    // keyword-specific kinds
    Function,
    Inline,
    Writeback,
    TypeDef,
    Like,
    Return,
    Include,
    If,
    Else,
    While,
    For,
    Lambda,
    Var,
    Alias,
    True,
    False,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Null => "null",
            Self::Identifier => "identifier",
            Self::IntLit => "integer literal",
            Self::Keyword => "keyword",
            Self::Operator => "operator",
            Self::Separator => "separator",
            Self::EndOfFile => "end of file",
            Self::Synthetic => "synthetic",
            Self::Function => "fn",
            Self::Inline => "inline",
            Self::Writeback => "writeback",
            Self::TypeDef => "typedef",
            Self::Like => "like",
            Self::Return => "return",
            Self::Include => "include",
            Self::If => "if",
            Self::Else => "else",
            Self::While => "while",
            Self::For => "for",
            Self::Lambda => "lambda",
            Self::Var => "var",
            Self::Alias => "alias",
            Self::True => "true",
            Self::False => "false",
        };
        f.write_str(name)
    }
}

/// Maps an identifier lexeme to its keyword kind, if it is one.
pub fn keyword_kind(text: &str) -> Option<TokenKind> {
    let kind = match text {
        "fn" => TokenKind::Function,
        "inline" => TokenKind::Inline,
        "writeback" => TokenKind::Writeback,
        "typedef" => TokenKind::TypeDef,
        "like" => TokenKind::Like,
        "return" => TokenKind::Return,
        "include" => TokenKind::Include,
        "if" => TokenKind::If,
        "else" => TokenKind::Else,
        "while" => TokenKind::While,
        "for" => TokenKind::For,
        "lambda" => TokenKind::Lambda,
        "var" => TokenKind::Var,
        "alias" => TokenKind::Alias,
        "true" => TokenKind::True,
        "false" => TokenKind::False,
        _ => return None,
    };
    Some(kind)
}

/// A single scanned token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub pos: Position,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, pos: Position) -> Self {
        Self {
            kind,
            text: text.into(),
            pos,
        }
    }

    /// A token invented by the parser, carrying no source position.
    pub fn synthetic(text: impl Into<String>) -> Self {
        Self::new(TokenKind::Synthetic, text, Position::default())
    }

    pub fn null() -> Self {
        Self::new(TokenKind::Null, "", Position::default())
    }

    pub fn is_null(&self) -> bool {
        self.kind == TokenKind::Null
    }

    /// Decodes the token as a 32-bit integer value.
    ///
    /// Decimal literals parse directly. Char literals (quoted lexemes)
    /// decode one character, one of the escapes `\n \r \t \\ \' \" \0`, or
    /// a `\xHH` byte escape.
    pub fn to_int(&self) -> Result<i32, CompileError> {
        let bytes = self.text.as_bytes();
        if bytes.len() >= 3 && bytes[0] == b'\'' && bytes[bytes.len() - 1] == b'\'' {
            return self.decode_char_lit(&bytes[1..bytes.len() - 1]);
        }
        self.text.parse::<i32>().map_err(|_| {
            CompileError::lexical(format!("could not convert to int: {}", self.text), self.pos)
        })
    }

    fn decode_char_lit(&self, inner: &[u8]) -> Result<i32, CompileError> {
        match *inner {
            [c] if c != b'\\' => return Ok(i32::from(c)),
            [b'\\', esc] => {
                let value = match esc {
                    b'n' => b'\n',
                    b'r' => b'\r',
                    b't' => b'\t',
                    b'\\' | b'\'' | b'"' => esc,
                    b'0' => 0,
                    _ => {
                        return Err(CompileError::lexical(
                            format!("unrecognized char literal: {}", self.text),
                            self.pos,
                        ));
                    }
                };
                return Ok(i32::from(value));
            }
            [b'\\', b'x', hi, lo] => {
                if hi.is_ascii_hexdigit() && lo.is_ascii_hexdigit() {
                    let hex = |c: u8| (c as char).to_digit(16).unwrap_or(0) as i32;
                    return Ok(16 * hex(hi) + hex(lo));
                }
            }
            _ => {}
        }
        Err(CompileError::lexical(
            format!("unrecognized char literal: {}", self.text),
            self.pos,
        ))
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: '{}' ({})", self.kind, self.text, self.pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_decimal_literal() {
        let token = Token::new(TokenKind::IntLit, "1234", Position::default());
        assert_eq!(token.to_int().unwrap(), 1234);
    }

    #[test]
    fn decodes_plain_char_literal() {
        let token = Token::new(TokenKind::IntLit, "'A'", Position::default());
        assert_eq!(token.to_int().unwrap(), 65);
    }

    #[test]
    fn decodes_escapes() {
        for (lexeme, expected) in [
            ("'\\n'", 10),
            ("'\\r'", 13),
            ("'\\t'", 9),
            ("'\\\\'", 92),
            ("'\\''", 39),
            ("'\\0'", 0),
            ("'\\x41'", 65),
            ("'\\xfF'", 255),
        ] {
            let token = Token::new(TokenKind::IntLit, lexeme, Position::default());
            assert_eq!(token.to_int().unwrap(), expected, "lexeme {lexeme}");
        }
    }

    #[test]
    fn rejects_bad_char_literal() {
        let token = Token::new(TokenKind::IntLit, "'\\q'", Position::default());
        assert!(token.to_int().is_err());
    }

    #[test]
    fn keyword_table_covers_all_keywords() {
        for kw in [
            "fn", "inline", "writeback", "typedef", "like", "return", "include", "if", "else",
            "while", "for", "lambda", "var", "alias", "true", "false",
        ] {
            assert!(keyword_kind(kw).is_some(), "{kw} should be a keyword");
        }
        assert_eq!(keyword_kind("main"), None);
    }
}
