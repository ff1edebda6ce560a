//! The scanner: source text to tokens, one at a time.
//!
//! Recognizes identifiers (re-classified as keywords), decimal integer
//! literals, char literals, greedy operator runs, single-character
//! separators, and `#` line comments. Anything else is a lexical error.

use crate::{
    error::CompileError,
    token::{Position, Token, TokenKind, keyword_kind},
};

const OPERATOR_CHARS: &str = "+-*/%&|^=!><.~?:";
const SEPARATOR_CHARS: &str = "()[]{},;";

/// Cursor-based tokenizer over one source buffer.
///
/// The parser stacks scanners to implement `include`; each scanner owns its
/// text and its own row/column bookkeeping.
#[derive(Debug)]
pub struct Scanner {
    chars: Vec<char>,
    i: usize,
    row: u32,
    col: u32,
}

impl Scanner {
    pub fn new(text: &str) -> Self {
        Self {
            chars: text.chars().collect(),
            i: 0,
            row: 1,
            col: 1,
        }
    }

    /// Scans and returns the next token, skipping whitespace and comments.
    ///
    /// At end of input this keeps returning an `EndOfFile` token.
    pub fn get_token(&mut self) -> Result<Token, CompileError> {
        self.skip_trivia();
        let pos = Position::new(self.row, self.col);
        let Some(c) = self.peek() else {
            return Ok(Token::new(TokenKind::EndOfFile, "", pos));
        };
        if c.is_ascii_alphabetic() || c == '_' {
            return Ok(self.get_identifier(pos));
        }
        if c.is_ascii_digit() {
            return Ok(self.get_intlit(pos));
        }
        if c == '\'' {
            return self.get_charlit(pos);
        }
        if OPERATOR_CHARS.contains(c) {
            return Ok(self.get_operator(pos));
        }
        if SEPARATOR_CHARS.contains(c) {
            self.advance();
            return Ok(Token::new(TokenKind::Separator, c, pos));
        }
        Err(CompileError::lexical(
            format!("unrecognized character: '{c}'"),
            pos,
        ))
    }

    pub fn eof(&self) -> bool {
        self.i >= self.chars.len()
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.i).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.i += 1;
        if c == '\n' {
            self.row += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(c)
    }

    fn skip_trivia(&mut self) {
        while let Some(c) = self.peek() {
            if c == '#' {
                while let Some(c) = self.peek() {
                    if c == '\n' {
                        break;
                    }
                    self.advance();
                }
            } else if !c.is_ascii_whitespace() {
                return;
            }
            self.advance();
        }
    }

    fn get_identifier(&mut self, pos: Position) -> Token {
        let start = self.i;
        while let Some(c) = self.peek() {
            if !c.is_ascii_alphanumeric() && c != '_' {
                break;
            }
            self.advance();
        }
        let text: String = self.chars[start..self.i].iter().collect();
        let kind = keyword_kind(&text).unwrap_or(TokenKind::Identifier);
        Token::new(kind, text, pos)
    }

    fn get_intlit(&mut self, pos: Position) -> Token {
        let start = self.i;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
        }
        let text: String = self.chars[start..self.i].iter().collect();
        Token::new(TokenKind::IntLit, text, pos)
    }

    /// Scans a quoted char literal, lexeme included; decoding happens in
    /// `Token::to_int`. A newline or end of input inside the literal is a
    /// lexical error.
    fn get_charlit(&mut self, pos: Position) -> Result<Token, CompileError> {
        let start = self.i;
        self.advance();
        loop {
            match self.peek() {
                None => {
                    return Err(CompileError::lexical("unterminated char literal", pos));
                }
                Some('\n' | '\r') => {
                    return Err(CompileError::lexical(
                        "unexpected newline in char literal",
                        pos,
                    ));
                }
                Some('\\') => {
                    self.advance();
                    if matches!(self.peek(), Some('\n' | '\r')) {
                        return Err(CompileError::lexical(
                            "unexpected newline in char literal",
                            pos,
                        ));
                    }
                    self.advance();
                }
                Some('\'') => {
                    self.advance();
                    break;
                }
                Some(_) => {
                    self.advance();
                }
            }
        }
        let text: String = self.chars[start..self.i].iter().collect();
        Ok(Token::new(TokenKind::IntLit, text, pos))
    }

    fn get_operator(&mut self, pos: Position) -> Token {
        let start = self.i;
        while self.peek().is_some_and(|c| OPERATOR_CHARS.contains(c)) {
            self.advance();
        }
        let text: String = self.chars[start..self.i].iter().collect();
        Token::new(TokenKind::Operator, text, pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan_all(text: &str) -> Vec<Token> {
        let mut scanner = Scanner::new(text);
        let mut tokens = vec![];
        loop {
            let token = scanner.get_token().unwrap();
            let done = token.kind == TokenKind::EndOfFile;
            tokens.push(token);
            if done {
                return tokens;
            }
        }
    }

    fn kinds(text: &str) -> Vec<TokenKind> {
        scan_all(text).into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn scans_declaration() {
        assert_eq!(
            kinds("var x = 7;"),
            vec![
                TokenKind::Var,
                TokenKind::Identifier,
                TokenKind::Operator,
                TokenKind::IntLit,
                TokenKind::Separator,
                TokenKind::EndOfFile,
            ]
        );
    }

    #[test]
    fn operator_runs_are_greedy() {
        let tokens = scan_all("a <= b");
        assert_eq!(tokens[1].text, "<=");
        let tokens = scan_all("a<b");
        assert_eq!(tokens[1].text, "<");
    }

    #[test]
    fn comments_and_whitespace_are_skipped() {
        let tokens = scan_all("x # the rest is ignored\ny");
        assert_eq!(tokens[0].text, "x");
        assert_eq!(tokens[1].text, "y");
        assert_eq!(tokens[1].pos, Position::new(2, 1));
    }

    #[test]
    fn positions_are_one_based() {
        let tokens = scan_all("fn main");
        assert_eq!(tokens[0].pos, Position::new(1, 1));
        assert_eq!(tokens[1].pos, Position::new(1, 4));
    }

    #[test]
    fn char_literal_keeps_lexeme() {
        let tokens = scan_all(r"'\n'");
        assert_eq!(tokens[0].kind, TokenKind::IntLit);
        assert_eq!(tokens[0].text, r"'\n'");
    }

    #[test]
    fn rejects_unknown_character() {
        let mut scanner = Scanner::new("$");
        assert!(scanner.get_token().is_err());
    }

    #[test]
    fn rejects_newline_in_char_literal() {
        let mut scanner = Scanner::new("'a\nb'");
        assert!(scanner.get_token().is_err());
    }
}
