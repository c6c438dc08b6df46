//! Lexer for the formula language.

use crate::compiler::tokens::{Token, TokenKind};
use formulate_core::Span;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum LexError {
    #[error("unexpected character '{ch}' at line {line}, col {col}")]
    UnexpectedChar { ch: char, line: usize, col: usize },
    #[error("unterminated string at line {line}, col {col}")]
    UnterminatedString { line: usize, col: usize },
    #[error("unterminated quoted identifier at line {line}, col {col}")]
    UnterminatedQuotedIdent { line: usize, col: usize },
    #[error("invalid escape sequence at line {line}, col {col}")]
    InvalidEscape { line: usize, col: usize },
    #[error("invalid number literal at line {line}, col {col}")]
    InvalidNumber { line: usize, col: usize },
}

pub struct Lexer {
    source: Vec<char>,
    pos: usize,
    line: usize,
    col: usize,
    byte_offset: usize,
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        Self {
            source: source.chars().collect(),
            pos: 0,
            line: 1,
            col: 1,
            byte_offset: 0,
        }
    }

    fn current(&self) -> Option<char> {
        self.source.get(self.pos).copied()
    }

    fn peek(&self) -> Option<char> {
        self.source.get(self.pos + 1).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.source.get(self.pos).copied()?;
        self.pos += 1;
        self.byte_offset += ch.len_utf8();
        if ch == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(ch)
    }

    fn span_from(&self, start_offset: usize, start_line: usize, start_col: usize) -> Span {
        Span::new(start_offset, self.byte_offset, start_line, start_col)
    }

    pub fn tokenize(mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();
        loop {
            self.skip_whitespace_and_comments();
            let start_offset = self.byte_offset;
            let start_line = self.line;
            let start_col = self.col;
            let Some(ch) = self.current() else {
                tokens.push(Token::new(
                    TokenKind::Eof,
                    self.span_from(start_offset, start_line, start_col),
                ));
                break;
            };

            let kind = match ch {
                '(' => {
                    self.advance();
                    TokenKind::LParen
                }
                ')' => {
                    self.advance();
                    TokenKind::RParen
                }
                '{' => {
                    self.advance();
                    TokenKind::LBrace
                }
                '}' => {
                    self.advance();
                    TokenKind::RBrace
                }
                ',' => {
                    self.advance();
                    TokenKind::Comma
                }
                ';' => {
                    self.advance();
                    TokenKind::Semicolon
                }
                '.' => {
                    self.advance();
                    TokenKind::Dot
                }
                '+' => {
                    self.advance();
                    TokenKind::Plus
                }
                '-' => {
                    self.advance();
                    TokenKind::Minus
                }
                '*' => {
                    self.advance();
                    TokenKind::Star
                }
                '/' => {
                    self.advance();
                    TokenKind::Slash
                }
                '%' => {
                    self.advance();
                    TokenKind::Percent
                }
                '^' => {
                    self.advance();
                    TokenKind::Caret
                }
                '&' => {
                    self.advance();
                    TokenKind::Amp
                }
                '=' => {
                    self.advance();
                    TokenKind::Eq
                }
                '<' => {
                    self.advance();
                    match self.current() {
                        Some('=') => {
                            self.advance();
                            TokenKind::Le
                        }
                        Some('>') => {
                            self.advance();
                            TokenKind::NotEq
                        }
                        _ => TokenKind::Lt,
                    }
                }
                '>' => {
                    self.advance();
                    if self.current() == Some('=') {
                        self.advance();
                        TokenKind::Ge
                    } else {
                        TokenKind::Gt
                    }
                }
                '"' => self.lex_string(start_line, start_col)?,
                '\'' => self.lex_quoted_ident(start_line, start_col)?,
                c if c.is_ascii_digit() => self.lex_number(start_offset, start_line, start_col)?,
                c if c.is_alphabetic() || c == '_' => self.lex_word(),
                c => {
                    return Err(LexError::UnexpectedChar {
                        ch: c,
                        line: start_line,
                        col: start_col,
                    })
                }
            };

            tokens.push(Token::new(
                kind,
                self.span_from(start_offset, start_line, start_col),
            ));
        }
        Ok(tokens)
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.current() {
                Some(c) if c.is_whitespace() => {
                    self.advance();
                }
                Some('#') => {
                    while !matches!(self.current(), None | Some('\n')) {
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    fn lex_word(&mut self) -> TokenKind {
        let mut s = String::new();
        while let Some(c) = self.current() {
            if c.is_alphanumeric() || c == '_' {
                s.push(c);
                self.advance();
            } else {
                break;
            }
        }
        match s.as_str() {
            "module" => TokenKind::Module,
            "import" => TokenKind::Import,
            "from" => TokenKind::From,
            "as" => TokenKind::As,
            "argument" => TokenKind::Argument,
            "constant" => TokenKind::Constant,
            "export" => TokenKind::Export,
            "await" => TokenKind::Await,
            "if" => TokenKind::If,
            "where" => TokenKind::Where,
            "list" => TokenKind::List,
            "object" => TokenKind::Object,
            "and" => TokenKind::And,
            "or" => TokenKind::Or,
            "not" => TokenKind::Not,
            "true" => TokenKind::BoolLit(true),
            "false" => TokenKind::BoolLit(false),
            _ => TokenKind::Ident(s),
        }
    }

    fn lex_number(
        &mut self,
        _start_offset: usize,
        line: usize,
        col: usize,
    ) -> Result<TokenKind, LexError> {
        let mut s = String::new();
        while let Some(c) = self.current() {
            if c.is_ascii_digit() {
                s.push(c);
                self.advance();
            } else {
                break;
            }
        }
        if self.current() == Some('.') && self.peek().is_some_and(|c| c.is_ascii_digit()) {
            s.push('.');
            self.advance();
            while let Some(c) = self.current() {
                if c.is_ascii_digit() {
                    s.push(c);
                    self.advance();
                } else {
                    break;
                }
            }
        }
        if s.is_empty() {
            return Err(LexError::InvalidNumber { line, col });
        }
        Ok(TokenKind::Number(s))
    }

    fn lex_string(&mut self, line: usize, col: usize) -> Result<TokenKind, LexError> {
        self.advance(); // opening quote
        let mut s = String::new();
        loop {
            match self.current() {
                None | Some('\n') => return Err(LexError::UnterminatedString { line, col }),
                Some('"') => {
                    self.advance();
                    break;
                }
                Some('\\') => {
                    let esc_line = self.line;
                    let esc_col = self.col;
                    self.advance();
                    match self.current() {
                        Some('\\') => {
                            s.push('\\');
                            self.advance();
                        }
                        Some('"') => {
                            s.push('"');
                            self.advance();
                        }
                        Some('n') => {
                            s.push('\n');
                            self.advance();
                        }
                        Some('r') => {
                            s.push('\r');
                            self.advance();
                        }
                        Some('t') => {
                            s.push('\t');
                            self.advance();
                        }
                        Some('u') => {
                            self.advance();
                            s.push(self.lex_unicode_escape(esc_line, esc_col)?);
                        }
                        _ => {
                            return Err(LexError::InvalidEscape {
                                line: esc_line,
                                col: esc_col,
                            })
                        }
                    }
                }
                Some(c) => {
                    s.push(c);
                    self.advance();
                }
            }
        }
        Ok(TokenKind::StringLit(s))
    }

    fn lex_unicode_escape(&mut self, line: usize, col: usize) -> Result<char, LexError> {
        if self.current() != Some('{') {
            return Err(LexError::InvalidEscape { line, col });
        }
        self.advance();
        let mut hex = String::new();
        while let Some(c) = self.current() {
            if c == '}' {
                break;
            }
            hex.push(c);
            self.advance();
        }
        if self.current() != Some('}') {
            return Err(LexError::InvalidEscape { line, col });
        }
        self.advance();
        u32::from_str_radix(&hex, 16)
            .ok()
            .and_then(char::from_u32)
            .ok_or(LexError::InvalidEscape { line, col })
    }

    fn lex_quoted_ident(&mut self, line: usize, col: usize) -> Result<TokenKind, LexError> {
        self.advance(); // opening quote
        let mut s = String::new();
        loop {
            match self.current() {
                None | Some('\n') => return Err(LexError::UnterminatedQuotedIdent { line, col }),
                Some('\'') => {
                    self.advance();
                    break;
                }
                Some(c) => {
                    s.push(c);
                    self.advance();
                }
            }
        }
        Ok(TokenKind::Ident(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        Lexer::new(src)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn lexes_module_skeleton() {
        let tokens = kinds("module M { export a = 1 }");
        assert_eq!(
            tokens,
            vec![
                TokenKind::Module,
                TokenKind::Ident("M".into()),
                TokenKind::LBrace,
                TokenKind::Export,
                TokenKind::Ident("a".into()),
                TokenKind::Eq,
                TokenKind::Number("1".into()),
                TokenKind::RBrace,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn lexes_string_escapes() {
        let tokens = kinds(r#""a\nb\"c""#);
        assert_eq!(
            tokens[0],
            TokenKind::StringLit("a\nb\"c".to_string())
        );
    }

    #[test]
    fn lexes_quoted_identifier() {
        let tokens = kinds("'my formula'");
        assert_eq!(tokens[0], TokenKind::Ident("my formula".to_string()));
    }

    #[test]
    fn unterminated_string_is_an_error() {
        let result = Lexer::new("\"abc").tokenize();
        assert!(matches!(result, Err(LexError::UnterminatedString { .. })));
    }

    #[test]
    fn not_equal_and_comparisons() {
        let tokens = kinds("a <> b <= c >= d");
        assert_eq!(
            tokens,
            vec![
                TokenKind::Ident("a".into()),
                TokenKind::NotEq,
                TokenKind::Ident("b".into()),
                TokenKind::Le,
                TokenKind::Ident("c".into()),
                TokenKind::Ge,
                TokenKind::Ident("d".into()),
                TokenKind::Eof,
            ]
        );
    }
}
