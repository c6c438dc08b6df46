//! Token types produced by the lexer.

use formulate_core::Span;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lexical token kinds for the formula language (spec §4.1).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TokenKind {
    // Literals
    Number(String),
    StringLit(String),
    BoolLit(bool),

    // Identifiers: plain `[A-Za-z_][A-Za-z0-9_]*` or quoted `'...'`.
    Ident(String),

    // Keywords
    Module,
    Import,
    From,
    As,
    Argument,
    Constant,
    Export,
    Await,
    If,
    Where,
    List,
    Object,
    And,
    Or,
    Not,

    // Punctuation
    LParen,
    RParen,
    LBrace,
    RBrace,
    Comma,
    Semicolon,
    Dot,
    Eq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    Amp,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Caret,

    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Number(s) => write!(f, "number '{s}'"),
            TokenKind::StringLit(s) => write!(f, "string \"{s}\""),
            TokenKind::BoolLit(b) => write!(f, "{b}"),
            TokenKind::Ident(s) => write!(f, "identifier '{s}'"),
            TokenKind::Module => write!(f, "'module'"),
            TokenKind::Import => write!(f, "'import'"),
            TokenKind::From => write!(f, "'from'"),
            TokenKind::As => write!(f, "'as'"),
            TokenKind::Argument => write!(f, "'argument'"),
            TokenKind::Constant => write!(f, "'constant'"),
            TokenKind::Export => write!(f, "'export'"),
            TokenKind::Await => write!(f, "'await'"),
            TokenKind::If => write!(f, "'if'"),
            TokenKind::Where => write!(f, "'where'"),
            TokenKind::List => write!(f, "'list'"),
            TokenKind::Object => write!(f, "'object'"),
            TokenKind::And => write!(f, "'and'"),
            TokenKind::Or => write!(f, "'or'"),
            TokenKind::Not => write!(f, "'not'"),
            TokenKind::LParen => write!(f, "'('"),
            TokenKind::RParen => write!(f, "')'"),
            TokenKind::LBrace => write!(f, "'{{'"),
            TokenKind::RBrace => write!(f, "'}}'"),
            TokenKind::Comma => write!(f, "','"),
            TokenKind::Semicolon => write!(f, "';'"),
            TokenKind::Dot => write!(f, "'.'"),
            TokenKind::Eq => write!(f, "'='"),
            TokenKind::NotEq => write!(f, "'<>'"),
            TokenKind::Lt => write!(f, "'<'"),
            TokenKind::Le => write!(f, "'<='"),
            TokenKind::Gt => write!(f, "'>'"),
            TokenKind::Ge => write!(f, "'>='"),
            TokenKind::Amp => write!(f, "'&'"),
            TokenKind::Plus => write!(f, "'+'"),
            TokenKind::Minus => write!(f, "'-'"),
            TokenKind::Star => write!(f, "'*'"),
            TokenKind::Slash => write!(f, "'/'"),
            TokenKind::Percent => write!(f, "'%'"),
            TokenKind::Caret => write!(f, "'^'"),
            TokenKind::Eof => write!(f, "end of input"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }
}
