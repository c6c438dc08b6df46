//! Compiler pipeline stages: lex, parse, resolve, build the dependency
//! table, plan execution order, and emit the compiled program.

pub mod ast;
pub mod deps;
pub mod emit;
pub mod error_codes;
pub mod lexer;
pub mod lir;
pub mod lower;
pub mod parser;
pub mod resolve;
pub mod tokens;
