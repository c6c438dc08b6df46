//! Formulate Compiler
//!
//! Transforms formula-language source text into a `CompiledProgram`:
//! lex → parse → resolve → build the dependency table → plan execution
//! order → emit.

pub mod compiler;
pub mod diagnostics;

use compiler::deps::DependencyError;
use compiler::lexer::{LexError, Lexer};
use compiler::lir::CompiledProgram;
use compiler::lower::{lower_program, LowerError};
use compiler::parser::{parse, ParseError};
use compiler::resolve::ResolveError;
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Aggregates every fatal, single-shot compile-time failure (spec §6, §7).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CompileError {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error(transparent)]
    Dependency(#[from] DependencyError),
}

impl From<LowerError> for CompileError {
    fn from(e: LowerError) -> Self {
        match e {
            LowerError::Resolve(e) => CompileError::Resolve(e),
            LowerError::Dependency(e) => CompileError::Dependency(e),
        }
    }
}

/// Options controlling a single compile call. The only knob this spec
/// actually needs is a per-call execution timeout (spec §5); it is carried
/// here and consumed by `formulate-rt::Executable::call`, not by the
/// compiler itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompileOptions {
    /// Wall-clock timeout applied to `Executable::call`, if any.
    pub timeout: Option<std::time::Duration>,
}

fn source_hash(source: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Lexes, parses, resolves, and plans `source`, returning a `CompiledProgram`
/// ready for `formulate-rt::Executable::new`.
pub fn compile_source(
    source: &str,
    _options: CompileOptions,
) -> Result<CompiledProgram, CompileError> {
    let tokens = Lexer::new(source).tokenize()?;
    let program = parse(tokens)?;
    compile_program(&program, &source_hash(source))
}

/// Compiles an already-parsed AST, e.g. one built directly in Rust with a
/// `Pending` constant that no parseable literal syntax can express.
pub fn compile_program(
    program: &compiler::ast::Program,
    source_hash: &str,
) -> Result<CompiledProgram, CompileError> {
    let plan = lower_program(program, source_hash.to_string())?;
    Ok(plan)
}

/// Renders a `CompileError` against `source` with a line/col snippet and
/// caret, the project's substitute for a logging framework (spec_full §2).
pub fn format_error(error: &CompileError, source: &str) -> String {
    diagnostics::render(error, source)
}
