//! Renders a `CompileError` against its source text: a stable error code,
//! the message, and a line/column snippet with a caret. This is the
//! project's substitute for a logging framework — structured, typed errors
//! plus a rendered diagnostic is the whole observability story here.

use crate::compiler::error_codes::error_code;
use crate::CompileError;

fn position(error: &CompileError) -> Option<(usize, usize)> {
    use crate::compiler::lexer::LexError;
    use crate::compiler::parser::ParseError;

    match error {
        CompileError::Lex(e) => Some(match e {
            LexError::UnexpectedChar { line, col, .. } => (*line, *col),
            LexError::UnterminatedString { line, col } => (*line, *col),
            LexError::UnterminatedQuotedIdent { line, col } => (*line, *col),
            LexError::InvalidEscape { line, col } => (*line, *col),
            LexError::InvalidNumber { line, col } => (*line, *col),
        }),
        CompileError::Parse(ParseError { line, col, .. }) => Some((*line, *col)),
        CompileError::Resolve(_) | CompileError::Dependency(_) => None,
    }
}

fn source_line(source: &str, line: usize) -> Option<&str> {
    source.lines().nth(line.checked_sub(1)?)
}

/// Renders `error` as a one-or-two-line diagnostic: `code: message`, then
/// (when a position is known) the offending source line with a caret under
/// the reported column.
pub fn render(error: &CompileError, source: &str) -> String {
    let code = error_code(error);
    let mut out = format!("{code}: {error}");

    if let Some((line, col)) = position(error) {
        if let Some(text) = source_line(source, line) {
            out.push_str(&format!("\n  --> line {line}, col {col}\n"));
            out.push_str(&format!("  | {text}\n"));
            out.push_str(&format!("  | {}^", " ".repeat(col.saturating_sub(1))));
        }
    }

    out
}
