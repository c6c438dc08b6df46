//! Recursive descent parser with precedence-climbing expression parsing
//! (spec §4.2).
//!
//! Declaration grammar (import syntax is not fixed by the specification and
//! is an implementation decision recorded in `DESIGN.md`):
//!
//! ```text
//! Program     := (ArgumentDecl | ConstantDecl | Module)*
//! ArgumentDecl := "argument" Identifier ";"
//! ConstantDecl := "constant" Identifier "=" Literal ";"
//! Module      := "module" Identifier "{" Import* Formula* "}"
//! Import      := "import" ImportSource ("as" Identifier)? ";"
//! ImportSource := "argument" Identifier
//!               | "constant" Identifier
//!               | Identifier ("." Identifier)?
//! Formula     := ["export"] Identifier "=" Expression ";"
//! ```

use crate::compiler::ast::*;
use crate::compiler::tokens::{Token, TokenKind};
use formulate_core::Span;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
#[error("expected {expected}, found {actual} at line {line}, col {col}")]
pub struct ParseError {
    pub expected: String,
    pub actual: String,
    pub line: usize,
    pub col: usize,
}

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

type PResult<T> = Result<T, ParseError>;

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    fn current(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let tok = self.current().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    fn error(&self, expected: impl Into<String>) -> ParseError {
        let tok = self.current();
        ParseError {
            expected: expected.into(),
            actual: tok.kind.to_string(),
            line: tok.span.line,
            col: tok.span.col,
        }
    }

    fn expect(&mut self, kind: &TokenKind) -> PResult<Token> {
        if std::mem::discriminant(&self.current().kind) == std::mem::discriminant(kind) {
            Ok(self.advance())
        } else {
            Err(self.error(kind.to_string()))
        }
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if std::mem::discriminant(&self.current().kind) == std::mem::discriminant(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_ident(&mut self) -> PResult<(String, Span)> {
        let tok = self.current().clone();
        match tok.kind {
            TokenKind::Ident(name) => {
                self.advance();
                Ok((name, tok.span))
            }
            _ => Err(self.error("identifier")),
        }
    }

    // ── Program ─────────────────────────────────────────────────────

    pub fn parse_program(&mut self) -> PResult<Program> {
        let mut arguments = Vec::new();
        let mut constants = Vec::new();
        let mut modules = Vec::new();

        while self.current().kind != TokenKind::Eof {
            match &self.current().kind {
                TokenKind::Argument => arguments.push(self.parse_argument_decl()?),
                TokenKind::Constant => constants.push(self.parse_constant_decl()?),
                TokenKind::Module => modules.push(self.parse_module()?),
                _ => return Err(self.error("'argument', 'constant', or 'module'")),
            }
        }

        Ok(Program {
            arguments,
            constants,
            modules,
        })
    }

    fn parse_argument_decl(&mut self) -> PResult<ArgumentDecl> {
        let start = self.expect(&TokenKind::Argument)?.span;
        let (name, name_span) = self.expect_ident()?;
        self.expect(&TokenKind::Semicolon)?;
        Ok(ArgumentDecl {
            name,
            span: start.merge(name_span),
        })
    }

    fn parse_constant_decl(&mut self) -> PResult<ConstantDecl> {
        let start = self.expect(&TokenKind::Constant)?.span;
        let (name, _) = self.expect_ident()?;
        self.expect(&TokenKind::Eq)?;
        let (value, lit_span) = self.parse_literal()?;
        self.expect(&TokenKind::Semicolon)?;
        Ok(ConstantDecl {
            name,
            value: value.to_value(),
            span: start.merge(lit_span),
        })
    }

    fn parse_literal(&mut self) -> PResult<(Literal, Span)> {
        let tok = self.current().clone();
        let lit = match tok.kind {
            TokenKind::Number(ref s) => {
                let n = bigdecimal::BigDecimal::from_str(s)
                    .map_err(|_| self.error("well-formed number literal"))?;
                self.advance();
                Literal::Number(n)
            }
            TokenKind::StringLit(ref s) => {
                let s = s.clone();
                self.advance();
                Literal::String(s)
            }
            TokenKind::BoolLit(b) => {
                self.advance();
                Literal::Boolean(b)
            }
            _ => return Err(self.error("literal")),
        };
        Ok((lit, tok.span))
    }

    // ── Module ──────────────────────────────────────────────────────

    fn parse_module(&mut self) -> PResult<Module> {
        let start = self.expect(&TokenKind::Module)?.span;
        let (name, _) = self.expect_ident()?;
        self.expect(&TokenKind::LBrace)?;

        let mut imports = Vec::new();
        while self.current().kind == TokenKind::Import {
            imports.push(self.parse_import()?);
        }
        let mut formulas = Vec::new();
        while self.current().kind != TokenKind::RBrace {
            formulas.push(self.parse_formula()?);
        }
        let end = self.expect(&TokenKind::RBrace)?.span;

        Ok(Module {
            name,
            imports,
            formulas,
            span: start.merge(end),
        })
    }

    fn parse_import(&mut self) -> PResult<Import> {
        let start = self.expect(&TokenKind::Import)?.span;

        let (kind, path) = match self.current().kind.clone() {
            TokenKind::Argument => {
                self.advance();
                let (name, _) = self.expect_ident()?;
                (ImportKind::Argument, vec![name])
            }
            TokenKind::Constant => {
                self.advance();
                let (name, _) = self.expect_ident()?;
                (ImportKind::Constant, vec![name])
            }
            _ => {
                let (first, _) = self.expect_ident()?;
                if self.eat(&TokenKind::Dot) {
                    let (second, _) = self.expect_ident()?;
                    (ImportKind::Formula, vec![first, second])
                } else if self.eat(&TokenKind::From) {
                    // `import <formula> from <module>`: path is still
                    // `[module, formula]`, matching the dotted form above.
                    let (module, _) = self.expect_ident()?;
                    (ImportKind::Formula, vec![module, first])
                } else {
                    (ImportKind::Module, vec![first])
                }
            }
        };

        let local_name = if self.eat(&TokenKind::As) {
            self.expect_ident()?.0
        } else {
            path.last().expect("path always has at least one element").clone()
        };

        let end = self.expect(&TokenKind::Semicolon)?.span;
        Ok(Import {
            local_name,
            path,
            kind,
            span: start.merge(end),
        })
    }

    fn parse_formula(&mut self) -> PResult<Formula> {
        let start = self.current().span;
        let is_exported = self.eat(&TokenKind::Export);
        let (name, _) = self.expect_ident()?;
        self.expect(&TokenKind::Eq)?;
        let body = self.parse_expression()?;
        let end = self.expect(&TokenKind::Semicolon)?.span;
        Ok(Formula {
            name,
            is_exported,
            body,
            span: start.merge(end),
        })
    }

    // ── Expressions ─────────────────────────────────────────────────
    //
    // Precedence (low → high): or; and; = <>; < <= > >=; & ; + -; * / %; ^.
    // Unary `not`, `-`, `await` bind tighter than all binary operators.

    pub fn parse_expression(&mut self) -> PResult<Expr> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_and()?;
        while self.eat(&TokenKind::Or) {
            let rhs = self.parse_and()?;
            let span = lhs.span.merge(rhs.span);
            lhs = Expr::new(ExprKind::BinaryOp(BinaryOpKind::Or, Box::new(lhs), Box::new(rhs)), span);
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_equality()?;
        while self.eat(&TokenKind::And) {
            let rhs = self.parse_equality()?;
            let span = lhs.span.merge(rhs.span);
            lhs = Expr::new(ExprKind::BinaryOp(BinaryOpKind::And, Box::new(lhs), Box::new(rhs)), span);
        }
        Ok(lhs)
    }

    fn parse_equality(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_comparison()?;
        loop {
            let op = match self.current().kind {
                TokenKind::Eq => BinaryOpKind::Eq,
                TokenKind::NotEq => BinaryOpKind::NotEq,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_comparison()?;
            let span = lhs.span.merge(rhs.span);
            lhs = Expr::new(ExprKind::BinaryOp(op, Box::new(lhs), Box::new(rhs)), span);
        }
        Ok(lhs)
    }

    fn parse_comparison(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_concat()?;
        loop {
            let op = match self.current().kind {
                TokenKind::Lt => BinaryOpKind::Lt,
                TokenKind::Le => BinaryOpKind::Le,
                TokenKind::Gt => BinaryOpKind::Gt,
                TokenKind::Ge => BinaryOpKind::Ge,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_concat()?;
            let span = lhs.span.merge(rhs.span);
            lhs = Expr::new(ExprKind::BinaryOp(op, Box::new(lhs), Box::new(rhs)), span);
        }
        Ok(lhs)
    }

    fn parse_concat(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_additive()?;
        while self.eat(&TokenKind::Amp) {
            let rhs = self.parse_additive()?;
            let span = lhs.span.merge(rhs.span);
            lhs = Expr::new(ExprKind::BinaryOp(BinaryOpKind::Concat, Box::new(lhs), Box::new(rhs)), span);
        }
        Ok(lhs)
    }

    fn parse_additive(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.current().kind {
                TokenKind::Plus => BinaryOpKind::Add,
                TokenKind::Minus => BinaryOpKind::Sub,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_multiplicative()?;
            let span = lhs.span.merge(rhs.span);
            lhs = Expr::new(ExprKind::BinaryOp(op, Box::new(lhs), Box::new(rhs)), span);
        }
        Ok(lhs)
    }

    fn parse_multiplicative(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_pow()?;
        loop {
            let op = match self.current().kind {
                TokenKind::Star => BinaryOpKind::Mul,
                TokenKind::Slash => BinaryOpKind::Div,
                TokenKind::Percent => BinaryOpKind::Rem,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_pow()?;
            let span = lhs.span.merge(rhs.span);
            lhs = Expr::new(ExprKind::BinaryOp(op, Box::new(lhs), Box::new(rhs)), span);
        }
        Ok(lhs)
    }

    /// Right-associative: `2 ^ 3 ^ 2 == 2 ^ (3 ^ 2)`.
    fn parse_pow(&mut self) -> PResult<Expr> {
        let lhs = self.parse_unary()?;
        if self.eat(&TokenKind::Caret) {
            let rhs = self.parse_pow()?;
            let span = lhs.span.merge(rhs.span);
            Ok(Expr::new(ExprKind::BinaryOp(BinaryOpKind::Pow, Box::new(lhs), Box::new(rhs)), span))
        } else {
            Ok(lhs)
        }
    }

    fn parse_unary(&mut self) -> PResult<Expr> {
        let start = self.current().span;
        let op = match self.current().kind {
            TokenKind::Minus => Some(UnaryOpKind::Neg),
            TokenKind::Not => Some(UnaryOpKind::Not),
            TokenKind::Await => Some(UnaryOpKind::Await),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let operand = self.parse_unary()?;
            let span = start.merge(operand.span);
            Ok(Expr::new(ExprKind::UnaryOp(op, Box::new(operand)), span))
        } else {
            self.parse_postfix()
        }
    }

    fn parse_postfix(&mut self) -> PResult<Expr> {
        let mut expr = self.parse_atom()?;
        loop {
            match self.current().kind {
                TokenKind::Dot => {
                    self.advance();
                    let (member, member_span) = self.expect_ident()?;
                    let span = expr.span.merge(member_span);
                    expr = Expr::new(ExprKind::Access(Box::new(expr), member), span);
                }
                TokenKind::LParen => {
                    self.advance();
                    let mut args = Vec::new();
                    if self.current().kind != TokenKind::RParen {
                        args.push(self.parse_expression()?);
                        while self.eat(&TokenKind::Comma) {
                            args.push(self.parse_expression()?);
                        }
                    }
                    let end = self.expect(&TokenKind::RParen)?.span;
                    let span = expr.span.merge(end);
                    expr = Expr::new(ExprKind::Invoke(Box::new(expr), args), span);
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_atom(&mut self) -> PResult<Expr> {
        match self.current().kind.clone() {
            TokenKind::Number(_) | TokenKind::StringLit(_) | TokenKind::BoolLit(_) => {
                let (lit, span) = self.parse_literal()?;
                Ok(Expr::new(ExprKind::Literal(lit), span))
            }
            TokenKind::Ident(name) => {
                let span = self.advance().span;
                Ok(Expr::new(ExprKind::Identifier(name), span))
            }
            TokenKind::LParen => self.parse_paren_or_block(),
            TokenKind::If => self.parse_macro_if(),
            TokenKind::List => self.parse_macro_list(),
            TokenKind::Object => self.parse_macro_object(),
            TokenKind::Where => self.parse_macro_where(),
            _ => Err(self.error("expression")),
        }
    }

    /// `(expr)` is plain grouping; `(expr ; expr ; ...)` is a `Block`.
    fn parse_paren_or_block(&mut self) -> PResult<Expr> {
        let start = self.expect(&TokenKind::LParen)?.span;
        let mut exprs = vec![self.parse_expression()?];
        while self.eat(&TokenKind::Semicolon) {
            exprs.push(self.parse_expression()?);
        }
        let end = self.expect(&TokenKind::RParen)?.span;
        let span = start.merge(end);
        if exprs.len() == 1 {
            Ok(exprs.into_iter().next().unwrap())
        } else {
            Ok(Expr::new(ExprKind::Block(exprs), span))
        }
    }

    fn parse_macro_if(&mut self) -> PResult<Expr> {
        let start = self.expect(&TokenKind::If)?.span;
        self.expect(&TokenKind::LParen)?;
        let cond = self.parse_expression()?;
        self.expect(&TokenKind::Comma)?;
        let then_branch = self.parse_expression()?;
        self.expect(&TokenKind::Comma)?;
        let else_branch = self.parse_expression()?;
        let end = self.expect(&TokenKind::RParen)?.span;
        let span = start.merge(end);
        Ok(Expr::new(
            ExprKind::Macro(
                MacroKind::If,
                vec![
                    MacroArg::Positional(cond),
                    MacroArg::Positional(then_branch),
                    MacroArg::Positional(else_branch),
                ],
            ),
            span,
        ))
    }

    fn parse_macro_list(&mut self) -> PResult<Expr> {
        let start = self.expect(&TokenKind::List)?.span;
        self.expect(&TokenKind::LParen)?;
        let mut args = Vec::new();
        if self.current().kind != TokenKind::RParen {
            args.push(MacroArg::Positional(self.parse_expression()?));
            while self.eat(&TokenKind::Comma) {
                args.push(MacroArg::Positional(self.parse_expression()?));
            }
        }
        let end = self.expect(&TokenKind::RParen)?.span;
        Ok(Expr::new(ExprKind::Macro(MacroKind::List, args), start.merge(end)))
    }

    fn parse_macro_object(&mut self) -> PResult<Expr> {
        let start = self.expect(&TokenKind::Object)?.span;
        self.expect(&TokenKind::LParen)?;
        let mut args = Vec::new();
        if self.current().kind != TokenKind::RParen {
            args.push(self.parse_named_arg()?);
            while self.eat(&TokenKind::Comma) {
                args.push(self.parse_named_arg()?);
            }
        }
        let end = self.expect(&TokenKind::RParen)?.span;
        Ok(Expr::new(ExprKind::Macro(MacroKind::Object, args), start.merge(end)))
    }

    fn parse_named_arg(&mut self) -> PResult<MacroArg> {
        let (name, _) = self.expect_ident()?;
        self.expect(&TokenKind::Eq)?;
        let value = self.parse_expression()?;
        Ok(MacroArg::Named(name, value))
    }

    /// `WHERE(result = default, cond1, branch1, cond2, branch2, ..., default)`:
    /// the sole named argument (`result`) is the fallback value; remaining
    /// positional arguments come in `(cond, branch)` pairs.
    fn parse_macro_where(&mut self) -> PResult<Expr> {
        let start = self.expect(&TokenKind::Where)?.span;
        self.expect(&TokenKind::LParen)?;
        let (result_name, _) = self.expect_ident()?;
        if result_name.to_ascii_lowercase() != "result" {
            return Err(self.error("'result' named argument"));
        }
        self.expect(&TokenKind::Eq)?;
        let default = self.parse_expression()?;
        let mut args = vec![MacroArg::Named("result".to_string(), default)];
        while self.eat(&TokenKind::Comma) {
            args.push(MacroArg::Positional(self.parse_expression()?));
        }
        let end = self.expect(&TokenKind::RParen)?.span;
        Ok(Expr::new(ExprKind::Macro(MacroKind::Where, args), start.merge(end)))
    }
}

pub fn parse(tokens: Vec<Token>) -> PResult<Program> {
    Parser::new(tokens).parse_program()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::lexer::Lexer;

    fn parse_src(src: &str) -> Program {
        let tokens = Lexer::new(src).tokenize().unwrap();
        parse(tokens).unwrap()
    }

    #[test]
    fn parses_simple_module() {
        let program = parse_src("module M { export a = 1; b = a + 2; }");
        assert_eq!(program.modules.len(), 1);
        let m = &program.modules[0];
        assert_eq!(m.name, "M");
        assert_eq!(m.formulas.len(), 2);
        assert!(m.formulas[0].is_exported);
        assert!(!m.formulas[1].is_exported);
    }

    #[test]
    fn parses_argument_and_constant_decls() {
        let program = parse_src("argument X; constant K = 42; module M { export a = X + K; }");
        assert_eq!(program.arguments.len(), 1);
        assert_eq!(program.constants.len(), 1);
        assert_eq!(program.constants[0].name, "K");
    }

    #[test]
    fn parses_cross_module_import() {
        let program = parse_src(
            "module M1 { export x = 7; } module M2 { import M1.x as x; export y = x + 1; }",
        );
        let m2 = &program.modules[1];
        assert_eq!(m2.imports.len(), 1);
        assert_eq!(m2.imports[0].kind, ImportKind::Formula);
        assert_eq!(m2.imports[0].path, vec!["M1".to_string(), "x".to_string()]);
    }

    #[test]
    fn parses_from_form_cross_module_import() {
        let program = parse_src(
            "module M1 { export x = 7; } module M2 { import x from M1; export y = x + 1; }",
        );
        let m2 = &program.modules[1];
        assert_eq!(m2.imports.len(), 1);
        assert_eq!(m2.imports[0].kind, ImportKind::Formula);
        assert_eq!(m2.imports[0].path, vec!["M1".to_string(), "x".to_string()]);
        assert_eq!(m2.imports[0].local_name, "x");
    }

    #[test]
    fn power_is_right_associative() {
        let program = parse_src("module M { export a = 2 ^ 3 ^ 2; }");
        let body = &program.modules[0].formulas[0].body;
        match &body.kind {
            ExprKind::BinaryOp(BinaryOpKind::Pow, _, rhs) => {
                assert!(matches!(rhs.kind, ExprKind::BinaryOp(BinaryOpKind::Pow, _, _)));
            }
            other => panic!("expected Pow, got {other:?}"),
        }
    }

    #[test]
    fn unary_binds_tighter_than_pow() {
        let program = parse_src("module M { export a = -2 ^ 2; }");
        let body = &program.modules[0].formulas[0].body;
        match &body.kind {
            ExprKind::BinaryOp(BinaryOpKind::Pow, lhs, _) => {
                assert!(matches!(lhs.kind, ExprKind::UnaryOp(UnaryOpKind::Neg, _)));
            }
            other => panic!("expected Pow with negated lhs, got {other:?}"),
        }
    }

    #[test]
    fn parenthesized_semicolons_form_a_block() {
        let program = parse_src("module M { export a = (1 ; 2 ; 3); }");
        let body = &program.modules[0].formulas[0].body;
        match &body.kind {
            ExprKind::Block(exprs) => assert_eq!(exprs.len(), 3),
            other => panic!("expected Block, got {other:?}"),
        }
    }

    #[test]
    fn single_parenthesized_expr_is_not_a_block() {
        let program = parse_src("module M { export a = (1 + 2); }");
        let body = &program.modules[0].formulas[0].body;
        assert!(matches!(body.kind, ExprKind::BinaryOp(BinaryOpKind::Add, _, _)));
    }

    #[test]
    fn if_macro_parses_three_positional_args() {
        let program = parse_src("module M { export a = IF(true, 1, 2); }");
        let body = &program.modules[0].formulas[0].body;
        match &body.kind {
            ExprKind::Macro(MacroKind::If, args) => assert_eq!(args.len(), 3),
            other => panic!("expected IF macro, got {other:?}"),
        }
    }

    #[test]
    fn where_macro_requires_result_named_arg() {
        let program = parse_src("module M { export a = WHERE(result = 0, x > 1, 1, x > 2, 2); }");
        let body = &program.modules[0].formulas[0].body;
        match &body.kind {
            ExprKind::Macro(MacroKind::Where, args) => assert_eq!(args.len(), 5),
            other => panic!("expected WHERE macro, got {other:?}"),
        }
    }

    #[test]
    fn member_access_and_call_chain_left_associative() {
        let program = parse_src("module M { export a = f(1).x.y; }");
        let body = &program.modules[0].formulas[0].body;
        assert!(matches!(body.kind, ExprKind::Access(_, _)));
    }

    #[test]
    fn missing_semicolon_is_a_parse_error() {
        let tokens = Lexer::new("module M { export a = 1 }").tokenize().unwrap();
        assert!(parse(tokens).is_err());
    }
}
