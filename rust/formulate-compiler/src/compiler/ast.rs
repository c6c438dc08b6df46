//! AST node variants, ordered child iteration, and the visitor used by the
//! dependency table builder (spec §4.3).
//!
//! Unlike the compiled plan (`compiler::lir`), the AST does not round-trip
//! through JSON: `ConstantDecl` holds a live `formulate_core::Value` so that
//! a program built directly in Rust (as opposed to parsed from source) can
//! seed a `Pending` constant, and `Value` cannot derive `Serialize` because
//! `Function`/`Pending` carry trait objects.

use bigdecimal::BigDecimal;
use formulate_core::{Span, Value};
use std::fmt;

#[derive(Debug, Clone)]
pub struct Program {
    pub arguments: Vec<ArgumentDecl>,
    pub constants: Vec<ConstantDecl>,
    pub modules: Vec<Module>,
}

#[derive(Debug, Clone)]
pub struct ArgumentDecl {
    pub name: String,
    pub span: Span,
}

#[derive(Clone)]
pub struct ConstantDecl {
    pub name: String,
    pub value: Value,
    pub span: Span,
}

impl fmt::Debug for ConstantDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConstantDecl")
            .field("name", &self.name)
            .field("value", &self.value)
            .field("span", &self.span)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct Module {
    pub name: String,
    pub imports: Vec<Import>,
    pub formulas: Vec<Formula>,
    pub span: Span,
}

/// `kind` determines how `path` is read: `Argument`/`Constant`/`Module`
/// imports have a single-element path; `Formula` imports have a two-element
/// path `{module, formula}` (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportKind {
    Argument,
    Constant,
    Formula,
    Module,
}

#[derive(Debug, Clone)]
pub struct Import {
    pub local_name: String,
    pub path: Vec<String>,
    pub kind: ImportKind,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct Formula {
    pub name: String,
    pub is_exported: bool,
    pub body: Expr,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum Literal {
    Number(BigDecimal),
    String(String),
    Boolean(bool),
}

impl Literal {
    pub fn to_value(&self) -> Value {
        match self {
            Literal::Number(n) => Value::Number(n.clone()),
            Literal::String(s) => Value::string(s.clone()),
            Literal::Boolean(b) => Value::Boolean(*b),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOpKind {
    Or,
    And,
    Eq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    Concat,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Pow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOpKind {
    Neg,
    Not,
    Await,
}

/// A macro call argument: positional or named (spec §3).
#[derive(Debug, Clone)]
pub enum MacroArg {
    Positional(Expr),
    Named(String, Expr),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacroKind {
    If,
    List,
    Object,
    Where,
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    Literal(Literal),
    Identifier(String),
    Access(Box<Expr>, String),
    Invoke(Box<Expr>, Vec<Expr>),
    BinaryOp(BinaryOpKind, Box<Expr>, Box<Expr>),
    UnaryOp(UnaryOpKind, Box<Expr>),
    /// A parenthesized `(e1 ; e2 ; ...)` sequence; a single expression with
    /// no semicolons parses as the expression itself, not a `Block` of one.
    Block(Vec<Expr>),
    Macro(MacroKind, Vec<MacroArg>),
}

#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self { kind, span }
    }

    /// An `await` applied directly to this expression, i.e. this expression
    /// sits in an async declaration's tail position (spec §4.6, §9).
    pub fn is_tail_await(&self) -> bool {
        matches!(&self.kind, ExprKind::UnaryOp(UnaryOpKind::Await, _))
    }

    /// Ordered children, used by the dependency-table tree walk.
    pub fn children(&self) -> Vec<&Expr> {
        match &self.kind {
            ExprKind::Literal(_) | ExprKind::Identifier(_) => Vec::new(),
            ExprKind::Access(target, _) => vec![target],
            ExprKind::Invoke(callee, args) => {
                let mut c = vec![callee.as_ref()];
                c.extend(args.iter());
                c
            }
            ExprKind::BinaryOp(_, l, r) => vec![l, r],
            ExprKind::UnaryOp(_, operand) => vec![operand],
            ExprKind::Block(exprs) => exprs.iter().collect(),
            ExprKind::Macro(_, args) => args
                .iter()
                .map(|a| match a {
                    MacroArg::Positional(e) => e,
                    MacroArg::Named(_, e) => e,
                })
                .collect(),
        }
    }

    pub fn children_reverse(&self) -> Vec<&Expr> {
        let mut c = self.children();
        c.reverse();
        c
    }
}

// ── Visitor ─────────────────────────────────────────────────────────

/// DFS walk with paired `on_enter`/`on_exit` callbacks, in place of the
/// reflection-driven traversal a dynamically-typed host would reach for.
pub trait Visitor {
    fn on_enter_module(&mut self, _m: &Module) {}
    fn on_exit_module(&mut self, _m: &Module) {}
    fn on_enter_formula(&mut self, _f: &Formula) {}
    fn on_exit_formula(&mut self, _f: &Formula) {}
    fn on_enter_import(&mut self, _i: &Import) {}
    fn on_exit_import(&mut self, _i: &Import) {}
    fn on_enter_expr(&mut self, _e: &Expr) {}
    fn on_exit_expr(&mut self, _e: &Expr) {}
}

pub fn walk_program<V: Visitor>(program: &Program, v: &mut V) {
    for module in &program.modules {
        v.on_enter_module(module);
        for import in &module.imports {
            v.on_enter_import(import);
            v.on_exit_import(import);
        }
        for formula in &module.formulas {
            v.on_enter_formula(formula);
            walk_expr(&formula.body, v);
            v.on_exit_formula(formula);
        }
        v.on_exit_module(module);
    }
}

pub fn walk_expr<V: Visitor>(expr: &Expr, v: &mut V) {
    v.on_enter_expr(expr);
    for child in expr.children() {
        walk_expr(child, v);
    }
    v.on_exit_expr(expr);
}

// ── Unparse (spec §8 round-trip property) ──────────────────────────

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Number(n) => write!(f, "{n}"),
            Literal::String(s) => write!(f, "{:?}", s),
            Literal::Boolean(b) => write!(f, "{b}"),
        }
    }
}

impl fmt::Display for BinaryOpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BinaryOpKind::Or => "or",
            BinaryOpKind::And => "and",
            BinaryOpKind::Eq => "=",
            BinaryOpKind::NotEq => "<>",
            BinaryOpKind::Lt => "<",
            BinaryOpKind::Le => "<=",
            BinaryOpKind::Gt => ">",
            BinaryOpKind::Ge => ">=",
            BinaryOpKind::Concat => "&",
            BinaryOpKind::Add => "+",
            BinaryOpKind::Sub => "-",
            BinaryOpKind::Mul => "*",
            BinaryOpKind::Div => "/",
            BinaryOpKind::Rem => "%",
            BinaryOpKind::Pow => "^",
        };
        write!(f, "{s}")
    }
}

fn macro_name(kind: MacroKind) -> &'static str {
    match kind {
        MacroKind::If => "IF",
        MacroKind::List => "LIST",
        MacroKind::Object => "OBJECT",
        MacroKind::Where => "WHERE",
    }
}

/// Renders an expression back to source text. Sufficient for the round-trip
/// testable property over the expression language; declaration syntax
/// (modules, imports, formula headers) is not exercised by that property and
/// is not covered here.
pub fn unparse(expr: &Expr) -> String {
    match &expr.kind {
        ExprKind::Literal(lit) => lit.to_string(),
        ExprKind::Identifier(name) => name.clone(),
        ExprKind::Access(target, member) => format!("{}.{}", unparse(target), member),
        ExprKind::Invoke(callee, args) => {
            let args: Vec<String> = args.iter().map(unparse).collect();
            format!("{}({})", unparse(callee), args.join(", "))
        }
        ExprKind::BinaryOp(op, l, r) => format!("({} {} {})", unparse(l), op, unparse(r)),
        ExprKind::UnaryOp(UnaryOpKind::Neg, operand) => format!("(-{})", unparse(operand)),
        ExprKind::UnaryOp(UnaryOpKind::Not, operand) => format!("(not {})", unparse(operand)),
        ExprKind::UnaryOp(UnaryOpKind::Await, operand) => format!("(await {})", unparse(operand)),
        ExprKind::Block(exprs) => {
            let parts: Vec<String> = exprs.iter().map(unparse).collect();
            format!("({})", parts.join(" ; "))
        }
        ExprKind::Macro(kind, args) => {
            let parts: Vec<String> = args
                .iter()
                .map(|a| match a {
                    MacroArg::Positional(e) => unparse(e),
                    MacroArg::Named(name, e) => format!("{} = {}", name, unparse(e)),
                })
                .collect();
            format!("{}({})", macro_name(*kind), parts.join(", "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn lit_num(n: i64) -> Expr {
        Expr::new(
            ExprKind::Literal(Literal::Number(BigDecimal::from_str(&n.to_string()).unwrap())),
            Span::dummy(),
        )
    }

    #[test]
    fn unparse_binary_op() {
        let expr = Expr::new(
            ExprKind::BinaryOp(BinaryOpKind::Add, Box::new(lit_num(1)), Box::new(lit_num(2))),
            Span::dummy(),
        );
        assert_eq!(unparse(&expr), "(1 + 2)");
    }

    #[test]
    fn children_of_binary_op_are_operands_in_order() {
        let expr = ExprKind::BinaryOp(BinaryOpKind::Add, Box::new(lit_num(1)), Box::new(lit_num(2)));
        let expr = Expr::new(expr, Span::dummy());
        let children = expr.children();
        assert_eq!(children.len(), 2);
    }

    struct CountingVisitor {
        enters: usize,
    }
    impl Visitor for CountingVisitor {
        fn on_enter_expr(&mut self, _e: &Expr) {
            self.enters += 1;
        }
    }

    #[test]
    fn walk_visits_every_node() {
        let expr = Expr::new(
            ExprKind::BinaryOp(BinaryOpKind::Add, Box::new(lit_num(1)), Box::new(lit_num(2))),
            Span::dummy(),
        );
        let mut visitor = CountingVisitor { enters: 0 };
        walk_expr(&expr, &mut visitor);
        assert_eq!(visitor.enters, 3);
    }
}
