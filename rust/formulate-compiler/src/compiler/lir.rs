//! The compiled plan: execution steps grouped into barrier layers, ready for
//! the runtime driver to execute (spec §4.6, §4.7).

use crate::compiler::ast::{BinaryOpKind, Literal, MacroKind, UnaryOpKind};
use formulate_core::{DeclId, Span, StepId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepKind {
    Sync,
    Async,
}

/// Where a step's value comes from and how its body should be evaluated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StepBody {
    /// A formula body, evaluated by `formulate-rt`'s expression evaluator.
    Formula(CompiledExpr),
    /// An import of a top-level argument: read the argument slot by index.
    /// `slot == usize::MAX` means the named argument was never declared —
    /// dangling per spec §4.5, evaluates to `UnresolvedIdentifier`.
    ImportArgument { slot: usize },
    /// An import of a top-level constant: read the constant slot by index.
    /// `slot == usize::MAX` means dangling, as above.
    ImportConstant { slot: usize },
    /// An import of a single formula from another module: copy that step's
    /// value once it has settled. `source == id` (this step's own id) means
    /// the target module/formula does not exist — dangling, as above.
    ImportFormula { source: StepId },
    /// An import of an entire module: copy that module's exports object,
    /// once every export step it depends on has settled.
    /// `module_index == usize::MAX` means dangling, as above.
    ImportModule { module_index: usize },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionStep {
    pub id: StepId,
    pub decl_id: DeclId,
    pub module_index: usize,
    pub local_name: String,
    pub kind: StepKind,
    pub dependencies: Vec<StepId>,
    pub body: StepBody,
    pub is_exported: bool,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompiledModule {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompiledProgram {
    pub argument_names: Vec<String>,
    /// Constant values, serialized at compile time; `Pending` constants are
    /// represented as `None` here and re-seeded by the caller through
    /// `Executable::call` (see `formulate-rt`), since a thunk cannot survive
    /// a JSON round-trip.
    pub constant_values: Vec<Option<CompiledLiteral>>,
    pub constant_names: Vec<String>,
    pub modules: Vec<CompiledModule>,
    pub groups: Vec<Vec<StepId>>,
    pub steps: Vec<ExecutionStep>,
    pub source_hash: String,
}

impl CompiledProgram {
    pub fn step(&self, id: StepId) -> &ExecutionStep {
        &self.steps[id.index()]
    }
}

/// A literal value that survives JSON serialization, used for constants and
/// for `Expr::Literal` nodes inside a compiled formula body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CompiledLiteral {
    Number(String),
    String(String),
    Boolean(bool),
}

impl From<&Literal> for CompiledLiteral {
    fn from(lit: &Literal) -> Self {
        match lit {
            Literal::Number(n) => CompiledLiteral::Number(n.to_string()),
            Literal::String(s) => CompiledLiteral::String(s.clone()),
            Literal::Boolean(b) => CompiledLiteral::Boolean(*b),
        }
    }
}

/// A serializable mirror of `ast::Expr`, with identifiers already resolved
/// to `StepId`/argument/constant slots so the runtime never has to consult
/// the symbol registry at evaluation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CompiledExpr {
    Literal(CompiledLiteral),
    Slot(StepId),
    /// A bare identifier that named nothing in its module's local scope at
    /// lowering time. Evaluates to `UnresolvedIdentifier` rather than
    /// failing the compile (spec §3): only import *targets* are allowed to
    /// dangle at compile time, but an ordinary undeclared name inside a
    /// formula body is just as harmless to defer to runtime.
    Unresolved(String),
    Access(Box<CompiledExpr>, String),
    Invoke(Box<CompiledExpr>, Vec<CompiledExpr>),
    BinaryOp(BinaryOpKind, Box<CompiledExpr>, Box<CompiledExpr>),
    UnaryOp(UnaryOpKind, Box<CompiledExpr>),
    Block(Vec<CompiledExpr>),
    Macro(MacroKind, Vec<CompiledMacroArg>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CompiledMacroArg {
    Positional(CompiledExpr),
    Named(String, CompiledExpr),
}
