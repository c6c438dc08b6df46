//! Execution planner: classify declarations Sync/Async, assign `StepId`s in
//! dependency order, form execution groups, and lower formula bodies into
//! `CompiledExpr` (spec §4.6).

use crate::compiler::ast::{self, ExprKind, MacroArg, Program, UnaryOpKind};
use crate::compiler::deps::{self, DependencyError};
use crate::compiler::lir::{
    CompiledExpr, CompiledLiteral, CompiledMacroArg, CompiledModule, CompiledProgram,
    ExecutionStep, StepBody, StepKind,
};
use crate::compiler::resolve::{DeclKind, ResolveError, SymbolRegistry};
use formulate_core::{DeclId, StepId, Value};
use thiserror::Error;

/// Sentinel written when an import's target name is not declared anywhere
/// in the program: the slot is left dangling (spec §4.5) rather than
/// rejected at compile time, and surfaces as `UnresolvedIdentifier` when the
/// runtime tries to read it.
const DANGLING_SLOT: usize = usize::MAX;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum LowerError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error(transparent)]
    Dependency(#[from] DependencyError),
}

fn classify(registry: &SymbolRegistry, decl_id: DeclId, program: &Program) -> StepKind {
    let decl = registry.decl(decl_id);
    match &decl.kind {
        DeclKind::Formula { is_tail_await, .. } => {
            if *is_tail_await {
                StepKind::Async
            } else {
                StepKind::Sync
            }
        }
        DeclKind::Import {
            kind: ast::ImportKind::Constant,
            path,
        } => {
            let name = &path[0];
            let is_pending = program
                .constants
                .iter()
                .find(|c| c.name.eq_ignore_ascii_case(name))
                .map(|c| matches!(c.value, Value::Pending(_)))
                .unwrap_or(false);
            if is_pending {
                StepKind::Async
            } else {
                StepKind::Sync
            }
        }
        DeclKind::Import { .. } => StepKind::Sync,
    }
}

fn lower_expr(
    expr: &ast::Expr,
    registry: &SymbolRegistry,
    module_index: usize,
    steps_by_decl: &[StepId],
) -> CompiledExpr {
    match &expr.kind {
        ExprKind::Literal(lit) => CompiledExpr::Literal(CompiledLiteral::from(lit)),
        ExprKind::Identifier(name) => match registry.resolve(module_index, name) {
            Some(decl_id) => CompiledExpr::Slot(steps_by_decl[decl_id.index()]),
            None => CompiledExpr::Unresolved(name.clone()),
        },
        ExprKind::Access(target, member) => CompiledExpr::Access(
            Box::new(lower_expr(target, registry, module_index, steps_by_decl)),
            member.clone(),
        ),
        ExprKind::Invoke(callee, args) => CompiledExpr::Invoke(
            Box::new(lower_expr(callee, registry, module_index, steps_by_decl)),
            args.iter()
                .map(|a| lower_expr(a, registry, module_index, steps_by_decl))
                .collect(),
        ),
        ExprKind::BinaryOp(op, l, r) => CompiledExpr::BinaryOp(
            *op,
            Box::new(lower_expr(l, registry, module_index, steps_by_decl)),
            Box::new(lower_expr(r, registry, module_index, steps_by_decl)),
        ),
        ExprKind::UnaryOp(op, operand) => CompiledExpr::UnaryOp(
            *op,
            Box::new(lower_expr(operand, registry, module_index, steps_by_decl)),
        ),
        ExprKind::Block(exprs) => CompiledExpr::Block(
            exprs
                .iter()
                .map(|e| lower_expr(e, registry, module_index, steps_by_decl))
                .collect(),
        ),
        ExprKind::Macro(kind, args) => CompiledExpr::Macro(
            *kind,
            args.iter()
                .map(|a| match a {
                    MacroArg::Positional(e) => {
                        CompiledMacroArg::Positional(lower_expr(e, registry, module_index, steps_by_decl))
                    }
                    MacroArg::Named(name, e) => {
                        CompiledMacroArg::Named(name.clone(), lower_expr(e, registry, module_index, steps_by_decl))
                    }
                })
                .collect(),
        ),
    }
}

/// `await` in tail position is handled by the planner (the declaration is
/// simply classified `Async`); the operator itself is stripped here so the
/// evaluator only ever sees the inner expression. A non-tail `await` is left
/// in place and evaluates as identity on its operand (spec §9 open question).
fn strip_tail_await(expr: &ast::Expr) -> &ast::Expr {
    match &expr.kind {
        ExprKind::UnaryOp(UnaryOpKind::Await, inner) => inner,
        _ => expr,
    }
}

pub fn lower_program(program: &Program, source_hash: String) -> Result<CompiledProgram, LowerError> {
    let registry = crate::compiler::resolve::resolve_program(program)?;
    let table = deps::build(program, &registry);
    let layers = deps::check_and_layer(&table, &registry)?;

    let n = registry.decls.len();
    let mut steps_by_decl = vec![StepId(0); n];
    let mut next_step = 0u32;
    for layer in &layers {
        for decl_id in layer {
            steps_by_decl[decl_id.index()] = StepId(next_step);
            next_step += 1;
        }
    }

    let groups: Vec<Vec<StepId>> = layers
        .iter()
        .map(|layer| layer.iter().map(|d| steps_by_decl[d.index()]).collect())
        .collect();

    let mut steps: Vec<Option<ExecutionStep>> = (0..n).map(|_| None).collect();
    for decl in &registry.decls {
        let step_id = steps_by_decl[decl.id.index()];
        let kind = classify(&registry, decl.id, program);
        let dependencies: Vec<StepId> = table
            .dependencies(decl.id)
            .iter()
            .map(|d| steps_by_decl[d.index()])
            .collect();

        let (body, is_exported) = match &decl.kind {
            DeclKind::Formula { is_exported, .. } => {
                let module = &program.modules[decl.module_index];
                let formula = module
                    .formulas
                    .iter()
                    .find(|f| f.name.eq_ignore_ascii_case(&decl.local_name))
                    .expect("decl local_name always names a formula in its own module");
                let body_expr = strip_tail_await(&formula.body);
                let compiled = lower_expr(body_expr, &registry, decl.module_index, &steps_by_decl);
                (StepBody::Formula(compiled), *is_exported)
            }
            DeclKind::Import {
                kind: ast::ImportKind::Argument,
                path,
            } => {
                let slot = registry.argument_slot(&path[0]).unwrap_or(DANGLING_SLOT);
                (StepBody::ImportArgument { slot }, false)
            }
            DeclKind::Import {
                kind: ast::ImportKind::Constant,
                path,
            } => {
                let slot = registry.constant_slot(&path[0]).unwrap_or(DANGLING_SLOT);
                (StepBody::ImportConstant { slot }, false)
            }
            DeclKind::Import {
                kind: ast::ImportKind::Formula,
                path,
            } => {
                let target_step = registry
                    .module_slot(&path[0])
                    .and_then(|target_mi| registry.resolve(target_mi, &path[1]))
                    .map(|target_decl| steps_by_decl[target_decl.index()]);
                match target_step {
                    Some(source) => (StepBody::ImportFormula { source }, false),
                    None => (StepBody::ImportFormula { source: step_id }, false),
                }
            }
            DeclKind::Import {
                kind: ast::ImportKind::Module,
                path,
            } => {
                let module_index = registry.module_slot(&path[0]).unwrap_or(usize::MAX);
                (StepBody::ImportModule { module_index }, false)
            }
        };

        steps[step_id.index()] = Some(ExecutionStep {
            id: step_id,
            decl_id: decl.id,
            module_index: decl.module_index,
            local_name: decl.local_name.clone(),
            kind,
            dependencies,
            body,
            is_exported,
            span: decl.span,
        });
    }

    let steps: Vec<ExecutionStep> = steps
        .into_iter()
        .map(|s| s.expect("every decl produces exactly one step"))
        .collect();

    let constant_values = program
        .constants
        .iter()
        .map(|c| match &c.value {
            Value::Number(n) => Some(CompiledLiteral::Number(n.to_string())),
            Value::String(s) => Some(CompiledLiteral::String(s.to_string())),
            Value::Boolean(b) => Some(CompiledLiteral::Boolean(*b)),
            _ => None,
        })
        .collect();

    Ok(CompiledProgram {
        argument_names: registry.argument_names.clone(),
        constant_values,
        constant_names: registry.constant_names.clone(),
        modules: program
            .modules
            .iter()
            .map(|m| CompiledModule { name: m.name.clone() })
            .collect(),
        groups,
        steps,
        source_hash,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::lexer::Lexer;
    use crate::compiler::parser::parse;

    fn lower_src(src: &str) -> CompiledProgram {
        let tokens = Lexer::new(src).tokenize().unwrap();
        let program = parse(tokens).unwrap();
        lower_program(&program, "test".to_string()).unwrap()
    }

    #[test]
    fn chained_formulas_land_in_three_groups() {
        let plan = lower_src("module M { export a = 2; export b = a + 3; export c = b * a; }");
        assert_eq!(plan.groups.len(), 3);
        assert_eq!(plan.steps.len(), 3);
    }

    #[test]
    fn step_ids_respect_dependency_order() {
        let plan = lower_src("module M { export a = 1; export b = a; }");
        for step in &plan.steps {
            for dep in &step.dependencies {
                assert!(dep.0 < step.id.0);
            }
        }
    }

    #[test]
    fn cycle_is_rejected_at_lowering() {
        let tokens = Lexer::new("module M { a = b; b = a; }").tokenize().unwrap();
        let program = parse(tokens).unwrap();
        assert!(lower_program(&program, "test".to_string()).is_err());
    }

    #[test]
    fn argument_import_resolves_to_argument_slot() {
        let tokens = Lexer::new("argument X; module M { import argument X as x; export a = x; }")
            .tokenize()
            .unwrap();
        let program = parse(tokens).unwrap();
        let plan = lower_program(&program, "test".to_string()).unwrap();
        let import_step = plan.steps.iter().find(|s| s.local_name == "x").unwrap();
        assert!(matches!(import_step.body, StepBody::ImportArgument { slot: 0 }));
    }

    #[test]
    fn undeclared_identifier_lowers_to_unresolved_instead_of_panicking() {
        let plan = lower_src("module M { export a = missing_name; }");
        assert!(matches!(
            plan.steps[0].body,
            StepBody::Formula(CompiledExpr::Unresolved(ref n)) if n == "missing_name"
        ));
    }

    #[test]
    fn async_classification_follows_tail_await() {
        let tokens = Lexer::new("module M { export a = (await 1); }").tokenize().unwrap();
        let program = parse(tokens).unwrap();
        let plan = lower_program(&program, "test".to_string()).unwrap();
        assert_eq!(plan.steps[0].kind, StepKind::Async);
    }
}
