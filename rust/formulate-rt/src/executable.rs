//! The compiled plan turned into a callable: argument/constant/module slot
//! seeding, skip-list bookkeeping, and the group-barrier driver (spec §4.7).

use crate::evaluator;
use crate::nursery::Nursery;
use formulate_compiler::compiler::lir::{CompiledLiteral, CompiledProgram, StepBody, StepKind};
use formulate_core::{ErrorKind, StepId, Value, ValueError, ValueObject};
use std::collections::HashMap;
use std::time::{Duration, Instant};

const DANGLING: usize = usize::MAX;

/// The output bundle described in spec §6: exported formula values grouped
/// by module, and the errors produced by the exported formulas that failed.
/// A skipped exported formula — one quarantined by a failing dependency —
/// appears in neither map.
#[derive(Debug, Default, Clone)]
pub struct RunResult {
    pub modules: HashMap<String, ValueObject>,
    pub errors: HashMap<String, ValueError>,
}

/// A compiled program ready to be invoked with argument values.
pub struct Executable {
    program: CompiledProgram,
}

fn unresolved(name_hint: &str) -> Value {
    Value::Error(ValueError::new(
        ErrorKind::UnresolvedIdentifier,
        format!("unresolved identifier '{name_hint}'"),
    ))
}

fn literal_to_value(lit: &CompiledLiteral) -> Value {
    match lit {
        CompiledLiteral::Number(s) => {
            bigdecimal::BigDecimal::from_str(s).map(Value::Number).unwrap_or_else(|_| {
                Value::Error(ValueError::new(ErrorKind::Internal, "invalid constant literal"))
            })
        }
        CompiledLiteral::String(s) => Value::string(s.clone()),
        CompiledLiteral::Boolean(b) => Value::Boolean(*b),
    }
}

use std::str::FromStr;

/// Evaluates a single step's body given the already-settled state visible to
/// it: earlier-group step values (`slots`), argument/constant seeds, and
/// (sync-only) each module's export object built so far.
fn eval_body(
    body: &StepBody,
    id: StepId,
    kind: StepKind,
    arguments: &[Value],
    constants: &[Value],
    exports: &[ValueObject],
    slots: &[Value],
) -> Value {
    match body {
        StepBody::Formula(expr) => evaluator::eval(expr, slots),
        StepBody::ImportArgument { slot } => {
            if *slot == DANGLING {
                unresolved("argument")
            } else {
                arguments.get(*slot).cloned().unwrap_or_else(|| unresolved("argument"))
            }
        }
        StepBody::ImportConstant { slot } => {
            if *slot == DANGLING {
                return unresolved("constant");
            }
            let v = constants.get(*slot).cloned().unwrap_or_else(|| unresolved("constant"));
            match (kind, v) {
                (StepKind::Async, Value::Pending(thunk)) => thunk(),
                (_, v) => v,
            }
        }
        StepBody::ImportFormula { source } => {
            if *source == id {
                unresolved("formula")
            } else {
                slots[source.index()].clone()
            }
        }
        StepBody::ImportModule { module_index } => {
            if *module_index == DANGLING {
                unresolved("module")
            } else {
                Value::Object(exports[*module_index].clone())
            }
        }
    }
}

impl Executable {
    pub fn new(program: CompiledProgram) -> Self {
        Self { program }
    }

    pub fn program(&self) -> &CompiledProgram {
        &self.program
    }

    /// Invokes the program. `arguments` aligns with `argument_names` by
    /// position; `pending_constants` supplies a live value for every
    /// constant whose compiled literal is `None` (a `Pending` constant that
    /// could not survive serialization — spec_full §2) and is ignored
    /// elsewhere. `timeout`, if set, bounds the whole call (spec §5); on
    /// expiry in-flight async steps are detached rather than joined.
    pub fn call(
        &self,
        arguments: &[Value],
        pending_constants: &[Option<Value>],
        timeout: Option<Duration>,
    ) -> Result<RunResult, ValueError> {
        let deadline = timeout.map(|d| Instant::now() + d);
        let step_count = self.program.steps.len();

        let argument_seed: Vec<Value> = (0..self.program.argument_names.len())
            .map(|i| arguments.get(i).cloned().unwrap_or_else(|| unresolved("argument")))
            .collect();

        let constant_seed: Vec<Value> = (0..self.program.constant_names.len())
            .map(|i| match &self.program.constant_values[i] {
                Some(lit) => literal_to_value(lit),
                None => pending_constants
                    .get(i)
                    .cloned()
                    .flatten()
                    .unwrap_or_else(|| {
                        Value::Error(ValueError::new(
                            ErrorKind::Internal,
                            "pending constant was not supplied to Executable::call",
                        ))
                    }),
            })
            .collect();

        let mut slots: Vec<Value> = vec![Value::Boolean(false); step_count];
        let mut skip = vec![true; step_count];
        let mut exports: Vec<ValueObject> =
            (0..self.program.modules.len()).map(|_| ValueObject::new()).collect();
        let mut result = RunResult::default();

        for group in &self.program.groups {
            let runnable: Vec<StepId> = group
                .iter()
                .copied()
                .filter(|id| {
                    let step = self.program.step(*id);
                    step.dependencies.iter().all(|d| !skip[d.index()])
                })
                .collect();

            let snapshot = slots.clone();
            let mut nursery = Nursery::new();
            let mut async_ids = Vec::new();
            let mut sync_results = Vec::new();

            for &id in &runnable {
                let step = self.program.step(id);
                match step.kind {
                    StepKind::Sync => {
                        let value = eval_body(
                            &step.body,
                            id,
                            step.kind,
                            &argument_seed,
                            &constant_seed,
                            &exports,
                            &snapshot,
                        );
                        sync_results.push((id, value));
                    }
                    StepKind::Async => {
                        let body = step.body.clone();
                        let args = argument_seed.clone();
                        let consts = constant_seed.clone();
                        let snap = snapshot.clone();
                        let kind = step.kind;
                        nursery.spawn(move || eval_body(&body, id, kind, &args, &consts, &[], &snap));
                        async_ids.push(id);
                    }
                }
            }

            let async_results = match nursery.join_all(deadline) {
                Some(results) => results,
                None => return Err(ValueError::new(ErrorKind::Timeout, "execution timed out")),
            };

            for (id, value) in sync_results {
                self.apply(id, value, &mut slots, &mut skip, &mut exports, &mut result);
            }
            for (id, value) in async_ids.into_iter().zip(async_results) {
                self.apply(id, value, &mut slots, &mut skip, &mut exports, &mut result);
            }
        }

        Ok(result)
    }

    fn apply(
        &self,
        id: StepId,
        value: Value,
        slots: &mut [Value],
        skip: &mut [bool],
        exports: &mut [ValueObject],
        result: &mut RunResult,
    ) {
        let step = self.program.step(id);
        match &value {
            Value::Error(e) => {
                if step.is_exported {
                    let module_name = &self.program.modules[step.module_index].name;
                    result
                        .errors
                        .insert(format!("{module_name}.{}", step.local_name), e.clone());
                }
                slots[id.index()] = value;
            }
            _ => {
                if step.is_exported {
                    exports[step.module_index].insert(step.local_name.clone(), value.clone());
                    let module_name = self.program.modules[step.module_index].name.clone();
                    result
                        .modules
                        .entry(module_name)
                        .or_insert_with(ValueObject::new)
                        .insert(step.local_name.clone(), value.clone());
                }
                slots[id.index()] = value;
                skip[id.index()] = false;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use formulate_compiler::{compile_source, CompileOptions};

    fn compiled(src: &str) -> CompiledProgram {
        compile_source(src, CompileOptions::default()).unwrap()
    }

    #[test]
    fn constant_export_appears_in_modules() {
        let exe = Executable::new(compiled("module M { export a = 1; }"));
        let result = exe.call(&[], &[], None).unwrap();
        let m = result.modules.get("M").unwrap();
        assert!(matches!(m.get("a"), Some(Value::Number(_))));
        assert!(result.errors.is_empty());
    }

    #[test]
    fn chained_formulas_resolve_in_order() {
        let exe = Executable::new(compiled("module M { export a = 2; export b = a + 3; export c = b * a; }"));
        let result = exe.call(&[], &[], None).unwrap();
        let m = result.modules.get("M").unwrap();
        match m.get("c").unwrap() {
            Value::Number(n) => assert_eq!(*n, bigdecimal::BigDecimal::from(10)),
            other => panic!("expected Number, got {other:?}"),
        }
    }

    #[test]
    fn a_failing_dependency_quarantines_only_its_dependents() {
        let exe = Executable::new(compiled(
            "module M { export a = 1 / 0; export b = a + 1; export c = 5; }",
        ));
        let result = exe.call(&[], &[], None).unwrap();
        let m = result.modules.get("M").unwrap();
        assert!(result.errors.contains_key("M.a"));
        assert!(!result.errors.contains_key("M.b"));
        assert!(m.get("b").is_none());
        assert!(matches!(m.get("c"), Some(Value::Number(_))));
    }

    #[test]
    fn argument_import_reads_the_call_time_value() {
        let exe = Executable::new(compiled(
            "argument X; module M { import argument X as x; export doubled = x * 2; }",
        ));
        let result = exe.call(&[Value::Number(bigdecimal::BigDecimal::from(21))], &[], None).unwrap();
        let m = result.modules.get("M").unwrap();
        match m.get("doubled").unwrap() {
            Value::Number(n) => assert_eq!(*n, bigdecimal::BigDecimal::from(42)),
            other => panic!("expected Number, got {other:?}"),
        }
    }

    #[test]
    fn cross_module_formula_import_carries_the_value_across() {
        let exe = Executable::new(compiled(
            "module M1 { export x = 7; } module M2 { import M1.x as y; export z = y + 1; }",
        ));
        let result = exe.call(&[], &[], None).unwrap();
        let m2 = result.modules.get("M2").unwrap();
        match m2.get("z").unwrap() {
            Value::Number(n) => assert_eq!(*n, bigdecimal::BigDecimal::from(8)),
            other => panic!("expected Number, got {other:?}"),
        }
    }

    #[test]
    fn pending_constant_is_awaited_through_the_barrier() {
        use formulate_compiler::compiler::ast::{ConstantDecl, Import, ImportKind, Module, Formula};
        use formulate_compiler::compiler::ast::{Program, Expr, ExprKind};
        use formulate_core::Span;
        use std::sync::Arc;

        let program = Program {
            arguments: vec![],
            constants: vec![ConstantDecl {
                name: "K".to_string(),
                value: Value::Pending(Arc::new(|| Value::Number(bigdecimal::BigDecimal::from(42)))),
                span: Span::dummy(),
            }],
            modules: vec![Module {
                name: "M".to_string(),
                imports: vec![Import {
                    local_name: "k".to_string(),
                    path: vec!["K".to_string()],
                    kind: ImportKind::Constant,
                    span: Span::dummy(),
                }],
                formulas: vec![Formula {
                    name: "v".to_string(),
                    is_exported: true,
                    body: Expr::new(ExprKind::Identifier("k".to_string()), Span::dummy()),
                    span: Span::dummy(),
                }],
                span: Span::dummy(),
            }],
        };
        let plan = formulate_compiler::compile_program(&program, "test").unwrap();
        let exe = Executable::new(plan);
        let pending = vec![Some(Value::Pending(Arc::new(|| Value::Number(bigdecimal::BigDecimal::from(42)))))];
        let result = exe.call(&[], &pending, None).unwrap();
        let m = result.modules.get("M").unwrap();
        match m.get("v").unwrap() {
            Value::Number(n) => assert_eq!(*n, bigdecimal::BigDecimal::from(42)),
            other => panic!("expected Number, got {other:?}"),
        }
    }

    #[test]
    fn module_import_copies_every_export() {
        let exe = Executable::new(compiled(
            "module M1 { export x = 1; export y = 2; z = 3; } \
             module M2 { import M1 as m; export count = m.x + m.y; }",
        ));
        let result = exe.call(&[], &[], None).unwrap();
        let m2 = result.modules.get("M2").unwrap();
        match m2.get("count").unwrap() {
            Value::Number(n) => assert_eq!(*n, bigdecimal::BigDecimal::from(3)),
            other => panic!("expected Number, got {other:?}"),
        }
    }
}
