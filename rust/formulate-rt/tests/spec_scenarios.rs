//! End-to-end scenarios from spec §8, run through the full
//! compile → execute pipeline.

use bigdecimal::BigDecimal;
use formulate_compiler::compiler::ast::{
    ConstantDecl, Expr, ExprKind, Formula, Import, ImportKind, Module, Program,
};
use formulate_compiler::{compile_program, compile_source, CompileOptions};
use formulate_core::{ErrorKind, Span, Value};
use formulate_rt::Executable;
use std::sync::Arc;

fn num(n: i64) -> BigDecimal {
    BigDecimal::from(n)
}

#[test]
fn scenario_1_constant_export() {
    let plan = compile_source("module M { export a = 1; }", CompileOptions::default()).unwrap();
    let result = Executable::new(plan).call(&[], &[], None).unwrap();
    assert!(result.errors.is_empty());
    let m = result.modules.get("M").unwrap();
    assert!(matches!(m.get("a"), Some(Value::Number(n)) if *n == num(1)));
}

#[test]
fn scenario_2_chained_formulas() {
    let plan = compile_source(
        "module M { export a = 2; export b = a + 3; export c = b * a; }",
        CompileOptions::default(),
    )
    .unwrap();
    assert_eq!(plan.groups.len(), 3);
    let result = Executable::new(plan).call(&[], &[], None).unwrap();
    let m = result.modules.get("M").unwrap();
    assert!(matches!(m.get("a"), Some(Value::Number(n)) if *n == num(2)));
    assert!(matches!(m.get("b"), Some(Value::Number(n)) if *n == num(5)));
    assert!(matches!(m.get("c"), Some(Value::Number(n)) if *n == num(10)));
}

#[test]
fn scenario_3_error_isolation() {
    let plan = compile_source(
        "module M { export a = 1 / 0; export b = a + 1; export c = 5; }",
        CompileOptions::default(),
    )
    .unwrap();
    let result = Executable::new(plan).call(&[], &[], None).unwrap();
    let a_err = result.errors.get("M.a").expect("a failed with MathDomain");
    assert_eq!(a_err.kind, ErrorKind::MathDomain);
    assert!(!result.errors.contains_key("M.b"), "b is skipped, not errored");
    let m = result.modules.get("M").unwrap();
    assert!(m.get("b").is_none(), "b is absent: quarantined by a's failure");
    assert!(matches!(m.get("c"), Some(Value::Number(n)) if *n == num(5)));
}

#[test]
fn scenario_4_cross_module_import() {
    let plan = compile_source(
        "module M1 { export x = 7; } module M2 { import M1.x as x; export y = x + 1; }",
        CompileOptions::default(),
    )
    .unwrap();
    let result = Executable::new(plan).call(&[], &[], None).unwrap();
    let m1 = result.modules.get("M1").unwrap();
    let m2 = result.modules.get("M2").unwrap();
    assert!(matches!(m1.get("x"), Some(Value::Number(n)) if *n == num(7)));
    assert!(matches!(m2.get("y"), Some(Value::Number(n)) if *n == num(8)));
}

#[test]
fn scenario_4_literal_source_text_runs() {
    // The worked example's own surface syntax: `import x from M1;`.
    let plan = compile_source(
        "module M1 { export x = 7; } module M2 { import x from M1; export y = x + 1; }",
        CompileOptions::default(),
    )
    .unwrap();
    let result = Executable::new(plan).call(&[], &[], None).unwrap();
    let m1 = result.modules.get("M1").unwrap();
    let m2 = result.modules.get("M2").unwrap();
    assert!(matches!(m1.get("x"), Some(Value::Number(n)) if *n == num(7)));
    assert!(matches!(m2.get("y"), Some(Value::Number(n)) if *n == num(8)));
}

#[test]
fn scenario_5_async_barrier_over_a_pending_constant() {
    let program = Program {
        arguments: vec![],
        constants: vec![ConstantDecl {
            name: "K".to_string(),
            value: Value::Pending(Arc::new(|| Value::Number(num(42)))),
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
            formulas: vec![
                Formula {
                    name: "a".to_string(),
                    is_exported: true,
                    body: Expr::new(ExprKind::Identifier("k".to_string()), Span::dummy()),
                    span: Span::dummy(),
                },
                Formula {
                    name: "b".to_string(),
                    is_exported: true,
                    body: Expr::new(
                        ExprKind::BinaryOp(
                            formulate_compiler::compiler::ast::BinaryOpKind::Add,
                            Box::new(Expr::new(ExprKind::Identifier("a".to_string()), Span::dummy())),
                            Box::new(Expr::new(
                                ExprKind::Literal(formulate_compiler::compiler::ast::Literal::Number(num(1))),
                                Span::dummy(),
                            )),
                        ),
                        Span::dummy(),
                    ),
                    span: Span::dummy(),
                },
            ],
            span: Span::dummy(),
        }],
    };

    let plan = compile_program(&program, "test").unwrap();
    // Import(k) is Async (group 0); a depends on it and is Sync (group 1);
    // b depends on a and is Sync (group 2).
    assert_eq!(plan.groups.len(), 3);

    let pending = vec![Some(Value::Pending(Arc::new(|| Value::Number(num(42)))))];
    let result = Executable::new(plan).call(&[], &pending, None).unwrap();
    let m = result.modules.get("M").unwrap();
    assert!(matches!(m.get("a"), Some(Value::Number(n)) if *n == num(42)));
    assert!(matches!(m.get("b"), Some(Value::Number(n)) if *n == num(43)));
}

#[test]
fn scenario_6_cycle_rejection() {
    let result = compile_source("module M { a = b; b = a; }", CompileOptions::default());
    assert!(result.is_err());
}
