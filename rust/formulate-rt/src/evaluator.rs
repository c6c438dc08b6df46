//! Expression evaluator (spec §4.8): turns a `CompiledExpr` into a `Value`,
//! reading already-settled step values out of `slots`.
//!
//! Every branch here is infallible in the Rust sense — a semantic failure
//! (bad coercion, missing member, division by zero, ...) is represented as
//! `Value::Error` and returned like any other value, never a panic and
//! never a `Result` the caller has to unwind.

use bigdecimal::BigDecimal;
use formulate_compiler::compiler::ast::{BinaryOpKind, MacroKind, UnaryOpKind};
use formulate_compiler::compiler::lir::{CompiledExpr, CompiledLiteral, CompiledMacroArg};
use formulate_core::{value, ErrorKind, Value, ValueError};
use std::str::FromStr;

fn literal_value(lit: &CompiledLiteral) -> Value {
    match lit {
        CompiledLiteral::Number(s) => BigDecimal::from_str(s).map(Value::Number).unwrap_or_else(|_| {
            Value::Error(ValueError::new(
                ErrorKind::Internal,
                format!("invalid compiled number literal '{s}'"),
            ))
        }),
        CompiledLiteral::String(s) => Value::string(s.clone()),
        CompiledLiteral::Boolean(b) => Value::Boolean(*b),
    }
}

/// Evaluates `expr` against `slots`, the value each earlier step in this
/// call produced, indexed by `StepId`.
pub fn eval(expr: &CompiledExpr, slots: &[Value]) -> Value {
    match expr {
        CompiledExpr::Literal(lit) => literal_value(lit),
        CompiledExpr::Unresolved(name) => Value::Error(ValueError::new(
            ErrorKind::UnresolvedIdentifier,
            format!("unresolved identifier '{name}'"),
        )),
        CompiledExpr::Slot(id) => slots[id.index()].clone(),
        CompiledExpr::Access(target, member) => value::access(&eval(target, slots), member),
        CompiledExpr::Invoke(callee, args) => eval_invoke(&eval(callee, slots), args, slots),
        CompiledExpr::BinaryOp(op, l, r) => eval_binary(*op, &eval(l, slots), &eval(r, slots)),
        CompiledExpr::UnaryOp(op, operand) => eval_unary(*op, &eval(operand, slots)),
        CompiledExpr::Block(exprs) => exprs
            .iter()
            .map(|e| eval(e, slots))
            .last()
            .unwrap_or_else(|| Value::Error(ValueError::new(ErrorKind::Internal, "empty block"))),
        CompiledExpr::Macro(kind, args) => eval_macro(*kind, args, slots),
    }
}

fn eval_binary(op: BinaryOpKind, l: &Value, r: &Value) -> Value {
    match op {
        BinaryOpKind::Or => value::logical_or(l, r),
        BinaryOpKind::And => value::logical_and(l, r),
        BinaryOpKind::Eq => value::equal(l, r),
        BinaryOpKind::NotEq => value::not_equal(l, r),
        BinaryOpKind::Lt => value::less_than(l, r),
        BinaryOpKind::Le => value::less_equal(l, r),
        BinaryOpKind::Gt => value::greater_than(l, r),
        BinaryOpKind::Ge => value::greater_equal(l, r),
        BinaryOpKind::Concat => value::concat(l, r),
        BinaryOpKind::Add => value::add(l, r),
        BinaryOpKind::Sub => value::sub(l, r),
        BinaryOpKind::Mul => value::mul(l, r),
        BinaryOpKind::Div => value::div(l, r),
        BinaryOpKind::Rem => value::rem(l, r),
        BinaryOpKind::Pow => value::pow(l, r),
    }
}

/// `await` outside tail position is identity on its operand (spec §4.8,
/// §9 open question) — the planner only strips a *tail* `await`, so this
/// case evaluates whatever was already computed beneath it.
fn eval_unary(op: UnaryOpKind, operand: &Value) -> Value {
    match op {
        UnaryOpKind::Neg => value::negate(operand),
        UnaryOpKind::Not => value::logical_not(operand),
        UnaryOpKind::Await => operand.clone(),
    }
}

fn eval_invoke(callee: &Value, args: &[CompiledExpr], slots: &[Value]) -> Value {
    let func = match callee {
        Value::Function(f) => f,
        Value::Error(e) => return Value::Error(e.clone()),
        other => {
            return Value::Error(ValueError::new(
                ErrorKind::InvokeUnsupported,
                format!("cannot invoke {}", other.type_name()),
            ))
        }
    };

    let mut evaluated = Vec::with_capacity(args.len());
    for arg in args {
        let v = eval(arg, slots);
        if let Value::Error(e) = v {
            return Value::Error(e);
        }
        evaluated.push(v);
    }
    func(&evaluated)
}

fn eval_macro(kind: MacroKind, args: &[CompiledMacroArg], slots: &[Value]) -> Value {
    match kind {
        MacroKind::If => eval_if(args, slots),
        MacroKind::List => eval_list(args, slots),
        MacroKind::Object => eval_object(args, slots),
        MacroKind::Where => eval_where(args, slots),
    }
}

fn positional(args: &[CompiledMacroArg], i: usize) -> &CompiledExpr {
    match &args[i] {
        CompiledMacroArg::Positional(e) => e,
        CompiledMacroArg::Named(_, e) => e,
    }
}

fn eval_if(args: &[CompiledMacroArg], slots: &[Value]) -> Value {
    let cond = eval(positional(args, 0), slots);
    match cond.coerce_boolean() {
        Ok(true) => eval(positional(args, 1), slots),
        Ok(false) => eval(positional(args, 2), slots),
        Err(e) => Value::Error(e),
    }
}

fn eval_list(args: &[CompiledMacroArg], slots: &[Value]) -> Value {
    Value::List(args.iter().map(|a| eval(positional_of(a), slots)).collect())
}

fn positional_of(arg: &CompiledMacroArg) -> &CompiledExpr {
    match arg {
        CompiledMacroArg::Positional(e) => e,
        CompiledMacroArg::Named(_, e) => e,
    }
}

fn eval_object(args: &[CompiledMacroArg], slots: &[Value]) -> Value {
    let mut obj = formulate_core::ValueObject::new();
    for arg in args {
        let (name, expr) = match arg {
            CompiledMacroArg::Named(name, e) => (name, e),
            // The parser only ever produces named args for OBJECT; a
            // positional one here would be a lowering bug, not a user error.
            CompiledMacroArg::Positional(_) => {
                return Value::Error(ValueError::new(
                    ErrorKind::Internal,
                    "OBJECT requires named arguments",
                ))
            }
        };
        if obj.contains_key(name) {
            return Value::Error(ValueError::new(
                ErrorKind::DuplicateKey,
                format!("duplicate key '{name}' in OBJECT"),
            ));
        }
        let value = eval(expr, slots);
        obj.insert(name.clone(), value);
    }
    Value::Object(obj)
}

/// `WHERE(result = default, cond1, branch1, cond2, branch2, ..., default)`:
/// `args[0]` is always `Named("result", default)`; the rest come in
/// `(cond, branch)` positional pairs (spec §4.8).
fn eval_where(args: &[CompiledMacroArg], slots: &[Value]) -> Value {
    let default = match &args[0] {
        CompiledMacroArg::Named(_, e) => e,
        CompiledMacroArg::Positional(e) => e,
    };
    let pairs = &args[1..];
    let mut i = 0;
    while i + 1 < pairs.len() {
        let cond = eval(positional_of(&pairs[i]), slots);
        match cond.coerce_boolean() {
            Ok(true) => return eval(positional_of(&pairs[i + 1]), slots),
            Ok(false) => {}
            Err(e) => return Value::Error(e),
        }
        i += 2;
    }
    eval(default, slots)
}
