//! `CompiledProgram` serialization to canonical JSON.

use crate::compiler::lir::CompiledProgram;

/// Emit a compiled program as pretty JSON, for debugging and tooling.
pub fn emit_json(program: &CompiledProgram) -> String {
    serde_json::to_string_pretty(program).unwrap_or_else(|e| {
        panic!("failed to serialize compiled program: {e}");
    })
}

/// Emit a compiled program as compact JSON, suitable for hashing or wire
/// transfer.
pub fn emit_canonical_json(program: &CompiledProgram) -> String {
    serde_json::to_string(program).unwrap_or_else(|e| {
        panic!("failed to serialize compiled program: {e}");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile_source;

    #[test]
    fn emitted_json_round_trips() {
        let plan = compile_source("module M { export a = 1; }", Default::default()).unwrap();
        let json = emit_json(&plan);
        let parsed: CompiledProgram = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.steps.len(), plan.steps.len());
    }

    #[test]
    fn emitted_json_contains_module_name() {
        let plan = compile_source("module M { export a = 1; }", Default::default()).unwrap();
        let json = emit_json(&plan);
        assert!(json.contains("\"M\""));
    }
}
