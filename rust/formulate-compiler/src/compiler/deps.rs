//! Dependency table: the directed graph of formula/import declarations,
//! cycle detection, and the minimal partial order used by the execution
//! planner (spec §4.5).

use crate::compiler::ast::{ExprKind, Import, ImportKind, Module, Program};
use crate::compiler::resolve::SymbolRegistry;
use formulate_core::DeclId;
use std::collections::HashSet;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DependencyError {
    #[error("dependency cycle among: {}", .members.join(", "))]
    Cycle { members: Vec<String> },
}

pub struct DependencyTable {
    /// `forward[v]` = declarations that `v` depends on.
    forward: Vec<Vec<DeclId>>,
    /// `backward[v]` = declarations that depend on `v`.
    backward: Vec<Vec<DeclId>>,
}

impl DependencyTable {
    pub fn dependencies(&self, v: DeclId) -> &[DeclId] {
        &self.forward[v.index()]
    }

    pub fn dependents(&self, v: DeclId) -> &[DeclId] {
        &self.backward[v.index()]
    }

    /// A layering of the DAG into the fewest layers such that every edge
    /// goes from an earlier layer to a later one: repeatedly peel the set of
    /// remaining vertices with in-degree zero (spec §4.5). On a cycle,
    /// returns the vertices that could never be peeled.
    pub fn minimal_partial_order(&self) -> Result<Vec<Vec<DeclId>>, Vec<DeclId>> {
        let n = self.forward.len();
        let mut remaining = vec![true; n];
        let mut remaining_count = n;
        let mut layers = Vec::new();

        while remaining_count > 0 {
            let layer: Vec<DeclId> = (0..n)
                .filter(|&v| remaining[v])
                .filter(|&v| self.forward[v].iter().all(|d| !remaining[d.index()]))
                .map(|v| DeclId(v as u32))
                .collect();

            if layer.is_empty() {
                let left: Vec<DeclId> = (0..n)
                    .filter(|&v| remaining[v])
                    .map(|v| DeclId(v as u32))
                    .collect();
                return Err(left);
            }

            for v in &layer {
                remaining[v.index()] = false;
            }
            remaining_count -= layer.len();
            layers.push(layer);
        }

        Ok(layers)
    }
}

struct IdentCollector<'a> {
    registry: &'a SymbolRegistry,
    module_index: usize,
    deps: HashSet<DeclId>,
}

impl<'a> crate::compiler::ast::Visitor for IdentCollector<'a> {
    fn on_exit_expr(&mut self, e: &crate::compiler::ast::Expr) {
        if let ExprKind::Identifier(name) = &e.kind {
            if let Some(target) = self.registry.resolve(self.module_index, name) {
                self.deps.insert(target);
            }
        }
    }
}

/// Targets of an import's outgoing edge, per spec §4.5: a missing target
/// (unknown module/formula) is left dangling here rather than erroring — it
/// surfaces as `UnresolvedIdentifier` at runtime instead.
fn import_edges(import: &Import, registry: &SymbolRegistry) -> Vec<DeclId> {
    match import.kind {
        ImportKind::Argument | ImportKind::Constant => Vec::new(),
        ImportKind::Formula => {
            let (module_name, formula_name) = (&import.path[0], &import.path[1]);
            registry
                .module_slot(module_name)
                .and_then(|target_mi| registry.resolve(target_mi, formula_name))
                .into_iter()
                .collect()
        }
        ImportKind::Module => {
            let module_name = &import.path[0];
            registry
                .module_slot(module_name)
                .map(|target_mi| registry.exported_formulas(target_mi))
                .unwrap_or_default()
        }
    }
}

pub fn build(program: &Program, registry: &SymbolRegistry) -> DependencyTable {
    let n = registry.decls.len();
    let mut forward = vec![Vec::new(); n];

    for (mi, module) in program.modules.iter().enumerate() {
        build_module(mi, module, registry, &mut forward);
    }

    let mut backward = vec![Vec::new(); n];
    for (v, deps) in forward.iter().enumerate() {
        for d in deps {
            backward[d.index()].push(DeclId(v as u32));
        }
    }

    DependencyTable { forward, backward }
}

fn build_module(
    mi: usize,
    module: &Module,
    registry: &SymbolRegistry,
    forward: &mut [Vec<DeclId>],
) {
    for import in &module.imports {
        let Some(import_id) = registry.resolve(mi, &import.local_name) else {
            continue;
        };
        forward[import_id.index()] = import_edges(import, registry);
    }
    for formula in &module.formulas {
        let Some(formula_id) = registry.resolve(mi, &formula.name) else {
            continue;
        };
        let mut collector = IdentCollector {
            registry,
            module_index: mi,
            deps: HashSet::new(),
        };
        crate::compiler::ast::walk_expr(&formula.body, &mut collector);
        let mut deps: Vec<DeclId> = collector.deps.into_iter().collect();
        deps.sort_by_key(|d| d.0);
        forward[formula_id.index()] = deps;
    }
}

/// Runs cycle detection and, on success, returns the layering. On failure,
/// names the declarations left in the cycle by their local name.
pub fn check_and_layer(
    table: &DependencyTable,
    registry: &SymbolRegistry,
) -> Result<Vec<Vec<DeclId>>, DependencyError> {
    table.minimal_partial_order().map_err(|left| {
        let members = left
            .iter()
            .map(|id| registry.decl(*id).local_name.clone())
            .collect();
        DependencyError::Cycle { members }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::lexer::Lexer;
    use crate::compiler::parser::parse;
    use crate::compiler::resolve::resolve_program;

    fn build_src(src: &str) -> (DependencyTable, SymbolRegistry) {
        let tokens = Lexer::new(src).tokenize().unwrap();
        let program = parse(tokens).unwrap();
        let registry = resolve_program(&program).unwrap();
        let table = build(&program, &registry);
        (table, registry)
    }

    #[test]
    fn chained_formulas_form_three_layers() {
        let (table, registry) =
            build_src("module M { export a = 2; export b = a + 3; export c = b * a; }");
        let layers = check_and_layer(&table, &registry).unwrap();
        assert_eq!(layers.len(), 3);
    }

    #[test]
    fn independent_formulas_share_a_layer() {
        let (table, registry) = build_src("module M { export a = 1; export b = 2; }");
        let layers = check_and_layer(&table, &registry).unwrap();
        assert_eq!(layers.len(), 1);
        assert_eq!(layers[0].len(), 2);
    }

    #[test]
    fn direct_cycle_is_rejected() {
        let (table, registry) = build_src("module M { a = b; b = a; }");
        let result = check_and_layer(&table, &registry);
        assert!(result.is_err());
    }

    #[test]
    fn self_reference_is_a_cycle() {
        let (table, registry) = build_src("module M { a = a; }");
        assert!(check_and_layer(&table, &registry).is_err());
    }

    #[test]
    fn cross_module_formula_import_creates_edge() {
        let (table, registry) = build_src(
            "module M1 { export x = 7; } module M2 { import M1.x as x; export y = x + 1; }",
        );
        let y_id = registry.resolve(1, "y").unwrap();
        let x_import_id = registry.resolve(1, "x").unwrap();
        assert!(table.dependencies(y_id).contains(&x_import_id));
        let m1_x_id = registry.resolve(0, "x").unwrap();
        assert!(table.dependencies(x_import_id).contains(&m1_x_id));
    }

    #[test]
    fn module_import_depends_on_all_exports() {
        let (table, registry) = build_src(
            "module M1 { export x = 1; export y = 2; z = 3; } \
             module M2 { import M1 as m; export w = 1; }",
        );
        let import_id = registry.resolve(1, "m").unwrap();
        assert_eq!(table.dependencies(import_id).len(), 2);
    }
}
