//! Symbol registry: name → storage slot resolution, scoped by module
//! (spec §4.4).
//!
//! Three program-level scopes (arguments, constants, modules), each a
//! unique-name lookup; per module, a scope mapping local names (imports +
//! formulas) to a `DeclId`. Identifiers inside a formula body only ever
//! resolve against their own module's local scope — an argument or constant
//! must be brought in with an `Import` before a formula can name it, which
//! is what gives every `Import`/`Formula` pair a single, stable `DeclId`.

use crate::compiler::ast::{ImportKind, Program};
use formulate_core::{DeclId, Span};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("duplicate name '{name}' in {scope}")]
    DuplicateName { name: String, scope: String },
}

fn norm(name: &str) -> String {
    name.to_ascii_lowercase()
}

/// What a declaration vertex actually is — needed by the dependency table
/// and the execution planner, not just its slot.
#[derive(Debug, Clone)]
pub enum DeclKind {
    Import { kind: ImportKind, path: Vec<String> },
    Formula { is_exported: bool, is_tail_await: bool },
}

#[derive(Debug, Clone)]
pub struct DeclInfo {
    pub id: DeclId,
    pub module_index: usize,
    pub local_name: String,
    pub kind: DeclKind,
    pub span: Span,
}

#[derive(Debug, Default)]
struct ModuleScope {
    /// local name (normalized) → DeclId, covering both imports and formulas.
    names: HashMap<String, DeclId>,
}

#[derive(Debug)]
pub struct SymbolRegistry {
    pub argument_names: Vec<String>,
    argument_index: HashMap<String, usize>,
    pub constant_names: Vec<String>,
    constant_index: HashMap<String, usize>,
    pub module_names: Vec<String>,
    module_index: HashMap<String, usize>,
    module_scopes: Vec<ModuleScope>,
    pub decls: Vec<DeclInfo>,
}

impl SymbolRegistry {
    pub fn argument_slot(&self, name: &str) -> Option<usize> {
        self.argument_index.get(&norm(name)).copied()
    }

    pub fn constant_slot(&self, name: &str) -> Option<usize> {
        self.constant_index.get(&norm(name)).copied()
    }

    pub fn module_slot(&self, name: &str) -> Option<usize> {
        self.module_index.get(&norm(name)).copied()
    }

    /// Resolves a bare identifier used inside a formula body of `module_index`
    /// against that module's local scope (imports + formulas only).
    pub fn resolve(&self, module_index: usize, name: &str) -> Option<DeclId> {
        self.module_scopes[module_index].names.get(&norm(name)).copied()
    }

    pub fn decl(&self, id: DeclId) -> &DeclInfo {
        &self.decls[id.index()]
    }

    /// All formula `DeclId`s in `module_index` flagged `is_exported`, in
    /// declaration order — used to wire `Module`-kind imports (spec §4.5).
    pub fn exported_formulas(&self, module_index: usize) -> Vec<DeclId> {
        self.decls
            .iter()
            .filter(|d| d.module_index == module_index)
            .filter(|d| matches!(d.kind, DeclKind::Formula { is_exported: true, .. }))
            .map(|d| d.id)
            .collect()
    }
}

/// Builds the symbol registry for `program`, assigning a `DeclId` to every
/// import and formula in declaration order (module by module, imports then
/// formulas within a module, matching source order).
pub fn resolve_program(program: &Program) -> Result<SymbolRegistry, ResolveError> {
    let mut argument_names = Vec::new();
    let mut argument_index = HashMap::new();
    for arg in &program.arguments {
        let key = norm(&arg.name);
        if argument_index.insert(key, argument_names.len()).is_some() {
            return Err(ResolveError::DuplicateName {
                name: arg.name.clone(),
                scope: "arguments".to_string(),
            });
        }
        argument_names.push(arg.name.clone());
    }

    let mut constant_names = Vec::new();
    let mut constant_index = HashMap::new();
    for c in &program.constants {
        let key = norm(&c.name);
        if constant_index.insert(key, constant_names.len()).is_some() {
            return Err(ResolveError::DuplicateName {
                name: c.name.clone(),
                scope: "constants".to_string(),
            });
        }
        constant_names.push(c.name.clone());
    }

    let mut module_names = Vec::new();
    let mut module_index = HashMap::new();
    for m in &program.modules {
        let key = norm(&m.name);
        if module_index.insert(key, module_names.len()).is_some() {
            return Err(ResolveError::DuplicateName {
                name: m.name.clone(),
                scope: "modules".to_string(),
            });
        }
        module_names.push(m.name.clone());
    }

    let mut module_scopes = Vec::with_capacity(program.modules.len());
    let mut decls = Vec::new();
    let mut next_id = 0u32;

    for (mi, module) in program.modules.iter().enumerate() {
        let mut scope = ModuleScope::default();
        for import in &module.imports {
            let key = norm(&import.local_name);
            if scope.names.contains_key(&key) {
                return Err(ResolveError::DuplicateName {
                    name: import.local_name.clone(),
                    scope: format!("module '{}'", module.name),
                });
            }
            let id = DeclId(next_id);
            next_id += 1;
            scope.names.insert(key, id);
            decls.push(DeclInfo {
                id,
                module_index: mi,
                local_name: import.local_name.clone(),
                kind: DeclKind::Import {
                    kind: import.kind,
                    path: import.path.clone(),
                },
                span: import.span,
            });
        }
        for formula in &module.formulas {
            let key = norm(&formula.name);
            if scope.names.contains_key(&key) {
                return Err(ResolveError::DuplicateName {
                    name: formula.name.clone(),
                    scope: format!("module '{}'", module.name),
                });
            }
            let id = DeclId(next_id);
            next_id += 1;
            scope.names.insert(key, id);
            decls.push(DeclInfo {
                id,
                module_index: mi,
                local_name: formula.name.clone(),
                kind: DeclKind::Formula {
                    is_exported: formula.is_exported,
                    is_tail_await: formula.body.is_tail_await(),
                },
                span: formula.span,
            });
        }
        module_scopes.push(scope);
    }

    Ok(SymbolRegistry {
        argument_names,
        argument_index,
        constant_names,
        constant_index,
        module_names,
        module_index,
        module_scopes,
        decls,
    })
}
