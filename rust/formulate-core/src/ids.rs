//! Stable identity for declarations and the step ids assigned to them during
//! planning.
//!
//! `DeclId` is assigned once, in declaration order, when a program is
//! resolved, and never changes afterwards — the dependency table and symbol
//! registry both key on it. `StepId` is assigned later by the execution
//! planner and is guaranteed to respect dependency order
//! (`dependencies[i] < id` for every step); it is what the runtime driver
//! actually indexes into the skip list with.

use std::fmt;

/// Identifies a formula or import declaration for the lifetime of a compile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeclId(pub u32);

impl DeclId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for DeclId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "decl#{}", self.0)
    }
}

/// Identifies an execution step. Step ids are dense over `[0, N)` and are
/// assigned so that every dependency of a step has a strictly smaller id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct StepId(pub u32);

impl StepId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "step#{}", self.0)
    }
}
