//! Formulate Runtime
//!
//! Turns a `formulate_compiler::CompiledProgram` into a callable
//! `Executable`: expression evaluation, group-barrier scheduling, and the
//! skip-list error isolation described in spec §4.7-§4.8.

pub mod evaluator;
pub mod executable;
pub mod nursery;

pub use executable::{Executable, RunResult};
