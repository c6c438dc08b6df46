//! Formulate Core
//!
//! Shared types used across the compiler and the runtime: source spans,
//! stable declaration/step identity, and the value model.

pub mod ids;
pub mod span;
pub mod value;

pub use ids::{DeclId, StepId};
pub use span::Span;
pub use value::{ErrorKind, Value, ValueError, ValueObject};
