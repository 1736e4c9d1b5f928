//! The abstract interpreter
//!
//! [`execute_method`] simulates every control path through one method on a symbolic operand
//! stack, and returns a [`MethodTrace`]: one [`Step`] per executed instruction per path, wired to
//! the [`StackValue`]s it consumed and produced. That def-use graph - together with the
//! conservative exception-handler forks the walk takes - is what the deobfuscation passes
//! downstream work from.
//!
//! The walk is synchronous and single-threaded per method. Distinct methods share no mutable
//! state, so callers are free to analyze many methods in parallel as long as each worker owns its
//! method's trace.

mod frame;
mod interpreter;
mod settings;

pub use frame::{MethodTrace, StackValue, Step, StepId, StepKind, ValueId};
pub use interpreter::execute_method;
pub use settings::Settings;
