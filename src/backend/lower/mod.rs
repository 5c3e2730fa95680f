//! Typed AST to TAC lowering.
//!
//! One traversal walks the program and emits into a mutable current
//! function buffer. The buffer starts as the program's `main` (top-level
//! statements); user functions, then synthesized constructors and
//! destructors, are processed afterwards in order.
//!
//! # Modules
//!
//! - `context`: the builder state (current function, interned names,
//!   temp and label supplies)
//! - `expr`: expression lowering
//! - `stmt`: statement lowering
//! - `ctors`: constructor and destructor synthesis

pub mod context;
pub mod ctors;
pub mod expr;
pub mod stmt;

pub use context::TacBuilder;

use crate::backend::tac::TacProgram;
use crate::common::platform::Platform;
use crate::common::tast::TypedProgram;

/// Lower a typed program to TAC.
///
/// Cannot fail on a well-typed program; violations are frontend bugs and
/// panic with context.
pub fn lower_program(program: &TypedProgram, platform: &Platform) -> TacProgram {
    TacBuilder::new(program, platform.clone()).run()
}
