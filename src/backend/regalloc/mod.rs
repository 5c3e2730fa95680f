//! Graph-coloring register allocation.
//!
//! Runs once per machine function, in phases:
//!
//! 1. liveness as a fixed-point data-flow computation
//! 2. interference construction at instruction granularity
//! 3. Chaitin-style simplify/select coloring with iterative spill
//! 4. virtual register substitution
//! 5. stack-slot materialisation
//! 6. caller-save spilling around every call site
//! 7. prologue completion (frame allocation)

pub mod allocator;
pub mod liveness;

pub use allocator::{RegAlloc, AVAILABLE_COLORS};
pub use liveness::{analyze, InterferenceGraph, Liveness, RegSet};
