//! Assembly emission.
//!
//! Purely mechanical serialisation of allocated machine IR to GNU as
//! text in Intel syntax. Instruction order is preserved exactly.

pub mod emitter;

pub use emitter::emit_program;
