//! Sable Compiler Backend
//!
//! The backend lowers the typed AST in three steps and then prints the
//! result:
//!
//! ```text
//! ┌─────────────┐     ┌──────────────┐     ┌───────────────┐     ┌──────────┐
//! │  Typed AST  │────▶│    TAC IR    │────▶│   Machine IR  │────▶│ Assembly │
//! │             │lower│ (flat, addr) │isel │ (CFG, vregs)  │emit │  (text)  │
//! └─────────────┘     └──────────────┘     └───────┬───────┘     └──────────┘
//!                                                  │
//!                                            regalloc (graph
//!                                            coloring, spills)
//! ```
//!
//! # Modules
//!
//! - `tac`: three-address code definitions
//! - `lower`: typed AST to TAC translation (refcounting, builtins,
//!   constructor synthesis)
//! - `machine`: machine IR definitions (operands, opcodes, blocks)
//! - `isel`: TAC to machine IR instruction selection
//! - `regalloc`: graph-coloring register allocation
//! - `emit`: machine IR to assembly text

pub mod emit;
pub mod isel;
pub mod lower;
pub mod machine;
pub mod regalloc;
pub mod tac;

pub use emit::emit_program;
pub use isel::select_program;
pub use lower::lower_program;
pub use regalloc::RegAlloc;
