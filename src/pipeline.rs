//! Sable Backend Pipeline
//!
//! End-to-end driver from a type-annotated program to assembly text.
//!
//! # Pipeline Stages
//!
//! ```text
//! Typed AST (TypedProgram)
//!     │
//!     ▼ lower
//! TAC (TacProgram)
//!     │
//!     ▼ isel
//! Machine IR (MachineProgram, virtual registers)
//!     │
//!     ▼ regalloc
//! Machine IR (hardware registers, frame laid out)
//!     │
//!     ▼ emit
//! Assembly (String)
//! ```

use crate::backend::machine::MachineProgram;
use crate::backend::{emit_program, lower_program, select_program, RegAlloc};
use crate::common::platform::Platform;
use crate::common::tast::TypedProgram;

/// Result of a successful compilation.
#[derive(Debug, Clone)]
pub struct CompileOutput {
    /// The generated assembly text
    pub asm: String,
}

/// Compilation output with the intermediate representations rendered,
/// for debugging and tests.
#[derive(Debug, Clone)]
pub struct VerboseOutput {
    /// The TAC program
    pub tac: String,
    /// The machine program after register allocation
    pub machine: String,
    /// The generated assembly text
    pub asm: String,
}

/// Compile a typed program to assembly.
///
/// The backend cannot fail on a well-typed program; any panic below this
/// entry point is a compiler bug.
pub fn compile(program: &TypedProgram, platform: &Platform) -> CompileOutput {
    let tac = lower_program(program, platform);
    let mut machine = select_program(&tac);
    allocate(&mut machine);
    CompileOutput {
        asm: emit_program(&machine, platform),
    }
}

/// Compile, keeping the intermediate stages as text.
pub fn compile_verbose(program: &TypedProgram, platform: &Platform) -> VerboseOutput {
    let tac = lower_program(program, platform);
    let tac_text = tac.to_text();

    let mut machine = select_program(&tac);
    allocate(&mut machine);

    VerboseOutput {
        tac: tac_text,
        machine: machine.to_text(),
        asm: emit_program(&machine, platform),
    }
}

fn allocate(machine: &mut MachineProgram) {
    for func in &mut machine.functions {
        RegAlloc::run(func);
    }
}
