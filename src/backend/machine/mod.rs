//! Machine IR
//!
//! A per-function control-flow graph of basic blocks holding opcode-level
//! instructions over a unified operand type. Instruction selection
//! produces it with unbounded virtual registers; the register allocator
//! rewrites it in place until only hardware registers, immediates and
//! `[rbp ± k]` / `[rsp ± k]` memory remain.

pub mod function;
pub mod instr;
pub mod operand;

pub use function::{MachineBB, MachineFunction, MachineProgram};
pub use instr::{MachineInst, Opcode};
pub use operand::{HwReg, Operand, Reg};
