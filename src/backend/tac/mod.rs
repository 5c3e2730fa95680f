//! Three-Address Code (TAC)
//!
//! TAC is a flat, linear IR for the whole program: a main function plus
//! all other functions (user-defined, plus synthesized constructors and
//! destructors). Instructions refer to addresses: interned names, temps,
//! constants. Control flow is expressed with labels and jumps; basic
//! blocks are only discovered later, during instruction selection.

pub mod address;
pub mod instr;
pub mod program;

pub use address::{Addr, AddressData, AddressTable, Label, NameKind};
pub use instr::{BinOp, Instruction, RelOp};
pub use program::{TacFunction, TacProgram};
