//! TAC program and function structures.

use crate::backend::tac::address::{Addr, AddressTable};
use crate::backend::tac::instr::Instruction;
use std::fmt::Write;

/// A callable body in TAC form.
#[derive(Clone, Debug)]
pub struct TacFunction {
    /// Mangled symbol name
    pub name: String,
    /// Parameter addresses, in declaration order
    pub params: Vec<Addr>,
    /// Local variable addresses
    pub locals: Vec<Addr>,
    pub instructions: Vec<Instruction>,
}

impl TacFunction {
    pub fn new(name: String) -> TacFunction {
        TacFunction {
            name,
            params: Vec::new(),
            locals: Vec::new(),
            instructions: Vec::new(),
        }
    }

    pub fn to_text(&self, table: &AddressTable) -> String {
        let mut out = String::new();
        let params = self
            .params
            .iter()
            .map(|p| table.show(*p))
            .collect::<Vec<_>>()
            .join(", ");
        writeln!(out, "function {}({}):", self.name, params).unwrap();
        for inst in &self.instructions {
            match inst {
                Instruction::Label { .. } => writeln!(out, "{}", inst.to_text(table)).unwrap(),
                _ => writeln!(out, "    {}", inst.to_text(table)).unwrap(),
            }
        }
        out
    }
}

/// The whole compilation unit in TAC form.
#[derive(Clone, Debug)]
pub struct TacProgram {
    pub addresses: AddressTable,
    pub main: TacFunction,
    /// All other functions: user-defined, then synthesized constructors
    /// and destructors
    pub functions: Vec<TacFunction>,
    /// Global variable addresses, in definition order
    pub globals: Vec<Addr>,
    /// External symbols referenced by generated code
    pub externs: Vec<String>,
}

impl TacProgram {
    pub fn new(main_name: String) -> TacProgram {
        TacProgram {
            addresses: AddressTable::new(),
            main: TacFunction::new(main_name),
            functions: Vec::new(),
            globals: Vec::new(),
            externs: Vec::new(),
        }
    }

    /// Render the whole program, a diagnostic aid.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for name in &self.externs {
            writeln!(out, "extern {}", name).unwrap();
        }
        for global in &self.globals {
            writeln!(out, "global {}", self.addresses.show(*global)).unwrap();
        }
        writeln!(out).unwrap();
        out.push_str(&self.main.to_text(&self.addresses));
        for func in &self.functions {
            writeln!(out).unwrap();
            out.push_str(&func.to_text(&self.addresses));
        }
        out
    }
}
