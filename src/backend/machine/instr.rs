//! Machine instructions.
//!
//! Opcode suffix convention, kept from the operand shapes the emitter
//! accepts:
//! - `m`: indirect memory location
//! - `r`: register
//! - `d`: register or immediate ("direct")

use crate::backend::machine::operand::Operand;
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Opcode {
    Add,
    And,
    /// Call a named address
    CallI,
    /// Call through a register
    CallM,
    Cmp,
    /// Sign-extend rax into rdx:rax
    Cqo,
    Idiv,
    Imul,
    Inc,
    Je,
    Jg,
    Jge,
    Jl,
    Jle,
    Jmp,
    Jne,
    /// Move register or immediate into register
    MovRd,
    /// Load register from memory
    MovRm,
    /// Store register or immediate into memory
    MovMd,
    Pop,
    Push,
    Ret,
    Sal,
    Sar,
    Sub,
    Test,
}

impl Opcode {
    pub fn is_jump(self) -> bool {
        matches!(
            self,
            Opcode::Je
                | Opcode::Jg
                | Opcode::Jge
                | Opcode::Jl
                | Opcode::Jle
                | Opcode::Jmp
                | Opcode::Jne
        )
    }

    pub fn is_call(self) -> bool {
        matches!(self, Opcode::CallI | Opcode::CallM)
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Opcode::Add => "ADD",
            Opcode::And => "AND",
            Opcode::CallI => "CALLi",
            Opcode::CallM => "CALLm",
            Opcode::Cmp => "CMP",
            Opcode::Cqo => "CQO",
            Opcode::Idiv => "IDIV",
            Opcode::Imul => "IMUL",
            Opcode::Inc => "INC",
            Opcode::Je => "JE",
            Opcode::Jg => "JG",
            Opcode::Jge => "JGE",
            Opcode::Jl => "JL",
            Opcode::Jle => "JLE",
            Opcode::Jmp => "JMP",
            Opcode::Jne => "JNE",
            Opcode::MovRd => "MOVrd",
            Opcode::MovRm => "MOVrm",
            Opcode::MovMd => "MOVmd",
            Opcode::Pop => "POP",
            Opcode::Push => "PUSH",
            Opcode::Ret => "RET",
            Opcode::Sal => "SAL",
            Opcode::Sar => "SAR",
            Opcode::Sub => "SUB",
            Opcode::Test => "TEST",
        };
        write!(f, "{}", name)
    }
}

/// One machine operation. `outputs` are the registers written; `inputs`
/// everything read, including memory operand components.
#[derive(Clone, Debug)]
pub struct MachineInst {
    pub opcode: Opcode,
    pub outputs: Vec<Operand>,
    pub inputs: Vec<Operand>,
}

impl MachineInst {
    pub fn new(opcode: Opcode, outputs: Vec<Operand>, inputs: Vec<Operand>) -> MachineInst {
        MachineInst {
            opcode,
            outputs,
            inputs,
        }
    }

    pub fn is_jump(&self) -> bool {
        self.opcode.is_jump()
    }

    pub fn is_call(&self) -> bool {
        self.opcode.is_call()
    }
}

fn write_operands(f: &mut fmt::Formatter<'_>, operands: &[Operand]) -> fmt::Result {
    if operands.is_empty() {
        return write!(f, "{{}}");
    }
    write!(f, "{}", operands[0])?;
    for operand in &operands[1..] {
        write!(f, ", {}", operand)?;
    }
    Ok(())
}

impl fmt::Display for MachineInst {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_operands(f, &self.outputs)?;
        write!(f, " = {} ", self.opcode)?;
        write_operands(f, &self.inputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::machine::operand::HwReg;

    #[test]
    fn test_jump_classification() {
        assert!(Opcode::Jmp.is_jump());
        assert!(Opcode::Jne.is_jump());
        assert!(!Opcode::Ret.is_jump());
        assert!(!Opcode::CallI.is_jump());
        assert!(Opcode::CallM.is_call());
    }

    #[test]
    fn test_display() {
        let inst = MachineInst::new(
            Opcode::Add,
            vec![Operand::vreg(1)],
            vec![Operand::vreg(1), Operand::Imm(3)],
        );
        assert_eq!(format!("{}", inst), "%vreg1 = ADD %vreg1, 3");

        let push = MachineInst::new(Opcode::Push, vec![], vec![Operand::hreg(HwReg::Rbp)]);
        assert_eq!(format!("{}", push), "{} = PUSH %rbp");
    }
}
