//! Machine functions, basic blocks, and the lowered program.

use crate::backend::machine::instr::MachineInst;
use crate::backend::machine::operand::Operand;
use std::fmt::Write;

/// A basic block. Its id doubles as its index in the owning function's
/// block list, which is never reordered.
#[derive(Clone, Debug)]
pub struct MachineBB {
    pub id: usize,
    pub instructions: Vec<MachineInst>,
}

impl MachineBB {
    /// Successor blocks, recovered by scanning instructions from the tail
    /// while they are jumps. Every block ends with explicit jumps (or a
    /// return), so block order carries no control flow.
    pub fn successors(&self) -> Vec<usize> {
        let mut successors = Vec::new();
        for inst in self.instructions.iter().rev() {
            if !inst.is_jump() {
                break;
            }
            match &inst.inputs[0] {
                Operand::Block(id) => successors.push(*id),
                other => panic!("jump without a block target: {} in {}", other, inst),
            }
        }
        successors
    }
}

/// A lowered function. Owns its blocks and manufactures its virtual
/// registers and stack slots through per-function counters.
#[derive(Clone, Debug)]
pub struct MachineFunction {
    pub name: String,
    pub blocks: Vec<MachineBB>,
    next_vreg: u32,
}

impl MachineFunction {
    pub fn new(name: String) -> MachineFunction {
        MachineFunction {
            name,
            blocks: Vec::new(),
            next_vreg: 0,
        }
    }

    pub fn make_block(&mut self) -> usize {
        let id = self.blocks.len();
        self.blocks.push(MachineBB {
            id,
            instructions: Vec::new(),
        });
        id
    }

    /// A fresh virtual register operand.
    pub fn make_vreg(&mut self) -> Operand {
        let id = self.next_vreg;
        self.next_vreg += 1;
        Operand::Vreg(id)
    }

    pub fn vreg_count(&self) -> u32 {
        self.next_vreg
    }

    /// Render the function, a diagnostic aid.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        writeln!(out, "function {}:", self.name).unwrap();
        for block in &self.blocks {
            writeln!(out, ".{}:", block.id).unwrap();
            for inst in &block.instructions {
                writeln!(out, "    {}", inst).unwrap();
            }
        }
        out
    }
}

/// The lowered compilation unit handed to the emitter.
#[derive(Clone, Debug, Default)]
pub struct MachineProgram {
    pub functions: Vec<MachineFunction>,
    /// Mangled global variable names
    pub globals: Vec<String>,
    /// External symbols to declare
    pub externs: Vec<String>,
}

impl MachineProgram {
    pub fn new() -> MachineProgram {
        MachineProgram::default()
    }

    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for func in &self.functions {
            out.push_str(&func.to_text());
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::machine::instr::Opcode;
    use crate::backend::machine::operand::HwReg;

    #[test]
    fn test_successors_scan_from_tail() {
        let mut func = MachineFunction::new("f".to_string());
        let b0 = func.make_block();
        let b1 = func.make_block();
        let b2 = func.make_block();

        // b0 ends with a conditional jump to b2 and a fallthrough jump
        // to b1.
        let cond = func.make_vreg();
        func.blocks[b0].instructions.push(MachineInst::new(
            Opcode::Cmp,
            vec![],
            vec![cond, Operand::Imm(3)],
        ));
        func.blocks[b0].instructions.push(MachineInst::new(
            Opcode::Je,
            vec![],
            vec![Operand::Block(b2)],
        ));
        func.blocks[b0].instructions.push(MachineInst::new(
            Opcode::Jmp,
            vec![],
            vec![Operand::Block(b1)],
        ));

        let succs = func.blocks[b0].successors();
        assert_eq!(succs.len(), 2);
        assert!(succs.contains(&b1));
        assert!(succs.contains(&b2));
    }

    #[test]
    fn test_return_block_has_no_successors() {
        let mut func = MachineFunction::new("f".to_string());
        let b0 = func.make_block();
        func.blocks[b0].instructions.push(MachineInst::new(
            Opcode::Ret,
            vec![],
            vec![Operand::hreg(HwReg::Rax)],
        ));
        assert!(func.blocks[b0].successors().is_empty());
    }

    #[test]
    fn test_vreg_ids_are_dense() {
        let mut func = MachineFunction::new("f".to_string());
        assert_eq!(func.make_vreg(), Operand::Vreg(0));
        assert_eq!(func.make_vreg(), Operand::Vreg(1));
        assert_eq!(func.make_vreg(), Operand::Vreg(2));
        assert_eq!(func.vreg_count(), 3);
    }
}
