//! The TAC to machine IR translator.
//!
//! Conventions the later phases rely on:
//!
//! - Every function starts with the fixed prologue `PUSH rbp; MOV rbp,
//!   rsp`; the allocator inserts the frame adjustment right after it.
//! - Every block ends in explicit jumps (or a return), so block order
//!   carries no control flow and successors are recovered from the tail.
//! - Calls write `rax`; a call that pops stack arguments is immediately
//!   followed by its `ADD rsp, k`, which the caller-save pass reads to
//!   bias its save offsets.
//!
//! Arithmetic works on tagged integers (`2n+1`): addition corrects with
//! a subsequent decrement, subtraction with an increment, and
//! multiplication and division untag with arithmetic shifts and retag
//! the result.

use crate::backend::machine::{
    HwReg, MachineFunction, MachineInst, MachineProgram, Opcode, Operand,
};
use crate::backend::tac::{
    Addr, AddressData, AddressTable, BinOp, Instruction, Label, NameKind, RelOp, TacFunction,
    TacProgram,
};
use crate::common::abi;
use std::collections::HashMap;

/// Lower a whole TAC program.
pub fn select_program(tac: &TacProgram) -> MachineProgram {
    let mut machine = MachineProgram::new();

    machine
        .functions
        .push(select_function(&tac.addresses, &tac.main));
    for func in &tac.functions {
        machine.functions.push(select_function(&tac.addresses, func));
    }

    machine.globals = tac
        .globals
        .iter()
        .map(|&g| match tac.addresses.get(g) {
            AddressData::Name { mangled, .. } => mangled.clone(),
            other => panic!("global is not a name: {:?}", other),
        })
        .collect();
    machine.externs = tac.externs.clone();

    machine
}

/// Lower one TAC function.
pub fn select_function(table: &AddressTable, func: &TacFunction) -> MachineFunction {
    FunctionSelector::new(table, func).run()
}

struct FunctionSelector<'a> {
    table: &'a AddressTable,
    func: &'a TacFunction,
    mf: MachineFunction,
    /// One virtual register per temp and per local/param name
    regs: HashMap<Addr, Operand>,
    /// Machine block for each TAC label
    blocks: HashMap<Label, usize>,
    current: usize,
}

impl<'a> FunctionSelector<'a> {
    fn new(table: &'a AddressTable, func: &'a TacFunction) -> FunctionSelector<'a> {
        FunctionSelector {
            table,
            func,
            mf: MachineFunction::new(func.name.clone()),
            regs: HashMap::new(),
            blocks: HashMap::new(),
            current: 0,
        }
    }

    fn run(mut self) -> MachineFunction {
        self.current = self.mf.make_block();

        // Fixed prologue shape.
        self.emit(Opcode::Push, vec![], vec![Operand::hreg(HwReg::Rbp)]);
        self.emit(
            Opcode::MovRd,
            vec![Operand::hreg(HwReg::Rbp)],
            vec![Operand::hreg(HwReg::Rsp)],
        );

        // Bind parameters: the first six arrive in registers, the rest
        // on the stack above the saved frame pointer.
        for (i, &param) in self.func.params.iter().enumerate() {
            let dst = self.reg_for(param);
            if i < HwReg::ARG_REGS.len() {
                self.emit(
                    Opcode::MovRd,
                    vec![dst],
                    vec![Operand::hreg(HwReg::ARG_REGS[i])],
                );
            } else {
                let name = self.table.show(param);
                self.emit(
                    Opcode::MovRm,
                    vec![dst],
                    vec![Operand::StackParam {
                        name,
                        index: i - HwReg::ARG_REGS.len(),
                    }],
                );
            }
        }

        // One machine block per TAC label, in order of appearance.
        for inst in &self.func.instructions {
            if let Instruction::Label { label } = inst {
                let id = self.mf.make_block();
                self.blocks.insert(*label, id);
            }
        }

        for inst in &self.func.instructions {
            self.select(inst);
        }

        self.mf
    }

    fn select(&mut self, inst: &Instruction) {
        match inst {
            Instruction::Label { label } => {
                let target = self.blocks[label];
                if !self.block_is_closed() {
                    self.emit(Opcode::Jmp, vec![], vec![Operand::Block(target)]);
                }
                self.current = target;
            }

            Instruction::Jump { target } => {
                let target = self.blocks[target];
                self.emit(Opcode::Jmp, vec![], vec![Operand::Block(target)]);
            }

            Instruction::JumpIf { cond, target } => {
                let cond = self.in_register(*cond);
                self.emit(
                    Opcode::Cmp,
                    vec![],
                    vec![cond, Operand::Imm(abi::TRUE)],
                );
                let target = self.blocks[target];
                self.emit(Opcode::Je, vec![], vec![Operand::Block(target)]);
                self.fallthrough();
            }

            Instruction::JumpIfNot { cond, target } => {
                let cond = self.in_register(*cond);
                self.emit(
                    Opcode::Cmp,
                    vec![],
                    vec![cond, Operand::Imm(abi::TRUE)],
                );
                let target = self.blocks[target];
                self.emit(Opcode::Jne, vec![], vec![Operand::Block(target)]);
                self.fallthrough();
            }

            Instruction::CondJump {
                lhs,
                op,
                rhs,
                target,
            } => {
                let lhs = self.in_register(*lhs);
                let is_zero_test = matches!(op, RelOp::Eq | RelOp::Ne)
                    && self.table.is_const(*rhs) == Some(0);
                if is_zero_test {
                    self.emit(Opcode::Test, vec![], vec![lhs.clone(), lhs]);
                } else {
                    let rhs = self.alu_operand(*rhs);
                    self.emit(Opcode::Cmp, vec![], vec![lhs, rhs]);
                }
                let target = self.blocks[target];
                self.emit(jcc(*op), vec![], vec![Operand::Block(target)]);
                self.fallthrough();
            }

            Instruction::Assign { dst, src } => {
                let value = self.value(*src);
                self.store_into(*dst, value);
            }

            Instruction::BinOp { dst, lhs, op, rhs } => {
                self.select_binop(*dst, *lhs, *op, *rhs);
            }

            Instruction::Call {
                dst, target, args, ..
            } => {
                let args: Vec<Operand> = args.iter().map(|&a| self.value(a)).collect();
                self.emit_call(Operand::Sym(target.clone()), Opcode::CallI, args, *dst);
            }

            Instruction::IndirectCall { dst, addr, args } => {
                let args: Vec<Operand> = args.iter().map(|&a| self.value(a)).collect();
                let target = self.in_register(*addr);
                self.emit_call(target, Opcode::CallM, args, Some(*dst));
            }

            Instruction::IndexedStore { base, offset, src } => {
                let base = self.in_register(*base);
                let src = self.store_operand(*src);
                self.emit(
                    Opcode::MovMd,
                    vec![],
                    vec![base, src, Operand::Imm(*offset)],
                );
            }

            Instruction::IndexedLoad { dst, base, offset } => {
                let base = self.in_register(*base);
                if self.is_direct_reg(*dst) {
                    let dst = self.reg_for(*dst);
                    self.emit(
                        Opcode::MovRm,
                        vec![dst],
                        vec![base, Operand::Imm(*offset)],
                    );
                } else {
                    let temp = self.mf.make_vreg();
                    self.emit(
                        Opcode::MovRm,
                        vec![temp.clone()],
                        vec![base, Operand::Imm(*offset)],
                    );
                    self.store_into(*dst, temp);
                }
            }

            Instruction::Return { value } => {
                if let Some(value) = value {
                    let value = self.value(*value);
                    self.emit(
                        Opcode::MovRd,
                        vec![Operand::hreg(HwReg::Rax)],
                        vec![value],
                    );
                }
                self.emit(
                    Opcode::MovRd,
                    vec![Operand::hreg(HwReg::Rsp)],
                    vec![Operand::hreg(HwReg::Rbp)],
                );
                self.emit(Opcode::Pop, vec![Operand::hreg(HwReg::Rbp)], vec![]);
                let ret_inputs = if value.is_some() {
                    vec![Operand::hreg(HwReg::Rax)]
                } else {
                    vec![]
                };
                self.emit(Opcode::Ret, vec![], ret_inputs);
            }
        }
    }

    /// Tagged arithmetic on `2n+1` encodings.
    fn select_binop(&mut self, dst: Addr, lhs: Addr, op: BinOp, rhs: Addr) {
        assert!(
            self.is_direct_reg(dst),
            "arithmetic destination is not a register: {}",
            self.table.show(dst)
        );
        let d = self.reg_for(dst);

        match op {
            // 2a+1 + 2b+1 - 1 = 2(a+b)+1
            BinOp::Add => {
                let l = self.value(lhs);
                self.emit(Opcode::MovRd, vec![d.clone()], vec![l]);
                let r = self.alu_operand(rhs);
                self.emit(Opcode::Add, vec![d.clone()], vec![d.clone(), r]);
                self.emit(
                    Opcode::Sub,
                    vec![d.clone()],
                    vec![d, Operand::Imm(1)],
                );
            }

            // 2a+1 - (2b+1) + 1 = 2(a-b)+1
            BinOp::Sub => {
                let l = self.value(lhs);
                self.emit(Opcode::MovRd, vec![d.clone()], vec![l]);
                let r = self.alu_operand(rhs);
                self.emit(Opcode::Sub, vec![d.clone()], vec![d.clone(), r]);
                self.emit(Opcode::Inc, vec![d.clone()], vec![d]);
            }

            BinOp::Mul => {
                self.untag_into(d.clone(), lhs);
                let r = self.untagged_reg(rhs);
                self.emit(Opcode::Imul, vec![d.clone()], vec![d.clone(), r]);
                self.retag(d);
            }

            BinOp::Div => self.select_division(d, lhs, rhs, false),
            BinOp::Rem => self.select_division(d, lhs, rhs, true),
        }
    }

    /// x86 division discipline: dividend in rax, CQO sign-extends into
    /// rdx:rax, IDIV consumes both and writes quotient and remainder.
    fn select_division(&mut self, d: Operand, lhs: Addr, rhs: Addr, remainder: bool) {
        let rax = Operand::hreg(HwReg::Rax);
        let rdx = Operand::hreg(HwReg::Rdx);

        self.untag_into(rax.clone(), lhs);
        let divisor = self.untagged_reg(rhs);

        self.emit(Opcode::Cqo, vec![rdx.clone()], vec![rax.clone()]);
        self.emit(
            Opcode::Idiv,
            vec![rax.clone(), rdx.clone()],
            vec![divisor, rax.clone(), rdx.clone()],
        );

        let result = if remainder { rdx } else { rax };
        self.emit(Opcode::MovRd, vec![d.clone()], vec![result]);
        self.retag(d);
    }

    /// Move the untagged value of `addr` into `dst`.
    fn untag_into(&mut self, dst: Operand, addr: Addr) {
        if let Some(c) = self.table.is_const(addr) {
            self.emit(Opcode::MovRd, vec![dst], vec![Operand::Imm(c >> 1)]);
        } else {
            let value = self.value(addr);
            self.emit(Opcode::MovRd, vec![dst.clone()], vec![value]);
            self.emit(
                Opcode::Sar,
                vec![dst.clone()],
                vec![dst, Operand::Imm(1)],
            );
        }
    }

    /// The untagged value of `addr` in a fresh register.
    fn untagged_reg(&mut self, addr: Addr) -> Operand {
        let dst = self.mf.make_vreg();
        self.untag_into(dst.clone(), addr);
        dst
    }

    /// Retag an untagged value in place: `2n + 1`.
    fn retag(&mut self, reg: Operand) {
        self.emit(
            Opcode::Sal,
            vec![reg.clone()],
            vec![reg.clone(), Operand::Imm(1)],
        );
        self.emit(Opcode::Inc, vec![reg.clone()], vec![reg]);
    }

    /// Argument setup, the call itself, and cleanup.
    fn emit_call(
        &mut self,
        target: Operand,
        opcode: Opcode,
        args: Vec<Operand>,
        dst: Option<Addr>,
    ) {
        let nreg = args.len().min(HwReg::ARG_REGS.len());
        let nstack = args.len() - nreg;
        // Keep rsp 16-byte aligned across the call.
        let pad = nstack % 2 == 1;

        if pad {
            self.emit(
                Opcode::Add,
                vec![Operand::hreg(HwReg::Rsp)],
                vec![Operand::hreg(HwReg::Rsp), Operand::Imm(-8)],
            );
        }
        for arg in args[nreg..].iter().rev() {
            let arg = self.push_operand(arg.clone());
            self.emit(Opcode::Push, vec![], vec![arg]);
        }
        for (i, arg) in args.iter().take(nreg).enumerate() {
            self.emit(
                Opcode::MovRd,
                vec![Operand::hreg(HwReg::ARG_REGS[i])],
                vec![arg.clone()],
            );
        }

        let mut inputs = vec![target];
        for &reg in HwReg::ARG_REGS.iter().take(nreg) {
            inputs.push(Operand::hreg(reg));
        }
        self.emit(opcode, vec![Operand::hreg(HwReg::Rax)], inputs);

        let popped = nstack + pad as usize;
        if popped > 0 {
            self.emit(
                Opcode::Add,
                vec![Operand::hreg(HwReg::Rsp)],
                vec![
                    Operand::hreg(HwReg::Rsp),
                    Operand::Imm(8 * popped as i64),
                ],
            );
        }

        if let Some(dst) = dst {
            self.store_into(dst, Operand::hreg(HwReg::Rax));
        }
    }

    // ========================================================================
    // Operand plumbing
    // ========================================================================

    fn emit(&mut self, opcode: Opcode, outputs: Vec<Operand>, inputs: Vec<Operand>) {
        self.mf.blocks[self.current]
            .instructions
            .push(MachineInst::new(opcode, outputs, inputs));
    }

    /// Whether the current block already ends in a jump or a return.
    fn block_is_closed(&self) -> bool {
        match self.mf.blocks[self.current].instructions.last() {
            Some(inst) => inst.is_jump() || inst.opcode == Opcode::Ret,
            None => false,
        }
    }

    /// Close the current block with a jump to a fresh fallthrough block.
    fn fallthrough(&mut self) {
        let next = self.mf.make_block();
        self.emit(Opcode::Jmp, vec![], vec![Operand::Block(next)]);
        self.current = next;
    }

    /// Whether this address maps directly to a virtual register.
    fn is_direct_reg(&self, addr: Addr) -> bool {
        matches!(
            self.table.get(addr),
            AddressData::Temp(_)
                | AddressData::Name {
                    kind: NameKind::Local | NameKind::Param,
                    ..
                }
        )
    }

    /// The virtual register backing a temp or local/param name.
    fn reg_for(&mut self, addr: Addr) -> Operand {
        if let Some(reg) = self.regs.get(&addr) {
            return reg.clone();
        }
        let reg = self.mf.make_vreg();
        self.regs.insert(addr, reg.clone());
        reg
    }

    /// The value of an address as an operand. Globals and function
    /// addresses are loaded into fresh registers at each use.
    fn value(&mut self, addr: Addr) -> Operand {
        match self.table.get(addr) {
            AddressData::Const(v) => Operand::Imm(*v),
            AddressData::Temp(_) => self.reg_for(addr),
            AddressData::Name { kind, mangled } => match kind {
                NameKind::Local | NameKind::Param => self.reg_for(addr),
                NameKind::Global | NameKind::Static => {
                    let mangled = mangled.clone();
                    let dst = self.mf.make_vreg();
                    self.emit(Opcode::MovRm, vec![dst.clone()], vec![Operand::Sym(mangled)]);
                    dst
                }
                NameKind::Function => {
                    let mangled = mangled.clone();
                    let dst = self.mf.make_vreg();
                    self.emit(Opcode::MovRd, vec![dst.clone()], vec![Operand::Sym(mangled)]);
                    dst
                }
            },
        }
    }

    /// Like [`value`], but immediates are materialised.
    fn in_register(&mut self, addr: Addr) -> Operand {
        let value = self.value(addr);
        match value {
            Operand::Imm(_) => {
                let dst = self.mf.make_vreg();
                self.emit(Opcode::MovRd, vec![dst.clone()], vec![value]);
                dst
            }
            _ => value,
        }
    }

    /// A source operand for a two-operand ALU instruction: a register, or
    /// an immediate that fits the 32-bit encoding.
    fn alu_operand(&mut self, addr: Addr) -> Operand {
        let value = self.value(addr);
        self.narrow_imm(value)
    }

    fn push_operand(&mut self, value: Operand) -> Operand {
        self.narrow_imm(value)
    }

    fn store_operand(&mut self, addr: Addr) -> Operand {
        let value = self.value(addr);
        self.narrow_imm(value)
    }

    /// Materialise immediates that do not fit in 32 bits.
    fn narrow_imm(&mut self, value: Operand) -> Operand {
        match value {
            Operand::Imm(v) if i32::try_from(v).is_err() => {
                let dst = self.mf.make_vreg();
                self.emit(Opcode::MovRd, vec![dst.clone()], vec![Operand::Imm(v)]);
                dst
            }
            _ => value,
        }
    }

    /// Write a value to an address: a register move for temps and
    /// locals, a store for globals and statics.
    fn store_into(&mut self, dst: Addr, value: Operand) {
        match self.table.get(dst) {
            AddressData::Name {
                kind: NameKind::Global | NameKind::Static,
                mangled,
            } => {
                let mangled = mangled.clone();
                let value = self.narrow_imm(value);
                self.emit(Opcode::MovMd, vec![], vec![Operand::Sym(mangled), value]);
            }
            AddressData::Temp(_)
            | AddressData::Name {
                kind: NameKind::Local | NameKind::Param,
                ..
            } => {
                let dst = self.reg_for(dst);
                if dst != value {
                    self.emit(Opcode::MovRd, vec![dst], vec![value]);
                }
            }
            other => panic!("cannot assign to address: {:?}", other),
        }
    }
}

fn jcc(op: RelOp) -> Opcode {
    match op {
        RelOp::Eq => Opcode::Je,
        RelOp::Ne => Opcode::Jne,
        RelOp::Lt => Opcode::Jl,
        RelOp::Le => Opcode::Jle,
        RelOp::Gt => Opcode::Jg,
        RelOp::Ge => Opcode::Jge,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::tac::AddressTable;

    fn table_with(entries: Vec<AddressData>) -> (AddressTable, Vec<Addr>) {
        let mut table = AddressTable::new();
        let addrs = entries.into_iter().map(|e| table.add(e)).collect();
        (table, addrs)
    }

    fn count_opcode(func: &MachineFunction, opcode: Opcode) -> usize {
        func.blocks
            .iter()
            .flat_map(|b| &b.instructions)
            .filter(|i| i.opcode == opcode)
            .count()
    }

    #[test]
    fn test_prologue_shape() {
        let (table, _) = table_with(vec![]);
        let func = TacFunction::new("f".to_string());
        let mf = select_function(&table, &func);

        let entry = &mf.blocks[0].instructions;
        assert_eq!(entry[0].opcode, Opcode::Push);
        assert_eq!(entry[0].inputs, vec![Operand::hreg(HwReg::Rbp)]);
        assert_eq!(entry[1].opcode, Opcode::MovRd);
        assert_eq!(entry[1].outputs, vec![Operand::hreg(HwReg::Rbp)]);
        assert_eq!(entry[1].inputs, vec![Operand::hreg(HwReg::Rsp)]);
    }

    #[test]
    fn test_increment_uses_tagged_add() {
        // t0 := x + 1 (tagged constant 3), return t0
        let (table, addrs) = table_with(vec![
            AddressData::Name {
                kind: NameKind::Param,
                mangled: "x".to_string(),
            },
            AddressData::Temp(0),
            AddressData::Const(3),
        ]);
        let mut func = TacFunction::new("f".to_string());
        func.params.push(addrs[0]);
        func.instructions.push(Instruction::BinOp {
            dst: addrs[1],
            lhs: addrs[0],
            op: BinOp::Add,
            rhs: addrs[2],
        });
        func.instructions.push(Instruction::Return {
            value: Some(addrs[1]),
        });

        let mf = select_function(&table, &func);
        let insts = &mf.blocks[0].instructions;

        // Parameter copied out of rdi.
        assert!(insts.iter().any(|i| i.opcode == Opcode::MovRd
            && i.inputs == vec![Operand::hreg(HwReg::Rdi)]));
        // ADD with the tagged immediate, then the tag correction.
        let add = insts
            .iter()
            .position(|i| i.opcode == Opcode::Add)
            .expect("no ADD emitted");
        assert_eq!(insts[add].inputs[1], Operand::Imm(3));
        assert_eq!(insts[add + 1].opcode, Opcode::Sub);
        assert_eq!(insts[add + 1].inputs[1], Operand::Imm(1));
        // Epilogue restores the frame.
        assert_eq!(insts.last().unwrap().opcode, Opcode::Ret);
    }

    #[test]
    fn test_division_uses_rax_rdx_discipline() {
        let (table, addrs) = table_with(vec![
            AddressData::Temp(0),
            AddressData::Temp(1),
            AddressData::Temp(2),
        ]);
        let mut func = TacFunction::new("f".to_string());
        func.instructions.push(Instruction::BinOp {
            dst: addrs[2],
            lhs: addrs[0],
            op: BinOp::Div,
            rhs: addrs[1],
        });

        let mf = select_function(&table, &func);
        let insts = &mf.blocks[0].instructions;

        let cqo = insts
            .iter()
            .position(|i| i.opcode == Opcode::Cqo)
            .expect("no CQO emitted");
        assert_eq!(insts[cqo].outputs, vec![Operand::hreg(HwReg::Rdx)]);
        assert_eq!(insts[cqo].inputs, vec![Operand::hreg(HwReg::Rax)]);

        let idiv = &insts[cqo + 1];
        assert_eq!(idiv.opcode, Opcode::Idiv);
        // IDIV defines both halves of the dividend pair.
        assert!(idiv.outputs.contains(&Operand::hreg(HwReg::Rax)));
        assert!(idiv.outputs.contains(&Operand::hreg(HwReg::Rdx)));
        // Quotient is read from rax.
        assert_eq!(insts[cqo + 2].opcode, Opcode::MovRd);
        assert_eq!(insts[cqo + 2].inputs, vec![Operand::hreg(HwReg::Rax)]);
    }

    #[test]
    fn test_cond_jump_splits_block() {
        let (table, addrs) = table_with(vec![AddressData::Temp(0), AddressData::Const(0)]);
        let mut func = TacFunction::new("f".to_string());
        let label = Label(0);
        func.instructions.push(Instruction::CondJump {
            lhs: addrs[0],
            op: RelOp::Ne,
            rhs: addrs[1],
            target: label,
        });
        func.instructions.push(Instruction::Label { label });

        let mf = select_function(&table, &func);

        // The entry block ends with Jcc then Jmp; both successors are
        // recovered from the tail.
        let entry = &mf.blocks[0];
        let n = entry.instructions.len();
        assert_eq!(entry.instructions[n - 1].opcode, Opcode::Jmp);
        assert!(entry.instructions[n - 2].is_jump());
        assert_eq!(entry.successors().len(), 2);
        // Comparing against zero uses TEST.
        assert!(entry.instructions.iter().any(|i| i.opcode == Opcode::Test));
    }

    #[test]
    fn test_call_argument_placement() {
        let (table, addrs) = table_with(vec![
            AddressData::Temp(0),
            AddressData::Const(5),
            AddressData::Temp(1),
        ]);
        let mut func = TacFunction::new("f".to_string());
        func.instructions.push(Instruction::Call {
            foreign: true,
            dst: Some(addrs[2]),
            target: "print".to_string(),
            args: vec![addrs[1]],
        });

        let mf = select_function(&table, &func);
        let insts = &mf.blocks[0].instructions;

        let call = insts
            .iter()
            .position(|i| i.opcode == Opcode::CallI)
            .expect("no call emitted");
        // Argument goes into rdi right before the call.
        assert_eq!(insts[call - 1].opcode, Opcode::MovRd);
        assert_eq!(insts[call - 1].outputs, vec![Operand::hreg(HwReg::Rdi)]);
        assert_eq!(insts[call - 1].inputs, vec![Operand::Imm(5)]);
        // The call names its target and defines rax.
        assert_eq!(insts[call].inputs[0], Operand::Sym("print".to_string()));
        assert_eq!(insts[call].outputs, vec![Operand::hreg(HwReg::Rax)]);
        // Result copied out of rax.
        assert_eq!(insts[call + 1].opcode, Opcode::MovRd);
        assert_eq!(insts[call + 1].inputs, vec![Operand::hreg(HwReg::Rax)]);
    }

    #[test]
    fn test_stack_args_pushed_and_popped() {
        let mut table = AddressTable::new();
        let args: Vec<Addr> = (0..8)
            .map(|i| table.add(AddressData::Const(abi::tag_int(i))))
            .collect();
        let mut func = TacFunction::new("f".to_string());
        func.instructions.push(Instruction::Call {
            foreign: false,
            dst: None,
            target: "_Z1g".to_string(),
            args,
        });

        let mf = select_function(&table, &func);
        let insts = &mf.blocks[0].instructions;

        // Two arguments beyond the six register slots are pushed.
        assert_eq!(count_opcode(&mf, Opcode::Push), 3); // rbp + 2 args
        let call = insts.iter().position(|i| i.is_call()).unwrap();
        // The pop adjustment immediately follows the call, covering both
        // pushed arguments.
        let cleanup = &insts[call + 1];
        assert_eq!(cleanup.opcode, Opcode::Add);
        assert_eq!(cleanup.outputs, vec![Operand::hreg(HwReg::Rsp)]);
        assert_eq!(cleanup.inputs[1], Operand::Imm(16));
    }

    #[test]
    fn test_stack_parameter_read() {
        let mut table = AddressTable::new();
        let params: Vec<Addr> = (0..8)
            .map(|i| {
                table.add(AddressData::Name {
                    kind: NameKind::Param,
                    mangled: format!("p{}", i),
                })
            })
            .collect();
        let mut func = TacFunction::new("f".to_string());
        func.params = params;

        let mf = select_function(&table, &func);
        let insts = &mf.blocks[0].instructions;

        // The seventh and eighth parameters load from stack parameter
        // slots with indices 0 and 1.
        let stack_loads: Vec<_> = insts
            .iter()
            .filter(|i| i.opcode == Opcode::MovRm)
            .collect();
        assert_eq!(stack_loads.len(), 2);
        match &stack_loads[0].inputs[0] {
            Operand::StackParam { index, .. } => assert_eq!(*index, 0),
            other => panic!("expected stack parameter, got {}", other),
        }
        match &stack_loads[1].inputs[0] {
            Operand::StackParam { index, .. } => assert_eq!(*index, 1),
            other => panic!("expected stack parameter, got {}", other),
        }
    }
}
