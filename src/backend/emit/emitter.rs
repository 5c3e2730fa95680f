//! Machine IR to GNU as (Intel syntax) serialisation.
//!
//! Expects fully allocated input: every operand a hardware register, an
//! immediate, a symbol, a block label, or base+displacement memory.
//! Anything else is a fatal allocator bug, reported with the offending
//! instruction pretty-printed.

use crate::backend::machine::{MachineFunction, MachineInst, MachineProgram, Opcode, Operand};
use crate::common::platform::Platform;
use std::fmt::Write;

/// Serialise a whole program to assembly text.
pub fn emit_program(program: &MachineProgram, platform: &Platform) -> String {
    let mut out = String::new();

    writeln!(out, ".intel_syntax noprefix").unwrap();
    writeln!(out).unwrap();

    for name in &program.externs {
        writeln!(out, ".extern {}", name).unwrap();
    }
    if !program.externs.is_empty() {
        writeln!(out).unwrap();
    }

    for name in &program.globals {
        if platform.is_macho() {
            writeln!(out, ".comm {}, 8, 3", name).unwrap();
        } else {
            writeln!(out, ".comm {}, 8, 8", name).unwrap();
        }
    }
    if !program.globals.is_empty() {
        writeln!(out).unwrap();
    }

    writeln!(out, ".text").unwrap();
    for func in &program.functions {
        writeln!(out).unwrap();
        emit_function(&mut out, func, platform);
    }

    out
}

fn emit_function(out: &mut String, func: &MachineFunction, platform: &Platform) {
    writeln!(out, ".globl {}", func.name).unwrap();
    writeln!(out, "{}:", func.name).unwrap();

    for block in &func.blocks {
        writeln!(out, "{}:", platform.local_label(&func.name, block.id)).unwrap();
        for inst in &block.instructions {
            writeln!(out, "    {}", render(func, inst, platform)).unwrap();
        }
    }
}

fn render(func: &MachineFunction, inst: &MachineInst, platform: &Platform) -> String {
    match inst.opcode {
        Opcode::Add => two_operand("add", inst),
        Opcode::And => two_operand("and", inst),
        Opcode::Sub => two_operand("sub", inst),
        Opcode::Imul => two_operand("imul", inst),
        Opcode::Sal => two_operand("sal", inst),
        Opcode::Sar => two_operand("sar", inst),
        Opcode::Cmp => two_operand("cmp", inst),
        Opcode::Test => two_operand("test", inst),

        Opcode::Inc => format!("inc {}", reg(&inst.inputs[0], inst)),
        Opcode::Cqo => "cqo".to_string(),
        Opcode::Idiv => format!("idiv {}", reg(&inst.inputs[0], inst)),

        Opcode::MovRd => {
            let dst = reg(&inst.outputs[0], inst);
            match &inst.inputs[0] {
                Operand::Sym(name) => format!("mov {}, offset {}", dst, name),
                src => format!("mov {}, {}", dst, direct(src, inst)),
            }
        }

        Opcode::MovRm => {
            let dst = reg(&inst.outputs[0], inst);
            format!("mov {}, {}", dst, memory_of(&inst.inputs, inst))
        }

        Opcode::MovMd => {
            // Inputs are [base, src, disp] or [symbol, src].
            let src = direct(&inst.inputs[1], inst);
            let mut addressing = inst.inputs.clone();
            addressing.remove(1);
            let mem = memory_of(&addressing, inst);
            format!("mov {}, {}", mem, src)
        }

        Opcode::Push => format!("push {}", direct(&inst.inputs[0], inst)),
        Opcode::Pop => format!("pop {}", reg(&inst.outputs[0], inst)),
        Opcode::Ret => "ret".to_string(),

        Opcode::Jmp => format!("jmp {}", block_label(func, &inst.inputs[0], platform, inst)),
        Opcode::Je => format!("je {}", block_label(func, &inst.inputs[0], platform, inst)),
        Opcode::Jne => format!("jne {}", block_label(func, &inst.inputs[0], platform, inst)),
        Opcode::Jl => format!("jl {}", block_label(func, &inst.inputs[0], platform, inst)),
        Opcode::Jle => format!("jle {}", block_label(func, &inst.inputs[0], platform, inst)),
        Opcode::Jg => format!("jg {}", block_label(func, &inst.inputs[0], platform, inst)),
        Opcode::Jge => format!("jge {}", block_label(func, &inst.inputs[0], platform, inst)),

        Opcode::CallI => match &inst.inputs[0] {
            Operand::Sym(name) => format!("call {}", name),
            other => panic!("call target is not a symbol: {} in {}", other, inst),
        },
        Opcode::CallM => format!("call {}", reg(&inst.inputs[0], inst)),
    }
}

/// `op dst, src` where the destination is carried as the first input.
fn two_operand(mnemonic: &str, inst: &MachineInst) -> String {
    format!(
        "{} {}, {}",
        mnemonic,
        reg(&inst.inputs[0], inst),
        direct(&inst.inputs[1], inst)
    )
}

fn reg(operand: &Operand, inst: &MachineInst) -> String {
    match operand {
        Operand::Hreg(r) => format!("{}", r),
        other => panic!("expected a hardware register, got {} in {}", other, inst),
    }
}

fn direct(operand: &Operand, inst: &MachineInst) -> String {
    match operand {
        Operand::Hreg(r) => format!("{}", r),
        Operand::Imm(v) => format!("{}", v),
        other => panic!("expected a register or immediate, got {} in {}", other, inst),
    }
}

fn memory_of(addressing: &[Operand], inst: &MachineInst) -> String {
    match addressing {
        [Operand::Sym(name)] => format!("qword ptr [{}]", name),
        [Operand::Hreg(base), Operand::Imm(disp)] => {
            if *disp > 0 {
                format!("qword ptr [{} + {}]", base, disp)
            } else if *disp < 0 {
                format!("qword ptr [{} - {}]", base, -disp)
            } else {
                format!("qword ptr [{}]", base)
            }
        }
        _ => panic!("malformed memory operand in {}", inst),
    }
}

fn block_label(
    func: &MachineFunction,
    operand: &Operand,
    platform: &Platform,
    inst: &MachineInst,
) -> String {
    match operand {
        Operand::Block(id) => platform.local_label(&func.name, *id),
        other => panic!("jump target is not a block: {} in {}", other, inst),
    }
}
