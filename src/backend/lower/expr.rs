//! Expression lowering to TAC.
//!
//! Every expression is assigned an address holding its tagged value.
//! Comparisons and short-circuit logicals lower to a conditional-jump
//! skeleton that materialises the boolean immediates; builtins are
//! expanded inline rather than called.

use crate::backend::lower::context::TacBuilder;
use crate::backend::tac::{Addr, BinOp, Instruction, RelOp};
use crate::common::abi;
use crate::common::symbol::SymbolId;
use crate::common::tast::{CompareOp, Expr, LogicalOp};
use crate::common::types::Type;

/// Lower an expression, returning the address of its value.
pub fn lower_expr(b: &mut TacBuilder, expr: &Expr) -> Addr {
    match expr {
        Expr::Int(n) => b.const_addr(abi::tag_int(*n)),

        Expr::Bool(v) => b.const_addr(if *v { abi::TRUE } else { abi::FALSE }),

        Expr::Variable(symbol) => b.name_addr(*symbol),

        Expr::Reference { symbol, ty } => lower_reference(b, *symbol, ty),

        Expr::Call { symbol, args } => lower_call(b, *symbol, args),

        Expr::Compare { op, lhs, rhs } => lower_comparison(b, *op, lhs, rhs),

        Expr::Logical { op, lhs, rhs } => lower_logical(b, *op, lhs, rhs),

        Expr::Member { object, location } => {
            let base = b.name_addr(*object);
            let dst = b.temp();
            b.emit(Instruction::IndexedLoad {
                dst,
                base,
                offset: abi::HEADER_SIZE + abi::WORD_SIZE * *location as i64,
            });
            dst
        }
    }
}

fn rel_op(op: CompareOp) -> RelOp {
    match op {
        CompareOp::Eq => RelOp::Eq,
        CompareOp::Ne => RelOp::Ne,
        CompareOp::Lt => RelOp::Lt,
        CompareOp::Le => RelOp::Le,
        CompareOp::Gt => RelOp::Gt,
        CompareOp::Ge => RelOp::Ge,
    }
}

/// Comparison skeleton: jump on the condition, materialise False on the
/// fallthrough path and True at the jump target. Tagged integers preserve
/// the ordering of the integers they encode, so operands compare directly.
fn lower_comparison(b: &mut TacBuilder, op: CompareOp, lhs: &Expr, rhs: &Expr) -> Addr {
    let lhs = lower_expr(b, lhs);
    let rhs = lower_expr(b, rhs);

    let true_branch = b.label();
    let end = b.label();

    b.emit(Instruction::CondJump {
        lhs,
        op: rel_op(op),
        rhs,
        target: true_branch,
    });

    let result = b.temp();
    let false_ = b.const_addr(abi::FALSE);
    let true_ = b.const_addr(abi::TRUE);
    b.emit(Instruction::Assign {
        dst: result,
        src: false_,
    });
    b.emit(Instruction::Jump { target: end });
    b.emit_label(true_branch);
    b.emit(Instruction::Assign {
        dst: result,
        src: true_,
    });
    b.emit_label(end);

    result
}

/// Short-circuit `and` / `or`: pre-assign the result to the absorbing
/// value, bail out as soon as an operand decides, overwrite at the end.
fn lower_logical(b: &mut TacBuilder, op: LogicalOp, lhs: &Expr, rhs: &Expr) -> Addr {
    let result = b.temp();
    let end = b.label();

    match op {
        LogicalOp::And => {
            let false_ = b.const_addr(abi::FALSE);
            b.emit(Instruction::Assign {
                dst: result,
                src: false_,
            });
            let lhs = lower_expr(b, lhs);
            b.emit(Instruction::JumpIfNot {
                cond: lhs,
                target: end,
            });
            let rhs = lower_expr(b, rhs);
            b.emit(Instruction::JumpIfNot {
                cond: rhs,
                target: end,
            });
            let true_ = b.const_addr(abi::TRUE);
            b.emit(Instruction::Assign {
                dst: result,
                src: true_,
            });
            b.emit_label(end);
        }
        LogicalOp::Or => {
            let true_ = b.const_addr(abi::TRUE);
            b.emit(Instruction::Assign {
                dst: result,
                src: true_,
            });
            let lhs = lower_expr(b, lhs);
            b.emit(Instruction::JumpIf {
                cond: lhs,
                target: end,
            });
            let rhs = lower_expr(b, rhs);
            b.emit(Instruction::JumpIf {
                cond: rhs,
                target: end,
            });
            let false_ = b.const_addr(abi::FALSE);
            b.emit(Instruction::Assign {
                dst: result,
                src: false_,
            });
            b.emit_label(end);
        }
    }

    result
}

/// A bare reference. Variables evaluate to their slot. A reference to a
/// function that still has a function type builds a closure; a reference
/// whose type is fully applied is a nullary call.
fn lower_reference(b: &mut TacBuilder, symbol: SymbolId, ty: &Type) -> Addr {
    if b.symbol(symbol).is_variable() {
        return b.name_addr(symbol);
    }

    let dst = b.temp();

    if !ty.is_function() {
        let (foreign, target) = b.call_target(symbol);
        b.emit(Instruction::Call {
            foreign,
            dst: Some(dst),
            target,
            args: vec![],
        });
        return dst;
    }

    // Build a two-word closure: header plus the code address.
    let size = b.const_addr(abi::HEADER_SIZE + abi::WORD_SIZE);
    let malloc = b.platform.foreign(abi::MALLOC);
    b.emit(Instruction::Call {
        foreign: true,
        dst: Some(dst),
        target: malloc,
        args: vec![size],
    });

    let zero = b.const_addr(0);
    b.emit(Instruction::IndexedStore {
        base: dst,
        offset: abi::REF_COUNT_OFFSET,
        src: zero,
    });
    let destroy = b.platform.foreign(abi::DESTROY_CLOSURE);
    let destructor = b.function_addr(destroy);
    b.emit(Instruction::IndexedStore {
        base: dst,
        offset: abi::DESTRUCTOR_OFFSET,
        src: destructor,
    });
    b.emit(Instruction::IndexedStore {
        base: dst,
        offset: abi::POINTER_FIELDS_OFFSET,
        src: zero,
    });
    b.emit(Instruction::IndexedStore {
        base: dst,
        offset: abi::MARK_BIT_OFFSET,
        src: zero,
    });

    let code = b.name_addr(symbol);
    b.emit(Instruction::IndexedStore {
        base: dst,
        offset: abi::HEADER_SIZE,
        src: code,
    });

    dst
}

fn lower_call(b: &mut TacBuilder, symbol: SymbolId, args: &[Expr]) -> Addr {
    let args: Vec<Addr> = args.iter().map(|a| lower_expr(b, a)).collect();

    let sym = b.symbol(symbol);
    if sym.is_builtin() {
        let name = sym.name.clone();
        return lower_builtin(b, &name, &args);
    }

    let dst = b.temp();

    if sym.is_function() {
        let (foreign, target) = b.call_target(symbol);
        b.emit(Instruction::Call {
            foreign,
            dst: Some(dst),
            target,
            args,
        });
    } else {
        // The variable holds a closure; call through its code address.
        let base = b.name_addr(symbol);
        let code = b.temp();
        b.emit(Instruction::IndexedLoad {
            dst: code,
            base,
            offset: abi::HEADER_SIZE,
        });
        b.emit(Instruction::IndirectCall {
            dst,
            addr: code,
            args,
        });
    }

    dst
}

/// Inline expansion of the builtin functions.
fn lower_builtin(b: &mut TacBuilder, name: &str, args: &[Addr]) -> Addr {
    let result = b.temp();

    match name {
        "not" => {
            assert_eq!(args.len(), 1);
            let true_branch = b.label();
            let end = b.label();
            let true_ = b.const_addr(abi::TRUE);
            let false_ = b.const_addr(abi::FALSE);

            b.emit(Instruction::JumpIf {
                cond: args[0],
                target: true_branch,
            });
            b.emit(Instruction::Assign {
                dst: result,
                src: true_,
            });
            b.emit(Instruction::Jump { target: end });
            b.emit_label(true_branch);
            b.emit(Instruction::Assign {
                dst: result,
                src: false_,
            });
            b.emit_label(end);
        }

        "head" => {
            assert_eq!(args.len(), 1);
            emit_nil_guard(b, args[0]);
            b.emit(Instruction::IndexedLoad {
                dst: result,
                base: args[0],
                offset: abi::HEADER_SIZE,
            });
        }

        "tail" => {
            assert_eq!(args.len(), 1);
            emit_nil_guard(b, args[0]);
            b.emit(Instruction::IndexedLoad {
                dst: result,
                base: args[0],
                offset: abi::HEADER_SIZE + abi::WORD_SIZE,
            });
        }

        "Nil" => {
            assert_eq!(args.len(), 0);
            let nil = b.const_addr(abi::NIL);
            b.emit(Instruction::Assign {
                dst: result,
                src: nil,
            });
        }

        "null" => {
            assert_eq!(args.len(), 1);
            let true_branch = b.label();
            let end = b.label();
            let zero = b.const_addr(0);
            let true_ = b.const_addr(abi::TRUE);
            let false_ = b.const_addr(abi::FALSE);

            b.emit(Instruction::CondJump {
                lhs: args[0],
                op: RelOp::Eq,
                rhs: zero,
                target: true_branch,
            });
            b.emit(Instruction::Assign {
                dst: result,
                src: false_,
            });
            b.emit(Instruction::Jump { target: end });
            b.emit_label(true_branch);
            b.emit(Instruction::Assign {
                dst: result,
                src: true_,
            });
            b.emit_label(end);
        }

        "+" | "-" | "*" | "/" | "%" => {
            assert_eq!(args.len(), 2);
            let op = match name {
                "+" => BinOp::Add,
                "-" => BinOp::Sub,
                "*" => BinOp::Mul,
                "/" => BinOp::Div,
                _ => BinOp::Rem,
            };
            b.emit(Instruction::BinOp {
                dst: result,
                lhs: args[0],
                op,
                rhs: args[1],
            });
        }

        other => panic!("unknown builtin: {}", other),
    }

    result
}

/// `head`/`tail` die on the empty list.
fn emit_nil_guard(b: &mut TacBuilder, list: Addr) {
    let good = b.label();
    let zero = b.const_addr(0);
    b.emit(Instruction::CondJump {
        lhs: list,
        op: RelOp::Ne,
        rhs: zero,
        target: good,
    });
    let die = b.platform.foreign(abi::DIE);
    b.emit(Instruction::Call {
        foreign: true,
        dst: None,
        target: die,
        args: vec![zero],
    });
    b.emit_label(good);
}
