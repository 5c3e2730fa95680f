//! Statement lowering to TAC.

use crate::backend::lower::context::TacBuilder;
use crate::backend::lower::expr::lower_expr;
use crate::backend::tac::Instruction;
use crate::common::abi;
use crate::common::symbol::SymbolId;
use crate::common::tast::{Expr, Stmt};

pub fn lower_stmt(b: &mut TacBuilder, stmt: &Stmt) {
    match stmt {
        Stmt::Expr(expr) => {
            lower_expr(b, expr);
        }

        Stmt::Block(stmts) => {
            for s in stmts {
                lower_stmt(b, s);
            }
        }

        Stmt::If { cond, body } => {
            let cond = lower_expr(b, cond);
            let end = b.label();

            b.emit(Instruction::JumpIfNot { cond, target: end });
            for s in body {
                lower_stmt(b, s);
            }
            b.emit_label(end);
        }

        Stmt::IfElse {
            cond,
            body,
            else_body,
        } => {
            let cond = lower_expr(b, cond);
            let else_label = b.label();
            let end = b.label();

            b.emit(Instruction::JumpIfNot {
                cond,
                target: else_label,
            });
            for s in body {
                lower_stmt(b, s);
            }
            b.emit(Instruction::Jump { target: end });
            b.emit_label(else_label);
            for s in else_body {
                lower_stmt(b, s);
            }
            b.emit_label(end);
        }

        Stmt::While { cond, body } => {
            let begin = b.label();
            let end = b.label();

            b.emit_label(begin);
            let cond = lower_expr(b, cond);
            b.emit(Instruction::JumpIfNot { cond, target: end });

            b.loop_ends.push(end);
            for s in body {
                lower_stmt(b, s);
            }
            b.loop_ends.pop();

            b.emit(Instruction::Jump { target: begin });
            b.emit_label(end);
        }

        Stmt::Break => {
            let end = *b.loop_ends.last().expect("break outside of a loop");
            b.emit(Instruction::Jump { target: end });
        }

        Stmt::Assign { symbol, value } | Stmt::Let { symbol, value } => {
            lower_assignment(b, *symbol, value);
        }

        Stmt::Match {
            constructor,
            bindings,
            value,
        } => {
            lower_match(b, *constructor, bindings, value);
        }

        Stmt::Return(expr) => {
            let value = lower_expr(b, expr);
            b.emit(Instruction::Return { value: Some(value) });
        }
    }
}

/// `dst := value`, with refcount maintenance for boxed slots.
///
/// The incref must come before the decref: if `dst` currently holds the
/// only reference to the value, the reverse order frees it first.
fn lower_assignment(b: &mut TacBuilder, symbol: SymbolId, value: &Expr) {
    let value = lower_expr(b, value);
    let dst = b.name_addr(symbol);

    if b.symbol(symbol).ty.is_boxed() {
        b.incref(value);
        b.decref(dst);
    }

    b.emit(Instruction::Assign { dst, src: value });
}

/// Single-constructor destructuring: release the bindings' old contents,
/// copy each member out of the scrutinee, then retain the new contents.
fn lower_match(b: &mut TacBuilder, constructor: SymbolId, bindings: &[SymbolId], value: &Expr) {
    let body = lower_expr(b, value);

    for &binding in bindings {
        if b.symbol(binding).ty.is_boxed() {
            let addr = b.name_addr(binding);
            b.decref(addr);
        }
    }

    let ctor = b
        .program
        .constructor(constructor)
        .unwrap_or_else(|| panic!("unknown constructor in match: {}", constructor));
    let locations: Vec<usize> = ctor.members.iter().map(|m| m.location).collect();

    for (i, &binding) in bindings.iter().enumerate() {
        let dst = b.name_addr(binding);
        b.emit(Instruction::IndexedLoad {
            dst,
            base: body,
            offset: abi::HEADER_SIZE + abi::WORD_SIZE * locations[i] as i64,
        });
    }

    for &binding in bindings {
        if b.symbol(binding).ty.is_boxed() {
            let addr = b.name_addr(binding);
            b.incref(addr);
        }
    }
}
