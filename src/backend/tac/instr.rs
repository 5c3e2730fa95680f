//! TAC instructions.

use crate::backend::tac::address::{Addr, AddressTable, Label};
use std::fmt;

/// Arithmetic operators carried by [`Instruction::BinOp`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Rem => "%",
        };
        write!(f, "{}", s)
    }
}

/// Relational operators carried by [`Instruction::CondJump`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RelOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl fmt::Display for RelOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RelOp::Eq => "==",
            RelOp::Ne => "!=",
            RelOp::Lt => "<",
            RelOp::Le => "<=",
            RelOp::Gt => ">",
            RelOp::Ge => ">=",
        };
        write!(f, "{}", s)
    }
}

/// One TAC operation.
#[derive(Clone, Debug)]
pub enum Instruction {
    /// `dst := src`
    Assign { dst: Addr, src: Addr },
    /// `dst := lhs op rhs`
    BinOp {
        dst: Addr,
        lhs: Addr,
        op: BinOp,
        rhs: Addr,
    },
    /// `if lhs op rhs goto target`
    CondJump {
        lhs: Addr,
        op: RelOp,
        rhs: Addr,
        target: Label,
    },
    /// `goto target`
    Jump { target: Label },
    /// `if cond goto target`
    JumpIf { cond: Addr, target: Label },
    /// `if not cond goto target`
    JumpIfNot { cond: Addr, target: Label },
    /// Jump target marker
    Label { label: Label },
    /// Direct call. `foreign` selects the C symbol spelling.
    Call {
        foreign: bool,
        dst: Option<Addr>,
        target: String,
        args: Vec<Addr>,
    },
    /// Call through a code address loaded from a closure
    IndirectCall {
        dst: Addr,
        addr: Addr,
        args: Vec<Addr>,
    },
    /// `base[offset] := src` (store into an object field)
    IndexedStore { base: Addr, offset: i64, src: Addr },
    /// `dst := base[offset]` (load from an object field)
    IndexedLoad { dst: Addr, base: Addr, offset: i64 },
    /// Return from the current function
    Return { value: Option<Addr> },
}

impl Instruction {
    /// Printable form, used by the TAC printers and fatal diagnostics.
    pub fn to_text(&self, table: &AddressTable) -> String {
        match self {
            Instruction::Assign { dst, src } => {
                format!("{} := {}", table.show(*dst), table.show(*src))
            }
            Instruction::BinOp { dst, lhs, op, rhs } => format!(
                "{} := {} {} {}",
                table.show(*dst),
                table.show(*lhs),
                op,
                table.show(*rhs)
            ),
            Instruction::CondJump {
                lhs,
                op,
                rhs,
                target,
            } => format!(
                "if {} {} {} goto {}",
                table.show(*lhs),
                op,
                table.show(*rhs),
                target
            ),
            Instruction::Jump { target } => format!("goto {}", target),
            Instruction::JumpIf { cond, target } => {
                format!("if {} goto {}", table.show(*cond), target)
            }
            Instruction::JumpIfNot { cond, target } => {
                format!("ifnot {} goto {}", table.show(*cond), target)
            }
            Instruction::Label { label } => format!("{}:", label),
            Instruction::Call {
                dst, target, args, ..
            } => {
                let args = args
                    .iter()
                    .map(|a| table.show(*a))
                    .collect::<Vec<_>>()
                    .join(", ");
                match dst {
                    Some(dst) => format!("{} := call {}({})", table.show(*dst), target, args),
                    None => format!("call {}({})", target, args),
                }
            }
            Instruction::IndirectCall { dst, addr, args } => {
                let args = args
                    .iter()
                    .map(|a| table.show(*a))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!(
                    "{} := call [{}]({})",
                    table.show(*dst),
                    table.show(*addr),
                    args
                )
            }
            Instruction::IndexedStore { base, offset, src } => format!(
                "{}[{}] := {}",
                table.show(*base),
                offset,
                table.show(*src)
            ),
            Instruction::IndexedLoad { dst, base, offset } => format!(
                "{} := {}[{}]",
                table.show(*dst),
                table.show(*base),
                offset
            ),
            Instruction::Return { value } => match value {
                Some(value) => format!("return {}", table.show(*value)),
                None => "return".to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::tac::address::AddressData;

    #[test]
    fn test_instruction_text() {
        let mut table = AddressTable::new();
        let t0 = table.add(AddressData::Temp(0));
        let c = table.add(AddressData::Const(3));

        let inst = Instruction::BinOp {
            dst: t0,
            lhs: t0,
            op: BinOp::Add,
            rhs: c,
        };
        assert_eq!(inst.to_text(&table), "%t0 := %t0 + 3");

        let jump = Instruction::CondJump {
            lhs: t0,
            op: RelOp::Ne,
            rhs: c,
            target: Label(4),
        };
        assert_eq!(jump.to_text(&table), "if %t0 != 3 goto L4");
    }
}
