//! Machine operands and registers.

use std::fmt;

/// The sixteen x86-64 general purpose registers.
///
/// Variant order is the colour table of the register allocator: a
/// register's colour index is its position here.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HwReg {
    Rax,
    Rbx,
    Rcx,
    Rdx,
    Rsi,
    Rdi,
    Rbp,
    Rsp,
    R8,
    R9,
    R10,
    R11,
    R12,
    R13,
    R14,
    R15,
}

impl HwReg {
    /// All sixteen registers in colour order.
    pub const TABLE: [HwReg; 16] = [
        HwReg::Rax,
        HwReg::Rbx,
        HwReg::Rcx,
        HwReg::Rdx,
        HwReg::Rsi,
        HwReg::Rdi,
        HwReg::Rbp,
        HwReg::Rsp,
        HwReg::R8,
        HwReg::R9,
        HwReg::R10,
        HwReg::R11,
        HwReg::R12,
        HwReg::R13,
        HwReg::R14,
        HwReg::R15,
    ];

    /// Integer argument registers in System V AMD64 order.
    pub const ARG_REGS: [HwReg; 6] = [
        HwReg::Rdi,
        HwReg::Rsi,
        HwReg::Rdx,
        HwReg::Rcx,
        HwReg::R8,
        HwReg::R9,
    ];

    /// The colour index of this register. Declaration order is colour
    /// order, so the discriminant is the index.
    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for HwReg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HwReg::Rax => "rax",
            HwReg::Rbx => "rbx",
            HwReg::Rcx => "rcx",
            HwReg::Rdx => "rdx",
            HwReg::Rsi => "rsi",
            HwReg::Rdi => "rdi",
            HwReg::Rbp => "rbp",
            HwReg::Rsp => "rsp",
            HwReg::R8 => "r8",
            HwReg::R9 => "r9",
            HwReg::R10 => "r10",
            HwReg::R11 => "r11",
            HwReg::R12 => "r12",
            HwReg::R13 => "r13",
            HwReg::R14 => "r14",
            HwReg::R15 => "r15",
        };
        write!(f, "{}", name)
    }
}

/// The register view of an operand, the unit the allocator works on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Reg {
    Virtual(u32),
    Hardware(HwReg),
}

impl fmt::Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reg::Virtual(id) => write!(f, "%vreg{}", id),
            Reg::Hardware(r) => write!(f, "%{}", r),
        }
    }
}

/// An instruction argument.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Operand {
    /// A virtual register, eliminated by allocation
    Vreg(u32),
    /// A hardware register
    Hreg(HwReg),
    Imm(i64),
    /// A named code or data address
    Sym(String),
    /// A keyed stack slot, materialised to `[rbp + k]` by the allocator
    Stack(String),
    /// An incoming on-stack parameter, read at `[rbp + 16 + 8*index]`
    StackParam { name: String, index: usize },
    /// A basic block, as a jump target
    Block(usize),
}

impl Operand {
    pub fn vreg(id: u32) -> Operand {
        Operand::Vreg(id)
    }

    pub fn hreg(reg: HwReg) -> Operand {
        Operand::Hreg(reg)
    }

    /// The register named by this operand, if it is one.
    pub fn reg(&self) -> Option<Reg> {
        match self {
            Operand::Vreg(id) => Some(Reg::Virtual(*id)),
            Operand::Hreg(r) => Some(Reg::Hardware(*r)),
            _ => None,
        }
    }

    pub fn is_register(&self) -> bool {
        self.reg().is_some()
    }

    pub fn is_vreg(&self) -> bool {
        matches!(self, Operand::Vreg(_))
    }

    pub fn is_stack_slot(&self) -> bool {
        matches!(self, Operand::Stack(_) | Operand::StackParam { .. })
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Vreg(id) => write!(f, "%vreg{}", id),
            Operand::Hreg(r) => write!(f, "%{}", r),
            Operand::Imm(value) => write!(f, "{}", value),
            Operand::Sym(name) => write!(f, "@{}", name),
            Operand::Stack(name) => write!(f, "${}", name),
            Operand::StackParam { name, .. } => write!(f, "${}", name),
            Operand::Block(id) => write!(f, ".{}", id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_table_order() {
        assert_eq!(HwReg::Rax.index(), 0);
        assert_eq!(HwReg::Rbp.index(), 6);
        assert_eq!(HwReg::Rsp.index(), 7);
        assert_eq!(HwReg::R15.index(), 15);
        assert_eq!(HwReg::TABLE[HwReg::Rdi.index()], HwReg::Rdi);
    }

    #[test]
    fn test_operand_reg_view() {
        assert_eq!(Operand::vreg(3).reg(), Some(Reg::Virtual(3)));
        assert_eq!(
            Operand::hreg(HwReg::Rax).reg(),
            Some(Reg::Hardware(HwReg::Rax))
        );
        assert_eq!(Operand::Imm(1).reg(), None);
        assert!(!Operand::Sym("f".to_string()).is_register());
        assert!(Operand::Stack("vreg7".to_string()).is_stack_slot());
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Operand::vreg(2)), "%vreg2");
        assert_eq!(format!("{}", Operand::hreg(HwReg::R10)), "%r10");
        assert_eq!(format!("{}", Reg::Hardware(HwReg::Rdi)), "%rdi");
    }
}
