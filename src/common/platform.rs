//! Target platform selection and symbol mangling.
//!
//! Output follows the System V AMD64 ABI. The only per-platform choices
//! are cosmetic: how global symbols are mangled, how foreign (C runtime)
//! symbols are spelled, and how local labels and `.comm` directives are
//! written.

use target_lexicon::{OperatingSystem, Triple};

/// The flavour of assembly we are producing.
#[derive(Clone, Debug)]
pub struct Platform {
    macho: bool,
}

impl Platform {
    pub fn new(triple: &Triple) -> Platform {
        let macho = matches!(
            triple.operating_system,
            OperatingSystem::Darwin | OperatingSystem::MacOSX { .. }
        );
        Platform { macho }
    }

    /// The platform this compiler is running on.
    pub fn host() -> Platform {
        Platform::new(&Triple::host())
    }

    pub fn linux() -> Platform {
        Platform { macho: false }
    }

    pub fn macos() -> Platform {
        Platform { macho: true }
    }

    pub fn is_macho(&self) -> bool {
        self.macho
    }

    /// Mangle a Sable global symbol: `main` becomes `_Z4main` on ELF and
    /// `Z4main` on mach-o.
    pub fn mangle(&self, name: &str) -> String {
        if self.macho {
            format!("Z{}{}", name.len(), name)
        } else {
            format!("_Z{}{}", name.len(), name)
        }
    }

    /// Spell a foreign (C runtime) symbol.
    pub fn foreign(&self, name: &str) -> String {
        if self.macho {
            format!("_{}", name)
        } else {
            name.to_string()
        }
    }

    /// Assembler-local label for a basic block.
    pub fn local_label(&self, function: &str, block: usize) -> String {
        if self.macho {
            format!("L{}_{}", function, block)
        } else {
            format!(".L{}_{}", function, block)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mangling() {
        assert_eq!(Platform::linux().mangle("main"), "_Z4main");
        assert_eq!(Platform::macos().mangle("main"), "Z4main");
        assert_eq!(Platform::linux().mangle("fib"), "_Z3fib");
    }

    #[test]
    fn test_foreign_names() {
        assert_eq!(Platform::linux().foreign("_incref"), "_incref");
        assert_eq!(Platform::macos().foreign("_incref"), "__incref");
        assert_eq!(Platform::linux().foreign("malloc"), "malloc");
    }

    #[test]
    fn test_local_labels() {
        assert_eq!(Platform::linux().local_label("_Z4main", 2), ".L_Z4main_2");
        assert_eq!(Platform::macos().local_label("Z4main", 2), "LZ4main_2");
    }
}
