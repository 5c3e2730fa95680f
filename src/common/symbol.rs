//! Symbol table handed over by the frontend.
//!
//! Every name in the typed AST has been resolved to a [`SymbolId`], an
//! index into the program's [`SymbolTable`]. The backend reads symbols,
//! never creates them.

use crate::common::types::Type;
use std::fmt;

/// Index of a symbol in the program's symbol table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SymbolId(pub u32);

impl fmt::Display for SymbolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sym{}", self.0)
    }
}

/// What kind of thing a symbol names, with the attributes the backend
/// depends on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SymbolKind {
    Variable {
        is_param: bool,
        is_static: bool,
        is_global: bool,
    },
    Function {
        /// Implemented in C; referenced under its unmangled foreign name
        is_foreign: bool,
        /// Declared here, defined in another compilation unit
        is_external: bool,
        /// Expanded inline by the TAC builder instead of called
        is_builtin: bool,
        /// A value constructor with a synthesized body
        is_constructor: bool,
    },
}

/// A resolved name with its inferred type.
#[derive(Clone, Debug)]
pub struct Symbol {
    pub name: String,
    pub ty: Type,
    pub kind: SymbolKind,
}

impl Symbol {
    pub fn local(name: &str, ty: Type) -> Symbol {
        Symbol {
            name: name.to_string(),
            ty,
            kind: SymbolKind::Variable {
                is_param: false,
                is_static: false,
                is_global: false,
            },
        }
    }

    pub fn param(name: &str, ty: Type) -> Symbol {
        Symbol {
            name: name.to_string(),
            ty,
            kind: SymbolKind::Variable {
                is_param: true,
                is_static: false,
                is_global: false,
            },
        }
    }

    pub fn global(name: &str, ty: Type) -> Symbol {
        Symbol {
            name: name.to_string(),
            ty,
            kind: SymbolKind::Variable {
                is_param: false,
                is_static: false,
                is_global: true,
            },
        }
    }

    pub fn function(name: &str, ty: Type) -> Symbol {
        Symbol {
            name: name.to_string(),
            ty,
            kind: SymbolKind::Function {
                is_foreign: false,
                is_external: false,
                is_builtin: false,
                is_constructor: false,
            },
        }
    }

    /// A C runtime function, called under its unmangled name.
    pub fn foreign(name: &str, ty: Type) -> Symbol {
        Symbol {
            name: name.to_string(),
            ty,
            kind: SymbolKind::Function {
                is_foreign: true,
                is_external: true,
                is_builtin: false,
                is_constructor: false,
            },
        }
    }

    pub fn builtin(name: &str, ty: Type) -> Symbol {
        Symbol {
            name: name.to_string(),
            ty,
            kind: SymbolKind::Function {
                is_foreign: false,
                is_external: false,
                is_builtin: true,
                is_constructor: false,
            },
        }
    }

    pub fn constructor(name: &str, ty: Type) -> Symbol {
        Symbol {
            name: name.to_string(),
            ty,
            kind: SymbolKind::Function {
                is_foreign: false,
                is_external: false,
                is_builtin: false,
                is_constructor: true,
            },
        }
    }

    pub fn is_variable(&self) -> bool {
        matches!(self.kind, SymbolKind::Variable { .. })
    }

    pub fn is_function(&self) -> bool {
        matches!(self.kind, SymbolKind::Function { .. })
    }

    pub fn is_foreign(&self) -> bool {
        matches!(self.kind, SymbolKind::Function { is_foreign: true, .. })
    }

    pub fn is_builtin(&self) -> bool {
        matches!(self.kind, SymbolKind::Function { is_builtin: true, .. })
    }
}

/// The program-wide symbol arena.
#[derive(Clone, Debug, Default)]
pub struct SymbolTable {
    symbols: Vec<Symbol>,
}

impl SymbolTable {
    pub fn new() -> SymbolTable {
        SymbolTable {
            symbols: Vec::new(),
        }
    }

    pub fn add(&mut self, symbol: Symbol) -> SymbolId {
        let id = SymbolId(self.symbols.len() as u32);
        self.symbols.push(symbol);
        id
    }

    pub fn get(&self, id: SymbolId) -> &Symbol {
        &self.symbols[id.0 as usize]
    }

    /// Iterate over all symbols in definition order.
    pub fn iter(&self) -> impl Iterator<Item = (SymbolId, &Symbol)> {
        self.symbols
            .iter()
            .enumerate()
            .map(|(i, s)| (SymbolId(i as u32), s))
    }
}
