//! TAC addresses.
//!
//! An [`Addr`] is a `Copy` index into the per-program [`AddressTable`].
//! Name addresses are interned per symbol by the builder, so index
//! equality is symbol identity. Addresses are created during TAC build
//! and shared by many instructions until emission.

use std::fmt;

/// Index of an address in the program's address table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Addr(pub u32);

/// A jump target, unique across the program.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Label(pub u32);

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

/// What flavour of name an address refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NameKind {
    Global,
    Local,
    Param,
    Static,
    Function,
}

/// Payload of an address.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AddressData {
    /// An interned name; the string is already mangled for the target
    Name { kind: NameKind, mangled: String },
    /// A compiler temporary, produced once by convention
    Temp(u32),
    /// An integer constant (already tagged where the source value was)
    Const(i64),
}

/// Arena of all addresses in a program.
#[derive(Clone, Debug, Default)]
pub struct AddressTable {
    entries: Vec<AddressData>,
}

impl AddressTable {
    pub fn new() -> AddressTable {
        AddressTable {
            entries: Vec::new(),
        }
    }

    pub fn add(&mut self, data: AddressData) -> Addr {
        let addr = Addr(self.entries.len() as u32);
        self.entries.push(data);
        addr
    }

    pub fn get(&self, addr: Addr) -> &AddressData {
        &self.entries[addr.0 as usize]
    }

    pub fn is_const(&self, addr: Addr) -> Option<i64> {
        match self.get(addr) {
            AddressData::Const(v) => Some(*v),
            _ => None,
        }
    }

    /// Printable form of an address, used by the TAC printers and in
    /// fatal diagnostics.
    pub fn show(&self, addr: Addr) -> String {
        match self.get(addr) {
            AddressData::Name { mangled, .. } => mangled.clone(),
            AddressData::Temp(id) => format!("%t{}", id),
            AddressData::Const(value) => format!("{}", value),
        }
    }
}
