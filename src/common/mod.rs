//! Types shared between the frontend collaborator and the backend.
//!
//! The frontend produces a [`tast::TypedProgram`] with every name resolved
//! to a [`symbol::SymbolId`] and every expression annotated with a
//! [`types::Type`]. The backend consumes that program and never reports a
//! user error; anything wrong at this point is a frontend bug.
//!
//! # Modules
//!
//! - `abi`: the runtime object layout and tagging scheme
//! - `platform`: target selection and symbol mangling
//! - `symbol`: the resolved symbol table
//! - `tast`: the type-annotated AST
//! - `types`: the Sable type model

pub mod abi;
pub mod platform;
pub mod symbol;
pub mod tast;
pub mod types;

pub use platform::Platform;
pub use symbol::{Symbol, SymbolId, SymbolKind, SymbolTable};
pub use tast::TypedProgram;
pub use types::Type;
