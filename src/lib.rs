//! Sable Compiler Backend
//!
//! This crate implements the backend of the Sable compiler, a statically
//! typed expression-oriented language targeting x86-64. The frontend
//! (lexer, parser, name resolution, type inference) is an external
//! collaborator; it hands us a type-annotated AST and we hand back a
//! textual assembly file.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐    ┌──────────┐    ┌─────────────┐    ┌───────────┐    ┌──────────┐
//! │  Typed AST  │───▶│  TAC IR  │───▶│  Machine IR │───▶│ Allocated │───▶│ Assembly │
//! │ (TypedProg) │    │ (lower)  │    │   (isel)    │    │ (regalloc)│    │  (emit)  │
//! └─────────────┘    └──────────┘    └─────────────┘    └───────────┘    └──────────┘
//! ```
//!
//! # Modules
//!
//! - `common`: interface types shared with the frontend (symbols, types,
//!   typed AST, target platform, runtime ABI)
//! - `backend`: the lowering pipeline itself
//! - `pipeline`: end-to-end driver from typed AST to assembly text

pub mod backend;
pub mod common;
pub mod pipeline;
