//! Runtime ABI shared with generated code.
//!
//! Every boxed value starts with a fixed 32-byte header:
//!
//! ```text
//! offset  0: refCount       (i64)
//! offset  8: destructor     (code pointer, or null)
//! offset 16: pointerFields  (i64 bitmap; bit i set = payload word i is managed)
//! offset 24: markBit        (i64)
//! ```
//!
//! The low bit of a word distinguishes heap pointers (0) from tagged
//! integers (1). An integer `n` is stored as `2n + 1`; booleans are the
//! tagged integers 1 (false) and 3 (true). The empty list is the null
//! pointer.

/// Size of the object header in bytes.
pub const HEADER_SIZE: i64 = 32;

pub const REF_COUNT_OFFSET: i64 = 0;
pub const DESTRUCTOR_OFFSET: i64 = 8;
pub const POINTER_FIELDS_OFFSET: i64 = 16;
pub const MARK_BIT_OFFSET: i64 = 24;

/// Every payload member occupies one word.
pub const WORD_SIZE: i64 = 8;

/// Tagged representation of an integer.
pub fn tag_int(n: i64) -> i64 {
    2 * n + 1
}

/// Tagged `true`.
pub const TRUE: i64 = 3;
/// Tagged `false`.
pub const FALSE: i64 = 1;
/// The empty list.
pub const NIL: i64 = 0;

/// C runtime symbols that generated code links against. Declared as
/// externs in every output file.
pub const RUNTIME_SYMBOLS: &[&str] = &[
    "malloc",
    "free",
    "_incref",
    "_decref",
    "_die",
    "__destroyClosure",
];

pub const MALLOC: &str = "malloc";
pub const FREE: &str = "free";
pub const INCREF: &str = "_incref";
pub const DECREF: &str = "_decref";
pub const DIE: &str = "_die";
pub const DESTROY_CLOSURE: &str = "__destroyClosure";
