//! Constructor and destructor synthesis.
//!
//! Every value constructor gets two synthesized functions: an allocator
//! that builds the object (header plus one word per member) and a
//! destructor, installed in the header, that releases the boxed members
//! and frees the storage.

use crate::backend::lower::context::TacBuilder;
use crate::backend::tac::Instruction;
use crate::common::abi;
use crate::common::tast::ConstructorDef;

/// Synthesize the allocator function for a constructor.
///
/// Takes one parameter per member, returns the new object. Boxed members
/// gain a reference when stored.
pub fn synthesize_constructor(b: &mut TacBuilder, ctor: &ConstructorDef) {
    b.begin_function(b.platform.mangle(&ctor.name));

    let size = abi::HEADER_SIZE + abi::WORD_SIZE * ctor.members.len() as i64;
    let size_addr = b.const_addr(size);
    let result = b.temp();
    let malloc = b.platform.foreign(abi::MALLOC);
    b.emit(Instruction::Call {
        foreign: true,
        dst: Some(result),
        target: malloc,
        args: vec![size_addr],
    });

    // Header: fresh refcount, our destructor, the bitmap of managed
    // payload words, clear mark bit.
    let zero = b.const_addr(0);
    b.emit(Instruction::IndexedStore {
        base: result,
        offset: abi::REF_COUNT_OFFSET,
        src: zero,
    });

    let destructor = b.destructor_name(&ctor.name);
    let destructor = b.function_addr(destructor);
    b.emit(Instruction::IndexedStore {
        base: result,
        offset: abi::DESTRUCTOR_OFFSET,
        src: destructor,
    });

    let mut bitmap = 0i64;
    for member in &ctor.members {
        if member.ty.is_boxed() {
            bitmap |= 1 << member.location;
        }
    }
    let bitmap = b.const_addr(bitmap);
    b.emit(Instruction::IndexedStore {
        base: result,
        offset: abi::POINTER_FIELDS_OFFSET,
        src: bitmap,
    });
    b.emit(Instruction::IndexedStore {
        base: result,
        offset: abi::MARK_BIT_OFFSET,
        src: zero,
    });

    // Store each member from its parameter; storing into the structure
    // takes a new reference to boxed members.
    for member in &ctor.members {
        let param = b.tac_param(&member.name);
        b.emit(Instruction::IndexedStore {
            base: result,
            offset: abi::HEADER_SIZE + abi::WORD_SIZE * member.location as i64,
            src: param,
        });
        if member.ty.is_boxed() {
            b.incref(param);
        }
    }

    b.emit(Instruction::Return {
        value: Some(result),
    });
    let func = b.finish_function();
    b.push_function(func);
}

/// Synthesize the destructor function for a constructor: decref every
/// boxed member, then free the object.
pub fn synthesize_destructor(b: &mut TacBuilder, ctor: &ConstructorDef) {
    b.begin_function(b.destructor_name(&ctor.name));

    let object = b.tac_param("object");

    for member in &ctor.members {
        if member.ty.is_boxed() {
            let temp = b.temp();
            b.emit(Instruction::IndexedLoad {
                dst: temp,
                base: object,
                offset: abi::HEADER_SIZE + abi::WORD_SIZE * member.location as i64,
            });
            b.decref(temp);
        }
    }

    let free = b.platform.foreign(abi::FREE);
    b.emit(Instruction::Call {
        foreign: true,
        dst: None,
        target: free,
        args: vec![object],
    });

    let func = b.finish_function();
    b.push_function(func);
}
