//! Builder state for typed AST to TAC lowering.

use crate::backend::lower::{ctors, stmt};
use crate::backend::tac::{
    Addr, AddressData, Instruction, Label, NameKind, TacFunction, TacProgram,
};
use crate::common::abi;
use crate::common::platform::Platform;
use crate::common::symbol::{Symbol, SymbolId, SymbolKind};
use crate::common::tast::TypedProgram;
use std::collections::HashMap;

/// Walks the typed AST and accumulates a [`TacProgram`].
///
/// Instructions are emitted into `current`, the function being built.
/// Name addresses are interned per symbol for the whole program, so
/// address equality is symbol identity.
pub struct TacBuilder<'p> {
    pub program: &'p TypedProgram,
    pub platform: Platform,
    tac: TacProgram,
    current: TacFunction,
    names: HashMap<SymbolId, Addr>,
    next_temp: u32,
    next_label: u32,
    /// End labels of the enclosing loops, innermost last
    pub loop_ends: Vec<Label>,
}

impl<'p> TacBuilder<'p> {
    pub fn new(program: &'p TypedProgram, platform: Platform) -> TacBuilder<'p> {
        let main_name = platform.mangle("main");
        TacBuilder {
            program,
            platform,
            tac: TacProgram::new(main_name),
            current: TacFunction::new(String::new()),
            names: HashMap::new(),
            next_temp: 0,
            next_label: 0,
            loop_ends: Vec::new(),
        }
    }

    /// Run the whole translation.
    pub fn run(mut self) -> TacProgram {
        let program = self.program;

        // Top-level statements form the body of main.
        self.begin_function(self.platform.mangle("main"));
        for s in &program.body {
            stmt::lower_stmt(&mut self, s);
        }
        self.tac.main = self.finish_function();

        // User-defined functions.
        for def in &program.functions {
            let name = self.symbol(def.symbol).name.clone();
            self.begin_function(self.platform.mangle(&name));
            for s in &def.body {
                stmt::lower_stmt(&mut self, s);
            }
            for &param in &def.params {
                let addr = self.name_addr(param);
                self.current.params.push(addr);
            }
            for &local in &def.locals {
                let addr = self.name_addr(local);
                self.current.locals.push(addr);
            }
            let func = self.finish_function();
            self.tac.functions.push(func);
        }

        // Synthesized constructors and destructors.
        for data in &program.data_defs {
            ctors::synthesize_constructor(&mut self, &data.constructor);
            ctors::synthesize_destructor(&mut self, &data.constructor);
        }

        self.gather_globals_and_externs();

        self.tac
    }

    // ========================================================================
    // Function buffers
    // ========================================================================

    pub fn begin_function(&mut self, name: String) {
        self.current = TacFunction::new(name);
    }

    /// Seal the current function, guaranteeing a trailing return.
    pub fn finish_function(&mut self) -> TacFunction {
        if !matches!(
            self.current.instructions.last(),
            Some(Instruction::Return { .. })
        ) {
            self.emit(Instruction::Return { value: None });
        }
        std::mem::replace(&mut self.current, TacFunction::new(String::new()))
    }

    pub fn push_function(&mut self, func: TacFunction) {
        self.tac.functions.push(func);
    }

    // ========================================================================
    // Emission
    // ========================================================================

    pub fn emit(&mut self, inst: Instruction) {
        self.current.instructions.push(inst);
    }

    pub fn emit_label(&mut self, label: Label) {
        self.emit(Instruction::Label { label });
    }

    /// Emit an `_incref` maintenance call.
    pub fn incref(&mut self, addr: Addr) {
        let target = self.platform.foreign(abi::INCREF);
        self.emit(Instruction::Call {
            foreign: true,
            dst: None,
            target,
            args: vec![addr],
        });
    }

    /// Emit a `_decref` maintenance call.
    pub fn decref(&mut self, addr: Addr) {
        let target = self.platform.foreign(abi::DECREF);
        self.emit(Instruction::Call {
            foreign: true,
            dst: None,
            target,
            args: vec![addr],
        });
    }

    // ========================================================================
    // Address supplies
    // ========================================================================

    pub fn temp(&mut self) -> Addr {
        let id = self.next_temp;
        self.next_temp += 1;
        self.tac.addresses.add(AddressData::Temp(id))
    }

    pub fn label(&mut self) -> Label {
        let id = self.next_label;
        self.next_label += 1;
        Label(id)
    }

    pub fn const_addr(&mut self, value: i64) -> Addr {
        self.tac.addresses.add(AddressData::Const(value))
    }

    pub fn symbol(&self, id: SymbolId) -> &'p Symbol {
        self.program.symbols.get(id)
    }

    /// The interned name address for a symbol.
    pub fn name_addr(&mut self, id: SymbolId) -> Addr {
        if let Some(&addr) = self.names.get(&id) {
            return addr;
        }

        let symbol = self.program.symbols.get(id);
        let (kind, mangled) = match &symbol.kind {
            SymbolKind::Variable { is_static: true, .. } => {
                (NameKind::Static, self.platform.mangle(&symbol.name))
            }
            SymbolKind::Variable { is_global: true, .. } => {
                (NameKind::Global, self.platform.mangle(&symbol.name))
            }
            SymbolKind::Variable { is_param: true, .. } => {
                (NameKind::Param, symbol.name.clone())
            }
            SymbolKind::Variable { .. } => (NameKind::Local, symbol.name.clone()),
            SymbolKind::Function { is_foreign, .. } => {
                let mangled = if *is_foreign {
                    self.platform.foreign(&symbol.name)
                } else {
                    self.platform.mangle(&symbol.name)
                };
                (NameKind::Function, mangled)
            }
        };

        let addr = self.tac.addresses.add(AddressData::Name { kind, mangled });
        self.names.insert(id, addr);
        addr
    }

    /// A function-name address that has no symbol, e.g. a synthesized
    /// destructor or a runtime entry point.
    pub fn function_addr(&mut self, mangled: String) -> Addr {
        self.tac.addresses.add(AddressData::Name {
            kind: NameKind::Function,
            mangled,
        })
    }

    /// A parameter address for a synthesized function, which has no
    /// frontend symbol to intern against. Registers the parameter on the
    /// current function.
    pub fn tac_param(&mut self, name: &str) -> Addr {
        let addr = self.tac.addresses.add(AddressData::Name {
            kind: NameKind::Param,
            mangled: name.to_string(),
        });
        self.current.params.push(addr);
        addr
    }

    /// The call target spelling for a function symbol.
    pub fn call_target(&self, id: SymbolId) -> (bool, String) {
        let symbol = self.program.symbols.get(id);
        match symbol.kind {
            SymbolKind::Function { is_foreign, .. } => {
                if is_foreign {
                    (true, self.platform.foreign(&symbol.name))
                } else {
                    (false, self.platform.mangle(&symbol.name))
                }
            }
            _ => panic!("call target is not a function: {}", symbol.name),
        }
    }

    /// Symbol name of the synthesized destructor for a constructor.
    pub fn destructor_name(&self, constructor: &str) -> String {
        format!("_destroy{}", self.platform.mangle(constructor))
    }

    // ========================================================================
    // Program-level collection
    // ========================================================================

    /// Collect global variables and external symbols from the symbol
    /// table, then the runtime symbols generated code always depends on.
    fn gather_globals_and_externs(&mut self) {
        let program = self.program;
        for (id, symbol) in program.symbols.iter() {
            match symbol.kind {
                SymbolKind::Function {
                    is_external: true,
                    is_foreign,
                    ..
                } => {
                    let name = if is_foreign {
                        self.platform.foreign(&symbol.name)
                    } else {
                        self.platform.mangle(&symbol.name)
                    };
                    if !self.tac.externs.contains(&name) {
                        self.tac.externs.push(name);
                    }
                }
                SymbolKind::Variable { is_global, is_static, .. }
                    if is_global || is_static =>
                {
                    let addr = self.name_addr(id);
                    self.tac.globals.push(addr);
                }
                _ => {}
            }
        }

        for runtime in abi::RUNTIME_SYMBOLS {
            let name = self.platform.foreign(runtime);
            if !self.tac.externs.contains(&name) {
                self.tac.externs.push(name);
            }
        }
    }
}
