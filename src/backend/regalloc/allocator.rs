//! Chaitin-style simplify/select register allocation with iterative
//! spill, caller-save spilling around calls, stack-slot assignment, and
//! prologue completion.

use crate::backend::machine::{
    HwReg, MachineFunction, MachineInst, Opcode, Operand, Reg,
};
use crate::backend::regalloc::liveness::{
    analyze, live_out, step, InterferenceGraph, RegSet,
};
use indexmap::{IndexMap, IndexSet};

/// One color per hardware register minus the reserved one (r15).
pub const AVAILABLE_COLORS: usize = 15;

/// rbp and rsp hold the frame; their colors are never handed to a
/// virtual register.
const FRAME_COLORS: [usize; 2] = [6, 7];

/// A coloring attempt restarts after every spill; a function that keeps
/// spilling past this bound indicates a selector bug.
const MAX_SPILL_ROUNDS: usize = 64;

/// Per-function allocation state. [`RegAlloc::run`] rewrites the
/// function in place and returns the final state for inspection.
#[derive(Debug, Default)]
pub struct RegAlloc {
    pub coloring: IndexMap<Reg, usize>,
    /// Spilled virtual registers and their stack slot keys
    pub spilled: IndexMap<Reg, String>,
    /// Byte offsets from rbp, assigned lazily per slot key
    pub stack_offsets: IndexMap<String, i64>,
    /// Low watermark of the frame, a non-positive multiple of 8
    pub current_offset: i64,
}

impl RegAlloc {
    /// Allocate hardware registers for a function.
    pub fn run(func: &mut MachineFunction) -> RegAlloc {
        let mut alloc = RegAlloc::default();
        alloc.color_graph(func);
        alloc.replace_regs(func);
        alloc.assign_stack_locations(func);
        alloc.spill_around_calls(func);
        alloc.allocate_stack(func);
        alloc
    }

    // ========================================================================
    // Coloring
    // ========================================================================

    /// Color until no spill occurs, recomputing liveness and
    /// interference after every rewrite.
    fn color_graph(&mut self, func: &mut MachineFunction) {
        self.spilled.clear();

        let mut rounds = 0;
        loop {
            let liveness = analyze(func);
            let igraph = InterferenceGraph::build(func, &liveness);
            if self.try_color(func, &igraph) {
                break;
            }

            rounds += 1;
            assert!(
                rounds < MAX_SPILL_ROUNDS,
                "register allocation failed to converge after {} spill rounds in {}",
                MAX_SPILL_ROUNDS,
                func.name
            );
        }
    }

    fn try_color(&mut self, func: &mut MachineFunction, igraph: &InterferenceGraph) -> bool {
        self.coloring.clear();

        let mut graph: IndexMap<Reg, IndexSet<Reg>> = igraph.edges.clone();
        let mut stack: Vec<Reg> = Vec::new();

        // Simplify: push non-precolored vertices of degree < k; when none
        // qualifies, push an arbitrary one and defer the spill decision
        // to select.
        while graph.len() > igraph.precolored.len() {
            let candidate = graph
                .iter()
                .find(|(reg, neighbors)| {
                    !igraph.precolored.contains_key(*reg)
                        && neighbors.len() < AVAILABLE_COLORS
                })
                .map(|(reg, _)| *reg)
                .or_else(|| {
                    graph
                        .keys()
                        .find(|reg| !igraph.precolored.contains_key(*reg))
                        .copied()
                });

            let reg = candidate.expect("simplify ran out of vertices");
            stack.push(reg);
            remove_vertex(&mut graph, reg);
        }

        // Precolored vertices go last, so select handles them first.
        let precolored: Vec<Reg> = graph.keys().copied().collect();
        for reg in precolored {
            stack.push(reg);
            remove_vertex(&mut graph, reg);
        }
        assert!(graph.is_empty());

        // Select: pop in LIFO order, reinsert conceptually with the
        // original neighbors, pick a color none of them holds.
        while let Some(reg) = stack.pop() {
            let mut used: IndexSet<usize> = IndexSet::new();
            for neighbor in igraph.neighbors(reg) {
                if let Some(&color) = self.coloring.get(&neighbor) {
                    used.insert(color);
                }
            }

            if let Some(&color) = igraph.precolored.get(&reg) {
                assert!(
                    !used.contains(&color),
                    "calling convention violated: {} demands an occupied color in {}",
                    reg,
                    func.name
                );
                self.coloring.insert(reg, color);
                continue;
            }

            let color = (0..AVAILABLE_COLORS)
                .filter(|color| !FRAME_COLORS.contains(color))
                .find(|color| !used.contains(color));

            match color {
                Some(color) => {
                    self.coloring.insert(reg, color);
                }
                None => {
                    self.spill_register(func, reg);
                    return false;
                }
            }
        }

        true
    }

    /// Rewrite every definition and use of a spilled register through a
    /// fresh stack slot, then restart coloring.
    fn spill_register(&mut self, func: &mut MachineFunction, reg: Reg) {
        let id = match reg {
            Reg::Virtual(id) => id,
            Reg::Hardware(h) => panic!("cannot spill hardware register %{}", h),
        };
        let slot = format!("vreg{}", id);
        self.spilled.insert(reg, slot.clone());

        let mut blocks = std::mem::take(&mut func.blocks);
        for block in &mut blocks {
            let mut rewritten = Vec::with_capacity(block.instructions.len());
            for mut inst in block.instructions.drain(..) {
                let reads = inst.inputs.iter().any(|o| o.reg() == Some(reg));
                let writes = inst.outputs.iter().any(|o| o.reg() == Some(reg));

                if !reads && !writes {
                    rewritten.push(inst);
                    continue;
                }

                // One fresh register per site. An instruction that both
                // reads and writes the spilled register (two-address
                // arithmetic) must see the same register on both sides.
                let fresh = func.make_vreg();

                if reads {
                    // Reload just before the use.
                    rewritten.push(MachineInst::new(
                        Opcode::MovRm,
                        vec![fresh.clone()],
                        vec![Operand::Stack(slot.clone())],
                    ));
                    for input in &mut inst.inputs {
                        if input.reg() == Some(reg) {
                            *input = fresh.clone();
                        }
                    }
                }
                if writes {
                    for output in &mut inst.outputs {
                        if output.reg() == Some(reg) {
                            *output = fresh.clone();
                        }
                    }
                }

                rewritten.push(inst);

                if writes {
                    // Store back right after the definition.
                    rewritten.push(MachineInst::new(
                        Opcode::MovMd,
                        vec![],
                        vec![Operand::Stack(slot.clone()), fresh],
                    ));
                }
            }
            block.instructions = rewritten;
        }
        func.blocks = blocks;
    }

    // ========================================================================
    // Substitution and stack materialisation
    // ========================================================================

    /// Replace every virtual register operand with its colored hardware
    /// register.
    fn replace_regs(&mut self, func: &mut MachineFunction) {
        for block in &mut func.blocks {
            for inst in &mut block.instructions {
                for operand in inst.outputs.iter_mut().chain(inst.inputs.iter_mut()) {
                    if let Operand::Vreg(id) = operand {
                        let color = self
                            .coloring
                            .get(&Reg::Virtual(*id))
                            .unwrap_or_else(|| {
                                panic!("virtual register %vreg{} was never colored", id)
                            });
                        *operand = Operand::hreg(HwReg::TABLE[*color]);
                    }
                }
            }
        }
    }

    /// Rewrite stack slots into `[rbp + offset]` memory operands,
    /// assigning offsets lazily downward from zero.
    fn assign_stack_locations(&mut self, func: &mut MachineFunction) {
        self.stack_offsets.clear();
        self.current_offset = 0;

        for block in &mut func.blocks {
            for inst in &mut block.instructions {
                if inst.inputs.iter().any(|o| o.is_stack_slot()) {
                    match inst.opcode {
                        Opcode::MovRm => {
                            assert!(
                                inst.inputs.len() == 1,
                                "malformed stack load: {}",
                                inst
                            );
                            let offset = self.stack_offset(&inst.inputs[0]);
                            inst.inputs[0] = Operand::hreg(HwReg::Rbp);
                            inst.inputs.push(Operand::Imm(offset));
                        }
                        Opcode::MovMd => {
                            assert!(
                                inst.inputs.len() == 2,
                                "malformed stack store: {}",
                                inst
                            );
                            let offset = self.stack_offset(&inst.inputs[0]);
                            inst.inputs[0] = Operand::hreg(HwReg::Rbp);
                            inst.inputs.push(Operand::Imm(offset));
                        }
                        _ => panic!("stack location in unsupported instruction: {}", inst),
                    }
                }

                for output in &inst.outputs {
                    assert!(
                        !output.is_stack_slot(),
                        "stack location used as output: {}",
                        inst
                    );
                }
            }
        }
    }

    /// The rbp-relative offset of a slot. Incoming stack parameters sit
    /// above the saved frame pointer and consume no frame space.
    fn stack_offset(&mut self, operand: &Operand) -> i64 {
        match operand {
            Operand::StackParam { index, .. } => 16 + 8 * *index as i64,
            Operand::Stack(key) => {
                if let Some(&offset) = self.stack_offsets.get(key) {
                    offset
                } else {
                    let offset = self.current_offset - 8;
                    self.current_offset = offset;
                    self.stack_offsets.insert(key.clone(), offset);
                    offset
                }
            }
            other => panic!("not a stack slot: {}", other),
        }
    }

    // ========================================================================
    // Caller-save spilling
    // ========================================================================

    /// Save every register live across a call (except rsp, rbp and the
    /// call's own results) right before it, and restore right after.
    ///
    /// Save slots are rsp-relative so the rbp-relative stack variables
    /// are unaffected; the accounting is local to each call site but the
    /// low watermark is global, so independent call sites share the same
    /// region of the frame. A call that pops pushed stack arguments is
    /// followed by its `ADD rsp, k`; that k biases the save offsets above
    /// the pending pushes.
    fn spill_around_calls(&mut self, func: &mut MachineFunction) {
        // The rewrites above changed the instruction stream.
        let liveness = analyze(func);
        let live_outs: Vec<RegSet> = (0..func.blocks.len())
            .map(|b| live_out(func, &liveness.live, b))
            .collect();

        let start_offset = self.current_offset;

        for block in &mut func.blocks {
            let mut regs = live_outs[block.id].clone();
            let mut edits: Vec<(usize, Vec<MachineInst>, Vec<MachineInst>)> = Vec::new();

            for idx in (0..block.instructions.len()).rev() {
                let inst = &block.instructions[idx];
                step(inst, &mut regs);

                if !inst.is_call() {
                    continue;
                }

                let bias = pop_adjustment(block.instructions.get(idx + 1));
                let clobbered: Vec<Reg> =
                    inst.outputs.iter().filter_map(|o| o.reg()).collect();

                let mut saves = Vec::new();
                let mut restores = Vec::new();
                let mut slots = 0i64;

                for reg in regs.iter() {
                    let hreg = match reg {
                        Reg::Hardware(h) => *h,
                        Reg::Virtual(id) => {
                            panic!("unallocated register %vreg{} at a call site", id)
                        }
                    };
                    if hreg == HwReg::Rsp || hreg == HwReg::Rbp {
                        continue;
                    }
                    // The call's own results must survive the restores.
                    if clobbered.contains(reg) {
                        continue;
                    }

                    let offset = bias + 8 * slots;
                    slots += 1;
                    self.current_offset =
                        self.current_offset.min(start_offset - 8 * slots);

                    saves.push(MachineInst::new(
                        Opcode::MovMd,
                        vec![],
                        vec![
                            Operand::hreg(HwReg::Rsp),
                            Operand::hreg(hreg),
                            Operand::Imm(offset),
                        ],
                    ));
                    restores.push(MachineInst::new(
                        Opcode::MovRm,
                        vec![Operand::hreg(hreg)],
                        vec![Operand::hreg(HwReg::Rsp), Operand::Imm(offset)],
                    ));
                }

                if !saves.is_empty() {
                    edits.push((idx, saves, restores));
                }
            }

            // Edits are in descending index order, so applying them in
            // that order leaves earlier indices valid.
            for (idx, saves, restores) in edits {
                for (k, restore) in restores.into_iter().enumerate() {
                    block.instructions.insert(idx + 1 + k, restore);
                }
                for (k, save) in saves.into_iter().enumerate() {
                    block.instructions.insert(idx + k, save);
                }
            }
        }
    }

    // ========================================================================
    // Prologue completion
    // ========================================================================

    /// If any frame space was used, round it up to 16 bytes and allocate
    /// it right after the fixed two-instruction prologue.
    fn allocate_stack(&mut self, func: &mut MachineFunction) {
        if self.current_offset == 0 {
            return;
        }
        if self.current_offset % 16 != 0 {
            self.current_offset -= 8;
        }

        let entry = &mut func.blocks[0];
        // The first two instructions are always PUSH rbp; MOV rbp, rsp.
        entry.instructions.insert(
            2,
            MachineInst::new(
                Opcode::Add,
                vec![Operand::hreg(HwReg::Rsp)],
                vec![Operand::hreg(HwReg::Rsp), Operand::Imm(self.current_offset)],
            ),
        );
    }
}

/// The rsp adjustment that pops a call's pushed stack arguments, if the
/// given instruction is one.
fn pop_adjustment(inst: Option<&MachineInst>) -> i64 {
    match inst {
        Some(next)
            if next.opcode == Opcode::Add
                && next.outputs.first() == Some(&Operand::hreg(HwReg::Rsp)) =>
        {
            match next.inputs.get(1) {
                Some(Operand::Imm(v)) if *v > 0 => *v,
                _ => 0,
            }
        }
        _ => 0,
    }
}

/// Detach a vertex from a working copy of the graph.
fn remove_vertex(graph: &mut IndexMap<Reg, IndexSet<Reg>>, reg: Reg) {
    if let Some(neighbors) = graph.shift_remove(&reg) {
        for neighbor in neighbors {
            if let Some(set) = graph.get_mut(&neighbor) {
                set.shift_remove(&reg);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hreg(r: HwReg) -> Operand {
        Operand::hreg(r)
    }

    /// A function body with the fixed prologue and a return epilogue.
    fn with_frame(body: Vec<MachineInst>) -> MachineFunction {
        let mut func = MachineFunction::new("f".to_string());
        let entry = func.make_block();
        let mut insts = vec![
            MachineInst::new(Opcode::Push, vec![], vec![hreg(HwReg::Rbp)]),
            MachineInst::new(Opcode::MovRd, vec![hreg(HwReg::Rbp)], vec![hreg(HwReg::Rsp)]),
        ];
        insts.extend(body);
        insts.extend([
            MachineInst::new(Opcode::MovRd, vec![hreg(HwReg::Rsp)], vec![hreg(HwReg::Rbp)]),
            MachineInst::new(Opcode::Pop, vec![hreg(HwReg::Rbp)], vec![]),
            MachineInst::new(Opcode::Ret, vec![], vec![hreg(HwReg::Rax)]),
        ]);
        func.blocks[entry].instructions = insts;

        // Reserve the vreg ids used by the body.
        let max_vreg = func.blocks[entry]
            .instructions
            .iter()
            .flat_map(|i| i.outputs.iter().chain(&i.inputs))
            .filter_map(|o| match o {
                Operand::Vreg(id) => Some(*id + 1),
                _ => None,
            })
            .max()
            .unwrap_or(0);
        for _ in 0..max_vreg {
            func.make_vreg();
        }

        func
    }

    fn mov(dst: Operand, src: Operand) -> MachineInst {
        MachineInst::new(Opcode::MovRd, vec![dst], vec![src])
    }

    fn add(dst: Operand, src: Operand) -> MachineInst {
        MachineInst::new(Opcode::Add, vec![dst.clone()], vec![dst, src])
    }

    /// Every operand after allocation is a hardware register, an
    /// immediate, a symbol, a block, or rbp/rsp-relative memory.
    fn assert_fully_allocated(func: &MachineFunction) {
        for block in &func.blocks {
            for inst in &block.instructions {
                for operand in inst.outputs.iter().chain(&inst.inputs) {
                    assert!(
                        !operand.is_vreg() && !operand.is_stack_slot(),
                        "unallocated operand {} in {}",
                        operand,
                        inst
                    );
                }
            }
        }
    }

    #[test]
    fn test_interfering_registers_get_distinct_colors() {
        let v0 = Operand::Vreg(0);
        let v1 = Operand::Vreg(1);
        let v2 = Operand::Vreg(2);
        let mut func = with_frame(vec![
            mov(v0.clone(), Operand::Imm(5)),
            mov(v1.clone(), Operand::Imm(7)),
            mov(v2.clone(), v0.clone()),
            add(v2.clone(), v1.clone()),
            mov(hreg(HwReg::Rax), v2.clone()),
        ]);

        let alloc = RegAlloc::run(&mut func);

        assert!(alloc.spilled.is_empty());
        let c0 = alloc.coloring[&Reg::Virtual(0)];
        let c1 = alloc.coloring[&Reg::Virtual(1)];
        assert_ne!(c0, c1, "v0 and v1 are simultaneously live");
        assert_fully_allocated(&func);
    }

    #[test]
    fn test_coloring_respects_interference_graph() {
        let body: Vec<MachineInst> = (0..4)
            .map(|i| mov(Operand::Vreg(i), Operand::Imm(i as i64)))
            .chain((0..4).map(|i| add(Operand::Vreg((i + 1) % 4), Operand::Vreg(i))))
            .collect();
        let mut func = with_frame(body);

        let liveness = analyze(&func);
        let igraph = InterferenceGraph::build(&func, &liveness);
        let alloc = RegAlloc::run(&mut func);

        for (reg, neighbors) in &igraph.edges {
            for neighbor in neighbors {
                if let (Some(a), Some(b)) =
                    (alloc.coloring.get(reg), alloc.coloring.get(neighbor))
                {
                    assert_ne!(a, b, "{} and {} share a color", reg, neighbor);
                }
            }
        }
    }

    #[test]
    fn test_precolored_registers_keep_their_colors() {
        let v0 = Operand::Vreg(0);
        let mut func = with_frame(vec![
            mov(v0.clone(), hreg(HwReg::Rdi)),
            add(v0.clone(), Operand::Imm(2)),
            mov(hreg(HwReg::Rax), v0.clone()),
        ]);

        let alloc = RegAlloc::run(&mut func);

        assert_eq!(alloc.coloring[&Reg::Hardware(HwReg::Rax)], 0);
        assert_eq!(alloc.coloring[&Reg::Hardware(HwReg::Rdi)], 5);
        assert_eq!(alloc.coloring[&Reg::Hardware(HwReg::Rbp)], 6);
        assert_eq!(alloc.coloring[&Reg::Hardware(HwReg::Rsp)], 7);
    }

    #[test]
    fn test_virtual_registers_never_take_frame_registers() {
        // More simultaneously live registers than comfortable colors.
        let n = 12u32;
        let mut body: Vec<MachineInst> = (0..n)
            .map(|i| mov(Operand::Vreg(i), Operand::Imm(i as i64)))
            .collect();
        let acc = Operand::Vreg(n);
        body.push(mov(acc.clone(), Operand::Imm(0)));
        for i in 0..n {
            body.push(add(acc.clone(), Operand::Vreg(i)));
        }
        body.push(mov(hreg(HwReg::Rax), acc));
        let mut func = with_frame(body);

        let alloc = RegAlloc::run(&mut func);

        for (reg, &color) in &alloc.coloring {
            if matches!(reg, Reg::Virtual(_)) {
                assert_ne!(color, 6, "{} took rbp", reg);
                assert_ne!(color, 7, "{} took rsp", reg);
                assert!(color < AVAILABLE_COLORS);
            }
        }
        assert_fully_allocated(&func);
    }

    #[test]
    fn test_high_pressure_spills_and_frame_alignment() {
        // Twenty registers all live into the summation: more than the
        // palette, so several must spill to packed, aligned slots.
        let n = 20u32;
        let mut body: Vec<MachineInst> = (0..n)
            .map(|i| mov(Operand::Vreg(i), Operand::Imm(i as i64)))
            .collect();
        let acc = Operand::Vreg(n);
        body.push(mov(acc.clone(), Operand::Imm(0)));
        for i in 0..n {
            body.push(add(acc.clone(), Operand::Vreg(i)));
        }
        body.push(mov(hreg(HwReg::Rax), acc));
        let mut func = with_frame(body);

        let alloc = RegAlloc::run(&mut func);

        assert!(
            alloc.spilled.len() >= 5,
            "expected at least 5 spills, got {}",
            alloc.spilled.len()
        );

        // Slots are packed downward from -8 in steps of 8.
        let mut offsets: Vec<i64> = alloc.stack_offsets.values().copied().collect();
        offsets.sort_unstable();
        offsets.reverse();
        for (i, offset) in offsets.iter().enumerate() {
            assert_eq!(*offset, -8 * (i as i64 + 1));
        }

        // The final frame size is a multiple of 16, allocated right
        // after the fixed prologue.
        assert_eq!(alloc.current_offset % 16, 0);
        let entry = &func.blocks[0].instructions;
        assert_eq!(entry[2].opcode, Opcode::Add);
        assert_eq!(entry[2].outputs, vec![hreg(HwReg::Rsp)]);
        assert_eq!(entry[2].inputs[1], Operand::Imm(alloc.current_offset));

        assert_fully_allocated(&func);
    }

    #[test]
    fn test_spill_and_reload_share_a_slot() {
        let n = 20u32;
        let mut body: Vec<MachineInst> = (0..n)
            .map(|i| mov(Operand::Vreg(i), Operand::Imm(i as i64)))
            .collect();
        let acc = Operand::Vreg(n);
        body.push(mov(acc.clone(), Operand::Imm(0)));
        for i in 0..n {
            body.push(add(acc.clone(), Operand::Vreg(i)));
        }
        body.push(mov(hreg(HwReg::Rax), acc));
        let mut func = with_frame(body);

        let alloc = RegAlloc::run(&mut func);

        // Every spilled register got exactly one slot, and that slot got
        // exactly one frame offset.
        for slot in alloc.spilled.values() {
            assert!(
                alloc.stack_offsets.contains_key(slot),
                "spill slot {} never materialised",
                slot
            );
        }
    }

    #[test]
    fn test_caller_save_around_calls() {
        // v0 is live across the call and must be saved and restored with
        // matching rsp-relative offsets.
        let v0 = Operand::Vreg(0);
        let v1 = Operand::Vreg(1);
        let mut func = with_frame(vec![
            mov(v0.clone(), Operand::Imm(5)),
            MachineInst::new(
                Opcode::CallI,
                vec![hreg(HwReg::Rax)],
                vec![Operand::Sym("g".to_string())],
            ),
            mov(v1.clone(), hreg(HwReg::Rax)),
            add(v1.clone(), v0.clone()),
            mov(hreg(HwReg::Rax), v1.clone()),
        ]);

        let alloc = RegAlloc::run(&mut func);

        let insts = &func.blocks[0].instructions;
        let call = insts.iter().position(|i| i.is_call()).unwrap();

        // Immediately before: a save of the register holding v0.
        let save = &insts[call - 1];
        assert_eq!(save.opcode, Opcode::MovMd);
        assert_eq!(save.inputs[0], hreg(HwReg::Rsp));
        let saved_reg = save.inputs[1].clone();
        let saved_offset = save.inputs[2].clone();
        assert_eq!(saved_reg, Operand::hreg(HwReg::TABLE[alloc.coloring[&Reg::Virtual(0)]]));

        // Immediately after: the matching restore.
        let restore = &insts[call + 1];
        assert_eq!(restore.opcode, Opcode::MovRm);
        assert_eq!(restore.outputs[0], saved_reg);
        assert_eq!(restore.inputs[0], hreg(HwReg::Rsp));
        assert_eq!(restore.inputs[1], saved_offset);

        // The call's own result register is not saved around it.
        assert_ne!(saved_reg, hreg(HwReg::Rax));

        // Caller-save slots consumed frame space.
        assert!(alloc.current_offset <= -8);
        assert_eq!(alloc.current_offset % 16, 0);
    }

    #[test]
    fn test_no_frame_no_allocation() {
        let v0 = Operand::Vreg(0);
        let mut func = with_frame(vec![
            mov(v0.clone(), Operand::Imm(5)),
            mov(hreg(HwReg::Rax), v0),
        ]);

        let alloc = RegAlloc::run(&mut func);

        assert_eq!(alloc.current_offset, 0);
        // No frame adjustment was inserted after the prologue.
        let entry = &func.blocks[0].instructions;
        assert_eq!(entry[0].opcode, Opcode::Push);
        assert_eq!(entry[1].opcode, Opcode::MovRd);
        assert_ne!(entry[2].opcode, Opcode::Add);
    }
}
