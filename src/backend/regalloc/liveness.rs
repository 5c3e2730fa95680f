//! Liveness analysis and interference construction.
//!
//! Backward data flow over each function's CFG:
//!
//! ```text
//! live[b] = (∪_{s ∈ succ(b)} live[s]) − def[b] ∪ use[b]
//! ```
//!
//! iterated to a fixed point. Termination is guaranteed because the sets
//! only grow and are bounded by the finite register universe. Registers
//! are both virtual and hardware operands; immediates, stack locations
//! and labels do not participate.

use crate::backend::machine::{HwReg, MachineFunction, MachineInst, Reg};
use im::OrdSet;
use indexmap::{IndexMap, IndexSet};
use std::fmt::Write;

/// A set of registers. Persistent and ordered, so snapshots in the
/// backward walk are cheap and iteration is deterministic.
pub type RegSet = OrdSet<Reg>;

/// Per-block liveness facts, indexed by block id.
#[derive(Clone, Debug)]
pub struct Liveness {
    /// Registers written anywhere in the block
    pub definitions: Vec<RegSet>,
    /// Registers read before any write in the block
    pub uses: Vec<RegSet>,
    /// The fixed-point live sets
    pub live: Vec<RegSet>,
}

/// Compute per-block liveness for a function.
pub fn analyze(func: &MachineFunction) -> Liveness {
    let block_count = func.blocks.len();
    let mut definitions = vec![RegSet::new(); block_count];
    let mut uses = vec![RegSet::new(); block_count];

    for block in &func.blocks {
        let mut defined = RegSet::new();
        let mut used = RegSet::new();
        for inst in &block.instructions {
            for input in &inst.inputs {
                if let Some(reg) = input.reg() {
                    if !defined.contains(&reg) {
                        used.insert(reg);
                    }
                }
            }
            for output in &inst.outputs {
                if let Some(reg) = output.reg() {
                    defined.insert(reg);
                }
            }
        }
        definitions[block.id] = defined;
        uses[block.id] = used;
    }

    let mut live = vec![RegSet::new(); block_count];
    loop {
        let mut changed = false;
        for block in &func.blocks {
            let mut regs = RegSet::new();
            for succ in block.successors() {
                regs = regs.union(live[succ].clone());
            }
            regs = regs.relative_complement(definitions[block.id].clone());
            regs = uses[block.id].clone().union(regs);

            if live[block.id] != regs {
                live[block.id] = regs;
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }

    Liveness {
        definitions,
        uses,
        live,
    }
}

/// Registers live at the end of a block: the union of its successors'
/// fixed-point sets.
pub fn live_out(func: &MachineFunction, live: &[RegSet], block: usize) -> RegSet {
    let mut regs = RegSet::new();
    for succ in func.blocks[block].successors() {
        regs = regs.union(live[succ].clone());
    }
    regs
}

/// One backward step over an instruction: `live = (live − outputs) ∪ inputs`.
pub fn step(inst: &MachineInst, regs: &mut RegSet) {
    for output in &inst.outputs {
        if let Some(reg) = output.reg() {
            regs.remove(&reg);
        }
    }
    for input in &inst.inputs {
        if let Some(reg) = input.reg() {
            regs.insert(reg);
        }
    }
}

/// The undirected interference graph over every register appearing in a
/// function, with hardware registers precolored to their table index.
#[derive(Clone, Debug, Default)]
pub struct InterferenceGraph {
    pub edges: IndexMap<Reg, IndexSet<Reg>>,
    pub precolored: IndexMap<Reg, usize>,
}

impl InterferenceGraph {
    pub fn build(func: &MachineFunction, liveness: &Liveness) -> InterferenceGraph {
        let mut graph = InterferenceGraph::default();

        // Every register that appears at all is a vertex, even if it is
        // never live; defined-but-dead registers still need a color.
        for block in &func.blocks {
            for inst in &block.instructions {
                for operand in inst.outputs.iter().chain(&inst.inputs) {
                    if let Some(reg) = operand.reg() {
                        graph.edges.entry(reg).or_default();
                    }
                }
            }
        }

        for block in &func.blocks {
            let mut regs = live_out(func, &liveness.live, block.id);

            for inst in block.instructions.iter().rev() {
                // A call clobbers its result registers; anything live
                // across the call must not share their colors.
                if inst.is_call() {
                    for output in &inst.outputs {
                        if let Some(out) = output.reg() {
                            let across: Vec<Reg> = regs.iter().copied().collect();
                            for reg in across {
                                if reg != out {
                                    graph.add_edge(out, reg);
                                }
                            }
                        }
                    }
                }

                step(inst, &mut regs);

                // Everything live at this point interferes pairwise.
                let snapshot: Vec<Reg> = regs.iter().copied().collect();
                for i in 0..snapshot.len() {
                    for j in (i + 1)..snapshot.len() {
                        graph.add_edge(snapshot[i], snapshot[j]);
                    }
                }
            }
        }

        // Hardware registers that appear are precolored with their fixed
        // table index.
        for (index, hreg) in HwReg::TABLE.iter().enumerate() {
            let reg = Reg::Hardware(*hreg);
            if graph.edges.contains_key(&reg) {
                graph.precolored.insert(reg, index);
            }
        }

        // A clique between precolored vertices. Not needed for a correct
        // coloring; it keeps the printed graph fully connected on the
        // physical registers.
        let hregs: Vec<Reg> = graph.precolored.keys().copied().collect();
        for i in 0..hregs.len() {
            for j in (i + 1)..hregs.len() {
                graph.add_edge(hregs[i], hregs[j]);
            }
        }

        graph
    }

    pub fn add_edge(&mut self, a: Reg, b: Reg) {
        self.edges.entry(a).or_default().insert(b);
        self.edges.entry(b).or_default().insert(a);
    }

    pub fn neighbors(&self, reg: Reg) -> impl Iterator<Item = Reg> + '_ {
        self.edges
            .get(&reg)
            .into_iter()
            .flat_map(|set| set.iter().copied())
    }

    pub fn degree(&self, reg: Reg) -> usize {
        self.edges.get(&reg).map_or(0, |set| set.len())
    }

    pub fn interferes(&self, a: Reg, b: Reg) -> bool {
        self.edges.get(&a).is_some_and(|set| set.contains(&b))
    }

    /// Render the graph, a diagnostic aid.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for (reg, neighbors) in &self.edges {
            let mut names: Vec<String> =
                neighbors.iter().map(|n| format!("{}", n)).collect();
            names.sort();
            writeln!(out, "{}: {{{}}}", reg, names.join(", ")).unwrap();
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::machine::{MachineInst, Opcode, Operand};

    fn mov(dst: Operand, src: Operand) -> MachineInst {
        MachineInst::new(Opcode::MovRd, vec![dst], vec![src])
    }

    fn add(dst: Operand, src: Operand) -> MachineInst {
        MachineInst::new(Opcode::Add, vec![dst.clone()], vec![dst, src])
    }

    /// entry:   v0 = 1; cmp v0, 3; je then; jmp join
    /// then:    v1 = 2; jmp join
    /// join:    v2 = v0 + v1? -> modeled as v2 = v0; add v2, v1; ret
    fn branching_function() -> MachineFunction {
        let mut func = MachineFunction::new("f".to_string());
        let entry = func.make_block();
        let then = func.make_block();
        let join = func.make_block();

        let v0 = func.make_vreg();
        let v1 = func.make_vreg();
        let v2 = func.make_vreg();

        func.blocks[entry].instructions = vec![
            mov(v0.clone(), Operand::Imm(1)),
            mov(v1.clone(), Operand::Imm(5)),
            MachineInst::new(Opcode::Cmp, vec![], vec![v0.clone(), Operand::Imm(3)]),
            MachineInst::new(Opcode::Je, vec![], vec![Operand::Block(then)]),
            MachineInst::new(Opcode::Jmp, vec![], vec![Operand::Block(join)]),
        ];
        func.blocks[then].instructions = vec![
            mov(v1.clone(), Operand::Imm(2)),
            MachineInst::new(Opcode::Jmp, vec![], vec![Operand::Block(join)]),
        ];
        func.blocks[join].instructions = vec![
            mov(v2.clone(), v0.clone()),
            add(v2.clone(), v1.clone()),
            MachineInst::new(Opcode::Ret, vec![], vec![]),
        ];

        func
    }

    #[test]
    fn test_liveness_across_branches() {
        let func = branching_function();
        let liveness = analyze(&func);

        let v0 = Reg::Virtual(0);
        let v1 = Reg::Virtual(1);

        // v0 and v1 are used in the join block without a preceding
        // definition there, so both are live into it.
        assert!(liveness.uses[2].contains(&v0));
        assert!(liveness.uses[2].contains(&v1));
        assert!(liveness.live[2].contains(&v0));

        // They flow backward through both paths to the entry block's
        // live set.
        assert!(liveness.live[1].contains(&v0));
        assert!(live_out(&func, &liveness.live, 0).contains(&v0));
    }

    #[test]
    fn test_defs_kill_liveness() {
        let func = branching_function();
        let liveness = analyze(&func);

        // v1 is redefined in the then block before any use, so it is not
        // live into that block by way of it.
        assert!(liveness.definitions[1].contains(&Reg::Virtual(1)));
        assert!(!liveness.uses[1].contains(&Reg::Virtual(1)));
    }

    #[test]
    fn test_interference_of_simultaneously_live() {
        let func = branching_function();
        let liveness = analyze(&func);
        let graph = InterferenceGraph::build(&func, &liveness);

        // v0 and v1 are both live at the join block's first instruction.
        assert!(graph.interferes(Reg::Virtual(0), Reg::Virtual(1)));
        // v2 is born from v0 while v1 is still live.
        assert!(graph.interferes(Reg::Virtual(2), Reg::Virtual(1)));

        assert!(graph.degree(Reg::Virtual(1)) >= 2);
        assert!(graph.to_text().contains("%vreg1"));
    }

    #[test]
    fn test_precolored_hardware_registers() {
        let mut func = MachineFunction::new("f".to_string());
        let entry = func.make_block();
        let v0 = func.make_vreg();
        func.blocks[entry].instructions = vec![
            mov(v0.clone(), Operand::hreg(HwReg::Rdi)),
            add(v0.clone(), Operand::Imm(2)),
            mov(Operand::hreg(HwReg::Rax), v0.clone()),
            MachineInst::new(Opcode::Ret, vec![], vec![Operand::hreg(HwReg::Rax)]),
        ];

        let liveness = analyze(&func);
        let graph = InterferenceGraph::build(&func, &liveness);

        assert_eq!(
            graph.precolored.get(&Reg::Hardware(HwReg::Rax)),
            Some(&0)
        );
        assert_eq!(
            graph.precolored.get(&Reg::Hardware(HwReg::Rdi)),
            Some(&5)
        );
        // The precolored clique is present.
        assert!(graph.interferes(
            Reg::Hardware(HwReg::Rax),
            Reg::Hardware(HwReg::Rdi)
        ));
    }

    #[test]
    fn test_call_results_interfere_with_live_across() {
        // v0 is live across the call; the call defines rax.
        let mut func = MachineFunction::new("f".to_string());
        let entry = func.make_block();
        let v0 = func.make_vreg();
        let v1 = func.make_vreg();
        func.blocks[entry].instructions = vec![
            mov(v0.clone(), Operand::Imm(1)),
            MachineInst::new(
                Opcode::CallI,
                vec![Operand::hreg(HwReg::Rax)],
                vec![Operand::Sym("g".to_string())],
            ),
            mov(v1.clone(), Operand::hreg(HwReg::Rax)),
            add(v1.clone(), v0.clone()),
            MachineInst::new(Opcode::Ret, vec![], vec![]),
        ];

        let liveness = analyze(&func);
        let graph = InterferenceGraph::build(&func, &liveness);

        assert!(graph.interferes(Reg::Virtual(0), Reg::Hardware(HwReg::Rax)));
    }
}
