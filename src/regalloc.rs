//! Per-function, single-pass linear-scan register allocation over a fixed
//! pool of six temporary integer registers. No spilling, no coalescing, no
//! live-range splitting — exhausting the pool is fatal.

use std::collections::HashMap;

use crate::ir::{Instr, IrFunc, Op, VReg};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PhysReg {
    R10,
    R11,
    R12,
    R13,
    R14,
    R15,
}

impl PhysReg {
    pub fn name64(self) -> &'static str {
        match self {
            PhysReg::R10 => "r10",
            PhysReg::R11 => "r11",
            PhysReg::R12 => "r12",
            PhysReg::R13 => "r13",
            PhysReg::R14 => "r14",
            PhysReg::R15 => "r15",
        }
    }

    pub fn name8(self) -> &'static str {
        match self {
            PhysReg::R10 => "r10b",
            PhysReg::R11 => "r11b",
            PhysReg::R12 => "r12b",
            PhysReg::R13 => "r13b",
            PhysReg::R14 => "r14b",
            PhysReg::R15 => "r15b",
        }
    }
}

/// The fixed pool, in allocation order. RAX/RDI/RSI/RDX/RCX/R8/R9 are
/// reserved for ABI plumbing and are never handed out here.
const POOL: [PhysReg; 6] = [
    PhysReg::R10,
    PhysReg::R11,
    PhysReg::R12,
    PhysReg::R13,
    PhysReg::R14,
    PhysReg::R15,
];

pub struct RegAlloc {
    free: Vec<PhysReg>, // LIFO: last freed is popped first
    assigned: HashMap<VReg, PhysReg>,
    last_use: HashMap<VReg, usize>,
}

impl RegAlloc {
    /// Build an allocator for `func`, pre-computing each VReg's last-use
    /// instruction index over the whole instruction stream.
    pub fn for_function(func: &IrFunc) -> Self {
        let mut last_use = HashMap::new();
        for (pos, instr) in func.instrs.iter().enumerate() {
            for used in referenced_vregs(instr) {
                last_use.insert(used, pos);
            }
        }
        RegAlloc {
            free: POOL.to_vec(),
            assigned: HashMap::new(),
            last_use,
        }
    }

    /// Release every VReg whose last use precedes `pos`, returning its
    /// register to the free pool.
    pub fn expire_at(&mut self, pos: usize) {
        let expired: Vec<VReg> = self
            .assigned
            .keys()
            .filter(|v| self.last_use.get(v).is_some_and(|&lu| lu < pos))
            .copied()
            .collect();
        for v in expired {
            if let Some(reg) = self.assigned.remove(&v) {
                self.free.push(reg);
            }
        }
    }

    /// Returns `v`'s existing assignment, or binds a fresh one from the
    /// free pool. Fatal (returns `Err`) if the pool is exhausted.
    pub fn alloc(&mut self, v: VReg) -> Result<PhysReg, String> {
        if let Some(&reg) = self.assigned.get(&v) {
            return Ok(reg);
        }
        let reg = self
            .free
            .pop()
            .ok_or_else(|| "register allocator exhausted its fixed pool".to_string())?;
        self.assigned.insert(v, reg);
        Ok(reg)
    }

    pub fn assignment(&self, v: VReg) -> Option<PhysReg> {
        self.assigned.get(&v).copied()
    }

    pub fn last_use_of(&self, v: VReg) -> Option<usize> {
        self.last_use.get(&v).copied()
    }
}

fn referenced_vregs(instr: &Instr) -> impl Iterator<Item = VReg> + '_ {
    instr
        .s1
        .into_iter()
        .chain(instr.s2)
        .chain(instr.t)
        .chain(instr.args.iter().copied())
}

/// True if no two VRegs with overlapping live ranges (their definition
/// index through `last_use`) were ever handed the same physical register —
/// replayed after a full run for testing allocator safety.
pub fn verify_no_overlap(func: &IrFunc, alloc: &RegAlloc) -> bool {
    let mut def_index: HashMap<VReg, usize> = HashMap::new();
    for (pos, instr) in func.instrs.iter().enumerate() {
        if let Some(t) = instr.t {
            def_index.entry(t).or_insert(pos);
        }
        if instr.op == Op::FrameAddr || instr.op == Op::MovImm || instr.op == Op::LeaString {
            if let Some(t) = instr.t {
                def_index.entry(t).or_insert(pos);
            }
        }
    }
    let mut ranges: Vec<(VReg, usize, usize)> = Vec::new();
    for (&v, &def) in &def_index {
        let Some(last) = alloc.last_use_of(v) else { continue };
        ranges.push((v, def, last));
    }
    for i in 0..ranges.len() {
        for j in (i + 1)..ranges.len() {
            let (v1, s1, e1) = ranges[i];
            let (v2, s2, e2) = ranges[j];
            let overlap = s1 <= e2 && s2 <= e1;
            if overlap {
                if let (Some(r1), Some(r2)) = (alloc.assignment(v1), alloc.assignment(v2)) {
                    if r1 == r2 {
                        return false;
                    }
                }
            }
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binder::{Binder, ImportLoader, ImportedFunction};
    use crate::ir::IrBuilder;
    use crate::parser::Parser;

    struct NoImports;
    impl ImportLoader for NoImports {
        fn load(&mut self, module_name: &str) -> Result<Vec<ImportedFunction>, String> {
            Err(format!("unexpected import of '{}'", module_name))
        }
    }

    fn lower(src: &str) -> crate::ir::IrModule {
        let (ast, root) = Parser::new(src).unwrap().parse().unwrap();
        let bound = Binder::new(&ast).bind_module(root, &mut NoImports).unwrap();
        IrBuilder::new(&ast, bound).lower_module(root).unwrap()
    }

    fn run_allocation(func: &IrFunc) -> RegAlloc {
        let mut alloc = RegAlloc::for_function(func);
        for (pos, instr) in func.instrs.iter().enumerate() {
            alloc.expire_at(pos);
            for used in referenced_vregs(instr) {
                alloc.alloc(used).unwrap();
            }
        }
        alloc
    }

    #[test]
    fn allocator_frees_registers_after_last_use() {
        let module = lower("fn main() { return (1 + 2) * 3 - 4 / 2 + 7 % 4; }");
        let func = &module.functions[0];
        let alloc = run_allocation(func);
        assert!(verify_no_overlap(func, &alloc));
    }

    #[test]
    fn call_with_more_live_args_than_registers_exhausts_the_pool() {
        // Every argument vreg stays live until the CALL instruction
        // consumes it, so seven simultaneous arguments need seven
        // registers against a pool of six.
        let module = lower(
            "fn f(a, b, c, d, e, g, h) { return a; } \
             fn main() { return f(1, 2, 3, 4, 5, 6, 7); }",
        );
        let func = module.functions.iter().find(|f| f.name == "main").unwrap();
        let mut alloc = RegAlloc::for_function(func);
        let mut failed = false;
        for (pos, instr) in func.instrs.iter().enumerate() {
            alloc.expire_at(pos);
            for used in referenced_vregs(instr) {
                if alloc.alloc(used).is_err() {
                    failed = true;
                }
            }
        }
        assert!(failed, "expected the allocator to exhaust its pool");
    }

    #[test]
    fn reused_assignment_is_idempotent() {
        let module = lower("fn main() { return 1; }");
        let func = &module.functions[0];
        let mut alloc = RegAlloc::for_function(func);
        let v = func.instrs[0].t.unwrap();
        let first = alloc.alloc(v).unwrap();
        let second = alloc.alloc(v).unwrap();
        assert_eq!(first, second);
    }
}
