use super::{BlockId, PhiNode, PhiReg};
use crate::analysis::{constant, ConstRegs, FpTouched, PrecisionCounts};
use crate::interp::TraceBlock;
use arrayvec::ArrayVec;
use mips_isa::{decode, Control, Instruction, RegRef, INSN_WIDTH};
use std::collections::BTreeSet;

/// Address of the synthetic block every region starts in. No guest instruction can be fetched from
/// it, since it isn't word aligned.
pub const ENTRY_ADDR: u32 = 0xffff_ffff;

/// The control transfer ending a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transfer {
    /// Index of the transfer in the block; its delay slot follows it.
    pub index: usize,
    pub addr: u32,
    pub insn: Instruction,
    pub control: Control,
}

impl Transfer {
    pub fn is_likely(&self) -> bool {
        matches!(self.control, Control::Branch { likely: true, .. })
    }
}

#[derive(Debug, Clone)]
pub struct BasicBlock {
    entry: u32,
    /// `(word, address)` pairs as traced.
    raw: Vec<(u32, u32)>,
    instructions: Vec<Instruction>,
    pub(super) successors: BTreeSet<BlockId>,
    pub(super) predecessors: BTreeSet<BlockId>,
    pub(super) idom: Option<BlockId>,
    pub(super) phis: Vec<PhiNode>,
    /// For blocks holding the delay slot of a likely branch: the branch target.
    patch_target: Option<u32>,
    /// Targets a register jump ending this block was observed to reach.
    pub(super) indirect_targets: BTreeSet<u32>,
    fp_touched: FpTouched,
}

impl BasicBlock {
    fn with_raw(entry: u32, raw: Vec<(u32, u32)>) -> Self {
        let mut block = Self {
            entry,
            raw,
            instructions: Vec::new(),
            successors: BTreeSet::new(),
            predecessors: BTreeSet::new(),
            idom: None,
            phis: Vec::new(),
            patch_target: None,
            indirect_targets: BTreeSet::new(),
            fp_touched: FpTouched::new(),
        };
        block.bind();
        block
    }

    /// The synthetic region entry.
    pub(super) fn new_entry() -> Self {
        Self::with_raw(ENTRY_ADDR, Vec::new())
    }

    pub fn from_trace(trace: &TraceBlock) -> Self {
        Self::with_raw(trace.entry, trace.words.clone())
    }

    /// A block that executes the delay slot `(word, addr)` of a likely branch and continues at the
    /// branch target.
    pub(super) fn new_likely_patch(delay: (u32, u32), target: u32) -> Self {
        let mut block = Self::with_raw(delay.1, vec![delay]);
        block.patch_target = Some(target);
        block
    }

    /// Decodes the raw words.
    fn bind(&mut self) {
        self.instructions = self.raw.iter().map(|&(word, _)| decode(word)).collect();
    }

    pub fn entry(&self) -> u32 {
        self.entry
    }

    pub fn is_region_entry(&self) -> bool {
        self.entry == ENTRY_ADDR
    }

    pub fn raw(&self) -> &[(u32, u32)] {
        &self.raw
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Address of the instruction at `index`.
    pub fn addr_of(&self, index: usize) -> u32 {
        self.entry.wrapping_add(index as u32 * INSN_WIDTH)
    }

    /// Address of the last instruction.
    pub fn exit_addr(&self) -> u32 {
        self.raw.last().map_or(self.entry, |&(_, addr)| addr)
    }

    /// Returns `true` if `addr` is the address of one of the block's instructions.
    pub fn contains(&self, addr: u32) -> bool {
        !self.is_empty() && self.raw.iter().any(|&(_, a)| a == addr)
    }

    pub fn is_likely_patch(&self) -> bool {
        self.patch_target.is_some()
    }

    pub fn patch_target(&self) -> Option<u32> {
        self.patch_target
    }

    pub fn successors(&self) -> &BTreeSet<BlockId> {
        &self.successors
    }

    pub fn predecessors(&self) -> &BTreeSet<BlockId> {
        &self.predecessors
    }

    pub fn idom(&self) -> Option<BlockId> {
        self.idom
    }

    pub fn phis(&self) -> &[PhiNode] {
        &self.phis
    }

    pub fn indirect_targets(&self) -> &BTreeSet<u32> {
        &self.indirect_targets
    }

    pub fn fp_touched(&self) -> &FpTouched {
        &self.fp_touched
    }

    /// Finds the control transfer ending the block. Only the second to last instruction can be
    /// one, the last is its delay slot.
    pub fn transfer(&self) -> Option<Transfer> {
        let index = self.len().checked_sub(2)?;
        let addr = self.addr_of(index);
        let insn = self.instructions[index];
        let control = insn.control(addr);
        control.is_transfer().then_some(Transfer {
            index,
            addr,
            insn,
            control,
        })
    }

    pub fn ends_in_transfer(&self) -> bool {
        self.transfer().is_some()
    }

    pub fn ends_in_likely(&self) -> bool {
        self.transfer().is_some_and(|transfer| transfer.is_likely())
    }

    /// The instructions executed whenever the block is: everything but the delay slot of a likely
    /// branch, which belongs to the block's patch block.
    pub fn body(&self) -> &[Instruction] {
        if self.ends_in_likely() {
            &self.instructions[..self.len() - 1]
        } else {
            &self.instructions
        }
    }

    /// Address execution continues at when the block doesn't end in a transfer.
    pub fn fallthrough(&self) -> Option<u32> {
        if self.ends_in_transfer() {
            return None;
        }
        Some(
            self.patch_target
                .unwrap_or_else(|| self.exit_addr().wrapping_add(INSN_WIDTH)),
        )
    }

    /// Every address control can leave the block for.
    pub fn static_targets(&self) -> Vec<u32> {
        match self.transfer() {
            Some(Transfer {
                control: Control::JumpReg,
                ..
            }) => self.indirect_targets.iter().copied().collect(),
            Some(transfer) => transfer.control.targets().to_vec(),
            None => self.fallthrough().into_iter().collect(),
        }
    }

    /// Number of instructions executed when control passes through the block. A likely branch's
    /// delay slot is counted by its patch block.
    pub fn instruction_count(&self) -> u64 {
        self.body().len() as u64
    }

    /// Runs the constant transfer function over the body, starting from `entry`.
    pub fn constant_registers(&self, entry: ConstRegs) -> ConstRegs {
        constant::compute_constant_registers(self.body(), self.entry, entry)
    }

    /// Recomputes which floating-point registers the body touches, and at what width.
    pub(super) fn compute_fp_touched(&mut self) -> &FpTouched {
        let mut touched = FpTouched::new();
        for insn in self.body() {
            for reg in insn.uses().into_iter().chain(insn.defs()) {
                if let RegRef::Fpr(freg, fmt) = reg {
                    touched.update(freg, fmt);
                }
            }
        }
        self.fp_touched = touched;
        &self.fp_touched
    }

    pub fn precision_counts(&self) -> PrecisionCounts {
        let mut counts = PrecisionCounts::default();
        for insn in self.body() {
            counts.add(insn.precision());
        }
        counts
    }

    /// Adds a phi for `reg`. Returns `false` if the block already has one.
    pub(super) fn add_phi(&mut self, reg: PhiReg) -> bool {
        if self.phis.iter().any(|phi| phi.reg == reg) {
            return false;
        }
        self.phis.push(PhiNode { reg });
        true
    }

    /// Moves the instructions starting at `addr` into a new block.
    pub(super) fn split_off(&mut self, addr: u32) -> BasicBlock {
        let index = self
            .raw
            .iter()
            .position(|&(_, a)| a == addr)
            .expect("split address outside of the block");
        let mut tail = Self::with_raw(addr, self.raw.split_off(index));
        self.instructions.truncate(index);
        tail.indirect_targets = std::mem::take(&mut self.indirect_targets);
        tail
    }

    /// Copies observed indirect targets of a block with the same code.
    pub(super) fn absorb_targets(&mut self, other: &BasicBlock) {
        self.indirect_targets
            .extend(other.indirect_targets.iter().copied());
    }

    pub(super) fn set_indirect_targets(&mut self, targets: impl IntoIterator<Item = u32>) {
        self.indirect_targets = targets.into_iter().collect();
    }

    /// Register references of the body, in execution order. Each instruction's reads come before
    /// its writes.
    pub(super) fn accesses(&self) -> impl Iterator<Item = Access> + '_ {
        self.body().iter().flat_map(|insn| {
            let uses = insn.uses().into_iter().map(Access::Read);
            let defs = mips_isa::effective_defs(insn.defs()).map(Access::Write);
            uses.chain(defs).collect::<ArrayVec<_, 6>>()
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Access {
    Read(RegRef),
    Write(RegRef),
}
