//! The region CFG: guest basic blocks discovered from profiled traces, the edges between them,
//! and the block surgery (splitting, likely-branch patching, pruning) that prepares the graph for
//! SSA construction.

mod block;
mod dominator;
mod phi;


pub use block::{BasicBlock, Transfer, ENTRY_ADDR};
pub use dominator::{DominatorTree, DominatorTreeDfsPreorder};
pub use phi::{place_phis, PhiNode, PhiReg, RegisterUsage};

use crate::analysis::{FpTouched, PrecisionCounts};
use crate::interp::TraceBlock;
use generational_arena::{Arena, Index as ArenaIndex};
use mips_isa::{Control, INSN_WIDTH};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockId(ArenaIndex);

#[derive(Debug, Clone)]
pub struct Region {
    entry_addr: u32,
    entry_block: BlockId,
    blocks: Arena<BasicBlock>,
    /// Guest blocks by entry address. Neither the synthetic entry nor patch blocks are in here.
    by_addr: BTreeMap<u32, BlockId>,
    dominator_tree: Option<DominatorTree>,
    fp_touched: FpTouched,
}

impl Region {
    /// Creates a region entered at `entry_addr`, holding only the synthetic entry block.
    pub fn new(entry_addr: u32) -> Self {
        let mut blocks = Arena::new();
        let entry_block = BlockId(blocks.insert(BasicBlock::new_entry()));
        Self {
            entry_addr,
            entry_block,
            blocks,
            by_addr: BTreeMap::new(),
            dominator_tree: None,
            fp_touched: FpTouched::new(),
        }
    }

    /// Builds the blocks of `traces`, the first of which is the region entry, and the entry edge.
    /// `indirect_targets` gives the observed successors of a block ending in a register jump.
    pub fn from_traces(
        traces: &[TraceBlock],
        mut indirect_targets: impl FnMut(u32) -> Vec<u32>,
    ) -> Self {
        let entry_addr = traces.first().map_or(ENTRY_ADDR, |trace| trace.entry);
        let mut region = Self::new(entry_addr);
        for trace in traces {
            if trace.is_empty() || region.by_addr.contains_key(&trace.entry) {
                continue;
            }
            let mut block = BasicBlock::from_trace(trace);
            if let Some(Transfer {
                control: Control::JumpReg,
                ..
            }) = block.transfer()
            {
                block.set_indirect_targets(indirect_targets(trace.entry));
            }
            region.insert_block(block);
        }
        if let Some(&first) = region.by_addr.get(&entry_addr) {
            region.add_successor(region.entry_block, first);
        }
        region
    }

    pub fn entry_addr(&self) -> u32 {
        self.entry_addr
    }

    pub fn entry_block_id(&self) -> BlockId {
        self.entry_block
    }

    /// The first guest block.
    pub fn first_block(&self) -> Option<BlockId> {
        self.by_addr.get(&self.entry_addr).copied()
    }

    /// Number of blocks, including the synthetic entry.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn get(&self, block: BlockId) -> Option<&BasicBlock> {
        self.blocks.get(block.0)
    }

    /// Returns an iterator over all blocks in the region.
    pub fn blocks(&self) -> impl Iterator<Item = (BlockId, &BasicBlock)> {
        self.blocks.iter().map(|(idx, bb)| (BlockId(idx), bb))
    }

    /// The guest block starting at `addr`.
    pub fn block_at(&self, addr: u32) -> Option<BlockId> {
        self.by_addr.get(&addr).copied()
    }

    pub fn insert_block(&mut self, block: BasicBlock) -> BlockId {
        self.dominator_tree = None;
        let entry = block.entry();
        let is_guest_block = !block.is_likely_patch() && !block.is_region_entry();
        let id = BlockId(self.blocks.insert(block));
        if is_guest_block {
            self.by_addr.insert(entry, id);
        }
        id
    }

    /// Removes a block and every edge touching it.
    pub fn remove_block(&mut self, id: BlockId) -> BasicBlock {
        let succs: Vec<_> = self[id].successors.iter().copied().collect();
        for succ in succs {
            self.del_successor(id, succ);
        }
        let preds: Vec<_> = self[id].predecessors.iter().copied().collect();
        for pred in preds {
            self.del_successor(pred, id);
        }
        let block = self
            .blocks
            .remove(id.0)
            .expect("removing a block that is not in the region");
        if self.by_addr.get(&block.entry()) == Some(&id) {
            self.by_addr.remove(&block.entry());
        }
        block
    }

    /// Adds the edge `from -> to`, keeping both adjacency sets in sync.
    pub fn add_successor(&mut self, from: BlockId, to: BlockId) {
        self.dominator_tree = None;
        self[from].successors.insert(to);
        self[to].predecessors.insert(from);
    }

    /// Removes the edge `from -> to`. Panics if there is no such edge.
    pub fn del_successor(&mut self, from: BlockId, to: BlockId) {
        self.dominator_tree = None;
        assert!(
            self[from].successors.remove(&to),
            "removing an edge that doesn't exist"
        );
        self[to].predecessors.remove(&from);
    }

    /// Adds the edges from `id` to every region block control can reach from it.
    pub fn add_within_region_edges(&mut self, id: BlockId) {
        for target in self[id].static_targets() {
            if let Some(succ) = self.block_at(target) {
                self.add_successor(id, succ);
            }
        }
    }

    /// Checks that every successor of `id` is one the block's code can reach. A patch block
    /// stands in for the branch target it continues at.
    pub fn check_plausible_successors(&self, id: BlockId) -> bool {
        let block = &self[id];
        let targets = block.static_targets();
        if block.is_region_entry() {
            return block
                .successors
                .iter()
                .all(|&succ| self[succ].entry() == self.entry_addr);
        }
        block.successors.iter().all(|&succ| {
            let succ = &self[succ];
            let addr = succ.patch_target().unwrap_or(succ.entry());
            targets.contains(&addr)
        })
    }

    /// Splits `id` so that a new block starts at `addr` and returns the new block. The new block
    /// takes over the outgoing edges, and `id` falls through to it.
    pub fn split_at(&mut self, id: BlockId, addr: u32) -> BlockId {
        let block = &self[id];
        assert!(
            !block.is_likely_patch() && !block.is_region_entry(),
            "only guest blocks can be split"
        );
        assert!(
            block.entry() < addr && block.contains(addr),
            "split address {addr:#010x} is not inside the block"
        );
        let tail = self[id].split_off(addr);
        let tail_id = self.insert_block(tail);
        let succs: Vec<_> = self[id].successors.iter().copied().collect();
        for succ in succs {
            self.del_successor(id, succ);
            self.add_successor(tail_id, succ);
        }
        self.add_successor(id, tail_id);
        trace!("split block at {addr:#010x}");
        tail_id
    }

    /// Finds a pair of guest blocks where the second starts inside the first, at an instruction
    /// that isn't a delay slot.
    fn find_overlap(&self) -> Option<(BlockId, BlockId)> {
        self.by_addr.iter().find_map(|(&addr, &inner)| {
            let (_, &outer) = self.by_addr.range(..addr).rev().find(|(_, &outer)| {
                let block = &self[outer];
                block.contains(addr) && !self.is_delay_slot(outer, addr)
            })?;
            Some((outer, inner))
        })
    }

    fn is_delay_slot(&self, id: BlockId, addr: u32) -> bool {
        let block = &self[id];
        let index = (addr.wrapping_sub(block.entry()) / INSN_WIDTH) as usize;
        index > 0 && block.instructions()[index - 1].has_delay_slot()
    }

    /// Splits blocks that contain the entry of another block. When the tail has the same code as
    /// that block the two are merged, otherwise the block at the address is kept and the tail
    /// dropped. Returns the number of splits.
    pub fn split_overlapping_blocks(&mut self) -> usize {
        let mut splits = 0;
        while let Some((outer, inner)) = self.find_overlap() {
            let addr = self[inner].entry();
            // The tail replaces `inner` in the address map.
            self.by_addr.remove(&addr);
            let tail = self.split_at(outer, addr);
            splits += 1;
            if self[tail].raw() == self[inner].raw() {
                let preds: Vec<_> = self[inner]
                    .predecessors
                    .iter()
                    .copied()
                    .filter(|&pred| pred != inner)
                    .collect();
                let duplicate = self.remove_block(inner);
                self[tail].absorb_targets(&duplicate);
                for pred in preds {
                    self.add_successor(pred, tail);
                }
                self.add_within_region_edges(tail);
            } else {
                self.remove_block(tail);
                self.by_addr.insert(addr, inner);
                self.add_successor(outer, inner);
            }
        }
        splits
    }

    /// Moves the delay slot of the likely branch ending `id` into a patch block on the taken edge,
    /// and returns the patch block.
    pub fn patch_likely(&mut self, id: BlockId) -> BlockId {
        let Some(Transfer {
            control: Control::Branch {
                taken, not_taken, ..
            },
            ..
        }) = self[id].transfer().filter(Transfer::is_likely)
        else {
            panic!("patching a block that doesn't end in a likely branch");
        };
        let delay = *self[id]
            .raw()
            .last()
            .expect("a block with a transfer has a delay slot");
        let patch = self.insert_block(BasicBlock::new_likely_patch(delay, taken));
        if let Some(target) = self.block_at(taken) {
            if self[id].successors.contains(&target) {
                if taken != not_taken {
                    self.del_successor(id, target);
                }
                self.add_successor(patch, target);
            }
        }
        self.add_successor(id, patch);
        patch
    }

    /// Adds patch blocks for all likely branches. Returns how many were added.
    pub fn patch_likely_branches(&mut self) -> usize {
        let likely: Vec<_> = self
            .blocks()
            .filter(|(_, block)| !block.is_likely_patch() && block.ends_in_likely())
            .map(|(id, _)| id)
            .collect();
        for &id in &likely {
            self.patch_likely(id);
        }
        likely.len()
    }

    /// Removes blocks that can't be reached from the entry. Returns how many were removed.
    pub fn prune_unreachable(&mut self) -> usize {
        let mut reachable = BTreeSet::from([self.entry_block]);
        let mut stack = vec![self.entry_block];
        while let Some(id) = stack.pop() {
            for &succ in &self[id].successors {
                if reachable.insert(succ) {
                    stack.push(succ);
                }
            }
        }
        let unreachable: Vec<_> = self
            .blocks()
            .map(|(id, _)| id)
            .filter(|id| !reachable.contains(id))
            .collect();
        for &id in &unreachable {
            self.remove_block(id);
        }
        unreachable.len()
    }

    /// Computes the dominator tree and records every block's immediate dominator.
    pub fn compute_dominators(&mut self) -> &DominatorTree {
        let tree = DominatorTree::build_from(self);
        for (idx, block) in self.blocks.iter_mut() {
            block.idom = tree.immediate_dominator(BlockId(idx));
        }
        self.dominator_tree.insert(tree)
    }

    pub fn dominator_tree(&self) -> Option<&DominatorTree> {
        self.dominator_tree.as_ref()
    }

    /// Returns `true` if `a` dominates `b`, following the recorded immediate dominators.
    pub fn dominates(&self, a: BlockId, b: BlockId) -> bool {
        let mut current = Some(b);
        while let Some(block) = current {
            if block == a {
                return true;
            }
            current = self[block].idom;
        }
        false
    }

    /// Recomputes the floating-point usage of every block and of the region as a whole.
    pub fn compute_fp_usage(&mut self) -> &FpTouched {
        let mut region = FpTouched::new();
        for (_, block) in self.blocks.iter_mut() {
            region.merge(block.compute_fp_touched());
        }
        self.fp_touched = region;
        &self.fp_touched
    }

    pub fn fp_touched(&self) -> &FpTouched {
        &self.fp_touched
    }

    pub fn precision_counts(&self) -> PrecisionCounts {
        let mut counts = PrecisionCounts::default();
        for (_, block) in self.blocks() {
            counts.merge(&block.precision_counts());
        }
        counts
    }

    /// Number of guest instructions in the region, counting each address once.
    pub fn guest_instruction_count(&self) -> usize {
        let addrs: BTreeSet<u32> = self
            .blocks()
            .flat_map(|(_, block)| block.raw().iter().map(|&(_, addr)| addr))
            .collect();
        addrs.len()
    }

    pub fn has_indirect_jumps(&self) -> bool {
        self.blocks().any(|(_, block)| {
            matches!(
                block.transfer(),
                Some(Transfer {
                    control: Control::JumpReg,
                    ..
                })
            )
        })
    }

    pub fn has_likely_branches(&self) -> bool {
        self.blocks()
            .any(|(_, block)| block.is_likely_patch() || block.ends_in_likely())
    }

    /// A short name for a block, for logs and IR block names.
    pub fn block_name(&self, id: BlockId) -> String {
        let block = &self[id];
        if block.is_region_entry() {
            "ENTRY".to_owned()
        } else if block.is_likely_patch() {
            format!("patch_{:08x}", block.entry())
        } else {
            format!("bb_{:08x}", block.entry())
        }
    }
}

impl std::ops::Index<BlockId> for Region {
    type Output = BasicBlock;

    fn index(&self, index: BlockId) -> &Self::Output {
        &self.blocks[index.0]
    }
}

impl std::ops::IndexMut<BlockId> for Region {
    fn index_mut(&mut self, index: BlockId) -> &mut Self::Output {
        &mut self.blocks[index.0]
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "region {:#010x} ({} blocks)",
            self.entry_addr,
            self.blocks.len()
        )?;
        let mut ids: Vec<_> = self.blocks().map(|(id, _)| id).collect();
        ids.sort_by_key(|&id| (!self[id].is_region_entry(), self[id].entry(), id));
        for id in ids {
            let block = &self[id];
            write!(f, "{}:", self.block_name(id))?;
            if let Some(idom) = block.idom {
                write!(f, " ; idom {}", self.block_name(idom))?;
            }
            writeln!(f)?;
            for phi in &block.phis {
                writeln!(f, "    phi {}", phi.reg)?;
            }
            for (insn, &(_, addr)) in block.instructions().iter().zip(block.raw()) {
                writeln!(f, "    {addr:08x}  {insn}")?;
            }
            let succs: Vec<_> = block
                .successors
                .iter()
                .map(|&succ| self.block_name(succ))
                .collect();
            writeln!(f, "    -> [{}]", succs.join(", "))?;
        }
        Ok(())
    }
}
