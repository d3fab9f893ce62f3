//! Execution profile gathered by the interpreter: how often each block ran, the latest trace of
//! every block and the observed block to block transitions.

use crate::interp::TraceBlock;
use std::collections::{BTreeSet, HashMap, VecDeque};
use vec1::Vec1;

#[derive(Debug, Default, Clone)]
pub struct Profiler {
    counts: HashMap<u32, u64>,
    blocks: HashMap<u32, TraceBlock>,
    transitions: HashMap<u32, BTreeSet<u32>>,
}

impl Profiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `block` ran and control continued at `next`. Returns the block's execution
    /// count.
    pub fn record(&mut self, block: &TraceBlock, next: u32) -> u64 {
        let count = self.counts.entry(block.entry).or_default();
        *count += 1;
        let count = *count;
        if self.blocks.get(&block.entry) != Some(block) {
            self.blocks.insert(block.entry, block.clone());
        }
        self.transitions.entry(block.entry).or_default().insert(next);
        count
    }

    pub fn hotness_count(&self, addr: u32) -> u64 {
        self.counts.get(&addr).copied().unwrap_or(0)
    }

    pub fn block(&self, addr: u32) -> Option<&TraceBlock> {
        self.blocks.get(&addr)
    }

    /// Addresses control was observed to continue at after the block at `addr`.
    pub fn successors(&self, addr: u32) -> Vec<u32> {
        self.transitions
            .get(&addr)
            .map(|next| next.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Collects the traces of a region entered at `entry`: a breadth-first walk over observed
    /// transitions and static targets that have a recorded trace, bounded by `max_blocks`.
    pub fn discover(&self, entry: u32, max_blocks: usize) -> Option<Vec1<TraceBlock>> {
        let first = self.blocks.get(&entry)?;
        let mut traces = Vec1::new(first.clone());
        let mut seen = BTreeSet::from([entry]);
        let mut queue = VecDeque::from([entry]);
        while let Some(addr) = queue.pop_front() {
            let block = &self.blocks[&addr];
            let mut next: BTreeSet<u32> = self.successors(addr).into_iter().collect();
            match block.transfer() {
                Some((_, control)) => next.extend(control.targets()),
                None => {
                    next.insert(block.exit_addr().wrapping_add(mips_isa::INSN_WIDTH));
                }
            }
            for target in next {
                if traces.len() >= max_blocks {
                    return Some(traces);
                }
                let Some(trace) = self.blocks.get(&target) else {
                    continue;
                };
                if seen.insert(target) {
                    traces.push(trace.clone());
                    queue.push_back(target);
                }
            }
        }
        Some(traces)
    }
}
