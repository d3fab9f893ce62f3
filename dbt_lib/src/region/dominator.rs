use super::{BlockId, Region};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone)]
pub struct DominatorTree {
    entry_block: BlockId,
    /// Maps each block to its immediate dominator (idom).
    immediate_dominators: BTreeMap<BlockId, Option<BlockId>>,
    /// Maps each block to the blocks it is the idom of.
    children: BTreeMap<BlockId, BTreeSet<BlockId>>,
}

impl DominatorTree {
    /// Computes the tree for the blocks reachable from the region entry.
    pub fn build_from(region: &Region) -> Self {
        let entry = region.entry_block_id();
        let all: BTreeSet<BlockId> = region.blocks().map(|(id, _)| id).collect();

        // dom(b) is b plus the intersection of dom(p) over its predecessors p, iterated to a fixed
        // point. Quadratic, regions are small.
        let mut dom: BTreeMap<BlockId, BTreeSet<BlockId>> = all
            .iter()
            .map(|&id| {
                let init = if id == entry {
                    BTreeSet::from([entry])
                } else {
                    all.clone()
                };
                (id, init)
            })
            .collect();
        loop {
            let mut stable = true;
            for &block in all.iter().filter(|&&b| b != entry) {
                let mut preds = region[block].predecessors().iter();
                let Some(first) = preds.next() else {
                    continue;
                };
                let mut meet = dom[first].clone();
                for pred in preds {
                    meet = meet.intersection(&dom[pred]).copied().collect();
                }
                meet.insert(block);
                if meet != dom[&block] {
                    dom.insert(block, meet);
                    stable = false;
                }
            }
            if stable {
                break;
            }
        }

        // Strict dominators form a chain, the idom is the one deepest in it.
        let mut immediate_dominators = BTreeMap::new();
        let mut children: BTreeMap<_, _> = all.iter().map(|&id| (id, BTreeSet::new())).collect();
        for (&block, doms) in &dom {
            let idom = doms
                .iter()
                .copied()
                .filter(|&d| d != block)
                .max_by_key(|d| dom[d].len());
            immediate_dominators.insert(block, idom);
            if let Some(idom) = idom {
                children.entry(idom).or_default().insert(block);
            }
        }

        Self {
            entry_block: entry,
            immediate_dominators,
            children,
        }
    }

    pub fn entry_block(&self) -> BlockId {
        self.entry_block
    }

    /// Returns the immediate dominator (idom) of the block: the unique block that strictly
    /// dominates it but no other strict dominator of it. Only the entry block has none.
    pub fn immediate_dominator(&self, block: BlockId) -> Option<BlockId> {
        self.immediate_dominators.get(&block).copied().flatten()
    }

    /// The blocks `block` is the immediate dominator of, in id order.
    pub fn children(&self, block: BlockId) -> impl Iterator<Item = BlockId> + '_ {
        self.children.get(&block).into_iter().flatten().copied()
    }

    /// Returns an iterator over the block's dominators, starting from the block itself.
    pub fn dominators(&self, block: BlockId) -> impl Iterator<Item = BlockId> + '_ {
        Dominators {
            tree: self,
            current: Some(block),
        }
    }

    pub fn dominates(&self, dominator: BlockId, dominated: BlockId) -> bool {
        self.dominators(dominated).any(|block| block == dominator)
    }

    pub fn dfs_preorder(&self) -> DominatorTreeDfsPreorder<'_> {
        DominatorTreeDfsPreorder {
            tree: self,
            stack: vec![self.entry_block],
        }
    }

    /// For every block, the blocks where its dominance ends: successors of blocks it dominates
    /// that it doesn't strictly dominate itself.
    pub fn dominance_frontiers(&self, region: &Region) -> BTreeMap<BlockId, BTreeSet<BlockId>> {
        let mut frontiers: BTreeMap<BlockId, BTreeSet<BlockId>> =
            region.blocks().map(|(id, _)| (id, BTreeSet::new())).collect();

        for (block_id, block) in region.blocks() {
            if block.predecessors().len() < 2 {
                continue;
            }
            let Some(idom) = self.immediate_dominator(block_id) else {
                continue;
            };
            for &pred in block.predecessors() {
                let mut runner = Some(pred);
                while let Some(current) = runner.filter(|&r| r != idom) {
                    frontiers.entry(current).or_default().insert(block_id);
                    runner = self.immediate_dominator(current);
                }
            }
        }

        frontiers
    }
}

#[derive(Debug)]
struct Dominators<'a> {
    tree: &'a DominatorTree,
    current: Option<BlockId>,
}

impl Iterator for Dominators<'_> {
    type Item = BlockId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.current.take()?;
        self.current = self.tree.immediate_dominator(current);
        Some(current)
    }
}

#[derive(Debug)]
pub struct DominatorTreeDfsPreorder<'a> {
    tree: &'a DominatorTree,
    stack: Vec<BlockId>,
}

impl Iterator for DominatorTreeDfsPreorder<'_> {
    type Item = BlockId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.stack.pop()?;
        self.stack.extend(self.tree.children[&current].iter().rev());
        Some(current)
    }
}
