use crate::{BlockId, Value};
use std::fmt;

/// Why control left a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExitReason {
    /// Execution ran past the end of a block with no successor in the region.
    Fallthrough,
    /// A branch or jump targeted an address outside the region.
    BranchTarget,
    /// A register jump targeted an address that isn't the start of any block of the region.
    IndirectMiss,
    /// A likely branch was not taken and its fallthrough isn't part of the region.
    LikelyUntaken,
}

impl ExitReason {
    pub const ALL: [Self; 4] = [
        Self::Fallthrough,
        Self::BranchTarget,
        Self::IndirectMiss,
        Self::LikelyUntaken,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// `true` for exits where the region couldn't follow control any further and hands the
    /// rest of the work back to the interpreter. A `BranchTarget` exit is an ordinary transfer
    /// to a known address outside the region.
    pub fn is_deopt(self) -> bool {
        !matches!(self, Self::BranchTarget)
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Fallthrough => "fallthrough",
            Self::BranchTarget => "branch-target",
            Self::IndirectMiss => "indirect-miss",
            Self::LikelyUntaken => "likely-untaken",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Terminator {
    Jump(BlockId),
    /// Two way branch on an `i1`. `weights` are relative likelihoods of the true and false edge.
    Branch {
        cond: Value,
        if_true: BlockId,
        if_false: BlockId,
        weights: Option<(u32, u32)>,
    },
    /// Leaves the region, continuing guest execution at `pc` (an `i32`).
    Exit { pc: Value, reason: ExitReason },
}

impl Terminator {
    pub fn successors(&self) -> Vec<BlockId> {
        match *self {
            Self::Jump(target) => vec![target],
            Self::Branch {
                if_true, if_false, ..
            } => {
                if if_true == if_false {
                    vec![if_true]
                } else {
                    vec![if_true, if_false]
                }
            }
            Self::Exit { .. } => Vec::new(),
        }
    }

    pub fn operands(&self) -> Vec<Value> {
        match *self {
            Self::Jump(_) => Vec::new(),
            Self::Branch { cond, .. } => vec![cond],
            Self::Exit { pc, .. } => vec![pc],
        }
    }
}

impl fmt::Display for Terminator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Jump(target) => write!(f, "jump {target}"),
            Self::Branch {
                cond,
                if_true,
                if_false,
                weights,
            } => {
                write!(f, "br {cond}, {if_true}, {if_false}")?;
                if let Some((t, e)) = weights {
                    write!(f, " !weights({t}, {e})")?;
                }
                Ok(())
            }
            Self::Exit { pc, reason } => write!(f, "exit {pc} ({reason})"),
        }
    }
}
