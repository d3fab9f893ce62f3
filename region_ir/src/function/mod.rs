mod builder;

pub use builder::FunctionBuilder;

use crate::{BlockId, Inst, Terminator, Ty, Value};
use std::fmt::{self, Write};

#[derive(Debug, Clone)]
pub struct Block {
    pub id: BlockId,
    pub name: String,
    /// Comment for the whole block, displayed above the label.
    pub comment: Option<String>,
    pub instructions: Vec<Inst>,
    /// (index, comment) pairs in ascending order. The comment is displayed before the instruction
    /// at that index, an index equal to `instructions.len()` places it before the terminator.
    pub comments: Vec<(usize, String)>,
    pub terminator: Option<Terminator>,
}

impl Block {
    fn new(id: BlockId, name: String) -> Self {
        Self {
            id,
            name,
            comment: None,
            instructions: Vec::new(),
            comments: Vec::new(),
            terminator: None,
        }
    }

    pub fn phis(&self) -> impl Iterator<Item = &Inst> {
        self.instructions.iter().take_while(|inst| inst.is_phi())
    }

    pub fn successors(&self) -> Vec<BlockId> {
        self.terminator
            .as_ref()
            .map(Terminator::successors)
            .unwrap_or_default()
    }
}

/// A compiled region: a single-entry graph of blocks in SSA form that only leaves through
/// [`Terminator::Exit`].
#[derive(Debug, Clone)]
pub struct Function {
    pub name: String,
    pub(crate) blocks: Vec<Block>,
    pub(crate) value_types: Vec<Ty>,
    pub(crate) entry: BlockId,
}

impl Function {
    pub fn entry(&self) -> BlockId {
        self.entry
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    // will panic if the id is not from this function
    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id.index()]
    }

    pub fn value_ty(&self, value: Value) -> Ty {
        self.value_types[value.index()]
    }

    pub fn value_count(&self) -> usize {
        self.value_types.len()
    }

    pub fn instruction_count(&self) -> usize {
        self.blocks.iter().map(|b| b.instructions.len() + 1).sum()
    }

    /// Returns the distinct predecessors of every block, indexed by block.
    pub fn predecessors(&self) -> Vec<Vec<BlockId>> {
        let mut preds = vec![Vec::new(); self.blocks.len()];
        for block in &self.blocks {
            for succ in block.successors() {
                let entry: &mut Vec<BlockId> = &mut preds[succ.index()];
                if !entry.contains(&block.id) {
                    entry.push(block.id);
                }
            }
        }
        preds
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "region {} {{", self.name)?;
        for block in &self.blocks {
            if let Some(comment) = &block.comment {
                for line in comment.lines() {
                    writeln!(f, ";{line}")?;
                }
            }
            write!(f, "{}:", block.id)?;
            if !block.name.is_empty() {
                write!(f, " ; {}", block.name)?;
            }
            f.write_char('\n')?;

            let mut comments = block.comments.iter().peekable();
            for (i, inst) in block.instructions.iter().enumerate() {
                while let Some((_, comment)) = comments.next_if(|(j, _)| i == *j) {
                    writeln!(f, "    ; {comment}")?;
                }
                f.write_str("    ")?;
                if let Some(dst) = inst.dst() {
                    write!(f, "{dst}:{} = ", self.value_ty(dst))?;
                }
                inst.fmt_rhs(f)?;
                f.write_char('\n')?;
            }
            for (_, comment) in comments {
                writeln!(f, "    ; {comment}")?;
            }
            match &block.terminator {
                Some(terminator) => writeln!(f, "    {terminator}")?,
                None => writeln!(f, "    <unterminated>")?,
            }
        }
        f.write_str("}\n")
    }
}
