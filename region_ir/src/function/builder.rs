use super::{Block, Function};
use crate::{
    BinOp, BlockId, CastOp, ExitReason, FloatCC, GuestLoc, Inst, IntCC, MemWidth, Terminator, Ty,
    UnOp, Value,
};
use std::collections::HashMap;

/// Incrementally builds a [`Function`]. Instructions are appended to the current block, which can
/// be switched freely. Appending to a block that is already terminated places the instruction
/// before the terminator.
pub struct FunctionBuilder {
    function: Function,
    block: Option<BlockId>,
    phi_sites: HashMap<Value, (BlockId, usize)>,
}

impl FunctionBuilder {
    /// Creates a builder whose current block is the entry block of the new function.
    pub fn new(name: impl Into<String>) -> Self {
        let entry = BlockId(0);
        Self {
            function: Function {
                name: name.into(),
                blocks: vec![Block::new(entry, "entry".to_owned())],
                value_types: Vec::new(),
                entry,
            },
            block: Some(entry),
            phi_sites: HashMap::new(),
        }
    }

    pub fn entry_block(&self) -> BlockId {
        self.function.entry
    }

    pub fn declare_block(&mut self, name: impl Into<String>) -> BlockId {
        let id = BlockId(self.function.blocks.len() as u32);
        self.function.blocks.push(Block::new(id, name.into()));
        id
    }

    // will panic if the block was not declared by this builder
    pub fn start_block(&mut self, block: BlockId) {
        assert!(block.index() < self.function.blocks.len());
        self.block = Some(block);
    }

    pub fn current_block(&self) -> Option<BlockId> {
        self.block
    }

    pub fn is_block_terminated(&self) -> bool {
        self.block
            .is_some_and(|block| self.function.block(block).terminator.is_some())
    }

    pub fn block_comment_mut(&mut self, block: BlockId) -> &mut Option<String> {
        &mut self.function.blocks[block.index()].comment
    }

    /// Adds a comment before the next instruction of the current block.
    pub fn add_comment(&mut self, comment: impl Into<String>) {
        let block = self.current_mut();
        let index = block.instructions.len();
        block.comments.push((index, comment.into()));
    }

    pub fn value_ty(&self, value: Value) -> Ty {
        self.function.value_ty(value)
    }

    fn new_value(&mut self, ty: Ty) -> Value {
        let value = Value(self.function.value_types.len() as u32);
        self.function.value_types.push(ty);
        value
    }

    // will panic if there is no current block
    fn current_mut(&mut self) -> &mut Block {
        let block = self.block.expect("no current block");
        &mut self.function.blocks[block.index()]
    }

    fn push(&mut self, inst: Inst) {
        self.current_mut().instructions.push(inst);
    }

    pub fn iconst(&mut self, ty: Ty, bits: u64) -> Value {
        let dst = self.new_value(ty);
        self.push(Inst::Const {
            dst,
            bits: bits & ty.mask(),
        });
        dst
    }

    pub fn f32const(&mut self, value: f32) -> Value {
        let dst = self.new_value(Ty::F32);
        self.push(Inst::Const {
            dst,
            bits: value.to_bits() as u64,
        });
        dst
    }

    pub fn f64const(&mut self, value: f64) -> Value {
        let dst = self.new_value(Ty::F64);
        self.push(Inst::Const {
            dst,
            bits: value.to_bits(),
        });
        dst
    }

    /// The result has the type of `lhs`.
    pub fn binary(&mut self, op: BinOp, lhs: Value, rhs: Value) -> Value {
        let dst = self.new_value(self.value_ty(lhs));
        self.push(Inst::Binary { dst, op, lhs, rhs });
        dst
    }

    pub fn unary(&mut self, op: UnOp, src: Value) -> Value {
        let dst = self.new_value(self.value_ty(src));
        self.push(Inst::Unary { dst, op, src });
        dst
    }

    pub fn icmp(&mut self, cond: IntCC, lhs: Value, rhs: Value) -> Value {
        let dst = self.new_value(Ty::I1);
        self.push(Inst::Icmp {
            dst,
            cond,
            lhs,
            rhs,
        });
        dst
    }

    pub fn fcmp(&mut self, cond: FloatCC, lhs: Value, rhs: Value) -> Value {
        let dst = self.new_value(Ty::I1);
        self.push(Inst::Fcmp {
            dst,
            cond,
            lhs,
            rhs,
        });
        dst
    }

    pub fn select(&mut self, cond: Value, if_true: Value, if_false: Value) -> Value {
        let dst = self.new_value(self.value_ty(if_true));
        self.push(Inst::Select {
            dst,
            cond,
            if_true,
            if_false,
        });
        dst
    }

    pub fn cast(&mut self, op: CastOp, src: Value, to: Ty) -> Value {
        let dst = self.new_value(to);
        self.push(Inst::Cast { dst, op, src });
        dst
    }

    pub fn load(&mut self, width: MemWidth, signed: bool, addr: Value, ty: Ty) -> Value {
        let dst = self.new_value(ty);
        self.push(Inst::Load {
            dst,
            width,
            signed,
            addr,
        });
        dst
    }

    pub fn store(&mut self, width: MemWidth, addr: Value, value: Value) {
        self.push(Inst::Store { width, addr, value });
    }

    pub fn read_guest(&mut self, loc: GuestLoc) -> Value {
        let dst = self.new_value(loc.ty());
        self.push(Inst::ReadGuest { dst, loc });
        dst
    }

    pub fn write_guest(&mut self, loc: GuestLoc, value: Value) {
        self.push(Inst::WriteGuest { loc, value });
    }

    /// Adds a phi without incoming values after the existing phis of the current block.
    pub fn phi(&mut self, ty: Ty) -> Value {
        let dst = self.new_value(ty);
        let id = self.block.expect("no current block");
        let block = self.current_mut();
        let index = block.phis().count();
        block.instructions.insert(
            index,
            Inst::Phi {
                dst,
                incoming: Vec::new(),
            },
        );
        for (at, _) in &mut block.comments {
            if *at >= index {
                *at += 1;
            }
        }
        self.phi_sites.insert(dst, (id, index));
        dst
    }

    // will panic if `phi` was not created by `FunctionBuilder::phi`
    pub fn add_phi_incoming(&mut self, phi: Value, pred: BlockId, value: Value) {
        let (block, index) = self.phi_sites[&phi];
        match &mut self.function.blocks[block.index()].instructions[index] {
            Inst::Phi { incoming, .. } => incoming.push((pred, value)),
            _ => unreachable!("phi sites only record phis"),
        }
    }

    /// Returns the predecessors recorded for `phi` so far.
    pub fn phi_incoming(&self, phi: Value) -> &[(BlockId, Value)] {
        let (block, index) = self.phi_sites[&phi];
        match &self.function.block(block).instructions[index] {
            Inst::Phi { incoming, .. } => incoming,
            _ => unreachable!("phi sites only record phis"),
        }
    }

    /// Sets the terminator of the current block, replacing a previous one.
    pub fn terminate_block(&mut self, terminator: Terminator) {
        self.current_mut().terminator = Some(terminator);
    }

    pub fn jump(&mut self, target: BlockId) {
        self.terminate_block(Terminator::Jump(target));
    }

    pub fn branch(
        &mut self,
        cond: Value,
        if_true: BlockId,
        if_false: BlockId,
        weights: Option<(u32, u32)>,
    ) {
        self.terminate_block(Terminator::Branch {
            cond,
            if_true,
            if_false,
            weights,
        });
    }

    pub fn exit(&mut self, pc: Value, reason: ExitReason) {
        self.terminate_block(Terminator::Exit { pc, reason });
    }

    pub fn function(&self) -> &Function {
        &self.function
    }

    pub fn build(self) -> Function {
        self.function
    }
}
