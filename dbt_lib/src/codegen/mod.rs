//! Lowers a prepared region to [`region_ir`]: a pre-order walk of the dominator tree that carries
//! a [`RegisterTable`] down into every subtree, followed by filling in the phi incoming values
//! from the register tables recorded on every edge.

mod lower;
mod table;

#[cfg(test)]
mod test;

pub(crate) use table::RegisterTable;

use crate::config::EngineConfig;
use crate::region::{BlockId, PhiReg, Region, RegisterUsage, Transfer};
use mips_isa::{Control, Instruction, Reg, INSN_WIDTH};
use region_ir::{
    BlockId as IrBlock, ExitReason, Function, FunctionBuilder, IntCC, Ty, Value,
};
use std::collections::BTreeMap;

/// Where a deopt continues guest execution.
#[derive(Debug, Clone, Copy)]
enum ExitPc {
    Const(u32),
    Dynamic(Value),
}

pub(crate) struct CodeGenerator<'a> {
    region: &'a Region,
    usage: &'a RegisterUsage,
    config: &'a EngineConfig,
    b: FunctionBuilder,
    ir_blocks: BTreeMap<BlockId, IrBlock>,
    /// Phis instantiated at the start of each guest block.
    phis: BTreeMap<BlockId, Vec<(PhiReg, Value)>>,
    /// Every IR edge into a guest block with the register table at its source.
    incoming: BTreeMap<BlockId, Vec<(IrBlock, RegisterTable)>>,
    deopts: usize,
}

/// Generates the IR function for a region whose dominators, phis and floating-point usage are
/// computed.
pub(crate) fn generate(region: &Region, usage: &RegisterUsage, config: &EngineConfig) -> Function {
    let mut generator = CodeGenerator::new(region, usage, config);
    generator.run();
    generator.b.build()
}

impl<'a> CodeGenerator<'a> {
    fn new(region: &'a Region, usage: &'a RegisterUsage, config: &'a EngineConfig) -> Self {
        let mut b = FunctionBuilder::new(format!("region_{:08x}", region.entry_addr()));
        let mut ir_blocks = BTreeMap::new();
        for (id, block) in region.blocks() {
            let ir = if block.is_region_entry() {
                b.entry_block()
            } else {
                b.declare_block(region.block_name(id))
            };
            ir_blocks.insert(id, ir);
        }
        Self {
            region,
            usage,
            config,
            b,
            ir_blocks,
            phis: BTreeMap::new(),
            incoming: BTreeMap::new(),
            deopts: 0,
        }
    }

    fn run(&mut self) {
        let entry = self.region.entry_block_id();
        self.b.start_block(self.b.entry_block());
        let zero = self.b.iconst(Ty::I32, 0);
        let table = RegisterTable::new(zero);
        self.visit(entry, table);
        self.patch_up_phi_nodes();
    }

    fn visit(&mut self, id: BlockId, mut table: RegisterTable) {
        let region = self.region;
        let block = &region[id];
        self.b.start_block(self.ir_blocks[&id]);

        if block.is_region_entry() {
            self.load_live_in(&mut table);
            match region.first_block() {
                Some(first) => self.jump_edge(first, &table),
                None => {
                    let miss = self.deopt_block(
                        &table,
                        ExitPc::Const(region.entry_addr()),
                        ExitReason::Fallthrough,
                    );
                    self.b.jump(miss);
                }
            }
        } else {
            self.start_guest_block(id, &mut table);
            let transfer = block.transfer();
            let body_end = transfer.map_or(block.len(), |transfer| transfer.index);
            for (i, insn) in block.instructions()[..body_end].iter().enumerate() {
                self.lower(insn, block.addr_of(i), &mut table);
            }
            if let Some(transfer) = transfer {
                self.lower_transfer(id, transfer, &mut table);
            }
        }
        let tail = self
            .b
            .current_block()
            .expect("lowering always leaves a current block");

        if let Some(tree) = region.dominator_tree() {
            let children: Vec<_> = tree.children(id).collect();
            for child in children {
                self.visit(child, table.clone());
            }
        }

        if let Some(next) = block.fallthrough().filter(|_| !block.is_region_entry()) {
            self.b.start_block(tail);
            let reason = if block.is_likely_patch() {
                ExitReason::BranchTarget
            } else {
                ExitReason::Fallthrough
            };
            let succ = self.successor_at(id, next);
            let target = self.edge_target(succ, &table, ExitPc::Const(next), reason);
            self.b.jump(target);
        }
    }

    /// Loads every register the region reads or writes from guest state.
    fn load_live_in(&mut self, table: &mut RegisterTable) {
        let region = self.region;
        let fp = region.fp_touched();
        for reg in self.usage.live_in() {
            let loc = reg.guest_loc(fp);
            let raw = self.b.read_guest(loc);
            let value = self.from_guest(raw, reg);
            table.set(&mut self.b, reg, value, fp);
        }
    }

    /// Instantiates the block's phis and counts its instructions.
    fn start_guest_block(&mut self, id: BlockId, table: &mut RegisterTable) {
        let region = self.region;
        let block = &region[id];
        let fp = region.fp_touched();
        *self.b.block_comment_mut(self.ir_blocks[&id]) = Some(format!(
            "guest {:#010x}..{:#010x}",
            block.entry(),
            block.exit_addr()
        ));
        for phi in block.phis() {
            let value = self.b.phi(phi.reg.ty(fp));
            table.set(&mut self.b, phi.reg, value, fp);
            self.phis.entry(id).or_default().push((phi.reg, value));
        }
        let count = block.instruction_count();
        if self.config.count_instructions() && count > 0 {
            let delta = self.b.iconst(Ty::I64, count);
            let icnt = self
                .b
                .binary(region_ir::BinOp::Add, table.icnt(), delta);
            table.set_icnt(icnt);
        }
    }

    fn lower_transfer(&mut self, id: BlockId, transfer: Transfer, table: &mut RegisterTable) {
        let region = self.region;
        let block = &region[id];
        let delay = block.instructions()[transfer.index + 1];
        let delay_addr = transfer.addr.wrapping_add(INSN_WIDTH);
        let link = transfer.addr.wrapping_add(2 * INSN_WIDTH);

        match transfer.control {
            Control::Branch {
                taken,
                not_taken,
                likely,
            } => {
                let cond = self.branch_condition(&transfer.insn, table);
                let taken_succ = if likely {
                    block
                        .successors()
                        .iter()
                        .copied()
                        .find(|&succ| region[succ].is_likely_patch())
                } else {
                    self.lower(&delay, delay_addr, table);
                    self.successor_at(id, taken)
                };
                let not_taken_succ = self.successor_at(id, not_taken);

                if let (Some(a), Some(b)) = (taken_succ, not_taken_succ) {
                    if a == b {
                        self.jump_edge(a, table);
                        return;
                    }
                }
                let untaken_reason = if likely {
                    ExitReason::LikelyUntaken
                } else {
                    ExitReason::Fallthrough
                };
                let if_true = self.edge_target(
                    taken_succ,
                    table,
                    ExitPc::Const(taken),
                    ExitReason::BranchTarget,
                );
                let if_false =
                    self.edge_target(not_taken_succ, table, ExitPc::Const(not_taken), untaken_reason);
                let weights = if taken_succ.is_none() { (5, 95) } else { (95, 5) };
                self.b.branch(cond, if_true, if_false, Some(weights));
            }
            Control::Jump { target } => {
                if let Instruction::JumpAndLink(_) = transfer.insn {
                    self.set_link(Reg::RA, link, table);
                }
                self.lower(&delay, delay_addr, table);
                let succ = self.successor_at(id, target);
                let dest =
                    self.edge_target(succ, table, ExitPc::Const(target), ExitReason::BranchTarget);
                self.b.jump(dest);
            }
            Control::JumpReg => {
                let (rd, rs) = match transfer.insn {
                    Instruction::JumpReg(rs) => (None, rs),
                    Instruction::JumpAndLinkReg(rd, rs) => (Some(rd), rs),
                    insn => unreachable!("{insn} is not a register jump"),
                };
                let target = table.gpr(rs);
                let known = table
                    .consts()
                    .get(rs)
                    .constant()
                    .filter(|_| self.config.fold_constants());
                if let Some(rd) = rd {
                    self.set_link(rd, link, table);
                }
                self.lower(&delay, delay_addr, table);

                if let Some(addr) = known {
                    let succ = self.successor_at(id, addr);
                    let dest =
                        self.edge_target(succ, table, ExitPc::Const(addr), ExitReason::BranchTarget);
                    self.b.jump(dest);
                    return;
                }
                let mut targets: Vec<_> = block
                    .successors()
                    .iter()
                    .copied()
                    .filter(|&succ| !region[succ].is_likely_patch())
                    .collect();
                targets.sort_by_key(|&succ| region[succ].entry());
                for succ in targets {
                    let addr = self.b.iconst(Ty::I32, region[succ].entry() as u64);
                    let hit = self.b.icmp(IntCC::Eq, target, addr);
                    let next = self.b.declare_block("dispatch");
                    self.record_edge(succ, table);
                    self.b.branch(hit, self.ir_blocks[&succ], next, None);
                    self.b.start_block(next);
                }
                let miss = self.deopt_block(table, ExitPc::Dynamic(target), ExitReason::IndirectMiss);
                self.b.jump(miss);
            }
            Control::None => unreachable!("transfers always transfer control"),
        }
    }

    fn set_link(&mut self, reg: Reg, link: u32, table: &mut RegisterTable) {
        let value = self.b.iconst(Ty::I32, link as u64);
        table.set_gpr(reg, value, crate::analysis::ConstValue::Constant(link));
    }

    /// The guest block starting at `addr` that `id` has an edge to.
    fn successor_at(&self, id: BlockId, addr: u32) -> Option<BlockId> {
        self.region[id]
            .successors()
            .iter()
            .copied()
            .find(|&succ| {
                let succ = &self.region[succ];
                !succ.is_likely_patch() && succ.entry() == addr
            })
    }

    fn record_edge(&mut self, succ: BlockId, table: &RegisterTable) {
        let source = self
            .b
            .current_block()
            .expect("edges leave the current block");
        self.incoming
            .entry(succ)
            .or_default()
            .push((source, table.clone()));
    }

    fn jump_edge(&mut self, succ: BlockId, table: &RegisterTable) {
        self.record_edge(succ, table);
        self.b.jump(self.ir_blocks[&succ]);
    }

    /// The IR block to continue at: the successor's block when the target is in the region, a new
    /// deopt block otherwise.
    fn edge_target(
        &mut self,
        succ: Option<BlockId>,
        table: &RegisterTable,
        pc: ExitPc,
        reason: ExitReason,
    ) -> IrBlock {
        match succ {
            Some(succ) => {
                self.record_edge(succ, table);
                self.ir_blocks[&succ]
            }
            None => self.deopt_block(table, pc, reason),
        }
    }

    /// Creates a block that writes every register the region defines back to guest state and
    /// leaves the region. The current block is unchanged.
    fn deopt_block(&mut self, table: &RegisterTable, pc: ExitPc, reason: ExitReason) -> IrBlock {
        let current = self.b.current_block();
        self.deopts += 1;
        let block = self.b.declare_block(format!("deopt{}", self.deopts));
        self.b.start_block(block);
        let pc = match pc {
            ExitPc::Const(addr) => {
                *self.b.block_comment_mut(block) = Some(format!("{reason} to {addr:#010x}"));
                self.b.iconst(Ty::I32, addr as u64)
            }
            ExitPc::Dynamic(value) => {
                *self.b.block_comment_mut(block) = Some(reason.to_string());
                value
            }
        };
        let region = self.region;
        let fp = region.fp_touched();
        let written: Vec<_> = self.usage.written().collect();
        for reg in written {
            let value = table.get(&mut self.b, reg, fp);
            let raw = self.to_guest(value, reg);
            self.b.write_guest(reg.guest_loc(fp), raw);
        }
        self.b.exit(pc, reason);
        if let Some(current) = current {
            self.b.start_block(current);
        }
        block
    }

    /// Converts a value read from guest state to the register's boundary representation.
    fn from_guest(&mut self, raw: Value, reg: PhiReg) -> Value {
        let ty = reg.ty(self.region.fp_touched());
        if ty.is_float() {
            self.b.cast(region_ir::CastOp::Bitcast, raw, ty)
        } else {
            raw
        }
    }

    fn to_guest(&mut self, value: Value, reg: PhiReg) -> Value {
        let loc = reg.guest_loc(self.region.fp_touched());
        if self.b.value_ty(value).is_float() {
            self.b.cast(region_ir::CastOp::Bitcast, value, loc.ty())
        } else {
            value
        }
    }

    /// Adds the incoming values of every phi, taken from the register tables recorded on the edges
    /// into its block. Conversions are emitted at the end of the source blocks.
    fn patch_up_phi_nodes(&mut self) {
        let region = self.region;
        let fp = region.fp_touched();
        let phis = std::mem::take(&mut self.phis);
        for (id, phis) in phis {
            let edges = self.incoming.get(&id).cloned().unwrap_or_default();
            for (source, table) in edges {
                self.b.start_block(source);
                for &(reg, phi) in &phis {
                    let value = table.get(&mut self.b, reg, fp);
                    self.b.add_phi_incoming(phi, source, value);
                }
            }
        }
    }
}
