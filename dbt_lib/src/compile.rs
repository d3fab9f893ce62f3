//! The region build pipeline: from the profiled traces at a hot address to invocable code. Every
//! stage runs exactly once, in order, and the builder remembers the last stage it reached.

use crate::analysis::{ConstRegs, PrecisionCounts};
use crate::backend::{Backend, CompiledCode, RegionExit};
use crate::codegen;
use crate::config::EngineConfig;
use crate::error::CompileError;
use crate::profile::Profiler;
use crate::region::{place_phis, Region, RegisterUsage, Transfer};
use crate::state::GuestState;
use mips_isa::Control;
use region_ir::Function;
use std::fmt;
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RegionState {
    Discovering,
    EdgeWiring,
    Splitting,
    DominatorComputation,
    ConstantAndPrecisionPropagation,
    CodeGeneration,
    Ready,
    Failed,
}

impl fmt::Display for RegionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RegionState::Discovering => "discovering",
            RegionState::EdgeWiring => "edge wiring",
            RegionState::Splitting => "splitting",
            RegionState::DominatorComputation => "dominator computation",
            RegionState::ConstantAndPrecisionPropagation => "constant and precision propagation",
            RegionState::CodeGeneration => "code generation",
            RegionState::Ready => "ready",
            RegionState::Failed => "failed",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegionStatus {
    Ready,
    Failed(CompileError),
}

impl RegionStatus {
    pub fn is_ready(&self) -> bool {
        matches!(self, RegionStatus::Ready)
    }
}

/// What the pipeline learned about a region.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegionInfo {
    pub entry: u32,
    /// Blocks after surgery, including the synthetic entry and patch blocks.
    pub blocks: usize,
    pub guest_instructions: usize,
    pub splits: usize,
    pub likely_patches: usize,
    pub pruned: usize,
    pub phis: usize,
    /// Registers known constant at the exit of some block.
    pub constant_registers: usize,
    pub has_indirect_jumps: bool,
    pub has_likely_branches: bool,
    pub precision: PrecisionCounts,
}

impl fmt::Display for RegionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "region {:#010x}: {} blocks, {} instructions, {} splits, {} likely patches, \
             {} pruned, {} phis, {} constant registers, {}",
            self.entry,
            self.blocks,
            self.guest_instructions,
            self.splits,
            self.likely_patches,
            self.pruned,
            self.phis,
            self.constant_registers,
            self.precision,
        )?;
        if self.has_indirect_jumps {
            write!(f, ", indirect jumps")?;
        }
        if self.has_likely_branches {
            write!(f, ", likely branches")?;
        }
        Ok(())
    }
}

/// A region with its graph prepared for code generation.
#[derive(Debug, Clone)]
pub struct PreparedRegion {
    pub region: Region,
    pub usage: RegisterUsage,
    pub info: RegionInfo,
}

/// A region ready to be invoked.
pub struct CompiledRegion {
    info: RegionInfo,
    code: Box<dyn CompiledCode>,
}

impl CompiledRegion {
    pub fn info(&self) -> &RegionInfo {
        &self.info
    }

    pub fn entry(&self) -> u32 {
        self.info.entry
    }

    pub fn invoke(&self, state: &mut GuestState) -> RegionExit {
        self.code.invoke(state)
    }
}

impl fmt::Debug for CompiledRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledRegion")
            .field("info", &self.info)
            .finish_non_exhaustive()
    }
}

/// Builds one region. A builder is used once: its stages only move forward.
#[derive(Debug)]
pub struct RegionBuilder<'a> {
    config: &'a EngineConfig,
    state: RegionState,
    entry: u32,
}

impl<'a> RegionBuilder<'a> {
    pub fn new(config: &'a EngineConfig, entry: u32) -> Self {
        Self {
            config,
            state: RegionState::Discovering,
            entry,
        }
    }

    /// The last stage reached. `Failed` if any stage failed.
    pub fn state(&self) -> RegionState {
        self.state
    }

    pub fn status(&self, result: &Result<CompiledRegion, CompileError>) -> RegionStatus {
        match result {
            Ok(_) => RegionStatus::Ready,
            Err(err) => RegionStatus::Failed(err.clone()),
        }
    }

    fn advance(&mut self, next: RegionState) {
        assert!(
            next > self.state,
            "region pipeline can't go from {} to {next}",
            self.state
        );
        debug!("region {:#010x}: {} -> {next}", self.entry, self.state);
        self.state = next;
    }

    fn fail<T>(&mut self, err: CompileError) -> Result<T, CompileError> {
        debug!("region {:#010x}: {} -> failed: {err}", self.entry, self.state);
        self.state = RegionState::Failed;
        Err(err)
    }

    /// Runs every stage and hands the IR to `backend`.
    pub fn compile<B: Backend + ?Sized>(
        &mut self,
        profiler: &Profiler,
        backend: &mut B,
    ) -> Result<CompiledRegion, CompileError> {
        let prepared = self.prepare(profiler)?;
        let function = self.generate(&prepared);
        match backend.compile(&function) {
            Ok(code) => {
                self.advance(RegionState::Ready);
                Ok(CompiledRegion {
                    info: prepared.info,
                    code,
                })
            }
            Err(err) => self.fail(err.into()),
        }
    }

    /// Runs the stages up to code generation.
    pub fn prepare(&mut self, profiler: &Profiler) -> Result<PreparedRegion, CompileError> {
        match self.try_prepare(profiler) {
            Ok(prepared) => Ok(prepared),
            Err(err) => self.fail(err),
        }
    }

    fn try_prepare(&mut self, profiler: &Profiler) -> Result<PreparedRegion, CompileError> {
        assert_eq!(
            self.state,
            RegionState::Discovering,
            "a region builder runs once"
        );
        let traces = profiler
            .discover(self.entry, self.config.max_region_blocks())
            .ok_or(CompileError::NotProfiled { addr: self.entry })?;
        let mut region = Region::from_traces(&traces, |addr| profiler.successors(addr));
        self.check_compilable(&region)?;
        let mut info = RegionInfo {
            entry: self.entry,
            ..RegionInfo::default()
        };

        self.advance(RegionState::EdgeWiring);
        let ids: Vec<_> = region.blocks().map(|(id, _)| id).collect();
        for &id in &ids {
            if !region[id].is_region_entry() {
                region.add_within_region_edges(id);
            }
        }
        for &id in &ids {
            assert!(
                region.check_plausible_successors(id),
                "implausible successors for {}",
                region.block_name(id)
            );
        }

        self.advance(RegionState::Splitting);
        if self.config.split_blocks() {
            info.splits = region.split_overlapping_blocks();
        }
        info.likely_patches = region.patch_likely_branches();
        info.pruned = region.prune_unreachable();
        for (id, _) in region.blocks() {
            assert!(
                region.check_plausible_successors(id),
                "implausible successors for {} after splitting",
                region.block_name(id)
            );
        }

        self.advance(RegionState::DominatorComputation);
        region.compute_dominators();

        self.advance(RegionState::ConstantAndPrecisionPropagation);
        let fp = region.compute_fp_usage();
        if !self.config.allow_mixed_precision() {
            if let Some(reg) = fp.mixed() {
                return Err(CompileError::MixedPrecisionDisabled { reg });
            }
        }
        for (id, block) in region.blocks() {
            let exit = block.constant_registers(ConstRegs::variant());
            let known = exit.known().count();
            if known > 1 {
                trace!("{}: constant at exit {exit}", region.block_name(id));
            }
            // $zero is always known and not worth counting.
            info.constant_registers += known.saturating_sub(1);
        }
        let usage = RegisterUsage::collect(&region, self.config.count_instructions());
        info.phis = place_phis(&mut region, &usage);

        info.blocks = region.len();
        info.guest_instructions = region.guest_instruction_count();
        info.has_indirect_jumps = region.has_indirect_jumps();
        info.has_likely_branches = region.has_likely_branches();
        info.precision = region.precision_counts();
        trace!("prepared {info}\n{region}");
        Ok(PreparedRegion {
            region,
            usage,
            info,
        })
    }

    /// Lowers a prepared region to IR.
    pub fn generate(&mut self, prepared: &PreparedRegion) -> Function {
        self.advance(RegionState::CodeGeneration);
        let function = codegen::generate(&prepared.region, &prepared.usage, self.config);
        if self.config.dump_ir() {
            debug!("IR of region {:#010x}:\n{function}", self.entry);
        }
        function
    }

    /// Checks every instruction before any IR is generated.
    fn check_compilable(&self, region: &Region) -> Result<(), CompileError> {
        for (_, block) in region.blocks() {
            for (i, insn) in block.instructions().iter().enumerate() {
                let addr = block.addr_of(i);
                if !insn.can_compile() {
                    return Err(CompileError::UnsupportedInstruction { addr, insn: *insn });
                }
                if !self.config.allow_fp() && insn.is_fp() {
                    return Err(CompileError::FloatingPointDisabled { addr });
                }
            }
            if let Some(Transfer {
                addr,
                control: Control::JumpReg,
                ..
            }) = block.transfer()
            {
                if !self.config.allow_indirect_jumps() {
                    return Err(CompileError::IndirectJumpsDisabled { addr });
                }
            }
        }
        Ok(())
    }
}
