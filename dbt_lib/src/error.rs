use crate::backend::BackendError;
use mips_isa::{FReg, Instruction};
use thiserror::Error;

/// Reasons a region can't be compiled. The region is marked failed and its entry stays
/// interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    /// Nothing to build from yet. The only error that doesn't mark the entry failed.
    #[error("no profiled block at {addr:#010x}")]
    NotProfiled { addr: u32 },
    #[error("unsupported instruction `{insn}` at {addr:#010x}")]
    UnsupportedInstruction { addr: u32, insn: Instruction },
    #[error("register jump at {addr:#010x} with indirect jumps disabled")]
    IndirectJumpsDisabled { addr: u32 },
    #[error("floating-point instruction at {addr:#010x} with floating point disabled")]
    FloatingPointDisabled { addr: u32 },
    #[error("{reg} is used at single and double precision")]
    MixedPrecisionDisabled { reg: FReg },
    #[error(transparent)]
    Backend(#[from] BackendError),
}
