//! The seam between region compilation and execution: a backend turns a region's IR into
//! something that runs against guest state.

use crate::state::GuestState;
use region_ir::{eval, validate, ExitReason, Function};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// The backend refuses the region. The region fails and its entry stays interpreted.
    #[error("backend can't compile the region: {0}")]
    NotSupported(String),
}

/// How a compiled region was left.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionExit {
    pub pc: u32,
    pub reason: ExitReason,
}

pub trait CompiledCode {
    /// Runs the region on `state`. On return every register the region wrote is written back and
    /// `state.pc` is the exit address.
    fn invoke(&self, state: &mut GuestState) -> RegionExit;
}

pub trait Backend {
    fn name(&self) -> &str;

    fn compile(&mut self, function: &Function) -> Result<Box<dyn CompiledCode>, BackendError>;
}

/// Runs regions with the IR evaluator.
#[derive(Debug, Default, Clone, Copy)]
pub struct EvalBackend;

struct EvalCode {
    function: Function,
}

impl CompiledCode for EvalCode {
    fn invoke(&self, state: &mut GuestState) -> RegionExit {
        let exit = eval::execute(&self.function, state);
        state.pc = exit.pc;
        RegionExit {
            pc: exit.pc,
            reason: exit.reason,
        }
    }
}

impl Backend for EvalBackend {
    fn name(&self) -> &str {
        "eval"
    }

    fn compile(&mut self, function: &Function) -> Result<Box<dyn CompiledCode>, BackendError> {
        validate(function)
            .map_err(|err| BackendError::NotSupported(format!("invalid region IR: {err}")))?;
        Ok(Box::new(EvalCode {
            function: function.clone(),
        }))
    }
}

/// A backend that refuses every region, for running with compilation plumbing but no code.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullBackend;

impl Backend for NullBackend {
    fn name(&self) -> &str {
        "null"
    }

    fn compile(&mut self, function: &Function) -> Result<Box<dyn CompiledCode>, BackendError> {
        Err(BackendError::NotSupported(format!(
            "{} has no code generator",
            function.name
        )))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use region_ir::{FunctionBuilder, Ty};

    #[test]
    fn invalid_ir_is_not_supported() {
        let mut b = FunctionBuilder::new("region_00001000");
        b.declare_block("unterminated");
        let pc = b.iconst(Ty::I32, 0x1000);
        b.exit(pc, ExitReason::Fallthrough);
        let result = EvalBackend.compile(&b.build());
        assert!(
            matches!(&result, Err(BackendError::NotSupported(msg)) if msg.starts_with("invalid region IR")),
            "{:?}",
            result.err()
        );
    }

    #[test]
    fn valid_ir_runs_to_its_exit() {
        let mut b = FunctionBuilder::new("region_00001000");
        let pc = b.iconst(Ty::I32, 0x1040);
        b.exit(pc, ExitReason::BranchTarget);
        let code = EvalBackend.compile(&b.build()).unwrap();

        let mut state = GuestState::new(crate::state::Memory::new(1 << 12), 0x1000);
        let exit = code.invoke(&mut state);
        assert_eq!(
            exit,
            RegionExit {
                pc: 0x1040,
                reason: ExitReason::BranchTarget
            }
        );
        assert_eq!(state.pc, 0x1040);
    }
}
