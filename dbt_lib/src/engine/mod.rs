//! The guest execution loop: compiled regions where there are some, the interpreter everywhere
//! else, and region construction for blocks that get hot.

#[cfg(test)]
mod test;

use crate::backend::{Backend, EvalBackend};
use crate::cache::RegionCache;
use crate::compile::{RegionBuilder, RegionStatus};
use crate::config::EngineConfig;
use crate::error::CompileError;
use crate::interp::{GuestFault, Interpreter};
use crate::profile::Profiler;
use crate::state::GuestState;
use crate::stats::Stats;
use region_ir::ExitReason;
use std::num::NonZeroUsize;
use tracing::{debug, info, trace, warn};

/// Bound on the regions run back to back by one [`Engine::try_execute`].
pub const MAX_CHAINED_REGIONS: usize = 64;

/// How a call to [`Engine::run`] went.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Interpreted blocks plus region invocations.
    pub blocks: u64,
    pub interpreted_blocks: u64,
    pub region_invocations: u64,
}

pub struct Engine<B: Backend = EvalBackend> {
    config: EngineConfig,
    backend: B,
    interpreter: Interpreter,
    profiler: Profiler,
    cache: RegionCache,
    stats: Stats,
}

/// Result of running compiled code at the current pc.
struct Chain {
    invocations: usize,
    last_exit: Option<ExitReason>,
}

impl Engine<EvalBackend> {
    pub fn new(config: EngineConfig) -> Self {
        Self::with_backend(config, EvalBackend)
    }
}

impl<B: Backend> Engine<B> {
    pub fn with_backend(config: EngineConfig, backend: B) -> Self {
        let capacity = NonZeroUsize::new(config.cache_capacity()).unwrap_or(NonZeroUsize::MIN);
        Self {
            config,
            backend,
            interpreter: Interpreter::new(),
            profiler: Profiler::new(),
            cache: RegionCache::new(capacity),
            stats: Stats::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    pub fn profiler(&self) -> &Profiler {
        &self.profiler
    }

    pub fn cache(&self) -> &RegionCache {
        &self.cache
    }

    /// The build outcome of the region entered at `addr`, if one was built and is still known.
    pub fn region_status(&self, addr: u32) -> Option<RegionStatus> {
        if self.cache.contains(addr) {
            Some(RegionStatus::Ready)
        } else {
            self.cache
                .failure(addr)
                .map(|err| RegionStatus::Failed(err.clone()))
        }
    }

    /// Runs the compiled region at `state.pc`, and the regions its exits lead to. Returns `false`
    /// if there is no compiled region at `state.pc`, or if the last region left through a
    /// deoptimization exit. The caller interprets from `state.pc` in that case.
    pub fn try_execute(&mut self, state: &mut GuestState) -> bool {
        let chain = self.run_compiled(state);
        chain
            .last_exit
            .is_some_and(|reason| !reason.is_deopt())
    }

    fn run_compiled(&mut self, state: &mut GuestState) -> Chain {
        let mut chain = Chain {
            invocations: 0,
            last_exit: None,
        };
        if !self.config.enable_compilation() {
            return chain;
        }
        while chain.invocations < MAX_CHAINED_REGIONS {
            let entry = state.pc;
            let Some(region) = self.cache.get(entry) else {
                break;
            };
            let icnt = state.icnt;
            let exit = region.invoke(state);
            chain.invocations += 1;
            self.stats
                .record_invocation(entry, exit.reason, state.icnt.wrapping_sub(icnt));
            trace!(
                "region {entry:#010x} exited to {:#010x} ({})",
                exit.pc,
                exit.reason
            );
            chain.last_exit = Some(exit.reason);
        }
        chain
    }

    /// Runs the guest until `max_blocks` blocks or region invocations have executed, or until it
    /// faults.
    pub fn run(&mut self, state: &mut GuestState, max_blocks: u64) -> Result<RunSummary, GuestFault> {
        let mut summary = RunSummary::default();
        while summary.blocks < max_blocks {
            let chain = self.run_compiled(state);
            if chain.invocations > 0 {
                summary.region_invocations += chain.invocations as u64;
                summary.blocks += chain.invocations as u64;
                continue;
            }

            let block = match self.interpreter.step_block(state) {
                Ok(block) => block,
                Err(fault) => {
                    warn!("guest stopped: {fault}");
                    return Err(fault);
                }
            };
            summary.blocks += 1;
            summary.interpreted_blocks += 1;
            self.stats.interpreted_blocks += 1;
            let count = self.profiler.record(&block, state.pc);
            if self.should_build(block.entry, count) {
                self.build_region(block.entry);
            }
        }
        Ok(summary)
    }

    fn should_build(&self, entry: u32, count: u64) -> bool {
        self.config.enable_compilation()
            && count >= self.config.hot_threshold()
            && !self.cache.contains(entry)
            && !self.cache.is_failed(entry)
    }

    /// Builds the region entered at `entry` from the current profile and caches the outcome. An
    /// entry the profiler hasn't seen yet isn't remembered as failed.
    pub fn build_region(&mut self, entry: u32) -> RegionStatus {
        self.stats.compile_attempts += 1;
        let mut builder = RegionBuilder::new(&self.config, entry);
        let result = builder.compile(&self.profiler, &mut self.backend);
        let status = builder.status(&result);
        match result {
            Ok(region) => {
                info!("compiled {}", region.info());
                self.stats.compiled += 1;
                if self.cache.insert(region).is_some() {
                    self.stats.evictions += 1;
                }
            }
            Err(err @ CompileError::NotProfiled { .. }) => {
                debug!("region {entry:#010x} not built yet: {err}");
            }
            Err(err) => {
                info!("region {entry:#010x} failed: {err}");
                self.stats.failed += 1;
                self.cache.mark_failed(entry, err);
            }
        }
        status
    }
}
