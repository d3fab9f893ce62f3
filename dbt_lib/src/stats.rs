use region_ir::ExitReason;
use std::collections::BTreeMap;
use std::fmt;

/// Counters kept by the engine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stats {
    pub compile_attempts: u64,
    pub compiled: u64,
    pub failed: u64,
    pub evictions: u64,
    pub invocations: u64,
    /// Region exits, indexed by [`ExitReason::index`].
    pub exits: [u64; ExitReason::ALL.len()],
    pub interpreted_blocks: u64,
    /// Guest instructions executed by each region, by entry address.
    pub region_instructions: BTreeMap<u32, u64>,
}

impl Stats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one region invocation that retired `instructions` guest instructions.
    pub fn record_invocation(&mut self, entry: u32, reason: ExitReason, instructions: u64) {
        self.invocations += 1;
        self.exits[reason.index()] += 1;
        *self.region_instructions.entry(entry).or_default() += instructions;
    }

    pub fn exits(&self, reason: ExitReason) -> u64 {
        self.exits[reason.index()]
    }

    /// Guest instructions executed in compiled code.
    pub fn compiled_instructions(&self) -> u64 {
        self.region_instructions.values().sum()
    }
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "compile attempts:   {}", self.compile_attempts)?;
        writeln!(f, "regions compiled:   {}", self.compiled)?;
        writeln!(f, "regions failed:     {}", self.failed)?;
        writeln!(f, "regions evicted:    {}", self.evictions)?;
        writeln!(f, "region invocations: {}", self.invocations)?;
        for reason in ExitReason::ALL {
            writeln!(f, "  exits {:<14} {}", format!("{reason}:"), self.exits(reason))?;
        }
        writeln!(f, "interpreted blocks: {}", self.interpreted_blocks)?;
        write!(f, "compiled instructions: {}", self.compiled_instructions())?;
        for (entry, count) in &self.region_instructions {
            write!(f, "\n  {entry:#010x}: {count}")?;
        }
        Ok(())
    }
}
