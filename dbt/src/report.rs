use dbt_lib::{Engine, GuestState, RunSummary};
use mips_isa::{HiLo, Reg};

use std::io::{self, Write};

/// Writes the final guest registers, four to a line.
pub fn write_state(out: &mut impl Write, state: &GuestState) -> io::Result<()> {
    writeln!(out, "pc   {:#010x}  icnt {}", state.pc, state.icnt)?;
    let regs: Vec<_> = Reg::all().collect();
    for row in regs.chunks(4) {
        let line: Vec<_> = row
            .iter()
            .map(|&reg| format!("{:<5} {:#010x}", format!("{reg:#}"), state.reg(reg)))
            .collect();
        writeln!(out, "{}", line.join("  "))?;
    }
    writeln!(
        out,
        "hi    {:#010x}  lo    {:#010x}",
        state.hilo(HiLo::Hi),
        state.hilo(HiLo::Lo)
    )
}

pub fn write_summary(out: &mut impl Write, summary: &RunSummary, engine: &Engine) -> io::Result<()> {
    writeln!(
        out,
        "{} blocks: {} interpreted, {} region invocations",
        summary.blocks, summary.interpreted_blocks, summary.region_invocations
    )?;
    writeln!(out, "{}", engine.stats())
}
