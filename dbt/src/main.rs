mod cli;
mod report;
mod util;

use anyhow::{bail, Context, Result};
use clap::Parser;
use dbt_lib::{Engine, GuestFault};
use is_terminal::IsTerminal;
use tracing_subscriber::EnvFilter;

use std::io::Write;

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .init();
}

fn main() -> Result<()> {
    let args = cli::Args::parse();
    init_logging(args.verbose);

    let mut state = cli::load_guest(&args)?;
    let config = cli::extract_engine_config(&args).context("Invalid engine configuration")?;
    let mut engine = Engine::new(config);

    let outcome = engine.run(&mut state, args.max_blocks());

    let mut out = std::io::stdout().lock();
    let summary = match outcome {
        Ok(summary) => {
            writeln!(out, "stopped after {} blocks", summary.blocks)?;
            Some(summary)
        }
        Err(fault @ (GuestFault::Break { .. } | GuestFault::Syscall { .. })) => {
            writeln!(out, "halted: {fault}")?;
            None
        }
        Err(fault) => {
            report::write_state(&mut out, &state)?;
            bail!("guest faulted: {fault}");
        }
    };
    report::write_state(&mut out, &state).context("Failed to write to output")?;
    if let Some(summary) = summary {
        report::write_summary(&mut out, &summary, &engine)?;
    } else {
        writeln!(out, "{}", engine.stats())?;
    }
    Ok(())
}
