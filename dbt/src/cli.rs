use crate::util::{parse_addr, parse_number, PathOrStd};

use dbt_lib::{
    image, ConfigError, EngineConfig, EngineConfigBuilder, GuestState, Memory,
};

use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};

use std::{fs::File, io::Read};

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum InputFormat {
    /// Raw big-endian instruction words.
    Bin,
    /// Whitespace separated hex words, `#` starts a comment.
    Hex,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SkippablePasses {
    ConstFold,
    InsnCount,
    BlockSplit,
    IndirectJumps,
    Fp,
    MixedPrecision,
}

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// The guest program, use `-` for std in.
    #[arg(default_value = "-")]
    input_path: PathOrStd,

    /// How the program is encoded. Defaults to hex for `.hex` and `.txt` files and std in, bin
    /// otherwise.
    #[arg(short = 'f', long, value_name = "FORMAT", value_enum)]
    format: Option<InputFormat>,

    /// Address the program is loaded at.
    #[arg(long, value_name = "ADDR", default_value = "0x1000", value_parser = parse_addr)]
    base: u32,

    /// Address execution starts at. Defaults to the load address.
    #[arg(long, value_name = "ADDR", value_parser = parse_addr)]
    entry: Option<u32>,

    /// Size of guest memory in bytes, a power of two.
    #[arg(long, value_name = "BYTES", default_value = "0x100000", value_parser = parse_number)]
    mem_size: u64,

    /// Stop after this many blocks and region invocations.
    #[arg(long, value_name = "N", default_value_t = 10_000_000)]
    max_blocks: u64,

    /// Executions of a block before a region is built from it.
    #[arg(long, value_name = "N")]
    hot_threshold: Option<u64>,

    /// Compiled regions kept in the cache.
    #[arg(long, value_name = "N")]
    cache_lines: Option<usize>,

    /// Only interpret.
    #[arg(long)]
    no_jit: bool,

    /// Zero or more passes or region features to switch off
    #[arg(long = "skip", value_name = "PASS", value_enum)]
    skips: Vec<SkippablePasses>,

    /// Log the IR of every compiled region, needs `-v`.
    #[arg(long)]
    dump_ir: bool,

    /// Log more, repeat for even more. `RUST_LOG` overrides this.
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Args {
    pub fn max_blocks(&self) -> u64 {
        self.max_blocks
    }
}

fn read_input(args: &Args) -> anyhow::Result<Vec<u8>> {
    let mut bytes = Vec::new();
    match &args.input_path {
        PathOrStd::Path(path) => {
            if !path.exists() {
                bail!("Input file `{}` doesn't exist", path.display());
            }
            let mut handle = File::open(path)
                .with_context(|| format!("Failed to open input file `{}`", path.display()))?;
            handle
                .read_to_end(&mut bytes)
                .with_context(|| format!("Failed to read from input file `{}`", path.display()))?;
        }
        PathOrStd::StdStream => {
            std::io::stdin()
                .lock()
                .read_to_end(&mut bytes)
                .context("Failed to read from stdin")?;
        }
    }
    Ok(bytes)
}

fn input_format(args: &Args) -> InputFormat {
    if let Some(format) = args.format {
        return format;
    }
    match &args.input_path {
        PathOrStd::Path(path) => match path.extension().and_then(|ext| ext.to_str()) {
            Some("hex" | "txt") => InputFormat::Hex,
            _ => InputFormat::Bin,
        },
        PathOrStd::StdStream => InputFormat::Hex,
    }
}

/// Reads the program and lays out the initial guest state: the program at `--base`, `pc` at
/// `--entry` and `$sp` 16 bytes below the top of memory.
pub fn load_guest(args: &Args) -> anyhow::Result<GuestState> {
    let bytes = read_input(args)?;
    let words = match input_format(args) {
        InputFormat::Bin => image::words_from_bytes(&bytes)?,
        InputFormat::Hex => {
            let text = String::from_utf8(bytes).context("Hex listing isn't valid UTF-8")?;
            image::parse_hex_listing(&text)?
        }
    };
    if words.is_empty() {
        bail!("The program is empty");
    }

    let size = args.mem_size;
    if !size.is_power_of_two() || size > 1 << 32 {
        bail!("Memory size {size:#x} must be a power of two of at most 4 GiB");
    }
    if (words.len() as u64) * 4 > size {
        bail!(
            "A program of {} words doesn't fit in {size:#x} bytes of memory",
            words.len()
        );
    }
    let mut mem = Memory::new(size as usize);
    mem.load_words(args.base, &words);

    let mut state = GuestState::new(mem, args.entry.unwrap_or(args.base));
    state.set_reg(mips_isa::Reg::SP, (size - 16) as u32);
    Ok(state)
}

pub fn extract_engine_config(args: &Args) -> Result<EngineConfig, ConfigError> {
    let config = EngineConfigBuilder::new();

    let config = if let Some(threshold) = args.hot_threshold {
        config.hot_threshold(threshold)
    } else {
        config
    };

    let config = if let Some(lines) = args.cache_lines {
        config.cache_capacity(lines)
    } else {
        config
    };

    let skip = |pass| args.skips.contains(&pass);
    config
        .enable_compilation(!args.no_jit)
        .fold_constants(!skip(SkippablePasses::ConstFold))
        .count_instructions(!skip(SkippablePasses::InsnCount))
        .split_blocks(!skip(SkippablePasses::BlockSplit))
        .allow_indirect_jumps(!skip(SkippablePasses::IndirectJumps))
        .allow_fp(!skip(SkippablePasses::Fp))
        .allow_mixed_precision(!skip(SkippablePasses::MixedPrecision))
        .dump_ir(args.dump_ir)
        .build()
}

#[cfg(test)]
mod test {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("dbt").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn defaults() {
        let args = parse(&[]);
        assert!(matches!(args.input_path, PathOrStd::StdStream));
        assert_eq!(args.base, 0x1000);
        assert_eq!(input_format(&args), InputFormat::Hex);
        assert_eq!(extract_engine_config(&args), Ok(EngineConfig::default()));
    }

    #[test]
    fn skips_switch_off_features() {
        let args = parse(&[
            "prog.bin",
            "--skip",
            "const-fold",
            "--skip",
            "indirect-jumps",
            "--hot-threshold",
            "7",
            "--cache-lines",
            "2",
            "-vv",
        ]);
        assert_eq!(args.verbose, 2);
        assert_eq!(input_format(&args), InputFormat::Bin);
        let config = extract_engine_config(&args).unwrap();
        assert!(!config.fold_constants());
        assert!(!config.allow_indirect_jumps());
        assert!(config.allow_fp());
        assert_eq!(config.hot_threshold(), 7);
        assert_eq!(config.cache_capacity(), 2);
    }

    #[test]
    fn zero_cache_lines_are_rejected() {
        let args = parse(&["--cache-lines", "0"]);
        assert_eq!(
            extract_engine_config(&args),
            Err(ConfigError::ZeroCacheCapacity)
        );
    }

    #[test]
    fn no_jit_interprets() {
        let args = parse(&["--no-jit", "--entry", "0x1010", "--format", "bin", "x.hex"]);
        assert!(!extract_engine_config(&args).unwrap().enable_compilation());
        assert_eq!(args.entry, Some(0x1010));
        assert_eq!(input_format(&args), InputFormat::Bin);
    }
}
