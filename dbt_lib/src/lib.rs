//! A region compiler for MIPS guest code: hot code found by the interpreter is assembled into a
//! region CFG, put in SSA form and lowered to [`region_ir`], and from then on runs as compiled
//! code until it leaves the region.

pub mod analysis;
pub mod backend;
pub mod cache;
mod codegen;
pub mod compile;
pub mod config;
pub mod engine;
pub mod error;
pub mod image;
pub mod interp;
pub mod profile;
pub mod region;
pub mod state;
pub mod stats;

pub use backend::{Backend, BackendError, CompiledCode, EvalBackend, NullBackend, RegionExit};
pub use compile::{CompiledRegion, RegionBuilder, RegionInfo, RegionState, RegionStatus};
pub use config::{ConfigError, EngineConfig, EngineConfigBuilder};
pub use engine::{Engine, RunSummary};
pub use error::CompileError;
pub use image::{parse_hex_listing, words_from_bytes, ImageError};
pub use interp::{GuestFault, Interpreter, TraceBlock};
pub use state::{GuestState, Memory};
pub use stats::Stats;

pub use region_ir::ExitReason;
