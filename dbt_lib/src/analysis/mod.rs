//! Abstract interpretations over region blocks: integer constant state and floating-point
//! precision usage.

pub mod constant;
pub mod precision;

pub use constant::{ConstRegs, ConstValue};
pub use precision::{FpTouched, FpUsage, FprForm, PrecisionCounts};
