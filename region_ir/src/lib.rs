//! A small typed SSA IR for translated guest regions. Regions read and write guest state through
//! [`GuestLoc`]s and leave through [`Terminator::Exit`], carrying the guest pc to continue at.

mod function;
mod instruction;
mod terminator;
mod ty;
mod validate;
mod value;

pub mod eval;

pub use function::{Block, Function, FunctionBuilder};
pub use instruction::{BinOp, CastOp, FloatCC, Inst, IntCC, UnOp};
pub use terminator::{ExitReason, Terminator};
pub use ty::Ty;
pub use validate::{validate, ValidationError};
pub use value::{BlockId, GuestLoc, MemWidth, Value};
