//! The guest instruction set: a big-endian MIPS32 subset with the FPU (COP1).

mod control;
mod instruction;
mod operands;
mod reg;

pub mod alu;
pub mod decode;

pub use control::{branch_target, jump_target, Control, INSN_WIDTH};
pub use decode::{assemble, decode};
pub use instruction::{
    instr, BCond, BZCond, BZalCond, FCond, FFmt, FImmOp, FRegOp2, FRegOp3, ImmOp1, ImmOp2,
    Instruction, RegOp1, RegOp2, RegOp3, ShiftOp, TrapCond, UnaryOp,
};
pub use operands::{effective_defs, Defs, Precision, Uses};
pub use reg::{FReg, Fcr, HiLo, Reg, RegRef};
