//! Register reads and writes of instructions, and the properties the translator needs to know
//! about every instruction before lowering it.

use crate::{FFmt, ImmOp2, Instruction, Reg, RegOp1, RegRef};
use arrayvec::ArrayVec;

/// The registers an instruction reads.
pub type Uses = ArrayVec<RegRef, 4>;
/// The registers an instruction writes.
pub type Defs = ArrayVec<RegRef, 2>;

/// Classification of the arithmetic an instruction performs, used to decide whether a region
/// needs floating-point state at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Precision {
    Integer,
    Single,
    Double,
}

impl Precision {
    pub fn is_fp(self) -> bool {
        !matches!(self, Self::Integer)
    }

    fn of(fmt: FFmt) -> Self {
        match fmt {
            FFmt::S => Self::Single,
            FFmt::D => Self::Double,
        }
    }
}

impl Instruction {
    /// Returns the registers read by this instruction, in operand order.
    pub fn uses(&self) -> Uses {
        use RegRef::*;

        let mut uses = Uses::new();
        match *self {
            Self::Shift(_, _, rt, _) => uses.push(Gpr(rt)),
            Self::Reg3(op, rd, rs, rt) => {
                uses.push(Gpr(rs));
                uses.push(Gpr(rt));
                if op.reads_destination() {
                    uses.push(Gpr(rd));
                }
            }
            Self::Reg2(_, rs, rt) | Self::Branch(_, rs, rt, _, _) | Self::Trap(_, rs, rt) => {
                uses.push(Gpr(rs));
                uses.push(Gpr(rt));
            }
            Self::Reg1(op, r) => match op {
                RegOp1::MoveFromHi => uses.push(HiLo(crate::HiLo::Hi)),
                RegOp1::MoveFromLo => uses.push(HiLo(crate::HiLo::Lo)),
                RegOp1::MoveToHi | RegOp1::MoveToLo => uses.push(Gpr(r)),
            },
            Self::Unary(_, _, src) => uses.push(Gpr(src)),
            Self::Imm2(op, rt, rs, _) => {
                uses.push(Gpr(rs));
                if op.is_store() {
                    uses.push(Gpr(rt));
                }
            }
            Self::BranchZ(_, rs, _, _)
            | Self::BranchZAndLink(_, rs, _)
            | Self::JumpReg(rs)
            | Self::JumpAndLinkReg(_, rs) => uses.push(Gpr(rs)),
            Self::BranchFCond(..) => uses.push(Fcr(crate::Fcr::Fccr)),
            Self::FReg3(op, _, fs, ft) => {
                uses.push(Fpr(fs, op.fmt()));
                uses.push(Fpr(ft, op.fmt()));
            }
            Self::FReg2(op, _, fs) => uses.push(Fpr(fs, op.formats().1)),
            Self::FCompare(_, fmt, _, fs, ft) => {
                uses.push(Fpr(fs, fmt));
                uses.push(Fpr(ft, fmt));
                // Only one condition code bit is replaced.
                uses.push(Fcr(crate::Fcr::Fccr));
            }
            Self::FImm(op, ft, base, _) => {
                uses.push(Gpr(base));
                if !op.is_load() {
                    uses.push(Fpr(ft, op.fmt()));
                }
            }
            Self::MoveFromFpu(_, fs) => uses.push(Fpr(fs, FFmt::S)),
            Self::MoveToFpu(rt, _) | Self::MoveToFcr(rt, _) => uses.push(Gpr(rt)),
            Self::MoveFromFcr(_, fcr) => uses.push(Fcr(fcr)),
            Self::Nop
            | Self::Imm1(..)
            | Self::Jump(_)
            | Self::JumpAndLink(_)
            | Self::Syscall
            | Self::Break
            | Self::Sync
            | Self::Unknown(_) => {}
        }
        uses
    }

    /// Returns the registers written by this instruction. Writes to `$zero` are included, callers
    /// that track definitions must skip them.
    pub fn defs(&self) -> Defs {
        use RegRef::*;

        let mut defs = Defs::new();
        match *self {
            Self::Shift(_, rd, _, _) | Self::Reg3(_, rd, _, _) | Self::Unary(_, rd, _) => {
                defs.push(Gpr(rd))
            }
            Self::Reg2(..) => {
                defs.push(HiLo(crate::HiLo::Hi));
                defs.push(HiLo(crate::HiLo::Lo));
            }
            Self::Reg1(op, r) => match op {
                RegOp1::MoveFromHi | RegOp1::MoveFromLo => defs.push(Gpr(r)),
                RegOp1::MoveToHi => defs.push(HiLo(crate::HiLo::Hi)),
                RegOp1::MoveToLo => defs.push(HiLo(crate::HiLo::Lo)),
            },
            Self::Imm2(op, rt, _, _) => {
                if !op.is_store() {
                    defs.push(Gpr(rt));
                }
            }
            Self::Imm1(_, rt, _) | Self::MoveFromFpu(rt, _) | Self::MoveFromFcr(rt, _) => {
                defs.push(Gpr(rt))
            }
            Self::BranchZAndLink(..) | Self::JumpAndLink(_) => defs.push(Gpr(Reg::RA)),
            Self::JumpAndLinkReg(rd, _) => defs.push(Gpr(rd)),
            Self::FReg3(op, fd, _, _) => defs.push(Fpr(fd, op.fmt())),
            Self::FReg2(op, fd, _) => defs.push(Fpr(fd, op.formats().0)),
            Self::FCompare(..) => defs.push(Fcr(crate::Fcr::Fccr)),
            Self::FImm(op, ft, _, _) => {
                if op.is_load() {
                    defs.push(Fpr(ft, op.fmt()));
                }
            }
            Self::MoveToFpu(_, fs) => defs.push(Fpr(fs, FFmt::S)),
            Self::MoveToFcr(_, fcr) => defs.push(Fcr(fcr)),
            Self::Nop
            | Self::Branch(..)
            | Self::BranchZ(..)
            | Self::BranchFCond(..)
            | Self::Jump(_)
            | Self::JumpReg(_)
            | Self::Trap(..)
            | Self::Syscall
            | Self::Break
            | Self::Sync
            | Self::Unknown(_) => {}
        }
        defs
    }

    /// Returns the widest floating-point precision this instruction operates on.
    pub fn precision(&self) -> Precision {
        match *self {
            Self::FReg3(op, ..) => Precision::of(op.fmt()),
            Self::FReg2(op, ..) => {
                let (to, from) = op.formats();
                if to == FFmt::D || from == FFmt::D {
                    Precision::Double
                } else {
                    Precision::Single
                }
            }
            Self::FCompare(_, fmt, ..) => Precision::of(fmt),
            Self::FImm(op, ..) => Precision::of(op.fmt()),
            Self::MoveFromFpu(..)
            | Self::MoveToFpu(..)
            | Self::MoveFromFcr(..)
            | Self::MoveToFcr(..)
            | Self::BranchFCond(..) => Precision::Single,
            _ => Precision::Integer,
        }
    }

    /// Returns `false` for instructions the region compiler has no lowering for. A single such
    /// instruction makes the whole region uncompilable.
    pub fn can_compile(&self) -> bool {
        !matches!(
            self,
            Self::Reg3(crate::RegOp3::AddS | crate::RegOp3::SubS, ..)
                | Self::Imm2(ImmOp2::AddS, ..)
                | Self::BranchZAndLink(..)
                | Self::Trap(..)
                | Self::Syscall
                | Self::Break
                | Self::Unknown(_)
        )
    }

    /// Returns `true` for branches whose delay slot is only executed when the branch is taken.
    pub fn is_likely_branch(&self) -> bool {
        matches!(
            self,
            Self::Branch(.., true) | Self::BranchZ(.., true) | Self::BranchFCond(.., true)
        )
    }

    /// Returns `true` if this is a floating-point instruction.
    pub fn is_fp(&self) -> bool {
        self.precision().is_fp()
    }
}

/// Returns the registers in `defs` that are really written, i.e. everything but `$zero`.
pub fn effective_defs(defs: Defs) -> impl Iterator<Item = RegRef> {
    defs.into_iter()
        .filter(|def| !matches!(def, RegRef::Gpr(reg) if reg.is_zero()))
}
