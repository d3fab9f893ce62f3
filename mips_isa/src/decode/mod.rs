//! Conversion between instruction words and [`Instruction`]s.

#[cfg(test)]
mod test;

use crate::{
    BCond, BZCond, BZalCond, FCond, FFmt, FImmOp, FReg, FRegOp2, FRegOp3, Fcr, ImmOp1, ImmOp2,
    Instruction, Reg, RegOp1, RegOp2, RegOp3, ShiftOp, TrapCond, UnaryOp,
};

const SPECIAL: u32 = 0x00;
const REGIMM: u32 = 0x01;
const COP1: u32 = 0x11;
const SPECIAL2: u32 = 0x1c;
const SPECIAL3: u32 = 0x1f;

const FMT_S: u32 = 0x10;
const FMT_D: u32 = 0x11;
const FMT_W: u32 = 0x14;

fn rs(word: u32) -> Reg {
    Reg::new((word >> 21) as u8)
}

fn rt(word: u32) -> Reg {
    Reg::new((word >> 16) as u8)
}

fn rd(word: u32) -> Reg {
    Reg::new((word >> 11) as u8)
}

fn sa(word: u32) -> u8 {
    ((word >> 6) & 0x1f) as u8
}

fn ft(word: u32) -> FReg {
    FReg::new((word >> 16) as u8)
}

fn fs(word: u32) -> FReg {
    FReg::new((word >> 11) as u8)
}

fn fd(word: u32) -> FReg {
    FReg::new((word >> 6) as u8)
}

fn imm(word: u32) -> u16 {
    word as u16
}

/// Decodes a big-endian MIPS32 instruction word. Words that aren't part of the supported
/// instruction set decode to [`Instruction::Unknown`], so decoding never fails.
pub fn decode(word: u32) -> Instruction {
    use Instruction as I;

    if word == 0 {
        return I::Nop;
    }
    match word >> 26 {
        SPECIAL => decode_special(word),
        REGIMM => decode_regimm(word),
        0x02 => I::Jump(word & 0x03ff_ffff),
        0x03 => I::JumpAndLink(word & 0x03ff_ffff),
        0x04 => I::Branch(BCond::Eq, rs(word), rt(word), imm(word), false),
        0x05 => I::Branch(BCond::Ne, rs(word), rt(word), imm(word), false),
        0x06 => I::BranchZ(BZCond::LeZ, rs(word), imm(word), false),
        0x07 => I::BranchZ(BZCond::GtZ, rs(word), imm(word), false),
        0x08 => I::Imm2(ImmOp2::AddS, rt(word), rs(word), imm(word)),
        0x09 => I::Imm2(ImmOp2::AddU, rt(word), rs(word), imm(word)),
        0x0a => I::Imm2(ImmOp2::SetLtS, rt(word), rs(word), imm(word)),
        0x0b => I::Imm2(ImmOp2::SetLtU, rt(word), rs(word), imm(word)),
        0x0c => I::Imm2(ImmOp2::And, rt(word), rs(word), imm(word)),
        0x0d => I::Imm2(ImmOp2::Or, rt(word), rs(word), imm(word)),
        0x0e => I::Imm2(ImmOp2::Xor, rt(word), rs(word), imm(word)),
        0x0f => I::Imm1(ImmOp1::LoadUpper, rt(word), imm(word)),
        COP1 => decode_cop1(word),
        0x14 => I::Branch(BCond::Eq, rs(word), rt(word), imm(word), true),
        0x15 => I::Branch(BCond::Ne, rs(word), rt(word), imm(word), true),
        0x16 => I::BranchZ(BZCond::LeZ, rs(word), imm(word), true),
        0x17 => I::BranchZ(BZCond::GtZ, rs(word), imm(word), true),
        SPECIAL2 => match word & 0x3f {
            0x02 => I::Reg3(RegOp3::Mul, rd(word), rs(word), rt(word)),
            0x20 => I::Unary(UnaryOp::CountLeadingZeros, rd(word), rs(word)),
            _ => I::Unknown(word),
        },
        SPECIAL3 => match (word & 0x3f, sa(word)) {
            (0x20, 0x10) => I::Unary(UnaryOp::SignExtendByte, rd(word), rt(word)),
            (0x20, 0x18) => I::Unary(UnaryOp::SignExtendHalf, rd(word), rt(word)),
            _ => I::Unknown(word),
        },
        0x20 => I::Imm2(ImmOp2::LoadByteS, rt(word), rs(word), imm(word)),
        0x21 => I::Imm2(ImmOp2::LoadHalfS, rt(word), rs(word), imm(word)),
        0x23 => I::Imm2(ImmOp2::LoadWord, rt(word), rs(word), imm(word)),
        0x24 => I::Imm2(ImmOp2::LoadByteU, rt(word), rs(word), imm(word)),
        0x25 => I::Imm2(ImmOp2::LoadHalfU, rt(word), rs(word), imm(word)),
        0x28 => I::Imm2(ImmOp2::StoreByte, rt(word), rs(word), imm(word)),
        0x29 => I::Imm2(ImmOp2::StoreHalf, rt(word), rs(word), imm(word)),
        0x2b => I::Imm2(ImmOp2::StoreWord, rt(word), rs(word), imm(word)),
        0x31 => I::FImm(FImmOp::LoadWordToFpu, ft(word), rs(word), imm(word)),
        0x35 => I::FImm(FImmOp::LoadDoublewordToFpu, ft(word), rs(word), imm(word)),
        0x39 => I::FImm(FImmOp::StoreWordFromFpu, ft(word), rs(word), imm(word)),
        0x3d => I::FImm(FImmOp::StoreDoublewordFromFpu, ft(word), rs(word), imm(word)),
        _ => I::Unknown(word),
    }
}

fn decode_special(word: u32) -> Instruction {
    use Instruction as I;

    let reg3 = |op| I::Reg3(op, rd(word), rs(word), rt(word));
    match word & 0x3f {
        0x00 => I::Shift(ShiftOp::LeftLogical, rd(word), rt(word), sa(word)),
        0x02 => I::Shift(ShiftOp::RightLogical, rd(word), rt(word), sa(word)),
        0x03 => I::Shift(ShiftOp::RightArithmetic, rd(word), rt(word), sa(word)),
        0x04 => reg3(RegOp3::ShiftLeftLogical),
        0x06 => reg3(RegOp3::ShiftRightLogical),
        0x07 => reg3(RegOp3::ShiftRightArithmetic),
        0x08 => I::JumpReg(rs(word)),
        0x09 => I::JumpAndLinkReg(rd(word), rs(word)),
        0x0a => reg3(RegOp3::MoveIfZero),
        0x0b => reg3(RegOp3::MoveIfNotZero),
        0x0c => I::Syscall,
        0x0d => I::Break,
        0x0f => I::Sync,
        0x10 => I::Reg1(RegOp1::MoveFromHi, rd(word)),
        0x11 => I::Reg1(RegOp1::MoveToHi, rs(word)),
        0x12 => I::Reg1(RegOp1::MoveFromLo, rd(word)),
        0x13 => I::Reg1(RegOp1::MoveToLo, rs(word)),
        0x18 => I::Reg2(RegOp2::MultS, rs(word), rt(word)),
        0x19 => I::Reg2(RegOp2::MultU, rs(word), rt(word)),
        0x1a => I::Reg2(RegOp2::DivS, rs(word), rt(word)),
        0x1b => I::Reg2(RegOp2::DivU, rs(word), rt(word)),
        0x20 => reg3(RegOp3::AddS),
        0x21 => reg3(RegOp3::AddU),
        0x22 => reg3(RegOp3::SubS),
        0x23 => reg3(RegOp3::SubU),
        0x24 => reg3(RegOp3::And),
        0x25 => reg3(RegOp3::Or),
        0x26 => reg3(RegOp3::Xor),
        0x27 => reg3(RegOp3::Nor),
        0x2a => reg3(RegOp3::SetLtS),
        0x2b => reg3(RegOp3::SetLtU),
        0x30 => I::Trap(TrapCond::GeS, rs(word), rt(word)),
        0x31 => I::Trap(TrapCond::GeU, rs(word), rt(word)),
        0x32 => I::Trap(TrapCond::LtS, rs(word), rt(word)),
        0x33 => I::Trap(TrapCond::LtU, rs(word), rt(word)),
        0x34 => I::Trap(TrapCond::Eq, rs(word), rt(word)),
        0x36 => I::Trap(TrapCond::Ne, rs(word), rt(word)),
        _ => I::Unknown(word),
    }
}

fn decode_regimm(word: u32) -> Instruction {
    use Instruction as I;

    match (word >> 16) & 0x1f {
        0x00 => I::BranchZ(BZCond::LtZ, rs(word), imm(word), false),
        0x01 => I::BranchZ(BZCond::GeZ, rs(word), imm(word), false),
        0x02 => I::BranchZ(BZCond::LtZ, rs(word), imm(word), true),
        0x03 => I::BranchZ(BZCond::GeZ, rs(word), imm(word), true),
        0x10 => I::BranchZAndLink(BZalCond::LtZ, rs(word), imm(word)),
        0x11 => I::BranchZAndLink(BZalCond::GeZ, rs(word), imm(word)),
        _ => I::Unknown(word),
    }
}

fn decode_cop1(word: u32) -> Instruction {
    use Instruction as I;

    let fcr = || Fcr::from_cp1(fs(word).num());
    match (word >> 21) & 0x1f {
        0x00 => I::MoveFromFpu(rt(word), fs(word)),
        0x02 => match fcr() {
            Some(fcr) => I::MoveFromFcr(rt(word), fcr),
            None => I::Unknown(word),
        },
        0x04 => I::MoveToFpu(rt(word), fs(word)),
        0x06 => match fcr() {
            Some(fcr) => I::MoveToFcr(rt(word), fcr),
            None => I::Unknown(word),
        },
        0x08 => {
            let cc = ((word >> 18) & 7) as u8;
            let likely = word & (1 << 17) != 0;
            let on_true = word & (1 << 16) != 0;
            I::BranchFCond(on_true, cc, imm(word), likely)
        }
        fmt @ (FMT_S | FMT_D) => {
            let fmt = if fmt == FMT_S { FFmt::S } else { FFmt::D };
            let reg3 = |op| I::FReg3(op, fd(word), fs(word), ft(word));
            let reg2 = |op| I::FReg2(op, fd(word), fs(word));
            match word & 0x3f {
                0x00 => reg3(FRegOp3::Add(fmt)),
                0x01 => reg3(FRegOp3::Sub(fmt)),
                0x02 => reg3(FRegOp3::Mul(fmt)),
                0x03 => reg3(FRegOp3::Div(fmt)),
                0x04 => reg2(FRegOp2::Sqrt(fmt)),
                0x05 => reg2(FRegOp2::Abs(fmt)),
                0x06 => reg2(FRegOp2::Move(fmt)),
                0x07 => reg2(FRegOp2::Neg(fmt)),
                0x0d => reg2(FRegOp2::TruncToWord(fmt)),
                0x20 if fmt == FFmt::D => reg2(FRegOp2::Convert(FFmt::S, FFmt::D)),
                0x21 if fmt == FFmt::S => reg2(FRegOp2::Convert(FFmt::D, FFmt::S)),
                0x24 => reg2(FRegOp2::ConvertToWord(fmt)),
                cond @ 0x30..=0x3f => {
                    let cc = ((word >> 8) & 7) as u8;
                    I::FCompare(FCond::new(cond as u8), fmt, cc, fs(word), ft(word))
                }
                _ => I::Unknown(word),
            }
        }
        FMT_W => match word & 0x3f {
            0x20 => I::FReg2(FRegOp2::ConvertFromWord(FFmt::S), fd(word), fs(word)),
            0x21 => I::FReg2(FRegOp2::ConvertFromWord(FFmt::D), fd(word), fs(word)),
            _ => I::Unknown(word),
        },
        _ => I::Unknown(word),
    }
}

fn r_type(rs: Reg, rt: Reg, rd: Reg, sa: u8, funct: u32) -> u32 {
    (rs.num() as u32) << 21 | (rt.num() as u32) << 16 | (rd.num() as u32) << 11 | (sa as u32) << 6 | funct
}

fn i_type(opcode: u32, rs: Reg, rt: Reg, imm: u16) -> u32 {
    opcode << 26 | (rs.num() as u32) << 21 | (rt.num() as u32) << 16 | imm as u32
}

fn f_type(fmt: FFmt, ft: FReg, fs: FReg, fd: FReg, funct: u32) -> u32 {
    let fmt = match fmt {
        FFmt::S => FMT_S,
        FFmt::D => FMT_D,
    };
    COP1 << 26
        | fmt << 21
        | (ft.num() as u32) << 16
        | (fs.num() as u32) << 11
        | (fd.num() as u32) << 6
        | funct
}

fn cop1_move(sub: u32, rt: Reg, fs: u8) -> u32 {
    COP1 << 26 | sub << 21 | (rt.num() as u32) << 16 | (fs as u32) << 11
}

impl Instruction {
    /// Encodes the instruction back into its instruction word. This is the inverse of [`decode`].
    pub fn encode(&self) -> u32 {
        let zero = Reg::ZERO;
        match *self {
            Self::Nop => 0,
            Self::Shift(op, rd, rt, sa) => {
                let funct = match op {
                    ShiftOp::LeftLogical => 0x00,
                    ShiftOp::RightLogical => 0x02,
                    ShiftOp::RightArithmetic => 0x03,
                };
                r_type(zero, rt, rd, sa, funct)
            }
            Self::Reg3(RegOp3::Mul, rd, rs, rt) => SPECIAL2 << 26 | r_type(rs, rt, rd, 0, 0x02),
            Self::Reg3(op, rd, rs, rt) => {
                let funct = match op {
                    RegOp3::ShiftLeftLogical => 0x04,
                    RegOp3::ShiftRightLogical => 0x06,
                    RegOp3::ShiftRightArithmetic => 0x07,
                    RegOp3::MoveIfZero => 0x0a,
                    RegOp3::MoveIfNotZero => 0x0b,
                    RegOp3::AddS => 0x20,
                    RegOp3::AddU => 0x21,
                    RegOp3::SubS => 0x22,
                    RegOp3::SubU => 0x23,
                    RegOp3::And => 0x24,
                    RegOp3::Or => 0x25,
                    RegOp3::Xor => 0x26,
                    RegOp3::Nor => 0x27,
                    RegOp3::SetLtS => 0x2a,
                    RegOp3::SetLtU => 0x2b,
                    RegOp3::Mul => unreachable!(),
                };
                r_type(rs, rt, rd, 0, funct)
            }
            Self::Reg2(op, rs, rt) => {
                let funct = match op {
                    RegOp2::MultS => 0x18,
                    RegOp2::MultU => 0x19,
                    RegOp2::DivS => 0x1a,
                    RegOp2::DivU => 0x1b,
                };
                r_type(rs, rt, zero, 0, funct)
            }
            Self::Reg1(op, r) => match op {
                RegOp1::MoveFromHi => r_type(zero, zero, r, 0, 0x10),
                RegOp1::MoveToHi => r_type(r, zero, zero, 0, 0x11),
                RegOp1::MoveFromLo => r_type(zero, zero, r, 0, 0x12),
                RegOp1::MoveToLo => r_type(r, zero, zero, 0, 0x13),
            },
            Self::Unary(op, rd, src) => match op {
                UnaryOp::CountLeadingZeros => SPECIAL2 << 26 | r_type(src, rd, rd, 0, 0x20),
                UnaryOp::SignExtendByte => SPECIAL3 << 26 | r_type(zero, src, rd, 0x10, 0x20),
                UnaryOp::SignExtendHalf => SPECIAL3 << 26 | r_type(zero, src, rd, 0x18, 0x20),
            },
            Self::Imm2(op, rt, rs, imm) => {
                let opcode = match op {
                    ImmOp2::AddS => 0x08,
                    ImmOp2::AddU => 0x09,
                    ImmOp2::SetLtS => 0x0a,
                    ImmOp2::SetLtU => 0x0b,
                    ImmOp2::And => 0x0c,
                    ImmOp2::Or => 0x0d,
                    ImmOp2::Xor => 0x0e,
                    ImmOp2::LoadByteS => 0x20,
                    ImmOp2::LoadHalfS => 0x21,
                    ImmOp2::LoadWord => 0x23,
                    ImmOp2::LoadByteU => 0x24,
                    ImmOp2::LoadHalfU => 0x25,
                    ImmOp2::StoreByte => 0x28,
                    ImmOp2::StoreHalf => 0x29,
                    ImmOp2::StoreWord => 0x2b,
                };
                i_type(opcode, rs, rt, imm)
            }
            Self::Imm1(ImmOp1::LoadUpper, rt, imm) => i_type(0x0f, zero, rt, imm),
            Self::Branch(cond, rs, rt, offset, likely) => {
                let opcode = match (cond, likely) {
                    (BCond::Eq, false) => 0x04,
                    (BCond::Ne, false) => 0x05,
                    (BCond::Eq, true) => 0x14,
                    (BCond::Ne, true) => 0x15,
                };
                i_type(opcode, rs, rt, offset)
            }
            Self::BranchZ(cond, rs, offset, likely) => match (cond, likely) {
                (BZCond::LeZ, false) => i_type(0x06, rs, zero, offset),
                (BZCond::GtZ, false) => i_type(0x07, rs, zero, offset),
                (BZCond::LeZ, true) => i_type(0x16, rs, zero, offset),
                (BZCond::GtZ, true) => i_type(0x17, rs, zero, offset),
                (BZCond::LtZ, false) => i_type(REGIMM, rs, Reg::new(0x00), offset),
                (BZCond::GeZ, false) => i_type(REGIMM, rs, Reg::new(0x01), offset),
                (BZCond::LtZ, true) => i_type(REGIMM, rs, Reg::new(0x02), offset),
                (BZCond::GeZ, true) => i_type(REGIMM, rs, Reg::new(0x03), offset),
            },
            Self::BranchZAndLink(cond, rs, offset) => {
                let sub = match cond {
                    BZalCond::LtZ => 0x10,
                    BZalCond::GeZ => 0x11,
                };
                i_type(REGIMM, rs, Reg::new(sub), offset)
            }
            Self::BranchFCond(on_true, cc, offset, likely) => {
                COP1 << 26
                    | 0x08 << 21
                    | ((cc & 7) as u32) << 18
                    | (likely as u32) << 17
                    | (on_true as u32) << 16
                    | offset as u32
            }
            Self::Jump(index) => 0x02 << 26 | (index & 0x03ff_ffff),
            Self::JumpAndLink(index) => 0x03 << 26 | (index & 0x03ff_ffff),
            Self::JumpReg(rs) => r_type(rs, zero, zero, 0, 0x08),
            Self::JumpAndLinkReg(rd, rs) => r_type(rs, zero, rd, 0, 0x09),
            Self::FReg3(op, fd, fs, ft) => {
                let funct = match op {
                    FRegOp3::Add(_) => 0x00,
                    FRegOp3::Sub(_) => 0x01,
                    FRegOp3::Mul(_) => 0x02,
                    FRegOp3::Div(_) => 0x03,
                };
                f_type(op.fmt(), ft, fs, fd, funct)
            }
            Self::FReg2(op, fd, fs) => {
                let none = FReg::new(0);
                match op {
                    FRegOp2::Sqrt(fmt) => f_type(fmt, none, fs, fd, 0x04),
                    FRegOp2::Abs(fmt) => f_type(fmt, none, fs, fd, 0x05),
                    FRegOp2::Move(fmt) => f_type(fmt, none, fs, fd, 0x06),
                    FRegOp2::Neg(fmt) => f_type(fmt, none, fs, fd, 0x07),
                    FRegOp2::TruncToWord(fmt) => f_type(fmt, none, fs, fd, 0x0d),
                    FRegOp2::ConvertToWord(fmt) => f_type(fmt, none, fs, fd, 0x24),
                    FRegOp2::Convert(to, from) => {
                        let funct = match to {
                            FFmt::S => 0x20,
                            FFmt::D => 0x21,
                        };
                        f_type(from, none, fs, fd, funct)
                    }
                    FRegOp2::ConvertFromWord(fmt) => {
                        let funct = match fmt {
                            FFmt::S => 0x20,
                            FFmt::D => 0x21,
                        };
                        COP1 << 26
                            | FMT_W << 21
                            | (fs.num() as u32) << 11
                            | (fd.num() as u32) << 6
                            | funct
                    }
                }
            }
            Self::FCompare(cond, fmt, cc, fs, ft) => {
                f_type(fmt, ft, fs, FReg::new(0), 0x30 | cond.bits() as u32)
                    | ((cc & 7) as u32) << 8
            }
            Self::FImm(op, ft, base, offset) => {
                let opcode = match op {
                    FImmOp::LoadWordToFpu => 0x31,
                    FImmOp::LoadDoublewordToFpu => 0x35,
                    FImmOp::StoreWordFromFpu => 0x39,
                    FImmOp::StoreDoublewordFromFpu => 0x3d,
                };
                i_type(opcode, base, Reg::new(ft.num()), offset)
            }
            Self::MoveFromFpu(rt, fs) => cop1_move(0x00, rt, fs.num()),
            Self::MoveToFpu(rt, fs) => cop1_move(0x04, rt, fs.num()),
            Self::MoveFromFcr(rt, fcr) => cop1_move(0x02, rt, fcr.cp1_num()),
            Self::MoveToFcr(rt, fcr) => cop1_move(0x06, rt, fcr.cp1_num()),
            Self::Trap(cond, rs, rt) => {
                let funct = match cond {
                    TrapCond::GeS => 0x30,
                    TrapCond::GeU => 0x31,
                    TrapCond::LtS => 0x32,
                    TrapCond::LtU => 0x33,
                    TrapCond::Eq => 0x34,
                    TrapCond::Ne => 0x36,
                };
                r_type(rs, rt, zero, 0, funct)
            }
            Self::Syscall => 0x0c,
            Self::Break => 0x0d,
            Self::Sync => 0x0f,
            Self::Unknown(word) => word,
        }
    }
}

/// Encodes a sequence of instructions into instruction words.
pub fn assemble(instructions: &[Instruction]) -> Vec<u32> {
    instructions.iter().map(Instruction::encode).collect()
}
