use crate::{Fcr, FReg, Reg};

/// Constructors for instructions, mostly used to assemble guest programs in tests and demos.
pub mod instr {
    use super::*;

    pub fn nop() -> Instruction {
        Instruction::Nop
    }

    /// `rd = rs + rt`, trapping on signed overflow.
    pub fn add_s(rd: Reg, rs: Reg, rt: Reg) -> Instruction {
        Instruction::Reg3(RegOp3::AddS, rd, rs, rt)
    }

    /// `rd = rs + rt`, wrapping.
    pub fn add_u(rd: Reg, rs: Reg, rt: Reg) -> Instruction {
        Instruction::Reg3(RegOp3::AddU, rd, rs, rt)
    }

    pub fn sub_u(rd: Reg, rs: Reg, rt: Reg) -> Instruction {
        Instruction::Reg3(RegOp3::SubU, rd, rs, rt)
    }

    pub fn and(rd: Reg, rs: Reg, rt: Reg) -> Instruction {
        Instruction::Reg3(RegOp3::And, rd, rs, rt)
    }

    pub fn or(rd: Reg, rs: Reg, rt: Reg) -> Instruction {
        Instruction::Reg3(RegOp3::Or, rd, rs, rt)
    }

    pub fn nor(rd: Reg, rs: Reg, rt: Reg) -> Instruction {
        Instruction::Reg3(RegOp3::Nor, rd, rs, rt)
    }

    pub fn xor(rd: Reg, rs: Reg, rt: Reg) -> Instruction {
        Instruction::Reg3(RegOp3::Xor, rd, rs, rt)
    }

    /// Shift the value in `rt` left by the amount in `rs` and store the result in `rd`.
    pub fn shift_left_logical(rd: Reg, rt: Reg, rs: Reg) -> Instruction {
        Instruction::Reg3(RegOp3::ShiftLeftLogical, rd, rs, rt)
    }

    pub fn shift_right_logical(rd: Reg, rt: Reg, rs: Reg) -> Instruction {
        Instruction::Reg3(RegOp3::ShiftRightLogical, rd, rs, rt)
    }

    pub fn shift_right_arithmetic(rd: Reg, rt: Reg, rs: Reg) -> Instruction {
        Instruction::Reg3(RegOp3::ShiftRightArithmetic, rd, rs, rt)
    }

    /// `rd = (rs < rt) as u32`, signed.
    pub fn set_lt_s(rd: Reg, rs: Reg, rt: Reg) -> Instruction {
        Instruction::Reg3(RegOp3::SetLtS, rd, rs, rt)
    }

    pub fn set_lt_u(rd: Reg, rs: Reg, rt: Reg) -> Instruction {
        Instruction::Reg3(RegOp3::SetLtU, rd, rs, rt)
    }

    pub fn move_if_zero(rd: Reg, rs: Reg, rt: Reg) -> Instruction {
        Instruction::Reg3(RegOp3::MoveIfZero, rd, rs, rt)
    }

    pub fn move_if_not_zero(rd: Reg, rs: Reg, rt: Reg) -> Instruction {
        Instruction::Reg3(RegOp3::MoveIfNotZero, rd, rs, rt)
    }

    pub fn mul(rd: Reg, rs: Reg, rt: Reg) -> Instruction {
        Instruction::Reg3(RegOp3::Mul, rd, rs, rt)
    }

    pub fn shift_left_logical_imm(rd: Reg, rt: Reg, sa: u8) -> Instruction {
        Instruction::Shift(ShiftOp::LeftLogical, rd, rt, sa & 0x1f)
    }

    pub fn shift_right_logical_imm(rd: Reg, rt: Reg, sa: u8) -> Instruction {
        Instruction::Shift(ShiftOp::RightLogical, rd, rt, sa & 0x1f)
    }

    pub fn shift_right_arithmetic_imm(rd: Reg, rt: Reg, sa: u8) -> Instruction {
        Instruction::Shift(ShiftOp::RightArithmetic, rd, rt, sa & 0x1f)
    }

    pub fn div_s(rs: Reg, rt: Reg) -> Instruction {
        Instruction::Reg2(RegOp2::DivS, rs, rt)
    }

    pub fn div_u(rs: Reg, rt: Reg) -> Instruction {
        Instruction::Reg2(RegOp2::DivU, rs, rt)
    }

    pub fn mult_s(rs: Reg, rt: Reg) -> Instruction {
        Instruction::Reg2(RegOp2::MultS, rs, rt)
    }

    pub fn mult_u(rs: Reg, rt: Reg) -> Instruction {
        Instruction::Reg2(RegOp2::MultU, rs, rt)
    }

    pub fn move_from_hi(rd: Reg) -> Instruction {
        Instruction::Reg1(RegOp1::MoveFromHi, rd)
    }

    pub fn move_from_lo(rd: Reg) -> Instruction {
        Instruction::Reg1(RegOp1::MoveFromLo, rd)
    }

    pub fn move_to_hi(rs: Reg) -> Instruction {
        Instruction::Reg1(RegOp1::MoveToHi, rs)
    }

    pub fn move_to_lo(rs: Reg) -> Instruction {
        Instruction::Reg1(RegOp1::MoveToLo, rs)
    }

    pub fn count_leading_zeros(rd: Reg, rs: Reg) -> Instruction {
        Instruction::Unary(UnaryOp::CountLeadingZeros, rd, rs)
    }

    pub fn sign_extend_byte(rd: Reg, rt: Reg) -> Instruction {
        Instruction::Unary(UnaryOp::SignExtendByte, rd, rt)
    }

    pub fn sign_extend_half(rd: Reg, rt: Reg) -> Instruction {
        Instruction::Unary(UnaryOp::SignExtendHalf, rd, rt)
    }

    pub fn add_s_imm(rt: Reg, rs: Reg, imm: u16) -> Instruction {
        Instruction::Imm2(ImmOp2::AddS, rt, rs, imm)
    }

    pub fn add_u_imm(rt: Reg, rs: Reg, imm: u16) -> Instruction {
        Instruction::Imm2(ImmOp2::AddU, rt, rs, imm)
    }

    pub fn and_imm(rt: Reg, rs: Reg, imm: u16) -> Instruction {
        Instruction::Imm2(ImmOp2::And, rt, rs, imm)
    }

    pub fn or_imm(rt: Reg, rs: Reg, imm: u16) -> Instruction {
        Instruction::Imm2(ImmOp2::Or, rt, rs, imm)
    }

    pub fn xor_imm(rt: Reg, rs: Reg, imm: u16) -> Instruction {
        Instruction::Imm2(ImmOp2::Xor, rt, rs, imm)
    }

    pub fn set_lt_s_imm(rt: Reg, rs: Reg, imm: u16) -> Instruction {
        Instruction::Imm2(ImmOp2::SetLtS, rt, rs, imm)
    }

    pub fn set_lt_u_imm(rt: Reg, rs: Reg, imm: u16) -> Instruction {
        Instruction::Imm2(ImmOp2::SetLtU, rt, rs, imm)
    }

    /// Set high-order 16 bits of the register to the immediate and the low-order 16 bits to 0.
    pub fn load_upper(rt: Reg, imm: u16) -> Instruction {
        Instruction::Imm1(ImmOp1::LoadUpper, rt, imm)
    }

    // Loads and stores

    /// Loads the sign-extended byte at `base + offset` into `rt`.
    pub fn load_byte_s(rt: Reg, base: Reg, offset: u16) -> Instruction {
        Instruction::Imm2(ImmOp2::LoadByteS, rt, base, offset)
    }

    pub fn load_byte_u(rt: Reg, base: Reg, offset: u16) -> Instruction {
        Instruction::Imm2(ImmOp2::LoadByteU, rt, base, offset)
    }

    pub fn load_half_s(rt: Reg, base: Reg, offset: u16) -> Instruction {
        Instruction::Imm2(ImmOp2::LoadHalfS, rt, base, offset)
    }

    pub fn load_half_u(rt: Reg, base: Reg, offset: u16) -> Instruction {
        Instruction::Imm2(ImmOp2::LoadHalfU, rt, base, offset)
    }

    pub fn load_word(rt: Reg, base: Reg, offset: u16) -> Instruction {
        Instruction::Imm2(ImmOp2::LoadWord, rt, base, offset)
    }

    pub fn store_byte(rt: Reg, base: Reg, offset: u16) -> Instruction {
        Instruction::Imm2(ImmOp2::StoreByte, rt, base, offset)
    }

    pub fn store_half(rt: Reg, base: Reg, offset: u16) -> Instruction {
        Instruction::Imm2(ImmOp2::StoreHalf, rt, base, offset)
    }

    pub fn store_word(rt: Reg, base: Reg, offset: u16) -> Instruction {
        Instruction::Imm2(ImmOp2::StoreWord, rt, base, offset)
    }

    //----------------------------------------------------------------------------------------------
    // Control transfers. Offsets are in instructions, relative to the delay slot.
    //----------------------------------------------------------------------------------------------
    pub fn branch_if(cond: BCond, rs: Reg, rt: Reg, offset: i16) -> Instruction {
        Instruction::Branch(cond, rs, rt, offset as u16, false)
    }

    /// Like [`branch_if`], but the delay slot is only executed if the branch is taken.
    pub fn branch_if_likely(cond: BCond, rs: Reg, rt: Reg, offset: i16) -> Instruction {
        Instruction::Branch(cond, rs, rt, offset as u16, true)
    }

    pub fn branch_if_z(cond: BZCond, rs: Reg, offset: i16) -> Instruction {
        Instruction::BranchZ(cond, rs, offset as u16, false)
    }

    pub fn branch_if_z_likely(cond: BZCond, rs: Reg, offset: i16) -> Instruction {
        Instruction::BranchZ(cond, rs, offset as u16, true)
    }

    pub fn branch_if_z_and_link(cond: BZalCond, rs: Reg, offset: i16) -> Instruction {
        Instruction::BranchZAndLink(cond, rs, offset as u16)
    }

    /// Branch if FPU condition code `cc` equals `b`.
    pub fn branch_if_f_cond(b: bool, cc: u8, offset: i16) -> Instruction {
        Instruction::BranchFCond(b, cc & 7, offset as u16, false)
    }

    pub fn branch_if_f_cond_likely(b: bool, cc: u8, offset: i16) -> Instruction {
        Instruction::BranchFCond(b, cc & 7, offset as u16, true)
    }

    /// Jump to the absolute `target` address. Only the low 28 bits are encoded, the upper four
    /// come from the address of the delay slot.
    pub fn jump(target: u32) -> Instruction {
        Instruction::Jump((target >> 2) & 0x03ff_ffff)
    }

    pub fn jump_and_link(target: u32) -> Instruction {
        Instruction::JumpAndLink((target >> 2) & 0x03ff_ffff)
    }

    pub fn jump_reg(rs: Reg) -> Instruction {
        Instruction::JumpReg(rs)
    }

    pub fn jump_and_link_reg(rd: Reg, rs: Reg) -> Instruction {
        Instruction::JumpAndLinkReg(rd, rs)
    }

    pub fn trap_if(cond: TrapCond, rs: Reg, rt: Reg) -> Instruction {
        Instruction::Trap(cond, rs, rt)
    }

    pub fn syscall() -> Instruction {
        Instruction::Syscall
    }

    pub fn brk() -> Instruction {
        Instruction::Break
    }

    //----------------------------------------------------------------------------------------------
    // FPU
    //----------------------------------------------------------------------------------------------
    pub fn f_add(fmt: FFmt, fd: FReg, fs: FReg, ft: FReg) -> Instruction {
        Instruction::FReg3(FRegOp3::Add(fmt), fd, fs, ft)
    }

    pub fn f_sub(fmt: FFmt, fd: FReg, fs: FReg, ft: FReg) -> Instruction {
        Instruction::FReg3(FRegOp3::Sub(fmt), fd, fs, ft)
    }

    pub fn f_mul(fmt: FFmt, fd: FReg, fs: FReg, ft: FReg) -> Instruction {
        Instruction::FReg3(FRegOp3::Mul(fmt), fd, fs, ft)
    }

    pub fn f_div(fmt: FFmt, fd: FReg, fs: FReg, ft: FReg) -> Instruction {
        Instruction::FReg3(FRegOp3::Div(fmt), fd, fs, ft)
    }

    pub fn f_move(fmt: FFmt, fd: FReg, fs: FReg) -> Instruction {
        Instruction::FReg2(FRegOp2::Move(fmt), fd, fs)
    }

    pub fn f_neg(fmt: FFmt, fd: FReg, fs: FReg) -> Instruction {
        Instruction::FReg2(FRegOp2::Neg(fmt), fd, fs)
    }

    pub fn f_abs(fmt: FFmt, fd: FReg, fs: FReg) -> Instruction {
        Instruction::FReg2(FRegOp2::Abs(fmt), fd, fs)
    }

    pub fn f_sqrt(fmt: FFmt, fd: FReg, fs: FReg) -> Instruction {
        Instruction::FReg2(FRegOp2::Sqrt(fmt), fd, fs)
    }

    /// Convert the value in `fs` from the `from` format to the `to` format.
    pub fn f_convert(to: FFmt, from: FFmt, fd: FReg, fs: FReg) -> Instruction {
        Instruction::FReg2(FRegOp2::Convert(to, from), fd, fs)
    }

    pub fn f_convert_from_word(fmt: FFmt, fd: FReg, fs: FReg) -> Instruction {
        Instruction::FReg2(FRegOp2::ConvertFromWord(fmt), fd, fs)
    }

    pub fn f_convert_to_word(fmt: FFmt, fd: FReg, fs: FReg) -> Instruction {
        Instruction::FReg2(FRegOp2::ConvertToWord(fmt), fd, fs)
    }

    pub fn f_trunc_to_word(fmt: FFmt, fd: FReg, fs: FReg) -> Instruction {
        Instruction::FReg2(FRegOp2::TruncToWord(fmt), fd, fs)
    }

    pub fn f_compare(cond: FCond, fmt: FFmt, cc: u8, fs: FReg, ft: FReg) -> Instruction {
        Instruction::FCompare(cond, fmt, cc & 7, fs, ft)
    }

    pub fn load_word_to_fpu(ft: FReg, base: Reg, offset: u16) -> Instruction {
        Instruction::FImm(FImmOp::LoadWordToFpu, ft, base, offset)
    }

    pub fn store_word_from_fpu(ft: FReg, base: Reg, offset: u16) -> Instruction {
        Instruction::FImm(FImmOp::StoreWordFromFpu, ft, base, offset)
    }

    pub fn load_doubleword_to_fpu(ft: FReg, base: Reg, offset: u16) -> Instruction {
        Instruction::FImm(FImmOp::LoadDoublewordToFpu, ft, base, offset)
    }

    pub fn store_doubleword_from_fpu(ft: FReg, base: Reg, offset: u16) -> Instruction {
        Instruction::FImm(FImmOp::StoreDoublewordFromFpu, ft, base, offset)
    }

    pub fn move_from_fpu(rt: Reg, fs: FReg) -> Instruction {
        Instruction::MoveFromFpu(rt, fs)
    }

    pub fn move_to_fpu(rt: Reg, fs: FReg) -> Instruction {
        Instruction::MoveToFpu(rt, fs)
    }

    pub fn move_from_fcr(rt: Reg, fcr: Fcr) -> Instruction {
        Instruction::MoveFromFcr(rt, fcr)
    }

    pub fn move_to_fcr(rt: Reg, fcr: Fcr) -> Instruction {
        Instruction::MoveToFcr(rt, fcr)
    }
}

/// A decoded guest instruction.
///
/// Branch offsets are kept in their encoded form (a signed instruction count relative to the delay
/// slot), jump targets as the 26-bit index. The absolute targets depend on the address the
/// instruction was fetched from, see [`Instruction::control`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    Nop,
    /// Shift `rt` by a constant and store the result in `rd`.
    Shift(ShiftOp, Reg, Reg, u8),
    /// `rd`, `rs`, `rt`.
    Reg3(RegOp3, Reg, Reg, Reg),
    /// `rs`, `rt`; the result goes to HI/LO.
    Reg2(RegOp2, Reg, Reg),
    Reg1(RegOp1, Reg),
    /// `rd`, source.
    Unary(UnaryOp, Reg, Reg),
    /// `rt`, `rs`, immediate. For loads and stores `rs` is the base register and the immediate the
    /// signed offset.
    Imm2(ImmOp2, Reg, Reg, u16),
    Imm1(ImmOp1, Reg, u16),
    /// Condition, `rs`, `rt`, offset, likely.
    Branch(BCond, Reg, Reg, u16, bool),
    /// Condition, `rs`, offset, likely.
    BranchZ(BZCond, Reg, u16, bool),
    BranchZAndLink(BZalCond, Reg, u16),
    /// Branch if the FPU condition code equals the bool. Condition code, offset, likely.
    BranchFCond(bool, u8, u16, bool),
    Jump(u32),
    JumpAndLink(u32),
    JumpReg(Reg),
    /// `rd`, `rs`.
    JumpAndLinkReg(Reg, Reg),
    /// `fd`, `fs`, `ft`.
    FReg3(FRegOp3, FReg, FReg, FReg),
    /// `fd`, `fs`.
    FReg2(FRegOp2, FReg, FReg),
    /// Compare `fs` with `ft` and store the outcome in the condition code.
    FCompare(FCond, FFmt, u8, FReg, FReg),
    /// `ft`, base, offset.
    FImm(FImmOp, FReg, Reg, u16),
    /// Copy the bits from the second (FPU) register to the first register.
    MoveFromFpu(Reg, FReg),
    /// Copy the word from the first register to the second (FPU) register.
    MoveToFpu(Reg, FReg),
    MoveFromFcr(Reg, Fcr),
    MoveToFcr(Reg, Fcr),
    Trap(TrapCond, Reg, Reg),
    Syscall,
    Break,
    Sync,
    /// A word that doesn't decode to a supported instruction.
    Unknown(u32),
}

impl std::fmt::Display for Instruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let likely = |l: &bool| if *l { "l" } else { "" };
        match self {
            Self::Nop => f.write_str("nop"),
            Self::Shift(op, rd, rt, sa) => write!(f, "{op}\t{rd}, {rt}, {sa}"),
            Self::Reg3(
                op @ (RegOp3::ShiftLeftLogical
                | RegOp3::ShiftRightLogical
                | RegOp3::ShiftRightArithmetic),
                rd,
                rs,
                rt,
            ) => write!(f, "{op}\t{rd}, {rt}, {rs}"),
            Self::Reg3(op, rd, rs, rt) => write!(f, "{op}\t{rd}, {rs}, {rt}"),
            Self::Reg2(op, rs, rt) => write!(f, "{op}\t{rs}, {rt}"),
            Self::Reg1(op, r) => write!(f, "{op}\t{r}"),
            Self::Unary(op, rd, src) => write!(f, "{op}\t{rd}, {src}"),
            Self::Imm2(op, rt, rs, imm) if op.is_memory() => {
                write!(f, "{op}\t{rt}, {}({rs})", *imm as i16)
            }
            Self::Imm2(op, rt, rs, imm) => write!(f, "{op}\t{rt}, {rs}, {}", *imm as i16),
            Self::Imm1(op, rt, imm) => write!(f, "{op}\t{rt}, {imm:#x}"),
            Self::Branch(cond, rs, rt, offset, l) => {
                write!(f, "b{cond}{}\t{rs}, {rt}, {}", likely(l), *offset as i16)
            }
            Self::BranchZ(cond, rs, offset, l) => {
                write!(f, "b{cond}{}\t{rs}, {}", likely(l), *offset as i16)
            }
            Self::BranchZAndLink(cond, rs, offset) => {
                write!(f, "b{cond}al\t{rs}, {}", *offset as i16)
            }
            Self::BranchFCond(b, cc, offset, l) => write!(
                f,
                "bc1{}{}\t{cc}, {}",
                if *b { 't' } else { 'f' },
                likely(l),
                *offset as i16
            ),
            Self::Jump(index) => write!(f, "j\t{:#x}", index << 2),
            Self::JumpAndLink(index) => write!(f, "jal\t{:#x}", index << 2),
            Self::JumpReg(rs) => write!(f, "jr\t{rs}"),
            Self::JumpAndLinkReg(rd, rs) => write!(f, "jalr\t{rd}, {rs}"),
            Self::FReg3(op, fd, fs, ft) => write!(f, "{op}\t{fd}, {fs}, {ft}"),
            Self::FReg2(op, fd, fs) => write!(f, "{op}\t{fd}, {fs}"),
            Self::FCompare(cond, fmt, cc, fs, ft) => write!(f, "c.{cond}.{fmt}\t{cc}, {fs}, {ft}"),
            Self::FImm(op, ft, base, offset) => write!(f, "{op}\t{ft}, {}({base})", *offset as i16),
            Self::MoveFromFpu(rt, fs) => write!(f, "mfc1\t{rt}, {fs}"),
            Self::MoveToFpu(rt, fs) => write!(f, "mtc1\t{rt}, {fs}"),
            Self::MoveFromFcr(rt, fcr) => write!(f, "cfc1\t{rt}, {fcr}"),
            Self::MoveToFcr(rt, fcr) => write!(f, "ctc1\t{rt}, {fcr}"),
            Self::Trap(cond, rs, rt) => write!(f, "t{cond}\t{rs}, {rt}"),
            Self::Syscall => f.write_str("syscall"),
            Self::Break => f.write_str("break"),
            Self::Sync => f.write_str("sync"),
            Self::Unknown(word) => write!(f, ".word\t{word:#010x}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShiftOp {
    LeftLogical,
    RightLogical,
    RightArithmetic,
}

impl std::fmt::Display for ShiftOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::LeftLogical => "sll",
            Self::RightLogical => "srl",
            Self::RightArithmetic => "sra",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegOp3 {
    /// `rd = rs + rt`, trapping on signed overflow.
    AddS,
    /// `rd = rs + rt`, wrapping.
    AddU,
    /// Traps on signed overflow.
    SubS,
    SubU,
    And,
    Or,
    Nor,
    Xor,
    /// `rt` shifted by the low five bits of `rs`.
    ShiftLeftLogical,
    ShiftRightLogical,
    ShiftRightArithmetic,
    /// `rd = (rs < rt) as u32`, signed.
    SetLtS,
    SetLtU,
    /// `rd = rs` when `rt == 0`, otherwise `rd` keeps its value.
    MoveIfZero,
    MoveIfNotZero,
    /// Low word of the product.
    Mul,
}

impl RegOp3 {
    /// Returns `true` if the op leaves the destination untouched on some inputs, which makes the
    /// previous destination value an input.
    pub fn reads_destination(self) -> bool {
        matches!(self, Self::MoveIfZero | Self::MoveIfNotZero)
    }
}

impl std::fmt::Display for RegOp3 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::AddS => "add",
            Self::AddU => "addu",
            Self::SubS => "sub",
            Self::SubU => "subu",
            Self::And => "and",
            Self::Or => "or",
            Self::Nor => "nor",
            Self::Xor => "xor",
            Self::ShiftLeftLogical => "sllv",
            Self::ShiftRightLogical => "srlv",
            Self::ShiftRightArithmetic => "srav",
            Self::SetLtS => "slt",
            Self::SetLtU => "sltu",
            Self::MoveIfZero => "movz",
            Self::MoveIfNotZero => "movn",
            Self::Mul => "mul",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegOp2 {
    /// Quotient to LO, remainder to HI.
    DivS,
    DivU,
    /// The 64-bit product split over HI and LO.
    MultS,
    MultU,
}

impl std::fmt::Display for RegOp2 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::DivS => "div",
            Self::DivU => "divu",
            Self::MultS => "mult",
            Self::MultU => "multu",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegOp1 {
    MoveFromHi,
    MoveFromLo,
    MoveToHi,
    MoveToLo,
}

impl std::fmt::Display for RegOp1 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::MoveFromHi => "mfhi",
            Self::MoveFromLo => "mflo",
            Self::MoveToHi => "mthi",
            Self::MoveToLo => "mtlo",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    CountLeadingZeros,
    SignExtendByte,
    SignExtendHalf,
}

impl std::fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::CountLeadingZeros => "clz",
            Self::SignExtendByte => "seb",
            Self::SignExtendHalf => "seh",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImmOp2 {
    /// Add with overflow trap.
    AddS,
    AddU,
    And,
    Or,
    Xor,
    SetLtS,
    /// The immediate is sign-extended, then compared unsigned.
    SetLtU,
    // Memory: the address is `rs` plus the sign-extended immediate.
    LoadByteS,
    LoadByteU,
    LoadHalfS,
    LoadHalfU,
    /// Faults on an unaligned address.
    LoadWord,
    StoreByte,
    StoreHalf,
    StoreWord,
}

impl ImmOp2 {
    pub fn is_load(self) -> bool {
        matches!(
            self,
            Self::LoadByteS | Self::LoadByteU | Self::LoadHalfS | Self::LoadHalfU | Self::LoadWord
        )
    }

    pub fn is_store(self) -> bool {
        matches!(self, Self::StoreByte | Self::StoreHalf | Self::StoreWord)
    }

    pub fn is_memory(self) -> bool {
        self.is_load() || self.is_store()
    }

    /// Width in bytes and signedness of a load or store.
    pub fn access(self) -> Option<(u8, bool)> {
        match self {
            Self::LoadByteS => Some((1, true)),
            Self::LoadByteU | Self::StoreByte => Some((1, false)),
            Self::LoadHalfS => Some((2, true)),
            Self::LoadHalfU | Self::StoreHalf => Some((2, false)),
            Self::LoadWord | Self::StoreWord => Some((4, false)),
            _ => None,
        }
    }
}

impl std::fmt::Display for ImmOp2 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::AddS => "addi",
            Self::AddU => "addiu",
            Self::And => "andi",
            Self::Or => "ori",
            Self::Xor => "xori",
            Self::SetLtS => "slti",
            Self::SetLtU => "sltiu",
            Self::LoadByteS => "lb",
            Self::LoadByteU => "lbu",
            Self::LoadHalfS => "lh",
            Self::LoadHalfU => "lhu",
            Self::LoadWord => "lw",
            Self::StoreByte => "sb",
            Self::StoreHalf => "sh",
            Self::StoreWord => "sw",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImmOp1 {
    /// `rt = imm << 16`.
    LoadUpper,
}

impl std::fmt::Display for ImmOp1 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::LoadUpper => "lui",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FRegOp3 {
    Add(FFmt),
    /// `fd = fs - ft`.
    Sub(FFmt),
    Mul(FFmt),
    /// `fd = fs / ft`.
    Div(FFmt),
}

impl FRegOp3 {
    pub fn fmt(self) -> FFmt {
        match self {
            Self::Add(fmt) | Self::Sub(fmt) | Self::Mul(fmt) | Self::Div(fmt) => fmt,
        }
    }
}

impl std::fmt::Display for FRegOp3 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Add(fmt) => write!(f, "add.{fmt}"),
            Self::Sub(fmt) => write!(f, "sub.{fmt}"),
            Self::Mul(fmt) => write!(f, "mul.{fmt}"),
            Self::Div(fmt) => write!(f, "div.{fmt}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FRegOp2 {
    Abs(FFmt),
    Neg(FFmt),
    Sqrt(FFmt),
    Move(FFmt),
    /// `cvt.to.from`, the two formats differ.
    Convert(FFmt, FFmt),
    /// `cvt.fmt.w`: the source holds a signed word.
    ConvertFromWord(FFmt),
    /// `cvt.w.fmt`, rounding to nearest even.
    ConvertToWord(FFmt),
    /// `trunc.w.fmt`, rounding toward zero.
    TruncToWord(FFmt),
}

impl FRegOp2 {
    /// The formats of the destination and the source register.
    pub fn formats(self) -> (FFmt, FFmt) {
        match self {
            Self::Abs(fmt) | Self::Neg(fmt) | Self::Sqrt(fmt) | Self::Move(fmt) => (fmt, fmt),
            Self::Convert(to, from) => (to, from),
            Self::ConvertFromWord(fmt) => (fmt, FFmt::S),
            Self::ConvertToWord(fmt) | Self::TruncToWord(fmt) => (FFmt::S, fmt),
        }
    }
}

impl std::fmt::Display for FRegOp2 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Abs(fmt) => write!(f, "abs.{fmt}"),
            Self::Neg(fmt) => write!(f, "neg.{fmt}"),
            Self::Sqrt(fmt) => write!(f, "sqrt.{fmt}"),
            Self::Move(fmt) => write!(f, "mov.{fmt}"),
            Self::Convert(to, from) => write!(f, "cvt.{to}.{from}"),
            Self::ConvertFromWord(fmt) => write!(f, "cvt.{fmt}.w"),
            Self::ConvertToWord(fmt) => write!(f, "cvt.w.{fmt}"),
            Self::TruncToWord(fmt) => write!(f, "trunc.w.{fmt}"),
        }
    }
}

/// One of the sixteen `c.cond.fmt` predicates.
///
/// The low three bits select which of the unordered, equal and less-than outcomes make the
/// predicate true. The high bit only selects signaling behaviour for NaN operands, which isn't
/// modelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FCond(u8);

impl FCond {
    pub const F: Self = Self(0);
    pub const UN: Self = Self(1);
    pub const EQ: Self = Self(2);
    pub const UEQ: Self = Self(3);
    pub const OLT: Self = Self(4);
    pub const ULT: Self = Self(5);
    pub const OLE: Self = Self(6);
    pub const ULE: Self = Self(7);
    pub const LT: Self = Self(12);
    pub const LE: Self = Self(14);

    pub const fn new(bits: u8) -> Self {
        Self(bits & 0xf)
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn on_unordered(self) -> bool {
        self.0 & 1 != 0
    }

    pub fn on_equal(self) -> bool {
        self.0 & 2 != 0
    }

    pub fn on_less(self) -> bool {
        self.0 & 4 != 0
    }
}

impl std::fmt::Display for FCond {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        const NAMES: [&str; 16] = [
            "f", "un", "eq", "ueq", "olt", "ult", "ole", "ule", "sf", "ngle", "seq", "ngl", "lt",
            "nge", "le", "ngt",
        ];
        f.write_str(NAMES[self.0 as usize])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FImmOp {
    /// Load a word from memory and store it in the first (FPU) register.
    /// Memory address is computed by adding the value in the second (integer) register to the
    /// immediate value.
    LoadWordToFpu,
    /// Store the word from the first (FPU) register to memory.
    StoreWordFromFpu,
    /// Load a doubleword from memory and store it in the first (even floating-point) register.
    LoadDoublewordToFpu,
    /// Store the doubleword from the first (even FPU) register to memory.
    StoreDoublewordFromFpu,
}

impl FImmOp {
    pub fn fmt(self) -> FFmt {
        match self {
            Self::LoadWordToFpu | Self::StoreWordFromFpu => FFmt::S,
            Self::LoadDoublewordToFpu | Self::StoreDoublewordFromFpu => FFmt::D,
        }
    }

    pub fn is_load(self) -> bool {
        matches!(self, Self::LoadWordToFpu | Self::LoadDoublewordToFpu)
    }
}

impl std::fmt::Display for FImmOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::LoadWordToFpu => "lwc1",
            Self::StoreWordFromFpu => "swc1",
            Self::LoadDoublewordToFpu => "ldc1",
            Self::StoreDoublewordFromFpu => "sdc1",
        })
    }
}

/// Floating-point format. Either _single_ ([`FFmt::S`]) or _double_ ([`FFmt::D`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FFmt {
    /// Single precision (32 bits)
    S,
    /// Double precision (64 bits)
    D,
}

impl std::fmt::Display for FFmt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::S => "s",
            Self::D => "d",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrapCond {
    Eq,
    Ne,
    GeS,
    GeU,
    LtS,
    LtU,
}

impl std::fmt::Display for TrapCond {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Eq => "eq",
            Self::Ne => "ne",
            Self::GeS => "ge",
            Self::GeU => "geu",
            Self::LtS => "lt",
            Self::LtU => "ltu",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BCond {
    Eq,
    Ne,
}

impl std::fmt::Display for BCond {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Eq => "eq",
            Self::Ne => "ne",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BZCond {
    GeZ,
    GtZ,
    LeZ,
    LtZ,
}

impl std::fmt::Display for BZCond {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::GeZ => "gez",
            Self::GtZ => "gtz",
            Self::LeZ => "lez",
            Self::LtZ => "ltz",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BZalCond {
    GeZ,
    LtZ,
}

impl std::fmt::Display for BZalCond {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::GeZ => "gez",
            Self::LtZ => "ltz",
        })
    }
}
