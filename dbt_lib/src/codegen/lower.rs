//! Lowering of single guest instructions.

use super::{CodeGenerator, RegisterTable};
use crate::analysis::{constant, ConstValue};
use mips_isa::{
    alu, effective_defs, BCond, BZCond, FFmt, FImmOp, FReg, FRegOp2, FRegOp3, Fcr, HiLo, ImmOp1,
    ImmOp2, Instruction, RegOp1, RegOp2, RegOp3, RegRef, ShiftOp, UnaryOp,
};
use region_ir::{BinOp, CastOp, FloatCC, IntCC, MemWidth, Ty, UnOp, Value};

impl CodeGenerator<'_> {
    /// Emits the code of an instruction that doesn't transfer control.
    pub(super) fn lower(&mut self, insn: &Instruction, addr: u32, table: &mut RegisterTable) {
        if self.config.fold_constants() {
            if let Some(value) = constant::fold(insn, addr, table.consts()) {
                for def in effective_defs(insn.defs()) {
                    if let RegRef::Gpr(reg) = def {
                        let folded = self.b.iconst(Ty::I32, value as u64);
                        table.set_gpr(reg, folded, ConstValue::Constant(value));
                    }
                }
                return;
            }
        }

        match *insn {
            Instruction::Nop | Instruction::Sync => {}
            Instruction::Shift(op, rd, rt, sa) => {
                let amount = self.b.iconst(Ty::I32, sa as u64);
                let value = self.b.binary(shift_op(op), table.gpr(rt), amount);
                table.set_gpr(rd, value, ConstValue::Variant);
            }
            Instruction::Reg3(op, rd, rs, rt) => {
                let value = self.lower_reg3(op, table.gpr(rd), table.gpr(rs), table.gpr(rt));
                table.set_gpr(rd, value, ConstValue::Variant);
            }
            Instruction::Reg2(op, rs, rt) => {
                let (hi, lo) = self.lower_reg2(op, table.gpr(rs), table.gpr(rt));
                table.set_hilo(HiLo::Hi, hi);
                table.set_hilo(HiLo::Lo, lo);
            }
            Instruction::Reg1(op, reg) => match op {
                RegOp1::MoveFromHi => table.set_gpr(reg, table.hilo(HiLo::Hi), ConstValue::Variant),
                RegOp1::MoveFromLo => table.set_gpr(reg, table.hilo(HiLo::Lo), ConstValue::Variant),
                RegOp1::MoveToHi => table.set_hilo(HiLo::Hi, table.gpr(reg)),
                RegOp1::MoveToLo => table.set_hilo(HiLo::Lo, table.gpr(reg)),
            },
            Instruction::Unary(op, rd, src) => {
                let src = table.gpr(src);
                let value = match op {
                    UnaryOp::CountLeadingZeros => self.b.unary(UnOp::Clz, src),
                    UnaryOp::SignExtendByte => self.sign_extend_from(src, 8),
                    UnaryOp::SignExtendHalf => self.sign_extend_from(src, 16),
                };
                table.set_gpr(rd, value, ConstValue::Variant);
            }
            Instruction::Imm2(op, rt, rs, imm) => self.lower_imm2(op, rt, rs, imm, table),
            Instruction::Imm1(ImmOp1::LoadUpper, rt, imm) => {
                let value = self.b.iconst(Ty::I32, (imm as u64) << 16);
                table.set_gpr(rt, value, ConstValue::Constant((imm as u32) << 16));
            }
            Instruction::FReg3(op, fd, fs, ft) => self.lower_freg3(op, fd, fs, ft, table),
            Instruction::FReg2(op, fd, fs) => self.lower_freg2(op, fd, fs, table),
            Instruction::FCompare(cond, fmt, cc, fs, ft) => {
                let (a, b) = match fmt {
                    FFmt::S => (table.read_single(&mut self.b, fs), table.read_single(&mut self.b, ft)),
                    FFmt::D => (table.read_double(&mut self.b, fs), table.read_double(&mut self.b, ft)),
                };
                let cc_cond =
                    FloatCC::from_relations(cond.on_unordered(), cond.on_equal(), cond.on_less());
                let outcome = self.b.fcmp(cc_cond, a, b);
                let outcome = self.b.cast(CastOp::ZExt, outcome, Ty::I32);
                let shift = self.b.iconst(Ty::I32, cc as u64);
                let bit = self.b.binary(BinOp::Shl, outcome, shift);
                let mask = self.b.iconst(Ty::I32, !(1u32 << cc) as u64);
                let kept = self.b.binary(BinOp::And, table.fcr(Fcr::Fccr), mask);
                let fccr = self.b.binary(BinOp::Or, kept, bit);
                table.set_fcr(Fcr::Fccr, fccr);
            }
            Instruction::FImm(op, ft, base, offset) => {
                let ea = self.effective_address(table.gpr(base), offset);
                match op {
                    FImmOp::LoadWordToFpu => {
                        let bits = self.b.load(MemWidth::Word, false, ea, Ty::I32);
                        table.write_bits(&mut self.b, ft, bits);
                    }
                    FImmOp::StoreWordFromFpu => {
                        let bits = table.read_bits(&mut self.b, ft);
                        self.b.store(MemWidth::Word, ea, bits);
                    }
                    FImmOp::LoadDoublewordToFpu => {
                        let bits = self.b.load(MemWidth::Double, false, ea, Ty::I64);
                        let value = self.b.cast(CastOp::Bitcast, bits, Ty::F64);
                        table.write_double(ft, value);
                    }
                    FImmOp::StoreDoublewordFromFpu => {
                        let value = table.read_double(&mut self.b, ft);
                        let bits = self.b.cast(CastOp::Bitcast, value, Ty::I64);
                        self.b.store(MemWidth::Double, ea, bits);
                    }
                }
            }
            Instruction::MoveFromFpu(rt, fs) => {
                let bits = table.read_bits(&mut self.b, fs);
                table.set_gpr(rt, bits, ConstValue::Variant);
            }
            Instruction::MoveToFpu(rt, fs) => {
                let bits = table.gpr(rt);
                table.write_bits(&mut self.b, fs, bits);
            }
            Instruction::MoveFromFcr(rt, fcr) => table.set_gpr(rt, table.fcr(fcr), ConstValue::Variant),
            Instruction::MoveToFcr(rt, fcr) => table.set_fcr(fcr, table.gpr(rt)),
            Instruction::Branch(..)
            | Instruction::BranchZ(..)
            | Instruction::BranchZAndLink(..)
            | Instruction::BranchFCond(..)
            | Instruction::Jump(_)
            | Instruction::JumpAndLink(_)
            | Instruction::JumpReg(_)
            | Instruction::JumpAndLinkReg(..) => {
                unreachable!("control transfers are lowered with their block")
            }
            Instruction::Trap(..)
            | Instruction::Syscall
            | Instruction::Break
            | Instruction::Unknown(_) => unreachable!("{insn} can't be compiled"),
        }
    }

    /// Computes the `i1` deciding a conditional branch.
    pub(super) fn branch_condition(&mut self, insn: &Instruction, table: &RegisterTable) -> Value {
        match *insn {
            Instruction::Branch(cond, rs, rt, ..) => {
                let cc = match cond {
                    BCond::Eq => IntCC::Eq,
                    BCond::Ne => IntCC::Ne,
                };
                self.b.icmp(cc, table.gpr(rs), table.gpr(rt))
            }
            Instruction::BranchZ(cond, rs, ..) => {
                let cc = match cond {
                    BZCond::GeZ => IntCC::Sge,
                    BZCond::GtZ => IntCC::Sgt,
                    BZCond::LeZ => IntCC::Sle,
                    BZCond::LtZ => IntCC::Slt,
                };
                let zero = self.b.iconst(Ty::I32, 0);
                self.b.icmp(cc, table.gpr(rs), zero)
            }
            Instruction::BranchFCond(on_true, cc, ..) => {
                let shift = self.b.iconst(Ty::I32, cc as u64);
                let shifted = self.b.binary(BinOp::LShr, table.fcr(Fcr::Fccr), shift);
                let one = self.b.iconst(Ty::I32, 1);
                let bit = self.b.binary(BinOp::And, shifted, one);
                let zero = self.b.iconst(Ty::I32, 0);
                let cc = if on_true { IntCC::Ne } else { IntCC::Eq };
                self.b.icmp(cc, bit, zero)
            }
            _ => unreachable!("{insn} is not a conditional branch"),
        }
    }

    fn lower_reg3(&mut self, op: RegOp3, rd: Value, rs: Value, rt: Value) -> Value {
        let b = &mut self.b;
        match op {
            RegOp3::AddU => b.binary(BinOp::Add, rs, rt),
            RegOp3::SubU => b.binary(BinOp::Sub, rs, rt),
            RegOp3::And => b.binary(BinOp::And, rs, rt),
            RegOp3::Or => b.binary(BinOp::Or, rs, rt),
            RegOp3::Xor => b.binary(BinOp::Xor, rs, rt),
            RegOp3::Nor => {
                let or = b.binary(BinOp::Or, rs, rt);
                b.unary(UnOp::Not, or)
            }
            // Variable shifts: `rt` shifted by `rs`.
            RegOp3::ShiftLeftLogical => b.binary(BinOp::Shl, rt, rs),
            RegOp3::ShiftRightLogical => b.binary(BinOp::LShr, rt, rs),
            RegOp3::ShiftRightArithmetic => b.binary(BinOp::AShr, rt, rs),
            RegOp3::SetLtS | RegOp3::SetLtU => {
                let cc = if op == RegOp3::SetLtS {
                    IntCC::Slt
                } else {
                    IntCC::Ult
                };
                let less = b.icmp(cc, rs, rt);
                b.cast(CastOp::ZExt, less, Ty::I32)
            }
            RegOp3::MoveIfZero | RegOp3::MoveIfNotZero => {
                let zero = b.iconst(Ty::I32, 0);
                let cc = if op == RegOp3::MoveIfZero {
                    IntCC::Eq
                } else {
                    IntCC::Ne
                };
                let moves = b.icmp(cc, rt, zero);
                b.select(moves, rs, rd)
            }
            RegOp3::Mul => b.binary(BinOp::Mul, rs, rt),
            RegOp3::AddS | RegOp3::SubS => unreachable!("trapping arithmetic can't be compiled"),
        }
    }

    /// Returns the new `(hi, lo)`.
    fn lower_reg2(&mut self, op: RegOp2, rs: Value, rt: Value) -> (Value, Value) {
        let b = &mut self.b;
        match op {
            RegOp2::MultS | RegOp2::MultU => {
                let ext = if op == RegOp2::MultS {
                    CastOp::SExt
                } else {
                    CastOp::ZExt
                };
                let a = b.cast(ext, rs, Ty::I64);
                let c = b.cast(ext, rt, Ty::I64);
                let product = b.binary(BinOp::Mul, a, c);
                let shift = b.iconst(Ty::I64, 32);
                let high = b.binary(BinOp::LShr, product, shift);
                let hi = b.cast(CastOp::Trunc, high, Ty::I32);
                let lo = b.cast(CastOp::Trunc, product, Ty::I32);
                (hi, lo)
            }
            RegOp2::DivS => {
                let quotient = b.binary(BinOp::SDiv, rs, rt);
                let remainder = b.binary(BinOp::SRem, rs, rt);
                (remainder, quotient)
            }
            RegOp2::DivU => {
                let quotient = b.binary(BinOp::UDiv, rs, rt);
                let remainder = b.binary(BinOp::URem, rs, rt);
                (remainder, quotient)
            }
        }
    }

    fn lower_imm2(
        &mut self,
        op: ImmOp2,
        rt: mips_isa::Reg,
        rs: mips_isa::Reg,
        imm: u16,
        table: &mut RegisterTable,
    ) {
        let base = table.gpr(rs);
        if let Some((bytes, signed)) = op.access() {
            let ea = self.effective_address(base, imm);
            let width = crate::state::mem_width(bytes);
            if op.is_load() {
                let value = self.b.load(width, signed, ea, Ty::I32);
                table.set_gpr(rt, value, ConstValue::Variant);
            } else {
                self.b.store(width, ea, table.gpr(rt));
            }
            return;
        }

        let sext = self.b.iconst(Ty::I32, alu::sign_extend16(imm) as u64);
        let value = match op {
            ImmOp2::AddU => self.b.binary(BinOp::Add, base, sext),
            ImmOp2::And | ImmOp2::Or | ImmOp2::Xor => {
                let zext = self.b.iconst(Ty::I32, imm as u64);
                let bin = match op {
                    ImmOp2::And => BinOp::And,
                    ImmOp2::Or => BinOp::Or,
                    _ => BinOp::Xor,
                };
                self.b.binary(bin, base, zext)
            }
            ImmOp2::SetLtS | ImmOp2::SetLtU => {
                let cc = if op == ImmOp2::SetLtS {
                    IntCC::Slt
                } else {
                    IntCC::Ult
                };
                let less = self.b.icmp(cc, base, sext);
                self.b.cast(CastOp::ZExt, less, Ty::I32)
            }
            _ => unreachable!("{op} can't be compiled"),
        };
        table.set_gpr(rt, value, ConstValue::Variant);
    }

    fn lower_freg3(
        &mut self,
        op: FRegOp3,
        fd: FReg,
        fs: FReg,
        ft: FReg,
        table: &mut RegisterTable,
    ) {
        let bin = match op {
            FRegOp3::Add(_) => BinOp::FAdd,
            FRegOp3::Sub(_) => BinOp::FSub,
            FRegOp3::Mul(_) => BinOp::FMul,
            FRegOp3::Div(_) => BinOp::FDiv,
        };
        match op.fmt() {
            FFmt::S => {
                let a = table.read_single(&mut self.b, fs);
                let c = table.read_single(&mut self.b, ft);
                let value = self.b.binary(bin, a, c);
                table.write_single(&mut self.b, fd, value);
            }
            FFmt::D => {
                let a = table.read_double(&mut self.b, fs);
                let c = table.read_double(&mut self.b, ft);
                let value = self.b.binary(bin, a, c);
                table.write_double(fd, value);
            }
        }
    }

    fn lower_freg2(&mut self, op: FRegOp2, fd: FReg, fs: FReg, table: &mut RegisterTable) {
        let (to, from) = op.formats();
        let src = match op {
            FRegOp2::ConvertFromWord(_) => table.read_bits(&mut self.b, fs),
            _ => self.read_fp(fs, from, table),
        };
        let value = match op {
            FRegOp2::Abs(_) => self.b.unary(UnOp::FAbs, src),
            FRegOp2::Neg(_) => self.b.unary(UnOp::FNeg, src),
            FRegOp2::Sqrt(_) => self.b.unary(UnOp::FSqrt, src),
            FRegOp2::Move(_) => src,
            FRegOp2::Convert(FFmt::S, _) => self.b.cast(CastOp::FpTrunc, src, Ty::F32),
            FRegOp2::Convert(FFmt::D, _) => self.b.cast(CastOp::FpExt, src, Ty::F64),
            FRegOp2::ConvertFromWord(fmt) => self.b.cast(CastOp::SiToFp, src, fp_ty(fmt)),
            FRegOp2::ConvertToWord(_) | FRegOp2::TruncToWord(_) => {
                let rounded = if matches!(op, FRegOp2::ConvertToWord(_)) {
                    self.b.unary(UnOp::FRoundEven, src)
                } else {
                    src
                };
                let word = self.b.cast(CastOp::FpToSi, rounded, Ty::I32);
                table.write_bits(&mut self.b, fd, word);
                return;
            }
        };
        match to {
            FFmt::S => table.write_single(&mut self.b, fd, value),
            FFmt::D => table.write_double(fd, value),
        }
    }

    fn read_fp(&mut self, reg: FReg, fmt: FFmt, table: &RegisterTable) -> Value {
        match fmt {
            FFmt::S => table.read_single(&mut self.b, reg),
            FFmt::D => table.read_double(&mut self.b, reg),
        }
    }

    fn effective_address(&mut self, base: Value, offset: u16) -> Value {
        let offset = self.b.iconst(Ty::I32, alu::sign_extend16(offset) as u64);
        self.b.binary(BinOp::Add, base, offset)
    }

    /// Sign extends the low `bits` bits of `value`.
    fn sign_extend_from(&mut self, value: Value, bits: u64) -> Value {
        let shift = self.b.iconst(Ty::I32, 32 - bits);
        let shifted = self.b.binary(BinOp::Shl, value, shift);
        self.b.binary(BinOp::AShr, shifted, shift)
    }
}

fn shift_op(op: ShiftOp) -> BinOp {
    match op {
        ShiftOp::LeftLogical => BinOp::Shl,
        ShiftOp::RightLogical => BinOp::LShr,
        ShiftOp::RightArithmetic => BinOp::AShr,
    }
}

fn fp_ty(fmt: FFmt) -> Ty {
    match fmt {
        FFmt::S => Ty::F32,
        FFmt::D => Ty::F64,
    }
}
