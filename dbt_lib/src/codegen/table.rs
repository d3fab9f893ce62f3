use crate::analysis::{ConstRegs, ConstValue, FpTouched, FprForm};
use crate::region::PhiReg;
use mips_isa::{FReg, Fcr, HiLo, Reg};
use region_ir::{BinOp, CastOp, FunctionBuilder, Ty, Value};

/// Representation a floating-point register currently has in the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FprSlot {
    Untouched,
    Single(Value),
    Bits(Value),
    /// An `f64` held by this even register and its partner.
    Double(Value),
    /// The odd half of a [`FprSlot::Double`].
    DoubleHigh,
}

/// The IR value currently held by every guest register during code generation, along with the
/// constant state of the general purpose registers.
///
/// Each block of the dominator tree gets its own copy, so definitions made while lowering one
/// subtree never leak into its siblings.
#[derive(Debug, Clone)]
pub(crate) struct RegisterTable {
    gpr: [Option<Value>; 32],
    consts: ConstRegs,
    hilo: [Option<Value>; 2],
    fpr: [FprSlot; 32],
    fcr: [Option<Value>; Fcr::COUNT],
    icnt: Option<Value>,
}

impl RegisterTable {
    pub fn new(zero: Value) -> Self {
        let mut gpr = [None; 32];
        gpr[0] = Some(zero);
        Self {
            gpr,
            consts: ConstRegs::variant(),
            hilo: [None; 2],
            fpr: [FprSlot::Untouched; 32],
            fcr: [None; Fcr::COUNT],
            icnt: None,
        }
    }

    // will panic if the register was never loaded, which means the region's live-in set is wrong
    pub fn gpr(&self, reg: Reg) -> Value {
        self.gpr[reg.index()].expect("register read before it was loaded")
    }

    pub fn set_gpr(&mut self, reg: Reg, value: Value, known: ConstValue) {
        if reg.is_zero() {
            return;
        }
        self.gpr[reg.index()] = Some(value);
        self.consts.set(reg, known);
    }

    pub fn consts(&self) -> &ConstRegs {
        &self.consts
    }

    pub fn hilo(&self, hilo: HiLo) -> Value {
        self.hilo[hilo.index()].expect("HI/LO read before it was loaded")
    }

    pub fn set_hilo(&mut self, hilo: HiLo, value: Value) {
        self.hilo[hilo.index()] = Some(value);
    }

    pub fn fcr(&self, fcr: Fcr) -> Value {
        self.fcr[fcr.index()].expect("FPU control register read before it was loaded")
    }

    pub fn set_fcr(&mut self, fcr: Fcr, value: Value) {
        self.fcr[fcr.index()] = Some(value);
    }

    pub fn icnt(&self) -> Value {
        self.icnt.expect("instruction counter read before it was loaded")
    }

    pub fn set_icnt(&mut self, value: Value) {
        self.icnt = Some(value);
    }

    /// Returns the bits of `reg` as an `i32`.
    pub fn read_bits(&self, b: &mut FunctionBuilder, reg: FReg) -> Value {
        match self.fpr[reg.index()] {
            FprSlot::Bits(value) => value,
            FprSlot::Single(value) => b.cast(CastOp::Bitcast, value, Ty::I32),
            FprSlot::Double(value) => {
                let bits = b.cast(CastOp::Bitcast, value, Ty::I64);
                b.cast(CastOp::Trunc, bits, Ty::I32)
            }
            FprSlot::DoubleHigh => {
                let FprSlot::Double(value) = self.fpr[reg.pair_base().index()] else {
                    unreachable!("the high half of a double without its low half")
                };
                let bits = b.cast(CastOp::Bitcast, value, Ty::I64);
                let shift = b.iconst(Ty::I64, 32);
                let high = b.binary(BinOp::LShr, bits, shift);
                b.cast(CastOp::Trunc, high, Ty::I32)
            }
            FprSlot::Untouched => panic!("{reg} read before it was loaded"),
        }
    }

    /// Returns `reg` as an `f32`.
    pub fn read_single(&self, b: &mut FunctionBuilder, reg: FReg) -> Value {
        match self.fpr[reg.index()] {
            FprSlot::Single(value) => value,
            _ => {
                let bits = self.read_bits(b, reg);
                b.cast(CastOp::Bitcast, bits, Ty::F32)
            }
        }
    }

    /// Returns the pair starting at the even register `reg` as an `f64`.
    pub fn read_double(&self, b: &mut FunctionBuilder, reg: FReg) -> Value {
        let base = reg.pair_base();
        if let FprSlot::Double(value) = self.fpr[base.index()] {
            return value;
        }
        let low = self.read_bits(b, base);
        let high = self.read_bits(b, base.pair_partner());
        let low = b.cast(CastOp::ZExt, low, Ty::I64);
        let high = b.cast(CastOp::ZExt, high, Ty::I64);
        let shift = b.iconst(Ty::I64, 32);
        let high = b.binary(BinOp::Shl, high, shift);
        let bits = b.binary(BinOp::Or, high, low);
        b.cast(CastOp::Bitcast, bits, Ty::F64)
    }

    pub fn write_bits(&mut self, b: &mut FunctionBuilder, reg: FReg, value: Value) {
        self.split_pair(b, reg);
        self.fpr[reg.index()] = FprSlot::Bits(value);
    }

    pub fn write_single(&mut self, b: &mut FunctionBuilder, reg: FReg, value: Value) {
        self.split_pair(b, reg);
        self.fpr[reg.index()] = FprSlot::Single(value);
    }

    pub fn write_double(&mut self, reg: FReg, value: Value) {
        let base = reg.pair_base();
        self.fpr[base.index()] = FprSlot::Double(value);
        self.fpr[base.pair_partner().index()] = FprSlot::DoubleHigh;
    }

    /// Before one half of a double pair is overwritten, the other half keeps its own bits.
    fn split_pair(&mut self, b: &mut FunctionBuilder, reg: FReg) {
        let base = reg.pair_base();
        if !matches!(self.fpr[base.index()], FprSlot::Double(_)) {
            return;
        }
        let partner = reg.pair_partner();
        let bits = self.read_bits(b, partner);
        self.fpr[partner.index()] = FprSlot::Bits(bits);
        // The written half is replaced right after.
        self.fpr[reg.index()] = FprSlot::Untouched;
    }

    /// Returns the value of `reg` in the representation it has at region boundaries.
    pub fn get(&self, b: &mut FunctionBuilder, reg: PhiReg, fp: &FpTouched) -> Value {
        match reg {
            PhiReg::Gpr(reg) => self.gpr(reg),
            PhiReg::HiLo(hilo) => self.hilo(hilo),
            PhiReg::Fcr(fcr) => self.fcr(fcr),
            PhiReg::Icnt => self.icnt(),
            PhiReg::Fpr(freg) => match fp.form(freg) {
                FprForm::Single => self.read_single(b, freg),
                FprForm::Double => self.read_double(b, freg),
                FprForm::Bits | FprForm::Covered => self.read_bits(b, freg),
            },
        }
    }

    /// Sets `reg` to a value in its boundary representation, as produced by a phi or an entry load.
    pub fn set(&mut self, b: &mut FunctionBuilder, reg: PhiReg, value: Value, fp: &FpTouched) {
        match reg {
            PhiReg::Gpr(reg) => self.set_gpr(reg, value, ConstValue::Variant),
            PhiReg::HiLo(hilo) => self.set_hilo(hilo, value),
            PhiReg::Fcr(fcr) => self.set_fcr(fcr, value),
            PhiReg::Icnt => self.set_icnt(value),
            PhiReg::Fpr(freg) => match fp.form(freg) {
                FprForm::Single => self.write_single(b, freg, value),
                FprForm::Double => self.write_double(freg, value),
                FprForm::Bits | FprForm::Covered => self.write_bits(b, freg, value),
            },
        }
    }
}
