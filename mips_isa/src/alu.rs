//! Integer and comparison semantics of the instruction set, shared by the interpreter and by
//! compile-time constant folding so both always agree.

use crate::{BCond, BZCond, BZalCond, FCond, ImmOp2, RegOp2, RegOp3, ShiftOp, TrapCond, UnaryOp};

pub fn sign_extend16(imm: u16) -> u32 {
    imm as i16 as i32 as u32
}

/// Signed division as performed by `div`: division by zero yields a zero quotient and leaves the
/// dividend as remainder, `i32::MIN / -1` wraps.
pub fn div_s(rs: u32, rt: u32) -> (u32, u32) {
    let (a, b) = (rs as i32, rt as i32);
    if b == 0 {
        return (0, rs);
    }
    (a.wrapping_div(b) as u32, a.wrapping_rem(b) as u32)
}

/// Unsigned division as performed by `divu`, with the same division by zero convention as
/// [`div_s`].
pub fn div_u(rs: u32, rt: u32) -> (u32, u32) {
    if rt == 0 {
        return (0, rs);
    }
    (rs / rt, rs % rt)
}

/// Converts to a word as `cvt.w`/`trunc.w` do with exceptions disabled: NaN and values that don't
/// fit produce `0x7fff_ffff`.
pub fn fp_to_word(value: f64, round_to_even: bool) -> u32 {
    let value = if round_to_even {
        value.round_ties_even()
    } else {
        value.trunc()
    };
    if value.is_nan() || value < i32::MIN as f64 || value > i32::MAX as f64 {
        i32::MAX as u32
    } else {
        value as i32 as u32
    }
}

pub fn add_overflows(a: u32, b: u32) -> bool {
    (a as i32).checked_add(b as i32).is_none()
}

pub fn sub_overflows(a: u32, b: u32) -> bool {
    (a as i32).checked_sub(b as i32).is_none()
}

impl ShiftOp {
    pub fn eval(self, rt: u32, amount: u32) -> u32 {
        let amount = amount & 0x1f;
        match self {
            Self::LeftLogical => rt << amount,
            Self::RightLogical => rt >> amount,
            Self::RightArithmetic => ((rt as i32) >> amount) as u32,
        }
    }
}

impl RegOp3 {
    /// Computes the new value of `rd`. `rd` is the previous value, which the conditional moves
    /// keep when their condition fails. Trapping arithmetic wraps, the caller checks for overflow.
    pub fn eval(self, rs: u32, rt: u32, rd: u32) -> u32 {
        match self {
            Self::AddS | Self::AddU => rs.wrapping_add(rt),
            Self::SubS | Self::SubU => rs.wrapping_sub(rt),
            Self::And => rs & rt,
            Self::Or => rs | rt,
            Self::Nor => !(rs | rt),
            Self::Xor => rs ^ rt,
            Self::ShiftLeftLogical => ShiftOp::LeftLogical.eval(rt, rs),
            Self::ShiftRightLogical => ShiftOp::RightLogical.eval(rt, rs),
            Self::ShiftRightArithmetic => ShiftOp::RightArithmetic.eval(rt, rs),
            Self::SetLtS => ((rs as i32) < (rt as i32)) as u32,
            Self::SetLtU => (rs < rt) as u32,
            Self::MoveIfZero => {
                if rt == 0 {
                    rs
                } else {
                    rd
                }
            }
            Self::MoveIfNotZero => {
                if rt != 0 {
                    rs
                } else {
                    rd
                }
            }
            Self::Mul => rs.wrapping_mul(rt),
        }
    }
}

impl RegOp2 {
    /// Returns the new `(hi, lo)` pair.
    pub fn eval(self, rs: u32, rt: u32) -> (u32, u32) {
        match self {
            Self::MultS => {
                let product = (rs as i32 as i64).wrapping_mul(rt as i32 as i64) as u64;
                ((product >> 32) as u32, product as u32)
            }
            Self::MultU => {
                let product = rs as u64 * rt as u64;
                ((product >> 32) as u32, product as u32)
            }
            Self::DivS => {
                let (quotient, remainder) = div_s(rs, rt);
                (remainder, quotient)
            }
            Self::DivU => {
                let (quotient, remainder) = div_u(rs, rt);
                (remainder, quotient)
            }
        }
    }
}

impl UnaryOp {
    pub fn eval(self, value: u32) -> u32 {
        match self {
            Self::CountLeadingZeros => value.leading_zeros(),
            Self::SignExtendByte => value as i8 as i32 as u32,
            Self::SignExtendHalf => value as i16 as i32 as u32,
        }
    }
}

impl ImmOp2 {
    /// Evaluates the arithmetic immediate ops. Returns `None` for loads and stores, whose result
    /// depends on memory.
    pub fn eval(self, rs: u32, imm: u16) -> Option<u32> {
        Some(match self {
            Self::AddS | Self::AddU => rs.wrapping_add(sign_extend16(imm)),
            Self::And => rs & imm as u32,
            Self::Or => rs | imm as u32,
            Self::Xor => rs ^ imm as u32,
            Self::SetLtS => ((rs as i32) < (sign_extend16(imm) as i32)) as u32,
            Self::SetLtU => (rs < sign_extend16(imm)) as u32,
            _ => return None,
        })
    }
}

impl BCond {
    pub fn eval(self, rs: u32, rt: u32) -> bool {
        match self {
            Self::Eq => rs == rt,
            Self::Ne => rs != rt,
        }
    }
}

impl BZCond {
    pub fn eval(self, rs: u32) -> bool {
        let rs = rs as i32;
        match self {
            Self::GeZ => rs >= 0,
            Self::GtZ => rs > 0,
            Self::LeZ => rs <= 0,
            Self::LtZ => rs < 0,
        }
    }
}

impl BZalCond {
    pub fn eval(self, rs: u32) -> bool {
        match self {
            Self::GeZ => BZCond::GeZ.eval(rs),
            Self::LtZ => BZCond::LtZ.eval(rs),
        }
    }
}

impl TrapCond {
    pub fn eval(self, rs: u32, rt: u32) -> bool {
        match self {
            Self::Eq => rs == rt,
            Self::Ne => rs != rt,
            Self::GeS => rs as i32 >= rt as i32,
            Self::GeU => rs >= rt,
            Self::LtS => (rs as i32) < rt as i32,
            Self::LtU => rs < rt,
        }
    }
}

impl FCond {
    /// Evaluates the predicate. Single-precision operands are widened first, which is exact.
    pub fn eval(self, a: f64, b: f64) -> bool {
        if a.is_nan() || b.is_nan() {
            return self.on_unordered();
        }
        (self.on_less() && a < b) || (self.on_equal() && a == b)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn division_by_zero_is_defined() {
        assert_eq!(div_s(7, 0), (0, 7));
        assert_eq!(div_u(7, 0), (0, 7));
        assert_eq!(div_s(i32::MIN as u32, -1i32 as u32), (i32::MIN as u32, 0));
        assert_eq!(RegOp2::DivS.eval(-7i32 as u32, 2), (-1i32 as u32, -3i32 as u32));
    }

    #[test]
    fn multiplication_splits_into_hi_and_lo() {
        assert_eq!(RegOp2::MultU.eval(0xffff_ffff, 2), (1, 0xffff_fffe));
        assert_eq!(RegOp2::MultS.eval(-1i32 as u32, 2), (0xffff_ffff, 0xffff_fffe));
    }

    #[test]
    fn set_less_than_unsigned_immediate_is_sign_extended() {
        assert_eq!(ImmOp2::SetLtU.eval(5, 0xffff), Some(1));
        assert_eq!(ImmOp2::SetLtS.eval(5, 0xffff), Some(0));
        assert_eq!(ImmOp2::LoadWord.eval(5, 0), None);
    }

    #[test]
    fn conditional_moves_keep_destination() {
        assert_eq!(RegOp3::MoveIfZero.eval(1, 0, 9), 1);
        assert_eq!(RegOp3::MoveIfZero.eval(1, 3, 9), 9);
        assert_eq!(RegOp3::MoveIfNotZero.eval(1, 3, 9), 1);
    }

    #[test]
    fn fp_conditions_handle_unordered_operands() {
        assert!(FCond::UN.eval(f64::NAN, 1.0));
        assert!(!FCond::EQ.eval(f64::NAN, f64::NAN));
        assert!(FCond::ULE.eval(f64::NAN, 0.0));
        assert!(FCond::OLE.eval(1.0, 1.0));
        assert!(!FCond::OLT.eval(1.0, 1.0));
        assert!(FCond::LT.eval(-1.0, 1.0));
        assert!(!FCond::F.eval(1.0, 1.0));
    }

    #[test]
    fn invalid_fp_conversions_produce_the_largest_word() {
        assert_eq!(fp_to_word(2.5, true), 2);
        assert_eq!(fp_to_word(3.5, true), 4);
        assert_eq!(fp_to_word(-2.7, false), -2i32 as u32);
        assert_eq!(fp_to_word(f64::NAN, false), 0x7fff_ffff);
        assert_eq!(fp_to_word(-3e9, false), 0x7fff_ffff);
    }

    #[test]
    fn overflow_is_detected_on_signed_boundaries() {
        assert!(add_overflows(i32::MAX as u32, 1));
        assert!(!add_overflows(u32::MAX, 1));
        assert!(sub_overflows(i32::MIN as u32, 1));
    }
}
