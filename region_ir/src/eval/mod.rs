//! Reference interpreter for region functions. It defines the meaning of every instruction and
//! serves as the execution backend of the translator.


use crate::{
    BinOp, BlockId, CastOp, ExitReason, Function, GuestLoc, Inst, IntCC, MemWidth, Terminator,
    Ty, UnOp,
};

/// Access to the guest state a region runs against.
pub trait GuestMachine {
    fn read_guest(&self, loc: GuestLoc) -> u64;
    fn write_guest(&mut self, loc: GuestLoc, bits: u64);
    /// Returns the zero-extended big-endian value at `addr`.
    fn load(&self, addr: u32, width: MemWidth) -> u64;
    fn store(&mut self, addr: u32, width: MemWidth, bits: u64);
}

/// Where and why a region was left.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Exit {
    pub pc: u32,
    pub reason: ExitReason,
}

/// Runs `func` against `machine` until it exits. The function must have been validated.
pub fn execute(func: &Function, machine: &mut dyn GuestMachine) -> Exit {
    let mut values = vec![0u64; func.value_count()];
    let mut block = func.entry();
    let mut pred: Option<BlockId> = None;

    loop {
        let current = func.block(block);

        // Phis read the values of the predecessor, so all of them are evaluated before any is
        // assigned.
        let incoming: Vec<_> = current
            .phis()
            .map(|phi| match phi {
                Inst::Phi { dst, incoming } => {
                    let from = pred.expect("validated functions don't have phis in the entry");
                    let (_, value) = incoming
                        .iter()
                        .find(|(b, _)| *b == from)
                        .expect("validated phis cover every predecessor");
                    (*dst, values[value.index()])
                }
                _ => unreachable!(),
            })
            .collect();
        for (dst, bits) in incoming {
            values[dst.index()] = bits;
        }

        for inst in current.instructions.iter().skip_while(|inst| inst.is_phi()) {
            step(func, inst, &mut values, machine);
        }

        let terminator = current
            .terminator
            .as_ref()
            .expect("validated blocks are terminated");
        pred = Some(block);
        block = match *terminator {
            Terminator::Jump(target) => target,
            Terminator::Branch {
                cond,
                if_true,
                if_false,
                ..
            } => {
                if values[cond.index()] & 1 == 1 {
                    if_true
                } else {
                    if_false
                }
            }
            Terminator::Exit { pc, reason } => {
                return Exit {
                    pc: values[pc.index()] as u32,
                    reason,
                }
            }
        };
    }
}

fn step(func: &Function, inst: &Inst, values: &mut [u64], machine: &mut dyn GuestMachine) {
    let get = |value: crate::Value| values[value.index()];
    let (dst, bits) = match *inst {
        Inst::Const { dst, bits } => (dst, bits),
        Inst::Binary { dst, op, lhs, rhs } => {
            (dst, binary(op, func.value_ty(dst), get(lhs), get(rhs)))
        }
        Inst::Unary { dst, op, src } => (dst, unary(op, func.value_ty(dst), get(src))),
        Inst::Icmp {
            dst,
            cond,
            lhs,
            rhs,
        } => (
            dst,
            icmp(cond, func.value_ty(lhs), get(lhs), get(rhs)) as u64,
        ),
        Inst::Fcmp {
            dst,
            cond,
            lhs,
            rhs,
        } => {
            let ty = func.value_ty(lhs);
            (
                dst,
                cond.eval(to_f64(ty, get(lhs)), to_f64(ty, get(rhs))) as u64,
            )
        }
        Inst::Select {
            dst,
            cond,
            if_true,
            if_false,
        } => {
            let chosen = if get(cond) & 1 == 1 { if_true } else { if_false };
            (dst, get(chosen))
        }
        Inst::Cast { dst, op, src } => (
            dst,
            cast(op, func.value_ty(src), func.value_ty(dst), get(src)),
        ),
        Inst::Load {
            dst,
            width,
            signed,
            addr,
        } => {
            let raw = machine.load(get(addr) as u32, width);
            let bits = if signed {
                sign_extend(raw, width.bytes() * 8) as u64
            } else {
                raw
            };
            (dst, bits & func.value_ty(dst).mask())
        }
        Inst::Store { width, addr, value } => {
            let mask = match width {
                MemWidth::Double => u64::MAX,
                _ => (1 << (width.bytes() * 8)) - 1,
            };
            machine.store(get(addr) as u32, width, get(value) & mask);
            return;
        }
        Inst::ReadGuest { dst, loc } => (dst, machine.read_guest(loc) & loc.ty().mask()),
        Inst::WriteGuest { loc, value } => {
            machine.write_guest(loc, get(value));
            return;
        }
        Inst::Phi { .. } => unreachable!("phis are evaluated on block entry"),
    };
    values[dst.index()] = bits;
}

/// Interprets the low `width` bits as a two's complement number.
fn sign_extend(bits: u64, width: u32) -> i64 {
    let shift = 64 - width;
    ((bits << shift) as i64) >> shift
}

fn to_f64(ty: Ty, bits: u64) -> f64 {
    match ty {
        Ty::F32 => f32::from_bits(bits as u32) as f64,
        _ => f64::from_bits(bits),
    }
}

fn from_f64(ty: Ty, value: f64) -> u64 {
    match ty {
        Ty::F32 => (value as f32).to_bits() as u64,
        _ => value.to_bits(),
    }
}

fn float_binary(
    ty: Ty,
    a: u64,
    b: u64,
    f32_op: fn(f32, f32) -> f32,
    f64_op: fn(f64, f64) -> f64,
) -> u64 {
    match ty {
        Ty::F32 => f32_op(f32::from_bits(a as u32), f32::from_bits(b as u32)).to_bits() as u64,
        _ => f64_op(f64::from_bits(a), f64::from_bits(b)).to_bits(),
    }
}

fn binary(op: BinOp, ty: Ty, a: u64, b: u64) -> u64 {
    let width = ty.bit_width();
    let (sa, sb) = (sign_extend(a, width), sign_extend(b, width));
    let bits = match op {
        BinOp::Add => a.wrapping_add(b),
        BinOp::Sub => a.wrapping_sub(b),
        BinOp::Mul => a.wrapping_mul(b),
        BinOp::And => a & b,
        BinOp::Or => a | b,
        BinOp::Xor => a ^ b,
        BinOp::Shl => a << (b % width as u64),
        BinOp::LShr => a >> (b % width as u64),
        BinOp::AShr => (sa >> (b % width as u64)) as u64,
        BinOp::UDiv => a.checked_div(b).unwrap_or(0),
        BinOp::SDiv => {
            if sb == 0 {
                0
            } else {
                sa.wrapping_div(sb) as u64
            }
        }
        BinOp::URem => a.checked_rem(b).unwrap_or(a),
        BinOp::SRem => {
            if sb == 0 {
                a
            } else {
                sa.wrapping_rem(sb) as u64
            }
        }
        BinOp::FAdd => float_binary(ty, a, b, |x, y| x + y, |x, y| x + y),
        BinOp::FSub => float_binary(ty, a, b, |x, y| x - y, |x, y| x - y),
        BinOp::FMul => float_binary(ty, a, b, |x, y| x * y, |x, y| x * y),
        BinOp::FDiv => float_binary(ty, a, b, |x, y| x / y, |x, y| x / y),
    };
    bits & ty.mask()
}

fn unary(op: UnOp, ty: Ty, a: u64) -> u64 {
    let width = ty.bit_width();
    let sign = 1u64 << (width - 1);
    let bits = match op {
        UnOp::Not => !a,
        UnOp::Clz => (a.leading_zeros() - (64 - width)) as u64,
        UnOp::FNeg => a ^ sign,
        UnOp::FAbs => a & !sign,
        UnOp::FSqrt => match ty {
            Ty::F32 => f32::from_bits(a as u32).sqrt().to_bits() as u64,
            _ => f64::from_bits(a).sqrt().to_bits(),
        },
        UnOp::FRoundEven => match ty {
            Ty::F32 => f32::from_bits(a as u32).round_ties_even().to_bits() as u64,
            _ => f64::from_bits(a).round_ties_even().to_bits(),
        },
    };
    bits & ty.mask()
}

fn icmp(cond: IntCC, ty: Ty, a: u64, b: u64) -> bool {
    let width = ty.bit_width();
    let (sa, sb) = (sign_extend(a, width), sign_extend(b, width));
    match cond {
        IntCC::Eq => a == b,
        IntCC::Ne => a != b,
        IntCC::Slt => sa < sb,
        IntCC::Sle => sa <= sb,
        IntCC::Sgt => sa > sb,
        IntCC::Sge => sa >= sb,
        IntCC::Ult => a < b,
        IntCC::Ule => a <= b,
        IntCC::Ugt => a > b,
        IntCC::Uge => a >= b,
    }
}

fn cast(op: CastOp, from: Ty, to: Ty, a: u64) -> u64 {
    let bits = match op {
        CastOp::ZExt | CastOp::Trunc | CastOp::Bitcast => a,
        CastOp::SExt => sign_extend(a, from.bit_width()) as u64,
        CastOp::SiToFp => {
            let value = sign_extend(a, from.bit_width());
            match to {
                Ty::F32 => (value as f32).to_bits() as u64,
                _ => (value as f64).to_bits(),
            }
        }
        CastOp::FpToSi => {
            let value = to_f64(from, a).trunc();
            let max = (1i64 << (to.bit_width() - 1)) - 1;
            let min = -max - 1;
            if value.is_nan() || value < min as f64 || value > max as f64 {
                max as u64
            } else {
                value as i64 as u64
            }
        }
        CastOp::FpExt | CastOp::FpTrunc => from_f64(to, to_f64(from, a)),
    };
    bits & to.mask()
}
