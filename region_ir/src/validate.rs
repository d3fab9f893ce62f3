//! Structural and type checks of a [`Function`]. Backends only accept validated functions.

use crate::{BlockId, CastOp, Function, Inst, Terminator, Ty, Value};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("the entry block has predecessors")]
    EntryHasPredecessors,
    #[error("{0} has no terminator")]
    Unterminated(BlockId),
    #[error("{0} is defined more than once")]
    Redefined(Value),
    #[error("{value} is used in {block} but never defined")]
    Undefined { value: Value, block: BlockId },
    #[error("{block} branches to a block that doesn't exist")]
    UnknownTarget { block: BlockId },
    #[error("phi {0} follows a non-phi instruction")]
    MisplacedPhi(Value),
    #[error("phi {phi} in {block} doesn't have exactly one incoming value per predecessor")]
    PhiPredecessors { phi: Value, block: BlockId },
    #[error("type error in {block}: {message}")]
    Type { block: BlockId, message: String },
}

/// Checks that every block is terminated, every value is defined exactly once and used with the
/// right type, and every phi covers exactly the predecessors of its block. The entry block must
/// not be the target of any edge.
pub fn validate(func: &Function) -> Result<(), ValidationError> {
    let mut defined = vec![false; func.value_count()];
    for block in func.blocks() {
        for inst in &block.instructions {
            if let Some(dst) = inst.dst() {
                if std::mem::replace(&mut defined[dst.index()], true) {
                    return Err(ValidationError::Redefined(dst));
                }
            }
        }
    }

    let preds = func.predecessors();
    if !preds[func.entry().index()].is_empty() {
        return Err(ValidationError::EntryHasPredecessors);
    }
    for block in func.blocks() {
        let terminator = block
            .terminator
            .as_ref()
            .ok_or(ValidationError::Unterminated(block.id))?;
        if terminator
            .successors()
            .iter()
            .any(|succ| succ.index() >= func.blocks().len())
        {
            return Err(ValidationError::UnknownTarget { block: block.id });
        }

        let mut past_phis = false;
        for inst in &block.instructions {
            for value in inst.operands() {
                if !defined.get(value.index()).copied().unwrap_or(false) {
                    return Err(ValidationError::Undefined {
                        value,
                        block: block.id,
                    });
                }
            }
            if let Inst::Phi { dst, incoming } = inst {
                if past_phis {
                    return Err(ValidationError::MisplacedPhi(*dst));
                }
                let block_preds = &preds[block.id.index()];
                let covers_all = incoming.len() == block_preds.len()
                    && block_preds
                        .iter()
                        .all(|pred| incoming.iter().filter(|(b, _)| b == pred).count() == 1);
                if !covers_all {
                    return Err(ValidationError::PhiPredecessors {
                        phi: *dst,
                        block: block.id,
                    });
                }
            } else {
                past_phis = true;
            }
            check_types(func, inst).map_err(|message| ValidationError::Type {
                block: block.id,
                message,
            })?;
        }

        for value in terminator.operands() {
            if !defined.get(value.index()).copied().unwrap_or(false) {
                return Err(ValidationError::Undefined {
                    value,
                    block: block.id,
                });
            }
        }
        let expected = match terminator {
            Terminator::Jump(_) => None,
            Terminator::Branch { cond, .. } => Some((*cond, Ty::I1)),
            Terminator::Exit { pc, .. } => Some((*pc, Ty::I32)),
        };
        if let Some((value, ty)) = expected {
            if func.value_ty(value) != ty {
                return Err(ValidationError::Type {
                    block: block.id,
                    message: format!("terminator operand {value} must be {ty}"),
                });
            }
        }
    }
    Ok(())
}

fn check_types(func: &Function, inst: &Inst) -> Result<(), String> {
    let ty = |value: Value| func.value_ty(value);
    let same = |a: Value, b: Value| {
        if ty(a) == ty(b) {
            Ok(())
        } else {
            Err(format!("{a}:{} and {b}:{} must have the same type", ty(a), ty(b)))
        }
    };
    let want = |value: Value, pred: fn(Ty) -> bool, what: &str| {
        if pred(ty(value)) {
            Ok(())
        } else {
            Err(format!("{value}:{} must be {what}", ty(value)))
        }
    };

    match *inst {
        Inst::Const { .. } => Ok(()),
        Inst::Binary { dst, op, lhs, rhs } => {
            same(lhs, rhs)?;
            same(dst, lhs)?;
            if op.is_float() {
                want(lhs, Ty::is_float, "a float")
            } else {
                want(lhs, Ty::is_int, "an integer")
            }
        }
        Inst::Unary { dst, op, src } => {
            same(dst, src)?;
            if op.is_float() {
                want(src, Ty::is_float, "a float")
            } else {
                want(src, Ty::is_int, "an integer")
            }
        }
        Inst::Icmp { dst, lhs, rhs, .. } => {
            same(lhs, rhs)?;
            want(lhs, Ty::is_int, "an integer")?;
            want(dst, |t| t == Ty::I1, "i1")
        }
        Inst::Fcmp { dst, lhs, rhs, .. } => {
            same(lhs, rhs)?;
            want(lhs, Ty::is_float, "a float")?;
            want(dst, |t| t == Ty::I1, "i1")
        }
        Inst::Select {
            dst,
            cond,
            if_true,
            if_false,
        } => {
            want(cond, |t| t == Ty::I1, "i1")?;
            same(if_true, if_false)?;
            same(dst, if_true)
        }
        Inst::Cast { dst, op, src } => {
            let (from, to) = (ty(src), ty(dst));
            let ok = match op {
                CastOp::ZExt | CastOp::SExt => {
                    from.is_int() && to.is_int() && from.bit_width() < to.bit_width()
                }
                CastOp::Trunc => from.is_int() && to.is_int() && from.bit_width() > to.bit_width(),
                CastOp::Bitcast => from.is_int() != to.is_int() && from.bit_width() == to.bit_width(),
                CastOp::SiToFp => from.is_int() && to.is_float(),
                CastOp::FpToSi => from.is_float() && to.is_int(),
                CastOp::FpExt => from == Ty::F32 && to == Ty::F64,
                CastOp::FpTrunc => from == Ty::F64 && to == Ty::F32,
            };
            if ok {
                Ok(())
            } else {
                Err(format!("can't {op} {from} to {to}"))
            }
        }
        Inst::Load {
            dst, width, addr, ..
        } => {
            want(addr, |t| t == Ty::I32, "an i32 address")?;
            want(dst, Ty::is_int, "an integer")?;
            if width.bytes() * 8 > ty(dst).bit_width() {
                return Err(format!("{dst}:{} can't hold a {width} load", ty(dst)));
            }
            Ok(())
        }
        Inst::Store { width, addr, value } => {
            want(addr, |t| t == Ty::I32, "an i32 address")?;
            want(value, Ty::is_int, "an integer")?;
            if width.bytes() * 8 > ty(value).bit_width() {
                return Err(format!("{value}:{} is narrower than {width}", ty(value)));
            }
            Ok(())
        }
        Inst::ReadGuest { dst, loc } => {
            if ty(dst) == loc.ty() {
                Ok(())
            } else {
                Err(format!("{loc} is read as {}", ty(dst)))
            }
        }
        Inst::WriteGuest { loc, value } => {
            if ty(value) == loc.ty() {
                Ok(())
            } else {
                Err(format!("{loc} is written with {value}:{}", ty(value)))
            }
        }
        Inst::Phi { dst, ref incoming } => incoming
            .iter()
            .try_for_each(|(_, value)| same(dst, *value)),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{BinOp, ExitReason, FunctionBuilder, GuestLoc};

    #[test]
    fn rejects_unterminated_blocks() {
        let mut b = FunctionBuilder::new("f");
        let other = b.declare_block("other");
        let pc = b.iconst(Ty::I32, 0);
        b.exit(pc, ExitReason::Fallthrough);
        assert_eq!(
            validate(&b.build()),
            Err(ValidationError::Unterminated(other))
        );
    }

    #[test]
    fn rejects_mismatched_operand_types() {
        let mut b = FunctionBuilder::new("f");
        let a = b.iconst(Ty::I32, 1);
        let c = b.f32const(1.0);
        b.binary(BinOp::Add, a, c);
        b.exit(a, ExitReason::Fallthrough);
        assert!(matches!(
            validate(&b.build()),
            Err(ValidationError::Type { .. })
        ));
    }

    #[test]
    fn rejects_phis_missing_a_predecessor() {
        let mut b = FunctionBuilder::new("f");
        let left = b.declare_block("left");
        let right = b.declare_block("right");
        let join = b.declare_block("join");
        let cond = b.iconst(Ty::I1, 1);
        b.branch(cond, left, right, None);
        b.start_block(left);
        let one = b.iconst(Ty::I32, 1);
        b.jump(join);
        b.start_block(right);
        b.jump(join);
        b.start_block(join);
        let phi = b.phi(Ty::I32);
        b.add_phi_incoming(phi, left, one);
        b.exit(phi, ExitReason::Fallthrough);
        assert_eq!(
            validate(&b.build()),
            Err(ValidationError::PhiPredecessors { phi, block: join })
        );
    }

    #[test]
    fn rejects_guest_writes_of_the_wrong_width() {
        let mut b = FunctionBuilder::new("f");
        let a = b.iconst(Ty::I32, 1);
        b.write_guest(GuestLoc::Icnt, a);
        b.exit(a, ExitReason::Fallthrough);
        assert!(validate(&b.build()).is_err());
    }

    #[test]
    fn displays_values_with_their_types() {
        let mut b = FunctionBuilder::new("0x400000");
        b.add_comment("0x00400000: addiu $8, $0, 5");
        let a = b.iconst(Ty::I32, 5);
        b.write_guest(GuestLoc::Gpr(8), a);
        let pc = b.iconst(Ty::I32, 0x40_0004);
        b.exit(pc, ExitReason::Fallthrough);
        let func = b.build();
        validate(&func).unwrap();
        assert_eq!(
            func.to_string(),
            "region 0x400000 {\n\
             block0: ; entry\n    \
             ; 0x00400000: addiu $8, $0, 5\n    \
             v0:i32 = const 0x5\n    \
             write $8, v0\n    \
             v1:i32 = const 0x400004\n    \
             exit v1 (fallthrough)\n\
             }\n"
        );
    }
}
