//! The reference interpreter. It executes guest code one dynamic basic block at a time, reports
//! the blocks it ran to the profiler and is the fallback for everything that isn't compiled.

#[cfg(test)]
mod test;

use crate::state::{mem_width, GuestState};
use mips_isa::{
    alu, decode, Control, FFmt, FImmOp, FReg, FRegOp2, FRegOp3, ImmOp2, Instruction, Reg, RegOp1,
    RegOp3, INSN_WIDTH,
};
use thiserror::Error;
use tracing::trace;

/// Default bound on the number of instructions of one dynamic block without a control transfer.
pub const MAX_BLOCK_LEN: usize = 256;

/// A condition that stops guest execution. The interpreter leaves `pc` at the faulting
/// instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GuestFault {
    #[error("syscall at {addr:#010x}")]
    Syscall { addr: u32 },
    #[error("break at {addr:#010x}")]
    Break { addr: u32 },
    #[error("trap at {addr:#010x}")]
    Trap { addr: u32 },
    #[error("integer overflow at {addr:#010x}")]
    Overflow { addr: u32 },
    /// An unknown encoding, or a control transfer in a delay slot.
    #[error("can't execute {word:#010x} at {addr:#010x}")]
    Unknown { addr: u32, word: u32 },
}

impl GuestFault {
    pub fn addr(&self) -> u32 {
        match *self {
            Self::Syscall { addr }
            | Self::Break { addr }
            | Self::Trap { addr }
            | Self::Overflow { addr }
            | Self::Unknown { addr, .. } => addr,
        }
    }
}

/// Record of one executed dynamic block: the instructions from `entry` up to and including the
/// delay slot of the first control transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceBlock {
    pub entry: u32,
    /// `(word, address)` pairs in program order. A delay slot is included even if a likely branch
    /// skipped it.
    pub words: Vec<(u32, u32)>,
    pub ends_in_likely: bool,
}

impl TraceBlock {
    /// Address of the last instruction.
    pub fn exit_addr(&self) -> u32 {
        self.words.last().map_or(self.entry, |&(_, addr)| addr)
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Returns the control transfer ending the block and its address, if any.
    pub fn transfer(&self) -> Option<(u32, Control)> {
        let &(word, addr) = self.words.iter().rev().nth(1)?;
        let control = decode(word).control(addr);
        control.is_transfer().then_some((addr, control))
    }
}

#[derive(Debug, Clone)]
pub struct Interpreter {
    max_block_len: usize,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    pub fn new() -> Self {
        Self::with_max_block_len(MAX_BLOCK_LEN)
    }

    pub fn with_max_block_len(max_block_len: usize) -> Self {
        Self {
            max_block_len: max_block_len.max(1),
        }
    }

    /// Executes the dynamic block at `state.pc` and leaves `pc` at the next block.
    pub fn step_block(&self, state: &mut GuestState) -> Result<TraceBlock, GuestFault> {
        let entry = state.pc;
        let mut words = Vec::new();
        loop {
            let addr = state.pc;
            let word = state.mem.read_u32(addr);
            let insn = decode(word);
            words.push((word, addr));

            let control = insn.control(addr);
            if !control.is_transfer() {
                execute(state, insn, addr)?;
                state.pc = addr.wrapping_add(INSN_WIDTH);
                state.icnt += 1;
                if words.len() >= self.max_block_len {
                    break;
                }
                continue;
            }

            let (taken, target) = resolve_transfer(state, insn, addr, control);
            state.icnt += 1;

            let delay_addr = addr.wrapping_add(INSN_WIDTH);
            let delay_word = state.mem.read_u32(delay_addr);
            let delay = decode(delay_word);
            if delay.has_delay_slot() {
                state.pc = delay_addr;
                return Err(GuestFault::Unknown {
                    addr: delay_addr,
                    word: delay_word,
                });
            }
            words.push((delay_word, delay_addr));

            let likely = matches!(control, Control::Branch { likely: true, .. });
            if taken || !likely {
                state.pc = delay_addr;
                execute(state, delay, delay_addr)?;
                state.icnt += 1;
            }
            state.pc = if taken {
                target
            } else {
                addr.wrapping_add(2 * INSN_WIDTH)
            };
            trace!("interpreted block {entry:#010x}, next {:#010x}", state.pc);
            return Ok(TraceBlock {
                entry,
                words,
                ends_in_likely: likely,
            });
        }
        trace!("interpreted block {entry:#010x} up to the length limit");
        Ok(TraceBlock {
            entry,
            words,
            ends_in_likely: false,
        })
    }
}

/// Decides a control transfer before its delay slot runs and writes the link register. Returns
/// whether the transfer is taken and its target.
fn resolve_transfer(
    state: &mut GuestState,
    insn: Instruction,
    addr: u32,
    control: Control,
) -> (bool, u32) {
    let link = addr.wrapping_add(2 * INSN_WIDTH);
    let branch_target = match control {
        Control::Branch { taken, .. } => taken,
        Control::Jump { target } => target,
        _ => 0,
    };
    match insn {
        Instruction::Branch(cond, rs, rt, ..) => {
            (cond.eval(state.reg(rs), state.reg(rt)), branch_target)
        }
        Instruction::BranchZ(cond, rs, ..) => (cond.eval(state.reg(rs)), branch_target),
        Instruction::BranchZAndLink(cond, rs, _) => {
            let taken = cond.eval(state.reg(rs));
            state.set_reg(Reg::RA, link);
            (taken, branch_target)
        }
        Instruction::BranchFCond(on_true, cc, ..) => {
            (state.condition_code(cc) == on_true, branch_target)
        }
        Instruction::Jump(_) => (true, branch_target),
        Instruction::JumpAndLink(_) => {
            state.set_reg(Reg::RA, link);
            (true, branch_target)
        }
        Instruction::JumpReg(rs) => (true, state.reg(rs)),
        Instruction::JumpAndLinkReg(rd, rs) => {
            let target = state.reg(rs);
            state.set_reg(rd, link);
            (true, target)
        }
        _ => unreachable!("{insn} is not a control transfer"),
    }
}

/// Executes an instruction that doesn't transfer control. On a fault the state is unchanged.
pub fn execute(state: &mut GuestState, insn: Instruction, addr: u32) -> Result<(), GuestFault> {
    match insn {
        Instruction::Nop | Instruction::Sync => {}
        Instruction::Shift(op, rd, rt, sa) => {
            let value = op.eval(state.reg(rt), sa as u32);
            state.set_reg(rd, value);
        }
        Instruction::Reg3(op, rd, rs, rt) => {
            let (a, b) = (state.reg(rs), state.reg(rt));
            let overflows = match op {
                RegOp3::AddS => alu::add_overflows(a, b),
                RegOp3::SubS => alu::sub_overflows(a, b),
                _ => false,
            };
            if overflows {
                return Err(GuestFault::Overflow { addr });
            }
            let value = op.eval(a, b, state.reg(rd));
            state.set_reg(rd, value);
        }
        Instruction::Reg2(op, rs, rt) => {
            let (hi, lo) = op.eval(state.reg(rs), state.reg(rt));
            state.hi = hi;
            state.lo = lo;
        }
        Instruction::Reg1(op, reg) => match op {
            RegOp1::MoveFromHi => state.set_reg(reg, state.hi),
            RegOp1::MoveFromLo => state.set_reg(reg, state.lo),
            RegOp1::MoveToHi => state.hi = state.reg(reg),
            RegOp1::MoveToLo => state.lo = state.reg(reg),
        },
        Instruction::Unary(op, rd, src) => {
            let value = op.eval(state.reg(src));
            state.set_reg(rd, value);
        }
        Instruction::Imm2(op, rt, rs, imm) => {
            let base = state.reg(rs);
            match op.access() {
                Some((bytes, signed)) => {
                    let ea = base.wrapping_add(alu::sign_extend16(imm));
                    let width = mem_width(bytes);
                    if op.is_load() {
                        let raw = state.mem.read(ea, width) as u32;
                        let shift = 32 - 8 * bytes as u32;
                        let value = if signed {
                            ((raw << shift) as i32 >> shift) as u32
                        } else {
                            raw
                        };
                        state.set_reg(rt, value);
                    } else {
                        let value = state.reg(rt);
                        state.mem.write(ea, width, value as u64);
                    }
                }
                None => {
                    if op == ImmOp2::AddS && alu::add_overflows(base, alu::sign_extend16(imm)) {
                        return Err(GuestFault::Overflow { addr });
                    }
                    if let Some(value) = op.eval(base, imm) {
                        state.set_reg(rt, value);
                    }
                }
            }
        }
        Instruction::Imm1(_, rt, imm) => state.set_reg(rt, (imm as u32) << 16),
        Instruction::FReg3(op, fd, fs, ft) => match op.fmt() {
            FFmt::S => {
                let (a, b) = (state.fpr_single(fs), state.fpr_single(ft));
                let value = match op {
                    FRegOp3::Add(_) => a + b,
                    FRegOp3::Sub(_) => a - b,
                    FRegOp3::Mul(_) => a * b,
                    FRegOp3::Div(_) => a / b,
                };
                state.set_fpr_single(fd, value);
            }
            FFmt::D => {
                let (a, b) = (state.fpr_double(fs), state.fpr_double(ft));
                let value = match op {
                    FRegOp3::Add(_) => a + b,
                    FRegOp3::Sub(_) => a - b,
                    FRegOp3::Mul(_) => a * b,
                    FRegOp3::Div(_) => a / b,
                };
                state.set_fpr_double(fd, value);
            }
        },
        Instruction::FReg2(op, fd, fs) => execute_fp_unary(state, op, fd, fs),
        Instruction::FCompare(cond, fmt, cc, fs, ft) => {
            let (a, b) = match fmt {
                FFmt::S => (state.fpr_single(fs) as f64, state.fpr_single(ft) as f64),
                FFmt::D => (state.fpr_double(fs), state.fpr_double(ft)),
            };
            state.set_condition_code(cc, cond.eval(a, b));
        }
        Instruction::FImm(op, ft, base, offset) => {
            let ea = state.reg(base).wrapping_add(alu::sign_extend16(offset));
            match op {
                FImmOp::LoadWordToFpu => {
                    let word = state.mem.read_u32(ea);
                    state.set_fpr_bits(ft, word);
                }
                FImmOp::StoreWordFromFpu => {
                    let word = state.fpr_bits(ft);
                    state.mem.write_u32(ea, word);
                }
                FImmOp::LoadDoublewordToFpu => {
                    let bits = state.mem.read_u64(ea);
                    state.set_fpr_pair_bits(ft, bits);
                }
                FImmOp::StoreDoublewordFromFpu => {
                    let bits = state.fpr_pair_bits(ft);
                    state.mem.write_u64(ea, bits);
                }
            }
        }
        Instruction::MoveFromFpu(rt, fs) => state.set_reg(rt, state.fpr_bits(fs)),
        Instruction::MoveToFpu(rt, fs) => state.set_fpr_bits(fs, state.reg(rt)),
        Instruction::MoveFromFcr(rt, fcr) => state.set_reg(rt, state.fcr(fcr)),
        Instruction::MoveToFcr(rt, fcr) => state.set_fcr(fcr, state.reg(rt)),
        Instruction::Trap(cond, rs, rt) => {
            if cond.eval(state.reg(rs), state.reg(rt)) {
                return Err(GuestFault::Trap { addr });
            }
        }
        Instruction::Syscall => return Err(GuestFault::Syscall { addr }),
        Instruction::Break => return Err(GuestFault::Break { addr }),
        Instruction::Unknown(word) => return Err(GuestFault::Unknown { addr, word }),
        Instruction::Branch(..)
        | Instruction::BranchZ(..)
        | Instruction::BranchZAndLink(..)
        | Instruction::BranchFCond(..)
        | Instruction::Jump(_)
        | Instruction::JumpAndLink(_)
        | Instruction::JumpReg(_)
        | Instruction::JumpAndLinkReg(..) => {
            unreachable!("control transfers are resolved by the block loop")
        }
    }
    Ok(())
}

fn execute_fp_unary(state: &mut GuestState, op: FRegOp2, fd: FReg, fs: FReg) {
    match op {
        FRegOp2::Abs(FFmt::S) => state.set_fpr_single(fd, state.fpr_single(fs).abs()),
        FRegOp2::Abs(FFmt::D) => state.set_fpr_double(fd, state.fpr_double(fs).abs()),
        FRegOp2::Neg(FFmt::S) => state.set_fpr_single(fd, -state.fpr_single(fs)),
        FRegOp2::Neg(FFmt::D) => state.set_fpr_double(fd, -state.fpr_double(fs)),
        FRegOp2::Sqrt(FFmt::S) => state.set_fpr_single(fd, state.fpr_single(fs).sqrt()),
        FRegOp2::Sqrt(FFmt::D) => state.set_fpr_double(fd, state.fpr_double(fs).sqrt()),
        FRegOp2::Move(FFmt::S) => state.set_fpr_bits(fd, state.fpr_bits(fs)),
        FRegOp2::Move(FFmt::D) => state.set_fpr_pair_bits(fd, state.fpr_pair_bits(fs)),
        FRegOp2::Convert(FFmt::S, _) => state.set_fpr_single(fd, state.fpr_double(fs) as f32),
        FRegOp2::Convert(FFmt::D, _) => state.set_fpr_double(fd, state.fpr_single(fs) as f64),
        FRegOp2::ConvertFromWord(fmt) => {
            let word = state.fpr_bits(fs) as i32;
            match fmt {
                FFmt::S => state.set_fpr_single(fd, word as f32),
                FFmt::D => state.set_fpr_double(fd, word as f64),
            }
        }
        FRegOp2::ConvertToWord(fmt) | FRegOp2::TruncToWord(fmt) => {
            let value = match fmt {
                FFmt::S => state.fpr_single(fs) as f64,
                FFmt::D => state.fpr_double(fs),
            };
            let round = matches!(op, FRegOp2::ConvertToWord(_));
            state.set_fpr_bits(fd, alu::fp_to_word(value, round));
        }
    }
}
