use crate::Instruction;
use arrayvec::ArrayVec;

/// Size of an instruction in bytes.
pub const INSN_WIDTH: u32 = 4;

/// How an instruction transfers control. Every transfer has a delay slot: the instruction after it
/// executes before control reaches the target (for likely branches only if the branch is taken).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    /// Falls through to the next instruction.
    None,
    /// Conditional, pc-relative branch.
    Branch {
        taken: u32,
        not_taken: u32,
        likely: bool,
    },
    /// Unconditional jump to a statically known address.
    Jump { target: u32 },
    /// Jump to the address held in a register.
    JumpReg,
}

impl Control {
    /// Returns the statically known addresses control may continue at.
    pub fn targets(&self) -> ArrayVec<u32, 2> {
        let mut targets = ArrayVec::new();
        match *self {
            Self::None | Self::JumpReg => {}
            Self::Branch {
                taken, not_taken, ..
            } => {
                targets.push(taken);
                targets.push(not_taken);
            }
            Self::Jump { target } => targets.push(target),
        }
        targets
    }

    pub fn is_transfer(&self) -> bool {
        !matches!(self, Self::None)
    }
}

/// Target of a pc-relative branch at `addr` with the encoded `offset`.
pub fn branch_target(addr: u32, offset: u16) -> u32 {
    let offset = ((offset as i16 as i32) << 2) as u32;
    addr.wrapping_add(INSN_WIDTH).wrapping_add(offset)
}

/// Target of a `j`/`jal` at `addr`. The upper four bits come from the delay slot address.
pub fn jump_target(addr: u32, index: u32) -> u32 {
    ((index & 0x03ff_ffff) << 2) | (addr.wrapping_add(INSN_WIDTH) & 0xf000_0000)
}

impl Instruction {
    /// Classifies how this instruction, fetched from `addr`, transfers control.
    pub fn control(&self, addr: u32) -> Control {
        let not_taken = addr.wrapping_add(2 * INSN_WIDTH);
        match *self {
            Self::Branch(.., offset, likely)
            | Self::BranchZ(.., offset, likely)
            | Self::BranchFCond(.., offset, likely) => Control::Branch {
                taken: branch_target(addr, offset),
                not_taken,
                likely,
            },
            Self::BranchZAndLink(_, _, offset) => Control::Branch {
                taken: branch_target(addr, offset),
                not_taken,
                likely: false,
            },
            Self::Jump(index) | Self::JumpAndLink(index) => Control::Jump {
                target: jump_target(addr, index),
            },
            Self::JumpReg(_) | Self::JumpAndLinkReg(..) => Control::JumpReg,
            _ => Control::None,
        }
    }

    /// Returns `true` if the next instruction is this instruction's delay slot.
    pub fn has_delay_slot(&self) -> bool {
        self.control(0).is_transfer()
    }

    /// Returns `true` for instructions that can't continue to the next instruction without help
    /// from the environment.
    pub fn is_fault(&self) -> bool {
        matches!(
            self,
            Self::Syscall | Self::Break | Self::Trap(..) | Self::Unknown(_)
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{instr, BCond, Reg};

    #[test]
    fn branch_targets_are_relative_to_the_delay_slot() {
        let beq = instr::branch_if(BCond::Eq, Reg::T0, Reg::T1, -2);
        assert_eq!(
            beq.control(0x1000),
            Control::Branch {
                taken: 0x0ffc,
                not_taken: 0x1008,
                likely: false
            }
        );
        assert_eq!(beq.control(0x1000).targets().as_slice(), &[0x0ffc, 0x1008]);
    }

    #[test]
    fn jump_targets_keep_the_region_bits_of_the_delay_slot() {
        let j = instr::jump(0x0012_3450);
        assert_eq!(
            j.control(0x8000_0000),
            Control::Jump {
                target: 0x8012_3450
            }
        );
        // The delay slot of a jump at the end of a 256MB segment lies in the next one.
        assert_eq!(jump_target(0x0fff_fffc, 0x10), 0x1000_0040);
    }

    #[test]
    fn only_transfers_have_delay_slots() {
        assert!(instr::jump_reg(Reg::RA).has_delay_slot());
        assert!(instr::branch_if_f_cond_likely(true, 0, 1).has_delay_slot());
        assert!(!instr::add_u(Reg::T0, Reg::T1, Reg::T2).has_delay_slot());
        assert!(!instr::syscall().has_delay_slot());
    }
}
