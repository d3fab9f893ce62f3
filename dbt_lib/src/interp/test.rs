use super::*;
use crate::state::Memory;
use mips_isa::{assemble, instr, BCond, FCond, FReg};

const BASE: u32 = 0x1000;

fn state_with(program: &[Instruction]) -> GuestState {
    let mut mem = Memory::new(0x1_0000);
    mem.load_words(BASE, &assemble(program));
    GuestState::new(mem, BASE)
}

/// A taken branch runs its delay slot and continues at the target.
#[test]
fn taken_branch_executes_delay_slot() {
    let mut state = state_with(&[
        instr::add_u_imm(Reg::T0, Reg::ZERO, 3),
        instr::branch_if(BCond::Ne, Reg::T0, Reg::ZERO, 4),
        instr::add_u_imm(Reg::T1, Reg::ZERO, 7),
    ]);
    let block = Interpreter::new().step_block(&mut state).unwrap();
    assert_eq!(block.entry, BASE);
    assert_eq!(block.len(), 3);
    assert_eq!(block.exit_addr(), BASE + 8);
    assert!(!block.ends_in_likely);
    assert_eq!(state.reg(Reg::T1), 7);
    assert_eq!(state.pc, BASE + 8 + 16);
    assert_eq!(state.icnt, 3);
}

/// An untaken likely branch skips its delay slot but still records it in the trace.
#[test]
fn untaken_likely_branch_skips_delay_slot() {
    let mut state = state_with(&[
        instr::branch_if_likely(BCond::Ne, Reg::ZERO, Reg::ZERO, 4),
        instr::add_u_imm(Reg::T1, Reg::ZERO, 7),
    ]);
    let block = Interpreter::new().step_block(&mut state).unwrap();
    assert!(block.ends_in_likely);
    assert_eq!(block.len(), 2);
    assert_eq!(state.reg(Reg::T1), 0);
    assert_eq!(state.pc, BASE + 8);
    assert_eq!(state.icnt, 1);
}

/// The link register is written before the delay slot runs, and `jalr` reads its target before
/// overwriting the register.
#[test]
fn links_are_visible_in_the_delay_slot() {
    let mut state = state_with(&[
        instr::jump_and_link_reg(Reg::T9, Reg::T9),
        instr::add_u(Reg::V0, Reg::T9, Reg::ZERO),
    ]);
    state.set_reg(Reg::T9, 0x2000);
    Interpreter::new().step_block(&mut state).unwrap();
    assert_eq!(state.pc, 0x2000);
    assert_eq!(state.reg(Reg::T9), BASE + 8);
    assert_eq!(state.reg(Reg::V0), BASE + 8);
}

#[test]
fn faults_stop_at_the_faulting_instruction() {
    let mut state = state_with(&[instr::add_u_imm(Reg::T0, Reg::ZERO, 1), instr::syscall()]);
    let fault = Interpreter::new().step_block(&mut state).unwrap_err();
    assert_eq!(fault, GuestFault::Syscall { addr: BASE + 4 });
    assert_eq!(state.pc, BASE + 4);
    assert_eq!(state.icnt, 1);
    assert_eq!(state.reg(Reg::T0), 1);
}

#[test]
fn trapping_add_faults_on_overflow_without_writing() {
    let mut state = state_with(&[instr::add_s(Reg::T0, Reg::T1, Reg::T1)]);
    state.set_reg(Reg::T1, 0x4000_0000);
    let fault = Interpreter::new().step_block(&mut state).unwrap_err();
    assert_eq!(fault, GuestFault::Overflow { addr: BASE });
    assert_eq!(state.reg(Reg::T0), 0);
}

#[test]
fn blocks_without_transfer_stop_at_the_length_limit() {
    let mut state = state_with(&[instr::nop(), instr::nop(), instr::nop()]);
    let block = Interpreter::with_max_block_len(2)
        .step_block(&mut state)
        .unwrap();
    assert_eq!(block.len(), 2);
    assert_eq!(block.transfer(), None);
    assert_eq!(state.pc, BASE + 8);
}

#[test]
fn loads_extend_and_stores_truncate() {
    let mut state = state_with(&[
        instr::store_word(Reg::T0, Reg::SP, 0),
        instr::load_byte_s(Reg::T1, Reg::SP, 3),
        instr::load_half_u(Reg::T2, Reg::SP, 2),
        instr::store_byte(Reg::T0, Reg::SP, 8),
    ]);
    state.set_reg(Reg::SP, 0x8000);
    state.set_reg(Reg::T0, 0x1234_f0f1);
    Interpreter::with_max_block_len(4)
        .step_block(&mut state)
        .unwrap();
    assert_eq!(state.reg(Reg::T1), 0xffff_fff1);
    assert_eq!(state.reg(Reg::T2), 0xf0f1);
    assert_eq!(state.mem.read_u8(0x8008), 0xf1);
}

#[test]
fn fp_compare_drives_fp_branch() {
    let (f0, f2) = (FReg::new(0), FReg::new(2));
    let mut state = state_with(&[
        instr::f_compare(FCond::LT, FFmt::D, 2, f0, f2),
        instr::branch_if_f_cond(true, 2, 8),
        instr::f_add(FFmt::D, f0, f0, f2),
    ]);
    state.set_fpr_double(f0, 1.0);
    state.set_fpr_double(f2, 2.5);
    Interpreter::new().step_block(&mut state).unwrap();
    assert!(state.condition_code(2));
    assert_eq!(state.fpr_double(f0), 3.5);
    assert_eq!(state.pc, BASE + 8 + 32);
}

#[test]
fn division_by_zero_does_not_fault() {
    let mut state = state_with(&[instr::div_s(Reg::T0, Reg::ZERO), instr::nop()]);
    state.set_reg(Reg::T0, 9);
    Interpreter::with_max_block_len(2)
        .step_block(&mut state)
        .unwrap();
    assert_eq!((state.hi, state.lo), (9, 0));
}

#[test]
fn transfers_in_delay_slots_are_rejected() {
    let mut state = state_with(&[instr::jump(0x2000), instr::jump(0x3000)]);
    let fault = Interpreter::new().step_block(&mut state).unwrap_err();
    assert!(matches!(fault, GuestFault::Unknown { addr, .. } if addr == BASE + 4));
}
