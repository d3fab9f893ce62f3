use super::*;
use crate::config::EngineConfigBuilder;
use crate::error::CompileError;
use crate::state::Memory;
use mips_isa::{instr, BCond, Instruction, Reg};

const BASE: u32 = 0x1000;
const MAX_BLOCKS: u64 = 100_000;

fn load(program: &[Instruction]) -> GuestState {
    let words: Vec<u32> = program.iter().map(Instruction::encode).collect();
    let mut mem = Memory::new(1 << 16);
    mem.load_words(BASE, &words);
    GuestState::new(mem, BASE)
}

fn config(hot_threshold: u64) -> EngineConfig {
    EngineConfigBuilder::new()
        .hot_threshold(hot_threshold)
        .build()
        .unwrap()
}

/// Runs `state` to its `break` with only the interpreter.
fn reference(mut state: GuestState) -> GuestState {
    let mut engine = Engine::new(EngineConfigBuilder::new().interpret_only().build().unwrap());
    let fault = engine.run(&mut state, MAX_BLOCKS).unwrap_err();
    assert!(matches!(fault, GuestFault::Break { .. }), "{fault}");
    assert_eq!(engine.stats().compile_attempts, 0);
    state
}

/// Runs `state` to its `break` with compilation enabled and checks that the result is the same as
/// interpreting it.
fn run_and_compare(config: EngineConfig, state: GuestState) -> (Engine, GuestState) {
    let expected = reference(state.clone());
    let mut state = state;
    let mut engine = Engine::new(config);
    let fault = engine.run(&mut state, MAX_BLOCKS).unwrap_err();
    assert!(matches!(fault, GuestFault::Break { .. }), "{fault}");
    assert_eq!(state, expected);
    (engine, state)
}

fn sum_loop() -> Vec<Instruction> {
    vec![
        instr::add_u_imm(Reg::T0, Reg::ZERO, 100),
        instr::add_u(Reg::V0, Reg::ZERO, Reg::ZERO),
        // loop:
        instr::add_u(Reg::V0, Reg::V0, Reg::T0),
        instr::add_u_imm(Reg::T0, Reg::T0, (-1i16) as u16),
        instr::branch_if(BCond::Ne, Reg::T0, Reg::ZERO, -3),
        instr::nop(),
        instr::brk(),
    ]
}

#[test]
fn hot_loop_is_compiled_and_matches_interpreter() {
    let (engine, state) = run_and_compare(config(5), load(&sum_loop()));
    assert_eq!(state.reg(Reg::V0), 5050);
    assert_eq!(engine.stats().compiled, 1);
    assert_eq!(engine.region_status(BASE + 8), Some(RegionStatus::Ready));
    assert!(engine.stats().invocations >= 1);
    assert!(engine.stats().compiled_instructions() > 0);
    // Every instruction either ran compiled or interpreted.
    assert!(engine.stats().compiled_instructions() < state.icnt);
}

#[test]
fn try_execute_needs_a_compiled_region() {
    let mut state = load(&sum_loop());
    let mut engine = Engine::new(config(5));
    assert!(!engine.try_execute(&mut state));
    assert_eq!(state.pc, BASE);

    let mut engine = Engine::new(EngineConfigBuilder::new().interpret_only().build().unwrap());
    let _ = engine.run(&mut state, MAX_BLOCKS);
    assert!(engine.cache().is_empty());
    state.pc = BASE + 8;
    assert!(!engine.try_execute(&mut state));
}

/// A region that runs off its end hands control back through a deopt exit, which
/// `try_execute` reports as not having run to a regular exit.
#[test]
fn falling_off_the_region_is_a_deopt_exit() {
    let (mut engine, _) = run_and_compare(config(5), load(&sum_loop()));
    assert_eq!(engine.region_status(BASE + 8), Some(RegionStatus::Ready));

    let mut state = load(&sum_loop());
    state.pc = BASE + 8;
    state.set_reg(Reg::T0, 1);
    let mut expected = state.clone();
    Interpreter::new().step_block(&mut expected).unwrap();

    let fallthroughs = engine.stats().exits(ExitReason::Fallthrough);
    assert!(!engine.try_execute(&mut state));
    assert_eq!(state.pc, BASE + 0x18);
    assert_eq!(state, expected);
    assert_eq!(engine.stats().exits(ExitReason::Fallthrough), fallthroughs + 1);
}

/// Asking for a region before the profiler has seen its entry doesn't stop it from being built
/// once it gets hot.
#[test]
fn unprofiled_entry_is_built_later() {
    let mut engine = Engine::new(config(5));
    assert_eq!(
        engine.build_region(BASE + 8),
        RegionStatus::Failed(CompileError::NotProfiled { addr: BASE + 8 })
    );
    assert_eq!(engine.region_status(BASE + 8), None);
    assert_eq!(engine.stats().failed, 0);

    let mut state = load(&sum_loop());
    let fault = engine.run(&mut state, MAX_BLOCKS).unwrap_err();
    assert!(matches!(fault, GuestFault::Break { .. }), "{fault}");
    assert_eq!(state.reg(Reg::V0), 5050);
    assert_eq!(engine.region_status(BASE + 8), Some(RegionStatus::Ready));
    assert_eq!(engine.stats().compiled, 1);
    assert!(engine.stats().invocations >= 1);
}

/// Both directions of a branch inside the region run compiled, and the blocks behind the join are
/// split apart from the even path.
#[test]
fn branch_with_both_targets_in_region() {
    let program = [
        instr::add_u_imm(Reg::T0, Reg::ZERO, 40),
        // loop:
        instr::and_imm(Reg::T1, Reg::T0, 1),
        instr::branch_if(BCond::Eq, Reg::T1, Reg::ZERO, 4),
        instr::nop(),
        instr::add_u_imm(Reg::V0, Reg::V0, 3),
        instr::jump(BASE + 0x20),
        instr::nop(),
        // even:
        instr::add_u_imm(Reg::V1, Reg::V1, 5),
        // join:
        instr::add_u_imm(Reg::T0, Reg::T0, (-1i16) as u16),
        instr::branch_if(BCond::Ne, Reg::T0, Reg::ZERO, -9),
        instr::nop(),
        instr::brk(),
    ];
    let (engine, state) = run_and_compare(config(4), load(&program));
    assert_eq!(state.reg(Reg::V0), 60);
    assert_eq!(state.reg(Reg::V1), 100);
    assert!(engine.stats().compiled >= 1);
    assert!(engine.stats().invocations >= 1);
}

fn likely_loop(count: u16) -> Vec<Instruction> {
    vec![
        instr::add_u_imm(Reg::T0, Reg::ZERO, count),
        instr::add_u_imm(Reg::V0, Reg::ZERO, 0),
        // loop:
        instr::add_u_imm(Reg::T0, Reg::T0, (-1i16) as u16),
        instr::branch_if_likely(BCond::Ne, Reg::T0, Reg::ZERO, -2),
        instr::add_u_imm(Reg::V0, Reg::V0, 1),
        instr::brk(),
    ]
}

/// The delay slot of a likely branch only takes effect when the branch is taken.
#[test]
fn likely_delay_slot_runs_only_when_taken() {
    let (engine, state) = run_and_compare(config(5), load(&likely_loop(50)));
    assert_eq!(state.reg(Reg::V0), 49);
    assert_eq!(engine.stats().exits(ExitReason::LikelyUntaken), 1);
}

fn dispatch_program(targets: &[u32]) -> GuestState {
    let program = [
        instr::load_word(Reg::T9, Reg::A0, 0),
        instr::add_u_imm(Reg::A0, Reg::A0, 4),
        instr::jump_reg(Reg::T9),
        instr::add_u_imm(Reg::V0, Reg::V0, 1),
        // 0x1010
        instr::add_u_imm(Reg::V1, Reg::V1, 1),
        instr::jump(BASE),
        instr::nop(),
        // 0x101c
        instr::add_u_imm(Reg::S0, Reg::S0, 1),
        instr::jump(BASE),
        instr::nop(),
        // 0x1028
        instr::brk(),
    ];
    let mut state = load(&program);
    let table = 0x2000;
    state.mem.load_words(table, targets);
    state.set_reg(Reg::A0, table);
    state
}

/// A register jump to an address the region doesn't know leaves the region at exactly that
/// address with the state the interpreter would have.
#[test]
fn indirect_jump_to_unknown_target_deoptimizes() {
    let mut targets = vec![BASE + 0x10; 20];
    targets.push(BASE + 0x1c);
    targets.extend([BASE + 0x10; 5]);
    targets.push(BASE + 0x28);
    let (engine, state) = run_and_compare(config(3), dispatch_program(&targets));
    assert_eq!(state.reg(Reg::V1), 25);
    assert_eq!(state.reg(Reg::S0), 1);
    assert_eq!(engine.region_status(BASE), Some(RegionStatus::Ready));
    assert_eq!(engine.stats().exits(ExitReason::IndirectMiss), 2);

    // Enter the region directly with a target it has never seen.
    let mut engine = engine;
    let mut state = dispatch_program(&[BASE + 0x1c]);
    let mut expected = state.clone();
    Interpreter::new().step_block(&mut expected).unwrap();
    assert!(!engine.try_execute(&mut state));
    assert_eq!(state.pc, BASE + 0x1c);
    assert_eq!(state, expected);
}

/// A region with an instruction the compiler can't handle is built once, fails, and its entry is
/// interpreted from then on.
#[test]
fn failed_region_is_never_invoked() {
    let program = [
        instr::add_u_imm(Reg::T0, Reg::ZERO, 20),
        // loop:
        instr::add_s(Reg::T1, Reg::T1, Reg::T0),
        instr::add_u_imm(Reg::T0, Reg::T0, (-1i16) as u16),
        instr::branch_if(BCond::Ne, Reg::T0, Reg::ZERO, -3),
        instr::nop(),
        instr::brk(),
    ];
    let (engine, state) = run_and_compare(config(3), load(&program));
    assert_eq!(state.reg(Reg::T1), 210);
    assert_eq!(
        engine.region_status(BASE + 4),
        Some(RegionStatus::Failed(CompileError::UnsupportedInstruction {
            addr: BASE + 4,
            insn: instr::add_s(Reg::T1, Reg::T1, Reg::T0),
        }))
    );
    assert_eq!(engine.stats().compile_attempts, 1);
    assert_eq!(engine.stats().failed, 1);
    assert_eq!(engine.stats().invocations, 0);
}

#[test]
fn least_recently_used_region_is_evicted() {
    let program = [
        instr::add_u_imm(Reg::T0, Reg::ZERO, 10),
        instr::add_u_imm(Reg::T0, Reg::T0, (-1i16) as u16),
        instr::branch_if(BCond::Ne, Reg::T0, Reg::ZERO, -2),
        instr::nop(),
        instr::add_u_imm(Reg::T1, Reg::ZERO, 10),
        instr::add_u_imm(Reg::T1, Reg::T1, (-1i16) as u16),
        instr::branch_if(BCond::Ne, Reg::T1, Reg::ZERO, -2),
        instr::nop(),
        instr::brk(),
    ];
    let config = EngineConfigBuilder::new()
        .hot_threshold(3)
        .cache_capacity(1)
        .build()
        .unwrap();
    let (engine, _) = run_and_compare(config, load(&program));
    assert_eq!(engine.stats().compiled, 2);
    assert_eq!(engine.stats().evictions, 1);
    assert_eq!(engine.cache().len(), 1);
    assert!(engine.cache().contains(BASE + 0x14));
    assert!(!engine.cache().contains(BASE + 4));
}

/// Switching off the optional passes changes the code, not the result.
#[test]
fn optional_passes_keep_results() {
    let config = EngineConfigBuilder::new()
        .hot_threshold(5)
        .fold_constants(false)
        .split_blocks(false)
        .build()
        .unwrap();
    let (_, state) = run_and_compare(config, load(&sum_loop()));
    assert_eq!(state.reg(Reg::V0), 5050);

    let config = EngineConfigBuilder::new()
        .hot_threshold(5)
        .count_instructions(false)
        .build()
        .unwrap();
    let expected = reference(load(&likely_loop(30)));
    let mut state = load(&likely_loop(30));
    let mut engine = Engine::new(config);
    engine.run(&mut state, MAX_BLOCKS).unwrap_err();
    assert_eq!(state.gpr, expected.gpr);
    assert!(state.icnt < expected.icnt);
}

#[test]
fn run_stops_after_max_blocks() {
    let mut state = load(&sum_loop());
    let mut engine = Engine::new(config(1000));
    let summary = engine.run(&mut state, 10).unwrap();
    assert_eq!(summary.blocks, 10);
    assert_eq!(summary.interpreted_blocks, 10);
    assert_eq!(summary.region_invocations, 0);
    assert_eq!(engine.profiler().hotness_count(BASE + 8), 9);
}
