//! End to end scenarios through the public engine interface.

use dbt_lib::{
    CompileError, Engine, EngineConfigBuilder, ExitReason, GuestFault, GuestState, Interpreter,
    Memory, RegionStatus,
};
use mips_isa::{instr, BCond, Instruction, Reg};
use pretty_assertions::assert_eq;

const BASE: u32 = 0x1000;
const HALT: u32 = 0x3000;

fn load(program: &[Instruction]) -> GuestState {
    let words: Vec<u32> = program.iter().map(Instruction::encode).collect();
    let mut mem = Memory::new(1 << 16);
    mem.load_words(BASE, &words);
    mem.load_words(HALT, &[instr::brk().encode()]);
    GuestState::new(mem, BASE)
}

/// An engine that profiles but never builds regions by itself.
fn profiling_engine() -> Engine {
    Engine::new(
        EngineConfigBuilder::new()
            .hot_threshold(u64::MAX)
            .build()
            .unwrap(),
    )
}

fn run_to_break(engine: &mut Engine, state: &mut GuestState) {
    let fault = engine.run(state, 100_000).unwrap_err();
    assert!(matches!(fault, GuestFault::Break { .. }), "{fault}");
}

/// Interprets `state` until it reaches `pc`.
fn interpret_until(mut state: GuestState, pc: u32) -> GuestState {
    let interpreter = Interpreter::new();
    while state.pc != pc {
        interpreter.step_block(&mut state).unwrap();
    }
    state
}

/// A conditional branch with both targets in the region gives the interpreter's state in either
/// direction.
#[test]
fn branch_inside_region() {
    let program = [
        instr::branch_if(BCond::Eq, Reg::A0, Reg::ZERO, 3),
        instr::add_u_imm(Reg::V1, Reg::V1, 1),
        instr::add_u_imm(Reg::V0, Reg::ZERO, 7),
        instr::add_u_imm(Reg::A1, Reg::A1, 1),
        // 0x1010
        instr::add_u(Reg::V0, Reg::V0, Reg::A1),
        instr::jump(HALT),
        instr::nop(),
    ];
    let mut taken = load(&program);
    taken.set_reg(Reg::V0, 40);
    taken.set_reg(Reg::A1, 2);
    let mut not_taken = taken.clone();
    not_taken.set_reg(Reg::A0, 1);

    let mut engine = profiling_engine();
    for state in [&taken, &not_taken] {
        run_to_break(&mut engine, &mut state.clone());
    }
    assert_eq!(engine.build_region(BASE), RegionStatus::Ready);

    for initial in [taken, not_taken] {
        let mut compiled = initial.clone();
        assert!(engine.try_execute(&mut compiled));
        assert_eq!(compiled, interpret_until(initial, HALT));
    }
    assert_eq!(engine.stats().invocations, 2);
    assert_eq!(engine.stats().exits(ExitReason::BranchTarget), 2);
}

/// A register jump to an address the region never saw leaves it at that address, in the state
/// the interpreter reaches there.
#[test]
fn indirect_jump_outside_known_targets() {
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
        instr::add_u_imm(Reg::S1, Reg::S1, 1),
        instr::jump(HALT),
        instr::nop(),
    ];
    let (a, b, c) = (BASE + 0x10, BASE + 0x1c, BASE + 0x28);
    let mut profiled = load(&program);
    profiled.mem.load_words(0x2000, &[a, b, a, b]);
    profiled.set_reg(Reg::A0, 0x2000);

    // Eight blocks: the dispatch and both targets, twice.
    let mut engine = profiling_engine();
    let summary = engine.run(&mut profiled, 8).unwrap();
    assert_eq!(summary.interpreted_blocks, 8);
    assert_eq!(engine.build_region(BASE), RegionStatus::Ready);

    let mut initial = load(&program);
    initial.mem.load_words(0x2100, &[c]);
    initial.set_reg(Reg::A0, 0x2100);
    initial.set_reg(Reg::V0, 5);

    let mut compiled = initial.clone();
    assert!(!engine.try_execute(&mut compiled));
    assert_eq!(compiled.pc, c);
    assert_eq!(compiled, interpret_until(initial, c));
    assert_eq!(engine.stats().exits(ExitReason::IndirectMiss), 1);
}

/// A region with an instruction the compiler has no lowering for fails once and its entry is
/// interpreted from then on.
#[test]
fn unsupported_instruction_keeps_entry_interpreted() {
    let program = [
        instr::add_u_imm(Reg::T0, Reg::ZERO, 50),
        // 0x1004
        instr::add_s(Reg::T1, Reg::T1, Reg::T0),
        instr::add_u_imm(Reg::T0, Reg::T0, (-1i16) as u16),
        instr::branch_if(BCond::Ne, Reg::T0, Reg::ZERO, -3),
        instr::nop(),
        instr::brk(),
    ];
    let config = EngineConfigBuilder::new().hot_threshold(4).build().unwrap();
    let mut engine = Engine::new(config);
    let mut state = load(&program);
    run_to_break(&mut engine, &mut state);

    assert_eq!(state.reg(Reg::T1), 1275);
    assert!(matches!(
        engine.region_status(BASE + 4),
        Some(RegionStatus::Failed(CompileError::UnsupportedInstruction { addr, .. }))
            if addr == BASE + 4
    ));
    assert_eq!(engine.stats().compile_attempts, 1);
    assert_eq!(engine.stats().invocations, 0);

    state.pc = BASE + 4;
    assert!(!engine.try_execute(&mut state));
    assert_eq!(state.pc, BASE + 4);
}

/// The delay slot of a likely branch has an effect exactly once per taken branch, and none when
/// the branch isn't taken.
#[test]
fn likely_delay_slot_side_effect() {
    let program = [
        instr::add_u_imm(Reg::T0, Reg::T0, (-1i16) as u16),
        instr::branch_if_likely(BCond::Ne, Reg::T0, Reg::ZERO, -2),
        instr::store_word(Reg::T0, Reg::V0, 0x2000),
        instr::jump(HALT),
        instr::nop(),
    ];
    let mut engine = profiling_engine();
    let mut profiled = load(&program);
    profiled.set_reg(Reg::T0, 10);
    run_to_break(&mut engine, &mut profiled);
    assert_eq!(engine.build_region(BASE), RegionStatus::Ready);

    for (count, stored) in [(1, 0xffff_ffff), (2, 1), (5, 1)] {
        let mut initial = load(&program);
        initial.set_reg(Reg::T0, count);
        initial.mem.write_u32(0x2000, 0xffff_ffff);
        let mut compiled = initial.clone();
        assert!(engine.try_execute(&mut compiled));
        assert_eq!(compiled, interpret_until(initial, HALT));
        // The last taken branch stored `t0 == 1`.
        assert_eq!(compiled.mem.read_u32(0x2000), stored);
    }
}
