use super::*;
use crate::analysis::ConstValue;
use crate::backend::{Backend, EvalBackend};
use crate::compile::{PreparedRegion, RegionBuilder};
use crate::config::EngineConfigBuilder;
use crate::interp::Interpreter;
use crate::profile::Profiler;
use crate::state::{GuestState, Memory};
use mips_isa::{instr, BCond, FCond, FFmt, FReg, Fcr};
use region_ir::{validate, Terminator};

const BASE: u32 = 0x1000;
const OUTSIDE: u32 = 0x3000;
const STACK: u32 = 0x4000;

fn load(program: &[Instruction]) -> GuestState {
    let words: Vec<u32> = program.iter().map(Instruction::encode).collect();
    let mut mem = Memory::new(1 << 16);
    mem.load_words(BASE, &words);
    let mut state = GuestState::new(mem, BASE);
    state.set_reg(Reg::SP, STACK);
    state
}

/// Interprets `blocks` blocks of `state`, or until it leaves the program, and prepares the region
/// at `BASE` from the profile.
fn prepare(state: &GuestState, blocks: usize, config: &EngineConfig) -> (PreparedRegion, Function) {
    let mut state = state.clone();
    let interpreter = Interpreter::new();
    let mut profiler = Profiler::new();
    for _ in 0..blocks {
        if state.pc == OUTSIDE {
            break;
        }
        let block = interpreter.step_block(&mut state).unwrap();
        profiler.record(&block, state.pc);
    }
    let mut builder = RegionBuilder::new(config, BASE);
    let prepared = builder.prepare(&profiler).unwrap();
    let function = builder.generate(&prepared);
    validate(&function).unwrap_or_else(|err| panic!("{err}\n{function}"));
    (prepared, function)
}

fn exit_reasons(function: &Function) -> Vec<ExitReason> {
    function
        .blocks()
        .iter()
        .filter_map(|block| match block.terminator {
            Some(Terminator::Exit { reason, .. }) => Some(reason),
            _ => None,
        })
        .collect()
}

/// Runs the single block of `program` compiled and interpreted from the same states and compares
/// the results.
fn check_block(program: &[Instruction], inputs: &[[u32; 4]]) {
    let config = EngineConfig::default();
    let initial = load(program);
    let (_, function) = prepare(&initial, 1, &config);
    let code = EvalBackend.compile(&function).unwrap();
    for input in inputs {
        let mut state = initial.clone();
        for (reg, &value) in [Reg::A0, Reg::A1, Reg::A2, Reg::A3].into_iter().zip(input) {
            state.set_reg(reg, value);
        }
        let mut expected = state.clone();
        Interpreter::new().step_block(&mut expected).unwrap();
        let exit = code.invoke(&mut state);
        assert_eq!(exit.pc, OUTSIDE);
        assert_eq!(exit.reason, ExitReason::BranchTarget);
        assert_eq!(state, expected, "inputs {input:x?}\n{function}");
    }
}

const INPUTS: [[u32; 4]; 6] = [
    [0, 0, 0, 0],
    [1, 2, 3, 4],
    [7, 0xffff_fffd, 0, 0x8000_0000],
    [0x8000_0000, 0xffff_ffff, 5, 31],
    [0x1234_5678, 33, 0xff80, 0x7fff_ffff],
    [0xffff_ff80, 0x0000_8001, 0x10, 0xdead_beef],
];

#[test]
fn integer_block_matches_interpreter() {
    let program = [
        instr::load_upper(Reg::T0, 0x1234),
        instr::or_imm(Reg::T0, Reg::T0, 0x5678),
        instr::add_u(Reg::T1, Reg::A0, Reg::A1),
        instr::sub_u(Reg::T2, Reg::A0, Reg::A1),
        instr::and(Reg::T3, Reg::A0, Reg::T0),
        instr::nor(Reg::T4, Reg::A1, Reg::A2),
        instr::xor(Reg::T5, Reg::A2, Reg::A3),
        instr::set_lt_s(Reg::S0, Reg::A0, Reg::A1),
        instr::set_lt_u(Reg::S1, Reg::A0, Reg::A1),
        instr::shift_left_logical(Reg::S2, Reg::A0, Reg::A1),
        instr::shift_right_logical(Reg::S3, Reg::A0, Reg::A1),
        instr::shift_right_arithmetic(Reg::S4, Reg::A0, Reg::A1),
        instr::shift_left_logical_imm(Reg::T6, Reg::A3, 7),
        instr::shift_right_arithmetic_imm(Reg::T7, Reg::A0, 31),
        instr::move_if_zero(Reg::V0, Reg::A0, Reg::A2),
        instr::move_if_not_zero(Reg::V1, Reg::A1, Reg::A2),
        instr::mul(Reg::T8, Reg::A0, Reg::A1),
        instr::count_leading_zeros(Reg::T9, Reg::A2),
        instr::sign_extend_byte(Reg::K0, Reg::A2),
        instr::sign_extend_half(Reg::K1, Reg::A1),
        instr::set_lt_s_imm(Reg::GP, Reg::A0, 0xfff0),
        instr::set_lt_u_imm(Reg::FP, Reg::A1, 0xfff0),
        instr::xor_imm(Reg::AT, Reg::A3, 0x8001),
        instr::add_u_imm(Reg::S5, Reg::A0, 0x8000),
        instr::mult_s(Reg::A0, Reg::A1),
        instr::move_from_lo(Reg::S6),
        instr::div_u(Reg::A0, Reg::A2),
        instr::move_from_hi(Reg::S7),
        instr::div_s(Reg::A1, Reg::A2),
        instr::move_to_lo(Reg::A3),
        instr::jump(OUTSIDE),
        instr::nop(),
    ];
    check_block(&program, &INPUTS);
}

#[test]
fn memory_block_matches_interpreter() {
    let program = [
        instr::store_word(Reg::A0, Reg::SP, 0),
        instr::store_half(Reg::A1, Reg::SP, 6),
        instr::store_byte(Reg::A2, Reg::SP, 9),
        instr::load_word(Reg::T0, Reg::SP, 4),
        instr::load_half_s(Reg::T1, Reg::SP, 6),
        instr::load_half_u(Reg::T2, Reg::SP, 6),
        instr::load_byte_s(Reg::T3, Reg::SP, 9),
        instr::load_byte_u(Reg::T4, Reg::SP, 9),
        instr::load_word(Reg::T5, Reg::SP, 0),
        // A store through a computed address, wrapped into memory.
        instr::add_u(Reg::T6, Reg::A3, Reg::SP),
        instr::store_word(Reg::T5, Reg::T6, (-4i16) as u16),
        instr::jump_and_link(OUTSIDE),
        instr::load_word(Reg::T7, Reg::T6, (-4i16) as u16),
    ];
    check_block(&program, &INPUTS);
}

#[test]
fn fp_block_matches_interpreter() {
    let f = FReg::new;
    let program = [
        instr::or_imm(Reg::A0, Reg::A0, 1),
        instr::move_to_fpu(Reg::A0, f(0)),
        instr::move_to_fpu(Reg::A1, f(1)),
        instr::f_convert_from_word(FFmt::D, f(2), f(0)),
        instr::f_convert_from_word(FFmt::S, f(4), f(1)),
        instr::f_add(FFmt::D, f(6), f(2), f(2)),
        instr::f_mul(FFmt::S, f(8), f(4), f(4)),
        instr::f_div(FFmt::D, f(10), f(6), f(2)),
        instr::f_abs(FFmt::D, f(12), f(6)),
        instr::f_sqrt(FFmt::D, f(12), f(12)),
        instr::f_neg(FFmt::S, f(14), f(8)),
        instr::f_sub(FFmt::S, f(14), f(14), f(4)),
        instr::f_compare(FCond::LT, FFmt::D, 0, f(2), f(6)),
        instr::f_compare(FCond::EQ, FFmt::S, 3, f(4), f(8)),
        instr::move_from_fcr(Reg::T0, Fcr::Fccr),
        instr::f_trunc_to_word(FFmt::D, f(16), f(6)),
        instr::move_from_fpu(Reg::T1, f(16)),
        instr::f_convert_to_word(FFmt::S, f(18), f(8)),
        instr::move_from_fpu(Reg::T2, f(18)),
        instr::f_convert(FFmt::S, FFmt::D, f(20), f(10)),
        instr::f_convert(FFmt::D, FFmt::S, f(22), f(20)),
        instr::store_word_from_fpu(f(20), Reg::SP, 0),
        instr::store_doubleword_from_fpu(f(6), Reg::SP, 8),
        instr::load_word_to_fpu(f(24), Reg::SP, 0),
        instr::load_doubleword_to_fpu(f(26), Reg::SP, 8),
        instr::f_move(FFmt::D, f(28), f(26)),
        instr::move_from_fpu(Reg::T3, f(29)),
        instr::jump(OUTSIDE),
        instr::nop(),
    ];
    check_block(&program, &INPUTS);
}

/// Writing one half of a register pair that was last written as a double keeps the other half.
#[test]
fn fp_pair_halves_stay_consistent() {
    let f = FReg::new;
    let program = [
        instr::f_convert_from_word(FFmt::D, f(2), f(0)),
        instr::move_to_fpu(Reg::A1, f(3)),
        instr::f_add(FFmt::D, f(4), f(2), f(2)),
        instr::move_to_fpu(Reg::A2, f(4)),
        instr::jump(OUTSIDE),
        instr::nop(),
    ];
    check_block(&program, &INPUTS);
}

/// `0x1000: loop: addiu t0, -1; addu v0, v0, t0; bne t0, zero, loop; nop; j OUTSIDE; nop`
fn countdown() -> GuestState {
    let program = [
        instr::add_u_imm(Reg::T0, Reg::T0, (-1i16) as u16),
        instr::add_u(Reg::V0, Reg::V0, Reg::T0),
        instr::branch_if(BCond::Ne, Reg::T0, Reg::ZERO, -3),
        instr::nop(),
        instr::jump(OUTSIDE),
        instr::nop(),
    ];
    let mut state = load(&program);
    state.set_reg(Reg::T0, 10);
    state
}

#[test]
fn loop_gets_phis_and_runs_to_completion() {
    let initial = countdown();
    let (prepared, function) = prepare(&initial, 20, &EngineConfig::default());
    assert_eq!(function.name, "region_00001000");
    assert!(prepared.info.phis >= 3);
    let phis: usize = function.blocks().iter().map(|block| block.phis().count()).sum();
    assert_eq!(phis, prepared.info.phis);

    let code = EvalBackend.compile(&function).unwrap();
    let mut state = initial.clone();
    let exit = code.invoke(&mut state);
    assert_eq!(exit.pc, OUTSIDE);
    assert_eq!(exit.reason, ExitReason::BranchTarget);

    let mut expected = initial;
    while expected.pc != OUTSIDE {
        Interpreter::new().step_block(&mut expected).unwrap();
    }
    assert_eq!(state, expected);
    assert_eq!(state.reg(Reg::V0), 45);
}

#[test]
fn instruction_counting_can_be_disabled() {
    let config = EngineConfigBuilder::new()
        .count_instructions(false)
        .build()
        .unwrap();
    let (prepared, function) = prepare(&countdown(), 20, &config);
    assert!(!prepared.usage.live_in().contains(&PhiReg::Icnt));
    assert!(!function.to_string().contains("icnt"));

    let (_, function) = prepare(&countdown(), 20, &EngineConfig::default());
    assert!(function.to_string().contains("icnt"));
}

/// Without folding, a constant computed in the region is still computed at run time.
#[test]
fn folding_replaces_arithmetic_with_constants() {
    let program = [
        instr::load_upper(Reg::T0, 0x1234),
        instr::or_imm(Reg::T0, Reg::T0, 0x5678),
        instr::add_u(Reg::T1, Reg::T0, Reg::T0),
        instr::jump(OUTSIDE),
        instr::nop(),
    ];
    let folded = EngineConfig::default();
    let unfolded = EngineConfigBuilder::new()
        .fold_constants(false)
        .build()
        .unwrap();
    let (_, with) = prepare(&load(&program), 1, &folded);
    let (_, without) = prepare(&load(&program), 1, &unfolded);
    let text = with.to_string();
    assert!(text.contains("const 0x2468acf0"), "{text}");
    assert!(!without.to_string().contains("const 0x2468acf0"));
    assert!(with.instruction_count() < without.instruction_count());
}

#[test]
fn indirect_jump_dispatches_over_known_targets() {
    let program = [
        // 0x1000
        instr::load_word(Reg::T9, Reg::A0, 0),
        instr::add_u_imm(Reg::A0, Reg::A0, 4),
        instr::jump_reg(Reg::T9),
        instr::nop(),
        // 0x1010
        instr::add_u_imm(Reg::V0, Reg::V0, 1),
        instr::jump(BASE),
        instr::nop(),
        // 0x101c
        instr::add_u_imm(Reg::V1, Reg::V1, 1),
        instr::jump(BASE),
        instr::nop(),
    ];
    let mut state = load(&program);
    state
        .mem
        .load_words(0x2000, &[BASE + 0x10, BASE + 0x1c, BASE + 0x10, OUTSIDE]);
    state.set_reg(Reg::A0, 0x2000);
    let (prepared, function) = prepare(&state, 6, &EngineConfig::default());
    assert!(prepared.info.has_indirect_jumps);
    let dispatch = function
        .blocks()
        .iter()
        .filter(|block| block.name == "dispatch")
        .count();
    // One test per target seen: 0x1010 and 0x101c.
    assert_eq!(dispatch, 2);
    assert!(exit_reasons(&function).contains(&ExitReason::IndirectMiss));

    // The fourth target was never seen by the profile.
    let code = EvalBackend.compile(&function).unwrap();
    let mut compiled = state.clone();
    let exit = code.invoke(&mut compiled);
    assert_eq!(exit.pc, OUTSIDE);
    assert_eq!(exit.reason, ExitReason::IndirectMiss);
    let mut expected = state;
    while expected.pc != OUTSIDE {
        Interpreter::new().step_block(&mut expected).unwrap();
    }
    assert_eq!(compiled, expected);
    assert_eq!(compiled.reg(Reg::V0), 2);
    assert_eq!(compiled.reg(Reg::V1), 1);
}

/// A register jump to a known constant needs no dispatch.
#[test]
fn constant_register_jump_is_direct() {
    let program = [
        instr::load_upper(Reg::T9, 0),
        instr::or_imm(Reg::T9, Reg::T9, (OUTSIDE & 0xffff) as u16),
        instr::jump_reg(Reg::T9),
        instr::nop(),
    ];
    let (_, function) = prepare(&load(&program), 1, &EngineConfig::default());
    assert!(function.blocks().iter().all(|block| block.name != "dispatch"));
    assert_eq!(exit_reasons(&function), vec![ExitReason::BranchTarget]);
}

#[test]
fn likely_branch_region_exits_when_untaken() {
    let program = [
        instr::add_u_imm(Reg::T0, Reg::T0, (-1i16) as u16),
        instr::branch_if_likely(BCond::Ne, Reg::T0, Reg::ZERO, -2),
        instr::add_u_imm(Reg::V0, Reg::V0, 2),
        instr::jump(OUTSIDE),
        instr::nop(),
    ];
    let mut initial = load(&program);
    initial.set_reg(Reg::T0, 4);
    let (prepared, function) = prepare(&initial, 3, &EngineConfig::default());
    assert_eq!(prepared.info.likely_patches, 1);
    assert!(exit_reasons(&function).contains(&ExitReason::LikelyUntaken));

    let code = EvalBackend.compile(&function).unwrap();
    let mut state = initial.clone();
    let exit = code.invoke(&mut state);
    assert_eq!(exit.pc, BASE + 12);
    assert_eq!(exit.reason, ExitReason::LikelyUntaken);
    // Taken three times, the delay slot ran three times.
    assert_eq!(state.reg(Reg::V0), 6);
    assert_eq!(state.icnt, 4 * 2 + 3);
}

/// Every child of a dominator tree node starts from its own copy of the register table.
#[test]
fn sibling_subtrees_do_not_share_register_state() {
    let mut b = FunctionBuilder::new("t");
    b.start_block(b.entry_block());
    let zero = b.iconst(Ty::I32, 0);
    let one = b.iconst(Ty::I32, 1);
    let two = b.iconst(Ty::I32, 2);
    let mut parent = RegisterTable::new(zero);
    parent.set_gpr(Reg::T0, one, ConstValue::Constant(1));

    let mut left = parent.clone();
    let mut right = parent.clone();
    left.set_gpr(Reg::T0, two, ConstValue::Constant(2));
    right.set_gpr(Reg::T1, two, ConstValue::Variant);

    assert_eq!(parent.gpr(Reg::T0), one);
    assert_eq!(parent.consts().get(Reg::T0), ConstValue::Constant(1));
    assert_eq!(right.gpr(Reg::T0), one);
    assert_eq!(left.gpr(Reg::T0), two);
    assert_eq!(left.consts().get(Reg::T1), ConstValue::Variant);
    // Writes to $zero are dropped.
    left.set_gpr(Reg::ZERO, two, ConstValue::Constant(2));
    assert_eq!(left.gpr(Reg::ZERO), zero);
}

/// Compiled diamond: each direction of the branch produces the interpreter's state.
#[test]
fn both_branch_directions_match_interpreter() {
    let program = [
        // 0x1000
        instr::branch_if(BCond::Eq, Reg::A0, Reg::ZERO, 3),
        instr::add_u_imm(Reg::V1, Reg::V1, 1),
        // 0x1008
        instr::add_u_imm(Reg::V0, Reg::ZERO, 7),
        instr::add_u_imm(Reg::A1, Reg::A1, 1),
        // 0x1010
        instr::add_u(Reg::V0, Reg::V0, Reg::A1),
        instr::jump(OUTSIDE),
        instr::nop(),
    ];
    let mut taken = load(&program);
    taken.set_reg(Reg::A0, 0);
    taken.set_reg(Reg::V0, 100);
    let mut not_taken = taken.clone();
    not_taken.set_reg(Reg::A0, 5);

    // Profile both directions.
    let interpreter = Interpreter::new();
    let mut profiler = Profiler::new();
    for initial in [&taken, &not_taken] {
        let mut state = initial.clone();
        while state.pc != OUTSIDE {
            let block = interpreter.step_block(&mut state).unwrap();
            profiler.record(&block, state.pc);
        }
    }
    let config = EngineConfig::default();
    let mut builder = RegionBuilder::new(&config, BASE);
    let region = builder.compile(&profiler, &mut EvalBackend).unwrap();
    assert_eq!(region.info().blocks, 4);

    for initial in [taken, not_taken] {
        let mut compiled = initial.clone();
        let exit = region.invoke(&mut compiled);
        assert_eq!(exit.pc, OUTSIDE);
        let mut expected = initial;
        while expected.pc != OUTSIDE {
            interpreter.step_block(&mut expected).unwrap();
        }
        assert_eq!(compiled, expected);
    }
}
