use std::fs;

use dbt_lib::{
    parse_hex_listing, Engine, EngineConfig, EngineConfigBuilder, GuestFault, GuestState, Memory,
};
use mips_isa::Reg;

include! {concat!(env!("OUT_DIR"), "/tests.rs")}

const BASE: u32 = 0x1000;
const MEM_SIZE: usize = 1 << 16;
const MAX_BLOCKS: u64 = 1_000_000;

fn load(file: &str) -> GuestState {
    let text = fs::read_to_string(file).unwrap();
    let words = parse_hex_listing(&text).unwrap();
    let mut mem = Memory::new(MEM_SIZE);
    mem.load_words(BASE, &words);
    let mut state = GuestState::new(mem, BASE);
    state.set_reg(Reg::SP, MEM_SIZE as u32 - 16);
    state
}

fn reg_by_name(name: &str) -> Reg {
    Reg::all()
        .find(|reg| format!("{reg:#}") == name || format!("{reg}") == name)
        .unwrap_or_else(|| panic!("`{name}` isn't a register"))
}

/// Runs the program to its `break`.
fn run(config: EngineConfig, mut state: GuestState) -> (Engine, GuestState) {
    let mut engine = Engine::new(config);
    match engine.run(&mut state, MAX_BLOCKS) {
        Err(GuestFault::Break { .. }) => {}
        Err(fault) => panic!("guest faulted: {fault}"),
        Ok(summary) => panic!("guest didn't stop after {} blocks", summary.blocks),
    }
    (engine, state)
}

/// Runs the program interpreted only and with compilation under several configurations, and
/// checks that all runs end in the same state with the expected registers.
fn differential_test(file: &str, hot_threshold: u64, expected: &[(&str, u32)]) {
    let initial = load(file);
    let reference = EngineConfigBuilder::new().interpret_only().build().unwrap();
    let (_, interpreted) = run(reference, initial.clone());

    for &(name, value) in expected {
        assert_eq!(
            interpreted.reg(reg_by_name(name)),
            value,
            "interpreted {name} doesn't have the expected value"
        );
    }

    let configs = [
        ("default", EngineConfigBuilder::new()),
        ("no folding", EngineConfigBuilder::new().fold_constants(false)),
        ("no splitting", EngineConfigBuilder::new().split_blocks(false)),
        ("one cache line", EngineConfigBuilder::new().cache_capacity(1)),
    ];
    for (name, builder) in configs {
        let config = builder.hot_threshold(hot_threshold).build().unwrap();
        let (engine, compiled) = run(config, initial.clone());
        println!("{name}:\n{}", engine.stats());
        pretty_assertions::assert_eq!(
            compiled,
            interpreted,
            "{name}: the compiled run (left) doesn't match the interpreted run (right)"
        );
    }

    // Without instruction counting only the counter may differ.
    let config = EngineConfigBuilder::new()
        .hot_threshold(hot_threshold)
        .count_instructions(false)
        .build()
        .unwrap();
    let (_, mut uncounted) = run(config, initial);
    assert!(uncounted.icnt <= interpreted.icnt);
    uncounted.icnt = interpreted.icnt;
    pretty_assertions::assert_eq!(uncounted, interpreted);
}
