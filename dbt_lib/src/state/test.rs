use super::*;

#[test]
fn memory_is_big_endian() {
    let mut mem = Memory::new(64);
    mem.write_u32(4, 0x1122_3344);
    assert_eq!(mem.read_u8(4), 0x11);
    assert_eq!(mem.read_u16(6), 0x3344);
    mem.write_u64(8, 0x0102_0304_0506_0708);
    assert_eq!(mem.read_u32(12), 0x0506_0708);
}

#[test]
fn addresses_wrap_around_memory_size() {
    let mut mem = Memory::new(16);
    mem.write_u32(14, 0xaabb_ccdd);
    assert_eq!(mem.read_u8(15), 0xbb);
    assert_eq!(mem.read_u8(0), 0xcc);
    assert_eq!(mem.read_u32(0x1000_000e), 0xaabb_ccdd);
}

#[test]
#[should_panic]
fn memory_size_must_be_a_power_of_two() {
    Memory::new(12);
}

#[test]
fn doubles_occupy_an_even_odd_pair() {
    let mut state = GuestState::new(Memory::new(16), 0);
    state.set_fpr_double(FReg::new(2), 1.5);
    let bits = 1.5f64.to_bits();
    assert_eq!(state.fpr_bits(FReg::new(2)), bits as u32);
    assert_eq!(state.fpr_bits(FReg::new(3)), (bits >> 32) as u32);
    assert_eq!(state.fpr_double(FReg::new(3)), 1.5);
    assert_eq!(state.read_guest(GuestLoc::FprPair(2)), bits);
}

#[test]
fn zero_register_ignores_writes() {
    let mut state = GuestState::new(Memory::new(16), 0);
    state.set_reg(Reg::ZERO, 5);
    state.write_guest(GuestLoc::Gpr(0), 7);
    assert_eq!(state.reg(Reg::ZERO), 0);
}

#[test]
fn condition_codes_live_in_fccr() {
    let mut state = GuestState::new(Memory::new(16), 0);
    state.set_condition_code(3, true);
    assert_eq!(state.fcr(Fcr::Fccr), 0b1000);
    assert!(state.condition_code(3));
    state.set_condition_code(3, false);
    assert!(!state.condition_code(3));
}
