use super::*;
use crate::instr;

#[test]
fn decodes_common_integer_instructions() {
    assert_eq!(
        decode(0x2408_0005),
        instr::add_u_imm(Reg::T0, Reg::ZERO, 5)
    );
    assert_eq!(decode(0x0085_1021), instr::add_u(Reg::V0, Reg::A0, Reg::A1));
    assert_eq!(decode(0x3c01_1234), instr::load_upper(Reg::AT, 0x1234));
    assert_eq!(decode(0x8fa8_0004), instr::load_word(Reg::T0, Reg::SP, 4));
    assert_eq!(decode(0x03e0_0008), instr::jump_reg(Reg::RA));
    assert_eq!(decode(0x0000_000c), instr::syscall());
    assert_eq!(decode(0), instr::nop());
}

#[test]
fn decodes_branches_with_their_encoded_offset() {
    assert_eq!(
        decode(0x1109_fffe),
        instr::branch_if(BCond::Eq, Reg::T0, Reg::T1, -2)
    );
    assert_eq!(
        decode(0x5109_fffe),
        instr::branch_if_likely(BCond::Eq, Reg::T0, Reg::T1, -2)
    );
    assert_eq!(decode(0x0c10_0000), instr::jump_and_link(0x0040_0000));
}

#[test]
fn decodes_fpu_instructions() {
    let (f0, f2, f4) = (FReg::new(0), FReg::new(2), FReg::new(4));
    assert_eq!(decode(0x4624_1000), instr::f_add(FFmt::D, f0, f2, f4));
    assert_eq!(
        decode(0x4602_003c),
        instr::f_compare(FCond::LT, FFmt::S, 0, f0, f2)
    );
    assert_eq!(decode(0x4501_0003), instr::branch_if_f_cond(true, 0, 3));
    assert_eq!(decode(0x7c09_4420), instr::sign_extend_byte(Reg::T0, Reg::T1));
}

/// Unsupported encodings must still decode, so the region builder can report them.
#[test]
fn unsupported_words_decode_to_unknown() {
    // lwl $t0, 0($t1)
    assert_eq!(decode(0x8928_0000), Instruction::Unknown(0x8928_0000));
    // cvt.s.s is not a valid conversion
    assert_eq!(decode(0x4600_0020), Instruction::Unknown(0x4600_0020));
    // cfc1 from a control register that doesn't exist
    assert_eq!(decode(0x4448_0800), Instruction::Unknown(0x4448_0800));
}

#[test]
fn encoding_is_inverse_of_decoding() {
    let (f1, f2, f6) = (FReg::new(1), FReg::new(2), FReg::new(6));
    let instructions = [
        instr::shift_left_logical_imm(Reg::T0, Reg::T1, 3),
        instr::shift_right_arithmetic(Reg::T0, Reg::T1, Reg::T2),
        instr::move_if_not_zero(Reg::V0, Reg::A0, Reg::A1),
        instr::mul(Reg::V0, Reg::A0, Reg::A1),
        instr::mult_u(Reg::A0, Reg::A1),
        instr::move_to_lo(Reg::S0),
        instr::count_leading_zeros(Reg::V0, Reg::A0),
        instr::sign_extend_half(Reg::V0, Reg::A0),
        instr::set_lt_u_imm(Reg::T0, Reg::T1, 0xffff),
        instr::store_half(Reg::T0, Reg::SP, (-8i16) as u16),
        instr::branch_if_z(BZCond::GeZ, Reg::A0, 7),
        instr::branch_if_z_likely(BZCond::LtZ, Reg::A0, -7),
        instr::branch_if_z_and_link(BZalCond::GeZ, Reg::A0, 1),
        instr::branch_if_f_cond_likely(false, 5, 2),
        instr::jump(0x0040_0100),
        instr::jump_and_link_reg(Reg::RA, Reg::T9),
        instr::f_convert(FFmt::S, FFmt::D, f1, f2),
        instr::f_convert_from_word(FFmt::D, f6, f1),
        instr::f_trunc_to_word(FFmt::D, f1, f6),
        instr::f_compare(FCond::ULE, FFmt::D, 3, f2, f6),
        instr::load_doubleword_to_fpu(f6, Reg::SP, 16),
        instr::move_from_fcr(Reg::T0, Fcr::Fccr),
        instr::move_to_fpu(Reg::T0, f1),
        instr::trap_if(TrapCond::Ne, Reg::T0, Reg::T1),
        instr::add_s_imm(Reg::T0, Reg::T1, 1),
    ];
    for instruction in instructions {
        assert_eq!(decode(instruction.encode()), instruction, "{instruction}");
    }
}

#[test]
fn displays_instructions_in_assembly_syntax() {
    assert_eq!(
        instr::load_word(Reg::T0, Reg::SP, (-4i16) as u16).to_string(),
        "lw\t$8, -4($29)"
    );
    assert_eq!(
        instr::branch_if_likely(BCond::Ne, Reg::T0, Reg::ZERO, 4).to_string(),
        "bnel\t$8, $0, 4"
    );
    assert_eq!(
        instr::shift_left_logical(Reg::T0, Reg::T1, Reg::T2).to_string(),
        "sllv\t$8, $9, $10"
    );
}
