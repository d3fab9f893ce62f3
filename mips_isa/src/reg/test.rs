use super::*;

#[test]
fn displays_register_names_correctly() {
    assert_eq!("$zero", format!("{:#}", Reg::ZERO));
    assert_eq!("$at", format!("{:#}", Reg::AT));
    assert_eq!("$v0", format!("{:#}", Reg::V0));
    assert_eq!("$a3", format!("{:#}", Reg::A3));
    assert_eq!("$t7", format!("{:#}", Reg::T7));
    assert_eq!("$s0", format!("{:#}", Reg::S0));
    assert_eq!("$t9", format!("{:#}", Reg::T9));
    assert_eq!("$k1", format!("{:#}", Reg::K1));
    assert_eq!("$gp", format!("{:#}", Reg::GP));
    assert_eq!("$sp", format!("{:#}", Reg::SP));
    assert_eq!("$fp", format!("{:#}", Reg::S8));
    assert_eq!("$ra", format!("{:#}", Reg::RA));

    assert_eq!("$0", format!("{}", Reg::new(0)));
    assert_eq!("$17", format!("{}", Reg::new(17)));
    assert_eq!("$31", format!("{}", Reg::new(31)));
}

#[test]
fn displays_fpu_and_control_registers() {
    assert_eq!("$f0", format!("{}", FReg::new(0)));
    assert_eq!("$f31", format!("{}", FReg::new(31)));
    assert_eq!("$fcr25", format!("{}", Fcr::Fccr));
    assert_eq!("$hi", format!("{}", HiLo::Hi));
    assert_eq!("$f4.d", format!("{}", RegRef::Fpr(FReg::new(4), FFmt::D)));
}

/// Register fields are five bits wide, so out of range numbers wrap instead of panicking.
#[test]
fn register_numbers_are_masked() {
    assert_eq!(Reg::new(33), Reg::new(1));
    assert_eq!(FReg::new(40).num(), 8);
}

#[test]
fn fpu_registers_pair_up() {
    assert_eq!(FReg::new(5).pair_base(), FReg::new(4));
    assert_eq!(FReg::new(4).pair_base(), FReg::new(4));
    assert_eq!(FReg::new(4).pair_partner(), FReg::new(5));
    assert_eq!(FReg::new(5).pair_partner(), FReg::new(4));
}

#[test]
fn control_registers_roundtrip_their_cp1_number() {
    for fcr in Fcr::all() {
        assert_eq!(Fcr::from_cp1(fcr.cp1_num()), Some(fcr));
    }
    assert_eq!(Fcr::from_cp1(1), None);
    assert_eq!(Fcr::all().map(Fcr::index).collect::<Vec<_>>(), vec![0, 1, 2, 3, 4]);
}
