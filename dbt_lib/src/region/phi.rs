//! SSA construction over the region CFG: which registers every block defines and reads, and phi
//! placement at the iterated dominance frontier of each register's definitions.

use super::block::Access;
use super::{BlockId, Region};
use crate::analysis::{FpTouched, FprForm};
use mips_isa::{FFmt, FReg, Fcr, HiLo, Reg, RegRef};
use region_ir::{GuestLoc, Ty};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// A unit of guest state tracked through SSA construction.
///
/// A floating-point register pair kept in double form is tracked as its even register alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PhiReg {
    Gpr(Reg),
    HiLo(HiLo),
    Fpr(FReg),
    Fcr(Fcr),
    /// The retired instruction counter.
    Icnt,
}

impl PhiReg {
    /// Type of the value merged for this register, given the region's floating-point forms.
    pub fn ty(self, fp: &FpTouched) -> Ty {
        match self {
            Self::Gpr(_) | Self::HiLo(_) | Self::Fcr(_) => Ty::I32,
            Self::Fpr(reg) => match fp.form(reg) {
                FprForm::Single => Ty::F32,
                FprForm::Double => Ty::F64,
                FprForm::Bits | FprForm::Covered => Ty::I32,
            },
            Self::Icnt => Ty::I64,
        }
    }

    /// Where the register lives in guest state, given the region's floating-point forms.
    pub fn guest_loc(self, fp: &FpTouched) -> GuestLoc {
        match self {
            Self::Gpr(reg) => GuestLoc::Gpr(reg.num()),
            Self::HiLo(HiLo::Hi) => GuestLoc::Hi,
            Self::HiLo(HiLo::Lo) => GuestLoc::Lo,
            Self::Fpr(reg) if fp.form(reg) == FprForm::Double => GuestLoc::FprPair(reg.num()),
            Self::Fpr(reg) => GuestLoc::Fpr(reg.num()),
            Self::Fcr(fcr) => GuestLoc::Fcr(fcr.index() as u8),
            Self::Icnt => GuestLoc::Icnt,
        }
    }

    /// The tracked registers an access touches.
    pub fn of(reg: RegRef, fp: &FpTouched) -> Vec<PhiReg> {
        match reg {
            RegRef::Gpr(reg) if reg.is_zero() => vec![],
            RegRef::Gpr(reg) => vec![Self::Gpr(reg)],
            RegRef::HiLo(hilo) => vec![Self::HiLo(hilo)],
            RegRef::Fcr(fcr) => vec![Self::Fcr(fcr)],
            RegRef::Fpr(reg, FFmt::S) => match fp.form(reg) {
                FprForm::Covered => vec![Self::Fpr(reg.pair_base())],
                _ => vec![Self::Fpr(reg)],
            },
            RegRef::Fpr(reg, FFmt::D) => {
                let base = reg.pair_base();
                match fp.form(base) {
                    FprForm::Double => vec![Self::Fpr(base)],
                    _ => vec![Self::Fpr(base), Self::Fpr(base.pair_partner())],
                }
            }
        }
    }
}

impl fmt::Display for PhiReg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gpr(reg) => write!(f, "{reg}"),
            Self::HiLo(hilo) => write!(f, "{hilo}"),
            Self::Fpr(reg) => write!(f, "{reg}"),
            Self::Fcr(fcr) => write!(f, "{fcr}"),
            Self::Icnt => f.write_str("icnt"),
        }
    }
}

/// A merge of `reg` at the start of a block. The incoming values are filled in by code generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhiNode {
    pub reg: PhiReg,
}

/// Registers defined and read across a region.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegisterUsage {
    /// The blocks defining each register.
    pub defs: BTreeMap<PhiReg, BTreeSet<BlockId>>,
    /// Registers some block reads before defining them itself.
    pub reads: BTreeSet<PhiReg>,
}

impl RegisterUsage {
    pub fn collect(region: &Region, count_instructions: bool) -> Self {
        let fp = region.fp_touched();
        let mut usage = Self::default();
        for (id, block) in region.blocks() {
            let mut defined = BTreeSet::new();
            for access in block.accesses() {
                match access {
                    Access::Read(reg) => {
                        for reg in PhiReg::of(reg, fp) {
                            if !defined.contains(&reg) {
                                usage.reads.insert(reg);
                            }
                        }
                    }
                    Access::Write(reg) => {
                        for reg in PhiReg::of(reg, fp) {
                            defined.insert(reg);
                            usage.defs.entry(reg).or_default().insert(id);
                        }
                    }
                }
            }
            if count_instructions && block.instruction_count() > 0 {
                usage.defs.entry(PhiReg::Icnt).or_default().insert(id);
            }
        }
        if count_instructions {
            usage.reads.insert(PhiReg::Icnt);
        }
        usage
    }

    /// Registers whose value is needed on entry: everything read or written somewhere.
    pub fn live_in(&self) -> BTreeSet<PhiReg> {
        self.reads
            .iter()
            .chain(self.defs.keys())
            .copied()
            .collect()
    }

    /// Registers that must be written back when leaving the region.
    pub fn written(&self) -> impl Iterator<Item = PhiReg> + '_ {
        self.defs.keys().copied()
    }
}

/// Places phis for every defined register at the iterated dominance frontier of its defining
/// blocks. Requires dominators.
pub fn place_phis(region: &mut Region, usage: &RegisterUsage) -> usize {
    let tree = region
        .dominator_tree()
        .expect("dominators must be computed before placing phis")
        .clone();
    let frontiers = tree.dominance_frontiers(region);
    let mut placed = 0;
    for (&reg, def_blocks) in &usage.defs {
        let mut work: Vec<BlockId> = def_blocks.iter().copied().collect();
        let mut has_phi = BTreeSet::new();
        let mut queued: BTreeSet<BlockId> = def_blocks.clone();
        while let Some(block) = work.pop() {
            for &frontier in &frontiers[&block] {
                if !has_phi.insert(frontier) {
                    continue;
                }
                if region[frontier].add_phi(reg) {
                    placed += 1;
                }
                if queued.insert(frontier) {
                    work.push(frontier);
                }
            }
        }
    }
    placed
}
