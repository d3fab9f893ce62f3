use mips_isa::{FFmt, FReg, Precision};
use std::fmt;

/// How a floating-point register is used within a block or region.
///
/// The values form a lattice `Unused < {Single, Double} < Both`, merged with [`FpUsage::join`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FpUsage {
    #[default]
    Unused,
    Single,
    Double,
    Both,
}

impl FpUsage {
    pub fn join(self, other: Self) -> Self {
        match (self, other) {
            (Self::Unused, usage) | (usage, Self::Unused) => usage,
            (a, b) if a == b => a,
            _ => Self::Both,
        }
    }
}

/// Per-register floating-point usage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FpTouched([FpUsage; 32]);

impl FpTouched {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an access of `reg` at width `fmt`. A double access covers both registers of the
    /// pair.
    pub fn update(&mut self, reg: FReg, fmt: FFmt) {
        match fmt {
            FFmt::S => self.join_at(reg, FpUsage::Single),
            FFmt::D => {
                self.join_at(reg.pair_base(), FpUsage::Double);
                self.join_at(reg.pair_base().pair_partner(), FpUsage::Double);
            }
        }
    }

    fn join_at(&mut self, reg: FReg, usage: FpUsage) {
        let slot = &mut self.0[reg.index()];
        *slot = slot.join(usage);
    }

    pub fn merge(&mut self, other: &FpTouched) {
        for reg in FReg::all() {
            self.join_at(reg, other.get(reg));
        }
    }

    pub fn get(&self, reg: FReg) -> FpUsage {
        self.0[reg.index()]
    }

    pub fn is_unused(&self) -> bool {
        self.0.iter().all(|usage| *usage == FpUsage::Unused)
    }

    /// The first register used at both widths.
    pub fn mixed(&self) -> Option<FReg> {
        FReg::all().find(|reg| self.get(*reg) == FpUsage::Both)
    }

    /// The representation `reg` is kept in at region boundaries: when it is loaded on entry, merged
    /// at join points and written back on exit.
    pub fn form(&self, reg: FReg) -> FprForm {
        let base = reg.pair_base();
        let pure_double = self.get(base) == FpUsage::Double
            && self.get(base.pair_partner()) == FpUsage::Double;
        match (pure_double, reg == base, self.get(reg)) {
            (true, true, _) => FprForm::Double,
            (true, false, _) => FprForm::Covered,
            (false, _, FpUsage::Single) => FprForm::Single,
            (false, _, _) => FprForm::Bits,
        }
    }
}

/// Boundary representation of a floating-point register, see [`FpTouched::form`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FprForm {
    /// An `f32`.
    Single,
    /// An `f64` held by this even register and its partner.
    Double,
    /// The odd half of a [`FprForm::Double`] pair; it has no value of its own.
    Covered,
    /// The raw word, for registers whose use mixes widths or that are only moved around.
    Bits,
}

/// Histogram of the precision categories of a region's instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PrecisionCounts {
    pub integer: usize,
    pub single: usize,
    pub double: usize,
}

impl PrecisionCounts {
    pub fn add(&mut self, precision: Precision) {
        match precision {
            Precision::Integer => self.integer += 1,
            Precision::Single => self.single += 1,
            Precision::Double => self.double += 1,
        }
    }

    pub fn merge(&mut self, other: &PrecisionCounts) {
        self.integer += other.integer;
        self.single += other.single;
        self.double += other.double;
    }

    pub fn has_fp(&self) -> bool {
        self.single + self.double > 0
    }
}

impl fmt::Display for PrecisionCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} integer, {} single, {} double",
            self.integer, self.single, self.double
        )
    }
}
