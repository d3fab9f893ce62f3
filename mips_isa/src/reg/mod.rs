#[cfg(test)]
mod test;

use crate::FFmt;

/// A register of any class the translator tracks, as read or written by an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegRef {
    Gpr(Reg),
    HiLo(HiLo),
    /// A floating-point register accessed at the given width. A double access covers the even/odd
    /// pair starting at the register.
    Fpr(FReg, FFmt),
    Fcr(Fcr),
}

impl std::fmt::Display for RegRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Gpr(reg) => write!(f, "{reg}"),
            Self::HiLo(hilo) => write!(f, "{hilo}"),
            Self::Fpr(freg, fmt) => write!(f, "{freg}.{fmt}"),
            Self::Fcr(fcr) => write!(f, "{fcr}"),
        }
    }
}

/// Represents a MIPS CPU register.
///
/// The MIPS registers are conventinally used as follows:
///
/// | register    | name         | usage |
/// | ----------- | ------------ | ------------ |
/// |`$0`         |`$zero`       | always zero |
/// |`$1`         |`$at`         | assembler temporary |
/// |`$2` - `$3`  |`$v0` - `$v1` | value for function results and expression evaluation |
/// |`$4` - `$7`  |`$a0` - `$a3` | function arguments |
/// |`$8` - `$15` |`$t0` - `$t7` | temporaries |
/// |`$16` - `$23`|`$s0` - `$s7` | saved temporaries |
/// |`$24` - `$25`|`$t8` - `$t9` | temporaries |
/// |`$26` - `$27`|`$k0` - `$k1` | reserved for os kernel |
/// |`$28`        |`$gp`         | global pointer |
/// |`$29`        |`$sp`         | stack pointer |
/// |`$30`        |`$fp` or `$s8`| frame pointer or another saved temporary |
/// |`$31`        |`$ra`         | return address (used by e.g. `jal`) |
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Reg(u8);

impl Reg {
    // $zero
    pub const ZERO: Self = Self(0);
    // $at
    pub const AT: Self = Self(1);
    // $v0 - $v1
    pub const V0: Self = Self(2);
    pub const V1: Self = Self(3);
    // $a0 - $a3
    pub const A0: Self = Self(4);
    pub const A1: Self = Self(5);
    pub const A2: Self = Self(6);
    pub const A3: Self = Self(7);
    // $t0 - $t7
    pub const T0: Self = Self(8);
    pub const T1: Self = Self(9);
    pub const T2: Self = Self(10);
    pub const T3: Self = Self(11);
    pub const T4: Self = Self(12);
    pub const T5: Self = Self(13);
    pub const T6: Self = Self(14);
    pub const T7: Self = Self(15);
    // $s0 - $s7
    pub const S0: Self = Self(16);
    pub const S1: Self = Self(17);
    pub const S2: Self = Self(18);
    pub const S3: Self = Self(19);
    pub const S4: Self = Self(20);
    pub const S5: Self = Self(21);
    pub const S6: Self = Self(22);
    pub const S7: Self = Self(23);
    // $t8 - $t9
    pub const T8: Self = Self(24);
    pub const T9: Self = Self(25);
    /// $k0 - $k1
    pub const K0: Self = Self(26);
    pub const K1: Self = Self(27);
    /// $gp, $sp, $fp or $s8, $ra
    pub const GP: Self = Self(28);
    pub const SP: Self = Self(29);
    pub const FP: Self = Self(30);
    pub const S8: Self = Self(30);
    pub const RA: Self = Self(31);

    /// Creates the register with the given number. Only the low five bits are used, so every
    /// encoded register field maps to a valid register.
    pub const fn new(num: u8) -> Self {
        Self(num & 0x1f)
    }

    pub fn num(self) -> u8 {
        self.0
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Returns `true` for `$zero`, which reads as 0 and ignores writes.
    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn all() -> impl Iterator<Item = Reg> {
        (0..32).map(Reg)
    }
}

const GPR_NAMES: [&str; 32] = [
    "$zero", "$at", "$v0", "$v1", "$a0", "$a1", "$a2", "$a3", "$t0", "$t1", "$t2", "$t3", "$t4",
    "$t5", "$t6", "$t7", "$s0", "$s1", "$s2", "$s3", "$s4", "$s5", "$s6", "$s7", "$t8", "$t9",
    "$k0", "$k1", "$gp", "$sp", "$fp", "$ra",
];

impl std::fmt::Debug for Reg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(self, f)
    }
}

impl std::fmt::Display for Reg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if f.alternate() {
            f.write_str(GPR_NAMES[self.index()])
        } else {
            write!(f, "${}", self.0)
        }
    }
}

/// Represents a MIPS FPU register.
///
/// There're only 32: $f0 - $f31. A double-precision value occupies an even register and the next
/// uneven one, with the even register holding the low-order word. Writing a single-precision value
/// to either half clobbers that half of the double.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FReg(u8);

impl FReg {
    pub const fn new(num: u8) -> Self {
        Self(num & 0x1f)
    }

    pub fn num(self) -> u8 {
        self.0
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Returns `true` if this fpu register can be used for operations on doubles.
    ///
    /// Only even-numbered fpu registers can be used for storing doubles.
    ///
    /// # Examples
    ///
    /// ```
    /// use mips_isa::FReg;
    ///
    /// assert!(!FReg::new(3).is_double());
    /// assert!(FReg::new(4).is_double());
    /// assert!(FReg::new(0).is_double());
    /// ```
    pub fn is_double(self) -> bool {
        self.0 % 2 == 0
    }

    /// Returns the even register of the pair this register belongs to.
    pub fn pair_base(self) -> FReg {
        FReg(self.0 & !1)
    }

    /// Returns the other register of the pair this register belongs to.
    pub fn pair_partner(self) -> FReg {
        FReg(self.0 ^ 1)
    }

    pub fn all() -> impl Iterator<Item = FReg> {
        (0..32).map(FReg)
    }
}

impl std::fmt::Debug for FReg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(self, f)
    }
}

impl std::fmt::Display for FReg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "$f{}", self.0)
    }
}

/// The multiply/divide result registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HiLo {
    Hi,
    Lo,
}

impl HiLo {
    pub fn index(self) -> usize {
        match self {
            Self::Hi => 0,
            Self::Lo => 1,
        }
    }

    pub fn all() -> impl Iterator<Item = HiLo> {
        [Self::Hi, Self::Lo].into_iter()
    }
}

impl std::fmt::Display for HiLo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Hi => "$hi",
            Self::Lo => "$lo",
        })
    }
}

/// The FPU control registers reachable through `cfc1`/`ctc1`.
///
/// `c.cond.fmt` sets, and `bc1t`/`bc1f` test, a condition code bit in [`Fcr::Fccr`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Fcr {
    /// Implementation register, CP1 control register 0.
    Fir,
    /// Control/status register, CP1 control register 31.
    Fcsr,
    /// Condition codes, CP1 control register 25.
    Fccr,
    /// Exceptions, CP1 control register 26.
    Fexr,
    /// Enables, CP1 control register 28.
    Fenr,
}

impl Fcr {
    pub const COUNT: usize = 5;

    /// Maps a CP1 control register number to the register, if it is one of the five
    /// architecturally visible ones.
    pub fn from_cp1(num: u8) -> Option<Self> {
        match num {
            0 => Some(Self::Fir),
            31 => Some(Self::Fcsr),
            25 => Some(Self::Fccr),
            26 => Some(Self::Fexr),
            28 => Some(Self::Fenr),
            _ => None,
        }
    }

    pub fn cp1_num(self) -> u8 {
        match self {
            Self::Fir => 0,
            Self::Fcsr => 31,
            Self::Fccr => 25,
            Self::Fexr => 26,
            Self::Fenr => 28,
        }
    }

    pub fn index(self) -> usize {
        match self {
            Self::Fir => 0,
            Self::Fcsr => 1,
            Self::Fccr => 2,
            Self::Fexr => 3,
            Self::Fenr => 4,
        }
    }

    pub fn all() -> impl Iterator<Item = Fcr> {
        [Self::Fir, Self::Fcsr, Self::Fccr, Self::Fexr, Self::Fenr].into_iter()
    }
}

impl std::fmt::Display for Fcr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "$fcr{}", self.cp1_num())
    }
}
