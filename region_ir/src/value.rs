use crate::Ty;
use std::fmt;

/// An SSA value. Every value is defined by exactly one instruction of its function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Value(pub(crate) u32);

impl Value {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub(crate) u32);

impl BlockId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "block{}", self.0)
    }
}

/// A piece of guest state that compiled code reads and writes directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GuestLoc {
    /// General purpose register, `i32`.
    Gpr(u8),
    Hi,
    Lo,
    /// Raw bits of one floating-point register, `i32`.
    Fpr(u8),
    /// An even floating-point register together with its odd partner, `i64`. The even register
    /// holds the low word.
    FprPair(u8),
    /// Floating-point control register by dense index, `i32`.
    Fcr(u8),
    /// Retired instruction counter, `i64`.
    Icnt,
}

impl GuestLoc {
    pub fn ty(self) -> Ty {
        match self {
            Self::FprPair(_) | Self::Icnt => Ty::I64,
            _ => Ty::I32,
        }
    }
}

impl fmt::Display for GuestLoc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gpr(n) => write!(f, "${n}"),
            Self::Hi => f.write_str("$hi"),
            Self::Lo => f.write_str("$lo"),
            Self::Fpr(n) => write!(f, "$f{n}"),
            Self::FprPair(n) => write!(f, "$f{n}.d"),
            Self::Fcr(n) => write!(f, "$fcr[{n}]"),
            Self::Icnt => f.write_str("icnt"),
        }
    }
}

/// Width of a guest memory access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemWidth {
    Byte,
    Half,
    Word,
    Double,
}

impl MemWidth {
    pub fn bytes(self) -> u32 {
        match self {
            Self::Byte => 1,
            Self::Half => 2,
            Self::Word => 4,
            Self::Double => 8,
        }
    }
}

impl fmt::Display for MemWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Byte => "i8",
            Self::Half => "i16",
            Self::Word => "i32",
            Self::Double => "i64",
        })
    }
}
