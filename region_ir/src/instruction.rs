use crate::{BlockId, GuestLoc, MemWidth, Value};
use std::fmt;

/// A non-terminating instruction. The type of the defined value is recorded in the function.
#[derive(Debug, Clone, PartialEq)]
pub enum Inst {
    /// Constant bits, already masked to the type of `dst`.
    Const {
        dst: Value,
        bits: u64,
    },
    Binary {
        dst: Value,
        op: BinOp,
        lhs: Value,
        rhs: Value,
    },
    Unary {
        dst: Value,
        op: UnOp,
        src: Value,
    },
    Icmp {
        dst: Value,
        cond: IntCC,
        lhs: Value,
        rhs: Value,
    },
    Fcmp {
        dst: Value,
        cond: FloatCC,
        lhs: Value,
        rhs: Value,
    },
    Select {
        dst: Value,
        cond: Value,
        if_true: Value,
        if_false: Value,
    },
    /// Conversion to the type of `dst`.
    Cast {
        dst: Value,
        op: CastOp,
        src: Value,
    },
    /// Big-endian memory load, extended to the type of `dst`.
    Load {
        dst: Value,
        width: MemWidth,
        signed: bool,
        addr: Value,
    },
    /// Big-endian memory store of the low `width` bytes of `value`.
    Store {
        width: MemWidth,
        addr: Value,
        value: Value,
    },
    ReadGuest {
        dst: Value,
        loc: GuestLoc,
    },
    WriteGuest {
        loc: GuestLoc,
        value: Value,
    },
    /// Selects a value depending on the predecessor control came from. Phis must precede all
    /// other instructions of their block.
    Phi {
        dst: Value,
        incoming: Vec<(BlockId, Value)>,
    },
}

impl Inst {
    /// The value this instruction defines, if any.
    pub fn dst(&self) -> Option<Value> {
        match *self {
            Self::Const { dst, .. }
            | Self::Binary { dst, .. }
            | Self::Unary { dst, .. }
            | Self::Icmp { dst, .. }
            | Self::Fcmp { dst, .. }
            | Self::Select { dst, .. }
            | Self::Cast { dst, .. }
            | Self::Load { dst, .. }
            | Self::ReadGuest { dst, .. }
            | Self::Phi { dst, .. } => Some(dst),
            Self::Store { .. } | Self::WriteGuest { .. } => None,
        }
    }

    /// The values this instruction reads. For phis these are the incoming values.
    pub fn operands(&self) -> Vec<Value> {
        match self {
            Self::Const { .. } | Self::ReadGuest { .. } => Vec::new(),
            Self::Binary { lhs, rhs, .. }
            | Self::Icmp { lhs, rhs, .. }
            | Self::Fcmp { lhs, rhs, .. } => vec![*lhs, *rhs],
            Self::Unary { src, .. } | Self::Cast { src, .. } => vec![*src],
            Self::Select {
                cond,
                if_true,
                if_false,
                ..
            } => vec![*cond, *if_true, *if_false],
            Self::Load { addr, .. } => vec![*addr],
            Self::Store { addr, value, .. } => vec![*addr, *value],
            Self::WriteGuest { value, .. } => vec![*value],
            Self::Phi { incoming, .. } => incoming.iter().map(|(_, value)| *value).collect(),
        }
    }

    pub fn is_phi(&self) -> bool {
        matches!(self, Self::Phi { .. })
    }

    /// Returns `true` if the instruction changes guest state or memory.
    pub fn has_side_effects(&self) -> bool {
        matches!(self, Self::Store { .. } | Self::WriteGuest { .. })
    }

    /// Writes the instruction without its destination.
    pub(crate) fn fmt_rhs(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Const { bits, .. } => write!(f, "const {bits:#x}"),
            Self::Binary { op, lhs, rhs, .. } => write!(f, "{op} {lhs}, {rhs}"),
            Self::Unary { op, src, .. } => write!(f, "{op} {src}"),
            Self::Icmp {
                cond, lhs, rhs, ..
            } => write!(f, "icmp {cond} {lhs}, {rhs}"),
            Self::Fcmp {
                cond, lhs, rhs, ..
            } => write!(f, "fcmp {cond} {lhs}, {rhs}"),
            Self::Select {
                cond,
                if_true,
                if_false,
                ..
            } => write!(f, "select {cond}, {if_true}, {if_false}"),
            Self::Cast { op, src, .. } => write!(f, "{op} {src}"),
            Self::Load {
                width,
                signed,
                addr,
                ..
            } => {
                let ext = if *signed { "s" } else { "z" };
                write!(f, "load.{ext} {width} [{addr}]")
            }
            Self::Store { width, addr, value } => write!(f, "store {width} {value}, [{addr}]"),
            Self::ReadGuest { loc, .. } => write!(f, "read {loc}"),
            Self::WriteGuest { loc, value } => write!(f, "write {loc}, {value}"),
            Self::Phi { incoming, .. } => {
                f.write_str("phi ")?;
                for (i, (block, value)) in incoming.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "[{value}, {block}]")?;
                }
                Ok(())
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    And,
    Or,
    Xor,
    /// Shifts use the shift amount modulo the bit width.
    Shl,
    LShr,
    AShr,
    /// Division by zero yields zero, `MIN / -1` wraps.
    UDiv,
    SDiv,
    /// The remainder of a division by zero is the dividend.
    URem,
    SRem,
    FAdd,
    FSub,
    FMul,
    FDiv,
}

impl BinOp {
    pub fn is_float(self) -> bool {
        matches!(self, Self::FAdd | Self::FSub | Self::FMul | Self::FDiv)
    }
}

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Add => "add",
            Self::Sub => "sub",
            Self::Mul => "mul",
            Self::And => "and",
            Self::Or => "or",
            Self::Xor => "xor",
            Self::Shl => "shl",
            Self::LShr => "lshr",
            Self::AShr => "ashr",
            Self::UDiv => "udiv",
            Self::SDiv => "sdiv",
            Self::URem => "urem",
            Self::SRem => "srem",
            Self::FAdd => "fadd",
            Self::FSub => "fsub",
            Self::FMul => "fmul",
            Self::FDiv => "fdiv",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnOp {
    Not,
    /// Count leading zeros.
    Clz,
    FNeg,
    FAbs,
    FSqrt,
    /// Round to the nearest integral value, ties to even.
    FRoundEven,
}

impl UnOp {
    pub fn is_float(self) -> bool {
        !matches!(self, Self::Not | Self::Clz)
    }
}

impl fmt::Display for UnOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Not => "not",
            Self::Clz => "clz",
            Self::FNeg => "fneg",
            Self::FAbs => "fabs",
            Self::FSqrt => "fsqrt",
            Self::FRoundEven => "froundeven",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntCC {
    Eq,
    Ne,
    Slt,
    Sle,
    Sgt,
    Sge,
    Ult,
    Ule,
    Ugt,
    Uge,
}

impl fmt::Display for IntCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Eq => "eq",
            Self::Ne => "ne",
            Self::Slt => "slt",
            Self::Sle => "sle",
            Self::Sgt => "sgt",
            Self::Sge => "sge",
            Self::Ult => "ult",
            Self::Ule => "ule",
            Self::Ugt => "ugt",
            Self::Uge => "uge",
        })
    }
}

/// Floating-point predicates. `O` variants are false for NaN operands, `U` variants true.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FloatCC {
    False,
    Uno,
    Oeq,
    Ueq,
    Olt,
    Ult,
    Ole,
    Ule,
}

impl FloatCC {
    /// Builds the predicate that holds on the union of the given relations.
    pub fn from_relations(unordered: bool, equal: bool, less: bool) -> Self {
        match (less, equal, unordered) {
            (false, false, false) => Self::False,
            (false, false, true) => Self::Uno,
            (false, true, false) => Self::Oeq,
            (false, true, true) => Self::Ueq,
            (true, false, false) => Self::Olt,
            (true, false, true) => Self::Ult,
            (true, true, false) => Self::Ole,
            (true, true, true) => Self::Ule,
        }
    }

    fn relations(self) -> (bool, bool, bool) {
        match self {
            Self::False => (false, false, false),
            Self::Uno => (true, false, false),
            Self::Oeq => (false, true, false),
            Self::Ueq => (true, true, false),
            Self::Olt => (false, false, true),
            Self::Ult => (true, false, true),
            Self::Ole => (false, true, true),
            Self::Ule => (true, true, true),
        }
    }

    pub fn eval(self, a: f64, b: f64) -> bool {
        let (unordered, equal, less) = self.relations();
        if a.is_nan() || b.is_nan() {
            return unordered;
        }
        (less && a < b) || (equal && a == b)
    }
}

impl fmt::Display for FloatCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::False => "false",
            Self::Uno => "uno",
            Self::Oeq => "oeq",
            Self::Ueq => "ueq",
            Self::Olt => "olt",
            Self::Ult => "ult",
            Self::Ole => "ole",
            Self::Ule => "ule",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CastOp {
    ZExt,
    SExt,
    Trunc,
    /// Reinterprets the bits between an integer and a float type of the same width.
    Bitcast,
    /// Signed integer to float, rounding to nearest.
    SiToFp,
    /// Float to signed integer, truncating. NaN and out of range inputs produce the largest
    /// positive integer of the destination type.
    FpToSi,
    FpExt,
    FpTrunc,
}

impl fmt::Display for CastOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ZExt => "zext",
            Self::SExt => "sext",
            Self::Trunc => "trunc",
            Self::Bitcast => "bitcast",
            Self::SiToFp => "sitofp",
            Self::FpToSi => "fptosi",
            Self::FpExt => "fpext",
            Self::FpTrunc => "fptrunc",
        })
    }
}
