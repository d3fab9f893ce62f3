use std::fmt;

/// Type of an IR value. Values are carried as raw bits, floats in their IEEE encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Ty {
    I1,
    I32,
    I64,
    F32,
    F64,
}

impl Ty {
    pub fn bit_width(self) -> u32 {
        match self {
            Self::I1 => 1,
            Self::I32 | Self::F32 => 32,
            Self::I64 | Self::F64 => 64,
        }
    }

    pub fn is_int(self) -> bool {
        matches!(self, Self::I1 | Self::I32 | Self::I64)
    }

    pub fn is_float(self) -> bool {
        matches!(self, Self::F32 | Self::F64)
    }

    /// Mask selecting the bits of a value of this type.
    pub fn mask(self) -> u64 {
        match self.bit_width() {
            64 => u64::MAX,
            width => (1 << width) - 1,
        }
    }
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::I1 => "i1",
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::F32 => "f32",
            Self::F64 => "f64",
        })
    }
}
