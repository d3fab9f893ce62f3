use mips_isa::{
    effective_defs, BZalCond, ImmOp1, Instruction, Reg, RegRef, INSN_WIDTH,
};
use std::fmt;

/// What is known about an integer register at a program point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConstValue {
    /// Nothing flowed in yet.
    #[default]
    Uninit,
    Constant(u32),
    /// Known to take more than one value, or a value computed at run time.
    Variant,
}

impl ConstValue {
    pub fn join(self, other: Self) -> Self {
        match (self, other) {
            (Self::Uninit, value) | (value, Self::Uninit) => value,
            (Self::Constant(a), Self::Constant(b)) if a == b => self,
            _ => Self::Variant,
        }
    }

    pub fn constant(self) -> Option<u32> {
        match self {
            Self::Constant(value) => Some(value),
            _ => None,
        }
    }
}

impl fmt::Display for ConstValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uninit => f.write_str("?"),
            Self::Constant(value) => write!(f, "{value:#x}"),
            Self::Variant => f.write_str("*"),
        }
    }
}

/// Constant state of the 32 general purpose registers. `$zero` always holds the constant 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConstRegs([ConstValue; 32]);

impl ConstRegs {
    /// State where every register is unknown.
    pub fn uninit() -> Self {
        let mut regs = Self([ConstValue::Uninit; 32]);
        regs.0[0] = ConstValue::Constant(0);
        regs
    }

    /// State at region entry, where every register holds a run time value.
    pub fn variant() -> Self {
        let mut regs = Self([ConstValue::Variant; 32]);
        regs.0[0] = ConstValue::Constant(0);
        regs
    }

    pub fn get(&self, reg: Reg) -> ConstValue {
        self.0[reg.index()]
    }

    pub fn set(&mut self, reg: Reg, value: ConstValue) {
        if !reg.is_zero() {
            self.0[reg.index()] = value;
        }
    }

    /// The registers holding a known constant, `$zero` included.
    pub fn known(&self) -> impl Iterator<Item = (Reg, u32)> + '_ {
        Reg::all().filter_map(|reg| Some((reg, self.get(reg).constant()?)))
    }

    pub fn join(&mut self, other: &ConstRegs) {
        for (value, other) in self.0.iter_mut().zip(other.0) {
            *value = value.join(other);
        }
    }

    /// Applies the effect of `insn`, fetched from `addr`, on the register state.
    pub fn update(&mut self, insn: &Instruction, addr: u32) {
        let folded = fold(insn, addr, self);
        for def in effective_defs(insn.defs()) {
            if let RegRef::Gpr(reg) = def {
                let value = folded.map_or(ConstValue::Variant, ConstValue::Constant);
                self.set(reg, value);
            }
        }
    }
}

impl Default for ConstRegs {
    fn default() -> Self {
        Self::uninit()
    }
}

impl fmt::Display for ConstRegs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut known = self.known().skip(1).peekable();
        if known.peek().is_none() {
            return f.write_str("{}");
        }
        f.write_str("{ ")?;
        let mut first = true;
        for (reg, value) in known {
            if !first {
                f.write_str(", ")?;
            }
            first = false;
            write!(f, "{reg} = {value:#x}")?;
        }
        f.write_str(" }")
    }
}

/// Computes the value `insn` writes to its general purpose register destination, if the operands it
/// reads are constant in `regs`.
///
/// Loads and reads from HI/LO or the FPU never fold. Linking transfers fold to the return address.
pub fn fold(insn: &Instruction, addr: u32, regs: &ConstRegs) -> Option<u32> {
    let c = |reg: Reg| regs.get(reg).constant();
    let link = addr.wrapping_add(2 * INSN_WIDTH);
    match *insn {
        Instruction::Shift(op, _, rt, sa) => Some(op.eval(c(rt)?, sa as u32)),
        Instruction::Reg3(op, rd, rs, rt) => {
            let rd = if op.reads_destination() { c(rd)? } else { 0 };
            Some(op.eval(c(rs)?, c(rt)?, rd))
        }
        Instruction::Unary(op, _, src) => Some(op.eval(c(src)?)),
        Instruction::Imm2(op, _, rs, imm) if !op.is_memory() => op.eval(c(rs)?, imm),
        Instruction::Imm1(ImmOp1::LoadUpper, _, imm) => Some((imm as u32) << 16),
        Instruction::JumpAndLink(_) | Instruction::JumpAndLinkReg(..) => Some(link),
        Instruction::BranchZAndLink(BZalCond::GeZ | BZalCond::LtZ, ..) => Some(link),
        _ => None,
    }
}

/// Runs `insns` starting at `addr` from the state `entry` and returns the state after the last one.
pub fn compute_constant_registers<'a>(
    insns: impl IntoIterator<Item = &'a Instruction>,
    addr: u32,
    entry: ConstRegs,
) -> ConstRegs {
    let mut regs = entry;
    for (i, insn) in insns.into_iter().enumerate() {
        regs.update(insn, addr.wrapping_add(i as u32 * INSN_WIDTH));
    }
    regs
}
