//! Guest machine state: the register files, the instruction counter and memory.

#[cfg(test)]
mod test;

use mips_isa::{FReg, Fcr, HiLo, Reg};
use region_ir::eval::GuestMachine;
use region_ir::{GuestLoc, MemWidth};

/// Big-endian guest memory. The size is a power of two and addresses wrap around it, so no
/// access can fault.
#[derive(Clone, PartialEq, Eq)]
pub struct Memory {
    bytes: Vec<u8>,
    mask: u32,
}

impl Memory {
    /// Creates zeroed memory. Panics if `size` is not a power of two or exceeds the 32-bit
    /// address space.
    pub fn new(size: usize) -> Self {
        assert!(size.is_power_of_two(), "memory size must be a power of two");
        assert!(size as u64 <= 1 << 32, "memory size exceeds the address space");
        Self {
            bytes: vec![0; size],
            mask: (size - 1) as u32,
        }
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    fn index(&self, addr: u32) -> usize {
        (addr & self.mask) as usize
    }

    pub fn read_u8(&self, addr: u32) -> u8 {
        self.bytes[self.index(addr)]
    }

    pub fn write_u8(&mut self, addr: u32, value: u8) {
        let index = self.index(addr);
        self.bytes[index] = value;
    }

    /// Reads `width` bytes starting at `addr`, most significant first.
    pub fn read(&self, addr: u32, width: MemWidth) -> u64 {
        (0..width.bytes()).fold(0, |acc, i| {
            (acc << 8) | self.read_u8(addr.wrapping_add(i)) as u64
        })
    }

    pub fn write(&mut self, addr: u32, width: MemWidth, value: u64) {
        let n = width.bytes();
        for i in 0..n {
            self.write_u8(addr.wrapping_add(i), (value >> (8 * (n - 1 - i))) as u8);
        }
    }

    pub fn read_u16(&self, addr: u32) -> u16 {
        self.read(addr, MemWidth::Half) as u16
    }

    pub fn read_u32(&self, addr: u32) -> u32 {
        self.read(addr, MemWidth::Word) as u32
    }

    pub fn read_u64(&self, addr: u32) -> u64 {
        self.read(addr, MemWidth::Double)
    }

    pub fn write_u16(&mut self, addr: u32, value: u16) {
        self.write(addr, MemWidth::Half, value as u64);
    }

    pub fn write_u32(&mut self, addr: u32, value: u32) {
        self.write(addr, MemWidth::Word, value as u64);
    }

    pub fn write_u64(&mut self, addr: u32, value: u64) {
        self.write(addr, MemWidth::Double, value);
    }

    /// Copies `image` into memory starting at `base`.
    pub fn load_image(&mut self, base: u32, image: &[u8]) {
        for (i, byte) in image.iter().enumerate() {
            self.write_u8(base.wrapping_add(i as u32), *byte);
        }
    }

    /// Stores `words` as consecutive big-endian words starting at `base`.
    pub fn load_words(&mut self, base: u32, words: &[u32]) {
        for (i, word) in words.iter().enumerate() {
            self.write_u32(base.wrapping_add(4 * i as u32), *word);
        }
    }
}

impl std::fmt::Debug for Memory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let used = self.bytes.iter().filter(|b| **b != 0).count();
        f.debug_struct("Memory")
            .field("size", &self.bytes.len())
            .field("nonzero_bytes", &used)
            .finish()
    }
}

/// Complete architectural state of the guest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuestState {
    pub pc: u32,
    pub gpr: [u32; 32],
    pub hi: u32,
    pub lo: u32,
    /// Raw words of the floating-point registers.
    pub fpr: [u32; 32],
    pub fcr: [u32; Fcr::COUNT],
    /// Number of retired guest instructions.
    pub icnt: u64,
    pub mem: Memory,
}

impl GuestState {
    pub fn new(mem: Memory, pc: u32) -> Self {
        Self {
            pc,
            gpr: [0; 32],
            hi: 0,
            lo: 0,
            fpr: [0; 32],
            fcr: [0; Fcr::COUNT],
            icnt: 0,
            mem,
        }
    }

    pub fn reg(&self, reg: Reg) -> u32 {
        self.gpr[reg.index()]
    }

    /// Writes to `$zero` are discarded.
    pub fn set_reg(&mut self, reg: Reg, value: u32) {
        if !reg.is_zero() {
            self.gpr[reg.index()] = value;
        }
    }

    pub fn hilo(&self, hilo: HiLo) -> u32 {
        match hilo {
            HiLo::Hi => self.hi,
            HiLo::Lo => self.lo,
        }
    }

    pub fn set_hilo(&mut self, hilo: HiLo, value: u32) {
        match hilo {
            HiLo::Hi => self.hi = value,
            HiLo::Lo => self.lo = value,
        }
    }

    pub fn fpr_bits(&self, reg: FReg) -> u32 {
        self.fpr[reg.index()]
    }

    pub fn set_fpr_bits(&mut self, reg: FReg, bits: u32) {
        self.fpr[reg.index()] = bits;
    }

    pub fn fpr_single(&self, reg: FReg) -> f32 {
        f32::from_bits(self.fpr_bits(reg))
    }

    pub fn set_fpr_single(&mut self, reg: FReg, value: f32) {
        self.set_fpr_bits(reg, value.to_bits());
    }

    /// Bits of the double held by the pair `reg` belongs to. The even register is the low word.
    pub fn fpr_pair_bits(&self, reg: FReg) -> u64 {
        let base = reg.pair_base();
        let low = self.fpr_bits(base) as u64;
        let high = self.fpr_bits(base.pair_partner()) as u64;
        (high << 32) | low
    }

    pub fn set_fpr_pair_bits(&mut self, reg: FReg, bits: u64) {
        let base = reg.pair_base();
        self.set_fpr_bits(base, bits as u32);
        self.set_fpr_bits(base.pair_partner(), (bits >> 32) as u32);
    }

    pub fn fpr_double(&self, reg: FReg) -> f64 {
        f64::from_bits(self.fpr_pair_bits(reg))
    }

    pub fn set_fpr_double(&mut self, reg: FReg, value: f64) {
        self.set_fpr_pair_bits(reg, value.to_bits());
    }

    pub fn fcr(&self, fcr: Fcr) -> u32 {
        self.fcr[fcr.index()]
    }

    pub fn set_fcr(&mut self, fcr: Fcr, value: u32) {
        self.fcr[fcr.index()] = value;
    }

    /// Condition code `cc` of the FPU, as set by `c.cond.fmt`.
    pub fn condition_code(&self, cc: u8) -> bool {
        (self.fcr(Fcr::Fccr) >> (cc & 7)) & 1 == 1
    }

    pub fn set_condition_code(&mut self, cc: u8, value: bool) {
        let bit = 1 << (cc & 7);
        let fccr = self.fcr(Fcr::Fccr);
        self.set_fcr(Fcr::Fccr, if value { fccr | bit } else { fccr & !bit });
    }
}

impl GuestMachine for GuestState {
    fn read_guest(&self, loc: GuestLoc) -> u64 {
        match loc {
            GuestLoc::Gpr(n) => self.reg(Reg::new(n)) as u64,
            GuestLoc::Hi => self.hi as u64,
            GuestLoc::Lo => self.lo as u64,
            GuestLoc::Fpr(n) => self.fpr_bits(FReg::new(n)) as u64,
            GuestLoc::FprPair(n) => self.fpr_pair_bits(FReg::new(n)),
            GuestLoc::Fcr(n) => self.fcr[n as usize % Fcr::COUNT] as u64,
            GuestLoc::Icnt => self.icnt,
        }
    }

    fn write_guest(&mut self, loc: GuestLoc, bits: u64) {
        match loc {
            GuestLoc::Gpr(n) => self.set_reg(Reg::new(n), bits as u32),
            GuestLoc::Hi => self.hi = bits as u32,
            GuestLoc::Lo => self.lo = bits as u32,
            GuestLoc::Fpr(n) => self.set_fpr_bits(FReg::new(n), bits as u32),
            GuestLoc::FprPair(n) => self.set_fpr_pair_bits(FReg::new(n), bits),
            GuestLoc::Fcr(n) => self.fcr[n as usize % Fcr::COUNT] = bits as u32,
            GuestLoc::Icnt => self.icnt = bits,
        }
    }

    fn load(&self, addr: u32, width: MemWidth) -> u64 {
        self.mem.read(addr, width)
    }

    fn store(&mut self, addr: u32, width: MemWidth, bits: u64) {
        self.mem.write(addr, width, bits);
    }
}

/// Memory access width of a load or store of `bytes` bytes.
pub(crate) fn mem_width(bytes: u8) -> MemWidth {
    match bytes {
        1 => MemWidth::Byte,
        2 => MemWidth::Half,
        4 => MemWidth::Word,
        _ => MemWidth::Double,
    }
}
