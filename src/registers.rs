// CPU flag bits as documented in gbdev.io/pandocs/The_CPU_Flags.html
pub const FLAG_Z: u8 = 0x80; // Zero
pub const FLAG_N: u8 = 0x40; // Subtract
pub const FLAG_H: u8 = 0x20; // Half Carry
pub const FLAG_C: u8 = 0x10; // Carry

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Reg8 {
    A,
    B,
    C,
    D,
    E,
    H,
    L,
    F,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Reg16 {
    AF,
    BC,
    DE,
    HL,
    SP,
    PC,
}

/// SM83 register file. The low nibble of `f` is always zero.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Registers {
    pub a: u8,
    f: u8,
    pub b: u8,
    pub c: u8,
    pub d: u8,
    pub e: u8,
    pub h: u8,
    pub l: u8,
    pub sp: u16,
    pub pc: u16,
}

impl Registers {
    /// Post-boot DMG state (gbdev.io/pandocs/Power_Up_State.html).
    pub fn new() -> Self {
        Self {
            a: 0x01,
            f: 0xB0,
            b: 0x00,
            c: 0x13,
            d: 0x00,
            e: 0xD8,
            h: 0x01,
            l: 0x4D,
            sp: 0xFFFE,
            pc: 0x0100,
        }
    }

    #[inline]
    pub fn f(&self) -> u8 {
        self.f
    }

    #[inline]
    pub fn set_f(&mut self, val: u8) {
        self.f = val & 0xF0;
    }

    pub fn get8(&self, reg: Reg8) -> u8 {
        match reg {
            Reg8::A => self.a,
            Reg8::B => self.b,
            Reg8::C => self.c,
            Reg8::D => self.d,
            Reg8::E => self.e,
            Reg8::H => self.h,
            Reg8::L => self.l,
            Reg8::F => self.f,
        }
    }

    pub fn set8(&mut self, reg: Reg8, val: u8) {
        match reg {
            Reg8::A => self.a = val,
            Reg8::B => self.b = val,
            Reg8::C => self.c = val,
            Reg8::D => self.d = val,
            Reg8::E => self.e = val,
            Reg8::H => self.h = val,
            Reg8::L => self.l = val,
            Reg8::F => self.set_f(val),
        }
    }

    pub fn get16(&self, reg: Reg16) -> u16 {
        match reg {
            Reg16::AF => u16::from_be_bytes([self.a, self.f]),
            Reg16::BC => u16::from_be_bytes([self.b, self.c]),
            Reg16::DE => u16::from_be_bytes([self.d, self.e]),
            Reg16::HL => u16::from_be_bytes([self.h, self.l]),
            Reg16::SP => self.sp,
            Reg16::PC => self.pc,
        }
    }

    pub fn set16(&mut self, reg: Reg16, val: u16) {
        let [hi, lo] = val.to_be_bytes();
        match reg {
            Reg16::AF => {
                self.a = hi;
                self.set_f(lo);
            }
            Reg16::BC => {
                self.b = hi;
                self.c = lo;
            }
            Reg16::DE => {
                self.d = hi;
                self.e = lo;
            }
            Reg16::HL => {
                self.h = hi;
                self.l = lo;
            }
            Reg16::SP => self.sp = val,
            Reg16::PC => self.pc = val,
        }
    }

    #[inline]
    pub fn hl(&self) -> u16 {
        self.get16(Reg16::HL)
    }

    #[inline]
    pub fn set_hl(&mut self, val: u16) {
        self.set16(Reg16::HL, val);
    }

    #[inline]
    pub fn zero(&self) -> bool {
        self.f & FLAG_Z != 0
    }

    #[inline]
    pub fn subtract(&self) -> bool {
        self.f & FLAG_N != 0
    }

    #[inline]
    pub fn half_carry(&self) -> bool {
        self.f & FLAG_H != 0
    }

    #[inline]
    pub fn carry(&self) -> bool {
        self.f & FLAG_C != 0
    }

    pub fn set_zero(&mut self, val: bool) {
        self.set_flag(FLAG_Z, val);
    }

    pub fn set_subtract(&mut self, val: bool) {
        self.set_flag(FLAG_N, val);
    }

    pub fn set_half_carry(&mut self, val: bool) {
        self.set_flag(FLAG_H, val);
    }

    pub fn set_carry(&mut self, val: bool) {
        self.set_flag(FLAG_C, val);
    }

    /// Overwrite all four flags at once.
    #[inline]
    pub fn set_flags(&mut self, z: bool, n: bool, h: bool, c: bool) {
        self.f = if z { FLAG_Z } else { 0 }
            | if n { FLAG_N } else { 0 }
            | if h { FLAG_H } else { 0 }
            | if c { FLAG_C } else { 0 };
    }

    fn set_flag(&mut self, mask: u8, val: bool) {
        if val {
            self.f |= mask;
        } else {
            self.f &= !mask;
        }
    }
}

impl Default for Registers {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_write_back_is_idempotent() {
        let mut regs = Registers::new();
        for pair in [Reg16::AF, Reg16::BC, Reg16::DE, Reg16::HL, Reg16::SP, Reg16::PC] {
            let before = regs.get16(pair);
            regs.set16(pair, before);
            assert_eq!(regs.get16(pair), before, "{pair:?}");
        }
    }

    #[test]
    fn af_write_masks_low_nibble() {
        let mut regs = Registers::new();
        regs.set16(Reg16::AF, 0x12FF);
        assert_eq!(regs.a, 0x12);
        assert_eq!(regs.f(), 0xF0);
        assert_eq!(regs.get16(Reg16::AF), 0x12F0);

        regs.set8(Reg8::F, 0x3C);
        assert_eq!(regs.f(), 0x30);
    }

    #[test]
    fn flag_accessors_track_bits() {
        let mut regs = Registers::new();
        regs.set_flags(false, false, false, false);
        regs.set_half_carry(true);
        assert_eq!(regs.f(), FLAG_H);
        assert!(regs.half_carry());
        regs.set_zero(true);
        regs.set_half_carry(false);
        assert_eq!(regs.f(), FLAG_Z);
        assert!(!regs.carry());
    }

    #[test]
    fn power_up_values() {
        let regs = Registers::default();
        assert_eq!(regs.get16(Reg16::AF), 0x01B0);
        assert_eq!(regs.get16(Reg16::BC), 0x0013);
        assert_eq!(regs.get16(Reg16::DE), 0x00D8);
        assert_eq!(regs.get16(Reg16::HL), 0x014D);
        assert_eq!(regs.sp, 0xFFFE);
        assert_eq!(regs.pc, 0x0100);
    }
}
