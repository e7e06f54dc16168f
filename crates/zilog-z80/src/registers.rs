//! Z80 register file.

/// Complete programmer-visible register file plus WZ and interrupt state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Registers {
    pub a: u8,
    pub f: u8,
    pub b: u8,
    pub c: u8,
    pub d: u8,
    pub e: u8,
    pub h: u8,
    pub l: u8,

    pub a_alt: u8,
    pub f_alt: u8,
    pub b_alt: u8,
    pub c_alt: u8,
    pub d_alt: u8,
    pub e_alt: u8,
    pub h_alt: u8,
    pub l_alt: u8,

    pub ix: u16,
    pub iy: u16,
    pub sp: u16,
    pub pc: u16,
    pub i: u8,
    pub r: u8,

    /// MEMPTR. Never visible directly; leaks into X/Y of `BIT n,(HL)`.
    pub wz: u16,

    pub iff1: bool,
    pub iff2: bool,
    pub im: u8,
    pub halted: bool,
}

macro_rules! pair {
    ($get:ident, $set:ident, $hi:ident, $lo:ident) => {
        #[must_use]
        pub const fn $get(&self) -> u16 {
            u16::from_be_bytes([self.$hi, self.$lo])
        }

        pub fn $set(&mut self, value: u16) {
            [self.$hi, self.$lo] = value.to_be_bytes();
        }
    };
}

impl Registers {
    /// Power-on state: AF and SP all ones, PC, I, R, WZ and interrupt state
    /// cleared, every other register pair set to `fill`.
    #[must_use]
    pub fn power_on(fill: u16) -> Self {
        let mut regs = Self {
            sp: 0xFFFF,
            ix: fill,
            iy: fill,
            ..Self::default()
        };
        regs.set_af(0xFFFF);
        regs.set_bc(fill);
        regs.set_de(fill);
        regs.set_hl(fill);
        regs.set_af_alt(fill);
        regs.set_bc_alt(fill);
        regs.set_de_alt(fill);
        regs.set_hl_alt(fill);
        regs
    }

    pair!(af, set_af, a, f);
    pair!(bc, set_bc, b, c);
    pair!(de, set_de, d, e);
    pair!(hl, set_hl, h, l);
    pair!(af_alt, set_af_alt, a_alt, f_alt);
    pair!(bc_alt, set_bc_alt, b_alt, c_alt);
    pair!(de_alt, set_de_alt, d_alt, e_alt);
    pair!(hl_alt, set_hl_alt, h_alt, l_alt);

    /// `EX AF,AF'`.
    pub fn ex_af(&mut self) {
        std::mem::swap(&mut self.a, &mut self.a_alt);
        std::mem::swap(&mut self.f, &mut self.f_alt);
    }

    /// `EXX`.
    pub fn exx(&mut self) {
        std::mem::swap(&mut self.b, &mut self.b_alt);
        std::mem::swap(&mut self.c, &mut self.c_alt);
        std::mem::swap(&mut self.d, &mut self.d_alt);
        std::mem::swap(&mut self.e, &mut self.e_alt);
        std::mem::swap(&mut self.h, &mut self.h_alt);
        std::mem::swap(&mut self.l, &mut self.l_alt);
    }

    /// `EX DE,HL`. Never affected by an index prefix.
    pub fn ex_de_hl(&mut self) {
        std::mem::swap(&mut self.d, &mut self.h);
        std::mem::swap(&mut self.e, &mut self.l);
    }

    /// Refresh counter step: the low seven bits count, bit 7 is kept.
    pub fn inc_r(&mut self) {
        self.r = (self.r & 0x80) | (self.r.wrapping_add(1) & 0x7F);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn power_on_state() {
        let regs = Registers::power_on(0x1234);
        assert_eq!(regs.af(), 0xFFFF);
        assert_eq!(regs.sp, 0xFFFF);
        assert_eq!(regs.bc(), 0x1234);
        assert_eq!(regs.hl_alt(), 0x1234);
        assert_eq!(regs.ix, 0x1234);
        assert_eq!((regs.pc, regs.i, regs.r, regs.wz), (0, 0, 0, 0));
        assert!(!regs.iff1 && !regs.iff2 && !regs.halted);
        assert_eq!(regs.im, 0);
    }

    #[test]
    fn refresh_keeps_bit_seven() {
        let mut regs = Registers {
            r: 0xFF,
            ..Registers::default()
        };
        regs.inc_r();
        assert_eq!(regs.r, 0x80);
        regs.r = 0x7F;
        regs.inc_r();
        assert_eq!(regs.r, 0x00);
    }

    #[test]
    fn exchanges() {
        let mut regs = Registers::default();
        regs.set_bc(0x0102);
        regs.set_de(0x0304);
        regs.set_hl(0x0506);
        regs.set_af(0x0708);
        regs.exx();
        regs.ex_af();
        assert_eq!(regs.bc(), 0);
        assert_eq!(regs.bc_alt(), 0x0102);
        assert_eq!(regs.af_alt(), 0x0708);
        regs.exx();
        regs.ex_de_hl();
        assert_eq!(regs.de(), 0x0506);
        assert_eq!(regs.hl(), 0x0304);
    }
}
