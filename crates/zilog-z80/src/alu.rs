//! Arithmetic and logic with full flag computation.
//!
//! Every function returns the complete new F (or the bits it owns, where
//! noted) so callers never leave a flag stale.

use crate::flags::{CF, HF, NF, PF, SF, XYF, ZF, flag_if, sz53, sz53p};

/// Result byte plus the flags it produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AluResult {
    pub value: u8,
    pub flags: u8,
}

impl AluResult {
    const fn new(value: u8, flags: u8) -> Self {
        Self { value, flags }
    }
}

/// `ADD` / `ADC`.
#[must_use]
pub fn add8(a: u8, b: u8, carry: bool) -> AluResult {
    let wide = u16::from(a) + u16::from(b) + u16::from(carry);
    let r = wide as u8;
    let flags = sz53(r)
        | ((a ^ b ^ r) & HF)
        | flag_if((a ^ !b) & (a ^ r) & 0x80 != 0, PF)
        | flag_if(wide > 0xFF, CF);
    AluResult::new(r, flags)
}

/// `SUB` / `SBC`.
#[must_use]
pub fn sub8(a: u8, b: u8, carry: bool) -> AluResult {
    let r = a.wrapping_sub(b).wrapping_sub(u8::from(carry));
    let flags = sz53(r)
        | NF
        | ((a ^ b ^ r) & HF)
        | flag_if((a ^ b) & (a ^ r) & 0x80 != 0, PF)
        | flag_if(u16::from(a) < u16::from(b) + u16::from(carry), CF);
    AluResult::new(r, flags)
}

/// `CP`: flags of a subtraction, but X and Y come from the operand.
#[must_use]
pub fn cp8(a: u8, b: u8) -> u8 {
    (sub8(a, b, false).flags & !XYF) | (b & XYF)
}

#[must_use]
pub fn and8(a: u8, b: u8) -> AluResult {
    let r = a & b;
    AluResult::new(r, sz53p(r) | HF)
}

#[must_use]
pub fn xor8(a: u8, b: u8) -> AluResult {
    let r = a ^ b;
    AluResult::new(r, sz53p(r))
}

#[must_use]
pub fn or8(a: u8, b: u8) -> AluResult {
    let r = a | b;
    AluResult::new(r, sz53p(r))
}

/// The eight accumulator operations in opcode order (`ADD ADC SUB SBC AND XOR OR CP`).
/// `CP` returns the accumulator unchanged.
#[must_use]
pub fn accumulator(op: u8, a: u8, b: u8, carry: bool) -> AluResult {
    match op & 7 {
        0 => add8(a, b, false),
        1 => add8(a, b, carry),
        2 => sub8(a, b, false),
        3 => sub8(a, b, carry),
        4 => and8(a, b),
        5 => xor8(a, b),
        6 => or8(a, b),
        _ => AluResult::new(a, cp8(a, b)),
    }
}

/// `INC r`. Carry is not touched; the returned flags exclude it.
#[must_use]
pub fn inc8(a: u8) -> AluResult {
    let r = a.wrapping_add(1);
    AluResult::new(r, sz53(r) | flag_if(a & 0x0F == 0x0F, HF) | flag_if(r == 0x80, PF))
}

/// `DEC r`. Carry is not touched; the returned flags exclude it.
#[must_use]
pub fn dec8(a: u8) -> AluResult {
    let r = a.wrapping_sub(1);
    AluResult::new(
        r,
        sz53(r) | NF | flag_if(a & 0x0F == 0, HF) | flag_if(r == 0x7F, PF),
    )
}

/// CB-prefixed rotate/shift group, `op` in opcode order
/// (`RLC RRC RL RR SLA SRA SLL SRL`).
#[must_use]
pub fn rotate(op: u8, v: u8, carry: bool) -> AluResult {
    let cin = u8::from(carry);
    let (r, out) = match op & 7 {
        0 => (v.rotate_left(1), v >> 7),
        1 => (v.rotate_right(1), v & 1),
        2 => ((v << 1) | cin, v >> 7),
        3 => ((v >> 1) | (cin << 7), v & 1),
        4 => (v << 1, v >> 7),
        5 => ((v >> 1) | (v & 0x80), v & 1),
        6 => ((v << 1) | 1, v >> 7),
        _ => (v >> 1, v & 1),
    };
    AluResult::new(r, sz53p(r) | out)
}

/// `RLCA RRCA RLA RRA`: the rotate without S, Z or P; those bits of `f` survive.
#[must_use]
pub fn rotate_accumulator(op: u8, a: u8, f: u8) -> AluResult {
    let rot = rotate(op & 3, a, f & CF != 0);
    AluResult::new(
        rot.value,
        (f & (SF | ZF | PF)) | (rot.value & XYF) | (rot.flags & CF),
    )
}

/// `DAA`.
#[must_use]
pub fn daa(a: u8, f: u8) -> AluResult {
    let subtract = f & NF != 0;
    let half = f & HF != 0;
    let mut carry = f & CF != 0;
    let mut diff = 0u8;
    if half || a & 0x0F > 9 {
        diff |= 0x06;
    }
    if carry || a > 0x99 {
        diff |= 0x60;
        carry = true;
    }
    let r = if subtract {
        a.wrapping_sub(diff)
    } else {
        a.wrapping_add(diff)
    };
    let half_out = if subtract {
        half && a & 0x0F < 6
    } else {
        a & 0x0F > 9
    };
    AluResult::new(
        r,
        sz53p(r) | (f & NF) | flag_if(carry, CF) | flag_if(half_out, HF),
    )
}

/// `BIT n`: flags excluding carry. `xy` supplies the X/Y source, which differs
/// between register, `(HL)` and `(IX+d)` forms.
#[must_use]
pub fn bit(n: u8, v: u8, xy: u8) -> u8 {
    let set = v & (1 << (n & 7));
    HF | (xy & XYF) | flag_if(set == 0, ZF | PF) | (set & SF)
}

/// `ADD HL,rr`: returns the result and the H, X, Y and C bits; S, Z and P
/// belong to the caller.
#[must_use]
pub fn add16(a: u16, b: u16) -> (u16, u8) {
    let wide = u32::from(a) + u32::from(b);
    let r = wide as u16;
    let hi = (r >> 8) as u8;
    let flags = (hi & XYF) | ((((a ^ b ^ r) >> 8) as u8) & HF) | flag_if(wide > 0xFFFF, CF);
    (r, flags)
}

/// `ADC HL,rr`.
#[must_use]
pub fn adc16(a: u16, b: u16, carry: bool) -> (u16, u8) {
    let wide = u32::from(a) + u32::from(b) + u32::from(carry);
    let r = wide as u16;
    (
        r,
        wide_flags(a, b, r)
            | flag_if((a ^ !b) & (a ^ r) & 0x8000 != 0, PF)
            | flag_if(wide > 0xFFFF, CF),
    )
}

/// `SBC HL,rr`.
#[must_use]
pub fn sbc16(a: u16, b: u16, carry: bool) -> (u16, u8) {
    let r = a.wrapping_sub(b).wrapping_sub(u16::from(carry));
    let borrow = u32::from(a) < u32::from(b) + u32::from(carry);
    (
        r,
        wide_flags(a, b, r)
            | NF
            | flag_if((a ^ b) & (a ^ r) & 0x8000 != 0, PF)
            | flag_if(borrow, CF),
    )
}

fn wide_flags(a: u16, b: u16, r: u16) -> u8 {
    let hi = (r >> 8) as u8;
    (hi & (SF | XYF)) | flag_if(r == 0, ZF) | ((((a ^ b ^ r) >> 8) as u8) & HF)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flags::{XF, YF};

    #[test]
    fn add_overflow_and_half_carry() {
        let r = add8(0x7F, 0x01, false);
        assert_eq!(r.value, 0x80);
        assert_eq!(r.flags, SF | HF | PF);

        let r = add8(0xFF, 0x01, false);
        assert_eq!(r.value, 0x00);
        assert_eq!(r.flags, ZF | HF | CF);

        let r = add8(0x0E, 0x01, true);
        assert_eq!(r.value, 0x10);
        assert_eq!(r.flags, HF);
    }

    #[test]
    fn sub_borrow_with_carry_in() {
        let r = sub8(0x00, 0x00, true);
        assert_eq!(r.value, 0xFF);
        assert_eq!(r.flags, SF | YF | HF | XF | NF | CF);

        let r = sub8(0x80, 0x01, false);
        assert_eq!(r.value, 0x7F);
        assert_eq!(r.flags, YF | HF | XF | PF | NF);
    }

    #[test]
    fn compare_takes_xy_from_operand() {
        let f = cp8(0x00, 0x28);
        assert_eq!(f & XYF, 0x28);
        assert_ne!(f & CF, 0);
        assert_eq!(accumulator(7, 0x55, 0x28, false).value, 0x55);
    }

    #[test]
    fn inc_dec_edges() {
        assert_eq!(inc8(0x7F).flags, SF | HF | PF);
        assert_eq!(inc8(0xFF).flags, ZF | HF);
        assert_eq!(dec8(0x80).flags, YF | HF | XF | PF | NF);
        assert_eq!(dec8(0x01).flags, ZF | NF);
    }

    #[test]
    fn rotate_group() {
        assert_eq!(rotate(0, 0x81, false), AluResult::new(0x03, PF | CF));
        assert_eq!(rotate(3, 0x01, true).value, 0x80);
        assert_eq!(rotate(5, 0x81, false).value, 0xC0);
        assert_eq!(rotate(6, 0x00, false).value, 0x01);
        assert_eq!(rotate(7, 0x01, false).flags, ZF | PF | CF);
    }

    #[test]
    fn accumulator_rotates_keep_szp() {
        let r = rotate_accumulator(0, 0x80, SF | ZF | PF);
        assert_eq!(r.value, 0x01);
        assert_eq!(r.flags, SF | ZF | PF | CF);
    }

    #[test]
    fn daa_after_add_and_sub() {
        // 0x15 + 0x27 = 0x3C -> 0x42
        assert_eq!(daa(0x3C, 0).value, 0x42);
        // 0x99 + 0x01 = 0x9A -> 0x00 carry
        let r = daa(0x9A, 0);
        assert_eq!(r.value, 0x00);
        assert_ne!(r.flags & CF, 0);
        assert_ne!(r.flags & ZF, 0);
        // 0x42 - 0x15 = 0x2D (H set) -> 0x27
        assert_eq!(daa(0x2D, NF | HF).value, 0x27);
    }

    #[test]
    fn bit_test_flags() {
        assert_eq!(bit(7, 0x80, 0), SF | HF);
        assert_eq!(bit(0, 0x00, 0xFF), ZF | PF | HF | XYF);
    }

    #[test]
    fn sixteen_bit_arithmetic() {
        assert_eq!(add16(0x0FFF, 0x0001), (0x1000, HF));
        assert_eq!(add16(0xFFFF, 0x0001), (0x0000, HF | CF));

        let (r, f) = adc16(0x7FFF, 0x0000, true);
        assert_eq!(r, 0x8000);
        assert_eq!(f, SF | HF | PF);

        let (r, f) = sbc16(0x0000, 0x0001, false);
        assert_eq!(r, 0xFFFF);
        assert_eq!(f, SF | YF | HF | XF | NF | CF);

        let (r, f) = sbc16(0x1234, 0x1234, false);
        assert_eq!(r, 0);
        assert_eq!(f, ZF | NF);
    }
}
