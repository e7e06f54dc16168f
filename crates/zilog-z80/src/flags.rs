//! Flag register bits and the lookup helpers shared by the ALU and decoder.

/// Sign (bit 7).
pub const SF: u8 = 0x80;
/// Zero (bit 6).
pub const ZF: u8 = 0x40;
/// Undocumented copy of result bit 5.
pub const YF: u8 = 0x20;
/// Half carry out of bit 3.
pub const HF: u8 = 0x10;
/// Undocumented copy of result bit 3.
pub const XF: u8 = 0x08;
/// Parity or overflow, depending on the instruction.
pub const PF: u8 = 0x04;
/// Set by subtractions, read by DAA.
pub const NF: u8 = 0x02;
/// Carry out of bit 7 (or bit 15).
pub const CF: u8 = 0x01;

/// Both undocumented bits.
pub const XYF: u8 = YF | XF;

/// Precomputed S, Z, Y, X and even-parity P for every byte.
static SZ53P: [u8; 256] = build_sz53p();

const fn build_sz53p() -> [u8; 256] {
    let mut table = [0u8; 256];
    let mut i = 0;
    while i < 256 {
        let v = i as u8;
        let mut f = v & (SF | XYF);
        if v == 0 {
            f |= ZF;
        }
        if v.count_ones() % 2 == 0 {
            f |= PF;
        }
        table[i] = f;
        i += 1;
    }
    table
}

/// True if `value` has an even number of set bits.
#[must_use]
pub const fn parity(value: u8) -> bool {
    value.count_ones() % 2 == 0
}

/// S, Z, Y and X for a result byte.
#[must_use]
pub fn sz53(value: u8) -> u8 {
    SZ53P[value as usize] & !PF
}

/// S, Z, Y, X and parity for a result byte.
#[must_use]
pub fn sz53p(value: u8) -> u8 {
    SZ53P[value as usize]
}

/// `flag` if `cond` holds, otherwise zero.
#[must_use]
pub const fn flag_if(cond: bool, flag: u8) -> u8 {
    if cond { flag } else { 0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_matches_bitwise_definition() {
        for v in 0..=255u8 {
            let expected = (v & (SF | XYF)) | flag_if(v == 0, ZF) | flag_if(parity(v), PF);
            assert_eq!(sz53p(v), expected, "value {v:#04X}");
        }
    }

    #[test]
    fn zero_is_even_parity() {
        assert_eq!(sz53p(0), ZF | PF);
        assert_eq!(sz53(0), ZF);
        assert_eq!(sz53(0xA8), SF | YF | XF);
    }
}
