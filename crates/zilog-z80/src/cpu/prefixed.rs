//! CB, DDCB/FDCB and ED opcode tables.

use tracing::trace;

use super::Z80;
use crate::alu;
use crate::flags::{CF, HF, NF, PF, SF, XYF, ZF, flag_if, parity, sz53, sz53p};
use crate::microcode::{Addr, MicroOp, Slot};
use crate::options::Variant;

/// ED x=1 z=6: interrupt mode by `y`, mirrors included.
const IM_TABLE: [u8; 8] = [0, 0, 1, 2, 0, 0, 1, 2];

impl Z80 {
    /// Rotate/shift, BIT, RES or SET of `value` by CB opcode. `None` for BIT,
    /// which only sets flags.
    fn bit_op(&mut self, op: u8, value: u8, xy: u8) -> Option<u8> {
        let (x, y) = (op >> 6, (op >> 3) & 7);
        match x {
            0 => {
                let result = alu::rotate(y, value, self.regs.f & CF != 0);
                self.set_flags(result.flags);
                Some(result.value)
            }
            1 => {
                self.set_flags((self.regs.f & CF) | alu::bit(y, value, xy));
                None
            }
            2 => Some(value & !(1 << y)),
            _ => Some(value | (1 << y)),
        }
    }

    pub(super) fn exec_cb(&mut self, stage: u8) {
        let op = self.ctx.opcode;
        let z = op & 7;
        if z != 6 {
            let value = self.reg8_plain(z);
            if let Some(result) = self.bit_op(op, value, value) {
                self.set_reg8_plain(z, result);
            }
            return;
        }
        match stage {
            0 => {
                self.latch_operand_address();
                self.queue(&[
                    MicroOp::Read(Addr::Latch, Slot::Lo),
                    MicroOp::Internal(1),
                    MicroOp::Exec(1),
                ]);
            }
            _ => {
                // BIT n,(HL) leaks the high byte of WZ into X and Y.
                let xy = (self.regs.wz >> 8) as u8;
                if let Some(result) = self.bit_op(op, self.ctx.lo, xy) {
                    self.ctx.lo = result;
                    self.queue(&[MicroOp::Write(Addr::Latch, Slot::Lo)]);
                }
            }
        }
    }

    /// DDCB d op / FDCB d op. Always operates on `(IX+d)`; non-BIT forms
    /// with `z != 6` also copy the result into register `z`.
    pub(super) fn exec_index_cb(&mut self, stage: u8) {
        let op = self.ctx.opcode;
        match stage {
            0 => {
                self.latch_operand_address();
                self.queue(&[
                    MicroOp::Read(Addr::Latch, Slot::Lo),
                    MicroOp::Internal(1),
                    MicroOp::Exec(1),
                ]);
            }
            _ => {
                let xy = (self.ctx.latch >> 8) as u8;
                if let Some(result) = self.bit_op(op, self.ctx.lo, xy) {
                    self.ctx.lo = result;
                    let z = op & 7;
                    if z != 6 {
                        self.set_reg8_plain(z, result);
                    }
                    self.queue(&[MicroOp::Write(Addr::Latch, Slot::Lo)]);
                }
            }
        }
    }

    pub(super) fn exec_ed(&mut self, stage: u8) {
        let op = self.ctx.opcode;
        let (x, y, z) = (op >> 6, (op >> 3) & 7, op & 7);
        let (p, q) = (y >> 1, y & 1);

        match (x, z) {
            (1, 0) => match stage {
                0 => {
                    let bc = self.regs.bc();
                    self.ctx.latch = bc;
                    self.regs.wz = bc.wrapping_add(1);
                    self.queue(&[MicroOp::In, MicroOp::Exec(1)]);
                }
                _ => {
                    // IN (C) with y == 6 only sets flags.
                    let value = self.ctx.lo;
                    self.set_reg8_plain(y, value);
                    self.set_flags((self.regs.f & CF) | sz53p(value));
                }
            },
            (1, 1) => {
                let bc = self.regs.bc();
                self.ctx.latch = bc;
                self.regs.wz = bc.wrapping_add(1);
                self.ctx.lo = match (y, self.options.variant) {
                    (6, Variant::Nmos) => 0x00,
                    (6, Variant::Cmos) => 0xFF,
                    _ => self.reg8_plain(y),
                };
                self.queue(&[MicroOp::Out]);
            }
            (1, 2) => {
                let hl = self.regs.hl();
                let carry = self.regs.f & CF != 0;
                let (result, flags) = if q == 0 {
                    alu::sbc16(hl, self.rp(p), carry)
                } else {
                    alu::adc16(hl, self.rp(p), carry)
                };
                self.regs.wz = hl.wrapping_add(1);
                self.regs.set_hl(result);
                self.set_flags(flags);
                self.queue(&[MicroOp::Internal(7)]);
            }
            (1, 3) => match stage {
                0 => self.queue(&[
                    MicroOp::Read(Addr::Pc, Slot::Lo),
                    MicroOp::Read(Addr::Pc, Slot::Hi),
                    MicroOp::Exec(1),
                ]),
                1 if q == 0 => {
                    let address = self.ctx.word();
                    let value = self.rp(p);
                    self.store_word(address, value);
                }
                1 => {
                    let address = self.ctx.word();
                    self.load_word(address);
                }
                _ => {
                    let word = self.ctx.word();
                    self.set_rp(p, word);
                }
            },
            (1, 4) => {
                let result = alu::sub8(0, self.regs.a, false);
                self.regs.a = result.value;
                self.set_flags(result.flags);
            }
            (1, 5) => match stage {
                // RETN and RETI both copy IFF2 back to IFF1.
                0 => {
                    self.regs.iff1 = self.regs.iff2;
                    self.queue(&[
                        MicroOp::Read(Addr::Pop, Slot::Lo),
                        MicroOp::Read(Addr::Pop, Slot::Hi),
                        MicroOp::Exec(1),
                    ]);
                }
                _ => self.return_to_popped(),
            },
            (1, 6) => self.regs.im = IM_TABLE[y as usize],
            (1, 7) => self.exec_ed_misc(y, stage),
            (2, 0..=3) if y >= 4 => self.exec_block(y, z, stage),
            _ => {
                trace!(
                    opcode = op,
                    pc = self.regs.pc,
                    "undefined ED opcode, executed as NOP"
                );
            }
        }
    }

    /// LD I,A, LD R,A, LD A,I, LD A,R, RRD, RLD.
    fn exec_ed_misc(&mut self, y: u8, stage: u8) {
        match (y, stage) {
            (0, _) => {
                self.regs.i = self.regs.a;
                self.queue(&[MicroOp::Internal(1)]);
            }
            (1, _) => {
                self.regs.r = self.regs.a;
                self.queue(&[MicroOp::Internal(1)]);
            }
            (2 | 3, _) => {
                let value = if y == 2 { self.regs.i } else { self.regs.r };
                self.regs.a = value;
                self.set_flags((self.regs.f & CF) | sz53(value) | flag_if(self.regs.iff2, PF));
                self.ld_a_ir = true;
                self.queue(&[MicroOp::Internal(1)]);
            }
            (4 | 5, 0) => {
                let hl = self.regs.hl();
                self.ctx.latch = hl;
                self.regs.wz = hl.wrapping_add(1);
                self.queue(&[
                    MicroOp::Read(Addr::Latch, Slot::Lo),
                    MicroOp::Internal(4),
                    MicroOp::Exec(1),
                ]);
            }
            (4 | 5, _) => {
                let (a, m) = (self.regs.a, self.ctx.lo);
                let (new_a, new_m) = if y == 4 {
                    ((a & 0xF0) | (m & 0x0F), (a << 4) | (m >> 4))
                } else {
                    ((a & 0xF0) | (m >> 4), (m << 4) | (a & 0x0F))
                };
                self.regs.a = new_a;
                self.ctx.lo = new_m;
                self.set_flags((self.regs.f & CF) | sz53p(new_a));
                self.queue(&[MicroOp::Write(Addr::Latch, Slot::Lo)]);
            }
            _ => {}
        }
    }

    /// LDI/CPI/INI/OUTI and their decrementing and repeating forms.
    fn exec_block(&mut self, y: u8, z: u8, stage: u8) {
        let decrement = y & 1 == 1;
        let repeat = y >= 6;
        let step = |v: u16| if decrement { v.wrapping_sub(1) } else { v.wrapping_add(1) };

        match (z, stage) {
            // LDI: read (HL), write (DE), 2 T-states internal.
            (0, 0) => {
                self.ctx.latch = self.regs.hl();
                self.queue(&[MicroOp::Read(Addr::Latch, Slot::Lo), MicroOp::Exec(1)]);
            }
            (0, 1) => {
                self.ctx.latch = self.regs.de();
                self.queue(&[
                    MicroOp::Write(Addr::Latch, Slot::Lo),
                    MicroOp::Internal(2),
                    MicroOp::Exec(2),
                ]);
            }
            (0, _) => {
                self.regs.set_hl(step(self.regs.hl()));
                self.regs.set_de(step(self.regs.de()));
                let bc = self.regs.bc().wrapping_sub(1);
                self.regs.set_bc(bc);
                let n = self.ctx.lo.wrapping_add(self.regs.a);
                self.set_flags(
                    (self.regs.f & (SF | ZF | CF))
                        | (n & 0x08)
                        | ((n << 4) & 0x20)
                        | flag_if(bc != 0, PF),
                );
                if repeat && bc != 0 {
                    self.repeat_block();
                }
            }

            // CPI: read (HL), 5 T-states internal.
            (1, 0) => {
                self.ctx.latch = self.regs.hl();
                self.queue(&[
                    MicroOp::Read(Addr::Latch, Slot::Lo),
                    MicroOp::Internal(5),
                    MicroOp::Exec(1),
                ]);
            }
            (1, _) => {
                let (a, value) = (self.regs.a, self.ctx.lo);
                let r = a.wrapping_sub(value);
                let half = a & 0x0F < value & 0x0F;
                let n = r.wrapping_sub(u8::from(half));
                self.regs.set_hl(step(self.regs.hl()));
                self.regs.wz = step(self.regs.wz);
                let bc = self.regs.bc().wrapping_sub(1);
                self.regs.set_bc(bc);
                self.set_flags(
                    (self.regs.f & CF)
                        | NF
                        | (r & SF)
                        | flag_if(r == 0, ZF)
                        | flag_if(half, HF)
                        | flag_if(bc != 0, PF)
                        | (n & 0x08)
                        | ((n << 4) & 0x20),
                );
                if repeat && bc != 0 && r != 0 {
                    self.repeat_block();
                }
            }

            // INI: 1 T-state internal, port read, write (HL).
            (2, 0) => {
                self.ctx.latch = self.regs.bc();
                self.queue(&[MicroOp::Internal(1), MicroOp::In, MicroOp::Exec(1)]);
            }
            (2, 1) => {
                self.regs.wz = step(self.regs.bc());
                self.regs.b = self.regs.b.wrapping_sub(1);
                self.ctx.latch = self.regs.hl();
                self.queue(&[MicroOp::Write(Addr::Latch, Slot::Lo), MicroOp::Exec(2)]);
            }
            (2, _) => {
                self.regs.set_hl(step(self.regs.hl()));
                let c = if decrement {
                    self.regs.c.wrapping_sub(1)
                } else {
                    self.regs.c.wrapping_add(1)
                };
                let k = u16::from(self.ctx.lo) + u16::from(c);
                self.finish_block_io(k, repeat);
            }

            // OUTI: 1 T-state internal, read (HL), port write.
            (_, 0) => {
                self.ctx.latch = self.regs.hl();
                self.queue(&[
                    MicroOp::Internal(1),
                    MicroOp::Read(Addr::Latch, Slot::Lo),
                    MicroOp::Exec(1),
                ]);
            }
            (_, 1) => {
                self.regs.b = self.regs.b.wrapping_sub(1);
                let bc = self.regs.bc();
                self.ctx.latch = bc;
                self.regs.wz = step(bc);
                self.queue(&[MicroOp::Out, MicroOp::Exec(2)]);
            }
            _ => {
                self.regs.set_hl(step(self.regs.hl()));
                let k = u16::from(self.ctx.lo) + u16::from(self.regs.l);
                self.finish_block_io(k, repeat);
            }
        }
    }

    /// Flags for INI/OUTI and friends; `k` is the transferred byte plus the
    /// adjusted C (input) or the updated L (output).
    fn finish_block_io(&mut self, k: u16, repeat: bool) {
        let value = self.ctx.lo;
        let b = self.regs.b;
        let carry = k > 0xFF;
        let mut f = sz53(b)
            | flag_if(value & 0x80 != 0, NF)
            | flag_if(carry, HF | CF)
            | flag_if(parity((k as u8 & 7) ^ b), PF);

        if repeat && b != 0 {
            self.repeat_block();
            f = (f & !XYF) | ((self.regs.pc >> 8) as u8 & XYF);
            // A repeating transfer re-runs the B adjustment, which leaks
            // into P/V and H.
            let toggle = if carry {
                f &= !HF;
                if value & 0x80 != 0 {
                    f |= flag_if(b & 0x0F == 0x00, HF);
                    b.wrapping_sub(1) & 7
                } else {
                    f |= flag_if(b & 0x0F == 0x0F, HF);
                    b.wrapping_add(1) & 7
                }
            } else {
                b & 7
            };
            if !parity(toggle) {
                f ^= PF;
            }
        }
        self.set_flags(f);
    }

    /// Rewind PC onto the instruction and burn the 5 T-state repeat cycle.
    /// X and Y then come from the high byte of the rewound PC.
    fn repeat_block(&mut self) {
        self.regs.pc = self.regs.pc.wrapping_sub(2);
        self.regs.wz = self.regs.pc.wrapping_add(1);
        let pch = (self.regs.pc >> 8) as u8;
        self.regs.f = (self.regs.f & !XYF) | (pch & XYF);
        self.q = self.regs.f;
        self.queue(&[MicroOp::Internal(5)]);
    }
}
