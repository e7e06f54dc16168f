//! Decode and unprefixed / DD / FD execution.
//!
//! Opcodes are split the usual way: `x = op >> 6`, `y = (op >> 3) & 7`,
//! `z = op & 7`, `p = y >> 1`, `q = y & 1`. Each handler is re-entered with
//! the stage number its `Exec` marker named; stage 0 runs straight after the
//! opcode fetch.

use super::{IndexReg, Prefix, Z80};
use crate::alu;
use crate::flags::{CF, HF, NF, PF, SF, XYF, ZF};
use crate::microcode::{Addr, MicroOp, Slot};

const DECODE: u8 = 0;
/// `(IX+d)` displacement has been read; latch the operand address.
const ADDRESS: u8 = 1;
/// Operand bytes are in the latches.
const OPERAND: u8 = 2;

const READ_WORD: [MicroOp; 3] = [
    MicroOp::Read(Addr::Pc, Slot::Lo),
    MicroOp::Read(Addr::Pc, Slot::Hi),
    MicroOp::Exec(1),
];

const READ_BYTE: [MicroOp; 2] = [MicroOp::Read(Addr::Pc, Slot::Lo), MicroOp::Exec(1)];

const POP_WORD: [MicroOp; 3] = [
    MicroOp::Read(Addr::Pop, Slot::Lo),
    MicroOp::Read(Addr::Pop, Slot::Hi),
    MicroOp::Exec(1),
];

impl Z80 {
    /// Route a freshly fetched byte: either another prefix or the opcode.
    pub(super) fn decode(&mut self) {
        let byte = self.ctx.opcode;
        if matches!(self.ctx.prefix, Prefix::None | Prefix::Index(_)) {
            let next = match byte {
                0xDD => Some(Prefix::Index(IndexReg::Ix)),
                0xFD => Some(Prefix::Index(IndexReg::Iy)),
                // ED discards any pending index prefix.
                0xED => Some(Prefix::Ed),
                0xCB => match self.ctx.prefix {
                    Prefix::Index(index) => {
                        self.ctx.prefix = Prefix::IndexCb(index);
                        self.queue(&[
                            MicroOp::Read(Addr::Pc, Slot::Disp),
                            MicroOp::Read(Addr::Pc, Slot::Opcode),
                            MicroOp::Internal(2),
                            MicroOp::Exec(DECODE),
                        ]);
                        return;
                    }
                    _ => Some(Prefix::Cb),
                },
                _ => None,
            };
            if let Some(prefix) = next {
                self.ctx.prefix = prefix;
                self.ctx.ops.clear();
                self.ctx.ops.push(MicroOp::Fetch);
                return;
            }
        }
        self.execute(DECODE);
    }

    pub(super) fn exec_main(&mut self, stage: u8) {
        let op = self.ctx.opcode;
        let (x, y, z) = (op >> 6, (op >> 3) & 7, op & 7);
        let (p, q) = (y >> 1, y & 1);

        match (x, z) {
            // 00 08 10 18 20 28 30 38: NOP, EX AF,AF', DJNZ e, JR e, JR cc,e
            (0, 0) => self.exec_relative(y, stage),
            // 01 11 21 31: LD rr,nn
            (0, 1) if q == 0 => match stage {
                DECODE => self.queue(&READ_WORD),
                _ => {
                    let word = self.ctx.word();
                    self.set_rp(p, word);
                }
            },
            (0, 1) => {
                // 09 19 29 39: ADD HL,rr
                let hl = self.hl_or_index();
                let (result, flags) = alu::add16(hl, self.rp(p));
                self.regs.wz = hl.wrapping_add(1);
                self.set_hl_or_index(result);
                self.set_flags((self.regs.f & (SF | ZF | PF)) | flags);
                self.queue(&[MicroOp::Internal(7)]);
            }
            // 02 0A 12 1A 22 2A 32 3A: LD (rr),A, LD A,(rr) and the LD (nn) forms
            (0, 2) => self.exec_indirect_load(p, q, stage),
            (0, 3) => {
                // 03 13 23 33: INC rr; 0B 1B 2B 3B: DEC rr
                let rp = self.rp(p);
                let value = if q == 0 {
                    rp.wrapping_add(1)
                } else {
                    rp.wrapping_sub(1)
                };
                self.set_rp(p, value);
                self.queue(&[MicroOp::Internal(2)]);
            }
            // INC r / DEC r, including (HL)
            (0, 4 | 5) => self.exec_inc_dec(y, z == 5, stage),
            // LD r,n
            (0, 6) => self.exec_load_immediate(y, stage),
            // RLCA RRCA RLA RRA DAA CPL SCF CCF
            (0, 7) => self.exec_accumulator_misc(y),
            (1, _) if y == 6 && z == 6 => {
                // 76: HALT
                self.regs.halted = true;
                self.pins.halt = true;
            }
            // 40-7F: LD r,r'
            (1, _) => self.exec_load_register(y, z, stage),
            // 80-BF: ADD ADC SUB SBC AND XOR OR CP with r
            (2, _) => self.exec_alu(y, z, stage),
            // C0 C8 D0 ... F8: RET cc
            (3, 0) => match stage {
                DECODE => {
                    self.queue(&[MicroOp::Internal(1)]);
                    if self.condition(y) {
                        self.queue(&POP_WORD);
                    }
                }
                _ => self.return_to_popped(),
            },
            // POP rr, RET, EXX, JP (HL), LD SP,HL
            (3, 1) => self.exec_pop_group(p, q, stage),
            // C2 CA D2 ... FA: JP cc,nn
            (3, 2) => match stage {
                DECODE => self.queue(&READ_WORD),
                _ => {
                    let target = self.ctx.word();
                    self.regs.wz = target;
                    if self.condition(y) {
                        self.regs.pc = target;
                    }
                }
            },
            // JP nn, OUT (n),A, IN A,(n), EX (SP),HL, EX DE,HL, DI, EI
            (3, 3) => self.exec_misc(y, stage),
            // C4 CC D4 ... FC: CALL cc,nn
            (3, 4) => match stage {
                DECODE => self.queue(&READ_WORD),
                _ => {
                    let target = self.ctx.word();
                    self.regs.wz = target;
                    if self.condition(y) {
                        self.call(target);
                    }
                }
            },
            (3, 5) if q == 0 => {
                // C5 D5 E5 F5: PUSH rr
                let value = self.rp2(p);
                self.queue(&[MicroOp::Internal(1)]);
                self.queue_push(value);
            }
            (3, 5) => match stage {
                // CALL nn; the other slots are prefixes and never get here.
                DECODE => self.queue(&READ_WORD),
                _ => {
                    let target = self.ctx.word();
                    self.call(target);
                }
            },
            // C6 CE D6 ... FE: ALU A,n
            (3, 6) => match stage {
                DECODE => self.queue(&READ_BYTE),
                _ => self.accumulate(y, self.ctx.lo),
            },
            _ => {
                // C7 CF D7 ... FF: RST p
                let pc = self.regs.pc;
                self.queue(&[MicroOp::Internal(1)]);
                self.queue_push(pc);
                self.jump(u16::from(y) << 3);
            }
        }
    }

    /// Push PC and jump. The 1 T-state internal cycle belongs to CALL.
    fn call(&mut self, target: u16) {
        let pc = self.regs.pc;
        self.queue(&[MicroOp::Internal(1)]);
        self.queue_push(pc);
        self.jump(target);
    }

    pub(super) fn return_to_popped(&mut self) {
        let target = self.ctx.word();
        self.jump(target);
    }

    /// NOP, EX AF,AF', DJNZ, JR, JR cc.
    fn exec_relative(&mut self, y: u8, stage: u8) {
        match (y, stage) {
            (0, _) => {}
            (1, _) => self.regs.ex_af(),
            (2, DECODE) => self.queue(&[
                MicroOp::Internal(1),
                MicroOp::Read(Addr::Pc, Slot::Lo),
                MicroOp::Exec(1),
            ]),
            (2, _) => {
                self.regs.b = self.regs.b.wrapping_sub(1);
                if self.regs.b != 0 {
                    self.jump_relative();
                }
            }
            (_, DECODE) => self.queue(&READ_BYTE),
            (3, _) => self.jump_relative(),
            _ => {
                if self.condition(y - 4) {
                    self.jump_relative();
                }
            }
        }
    }

    fn jump_relative(&mut self) {
        let target = self
            .regs
            .pc
            .wrapping_add_signed(i16::from(self.ctx.lo as i8));
        self.jump(target);
        self.queue(&[MicroOp::Internal(5)]);
    }

    /// The `LD (rr),A` / `LD A,(rr)` / `LD (nn),HL` / `LD HL,(nn)` /
    /// `LD (nn),A` / `LD A,(nn)` block.
    fn exec_indirect_load(&mut self, p: u8, q: u8, stage: u8) {
        match (q, p, stage) {
            (0, 0 | 1, _) => {
                let address = self.rp(p);
                let a = self.regs.a;
                self.store_a(address, a);
            }
            (1, 0 | 1, DECODE) => {
                let address = self.rp(p);
                self.ctx.latch = address;
                self.regs.wz = address.wrapping_add(1);
                self.queue(&[MicroOp::Read(Addr::Latch, Slot::Lo), MicroOp::Exec(1)]);
            }
            (1, 0 | 1, _) => self.regs.a = self.ctx.lo,
            (_, _, DECODE) => self.queue(&READ_WORD),
            (0, 2, _) => {
                let address = self.ctx.word();
                let value = self.hl_or_index();
                self.store_word(address, value);
            }
            (0, _, _) => {
                let address = self.ctx.word();
                let a = self.regs.a;
                self.store_a(address, a);
            }
            (1, 2, 1) => {
                let address = self.ctx.word();
                self.load_word(address);
            }
            (1, 2, _) => {
                let word = self.ctx.word();
                self.set_hl_or_index(word);
            }
            (_, _, 1) => {
                let address = self.ctx.word();
                self.ctx.latch = address;
                self.regs.wz = address.wrapping_add(1);
                self.queue(&[MicroOp::Read(Addr::Latch, Slot::Lo), MicroOp::Exec(2)]);
            }
            _ => self.regs.a = self.ctx.lo,
        }
    }

    /// Queue a write of A; WZ becomes A:(address+1).
    fn store_a(&mut self, address: u16, a: u8) {
        self.ctx.latch = address;
        self.ctx.lo = a;
        self.regs.wz = u16::from_be_bytes([a, address.wrapping_add(1) as u8]);
        self.queue(&[MicroOp::Write(Addr::Latch, Slot::Lo)]);
    }

    /// Queue a little-endian word write to `address`; WZ becomes address+1.
    pub(super) fn store_word(&mut self, address: u16, value: u16) {
        self.ctx.latch = address;
        self.ctx.set_word(value);
        self.regs.wz = address.wrapping_add(1);
        self.queue(&[
            MicroOp::Write(Addr::Latch, Slot::Lo),
            MicroOp::Write(Addr::LatchNext, Slot::Hi),
        ]);
    }

    /// Queue a little-endian word read from `address`, resuming at stage 2.
    pub(super) fn load_word(&mut self, address: u16) {
        self.ctx.latch = address;
        self.regs.wz = address.wrapping_add(1);
        self.queue(&[
            MicroOp::Read(Addr::Latch, Slot::Lo),
            MicroOp::Read(Addr::LatchNext, Slot::Hi),
            MicroOp::Exec(2),
        ]);
    }

    fn exec_inc_dec(&mut self, y: u8, decrement: bool, stage: u8) {
        let apply = |v: u8| if decrement { alu::dec8(v) } else { alu::inc8(v) };
        if y != 6 {
            let result = apply(self.reg8(y));
            self.set_reg8(y, result.value);
            self.set_flags((self.regs.f & CF) | result.flags);
            return;
        }
        match stage {
            DECODE if self.indexed() => self.queue_displacement(ADDRESS),
            DECODE | ADDRESS => {
                self.latch_operand_address();
                self.queue(&[
                    MicroOp::Read(Addr::Latch, Slot::Lo),
                    MicroOp::Internal(1),
                    MicroOp::Exec(OPERAND),
                ]);
            }
            _ => {
                let result = apply(self.ctx.lo);
                self.ctx.lo = result.value;
                self.set_flags((self.regs.f & CF) | result.flags);
                self.queue(&[MicroOp::Write(Addr::Latch, Slot::Lo)]);
            }
        }
    }

    fn exec_load_immediate(&mut self, y: u8, stage: u8) {
        match stage {
            // LD (IX+d),n reads d and n back to back, then overlaps the
            // address calculation with a 2 T-state internal cycle.
            DECODE if y == 6 && self.indexed() => self.queue(&[
                MicroOp::Read(Addr::Pc, Slot::Disp),
                MicroOp::Read(Addr::Pc, Slot::Lo),
                MicroOp::Internal(2),
                MicroOp::Exec(1),
            ]),
            DECODE => self.queue(&READ_BYTE),
            _ if y == 6 => {
                self.latch_operand_address();
                self.queue(&[MicroOp::Write(Addr::Latch, Slot::Lo)]);
            }
            _ => self.set_reg8(y, self.ctx.lo),
        }
    }

    /// RLCA, RRCA, RLA, RRA, DAA, CPL, SCF, CCF.
    fn exec_accumulator_misc(&mut self, y: u8) {
        let (a, f) = (self.regs.a, self.regs.f);
        match y {
            0..=3 => {
                let result = alu::rotate_accumulator(y, a, f);
                self.regs.a = result.value;
                self.set_flags(result.flags);
            }
            4 => {
                let result = alu::daa(a, f);
                self.regs.a = result.value;
                self.set_flags(result.flags);
            }
            5 => {
                self.regs.a = !a;
                self.set_flags((f & (SF | ZF | PF | CF)) | HF | NF | (!a & XYF));
            }
            _ => {
                // X and Y: NMOS parts OR A into F only if the previous
                // instruction wrote F.
                let xy = ((self.prev_q ^ f) | a) & XYF;
                let carry = f & CF != 0;
                let (h, c) = if y == 6 {
                    (0, CF)
                } else {
                    (if carry { HF } else { 0 }, if carry { 0 } else { CF })
                };
                self.set_flags((f & (SF | ZF | PF)) | xy | h | c);
            }
        }
    }

    fn exec_load_register(&mut self, y: u8, z: u8, stage: u8) {
        if y != 6 && z != 6 {
            let value = self.reg8(z);
            self.set_reg8(y, value);
            return;
        }
        // Memory forms use H and L themselves even under DD/FD.
        match stage {
            DECODE if self.indexed() => self.queue_displacement(ADDRESS),
            DECODE | ADDRESS => {
                self.latch_operand_address();
                if z == 6 {
                    self.queue(&[MicroOp::Read(Addr::Latch, Slot::Lo), MicroOp::Exec(OPERAND)]);
                } else {
                    self.ctx.lo = self.reg8_plain(z);
                    self.queue(&[MicroOp::Write(Addr::Latch, Slot::Lo)]);
                }
            }
            _ => self.set_reg8_plain(y, self.ctx.lo),
        }
    }

    fn exec_alu(&mut self, y: u8, z: u8, stage: u8) {
        if z != 6 {
            self.accumulate(y, self.reg8(z));
            return;
        }
        match stage {
            DECODE if self.indexed() => self.queue_displacement(ADDRESS),
            DECODE | ADDRESS => {
                self.latch_operand_address();
                self.queue(&[MicroOp::Read(Addr::Latch, Slot::Lo), MicroOp::Exec(OPERAND)]);
            }
            _ => self.accumulate(y, self.ctx.lo),
        }
    }

    pub(super) fn accumulate(&mut self, op: u8, operand: u8) {
        let result = alu::accumulator(op, self.regs.a, operand, self.regs.f & CF != 0);
        self.regs.a = result.value;
        self.set_flags(result.flags);
    }

    /// POP rr, RET, EXX, JP (HL), LD SP,HL.
    fn exec_pop_group(&mut self, p: u8, q: u8, stage: u8) {
        match (q, p, stage) {
            (0, _, DECODE) | (1, 0, DECODE) => self.queue(&POP_WORD),
            (0, _, _) => {
                let word = self.ctx.word();
                self.set_rp2(p, word);
            }
            (1, 0, _) => self.return_to_popped(),
            (_, 1, _) => self.regs.exx(),
            (_, 2, _) => self.regs.pc = self.hl_or_index(),
            _ => {
                self.regs.sp = self.hl_or_index();
                self.queue(&[MicroOp::Internal(2)]);
            }
        }
    }

    /// JP nn, OUT (n),A, IN A,(n), EX (SP),HL, EX DE,HL, DI, EI.
    fn exec_misc(&mut self, y: u8, stage: u8) {
        match (y, stage) {
            (0, DECODE) => self.queue(&READ_WORD),
            (0, _) => {
                let target = self.ctx.word();
                self.jump(target);
            }
            (2 | 3, DECODE) => self.queue(&READ_BYTE),
            (2, _) => {
                let (a, n) = (self.regs.a, self.ctx.lo);
                self.ctx.latch = u16::from_be_bytes([a, n]);
                self.regs.wz = u16::from_be_bytes([a, n.wrapping_add(1)]);
                self.ctx.lo = a;
                self.queue(&[MicroOp::Out]);
            }
            (3, 1) => {
                let port = u16::from_be_bytes([self.regs.a, self.ctx.lo]);
                self.ctx.latch = port;
                self.regs.wz = port.wrapping_add(1);
                self.queue(&[MicroOp::In, MicroOp::Exec(2)]);
            }
            (3, _) => self.regs.a = self.ctx.lo,
            (4, DECODE) => {
                self.ctx.latch = self.regs.sp;
                self.queue(&[
                    MicroOp::Read(Addr::Latch, Slot::Lo),
                    MicroOp::Read(Addr::LatchNext, Slot::Hi),
                    MicroOp::Internal(1),
                    MicroOp::Exec(1),
                ]);
            }
            (4, _) => {
                let from_stack = self.ctx.word();
                let old = self.hl_or_index();
                self.set_hl_or_index(from_stack);
                self.regs.wz = from_stack;
                self.ctx.set_word(old);
                self.queue(&[
                    MicroOp::Write(Addr::LatchNext, Slot::Hi),
                    MicroOp::Write(Addr::Latch, Slot::Lo),
                    MicroOp::Internal(2),
                ]);
            }
            (5, _) => self.regs.ex_de_hl(),
            (6, _) => {
                self.regs.iff1 = false;
                self.regs.iff2 = false;
            }
            _ => {
                self.regs.iff1 = true;
                self.regs.iff2 = true;
                self.ei_delay = true;
            }
        }
    }
}
