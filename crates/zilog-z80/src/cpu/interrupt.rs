//! NMI and INT response sequences.

use tracing::trace;

use super::{Sequence, Z80};
use crate::flags::PF;
use crate::microcode::{Addr, MicroOp, Slot};
use crate::options::Variant;

const NMI_VECTOR: u16 = 0x0066;
const IM1_VECTOR: u16 = 0x0038;

impl Z80 {
    /// NMI: 5 T-state dummy M1, push PC, jump to 0x0066. 11 T-states.
    pub(super) fn begin_nmi(&mut self) {
        self.nmi_latched = false;
        self.accept_interrupt();
        self.regs.iff1 = false;
        self.regs.inc_r();
        self.ctx.start(Sequence::Nmi);
        self.queue(&[MicroOp::Internal(5)]);
        self.queue_push(self.regs.pc);
        self.queue(&[MicroOp::Exec(0)]);
        trace!(pc = self.regs.pc, "NMI accepted");
    }

    /// INT: acknowledge cycle, then the mode-specific response.
    pub(super) fn begin_int(&mut self) {
        // The CPU consumes the request; level sources re-drive INT each tick.
        self.pins.int = false;
        self.accept_interrupt();
        self.regs.iff1 = false;
        self.regs.iff2 = false;
        self.ctx.start(Sequence::Interrupt);
        self.queue(&[MicroOp::IntAck, MicroOp::Internal(1)]);
        self.queue_push(self.regs.pc);
        self.queue(&[MicroOp::Exec(0)]);
        trace!(pc = self.regs.pc, im = self.regs.im, "INT accepted");
    }

    fn accept_interrupt(&mut self) {
        if self.regs.halted {
            self.regs.halted = false;
            self.pins.halt = false;
        }
        // NMOS parts latch P/V from IFF2 one cycle late: an interrupt taken
        // right after LD A,I / LD A,R reads back P/V clear.
        if self.ld_a_ir && self.options.variant == Variant::Nmos {
            self.regs.f &= !PF;
        }
        self.ei_delay = false;
    }

    pub(super) fn exec_interrupt(&mut self, stage: u8) {
        if self.ctx.sequence == Sequence::Nmi {
            self.jump(NMI_VECTOR);
            return;
        }
        let vector = self.ctx.opcode;
        match (self.regs.im, stage) {
            (2, 0) => {
                self.ctx.latch = u16::from_be_bytes([self.regs.i, vector]);
                self.queue(&[
                    MicroOp::Read(Addr::Latch, Slot::Lo),
                    MicroOp::Read(Addr::LatchNext, Slot::Hi),
                    MicroOp::Exec(1),
                ]);
            }
            (2, _) => {
                let target = self.ctx.word();
                self.jump(target);
            }
            (0, _) => {
                // Only RST opcodes are meaningful on the data bus; anything
                // else is treated as the idle bus value, RST 38h.
                let target = if vector & 0xC7 == 0xC7 {
                    u16::from(vector & 0x38)
                } else {
                    IM1_VECTOR
                };
                self.jump(target);
            }
            _ => self.jump(IM1_VECTOR),
        }
    }
}
