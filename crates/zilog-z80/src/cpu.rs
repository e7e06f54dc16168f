//! Z80 CPU core.
//!
//! `tick()` advances exactly one T-state. An instruction is a queue of
//! machine cycles plus a continuation stage; together with the T-state inside
//! the current cycle that is everything needed to stop on any tick and carry
//! on from the next one.

mod execute;
mod interrupt;
mod prefixed;

use emu_core::{AccessKind, Bus, BusTransaction, Cpu, Observable, Pins, Ticks, Value};
use tracing::debug;

use crate::flags::{CF, HF, NF, PF, SF, XF, YF, ZF};
use crate::microcode::{Addr, MicroOp, MicroOpQueue, Slot};
use crate::options::Z80Options;
use crate::registers::Registers;

/// Index register selected by a DD or FD prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum IndexReg {
    Ix,
    Iy,
}

/// Prefix state of the instruction being decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Prefix {
    None,
    Cb,
    Ed,
    Index(IndexReg),
    /// DDCB / FDCB: displacement and opcode come from ordinary memory reads.
    IndexCb(IndexReg),
}

impl Prefix {
    const fn code(self) -> u16 {
        match self {
            Self::None => 0,
            Self::Cb => 0xCB,
            Self::Ed => 0xED,
            Self::Index(IndexReg::Ix) => 0xDD,
            Self::Index(IndexReg::Iy) => 0xFD,
            Self::IndexCb(IndexReg::Ix) => 0xDDCB,
            Self::IndexCb(IndexReg::Iy) => 0xFDCB,
        }
    }
}

/// What the queued cycles belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Sequence {
    Instruction,
    /// HALT: M1 cycles at PC whose data is discarded.
    Halted,
    Nmi,
    Interrupt,
}

/// Externally visible execution state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CpuState {
    Running,
    /// An enabled interrupt will be taken at the next instruction boundary.
    InterruptPending,
    /// Running an NMI or INT response sequence.
    ServicingInterrupt,
    Halted,
}

/// Decoded instruction plus the latches its cycles read and write.
#[derive(Debug, Clone)]
pub(crate) struct ExecContext {
    pub(crate) ops: MicroOpQueue,
    pub(crate) t_state: u8,
    pub(crate) stage: u8,
    pub(crate) sequence: Sequence,
    pub(crate) prefix: Prefix,
    pub(crate) opcode: u8,
    pub(crate) disp: i8,
    pub(crate) latch: u16,
    pub(crate) lo: u8,
    pub(crate) hi: u8,
}

impl ExecContext {
    /// A context about to fetch the first instruction.
    fn new() -> Self {
        let mut ctx = Self {
            ops: MicroOpQueue::new(),
            t_state: 0,
            stage: 0,
            sequence: Sequence::Instruction,
            prefix: Prefix::None,
            opcode: 0,
            disp: 0,
            latch: 0,
            lo: 0,
            hi: 0,
        };
        ctx.ops.push(MicroOp::Fetch);
        ctx
    }

    fn start(&mut self, sequence: Sequence) {
        self.ops.clear();
        self.t_state = 0;
        self.stage = 0;
        self.sequence = sequence;
        self.prefix = Prefix::None;
        self.disp = 0;
    }

    pub(crate) fn word(&self) -> u16 {
        u16::from_le_bytes([self.lo, self.hi])
    }

    pub(crate) fn set_word(&mut self, value: u16) {
        [self.lo, self.hi] = value.to_le_bytes();
    }

    fn slot(&self, slot: Slot) -> u8 {
        match slot {
            Slot::Lo => self.lo,
            Slot::Hi => self.hi,
            Slot::Disp => self.disp as u8,
            Slot::Opcode => self.opcode,
        }
    }

    fn set_slot(&mut self, slot: Slot, value: u8) {
        match slot {
            Slot::Lo => self.lo = value,
            Slot::Hi => self.hi = value,
            Slot::Disp => self.disp = value as i8,
            Slot::Opcode => self.opcode = value,
        }
    }
}

/// Zilog Z80 CPU.
pub struct Z80 {
    pub(crate) regs: Registers,
    pub(crate) ctx: ExecContext,
    pins: Pins,
    pub(crate) options: Z80Options,

    /// NMI edge seen and not yet serviced.
    nmi_latched: bool,
    /// EI executed; interrupts stay blocked until the next instruction starts.
    pub(crate) ei_delay: bool,
    /// The instruction just executed was `LD A,I` or `LD A,R`.
    pub(crate) ld_a_ir: bool,
    /// F as written by the current instruction, zero if it left F alone.
    pub(crate) q: u8,
    /// Q of the previous instruction (feeds SCF/CCF X and Y).
    pub(crate) prev_q: u8,

    /// Wait states requested by the bus, burned before the next cycle.
    pending_wait: u8,
    /// The last tick was a WAIT, BUSREQ or RESET stall.
    stalled: bool,
    cycles: u64,
    boundaries: u64,
    total_ticks: Ticks,
    last_transaction: Option<BusTransaction>,
}

impl Z80 {
    #[must_use]
    pub fn new() -> Self {
        Self::with_options(Z80Options::default())
    }

    #[must_use]
    pub fn with_options(options: Z80Options) -> Self {
        Self {
            regs: Registers::power_on(options.register_fill),
            ctx: ExecContext::new(),
            pins: Pins::default(),
            options,
            nmi_latched: false,
            ei_delay: false,
            ld_a_ir: false,
            q: 0,
            prev_q: 0,
            pending_wait: 0,
            stalled: false,
            cycles: 0,
            boundaries: 0,
            total_ticks: Ticks::ZERO,
            last_transaction: None,
        }
    }

    #[must_use]
    pub const fn options(&self) -> Z80Options {
        self.options
    }

    /// Return to the power-on state. Input lines and elapsed time are kept;
    /// everything else, including a half-executed instruction, is discarded.
    pub fn reset(&mut self) {
        self.regs = Registers::power_on(self.options.register_fill);
        self.ctx = ExecContext::new();
        self.nmi_latched = false;
        self.ei_delay = false;
        self.ld_a_ir = false;
        self.q = 0;
        self.prev_q = 0;
        self.pending_wait = 0;
        self.pins.halt = false;
        self.pins.busack = false;
        self.pins.m1 = false;
    }

    /// Advance one T-state.
    pub fn tick<B: Bus>(&mut self, bus: &mut B) {
        self.total_ticks += Ticks::new(1);
        self.stalled = false;

        if self.pins.reset {
            self.reset();
            self.stalled = true;
            return;
        }

        if self.pending_wait > 0 {
            self.pending_wait -= 1;
            return;
        }

        // Bus requests are granted between machine cycles only.
        if self.ctx.t_state == 0 {
            if self.pins.busreq {
                if !self.pins.busack {
                    debug!(pc = self.regs.pc, "bus granted");
                }
                self.pins.busack = true;
                self.pins.m1 = false;
                self.stalled = true;
                return;
            }
            self.pins.busack = false;
        }

        self.run_t_state(bus);
    }

    /// Advance one machine cycle and return the T-states it took, waits
    /// included. Returns after a single tick if WAIT, BUSREQ or RESET is
    /// holding the CPU, so the caller gets a chance to release the line.
    pub fn step<B: Bus>(&mut self, bus: &mut B) -> u32 {
        let start = self.total_ticks;
        let cycles = self.cycles;
        loop {
            self.tick(bus);
            if self.stalled || (self.cycles != cycles && self.pending_wait == 0) {
                break;
            }
        }
        (self.total_ticks - start).get() as u32
    }

    /// Advance to the next instruction boundary (an interrupt response or one
    /// halted M1 cycle also counts) and return the T-states taken. Stalls
    /// return early as with [`Z80::step`].
    pub fn step_instruction<B: Bus>(&mut self, bus: &mut B) -> u32 {
        let start = self.total_ticks;
        let boundaries = self.boundaries;
        loop {
            self.tick(bus);
            if self.stalled || (self.boundaries != boundaries && self.pending_wait == 0) {
                break;
            }
        }
        (self.total_ticks - start).get() as u32
    }

    fn run_t_state<B: Bus>(&mut self, bus: &mut B) {
        let Some(op) = self.ctx.ops.current() else {
            self.instruction_boundary();
            return;
        };
        let t = self.ctx.t_state;

        if t == 0
            && op == MicroOp::Fetch
            && self.ctx.sequence == Sequence::Instruction
            && self.ctx.prefix == Prefix::None
        {
            self.begin_instruction();
        }
        self.pins.m1 = matches!(op, MicroOp::Fetch | MicroOp::IntAck);

        if op.wait_sample() == Some(t) && self.pins.wait {
            self.stalled = true;
            return;
        }
        if op.transfer_state() == Some(t) {
            self.transfer(op, bus);
        }

        self.ctx.t_state = t + 1;
        if self.ctx.t_state >= op.t_states() {
            self.complete_cycle(op);
        }
    }

    fn begin_instruction(&mut self) {
        self.prev_q = self.q;
        self.q = 0;
        self.ei_delay = false;
        self.ld_a_ir = false;
    }

    fn transfer<B: Bus>(&mut self, op: MicroOp, bus: &mut B) {
        match op {
            MicroOp::Fetch => {
                let pc = self.regs.pc;
                let byte = self.bus_read(bus, pc, AccessKind::Fetch);
                if self.ctx.sequence == Sequence::Instruction {
                    self.ctx.opcode = byte;
                    self.regs.pc = pc.wrapping_add(1);
                }
                self.regs.inc_r();
            }
            MicroOp::Read(addr, slot) => {
                let address = self.resolve(addr);
                let value = self.bus_read(bus, address, AccessKind::MemRead);
                self.ctx.set_slot(slot, value);
            }
            MicroOp::Write(addr, slot) => {
                let address = self.resolve(addr);
                let value = self.ctx.slot(slot);
                self.bus_write(bus, address, value, AccessKind::MemWrite);
            }
            MicroOp::In => {
                let port = self.ctx.latch;
                self.ctx.lo = self.bus_read(bus, port, AccessKind::IoRead);
            }
            MicroOp::Out => {
                let port = self.ctx.latch;
                let value = self.ctx.lo;
                self.bus_write(bus, port, value, AccessKind::IoWrite);
            }
            MicroOp::IntAck => {
                let vector = bus.interrupt_ack();
                self.record(self.regs.pc, AccessKind::IntAck, vector);
                self.ctx.opcode = vector;
                self.regs.inc_r();
            }
            MicroOp::Internal(_) | MicroOp::Exec(_) => {}
        }
    }

    fn resolve(&mut self, addr: Addr) -> u16 {
        match addr {
            Addr::Pc => {
                let pc = self.regs.pc;
                self.regs.pc = pc.wrapping_add(1);
                pc
            }
            Addr::Latch => self.ctx.latch,
            Addr::LatchNext => self.ctx.latch.wrapping_add(1),
            Addr::Pop => {
                let sp = self.regs.sp;
                self.regs.sp = sp.wrapping_add(1);
                sp
            }
            Addr::Push => {
                self.regs.sp = self.regs.sp.wrapping_sub(1);
                self.regs.sp
            }
        }
    }

    fn complete_cycle(&mut self, op: MicroOp) {
        self.ctx.t_state = 0;
        self.ctx.ops.advance();
        self.cycles += 1;

        if op == MicroOp::Fetch && self.ctx.sequence == Sequence::Instruction {
            self.decode();
        }
        while let Some(MicroOp::Exec(stage)) = self.ctx.ops.current() {
            self.ctx.ops.advance();
            self.ctx.stage = stage;
            self.execute(stage);
        }
        if self.ctx.ops.is_empty() {
            self.instruction_boundary();
        }
    }

    /// Queue the next sequence: a pending interrupt response, another halted
    /// M1 cycle, or the next opcode fetch.
    fn instruction_boundary(&mut self) {
        self.boundaries += 1;
        if self.nmi_latched {
            self.begin_nmi();
        } else if self.pins.int && self.regs.iff1 && !self.ei_delay {
            self.begin_int();
        } else if self.regs.halted {
            self.ctx.start(Sequence::Halted);
            self.ctx.ops.push(MicroOp::Fetch);
        } else {
            self.ctx.start(Sequence::Instruction);
            self.ctx.ops.push(MicroOp::Fetch);
        }
    }

    /// Dispatch continuation `stage` of whatever is executing.
    fn execute(&mut self, stage: u8) {
        match self.ctx.sequence {
            Sequence::Instruction => match self.ctx.prefix {
                Prefix::None | Prefix::Index(_) => self.exec_main(stage),
                Prefix::Cb => self.exec_cb(stage),
                Prefix::IndexCb(_) => self.exec_index_cb(stage),
                Prefix::Ed => self.exec_ed(stage),
            },
            Sequence::Nmi | Sequence::Interrupt => self.exec_interrupt(stage),
            Sequence::Halted => {}
        }
    }

    fn bus_read<B: Bus>(&mut self, bus: &mut B, address: u16, kind: AccessKind) -> u8 {
        let result = if kind == AccessKind::IoRead {
            bus.io_read(u32::from(address))
        } else {
            bus.read(u32::from(address))
        };
        self.pending_wait = self.pending_wait.saturating_add(result.wait);
        self.record(address, kind, result.data);
        result.data
    }

    fn bus_write<B: Bus>(&mut self, bus: &mut B, address: u16, value: u8, kind: AccessKind) {
        let wait = if kind == AccessKind::IoWrite {
            bus.io_write(u32::from(address), value)
        } else {
            bus.write(u32::from(address), value)
        };
        self.pending_wait = self.pending_wait.saturating_add(wait);
        self.record(address, kind, value);
    }

    fn record(&mut self, address: u16, kind: AccessKind, data: u8) {
        self.last_transaction = Some(BusTransaction::new(address, kind, data, self.total_ticks));
    }
}

impl Default for Z80 {
    fn default() -> Self {
        Self::new()
    }
}

// Operand helpers shared by the decode tables.
impl Z80 {
    pub(crate) fn queue(&mut self, ops: &[MicroOp]) {
        for &op in ops {
            self.ctx.ops.push(op);
        }
    }

    fn index_value(&self, index: IndexReg) -> u16 {
        match index {
            IndexReg::Ix => self.regs.ix,
            IndexReg::Iy => self.regs.iy,
        }
    }

    pub(crate) const fn indexed(&self) -> bool {
        matches!(self.ctx.prefix, Prefix::Index(_))
    }

    /// HL, or IX/IY under a DD/FD prefix.
    pub(crate) fn hl_or_index(&self) -> u16 {
        match self.ctx.prefix {
            Prefix::Index(index) => self.index_value(index),
            _ => self.regs.hl(),
        }
    }

    pub(crate) fn set_hl_or_index(&mut self, value: u16) {
        match self.ctx.prefix {
            Prefix::Index(IndexReg::Ix) => self.regs.ix = value,
            Prefix::Index(IndexReg::Iy) => self.regs.iy = value,
            _ => self.regs.set_hl(value),
        }
    }

    /// Register `r` in opcode order (`B C D E H L - A`). Index 6 is the
    /// memory operand and is handled by callers.
    pub(crate) const fn reg8_plain(&self, r: u8) -> u8 {
        match r & 7 {
            0 => self.regs.b,
            1 => self.regs.c,
            2 => self.regs.d,
            3 => self.regs.e,
            4 => self.regs.h,
            5 => self.regs.l,
            7 => self.regs.a,
            _ => 0,
        }
    }

    pub(crate) fn set_reg8_plain(&mut self, r: u8, value: u8) {
        match r & 7 {
            0 => self.regs.b = value,
            1 => self.regs.c = value,
            2 => self.regs.d = value,
            3 => self.regs.e = value,
            4 => self.regs.h = value,
            5 => self.regs.l = value,
            7 => self.regs.a = value,
            _ => {}
        }
    }

    /// As [`Self::reg8_plain`], but H and L become the halves of IX/IY under
    /// a DD/FD prefix.
    pub(crate) fn reg8(&self, r: u8) -> u8 {
        match (self.ctx.prefix, r & 7) {
            (Prefix::Index(index), 4) => (self.index_value(index) >> 8) as u8,
            (Prefix::Index(index), 5) => self.index_value(index) as u8,
            _ => self.reg8_plain(r),
        }
    }

    pub(crate) fn set_reg8(&mut self, r: u8, value: u8) {
        let reg = match (self.ctx.prefix, r & 7) {
            (Prefix::Index(IndexReg::Ix), 4 | 5) => &mut self.regs.ix,
            (Prefix::Index(IndexReg::Iy), 4 | 5) => &mut self.regs.iy,
            _ => return self.set_reg8_plain(r, value),
        };
        let [hi, lo] = reg.to_be_bytes();
        *reg = if r & 7 == 4 {
            u16::from_be_bytes([value, lo])
        } else {
            u16::from_be_bytes([hi, value])
        };
    }

    /// Register pair `p` from the `BC DE HL SP` table.
    pub(crate) fn rp(&self, p: u8) -> u16 {
        match p & 3 {
            0 => self.regs.bc(),
            1 => self.regs.de(),
            2 => self.hl_or_index(),
            _ => self.regs.sp,
        }
    }

    pub(crate) fn set_rp(&mut self, p: u8, value: u16) {
        match p & 3 {
            0 => self.regs.set_bc(value),
            1 => self.regs.set_de(value),
            2 => self.set_hl_or_index(value),
            _ => self.regs.sp = value,
        }
    }

    /// Register pair `p` from the `BC DE HL AF` table (PUSH/POP).
    pub(crate) fn rp2(&self, p: u8) -> u16 {
        if p & 3 == 3 {
            self.regs.af()
        } else {
            self.rp(p)
        }
    }

    pub(crate) fn set_rp2(&mut self, p: u8, value: u16) {
        if p & 3 == 3 {
            self.regs.set_af(value);
        } else {
            self.set_rp(p, value);
        }
    }

    /// Condition `cc` in opcode order (`NZ Z NC C PO PE P M`).
    pub(crate) const fn condition(&self, cc: u8) -> bool {
        let f = self.regs.f;
        match cc & 7 {
            0 => f & ZF == 0,
            1 => f & ZF != 0,
            2 => f & CF == 0,
            3 => f & CF != 0,
            4 => f & PF == 0,
            5 => f & PF != 0,
            6 => f & SF == 0,
            _ => f & SF != 0,
        }
    }

    /// Write F from an ALU result; Q records it.
    pub(crate) fn set_flags(&mut self, f: u8) {
        self.regs.f = f;
        self.q = f;
    }

    pub(crate) fn jump(&mut self, target: u16) {
        self.regs.pc = target;
        self.regs.wz = target;
    }

    /// Queue the two writes that push `value`, high byte first.
    pub(crate) fn queue_push(&mut self, value: u16) {
        self.ctx.set_word(value);
        self.queue(&[
            MicroOp::Write(Addr::Push, Slot::Hi),
            MicroOp::Write(Addr::Push, Slot::Lo),
        ]);
    }

    /// Read the displacement of an `(IX+d)` operand, then resume at `resume`.
    pub(crate) fn queue_displacement(&mut self, resume: u8) {
        self.queue(&[
            MicroOp::Read(Addr::Pc, Slot::Disp),
            MicroOp::Internal(5),
            MicroOp::Exec(resume),
        ]);
    }

    /// Latch the address of the `(HL)` or `(IX+d)` operand. The indexed form
    /// also loads WZ.
    pub(crate) fn latch_operand_address(&mut self) {
        self.ctx.latch = match self.ctx.prefix {
            Prefix::Index(index) | Prefix::IndexCb(index) => {
                let address = self
                    .index_value(index)
                    .wrapping_add_signed(i16::from(self.ctx.disp));
                self.regs.wz = address;
                address
            }
            _ => self.regs.hl(),
        };
    }
}

// Public register and pin access.
impl Z80 {
    #[must_use]
    pub const fn registers(&self) -> &Registers {
        &self.regs
    }

    /// Direct register access for loaders and debuggers.
    pub fn registers_mut(&mut self) -> &mut Registers {
        &mut self.regs
    }

    pub fn set_registers(&mut self, regs: Registers) {
        self.regs = regs;
        self.pins.halt = regs.halted;
    }

    #[must_use]
    pub const fn pc(&self) -> u16 {
        self.regs.pc
    }

    /// Set PC. Takes effect at the next opcode fetch.
    pub fn set_pc(&mut self, value: u16) {
        self.regs.pc = value;
    }

    #[must_use]
    pub const fn sp(&self) -> u16 {
        self.regs.sp
    }

    pub fn set_sp(&mut self, value: u16) {
        self.regs.sp = value;
    }

    #[must_use]
    pub const fn a(&self) -> u8 {
        self.regs.a
    }

    #[must_use]
    pub const fn f(&self) -> u8 {
        self.regs.f
    }

    #[must_use]
    pub const fn bc(&self) -> u16 {
        self.regs.bc()
    }

    #[must_use]
    pub const fn de(&self) -> u16 {
        self.regs.de()
    }

    #[must_use]
    pub const fn hl(&self) -> u16 {
        self.regs.hl()
    }

    #[must_use]
    pub const fn ix(&self) -> u16 {
        self.regs.ix
    }

    #[must_use]
    pub const fn iy(&self) -> u16 {
        self.regs.iy
    }

    #[must_use]
    pub const fn wz(&self) -> u16 {
        self.regs.wz
    }

    #[must_use]
    pub const fn pins(&self) -> Pins {
        self.pins
    }

    /// Drive the INT line. The CPU drops its copy when it acknowledges, so a
    /// device that still wants service must keep driving it.
    pub fn set_int(&mut self, level: bool) {
        self.pins.int = level;
    }

    /// Drive the NMI line. A rising edge latches a request.
    pub fn set_nmi(&mut self, level: bool) {
        if level && !self.pins.nmi {
            self.nmi_latched = true;
        }
        self.pins.nmi = level;
    }

    pub fn set_wait(&mut self, level: bool) {
        self.pins.wait = level;
    }

    pub fn set_busreq(&mut self, level: bool) {
        self.pins.busreq = level;
    }

    /// Drive RESET. While held the CPU stays in its power-on state.
    pub fn set_reset(&mut self, level: bool) {
        self.pins.reset = level;
    }

    /// HALT output.
    #[must_use]
    pub const fn halt(&self) -> bool {
        self.pins.halt
    }

    #[must_use]
    pub const fn busack(&self) -> bool {
        self.pins.busack
    }

    #[must_use]
    pub const fn m1(&self) -> bool {
        self.pins.m1
    }

    #[must_use]
    pub const fn is_halted(&self) -> bool {
        self.regs.halted
    }

    #[must_use]
    pub fn state(&self) -> CpuState {
        match self.ctx.sequence {
            Sequence::Nmi | Sequence::Interrupt => CpuState::ServicingInterrupt,
            _ if self.interrupt_pending() => CpuState::InterruptPending,
            _ if self.regs.halted => CpuState::Halted,
            _ => CpuState::Running,
        }
    }

    fn interrupt_pending(&self) -> bool {
        self.nmi_latched || (self.pins.int && self.regs.iff1 && !self.ei_delay)
    }

    #[must_use]
    pub const fn total_ticks(&self) -> Ticks {
        self.total_ticks
    }

    /// Instruction boundaries crossed so far, counted as in
    /// [`Z80::step_instruction`].
    #[must_use]
    pub const fn boundaries(&self) -> u64 {
        self.boundaries
    }

    /// The most recent bus transaction the CPU drove.
    #[must_use]
    pub const fn last_transaction(&self) -> Option<BusTransaction> {
        self.last_transaction
    }

    /// True on the first tick of a new instruction's opcode fetch.
    #[must_use]
    pub fn at_instruction_start(&self) -> bool {
        self.ctx.sequence == Sequence::Instruction
            && self.ctx.prefix == Prefix::None
            && self.ctx.t_state == 0
            && self.ctx.ops.current() == Some(MicroOp::Fetch)
    }
}

/// Internal latches exposed for state-loading test harnesses.
#[cfg(feature = "test-utils")]
impl Z80 {
    #[must_use]
    pub const fn q(&self) -> u8 {
        self.q
    }

    pub fn set_q(&mut self, q: u8) {
        self.q = q;
    }

    #[must_use]
    pub const fn ei_delay(&self) -> bool {
        self.ei_delay
    }

    pub fn set_ei_delay(&mut self, value: bool) {
        self.ei_delay = value;
    }

    #[must_use]
    pub const fn ld_a_ir(&self) -> bool {
        self.ld_a_ir
    }

    pub fn set_ld_a_ir(&mut self, value: bool) {
        self.ld_a_ir = value;
    }

    #[must_use]
    pub fn current_micro_op(&self) -> Option<MicroOp> {
        self.ctx.ops.current()
    }

    #[must_use]
    pub const fn t_state(&self) -> u8 {
        self.ctx.t_state
    }

    /// Pop PC off the stack immediately and restart at the fetch. Used by
    /// CP/M harnesses to return from an intercepted BDOS call.
    pub fn force_ret<B: Bus>(&mut self, bus: &mut B) {
        let lo = bus.read(u32::from(self.regs.sp)).data;
        let hi = bus.read(u32::from(self.regs.sp.wrapping_add(1))).data;
        self.regs.sp = self.regs.sp.wrapping_add(2);
        self.jump(u16::from_le_bytes([lo, hi]));
        self.ctx.start(Sequence::Instruction);
        self.ctx.ops.push(MicroOp::Fetch);
    }
}

impl Cpu for Z80 {
    type Registers = Registers;

    fn tick<B: Bus>(&mut self, bus: &mut B) {
        Z80::tick(self, bus);
    }

    fn pc(&self) -> u32 {
        u32::from(self.regs.pc)
    }

    fn registers(&self) -> Registers {
        self.regs
    }

    fn is_halted(&self) -> bool {
        self.regs.halted
    }

    fn interrupt(&mut self) -> bool {
        self.pins.int = true;
        self.regs.iff1
    }

    fn nmi(&mut self) {
        self.nmi_latched = true;
    }

    fn reset(&mut self) {
        Z80::reset(self);
    }

    fn pins(&self) -> Pins {
        self.pins
    }

    fn total_ticks(&self) -> Ticks {
        self.total_ticks
    }
}

impl Observable for Z80 {
    fn query(&self, path: &str) -> Option<Value> {
        let r = &self.regs;
        let flag = |bit: u8| Some(Value::Bool(r.f & bit != 0));
        match path {
            "a" => Some(r.a.into()),
            "f" => Some(r.f.into()),
            "b" => Some(r.b.into()),
            "c" => Some(r.c.into()),
            "d" => Some(r.d.into()),
            "e" => Some(r.e.into()),
            "h" => Some(r.h.into()),
            "l" => Some(r.l.into()),
            "af" => Some(r.af().into()),
            "bc" => Some(r.bc().into()),
            "de" => Some(r.de().into()),
            "hl" => Some(r.hl().into()),
            "af'" => Some(r.af_alt().into()),
            "bc'" => Some(r.bc_alt().into()),
            "de'" => Some(r.de_alt().into()),
            "hl'" => Some(r.hl_alt().into()),
            "ix" => Some(r.ix.into()),
            "iy" => Some(r.iy.into()),
            "sp" => Some(r.sp.into()),
            "pc" => Some(r.pc.into()),
            "i" => Some(r.i.into()),
            "r" => Some(r.r.into()),
            "wz" => Some(r.wz.into()),

            "flags.s" => flag(SF),
            "flags.z" => flag(ZF),
            "flags.y" => flag(YF),
            "flags.h" => flag(HF),
            "flags.x" => flag(XF),
            "flags.p" => flag(PF),
            "flags.n" => flag(NF),
            "flags.c" => flag(CF),

            "iff1" => Some(r.iff1.into()),
            "iff2" => Some(r.iff2.into()),
            "im" => Some(r.im.into()),
            "halted" => Some(r.halted.into()),
            "ei_delay" => Some(self.ei_delay.into()),
            "nmi_latched" => Some(self.nmi_latched.into()),
            "q" => Some(self.q.into()),
            "state" => Some(format!("{:?}", self.state()).into()),

            "pins.int" => Some(self.pins.int.into()),
            "pins.nmi" => Some(self.pins.nmi.into()),
            "pins.wait" => Some(self.pins.wait.into()),
            "pins.reset" => Some(self.pins.reset.into()),
            "pins.busreq" => Some(self.pins.busreq.into()),
            "pins.busack" => Some(self.pins.busack.into()),
            "pins.halt" => Some(self.pins.halt.into()),
            "pins.m1" => Some(self.pins.m1.into()),

            "opcode" => Some(self.ctx.opcode.into()),
            "prefix" => Some(self.ctx.prefix.code().into()),
            "t_state" => Some(self.ctx.t_state.into()),
            "stage" => Some(self.ctx.stage.into()),
            "queued" => Some(self.ctx.ops.remaining().into()),
            "cycles" => Some(self.cycles.into()),
            "total_ticks" => Some(self.total_ticks.get().into()),
            _ => None,
        }
    }

    fn query_paths(&self) -> &'static [&'static str] {
        &[
            "a", "f", "b", "c", "d", "e", "h", "l", "af", "bc", "de", "hl", "af'", "bc'",
            "de'", "hl'", "ix", "iy", "sp", "pc", "i", "r", "wz", "flags.s", "flags.z",
            "flags.y", "flags.h", "flags.x", "flags.p", "flags.n", "flags.c", "iff1", "iff2",
            "im", "halted", "ei_delay", "nmi_latched", "q", "state", "pins.int", "pins.nmi",
            "pins.wait", "pins.reset", "pins.busreq", "pins.busack", "pins.halt", "pins.m1",
            "opcode", "prefix", "t_state", "stage", "queued", "cycles", "total_ticks",
        ]
    }
}
