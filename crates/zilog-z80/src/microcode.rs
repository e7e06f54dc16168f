//! Machine-cycle vocabulary for the Z80.
//!
//! An instruction is a short queue of machine cycles. Bus cycles take a fixed
//! number of T-states, `Internal` carries its own length, and `Exec` is a
//! zero-length continuation marker: when the queue reaches it the CPU runs the
//! named stage of the current instruction, which may queue further cycles.

/// Where a memory cycle gets its address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Addr {
    /// PC, incremented after the access.
    Pc,
    /// The address latch.
    Latch,
    /// The address latch plus one (second byte of a word).
    LatchNext,
    /// SP, incremented after the access (POP, RET).
    Pop,
    /// SP, decremented before the access (PUSH, CALL).
    Push,
}

/// Which context latch a memory cycle reads into or writes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Lo,
    Hi,
    Disp,
    Opcode,
}

/// One machine cycle (or continuation marker).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MicroOp {
    /// M1 opcode fetch: 4 T-states, refresh counter steps.
    Fetch,
    /// Memory read: 3 T-states.
    Read(Addr, Slot),
    /// Memory write: 3 T-states.
    Write(Addr, Slot),
    /// I/O read from the port in the address latch into `Lo`: 4 T-states.
    In,
    /// I/O write of `Lo` to the port in the address latch: 4 T-states.
    Out,
    /// Interrupt acknowledge (M1 with IORQ, two automatic waits): 6 T-states.
    IntAck,
    /// Internal cycle of the given length; no bus activity.
    Internal(u8),
    /// Run continuation stage `n` of the current instruction.
    Exec(u8),
}

impl MicroOp {
    /// Length in T-states, excluding inserted waits.
    #[must_use]
    pub const fn t_states(self) -> u8 {
        match self {
            Self::Fetch | Self::In | Self::Out => 4,
            Self::Read(..) | Self::Write(..) => 3,
            Self::IntAck => 6,
            Self::Internal(n) => n,
            Self::Exec(_) => 0,
        }
    }

    /// T-state on which WAIT is sampled; a wait state repeats it.
    #[must_use]
    pub const fn wait_sample(self) -> Option<u8> {
        match self {
            Self::Fetch | Self::Read(..) | Self::Write(..) => Some(1),
            Self::In | Self::Out => Some(2),
            Self::IntAck => Some(3),
            Self::Internal(_) | Self::Exec(_) => None,
        }
    }

    /// T-state on which data crosses the bus.
    #[must_use]
    pub const fn transfer_state(self) -> Option<u8> {
        match self {
            Self::Fetch | Self::Read(..) | Self::Write(..) => Some(2),
            Self::In | Self::Out => Some(3),
            Self::IntAck => Some(4),
            Self::Internal(_) | Self::Exec(_) => None,
        }
    }
}

const CAPACITY: usize = 16;

/// Fixed-capacity queue of the cycles remaining in the current instruction.
#[derive(Debug, Clone)]
pub struct MicroOpQueue {
    ops: [MicroOp; CAPACITY],
    len: u8,
    pos: u8,
}

impl Default for MicroOpQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl MicroOpQueue {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ops: [MicroOp::Fetch; CAPACITY],
            len: 0,
            pos: 0,
        }
    }

    pub fn clear(&mut self) {
        self.len = 0;
        self.pos = 0;
    }

    /// Append a cycle. Zero-length internal cycles are dropped.
    pub fn push(&mut self, op: MicroOp) {
        if op == MicroOp::Internal(0) {
            return;
        }
        debug_assert!((self.len as usize) < CAPACITY, "micro-op queue overflow");
        if (self.len as usize) < CAPACITY {
            self.ops[self.len as usize] = op;
            self.len += 1;
        }
    }

    #[must_use]
    pub fn current(&self) -> Option<MicroOp> {
        (self.pos < self.len).then(|| self.ops[self.pos as usize])
    }

    pub fn advance(&mut self) {
        if self.pos < self.len {
            self.pos += 1;
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pos >= self.len
    }

    /// Cycles still queued, current one included.
    #[must_use]
    pub fn remaining(&self) -> u8 {
        self.len - self.pos
    }
}
