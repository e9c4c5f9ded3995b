//! Register state the Cortex-M3 pushes on exception entry.

use crate::bits::{self, BitField};
use std::fmt;

/// Stacked words in push order, lowest address first.
pub const FRAME_REGISTERS: [&str; 8] = ["r0", "r1", "r2", "r3", "r12", "lr", "pc", "xPSR"];

/// Size of the basic (non-FPU) frame in bytes.
pub const FRAME_SIZE: usize = FRAME_REGISTERS.len() * 4;

/// Layout of the stacked xPSR, LSB first.
///
/// The if-then state is split: `ICI_IT0` carries IT[7:2] and `ICI_IT1`
/// carries IT[1:0].
pub const XPSR_FIELDS: [BitField; 11] = [
    BitField::new("ISRNUM", 0, 7),
    BitField::new("_reserved0", 7, 3),
    BitField::new("ICI_IT0", 10, 6),
    BitField::new("_reserved1", 16, 8),
    BitField::new("THUMB", 24, 1),
    BitField::new("ICI_IT1", 25, 2),
    BitField::new("Q", 27, 1),
    BitField::new("V", 28, 1),
    BitField::new("C", 29, 1),
    BitField::new("Z", 30, 1),
    BitField::new("N", 31, 1),
];

const fn field(idx: usize) -> BitField {
    XPSR_FIELDS[idx]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Xpsr(u32);

impl Xpsr {
    pub const fn from_bits(word: u32) -> Self {
        Self(word)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Exception number active when the frame was pushed (0 = thread mode).
    pub const fn isr_number(self) -> u32 {
        field(0).extract(self.0)
    }

    pub const fn thumb(self) -> bool {
        field(4).extract(self.0) != 0
    }

    /// Reassembled IT[7:0] / ICI state.
    pub const fn it_state(self) -> u32 {
        (field(2).extract(self.0) << 2) | field(5).extract(self.0)
    }

    pub const fn q(self) -> bool {
        field(6).extract(self.0) != 0
    }

    pub const fn v(self) -> bool {
        field(7).extract(self.0) != 0
    }

    pub const fn c(self) -> bool {
        field(8).extract(self.0) != 0
    }

    pub const fn z(self) -> bool {
        field(9).extract(self.0) != 0
    }

    pub const fn n(self) -> bool {
        field(10).extract(self.0) != 0
    }

    pub fn field(self, name: &str) -> Option<u32> {
        bits::find(&XPSR_FIELDS, name).map(|f| f.extract(self.0))
    }
}

impl fmt::Display for Xpsr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flag = |set: bool, c: char| if set { c } else { '-' };
        write!(
            f,
            "{:#010x} [{}{}{}{}{}] isr={} it={:#04x}{}",
            self.0,
            flag(self.n(), 'N'),
            flag(self.z(), 'Z'),
            flag(self.c(), 'C'),
            flag(self.v(), 'V'),
            flag(self.q(), 'Q'),
            self.isr_number(),
            self.it_state(),
            if self.thumb() { "" } else { " (T clear)" }
        )
    }
}

/// Snapshot of the hardware-stacked registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExceptionFrame {
    pub r0: u32,
    pub r1: u32,
    pub r2: u32,
    pub r3: u32,
    pub r12: u32,
    pub lr: u32,
    pub pc: u32,
    pub xpsr: Xpsr,
}

impl ExceptionFrame {
    /// Builds a frame from words read at the stacked SP, in push order.
    pub const fn from_words(w: [u32; 8]) -> Self {
        Self {
            r0: w[0],
            r1: w[1],
            r2: w[2],
            r3: w[3],
            r12: w[4],
            lr: w[5],
            pc: w[6],
            xpsr: Xpsr::from_bits(w[7]),
        }
    }

    pub const fn words(&self) -> [u32; 8] {
        [
            self.r0,
            self.r1,
            self.r2,
            self.r3,
            self.r12,
            self.lr,
            self.pc,
            self.xpsr.bits(),
        ]
    }
}

impl fmt::Display for ExceptionFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let words = self.words();
        for (name, value) in FRAME_REGISTERS.iter().zip(words.iter()).take(7) {
            writeln!(f, "{:>4} = {:#010x}", name, value)?;
        }
        write!(f, "xPSR = {}", self.xpsr)
    }
}
