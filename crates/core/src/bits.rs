//! Named bit ranges inside a 32-bit register word.
//!
//! Register views in this crate never rely on struct layout. Each field is a
//! `(name, offset, width)` constant, and the same table drives both host-side
//! decoding and the C bitfield declarations written into the artifact.

/// A named run of `width` bits starting at bit `offset` (LSB = bit 0).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitField {
    pub name: &'static str,
    pub offset: u32,
    pub width: u32,
}

impl BitField {
    pub const fn new(name: &'static str, offset: u32, width: u32) -> Self {
        Self {
            name,
            offset,
            width,
        }
    }

    pub const fn mask(&self) -> u32 {
        (((1u64 << self.width) - 1) as u32) << self.offset
    }

    pub const fn extract(&self, word: u32) -> u32 {
        (word & self.mask()) >> self.offset
    }

    /// Padding fields are named `_reservedN`.
    pub fn is_reserved(&self) -> bool {
        self.name.starts_with("_reserved")
    }
}

/// True if `fields` tile a 32-bit word exactly: in ascending order, starting
/// at bit 0, with no gaps or overlaps.
pub fn is_contiguous(fields: &[BitField]) -> bool {
    let mut next = 0u32;
    for f in fields {
        if f.width == 0 || f.offset != next {
            return false;
        }
        next += f.width;
    }
    next == 32
}

pub fn find(fields: &[BitField], name: &str) -> Option<BitField> {
    fields.iter().copied().find(|f| f.name == name)
}

/// Mask covering every reserved field in `fields`.
pub fn reserved_mask(fields: &[BitField]) -> u32 {
    fields
        .iter()
        .filter(|f| f.is_reserved())
        .fold(0, |acc, f| acc | f.mask())
}
