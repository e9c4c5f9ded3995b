use crate::bits::{self, BitField};
use std::fmt;

/// System Control Block base address.
pub const SCB_BASE: u32 = 0xE000_ED00;

/// Fault status word (CFSR, `FAULTSTAT` on Stellaris parts).
pub const FAULT_STATUS_ADDR: u32 = SCB_BASE + 0x28;
/// Memory management fault address, valid while `MMARV` is set.
pub const MEM_FAULT_ADDR: u32 = SCB_BASE + 0x34;
/// Bus fault address, valid while `BFARV` is set.
pub const BUS_FAULT_ADDR: u32 = SCB_BASE + 0x38;

/// Layout of the fault status word, LSB first.
///
/// Bits 0..8 are the memory management flags, 8..16 the bus fault flags and
/// 16..32 the usage fault flags.
pub const FAULT_STATUS_FIELDS: [BitField; 22] = [
    BitField::new("IERR", 0, 1),
    BitField::new("DERR", 1, 1),
    BitField::new("_reserved0", 2, 1),
    BitField::new("MUSTKE", 3, 1),
    BitField::new("MSTKE", 4, 1),
    BitField::new("_reserved1", 5, 2),
    BitField::new("MMARV", 7, 1),
    BitField::new("IBUS", 8, 1),
    BitField::new("PRECISE", 9, 1),
    BitField::new("IMPRE", 10, 1),
    BitField::new("BUSTKE", 11, 1),
    BitField::new("BSTKE", 12, 1),
    BitField::new("_reserved2", 13, 2),
    BitField::new("BFARV", 15, 1),
    BitField::new("UNDEF", 16, 1),
    BitField::new("INVSTAT", 17, 1),
    BitField::new("INVPC", 18, 1),
    BitField::new("NOCP", 19, 1),
    BitField::new("_reserved3", 20, 4),
    BitField::new("UNALIGN", 24, 1),
    BitField::new("DIV0", 25, 1),
    BitField::new("_reserved4", 26, 6),
];

bitflags::bitflags! {
    /// Defined bits of the fault status word.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FaultFlags: u32 {
        // Memory management
        const IERR = 1 << 0;
        const DERR = 1 << 1;
        const MUSTKE = 1 << 3;
        const MSTKE = 1 << 4;
        const MMARV = 1 << 7;

        // Bus fault
        const IBUS = 1 << 8;
        const PRECISE = 1 << 9;
        const IMPRE = 1 << 10;
        const BUSTKE = 1 << 11;
        const BSTKE = 1 << 12;
        const BFARV = 1 << 15;

        // Usage fault
        const UNDEF = 1 << 16;
        const INVSTAT = 1 << 17;
        const INVPC = 1 << 18;
        const NOCP = 1 << 19;
        const UNALIGN = 1 << 24;
        const DIV0 = 1 << 25;
    }
}

/// Which of the three fault sub-registers a flag belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultClass {
    MemManage,
    Bus,
    Usage,
}

impl FaultClass {
    pub const fn mask(self) -> u32 {
        match self {
            FaultClass::MemManage => 0x0000_00FF,
            FaultClass::Bus => 0x0000_FF00,
            FaultClass::Usage => 0xFFFF_0000,
        }
    }
}

/// Read-only view of a raw fault status word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FaultStatus(u32);

impl FaultStatus {
    pub const fn from_bits(word: u32) -> Self {
        Self(word)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub fn flags(self) -> FaultFlags {
        FaultFlags::from_bits_truncate(self.0)
    }

    /// Value of a named field, or `None` if no such field exists.
    pub fn field(self, name: &str) -> Option<u32> {
        bits::find(&FAULT_STATUS_FIELDS, name).map(|f| f.extract(self.0))
    }

    /// Names of every defined flag that is set, in bit order.
    pub fn set_flags(self) -> Vec<&'static str> {
        FAULT_STATUS_FIELDS
            .iter()
            .filter(|f| !f.is_reserved() && f.extract(self.0) != 0)
            .map(|f| f.name)
            .collect()
    }

    /// Sub-registers with at least one flag raised.
    pub fn classes(self) -> Vec<FaultClass> {
        [FaultClass::MemManage, FaultClass::Bus, FaultClass::Usage]
            .into_iter()
            .filter(|c| self.0 & c.mask() & FaultFlags::all().bits() != 0)
            .collect()
    }

    /// Bits set inside reserved ranges. Nonzero means the word is garbage.
    pub fn reserved_bits(self) -> u32 {
        self.0 & bits::reserved_mask(&FAULT_STATUS_FIELDS)
    }

    pub fn mem_fault_addr_valid(self) -> bool {
        self.flags().contains(FaultFlags::MMARV)
    }

    pub fn bus_fault_addr_valid(self) -> bool {
        self.flags().contains(FaultFlags::BFARV)
    }
}

impl fmt::Display for FaultStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FAULTSTAT={:#010x}", self.0)?;
        let set = self.set_flags();
        if set.is_empty() {
            write!(f, " (no fault flags)")
        } else {
            write!(f, " [{}]", set.join(" | "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_tiles_word() {
        assert!(bits::is_contiguous(&FAULT_STATUS_FIELDS));
        let total: u32 = FAULT_STATUS_FIELDS.iter().map(|f| f.width).sum();
        assert_eq!(total, 32);
    }

    #[test]
    fn test_flags_match_field_table() {
        for field in FAULT_STATUS_FIELDS.iter().filter(|f| !f.is_reserved()) {
            let flag = FaultFlags::from_name(field.name).expect(field.name);
            assert_eq!(flag.bits(), field.mask(), "{}", field.name);
        }
        let defined = FAULT_STATUS_FIELDS
            .iter()
            .filter(|f| !f.is_reserved())
            .fold(0, |acc, f| acc | f.mask());
        assert_eq!(FaultFlags::all().bits(), defined);
        assert_eq!(defined & bits::reserved_mask(&FAULT_STATUS_FIELDS), 0);
    }

    #[test]
    fn test_register_addresses() {
        assert_eq!(FAULT_STATUS_ADDR, 0xE000_ED28);
        assert_eq!(MEM_FAULT_ADDR, 0xE000_ED34);
        assert_eq!(BUS_FAULT_ADDR, 0xE000_ED38);
    }

    #[test]
    fn test_precise_bus_fault() {
        let status = FaultStatus::from_bits(0x0000_8200);
        assert_eq!(status.set_flags(), vec!["PRECISE", "BFARV"]);
        assert!(status.bus_fault_addr_valid());
        assert!(!status.mem_fault_addr_valid());
        assert_eq!(status.classes(), vec![FaultClass::Bus]);
        assert_eq!(status.field("PRECISE"), Some(1));
        assert_eq!(status.field("IBUS"), Some(0));
        assert_eq!(status.field("BOGUS"), None);
    }

    #[test]
    fn test_usage_fault_divide_by_zero() {
        let status = FaultStatus::from_bits(1 << 25);
        assert!(status.flags().contains(FaultFlags::DIV0));
        assert_eq!(status.classes(), vec![FaultClass::Usage]);
        assert_eq!(
            status.to_string(),
            "FAULTSTAT=0x02000000 [DIV0]"
        );
    }

    #[test]
    fn test_reserved_bits_reported() {
        let status = FaultStatus::from_bits(0x0000_0004 | 0x8000_0000);
        assert_eq!(status.reserved_bits(), 0x8000_0004);
        assert!(status.set_flags().is_empty());
        assert!(status.classes().is_empty());
        assert_eq!(status.field("_reserved4"), Some(0b10_0000));
    }

    #[test]
    fn test_clear_word() {
        let status = FaultStatus::default();
        assert_eq!(status.to_string(), "FAULTSTAT=0x00000000 (no fault flags)");
    }
}
