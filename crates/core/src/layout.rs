//! Resolves a chip identifier into its ordered vector sequence.

use crate::{GenResult, GenerateError};
use cm3gen_config::ChipProfile;

pub use cm3gen_config::arch::PROCESSOR_EXCEPTIONS;

/// Table slot holding peripheral IRQ 0: the stack pointer slot plus one slot
/// per processor exception.
pub const FIRST_IRQ_SLOT: usize = PROCESSOR_EXCEPTIONS.len() + 1;

/// Processor exceptions followed by a chip's peripheral interrupts.
///
/// Entry `i` lives in hardware slot `i + 1`; slot 0 is the initial stack
/// pointer and has no name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VectorSequence {
    chip: String,
    names: Vec<String>,
}

impl VectorSequence {
    pub fn chip(&self) -> &str {
        &self.chip
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn interrupt_count(&self) -> usize {
        self.names.len() - PROCESSOR_EXCEPTIONS.len()
    }

    /// Name held in hardware slot `slot`.
    pub fn slot(&self, slot: usize) -> Option<&str> {
        slot.checked_sub(1)
            .and_then(|i| self.names.get(i))
            .map(String::as_str)
    }

    /// Name of peripheral IRQ `irq`.
    pub fn irq(&self, irq: usize) -> Option<&str> {
        self.slot(FIRST_IRQ_SLOT + irq)
    }

    /// `(slot, name)` pairs in table order, starting at slot 1.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> + '_ {
        self.names
            .iter()
            .enumerate()
            .map(|(i, name)| (i + 1, name.as_str()))
    }
}

/// Looks up a builtin chip and returns its vector sequence.
///
/// Fails before anything is emitted if the chip is not compiled in.
pub fn resolve(chip_id: &str) -> GenResult<VectorSequence> {
    let profile = cm3gen_config::load_builtin(chip_id)
        .map_err(|e| GenerateError::InvalidProfile {
            chip: chip_id.to_string(),
            reason: format!("{:#}", e),
        })?
        .ok_or_else(|| GenerateError::UnknownChip(chip_id.to_string()))?;

    let seq = resolve_profile(&profile);
    tracing::debug!(
        "Resolved {}: {} processor exceptions + {} interrupts",
        seq.chip(),
        PROCESSOR_EXCEPTIONS.len(),
        seq.interrupt_count()
    );
    Ok(seq)
}

pub fn resolve_profile(profile: &ChipProfile) -> VectorSequence {
    let names = PROCESSOR_EXCEPTIONS
        .iter()
        .map(|s| s.to_string())
        .chain(profile.interrupts.iter().cloned())
        .collect();

    VectorSequence {
        chip: profile.name.clone(),
        names,
    }
}

/// Supported chip identifiers, sorted.
pub fn known_chips() -> Vec<&'static str> {
    cm3gen_config::known_chips().collect()
}
