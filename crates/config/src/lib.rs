use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Architecture-level constants shared by every chip of the family.
pub mod arch {
    /// The only architecture chip profiles may target.
    pub const CORTEX_M3: &str = "cortex-m3";

    /// Processor exceptions occupying vector slots 1..=15, in hardware order.
    ///
    /// Slot 0 holds the initial stack pointer and is not listed. The four
    /// `reserved_*` entries are named after the slot they occupy.
    pub const PROCESSOR_EXCEPTIONS: [&str; 14] = [
        "reset",
        "nmi",
        "hard_fault",
        "memmanage",
        "bus_fault",
        "usage_fault",
        "reserved_7",
        "reserved_8",
        "reserved_9",
        "reserved_10",
        "svcall",
        "debug",
        "pendsv",
        "systick",
    ];
}

/// Interrupt layout of a single chip.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ChipProfile {
    pub name: String,
    pub arch: String, // e.g. "cortex-m3"
    #[serde(default)]
    pub description: String,
    /// Peripheral interrupts in NVIC order: entry N is IRQ N.
    pub interrupts: Vec<String>,
}

struct BuiltinChip {
    id: &'static str,
    source: &'static str,
}

// Kept sorted by id.
const BUILTIN_CHIPS: &[BuiltinChip] = &[
    BuiltinChip {
        id: "lm3s6965",
        source: include_str!("../chips/lm3s6965.yaml"),
    },
    BuiltinChip {
        id: "lm3s9d96",
        source: include_str!("../chips/lm3s9d96.yaml"),
    },
];

/// Identifiers of every chip compiled into this build, in sorted order.
pub fn known_chips() -> impl Iterator<Item = &'static str> {
    BUILTIN_CHIPS.iter().map(|c| c.id)
}

pub fn is_known(id: &str) -> bool {
    BUILTIN_CHIPS.iter().any(|c| c.id == id)
}

/// Loads and validates a builtin profile. `Ok(None)` means the id is unknown.
pub fn load_builtin(id: &str) -> Result<Option<ChipProfile>> {
    let Some(chip) = BUILTIN_CHIPS.iter().find(|c| c.id == id) else {
        return Ok(None);
    };

    let profile = ChipProfile::from_yaml(chip.source)
        .with_context(|| format!("Builtin chip profile '{}' is invalid", id))?;
    if profile.name != chip.id {
        anyhow::bail!(
            "Builtin chip profile '{}' declares name '{}'",
            chip.id,
            profile.name
        );
    }

    tracing::debug!(
        "Loaded chip profile {} ({} interrupts)",
        profile.name,
        profile.interrupts.len()
    );
    Ok(Some(profile))
}

impl ChipProfile {
    pub fn from_yaml(src: &str) -> Result<Self> {
        let profile: Self =
            serde_yaml::from_str(src).context("Failed to parse Chip Profile YAML")?;
        profile.validate()?;
        Ok(profile)
    }

    pub fn validate(&self) -> Result<()> {
        if self.arch != arch::CORTEX_M3 {
            anyhow::bail!(
                "Unsupported arch '{}'. Supported architectures: '{}'",
                self.arch,
                arch::CORTEX_M3
            );
        }

        if !is_c_identifier(&self.name.replace('-', "_")) {
            anyhow::bail!("Chip name '{}' is not a valid identifier", self.name);
        }

        let mut seen = HashSet::new();
        for (irq, name) in self.interrupts.iter().enumerate() {
            if !is_c_identifier(name) {
                anyhow::bail!(
                    "Interrupt {} name '{}' is not a lowercase C identifier",
                    irq,
                    name
                );
            }
            if arch::PROCESSOR_EXCEPTIONS.contains(&name.as_str()) {
                anyhow::bail!(
                    "Interrupt {} name '{}' collides with a processor exception",
                    irq,
                    name
                );
            }
            if !seen.insert(name.as_str()) {
                anyhow::bail!("Interrupt name '{}' appears more than once", name);
            }
        }

        Ok(())
    }
}

fn is_c_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c == '_' || c.is_ascii_lowercase() => {}
        _ => return false,
    }
    chars.all(|c| c == '_' || c.is_ascii_lowercase() || c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_profiles_load() {
        for id in known_chips() {
            let profile = load_builtin(id).unwrap().unwrap();
            assert_eq!(profile.name, id);
            assert_eq!(profile.arch, "cortex-m3");
            assert!(!profile.interrupts.is_empty());
        }
    }

    #[test]
    fn test_builtin_interrupt_counts() {
        let lm3s9d96 = load_builtin("lm3s9d96").unwrap().unwrap();
        assert_eq!(lm3s9d96.interrupts.len(), 55);
        assert_eq!(lm3s9d96.interrupts[0], "gpio_a");
        assert_eq!(lm3s9d96.interrupts[41], "reserved_57");
        assert_eq!(lm3s9d96.interrupts[54], "gpio_j");

        let lm3s6965 = load_builtin("lm3s6965").unwrap().unwrap();
        assert_eq!(lm3s6965.interrupts.len(), 44);
        assert_eq!(lm3s6965.interrupts[42], "ethernet");
    }

    #[test]
    fn test_known_chips_sorted() {
        let ids: Vec<_> = known_chips().collect();
        let mut sorted = ids.clone();
        sorted.sort_unstable();
        assert_eq!(ids, sorted);
        assert!(is_known("lm3s9d96"));
        assert!(!is_known("stm32f103"));
    }

    #[test]
    fn test_unknown_chip_is_none() {
        assert!(load_builtin("stm32f103").unwrap().is_none());
    }

    #[test]
    fn test_duplicate_interrupt() {
        let yaml = r#"
name: dup
arch: cortex-m3
interrupts: [gpio_a, uart_0, gpio_a]
"#;
        let err = ChipProfile::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn test_processor_exception_collision() {
        let yaml = r#"
name: clash
arch: cortex-m3
interrupts: [gpio_a, systick]
"#;
        let err = ChipProfile::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("processor exception"));
    }

    #[test]
    fn test_invalid_identifier() {
        let yaml = r#"
name: bad
arch: cortex-m3
interrupts: ["2uart", "Gpio"]
"#;
        let err = ChipProfile::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("'2uart'"));
    }

    #[test]
    fn test_unsupported_arch() {
        let yaml = r#"
name: m0
arch: cortex-m0
interrupts: [gpio_a]
"#;
        let err = ChipProfile::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("Unsupported arch"));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let yaml = r#"
name: extra
arch: cortex-m3
interrupts: [gpio_a]
flash_size: 256KB
"#;
        assert!(ChipProfile::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_identifier_rules() {
        assert!(is_c_identifier("adc_0_sequence_3"));
        assert!(is_c_identifier("_private"));
        assert!(!is_c_identifier(""));
        assert!(!is_c_identifier("uart-0"));
        assert!(!is_c_identifier("UART0"));
    }
}
