pub mod bits;
pub mod cpu;
pub mod emit;
pub mod layout;
pub mod peripherals;


pub use emit::{EmitOptions, Emitter, TrapStyle};
pub use layout::{resolve, VectorSequence};

#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    #[error("Unknown chip '{0}'")]
    UnknownChip(String),
    #[error("No chip identifier supplied")]
    MissingArgument,
    #[error("Chip profile '{chip}' is invalid: {reason}")]
    InvalidProfile { chip: String, reason: String },
}

pub type GenResult<T> = Result<T, GenerateError>;

/// Resolves `chip_id` and renders the full C artifact.
///
/// Resolution finishes before rendering starts, so an error never comes with
/// partial output.
pub fn generate(chip_id: &str, options: &EmitOptions) -> GenResult<String> {
    let seq = layout::resolve(chip_id)?;
    let artifact = Emitter::new(&seq, *options).render();
    tracing::info!(
        "Generated {} vector table ({} entries, {} bytes of output)",
        seq.chip(),
        seq.len() + 1,
        artifact.len()
    );
    Ok(artifact)
}
