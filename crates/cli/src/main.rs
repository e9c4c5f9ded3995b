use clap::builder::PossibleValuesParser;
use clap::{CommandFactory, Parser, ValueEnum};
use cm3gen_core::cpu::ExceptionFrame;
use cm3gen_core::peripherals::scb::FaultStatus;
use cm3gen_core::{EmitOptions, Emitter, GenerateError, TrapStyle};
use std::io::Write;
use std::process::ExitCode;
use tracing::{debug, error, info};

const EXIT_GENERATE_ERROR: u8 = 1;
const EXIT_USAGE: u8 = 2;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Format {
    /// C source with the vector table and weak handlers
    C,
    /// Slot-by-slot vector map
    Json,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Trap {
    /// Latch fault status and the stacked frame, then halt
    Inspect,
    /// Halt immediately
    Halt,
}

impl From<Trap> for TrapStyle {
    fn from(t: Trap) -> Self {
        match t {
            Trap::Inspect => TrapStyle::Inspect,
            Trap::Halt => TrapStyle::Halt,
        }
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Cortex-M3 vector table generator", long_about = None)]
struct Args {
    /// Target chip
    #[arg(value_parser = PossibleValuesParser::new(cm3gen_config::known_chips()))]
    chip: Option<String>,

    /// Output format
    #[arg(long, value_enum, default_value_t = Format::C)]
    format: Format,

    /// Behaviour of the default trap handler
    #[arg(long, value_enum, default_value_t = Trap::Inspect)]
    trap: Trap,

    /// List supported chips and exit
    #[arg(long)]
    list_chips: bool,

    /// Decode a raw FAULTSTAT word (hex with 0x prefix, or decimal)
    #[arg(long, value_name = "WORD", value_parser = parse_word)]
    decode_fault: Option<u32>,

    /// Decode a stacked exception frame: r0,r1,r2,r3,r12,lr,pc,xpsr
    #[arg(long, value_name = "WORDS", value_parser = parse_word, value_delimiter = ',')]
    decode_frame: Option<Vec<u32>>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn parse_word(s: &str) -> Result<u32, String> {
    let s = s.trim();
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(&hex.replace('_', ""), 16),
        None => s.parse::<u32>(),
    };
    parsed.map_err(|e| format!("invalid 32-bit word '{}': {}", s, e))
}

fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();

    // Logs go to stderr; stdout carries only the artifact.
    if args.verbose {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .with_writer(std::io::stderr)
            .init();
    }

    let mut stdout = std::io::stdout().lock();

    if args.list_chips {
        for id in cm3gen_config::known_chips() {
            if let Some(profile) = cm3gen_config::load_builtin(id)? {
                writeln!(
                    stdout,
                    "{:<12} {:>3} interrupts  {}",
                    id,
                    profile.interrupts.len(),
                    profile.description
                )?;
            }
        }
        return Ok(ExitCode::SUCCESS);
    }

    let decoding = args.decode_fault.is_some() || args.decode_frame.is_some();

    if let Some(word) = args.decode_fault {
        let status = FaultStatus::from_bits(word);
        writeln!(stdout, "{}", status)?;
        if status.reserved_bits() != 0 {
            writeln!(
                stdout,
                "warning: reserved bits set: {:#010x}",
                status.reserved_bits()
            )?;
        }
        for class in status.classes() {
            writeln!(stdout, "  {:?} fault", class)?;
        }
        if status.mem_fault_addr_valid() {
            writeln!(stdout, "  memory fault address register is valid")?;
        }
        if status.bus_fault_addr_valid() {
            writeln!(stdout, "  bus fault address register is valid")?;
        }
    }

    if let Some(words) = &args.decode_frame {
        let Ok(words) = <[u32; 8]>::try_from(words.as_slice()) else {
            eprintln!(
                "error: --decode-frame expects 8 words (r0,r1,r2,r3,r12,lr,pc,xpsr), got {}",
                words.len()
            );
            return Ok(ExitCode::from(EXIT_USAGE));
        };
        writeln!(stdout, "{}", ExceptionFrame::from_words(words))?;
    }

    let Some(chip) = args.chip else {
        if decoding {
            return Ok(ExitCode::SUCCESS);
        }
        eprintln!("error: {}\n", GenerateError::MissingArgument);
        Args::command().write_help(&mut std::io::stderr())?;
        return Ok(ExitCode::from(EXIT_USAGE));
    };

    let options = EmitOptions {
        trap: args.trap.into(),
    };
    debug!("Emit options: {:?}, format: {:?}", options, args.format);

    let output = match args.format {
        Format::C => cm3gen_core::generate(&chip, &options),
        Format::Json => match cm3gen_core::resolve(&chip) {
            Ok(seq) => {
                info!("Resolved {} ({} vectors)", seq.chip(), seq.len());
                Ok(Emitter::new(&seq, options).render_json()? + "\n")
            }
            Err(e) => Err(e),
        },
    };

    let text = match output {
        Ok(text) => text,
        Err(e) => {
            error!("{}", e);
            return Ok(ExitCode::from(EXIT_GENERATE_ERROR));
        }
    };

    stdout.write_all(text.as_bytes())?;
    stdout.flush()?;
    Ok(ExitCode::SUCCESS)
}
