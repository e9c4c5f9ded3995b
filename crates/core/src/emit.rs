//! Renders a vector sequence into the C startup artifact.
//!
//! Every vector gets a weak handler declaration aliased to the shared
//! default trap, and a table entry pointing at that handler. Linking a strong
//! definition of `<name>_handler` anywhere in the image overrides the alias.

use crate::bits::{self, BitField};
use crate::cpu::{FRAME_REGISTERS, XPSR_FIELDS};
use crate::layout::{VectorSequence, FIRST_IRQ_SLOT};
use crate::peripherals::scb::{
    BUS_FAULT_ADDR, FAULT_STATUS_ADDR, FAULT_STATUS_FIELDS, MEM_FAULT_ADDR,
};
use serde::Serialize;
use std::fmt;

/// Fallback target of every weak handler.
pub const DEFAULT_HANDLER: &str = "undefined_handler";
/// C function the default handler branches to with the stacked frame.
pub const TRAP_FUNCTION: &str = "trap_exception";
/// Linker symbol placed at the top of the initial stack.
pub const STACK_TOP_SYMBOL: &str = "__c_stack_top__";
/// Section the linker script places at the vector table address.
pub const VECTOR_SECTION: &str = ".isr_vector";
pub const VECTOR_TABLE_SYMBOL: &str = "vector_table";

/// What the default trap does before it halts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrapStyle {
    /// Latch the fault status, fault addresses and stacked frame into
    /// debugger-visible locals, then halt.
    #[default]
    Inspect,
    /// Halt immediately.
    Halt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EmitOptions {
    pub trap: TrapStyle,
}

pub fn handler_symbol(vector: &str) -> String {
    format!("{}_handler", vector)
}

/// A weakly bound handler that falls back to [`DEFAULT_HANDLER`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerDecl {
    pub vector: String,
    pub symbol: String,
    pub fallback: &'static str,
}

impl fmt::Display for HandlerDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "void {}(void) __attribute__ ((weak, alias (\"{}\")));",
            self.symbol, self.fallback
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VectorEntry {
    /// Slot 0: address of the initial stack top.
    StackPointer(&'static str),
    Handler(String),
}

impl VectorEntry {
    pub fn symbol(&self) -> &str {
        match self {
            VectorEntry::StackPointer(s) => s,
            VectorEntry::Handler(s) => s,
        }
    }

    fn c_expr(&self) -> String {
        match self {
            VectorEntry::StackPointer(s) => format!("(handler) &{}", s),
            VectorEntry::Handler(s) => format!("&{}", s),
        }
    }
}

/// Table contents in slot order, slot 0 first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VectorTable {
    entries: Vec<VectorEntry>,
}

impl VectorTable {
    pub fn entries(&self) -> &[VectorEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Table size in bytes on a 32-bit target.
    pub fn size_bytes(&self) -> usize {
        self.entries.len() * 4
    }
}

#[derive(Debug, Serialize)]
struct VectorMap<'a> {
    chip: &'a str,
    section: &'a str,
    stack_pointer: &'a str,
    vectors: Vec<VectorMapEntry<'a>>,
}

#[derive(Debug, Serialize)]
struct VectorMapEntry<'a> {
    slot: usize,
    name: &'a str,
    handler: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    irq: Option<usize>,
}

pub struct Emitter<'a> {
    seq: &'a VectorSequence,
    options: EmitOptions,
}

impl<'a> Emitter<'a> {
    pub fn new(seq: &'a VectorSequence, options: EmitOptions) -> Self {
        Self { seq, options }
    }

    /// One declaration per vector, in sequence order.
    pub fn declarations(&self) -> Vec<HandlerDecl> {
        self.seq
            .names()
            .iter()
            .map(|name| HandlerDecl {
                vector: name.clone(),
                symbol: handler_symbol(name),
                fallback: DEFAULT_HANDLER,
            })
            .collect()
    }

    pub fn table(&self) -> VectorTable {
        let mut entries = Vec::with_capacity(self.seq.len() + 1);
        entries.push(VectorEntry::StackPointer(STACK_TOP_SYMBOL));
        entries.extend(
            self.seq
                .names()
                .iter()
                .map(|name| VectorEntry::Handler(handler_symbol(name))),
        );
        VectorTable { entries }
    }

    /// The complete C artifact.
    pub fn render(&self) -> String {
        self.to_string()
    }

    /// Slot-by-slot vector map for tooling.
    pub fn render_json(&self) -> serde_json::Result<String> {
        let map = VectorMap {
            chip: self.seq.chip(),
            section: VECTOR_SECTION,
            stack_pointer: STACK_TOP_SYMBOL,
            vectors: self
                .seq
                .iter()
                .map(|(slot, name)| VectorMapEntry {
                    slot,
                    name,
                    handler: handler_symbol(name),
                    irq: slot.checked_sub(FIRST_IRQ_SLOT),
                })
                .collect(),
        };
        serde_json::to_string_pretty(&map)
    }

    fn write_header(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "/*")?;
        writeln!(
            f,
            " * Vector table for {}: initial stack pointer + {} vectors ({} interrupts).",
            self.seq.chip(),
            self.seq.len(),
            self.seq.interrupt_count()
        )?;
        writeln!(f, " * Generated by cm3gen. Do not edit.")?;
        writeln!(f, " */")?;
        writeln!(f)?;
        writeln!(f, "#ifdef __cplusplus")?;
        writeln!(f, "extern \"C\" {{")?;
        writeln!(f, "#endif")?;
        writeln!(f)?;
        writeln!(f, "typedef void (*handler)(void);")
    }

    fn write_views(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f)?;
        writeln!(f, "union FAULTSTAT {{")?;
        writeln!(f, "  unsigned long w;")?;
        write_bitfields(f, &FAULT_STATUS_FIELDS, "  ")?;
        writeln!(f, "}};")?;
        writeln!(f)?;
        writeln!(f, "struct exception_stack_frame {{")?;
        for reg in FRAME_REGISTERS.iter().filter(|r| **r != "xPSR") {
            writeln!(f, "  void *{};", reg)?;
        }
        writeln!(f, "  union {{")?;
        writeln!(f, "    unsigned long w;")?;
        write_bitfields(f, &XPSR_FIELDS, "    ")?;
        writeln!(f, "  }} xPSR;")?;
        writeln!(f, "}};")
    }

    fn write_trap(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f)?;
        writeln!(
            f,
            "void __attribute__ ((used)) {}(struct exception_stack_frame *frame) {{",
            TRAP_FUNCTION
        )?;
        match self.options.trap {
            TrapStyle::Inspect => {
                writeln!(f, "  volatile union FAULTSTAT fault;")?;
                writeln!(
                    f,
                    "  fault.w = *(volatile unsigned long *) {:#010x};",
                    FAULT_STATUS_ADDR
                )?;
                writeln!(
                    f,
                    "  void * volatile mem_fault_addr = *(void * volatile *) {:#010x};",
                    MEM_FAULT_ADDR
                )?;
                writeln!(
                    f,
                    "  void * volatile bus_fault_addr = *(void * volatile *) {:#010x};",
                    BUS_FAULT_ADDR
                )?;
                writeln!(
                    f,
                    "  struct exception_stack_frame * volatile faulting_frame = frame;"
                )?;
                writeln!(f)?;
                writeln!(f, "  (void) fault;")?;
                writeln!(f, "  (void) mem_fault_addr;")?;
                writeln!(f, "  (void) bus_fault_addr;")?;
                writeln!(f, "  (void) faulting_frame;")?;
            }
            TrapStyle::Halt => {
                writeln!(f, "  (void) frame;")?;
            }
        }
        writeln!(f, "  for (;;) {{")?;
        writeln!(f, "  }}")?;
        writeln!(f, "}}")?;
        writeln!(f)?;
        // EXC_RETURN bit 2 selects the stack the frame was pushed to.
        writeln!(
            f,
            "void __attribute__ ((naked)) {}(void) {{",
            DEFAULT_HANDLER
        )?;
        writeln!(f, "  __asm volatile (\"tst lr, #4\\n\"")?;
        writeln!(f, "                  \"ite eq\\n\"")?;
        writeln!(f, "                  \"mrseq r0, msp\\n\"")?;
        writeln!(f, "                  \"mrsne r0, psp\\n\"")?;
        writeln!(f, "                  \"b {}\\n\");", TRAP_FUNCTION)?;
        writeln!(f, "}}")
    }

    fn write_declarations(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f)?;
        for decl in self.declarations() {
            writeln!(f, "{}", decl)?;
        }
        Ok(())
    }

    fn write_table(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let table = self.table();
        writeln!(f)?;
        writeln!(f, "extern unsigned long {};", STACK_TOP_SYMBOL)?;
        writeln!(f)?;
        writeln!(
            f,
            "__attribute__ ((section(\"{}\"), used)) handler const {}[{}] = {{",
            VECTOR_SECTION,
            VECTOR_TABLE_SYMBOL,
            table.len()
        )?;
        let last = table.len() - 1;
        for (slot, entry) in table.entries().iter().enumerate() {
            let sep = if slot == last { "" } else { "," };
            let note = match self.seq.slot(slot) {
                None => "initial stack pointer".to_string(),
                Some(name) => match slot.checked_sub(FIRST_IRQ_SLOT) {
                    Some(irq) => format!("irq {}: {}", irq, name),
                    None => name.to_string(),
                },
            };
            let item = format!("{}{}", entry.c_expr(), sep);
            writeln!(f, "  {:<40} /* {:>3}: {} */", item, slot, note)?;
        }
        writeln!(f, "}};")?;
        writeln!(f)?;
        writeln!(f, "#ifdef __cplusplus")?;
        writeln!(f, "}}")?;
        write!(f, "#endif")
    }
}

impl fmt::Display for Emitter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_header(f)?;
        self.write_views(f)?;
        self.write_trap(f)?;
        self.write_declarations(f)?;
        self.write_table(f)?;
        writeln!(f)
    }
}

fn write_bitfields(f: &mut fmt::Formatter<'_>, fields: &[BitField], indent: &str) -> fmt::Result {
    debug_assert!(bits::is_contiguous(fields));
    writeln!(f, "{}struct {{", indent)?;
    for field in fields {
        writeln!(
            f,
            "{}  unsigned int {:<10} : {};",
            indent, field.name, field.width
        )?;
    }
    writeln!(f, "{}}} __attribute__ ((packed));", indent)
}
