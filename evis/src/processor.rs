//! Interface to the external emulator. The visualizer never embeds the
//! CPU; it drives whatever implements [`Processor`] and reads the machine
//! state back for display.

use crate::sources::{Breakpoints, Sources};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepOutcome {
    Running,
    Halted(i64),
}

pub trait Processor {
    /// Current program counter (a byte offset into the image).
    fn program_counter(&self) -> u64;

    /// Execute one instruction.
    fn step(&mut self) -> StepOutcome;

    /// Register file snapshot as (name, value) pairs, in index order.
    fn registers(&self) -> Vec<(&'static str, u64)>;

    /// Read a window of memory.
    fn read_memory(&self, addr: u64, len: usize) -> Vec<u8>;
}

/// Why a run stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    Breakpoint(u64),
    Halted(i64),
    StepLimit,
}

/// Run until a breakpoint or halt, bounded by `max_steps` so a wedged
/// program cannot hang the UI.
pub fn run_until_break<P: Processor>(
    processor: &mut P,
    breakpoints: &Breakpoints,
    max_steps: usize,
) -> StopReason {
    for _ in 0..max_steps {
        match processor.step() {
            StepOutcome::Halted(code) => return StopReason::Halted(code),
            StepOutcome::Running => {
                let pc = processor.program_counter();
                if breakpoints.has(pc) {
                    return StopReason::Breakpoint(pc);
                }
            }
        }
    }
    StopReason::StepLimit
}

/// Describe the current position at every abstraction level, for the
/// execution tab's header.
pub fn describe_position(sources: &Sources, pc: u64) -> String {
    match sources.locate_pc(pc) {
        Some(entry) => {
            let mut text = format!(
                "pc=0x{:x} {} ({}:{})",
                pc,
                entry.text.trim(),
                entry.asm_origin.0.display(),
                entry.asm_origin.1 + 1
            );
            if let Some((path, line, _)) = &entry.lang_origin {
                text.push_str(&format!(" <- {}:{}", path.display(), line + 1));
            }
            text
        }
        None => format!("pc=0x{:x} (no trace)", pc),
    }
}
