use crate::processor::{describe_position, run_until_break, Processor, StepOutcome, StopReason};
use crate::sources::{Breakpoints, FileKind, Sources};
use std::path::Path;

const RECONSTRUCTION: &str = "\
load $r1, 0x2a\t; /src/prog.asm:2+0
syscall 0x0\t; /src/prog.asm:3+8
.byte 0x01, 0x02\t; /src/prog.asm:5+16
";

const ASSEMBLY: &str = "\
main:
\tload $r1, 42\t; x: i64\t; @/src/prog.edel:1:5
\texit\t; @/src/prog.edel:2:1
; a pure comment line
\t.byte 1, 2
";

fn loaded() -> Sources {
    let mut sources = Sources::new();
    sources.load_reconstruction(Path::new("/src/prog.s"), RECONSTRUCTION);
    sources.load_assembly(Path::new("/src/prog.asm"), ASSEMBLY);
    sources
}

#[test]
fn every_reconstructed_line_has_one_pc_entry() {
    let sources = loaded();
    assert_eq!(sources.pc_to_line.len(), 3);
    for (pc, entry) in &sources.pc_to_line {
        assert_eq!(*pc, entry.pc);
        // the assembly origin resolves to a registered file
        assert!(sources.files.contains_key(&entry.asm_origin.0));
    }
}

#[test]
fn pc_entries_record_offsets_and_origins() {
    let sources = loaded();
    let entry = sources.locate_pc(8).expect("pc 8 missing");
    assert_eq!(entry.text.trim(), "syscall 0x0");
    assert_eq!(entry.asm_origin, ("/src/prog.asm".into(), 2));
}

#[test]
fn assembly_annotations_create_language_edges() {
    let sources = loaded();

    // line 1 of the assembly (load) traces to the language file
    let entry = sources.locate_pc(0).unwrap();
    let (lang_path, line, col) = entry.lang_origin.clone().expect("language origin missing");
    assert_eq!(lang_path, Path::new("/src/prog.edel"));
    assert_eq!(line, 0);
    assert_eq!(col, 4);

    // the language file was registered by kind
    assert_eq!(
        sources.file(Path::new("/src/prog.edel")).unwrap().kind,
        FileKind::Language
    );
}

#[test]
fn trace_graph_connects_all_three_levels() {
    let sources = loaded();
    let s_key = ("/src/prog.s".into(), 0);
    let asm_key = ("/src/prog.asm".into(), 1);
    let lang_key = ("/src/prog.edel".into(), 0);

    assert!(sources.trace.neighbours(&s_key).contains(&asm_key));
    assert!(sources.trace.neighbours(&asm_key).contains(&s_key));
    assert!(sources.trace.neighbours(&asm_key).contains(&lang_key));
    assert!(sources.trace.neighbours(&lang_key).contains(&asm_key));
}

#[test]
fn locate_by_assembly_and_language_line() {
    let sources = loaded();
    assert_eq!(
        sources.locate_asm_line(Path::new("/src/prog.asm"), 1),
        vec![0]
    );
    assert_eq!(
        sources.locate_lang_line(Path::new("/src/prog.edel"), 1),
        vec![8]
    );
    assert!(sources
        .locate_asm_line(Path::new("/src/prog.asm"), 3)
        .is_empty());
}

#[test]
fn language_lines_collect_pc_traces() {
    let mut sources = loaded();
    sources.load_language(
        Path::new("/src/prog.edel"),
        "let x: i64 = 42;\nexit-ish line\n",
    );
    let file = sources.file(Path::new("/src/prog.edel")).unwrap();
    assert!(file.loaded);
    assert_eq!(file.lines[0].pc_trace, vec![0]);
    assert_eq!(file.lines[1].pc_trace, vec![8]);
}

#[test]
fn breakpoints_project_onto_file_lines() {
    let mut sources = loaded();
    sources.load_language(Path::new("/src/prog.edel"), "let x: i64 = 42;\n");

    let mut breakpoints = Breakpoints::new();
    assert!(!sources.line_has_breakpoint(&breakpoints, Path::new("/src/prog.edel"), 0));

    breakpoints.toggle(0);
    assert!(breakpoints.has(0));
    assert!(sources.line_has_breakpoint(&breakpoints, Path::new("/src/prog.edel"), 0));
    assert!(sources.line_has_breakpoint(&breakpoints, Path::new("/src/prog.asm"), 1));

    breakpoints.toggle(0);
    assert!(!breakpoints.has(0));
}

#[test]
fn describe_position_walks_backwards() {
    let sources = loaded();
    let text = describe_position(&sources, 0);
    assert!(text.contains("pc=0x0"));
    assert!(text.contains("prog.asm:2"));
    assert!(text.contains("prog.edel:1"));
}

struct ScriptedProcessor {
    pc: u64,
    steps: usize,
}

impl Processor for ScriptedProcessor {
    fn program_counter(&self) -> u64 {
        self.pc
    }

    fn step(&mut self) -> StepOutcome {
        if self.steps == 0 {
            return StepOutcome::Halted(0);
        }
        self.steps -= 1;
        self.pc += 8;
        StepOutcome::Running
    }

    fn registers(&self) -> Vec<(&'static str, u64)> {
        vec![("ip", self.pc)]
    }

    fn read_memory(&self, _addr: u64, len: usize) -> Vec<u8> {
        vec![0; len]
    }
}

#[test]
fn run_until_break_stops_at_a_breakpoint() {
    let mut processor = ScriptedProcessor { pc: 0, steps: 100 };
    let mut breakpoints = Breakpoints::new();
    breakpoints.set(24, true);

    let reason = run_until_break(&mut processor, &breakpoints, 1000);
    assert_eq!(reason, StopReason::Breakpoint(24));
    assert_eq!(processor.program_counter(), 24);
}

#[test]
fn run_until_break_reports_halt_and_limit() {
    let mut processor = ScriptedProcessor { pc: 0, steps: 3 };
    let breakpoints = Breakpoints::new();
    assert_eq!(
        run_until_break(&mut processor, &breakpoints, 1000),
        StopReason::Halted(0)
    );

    let mut processor = ScriptedProcessor { pc: 0, steps: 1000 };
    assert_eq!(
        run_until_break(&mut processor, &breakpoints, 10),
        StopReason::StepLimit
    );
}
