//! The three-level source model and its trace graph.

use crate::graph::Graph;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};

/// A `(file, line)` key in the trace graph. Lines are zero-based.
pub type LineKey = (PathBuf, i32);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileKind {
    /// The reconstructed assembly written by the assembler (`.s`).
    Reconstruction,
    /// Assembly consumed by the assembler (`.asm`).
    Assembly,
    /// High-level source (`.edel`).
    Language,
}

/// One emitted chunk, addressed by its byte offset in the binary.
#[derive(Clone, Debug)]
pub struct PCLine {
    pub pc: u64,
    /// Textual content in the reconstructed source.
    pub text: String,
    /// Line number in the reconstructed source.
    pub line_no: i32,
    /// Originating line in the assembly source.
    pub asm_origin: LineKey,
    /// Originating line in the high-level source, when the assembly line
    /// carried a debug annotation.
    pub lang_origin: Option<(PathBuf, i32, i32)>,
}

#[derive(Clone, Debug)]
pub struct FileLine {
    pub n: i32,
    pub text: String,
    /// Byte offsets of the chunks this line produced.
    pub pc_trace: Vec<u64>,
}

#[derive(Clone, Debug)]
pub struct File {
    pub path: PathBuf,
    pub kind: FileKind,
    pub lines: Vec<FileLine>,
    pub loaded: bool,
}

impl File {
    fn stub(path: PathBuf, kind: FileKind) -> File {
        File {
            path,
            kind,
            lines: Vec::new(),
            loaded: false,
        }
    }
}

#[derive(Default)]
pub struct Breakpoints {
    pcs: HashSet<u64>,
}

impl Breakpoints {
    pub fn new() -> Breakpoints {
        Breakpoints::default()
    }

    pub fn set(&mut self, pc: u64, enabled: bool) {
        if enabled {
            self.pcs.insert(pc);
        } else {
            self.pcs.remove(&pc);
        }
    }

    pub fn toggle(&mut self, pc: u64) {
        if !self.pcs.remove(&pc) {
            self.pcs.insert(pc);
        }
    }

    pub fn has(&self, pc: u64) -> bool {
        self.pcs.contains(&pc)
    }

    pub fn len(&self) -> usize {
        self.pcs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pcs.is_empty()
    }
}

pub struct Sources {
    pub pc_to_line: BTreeMap<u64, PCLine>,
    pub files: HashMap<PathBuf, File>,
    /// Symmetric line relation: language <-> assembly <-> reconstruction.
    pub trace: Graph<LineKey>,
}

impl Sources {
    pub fn new() -> Sources {
        Sources {
            pc_to_line: BTreeMap::new(),
            files: HashMap::new(),
            trace: Graph::new(),
        }
    }

    /// Read the reconstructed assembly: establishes the `pc -> PCLine`
    /// index and the reconstruction <-> assembly edges.
    pub fn load_reconstruction(&mut self, path: &Path, content: &str) {
        let mut file = File::stub(path.to_path_buf(), FileKind::Reconstruction);
        file.loaded = true;

        for (idx, line) in content.lines().enumerate() {
            let idx = idx as i32;
            // split "<text> ; <path>:<line>+<offset>"
            let (text, annotation) = match line.find(';') {
                Some(at) => (line[..at].trim_end(), line[at + 1..].trim()),
                None => continue,
            };

            let plus = match annotation.rfind('+') {
                Some(plus) => plus,
                None => continue,
            };
            let pc: u64 = match annotation[plus + 1..].trim().parse() {
                Ok(pc) => pc,
                Err(_) => continue,
            };

            let origin = annotation[..plus].trim();
            let colon = match origin.rfind(':') {
                Some(colon) => colon,
                None => continue,
            };
            let line_no: i32 = match origin[colon + 1..].parse::<i32>() {
                Ok(one_based) => one_based - 1,
                Err(_) => continue,
            };
            let asm_path = PathBuf::from(&origin[..colon]);

            self.files
                .entry(asm_path.clone())
                .or_insert_with(|| File::stub(asm_path.clone(), FileKind::Assembly));

            self.pc_to_line.insert(
                pc,
                PCLine {
                    pc,
                    text: text.to_string(),
                    line_no: idx,
                    asm_origin: (asm_path.clone(), line_no),
                    lang_origin: None,
                },
            );
            file.lines.push(FileLine {
                n: idx,
                text: text.to_string(),
                pc_trace: vec![pc],
            });

            let s_key: LineKey = (path.to_path_buf(), idx);
            let asm_key: LineKey = (asm_path, line_no);
            self.trace.insert(s_key.clone());
            self.trace.insert_symmetric(s_key, asm_key);
        }

        self.files.insert(path.to_path_buf(), file);
    }

    /// Read an assembly file, linking its `; @path:line[:col]` debug
    /// annotations to the high-level source.
    pub fn load_assembly(&mut self, path: &Path, content: &str) {
        let mut lines = Vec::new();

        for (idx, line) in content.lines().enumerate() {
            let idx = idx as i32;
            let mut file_line = FileLine {
                n: idx,
                text: line.to_string(),
                pc_trace: self.locate_asm_line(path, idx),
            };

            // the debug annotation is the last comment on the line
            let annotation = line.rfind(';').and_then(|at| {
                let rest = line[at + 1..].trim();
                rest.strip_prefix('@')
            });

            if let Some(annotation) = annotation {
                let mut parts = annotation.split(':');
                let lang_path = parts.next().unwrap_or("").to_string();
                let line_no = parts
                    .next()
                    .and_then(|p| p.parse::<i32>().ok())
                    .map(|one_based| one_based - 1);
                let col_no = parts
                    .next()
                    .and_then(|p| p.parse::<i32>().ok())
                    .map(|one_based| one_based - 1)
                    .unwrap_or(-1);

                if let Some(line_no) = line_no {
                    let lang_path = PathBuf::from(lang_path);
                    self.files
                        .entry(lang_path.clone())
                        .or_insert_with(|| File::stub(lang_path.clone(), FileKind::Language));

                    let asm_key: LineKey = (path.to_path_buf(), idx);
                    let lang_key: LineKey = (lang_path.clone(), line_no);
                    self.trace.insert(asm_key.clone());
                    self.trace.insert_symmetric(lang_key, asm_key);

                    for pc in &file_line.pc_trace {
                        if let Some(entry) = self.pc_to_line.get_mut(pc) {
                            entry.lang_origin = Some((lang_path.clone(), line_no, col_no));
                        }
                    }
                }
            }

            // strip the annotations for display
            if let Some(at) = file_line.text.find(';') {
                file_line.text.truncate(at);
                let text = file_line.text.trim_end().to_string();
                file_line.text = text;
            }
            lines.push(file_line);
        }

        let entry = self
            .files
            .entry(path.to_path_buf())
            .or_insert_with(|| File::stub(path.to_path_buf(), FileKind::Assembly));
        entry.lines = lines;
        entry.loaded = true;
    }

    /// Load a high-level source file, linking each line to the PC entries
    /// whose annotations reference it.
    pub fn load_language(&mut self, path: &Path, content: &str) {
        let mut lines = Vec::new();
        for (idx, line) in content.lines().enumerate() {
            let idx = idx as i32;
            let pc_trace = self.locate_lang_line(path, idx);
            self.trace.insert((path.to_path_buf(), idx));
            lines.push(FileLine {
                n: idx,
                text: line.to_string(),
                pc_trace,
            });
        }

        let entry = self
            .files
            .entry(path.to_path_buf())
            .or_insert_with(|| File::stub(path.to_path_buf(), FileKind::Language));
        entry.lines = lines;
        entry.loaded = true;
    }

    pub fn locate_pc(&self, pc: u64) -> Option<&PCLine> {
        self.pc_to_line.get(&pc)
    }

    /// Every chunk produced by `path:line` of the assembly source.
    pub fn locate_asm_line(&self, path: &Path, line: i32) -> Vec<u64> {
        self.pc_to_line
            .values()
            .filter(|entry| entry.asm_origin.0 == path && entry.asm_origin.1 == line)
            .map(|entry| entry.pc)
            .collect()
    }

    /// Every chunk whose language origin is `path:line`.
    pub fn locate_lang_line(&self, path: &Path, line: i32) -> Vec<u64> {
        self.pc_to_line
            .values()
            .filter(|entry| match &entry.lang_origin {
                Some((lang_path, lang_line, _)) => lang_path == path && *lang_line == line,
                None => false,
            })
            .map(|entry| entry.pc)
            .collect()
    }

    /// The PC entry at a given reconstructed-source line.
    pub fn locate_line(&self, line_no: i32) -> Option<&PCLine> {
        self.pc_to_line
            .values()
            .find(|entry| entry.line_no == line_no)
    }

    pub fn file(&self, path: &Path) -> Option<&File> {
        self.files.get(path)
    }

    /// A file line has a breakpoint when any chunk it traces to does.
    pub fn line_has_breakpoint(
        &self,
        breakpoints: &Breakpoints,
        path: &Path,
        line: i32,
    ) -> bool {
        self.files
            .get(path)
            .and_then(|file| file.lines.iter().find(|l| l.n == line))
            .map_or(false, |file_line| {
                file_line.pc_trace.iter().any(|pc| breakpoints.has(*pc))
            })
    }
}

impl Default for Sources {
    fn default() -> Sources {
        Sources::new()
    }
}
