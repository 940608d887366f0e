//! The compilation context threaded through every phase.

use crate::assembly::{BlockId, Program};
use crate::operators::OperatorRegistry;
use crate::regalloc::{Emit, RegisterAllocator};
use crate::stack::StackFrames;
use crate::symbols::SymbolTable;
use crate::types::TypeGraph;
use util::{Level, MessageList};

/// Compiler options, mirroring the command line.
#[derive(Clone, Debug)]
pub struct Config {
    pub debug: bool,
    pub print_ast: bool,
    /// Emit stub bodies for declared-but-undefined functions.
    pub function_placeholder: bool,
    pub indent_asm: bool,
    pub always_define_symbols: bool,
    pub lint: bool,
    pub lint_level: Level,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            debug: false,
            print_ast: false,
            function_placeholder: true,
            indent_asm: true,
            always_define_symbols: false,
            lint: true,
            lint_level: Level::Warning,
        }
    }
}

/// Branch targets propagated into a guard expression so relational
/// operators can fuse compare-and-branch without materialising a Boolean.
#[derive(Clone, Copy, Debug)]
pub struct ConditionalContext {
    /// Jump here when the guard holds; fall through otherwise.
    pub if_true: Option<BlockId>,
    /// Jump here when the guard fails; fall through otherwise.
    pub if_false: Option<BlockId>,
    /// Inverted sense: the true/false targets keep their roles but the
    /// tested flag flips.
    pub inverse: bool,
}

impl ConditionalContext {
    pub fn new(if_true: BlockId, if_false: BlockId) -> ConditionalContext {
        ConditionalContext {
            if_true: Some(if_true),
            if_false: Some(if_false),
            inverse: false,
        }
    }

    pub fn inverse(self) -> ConditionalContext {
        ConditionalContext {
            inverse: !self.inverse,
            ..self
        }
    }
}

/// Innermost loop's control-flow targets for `break`/`continue`.
#[derive(Clone, Copy, Debug)]
pub struct LoopContext {
    pub start: BlockId,
    pub end: BlockId,
}

pub struct Context {
    pub messages: MessageList,
    pub program: Program,
    pub stack: StackFrames,
    pub regs: RegisterAllocator,
    pub symbols: SymbolTable,
    pub types: TypeGraph,
    pub ops: OperatorRegistry,
    pub loops: Vec<LoopContext>,
    /// Loop nesting during the process phase, for `break`/`continue`
    /// validation before any block exists.
    pub loop_depth: u32,
    pub config: Config,
    /// Monotonic id used for generated block labels (`then_3`, ...).
    next_block_id: u32,
}

impl Context {
    pub fn new(config: Config) -> Context {
        let mut types = TypeGraph::new();
        let mut ops = OperatorRegistry::new();
        crate::builtins::init_builtins(&mut ops, &mut types);

        Context {
            messages: MessageList::new(),
            program: Program::new("main"),
            stack: StackFrames::new(),
            regs: RegisterAllocator::new(),
            symbols: SymbolTable::new(),
            types,
            ops,
            loops: Vec::new(),
            loop_depth: 0,
            config,
            next_block_id: 0,
        }
    }

    /// Split-borrow helper: the allocator plus the collaborators its
    /// emitting operations need.
    pub fn regs_emit(&mut self) -> (&mut RegisterAllocator, Emit) {
        (
            &mut self.regs,
            Emit {
                program: &mut self.program,
                stack: &mut self.stack,
                symbols: &self.symbols,
                types: &self.types,
            },
        )
    }

    /// Fresh id for generated control-flow labels.
    pub fn next_block_id(&mut self) -> u32 {
        let id = self.next_block_id;
        self.next_block_id += 1;
        id
    }
}
