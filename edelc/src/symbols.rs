//! Scoped symbol registries, namespace paths, the function trace, and
//! storage-location assignment.

use crate::assembly::{AsmArg, BasicBlock, Line, Position, Program};
use crate::create;
use crate::stack::StackFrames;
use crate::types::{TypeGraph, TypeId};
use eisa::Register;
use std::collections::{HashMap, VecDeque};
use util::Location;

pub type SymbolId = u32;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Category {
    Global,
    StackBased,
    Argument,
    Function,
    Namespace,
}

#[derive(Clone, Debug)]
pub struct Symbol {
    pub id: SymbolId,
    pub name: String,
    pub loc: Location,
    pub category: Category,
    pub type_id: TypeId,
    pub parent: Option<SymbolId>,
    pub constant: bool,
}

/// Where a symbol physically lives.
#[derive(Clone, Debug, PartialEq)]
pub enum StorageLocation {
    /// Inside a labelled block, at a byte offset into it.
    Block { label: String, offset: u64 },
    /// On the stack: the address is `$fp - frame_offset + offset`.
    Stack { frame_offset: u64, offset: u64 },
}

impl StorageLocation {
    pub fn stack(frame_offset: u64) -> StorageLocation {
        StorageLocation::Stack {
            frame_offset,
            offset: 0,
        }
    }
}

/// Scope-local symbol collection populated by the collate phase and moved
/// wholesale into the table, allowing forward references.
#[derive(Default)]
pub struct Registry {
    pub symbols: Vec<Symbol>,
}

impl Registry {
    pub fn new() -> Registry {
        Registry::default()
    }

    pub fn register(&mut self, symbol: Symbol) {
        self.symbols.push(symbol);
    }

    /// Find a registered symbol by name and exact type.
    pub fn get(&self, name: &str, type_id: TypeId) -> Option<&Symbol> {
        self.symbols
            .iter()
            .find(|s| s.name == name && s.type_id == type_id)
    }
}

pub struct SymbolTable {
    /// Front = innermost. Each scope maps fully-qualified name to the ids
    /// bound to it (several for function overload sets).
    scopes: VecDeque<HashMap<String, Vec<SymbolId>>>,
    symbols: HashMap<SymbolId, Symbol>,
    storage: HashMap<SymbolId, StorageLocation>,
    /// Function symbols currently being processed, innermost last.
    trace: Vec<SymbolId>,
    /// Namespace nesting, innermost last.
    path: Vec<SymbolId>,
    /// Parameter indices bound to the discard name `_`, per function;
    /// call sites skip these.
    ignored_params: HashMap<SymbolId, Vec<usize>>,
    next_id: SymbolId,
}

impl SymbolTable {
    pub fn new() -> SymbolTable {
        let mut scopes = VecDeque::new();
        scopes.push_front(HashMap::new());
        SymbolTable {
            scopes,
            symbols: HashMap::new(),
            storage: HashMap::new(),
            trace: Vec::new(),
            path: Vec::new(),
            ignored_params: HashMap::new(),
            next_id: 0,
        }
    }

    pub fn set_ignored_params(&mut self, id: SymbolId, indices: Vec<usize>) {
        if !indices.is_empty() {
            self.ignored_params.insert(id, indices);
        }
    }

    pub fn ignored_params(&self, id: SymbolId) -> Vec<usize> {
        self.ignored_params.get(&id).cloned().unwrap_or_default()
    }

    pub fn new_id(&mut self) -> SymbolId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn in_global_scope(&self) -> bool {
        self.scopes.len() < 2
    }

    pub fn get(&self, id: SymbolId) -> &Symbol {
        &self.symbols[&id]
    }

    /// Fully-qualified dotted name.
    pub fn full_name(&self, id: SymbolId) -> String {
        let symbol = self.get(id);
        match symbol.parent {
            Some(parent) => format!("{}.{}", self.full_name(parent), symbol.name),
            None => symbol.name.clone(),
        }
    }

    /// Name the symbol will be keyed under, given the current namespace
    /// path.
    fn qualified(&self, name: &str) -> String {
        let mut full = String::new();
        for id in &self.path {
            full.push_str(&self.get(*id).name);
            full.push('.');
        }
        full.push_str(name);
        full
    }

    pub fn path_name(&self, name: &str) -> String {
        self.qualified(name)
    }

    /// Insert a symbol into the innermost scope. Function overloads
    /// accumulate under the same name; anything else shadows it.
    pub fn insert(&mut self, mut symbol: Symbol) -> SymbolId {
        symbol.parent = self.path.last().copied();
        let key = self.qualified(&symbol.name);
        let id = symbol.id;
        let is_function = symbol.category == Category::Function;

        self.symbols.insert(id, symbol);
        let scope = self.scopes.front_mut().expect("scope stack is empty");
        let entry = scope.entry(key).or_insert_with(Vec::new);
        if is_function {
            entry.push(id);
        } else {
            entry.clear();
            entry.push(id);
        }
        id
    }

    pub fn insert_registry(&mut self, registry: Registry) {
        for symbol in registry.symbols {
            self.insert(symbol);
        }
    }

    /// Candidate set for `name`, innermost scope first. Only the first
    /// scope containing the name contributes.
    pub fn find(&self, name: &str) -> Vec<SymbolId> {
        for scope in &self.scopes {
            if let Some(ids) = scope.get(name) {
                return ids.clone();
            }
        }
        Vec::new()
    }

    pub fn find_with_type(&self, name: &str, type_id: TypeId) -> Option<SymbolId> {
        self.find(name)
            .into_iter()
            .find(|id| self.get(*id).type_id == type_id)
    }

    pub fn push(&mut self) {
        self.scopes.push_front(HashMap::new());
    }

    /// Leaving a scope shrinks the name maps only; symbols stay reachable
    /// through their ids for the later phases.
    pub fn pop(&mut self) {
        self.scopes.pop_front();
        if self.scopes.is_empty() {
            self.push();
        }
    }

    /// Label of the block backing a Global or Function symbol.
    pub fn block_label(&self, id: SymbolId) -> String {
        match self.get(id).category {
            Category::Function => format!("func_{}", id),
            _ => format!("globl_{}", id),
        }
    }

    /// Materialise storage for a symbol. Globals and functions get a
    /// labelled block at program end; stack symbols push onto the current
    /// frame. Arguments are placed by the function prologue, never here.
    pub fn allocate(
        &mut self,
        id: SymbolId,
        program: &mut Program,
        stack: &mut StackFrames,
        types: &TypeGraph,
    ) {
        debug_assert!(!self.storage.contains_key(&id), "symbol allocated twice");

        let symbol = self.get(id).clone();
        match symbol.category {
            Category::Global | Category::Function => {
                let size = types.size(symbol.type_id);
                if symbol.category == Category::Global && size == 0 {
                    return;
                }

                let label = self.block_label(id);
                let mut block = BasicBlock::labelled(&label);
                block.comment = format!(
                    "{} {}: {}",
                    if symbol.category == Category::Function {
                        "func"
                    } else {
                        "alloc global"
                    },
                    self.full_name(id),
                    types.name(symbol.type_id)
                );
                if symbol.category == Category::Global {
                    block.add(Line::directive(format!(".space {}", size)));
                }

                let previous = program.current_id();
                program.insert(Position::End, block);
                program.select_id(previous);

                self.storage
                    .insert(id, StorageLocation::Block { label, offset: 0 });
            }
            Category::StackBased => {
                let size = types.size(symbol.type_id);
                if size == 0 {
                    return;
                }
                stack.push(size, program);
                program.current_mut().back_mut().set_comment(format!(
                    "alloc {}: {}",
                    self.full_name(id),
                    types.name(symbol.type_id)
                ));
                self.storage
                    .insert(id, StorageLocation::stack(stack.offset()));
            }
            Category::Namespace => {}
            Category::Argument => {
                debug_assert!(false, "arguments are placed by the function prologue");
            }
        }
    }

    /// Record a storage location decided elsewhere (function parameters).
    pub fn allocate_at(&mut self, id: SymbolId, location: StorageLocation) {
        self.storage.insert(id, location);
    }

    pub fn locate(&self, id: SymbolId) -> Option<&StorageLocation> {
        self.storage.get(&id)
    }

    /// Assembly argument addressing a storage location (plus `extra` bytes
    /// into it).
    pub fn resolve_location(&self, location: &StorageLocation, extra: u64) -> AsmArg {
        match location {
            StorageLocation::Block { label, offset } => AsmArg::LabelAddress {
                label: label.clone(),
                offset: offset + extra,
            },
            StorageLocation::Stack {
                frame_offset,
                offset,
            } => AsmArg::reg_indirect(
                Register::Fp,
                -(*frame_offset as i64) + (*offset + extra) as i64,
            ),
        }
    }

    /// Store a register into the symbol's resolved address, sized to the
    /// symbol's type.
    pub fn assign_symbol(
        &self,
        id: SymbolId,
        reg: u8,
        program: &mut Program,
        types: &TypeGraph,
    ) {
        let location = match self.locate(id) {
            Some(location) => location.clone(),
            None => return,
        };
        let argument = self.resolve_location(&location, 0);
        let mut line = create::store(reg, argument);
        line.set_comment(format!(
            "{} = ${}",
            self.full_name(id),
            Register::name(reg)
        ));
        program.add(line);
    }

    pub fn erase(&mut self, id: SymbolId) {
        self.symbols.remove(&id);
        self.storage.remove(&id);
        for scope in &mut self.scopes {
            for ids in scope.values_mut() {
                ids.retain(|other| *other != id);
            }
        }
    }

    pub fn enter_function(&mut self, id: SymbolId) {
        self.trace.push(id);
    }

    pub fn exit_function(&mut self) {
        self.trace.pop();
    }

    pub fn current_function(&self) -> Option<SymbolId> {
        self.trace.last().copied()
    }

    pub fn push_path(&mut self, id: SymbolId) {
        self.path.push(id);
    }

    pub fn pop_path(&mut self) {
        self.path.pop();
    }
}

impl Default for SymbolTable {
    fn default() -> SymbolTable {
        SymbolTable::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::types::{self, TypeGraph};

    fn symbol(table: &mut SymbolTable, name: &str, category: Category, type_id: TypeId) -> Symbol {
        Symbol {
            id: table.new_id(),
            name: name.to_string(),
            loc: Location::at("t.edel", 0),
            category,
            type_id,
            parent: None,
            constant: false,
        }
    }

    #[test]
    fn find_prefers_the_innermost_scope() {
        let mut table = SymbolTable::new();
        let outer = symbol(&mut table, "x", Category::Global, types::U32);
        let outer_id = table.insert(outer);

        table.push();
        let inner = symbol(&mut table, "x", Category::StackBased, types::I64);
        let inner_id = table.insert(inner);

        assert_eq!(table.find("x"), vec![inner_id]);
        table.pop();
        assert_eq!(table.find("x"), vec![outer_id]);
    }

    #[test]
    fn popped_symbols_remain_reachable_by_id() {
        let mut table = SymbolTable::new();
        table.push();
        let s = symbol(&mut table, "y", Category::StackBased, types::U8);
        let id = table.insert(s);
        table.pop();
        assert!(table.find("y").is_empty());
        assert_eq!(table.get(id).name, "y");
    }

    #[test]
    fn function_overloads_share_a_name() {
        let mut table = SymbolTable::new();
        let mut graph = TypeGraph::new();
        let f1 = graph.function_of(vec![types::U32], types::UNIT);
        let f2 = graph.function_of(vec![types::I64], types::UNIT);

        let a = symbol(&mut table, "f", Category::Function, f1);
        let a_id = table.insert(a);
        let b = symbol(&mut table, "f", Category::Function, f2);
        let b_id = table.insert(b);

        assert_eq!(table.find("f"), vec![a_id, b_id]);
        assert_eq!(table.find_with_type("f", f2), Some(b_id));
    }

    #[test]
    fn non_function_shadowing_replaces_the_id_set() {
        let mut table = SymbolTable::new();
        let a = symbol(&mut table, "v", Category::Global, types::U32);
        table.insert(a);
        let b = symbol(&mut table, "v", Category::Global, types::I64);
        let b_id = table.insert(b);
        assert_eq!(table.find("v"), vec![b_id]);
    }

    #[test]
    fn namespace_path_qualifies_names() {
        let mut table = SymbolTable::new();
        let ns = symbol(&mut table, "math", Category::Namespace, types::NAMESPACE);
        let ns_id = table.insert(ns);

        table.push_path(ns_id);
        let v = symbol(&mut table, "pi", Category::Global, types::F64);
        let v_id = table.insert(v);
        table.pop_path();

        assert_eq!(table.find("math.pi"), vec![v_id]);
        assert_eq!(table.full_name(v_id), "math.pi");
        assert!(table.find("pi").is_empty());
    }

    #[test]
    fn global_allocation_reserves_a_labelled_block() {
        let mut table = SymbolTable::new();
        let graph = TypeGraph::new();
        let mut program = Program::new("main");
        let mut stack = StackFrames::new();

        let g = symbol(&mut table, "g", Category::Global, types::I32);
        let id = table.insert(g);
        table.allocate(id, &mut program, &mut stack, &graph);

        match table.locate(id) {
            Some(StorageLocation::Block { label, offset }) => {
                assert_eq!(label, &format!("globl_{}", id));
                assert_eq!(*offset, 0);
            }
            other => panic!("unexpected storage {:?}", other),
        }
        let rendered = program.render(false);
        assert!(rendered.contains(&format!("globl_{}:", id)));
        assert!(rendered.contains(".space 4"));
        // cursor stayed on the entry block
        assert_eq!(program.current().label.as_deref(), Some("main"));
    }

    #[test]
    fn stack_allocation_records_the_frame_offset() {
        let mut table = SymbolTable::new();
        let graph = TypeGraph::new();
        let mut program = Program::new("main");
        let mut stack = StackFrames::new();

        table.push();
        let s = symbol(&mut table, "local", Category::StackBased, types::I64);
        let id = table.insert(s);
        table.allocate(id, &mut program, &mut stack, &graph);

        assert_eq!(
            table.locate(id),
            Some(&StorageLocation::Stack {
                frame_offset: 8,
                offset: 0
            })
        );
        // resolves to a frame-pointer-relative address
        let arg = table.resolve_location(table.locate(id).unwrap(), 0);
        assert_eq!(arg, AsmArg::reg_indirect(Register::Fp, -8));
    }

    #[test]
    fn zero_sized_symbols_get_no_storage() {
        let mut table = SymbolTable::new();
        let graph = TypeGraph::new();
        let mut program = Program::new("main");
        let mut stack = StackFrames::new();

        let u = symbol(&mut table, "u", Category::Global, types::UNIT);
        let id = table.insert(u);
        table.allocate(id, &mut program, &mut stack, &graph);
        assert_eq!(table.locate(id), None);
    }
}
