//! Register allocation over the general-purpose register file.
//!
//! Stores form a stack: `save_store`/`destroy_store` bracket regions (calls,
//! function bodies) whose register usage must not disturb the surrounding
//! code. Each store tracks one [`Object`](struct.Object.html) per general
//! register plus the distinguished `$ret` slot, and an allocation history
//! whose front is the most recent placement.

use crate::assembly::{AsmArg, Program};
use crate::create;
use crate::stack::StackFrames;
use crate::symbols::{StorageLocation, SymbolTable};
use crate::types::{TypeGraph, TypeId};
use crate::value::{Literal, Ref, Value, ValueKind};
use eisa::registers::{GENERAL_COUNT, GENERAL_START};
use eisa::{DataType, Register};
use std::collections::VecDeque;

/// Collaborators the allocator needs whenever an operation emits code.
pub struct Emit<'a> {
    pub program: &'a mut Program,
    pub stack: &'a mut StackFrames,
    pub symbols: &'a SymbolTable,
    pub types: &'a TypeGraph,
}

/// An occupant of a register slot.
#[derive(Clone, Debug)]
pub struct Object {
    pub value: Value,
    /// Incremented whenever another slot receives an insertion while this
    /// one stays busy.
    pub age: u32,
    /// A non-required object may be evicted at any time without
    /// consequence.
    pub required: bool,
}

impl Object {
    pub fn new(value: Value) -> Object {
        Object {
            value,
            age: 0,
            required: true,
        }
    }
}

#[derive(Clone, Debug)]
struct SavedReg {
    slot: usize,
    stack_offset: u64,
}

#[derive(Clone, Debug)]
struct Store {
    regs: Vec<Option<Object>>,
    ret: Option<Object>,
    history: VecDeque<Ref>,
    saved: Vec<SavedReg>,
}

impl Store {
    fn new() -> Store {
        Store {
            regs: vec![None; GENERAL_COUNT as usize],
            ret: None,
            history: VecDeque::new(),
            saved: Vec::new(),
        }
    }
}

fn slot_register(slot: usize) -> u8 {
    GENERAL_START + slot as u8
}

/// Allocator slot of a register, `None` for registers outside the general
/// file (`$ret`, `$sp`, ...), which the allocator does not track.
fn general_slot(reg: u8) -> Option<usize> {
    if reg >= GENERAL_START && reg < GENERAL_START + GENERAL_COUNT {
        Some((reg - GENERAL_START) as usize)
    } else {
        None
    }
}

fn register_slot(reg: u8) -> usize {
    general_slot(reg).expect("register is not allocator-tracked")
}

pub struct RegisterAllocator {
    stores: Vec<Store>,
}

impl RegisterAllocator {
    pub fn new() -> RegisterAllocator {
        RegisterAllocator {
            stores: vec![Store::new()],
        }
    }

    fn top(&self) -> &Store {
        self.stores.last().expect("store stack is empty")
    }

    fn top_mut(&mut self) -> &mut Store {
        self.stores.last_mut().expect("store stack is empty")
    }

    pub fn count_free(&self) -> usize {
        self.top().regs.iter().filter(|slot| slot.is_none()).count()
    }

    pub fn object(&self, reference: Ref) -> Option<&Object> {
        match reference {
            Ref::Register(reg) => {
                let slot = general_slot(reg)?;
                self.top().regs[slot].as_ref()
            }
            Ref::Memory(_) => None,
        }
    }

    pub fn object_mut(&mut self, reference: Ref) -> Option<&mut Object> {
        match reference {
            Ref::Register(reg) => {
                let slot = general_slot(reg)?;
                self.top_mut().regs[slot].as_mut()
            }
            Ref::Memory(_) => None,
        }
    }

    /// Re-record an access so `get_recent` reflects operand order even
    /// when a value was already resident.
    fn touch(&mut self, location: Ref) {
        let store = self.top_mut();
        store.history.retain(|entry| *entry != location);
        store.history.push_front(location);
    }

    /// Find the register holding this symbol, marking it required.
    pub fn find_symbol(&mut self, id: crate::symbols::SymbolId) -> Option<Ref> {
        let mut found = None;
        for (slot, object) in self.top_mut().regs.iter_mut().enumerate() {
            if let Some(object) = object {
                if object.value.symbol() == Some(id) {
                    object.required = true;
                    found = Some(Ref::reg(slot_register(slot)));
                    break;
                }
            }
        }
        if let Some(location) = found {
            self.touch(location);
        }
        found
    }

    /// Find the register holding an equal literal, marking it required.
    pub fn find_literal(&mut self, literal: &Literal) -> Option<Ref> {
        let mut found = None;
        for (slot, object) in self.top_mut().regs.iter_mut().enumerate() {
            if let Some(object) = object {
                if let Some(held) = object.value.literal_value() {
                    if held.bits == literal.bits && held.type_id == literal.type_id {
                        object.required = true;
                        found = Some(Ref::reg(slot_register(slot)));
                        break;
                    }
                }
            }
        }
        if let Some(location) = found {
            self.touch(location);
        }
        found
    }

    pub fn find_or_insert_symbol(
        &mut self,
        id: crate::symbols::SymbolId,
        em: &mut Emit,
    ) -> Ref {
        if let Some(found) = self.find_symbol(id) {
            return found;
        }
        let mut value = Value::of(em.symbols.get(id).type_id);
        value.lvalue = Some(crate::value::LValue::Symbol(id));
        self.insert(Object::new(value), em)
    }

    pub fn find_or_insert_literal(&mut self, literal: Literal, em: &mut Emit) -> Ref {
        if let Some(found) = self.find_literal(&literal) {
            return found;
        }
        self.insert(Object::new(Value::literal(literal)), em)
    }

    /// Place an object in the first free slot; with none free, the first
    /// non-required occupant is replaced. Exhausting all twelve registers
    /// with required values is a compiler bug, mirrored by the panic.
    pub fn insert(&mut self, object: Object, em: &mut Emit) -> Ref {
        let free = self.count_free();
        let mut chosen = None;
        for (slot, occupant) in self.top().regs.iter().enumerate() {
            match occupant {
                None => {
                    chosen = Some(slot);
                    break;
                }
                Some(occupant) if free == 0 && !occupant.required => {
                    chosen = Some(slot);
                    break;
                }
                _ => {}
            }
        }

        let slot = chosen
            .unwrap_or_else(|| panic!("register allocator: spilling into memory is not supported"));
        let location = Ref::reg(slot_register(slot));
        self.insert_at(location, object, em);
        location
    }

    /// Place an object at a specific register, evicting any occupant and
    /// emitting the load that realises the object's value.
    pub fn insert_at(&mut self, location: Ref, mut object: Object, em: &mut Emit) {
        let reg = location.register();
        self.evict(location);

        // everything else ages while this placement happens
        for (slot, occupant) in self.top_mut().regs.iter_mut().enumerate() {
            if slot != register_slot(reg) {
                if let Some(occupant) = occupant {
                    occupant.age += 1;
                }
            }
        }

        object.value.rvalue = Some(location);
        self.emit_placement(reg, &object, em);

        let store = self.top_mut();
        store.history.push_front(location);
        store.regs[register_slot(reg)] = Some(object);
    }

    fn emit_placement(&self, reg: u8, object: &Object, em: &mut Emit) {
        if let Some(literal) = object.value.literal_value() {
            let size = em.types.size(literal.type_id);
            let mut line = if size == 8 {
                create::load_long(reg, literal.bits)
            } else {
                create::load(reg, AsmArg::imm(literal.bits))
            };
            line.set_comment(format!(
                "{}: {}",
                literal.text,
                em.types.name(literal.type_id)
            ));
            em.program.add(line);
            return;
        }

        if let Some(id) = object.value.symbol() {
            let symbol_type = em.symbols.get(id).type_id;
            let location = match em.symbols.locate(id) {
                Some(location) => location.clone(),
                None => return,
            };

            match &location {
                StorageLocation::Block { label, offset } => {
                    if em.types.reference_as_ptr(symbol_type) {
                        // the canonical value is the block's address
                        em.program
                            .add(create::load(reg, AsmArg::Label(label.clone())));
                        if *offset != 0 {
                            em.program.add(create::add(
                                DataType::U64,
                                reg,
                                reg,
                                AsmArg::imm(*offset),
                            ));
                        }
                    } else {
                        let size = em.types.size(symbol_type);
                        let signed = em.types.asm_datatype(symbol_type).is_signed();
                        let source = em.symbols.resolve_location(&location, 0);
                        for line in create::load_sized(reg, source, size, signed) {
                            em.program.add(line);
                        }
                    }
                }
                StorageLocation::Stack { frame_offset, offset } => {
                    if em.types.reference_as_ptr(symbol_type) {
                        // the canonical value is the address: $fp - offset
                        em.program.add(create::sub(
                            DataType::U64,
                            reg,
                            Register::Fp.index(),
                            AsmArg::imm(frame_offset - offset),
                        ));
                    } else {
                        let size = em.types.size(symbol_type);
                        let signed = em.types.asm_datatype(symbol_type).is_signed();
                        let source = em.symbols.resolve_location(&location, 0);
                        for line in create::load_sized(reg, source, size, signed) {
                            em.program.add(line);
                        }
                    }
                }
            }
            em.program
                .current_mut()
                .back_mut()
                .set_comment(format!(
                    "{}: {}",
                    em.symbols.full_name(id),
                    em.types.name(symbol_type)
                ));
        }
    }

    /// Vacate a slot without emitting code.
    pub fn evict(&mut self, location: Ref) {
        let store = self.top_mut();
        store.history.retain(|entry| *entry != location);
        if let Ref::Register(reg) = location {
            if let Some(slot) = general_slot(reg) {
                store.regs[slot] = None;
            }
        }
    }

    /// Evict every register currently bound to this symbol.
    pub fn evict_symbol(&mut self, id: crate::symbols::SymbolId) {
        let slots: Vec<usize> = self
            .top()
            .regs
            .iter()
            .enumerate()
            .filter_map(|(slot, object)| match object {
                Some(object) if object.value.symbol() == Some(id) => Some(slot),
                _ => None,
            })
            .collect();
        for slot in slots {
            self.evict(Ref::reg(slot_register(slot)));
        }
    }

    pub fn mark_free(&mut self, location: Ref) {
        if let Some(object) = self.object_mut(location) {
            object.required = false;
        }
    }

    pub fn mark_all_free(&mut self) {
        for object in self.top_mut().regs.iter_mut().flatten() {
            object.required = false;
        }
    }

    /// Forget every cached binding. Used at control-flow joins and block
    /// entries reachable from several paths, where compile-time register
    /// contents say nothing about the runtime state.
    pub fn evict_all(&mut self) {
        let store = self.top_mut();
        store.history.clear();
        for slot in store.regs.iter_mut() {
            *slot = None;
        }
    }

    /// The `n`th most recent allocation (0 = most recent).
    pub fn get_recent(&self, n: usize) -> Option<Ref> {
        self.top().history.get(n).copied()
    }

    /// Turn a reference into an assembly argument, optionally releasing it.
    pub fn resolve_ref(&mut self, location: Ref, mark_free: bool) -> AsmArg {
        if mark_free {
            self.mark_free(location);
        }
        match location {
            Ref::Register(reg) => AsmArg::reg(reg),
            Ref::Memory(_) => unreachable!("memory spills are not supported"),
        }
    }

    /// Ensure the reference names a register.
    pub fn guarantee_register(&mut self, location: Ref, _em: &mut Emit) -> Ref {
        match location {
            Ref::Register(_) => location,
            Ref::Memory(_) => unreachable!("memory spills are not supported"),
        }
    }

    /// Ensure the referenced value has the target datatype, emitting a
    /// conversion when it does not. The object's recorded type follows.
    pub fn guarantee_datatype(&mut self, location: Ref, target: TypeId, em: &mut Emit) -> Ref {
        debug_assert!(em.types.size(target) != 0, "conversion to zero-width type");
        let location = self.guarantee_register(location, em);
        let reg = location.register();

        let current = match self.object(location) {
            Some(object) => object.value.type_id,
            None => return location,
        };
        if current == target {
            return location;
        }

        let from = em.types.asm_datatype(current);
        let to = em.types.asm_datatype(target);

        if target == crate::types::BOOL {
            // collapse to 0/1
            em.program
                .add(create::comparison(from, reg, AsmArg::imm(0)));
            em.program
                .current_mut()
                .back_mut()
                .set_comment("boolean cast".to_string());
            em.program
                .add(create::zero(reg).with_cond(eisa::ConditionFlag::Eq));
            em.program.add(
                create::load(reg, AsmArg::imm(1)).with_cond(eisa::ConditionFlag::Ne),
            );
        } else if em.types.array_inner(current).is_some()
            && em.types.pointer_inner(target).is_some()
        {
            // array decay: the register already holds the address
        } else if from != to {
            let mut line = create::conversion(from, reg, to, reg);
            line.set_comment(format!(
                "{} -> {}",
                em.types.name(current),
                em.types.name(target)
            ));
            em.program.add(line);
        }

        if let Some(object) = self.object_mut(location) {
            object.value.type_id = target;
            if object.value.literal_value().is_some() {
                object.value.kind = ValueKind::Plain;
            }
        }
        location
    }

    /// Replace a slot's object without emitting anything.
    pub fn update(&mut self, location: Ref, object: Object) {
        if let Ref::Register(reg) = location {
            if let Some(slot) = general_slot(reg) {
                self.top_mut().regs[slot] = Some(object);
            }
        }
    }

    /// Duplicate the current store. With `save_regs`, every required
    /// occupant is pushed onto the stack so the bracketed region may
    /// clobber the registers freely.
    pub fn save_store(&mut self, save_regs: bool, em: &mut Emit) {
        let mut saved = Vec::new();
        if save_regs {
            let occupied: Vec<usize> = self
                .top()
                .regs
                .iter()
                .enumerate()
                .filter_map(|(slot, object)| match object {
                    Some(object) if object.required => Some(slot),
                    _ => None,
                })
                .collect();
            for slot in occupied {
                em.stack.push(8, em.program);
                em.program.add(create::store(
                    slot_register(slot),
                    AsmArg::reg_indirect(Register::Sp, 0),
                ));
                em.program
                    .current_mut()
                    .back_mut()
                    .set_comment(format!("save ${}", Register::name(slot_register(slot))));
                saved.push(SavedReg {
                    slot,
                    stack_offset: em.stack.offset(),
                });
            }
        }

        let mut copy = self.top().clone();
        copy.saved = saved;
        self.stores.push(copy);
    }

    /// Discard the top store. With `restore_regs`, registers saved by the
    /// matching `save_store` are reloaded in reverse order.
    pub fn destroy_store(&mut self, restore_regs: bool, em: &mut Emit) {
        let popped = self.stores.pop().expect("destroy_store without save_store");
        if self.stores.is_empty() {
            self.stores.push(Store::new());
            return;
        }

        if restore_regs {
            for saved in popped.saved.iter().rev() {
                let delta = em.stack.offset() as i64 - saved.stack_offset as i64;
                em.program.add(create::load(
                    slot_register(saved.slot),
                    AsmArg::reg_indirect(Register::Sp, delta),
                ));
                em.program.current_mut().back_mut().set_comment(format!(
                    "restore ${}",
                    Register::name(slot_register(saved.slot))
                ));
            }
        }
    }

    /// Shallow save of one register ahead of clobbering it; the occupant,
    /// if required, is parked on the stack.
    pub fn save_register(&mut self, reg: u8, em: &mut Emit) -> Option<Object> {
        let slot = general_slot(reg)?;
        let object = self.top_mut().regs[slot].take()?;
        if !object.required {
            return None;
        }
        em.stack.push(8, em.program);
        em.program
            .add(create::store(reg, AsmArg::reg_indirect(Register::Sp, 0)));
        em.program
            .current_mut()
            .back_mut()
            .set_comment(format!("save ${}", Register::name(reg)));
        Some(object)
    }

    /// Undo a `save_register`.
    pub fn restore_register(&mut self, reg: u8, object: Object, em: &mut Emit) {
        em.program
            .add(create::load(reg, AsmArg::reg_indirect(Register::Sp, 0)));
        em.program
            .current_mut()
            .back_mut()
            .set_comment(format!("restore ${}", Register::name(reg)));
        em.stack.pop(8, em.program);
        self.top_mut().regs[register_slot(reg)] = Some(object);
    }

    /// Bind the distinguished `$ret` slot.
    pub fn update_ret(&mut self, object: Object) {
        self.top_mut().ret = Some(object);
    }

    pub fn ret_object(&self) -> Option<&Object> {
        self.top().ret.as_ref()
    }

    /// Copy the `$ret` slot to the parent store.
    pub fn propagate_ret(&mut self) {
        if self.stores.len() < 2 {
            return;
        }
        let ret = self.top().ret.clone();
        let parent = self.stores.len() - 2;
        self.stores[parent].ret = ret;
    }

    pub fn depth(&self) -> usize {
        self.stores.len()
    }
}

impl Default for RegisterAllocator {
    fn default() -> RegisterAllocator {
        RegisterAllocator::new()
    }
}
