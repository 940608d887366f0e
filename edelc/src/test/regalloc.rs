use crate::context::{Config, Context};
use crate::regalloc::Object;
use crate::symbols::{Category, Symbol};
use crate::types;
use crate::value::{LValue, Literal, Ref, Value};
use eisa::registers::{GENERAL_COUNT, GENERAL_START};
use util::Location;

fn context() -> Context {
    Context::new(Config::default())
}

fn add_symbol(ctx: &mut Context, name: &str, type_id: types::TypeId) -> crate::symbols::SymbolId {
    let id = ctx.symbols.new_id();
    ctx.symbols.insert(Symbol {
        id,
        name: name.to_string(),
        loc: Location::at("t.edel", 0),
        category: Category::Global,
        type_id,
        parent: None,
        constant: false,
    });
    id
}

fn symbol_object(ctx: &Context, id: crate::symbols::SymbolId) -> Object {
    let mut value = Value::of(ctx.symbols.get(id).type_id);
    value.lvalue = Some(LValue::Symbol(id));
    Object::new(value)
}

#[test]
fn insert_uses_the_first_free_slot() {
    let mut ctx = context();
    let (regs, mut em) = ctx.regs_emit();

    let first = regs.insert(Object::new(Value::of(types::U64)), &mut em);
    let second = regs.insert(Object::new(Value::of(types::U64)), &mut em);
    assert_eq!(first, Ref::reg(GENERAL_START));
    assert_eq!(second, Ref::reg(GENERAL_START + 1));
}

#[test]
fn literal_insertion_emits_a_load() {
    let mut ctx = context();
    {
        let (regs, mut em) = ctx.regs_emit();
        regs.find_or_insert_literal(Literal::new(types::I32, 42, "42"), &mut em);
    }
    let rendered = ctx.program.render(false);
    assert!(rendered.contains("load $r1, 42"), "{}", rendered);
    assert!(rendered.contains("42: i32"), "{}", rendered);
}

#[test]
fn wide_literals_load_both_halves() {
    let mut ctx = context();
    {
        let (regs, mut em) = ctx.regs_emit();
        regs.find_or_insert_literal(
            Literal::new(types::U64, 0xDEAD_BEEF_CAFE_BABE, "x"),
            &mut em,
        );
    }
    let rendered = ctx.program.render(false);
    assert!(rendered.contains("loadw $r1"), "{}", rendered);
}

#[test]
fn equal_literals_share_a_register() {
    let mut ctx = context();
    let (regs, mut em) = ctx.regs_emit();
    let first = regs.find_or_insert_literal(Literal::new(types::I64, 7, "7"), &mut em);
    let again = regs.find_or_insert_literal(Literal::new(types::I64, 7, "7"), &mut em);
    assert_eq!(first, again);
}

#[test]
fn eviction_prefers_non_required_slots() {
    let mut ctx = context();
    let (regs, mut em) = ctx.regs_emit();

    // fill every general register
    let mut refs = Vec::new();
    for _ in 0..GENERAL_COUNT {
        refs.push(regs.insert(Object::new(Value::of(types::U64)), &mut em));
    }
    // release the third one; the next insertion reuses exactly that slot
    regs.mark_free(refs[2]);
    let replacement = regs.insert(Object::new(Value::of(types::U64)), &mut em);
    assert_eq!(replacement, refs[2]);
}

#[test]
fn save_and_destroy_restore_the_visible_state() {
    let mut ctx = context();
    let id = add_symbol(&mut ctx, "x", types::I64);

    let object = symbol_object(&ctx, id);
    let before = {
        let (regs, mut em) = ctx.regs_emit();
        regs.insert(object, &mut em)
    };

    {
        let (regs, mut em) = ctx.regs_emit();
        regs.save_store(true, &mut em);
        // the bracketed region clobbers freely
        regs.evict(before);
        regs.insert(Object::new(Value::of(types::U64)), &mut em);
        regs.destroy_store(true, &mut em);
    }

    // the original binding is visible again
    assert_eq!(ctx.regs.find_symbol(id), Some(before));

    let rendered = ctx.program.render(false);
    assert!(rendered.contains("save $r1"), "{}", rendered);
    assert!(rendered.contains("restore $r1"), "{}", rendered);
}

#[test]
fn guarantee_datatype_emits_a_conversion() {
    let mut ctx = context();
    let reference = {
        let (regs, mut em) = ctx.regs_emit();
        let reference =
            regs.find_or_insert_literal(Literal::new(types::I32, 3, "3"), &mut em);
        regs.guarantee_datatype(reference, types::F64, &mut em)
    };
    assert!(reference.is_register());
    let rendered = ctx.program.render(false);
    assert!(rendered.contains("cvthi2d $r1, $r1"), "{}", rendered);

    // the slot's recorded type follows the conversion
    let object = ctx.regs.object(reference).unwrap();
    assert_eq!(object.value.type_id, types::F64);
}

#[test]
fn guarantee_datatype_is_a_no_op_for_matching_types() {
    let mut ctx = context();
    {
        let (regs, mut em) = ctx.regs_emit();
        let reference =
            regs.find_or_insert_literal(Literal::new(types::U64, 3, "3"), &mut em);
        regs.guarantee_datatype(reference, types::U64, &mut em);
    }
    let rendered = ctx.program.render(false);
    assert!(!rendered.contains("cvt"), "{}", rendered);
}

#[test]
fn boolean_coercion_collapses_to_zero_or_one() {
    let mut ctx = context();
    {
        let (regs, mut em) = ctx.regs_emit();
        let reference =
            regs.find_or_insert_literal(Literal::new(types::U64, 3, "3"), &mut em);
        regs.guarantee_datatype(reference, types::BOOL, &mut em);
    }
    let rendered = ctx.program.render(false);
    assert!(rendered.contains("cmp"), "{}", rendered);
    assert!(rendered.contains("zeroeq $r1"), "{}", rendered);
    assert!(rendered.contains("loadne $r1, 1"), "{}", rendered);
}

#[test]
fn history_tracks_recent_allocations() {
    let mut ctx = context();
    let (regs, mut em) = ctx.regs_emit();
    let a = regs.insert(Object::new(Value::of(types::U64)), &mut em);
    let b = regs.insert(Object::new(Value::of(types::U64)), &mut em);
    assert_eq!(regs.get_recent(0), Some(b));
    assert_eq!(regs.get_recent(1), Some(a));
    assert_eq!(regs.get_recent(2), None);
}

#[test]
fn ret_slot_propagates_to_the_parent_store() {
    let mut ctx = context();
    {
        let (regs, mut em) = ctx.regs_emit();
        regs.save_store(false, &mut em);
        regs.update_ret(Object::new(Value::rvalue_of(
            types::I64,
            Ref::reg(eisa::Register::Ret.index()),
        )));
        regs.propagate_ret();
        regs.destroy_store(false, &mut em);
    }
    let ret = ctx.regs.ret_object().expect("ret slot is empty");
    assert_eq!(ret.value.type_id, types::I64);
}
