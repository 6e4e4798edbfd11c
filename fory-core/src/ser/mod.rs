//! Generic value dispatch: the null/ref flag framing shared by every
//! field, list element, map key/value, and top-level payload (spec.md
//! §4.9), delegating the body encoding to a per-category submodule.
//!
//! Grounded on the teacher's `TableKind`-tagged dispatch in
//! `raw/heaps/table.rs` (one `match` on a kind byte routing to the
//! right row reader) — generalized here from "which metadata table" to
//! "which wire category," with the null/ref flag handling hoisted out
//! of each category so it is written exactly once.

pub mod collections;
pub mod primitives;
pub mod struct_ser;
pub mod strings_time;

use std::cell::RefCell;
use std::rc::Rc;

use crate::context::{ReadContext, WriteContext};
use crate::error::{ForyError, Result};
use crate::field::FieldType;
use crate::reference::RefAction;
use crate::registry::TypeRegistry;
use crate::type_id::TypeId;
use crate::value::Value;

/// Writes `value` as a field of declared type `field_type`, honoring
/// `nullable` and the ref-tracking override for this occurrence.
///
/// `Value::Ref` is the only value shape that gets real identity-based
/// de-duplication (spec.md §4.5 "Write side"); a plain (non-`Ref`)
/// trackable value is always written as a fresh occurrence, since
/// nothing about it carries a stable identity to de-duplicate against.
pub fn write_value(
    ctx: &mut WriteContext,
    registry: &TypeRegistry,
    field_type: &FieldType,
    nullable: bool,
    ref_override: Option<bool>,
    value: &Value,
) -> Result<()> {
    if value.is_null() {
        if !nullable {
            return Err(ctx.fail(ForyError::invalid_data(format!(
                "null value written for non-nullable field of type {:?}",
                field_type.type_id()
            ))));
        }
        ctx.ref_writer.write_null(&mut ctx.writer);
        return Ok(());
    }

    if let Value::Ref(cell) = value {
        let identity = Rc::as_ptr(cell) as usize;
        if ctx.ref_config.tracks(field_type.type_id(), ref_override) {
            let must_recurse = ctx.ref_writer.write_flag(&mut ctx.writer, identity);
            if must_recurse {
                let inner = cell
                    .borrow()
                    .as_ref()
                    .cloned()
                    .ok_or_else(|| ForyError::InvalidParam("Ref cell written before it was filled".into()))?;
                return write_body(ctx, registry, field_type, &inner);
            }
            return Ok(());
        }
        ctx.ref_writer.write_not_null_untracked(&mut ctx.writer);
        let inner = cell
            .borrow()
            .as_ref()
            .cloned()
            .ok_or_else(|| ForyError::InvalidParam("Ref cell written before it was filled".into()))?;
        return write_body(ctx, registry, field_type, &inner);
    }

    ctx.ref_writer.write_not_null_untracked(&mut ctx.writer);
    write_body(ctx, registry, field_type, value)
}

fn write_body(ctx: &mut WriteContext, registry: &TypeRegistry, field_type: &FieldType, value: &Value) -> Result<()> {
    let type_id = field_type.type_id();
    if type_id.is_basic() {
        return primitives::write(&mut ctx.writer, type_id, value);
    }
    if type_id.is_time() || type_id == TypeId::String || type_id == TypeId::Binary {
        return strings_time::write(&mut ctx.writer, &mut ctx.strings, type_id, value);
    }
    match field_type {
        FieldType::List(inner) => {
            let items = expect_list(value)?;
            collections::write_list(ctx, registry, inner, true, items)
        }
        FieldType::Set(inner) => {
            let items = expect_list(value)?;
            collections::write_set(ctx, registry, inner, true, items)
        }
        FieldType::Map(k, v) => {
            let entries = expect_map(value)?;
            let chunk_size = ctx.map_chunk_size;
            collections::write_map(ctx, registry, k, v, true, true, chunk_size, entries)
        }
        FieldType::UserById(_, id) => {
            let info = registry
                .lookup_by_id(*id)
                .ok_or(ForyError::UnregisteredType(*id))?;
            let fields = expect_struct(value)?;
            struct_ser::write_struct(ctx, registry, info, fields)
        }
        FieldType::UserByName(_, ns, name) => {
            let info = registry
                .lookup_by_name(ns, name)
                .ok_or_else(|| ForyError::invalid_data(format!("unregistered type {ns}.{name}")))?;
            let fields = expect_struct(value)?;
            struct_ser::write_struct(ctx, registry, info, fields)
        }
        FieldType::Scalar(_) => Err(ForyError::UnsupportedType(format!("no body writer for {type_id:?}"))),
    }
}

/// Reads a field of declared type `field_type`, mirroring
/// [`write_value`]'s framing. `Value::Ref` is produced whenever this
/// occurrence participates in ref tracking, so cyclic back-edges come
/// back as a shared `Rc` cell rather than a deep clone.
pub fn read_value(
    ctx: &mut ReadContext,
    registry: &TypeRegistry,
    field_type: &FieldType,
    nullable: bool,
    ref_override: Option<bool>,
) -> Result<Value> {
    if ctx.ref_config.tracks(field_type.type_id(), ref_override) {
        return match ctx.refs.read_flag(&mut ctx.reader)? {
            RefAction::Null => {
                if !nullable {
                    return Err(ForyError::invalid_data("null flag read for non-nullable field"));
                }
                Ok(Value::Null)
            }
            RefAction::Existing(slot) => Ok(Value::Ref(slot.handle())),
            RefAction::New(_, slot) => {
                let body = read_body(ctx, registry, field_type)?;
                slot.fill(body);
                Ok(Value::Ref(slot.handle()))
            }
            RefAction::Untracked => read_body(ctx, registry, field_type),
        };
    }

    // Ref tracking is off for this occurrence; the flag byte is still
    // written (spec.md §4.5's `NULL_FLAG`/`NOT_NULL_VALUE_FLAG` pair),
    // just never resolved against the identity table.
    let flag = ctx.reader.read_i8()?;
    match flag {
        crate::reference::NULL_FLAG => {
            if !nullable {
                return Err(ForyError::invalid_data("null flag read for non-nullable field"));
            }
            Ok(Value::Null)
        }
        crate::reference::NOT_NULL_VALUE_FLAG => read_body(ctx, registry, field_type),
        other => Err(ForyError::InvalidRef(other)),
    }
}

fn read_body(ctx: &mut ReadContext, registry: &TypeRegistry, field_type: &FieldType) -> Result<Value> {
    let type_id = field_type.type_id();
    if type_id.is_basic() {
        return primitives::read(&mut ctx.reader, type_id);
    }
    if type_id.is_time() || type_id == TypeId::String || type_id == TypeId::Binary {
        return strings_time::read(&mut ctx.reader, &mut ctx.strings, type_id);
    }
    match field_type {
        FieldType::List(inner) => Ok(Value::List(collections::read_list(ctx, registry, inner, true)?)),
        FieldType::Set(inner) => Ok(Value::List(collections::read_set(ctx, registry, inner, true)?)),
        FieldType::Map(k, v) => Ok(Value::Map(collections::read_map(ctx, registry, k, v, true, true)?)),
        FieldType::UserById(_, id) => {
            let info = registry
                .lookup_by_id(*id)
                .ok_or(ForyError::UnregisteredType(*id))?;
            Ok(Value::Struct(struct_ser::read_struct(ctx, registry, info)?))
        }
        FieldType::UserByName(_, ns, name) => {
            let info = registry
                .lookup_by_name(ns, name)
                .ok_or_else(|| ForyError::invalid_data(format!("unregistered type {ns}.{name}")))?;
            Ok(Value::Struct(struct_ser::read_struct(ctx, registry, info)?))
        }
        FieldType::Scalar(_) => Err(ForyError::UnsupportedType(format!("no body reader for {type_id:?}"))),
    }
}

fn expect_list(value: &Value) -> Result<&[Value]> {
    match value {
        Value::List(items) => Ok(items),
        other => Err(ForyError::invalid_data(format!("expected a list value, found {other:?}"))),
    }
}

fn expect_map(value: &Value) -> Result<&[(Value, Value)]> {
    match value {
        Value::Map(entries) => Ok(entries),
        other => Err(ForyError::invalid_data(format!("expected a map value, found {other:?}"))),
    }
}

fn expect_struct(value: &Value) -> Result<&[(usize, Value)]> {
    match value {
        Value::Struct(fields) => Ok(fields),
        other => Err(ForyError::invalid_data(format!("expected a struct value, found {other:?}"))),
    }
}

/// Wraps `value` in a fresh reference-tracked cell (spec.md §4.5,
/// SPEC_FULL.md §7's `Value::Ref` representation), for callers building
/// up shared/cyclic graphs by hand before calling [`write_value`].
pub fn make_ref(value: Value) -> Value {
    Value::Ref(Rc::new(RefCell::new(Some(value))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::FieldDescriptor;
    use crate::reference::RefConfig;
    use crate::type_info::{StructHarness, TypeInfo};
    use std::any::Any;
    use std::sync::Arc;

    struct NoopHarness;
    impl StructHarness for NoopHarness {
        fn construct_empty(&self) -> Box<dyn Any> {
            Box::new(())
        }
        fn get_field(&self, _obj: &dyn Any, _field_index: usize) -> Value {
            Value::Null
        }
        fn set_field(&self, _obj: &mut dyn Any, _field_index: usize, _value: Value) {}
    }

    fn track_basics() -> RefConfig {
        RefConfig {
            track_ref: true,
            ref_ignore_basic: false,
            ref_ignore_time: true,
            ref_ignore_string: true,
        }
    }

    #[test]
    fn shared_reference_round_trips_to_the_same_cell() {
        let registry = TypeRegistry::new();
        let shared = make_ref(Value::I32(2026));
        let pair = Value::List(vec![shared.clone(), shared]);

        let mut wctx = WriteContext::new(track_basics());
        write_value(
            &mut wctx,
            &registry,
            &FieldType::List(Box::new(FieldType::Scalar(TypeId::Int32))),
            false,
            None,
            &pair,
        )
        .unwrap();
        let bytes = wctx.writer.dump();

        let mut rctx = ReadContext::new(&bytes, track_basics(), 8192);
        let back = read_value(
            &mut rctx,
            &registry,
            &FieldType::List(Box::new(FieldType::Scalar(TypeId::Int32))),
            false,
            None,
        )
        .unwrap();

        let items = expect_list(&back).unwrap();
        let (Value::Ref(a), Value::Ref(b)) = (&items[0], &items[1]) else {
            panic!("expected both list elements to come back as Ref cells");
        };
        assert!(Rc::ptr_eq(a, b));
        assert_eq!(a.borrow().as_ref().unwrap(), &Value::I32(2026));
    }

    #[test]
    fn cyclic_struct_self_reference_round_trips() {
        let mut registry = TypeRegistry::new();
        struct Marker;
        let info = TypeInfo::new(
            TypeId::CompatibleStruct,
            vec![
                FieldDescriptor::new("name", FieldType::Scalar(TypeId::String), false),
                FieldDescriptor::new("self_ref", FieldType::UserById(TypeId::CompatibleStruct, 1), false),
            ],
            Arc::new(NoopHarness),
        )
        .with_user_id(1);
        registry.register(std::any::TypeId::of::<Marker>(), info).unwrap();

        let cell: Rc<RefCell<Option<Value>>> = Rc::new(RefCell::new(None));
        let self_ref = Value::Ref(cell.clone());
        let body = Value::Struct(vec![(0, Value::String("root".into())), (1, self_ref)]);
        *cell.borrow_mut() = Some(body);
        let root = Value::Ref(cell);

        let field_type = FieldType::UserById(TypeId::CompatibleStruct, 1);
        let mut wctx = WriteContext::new(track_basics());
        write_value(&mut wctx, &registry, &field_type, false, None, &root).unwrap();
        let bytes = wctx.writer.dump();

        let mut rctx = ReadContext::new(&bytes, track_basics(), 8192);
        let back = read_value(&mut rctx, &registry, &field_type, false, None).unwrap();

        let Value::Ref(root_cell) = &back else {
            panic!("expected the struct to come back wrapped in Ref");
        };
        let borrowed = root_cell.borrow();
        let Some(Value::Struct(fields)) = &*borrowed else {
            panic!("expected a filled struct shell");
        };
        let Value::Ref(self_cell) = &fields[1].1 else {
            panic!("expected self_ref field to be a Ref cell");
        };
        assert!(Rc::ptr_eq(root_cell, self_cell));
    }
}
