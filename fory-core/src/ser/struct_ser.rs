//! Struct serializer: field traversal order, consistent-mode schema
//! hash, compatible-mode TypeDef streaming + remote field mapping
//! (spec.md §4.8).
//!
//! Grounded on the teacher's `schema/type.rs::write_as_blob` (the same
//! "encode header, then walk sorted rows" shape as `type_def.rs`) for
//! the compatible-mode path, and on the teacher's `Resolver`'s identity
//! hashing (`structured/resolver.rs`) for folding a MurmurHash3 digest
//! down to a 32-bit guard value in consistent mode.

use fxhash::FxHashMap;

use crate::context::{ReadContext, WriteContext};
use crate::error::{ForyError, Result};
use crate::field::FieldDescriptor;
use crate::hash::{fold_to_32, murmur3_64};
use crate::registry::TypeRegistry;
use crate::type_def::RemoteTypeDef;
use crate::type_info::TypeInfo;
use crate::value::Value;

/// MurmurHash3 over the sorted `(name, field type)` sequence, folded to
/// 32 bits (spec.md §4.8 consistent mode; the exact byte layout of the
/// fold is an Open Question in spec.md §9 — this core's answer, see
/// DESIGN.md, is "hash a debug-formatted canonical string," which is
/// stable across calls within one process as long as `Debug` output for
/// `FieldType`/`TypeId` doesn't change).
pub fn schema_hash(info: &TypeInfo) -> u32 {
    let mut s = String::new();
    for f in info.sorted_fields() {
        s.push_str(&f.name);
        s.push(':');
        s.push_str(&format!("{:?}", f.field_type));
        s.push(';');
    }
    fold_to_32(murmur3_64(s.as_bytes()))
}

fn field_value<'a>(fields: &'a [(usize, Value)], index: usize) -> &'a Value {
    fields
        .iter()
        .find(|(i, _)| *i == index)
        .map(|(_, v)| v)
        .unwrap_or(&Value::Null)
}

/// Writes a struct body: mode-specific header, then each sorted field's
/// value via the generic dispatch (so nested null/ref framing is
/// uniform with every other value kind).
pub fn write_struct(
    ctx: &mut WriteContext,
    registry: &TypeRegistry,
    info: &TypeInfo,
    fields: &[(usize, Value)],
) -> Result<()> {
    if info.type_id.is_compatible_struct() {
        ctx.type_defs.write(&mut ctx.writer, &mut ctx.strings, info);
    } else {
        ctx.writer.write_u32(schema_hash(info));
    }
    for (sorted_index, field) in info.sorted_fields().into_iter().enumerate() {
        if !field.include_on_write {
            continue;
        }
        let original_index = info
            .fields
            .iter()
            .position(|f| std::ptr::eq(f, field))
            .unwrap_or(sorted_index);
        let value = field_value(fields, original_index);
        crate::ser::write_value(ctx, registry, &field.field_type, field.nullable, field.ref_override, value)?;
    }
    Ok(())
}

/// Reads a struct body for `info`, the locally registered type expected
/// at this position. Consistent mode checks the schema hash; compatible
/// mode streams/resolves a `TypeDef` and maps remote fields onto local
/// ones by name (falling back to tag id when both sides have one),
/// skipping remote fields with no local counterpart and defaulting
/// local fields absent remotely to `Value::Null` (spec.md §4.4, §8
/// testable property 6).
pub fn read_struct(ctx: &mut ReadContext, registry: &TypeRegistry, info: &TypeInfo) -> Result<Vec<(usize, Value)>> {
    if info.type_id.is_compatible_struct() {
        let remote = ctx.type_defs.read(&mut ctx.reader, &mut ctx.strings)?;
        read_compatible_fields(ctx, registry, info, &remote)
    } else {
        let hash = ctx.reader.read_u32()?;
        let expected = schema_hash(info);
        if hash != expected {
            return Err(ForyError::fory_mismatch(format!(
                "schema hash mismatch for {:?}: wire {hash:#010x}, local {expected:#010x}",
                info.type_name.as_deref().unwrap_or("<unnamed>")
            )));
        }
        let mut out = Vec::with_capacity(info.fields.len());
        for field in info.sorted_fields() {
            if !field.include_on_read {
                continue;
            }
            let value = crate::ser::read_value(ctx, registry, &field.field_type, field.nullable, field.ref_override)?;
            let index = local_index(info, field);
            out.push((index, value));
        }
        Ok(out)
    }
}

fn local_index(info: &TypeInfo, field: &FieldDescriptor) -> usize {
    info.fields.iter().position(|f| std::ptr::eq(f, field)).unwrap_or(0)
}

fn read_compatible_fields(
    ctx: &mut ReadContext,
    registry: &TypeRegistry,
    info: &TypeInfo,
    remote: &RemoteTypeDef,
) -> Result<Vec<(usize, Value)>> {
    let mut by_name: FxHashMap<&str, usize> = FxHashMap::default();
    for (i, f) in info.fields.iter().enumerate() {
        by_name.insert(f.name.as_str(), i);
    }

    let mut seen_local = vec![false; info.fields.len()];
    let mut out = Vec::with_capacity(info.fields.len());

    for remote_field in &remote.fields {
        let local_index = remote_field
            .tag_id
            .and_then(|tag| info.fields.iter().position(|f| f.tag_id == Some(tag)))
            .or_else(|| by_name.get(remote_field.name.as_str()).copied());

        match local_index {
            Some(idx) => {
                let local = &info.fields[idx];
                if local.field_type.type_id() != remote_field.field_type.type_id() {
                    return Err(ForyError::fory_mismatch(format!(
                        "field {} wire type changed: remote {:?}, local {:?}",
                        local.name,
                        remote_field.field_type.type_id(),
                        local.field_type.type_id()
                    )));
                }
                let value = crate::ser::read_value(
                    ctx,
                    registry,
                    &local.field_type,
                    remote_field.nullable,
                    local.ref_override,
                )?;
                seen_local[idx] = true;
                out.push((idx, value));
            }
            None => {
                // Remote field has no local counterpart: consume its
                // wire bytes using the remote type record, then discard.
                crate::ser::read_value(ctx, registry, &remote_field.field_type, remote_field.nullable, None)?;
            }
        }
    }

    for (idx, filled) in seen_local.into_iter().enumerate() {
        if !filled {
            out.push((idx, Value::Null));
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{FieldDescriptor, FieldType};
    use crate::reference::RefConfig;
    use crate::type_id::TypeId;
    use crate::type_info::StructHarness;
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

    fn no_ref() -> RefConfig {
        RefConfig {
            track_ref: false,
            ref_ignore_basic: true,
            ref_ignore_time: true,
            ref_ignore_string: true,
        }
    }

    fn consistent_info() -> TypeInfo {
        TypeInfo::new(
            TypeId::Struct,
            vec![
                FieldDescriptor::new("a", FieldType::Scalar(TypeId::Int32), false),
                FieldDescriptor::new("b", FieldType::Scalar(TypeId::String), false),
            ],
            Arc::new(NoopHarness),
        )
    }

    #[test]
    fn consistent_mode_roundtrip() {
        let registry = TypeRegistry::new();
        let info = consistent_info();
        let fields = vec![(0, Value::I32(7)), (1, Value::String("hi".into()))];

        let mut wctx = WriteContext::new(no_ref());
        write_struct(&mut wctx, &registry, &info, &fields).unwrap();
        let bytes = wctx.writer.dump();

        let mut rctx = ReadContext::new(&bytes, no_ref(), 8192);
        let back = read_struct(&mut rctx, &registry, &info).unwrap();
        assert_eq!(back, fields);
    }

    #[test]
    fn consistent_mode_rejects_corrupted_hash() {
        let registry = TypeRegistry::new();
        let info = consistent_info();
        let fields = vec![(0, Value::I32(7)), (1, Value::String("hi".into()))];

        let mut wctx = WriteContext::new(no_ref());
        write_struct(&mut wctx, &registry, &info, &fields).unwrap();
        let mut bytes = wctx.writer.dump();
        bytes[0] ^= 0xFF;

        let mut rctx = ReadContext::new(&bytes, no_ref(), 8192);
        let err = read_struct(&mut rctx, &registry, &info);
        assert!(matches!(err, Err(ForyError::ForyMismatch(_))));
    }

    #[test]
    fn compatible_mode_schema_evolution_drops_and_defaults_fields() {
        let registry = TypeRegistry::new();
        let writer_info = TypeInfo::new(
            TypeId::CompatibleStruct,
            vec![
                FieldDescriptor::new("f1", FieldType::Scalar(TypeId::Int32), false),
                FieldDescriptor::new("f2", FieldType::Scalar(TypeId::String), true),
                FieldDescriptor::new("f3", FieldType::Scalar(TypeId::Float64), false),
            ],
            Arc::new(NoopHarness),
        );
        let reader_info = TypeInfo::new(
            TypeId::CompatibleStruct,
            vec![
                FieldDescriptor::new("f1", FieldType::Scalar(TypeId::Int32), false),
                FieldDescriptor::new("f3", FieldType::Scalar(TypeId::Float64), false),
                FieldDescriptor::new("f4", FieldType::Scalar(TypeId::String), true),
            ],
            Arc::new(NoopHarness),
        );

        let fields = vec![
            (0, Value::I32(1)),
            (1, Value::String("dropped".into())),
            (2, Value::F64(2.5)),
        ];

        let mut wctx = WriteContext::new(no_ref());
        write_struct(&mut wctx, &registry, &writer_info, &fields).unwrap();
        let bytes = wctx.writer.dump();

        let mut rctx = ReadContext::new(&bytes, no_ref(), 8192);
        let back = read_struct(&mut rctx, &registry, &reader_info).unwrap();

        let f1 = back.iter().find(|(i, _)| *i == 0).unwrap();
        let f3 = back.iter().find(|(i, _)| *i == 1).unwrap();
        let f4 = back.iter().find(|(i, _)| *i == 2).unwrap();
        assert_eq!(f1.1, Value::I32(1));
        assert_eq!(f3.1, Value::F64(2.5));
        assert_eq!(f4.1, Value::Null);
    }
}
