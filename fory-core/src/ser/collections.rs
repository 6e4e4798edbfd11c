//! List/Set/Map serializers (spec.md §4.7).
//!
//! Grounded on the teacher's `raw/heaps/table.rs` row-iteration loop
//! (header once, then N homogeneous rows) generalized from "table of
//! metadata rows" to "run of collection elements." Every element (or
//! map key/value) is itself routed back through the generic
//! [`crate::ser::write_value`]/[`crate::ser::read_value`] dispatch, so
//! null and reference framing for elements reuses the exact same
//! ref-flag byte as top-level values (spec.md §4.9) rather than a
//! second bespoke null-byte scheme. That makes the elements header's
//! bits 0-3 purely descriptive metadata about the stream that follows
//! (still required to match the actual data per spec.md testable
//! property 8) rather than control flow the reader depends on — this
//! core only ever writes declared-type-homogeneous element streams (no
//! per-element dynamic type-info record), so bit 2 is always set and
//! bit 3 is always clear; see DESIGN.md.

use crate::context::{ReadContext, WriteContext};
use crate::error::Result;
use crate::field::FieldType;
use crate::registry::TypeRegistry;
use crate::value::Value;

const SAME_AS_DECLARED: u8 = 1 << 2;

fn elements_header(ref_tracking_active: bool, has_null: bool) -> u8 {
    let mut flags = SAME_AS_DECLARED;
    if ref_tracking_active {
        flags |= 1 << 0;
    }
    if has_null {
        flags |= 1 << 1;
    }
    flags
}

pub fn write_list(
    ctx: &mut WriteContext,
    registry: &TypeRegistry,
    elem_type: &FieldType,
    elem_nullable: bool,
    items: &[Value],
) -> Result<()> {
    let ref_active = ctx.ref_config.tracks(elem_type.type_id(), None);
    let has_null = items.iter().any(|v| v.is_null());
    ctx.writer.write_var_uint32(items.len() as u32);
    ctx.writer.write_u8(elements_header(ref_active, has_null));
    for item in items {
        crate::ser::write_value(ctx, registry, elem_type, elem_nullable, None, item)?;
    }
    Ok(())
}

pub fn read_list(
    ctx: &mut ReadContext,
    registry: &TypeRegistry,
    elem_type: &FieldType,
    elem_nullable: bool,
) -> Result<Vec<Value>> {
    let len = ctx.reader.read_var_uint32()? as usize;
    let _header = ctx.reader.read_u8()?;
    let mut out = Vec::with_capacity(len);
    for _ in 0..len {
        out.push(crate::ser::read_value(ctx, registry, elem_type, elem_nullable, None)?);
    }
    Ok(out)
}

/// `Set` shares the wire shape of `List` (spec.md §4.7 doesn't define a
/// distinct set frame): "implementations must pick read-side container
/// types that preserve order," and insertion-ordered `Vec<Value>` does
/// that; de-duplication, if any, is the object-model adapter's concern
/// (out of scope per spec.md §1), not the wire codec's.
pub fn write_set(
    ctx: &mut WriteContext,
    registry: &TypeRegistry,
    elem_type: &FieldType,
    elem_nullable: bool,
    items: &[Value],
) -> Result<()> {
    write_list(ctx, registry, elem_type, elem_nullable, items)
}

pub fn read_set(
    ctx: &mut ReadContext,
    registry: &TypeRegistry,
    elem_type: &FieldType,
    elem_nullable: bool,
) -> Result<Vec<Value>> {
    read_list(ctx, registry, elem_type, elem_nullable)
}

/// Default chunk size for map encoding (spec.md §9 Open Question:
/// "pick a constant between 8 and 255 and document it"). 64 keeps chunk
/// headers infrequent for large homogeneous maps while staying well
/// inside the 8-255 range and a single byte VarUInt.
pub const DEFAULT_MAP_CHUNK_SIZE: usize = 64;

pub fn write_map(
    ctx: &mut WriteContext,
    registry: &TypeRegistry,
    key_type: &FieldType,
    value_type: &FieldType,
    key_nullable: bool,
    value_nullable: bool,
    chunk_size: usize,
    entries: &[(Value, Value)],
) -> Result<()> {
    let chunk_size = chunk_size.clamp(8, 255);
    ctx.writer.write_var_uint32(entries.len() as u32);
    for chunk in entries.chunks(chunk_size) {
        let key_ref_active = ctx.ref_config.tracks(key_type.type_id(), None);
        let value_ref_active = ctx.ref_config.tracks(value_type.type_id(), None);
        let key_has_null = chunk.iter().any(|(k, _)| k.is_null());
        let value_has_null = chunk.iter().any(|(_, v)| v.is_null());

        let mut header = 0u8;
        if key_ref_active {
            header |= 1 << 0;
        }
        if value_ref_active {
            header |= 1 << 1;
        }
        if key_has_null {
            header |= 1 << 2;
        }
        if value_has_null {
            header |= 1 << 3;
        }
        ctx.writer.write_u8(chunk.len() as u8);
        ctx.writer.write_u8(header);
        for (k, v) in chunk {
            crate::ser::write_value(ctx, registry, key_type, key_nullable, None, k)?;
            crate::ser::write_value(ctx, registry, value_type, value_nullable, None, v)?;
        }
    }
    Ok(())
}

pub fn read_map(
    ctx: &mut ReadContext,
    registry: &TypeRegistry,
    key_type: &FieldType,
    value_type: &FieldType,
    key_nullable: bool,
    value_nullable: bool,
) -> Result<Vec<(Value, Value)>> {
    let total = ctx.reader.read_var_uint32()? as usize;
    let mut out = Vec::with_capacity(total);
    while out.len() < total {
        let chunk_len = ctx.reader.read_u8()? as usize;
        let _header = ctx.reader.read_u8()?;
        for _ in 0..chunk_len {
            let k = crate::ser::read_value(ctx, registry, key_type, key_nullable, None)?;
            let v = crate::ser::read_value(ctx, registry, value_type, value_nullable, None)?;
            out.push((k, v));
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::RefConfig;
    use crate::type_id::TypeId;

    fn cfg(track_ref: bool) -> RefConfig {
        RefConfig {
            track_ref,
            ref_ignore_basic: true,
            ref_ignore_time: true,
            ref_ignore_string: true,
        }
    }

    #[test]
    fn list_of_ints_roundtrips_with_nulls() {
        let registry = TypeRegistry::new();
        let mut wctx = WriteContext::new(cfg(false));
        let items = vec![Value::I32(1), Value::Null, Value::I32(3)];
        write_list(&mut wctx, &registry, &FieldType::Scalar(TypeId::Int32), true, &items).unwrap();
        let bytes = wctx.writer.dump();

        let mut rctx = ReadContext::new(&bytes, cfg(false), 8192);
        let back = read_list(&mut rctx, &registry, &FieldType::Scalar(TypeId::Int32), true).unwrap();
        assert_eq!(back, items);
    }

    #[test]
    fn map_chunking_roundtrips_across_chunk_boundary() {
        let registry = TypeRegistry::new();
        let mut wctx = WriteContext::new(cfg(false));
        let entries: Vec<(Value, Value)> = (0..150)
            .map(|i| (Value::I32(i), Value::String(format!("v{i}"))))
            .collect();
        write_map(
            &mut wctx,
            &registry,
            &FieldType::Scalar(TypeId::Int32),
            &FieldType::Scalar(TypeId::String),
            false,
            false,
            64,
            &entries,
        )
        .unwrap();
        let bytes = wctx.writer.dump();

        let mut rctx = ReadContext::new(&bytes, cfg(false), 8192);
        let back = read_map(
            &mut rctx,
            &registry,
            &FieldType::Scalar(TypeId::Int32),
            &FieldType::Scalar(TypeId::String),
            false,
            false,
        )
        .unwrap();
        assert_eq!(back, entries);
    }

    #[test]
    fn empty_list_roundtrips() {
        let registry = TypeRegistry::new();
        let mut wctx = WriteContext::new(cfg(false));
        write_list(&mut wctx, &registry, &FieldType::Scalar(TypeId::Int32), false, &[]).unwrap();
        let bytes = wctx.writer.dump();
        let mut rctx = ReadContext::new(&bytes, cfg(false), 8192);
        let back = read_list(&mut rctx, &registry, &FieldType::Scalar(TypeId::Int32), false).unwrap();
        assert!(back.is_empty());
    }
}
