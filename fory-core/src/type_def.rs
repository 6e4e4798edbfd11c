//! TypeDef streaming: inline schema blocks for `COMPATIBLE_STRUCT`/
//! `NAMED_COMPATIBLE_STRUCT` occurrences, de-duplicated within a
//! message and cached across messages (spec.md §3 `TypeDef`, §4.4).
//!
//! Grounded on the teacher's `raw/heaps/table.rs` (fixed-header +
//! variable-row parsing of a metadata table) for the header/body split,
//! and `schema/type.rs::write_as_blob` for the "encode once, cache the
//! bytes" shape now held by `TypeInfo::cached_type_def`.

use std::collections::VecDeque;
use std::sync::Arc;

use fxhash::FxHashMap;

use crate::buffer::{Reader, Writer};
use crate::error::{ForyError, Result};
use crate::field::FieldType;
use crate::hash::murmur3_64;
use crate::meta_string::{MetaStringReaderTable, MetaStringWriterTable};
use crate::type_id::TypeId;
use crate::type_info::{TypeInfo, UserTypeId};

/// One field entry as streamed inline: `spec.md`'s "[for each field:
/// optional tag-id VarUInt, name MetaString, recursive field type
/// record]".
#[derive(Clone, Debug)]
pub struct RemoteField {
    pub tag_id: Option<i32>,
    pub name: String,
    pub field_type: FieldType,
    pub nullable: bool,
}

/// A parsed TypeDef as seen by the reader: enough to walk the remote
/// field list in encoding order, independent of whether the local
/// registry has a matching type at all (spec.md §4.4 schema evolution).
#[derive(Clone, Debug)]
pub struct RemoteTypeDef {
    pub kind: TypeId,
    pub user_type_id: Option<UserTypeId>,
    pub namespace: Option<String>,
    pub type_name: Option<String>,
    pub fields: Vec<RemoteField>,
}

const HEADER_LEN: usize = 8;

fn encode_body(info: &TypeInfo, strings: &mut MetaStringWriterTable) -> Vec<u8> {
    let mut w = Writer::new();
    let has_user_id = info.user_type_id.is_some();
    if has_user_id {
        w.write_var_uint32(info.user_type_id.unwrap());
    }
    strings.write(&mut w, info.namespace.as_deref().unwrap_or(""));
    strings.write(&mut w, info.type_name.as_deref().unwrap_or(""));
    w.write_var_uint32(info.fields.len() as u32);
    for field in info.sorted_fields() {
        let has_tag = field.tag_id.is_some();
        w.write_bool(has_tag);
        if let Some(tag) = field.tag_id {
            w.write_var_int32(tag);
        }
        strings.write(&mut w, &field.name);
        field.field_type.write(&mut w, strings, field.nullable);
    }
    w.dump()
}

/// Encodes `info`'s TypeDef: 8-byte header (body size, kind flags,
/// tag-id presence, hash fragment) followed by the body produced by
/// `encode_body`.
pub fn encode_type_def(info: &TypeInfo, strings: &mut MetaStringWriterTable) -> Vec<u8> {
    let body = encode_body(info, strings);
    let has_tag_ids = info.fields.iter().any(|f| f.tag_id.is_some());
    let is_named = info.namespace.is_some();
    let mut flags = 0u8;
    if is_named {
        flags |= 0b01;
    }
    if has_tag_ids {
        flags |= 0b10;
    }
    let hash = murmur3_64(&body);
    let hash_fragment = (hash & 0x00FF_FFFF) as u32;

    let mut header = Vec::with_capacity(HEADER_LEN + body.len());
    header.extend_from_slice(&(body.len() as u32).to_le_bytes());
    header.push(info.type_id.as_u32() as u8);
    header.push(flags);
    header.extend_from_slice(&hash_fragment.to_le_bytes()[..2]);
    header.extend_from_slice(&body);
    header
}

/// Reads one TypeDef starting at the reader's current position
/// (assumes the "new" tagged-marker branch already consumed).
pub fn decode_type_def(reader: &mut Reader, strings: &mut MetaStringReaderTable) -> Result<RemoteTypeDef> {
    let body_len = reader.read_u32()? as usize;
    let kind_byte = reader.read_u8()?;
    let flags = reader.read_u8()?;
    let _hash_fragment = reader.read_u16()?;
    let kind = TypeId::try_from(kind_byte as u32)?;

    let body_start = reader.position();
    let has_user_id = !flags_is_named(flags);
    let user_type_id = if has_user_id { Some(reader.read_var_uint32()?) } else { None };
    let namespace = strings.read(reader)?;
    let type_name = strings.read(reader)?;
    let field_count = reader.read_var_uint32()? as usize;
    let mut fields = Vec::with_capacity(field_count);
    for _ in 0..field_count {
        let has_tag = reader.read_bool()?;
        let tag_id = if has_tag { Some(reader.read_var_int32()?) } else { None };
        let name = strings.read(reader)?;
        let (field_type, nullable) = FieldType::read(reader, strings)?;
        fields.push(RemoteField {
            tag_id,
            name,
            field_type,
            nullable,
        });
    }

    let consumed = reader.position() - body_start;
    if consumed != body_len {
        return Err(ForyError::invalid_data(format!(
            "TypeDef body length mismatch: header said {body_len}, consumed {consumed}"
        )));
    }

    Ok(RemoteTypeDef {
        kind,
        user_type_id,
        namespace: if namespace.is_empty() { None } else { Some(namespace) },
        type_name: if type_name.is_empty() { None } else { Some(type_name) },
        fields,
    })
}

fn flags_is_named(flags: u8) -> bool {
    flags & 0b01 != 0
}

/// Per-message write-side de-duplication: the first occurrence of a
/// given `TypeInfo` writes `write_tagged_uint64(idx, false)` followed
/// by the full encoded TypeDef; later occurrences in the same message
/// write just `write_tagged_uint64(idx, true)`.
#[derive(Default)]
pub struct TypeDefWriterTable {
    index: FxHashMap<*const TypeInfo, u32>,
}

impl TypeDefWriterTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.index.clear();
    }

    pub fn write(&mut self, writer: &mut Writer, strings: &mut MetaStringWriterTable, info: &TypeInfo) {
        let key = info as *const TypeInfo;
        if let Some(&idx) = self.index.get(&key) {
            writer.write_tagged_uint64(idx as u64, true);
            return;
        }
        let idx = self.index.len() as u32;
        self.index.insert(key, idx);
        writer.write_tagged_uint64(idx as u64, false);
        let bytes = match info.cached_type_def() {
            Some(cached) => (*cached).clone(),
            None => {
                let encoded = encode_type_def(info, strings);
                info.set_cached_type_def(Arc::new(encoded.clone()));
                encoded
            }
        };
        writer.write_raw(&bytes);
    }
}

/// Per-message read-side de-duplication, backed by a bounded
/// cross-message cache keyed by the body hash fragment (spec.md §5
/// resource bounds: 8192 entries by default).
pub struct TypeDefReaderTable {
    seen: Vec<Arc<RemoteTypeDef>>,
    cache: TypeDefCache,
}

impl TypeDefReaderTable {
    pub fn new(cache_cap: usize) -> Self {
        Self {
            seen: Vec::new(),
            cache: TypeDefCache::new(cache_cap),
        }
    }

    pub fn reset(&mut self) {
        self.seen.clear();
    }

    pub fn read(&mut self, reader: &mut Reader, strings: &mut MetaStringReaderTable) -> Result<Arc<RemoteTypeDef>> {
        let (idx, is_ref) = reader.read_tagged_uint64()?;
        if is_ref {
            return self
                .seen
                .get(idx as usize)
                .cloned()
                .ok_or_else(|| ForyError::invalid_data("TypeDef back-reference out of range"));
        }
        let def = Arc::new(decode_type_def(reader, strings)?);
        self.cache.insert(&def);
        self.seen.push(def.clone());
        Ok(def)
    }
}

/// Bounded, process-wide cache of parsed TypeDefs keyed by a cheap
/// content signature. A full LRU is unnecessary here: schema reuse is
/// overwhelmingly within-process and within a handful of distinct
/// schemas, so plain FIFO eviction once the cap is hit is sufficient to
/// bound memory against adversarial input (spec.md §5).
struct TypeDefCache {
    cap: usize,
    order: VecDeque<u64>,
    entries: FxHashMap<u64, Arc<RemoteTypeDef>>,
}

impl TypeDefCache {
    fn new(cap: usize) -> Self {
        Self {
            cap,
            order: VecDeque::new(),
            entries: FxHashMap::default(),
        }
    }

    fn insert(&mut self, def: &Arc<RemoteTypeDef>) {
        let key = signature(def);
        if self.entries.contains_key(&key) {
            return;
        }
        if self.entries.len() >= self.cap {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
            }
        }
        self.order.push_back(key);
        self.entries.insert(key, def.clone());
    }
}

fn signature(def: &RemoteTypeDef) -> u64 {
    let mut s = format!("{:?}|{:?}|{:?}", def.kind, def.user_type_id, def.type_name);
    for f in &def.fields {
        s.push_str(&f.name);
    }
    murmur3_64(s.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::FieldDescriptor;
    use crate::type_info::StructHarness;
    use std::any::Any;

    struct NoopHarness;
    impl StructHarness for NoopHarness {
        fn construct_empty(&self) -> Box<dyn Any> {
            Box::new(())
        }
        fn get_field(&self, _obj: &dyn Any, _field_index: usize) -> crate::value::Value {
            crate::value::Value::Null
        }
        fn set_field(&self, _obj: &mut dyn Any, _field_index: usize, _value: crate::value::Value) {}
    }

    fn sample() -> TypeInfo {
        TypeInfo::new(
            TypeId::CompatibleStruct,
            vec![
                FieldDescriptor::new("a", FieldType::Scalar(TypeId::Int32), false),
                FieldDescriptor::new("b", FieldType::Scalar(TypeId::String), true).with_tag_id(2),
            ],
            std::sync::Arc::new(NoopHarness),
        )
        .with_user_id(7)
    }

    #[test]
    fn roundtrip_type_def() {
        let info = sample();
        let mut ws = MetaStringWriterTable::new();
        let encoded = encode_type_def(&info, &mut ws);
        let mut r = Reader::new(&encoded);
        let mut rs = MetaStringReaderTable::new();
        let decoded = decode_type_def(&mut r, &mut rs).unwrap();
        assert_eq!(decoded.user_type_id, Some(7));
        assert_eq!(decoded.fields.len(), 2);
        assert_eq!(decoded.fields[1].tag_id, Some(2));
    }

    #[test]
    fn writer_table_dedups_within_message() {
        let info = sample();
        let mut wt = TypeDefWriterTable::new();
        let mut ws = MetaStringWriterTable::new();
        let mut w = Writer::new();
        wt.write(&mut w, &mut ws, &info);
        let first_len = w.len();
        wt.write(&mut w, &mut ws, &info);
        let second_len = w.len() - first_len;
        assert!(second_len <= 2, "repeat occurrence should just be a tagged varuint, got {second_len} bytes");
    }

    #[test]
    fn reader_table_resolves_back_reference() {
        let info = sample();
        let mut wt = TypeDefWriterTable::new();
        let mut ws = MetaStringWriterTable::new();
        let mut w = Writer::new();
        wt.write(&mut w, &mut ws, &info);
        wt.write(&mut w, &mut ws, &info);
        let bytes = w.dump();

        let mut r = Reader::new(&bytes);
        let mut rs = MetaStringReaderTable::new();
        let mut rt = TypeDefReaderTable::new(8192);
        let first = rt.read(&mut r, &mut rs).unwrap();
        let second = rt.read(&mut r, &mut rs).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }
}
