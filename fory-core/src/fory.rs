//! `Fory`: the top-level entry point — configuration, the type
//! registry, and message framing (spec.md §6, §9 "Framing & dispatch").
//!
//! Grounded on the teacher's `Context::new`/builder-style construction
//! (`structured/context.rs`) for the configuration surface, and its
//! top-level `resolve`/`read` entry points for the header-then-dispatch
//! shape implemented here as [`Fory::serialize`]/[`Fory::deserialize`].

use std::any::TypeId as NativeTypeId;
use std::sync::Arc;

use crate::buffer::{Reader, Writer};
use crate::context::{ReadContext, WriteContext};
use crate::error::Result;
use crate::field::FieldType;
use crate::reference::RefConfig;
use crate::registry::TypeRegistry;
use crate::ser::collections::DEFAULT_MAP_CHUNK_SIZE;
use crate::type_def::TypeDefReaderTable;
use crate::type_info::{StructHarness, TypeInfo, UserTypeId};
use crate::value::Value;

const HEADER_NULL: u8 = 1 << 0;
const HEADER_XLANG: u8 = 1 << 1;
const HEADER_OUT_OF_BAND: u8 = 1 << 2;

const DEFAULT_TYPE_DEF_CACHE_CAP: usize = 8192;

/// Configuration accumulated by [`FbuilderState`] before [`build`] locks
/// it into an immutable [`Fory`] instance (spec.md §6 programmatic
/// surface; §5 "the type registry ... is read-only during encode/
/// decode").
#[derive(Clone, Copy, Debug)]
struct FuryOptions {
    xlang: bool,
    compatible: bool,
    ref_config: RefConfig,
    map_chunk_size: usize,
    type_def_cache_cap: usize,
}

impl Default for FuryOptions {
    fn default() -> Self {
        Self {
            xlang: false,
            compatible: false,
            ref_config: RefConfig {
                track_ref: false,
                ref_ignore_basic: true,
                ref_ignore_time: true,
                ref_ignore_string: true,
            },
            map_chunk_size: DEFAULT_MAP_CHUNK_SIZE,
            type_def_cache_cap: DEFAULT_TYPE_DEF_CACHE_CAP,
        }
    }
}

/// Builder returned by [`Fory::builder`]; chain setters then call
/// [`build`](FuryBuilder::build).
#[derive(Default)]
pub struct FuryBuilder {
    options: FuryOptions,
}

impl FuryBuilder {
    pub fn xlang(mut self, enabled: bool) -> Self {
        self.options.xlang = enabled;
        self
    }

    pub fn compatible(mut self, enabled: bool) -> Self {
        self.options.compatible = enabled;
        self
    }

    pub fn track_ref(mut self, enabled: bool) -> Self {
        self.options.ref_config.track_ref = enabled;
        self
    }

    pub fn basic_ref(mut self, enabled: bool) -> Self {
        self.options.ref_config.ref_ignore_basic = !enabled;
        self
    }

    pub fn string_ref(mut self, enabled: bool) -> Self {
        self.options.ref_config.ref_ignore_string = !enabled;
        self
    }

    pub fn time_ref(mut self, enabled: bool) -> Self {
        self.options.ref_config.ref_ignore_time = !enabled;
        self
    }

    pub fn map_chunk_size(mut self, size: usize) -> Self {
        self.options.map_chunk_size = size.clamp(8, 255);
        self
    }

    pub fn type_def_cache_cap(mut self, cap: usize) -> Self {
        self.options.type_def_cache_cap = cap;
        self
    }

    pub fn build(self) -> Fory {
        Fory {
            options: self.options,
            registry: TypeRegistry::new(),
        }
    }
}

/// A configured core instance: the long-lived type registry plus the
/// frozen configuration every `serialize`/`deserialize` call reads
/// (spec.md §5 "Shared state"). Not `Sync`; one instance per thread, or
/// externally synchronized, per spec.md §5's single-threaded model.
pub struct Fory {
    options: FuryOptions,
    registry: TypeRegistry,
}

impl Fory {
    pub fn builder() -> FuryBuilder {
        FuryBuilder::default()
    }

    /// Registers `T` under a caller-chosen numeric identity (spec.md
    /// §4.3 `register_by_id`).
    pub fn register_by_id<T: 'static>(
        &mut self,
        user_type_id: UserTypeId,
        fields: Vec<crate::field::FieldDescriptor>,
        harness: Arc<dyn StructHarness>,
    ) -> Result<()> {
        let kind = if self.options.compatible {
            crate::type_id::TypeId::CompatibleStruct
        } else {
            crate::type_id::TypeId::Struct
        };
        let info = TypeInfo::new(kind, fields, harness).with_user_id(user_type_id);
        self.registry.register(NativeTypeId::of::<T>(), info)
    }

    /// Registers `T` under a namespace + type name (spec.md §4.3
    /// `register_by_name`).
    pub fn register_by_name<T: 'static>(
        &mut self,
        namespace: impl Into<String>,
        type_name: impl Into<String>,
        fields: Vec<crate::field::FieldDescriptor>,
        harness: Arc<dyn StructHarness>,
    ) -> Result<()> {
        let kind = if self.options.compatible {
            crate::type_id::TypeId::NamedCompatibleStruct
        } else {
            crate::type_id::TypeId::NamedStruct
        };
        let info = TypeInfo::new(kind, fields, harness).with_name(namespace, type_name);
        self.registry.register(NativeTypeId::of::<T>(), info)
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    fn new_write_context(&self) -> WriteContext {
        WriteContext::with_map_chunk_size(self.options.ref_config, self.options.map_chunk_size)
    }

    fn header_byte(&self, is_null: bool) -> u8 {
        let mut flags = 0u8;
        if is_null {
            flags |= HEADER_NULL;
        }
        if self.options.xlang {
            flags |= HEADER_XLANG;
        }
        flags
    }

    /// Serializes `value` against `field_type` (the declared top-level
    /// type), producing a framed message: header byte + body (spec.md
    /// §6 "Binary wire protocol").
    pub fn serialize(&self, field_type: &FieldType, value: &Value) -> Result<Vec<u8>> {
        let mut ctx = self.new_write_context();
        self.serialize_with_context(&mut ctx, field_type, value)?;
        Ok(ctx.writer.dump())
    }

    /// Same as [`serialize`](Self::serialize) but writes into a reused,
    /// caller-owned context (spec.md §5 "per-call state ... must be
    /// reset ... to allow pooling"). The caller is responsible for
    /// calling [`WriteContext::reset`] between uses.
    pub fn serialize_with_context(&self, ctx: &mut WriteContext, field_type: &FieldType, value: &Value) -> Result<Vec<u8>> {
        if value.is_null() {
            ctx.writer.write_u8(self.header_byte(true));
            return Ok(ctx.writer.as_slice().to_vec());
        }
        ctx.writer.reserve(64);
        ctx.writer.write_u8(self.header_byte(false));
        let result = crate::ser::write_value(ctx, &self.registry, field_type, true, None, value);
        if let Err(e) = result {
            return Err(ctx.fail(e));
        }
        Ok(ctx.writer.as_slice().to_vec())
    }

    pub fn deserialize(&self, field_type: &FieldType, bytes: &[u8]) -> Result<Value> {
        let mut ctx = ReadContext::new(bytes, self.options.ref_config, self.options.type_def_cache_cap);
        self.deserialize_with_context(&mut ctx, field_type)
    }

    pub fn deserialize_with_context(&self, ctx: &mut ReadContext, field_type: &FieldType) -> Result<Value> {
        let header = ctx.reader.read_u8()?;
        if header & HEADER_NULL != 0 {
            return Ok(Value::Null);
        }
        crate::ser::read_value(ctx, &self.registry, field_type, true, None)
    }
}

/// A standalone-buffer convenience pair kept for parity with the
/// teacher's `FromByteStream`/`ToByteStream` free functions; most
/// callers go through [`Fory::serialize`] instead.
pub fn write_raw_header(writer: &mut Writer, out_of_band: bool) {
    let mut flags = 0u8;
    if out_of_band {
        flags |= HEADER_OUT_OF_BAND;
    }
    writer.write_u8(flags);
}

pub fn read_raw_header(reader: &mut Reader) -> Result<u8> {
    reader.read_u8()
}

/// Exposed so callers can pre-warm a reader-side TypeDef cache shared
/// across many short-lived [`ReadContext`]s (spec.md §5 resource bound:
/// 8192 entries by default, configurable via
/// [`FuryBuilder::type_def_cache_cap`]).
pub fn new_type_def_cache(cap: usize) -> TypeDefReaderTable {
    TypeDefReaderTable::new(cap)
}
