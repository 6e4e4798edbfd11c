//! `WriteContext`/`ReadContext`: per-call mutable state (spec.md §3,
//! §4.9 "Per-call state").
//!
//! Grounded on the teacher's `structured/context.rs` `Context`, which
//! owns a `bumpalo::Bump` arena reset (not reallocated) between loads
//! and a set of resolver caches alongside it. Here the arena backs
//! scratch allocations during a single `serialize`/`deserialize` call,
//! and the caches are the MetaString/TypeDef dedup tables plus the
//! reference tracker, all reset the same way.

use bumpalo::Bump;

use crate::buffer::{Reader, Writer};
use crate::error::{ForyError, Result};
use crate::meta_string::{MetaStringReaderTable, MetaStringWriterTable};
use crate::reference::{RefConfig, RefReader};
use crate::type_def::{TypeDefReaderTable, TypeDefWriterTable};
use crate::value::Value;

/// Per-call write-side state. Created once per `Fory::serialize` call
/// (or reused across calls via `reset`, matching the teacher's
/// `Context::reset_for_reuse` pooling shape).
pub struct WriteContext {
    pub writer: Writer,
    pub strings: MetaStringWriterTable,
    pub type_defs: TypeDefWriterTable,
    pub ref_writer: crate::reference::RefWriter,
    pub ref_config: RefConfig,
    pub map_chunk_size: usize,
    pub arena: Bump,
    error: Option<ForyError>,
}

impl WriteContext {
    pub fn new(ref_config: RefConfig) -> Self {
        Self::with_map_chunk_size(ref_config, crate::ser::collections::DEFAULT_MAP_CHUNK_SIZE)
    }

    pub fn with_map_chunk_size(ref_config: RefConfig, map_chunk_size: usize) -> Self {
        Self {
            writer: Writer::new(),
            strings: MetaStringWriterTable::new(),
            type_defs: TypeDefWriterTable::new(),
            ref_writer: crate::reference::RefWriter::new(),
            ref_config,
            map_chunk_size,
            arena: Bump::new(),
            error: None,
        }
    }

    /// Resets all per-call state without freeing the writer's or
    /// arena's backing allocation, so a pooled context can be reused
    /// across many `serialize` calls (spec.md §4.9 "reset (not
    /// re-allocated, to allow pooling)").
    pub fn reset(&mut self) {
        self.writer = Writer::with_capacity(self.writer.as_slice().len().max(64));
        self.strings.reset();
        self.type_defs.reset();
        self.ref_writer.reset();
        self.arena.reset();
        self.error = None;
    }

    /// Records `err` as the context's terminal error (spec.md §4.9
    /// propagation policy: later operations on a failed context should
    /// short-circuit) and logs it, then hands it back so the caller can
    /// propagate it with `?` without a separate `.to_string()` dance.
    pub fn fail(&mut self, err: ForyError) -> ForyError {
        #[cfg(feature = "tracing")]
        tracing::warn!(error = %err, "serialize error");
        self.error = Some(err.clone());
        err
    }

    pub fn has_failed(&self) -> bool {
        self.error.is_some()
    }
}

/// Per-call read-side state, the mirror of `WriteContext`.
pub struct ReadContext<'a> {
    pub reader: Reader<'a>,
    pub strings: MetaStringReaderTable,
    pub type_defs: TypeDefReaderTable,
    pub refs: RefReader<Value>,
    pub ref_config: RefConfig,
    pub arena: Bump,
    error: Option<ForyError>,
}

impl<'a> ReadContext<'a> {
    pub fn new(data: &'a [u8], ref_config: RefConfig, type_def_cache_cap: usize) -> Self {
        Self {
            reader: Reader::new(data),
            strings: MetaStringReaderTable::new(),
            type_defs: TypeDefReaderTable::new(type_def_cache_cap),
            refs: RefReader::new(),
            ref_config,
            arena: Bump::new(),
            error: None,
        }
    }

    pub fn reset(&mut self, data: &'a [u8]) {
        self.reader = Reader::new(data);
        self.strings.reset();
        self.type_defs.reset();
        self.refs.reset();
        self.arena.reset();
        self.error = None;
    }

    pub fn fail(&mut self, err: ForyError) {
        #[cfg(feature = "tracing")]
        tracing::warn!(error = %err.to_string(), "deserialize error");
        self.error = Some(err);
    }

    pub fn has_failed(&self) -> bool {
        self.error.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> RefConfig {
        RefConfig {
            track_ref: true,
            ref_ignore_basic: true,
            ref_ignore_time: true,
            ref_ignore_string: true,
        }
    }

    #[test]
    fn reset_clears_write_state() {
        let mut ctx = WriteContext::new(cfg());
        ctx.writer.write_u8(1);
        ctx.strings.write(&mut ctx.writer, "x");
        ctx.reset();
        assert_eq!(ctx.writer.len(), 0);
    }

    #[test]
    fn reset_clears_read_state() {
        let data = [1u8, 2, 3];
        let mut ctx = ReadContext::new(&data, cfg(), 8192);
        ctx.reader.read_u8().unwrap();
        let data2 = [9u8];
        ctx.reset(&data2);
        assert_eq!(ctx.reader.position(), 0);
        assert_eq!(ctx.reader.remaining(), 1);
    }
}
