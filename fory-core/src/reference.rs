//! Reference tracker: ref-ID assignment on write, back-reference
//! resolution on read, and the shell-then-fill pattern for cycles
//! (spec.md §4.5).
//!
//! Grounded on the teacher's `schema/type.rs` `TypeData::{Uninit,
//! Init}` — a `Cell`-backed slot that starts as a placeholder and is
//! filled in once resolution completes, so a reference taken mid-walk
//! still observes a valid (if incomplete) value. Here the same shape
//! backs `RefReader::reserve_slot`/`fill_slot`.

use nohash_hasher::IntMap;
use std::rc::Rc;
use std::cell::RefCell;

use crate::buffer::{Reader, Writer};
use crate::error::{ForyError, Result};
use crate::type_id::TypeId;

pub const NULL_FLAG: i8 = -3;
pub const REF_FLAG: i8 = -2;
pub const NOT_NULL_VALUE_FLAG: i8 = -1;
pub const REF_VALUE_FLAG: i8 = 0;

/// Configuration knobs that gate ref tracking per category (spec.md
/// §4.5's "configuration flags `ref_ignore_basic`, `ref_ignore_time`,
/// `ref_ignore_string`").
#[derive(Clone, Copy, Debug)]
pub struct RefConfig {
    pub track_ref: bool,
    pub ref_ignore_basic: bool,
    pub ref_ignore_time: bool,
    pub ref_ignore_string: bool,
}

impl RefConfig {
    /// Resolves whether a field of kind `type_id` should participate in
    /// ref tracking, honoring a per-field `override_` if present.
    pub fn tracks(&self, type_id: TypeId, override_: Option<bool>) -> bool {
        if let Some(v) = override_ {
            return v;
        }
        if !self.track_ref {
            return false;
        }
        if type_id.is_basic() && self.ref_ignore_basic {
            return false;
        }
        if type_id.is_time() && self.ref_ignore_time {
            return false;
        }
        if type_id.is_string() && self.ref_ignore_string {
            return false;
        }
        true
    }
}

/// Write-side identity-keyed ref table (spec.md §4.5 "Write side").
/// Keys by pointer identity of the `Rc`'s heap allocation, which is the
/// cheapest stable identity available without requiring `T: Eq`.
#[derive(Default)]
pub struct RefWriter {
    seen: std::collections::HashMap<usize, u32>,
}

impl RefWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.seen.clear();
    }

    /// Writes the flag byte for a trackable, non-null object identified
    /// by `identity` (typically `Rc::as_ptr(&x) as usize`). Returns
    /// `true` if the caller must still recurse into the object's
    /// fields (first occurrence); `false` if a back-reference was
    /// emitted and recursion must be skipped.
    pub fn write_flag(&mut self, writer: &mut Writer, identity: usize) -> bool {
        if let Some(&id) = self.seen.get(&identity) {
            writer.write_i8(REF_FLAG);
            writer.write_var_uint32(id);
            return false;
        }
        let id = self.seen.len() as u32;
        self.seen.insert(identity, id);
        writer.write_i8(REF_VALUE_FLAG);
        true
    }

    pub fn write_null(&self, writer: &mut Writer) {
        writer.write_i8(NULL_FLAG);
    }

    pub fn write_not_null_untracked(&self, writer: &mut Writer) {
        writer.write_i8(NOT_NULL_VALUE_FLAG);
    }
}

/// A single read-side slot: either still being filled in (cyclic
/// back-edge observed it before construction completed) or resolved.
/// Mirrors the teacher's `TypeData::{Uninit, Init}` Cell pattern.
pub struct RefSlot<T> {
    inner: Rc<RefCell<Option<T>>>,
}

impl<T> Clone for RefSlot<T> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone() }
    }
}

impl<T> RefSlot<T> {
    fn empty() -> Self {
        Self { inner: Rc::new(RefCell::new(None)) }
    }

    pub fn fill(&self, value: T) {
        *self.inner.borrow_mut() = Some(value);
    }

    pub fn get(&self) -> std::cell::Ref<'_, Option<T>> {
        self.inner.borrow()
    }

    pub fn handle(&self) -> Rc<RefCell<Option<T>>> {
        self.inner.clone()
    }
}

/// Read-side ref table: an ordered array of slots indexed by ref ID
/// (spec.md §4.5 "on read"). The reader must call `reserve_slot` before
/// recursing into an object's fields so a back-reference encountered
/// inside that object resolves to the (possibly still-empty) shell.
pub struct RefReader<T> {
    slots: Vec<RefSlot<T>>,
}

impl<T> Default for RefReader<T> {
    fn default() -> Self {
        Self { slots: Vec::new() }
    }
}

impl<T> RefReader<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.slots.clear();
    }

    pub fn reserve_slot(&mut self) -> (u32, RefSlot<T>) {
        let id = self.slots.len() as u32;
        let slot = RefSlot::empty();
        self.slots.push(slot.clone());
        (id, slot)
    }

    pub fn slot(&self, id: u32) -> Result<RefSlot<T>> {
        self.slots
            .get(id as usize)
            .cloned()
            .ok_or_else(|| ForyError::invalid_data("reference id out of range"))
    }

    /// Reads the flag byte and dispatches:
    /// - `Null` → `Ok(None)` with no further action.
    /// - `Ref` → resolves the cited slot (may still be empty; caller
    ///   decides how to represent a not-yet-filled back-edge).
    /// - `RefValue` → reserves a new slot and returns it so the caller
    ///   fills it in after constructing the value.
    /// - `NotNullValue` → untracked path, caller just reads the value.
    pub fn read_flag(&mut self, reader: &mut Reader) -> Result<RefAction<T>> {
        let flag = reader.read_i8()?;
        match flag {
            NULL_FLAG => Ok(RefAction::Null),
            REF_FLAG => {
                let id = reader.read_var_uint32()?;
                Ok(RefAction::Existing(self.slot(id)?))
            }
            REF_VALUE_FLAG => {
                let (id, slot) = self.reserve_slot();
                Ok(RefAction::New(id, slot))
            }
            NOT_NULL_VALUE_FLAG => Ok(RefAction::Untracked),
            other => Err(ForyError::InvalidRef(other)),
        }
    }
}

pub enum RefAction<T> {
    Null,
    Existing(RefSlot<T>),
    New(u32, RefSlot<T>),
    Untracked,
}

/// Small-integer ref-id keyed auxiliary map, for callers that need to
/// stash extra per-ref metadata without paying `FxHashMap`'s string
/// hashing cost (spec.md's ref IDs are message-local sequential u32s).
pub type RefAuxMap<V> = IntMap<u32, V>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_flag_first_occurrence_recurses() {
        let mut rw = RefWriter::new();
        let mut w = Writer::new();
        assert!(rw.write_flag(&mut w, 0x1000));
        let bytes = w.dump();
        assert_eq!(bytes[0] as i8, REF_VALUE_FLAG);
    }

    #[test]
    fn write_flag_repeat_emits_backref() {
        let mut rw = RefWriter::new();
        let mut w = Writer::new();
        assert!(rw.write_flag(&mut w, 0x1000));
        assert!(!rw.write_flag(&mut w, 0x1000));
        let bytes = w.dump();
        assert_eq!(bytes[1] as i8, REF_FLAG);
    }

    #[test]
    fn category_gate_overrides_global() {
        let cfg = RefConfig {
            track_ref: true,
            ref_ignore_basic: true,
            ref_ignore_time: false,
            ref_ignore_string: false,
        };
        assert!(!cfg.tracks(TypeId::Int32, None));
        assert!(cfg.tracks(TypeId::Int32, Some(true)));
        assert!(cfg.tracks(TypeId::Struct, None));
    }

    #[test]
    fn cyclic_shell_observes_partial_fill() {
        let mut rr: RefReader<String> = RefReader::new();
        let (_id, slot) = rr.reserve_slot();
        let handle_before_fill = slot.handle();
        assert!(handle_before_fill.borrow().is_none());
        slot.fill("root".to_string());
        assert_eq!(handle_before_fill.borrow().as_deref(), Some("root"));
    }
}
