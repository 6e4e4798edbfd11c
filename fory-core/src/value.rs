//! The dynamic `Value` escape hatch (spec.md §9 Design Notes; carried
//! forward in SPEC_FULL.md §7).
//!
//! Grounded on the teacher's tagged `MetadataToken`/`TypeData` enums
//! (`raw/indices.rs`, `schema/type.rs`) — a single sum type standing in
//! for "whatever kind of row this token addresses." Here it stands in
//! for "whatever kind of field value this slot holds" at the dynamic
//! boundary; strongly-typed call paths never construct one.

use std::cell::RefCell;
use std::rc::Rc;

use crate::type_info::TypeInfo;

#[derive(Clone, Debug)]
pub enum Value {
    Null,
    Bool(bool),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    String(String),
    Binary(Vec<u8>),
    Date(i32),
    Timestamp(i64, u32),
    List(Vec<Value>),
    Map(Vec<(Value, Value)>),
    /// A struct value keyed by field index into the owning `TypeInfo`.
    Struct(Vec<(usize, Value)>),
    /// A reference-tracked indirection cell (spec.md §4.5). Wrapping a
    /// struct/collection value in `Ref` is what makes cyclic graphs
    /// representable at all in a value type that otherwise only owns
    /// its children: two `Value::Ref`s that wrap the same `Rc` are the
    /// same object on the wire. The cell holds `None` only transiently,
    /// between `RefReader::reserve_slot` and the matching `fill` a few
    /// frames later on the same read — a back-edge encountered in that
    /// window observes the shell directly via the shared `Rc` (the
    /// read-side shell, spec.md §4.5 "Cycles").
    Ref(Rc<RefCell<Option<Value>>>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Structural equality that tolerates cycles by tracking which
    /// `Ref` cells (by pointer identity) are already being compared on
    /// either side, so a self-referential field doesn't recurse
    /// forever (needed for spec.md testable property 4 on cyclic
    /// structs such as scenario S5).
    pub fn structural_eq(&self, other: &Value) -> bool {
        fn go(a: &Value, b: &Value, seen: &mut Vec<(usize, usize)>) -> bool {
            match (a, b) {
                (Value::Ref(ra), Value::Ref(rb)) => {
                    let pa = Rc::as_ptr(ra) as usize;
                    let pb = Rc::as_ptr(rb) as usize;
                    if seen.contains(&(pa, pb)) {
                        return true;
                    }
                    seen.push((pa, pb));
                    match (&*ra.borrow(), &*rb.borrow()) {
                        (Some(va), Some(vb)) => go(va, vb, seen),
                        (None, None) => true,
                        _ => false,
                    }
                }
                (Value::Struct(fa), Value::Struct(fb)) => {
                    fa.len() == fb.len()
                        && fa
                            .iter()
                            .zip(fb.iter())
                            .all(|((ia, va), (ib, vb))| ia == ib && go(va, vb, seen))
                }
                (Value::List(la), Value::List(lb)) => {
                    la.len() == lb.len() && la.iter().zip(lb.iter()).all(|(x, y)| go(x, y, seen))
                }
                (Value::Map(ma), Value::Map(mb)) => {
                    ma.len() == mb.len()
                        && ma
                            .iter()
                            .zip(mb.iter())
                            .all(|((ka, va), (kb, vb))| go(ka, kb, seen) && go(va, vb, seen))
                }
                (Value::Null, Value::Null) => true,
                (Value::Bool(x), Value::Bool(y)) => x == y,
                (Value::I8(x), Value::I8(y)) => x == y,
                (Value::I16(x), Value::I16(y)) => x == y,
                (Value::I32(x), Value::I32(y)) => x == y,
                (Value::I64(x), Value::I64(y)) => x == y,
                (Value::U8(x), Value::U8(y)) => x == y,
                (Value::U16(x), Value::U16(y)) => x == y,
                (Value::U32(x), Value::U32(y)) => x == y,
                (Value::U64(x), Value::U64(y)) => x == y,
                (Value::F32(x), Value::F32(y)) => x == y,
                (Value::F64(x), Value::F64(y)) => x == y,
                (Value::String(x), Value::String(y)) => x == y,
                (Value::Binary(x), Value::Binary(y)) => x == y,
                (Value::Date(x), Value::Date(y)) => x == y,
                (Value::Timestamp(xs, xn), Value::Timestamp(ys, yn)) => xs == ys && xn == yn,
                _ => false,
            }
        }
        go(self, other, &mut Vec::new())
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.structural_eq(other)
    }
}

/// Ordering key for `Value` when it appears as a map key in a context
/// that needs deterministic iteration (tests, debug output); not part
/// of the wire format, which preserves insertion order for maps.
pub fn stable_sort_map(entries: &mut [(Value, Value)]) {
    entries.sort_by(|a, b| format!("{:?}", a.0).cmp(&format!("{:?}", b.0)));
}

/// Helper used by collection serializers to decide the "same runtime
/// type" element-header bit (spec.md §4.7) for a dynamically-typed list.
pub fn value_type_tag(v: &Value) -> u8 {
    match v {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::I8(_) => 2,
        Value::I16(_) => 3,
        Value::I32(_) => 4,
        Value::I64(_) => 5,
        Value::U8(_) => 6,
        Value::U16(_) => 7,
        Value::U32(_) => 8,
        Value::U64(_) => 9,
        Value::F32(_) => 10,
        Value::F64(_) => 11,
        Value::String(_) => 12,
        Value::Binary(_) => 13,
        Value::Date(_) => 14,
        Value::Timestamp(_, _) => 15,
        Value::List(_) => 16,
        Value::Map(_) => 17,
        Value::Struct(_) => 18,
        Value::Ref(_) => 19,
    }
}

/// Unused placeholder retained for symmetry with the registry's
/// `TypeInfo` lookups when a `Value::Struct` needs its schema; callers
/// combine this with a separately-tracked `TypeInfo` handle rather than
/// embedding one in every struct value (keeps `Value` `Clone`/`PartialEq`).
pub type StructSchema<'a> = &'a TypeInfo;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_sort_is_deterministic() {
        let mut entries = vec![
            (Value::String("b".into()), Value::I32(2)),
            (Value::String("a".into()), Value::I32(1)),
        ];
        stable_sort_map(&mut entries);
        assert_eq!(entries[0].0, Value::String("a".into()));
    }

    #[test]
    fn type_tags_distinguish_variants() {
        assert_ne!(value_type_tag(&Value::I32(1)), value_type_tag(&Value::I64(1)));
    }
}
