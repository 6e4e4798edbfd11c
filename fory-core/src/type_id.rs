//! The wire-level `TypeId` enumeration (spec.md §3 glossary / §4.3).
//!
//! Numeric assignments are grounded on the upstream Fory Rust core's
//! `TypeId` (`examples/other_examples/..._types.rs.rs`) so the category
//! partitioning (primitives, var-length ints, strings/binary, time,
//! containers, user kinds) matches a real implementation rather than
//! being invented from scratch; `SLI_INT64` is spliced in as its own
//! discriminant since spec.md calls it out as a distinct wire kind from
//! `TAGGED_UINT64`; `FromRepr` is generated by `fory-derive`, the same
//! pattern the teacher uses for `TableKind` (`raw/heaps/table.rs`).

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, fory_derive::FromRepr)]
#[repr(u32)]
pub enum TypeId {
    Unknown = 0,
    Bool = 1,
    Int8 = 2,
    Int16 = 3,
    Int32 = 4,
    VarInt32 = 5,
    Int64 = 6,
    VarInt64 = 7,
    SliInt64 = 8,
    Uint8 = 9,
    Uint16 = 10,
    Uint32 = 11,
    VarUint32 = 12,
    Uint64 = 13,
    VarUint64 = 14,
    TaggedUint64 = 15,
    Float16 = 17,
    Float32 = 19,
    Float64 = 20,
    String = 21,
    List = 22,
    Set = 23,
    Map = 24,
    Enum = 25,
    NamedEnum = 26,
    Struct = 27,
    CompatibleStruct = 28,
    NamedStruct = 29,
    NamedCompatibleStruct = 30,
    Ext = 31,
    NamedExt = 32,
    TypedUnion = 34,
    NamedUnion = 35,
    Timestamp = 38,
    Date = 39,
    Binary = 41,
    Array = 42,
}

impl TypeId {
    pub const fn as_u32(self) -> u32 {
        self as u32
    }

    /// Integer/float primitives that are never ref-tracked regardless
    /// of `track_ref` unless a field override re-enables it (spec.md
    /// §4.5 category gates, `ref_ignore_basic`).
    pub const fn is_basic(self) -> bool {
        matches!(
            self,
            TypeId::Bool
                | TypeId::Int8
                | TypeId::Int16
                | TypeId::Int32
                | TypeId::VarInt32
                | TypeId::Int64
                | TypeId::VarInt64
                | TypeId::SliInt64
                | TypeId::Uint8
                | TypeId::Uint16
                | TypeId::Uint32
                | TypeId::VarUint32
                | TypeId::Uint64
                | TypeId::VarUint64
                | TypeId::TaggedUint64
                | TypeId::Float16
                | TypeId::Float32
                | TypeId::Float64
        )
    }

    pub const fn is_time(self) -> bool {
        matches!(self, TypeId::Date | TypeId::Timestamp)
    }

    pub const fn is_string(self) -> bool {
        matches!(self, TypeId::String)
    }

    pub const fn is_container(self) -> bool {
        matches!(self, TypeId::List | TypeId::Set | TypeId::Map | TypeId::Array)
    }

    pub const fn is_named(self) -> bool {
        matches!(
            self,
            TypeId::NamedStruct | TypeId::NamedCompatibleStruct | TypeId::NamedEnum | TypeId::NamedExt | TypeId::NamedUnion
        )
    }

    pub const fn is_id_based_struct(self) -> bool {
        matches!(self, TypeId::Struct | TypeId::CompatibleStruct)
    }

    pub const fn is_compatible_struct(self) -> bool {
        matches!(self, TypeId::CompatibleStruct | TypeId::NamedCompatibleStruct)
    }

    /// Fixed byte width for primitive-category kinds, used by the
    /// struct field-sort rule in spec.md §4.8 item 2 ("descending
    /// width"). Variable-width kinds return `None`.
    pub const fn fixed_width(self) -> Option<u8> {
        match self {
            TypeId::Bool | TypeId::Int8 | TypeId::Uint8 => Some(1),
            TypeId::Int16 | TypeId::Uint16 | TypeId::Float16 => Some(2),
            TypeId::Int32 | TypeId::Uint32 | TypeId::Float32 | TypeId::Date => Some(4),
            TypeId::Int64 | TypeId::Uint64 | TypeId::Float64 | TypeId::Timestamp => Some(8),
            _ => None,
        }
    }
}

impl TryFrom<u32> for TypeId {
    type Error = crate::error::ForyError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        TypeId::from_repr(value).ok_or(crate::error::ForyError::UnsupportedType(format!(
            "unknown wire type id {value}"
        )))
    }
}
