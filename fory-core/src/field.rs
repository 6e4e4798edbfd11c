//! `FieldDescriptor` and the recursive field-type wire record
//! (spec.md §3 glossary, §4.4, §4.8.7).
//!
//! Grounded on the teacher's `schema/type.rs` `Field` (name + type +
//! flags tuple consumed by `Type::write_as_blob`); the per-field
//! `weak` flag is the supplementary addition from SPEC_FULL.md §7
//! (cyclic back-edges).

use crate::buffer::{Reader, Writer};
use crate::error::Result;
use crate::meta_string::{MetaStringReaderTable, MetaStringWriterTable};
use crate::type_id::TypeId;

/// A field's wire-level type, recursive for containers and user kinds
/// (spec.md §9 normative wire section: "Field type record").
#[derive(Clone, Debug, PartialEq)]
pub enum FieldType {
    Scalar(TypeId),
    List(Box<FieldType>),
    Set(Box<FieldType>),
    Map(Box<FieldType>, Box<FieldType>),
    /// Struct/enum/union referenced by caller-assigned numeric id.
    UserById(TypeId, u32),
    /// Struct/enum/union referenced by namespace + type name.
    UserByName(TypeId, String, String),
}

impl FieldType {
    pub fn type_id(&self) -> TypeId {
        match self {
            FieldType::Scalar(t) => *t,
            FieldType::List(_) => TypeId::List,
            FieldType::Set(_) => TypeId::Set,
            FieldType::Map(_, _) => TypeId::Map,
            FieldType::UserById(t, _) | FieldType::UserByName(t, _, _) => *t,
        }
    }

    pub fn write(&self, writer: &mut Writer, strings: &mut MetaStringWriterTable, nullable: bool) {
        let tag = (self.type_id().as_u32() << 1) | (nullable as u32);
        writer.write_var_uint32(tag);
        match self {
            FieldType::Scalar(_) => {}
            FieldType::List(inner) | FieldType::Set(inner) => inner.write(writer, strings, false),
            FieldType::Map(k, v) => {
                k.write(writer, strings, false);
                v.write(writer, strings, false);
            }
            FieldType::UserById(_, id) => writer.write_var_uint32(*id),
            FieldType::UserByName(_, ns, name) => {
                strings.write(writer, ns);
                strings.write(writer, name);
            }
        }
    }

    pub fn read(reader: &mut Reader, strings: &mut MetaStringReaderTable) -> Result<(Self, bool)> {
        let tag = reader.read_var_uint32()?;
        let nullable = tag & 1 == 1;
        let type_id = TypeId::try_from(tag >> 1)?;
        let field_type = match type_id {
            TypeId::List => FieldType::List(Box::new(Self::read(reader, strings)?.0)),
            TypeId::Set => FieldType::Set(Box::new(Self::read(reader, strings)?.0)),
            TypeId::Map => {
                let (k, _) = Self::read(reader, strings)?;
                let (v, _) = Self::read(reader, strings)?;
                FieldType::Map(Box::new(k), Box::new(v))
            }
            TypeId::Struct | TypeId::CompatibleStruct | TypeId::Enum | TypeId::Ext | TypeId::TypedUnion => {
                FieldType::UserById(type_id, reader.read_var_uint32()?)
            }
            TypeId::NamedStruct | TypeId::NamedCompatibleStruct | TypeId::NamedEnum | TypeId::NamedExt | TypeId::NamedUnion => {
                let ns = strings.read(reader)?;
                let name = strings.read(reader)?;
                FieldType::UserByName(type_id, ns, name)
            }
            scalar => FieldType::Scalar(scalar),
        };
        Ok((field_type, nullable))
    }
}

/// One struct field, as supplied by the external object-model adapter
/// (spec.md §1) and carried by the registry.
#[derive(Clone, Debug)]
pub struct FieldDescriptor {
    /// Canonicalized to lower_underscore per spec.md §3.
    pub name: String,
    pub tag_id: Option<i32>,
    pub field_type: FieldType,
    pub nullable: bool,
    /// `None` means "use the global/category default."
    pub ref_override: Option<bool>,
    pub include_on_read: bool,
    pub include_on_write: bool,
    /// Cyclic back-edge hint (SPEC_FULL.md §7): omitted from the strong
    /// reference graph on deserialization.
    pub weak: bool,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, field_type: FieldType, nullable: bool) -> Self {
        Self {
            name: canonicalize(&name.into()),
            tag_id: None,
            field_type,
            nullable,
            ref_override: None,
            include_on_read: true,
            include_on_write: true,
            weak: false,
        }
    }

    pub fn with_tag_id(mut self, tag_id: i32) -> Self {
        self.tag_id = Some(tag_id);
        self
    }

    pub fn with_ref_override(mut self, track: bool) -> Self {
        self.ref_override = Some(track);
        self
    }

    pub fn weak(mut self) -> Self {
        self.weak = true;
        self
    }

    /// Sort key for the deterministic field ordering of spec.md §4.8:
    /// `(category, compressed?, descending width, descending type id, name)`.
    pub fn sort_key(&self) -> (u8, bool, std::cmp::Reverse<u8>, std::cmp::Reverse<u32>, String) {
        let type_id = self.field_type.type_id();
        let category = field_category(&self.field_type);
        let compressed = matches!(
            type_id,
            TypeId::VarInt32 | TypeId::VarInt64 | TypeId::SliInt64 | TypeId::VarUint32 | TypeId::VarUint64 | TypeId::TaggedUint64
        );
        let width = type_id.fixed_width().unwrap_or(0);
        (category, !compressed, std::cmp::Reverse(width), std::cmp::Reverse(type_id.as_u32()), self.name.clone())
    }
}

/// Category ordinal for spec.md §4.8 item 1's grouping: non-nullable
/// primitive(0) < nullable/boxed primitive(1) < built-in scalar(2) <
/// collection(3) < map(4) < user-defined(5).
fn field_category(ft: &FieldType) -> u8 {
    match ft {
        FieldType::Scalar(t) if t.is_basic() => 0,
        FieldType::Scalar(t) if t.is_time() || t.is_string() || *t == TypeId::Binary => 2,
        FieldType::List(_) | FieldType::Set(_) => 3,
        FieldType::Map(_, _) => 4,
        FieldType::UserById(_, _) | FieldType::UserByName(_, _, _) => 5,
        FieldType::Scalar(_) => 2,
    }
}

/// Lower_underscore canonicalization (spec.md §3 `FieldDescriptor`).
fn canonicalize(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, c) in name.chars().enumerate() {
        if c.is_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonicalizes_camel_case() {
        assert_eq!(canonicalize("fieldName"), "field_name");
        assert_eq!(canonicalize("already_snake"), "already_snake");
        assert_eq!(canonicalize("HTTPStatus"), "h_t_t_p_status");
    }

    #[test]
    fn field_type_roundtrip() {
        let mut ws = MetaStringWriterTable::new();
        let mut w = Writer::new();
        let ft = FieldType::Map(
            Box::new(FieldType::Scalar(TypeId::String)),
            Box::new(FieldType::List(Box::new(FieldType::Scalar(TypeId::Int32)))),
        );
        ft.write(&mut w, &mut ws, true);
        let bytes = w.dump();
        let mut r = Reader::new(&bytes);
        let mut rs = MetaStringReaderTable::new();
        let (read_back, nullable) = FieldType::read(&mut r, &mut rs).unwrap();
        assert_eq!(read_back, ft);
        assert!(nullable);
    }

    #[test]
    fn user_by_name_roundtrip() {
        let mut ws = MetaStringWriterTable::new();
        let mut w = Writer::new();
        let ft = FieldType::UserByName(TypeId::NamedStruct, "com.example".into(), "Point".into());
        ft.write(&mut w, &mut ws, false);
        let bytes = w.dump();
        let mut r = Reader::new(&bytes);
        let mut rs = MetaStringReaderTable::new();
        let (read_back, nullable) = FieldType::read(&mut r, &mut rs).unwrap();
        assert_eq!(read_back, ft);
        assert!(!nullable);
    }
}
