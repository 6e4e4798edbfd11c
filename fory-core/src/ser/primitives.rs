//! Primitive serializers: bool, signed/unsigned 8/16/32/64, float
//! 16/32/64 (spec.md §4.6).
//!
//! Grounded on the teacher's `utilities.rs` POD readers
//! (`read_pod_from_stream`/`write_pod`-style fixed-width helpers),
//! generalized from "read one POD struct off a metadata stream" to
//! "read/write one primitive, honoring the field's chosen wire
//! encoding" (VarInt vs fixed-width vs tagged, per spec.md §4.6).

use half::f16;

use crate::buffer::{Reader, Writer};
use crate::error::{ForyError, Result};
use crate::type_id::TypeId;
use crate::value::Value;

pub fn write(writer: &mut Writer, type_id: TypeId, value: &Value) -> Result<()> {
    match (type_id, value) {
        (TypeId::Bool, Value::Bool(v)) => writer.write_bool(*v),
        (TypeId::Int8, Value::I8(v)) => writer.write_i8(*v),
        (TypeId::Int16, Value::I16(v)) => writer.write_i16(*v),
        (TypeId::Int32, Value::I32(v)) => writer.write_i32(*v),
        (TypeId::VarInt32, Value::I32(v)) => writer.write_var_int32(*v),
        (TypeId::Int64, Value::I64(v)) => writer.write_i64(*v),
        (TypeId::VarInt64, Value::I64(v)) => writer.write_var_int64(*v),
        (TypeId::SliInt64, Value::I64(v)) => writer.write_sli_int64(*v),
        (TypeId::Uint8, Value::U8(v)) => writer.write_u8(*v),
        (TypeId::Uint16, Value::U16(v)) => writer.write_u16(*v),
        (TypeId::Uint32, Value::U32(v)) => writer.write_u32(*v),
        (TypeId::VarUint32, Value::U32(v)) => writer.write_var_uint32(*v),
        (TypeId::Uint64, Value::U64(v)) => writer.write_u64(*v),
        (TypeId::VarUint64, Value::U64(v)) => writer.write_var_uint64(*v),
        (TypeId::TaggedUint64, Value::U64(v)) => writer.write_tagged_uint64(*v, false),
        (TypeId::Float16, Value::F32(v)) => writer.write_u16(f16::from_f32(*v).to_bits()),
        (TypeId::Float32, Value::F32(v)) => writer.write_f32(*v),
        (TypeId::Float64, Value::F64(v)) => writer.write_f64(*v),
        (expected, v) => {
            return Err(ForyError::invalid_data(format!(
                "primitive serializer mismatch: wire type {expected:?} cannot encode {v:?}"
            )))
        }
    }
    Ok(())
}

pub fn read(reader: &mut Reader, type_id: TypeId) -> Result<Value> {
    Ok(match type_id {
        TypeId::Bool => Value::Bool(reader.read_bool()?),
        TypeId::Int8 => Value::I8(reader.read_i8()?),
        TypeId::Int16 => Value::I16(reader.read_i16()?),
        TypeId::Int32 => Value::I32(reader.read_i32()?),
        TypeId::VarInt32 => Value::I32(reader.read_var_int32()?),
        TypeId::Int64 => Value::I64(reader.read_i64()?),
        TypeId::VarInt64 => Value::I64(reader.read_var_int64()?),
        TypeId::SliInt64 => Value::I64(reader.read_sli_int64()?),
        TypeId::Uint8 => Value::U8(reader.read_u8()?),
        TypeId::Uint16 => Value::U16(reader.read_u16()?),
        TypeId::Uint32 => Value::U32(reader.read_u32()?),
        TypeId::VarUint32 => Value::U32(reader.read_var_uint32()?),
        TypeId::Uint64 => Value::U64(reader.read_u64()?),
        TypeId::VarUint64 => Value::U64(reader.read_var_uint64()?),
        TypeId::TaggedUint64 => Value::U64(reader.read_tagged_uint64()?.0),
        TypeId::Float16 => Value::F32(f16::from_bits(reader.read_u16()?).to_f32()),
        TypeId::Float32 => Value::F32(reader.read_f32()?),
        TypeId::Float64 => Value::F64(reader.read_f64()?),
        other => return Err(ForyError::UnsupportedType(format!("{other:?} is not a primitive"))),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(type_id: TypeId, value: Value) {
        let mut w = Writer::new();
        write(&mut w, type_id, &value).unwrap();
        let bytes = w.dump();
        let mut r = Reader::new(&bytes);
        assert_eq!(read(&mut r, type_id).unwrap(), value);
    }

    #[test]
    fn all_integer_kinds_roundtrip() {
        roundtrip(TypeId::Bool, Value::Bool(true));
        roundtrip(TypeId::Int8, Value::I8(-12));
        roundtrip(TypeId::Int16, Value::I16(-1234));
        roundtrip(TypeId::Int32, Value::I32(-12345));
        roundtrip(TypeId::VarInt32, Value::I32(987654321));
        roundtrip(TypeId::Int64, Value::I64(i64::MIN));
        roundtrip(TypeId::VarInt64, Value::I64(i64::MIN));
        roundtrip(TypeId::SliInt64, Value::I64(42));
        roundtrip(TypeId::Uint64, Value::U64(u64::MAX));
        roundtrip(TypeId::VarUint64, Value::U64(u64::MAX));
        roundtrip(TypeId::TaggedUint64, Value::U64(12345));
    }

    #[test]
    fn floats_roundtrip_including_denormals() {
        roundtrip(TypeId::Float32, Value::F32(f32::from_bits(1))); // smallest denormal
        roundtrip(TypeId::Float64, Value::F64(f64::from_bits(1)));
        roundtrip(TypeId::Float32, Value::F32(-0.0));
    }

    #[test]
    fn mismatched_value_is_invalid_data() {
        let mut w = Writer::new();
        assert!(write(&mut w, TypeId::Int32, &Value::String("x".into())).is_err());
    }
}
