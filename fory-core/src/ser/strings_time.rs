//! String, Date, Timestamp, and binary-blob serializers (spec.md
//! §4.6).
//!
//! String framing delegates entirely to `meta_string`: spec.md §4.6
//! says "on the wire each string is a MetaString," so this module is
//! mostly glue between the generic dispatch and the codec in
//! `meta_string.rs`. Date/Timestamp/Binary are grounded on the
//! teacher's `utilities.rs` fixed-width POD helpers, same as
//! `ser::primitives`.

use crate::buffer::{Reader, Writer};
use crate::error::{ForyError, Result};
use crate::meta_string::{MetaStringReaderTable, MetaStringWriterTable};
use crate::type_id::TypeId;
use crate::value::Value;

pub fn write(
    writer: &mut Writer,
    strings: &mut MetaStringWriterTable,
    type_id: TypeId,
    value: &Value,
) -> Result<()> {
    match (type_id, value) {
        (TypeId::String, Value::String(s)) => strings.write(writer, s),
        (TypeId::Date, Value::Date(days)) => writer.write_i32(*days),
        (TypeId::Timestamp, Value::Timestamp(secs, nanos)) => {
            if *nanos >= 1_000_000_000 {
                return Err(ForyError::invalid_data("timestamp nanos must be in [0, 1e9)"));
            }
            writer.write_i64(*secs);
            writer.write_u32(*nanos);
        }
        (TypeId::Binary, Value::Binary(bytes)) => writer.write_bytes(bytes),
        (expected, v) => {
            return Err(ForyError::invalid_data(format!(
                "string/time serializer mismatch: wire type {expected:?} cannot encode {v:?}"
            )))
        }
    }
    Ok(())
}

pub fn read(
    reader: &mut Reader,
    strings: &mut MetaStringReaderTable,
    type_id: TypeId,
) -> Result<Value> {
    Ok(match type_id {
        TypeId::String => Value::String(strings.read(reader)?),
        TypeId::Date => Value::Date(reader.read_i32()?),
        TypeId::Timestamp => {
            let secs = reader.read_i64()?;
            let nanos = reader.read_u32()?;
            if nanos >= 1_000_000_000 {
                return Err(ForyError::invalid_data("timestamp nanos out of range on the wire"));
            }
            Value::Timestamp(secs, nanos)
        }
        TypeId::Binary => Value::Binary(reader.read_bytes()?.to_vec()),
        other => return Err(ForyError::UnsupportedType(format!("{other:?} is not a string/time kind"))),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_roundtrip_empty_and_36_char() {
        let mut ws = MetaStringWriterTable::new();
        let mut w = Writer::new();
        write(&mut w, &mut ws, TypeId::String, &Value::String(String::new())).unwrap();
        write(
            &mut w,
            &mut ws,
            TypeId::String,
            &Value::String("abcdefghijklmnopqrstuvwxyz0123456789".into()),
        )
        .unwrap();
        let bytes = w.dump();
        let mut r = Reader::new(&bytes);
        let mut rs = MetaStringReaderTable::new();
        assert_eq!(read(&mut r, &mut rs, TypeId::String).unwrap(), Value::String(String::new()));
        assert_eq!(
            read(&mut r, &mut rs, TypeId::String).unwrap(),
            Value::String("abcdefghijklmnopqrstuvwxyz0123456789".into())
        );
    }

    #[test]
    fn date_and_timestamp_roundtrip() {
        let mut ws = MetaStringWriterTable::new();
        let mut w = Writer::new();
        write(&mut w, &mut ws, TypeId::Date, &Value::Date(19723)).unwrap();
        write(&mut w, &mut ws, TypeId::Timestamp, &Value::Timestamp(1_700_000_000, 123_456_789)).unwrap();
        let bytes = w.dump();
        let mut r = Reader::new(&bytes);
        let mut rs = MetaStringReaderTable::new();
        assert_eq!(read(&mut r, &mut rs, TypeId::Date).unwrap(), Value::Date(19723));
        assert_eq!(
            read(&mut r, &mut rs, TypeId::Timestamp).unwrap(),
            Value::Timestamp(1_700_000_000, 123_456_789)
        );
    }

    #[test]
    fn rejects_out_of_range_nanos() {
        let mut ws = MetaStringWriterTable::new();
        let mut w = Writer::new();
        assert!(write(&mut w, &mut ws, TypeId::Timestamp, &Value::Timestamp(0, 2_000_000_000)).is_err());
    }

    #[test]
    fn binary_blob_roundtrip() {
        let mut ws = MetaStringWriterTable::new();
        let mut w = Writer::new();
        write(&mut w, &mut ws, TypeId::Binary, &Value::Binary(vec![1, 2, 3, 4])).unwrap();
        let bytes = w.dump();
        let mut r = Reader::new(&bytes);
        let mut rs = MetaStringReaderTable::new();
        assert_eq!(read(&mut r, &mut rs, TypeId::Binary).unwrap(), Value::Binary(vec![1, 2, 3, 4]));
    }
}
