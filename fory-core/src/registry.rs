//! Type registry: maps between native Rust types, Fory `TypeId`s,
//! caller-assigned `UserTypeId`s, and namespace+name (spec.md §3, §4.3).
//!
//! Grounded on the teacher's `structured/context.rs` (`Context`'s
//! assembly-by-name / assembly-by-identity caches) and
//! `structured/resolver.rs` (the `FxHashMap` lookup tables backing
//! them) — here narrowed from "loaded assemblies" to "registered
//! struct/enum descriptors."

use std::any::TypeId as NativeTypeId;

use fxhash::FxHashMap;

use crate::error::{ForyError, Result};
use crate::type_info::{TypeInfo, UserTypeId};

#[derive(Default)]
pub struct TypeRegistry {
    by_native: FxHashMap<NativeTypeId, usize>,
    by_user_id: FxHashMap<UserTypeId, usize>,
    by_name: FxHashMap<(String, String), usize>,
    entries: Vec<TypeInfo>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `info` under `native`, erroring if `native`, its
    /// `user_type_id`, or its `(namespace, type_name)` are already
    /// bound (spec.md §7 `DuplicatedRegistration`).
    pub fn register(&mut self, native: NativeTypeId, info: TypeInfo) -> Result<()> {
        if self.by_native.contains_key(&native) {
            return Err(ForyError::DuplicatedRegistration(
                "native type already registered".into(),
            ));
        }
        if let Some(id) = info.user_type_id {
            if self.by_user_id.contains_key(&id) {
                return Err(ForyError::DuplicatedRegistration(format!(
                    "user type id {id} already registered"
                )));
            }
        }
        let name_key = match (&info.namespace, &info.type_name) {
            (Some(ns), Some(name)) => {
                let key = (ns.clone(), name.clone());
                if self.by_name.contains_key(&key) {
                    return Err(ForyError::DuplicatedRegistration(format!(
                        "type {}.{} already registered",
                        ns, name
                    )));
                }
                Some(key)
            }
            _ => None,
        };

        #[cfg(feature = "tracing")]
        tracing::debug!(?native, user_id = ?info.user_type_id, "registering type");

        let idx = self.entries.len();
        self.by_native.insert(native, idx);
        if let Some(id) = info.user_type_id {
            self.by_user_id.insert(id, idx);
        }
        if let Some(key) = name_key {
            self.by_name.insert(key, idx);
        }
        self.entries.push(info);
        Ok(())
    }

    pub fn lookup_by_native(&self, native: NativeTypeId) -> Option<&TypeInfo> {
        self.by_native.get(&native).map(|&idx| &self.entries[idx])
    }

    pub fn lookup_by_id(&self, user_type_id: UserTypeId) -> Option<&TypeInfo> {
        self.by_user_id.get(&user_type_id).map(|&idx| &self.entries[idx])
    }

    pub fn lookup_by_name(&self, namespace: &str, type_name: &str) -> Option<&TypeInfo> {
        self.by_name
            .get(&(namespace.to_string(), type_name.to_string()))
            .map(|&idx| &self.entries[idx])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{FieldDescriptor, FieldType};
    use crate::type_id::TypeId;
    use crate::type_info::StructHarness;
    use std::any::Any;
    use std::sync::Arc;

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

    struct MarkerA;
    struct MarkerB;

    fn sample_info() -> TypeInfo {
        TypeInfo::new(
            TypeId::Struct,
            vec![FieldDescriptor::new("f1", FieldType::Scalar(TypeId::Int32), false)],
            Arc::new(NoopHarness),
        )
        .with_user_id(1)
    }

    #[test]
    fn register_and_lookup_by_id() {
        let mut reg = TypeRegistry::new();
        reg.register(NativeTypeId::of::<MarkerA>(), sample_info()).unwrap();
        assert!(reg.lookup_by_id(1).is_some());
        assert!(reg.lookup_by_native(NativeTypeId::of::<MarkerA>()).is_some());
    }

    #[test]
    fn duplicate_user_id_rejected() {
        let mut reg = TypeRegistry::new();
        reg.register(NativeTypeId::of::<MarkerA>(), sample_info()).unwrap();
        let err = reg.register(NativeTypeId::of::<MarkerB>(), sample_info());
        assert!(matches!(err, Err(ForyError::DuplicatedRegistration(_))));
    }

    #[test]
    fn lookup_by_name_works() {
        let mut reg = TypeRegistry::new();
        let info = sample_info().with_name("com.example", "Point");
        reg.register(NativeTypeId::of::<MarkerA>(), info).unwrap();
        assert!(reg.lookup_by_name("com.example", "Point").is_some());
        assert!(reg.lookup_by_name("com.example", "Other").is_none());
    }
}
