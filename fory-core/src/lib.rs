//! Core of a cross-language binary serialization format: buffer codec,
//! MetaString compression, the type registry, TypeDef streaming,
//! reference tracking, and per-category value serializers, tied
//! together by [`fory::Fory`].
//!
//! This crate operates over the dynamic [`value::Value`] escape hatch
//! rather than generating per-type Rust code; a higher layer (outside
//! this crate's scope) would normally bridge native struct fields to
//! `Value` through a derive macro and a [`type_info::StructHarness`]
//! implementation.

pub mod buffer;
pub mod context;
pub mod error;
pub mod field;
pub mod fory;
pub mod hash;
pub mod meta_string;
pub mod reference;
pub mod registry;
pub mod ser;
pub mod type_def;
pub mod type_id;
pub mod type_info;
pub mod value;

pub use error::{ForyError, Result};
pub use field::{FieldDescriptor, FieldType};
pub use fory::{Fory, FuryBuilder};
pub use reference::RefConfig;
pub use registry::TypeRegistry;
pub use type_def::{RemoteField, RemoteTypeDef};
pub use type_id::TypeId;
pub use type_info::{StructHarness, TypeInfo, UserTypeId};
pub use value::Value;
