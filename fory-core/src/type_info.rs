//! `TypeInfo`: the immutable per-type registry entry (spec.md §3).
//!
//! Grounded on the teacher's `schema/type.rs` `Type<'l>` (an interned,
//! read-only descriptor created once at load time and shared by
//! reference thereafter) — generalized here from "one .NET metadata
//! token resolves to one `Type`" to "one registered Rust type resolves
//! to one `TypeInfo`." The teacher's `Cell`-based deferred resolution
//! lives in `reference.rs`, not here: `TypeInfo` itself never mutates
//! after construction.

use std::any::Any;
use std::cell::RefCell;
use std::sync::Arc;

use derivative::Derivative;

use crate::field::FieldDescriptor;
use crate::type_id::TypeId;
use crate::value::Value;

/// Caller-assigned positive numeric identity, unique per registry
/// (spec.md §3 `UserTypeId`).
pub type UserTypeId = u32;

/// Bridges the core's dynamic `Value` boundary to a concrete Rust type.
/// This is the "harness that performs object construction and field
/// access" spec.md §3 assigns to `TypeInfo`; a language-specific
/// object-model adapter (spec.md §1, out of scope here) is what would
/// normally hand the core one of these per registered type.
pub trait StructHarness: Send + Sync {
    fn construct_empty(&self) -> Box<dyn Any>;
    fn get_field(&self, obj: &dyn Any, field_index: usize) -> Value;
    fn set_field(&self, obj: &mut dyn Any, field_index: usize, value: Value);
}

#[derive(Derivative)]
#[derivative(Debug)]
pub struct TypeInfo {
    pub type_id: TypeId,
    pub user_type_id: Option<UserTypeId>,
    pub namespace: Option<String>,
    pub type_name: Option<String>,
    pub fields: Vec<FieldDescriptor>,
    pub child_types: Vec<TypeId>,
    #[derivative(Debug = "ignore")]
    pub harness: Arc<dyn StructHarness>,
    #[derivative(Debug = "ignore")]
    encoded_type_def: RefCell<Option<Arc<Vec<u8>>>>,
}

impl TypeInfo {
    pub fn new(type_id: TypeId, fields: Vec<FieldDescriptor>, harness: Arc<dyn StructHarness>) -> Self {
        Self {
            type_id,
            user_type_id: None,
            namespace: None,
            type_name: None,
            fields,
            child_types: Vec::new(),
            harness,
            encoded_type_def: RefCell::new(None),
        }
    }

    pub fn with_user_id(mut self, id: UserTypeId) -> Self {
        self.user_type_id = Some(id);
        self
    }

    pub fn with_name(mut self, namespace: impl Into<String>, type_name: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self.type_name = Some(type_name.into());
        self
    }

    /// Fields sorted per spec.md §4.8's deterministic ordering rule.
    /// Computed fresh rather than cached in `fields` so registration
    /// order is preserved for schema-evolution name lookups.
    pub fn sorted_fields(&self) -> Vec<&FieldDescriptor> {
        let mut refs: Vec<&FieldDescriptor> = self.fields.iter().collect();
        refs.sort_by_key(|f| f.sort_key());
        refs
    }

    pub fn field_index_by_name(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    pub fn field_index_by_tag(&self, tag_id: i32) -> Option<usize> {
        self.fields.iter().position(|f| f.tag_id == Some(tag_id))
    }

    pub(crate) fn cached_type_def(&self) -> Option<Arc<Vec<u8>>> {
        self.encoded_type_def.borrow().clone()
    }

    pub(crate) fn set_cached_type_def(&self, bytes: Arc<Vec<u8>>) {
        *self.encoded_type_def.borrow_mut() = Some(bytes);
    }
}
