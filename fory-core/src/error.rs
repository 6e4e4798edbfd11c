//! Error taxonomy for the Fory wire protocol.
//!
//! Every read/write operation in this crate is fallible and returns
//! `Result<T, ForyError>`. None of these variants corrupt the type
//! registry; a failed message simply leaves the caller's `WriteContext`
//! or `ReadContext` in a short-circuited state until it is reset.

use std::fmt;

use crate::type_id::TypeId;

#[derive(thiserror::Error, Debug, Clone)]
pub enum ForyError {
    #[error("buffer exhausted: needed {needed} byte(s) but only {available} remained")]
    UnexpectedEof { needed: usize, available: usize },

    #[error("invalid wire data: {0}")]
    InvalidData(String),

    #[error("type mismatch: expected {expected:?}, found {found:?}")]
    TypeMismatch { expected: TypeId, found: TypeId },

    #[error("schema mismatch: {0}")]
    ForyMismatch(String),

    #[error("type id {0} is not registered")]
    UnregisteredType(u32),

    #[error("tag id {0} is not registered for this struct")]
    UnregisteredTag(i32),

    #[error("duplicated registration: {0}")]
    DuplicatedRegistration(String),

    #[error("unsupported type: {0}")]
    UnsupportedType(String),

    #[error("unsupported feature: {0}")]
    UnsupportedFeature(&'static str),

    #[error("invalid reference flag: expected a trackable category, found {0}")]
    InvalidRef(i8),

    #[error("invalid parameter: {0}")]
    InvalidParam(String),
}

pub type Result<T> = std::result::Result<T, ForyError>;

impl ForyError {
    #[inline]
    pub(crate) fn invalid_data(msg: impl fmt::Display) -> Self {
        ForyError::InvalidData(msg.to_string())
    }

    #[inline]
    pub(crate) fn fory_mismatch(msg: impl fmt::Display) -> Self {
        ForyError::ForyMismatch(msg.to_string())
    }
}
