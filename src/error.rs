use thiserror::Error;

use crate::{type_info::TypeInfo, Word};

// Conditions the machine cannot continue past. Every one of these means an
// upstream invariant is already broken, so nothing here is retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    #[error("heap exhausted: requested {requested} words, {available} available")]
    HeapExhausted { requested: usize, available: usize },

    #[error("trail exhausted: capacity of {capacity} entries reached")]
    TrailExhausted { capacity: usize },

    #[error("{context}: unbound type variable T{var}")]
    UnboundTypeVariable { context: &'static str, var: u32 },

    #[error("type variable T{var} out of range for a type_info with {arity} arguments")]
    TypeParamOutOfRange { var: u32, arity: usize },

    #[error("type_info handle {0:?} does not refer to live memory")]
    DanglingTypeInfo(TypeInfo),

    #[error("unknown type_ctor_info #{0}")]
    UnknownTypeCtor(u32),

    #[error("jump to {0:#x}, which is not a code address")]
    BadJump(Word),

    #[error("attempted unification of higher-order terms")]
    HigherOrderUnify,

    #[error("attempted comparison of higher-order terms")]
    HigherOrderCompare,

    #[error("comparison procedure returned {0}, expected 0, 1 or 2")]
    BadCompareResult(Word),
}

pub type Result<T> = std::result::Result<T, RuntimeError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{bits} low tag bits do not fit in a {align}-byte aligned word")]
    TagBitsExceedAlignment { bits: u32, align: usize },

    #[error("{bits} tag bits leave no room for a body in a {word_bits}-bit word")]
    TagBitsExceedWord { bits: u32, word_bits: u32 },

    #[error("high tag bits cannot be used with conservative collection")]
    HighTagsWithConservativeGc,

    #[error("type layout metadata needs {needed} tag bits, only {bits} configured")]
    LayoutNeedsTagBits { bits: u32, needed: u32 },

    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}
