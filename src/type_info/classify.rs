// Data representation of a type, read off its layout metadata.
//
// A type_ctor_info's metadata is a functors indicator plus one layout entry.
// Both are plain words because the compiler emits them as static data; the
// layout entry carries a layout tag in its tag bits.

use crate::{tags::TagLayout, Word};

use super::TypeInfo;

pub const FUNCTORS_DU: Word = 0;
pub const FUNCTORS_ENUM: Word = 1;
pub const FUNCTORS_EQUIV: Word = 2;
pub const FUNCTORS_SPECIAL: Word = 3;
pub const FUNCTORS_NO_TAG: Word = 4;
pub const FUNCTORS_UNIV: Word = 5;

pub const LAYOUT_CONST_TAG: Word = 0;
pub const LAYOUT_SIMPLE_TAG: Word = 1;
pub const LAYOUT_COMPLICATED_TAG: Word = 2;
pub const LAYOUT_EQUIV_TAG: Word = 3;

// bodies of special (builtin) layout entries
pub const LAYOUT_UNASSIGNED_VALUE: Word = 0;
pub const LAYOUT_UNUSED_VALUE: Word = 1;
pub const LAYOUT_STRING_VALUE: Word = 2;
pub const LAYOUT_FLOAT_VALUE: Word = 3;
pub const LAYOUT_INT_VALUE: Word = 4;
pub const LAYOUT_CHARACTER_VALUE: Word = 5;
pub const LAYOUT_PREDICATE_VALUE: Word = 6;
pub const LAYOUT_VOID_VALUE: Word = 7;
pub const LAYOUT_ARRAY_VALUE: Word = 8;
pub const LAYOUT_TYPEINFO_VALUE: Word = 9;
pub const LAYOUT_C_POINTER_VALUE: Word = 10;
pub const LAYOUT_TYPECLASSINFO_VALUE: Word = 11;

// Type variables are numbered 1..=MAX_TYPE_VAR. Anything larger in an
// equivalence layout entry stands for a concrete type.
pub const MAX_TYPE_VAR: Word = 1024;

// layout tags need this many tag bits
pub const LAYOUT_TAG_BITS: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataRepresentation {
    Enum,
    Simple,
    Complicated,
    ComplicatedConst,
    NoTag,
    Equiv,
    EquivVar,
    Int,
    Char,
    Float,
    String,
    Pred,
    Univ,
    Void,
    Array,
    TypeInfo,
    CPointer,
    TypeClassInfo,
    Unknown,
}

// How a discriminated union's functors are laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuTag {
    Simple,
    Complicated,
    Const,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinKind {
    String,
    Float,
    Int,
    Char,
    Pred,
    Void,
    Array,
    TypeInfo,
    CPointer,
    TypeClassInfo,
}

impl BuiltinKind {
    fn layout_value(self) -> Word {
        match self {
            BuiltinKind::String => LAYOUT_STRING_VALUE,
            BuiltinKind::Float => LAYOUT_FLOAT_VALUE,
            BuiltinKind::Int => LAYOUT_INT_VALUE,
            BuiltinKind::Char => LAYOUT_CHARACTER_VALUE,
            BuiltinKind::Pred => LAYOUT_PREDICATE_VALUE,
            BuiltinKind::Void => LAYOUT_VOID_VALUE,
            BuiltinKind::Array => LAYOUT_ARRAY_VALUE,
            BuiltinKind::TypeInfo => LAYOUT_TYPEINFO_VALUE,
            BuiltinKind::CPointer => LAYOUT_C_POINTER_VALUE,
            BuiltinKind::TypeClassInfo => LAYOUT_TYPECLASSINFO_VALUE,
        }
    }
}

// What a type's functors look like, as the compiler describes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Functors {
    Du(DuTag),
    Enum,
    NoTag,
    // a synonym for another type, which may mention the type's parameters
    Equiv(TypeInfo),
    Special(BuiltinKind),
    Univ,
    // words emitted by a compiler this runtime does not know about
    Raw { indicator: Word, layout_entry: Word },
}

// Encode `functors` as the (indicator, layout entry) pair `classify` reads.
pub fn encode(layout: &TagLayout, functors: Functors) -> (Word, Word) {
    let entry = |tag: Word, body: Word| layout.mkword(layout.make_tag(tag), layout.make_body(body));

    match functors {
        Functors::Du(DuTag::Simple) => (FUNCTORS_DU, entry(LAYOUT_SIMPLE_TAG, 0)),
        Functors::Du(DuTag::Complicated) => (FUNCTORS_DU, entry(LAYOUT_COMPLICATED_TAG, 0)),
        Functors::Du(DuTag::Const) => (FUNCTORS_DU, entry(LAYOUT_CONST_TAG, 0)),
        Functors::Enum => (FUNCTORS_ENUM, entry(LAYOUT_CONST_TAG, 0)),
        Functors::NoTag => (FUNCTORS_NO_TAG, entry(LAYOUT_SIMPLE_TAG, 0)),
        Functors::Equiv(target) => {
            let body = match target {
                TypeInfo::Param(n) => n as Word,
                _ => MAX_TYPE_VAR + 1,
            };
            (FUNCTORS_EQUIV, entry(LAYOUT_EQUIV_TAG, body))
        }
        Functors::Special(kind) => (FUNCTORS_SPECIAL, entry(LAYOUT_CONST_TAG, kind.layout_value())),
        Functors::Univ => (FUNCTORS_UNIV, entry(LAYOUT_CONST_TAG, 0)),
        Functors::Raw {
            indicator,
            layout_entry,
        } => (indicator, layout_entry),
    }
}

fn is_type_variable(value: Word) -> bool {
    value <= MAX_TYPE_VAR
}

pub fn classify(
    layout: &TagLayout,
    functors_indicator: Word,
    layout_entry: Word,
) -> DataRepresentation {
    match functors_indicator {
        FUNCTORS_ENUM => DataRepresentation::Enum,
        FUNCTORS_DU => match layout.extract_tag(layout_entry) {
            LAYOUT_SIMPLE_TAG => DataRepresentation::Simple,
            LAYOUT_COMPLICATED_TAG => DataRepresentation::Complicated,
            LAYOUT_CONST_TAG => DataRepresentation::ComplicatedConst,
            _ => DataRepresentation::Unknown,
        },
        FUNCTORS_NO_TAG => DataRepresentation::NoTag,
        FUNCTORS_EQUIV => {
            if is_type_variable(layout.unmake_body(layout.strip_tag(layout_entry))) {
                DataRepresentation::EquivVar
            } else {
                DataRepresentation::Equiv
            }
        }
        FUNCTORS_SPECIAL => match layout.unmake_body(layout.strip_tag(layout_entry)) {
            LAYOUT_UNASSIGNED_VALUE | LAYOUT_UNUSED_VALUE => DataRepresentation::Unknown,
            LAYOUT_STRING_VALUE => DataRepresentation::String,
            LAYOUT_FLOAT_VALUE => DataRepresentation::Float,
            LAYOUT_INT_VALUE => DataRepresentation::Int,
            LAYOUT_CHARACTER_VALUE => DataRepresentation::Char,
            LAYOUT_PREDICATE_VALUE => DataRepresentation::Pred,
            LAYOUT_VOID_VALUE => DataRepresentation::Void,
            LAYOUT_ARRAY_VALUE => DataRepresentation::Array,
            LAYOUT_TYPEINFO_VALUE => DataRepresentation::TypeInfo,
            LAYOUT_C_POINTER_VALUE => DataRepresentation::CPointer,
            LAYOUT_TYPECLASSINFO_VALUE => DataRepresentation::TypeClassInfo,
            _ => DataRepresentation::Unknown,
        },
        FUNCTORS_UNIV => DataRepresentation::Univ,
        _ => DataRepresentation::Unknown,
    }
}
