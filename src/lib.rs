pub mod config;
pub mod control;
pub mod error;
pub mod heap;
pub mod label;
pub mod list;
pub mod machine;
mod pool;
pub mod table;
pub mod tags;
pub mod trail;
pub mod type_info;

// Abstract machine substrate for a compiled logic language.
//
// Values are machine words. A word is either an unboxed integer or a pointer
// into the heap with a small discriminant (the tag) packed into bits the
// pointer does not need. Generated code is a set of blocks the machine jumps
// between; backtracking rewinds the heap and replays the trail.

// One machine word.
pub type Word = usize;

pub const WORD_BITS: u32 = Word::BITS;
pub const WORD_BYTES: usize = std::mem::size_of::<Word>();

pub use config::{MachineConfig, Reclamation, TagPosition};
pub use control::{Block, CodeAddr, Program, Transfer};
pub use error::{ConfigError, Result, RuntimeError};
pub use heap::{Addr, Heap, HeapMark};
pub use label::{Label, LabelTable};
pub use machine::{ChoicePoint, Machine};
pub use tags::TagLayout;
pub use trail::{Trail, UntrailReason};
pub use type_info::{TypeInfo, TypeInfoSpace};
