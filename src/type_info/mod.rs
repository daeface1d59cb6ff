// Runtime type information.
//
// A `TypeCtorInfo` describes a type constructor independent of its
// parameters: its arity, the procedures that unify, index and compare its
// values, and optionally its layout metadata. A type_info applies a
// constructor to argument type_infos. A pseudo type_info is the same thing
// with `TypeInfo::Param(n)` placeholders standing for the n'th type
// parameter of some enclosing type_info.
//
// Type_infos are referred to by `TypeInfo` handles. Which variant a handle
// is says who owns the node behind it:
//
// - `Ctor` is a bare constructor of arity zero, used directly as its own
//   type_info. Nothing is allocated.
// - `Static` lives in the `TypeTable` for the life of the machine.
// - `Heap` was built on the machine heap by `create_type_info` and goes away
//   when the heap is restored below it.
// - `Owned` was built by `make_type_info` and lives until the
//   `AllocationList` it was recorded in is passed to `deallocate`.

mod classify;
mod compare;
mod instantiate;

use std::{borrow::Cow, fmt::Write as _};

use hashbrown::HashMap;
use log::debug;

use crate::{
    control::CodeAddr,
    error::{Result, RuntimeError},
    heap::{Addr, Heap},
    pool::Pool,
    tags::TagLayout,
    Word, WORD_BYTES,
};

pub use classify::{
    classify, encode as encode_functors, BuiltinKind, DataRepresentation, DuTag, Functors,
    FUNCTORS_DU, FUNCTORS_ENUM, FUNCTORS_EQUIV, FUNCTORS_NO_TAG, FUNCTORS_SPECIAL, FUNCTORS_UNIV,
    LAYOUT_TAG_BITS, MAX_TYPE_VAR,
};
pub use instantiate::{HeapAllocator, OwnedAllocator, TypeInfoAllocator};

pub type Atom = u32;

// Identity of a type constructor. Descriptors never move, so the id orders
// them the way their addresses would.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TypeCtorId(pub(crate) u32);

impl TypeCtorId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeInfo {
    // placeholder for the n'th (1-based) parameter of the enclosing type
    Param(u32),
    Ctor(TypeCtorId),
    Static(u32),
    Heap(Addr),
    Owned(u32),
}

impl TypeInfo {
    pub fn is_param(self) -> bool {
        matches!(self, TypeInfo::Param(_))
    }

    // True for copies made by instantiation, false for handles that alias
    // descriptors the machine already had.
    pub fn is_allocated_copy(self) -> bool {
        matches!(self, TypeInfo::Heap(_) | TypeInfo::Owned(_))
    }

    fn encode(self) -> [Word; 2] {
        match self {
            TypeInfo::Param(n) => [0, n as Word],
            TypeInfo::Ctor(id) => [1, id.0 as Word],
            TypeInfo::Static(id) => [2, id as Word],
            TypeInfo::Heap(addr) => [3, addr],
            TypeInfo::Owned(id) => [4, id as Word],
        }
    }

    fn decode(kind: Word, payload: Word) -> Option<TypeInfo> {
        Some(match kind {
            0 => TypeInfo::Param(payload as u32),
            1 => TypeInfo::Ctor(TypeCtorId(payload as u32)),
            2 => TypeInfo::Static(payload as u32),
            3 => TypeInfo::Heap(payload),
            4 => TypeInfo::Owned(payload as u32),
            _ => return None,
        })
    }
}

// A constructor applied to its arguments. For higher-order types the
// number of arguments is the type's own arity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeInfoNode {
    pub ctor: TypeCtorId,
    pub args: Vec<TypeInfo>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeProcs {
    pub unify: CodeAddr,
    pub index: CodeAddr,
    pub compare: CodeAddr,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeCtorLayout {
    pub functors_indicator: Word,
    pub layout_entry: Word,
    pub module: Atom,
    pub name: Atom,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeCtorInfo {
    pub arity: usize,
    pub procs: TypeProcs,
    // every pred and func type shares one of these
    pub higher_order: bool,
    // the type this one is a synonym for; kept whether or not layout
    // metadata is
    pub equivalent: Option<TypeInfo>,
    pub layout: Option<TypeCtorLayout>,
}

impl TypeCtorInfo {
    pub fn equivalent(&self) -> Option<TypeInfo> {
        self.equivalent
    }
}

// Everything the compiler says about a type constructor.
#[derive(Debug, Clone)]
pub struct TypeCtorDesc<'a> {
    pub module: &'a str,
    pub name: &'a str,
    pub arity: usize,
    pub procs: TypeProcs,
    pub higher_order: bool,
    pub functors: Functors,
}

// Static type_ctor_infos and pseudo type_infos.
pub struct TypeTable {
    layout: TagLayout,
    with_layout: bool,
    ctors: Vec<TypeCtorInfo>,
    statics: Vec<TypeInfoNode>,
    names: Pool<String, Atom>,
    by_name: HashMap<(Atom, Atom), TypeCtorId>,
}

impl TypeTable {
    pub fn new(layout: TagLayout, with_layout: bool) -> Self {
        TypeTable {
            layout,
            with_layout,
            ctors: Vec::new(),
            statics: Vec::new(),
            names: Pool::new(),
            by_name: HashMap::new(),
        }
    }

    pub fn add_ctor(&mut self, desc: TypeCtorDesc<'_>) -> TypeCtorId {
        let id = TypeCtorId(self.ctors.len() as u32);
        let equivalent = match desc.functors {
            Functors::Equiv(target) => Some(target),
            _ => None,
        };

        let layout = if self.with_layout {
            let (functors_indicator, layout_entry) = encode_functors(&self.layout, desc.functors);
            let module = self.names.add_ref(desc.module);
            let name = self.names.add_ref(desc.name);
            self.by_name.insert((module, name), id);

            Some(TypeCtorLayout {
                functors_indicator,
                layout_entry,
                module,
                name,
            })
        } else {
            None
        };

        debug!(
            "type_ctor_info {}:{}/{} registered as #{}",
            desc.module, desc.name, desc.arity, id.0
        );
        self.ctors.push(TypeCtorInfo {
            arity: desc.arity,
            procs: desc.procs,
            higher_order: desc.higher_order,
            equivalent,
            layout,
        });
        id
    }

    // A static pseudo type_info applying `ctor` to `args`.
    pub fn add_static(&mut self, ctor: TypeCtorId, args: Vec<TypeInfo>) -> TypeInfo {
        debug_assert!(self
            .ctors
            .get(ctor.index())
            .map_or(false, |c| c.higher_order || c.arity == args.len()));

        let id = self.statics.len() as u32;
        self.statics.push(TypeInfoNode { ctor, args });
        TypeInfo::Static(id)
    }

    pub fn ctor(&self, id: TypeCtorId) -> Result<&TypeCtorInfo> {
        self.ctors
            .get(id.index())
            .ok_or(RuntimeError::UnknownTypeCtor(id.0))
    }

    pub fn lookup(&self, module: &str, name: &str) -> Option<TypeCtorId> {
        let module = self.names.find(module)?;
        let name = self.names.find(name)?;
        self.by_name.get(&(module, name)).copied()
    }

    pub fn name_of(&self, id: TypeCtorId) -> Option<(&str, &str)> {
        let layout = self.ctors.get(id.index())?.layout.as_ref()?;
        let module = self.names.get(layout.module)?;
        let name = self.names.get(layout.name)?;
        Some((module.as_str(), name.as_str()))
    }

    pub fn data_representation(&self, id: TypeCtorId) -> DataRepresentation {
        match self.ctors.get(id.index()).and_then(|c| c.layout.as_ref()) {
            Some(l) => classify(&self.layout, l.functors_indicator, l.layout_entry),
            None => DataRepresentation::Unknown,
        }
    }

    pub fn len(&self) -> usize {
        self.ctors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ctors.is_empty()
    }
}

// Type_infos owned by explicit allocation lists.
#[derive(Debug, Default)]
pub struct OwnedTypeInfos {
    slots: Vec<Option<TypeInfoNode>>,
    free: Vec<u32>,
}

impl OwnedTypeInfos {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&mut self, node: TypeInfoNode) -> u32 {
        match self.free.pop() {
            Some(id) => {
                self.slots[id as usize] = Some(node);
                id
            }
            None => {
                self.slots.push(Some(node));
                (self.slots.len() - 1) as u32
            }
        }
    }

    fn get(&self, id: u32) -> Option<&TypeInfoNode> {
        self.slots.get(id as usize).and_then(Option::as_ref)
    }

    fn remove(&mut self, id: u32) {
        if let Some(slot) = self.slots.get_mut(id as usize) {
            if slot.take().is_some() {
                self.free.push(id);
            }
        }
    }

    pub fn live(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    // Free every block recorded in `list`.
    pub fn deallocate(&mut self, list: AllocationList) {
        for id in list.blocks {
            self.remove(id);
        }
    }
}

// The blocks one or more `make_type_info` calls allocated. The caller owns
// them until it hands the list to `OwnedTypeInfos::deallocate`.
#[derive(Debug, Default, PartialEq, Eq)]
#[must_use]
pub struct AllocationList {
    blocks: Vec<u32>,
}

impl AllocationList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    fn push(&mut self, id: u32) {
        self.blocks.push(id);
    }
}

// Everything type_info handles can point into.
pub struct TypeInfoSpace<'m> {
    pub table: &'m TypeTable,
    pub heap: &'m mut Heap,
    pub owned: &'m mut OwnedTypeInfos,
}

impl TypeInfoSpace<'_> {
    pub fn read(&self, ti: TypeInfo) -> Result<Cow<'_, TypeInfoNode>> {
        match ti {
            TypeInfo::Param(var) => Err(RuntimeError::UnboundTypeVariable {
                context: "type_info lookup",
                var,
            }),
            TypeInfo::Ctor(ctor) => {
                self.table.ctor(ctor)?;
                Ok(Cow::Owned(TypeInfoNode {
                    ctor,
                    args: Vec::new(),
                }))
            }
            TypeInfo::Static(id) => self
                .table
                .statics
                .get(id as usize)
                .map(Cow::Borrowed)
                .ok_or(RuntimeError::DanglingTypeInfo(ti)),
            TypeInfo::Heap(addr) => read_heap_node(self.heap, addr)
                .map(Cow::Owned)
                .ok_or(RuntimeError::DanglingTypeInfo(ti)),
            TypeInfo::Owned(id) => self
                .owned
                .get(id)
                .map(Cow::Borrowed)
                .ok_or(RuntimeError::DanglingTypeInfo(ti)),
        }
    }

    // Render a type_info as `module:name(arg, ...)` for diagnostics.
    pub fn describe(&self, ti: TypeInfo) -> Result<String> {
        let mut out = String::new();
        self.describe_into(ti, &mut out)?;
        Ok(out)
    }

    fn describe_into(&self, ti: TypeInfo, out: &mut String) -> Result<()> {
        if let TypeInfo::Param(n) = ti {
            let _ = write!(out, "T{}", n);
            return Ok(());
        }

        let node = self.read(ti)?;
        match self.table.name_of(node.ctor) {
            Some((module, name)) => {
                let _ = write!(out, "{}:{}", module, name);
            }
            None => {
                let _ = write!(out, "#{}", node.ctor.0);
            }
        }

        if !node.args.is_empty() {
            out.push('(');
            for (i, &arg) in node.args.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                self.describe_into(arg, out)?;
            }
            out.push(')');
        }
        Ok(())
    }
}

// heap layout of a type_info: ctor id, argument count, then each argument
// handle as a (kind, payload) pair
fn heap_node_words(node: &TypeInfoNode) -> Vec<Word> {
    let mut words = Vec::with_capacity(2 + 2 * node.args.len());
    words.push(node.ctor.0 as Word);
    words.push(node.args.len());
    for arg in &node.args {
        words.extend_from_slice(&arg.encode());
    }
    words
}

fn read_heap_node(heap: &Heap, addr: Addr) -> Option<TypeInfoNode> {
    if addr / WORD_BYTES + 2 > heap_extent(heap) {
        return None;
    }

    let cell = |i: usize| heap.get(addr + i * WORD_BYTES);
    let ctor = TypeCtorId(cell(0) as u32);
    let count = cell(1);
    let end = count
        .checked_mul(2)
        .and_then(|n| n.checked_add(addr / WORD_BYTES + 2))?;
    if end > heap_extent(heap) {
        return None;
    }

    let args = (0..count)
        .map(|i| TypeInfo::decode(cell(2 + 2 * i), cell(3 + 2 * i)))
        .collect::<Option<Vec<_>>>()?;
    Some(TypeInfoNode { ctor, args })
}

fn heap_extent(heap: &Heap) -> usize {
    heap.words_in_use()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Reclamation, TagPosition};

    pub(crate) const PROCS: TypeProcs = TypeProcs {
        unify: 0x1000,
        index: 0x1008,
        compare: 0x1010,
    };

    pub(crate) fn desc<'a>(name: &'a str, arity: usize, functors: Functors) -> TypeCtorDesc<'a> {
        TypeCtorDesc {
            module: "test",
            name,
            arity,
            procs: PROCS,
            higher_order: false,
            functors,
        }
    }

    pub(crate) fn fixture() -> (TypeTable, Heap, OwnedTypeInfos) {
        let layout = TagLayout::new(2, TagPosition::Low);
        (
            TypeTable::new(layout, true),
            Heap::new(layout, Reclamation::Truncate, 1024),
            OwnedTypeInfos::new(),
        )
    }

    #[test]
    fn ctors_are_found_by_name() {
        let (mut table, _, _) = fixture();
        let int = table.add_ctor(desc("int", 0, Functors::Special(BuiltinKind::Int)));
        let list = table.add_ctor(desc("list", 1, Functors::Du(DuTag::Simple)));

        assert_eq!(table.lookup("test", "list"), Some(list));
        assert_eq!(table.lookup("test", "float"), None);
        assert_eq!(table.name_of(int), Some(("test", "int")));
        assert_eq!(table.data_representation(int), DataRepresentation::Int);
        assert!(int < list);
    }

    #[test]
    fn without_layout_there_is_no_metadata() {
        let layout = TagLayout::new(0, TagPosition::Low);
        let mut table = TypeTable::new(layout, false);
        let int = table.add_ctor(desc("int", 0, Functors::Special(BuiltinKind::Int)));
        assert_eq!(table.data_representation(int), DataRepresentation::Unknown);
        assert_eq!(table.lookup("test", "int"), None);
        assert_eq!(table.ctor(int).map(|c| c.equivalent()), Ok(None));

        // synonyms still know their target
        let list = table.add_ctor(desc("list", 1, Functors::Du(DuTag::Simple)));
        let list_t1 = table.add_static(list, vec![TypeInfo::Param(1)]);
        let seq = table.add_ctor(desc("seq", 1, Functors::Equiv(list_t1)));
        assert_eq!(table.ctor(seq).map(|c| c.equivalent()), Ok(Some(list_t1)));
        assert_eq!(table.data_representation(seq), DataRepresentation::Unknown);
    }

    #[test]
    fn heap_nodes_read_back() {
        let (mut table, mut heap, mut owned) = fixture();
        let int = table.add_ctor(desc("int", 0, Functors::Special(BuiltinKind::Int)));
        let pair = table.add_ctor(desc("pair", 2, Functors::Du(DuTag::Simple)));
        let node = TypeInfoNode {
            ctor: pair,
            args: vec![TypeInfo::Ctor(int), TypeInfo::Param(2)],
        };
        let addr = heap.create(&heap_node_words(&node)).unwrap();

        let space = TypeInfoSpace {
            table: &table,
            heap: &mut heap,
            owned: &mut owned,
        };
        assert_eq!(space.read(TypeInfo::Heap(addr)).unwrap().as_ref(), &node);
        assert_eq!(space.describe(TypeInfo::Heap(addr)).unwrap(), "test:pair(test:int, T2)");
    }

    #[test]
    fn reading_past_the_heap_top_is_dangling() {
        let (table, mut heap, mut owned) = fixture();
        let space = TypeInfoSpace {
            table: &table,
            heap: &mut heap,
            owned: &mut owned,
        };
        let ti = TypeInfo::Heap(64 * WORD_BYTES);
        assert_eq!(space.read(ti).err(), Some(RuntimeError::DanglingTypeInfo(ti)));
    }

    #[test]
    fn stale_handles_with_absurd_arities_are_dangling() {
        let (mut table, mut heap, mut owned) = fixture();
        let int = table.add_ctor(desc("int", 0, Functors::Special(BuiltinKind::Int)));
        let list = table.add_ctor(desc("list", 1, Functors::Du(DuTag::Simple)));
        let node = TypeInfoNode {
            ctor: list,
            args: vec![TypeInfo::Ctor(int)],
        };

        // the node is backtracked away and its cells reused for other data
        let mark = heap.mark();
        let addr = heap.create(&heap_node_words(&node)).unwrap();
        heap.restore(mark);
        heap.create(&[list.0 as Word, usize::MAX / 2 + 1, 0, 0]).unwrap();
        let stale = TypeInfo::Heap(addr);

        let mut space = TypeInfoSpace {
            table: &table,
            heap: &mut heap,
            owned: &mut owned,
        };
        assert_eq!(space.read(stale).err(), Some(RuntimeError::DanglingTypeInfo(stale)));

        space.heap.set(addr + WORD_BYTES, usize::MAX);
        assert_eq!(space.read(stale).err(), Some(RuntimeError::DanglingTypeInfo(stale)));
    }

    #[test]
    fn owned_slots_are_reused_after_deallocate() {
        let mut owned = OwnedTypeInfos::new();
        let node = TypeInfoNode {
            ctor: TypeCtorId(0),
            args: Vec::new(),
        };
        let mut list = AllocationList::new();
        list.push(owned.insert(node.clone()));
        list.push(owned.insert(node.clone()));
        assert_eq!(owned.live(), 2);

        owned.deallocate(list);
        assert_eq!(owned.live(), 0);
        assert!(owned.get(0).is_none());
        let again = owned.insert(node);
        assert!(again < 2);
    }
}
