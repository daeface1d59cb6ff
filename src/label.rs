// Label table: every code entry point registered by name and by address.
//
// Two labels at the same address happen all the time, whenever the code
// generated between them turns out to be empty. Two labels with the same
// name should not happen and get reported.

use log::{debug, trace, warn};

use crate::{
    control::CodeAddr,
    table::{Index, Table},
    WORD_BYTES,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Label {
    pub name: String,
    pub addr: CodeAddr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LabelId(u32);

impl LabelId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Registration {
    pub id: LabelId,
    // set when the name was already taken; lookups by name keep returning
    // the earlier label
    pub duplicate_of: Option<LabelId>,
}

impl Registration {
    pub fn is_duplicate(&self) -> bool {
        self.duplicate_of.is_some()
    }
}

pub type ModuleInit = Box<dyn FnOnce(&mut LabelTable)>;

struct ByName;

impl Index for ByName {
    type Record = Label;
    type Key = str;

    fn key(label: &Label) -> &str {
        &label.name
    }

    fn hash(name: &str) -> usize {
        hash_name(name)
    }

    fn equal(a: &str, b: &str) -> bool {
        a == b
    }
}

struct ByAddr;

impl Index for ByAddr {
    type Record = Label;
    type Key = CodeAddr;

    fn key(label: &Label) -> &CodeAddr {
        &label.addr
    }

    fn hash(addr: &CodeAddr) -> usize {
        hash_addr(*addr)
    }

    fn equal(a: &CodeAddr, b: &CodeAddr) -> bool {
        a == b
    }
}

pub fn hash_name(name: &str) -> usize {
    name.bytes()
        .fold(0usize, |h, b| h.wrapping_shl(1).wrapping_add(b as usize))
}

// code addresses are word aligned, the low bits carry nothing
pub fn hash_addr(addr: CodeAddr) -> usize {
    addr >> WORD_BYTES.trailing_zeros()
}

pub struct LabelTable {
    labels: Vec<Label>,
    by_name: Table<ByName>,
    by_addr: Table<ByAddr>,
    pending: Vec<ModuleInit>,
    duplicates: usize,
}

impl LabelTable {
    pub fn new(buckets: usize) -> Self {
        LabelTable {
            labels: Vec::new(),
            by_name: Table::new(buckets),
            by_addr: Table::new(buckets),
            pending: Vec::new(),
            duplicates: 0,
        }
    }

    pub fn insert(&mut self, name: impl Into<String>, addr: CodeAddr) -> Registration {
        let id = self.labels.len();
        self.labels.push(Label {
            name: name.into(),
            addr,
        });
        let label = &self.labels[id];
        trace!("inserting label {} at {:#x}", label.name, addr);

        let duplicate_of = self.by_name.insert(&self.labels, id).map(to_id);
        if duplicate_of.is_some() {
            warn!("duplicated label name {}", self.labels[id].name);
            self.duplicates += 1;
        }

        // keeps the first label registered at this address
        let _ = self.by_addr.insert(&self.labels, id);

        Registration {
            id: to_id(id),
            duplicate_of,
        }
    }

    // Queue a module's label registrations until the first lookup.
    pub fn add_module_init(&mut self, init: ModuleInit) {
        self.pending.push(init);
    }

    // Run every queued module initialiser. Safe to call repeatedly.
    pub fn ensure_initialized(&mut self) {
        if self.pending.is_empty() {
            return;
        }

        let pending = std::mem::take(&mut self.pending);
        debug!("initialising labels for {} modules", pending.len());
        for init in pending {
            init(self);
        }
    }

    pub fn lookup_by_name(&mut self, name: &str) -> Option<&Label> {
        self.ensure_initialized();
        trace!("looking for label {}", name);
        self.by_name
            .lookup(&self.labels, name)
            .map(|id| &self.labels[id])
    }

    pub fn lookup_by_addr(&mut self, addr: CodeAddr) -> Option<&Label> {
        self.ensure_initialized();
        trace!("looking for label at {:#x}", addr);
        self.by_addr
            .lookup(&self.labels, &addr)
            .map(|id| &self.labels[id])
    }

    // Every registered label, in registration order.
    pub fn all_labels(&mut self) -> &[Label] {
        self.ensure_initialized();
        &self.labels
    }

    pub fn get(&self, id: LabelId) -> Option<&Label> {
        self.labels.get(id.index())
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn duplicates(&self) -> usize {
        self.duplicates
    }

    pub fn longest_chain(&self) -> usize {
        self.by_name.longest_chain().max(self.by_addr.longest_chain())
    }
}

fn to_id(index: usize) -> LabelId {
    LabelId(index as u32)
}
