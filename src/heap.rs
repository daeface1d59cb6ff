// The machine heap.
//
// Cells are never freed one at a time. With `Reclamation::Truncate` the heap
// is a single zone with a bump pointer (hp) that backtracking truncates back
// to a saved mark. With `Reclamation::Conservative` every allocation is a
// block handed out by an external allocator, which a collector owns, and
// mark/restore do nothing.
//
// Addresses are byte offsets. Cells are word aligned, so the low tag bits
// of an address are always free.

use log::trace;

use crate::{
    config::Reclamation,
    error::{Result, RuntimeError},
    tags::TagLayout,
    trail::Store,
    Word, WORD_BYTES,
};

pub type Addr = Word;

// External allocations this small come from size-class free lists, which
// want an even number of words.
const SMALL_ALLOC_WORDS: usize = 16;

// A saved heap pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HeapMark(usize);

impl HeapMark {
    pub const BOTTOM: HeapMark = HeapMark(0);

    pub fn words(self) -> usize {
        self.0
    }
}

// What the collector has to do with a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scan {
    // may contain tagged pointers
    Traced,
    // never contains pointers, skip when scanning
    Atomic,
}

// The allocator a tracing collector provides when the heap does not manage
// its own zone.
pub trait BlockAllocator {
    fn alloc(&mut self, words: usize, scan: Scan) -> Option<Addr>;
    fn read(&self, addr: Addr) -> Word;
    fn write(&mut self, addr: Addr, value: Word);
    fn words_in_use(&self) -> usize;
    fn capacity(&self) -> usize;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
    pub start: Addr,
    pub words: usize,
    pub scan: Scan,
}

// In-process block allocator. Records every block with its scan kind so a
// collector (or a test) can see which memory it has to trace.
#[derive(Debug, Default)]
pub struct ArenaAllocator {
    cells: Vec<Word>,
    blocks: Vec<Block>,
    limit: usize,
}

impl ArenaAllocator {
    pub fn new(limit: usize) -> Self {
        ArenaAllocator {
            cells: Vec::new(),
            blocks: Vec::new(),
            limit,
        }
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn scan_of(&self, addr: Addr) -> Option<Scan> {
        self.blocks
            .iter()
            .find(|b| addr >= b.start && addr < b.start + b.words * WORD_BYTES)
            .map(|b| b.scan)
    }
}

impl BlockAllocator for ArenaAllocator {
    fn alloc(&mut self, words: usize, scan: Scan) -> Option<Addr> {
        let start = self.cells.len();
        let end = start.checked_add(words).filter(|&end| end <= self.limit)?;

        self.cells.resize(end, 0);
        let block = Block {
            start: start * WORD_BYTES,
            words,
            scan,
        };
        self.blocks.push(block);
        Some(block.start)
    }

    fn read(&self, addr: Addr) -> Word {
        self.cells[addr / WORD_BYTES]
    }

    fn write(&mut self, addr: Addr, value: Word) {
        self.cells[addr / WORD_BYTES] = value;
    }

    fn words_in_use(&self) -> usize {
        self.cells.len()
    }

    fn capacity(&self) -> usize {
        self.limit
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct HeapStats {
    pub allocations: usize,
    pub words_allocated: usize,
    pub peak_words: usize,
    pub clamped_restores: usize,
}

enum Region {
    Zone {
        cells: Vec<Word>,
        hp: usize,
        limit: usize,
    },
    External(Box<dyn BlockAllocator>),
}

pub struct Heap {
    layout: TagLayout,
    region: Region,
    // lowest point hp may be truncated to
    min_reclaim: HeapMark,
    stats: HeapStats,
}

impl Heap {
    pub fn new(layout: TagLayout, reclamation: Reclamation, words: usize) -> Self {
        let region = match reclamation {
            Reclamation::Truncate => Region::Zone {
                cells: Vec::new(),
                hp: 0,
                limit: words,
            },
            Reclamation::Conservative => Region::External(Box::new(ArenaAllocator::new(words))),
        };

        Heap {
            layout,
            region,
            min_reclaim: HeapMark::BOTTOM,
            stats: HeapStats::default(),
        }
    }

    pub fn with_allocator(layout: TagLayout, allocator: Box<dyn BlockAllocator>) -> Self {
        Heap {
            layout,
            region: Region::External(allocator),
            min_reclaim: HeapMark::BOTTOM,
            stats: HeapStats::default(),
        }
    }

    pub fn layout(&self) -> TagLayout {
        self.layout
    }

    pub fn reclamation(&self) -> Reclamation {
        match self.region {
            Region::Zone { .. } => Reclamation::Truncate,
            Region::External(_) => Reclamation::Conservative,
        }
    }

    pub fn stats(&self) -> HeapStats {
        self.stats
    }

    pub fn words_in_use(&self) -> usize {
        match &self.region {
            Region::Zone { hp, .. } => *hp,
            Region::External(alloc) => alloc.words_in_use(),
        }
    }

    fn bump(&mut self, count: usize, scan: Scan) -> Result<Addr> {
        let addr = match &mut self.region {
            Region::Zone { cells, hp, limit } => {
                let start = *hp;
                let end = match start.checked_add(count) {
                    Some(end) if end <= *limit => end,
                    _ => {
                        return Err(RuntimeError::HeapExhausted {
                            requested: count,
                            available: *limit - start,
                        })
                    }
                };
                if cells.len() < end {
                    cells.resize(end, 0);
                }
                cells[start..end].fill(0);
                *hp = end;
                start * WORD_BYTES
            }
            Region::External(alloc) => {
                let words = if count > 1 && count < SMALL_ALLOC_WORDS {
                    2 * ((count + 1) / 2)
                } else {
                    count
                };

                alloc
                    .alloc(words, scan)
                    .ok_or_else(|| RuntimeError::HeapExhausted {
                        requested: words,
                        available: alloc.capacity().saturating_sub(alloc.words_in_use()),
                    })?
            }
        };

        self.stats.allocations += 1;
        self.stats.words_allocated += count;
        self.stats.peak_words = self.stats.peak_words.max(self.words_in_use());
        Ok(addr)
    }

    // Allocate `count` zeroed cells and return a pointer to them tagged with
    // `tag`.
    pub fn allocate(&mut self, tag: Word, count: usize) -> Result<Word> {
        let addr = self.bump(count, Scan::Traced)?;
        Ok(self.layout.combine(tag, addr))
    }

    // Allocate cells the collector never needs to scan.
    pub fn allocate_atomic(&mut self, count: usize) -> Result<Addr> {
        self.bump(count, Scan::Atomic)
    }

    // Allocate and fill, returning the untagged address.
    pub fn create(&mut self, words: &[Word]) -> Result<Addr> {
        let addr = self.bump(words.len(), Scan::Traced)?;
        for (i, &word) in words.iter().enumerate() {
            self.set(addr + i * WORD_BYTES, word);
        }
        Ok(addr)
    }

    pub fn mark(&self) -> HeapMark {
        match self.region {
            Region::Zone { hp, .. } => HeapMark(hp),
            Region::External(_) => HeapMark::BOTTOM,
        }
    }

    // Truncate the heap back to `mark`, but never below the current
    // reclamation floor.
    pub fn restore(&mut self, mark: HeapMark) {
        let floor = self.min_reclaim;
        if let Region::Zone { hp, .. } = &mut self.region {
            if mark < floor {
                trace!("heap restore to {} clamped to floor {}", mark.0, floor.0);
                self.stats.clamped_restores += 1;
            }
            *hp = mark.max(floor).0;
        }
    }

    pub fn min_reclamation_point(&self) -> HeapMark {
        self.min_reclaim
    }

    // Protect everything below `mark` from truncation. Returns the previous
    // floor, which the caller puts back once its computation is done.
    pub fn set_min_reclamation_point(&mut self, mark: HeapMark) -> HeapMark {
        std::mem::replace(&mut self.min_reclaim, mark)
    }

    pub fn get(&self, addr: Addr) -> Word {
        match &self.region {
            Region::Zone { cells, .. } => cells[addr / WORD_BYTES],
            Region::External(alloc) => alloc.read(addr),
        }
    }

    pub fn set(&mut self, addr: Addr, value: Word) {
        match &mut self.region {
            Region::Zone { cells, .. } => cells[addr / WORD_BYTES] = value,
            Region::External(alloc) => alloc.write(addr, value),
        }
    }

    pub fn field(&self, tag: Word, ptr: Word, index: usize) -> Word {
        let tag = self.layout.make_tag(tag);
        self.get(self.layout.field_addr(tag, ptr, index))
    }

    pub fn set_field(&mut self, tag: Word, ptr: Word, index: usize, value: Word) {
        let tag = self.layout.make_tag(tag);
        let addr = self.layout.field_addr(tag, ptr, index);
        self.set(addr, value);
    }
}

impl Store for Heap {
    fn read(&self, addr: Addr) -> Word {
        self.get(addr)
    }

    fn write(&mut self, addr: Addr, value: Word) {
        self.set(addr, value)
    }
}
