// The trail records what has to be undone when execution backtracks past a
// choice point.
//
// Creating a choice point takes a `Ticket`: the current trail position
// together with the ticket counter, which is then bumped. Every ticket is
// finished by exactly one `unwind_to` or `discard_to`, innermost first.

use std::fmt;

use log::trace;

use crate::{
    error::{Result, RuntimeError},
    heap::Addr,
    Word,
};

// Memory that value entries are restored into.
pub trait Store {
    fn read(&self, addr: Addr) -> Word;
    fn write(&mut self, addr: Addr, value: Word);
}

// Why the trail is being traversed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UntrailReason {
    // ordinary backtracking: values are restored, functions are called
    Undo,
    // pruning: values are dropped, functions are called so they can tell
    // a commit from an undo
    Commit,
    // like Undo, but functions may treat it differently
    Exception,
    // reserved for an accurate collector, treated like Undo
    Gc,
}

pub type UntrailFn = Box<dyn FnMut(Word, UntrailReason)>;

pub enum TrailEntry {
    Value { address: Addr, value: Word },
    Function { func: UntrailFn, datum: Word },
}

impl fmt::Debug for TrailEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrailEntry::Value { address, value } => f
                .debug_struct("Value")
                .field("address", &format_args!("{:#x}", address))
                .field("value", value)
                .finish(),
            TrailEntry::Function { datum, .. } => {
                f.debug_struct("Function").field("datum", datum).finish()
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TrailMark(usize);

impl TrailMark {
    pub fn entries(self) -> usize {
        self.0
    }
}

// Identifies "the current choice point" by the number of live ones.
//
// Two samples being equal means no choice point was created or removed in
// between, provided the choice point current at the first sample has not
// been backtracked over. Removing one and creating another in between
// gives the same id again, which callers must tolerate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChoicepointId(u64);

// Everything needed to backtrack to a choice point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    pub trail: TrailMark,
    pub choicepoints: ChoicepointId,
}

pub struct Trail {
    entries: Vec<TrailEntry>,
    ticket_counter: u64,
    capacity: usize,
}

impl Trail {
    pub fn new(capacity: usize) -> Self {
        Trail {
            entries: Vec::new(),
            ticket_counter: 0,
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn position(&self) -> TrailMark {
        TrailMark(self.entries.len())
    }

    pub fn entries(&self) -> &[TrailEntry] {
        &self.entries
    }

    // Called when a choice point is created.
    pub fn mark(&mut self) -> Ticket {
        let ticket = Ticket {
            trail: self.position(),
            choicepoints: ChoicepointId(self.ticket_counter),
        };
        self.ticket_counter += 1;
        ticket
    }

    pub fn current_choicepoint_id(&self) -> ChoicepointId {
        ChoicepointId(self.ticket_counter)
    }

    fn push(&mut self, entry: TrailEntry) -> Result<()> {
        if self.entries.len() >= self.capacity {
            return Err(RuntimeError::TrailExhausted {
                capacity: self.capacity,
            });
        }
        self.entries.push(entry);
        Ok(())
    }

    // On backtracking, put `value` back into `address`.
    pub fn record_value(&mut self, address: Addr, value: Word) -> Result<()> {
        self.push(TrailEntry::Value { address, value })
    }

    // On backtracking, restore whatever `address` holds right now.
    pub fn record_value_at(&mut self, store: &impl Store, address: Addr) -> Result<()> {
        let value = store.read(address);
        self.record_value(address, value)
    }

    // On backtracking call `func(datum, Undo)`; on commit call
    // `func(datum, Commit)`.
    pub fn record_callback<F>(&mut self, func: F, datum: Word) -> Result<()>
    where
        F: FnMut(Word, UntrailReason) + 'static,
    {
        self.push(TrailEntry::Function {
            func: Box::new(func),
            datum,
        })
    }

    // Apply and discard every entry above `target`, newest first. The
    // choice point stays live, ready for its next alternative.
    pub fn reset_to(&mut self, target: TrailMark, reason: UntrailReason, store: &mut impl Store) {
        if self.entries.len() > target.0 {
            trace!(
                "untrail {:?} from {} to {}",
                reason,
                self.entries.len(),
                target.0
            );
        }

        while self.entries.len() > target.0 {
            let Some(entry) = self.entries.pop() else {
                break;
            };

            match entry {
                TrailEntry::Value { address, value } => {
                    if reason != UntrailReason::Commit {
                        store.write(address, value);
                    }
                }
                TrailEntry::Function { mut func, datum } => func(datum, reason),
            }
        }
    }

    // Backtrack over (or commit to) the choice point `ticket` was taken
    // for, and remove it.
    pub fn unwind_to(&mut self, ticket: Ticket, reason: UntrailReason, store: &mut impl Store) {
        self.reset_to(ticket.trail, reason, store);
        self.ticket_counter = ticket.choicepoints.0;
    }

    // Remove the choice point and drop its entries without calling anything.
    pub fn discard_to(&mut self, ticket: Ticket) {
        self.entries.truncate(ticket.trail.0);
        self.ticket_counter = ticket.choicepoints.0;
    }

    // Cut away or fail over the topmost choice point, leaving the trail
    // alone.
    pub fn discard_ticket(&mut self) {
        self.ticket_counter = self.ticket_counter.saturating_sub(1);
    }

    // Saved before a commit, for `prune_tickets_to` afterwards.
    pub fn mark_ticket_stack(&self) -> ChoicepointId {
        self.current_choicepoint_id()
    }

    // Drop every choice point created since `saved`, keeping their trail
    // entries for the choice points still enclosing them.
    pub fn prune_tickets_to(&mut self, saved: ChoicepointId) {
        self.ticket_counter = saved.0;
    }
}
