use std::{borrow::Borrow, hash::Hash};

use hashbrown::HashMap;

// Index types a `Pool` can hand out.
pub trait PoolIndex: Copy {
    fn from_index(index: usize) -> Self;
    fn index(self) -> usize;
}

impl PoolIndex for u32 {
    fn from_index(index: usize) -> Self {
        debug_assert!(index <= u32::MAX as usize);
        index as u32
    }

    fn index(self) -> usize {
        self as usize
    }
}

// Interning pool: every distinct value is stored once and named by a small
// index.
#[derive(Debug, Clone)]
pub struct Pool<T, I> {
    items: Vec<T>,
    index: HashMap<T, I>,
}

impl<T, I> Default for Pool<T, I> {
    fn default() -> Self {
        Pool {
            items: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<T: Eq + Hash + Clone, I: PoolIndex> Pool<T, I> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, item: T) -> I {
        if let Some(&id) = self.index.get(&item) {
            return id;
        }

        let id = I::from_index(self.items.len());
        self.items.push(item.clone());
        self.index.insert(item, id);
        id
    }

    pub fn add_ref<Q>(&mut self, item: &Q) -> I
    where
        T: Borrow<Q>,
        Q: Hash + Eq + ToOwned<Owned = T> + ?Sized,
    {
        match self.index.get(item) {
            Some(&id) => id,
            None => self.add(item.to_owned()),
        }
    }

    pub fn find<Q>(&self, item: &Q) -> Option<I>
    where
        T: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.index.get(item).copied()
    }

    pub fn get(&self, id: I) -> Option<&T> {
        self.items.get(id.index())
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
