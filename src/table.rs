// Fixed-size chained hash table over records kept elsewhere.
//
// The table never resizes: it is sized once for the expected number of
// entries and collision chains absorb the rest. Buckets hold record
// indices; the key, hash and equality come from an `Index`.

use std::marker::PhantomData;

pub trait Index {
    type Record;
    type Key: ?Sized;

    fn key(record: &Self::Record) -> &Self::Key;
    fn hash(key: &Self::Key) -> usize;
    fn equal(a: &Self::Key, b: &Self::Key) -> bool;
}

pub struct Table<I: Index> {
    buckets: Vec<Vec<usize>>,
    entries: usize,
    _index: PhantomData<I>,
}

impl<I: Index> Table<I> {
    pub fn new(size: usize) -> Self {
        let mut buckets = Vec::with_capacity(size);
        buckets.resize_with(size, Vec::new);
        Table {
            buckets,
            entries: 0,
            _index: PhantomData,
        }
    }

    fn bucket(&self, key: &I::Key) -> usize {
        I::hash(key) % self.buckets.len()
    }

    // Index `records[id]`. If a record with an equal key is already present
    // the table is left unchanged and that record's index is returned.
    pub fn insert(&mut self, records: &[I::Record], id: usize) -> Option<usize> {
        let key = I::key(&records[id]);
        if let Some(existing) = self.lookup(records, key) {
            return Some(existing);
        }

        let bucket = self.bucket(key);
        self.buckets[bucket].push(id);
        self.entries += 1;
        None
    }

    pub fn lookup(&self, records: &[I::Record], key: &I::Key) -> Option<usize> {
        self.buckets[self.bucket(key)]
            .iter()
            .copied()
            .find(|&id| I::equal(I::key(&records[id]), key))
    }

    pub fn len(&self) -> usize {
        self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries == 0
    }

    pub fn longest_chain(&self) -> usize {
        self.buckets.iter().map(Vec::len).max().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ByFirst;

    impl Index for ByFirst {
        type Record = (u32, &'static str);
        type Key = u32;

        fn key(record: &Self::Record) -> &u32 {
            &record.0
        }

        fn hash(key: &u32) -> usize {
            *key as usize
        }

        fn equal(a: &u32, b: &u32) -> bool {
            a == b
        }
    }

    #[test]
    fn collisions_chain() {
        let records = [(1, "a"), (5, "b"), (9, "c")];
        let mut table: Table<ByFirst> = Table::new(4);
        for id in 0..records.len() {
            assert_eq!(table.insert(&records, id), None);
        }
        assert_eq!(table.longest_chain(), 3);
        assert_eq!(table.lookup(&records, &5), Some(1));
        assert_eq!(table.lookup(&records, &2), None);
    }

    #[test]
    fn duplicate_keeps_first() {
        let records = [(3, "first"), (3, "second")];
        let mut table: Table<ByFirst> = Table::new(8);
        assert_eq!(table.insert(&records, 0), None);
        assert_eq!(table.insert(&records, 1), Some(0));
        assert_eq!(table.len(), 1);
        assert_eq!(table.lookup(&records, &3), Some(0));
    }
}
