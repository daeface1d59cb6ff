// Lists as hand-written support code sees them.
//
// With tag bits, nil is the word tagged TAG_NIL and a cons is a pointer
// tagged TAG_CONS to a (head, tail) pair. Without tag bits every list is a
// pointer to a cell whose first word says which of the two it is.

use crate::{
    error::Result,
    heap::Heap,
    tags::{TAG_CONS, TAG_NIL, TAG_VAR},
    Word,
};

pub fn list_empty(heap: &mut Heap) -> Result<Word> {
    let layout = heap.layout();
    if layout.bits() > 0 {
        Ok(layout.combine(TAG_NIL, layout.make_body(0)))
    } else {
        let addr = heap.create(&[TAG_NIL])?;
        Ok(layout.combine(0, addr))
    }
}

pub fn list_cons(heap: &mut Heap, head: Word, tail: Word) -> Result<Word> {
    let layout = heap.layout();
    if layout.bits() > 0 {
        let addr = heap.create(&[head, tail])?;
        Ok(layout.combine(TAG_CONS, addr))
    } else {
        let addr = heap.create(&[TAG_CONS, head, tail])?;
        Ok(layout.combine(0, addr))
    }
}

pub fn list_is_empty(heap: &Heap, list: Word) -> bool {
    let layout = heap.layout();
    if layout.bits() > 0 {
        layout.extract_tag(list) == TAG_NIL
    } else {
        heap.field(0, list, 0) == TAG_NIL
    }
}

pub fn list_head(heap: &Heap, list: Word) -> Word {
    if heap.layout().bits() > 0 {
        heap.field(TAG_CONS, list, 0)
    } else {
        heap.field(0, list, 1)
    }
}

pub fn list_tail(heap: &Heap, list: Word) -> Word {
    if heap.layout().bits() > 0 {
        heap.field(TAG_CONS, list, 1)
    } else {
        heap.field(0, list, 2)
    }
}

// Build a list of `items`, sharing nothing with existing lists.
pub fn list_from_slice(heap: &mut Heap, items: &[Word]) -> Result<Word> {
    let mut list = list_empty(heap)?;
    for &item in items.iter().rev() {
        list = list_cons(heap, item, list)?;
    }
    Ok(list)
}

pub fn list_iter(heap: &Heap, list: Word) -> ListIter<'_> {
    ListIter { heap, list }
}

pub struct ListIter<'h> {
    heap: &'h Heap,
    list: Word,
}

impl Iterator for ListIter<'_> {
    type Item = Word;

    fn next(&mut self) -> Option<Word> {
        if list_is_empty(self.heap, self.list) {
            return None;
        }

        let head = list_head(self.heap, self.list);
        self.list = list_tail(self.heap, self.list);
        Some(head)
    }
}

// Follow a chain of TAG_VAR references to the cell it ends at.
pub fn deref(heap: &Heap, mut word: Word) -> Word {
    let layout = heap.layout();
    if layout.num_tags() <= TAG_VAR {
        return word;
    }

    while layout.extract_tag(word) == TAG_VAR {
        word = heap.get(layout.extract_body(word, TAG_VAR));
    }
    word
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::{Reclamation, TagPosition},
        tags::TagLayout,
    };

    fn heap(bits: u32, position: TagPosition) -> Heap {
        Heap::new(TagLayout::new(bits, position), Reclamation::Truncate, 256)
    }

    #[test]
    fn tagged_lists() {
        for position in [TagPosition::Low, TagPosition::High] {
            let mut heap = heap(2, position);
            let list = list_from_slice(&mut heap, &[1, 2, 3]).unwrap();
            assert!(!list_is_empty(&heap, list));
            assert_eq!(list_head(&heap, list), 1);
            assert_eq!(list_iter(&heap, list).collect::<Vec<_>>(), vec![1, 2, 3]);
        }
    }

    #[test]
    fn untagged_lists_use_a_leading_discriminant() {
        let mut heap = heap(0, TagPosition::Low);
        let nil = list_empty(&mut heap).unwrap();
        assert!(list_is_empty(&heap, nil));
        assert_eq!(heap.words_in_use(), 1);

        let list = list_cons(&mut heap, 9, nil).unwrap();
        assert_eq!(heap.get(list), TAG_CONS);
        assert_eq!(list_head(&heap, list), 9);
        assert_eq!(list_tail(&heap, list), nil);
    }

    #[test]
    fn tails_are_shared() {
        let mut heap = heap(2, TagPosition::Low);
        let shared = list_from_slice(&mut heap, &[7, 8]).unwrap();
        let a = list_cons(&mut heap, 1, shared).unwrap();
        let b = list_cons(&mut heap, 2, shared).unwrap();
        assert_eq!(list_tail(&heap, a), list_tail(&heap, b));
        assert_eq!(list_iter(&heap, b).collect::<Vec<_>>(), vec![2, 7, 8]);
    }

    #[test]
    fn deref_follows_variable_chains() {
        let mut heap = heap(2, TagPosition::Low);
        let layout = heap.layout();
        let target = heap.create(&[0]).unwrap();
        heap.set(target, 42);
        let first = heap.create(&[layout.combine(TAG_VAR, target)]).unwrap();
        let var = layout.combine(TAG_VAR, first);

        assert_eq!(deref(&heap, var), 42);
        assert_eq!(deref(&heap, 5 << 2), 5 << 2);
    }
}
