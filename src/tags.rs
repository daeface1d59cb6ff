// Word layout: a handful of tag bits plus a body.
//
// Low tagging keeps the tag in the bits a word-aligned address never uses,
// so a tagged pointer is just `address + tag`. High tagging parks the tag in
// the top bits and leaves the body in place.

use crate::{config::TagPosition, Word, WORD_BITS, WORD_BYTES};

pub const TAG_NIL: Word = 0;
pub const TAG_CONS: Word = 1;
// Prolog-style variable cells
pub const TAG_VAR: Word = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagLayout {
    bits: u32,
    position: TagPosition,
}

impl TagLayout {
    pub const fn new(bits: u32, position: TagPosition) -> Self {
        TagLayout { bits, position }
    }

    pub fn bits(&self) -> u32 {
        self.bits
    }

    pub fn position(&self) -> TagPosition {
        self.position
    }

    // Number of distinct discriminants a word can carry.
    pub fn num_tags(&self) -> Word {
        1 << self.bits
    }

    fn low_mask(&self) -> Word {
        (1 << self.bits) - 1
    }

    fn body_mask(&self) -> Word {
        match self.position {
            TagPosition::Low => !self.low_mask(),
            TagPosition::High => Word::MAX >> self.bits,
        }
    }

    // Discriminant -> the tag as it appears inside a word.
    pub fn make_tag(&self, discriminant: Word) -> Word {
        debug_assert!(discriminant < self.num_tags());
        match self.position {
            TagPosition::Low => discriminant,
            TagPosition::High => discriminant
                .checked_shl(WORD_BITS - self.bits)
                .unwrap_or(0),
        }
    }

    // Inverse of `make_tag`.
    pub fn unmake_tag(&self, tag: Word) -> Word {
        match self.position {
            TagPosition::Low => tag,
            TagPosition::High => tag.checked_shr(WORD_BITS - self.bits).unwrap_or(0),
        }
    }

    // The tag bits of `word`, still in place.
    pub fn tag(&self, word: Word) -> Word {
        word & !self.body_mask()
    }

    pub fn extract_tag(&self, word: Word) -> Word {
        self.unmake_tag(self.tag(word))
    }

    // Shift a small integer into body position.
    pub fn make_body(&self, value: Word) -> Word {
        match self.position {
            TagPosition::Low => value << self.bits,
            TagPosition::High => value,
        }
    }

    pub fn unmake_body(&self, word: Word) -> Word {
        match self.position {
            TagPosition::Low => word >> self.bits,
            TagPosition::High => word,
        }
    }

    // Remove the in-place tag `tag` from `word`.
    pub fn body(&self, word: Word, tag: Word) -> Word {
        match self.position {
            TagPosition::Low => word.wrapping_sub(tag),
            TagPosition::High => word & self.body_mask(),
        }
    }

    pub fn extract_body(&self, word: Word, discriminant: Word) -> Word {
        self.body(word, self.make_tag(discriminant))
    }

    pub fn strip_tag(&self, word: Word) -> Word {
        word & self.body_mask()
    }

    // Attach an in-place tag to a body.
    pub fn mkword(&self, tag: Word, body: Word) -> Word {
        body.wrapping_add(tag)
    }

    pub fn combine(&self, discriminant: Word, body: Word) -> Word {
        self.mkword(self.make_tag(discriminant), body)
    }

    // Whether `body` can carry a tag without losing information.
    pub fn is_valid_body(&self, body: Word) -> bool {
        body & !self.body_mask() == 0
    }

    // Address of field `index` of the cell `ptr` points at.
    pub fn field_addr(&self, tag: Word, ptr: Word, index: usize) -> Word {
        self.body(ptr, tag) + index * WORD_BYTES
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layouts() -> Vec<TagLayout> {
        let mut layouts = Vec::new();
        for bits in 0..=WORD_BYTES.trailing_zeros() {
            layouts.push(TagLayout::new(bits, TagPosition::Low));
        }
        for bits in 0..=8 {
            layouts.push(TagLayout::new(bits, TagPosition::High));
        }
        layouts
    }

    fn bodies(layout: &TagLayout) -> Vec<Word> {
        [0, 1, 2, 7, 1000, 0x1234_5678]
            .iter()
            .map(|&n| n * WORD_BYTES)
            .chain([layout.make_body(5), layout.strip_tag(Word::MAX)])
            .filter(|&b| layout.is_valid_body(b))
            .collect()
    }

    #[test]
    fn body_and_tag_round_trip() {
        for layout in layouts() {
            for d in 0..layout.num_tags() {
                for b in bodies(&layout) {
                    let word = layout.combine(d, b);
                    assert_eq!(layout.extract_body(word, d), b, "{:?} d={} b={:#x}", layout, d, b);
                    assert_eq!(layout.extract_tag(word), d, "{:?} d={} b={:#x}", layout, d, b);
                }
            }
        }
    }

    #[test]
    fn make_body_round_trips() {
        for layout in layouts() {
            for i in [0, 1, 2, 3, 4096] {
                assert_eq!(layout.unmake_body(layout.make_body(i)), i);
            }
        }
    }

    #[test]
    fn low_tags_sit_in_alignment_bits() {
        let layout = TagLayout::new(2, TagPosition::Low);
        assert_eq!(layout.combine(TAG_CONS, 0x40), 0x41);
        assert_eq!(layout.tag(0x43), 3);
        assert_eq!(layout.strip_tag(0x43), 0x40);
    }

    #[test]
    fn high_tags_sit_in_top_bits() {
        let layout = TagLayout::new(2, TagPosition::High);
        let word = layout.combine(TAG_VAR, 0x40);
        assert_eq!(word >> (WORD_BITS - 2), 3);
        assert_eq!(layout.strip_tag(word), 0x40);
    }

    #[test]
    fn zero_tag_bits_degrade_to_identity() {
        for position in [TagPosition::Low, TagPosition::High] {
            let layout = TagLayout::new(0, position);
            assert_eq!(layout.num_tags(), 1);
            assert_eq!(layout.combine(0, 0x1238), 0x1238);
            assert_eq!(layout.extract_tag(Word::MAX), 0);
            assert_eq!(layout.strip_tag(Word::MAX), Word::MAX);
        }
    }

    #[test]
    fn field_addresses_skip_the_tag() {
        let layout = TagLayout::new(3, TagPosition::Low);
        let ptr = layout.combine(TAG_CONS, 0x80);
        assert_eq!(layout.field_addr(layout.make_tag(TAG_CONS), ptr, 1), 0x80 + WORD_BYTES);
    }
}
