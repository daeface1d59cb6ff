use crate::{error::ConfigError, type_info::LAYOUT_TAG_BITS, WORD_BITS, WORD_BYTES};

// Which end of the word the tag bits occupy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagPosition {
    Low,
    High,
}

// How heap cells are reclaimed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reclamation {
    // hp is truncated back to saved marks on backtracking
    Truncate,
    // cells come from an external block allocator traced by a collector,
    // mark/restore do nothing
    Conservative,
}

// Every build-time choice the compiled units linked into one machine must
// agree on, plus the sizes of the machine's zones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachineConfig {
    pub tag_bits: u32,
    pub tag_position: TagPosition,
    pub reclamation: Reclamation,
    pub heap_words: usize,
    pub trail_entries: usize,
    pub label_buckets: usize,
    pub registers: usize,
    pub type_layout: bool,
}

impl Default for MachineConfig {
    fn default() -> Self {
        let tag_position = if cfg!(feature = "high-tags") {
            TagPosition::High
        } else {
            TagPosition::Low
        };
        let reclamation = if cfg!(feature = "conservative-gc") {
            Reclamation::Conservative
        } else {
            Reclamation::Truncate
        };

        MachineConfig {
            tag_bits: WORD_BYTES.trailing_zeros(),
            tag_position,
            reclamation,
            heap_words: 1 << 20,
            trail_entries: 1 << 16,
            label_buckets: 1 << 16,
            registers: 32,
            type_layout: cfg!(feature = "type-layout"),
        }
    }
}

impl MachineConfig {
    pub fn with_tags(mut self, bits: u32, position: TagPosition) -> Self {
        self.tag_bits = bits;
        self.tag_position = position;
        self
    }

    pub fn with_reclamation(mut self, reclamation: Reclamation) -> Self {
        self.reclamation = reclamation;
        self
    }

    pub fn with_heap_words(mut self, words: usize) -> Self {
        self.heap_words = words;
        self
    }

    pub fn with_trail_entries(mut self, entries: usize) -> Self {
        self.trail_entries = entries;
        self
    }

    pub fn with_label_buckets(mut self, buckets: usize) -> Self {
        self.label_buckets = buckets;
        self
    }

    pub fn with_type_layout(mut self, enabled: bool) -> Self {
        self.type_layout = enabled;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tag_bits >= WORD_BITS {
            return Err(ConfigError::TagBitsExceedWord {
                bits: self.tag_bits,
                word_bits: WORD_BITS,
            });
        }

        if self.tag_position == TagPosition::Low && self.tag_bits > WORD_BYTES.trailing_zeros() {
            return Err(ConfigError::TagBitsExceedAlignment {
                bits: self.tag_bits,
                align: WORD_BYTES,
            });
        }

        if self.tag_bits > 0
            && self.tag_position == TagPosition::High
            && self.reclamation == Reclamation::Conservative
        {
            return Err(ConfigError::HighTagsWithConservativeGc);
        }

        if self.type_layout && self.tag_bits < LAYOUT_TAG_BITS {
            return Err(ConfigError::LayoutNeedsTagBits {
                bits: self.tag_bits,
                needed: LAYOUT_TAG_BITS,
            });
        }

        if self.heap_words == 0 {
            return Err(ConfigError::Zero("heap_words"));
        }
        if self.trail_entries == 0 {
            return Err(ConfigError::Zero("trail_entries"));
        }
        if self.label_buckets == 0 {
            return Err(ConfigError::Zero("label_buckets"));
        }
        if self.registers == 0 {
            return Err(ConfigError::Zero("registers"));
        }

        Ok(())
    }

    // The link-compatibility string. Units built with different grades
    // must never be linked into the same machine.
    pub fn grade(&self) -> String {
        let position = match self.tag_position {
            TagPosition::Low => "lowtags",
            TagPosition::High => "hightags",
        };
        let gc = match self.reclamation {
            Reclamation::Truncate => "nogc",
            Reclamation::Conservative => "gc",
        };
        let mut grade = format!("w{}.tags{}.{}.{}", WORD_BITS, self.tag_bits, position, gc);
        if self.type_layout {
            grade.push_str(".layout");
        }
        grade
    }

    pub fn link_compatible(&self, other: &MachineConfig) -> bool {
        self.grade() == other.grade()
    }
}
