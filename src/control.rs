// Control transfer between code blocks.
//
// Generated code is a set of blocks. A block runs to completion and says
// where to go next; `Machine::run` is the loop that keeps jumping. Entering a
// block needs no return address, and any number of call sites may jump to
// the same one.

use crate::{
    error::{Result, RuntimeError},
    machine::Machine,
    Word, WORD_BYTES,
};

pub type CodeAddr = Word;

// keeps code addresses clear of small integers and the null address
pub const CODE_BASE: CodeAddr = 0x1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transfer {
    Jump(CodeAddr),
    // jump to the machine's succip register
    Proceed,
    Halt,
}

pub type Block = fn(&mut Machine) -> Result<Transfer>;

#[derive(Default)]
pub struct Program {
    blocks: Vec<Block>,
}

impl Program {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, block: Block) -> CodeAddr {
        let addr = CODE_BASE + self.blocks.len() * WORD_BYTES;
        self.blocks.push(block);
        addr
    }

    pub fn block(&self, addr: CodeAddr) -> Result<Block> {
        if addr < CODE_BASE || (addr - CODE_BASE) % WORD_BYTES != 0 {
            return Err(RuntimeError::BadJump(addr));
        }

        self.blocks
            .get((addr - CODE_BASE) / WORD_BYTES)
            .copied()
            .ok_or(RuntimeError::BadJump(addr))
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}
