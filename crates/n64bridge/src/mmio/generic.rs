//! Generic register latch for devices without side effects.
//!
//! Reads return whatever was last written; writes just store. This covers VI,
//! AI, PI and RI, whose behaviour lives in the external coprocessor emulation
//! that polls these latches.

use tracing::{instrument, trace, warn};

/// A fixed-size block of 32-bit registers
#[derive(Debug)]
pub struct RegisterBlock {
    name: &'static str,
    words: Box<[u32]>,
}

impl RegisterBlock {
    pub fn new(name: &'static str, size: usize) -> Self {
        Self {
            name,
            words: vec![0u32; size / 4].into_boxed_slice(),
        }
    }

    /// Block size in bytes
    pub fn size(&self) -> usize {
        self.words.len() * 4
    }

    #[instrument(level = "trace", skip(self))]
    pub fn read(&self, offset: u32) -> u32 {
        let value = self
            .words
            .get((offset / 4) as usize)
            .copied()
            .unwrap_or(0);
        trace!("{} register read: offset={:#X}, value={:#X}", self.name, offset, value);
        value
    }

    #[instrument(level = "trace", skip(self))]
    pub fn write(&mut self, offset: u32, value: u32) {
        trace!(
            "{} register write: offset={:#X}, value={:#X}",
            self.name, offset, value
        );
        match self.words.get_mut((offset / 4) as usize) {
            Some(word) => *word = value,
            None => warn!(
                "{} register write outside block: offset={:#X}",
                self.name, offset
            ),
        }
    }

    pub fn reset(&mut self) {
        self.words = vec![0u32; self.words.len()].into_boxed_slice();
    }
}
