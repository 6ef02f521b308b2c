//! Cartridge backing for the bus.
//!
//! The bus only knows about two windows into a cartridge: ROM (read only) and
//! save RAM. Anything more elaborate (EEPROM over the SI, FlashRAM command
//! sequences) belongs to whatever implements [`Cartridge`].

use tracing::{debug, trace};

/// Cartridge as seen from the bus. Offsets are relative to the window start.
pub trait Cartridge {
    /// Read a 32-bit big-endian word of ROM
    fn read_rom32(&self, offset: u32) -> u32;

    /// Read a 32-bit big-endian word of save RAM
    fn read_save32(&self, offset: u32) -> u32;

    /// Write a 32-bit big-endian word of save RAM
    fn write_save32(&mut self, offset: u32, value: u32);

    /// Current save RAM contents, if the cartridge has any
    fn save_ram(&self) -> Option<&[u8]>;

    /// Replace save RAM contents (from a save state)
    fn load_save_ram(&mut self, data: &[u8]);

    /// Called when the console is reset
    fn reset(&mut self) {}
}

/// An empty cartridge slot: every read is zero, every write is dropped
#[derive(Debug, Default)]
pub struct EmptySlot;

impl Cartridge for EmptySlot {
    fn read_rom32(&self, _offset: u32) -> u32 {
        0
    }

    fn read_save32(&self, _offset: u32) -> u32 {
        0
    }

    fn write_save32(&mut self, _offset: u32, _value: u32) {}

    fn save_ram(&self) -> Option<&[u8]> {
        None
    }

    fn load_save_ram(&mut self, _data: &[u8]) {}
}

/// A ROM image with optional battery-backed save RAM
#[derive(Debug)]
pub struct RomCartridge {
    rom: Box<[u8]>,
    save: Option<Box<[u8]>>,
}

impl RomCartridge {
    pub fn new(rom: Vec<u8>, save_size: Option<usize>) -> Self {
        debug!(
            "Cartridge: {} bytes ROM, save RAM {:?}",
            rom.len(),
            save_size
        );
        Self {
            rom: rom.into_boxed_slice(),
            save: save_size.map(|size| vec![0u8; size].into_boxed_slice()),
        }
    }

    pub fn rom(&self) -> &[u8] {
        &self.rom
    }
}

impl Cartridge for RomCartridge {
    fn read_rom32(&self, offset: u32) -> u32 {
        crate::memory::load_be32(&self.rom, offset)
    }

    fn read_save32(&self, offset: u32) -> u32 {
        self.save
            .as_deref()
            .map_or(0, |save| crate::memory::load_be32(save, offset))
    }

    fn write_save32(&mut self, offset: u32, value: u32) {
        match self.save.as_deref_mut() {
            Some(save) => crate::memory::store_be32(save, offset, value),
            None => trace!("Save RAM write without save RAM: offset={:#X}", offset),
        }
    }

    fn save_ram(&self) -> Option<&[u8]> {
        self.save.as_deref()
    }

    fn load_save_ram(&mut self, data: &[u8]) {
        if let Some(save) = self.save.as_deref_mut() {
            let len = save.len().min(data.len());
            save[..len].copy_from_slice(&data[..len]);
            save[len..].fill(0);
        }
    }
}
