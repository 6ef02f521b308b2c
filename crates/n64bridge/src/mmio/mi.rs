//! MIPS interface: RCP version and interrupt bookkeeping.

use n64bridge_hw::mmio::mi::{VERSION_VALUE, registers as hw_regs};
use tracing::{debug, trace, warn};

#[derive(Debug, Default)]
pub struct MipsInterface {
    pub mode: u32,
    pub interrupt: u32,
    pub mask: u32,
}

impl MipsInterface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise interrupt lines (bits from `n64bridge_hw::mmio::mi::interrupt`)
    pub fn raise(&mut self, lines: u32) {
        self.interrupt |= lines;
        trace!("MI interrupt raised: {:#X} -> {:#X}", lines, self.interrupt);
    }

    /// Lower interrupt lines
    pub fn lower(&mut self, lines: u32) {
        self.interrupt &= !lines;
    }

    /// True when an unmasked interrupt is pending
    pub fn pending(&self) -> bool {
        self.interrupt & self.mask != 0
    }

    pub fn read(&self, offset: u32) -> u32 {
        trace!("MI register read: offset={:#X}", offset);

        match offset {
            hw_regs::MODE => self.mode,
            hw_regs::VERSION => VERSION_VALUE,
            hw_regs::INTERRUPT => self.interrupt,
            hw_regs::MASK => self.mask,
            _ => {
                warn!("Unknown MI register read: offset={:#X}", offset);
                0
            }
        }
    }

    pub fn write(&mut self, offset: u32, value: u32) {
        trace!("MI register write: offset={:#X}, value={:#X}", offset, value);

        match offset {
            hw_regs::MODE => {
                self.mode = value;
                debug!("MI mode: {:#X}", self.mode);
            }
            hw_regs::MASK => {
                self.mask = value;
                debug!("MI interrupt mask: {:#X}", self.mask);
            }
            hw_regs::VERSION | hw_regs::INTERRUPT => {
                trace!("Write to read-only MI register {:#X} ignored", offset);
            }
            _ => {
                warn!(
                    "Unknown MI register write: offset={:#X}, value={:#X}",
                    offset, value
                );
            }
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
