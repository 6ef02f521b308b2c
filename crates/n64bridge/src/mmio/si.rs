//! Serial interface register handling.
//!
//! The SI moves 64-byte blocks between RDRAM and PIF RAM. Writing
//! `SI_PIF_AD_RD64B` or `SI_PIF_AD_WR64B` is the trigger; this type only
//! decodes the trigger and hands a [`Transfer`] back to the bus, which owns both
//! memories and runs the copy before the write returns.

use n64bridge_hw::memory_map::rdram;
use n64bridge_hw::mmio::si::{registers as hw_regs, status};
use tracing::{debug, trace, warn};

/// A PIF transfer requested by a register write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transfer {
    /// RDRAM -> PIF RAM, starting at the given RDRAM offset
    ToPif { dram_addr: u32 },
    /// PIF RAM -> RDRAM; controller commands are answered first
    FromPif { dram_addr: u32 },
}

#[derive(Debug, Default)]
pub struct SerialInterface {
    pub dram_addr: u32,
    pub pif_addr: u32,
    pub status: u32,
}

impl SerialInterface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle a write to an SI register
    pub fn write(&mut self, offset: u32, value: u32) -> Option<Transfer> {
        trace!("SI register write: offset={:#X}, value={:#X}", offset, value);

        match offset {
            hw_regs::DRAM_ADDR => {
                self.dram_addr = value & rdram::MASK & !0x3;
                debug!("SI DRAM address: {:#X}", self.dram_addr);
                None
            }
            hw_regs::PIF_AD_RD64B => {
                self.pif_addr = value;
                debug!("SI PIF -> RDRAM transfer to {:#X}", self.dram_addr);
                Some(Transfer::FromPif {
                    dram_addr: self.dram_addr,
                })
            }
            hw_regs::PIF_AD_WR64B => {
                self.pif_addr = value;
                debug!("SI RDRAM -> PIF transfer from {:#X}", self.dram_addr);
                Some(Transfer::ToPif {
                    dram_addr: self.dram_addr,
                })
            }
            hw_regs::STATUS => {
                // Any write acknowledges the interrupt
                self.status &= !status::INTERRUPT;
                trace!("SI interrupt acknowledged");
                None
            }
            _ => {
                warn!(
                    "Unknown SI register write: offset={:#X}, value={:#X}",
                    offset, value
                );
                None
            }
        }
    }

    /// Handle a read from an SI register
    pub fn read(&self, offset: u32) -> u32 {
        trace!("SI register read: offset={:#X}", offset);

        match offset {
            hw_regs::DRAM_ADDR => self.dram_addr,
            hw_regs::PIF_AD_RD64B | hw_regs::PIF_AD_WR64B => self.pif_addr,
            // Transfers finish inside the triggering write, so never busy
            hw_regs::STATUS => self.status,
            _ => {
                warn!("Unknown SI register read: offset={:#X}", offset);
                0
            }
        }
    }

    /// Mark a transfer as complete
    pub fn complete(&mut self) {
        self.status |= status::INTERRUPT;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
