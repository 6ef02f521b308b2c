//! The console's physical memory bus.
//!
//! This module owns RDRAM, PIF RAM/ROM and every device register block, and
//! decodes CPU addresses onto them. The CPU and coprocessor interpreters are
//! expected to drive an [`AddressSpace`] from a single thread; nothing here is
//! synchronized.
//!
//! All accesses funnel through [`AddressSpace::read32`] and
//! [`AddressSpace::write32`]. Narrower accesses select a lane of the containing
//! word (`(addr & 3) * 8` bits up for bytes, `(addr & 2) * 8` for halfwords)
//! and writes read-modify-write that word, so register side effects fire the
//! same way regardless of access width.
//!
//! Addresses without a mapping are open bus: reads return [`OPEN_BUS`] and
//! writes are dropped. Some titles touch unmapped space and depend on this.

use crate::cartridge::{Cartridge, EmptySlot};
use crate::controller::ControllerState;
use crate::mmio::{self, Device, DeviceState, Transfer};
use crate::savestate::MemoryState;
use n64bridge_hw::memory_map::{cart, pif, rdram, segment};
use n64bridge_hw::mmio::{mi, si as hw_si};
use n64bridge_hw::pif::CHANNELS;
use std::ops::Range;
use tracing::{debug, trace, warn};

// Memory constants from hardware definitions
pub const RDRAM_BASE: u32 = rdram::BASE;
pub const RDRAM_SIZE: usize = rdram::SIZE;
pub const CART_SAVE_BASE: u32 = cart::save::BASE;
pub const CART_SAVE_SIZE: usize = cart::save::SIZE;
pub const CART_ROM_BASE: u32 = cart::rom::BASE;
pub const CART_ROM_END: u32 = cart::rom::END;
pub const PIF_ROM_BASE: u32 = pif::ROM_BASE;
pub const PIF_ROM_SIZE: usize = pif::ROM_SIZE;
pub const PIF_RAM_BASE: u32 = pif::RAM_BASE;
pub const PIF_RAM_SIZE: usize = pif::RAM_SIZE;

/// Value returned for reads of unmapped addresses
pub const OPEN_BUS: u32 = 0;

/// Strip the segment bits from KSEG0/KSEG1 addresses.
///
/// Addresses outside the two direct-mapped segments pass through unchanged.
pub fn virtual_to_physical(addr: u32) -> u32 {
    if (segment::KSEG0_BASE..segment::KSEG1_END).contains(&addr) {
        addr & segment::PHYSICAL_MASK
    } else {
        addr
    }
}

/// Read a big-endian word from `buf`, or open bus if it runs past the end
pub(crate) fn load_be32(buf: &[u8], offset: u32) -> u32 {
    let start = offset as usize;
    match buf.get(start..start + 4) {
        Some(bytes) => u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
        None => OPEN_BUS,
    }
}

/// Store a big-endian word into `buf`; a no-op if it runs past the end
pub(crate) fn store_be32(buf: &mut [u8], offset: u32, value: u32) {
    let start = offset as usize;
    if let Some(bytes) = buf.get_mut(start..start + 4) {
        bytes.copy_from_slice(&value.to_be_bytes());
    }
}

/// Index into a word-stored buffer of the byte [`AddressSpace::read8`] sees
/// at `offset`. Byte lane 0 is the least significant byte of the word, which
/// a big-endian store keeps last.
pub(crate) fn byte_index(offset: usize) -> usize {
    offset ^ 0x3
}

/// What sits behind a mapped address range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backing {
    Rdram,
    CartSave,
    CartRom,
    Registers(Device),
    PifRom,
    PifRam,
}

/// A half-open physical range and its backing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mapping {
    pub range: Range<u32>,
    pub backing: Backing,
}

impl Mapping {
    fn new(base: u32, size: usize, backing: Backing) -> Self {
        Self {
            range: base..base + size as u32,
            backing,
        }
    }
}

/// Build the dispatch table, in priority order
fn build_mappings() -> Vec<Mapping> {
    let mut mappings = Vec::new();

    debug!(
        "  Mapping RDRAM at {:#X} ({}MB)",
        RDRAM_BASE,
        RDRAM_SIZE / (1024 * 1024)
    );
    mappings.push(Mapping::new(RDRAM_BASE, RDRAM_SIZE, Backing::Rdram));

    debug!(
        "  Mapping cartridge save RAM at {:#X} ({}KB)",
        CART_SAVE_BASE,
        CART_SAVE_SIZE / 1024
    );
    mappings.push(Mapping::new(CART_SAVE_BASE, CART_SAVE_SIZE, Backing::CartSave));

    debug!(
        "  Mapping cartridge ROM {:#X} - {:#X}",
        CART_ROM_BASE, CART_ROM_END
    );
    mappings.push(Mapping {
        range: CART_ROM_BASE..CART_ROM_END,
        backing: Backing::CartRom,
    });

    for device in Device::ALL {
        debug!(
            "  Mapping {:?} registers {:#X} - {:#X}",
            device,
            device.base(),
            device.base() + device.size() as u32
        );
        mappings.push(Mapping::new(
            device.base(),
            device.size(),
            Backing::Registers(device),
        ));
    }

    debug!("  Mapping PIF boot ROM at {:#X}", PIF_ROM_BASE);
    mappings.push(Mapping::new(PIF_ROM_BASE, PIF_ROM_SIZE, Backing::PifRom));

    debug!("  Mapping PIF RAM at {:#X}", PIF_RAM_BASE);
    mappings.push(Mapping::new(PIF_RAM_BASE, PIF_RAM_SIZE, Backing::PifRam));

    for (i, a) in mappings.iter().enumerate() {
        for b in &mappings[i + 1..] {
            assert!(
                a.range.end <= b.range.start || b.range.end <= a.range.start,
                "overlapping mappings {:?} and {:?}",
                a,
                b
            );
        }
    }

    mappings
}

/// The console's physical address space
pub struct AddressSpace {
    mappings: Vec<Mapping>,
    rdram: Box<[u8]>,
    pif_rom: Box<[u8]>,
    pif_ram: Box<[u8]>,
    devices: DeviceState,
    cartridge: Box<dyn Cartridge>,
    controllers: [ControllerState; CHANNELS],
}

impl Default for AddressSpace {
    fn default() -> Self {
        Self::new(Box::new(EmptySlot))
    }
}

impl AddressSpace {
    pub fn new(cartridge: Box<dyn Cartridge>) -> Self {
        debug!("=== Building address space ===");
        Self {
            mappings: build_mappings(),
            rdram: vec![0u8; RDRAM_SIZE].into_boxed_slice(),
            pif_rom: vec![0u8; PIF_ROM_SIZE].into_boxed_slice(),
            pif_ram: vec![0u8; PIF_RAM_SIZE].into_boxed_slice(),
            devices: DeviceState::new(),
            cartridge,
            controllers: [ControllerState::default(); CHANNELS],
        }
    }

    /// The dispatch table, in priority order
    pub fn mappings(&self) -> &[Mapping] {
        &self.mappings
    }

    /// Find the backing for a physical address and the offset into it
    pub fn resolve(&self, paddr: u32) -> Option<(Backing, u32)> {
        self.mappings
            .iter()
            .find(|mapping| mapping.range.contains(&paddr))
            .map(|mapping| (mapping.backing, paddr - mapping.range.start))
    }

    pub fn read32(&self, addr: u32) -> u32 {
        let paddr = virtual_to_physical(addr) & !0x3;
        let Some((backing, offset)) = self.resolve(paddr) else {
            trace!("Open bus read: addr={:#X}", addr);
            return OPEN_BUS;
        };

        match backing {
            Backing::Rdram => load_be32(&self.rdram, offset),
            Backing::CartSave => self.cartridge.read_save32(offset),
            Backing::CartRom => self.cartridge.read_rom32(offset),
            Backing::Registers(device) => self.read_register(device, offset),
            Backing::PifRom => load_be32(&self.pif_rom, offset),
            Backing::PifRam => load_be32(&self.pif_ram, offset),
        }
    }

    pub fn write32(&mut self, addr: u32, value: u32) {
        let paddr = virtual_to_physical(addr) & !0x3;
        let Some((backing, offset)) = self.resolve(paddr) else {
            trace!("Open bus write dropped: addr={:#X}, value={:#X}", addr, value);
            return;
        };

        match backing {
            Backing::Rdram => store_be32(&mut self.rdram, offset, value),
            Backing::CartSave => self.cartridge.write_save32(offset, value),
            Backing::CartRom => {
                trace!("Cartridge ROM write ignored: offset={:#X}", offset);
            }
            Backing::Registers(device) => self.write_register(device, offset, value),
            Backing::PifRom => {
                trace!("PIF ROM write ignored: offset={:#X}", offset);
            }
            Backing::PifRam => store_be32(&mut self.pif_ram, offset, value),
        }
    }

    pub fn read16(&self, addr: u32) -> u16 {
        let shift = (addr & 0x2) * 8;
        (self.read32(addr & !0x3) >> shift) as u16
    }

    pub fn read8(&self, addr: u32) -> u8 {
        let shift = (addr & 0x3) * 8;
        (self.read32(addr & !0x3) >> shift) as u8
    }

    pub fn write16(&mut self, addr: u32, value: u16) {
        let aligned = addr & !0x3;
        let shift = (addr & 0x2) * 8;
        let mask = 0xFFFFu32 << shift;
        let word = self.read32(aligned);
        self.write32(aligned, (word & !mask) | ((value as u32) << shift));
    }

    pub fn write8(&mut self, addr: u32, value: u8) {
        let aligned = addr & !0x3;
        let shift = (addr & 0x3) * 8;
        let mask = 0xFFu32 << shift;
        let word = self.read32(aligned);
        self.write32(aligned, (word & !mask) | ((value as u32) << shift));
    }

    /// IEEE 754 single reinterpreted from `read32`
    pub fn read_f32(&self, addr: u32) -> f32 {
        f32::from_bits(self.read32(addr))
    }

    /// Copy `count` bytes, each as `read8` returns it. Open bus reads as
    /// zeros.
    pub fn read_bytes(&self, addr: u32, count: usize) -> Vec<u8> {
        (0..count as u32)
            .map(|i| self.read8(addr.wrapping_add(i)))
            .collect()
    }

    fn read_register(&self, device: Device, offset: u32) -> u32 {
        match device {
            Device::Vi => self.devices.vi.read(offset),
            Device::Ai => self.devices.ai.read(offset),
            Device::Pi => self.devices.pi.read(offset),
            Device::Ri => self.devices.ri.read(offset),
            Device::Si => self.devices.si.read(offset),
            Device::Mi => self.devices.mi.read(offset),
        }
    }

    fn write_register(&mut self, device: Device, offset: u32, value: u32) {
        match device {
            Device::Vi => self.devices.vi.write(offset, value),
            Device::Ai => self.devices.ai.write(offset, value),
            Device::Pi => self.devices.pi.write(offset, value),
            Device::Ri => self.devices.ri.write(offset, value),
            Device::Mi => self.devices.mi.write(offset, value),
            Device::Si => {
                if offset == hw_si::registers::STATUS {
                    self.devices.mi.lower(mi::interrupt::SI);
                }
                if let Some(transfer) = self.devices.si.write(offset, value) {
                    self.run_transfer(transfer);
                }
            }
        }
    }

    /// Run a PIF transfer to completion
    fn run_transfer(&mut self, transfer: Transfer) {
        match transfer {
            Transfer::ToPif { dram_addr } => {
                for (i, byte) in self.pif_ram.iter_mut().enumerate() {
                    *byte = self
                        .rdram
                        .get(dram_addr as usize + i)
                        .copied()
                        .unwrap_or(0);
                }
                debug!("PIF RAM loaded from RDRAM {:#X}", dram_addr);
            }
            Transfer::FromPif { dram_addr } => {
                mmio::pif::process_commands(&mut self.pif_ram, &self.controllers);
                for (i, byte) in self.pif_ram.iter().enumerate() {
                    if let Some(dst) = self.rdram.get_mut(dram_addr as usize + i) {
                        *dst = *byte;
                    }
                }
                debug!("PIF RAM copied to RDRAM {:#X}", dram_addr);
            }
        }

        self.devices.si.complete();
        self.devices.mi.raise(mi::interrupt::SI);
    }

    /// Set the input reported for a controller port
    pub fn set_controller(&mut self, player: usize, state: ControllerState) {
        match self.controllers.get_mut(player) {
            Some(slot) => *slot = state,
            None => warn!("Ignoring input for nonexistent controller port {}", player),
        }
    }

    pub fn controller(&self, player: usize) -> Option<ControllerState> {
        self.controllers.get(player).copied()
    }

    /// Load a PIF boot ROM image; anything past the ROM size is dropped
    pub fn load_pif_rom(&mut self, data: &[u8]) {
        let len = data.len().min(self.pif_rom.len());
        self.pif_rom[..len].copy_from_slice(&data[..len]);
        debug!("Loaded {} bytes of PIF boot ROM", len);
    }

    pub fn ram(&self) -> &[u8] {
        &self.rdram
    }

    pub fn devices(&self) -> &DeviceState {
        &self.devices
    }

    pub fn cartridge(&self) -> &dyn Cartridge {
        self.cartridge.as_ref()
    }

    /// True when the MI has an unmasked interrupt pending
    pub fn interrupt_pending(&self) -> bool {
        self.devices.mi.pending()
    }

    /// Zero every backing at its original size. The dispatch table is kept.
    pub fn reset(&mut self) {
        debug!("Resetting address space");
        self.rdram = vec![0u8; self.rdram.len()].into_boxed_slice();
        self.pif_rom = vec![0u8; self.pif_rom.len()].into_boxed_slice();
        self.pif_ram = vec![0u8; self.pif_ram.len()].into_boxed_slice();
        self.devices.vi.reset();
        self.devices.ai.reset();
        self.devices.pi.reset();
        self.devices.ri.reset();
        self.devices.si.reset();
        self.devices.mi.reset();
        self.cartridge.reset();
    }

    /// Persistent memory for a save state. Registers are not included.
    pub fn get_state(&self) -> MemoryState {
        MemoryState {
            rdram: self.rdram.to_vec(),
            cartridge_ram: self.cartridge.save_ram().map(<[u8]>::to_vec),
        }
    }

    /// Restore memory from a save state. Sizes are fixed, so a shorter RDRAM
    /// image leaves the tail zeroed and a longer one is truncated.
    pub fn set_state(&mut self, state: &MemoryState) {
        let len = state.rdram.len().min(self.rdram.len());
        if len != self.rdram.len() {
            warn!(
                "Save state RDRAM is {} bytes, expected {}",
                state.rdram.len(),
                self.rdram.len()
            );
        }
        self.rdram[..len].copy_from_slice(&state.rdram[..len]);
        self.rdram[len..].fill(0);

        if let Some(save) = &state.cartridge_ram {
            self.cartridge.load_save_ram(save);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cartridge::RomCartridge;
    use crate::controller::Buttons;
    use n64bridge_hw::mmio::{mi as hw_mi, si as hw_si, vi as hw_vi};
    use n64bridge_hw::pif::{SLOT_SIZE, command};

    const SI_DRAM_ADDR: u32 = hw_si::BASE + hw_si::registers::DRAM_ADDR;
    const SI_RD64B: u32 = hw_si::BASE + hw_si::registers::PIF_AD_RD64B;
    const SI_WR64B: u32 = hw_si::BASE + hw_si::registers::PIF_AD_WR64B;

    #[test]
    fn segments_strip_to_physical() {
        assert_eq!(virtual_to_physical(0x8000_1234), 0x0000_1234);
        assert_eq!(virtual_to_physical(0xA460_0010), 0x0460_0010);
        assert_eq!(virtual_to_physical(0xBFC0_07C0), 0x1FC0_07C0);
        assert_eq!(virtual_to_physical(0xC000_1000), 0xC000_1000);
        assert_eq!(virtual_to_physical(0x0000_1000), 0x0000_1000);
    }

    #[test]
    fn write_then_read_word_in_mapped_regions() {
        let mut bus = AddressSpace::default();
        let cases = [
            (0x0000_0000, 0x0123_4567),
            (0x007F_FFFC, 0xFFFF_FFFF),
            (0x8000_0400, 0xDEAD_BEEF),
            (0xA000_0404, 0x8000_0000),
            (PIF_RAM_BASE + 0x3C, 0x0000_0001),
            (hw_vi::BASE + hw_vi::registers::ORIGIN, 0x0010_0000),
        ];
        for (addr, value) in cases {
            bus.write32(addr, value);
            assert_eq!(bus.read32(addr), value, "addr {addr:#X}");
        }
        // KSEG0 and KSEG1 alias the same RDRAM
        assert_eq!(bus.read32(0x8000_0404), 0x8000_0000);
        assert_eq!(bus.read32(0x0000_0400), 0xDEAD_BEEF);
    }

    #[test]
    fn narrow_reads_decompose_the_containing_word() {
        let mut bus = AddressSpace::default();
        bus.write32(0x100, 0x1122_3344);
        bus.write32(0x104, 0xA1B2_C3D4);
        for addr in 0x100..0x108u32 {
            let word = bus.read32(addr & !3);
            assert_eq!(bus.read8(addr) as u32, (word >> ((addr & 3) * 8)) & 0xFF);
            assert_eq!(bus.read16(addr) as u32, (word >> ((addr & 2) * 8)) & 0xFFFF);
        }
        assert_eq!(bus.read8(0x100), 0x44);
        assert_eq!(bus.read16(0x102), 0x1122);
    }

    #[test]
    fn narrow_writes_modify_only_their_lane() {
        let mut bus = AddressSpace::default();
        bus.write32(0x200, 0x1122_3344);
        bus.write8(0x201, 0xAA);
        assert_eq!(bus.read32(0x200), 0x1122_AA44);
        bus.write16(0x202, 0xBEEF);
        assert_eq!(bus.read32(0x200), 0xBEEF_AA44);
        assert_eq!(bus.read8(0x201), 0xAA);
        assert_eq!(bus.read16(0x202), 0xBEEF);
    }

    #[test]
    fn unaligned_word_access_uses_containing_word() {
        let mut bus = AddressSpace::default();
        bus.write32(0x302, 0xCAFE_F00D);
        assert_eq!(bus.read32(0x300), 0xCAFE_F00D);
        assert_eq!(bus.read32(0x303), 0xCAFE_F00D);
    }

    #[test]
    fn open_bus_reads_zero_and_drops_writes() {
        let mut bus = AddressSpace::default();
        let unmapped = [
            0x0080_0000,                     // past RDRAM
            0x0500_0000,                     // 64DD registers, not modelled
            hw_vi::BASE + hw_vi::SIZE as u32, // past the VI block
            0x1FC0_0800,                     // past PIF RAM
            0xC000_0000,                     // TLB mapped segment
            0xFFFF_FFFC,
        ];
        for addr in unmapped {
            assert_eq!(bus.read32(addr), OPEN_BUS);
            bus.write32(addr, 0x1234_5678);
            assert_eq!(bus.read32(addr), OPEN_BUS, "addr {addr:#X}");
            bus.write8(addr + 1, 0xFF);
            assert_eq!(bus.read8(addr + 1), 0);
        }
    }

    #[test]
    fn rom_is_read_only_and_save_ram_is_writable() {
        let cart = RomCartridge::new(vec![0x80, 0x37, 0x12, 0x40, 0, 0, 0, 0x0F], Some(0x8000));
        let mut bus = AddressSpace::new(Box::new(cart));
        assert_eq!(bus.read32(0xB000_0000), 0x8037_1240);
        bus.write32(0xB000_0000, 0);
        assert_eq!(bus.read32(0xB000_0000), 0x8037_1240);
        assert_eq!(bus.read32(0xB000_0004), 0x0F);

        bus.write32(0xA800_0010, 0x5555_AAAA);
        assert_eq!(bus.read32(0x0800_0010), 0x5555_AAAA);
    }

    #[test]
    fn mi_version_is_fixed() {
        let mut bus = AddressSpace::default();
        let version = hw_mi::BASE + hw_mi::registers::VERSION;
        assert_eq!(bus.read32(version), hw_mi::VERSION_VALUE);
        bus.write32(version, 0);
        assert_eq!(bus.read32(version), hw_mi::VERSION_VALUE);
    }

    #[test]
    fn read_bytes_agrees_with_read8() {
        let mut bus = AddressSpace::default();
        bus.write32(0x100, 0x1122_3344);
        bus.write32(0x104, 0xA1B2_C3D4);
        assert_eq!(bus.read_bytes(0x100, 4), vec![0x44, 0x33, 0x22, 0x11]);
        for addr in 0xFEu32..0x108 {
            assert_eq!(bus.read_bytes(addr, 1)[0], bus.read8(addr), "addr {addr:#X}");
        }
    }

    #[test]
    fn byte_stored_command_is_answered_in_byte_lanes() {
        let mut bus = AddressSpace::default();
        bus.set_controller(0, ControllerState::new(Buttons::A, 10, -10));
        bus.write8(PIF_RAM_BASE, command::READ_STATE);

        bus.write32(SI_DRAM_ADDR, 0x3000);
        bus.write32(SI_RD64B, PIF_RAM_BASE);
        bus.write32(SI_WR64B, PIF_RAM_BASE);

        let lanes: Vec<u8> = (0..5).map(|i| bus.read8(PIF_RAM_BASE + i)).collect();
        assert_eq!(lanes, vec![0x01, 0x80, 0x00, 0x0A, 0xF6]);
        assert_eq!(bus.read_bytes(0x3000, 5), lanes);
    }

    #[test]
    fn pif_state_query_round_trips_through_rdram() {
        let mut bus = AddressSpace::default();
        let state = ControllerState::new(Buttons::A | Buttons::START | Buttons::C_UP, 50, -60);
        bus.set_controller(2, state);

        let slot = 0xBFC0_07C0 + 2 * SLOT_SIZE as u32;
        bus.write8(slot, command::READ_STATE);

        // PIF -> RDRAM answers the command on the way out
        bus.write32(SI_DRAM_ADDR, 0x1000);
        bus.write32(SI_RD64B, PIF_RAM_BASE);
        let reply = state.to_bytes().to_vec();
        let rdram_slot = 0x1000 + 2 * SLOT_SIZE as u32;
        assert_eq!(bus.read8(rdram_slot), command::READ_STATE);
        assert_eq!(bus.read_bytes(rdram_slot + 1, 4), reply);

        // Wipe the buffer, then RDRAM -> PIF brings the reply back
        bus.write32(slot, 0);
        bus.write32(slot + 4, 0);
        bus.write32(SI_WR64B, PIF_RAM_BASE);
        assert_eq!(bus.read8(slot), command::READ_STATE);
        assert_eq!(bus.read_bytes(slot + 1, 4), reply);

        // A zeroed slot reads as an info query
        assert_eq!(
            bus.read_bytes(slot - SLOT_SIZE as u32, 8),
            vec![0x00, 0x05, 0x00, 0x02, 0, 0, 0, 0]
        );
    }

    #[test]
    fn pif_info_query_and_interrupt() {
        let mut bus = AddressSpace::default();
        bus.write32(hw_mi::BASE + hw_mi::registers::MASK, hw_mi::interrupt::SI);
        bus.write8(PIF_RAM_BASE, command::INFO);
        bus.write32(SI_DRAM_ADDR, 0x2000);
        bus.write32(SI_RD64B, PIF_RAM_BASE);

        assert_eq!(bus.read_bytes(0x2000, 4), vec![0x00, 0x05, 0x00, 0x02]);
        assert!(bus.interrupt_pending());

        bus.write32(hw_si::BASE + hw_si::registers::STATUS, 0);
        assert!(!bus.interrupt_pending());
    }

    #[test]
    fn reset_zeroes_backings_and_keeps_mappings() {
        let mut bus = AddressSpace::default();
        let mappings = bus.mappings().to_vec();
        bus.write32(0x10, 0xFFFF_FFFF);
        bus.write32(PIF_RAM_BASE, 0xFFFF_FFFF);
        bus.write32(hw_vi::BASE, 0x3);
        bus.reset();

        assert_eq!(bus.read32(0x10), 0);
        assert_eq!(bus.read32(PIF_RAM_BASE), 0);
        assert_eq!(bus.read32(hw_vi::BASE), 0);
        assert_eq!(bus.ram().len(), RDRAM_SIZE);
        assert_eq!(bus.mappings(), mappings.as_slice());

        bus.write32(0x10, 0x42);
        assert_eq!(bus.read32(0x10), 0x42);
    }

    #[test]
    fn state_covers_rdram_and_save_ram_only() {
        let cart = RomCartridge::new(vec![], Some(16));
        let mut bus = AddressSpace::new(Box::new(cart));
        bus.write32(0x40, 0x0BAD_CAFE);
        bus.write32(CART_SAVE_BASE + 4, 0x1234_5678);
        bus.write32(hw_vi::BASE, 0x3);
        let state = bus.get_state();

        let mut other = AddressSpace::new(Box::new(RomCartridge::new(vec![], Some(16))));
        other.set_state(&state);
        assert_eq!(other.read32(0x40), 0x0BAD_CAFE);
        assert_eq!(other.read32(CART_SAVE_BASE + 4), 0x1234_5678);
        assert_eq!(other.read32(hw_vi::BASE), 0);
    }

    #[test]
    fn mappings_do_not_overlap() {
        let bus = AddressSpace::default();
        let mut ranges: Vec<_> = bus.mappings().iter().map(|m| m.range.clone()).collect();
        ranges.sort_by_key(|r| r.start);
        for pair in ranges.windows(2) {
            assert!(pair[0].end <= pair[1].start);
        }
    }
}
