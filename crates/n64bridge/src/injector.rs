//! Puppeting a foreign emulator by overwriting its controller state.
//!
//! Player `n` lives at `base + n * 4` in the layout [`ControllerState`]
//! serializes to. A flush is three small writes (buttons, then X, then Y);
//! the target polls this memory, so briefly seeing a half-updated slot is
//! harmless.

use crate::controller::{Buttons, ControllerState};
use crate::foreign::{ForeignProcess, MemoryAccessError};
use n64bridge_hw::pif::{CHANNELS, STATE_REPLY_LEN};
use thiserror::Error;
use tracing::{debug, trace};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InjectError {
    #[error("no controller port {0}")]
    InvalidPlayer(usize),
    #[error(transparent)]
    Access(#[from] MemoryAccessError),
}

pub struct ControllerInjector {
    base: u64,
    shadow: [ControllerState; CHANNELS],
}

impl ControllerInjector {
    pub fn new(base: u64) -> Self {
        debug!("Injecting controller state at {:#x}", base);
        Self {
            base,
            shadow: [ControllerState::default(); CHANNELS],
        }
    }

    pub fn base(&self) -> u64 {
        self.base
    }

    fn slot(&mut self, player: usize) -> Result<&mut ControllerState, InjectError> {
        self.shadow
            .get_mut(player)
            .ok_or(InjectError::InvalidPlayer(player))
    }

    /// Shadow state for a player, as last set
    pub fn state(&self, player: usize) -> Option<ControllerState> {
        self.shadow.get(player).copied()
    }

    pub fn set_button(
        &mut self,
        process: &ForeignProcess,
        player: usize,
        button: Buttons,
        pressed: bool,
    ) -> Result<(), InjectError> {
        self.slot(player)?.set_button(button, pressed);
        self.flush(process, player)
    }

    /// Replace the whole button mask
    pub fn set_buttons(
        &mut self,
        process: &ForeignProcess,
        player: usize,
        buttons: Buttons,
    ) -> Result<(), InjectError> {
        self.slot(player)?.buttons = buttons;
        self.flush(process, player)
    }

    /// Move the stick. Values are clamped to [-127, 127].
    pub fn set_analog_stick(
        &mut self,
        process: &ForeignProcess,
        player: usize,
        x: i32,
        y: i32,
    ) -> Result<(), InjectError> {
        self.slot(player)?.set_stick(x, y);
        self.flush(process, player)
    }

    /// Zero every player's state and write it out
    pub fn release_all(&mut self, process: &ForeignProcess) -> Result<(), InjectError> {
        self.shadow = [ControllerState::default(); CHANNELS];
        for player in 0..CHANNELS {
            self.flush(process, player)?;
        }
        debug!("Released all controllers");
        Ok(())
    }

    /// Write one player's shadow state: button field first, then the axes
    pub fn flush(&self, process: &ForeignProcess, player: usize) -> Result<(), InjectError> {
        let state = self
            .shadow
            .get(player)
            .ok_or(InjectError::InvalidPlayer(player))?;
        let address = self.base + (player * STATE_REPLY_LEN) as u64;
        let bytes = state.to_bytes();
        trace!("Player {} <- {:02X?} at {:#x}", player, bytes, address);

        process.write_bytes(address, &bytes[0..2])?;
        process.write_bytes(address + 2, &bytes[2..3])?;
        process.write_bytes(address + 3, &bytes[3..4])?;
        Ok(())
    }
}
