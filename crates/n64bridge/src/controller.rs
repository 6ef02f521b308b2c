//! Controller input state shared by the bus emulator and the injector.
//!
//! The same 4-byte layout is used in both directions: the emulated PIF replies
//! with it to a `READ_STATE` command, and the injector writes it into the
//! foreign emulator's input structure.

use bitflags::bitflags;
use n64bridge_hw::pif::{ANALOG_LIMIT, buttons};

bitflags! {
    /// Buttons of a standard controller, using the hardware bit positions.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Buttons: u16 {
        const C_RIGHT = buttons::C_RIGHT;
        const C_LEFT = buttons::C_LEFT;
        const C_DOWN = buttons::C_DOWN;
        const C_UP = buttons::C_UP;
        const R = buttons::R;
        const L = buttons::L;
        const D_RIGHT = buttons::D_RIGHT;
        const D_LEFT = buttons::D_LEFT;
        const D_DOWN = buttons::D_DOWN;
        const D_UP = buttons::D_UP;
        const START = buttons::START;
        const Z = buttons::Z;
        const B = buttons::B;
        const A = buttons::A;
    }
}

/// Clamp an analog axis into the range a real stick can report
pub fn clamp_axis(value: i32) -> i8 {
    value.clamp(-(ANALOG_LIMIT as i32), ANALOG_LIMIT as i32) as i8
}

/// One player's input: button mask plus analog stick position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ControllerState {
    pub buttons: Buttons,
    x: i8,
    y: i8,
}

impl ControllerState {
    pub fn new(buttons: Buttons, x: i32, y: i32) -> Self {
        Self {
            buttons,
            x: clamp_axis(x),
            y: clamp_axis(y),
        }
    }

    pub fn x(&self) -> i8 {
        self.x
    }

    pub fn y(&self) -> i8 {
        self.y
    }

    /// Move the stick. Values outside [-127, 127] are clamped.
    pub fn set_stick(&mut self, x: i32, y: i32) {
        self.x = clamp_axis(x);
        self.y = clamp_axis(y);
    }

    pub fn set_button(&mut self, button: Buttons, pressed: bool) {
        self.buttons.set(button, pressed);
    }

    /// Serialize as `{buttonHigh, buttonLow, x, y}`
    pub fn to_bytes(&self) -> [u8; 4] {
        let [hi, lo] = self.buttons.bits().to_be_bytes();
        [hi, lo, self.x as u8, self.y as u8]
    }

    /// Parse the 4-byte layout, rejecting undefined button bits and
    /// out-of-range analog values.
    pub fn from_bytes(bytes: [u8; 4]) -> Option<Self> {
        let buttons = Buttons::from_bits(u16::from_be_bytes([bytes[0], bytes[1]]))?;
        let x = bytes[2] as i8;
        let y = bytes[3] as i8;
        if x.unsigned_abs() > ANALOG_LIMIT as u8 || y.unsigned_abs() > ANALOG_LIMIT as u8 {
            return None;
        }
        Some(Self { buttons, x, y })
    }
}
