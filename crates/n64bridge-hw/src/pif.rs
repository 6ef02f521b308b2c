//! Controller protocol spoken through PIF RAM.
//!
//! Each of the four controller ports owns an 8-byte slot at the start of PIF
//! RAM. The first byte of a slot is the command opcode and the reply is written
//! right after it.
//!
//! # References
//! - <https://n64brew.dev/wiki/Joybus_Protocol>
//! - <https://n64brew.dev/wiki/Standard_Controller>

/// Number of controller ports
pub const CHANNELS: usize = 4;

/// Bytes reserved per controller port in PIF RAM
pub const SLOT_SIZE: usize = 8;

/// Offset of the command opcode within a slot
pub const COMMAND_OFFSET: usize = 0;

/// Offset of the first reply byte within a slot
pub const REPLY_OFFSET: usize = 1;

/// Controller command opcodes
pub mod command {
    /// Capability query
    pub const INFO: u8 = 0x00;
    /// Read buttons and analog stick
    pub const READ_STATE: u8 = 0x01;
    /// Reset, then capability query
    pub const RESET: u8 = 0xFF;
}

/// Reply to a capability query: standard controller with expansion slot
pub const INFO_REPLY: [u8; 3] = [0x05, 0x00, 0x02];

/// Length of the reply to `READ_STATE`: button high, button low, X, Y
pub const STATE_REPLY_LEN: usize = 4;

/// Button bits of the 16-bit controller status word
///
/// Reference: <https://n64brew.dev/wiki/Joybus_Protocol#0x01_-_Controller_State>
pub mod buttons {
    pub const C_RIGHT: u16 = 0x0001;
    pub const C_LEFT: u16 = 0x0002;
    pub const C_DOWN: u16 = 0x0004;
    pub const C_UP: u16 = 0x0008;
    pub const R: u16 = 0x0010;
    pub const L: u16 = 0x0020;
    pub const D_RIGHT: u16 = 0x0100;
    pub const D_LEFT: u16 = 0x0200;
    pub const D_DOWN: u16 = 0x0400;
    pub const D_UP: u16 = 0x0800;
    pub const START: u16 = 0x1000;
    pub const Z: u16 = 0x2000;
    pub const B: u16 = 0x4000;
    pub const A: u16 = 0x8000;

    /// Every bit a real controller can report. Bits 6 and 7 are never set.
    pub const VALID_MASK: u16 = 0xFF3F;
}

/// Largest magnitude a real analog stick reports on either axis
pub const ANALOG_LIMIT: i8 = 127;
