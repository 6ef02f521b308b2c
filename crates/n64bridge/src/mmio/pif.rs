//! Controller command handling inside PIF RAM.
//!
//! Runs when PIF RAM is about to be copied back to RDRAM. Each port's slot is
//! inspected for a command opcode and the reply is written in place. Slot
//! offsets are console byte addresses, so they go through [`byte_index`] to
//! agree with 8-bit bus accesses.

use crate::controller::ControllerState;
use crate::memory::byte_index;
use n64bridge_hw::pif::{CHANNELS, COMMAND_OFFSET, INFO_REPLY, REPLY_OFFSET, SLOT_SIZE, command};
use tracing::trace;

/// Answer the command in every controller slot of `pif_ram`
pub fn process_commands(pif_ram: &mut [u8], controllers: &[ControllerState; CHANNELS]) {
    for (channel, controller) in controllers.iter().enumerate() {
        let start = channel * SLOT_SIZE;
        if start + SLOT_SIZE > pif_ram.len() {
            break;
        }

        let opcode = pif_ram[byte_index(start + COMMAND_OFFSET)];
        let state = controller.to_bytes();
        let reply: &[u8] = match opcode {
            command::INFO | command::RESET => {
                trace!("PIF channel {}: info query", channel);
                &INFO_REPLY
            }
            command::READ_STATE => {
                trace!("PIF channel {}: state {:?}", channel, controller);
                &state
            }
            _ => {
                trace!("PIF channel {}: ignoring opcode {:#04X}", channel, opcode);
                continue;
            }
        };

        for (i, byte) in reply.iter().enumerate() {
            if let Some(dst) = pif_ram.get_mut(byte_index(start + REPLY_OFFSET + i)) {
                *dst = *byte;
            }
        }
    }
}
