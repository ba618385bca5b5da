#![cfg_attr(not(feature = "std"), no_std)]

//! Serial command protocol and virtual address map for the
//! stimulation box (spec §6).
//!
//! 19200 8N1, half-duplex, single-byte-opcode framing (no start/end
//! markers, unlike a length-prefixed/CRC-covered frame format): a
//! plaintext handshake, an XOR key exchange, then encrypted
//! register reads/writes against a 16-bit virtual address space. This
//! crate owns framing and the address-space layout; turning a decoded
//! [`HostCommand`] into an actual register read/write against live
//! device state is the firmware binary's job (it is the only place
//! that owns both the channel blocks and the persistent store).

#[cfg(feature = "alloc")]
extern crate alloc;

pub mod address;
mod checksum;
mod key;
mod parse;

pub use address::{BoxCommand, AddressRegion};
pub use checksum::Checksum;
pub use key::Key;
pub use parse::{parse_host_command, DeviceReply, FrameError, HostCommand, MAX_WRITE_LEN};

/// Baud rate the protocol runs at.
pub const BAUD_RATE: u32 = 19_200;

/// Every mode number on the wire is offset by this much from the
/// internal mode index (spec §6).
pub const MODE_WIRE_OFFSET: u8 = 0x76;

/// Convert an internal mode index to its wire representation.
pub fn mode_to_wire(index: u8) -> u8 {
    index.wrapping_add(MODE_WIRE_OFFSET)
}

/// Convert a wire mode byte back to an internal mode index.
pub fn mode_from_wire(wire: u8) -> u8 {
    wire.wrapping_sub(MODE_WIRE_OFFSET)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn mode_wire_offset_round_trips() {
        for i in 0..25u8 {
            assert_eq!(mode_from_wire(mode_to_wire(i)), i);
        }
    }
}
