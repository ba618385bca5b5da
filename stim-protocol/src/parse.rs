//! Frame parsing (spec §6).
//!
//! Framing here is a single opcode byte followed by a fixed (or, for
//! writes, opcode-derived) number of fields and a trailing checksum —
//! no start/end markers, unlike the reference protocol library's
//! `0xabcd`/`0xdcba`-bracketed frames. [`parse_host_command`] decodes
//! one frame from the front of a decrypted byte slice, returning how
//! many bytes it consumed alongside the decoded [`HostCommand`].

use nom::bytes::complete::take;
use nom::number::complete::be_u16;
use nom::IResult;

use crate::checksum::Checksum;

/// Largest payload a single `Write` frame may carry.
pub const MAX_WRITE_LEN: usize = 16;

/// A fully decoded request from the host, after decryption.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HostCommand {
    /// `0x00`: handshake probe.
    Handshake,
    /// `0x2F host_key checksum`: begin key exchange.
    KeyExchange { host_key: u8 },
    /// `0x3C addr_hi addr_lo checksum`: read one byte.
    Read { addr: u16 },
    /// `0x(N+3)D addr_hi addr_lo data·N checksum`: write `N` bytes.
    Write {
        addr: u16,
        data: heapless::Vec<u8, MAX_WRITE_LEN>,
    },
    /// `0x08`: reset, also clears the established encryption key.
    Reset,
}

/// A reply the device sends back to the host. Device-to-host traffic
/// is always plaintext (spec §6).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DeviceReply {
    /// `0x07`: handshake acknowledged, or a frame was rejected
    /// (framing/checksum failure — spec §7 says reply `0x07` and drop
    /// the packet; the host is responsible for retrying).
    Ready,
    /// `0x21 box_key checksum`.
    KeyAck { box_key: u8 },
    /// `0x22 value checksum`.
    ReadAck { value: u8 },
    /// `0x06`: write/reset acknowledged.
    Ack,
}

impl DeviceReply {
    /// Serialize this reply to its wire bytes.
    pub fn to_bytes(self) -> heapless::Vec<u8, 3> {
        let mut out = heapless::Vec::new();
        match self {
            DeviceReply::Ready => {
                let _ = out.push(0x07);
            }
            DeviceReply::Ack => {
                let _ = out.push(0x06);
            }
            DeviceReply::KeyAck { box_key } => {
                let mut sum = Checksum::new();
                sum.update(0x21).update(box_key);
                let _ = out.push(0x21);
                let _ = out.push(box_key);
                let _ = out.push(sum.finalize());
            }
            DeviceReply::ReadAck { value } => {
                let mut sum = Checksum::new();
                sum.update(0x22).update(value);
                let _ = out.push(0x22);
                let _ = out.push(value);
                let _ = out.push(sum.finalize());
            }
        }
        out
    }
}

/// Why a candidate frame at the front of the buffer could not be
/// turned into a [`HostCommand`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameError {
    /// Not enough bytes have arrived yet; try again once more arrive.
    Incomplete,
    /// The trailing checksum byte didn't match. Spec §7: reply `0x07`,
    /// drop the packet, retain state; no retry on the device's part.
    ChecksumMismatch,
    /// The opcode byte isn't one this protocol defines.
    UnknownOpcode,
}

fn checked_body(input: &[u8], body_len: usize) -> Result<&[u8], FrameError> {
    let total = body_len + 1;
    if input.len() < total {
        return Err(FrameError::Incomplete);
    }
    let body = &input[..body_len];
    let checksum = input[body_len];
    if Checksum::validate(body, checksum) {
        Ok(body)
    } else {
        Err(FrameError::ChecksumMismatch)
    }
}

fn parse_addr(body: &[u8]) -> IResult<&[u8], u16> {
    be_u16(body)
}

/// Decode one frame from the front of `input` (already decrypted).
/// Returns the number of bytes consumed and the decoded command.
pub fn parse_host_command(input: &[u8]) -> Result<(usize, HostCommand), FrameError> {
    let opcode = *input.first().ok_or(FrameError::Incomplete)?;
    match opcode {
        0x00 => Ok((1, HostCommand::Handshake)),
        0x08 => Ok((1, HostCommand::Reset)),
        0x2F => {
            let body = checked_body(input, 2)?;
            Ok((3, HostCommand::KeyExchange { host_key: body[1] }))
        }
        0x3C => {
            let body = checked_body(input, 3)?;
            let (_, addr) = parse_addr(&body[1..]).map_err(|_| FrameError::Incomplete)?;
            Ok((4, HostCommand::Read { addr }))
        }
        op if op & 0x0F == 0x0D => {
            let n = (op >> 4) as i32 - 3;
            if n < 0 || n as usize > MAX_WRITE_LEN {
                return Err(FrameError::UnknownOpcode);
            }
            let n = n as usize;
            let body_len = 3 + n;
            let body = checked_body(input, body_len)?;
            let (rest, addr) = parse_addr(&body[1..]).map_err(|_| FrameError::Incomplete)?;
            let (_, payload) =
                take::<_, _, nom::error::Error<&[u8]>>(n)(rest).map_err(|_| FrameError::Incomplete)?;
            let mut data = heapless::Vec::new();
            let _ = data.extend_from_slice(payload);
            Ok((body_len + 1, HostCommand::Write { addr, data }))
        }
        _ => Err(FrameError::UnknownOpcode),
    }
}
