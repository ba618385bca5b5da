//! Host-side driver for the device's serial protocol (spec §6):
//! handshake, key exchange, and encrypted register reads/writes.
//! Mirrors the shape of the reference protocol library's
//! `ClientHost`/`ClientRadio` pair, reduced to this protocol's single-
//! byte-opcode framing and one-byte repeating XOR keystream instead of
//! a length-prefixed CRC frame and AES challenge.

use std::io::{Read, Write};

use stim_protocol::{Checksum, Key};

pub struct DeviceClient<T> {
    port: T,
    key: Key,
}

impl<T: Read + Write> DeviceClient<T> {
    pub fn new(port: T) -> Self {
        Self { port, key: Key::NONE }
    }

    fn send(&mut self, frame: &[u8]) -> anyhow::Result<()> {
        let mut out = frame.to_vec();
        self.key.apply_all(&mut out);
        self.port.write_all(&out)?;
        self.port.flush()?;
        Ok(())
    }

    fn recv(&mut self, len: usize) -> anyhow::Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.port.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Send `0x00` and wait for the device's `0x07` ready reply.
    pub fn handshake(&mut self) -> anyhow::Result<()> {
        self.send(&[0x00])?;
        let reply = self.recv(1)?;
        anyhow::ensure!(reply == [0x07], "unexpected handshake reply {reply:02x?}");
        Ok(())
    }

    /// Exchange keys: send a host key, establish the session key from
    /// the device's reply. `host_key` is caller-chosen; a real host
    /// would draw it from its own RNG.
    pub fn key_exchange(&mut self, host_key: u8) -> anyhow::Result<()> {
        let mut frame = [0x2F, host_key, 0];
        let mut sum = Checksum::new();
        sum.update_all(&frame[..2]);
        frame[2] = sum.finalize();
        self.send(&frame)?;

        let reply = self.recv(3)?;
        anyhow::ensure!(reply[0] == 0x21, "expected key-exchange ack, got {:#04x}", reply[0]);
        anyhow::ensure!(
            Checksum::validate(&reply[..2], reply[2]),
            "key-exchange reply failed checksum"
        );
        let box_key = reply[1];
        self.key = Key::from_exchange(host_key, box_key);
        Ok(())
    }

    /// Read one byte at a virtual address.
    pub fn read(&mut self, addr: u16) -> anyhow::Result<u8> {
        let [hi, lo] = addr.to_be_bytes();
        let mut frame = [0x3C, hi, lo, 0];
        let mut sum = Checksum::new();
        sum.update_all(&frame[..3]);
        frame[3] = sum.finalize();
        self.send(&frame)?;

        let reply = self.recv(3)?;
        anyhow::ensure!(reply[0] == 0x22, "expected read ack, got {:#04x}", reply[0]);
        anyhow::ensure!(Checksum::validate(&reply[..2], reply[2]), "read reply failed checksum");
        Ok(reply[1])
    }

    /// Write up to [`stim_protocol::MAX_WRITE_LEN`] consecutive bytes
    /// starting at a virtual address.
    pub fn write(&mut self, addr: u16, data: &[u8]) -> anyhow::Result<()> {
        anyhow::ensure!(
            data.len() <= stim_protocol::MAX_WRITE_LEN,
            "write of {} bytes exceeds the protocol's {}-byte limit",
            data.len(),
            stim_protocol::MAX_WRITE_LEN
        );
        let opcode = (((data.len() as u8) + 3) << 4) | 0x0D;
        let [hi, lo] = addr.to_be_bytes();
        let mut frame = Vec::with_capacity(4 + data.len());
        frame.push(opcode);
        frame.push(hi);
        frame.push(lo);
        frame.extend_from_slice(data);
        let mut sum = Checksum::new();
        sum.update_all(&frame);
        frame.push(sum.finalize());
        self.send(&frame)?;

        let reply = self.recv(1)?;
        anyhow::ensure!(reply == [0x06], "unexpected write reply {reply:02x?}");
        Ok(())
    }

    /// Reset the device and clear the established key.
    pub fn reset(&mut self) -> anyhow::Result<()> {
        self.send(&[0x08])?;
        let reply = self.recv(1)?;
        anyhow::ensure!(reply == [0x06], "unexpected reset reply {reply:02x?}");
        self.key = Key::NONE;
        Ok(())
    }
}
