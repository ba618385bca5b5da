//! The protocol's checksum: an 8-bit running sum of every preceding
//! byte in the packet (spec §6). Unlike the reference protocol
//! library's 16-bit XModem CRC, this is deliberately a single running
//! accumulator with wraparound add — a `Checksum` newtype so frame
//! builders can't forget to feed a byte into it, the same discipline
//! the reference's `CrcDigest` trait enforces for its own checksum.

/// Running 8-bit sum accumulator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Checksum(u8);

impl Checksum {
    pub fn new() -> Self {
        Self(0)
    }

    pub fn update(&mut self, byte: u8) -> &mut Self {
        self.0 = self.0.wrapping_add(byte);
        self
    }

    pub fn update_all(&mut self, bytes: &[u8]) -> &mut Self {
        for &b in bytes {
            self.update(b);
        }
        self
    }

    pub fn finalize(self) -> u8 {
        self.0
    }

    /// Sum every byte in `bytes` and compare against `provided`.
    pub fn validate(bytes: &[u8], provided: u8) -> bool {
        let mut sum = Self::new();
        sum.update_all(bytes);
        sum.finalize() == provided
    }
}
