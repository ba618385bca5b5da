//! Low-rent anyhow, bounded. Unlike the reference firmware's
//! `alloc::string::String`-backed `Error`, this one never allocates —
//! the engine crates carry a hard no-dynamic-allocation-after-boot
//! requirement, and the binary that wires them together honors it too.
//!
//! This is strictly for the conditions spec §7 calls real `Result`
//! failures: a collaborator trait erroring (DAC SPI transaction, ADC
//! conversion, persistent-store driver fault at the byte-transport
//! level). Every condition spec §7 lists as "recovered locally, never
//! surfaced" still has no fallible return anywhere in the engine.

use core::fmt::Write as _;

const CAPACITY: usize = 64;

#[derive(Clone, PartialEq, Eq)]
pub struct Error(heapless::String<CAPACITY>);

pub type Result<T> = core::result::Result<T, Error>;

impl Error {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Wrap any `Debug` value (a collaborator's associated `Error`
    /// type) as an [`Error`]. Not a blanket `From<E>` impl: that would
    /// collide with the standard library's reflexive `From<T> for T`
    /// once `E` is instantiated as `Error` itself, which `Debug`
    /// doesn't rule out. Call sites use `.map_err(Error::wrap)?`
    /// instead of a bare `?`.
    pub fn wrap<E: core::fmt::Debug>(value: E) -> Self {
        let mut s = heapless::String::new();
        // truncated rather than rejected: a formatting overflow here
        // must not itself become a panic path.
        let _ = write!(s, "{value:?}");
        Error(s)
    }
}

impl core::fmt::Debug for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Error {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "{}", self.as_str())
    }
}

impl core::ops::Deref for Error {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        self.as_str()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[derive(Debug)]
    struct Oops(u8);

    #[test]
    fn wraps_any_debug_value() {
        let err = Error::wrap(Oops(7));
        assert_eq!(err.as_str(), "Oops(7)");
    }

    #[test]
    fn long_messages_are_truncated_not_panicking() {
        #[derive(Debug)]
        struct Long;
        impl core::fmt::Debug for Long {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                for _ in 0..20 {
                    write!(f, "overflow")?;
                }
                Ok(())
            }
        }
        let err = Error::wrap(Long);
        assert!(err.as_str().len() <= CAPACITY);
    }
}
