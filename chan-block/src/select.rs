use bitfield_struct::bitfield;

/// Timer-rate bits of a [`Select`] byte (bits 0-1).
///
/// See the timer cadence table: `Never` freezes the group to
/// source-resolution only, the others fire the group's sweep step at
/// progressively slower rates relative to the ~244 Hz engine tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RateSource {
    /// Never fires; the group is static (source-resolved only).
    Never = 0b00,
    /// Fires every tick, ~244 Hz.
    EveryTick = 0b01,
    /// Fires every 8th tick, ~30 Hz.
    Eighth = 0b10,
    /// Fires once per tick-counter wraparound, ~1 Hz.
    Wrap = 0b11,
}

impl RateSource {
    pub const fn from_bits(bits: u8) -> Self {
        match bits & 0x3 {
            0b00 => Self::Never,
            0b01 => Self::EveryTick,
            0b10 => Self::Eighth,
            _ => Self::Wrap,
        }
    }

    pub const fn into_bits(self) -> u8 {
        self as u8
    }
}

/// A 3-bit source index plus invert flag, as packed into the min-source
/// and rate-source fields of a [`Select`] byte.
///
/// `base` selects which value feeds the group; `invert` means the
/// resolved value is bitwise-complemented (`255 - value`) afterward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Source {
    pub base: SourceBase,
    pub invert: bool,
}

/// The base (uninverted) source for a resolved parameter value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SourceBase {
    /// The group's own field (`min` for the min-source, `rate` isn't
    /// itself source-selected but this slot reuses the same encoding).
    Own = 0,
    /// One of the eight named advanced settings, chosen per group.
    Advanced = 1,
    /// The Multi-Adjust knob, scaled through this block's knob-range.
    Knob = 2,
    /// The corresponding field of the other channel's block.
    Other = 3,
}

impl SourceBase {
    pub const fn from_bits(bits: u8) -> Self {
        match bits & 0x3 {
            0 => Self::Own,
            1 => Self::Advanced,
            2 => Self::Knob,
            _ => Self::Other,
        }
    }

    pub const fn into_bits(self) -> u8 {
        self as u8
    }
}

impl Source {
    pub const fn from_bits(bits: u8) -> Self {
        Self {
            base: SourceBase::from_bits(bits),
            invert: bits & 0x4 != 0,
        }
    }

    pub const fn into_bits(self) -> u8 {
        self.base.into_bits() | if self.invert { 0x4 } else { 0 }
    }

    /// Resolve a base value into the final value this source produces.
    pub fn apply(self, base_value: u8) -> u8 {
        if self.invert {
            255 - base_value
        } else {
            base_value
        }
    }
}

/// The select byte of a parameter group: timer rate (bits 0-1), min
/// source (bits 2-4), rate source (bits 5-7).
#[cfg_attr(not(feature = "defmt"), bitfield(u8))]
#[cfg_attr(feature = "defmt", bitfield(u8, defmt = true))]
#[derive(PartialEq, Eq)]
pub struct Select {
    #[bits(2)]
    pub timer_rate_bits: u8,
    #[bits(3)]
    pub min_source_bits: u8,
    #[bits(3)]
    pub rate_source_bits: u8,
}

impl Select {
    pub fn timer_rate(&self) -> RateSource {
        RateSource::from_bits(self.timer_rate_bits())
    }

    pub fn set_timer_rate(&mut self, rate: RateSource) {
        self.set_timer_rate_bits(rate.into_bits());
    }

    pub fn min_source(&self) -> Source {
        Source::from_bits(self.min_source_bits())
    }

    pub fn set_min_source(&mut self, source: Source) {
        self.set_min_source_bits(source.into_bits());
    }

    pub fn rate_source(&self) -> Source {
        Source::from_bits(self.rate_source_bits())
    }

    pub fn set_rate_source(&mut self, source: Source) {
        self.set_rate_source_bits(source.into_bits());
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn round_trip() {
        let mut s = Select::new();
        s.set_timer_rate(RateSource::Eighth);
        s.set_min_source(Source {
            base: SourceBase::Advanced,
            invert: true,
        });
        s.set_rate_source(Source {
            base: SourceBase::Other,
            invert: false,
        });

        assert_eq!(s.timer_rate(), RateSource::Eighth);
        assert_eq!(s.min_source().base, SourceBase::Advanced);
        assert!(s.min_source().invert);
        assert_eq!(s.rate_source().base, SourceBase::Other);
        assert!(!s.rate_source().invert);
    }

    #[test]
    fn invert_round_trip() {
        for raw in 0..=255u8 {
            let resolved = Source::from_bits(raw & 0x7);
            assert_eq!(resolved.apply(0x00), if resolved.invert { 0xff } else { 0x00 });
        }
    }
}
