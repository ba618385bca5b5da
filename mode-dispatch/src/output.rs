//! Output copy & intensity scaling (spec §4.6).
//!
//! Pure derivation from one channel's live register state plus the
//! menu-driven ramp percentage and the raw Multi-Adjust knob ADC
//! reading into what the foreground submits to the pulse generator and
//! the DAC. Runs once per foreground pass, after [`crate::EngineContext::tick`].

use chan_block::ChannelBlock;

/// Compile-time DAC base/modulation-factor pairs per front-panel power
/// level. DAC is inverted (higher code = lower output), so a larger
/// base is a lower starting intensity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PowerLevel {
    Low,
    Normal,
    High,
}

impl PowerLevel {
    fn base_and_factor(self) -> (i32, i32) {
        match self {
            PowerLevel::Low => (650, 220),
            PowerLevel::Normal => (590, 330),
            PowerLevel::High => (500, 440),
        }
    }
}

/// What one foreground pass submits for one channel: a pulse-generator
/// gate/width/period triple and a DAC code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChannelOutput {
    pub gate_on: bool,
    pub period_us: u16,
    pub width_us: u16,
    pub dac_code: u16,
}

/// Sentinel period (effectively silent) for a frequency value below 2.
const SILENT_PERIOD_US: u16 = 65_000;

/// Derive one channel's pulse/DAC output from its live register state.
///
/// `ramp_percent` is the menu-driven ramp (0-100, multiplied into
/// intensity); `knob_adc` is the raw Multi-Adjust ADC reading
/// (0-1023); `global_enabled` is the output-globally-enabled flag (the
/// pause/mute box command clears it).
pub fn compute_output(
    block: &ChannelBlock,
    ramp_percent: u8,
    knob_adc: u16,
    power: PowerLevel,
    global_enabled: bool,
) -> ChannelOutput {
    let freq = block.group(chan_block::Group::Frequency).value();
    let width = block.group(chan_block::Group::Width).value();
    let intensity_raw = block.group(chan_block::Group::Intensity).value();
    let ramp_raw = block.group(chan_block::Group::Ramp).value();

    let gate_on = block.gate_value().on() && global_enabled && freq >= 2;

    let period_us = if freq < 2 {
        SILENT_PERIOD_US
    } else {
        256u16.saturating_mul(freq as u16)
    };

    let width_us = 70 + ((width as u32 * 180) / 256) as u16;

    let ramp_percent = ramp_percent.min(100) as u32;
    let intensity = (intensity_raw as u32 * ramp_raw as u32) / 256;
    let intensity = (intensity * ramp_percent) / 100;

    let (base, factor) = power.base_and_factor();
    let knob_adc = knob_adc.min(1023) as i32;
    let dac = base + ((factor * (1023 - knob_adc)) / 1024);
    let dac = dac.clamp(0, 1023);
    let dac = 1023 - (((1023 - dac) * intensity as i32) / 256);
    let dac_code = dac.clamp(0, 1023) as u16;

    ChannelOutput {
        gate_on,
        period_us,
        width_us,
        dac_code,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use chan_block::{ChannelBlock, Group};

    fn block_with(freq: u8, width: u8, intensity: u8, ramp: u8) -> ChannelBlock {
        let mut b = ChannelBlock::default();
        b.group_mut(Group::Frequency).set_value(freq);
        b.group_mut(Group::Width).set_value(width);
        b.group_mut(Group::Intensity).set_value(intensity);
        b.group_mut(Group::Ramp).set_value(ramp);
        b
    }

    #[test]
    fn silent_below_freq_2() {
        let b = block_with(1, 100, 255, 255);
        let out = compute_output(&b, 100, 0, PowerLevel::Normal, true);
        assert_eq!(out.period_us, SILENT_PERIOD_US);
        assert!(!out.gate_on);
    }

    #[test]
    fn period_and_width_formulas() {
        let b = block_with(10, 128, 255, 255);
        let out = compute_output(&b, 100, 0, PowerLevel::Normal, true);
        assert_eq!(out.period_us, 256 * 10);
        assert_eq!(out.width_us, 70 + (128 * 180 / 256));
    }

    #[test]
    fn zero_intensity_saturates_dac_to_off() {
        let b = block_with(50, 50, 0, 255);
        let out = compute_output(&b, 100, 0, PowerLevel::Normal, true);
        assert_eq!(out.dac_code, 1023);
    }

    #[test]
    fn global_disable_forces_gate_off() {
        let b = block_with(50, 50, 255, 255);
        let out = compute_output(&b, 100, 0, PowerLevel::Normal, false);
        assert!(!out.gate_on);
    }

    #[test]
    fn ramp_percent_zero_mutes_intensity() {
        let b = block_with(50, 50, 255, 255);
        let out = compute_output(&b, 0, 0, PowerLevel::Normal, true);
        assert_eq!(out.dac_code, 1023);
    }

    #[test]
    fn dac_stays_in_range() {
        for freq in [0u8, 2, 128, 255] {
            for intensity in [0u8, 128, 255] {
                let b = block_with(freq, 128, intensity, 255);
                let out = compute_output(&b, 100, 600, PowerLevel::High, true);
                assert!(out.dac_code <= 1023);
            }
        }
    }
}
