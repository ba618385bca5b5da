//! `SystemConfig` (spec §3) and its persistence (spec §4.7).
//!
//! The stored layout is: a magic byte, a 21-byte body, and a trailing
//! 8-bit XOR checksum over everything before it. Split channel A/B
//! mode selections live just above this checksummed block at a fixed
//! offset, per §4.7's "Split A/B selections live at a fixed offset
//! above the main block" — outside the main block's own integrity
//! check, so a corrupt split byte doesn't invalidate the rest of the
//! configuration.

use stim_protocol::Checksum;

use crate::store::PersistentStore;

const MAGIC: u8 = 0xA5;

const BODY_LEN: usize = 21;
const CHECKSUM_OFFSET: usize = 1 + BODY_LEN;
/// Total size of the magic+body+checksum block.
pub const CONFIG_BLOCK_LEN: usize = CHECKSUM_OFFSET + 1;

/// Physical offset, within the store's own address space (not the
/// serial protocol's virtual `0x8000`-based one — translating between
/// the two is the firmware binary's job), of the main config block.
pub const CONFIG_PHYS_OFFSET: u16 = 0;

/// Offset, relative to [`CONFIG_PHYS_OFFSET`], of the split A/B
/// selection bytes — just above the main checksummed block.
pub const SPLIT_OFFSET: u16 = CONFIG_PHYS_OFFSET + CONFIG_BLOCK_LEN as u16;

/// The three front-panel power levels (spec §4.6's DAC base/
/// modulation constants are keyed off this same enum in `mode-dispatch`;
/// duplicated here rather than adding a dependency edge this crate's
/// map doesn't call for).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PowerLevel {
    Low,
    Normal,
    High,
}

impl PowerLevel {
    pub fn from_byte(b: u8) -> Self {
        match b {
            2 => PowerLevel::High,
            1 => PowerLevel::Normal,
            _ => PowerLevel::Low,
        }
    }

    pub fn to_byte(self) -> u8 {
        match self {
            PowerLevel::Low => 0,
            PowerLevel::Normal => 1,
            PowerLevel::High => 2,
        }
    }
}

/// The eight named "advanced" modulation-source parameters (spec §3),
/// mapped two-per-group by `param-engine`'s `AdvancedSettings`
/// (duplicated here in persisted form for the same reason as
/// [`PowerLevel`]).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AdvancedSettings {
    pub ramp_level: u8,
    pub ramp_time: u8,
    pub depth: u8,
    pub tempo: u8,
    pub frequency: u8,
    pub effect: u8,
    pub width: u8,
    pub pace: u8,
}

impl AdvancedSettings {
    fn to_bytes(self) -> [u8; 8] {
        [
            self.ramp_level,
            self.ramp_time,
            self.depth,
            self.tempo,
            self.frequency,
            self.effect,
            self.width,
            self.pace,
        ]
    }

    fn from_bytes(b: &[u8]) -> Self {
        Self {
            ramp_level: b[0],
            ramp_time: b[1],
            depth: b[2],
            tempo: b[3],
            frequency: b[4],
            effect: b[5],
            width: b[6],
            pace: b[7],
        }
    }
}

/// The full persisted/live front-panel configuration (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SystemConfig {
    pub mode: u8,
    pub power_level: PowerLevel,
    pub split_mode_a: u8,
    pub split_mode_b: u8,
    pub base_intensity_a: u8,
    pub base_frequency_a: u8,
    pub base_width_a: u8,
    pub base_intensity_b: u8,
    pub base_frequency_b: u8,
    pub base_width_b: u8,
    pub knob: u8,
    pub audio_gain: u8,
    pub advanced: AdvancedSettings,
    pub favourite_mode: u8,
}

impl Default for SystemConfig {
    /// Factory defaults, substituted whenever the stored block fails
    /// its integrity check.
    fn default() -> Self {
        Self {
            mode: 0,
            power_level: PowerLevel::Normal,
            split_mode_a: 0,
            split_mode_b: 0,
            base_intensity_a: 0,
            base_frequency_a: 100,
            base_width_a: 100,
            base_intensity_b: 0,
            base_frequency_b: 100,
            base_width_b: 100,
            knob: 0,
            audio_gain: 128,
            advanced: AdvancedSettings::default(),
            favourite_mode: 0,
        }
    }
}

impl SystemConfig {
    /// Seed a channel block's intensity/frequency/width group values
    /// from this config's base settings for `channel`. Used on boot
    /// (and after a `Reload` deferred command) before the mode's
    /// module list runs its own sweeps on top.
    pub fn apply_base(&self, channel: chan_block::Channel, block: &mut chan_block::ChannelBlock) {
        let (intensity, frequency, width) = match channel {
            chan_block::Channel::A => {
                (self.base_intensity_a, self.base_frequency_a, self.base_width_a)
            }
            chan_block::Channel::B => {
                (self.base_intensity_b, self.base_frequency_b, self.base_width_b)
            }
        };
        block.group_mut(chan_block::Group::Intensity).set_value(intensity);
        block.group_mut(chan_block::Group::Frequency).set_value(frequency);
        block.group_mut(chan_block::Group::Width).set_value(width);
    }

    fn write_body(&self, body: &mut [u8]) {
        body[0] = self.mode;
        body[1] = self.power_level.to_byte();
        body[2] = self.split_mode_a;
        body[3] = self.split_mode_b;
        body[4] = self.base_intensity_a;
        body[5] = self.base_frequency_a;
        body[6] = self.base_width_a;
        body[7] = self.base_intensity_b;
        body[8] = self.base_frequency_b;
        body[9] = self.base_width_b;
        body[10] = self.knob;
        body[11] = self.audio_gain;
        body[12..20].copy_from_slice(&self.advanced.to_bytes());
        body[20] = self.favourite_mode;
    }

    fn from_body(body: &[u8]) -> Self {
        Self {
            mode: body[0],
            power_level: PowerLevel::from_byte(body[1]),
            split_mode_a: body[2],
            split_mode_b: body[3],
            base_intensity_a: body[4],
            base_frequency_a: body[5],
            base_width_a: body[6],
            base_intensity_b: body[7],
            base_frequency_b: body[8],
            base_width_b: body[9],
            knob: body[10],
            audio_gain: body[11],
            advanced: AdvancedSettings::from_bytes(&body[12..20]),
            favourite_mode: body[20],
        }
    }
}

/// Load the configuration from the store, verifying magic and
/// checksum. On any integrity failure, substitute factory defaults
/// without writing anything back (spec §4.7, §7).
pub fn load<S: PersistentStore>(store: &mut S) -> SystemConfig {
    let mut buf = [0u8; CONFIG_BLOCK_LEN];
    store.read(CONFIG_PHYS_OFFSET, &mut buf);

    if buf[0] != MAGIC {
        return SystemConfig::default();
    }
    if !Checksum::validate(&buf[..CHECKSUM_OFFSET], buf[CHECKSUM_OFFSET]) {
        return SystemConfig::default();
    }
    SystemConfig::from_body(&buf[1..CHECKSUM_OFFSET])
}

/// Save the configuration, always (re)writing the magic byte and
/// recomputing the checksum.
pub fn save<S: PersistentStore>(store: &mut S, config: &SystemConfig) {
    let mut buf = [0u8; CONFIG_BLOCK_LEN];
    buf[0] = MAGIC;
    config.write_body(&mut buf[1..CHECKSUM_OFFSET]);
    let mut sum = Checksum::new();
    sum.update_all(&buf[..CHECKSUM_OFFSET]);
    buf[CHECKSUM_OFFSET] = sum.finalize();
    store.write(CONFIG_PHYS_OFFSET, &buf);
}

/// Load the split channel A/B mode selections from their fixed offset
/// above the main block. Not integrity-checked (no magic/checksum of
/// its own): a torn read here only affects which sub-modes Split mode
/// starts from, not the rest of the configuration.
pub fn load_split<S: PersistentStore>(store: &mut S) -> (u8, u8) {
    let mut buf = [0u8; 2];
    store.read(SPLIT_OFFSET, &mut buf);
    (buf[0], buf[1])
}

pub fn save_split<S: PersistentStore>(store: &mut S, mode_a: u8, mode_b: u8) {
    store.write(SPLIT_OFFSET, &[mode_a, mode_b]);
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::store::MockStore;

    #[test]
    fn round_trip_preserves_config() {
        let mut store = MockStore::<512>::new();
        let cfg = SystemConfig {
            mode: 7,
            power_level: PowerLevel::High,
            split_mode_a: 1,
            split_mode_b: 2,
            base_intensity_a: 200,
            base_frequency_a: 80,
            base_width_a: 120,
            base_intensity_b: 180,
            base_frequency_b: 90,
            base_width_b: 130,
            knob: 42,
            audio_gain: 200,
            advanced: AdvancedSettings {
                ramp_level: 1,
                ramp_time: 2,
                depth: 3,
                tempo: 4,
                frequency: 5,
                effect: 6,
                width: 7,
                pace: 8,
            },
            favourite_mode: 9,
        };
        save(&mut store, &cfg);
        assert_eq!(load(&mut store), cfg);
    }

    #[test]
    fn corrupt_byte_falls_back_to_defaults() {
        let mut store = MockStore::<512>::new();
        save(&mut store, &SystemConfig { mode: 12, ..SystemConfig::default() });
        store.corrupt(5);
        assert_eq!(load(&mut store), SystemConfig::default());
    }

    #[test]
    fn apply_base_seeds_channel_block() {
        let cfg = SystemConfig {
            base_intensity_a: 77,
            base_frequency_a: 88,
            base_width_a: 99,
            ..SystemConfig::default()
        };
        let mut block = chan_block::ChannelBlock::default();
        cfg.apply_base(chan_block::Channel::A, &mut block);
        assert_eq!(block.group(chan_block::Group::Intensity).value(), 77);
        assert_eq!(block.group(chan_block::Group::Frequency).value(), 88);
        assert_eq!(block.group(chan_block::Group::Width).value(), 99);
    }

    #[test]
    fn blank_store_loads_defaults() {
        let mut store = MockStore::<512>::new();
        assert_eq!(load(&mut store), SystemConfig::default());
    }

    #[test]
    fn split_selection_round_trips_independently_of_main_block() {
        let mut store = MockStore::<512>::new();
        save(&mut store, &SystemConfig::default());
        save_split(&mut store, 3, 4);
        assert_eq!(load_split(&mut store), (3, 4));
        assert_eq!(load(&mut store), SystemConfig::default());
    }
}
