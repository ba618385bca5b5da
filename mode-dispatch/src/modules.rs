//! Built-in module bytecode.
//!
//! A module is authored against channel A's base addressing (`SET`
//! with `c=0`); [`chan_block::ChannelBlock::default`]'s
//! `apply_channel_mask = 0x03` mirrors every write into channel B too,
//! which is how a single module program configures both channels at
//! once. Only split mode (which manipulates the mask itself) needs
//! per-channel module runs.
//!
//! Field order within a group (`value, min, max, rate, step,
//! action_min, action_max, select, timer`) is the contractual order
//! from the channel block layout.

use chan_block::Group;

const F_VALUE: u8 = 0;
const F_MIN: u8 = 1;
const F_MAX: u8 = 2;
const F_RATE: u8 = 3;
const F_STEP: u8 = 4;
const F_ACTION_MIN: u8 = 5;
const F_ACTION_MAX: u8 = 6;
const F_SELECT: u8 = 7;
const F_TIMER: u8 = 8;

const ACTION_REVERSE: u8 = 0xFF;

const fn group_field(group: Group, field: u8) -> u8 {
    group.offset() as u8 + field
}

/// Writes all nine bytes of one group in field order, `END`-terminated.
macro_rules! group_module {
    ($group:expr, value=$value:expr, min=$min:expr, max=$max:expr, rate=$rate:expr,
     step=$step:expr, action_min=$amin:expr, action_max=$amax:expr, select=$select:expr) => {{
        const G: Group = $group;
        [
            0x80 | group_field(G, F_VALUE), $value,
            0x80 | group_field(G, F_MIN), $min,
            0x80 | group_field(G, F_MAX), $max,
            0x80 | group_field(G, F_RATE), $rate,
            0x80 | group_field(G, F_STEP), $step,
            0x80 | group_field(G, F_ACTION_MIN), $amin,
            0x80 | group_field(G, F_ACTION_MAX), $amax,
            0x80 | group_field(G, F_SELECT), $select,
            0x80 | group_field(G, F_TIMER), 0,
            0x00,
        ]
    }};
}

/// `select` byte with timer_rate = EveryTick (`0b01`), min_source =
/// Own (`0b000`), rate_source = Knob, no invert (`0b010`): `0b010_000_01`.
const SELECT_EVERY_TICK_RATE_KNOB: u8 = 0b010_000_01;
/// timer_rate = EveryTick, min_source = Own, rate_source = Own.
const SELECT_EVERY_TICK_RATE_OWN: u8 = 0b000_000_01;
/// timer_rate = Never (static group, source-resolved only).
const SELECT_STATIC_OWN: u8 = 0b000_000_00;

/// Module 11: Waves' frequency sweep. See the Waves mode-entry scenario.
const MODULE_11_WAVES_FREQUENCY: [u8; 19] = group_module!(
    Group::Frequency,
    value = 139, min = 139, max = 255, rate = 1, step = 1,
    action_min = ACTION_REVERSE, action_max = ACTION_REVERSE,
    select = SELECT_EVERY_TICK_RATE_KNOB
);

/// Module 12: Waves' width sweep.
const MODULE_12_WAVES_WIDTH: [u8; 19] = group_module!(
    Group::Width,
    value = 0, min = 0, max = 179, rate = 1, step = 3,
    action_min = ACTION_REVERSE, action_max = ACTION_REVERSE,
    select = SELECT_EVERY_TICK_RATE_KNOB
);

/// Module 3: Stroke's intensity sweep, min-sourced from the "depth"
/// advanced setting (inverted), per the Stroke depth scenario.
const MODULE_3_STROKE_INTENSITY: [u8; 19] = group_module!(
    Group::Intensity,
    value = 255, min = 5, max = 255, rate = 1, step = 2,
    action_min = ACTION_REVERSE, action_max = ACTION_REVERSE,
    // min_source = Advanced (depth), inverted; rate_source = Own.
    select = 0b000_101_01
);

/// Module 4: Stroke's frequency sweep (a fixed, static tempo).
const MODULE_4_STROKE_FREQUENCY: [u8; 19] = group_module!(
    Group::Frequency,
    value = 200, min = 200, max = 200, rate = 1, step = 0,
    action_min = ACTION_REVERSE, action_max = ACTION_REVERSE,
    select = SELECT_STATIC_OWN
);

/// Module 5: Climb's first intensity stage — step 1, chains to module 6
/// at the bottom of the sweep.
const MODULE_5_CLIMB_STAGE1: [u8; 19] = group_module!(
    Group::Intensity,
    value = 255, min = 8, max = 255, rate = 1, step = 1,
    action_min = 6, action_max = ACTION_REVERSE,
    select = SELECT_EVERY_TICK_RATE_OWN
);

/// Module 6: Climb's second stage — step 2, chains to module 7.
const MODULE_6_CLIMB_STAGE2: [u8; 19] = group_module!(
    Group::Intensity,
    value = 8, min = 8, max = 255, rate = 1, step = 2,
    action_min = 7, action_max = ACTION_REVERSE,
    select = SELECT_EVERY_TICK_RATE_OWN
);

/// Module 7: Climb's third stage — step 4, chains back to module 5.
const MODULE_7_CLIMB_STAGE3: [u8; 19] = group_module!(
    Group::Intensity,
    value = 8, min = 8, max = 255, rate = 1, step = 4,
    action_min = 5, action_max = ACTION_REVERSE,
    select = SELECT_EVERY_TICK_RATE_OWN
);

/// Module 8: Climb's companion ramp sweep (slow, unrelated to the
/// intensity chain driven by modules 5-7).
const MODULE_8_CLIMB_RAMP: [u8; 19] = group_module!(
    Group::Ramp,
    value = 0, min = 0, max = 255, rate = 8, step = 1,
    action_min = ACTION_REVERSE, action_max = ACTION_REVERSE,
    select = 0b000_000_10
);

/// Module 13/33: Combo's two co-running sweeps (intensity, frequency).
const MODULE_13_COMBO_INTENSITY: [u8; 19] = group_module!(
    Group::Intensity,
    value = 0, min = 0, max = 255, rate = 1, step = 5,
    action_min = ACTION_REVERSE, action_max = ACTION_REVERSE,
    select = SELECT_EVERY_TICK_RATE_OWN
);
const MODULE_33_COMBO_FREQUENCY: [u8; 19] = group_module!(
    Group::Frequency,
    value = 60, min = 60, max = 220, rate = 2, step = 7,
    action_min = ACTION_REVERSE, action_max = ACTION_REVERSE,
    select = SELECT_EVERY_TICK_RATE_OWN
);

/// Module 14/2: Intense's two sweeps.
const MODULE_14_INTENSE_INTENSITY: [u8; 19] = group_module!(
    Group::Intensity,
    value = 200, min = 100, max = 255, rate = 1, step = 3,
    action_min = ACTION_REVERSE, action_max = ACTION_REVERSE,
    select = SELECT_EVERY_TICK_RATE_OWN
);
const MODULE_2_INTENSE_WIDTH: [u8; 19] = group_module!(
    Group::Width,
    value = 40, min = 20, max = 150, rate = 1, step = 2,
    action_min = ACTION_REVERSE, action_max = ACTION_REVERSE,
    select = SELECT_EVERY_TICK_RATE_OWN
);

/// Module 15: Rhythm's single frequency/width-coupled sweep (approximated
/// here as a frequency sweep; width tracks the other channel).
const MODULE_15_RHYTHM: [u8; 19] = group_module!(
    Group::Frequency,
    value = 40, min = 40, max = 120, rate = 2, step = 4,
    action_min = ACTION_REVERSE, action_max = ACTION_REVERSE,
    select = SELECT_EVERY_TICK_RATE_OWN
);

/// Module 23: shared by Audio1 and Audio2 — intensity tracks the
/// audio-envelope advanced setting ("effect"), substituted at the
/// output-copy stage per the audio-follower contract.
const MODULE_23_AUDIO_INTENSITY: [u8; 19] = group_module!(
    Group::Intensity,
    value = 0, min = 0, max = 255, rate = 1, step = 1,
    action_min = ACTION_REVERSE, action_max = ACTION_REVERSE,
    select = SELECT_STATIC_OWN
);

/// Module 34: Audio3's sweep.
const MODULE_34_AUDIO3: [u8; 19] = group_module!(
    Group::Intensity,
    value = 0, min = 0, max = 255, rate = 1, step = 1,
    action_min = ACTION_REVERSE, action_max = ACTION_REVERSE,
    select = SELECT_STATIC_OWN
);

/// Module 32: Random2's sweep (the per-mode configuration; the
/// randomization itself happens via `MEMOP` random draws against
/// `random_min`/`random_max`, reconfigured on random-rotation).
const MODULE_32_RANDOM2: [u8; 19] = group_module!(
    Group::Intensity,
    value = 128, min = 0, max = 255, rate = 1, step = 6,
    action_min = ACTION_REVERSE, action_max = ACTION_REVERSE,
    select = SELECT_EVERY_TICK_RATE_OWN
);

// Block offsets outside the four parameter groups (`chan-block/src/block.rs`'s
// control and next-module-timer layout) that Toggle drives directly.
const OFFSET_KNOB_RANGE_LOW: u8 = 0x04;
const OFFSET_KNOB_RANGE_HIGH: u8 = 0x05;
const OFFSET_NEXT_MODULE_SELECT: u8 = 0x14;
const OFFSET_NEXT_MODULE_NUMBER: u8 = 0x15;
// Source::Knob (base=2), no invert: `chan_block::select::Source::into_bits`.
const SOURCE_KNOB: u8 = 0b010;
// Address of `gate_value` (control-group offset 0x0D) within each channel's
// 9-bit register address, split into the MathOp encoding's addr_hi/addr_low.
const GATE_VALUE_ADDR_HI_A: u8 = (chan_block::BASE_A >> 8) as u8 & 0x3;
const GATE_VALUE_ADDR_HI_B: u8 = (chan_block::BASE_B >> 8) as u8 & 0x3;
const GATE_VALUE_ADDR_LOW: u8 = (chan_block::BASE_A & 0xFF) as u8 + 0x0D;

/// Module 18: Toggle. Holds intensity steady and arms the next-module
/// timer (spec's Toggle-via-knob scenario) off the knob: `knob_range`
/// 240-60 makes the resolved period run ~240 ticks at knob=0 down to
/// ~60 ticks at knob=255. Channel A's next-module-number is mirrored to
/// B by the default write mask, then overridden with a `c=1` write so
/// each channel points at its own toggle module (9/10) instead of both
/// mailboxes firing the same module in the same tick.
const MODULE_18_TOGGLE: [u8; 31] = [
    0x80 | group_field(Group::Intensity, F_VALUE), 200,
    0x80 | group_field(Group::Intensity, F_MIN), 200,
    0x80 | group_field(Group::Intensity, F_MAX), 200,
    0x80 | group_field(Group::Intensity, F_RATE), 1,
    0x80 | group_field(Group::Intensity, F_STEP), 0,
    0x80 | group_field(Group::Intensity, F_ACTION_MIN), ACTION_REVERSE,
    0x80 | group_field(Group::Intensity, F_ACTION_MAX), ACTION_REVERSE,
    0x80 | group_field(Group::Intensity, F_SELECT), SELECT_STATIC_OWN,
    0x80 | group_field(Group::Intensity, F_TIMER), 0,
    0x80 | OFFSET_KNOB_RANGE_LOW, 240,
    0x80 | OFFSET_KNOB_RANGE_HIGH, 60,
    0x80 | OFFSET_NEXT_MODULE_SELECT, SOURCE_KNOB,
    0x80 | OFFSET_NEXT_MODULE_NUMBER, 9,
    0x80 | 0x40 | OFFSET_NEXT_MODULE_NUMBER, 10,
    0x00,
];

/// Module 9: flips channel A's `gate_value.on` bit. Dedicated to
/// Toggle's per-channel next-module timer so A's mailbox firing never
/// also flips B's gate in the same tick.
const MODULE_9_TOGGLE_GATE_A: [u8; 4] = [
    0x50 | (0x3 << 2) | GATE_VALUE_ADDR_HI_A,
    GATE_VALUE_ADDR_LOW,
    0x01,
    0x00,
];

/// Module 10: flips channel B's `gate_value.on` bit. See module 9.
const MODULE_10_TOGGLE_GATE_B: [u8; 4] = [
    0x50 | (0x3 << 2) | GATE_VALUE_ADDR_HI_B,
    GATE_VALUE_ADDR_LOW,
    0x01,
    0x00,
];

/// Module 24: Orgasm's first stage; chains via its own boundary action
/// rather than a fixed module list (wall-clock progression is not
/// reproduced, per the Orgasm/Torment open question).
const MODULE_24_ORGASM: [u8; 19] = group_module!(
    Group::Intensity,
    value = 0, min = 0, max = 255, rate = 3, step = 2,
    action_min = ACTION_REVERSE, action_max = 24,
    select = SELECT_EVERY_TICK_RATE_OWN
);

/// Module 28: Torment's stage, same chaining shape as Orgasm.
const MODULE_28_TORMENT: [u8; 19] = group_module!(
    Group::Intensity,
    value = 0, min = 0, max = 255, rate = 2, step = 3,
    action_min = ACTION_REVERSE, action_max = 28,
    select = SELECT_EVERY_TICK_RATE_OWN
);

/// Module 20/21: Phase1/Phase2's width sweeps, offset by half a period
/// against each other (channel B leads channel A) by starting at
/// opposite ends of the sweep with opposite initial directions.
const MODULE_20_PHASE_LEAD: [u8; 19] = group_module!(
    Group::Width,
    value = 0, min = 0, max = 255, rate = 1, step = 4,
    action_min = ACTION_REVERSE, action_max = ACTION_REVERSE,
    select = SELECT_EVERY_TICK_RATE_OWN
);
const MODULE_21_PHASE_LAG: [u8; 19] = group_module!(
    Group::Width,
    value = 255, min = 0, max = 255, rate = 1, step = 4,
    action_min = ACTION_REVERSE, action_max = ACTION_REVERSE,
    select = SELECT_EVERY_TICK_RATE_OWN
);

/// Module 35: Phase2's extra frequency sweep.
const MODULE_35_PHASE2_FREQUENCY: [u8; 19] = group_module!(
    Group::Frequency,
    value = 80, min = 80, max = 160, rate = 2, step = 3,
    action_min = ACTION_REVERSE, action_max = ACTION_REVERSE,
    select = SELECT_EVERY_TICK_RATE_OWN
);

/// Module 22: Phase3's sweep.
const MODULE_22_PHASE3: [u8; 19] = group_module!(
    Group::Width,
    value = 0, min = 0, max = 255, rate = 1, step = 2,
    action_min = ACTION_REVERSE, action_max = ACTION_REVERSE,
    select = SELECT_EVERY_TICK_RATE_KNOB
);

/// Module 1: the shared pre-init module split mode runs before each
/// half's own mode. The default image already establishes sensible
/// bounds, so this is a deliberate no-op hook, kept so the bytecode
/// interpreter is always exercised on the same path the real split
/// protocol takes.
const MODULE_1_PRE_INIT: [u8; 1] = [0x00];

/// Number of distinct built-in module slots (module numbers `0..36` are
/// legal per `Action::Module`/the next-module timer; numbers with no
/// entry below are a single `END` byte, a harmless no-op).
const MODULE_TABLE_LEN: usize = 36;

const EMPTY_MODULE: [u8; 1] = [0x00];

const fn module_table() -> [&'static [u8]; MODULE_TABLE_LEN] {
    let mut table: [&'static [u8]; MODULE_TABLE_LEN] = [&EMPTY_MODULE; MODULE_TABLE_LEN];
    table[1] = &MODULE_1_PRE_INIT;
    table[2] = &MODULE_2_INTENSE_WIDTH;
    table[3] = &MODULE_3_STROKE_INTENSITY;
    table[4] = &MODULE_4_STROKE_FREQUENCY;
    table[5] = &MODULE_5_CLIMB_STAGE1;
    table[6] = &MODULE_6_CLIMB_STAGE2;
    table[7] = &MODULE_7_CLIMB_STAGE3;
    table[8] = &MODULE_8_CLIMB_RAMP;
    table[11] = &MODULE_11_WAVES_FREQUENCY;
    table[12] = &MODULE_12_WAVES_WIDTH;
    table[13] = &MODULE_13_COMBO_INTENSITY;
    table[14] = &MODULE_14_INTENSE_INTENSITY;
    table[15] = &MODULE_15_RHYTHM;
    table[9] = &MODULE_9_TOGGLE_GATE_A;
    table[10] = &MODULE_10_TOGGLE_GATE_B;
    table[18] = &MODULE_18_TOGGLE;
    table[20] = &MODULE_20_PHASE_LEAD;
    table[21] = &MODULE_21_PHASE_LAG;
    table[22] = &MODULE_22_PHASE3;
    table[23] = &MODULE_23_AUDIO_INTENSITY;
    table[24] = &MODULE_24_ORGASM;
    table[28] = &MODULE_28_TORMENT;
    table[32] = &MODULE_32_RANDOM2;
    table[33] = &MODULE_33_COMBO_FREQUENCY;
    table[34] = &MODULE_34_AUDIO3;
    table[35] = &MODULE_35_PHASE2_FREQUENCY;
    table
}

/// All built-in module programs, indexed by module number. Numbers
/// with no dedicated program resolve to a single-byte `END`, matching
/// the interpreter's "unknown/absent does nothing" tolerance.
pub static MODULES: [&'static [u8]; MODULE_TABLE_LEN] = module_table();

/// Look up a module by number, for module numbers `< 36`. Numbers at
/// or above 36 are not runnable modules (matching the per-tick drain
/// protocol's `n < 36` guard) and resolve to `None`.
pub fn lookup_module(n: u8) -> Option<&'static [u8]> {
    MODULES.get(n as usize).copied()
}

/// One of the 25 selectable stimulation modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Mode {
    Waves,
    Stroke,
    Climb,
    Combo,
    Intense,
    Rhythm,
    Audio1,
    Audio2,
    Audio3,
    Random1,
    Random2,
    Toggle,
    Orgasm,
    Torment,
    Phase1,
    Phase2,
    Phase3,
    User1,
    User2,
    User3,
    User4,
    User5,
    User6,
    User7,
    Split,
}

impl Mode {
    pub const ALL: [Mode; 25] = [
        Mode::Waves,
        Mode::Stroke,
        Mode::Climb,
        Mode::Combo,
        Mode::Intense,
        Mode::Rhythm,
        Mode::Audio1,
        Mode::Audio2,
        Mode::Audio3,
        Mode::Random1,
        Mode::Random2,
        Mode::Toggle,
        Mode::Orgasm,
        Mode::Torment,
        Mode::Phase1,
        Mode::Phase2,
        Mode::Phase3,
        Mode::User1,
        Mode::User2,
        Mode::User3,
        Mode::User4,
        Mode::User5,
        Mode::User6,
        Mode::User7,
        Mode::Split,
    ];

    pub fn index(self) -> u8 {
        Self::ALL.iter().position(|&m| m == self).unwrap_or(0) as u8
    }

    pub fn from_index(i: u8) -> Option<Mode> {
        Self::ALL.get(i as usize).copied()
    }

    /// Module numbers run once, in order, when this mode is selected.
    /// `Random1` and `Split` are handled outside this table (the former
    /// draws its own rotation target, the latter runs each half's own
    /// mode's entry list against a one-channel mask).
    pub fn entry_modules(self) -> &'static [u8] {
        match self {
            Mode::Waves => &[11, 12],
            Mode::Stroke => &[3, 4],
            Mode::Climb => &[5, 8],
            Mode::Combo => &[13, 33],
            Mode::Intense => &[14, 2],
            Mode::Rhythm => &[15],
            Mode::Audio1 => &[23],
            Mode::Audio2 => &[23],
            Mode::Audio3 => &[34],
            Mode::Random1 => &[],
            Mode::Random2 => &[32],
            Mode::Toggle => &[18],
            Mode::Orgasm => &[24],
            Mode::Torment => &[28],
            Mode::Phase1 => &[20, 21],
            Mode::Phase2 => &[20, 21, 35],
            Mode::Phase3 => &[22],
            Mode::User1 | Mode::User2 | Mode::User3 | Mode::User4 | Mode::User5
            | Mode::User6 | Mode::User7 => &[1],
            Mode::Split => &[],
        }
    }

    /// User-module store slot (`0..7`) this mode loads its bytecode
    /// from, or `None` for every built-in mode.
    pub fn user_module_slot(self) -> Option<usize> {
        match self {
            Mode::User1 => Some(0),
            Mode::User2 => Some(1),
            Mode::User3 => Some(2),
            Mode::User4 => Some(3),
            Mode::User5 => Some(4),
            Mode::User6 => Some(5),
            Mode::User7 => Some(6),
            _ => None,
        }
    }
}
