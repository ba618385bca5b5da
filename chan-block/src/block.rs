use bitfield_struct::bitfield;

use crate::group::{ParamGroupView, ParamGroupViewMut, GROUP_LEN};
use crate::select::{RateSource, Select, Source, SourceBase};

/// Size in bytes of a single channel's register block.
pub const BLOCK_LEN: usize = 64;

// Control group, offsets 0x00-0x0C.
const RETRY_COUNT: usize = 0x00;
const OUTPUT_CONTROL_FLAGS: usize = 0x01;
const CONDITIONAL_MODULE_SLOT: usize = 0x02;
const APPLY_CHANNEL_MASK: usize = 0x03;
const KNOB_RANGE_LOW: usize = 0x04;
const KNOB_RANGE_HIGH: usize = 0x05;
const ROUTINE_TIMER: usize = 0x06; // 3 bytes: 0x06, 0x07, 0x08
const RANDOM_MIN: usize = 0x09;
const RANDOM_MAX: usize = 0x0A;
const AUDIO_TRIGGER_MODULE: usize = 0x0B;
const BANK: usize = 0x0C;

// Gate group, offsets 0x0D-0x11.
const GATE_VALUE: usize = 0x0D;
const GATE_ON_TIME: usize = 0x0E;
const GATE_OFF_TIME: usize = 0x0F;
const GATE_SELECT: usize = 0x10;
const GATE_TRANSITIONS: usize = 0x11;

// Next-module timer group, offsets 0x12-0x15.
const NEXT_MODULE_TIMER_CURRENT: usize = 0x12;
const NEXT_MODULE_TIMER_MAX: usize = 0x13;
const NEXT_MODULE_SELECT: usize = 0x14;
const NEXT_MODULE_NUMBER: usize = 0x15;

// Four 9-byte parameter groups, offsets 0x16-0x39.
const GROUPS_BASE: usize = 0x16;

/// Which of the four parameter groups in a [`ChannelBlock`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Group {
    Ramp = 0,
    Intensity = 1,
    Frequency = 2,
    Width = 3,
}

impl Group {
    pub const ALL: [Group; 4] = [Group::Ramp, Group::Intensity, Group::Frequency, Group::Width];

    /// Byte offset of this group's first field within a [`ChannelBlock`].
    pub fn offset(self) -> usize {
        GROUPS_BASE + (self as usize) * GROUP_LEN
    }
}

/// Bit 0 of the gate value: output enabled. Remaining bits carry
/// polarity/audio flags whose exact meaning is mode-specific; only the
/// `alt_polarity` bit (bit 1), flipped by [`Action::ReverseToggleGate`]
/// (`crate::Action`), has engine-defined behavior.
#[cfg_attr(not(feature = "defmt"), bitfield(u8))]
#[cfg_attr(feature = "defmt", bitfield(u8, defmt = true))]
#[derive(PartialEq, Eq)]
pub struct GateValue {
    pub on: bool,
    pub alt_polarity: bool,
    #[bits(6)]
    pub flags: u8,
}

/// The 64-byte register block driving one channel's stimulation output.
///
/// Field order is contractual: both [`crate`] consumers outside this
/// crate (the bytecode interpreter, the serial protocol's virtual
/// address map) index into this block by byte offset.
#[derive(Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChannelBlock([u8; BLOCK_LEN]);

impl ChannelBlock {
    /// A block of all zero bytes, with no output enabled.
    pub const fn zeroed() -> Self {
        Self([0; BLOCK_LEN])
    }

    /// Read the raw byte at a local offset (`0x00..0x40`).
    pub fn get(&self, offset: u8) -> u8 {
        self.0[offset as usize & (BLOCK_LEN - 1)]
    }

    /// Write the raw byte at a local offset (`0x00..0x40`).
    pub fn set(&mut self, offset: u8, value: u8) {
        self.0[offset as usize & (BLOCK_LEN - 1)] = value;
    }

    pub fn as_bytes(&self) -> &[u8; BLOCK_LEN] {
        &self.0
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8; BLOCK_LEN] {
        &mut self.0
    }

    pub fn retry_count(&self) -> u8 {
        self.0[RETRY_COUNT]
    }

    pub fn set_retry_count(&mut self, v: u8) {
        self.0[RETRY_COUNT] = v;
    }

    pub fn output_control_flags(&self) -> u8 {
        self.0[OUTPUT_CONTROL_FLAGS]
    }

    pub fn set_output_control_flags(&mut self, v: u8) {
        self.0[OUTPUT_CONTROL_FLAGS] = v;
    }

    pub fn conditional_module_slot(&self) -> u8 {
        self.0[CONDITIONAL_MODULE_SLOT]
    }

    pub fn set_conditional_module_slot(&mut self, v: u8) {
        self.0[CONDITIONAL_MODULE_SLOT] = v;
    }

    /// Bit 0 = apply to channel A, bit 1 = apply to channel B.
    pub fn apply_channel_mask(&self) -> u8 {
        self.0[APPLY_CHANNEL_MASK]
    }

    pub fn set_apply_channel_mask(&mut self, v: u8) {
        self.0[APPLY_CHANNEL_MASK] = v;
    }

    pub fn applies_to_a(&self) -> bool {
        self.apply_channel_mask() & 0x01 != 0
    }

    pub fn applies_to_b(&self) -> bool {
        self.apply_channel_mask() & 0x02 != 0
    }

    pub fn knob_range_low(&self) -> u8 {
        self.0[KNOB_RANGE_LOW]
    }

    pub fn set_knob_range_low(&mut self, v: u8) {
        self.0[KNOB_RANGE_LOW] = v;
    }

    pub fn knob_range_high(&self) -> u8 {
        self.0[KNOB_RANGE_HIGH]
    }

    pub fn set_knob_range_high(&mut self, v: u8) {
        self.0[KNOB_RANGE_HIGH] = v;
    }

    /// Scale a raw knob reading through this block's knob range.
    pub fn scale_knob(&self, knob: u8) -> u8 {
        let low = self.knob_range_low() as i32;
        let high = self.knob_range_high() as i32;
        let knob = knob as i32;
        if high >= low {
            (low + ((knob * (high - low)) >> 8)) as u8
        } else {
            (low - ((knob * (low - high)) >> 8)) as u8
        }
    }

    pub fn routine_timer(&self) -> [u8; 3] {
        [
            self.0[ROUTINE_TIMER],
            self.0[ROUTINE_TIMER + 1],
            self.0[ROUTINE_TIMER + 2],
        ]
    }

    pub fn set_routine_timer(&mut self, v: [u8; 3]) {
        self.0[ROUTINE_TIMER..ROUTINE_TIMER + 3].copy_from_slice(&v);
    }

    pub fn random_min(&self) -> u8 {
        self.0[RANDOM_MIN]
    }

    pub fn set_random_min(&mut self, v: u8) {
        self.0[RANDOM_MIN] = v;
    }

    pub fn random_max(&self) -> u8 {
        self.0[RANDOM_MAX]
    }

    pub fn set_random_max(&mut self, v: u8) {
        self.0[RANDOM_MAX] = v;
    }

    pub fn audio_trigger_module(&self) -> u8 {
        self.0[AUDIO_TRIGGER_MODULE]
    }

    pub fn set_audio_trigger_module(&mut self, v: u8) {
        self.0[AUDIO_TRIGGER_MODULE] = v;
    }

    /// Scratch "bank" byte used by `MEMOP` bytecode instructions.
    pub fn bank(&self) -> u8 {
        self.0[BANK]
    }

    pub fn set_bank(&mut self, v: u8) {
        self.0[BANK] = v;
    }

    pub fn gate_value(&self) -> GateValue {
        GateValue::from_bits(self.0[GATE_VALUE])
    }

    pub fn set_gate_value(&mut self, v: GateValue) {
        self.0[GATE_VALUE] = v.into_bits();
    }

    pub fn set_gate_value_raw(&mut self, v: u8) {
        self.0[GATE_VALUE] = v;
    }

    pub fn gate_on_time(&self) -> u8 {
        self.0[GATE_ON_TIME]
    }

    pub fn set_gate_on_time(&mut self, v: u8) {
        self.0[GATE_ON_TIME] = v;
    }

    pub fn gate_off_time(&self) -> u8 {
        self.0[GATE_OFF_TIME]
    }

    pub fn set_gate_off_time(&mut self, v: u8) {
        self.0[GATE_OFF_TIME] = v;
    }

    pub fn gate_select(&self) -> u8 {
        self.0[GATE_SELECT]
    }

    pub fn set_gate_select(&mut self, v: u8) {
        self.0[GATE_SELECT] = v;
    }

    pub fn gate_transitions(&self) -> u8 {
        self.0[GATE_TRANSITIONS]
    }

    pub fn set_gate_transitions(&mut self, v: u8) {
        self.0[GATE_TRANSITIONS] = v;
    }

    pub fn increment_gate_transitions(&mut self) {
        self.0[GATE_TRANSITIONS] = self.0[GATE_TRANSITIONS].wrapping_add(1);
    }

    pub fn next_module_timer_current(&self) -> u8 {
        self.0[NEXT_MODULE_TIMER_CURRENT]
    }

    pub fn set_next_module_timer_current(&mut self, v: u8) {
        self.0[NEXT_MODULE_TIMER_CURRENT] = v;
    }

    pub fn next_module_timer_max(&self) -> u8 {
        self.0[NEXT_MODULE_TIMER_MAX]
    }

    pub fn set_next_module_timer_max(&mut self, v: u8) {
        self.0[NEXT_MODULE_TIMER_MAX] = v;
    }

    pub fn next_module_select(&self) -> u8 {
        self.0[NEXT_MODULE_SELECT]
    }

    pub fn set_next_module_select(&mut self, v: u8) {
        self.0[NEXT_MODULE_SELECT] = v;
    }

    pub fn next_module_number(&self) -> u8 {
        self.0[NEXT_MODULE_NUMBER]
    }

    pub fn set_next_module_number(&mut self, v: u8) {
        self.0[NEXT_MODULE_NUMBER] = v;
    }

    pub fn group(&self, g: Group) -> ParamGroupView<'_> {
        let off = g.offset();
        ParamGroupView::new(&self.0[off..off + GROUP_LEN])
    }

    pub fn group_mut(&mut self, g: Group) -> ParamGroupViewMut<'_> {
        let off = g.offset();
        ParamGroupViewMut::new(&mut self.0[off..off + GROUP_LEN])
    }
}

impl Default for ChannelBlock {
    /// The compile-time default image: sensible bounds on all four
    /// groups, `apply_channel = 0x03` (both channels), gate "output on,
    /// biphasic polarity", and select bytes that leave the engine
    /// quiescent (static, own-sourced) until a module configures them.
    fn default() -> Self {
        let mut b = Self::zeroed();
        b.set_apply_channel_mask(0x03);
        b.set_gate_value(GateValue::new().with_on(true));
        b.set_knob_range_low(0);
        b.set_knob_range_high(255);
        b.set_random_min(0);
        b.set_random_max(255);

        for g in Group::ALL {
            let mut view = b.group_mut(g);
            view.set_value(0);
            view.set_min(0);
            view.set_max(255);
            view.set_rate(1);
            view.set_step(1);
            view.set_action_min(crate::Action::Reverse);
            view.set_action_max(crate::Action::Reverse);
            let mut select = Select::new();
            select.set_timer_rate(RateSource::Never);
            select.set_min_source(Source {
                base: SourceBase::Own,
                invert: false,
            });
            select.set_rate_source(Source {
                base: SourceBase::Own,
                invert: false,
            });
            view.set_select(select);
            view.set_timer(0);
        }

        b
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::select::SourceBase;

    #[test]
    fn default_image_is_quiescent() {
        let b = ChannelBlock::default();
        assert_eq!(b.apply_channel_mask(), 0x03);
        assert!(b.gate_value().on());
        for g in Group::ALL {
            let view = b.group(g);
            assert_eq!(view.select().timer_rate(), RateSource::Never);
            assert_eq!(view.select().min_source().base, SourceBase::Own);
        }
    }

    #[test]
    fn scale_knob_direct() {
        let mut b = ChannelBlock::zeroed();
        b.set_knob_range_low(0);
        b.set_knob_range_high(255);
        assert_eq!(b.scale_knob(0), 0);
        assert_eq!(b.scale_knob(255), 254); // (255*255)>>8 == 254
    }

    #[test]
    fn scale_knob_inverted() {
        let mut b = ChannelBlock::zeroed();
        b.set_knob_range_low(255);
        b.set_knob_range_high(0);
        assert_eq!(b.scale_knob(0), 255);
        assert_eq!(b.scale_knob(255), 255 - 254);
    }

    #[test]
    fn group_offsets_fit_in_block() {
        for g in Group::ALL {
            let off = g.offset();
            assert!(off + GROUP_LEN <= BLOCK_LEN);
        }
    }

    #[test]
    fn bank_is_at_0x0c() {
        assert_eq!(BANK, 0x0C);
    }
}
