#![cfg_attr(not(feature = "std"), no_std)]

//! The per-tick sweep engine: advances a channel's four parameter
//! groups, its gate timer, and its next-module timer by one ~4 ms tick.
//!
//! Nothing here returns `Result`. A malformed select byte resolves to
//! defined (if not especially useful) behaviour, per the engine's
//! "never signal an error" policy; the only outputs are the resolved
//! field values themselves and, optionally, a requested module number
//! bubbling up from a boundary action or a next-module timer expiry.

use chan_block::{Action, ChannelBlock, Group, RateSource, Source, SourceBase};

/// The eight advanced-setting knobs the menu/front panel exposes,
/// mapped two-per-group (min-source and rate-source respectively) as
/// described by the group's [`Source::Advanced`] base.
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
    fn min_source(&self, group: Group) -> u8 {
        match group {
            Group::Ramp => self.ramp_level,
            Group::Intensity => self.depth,
            Group::Frequency => self.frequency,
            Group::Width => self.width,
        }
    }

    fn rate_source(&self, group: Group) -> u8 {
        match group {
            Group::Ramp => self.ramp_time,
            Group::Intensity => self.tempo,
            Group::Frequency => self.effect,
            Group::Width => self.pace,
        }
    }
}

/// Resolve a source byte against the four possible bases. Callers
/// supply the already-fetched candidate value for each base; this just
/// picks one and applies the invert bit.
fn resolve_source(source: Source, own: u8, advanced: u8, knob_scaled: u8, other: u8) -> u8 {
    let base = match source.base {
        SourceBase::Own => own,
        SourceBase::Advanced => advanced,
        SourceBase::Knob => knob_scaled,
        SourceBase::Other => other,
    };
    source.apply(base)
}

/// `true`: the tick cadence for this rate fires on tick `tick_counter`.
pub fn rate_fires(rate: RateSource, tick_counter: u8) -> bool {
    match rate {
        RateSource::Never => false,
        RateSource::EveryTick => true,
        RateSource::Eighth => tick_counter % 8 == 0,
        RateSource::Wrap => tick_counter == 0,
    }
}

/// Per-group sweep direction, held outside the 64-byte block. `true`
/// means the value is moving toward `max`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Directions([bool; 4]);

impl Directions {
    pub fn get(&self, group: Group) -> bool {
        self.0[group as usize]
    }

    pub fn set(&mut self, group: Group, up: bool) {
        self.0[group as usize] = up;
    }

    /// Reconstruct direction for one group from its current field
    /// values: moves away from whichever endpoint is nearer. A tie
    /// moves up.
    fn init_one(min: u8, max: u8, value: u8) -> bool {
        let to_min = value.saturating_sub(min);
        let to_max = max.saturating_sub(value);
        to_min <= to_max
    }

    /// Recompute all four directions from a block's current field
    /// values. Called after every mode change or boundary-triggered
    /// module execution, since module writes can move `value` relative
    /// to `min`/`max` without this shadow being consulted.
    pub fn init(block: &ChannelBlock) -> Self {
        let mut dirs = Directions::default();
        for group in Group::ALL {
            let view = block.group(group);
            dirs.set(group, Self::init_one(view.min(), view.max(), view.value()));
        }
        dirs
    }
}

/// Advance one channel's four parameter groups by one tick.
///
/// `channel` is this channel's live block (mutated in place); `other`
/// is the other channel's block, read-only, for [`Source::Other`]
/// resolution. `directions` is this channel's direction shadow,
/// mutated by boundary REVERSE actions. Groups step in ramp, intensity,
/// frequency, width order, matching the documented concurrency
/// ordering; if more than one group's boundary action requests a
/// module in the same tick, the first (in that order) wins.
pub fn tick_channel(
    channel: &mut ChannelBlock,
    other: &ChannelBlock,
    directions: &mut Directions,
    tick_counter: u8,
    knob: u8,
    advanced: &AdvancedSettings,
) -> Option<u8> {
    let mut pending = None;
    for group in Group::ALL {
        let mut dir = directions.get(group);
        let requested = step_group(channel, other, group, &mut dir, tick_counter, knob, advanced);
        directions.set(group, dir);
        if pending.is_none() {
            pending = requested;
        }
    }
    pending
}

/// Advance a single parameter group by one tick. Returns a requested
/// module number if a boundary action fired one.
fn step_group(
    channel: &mut ChannelBlock,
    other: &ChannelBlock,
    group: Group,
    direction: &mut bool,
    tick_counter: u8,
    knob: u8,
    advanced: &AdvancedSettings,
) -> Option<u8> {
    let select = channel.group(group).select();
    let rate = select.timer_rate();

    if rate == RateSource::Never {
        let min_source = select.min_source();
        if min_source.into_bits() != 0 {
            let resolved = resolve_min_source(channel, other, group, min_source, knob, advanced);
            channel.group_mut(group).set_value(resolved);
        }
        return None;
    }

    if !rate_fires(rate, tick_counter) {
        return None;
    }

    let rate_source = select.rate_source();
    let own = channel.group(group).rate_or_one();
    let adv = advanced.rate_source(group);
    let knob_scaled = channel.scale_knob(knob);
    let other_v = other.group(group).rate_or_one();
    let effective_rate = resolve_source(rate_source, own, adv, knob_scaled, other_v);

    let timer = channel.group(group).timer().wrapping_add(1);
    if timer < effective_rate {
        channel.group_mut(group).set_timer(timer);
        return None;
    }
    channel.group_mut(group).set_timer(0);

    let min_source = select.min_source();
    if min_source.into_bits() != 0 {
        let resolved = resolve_min_source(channel, other, group, min_source, knob, advanced);
        channel.group_mut(group).set_min(resolved);
    }

    let (step, min, max, value) = {
        let view = channel.group(group);
        (view.step(), view.min(), view.max(), view.value())
    };

    let moved = if *direction {
        value as i32 + step as i32
    } else {
        value as i32 - step as i32
    };

    // Reaching an endpoint exactly is not itself a boundary crossing;
    // only a step that would overshoot it fires the boundary action.
    // This keeps a group parked at max/min for one tick before its
    // action (REVERSE, LOOP, ...) runs, matching the documented
    // "no overshoot beyond the endpoint".
    if *direction && moved > max as i32 {
        channel.group_mut(group).set_value(max);
        let action = channel.group(group).action_max();
        apply_action(channel, group, direction, action)
    } else if !*direction && moved < min as i32 {
        channel.group_mut(group).set_value(min);
        let action = channel.group(group).action_min();
        apply_action(channel, group, direction, action)
    } else {
        channel.group_mut(group).set_value(moved.clamp(0, 255) as u8);
        None
    }
}

fn resolve_min_source(
    channel: &ChannelBlock,
    other: &ChannelBlock,
    group: Group,
    min_source: Source,
    knob: u8,
    advanced: &AdvancedSettings,
) -> u8 {
    let own = channel.group(group).min();
    let adv = advanced.min_source(group);
    let knob_scaled = channel.scale_knob(knob);
    let other_v = other.group(group).min();
    resolve_source(min_source, own, adv, knob_scaled, other_v)
}

fn apply_action(
    channel: &mut ChannelBlock,
    group: Group,
    direction: &mut bool,
    action: Action,
) -> Option<u8> {
    match action {
        Action::Reverse => {
            *direction = !*direction;
            None
        }
        Action::ReverseToggleGate => {
            *direction = !*direction;
            let mut gate = channel.gate_value();
            gate.set_alt_polarity(!gate.alt_polarity());
            channel.set_gate_value(gate);
            None
        }
        Action::Loop => {
            let (min, max, value) = {
                let view = channel.group(group);
                (view.min(), view.max(), view.value())
            };
            let wrapped = if value == max { min } else { max };
            channel.group_mut(group).set_value(wrapped);
            None
        }
        Action::Stop => {
            let mut select = channel.group(group).select();
            select.set_timer_rate(RateSource::Never);
            channel.group_mut(group).set_select(select);
            None
        }
        Action::Module(m) => Some(m),
    }
}

/// The gate timer's shadow state: a countdown that isn't itself a
/// block field (only `gate_on_time`/`gate_off_time`, the durations to
/// count down from, live in the block).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GateTimer {
    remaining: u8,
}

/// `gate_select`'s timer-rate bits (0-1) reuse the same table as a
/// parameter group's. The remaining bits choose, independently for
/// on-time and off-time, between the stored duration byte and a
/// knob-scaled value — the spec's "effect" source requires the
/// out-of-scope audio-envelope collaborator, which has no
/// representation here, so both halves resolve symmetrically against
/// the knob instead.
fn gate_on_time_uses_knob(gate_select: u8) -> bool {
    gate_select & 0x04 != 0
}

fn gate_off_time_uses_knob(gate_select: u8) -> bool {
    gate_select & 0x08 != 0
}

impl GateTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the gate timer by one tick. On a fall-through to zero,
    /// flips `gate.on` and, on an off-to-on transition, increments
    /// `gate_transitions`.
    pub fn tick(&mut self, channel: &mut ChannelBlock, tick_counter: u8, knob: u8) {
        let gate_select = channel.gate_select();
        let rate = RateSource::from_bits(gate_select);
        if !rate_fires(rate, tick_counter) {
            return;
        }

        if self.remaining == 0 {
            self.remaining = self.resolve_duration(channel, gate_select, knob);
        }
        self.remaining = self.remaining.saturating_sub(1);

        if self.remaining == 0 {
            let mut gate = channel.gate_value();
            let turning_on = !gate.on();
            gate.set_on(turning_on);
            channel.set_gate_value(gate);
            if turning_on {
                channel.increment_gate_transitions();
            }
        }
    }

    fn resolve_duration(&self, channel: &ChannelBlock, gate_select: u8, knob: u8) -> u8 {
        let gate_is_on = channel.gate_value().on();
        if gate_is_on {
            let own = channel.gate_on_time();
            if gate_on_time_uses_knob(gate_select) {
                channel.scale_knob(knob)
            } else {
                own
            }
        } else {
            let own = channel.gate_off_time();
            if gate_off_time_uses_knob(gate_select) {
                channel.scale_knob(knob)
            } else {
                own
            }
        }
    }
}

/// The next-module timer's countdown shadow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct NextModuleTimer {
    current: u8,
}

impl NextModuleTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the next-module timer by one tick. Returns a requested
    /// module number when it elapses; the caller is responsible for
    /// "first one wins" arbitration against this channel's existing
    /// pending-module mailbox.
    pub fn tick(
        &mut self,
        channel: &mut ChannelBlock,
        other: &ChannelBlock,
        knob: u8,
    ) -> Option<u8> {
        let own = channel.next_module_timer_max();
        // No advanced setting is defined for the next-module timer;
        // an Advanced source behaves the same as Own.
        let source = Source::from_bits(channel.next_module_select());
        let knob_scaled = channel.scale_knob(knob);
        let other_v = other.next_module_timer_max();
        let resolved_max = resolve_source(source, own, own, knob_scaled, other_v);

        self.current = channel.next_module_timer_current().wrapping_add(1);
        if self.current < resolved_max {
            channel.set_next_module_timer_current(self.current);
            return None;
        }
        self.current = 0;
        channel.set_next_module_timer_current(0);
        Some(channel.next_module_number())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use chan_block::{RateSource, Select, SourceBase};
    use quickcheck_macros::quickcheck;

    fn configure_group(
        channel: &mut ChannelBlock,
        group: Group,
        value: u8,
        min: u8,
        max: u8,
        step: u8,
        action_min: Action,
        action_max: Action,
        rate: RateSource,
    ) {
        let mut view = channel.group_mut(group);
        view.set_value(value);
        view.set_min(min);
        view.set_max(max);
        view.set_step(step);
        view.set_rate(1);
        view.set_action_min(action_min);
        view.set_action_max(action_max);
        let mut select = Select::new();
        select.set_timer_rate(rate);
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

    #[test]
    fn group_step_monotonic_no_overshoot() {
        let mut channel = ChannelBlock::default();
        let other = ChannelBlock::default();
        configure_group(
            &mut channel,
            Group::Ramp,
            10,
            10,
            20,
            3,
            Action::Reverse,
            Action::Reverse,
            RateSource::EveryTick,
        );
        let advanced = AdvancedSettings::default();
        let mut direction = true;

        for _ in 0..20 {
            step_group(&mut channel, &other, Group::Ramp, &mut direction, 1, 0, &advanced);
            let value = channel.group(Group::Ramp).value();
            assert!((10..=20).contains(&value));
        }
    }

    #[test]
    fn loop_wraps_after_eleven_ticks() {
        let mut channel = ChannelBlock::default();
        let other = ChannelBlock::default();
        configure_group(
            &mut channel,
            Group::Ramp,
            10,
            10,
            20,
            1,
            Action::Loop,
            Action::Loop,
            RateSource::EveryTick,
        );
        let advanced = AdvancedSettings::default();
        let mut direction = true;

        for _ in 0..10 {
            step_group(&mut channel, &other, Group::Ramp, &mut direction, 1, 0, &advanced);
        }
        assert_eq!(channel.group(Group::Ramp).value(), 20);

        step_group(&mut channel, &other, Group::Ramp, &mut direction, 1, 0, &advanced);
        assert_eq!(channel.group(Group::Ramp).value(), 10);
    }

    #[test]
    fn stop_freezes_group() {
        let mut channel = ChannelBlock::default();
        let other = ChannelBlock::default();
        configure_group(
            &mut channel,
            Group::Intensity,
            20,
            10,
            20,
            5,
            Action::Stop,
            Action::Stop,
            RateSource::EveryTick,
        );
        let advanced = AdvancedSettings::default();
        let mut direction = true;

        // drive to the max boundary, which fires STOP.
        for _ in 0..5 {
            step_group(&mut channel, &other, Group::Intensity, &mut direction, 1, 0, &advanced);
        }
        let frozen = channel.group(Group::Intensity).value();
        assert_eq!(channel.group(Group::Intensity).select().timer_rate(), RateSource::Never);

        for tick in 0..50u8 {
            step_group(&mut channel, &other, Group::Intensity, &mut direction, tick, 0, &advanced);
        }
        assert_eq!(channel.group(Group::Intensity).value(), frozen);
    }

    #[test]
    fn other_channel_source_tracks_within_one_tick() {
        let mut a = ChannelBlock::default();
        let mut b = ChannelBlock::default();
        b.group_mut(Group::Width).set_min(77);

        {
            let mut view = a.group_mut(Group::Width);
            view.set_min(0);
            let mut select = Select::new();
            select.set_timer_rate(RateSource::EveryTick);
            select.set_min_source(Source {
                base: SourceBase::Other,
                invert: false,
            });
            select.set_rate_source(Source {
                base: SourceBase::Own,
                invert: false,
            });
            view.set_select(select);
        }

        let advanced = AdvancedSettings::default();
        let mut direction = true;
        step_group(&mut a, &b, Group::Width, &mut direction, 1, 0, &advanced);
        assert_eq!(a.group(Group::Width).min(), 77);
    }

    #[quickcheck]
    fn source_inversion_round_trip(raw_value: u8, base_bits: u8) -> bool {
        let source = Source::from_bits((base_bits & 0x3) | 0x4);
        let resolved = resolve_source(source, raw_value, raw_value, raw_value, raw_value);
        resolved == 255u8.wrapping_sub(raw_value)
    }

    #[quickcheck]
    fn tick_firing_rates_over_1024_ticks() -> bool {
        let mut every = 0u32;
        let mut eighth = 0u32;
        let mut wrap = 0u32;
        for n in 0..1024u32 {
            let t = (n % 256) as u8;
            if rate_fires(RateSource::EveryTick, t) {
                every += 1;
            }
            if rate_fires(RateSource::Eighth, t) {
                eighth += 1;
            }
            if rate_fires(RateSource::Wrap, t) {
                wrap += 1;
            }
        }
        every == 1024 && eighth == 128 && wrap == 4
    }

    #[test]
    fn init_directions_favors_farther_endpoint() {
        let mut block = ChannelBlock::default();
        block.group_mut(Group::Ramp).set_value(12);
        block.group_mut(Group::Ramp).set_min(10);
        block.group_mut(Group::Ramp).set_max(20);

        let dirs = Directions::init(&block);
        // value is nearer min (distance 2) than max (distance 8): move up, away from min.
        assert!(dirs.get(Group::Ramp));
    }

    #[test]
    fn gate_timer_counts_on_then_off() {
        let mut channel = ChannelBlock::default();
        channel.set_gate_on_time(3);
        channel.set_gate_off_time(2);
        channel.set_gate_value(channel.gate_value().with_on(true));
        // timer rate bits = EveryTick, knob flags both clear.
        channel.set_gate_select(RateSource::EveryTick.into_bits());

        let mut timer = GateTimer::new();
        let initial_transitions = channel.gate_transitions();
        for _ in 0..3 {
            timer.tick(&mut channel, 1, 0);
        }
        assert!(!channel.gate_value().on());

        for _ in 0..2 {
            timer.tick(&mut channel, 1, 0);
        }
        assert!(channel.gate_value().on());
        assert_eq!(channel.gate_transitions(), initial_transitions.wrapping_add(1));
    }

    #[test]
    fn next_module_timer_fires_and_resets() {
        let mut a = ChannelBlock::default();
        let b = ChannelBlock::default();
        a.set_next_module_timer_max(4);
        a.set_next_module_number(9);

        let mut timer = NextModuleTimer::new();
        let mut fired = None;
        for _ in 0..10 {
            if let Some(m) = timer.tick(&mut a, &b, 0) {
                fired = Some(m);
                break;
            }
        }
        assert_eq!(fired, Some(9));
        assert_eq!(a.next_module_timer_current(), 0);
    }
}
