//! Engine context: owns both channels' live registers, their direction
//! shadows and timers, the mode selection, and the deferred-command
//! mailbox that serializes asynchronous mode changes onto the tick
//! boundary.

use bytecode::{run_module, Rng};
use chan_block::{ChannelBlock, GateValue, Registers};
use param_engine::{AdvancedSettings, Directions, GateTimer, NextModuleTimer};

use crate::modules::{lookup_module, Mode};

/// Number of ticks (at the ~244 Hz engine rate) per Random-1 "slow"
/// counter pulse, approximating the documented 1.91 Hz rate
/// (244 / 1.91 ≈ 128).
const RANDOM1_SLOW_DIVISOR: u16 = 128;

/// A mode change or transport command requested asynchronously
/// (serial/menu) and applied synchronously at the next tick boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DeferredCommand {
    #[default]
    None,
    SetMode(u8),
    Pause,
    Next,
    Prev,
    Reload,
    StartRamp,
    /// Box command `0x19`: swap channel A and B's live register state.
    SwapChannels,
    /// Box command `0x1A`: overwrite B's register state with A's.
    CopyAToB,
    /// Box command `0x1B`: overwrite A's register state with B's.
    CopyBToA,
}

/// Live state for both channels' stimulation engines plus the mode
/// dispatcher that drives them.
pub struct EngineContext {
    pub registers: Registers,
    directions_a: Directions,
    directions_b: Directions,
    gate_timer_a: GateTimer,
    gate_timer_b: GateTimer,
    next_module_timer_a: NextModuleTimer,
    next_module_timer_b: NextModuleTimer,
    rng: Rng,
    tick_counter: u8,
    pending_a: Option<u8>,
    pending_b: Option<u8>,
    pub paused: bool,
    pub current_mode: Mode,
    pub split_mode_a: Mode,
    pub split_mode_b: Mode,
    pub advanced: AdvancedSettings,
    pub knob: u8,
    /// Mirrored from channel A's `output_control_flags` each tick, per
    /// the per-tick update protocol's last step.
    pub output_flags: u8,
    /// Set by a `StartRamp` deferred command; cleared by whoever owns
    /// the menu-driven ramp percentage once observed.
    pub ramp_requested: bool,
    random1_slow_counter: u16,
    random1_deadline: u16,
}

impl EngineContext {
    pub fn new(seed: u16) -> Self {
        let mut ctx = Self {
            registers: Registers::new(),
            directions_a: Directions::default(),
            directions_b: Directions::default(),
            gate_timer_a: GateTimer::new(),
            gate_timer_b: GateTimer::new(),
            next_module_timer_a: NextModuleTimer::new(),
            next_module_timer_b: NextModuleTimer::new(),
            rng: Rng::new(seed),
            tick_counter: 0,
            pending_a: None,
            pending_b: None,
            paused: false,
            current_mode: Mode::Waves,
            split_mode_a: Mode::Waves,
            split_mode_b: Mode::Waves,
            advanced: AdvancedSettings::default(),
            knob: 0,
            output_flags: 0,
            ramp_requested: false,
            random1_slow_counter: 0,
            random1_deadline: 0,
        };
        ctx.mode_entry(Mode::Waves);
        ctx
    }

    fn run_module_by_number(&mut self, n: u8) {
        if let Some(program) = lookup_module(n) {
            run_module(program, &mut self.registers, &mut self.rng);
        }
    }

    /// Run an arbitrary bytecode program against the live registers,
    /// exactly as a built-in module would. For a stored user-module
    /// payload (spec §4.7's User1-7 slots), which lives outside the
    /// built-in module table and so can't be reached by number.
    pub fn run_custom_bytecode(&mut self, program: &[u8]) {
        run_module(program, &mut self.registers, &mut self.rng);
    }

    fn force_gates_off(&mut self) {
        self.registers.a.set_gate_value(GateValue::new().with_on(false));
        self.registers.b.set_gate_value(GateValue::new().with_on(false));
    }

    fn reset_tick_state(&mut self) {
        self.tick_counter = 0;
        self.pending_a = None;
        self.pending_b = None;
    }

    fn init_all_directions(&mut self) {
        self.directions_a = Directions::init(&self.registers.a);
        self.directions_b = Directions::init(&self.registers.b);
    }

    /// Gate/output-flag post-fixups applied after a mode's module list
    /// runs, per the mode-entry module table.
    fn apply_post_fixups(&mut self, mode: Mode) {
        match mode {
            Mode::Audio1 => {
                self.registers.a.set_gate_value_raw(0x47);
                self.registers.b.set_gate_value_raw(0x47);
                self.registers.a.set_output_control_flags(0x40);
            }
            Mode::Audio2 => {
                self.registers.a.set_gate_value_raw(0x47);
                self.registers.b.set_gate_value_raw(0x47);
            }
            Mode::Audio3 => {
                self.registers.a.set_gate_value_raw(0x67);
                self.registers.b.set_gate_value_raw(0x67);
                self.registers.a.set_output_control_flags(0x04);
            }
            Mode::Phase1 | Mode::Phase2 => {
                self.registers.a.set_output_control_flags(0x05);
            }
            _ => {}
        }
    }

    /// Steps 1, 2, 5, 6 of the mode-entry protocol for any built-in,
    /// non-split, non-rotating mode: reload both channel defaults, run
    /// the mode's module list, apply its post-fixups, and re-init
    /// directions. Shared by top-level mode selection and by Random-1's
    /// rotation, which enters a sub-mode without changing the reported
    /// current mode.
    fn run_builtin_entry(&mut self, mode: Mode) {
        self.registers.a = ChannelBlock::default();
        self.registers.b = ChannelBlock::default();
        for &module in mode.entry_modules() {
            self.run_module_by_number(module);
        }
        self.apply_post_fixups(mode);
        self.init_all_directions();
        self.output_flags = self.registers.a.output_control_flags();
    }

    /// Full mode-entry protocol (spec §4.5): force gates off, reset
    /// tick/mailbox state, then dispatch on the kind of mode.
    pub fn mode_entry(&mut self, mode: Mode) {
        self.current_mode = mode;
        self.force_gates_off();
        self.reset_tick_state();

        match mode {
            Mode::Random1 => {
                self.random1_slow_counter = 0;
                self.random1_deadline = self.roll_random1_deadline();
            }
            Mode::Split => self.split_init(),
            _ => self.run_builtin_entry(mode),
        }
    }

    fn roll_random1_deadline(&mut self) -> u16 {
        self.rng.range_inclusive(2, 8) as u16
    }

    /// Split-mode init (spec §4.5): each half's selected mode is run in
    /// isolation against its own channel, then the two results are
    /// recombined.
    fn split_init(&mut self) {
        self.registers.a = ChannelBlock::default();
        self.registers.b = ChannelBlock::default();
        self.registers.a.set_apply_channel_mask(0x01);
        self.run_module_by_number(1);
        for &module in self.split_mode_a.entry_modules() {
            self.run_module_by_number(module);
        }
        self.apply_post_fixups(self.split_mode_a);
        let snapshot_a = self.registers.a.clone();
        let a_gate = snapshot_a.gate_value();
        let a_flags = snapshot_a.output_control_flags();

        self.registers.a = ChannelBlock::default();
        self.registers.b = ChannelBlock::default();
        self.registers.a.set_apply_channel_mask(0x02);
        self.run_module_by_number(1);
        for &module in self.split_mode_b.entry_modules() {
            self.run_module_by_number(module);
        }
        self.apply_post_fixups(self.split_mode_b);
        // Propagate the fields channel A's half wrote into its
        // gate/output-flags so both halves agree on the globally
        // visible ones once recombined.
        self.registers.b.set_gate_value(a_gate);
        self.registers.b.set_output_control_flags(a_flags);
        let snapshot_b = self.registers.b.clone();

        self.registers.a = snapshot_a;
        self.registers.b = snapshot_b;
        self.registers.a.set_apply_channel_mask(0x03);

        self.init_all_directions();
        self.output_flags = self.registers.a.output_control_flags();
    }

    /// The first six built-in modes Random-1 rotates among.
    const RANDOM1_POOL: [Mode; 6] = [
        Mode::Waves,
        Mode::Stroke,
        Mode::Climb,
        Mode::Combo,
        Mode::Intense,
        Mode::Rhythm,
    ];

    fn random1_rotation_check(&mut self) {
        self.random1_slow_counter = self.random1_slow_counter.wrapping_add(1);
        if self.random1_slow_counter < RANDOM1_SLOW_DIVISOR {
            return;
        }
        self.random1_slow_counter = 0;

        if self.random1_deadline > 0 {
            self.random1_deadline -= 1;
            return;
        }

        let pick = self.rng.range_inclusive(0, (Self::RANDOM1_POOL.len() - 1) as u8);
        let sub_mode = Self::RANDOM1_POOL[pick as usize];
        // A random secondary field: perturb the chosen mode's ramp
        // group starting value for variety between rotations.
        let secondary = self.rng.range_inclusive(0, 255);
        self.run_builtin_entry(sub_mode);
        let mut ramp = self.registers.a.group_mut(chan_block::Group::Ramp);
        ramp.set_value(secondary);

        self.random1_deadline = self.roll_random1_deadline();
    }

    /// Per-tick update protocol (spec §4.5).
    pub fn tick(&mut self) {
        if self.paused {
            return;
        }

        if self.current_mode == Mode::Random1 {
            self.random1_rotation_check();
        }

        let mut requested_a = param_engine::tick_channel(
            &mut self.registers.a,
            &self.registers.b,
            &mut self.directions_a,
            self.tick_counter,
            self.knob,
            &self.advanced,
        );
        let mut requested_b = param_engine::tick_channel(
            &mut self.registers.b,
            &self.registers.a,
            &mut self.directions_b,
            self.tick_counter,
            self.knob,
            &self.advanced,
        );

        self.gate_timer_a.tick(&mut self.registers.a, self.tick_counter, self.knob);
        self.gate_timer_b.tick(&mut self.registers.b, self.tick_counter, self.knob);

        if let Some(m) = self.next_module_timer_a.tick(&mut self.registers.a, &self.registers.b, self.knob) {
            requested_a.get_or_insert(m);
        }
        if let Some(m) = self.next_module_timer_b.tick(&mut self.registers.b, &self.registers.a, self.knob) {
            requested_b.get_or_insert(m);
        }

        if self.pending_a.is_none() {
            self.pending_a = requested_a;
        }
        if self.pending_b.is_none() {
            self.pending_b = requested_b;
        }

        self.tick_counter = self.tick_counter.wrapping_add(1);

        if let Some(n) = self.pending_a.take() {
            if n < 36 {
                self.run_module_by_number(n);
            }
            self.directions_a = Directions::init(&self.registers.a);
        }
        if let Some(n) = self.pending_b.take() {
            if n < 36 {
                self.run_module_by_number(n);
            }
            self.directions_b = Directions::init(&self.registers.b);
        }

        self.output_flags = self.registers.a.output_control_flags();
    }

    /// Apply a deferred command (spec §4.5): performed synchronously at
    /// the top of the foreground loop, never from serial/menu context
    /// directly.
    pub fn apply_deferred(&mut self, cmd: DeferredCommand) {
        match cmd {
            DeferredCommand::None => {}
            DeferredCommand::SetMode(n) => {
                if let Some(mode) = Mode::from_index(n) {
                    self.mode_entry(mode);
                }
            }
            DeferredCommand::Pause => self.paused = !self.paused,
            DeferredCommand::Next => {
                let next = (self.current_mode.index() + 1) % Mode::ALL.len() as u8;
                self.mode_entry(Mode::from_index(next).unwrap_or(Mode::Waves));
            }
            DeferredCommand::Prev => {
                let len = Mode::ALL.len() as u8;
                let prev = (self.current_mode.index() + len - 1) % len;
                self.mode_entry(Mode::from_index(prev).unwrap_or(Mode::Waves));
            }
            DeferredCommand::Reload => self.mode_entry(self.current_mode),
            DeferredCommand::StartRamp => self.ramp_requested = true,
            DeferredCommand::SwapChannels => {
                core::mem::swap(&mut self.registers.a, &mut self.registers.b);
                core::mem::swap(&mut self.directions_a, &mut self.directions_b);
                core::mem::swap(&mut self.gate_timer_a, &mut self.gate_timer_b);
                core::mem::swap(&mut self.next_module_timer_a, &mut self.next_module_timer_b);
            }
            DeferredCommand::CopyAToB => {
                self.registers.b = self.registers.a.clone();
                self.init_all_directions();
            }
            DeferredCommand::CopyBToA => {
                self.registers.a = self.registers.b.clone();
                self.init_all_directions();
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn waves_entry_matches_literal_scenario() {
        let mut ctx = EngineContext::new(1);
        ctx.mode_entry(Mode::Waves);

        let freq = ctx.registers.a.group(chan_block::Group::Frequency);
        assert_eq!(freq.select().into_bits(), 0x41);
        assert_eq!(freq.min(), 0x8B);
        assert_eq!(freq.max(), 0xFF);
        assert_eq!(freq.step(), 1);

        let width = ctx.registers.a.group(chan_block::Group::Width);
        assert_eq!(width.select().into_bits(), 0x41);
        assert_eq!(width.min(), 0);
        assert_eq!(width.max(), 0xB3);
        assert_eq!(width.step(), 3);
    }

    #[test]
    fn waves_sweeps_stay_in_bounds_and_reverse() {
        let mut ctx = EngineContext::new(2);
        ctx.mode_entry(Mode::Waves);
        ctx.knob = 127;

        let mut freq_reversed = false;
        let mut last_freq_dir = ctx.directions_a.get(chan_block::Group::Frequency);
        for _ in 0..244 {
            ctx.tick();
            let freq = ctx.registers.a.group(chan_block::Group::Frequency);
            assert!((139..=255).contains(&freq.value()));
            let width = ctx.registers.a.group(chan_block::Group::Width);
            assert!(width.value() <= 179);

            let dir = ctx.directions_a.get(chan_block::Group::Frequency);
            if dir != last_freq_dir {
                freq_reversed = true;
            }
            last_freq_dir = dir;
        }
        assert!(freq_reversed);
    }

    #[test]
    fn climb_chain_cycles_through_modules_5_6_7() {
        let mut ctx = EngineContext::new(3);
        ctx.mode_entry(Mode::Climb);
        ctx.knob = 0;

        let mut saw_step_2 = false;
        let mut saw_step_4 = false;
        for _ in 0..4000 {
            ctx.tick();
            let intensity = ctx.registers.a.group(chan_block::Group::Intensity);
            if intensity.step() == 2 {
                saw_step_2 = true;
            }
            if intensity.step() == 4 {
                saw_step_4 = true;
            }
        }
        assert!(saw_step_2);
        assert!(saw_step_4);
    }

    #[test]
    fn split_isolation_matches_solo_entry() {
        let mut solo = EngineContext::new(4);
        solo.mode_entry(Mode::Waves);
        let solo_freq = solo.registers.a.group(chan_block::Group::Frequency).min();
        let solo_width = solo.registers.a.group(chan_block::Group::Width).max();

        let mut split = EngineContext::new(4);
        split.split_mode_a = Mode::Waves;
        split.split_mode_b = Mode::Climb;
        split.mode_entry(Mode::Split);

        assert_eq!(split.registers.a.group(chan_block::Group::Frequency).min(), solo_freq);
        assert_eq!(split.registers.a.group(chan_block::Group::Width).max(), solo_width);
    }

    #[test]
    fn mode_reentry_is_idempotent() {
        let mut ctx = EngineContext::new(5);
        ctx.mode_entry(Mode::Stroke);
        let first = ctx.registers.a.clone();
        ctx.mode_entry(Mode::Stroke);
        assert_eq!(ctx.registers.a, first);
    }

    #[test]
    fn deferred_set_mode_takes_effect_next_tick() {
        let mut ctx = EngineContext::new(6);
        ctx.mode_entry(Mode::Waves);
        ctx.apply_deferred(DeferredCommand::SetMode(Mode::Stroke.index()));
        assert_eq!(ctx.current_mode, Mode::Stroke);
    }

    #[test]
    fn toggle_knob_scales_next_module_period_and_alternates_gates() {
        let ticks_to_first_flip = |knob: u8| {
            let mut ctx = EngineContext::new(8);
            ctx.mode_entry(Mode::Toggle);
            ctx.knob = knob;
            assert!(ctx.registers.a.gate_value().on());
            assert!(ctx.registers.b.gate_value().on());
            for n in 1..=300u32 {
                ctx.tick();
                if !ctx.registers.a.gate_value().on() {
                    return n;
                }
            }
            panic!("gate A never flipped off for knob={knob}");
        };

        let period_at_min_knob = ticks_to_first_flip(0);
        let period_at_max_knob = ticks_to_first_flip(255);
        assert!(
            (235..=245).contains(&period_at_min_knob),
            "expected ~240 ticks at knob=0, got {period_at_min_knob}"
        );
        assert!(
            (55..=65).contains(&period_at_max_knob),
            "expected ~60 ticks at knob=255, got {period_at_max_knob}"
        );
        assert!(period_at_max_knob < period_at_min_knob);

        // Both gates toggle (independently, off the same knob-scaled
        // period) rather than only channel A's.
        let mut ctx = EngineContext::new(9);
        ctx.mode_entry(Mode::Toggle);
        ctx.knob = 0;
        let mut a_flipped = false;
        let mut b_flipped = false;
        for _ in 0..250 {
            ctx.tick();
            a_flipped |= !ctx.registers.a.gate_value().on();
            b_flipped |= !ctx.registers.b.gate_value().on();
        }
        assert!(a_flipped && b_flipped);
    }

    #[test]
    fn copy_a_to_b_matches_a_and_swap_restores_originals() {
        let mut ctx = EngineContext::new(7);
        ctx.mode_entry(Mode::Stroke);
        ctx.knob = 200;
        for _ in 0..50 {
            ctx.tick();
        }
        let a_before = ctx.registers.a.clone();
        let b_before = ctx.registers.b.clone();
        assert_ne!(a_before, b_before);

        ctx.apply_deferred(DeferredCommand::CopyAToB);
        assert_eq!(ctx.registers.a, a_before);
        assert_eq!(ctx.registers.b, a_before);

        ctx.registers.b = b_before.clone();
        ctx.apply_deferred(DeferredCommand::SwapChannels);
        assert_eq!(ctx.registers.a, b_before);
        assert_eq!(ctx.registers.b, a_before);
    }
}
