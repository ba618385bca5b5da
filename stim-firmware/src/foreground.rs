//! The foreground loop (spec §2, §5): one `run_pass` per ~4 ms engine
//! tick. Owns both `ChannelBlock`s (via `EngineContext`), the live
//! config mirrors, the serial session, and the persistent-store
//! collaborator; everything reachable from a serial read/write lives
//! here, since `stim-protocol`/`stim-persist`/`mode-dispatch` each only
//! own a slice of it.
//!
//! `run_pass` is paced by its caller at the engine's tick rate and
//! calls `tick()` unconditionally once per pass; any finer-grained
//! scheduling (a board whose main loop runs faster than 250 Hz and
//! rate-limits its own calls here) is left to the out-of-scope
//! timer/ISR wiring.

use core::cell::RefCell;

use chan_block::Group;
use critical_section::Mutex;
use mode_dispatch::{compute_output, DeferredCommand, EngineContext, Mode, PowerLevel as EnginePowerLevel};
use param_engine::AdvancedSettings as EngineAdvanced;
use pulse_gen::{Pins, ShortChannel, WideChannel};
use stim_persist::{AdvancedSettings as PersistAdvanced, PersistentStore, PowerLevel, SystemConfig};
use stim_protocol::DeviceReply;

use crate::address_map::AddressMap;
use crate::error::{Error, Result};
use crate::hardware::{AdcRead, DacWrite, PulseHardware, Watchdog};
use crate::session::{SerialSession, SessionEvent};

fn to_engine_advanced(a: PersistAdvanced) -> EngineAdvanced {
    EngineAdvanced {
        ramp_level: a.ramp_level,
        ramp_time: a.ramp_time,
        depth: a.depth,
        tempo: a.tempo,
        frequency: a.frequency,
        effect: a.effect,
        width: a.width,
        pace: a.pace,
    }
}

fn to_persist_advanced(a: EngineAdvanced) -> PersistAdvanced {
    PersistAdvanced {
        ramp_level: a.ramp_level,
        ramp_time: a.ramp_time,
        depth: a.depth,
        tempo: a.tempo,
        frequency: a.frequency,
        effect: a.effect,
        width: a.width,
        pace: a.pace,
    }
}

fn to_engine_power(p: PowerLevel) -> EnginePowerLevel {
    match p {
        PowerLevel::Low => EnginePowerLevel::Low,
        PowerLevel::Normal => EnginePowerLevel::Normal,
        PowerLevel::High => EnginePowerLevel::High,
    }
}

/// Raw 10-bit ADC readings are halved down to the engine's 8-bit
/// source-resolution scale by dropping the low two bits, the natural
/// fit for a 10-bit-ADC-to-8-bit-register-field boundary.
fn adc_to_byte(raw: u16) -> u8 {
    (raw.min(1023) >> 2) as u8
}

/// Foreground state for one device: both channels' live engine state,
/// the persisted configuration, the serial session, and the two pulse
/// channels' shared cells (spec §5's critical-section discipline — an
/// ISR servicing `on_compare` would reach into the same cells this
/// struct holds).
pub struct Foreground<S: PersistentStore> {
    pub ctx: EngineContext,
    pub config: SystemConfig,
    pub power_level: PowerLevel,
    address_map: AddressMap,
    session: SerialSession,
    ramp_percent: u8,
    ramp_active: bool,
    pulse_a: Mutex<RefCell<WideChannel>>,
    pulse_b: Mutex<RefCell<ShortChannel>>,
    store: S,
}

impl<S: PersistentStore> Foreground<S> {
    /// Boot sequence: load config (falling back to defaults on
    /// integrity failure, per spec §4.7), enter the saved mode, and
    /// seed each channel's base intensity/frequency/width from the
    /// saved per-channel levels.
    pub fn new(seed: u16, mut store: S) -> Self {
        let config = stim_persist::load(&mut store);
        let (split_a, split_b) = stim_persist::load_split(&mut store);

        let mut ctx = EngineContext::new(seed);
        ctx.knob = config.knob;
        ctx.advanced = to_engine_advanced(config.advanced);
        ctx.split_mode_a = Mode::from_index(split_a).unwrap_or(Mode::Waves);
        ctx.split_mode_b = Mode::from_index(split_b).unwrap_or(Mode::Waves);

        let mode = Mode::from_index(config.mode).unwrap_or(Mode::Waves);
        ctx.mode_entry(mode);
        config.apply_base(chan_block::Channel::A, &mut ctx.registers.a);
        config.apply_base(chan_block::Channel::B, &mut ctx.registers.b);

        if let Some(slot) = mode.user_module_slot() {
            if let Some(payload) = stim_persist::load_user_module(&mut store, slot) {
                ctx.run_custom_bytecode(&payload);
            }
        }

        Self {
            power_level: config.power_level,
            config,
            ctx,
            address_map: AddressMap::new(),
            session: SerialSession::new(seed ^ 0xA55A),
            ramp_percent: 100,
            ramp_active: false,
            pulse_a: Mutex::new(RefCell::new(WideChannel::new())),
            pulse_b: Mutex::new(RefCell::new(ShortChannel::new())),
            store,
        }
    }

    /// If the current mode is one of User1-7, load its stored bytecode
    /// slot and run it once against both channel blocks. A missing or
    /// invalid slot leaves the channel blocks at whatever `mode_entry`
    /// already set (module 1's no-op), per §4.7's local-recovery policy.
    fn load_user_module_for_current_mode(&mut self) {
        if let Some(slot) = self.ctx.current_mode.user_module_slot() {
            if let Some(payload) = stim_persist::load_user_module(&mut self.store, slot) {
                self.ctx.run_custom_bytecode(&payload);
            }
        }
    }

    fn advance_ramp(&mut self) {
        if self.ctx.ramp_requested {
            self.ctx.ramp_requested = false;
            self.ramp_active = true;
            self.ramp_percent = 0;
        }
        if self.ramp_active {
            self.ramp_percent = self.ramp_percent.saturating_add(1).min(100);
            if self.ramp_percent == 100 {
                self.ramp_active = false;
            }
        }
    }

    /// One ~4 ms pass: feed the watchdog, apply any pending deferred
    /// command, read the analog inputs, tick the engine, derive each
    /// channel's output, and submit it to the pulse channels and DAC.
    pub fn run_pass<H>(&mut self, hw: &mut H) -> Result<()>
    where
        H: PulseHardware + Watchdog,
        H: DacWrite,
        H: AdcRead,
        <H as DacWrite>::Error: core::fmt::Debug,
        <H as AdcRead>::Error: core::fmt::Debug,
    {
        hw.feed();

        let pending = self.address_map.take_pending();
        let enters_mode = matches!(
            pending,
            DeferredCommand::SetMode(_) | DeferredCommand::Next | DeferredCommand::Prev | DeferredCommand::Reload
        );
        self.ctx.apply_deferred(pending);
        if enters_mode {
            self.load_user_module_for_current_mode();
        }

        let knob_adc = nb::block!(hw.read_knob()).map_err(Error::wrap)?.min(1023);
        self.ctx.knob = adc_to_byte(knob_adc);

        let level_a = adc_to_byte(nb::block!(hw.read_level_a()).map_err(Error::wrap)?);
        let level_b = adc_to_byte(nb::block!(hw.read_level_b()).map_err(Error::wrap)?);
        self.address_map.set_levels(level_a, level_b);

        self.advance_ramp();
        self.ctx.tick();

        if matches!(self.ctx.current_mode, Mode::Audio1 | Mode::Audio2 | Mode::Audio3) {
            let audio_a = adc_to_byte(nb::block!(hw.read_audio_a()).map_err(Error::wrap)?);
            let audio_b = adc_to_byte(nb::block!(hw.read_audio_b()).map_err(Error::wrap)?);
            self.ctx.registers.a.group_mut(Group::Intensity).set_value(audio_a);
            self.ctx.registers.b.group_mut(Group::Intensity).set_value(audio_b);
        }

        let global_enabled = !self.ctx.paused;
        let power = to_engine_power(self.power_level);
        let out_a = compute_output(&self.ctx.registers.a, self.ramp_percent, knob_adc, power, global_enabled);
        let out_b = compute_output(&self.ctx.registers.b, self.ramp_percent, knob_adc, power, global_enabled);

        let pins_a = critical_section::with(|cs| {
            let mut channel = self.pulse_a.borrow_ref_mut(cs);
            let pins = channel.set_gate(out_a.gate_on);
            let _ = channel.submit(out_a.width_us, out_a.period_us);
            pins
        });
        let pins_b = critical_section::with(|cs| {
            let mut channel = self.pulse_b.borrow_ref_mut(cs);
            let pins = channel.set_gate(out_b.gate_on);
            let _ = channel.submit(out_b.width_us, out_b.period_us);
            pins
        });
        hw.set_pins_a(pins_a);
        hw.set_pins_b(pins_b);

        nb::block!(hw.write(out_a.dac_code, out_b.dac_code)).map_err(Error::wrap)?;

        Ok(())
    }

    /// Feed one raw (still-encrypted) byte received over the serial
    /// line. Returns the reply bytes to transmit, if the byte completed
    /// a frame. The out-of-scope UART transport decides when and how
    /// often this is called.
    pub fn handle_serial_byte(&mut self, raw: u8) -> Option<heapless::Vec<u8, 3>> {
        let event = self.session.receive_byte(raw)?;
        let reply = match event {
            SessionEvent::Reply(reply) => reply,
            SessionEvent::Read { addr } => {
                let value = self.address_map.read(&self.ctx, &self.config, self.power_level, &mut self.store, addr);
                DeviceReply::ReadAck { value }
            }
            SessionEvent::Write { addr, data } => {
                for (i, &byte) in data.iter().enumerate() {
                    self.address_map.write(&mut self.ctx, &mut self.power_level, &mut self.store, addr + i as u16, byte);
                }
                DeviceReply::Ack
            }
        };
        Some(reply.to_bytes())
    }

    /// Snapshot live state into `config` and write it (and the split
    /// selections) back to the store. Called on an explicit save
    /// request (menu or serial), never automatically.
    pub fn save_config(&mut self) {
        self.config.mode = self.ctx.current_mode.index();
        self.config.power_level = self.power_level;
        self.config.knob = self.ctx.knob;
        self.config.advanced = to_persist_advanced(self.ctx.advanced);
        self.config.split_mode_a = self.ctx.split_mode_a.index();
        self.config.split_mode_b = self.ctx.split_mode_b.index();
        stim_persist::save(&mut self.store, &self.config);
        stim_persist::save_split(&mut self.store, self.config.split_mode_a, self.config.split_mode_b);
    }
}
