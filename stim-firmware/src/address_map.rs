//! Virtual address-space dispatch (spec §6). `stim-protocol` owns the
//! layout constants; this is the one place that owns the channel
//! registers, the live config mirrors, and the persistent store all at
//! once, so it's the one place that can actually resolve an address to
//! a value.
//!
//! RAM writes to the channel-block ranges and the knob/advanced-slab
//! addresses take effect immediately (spec §8 property 13: a write is
//! visible to an immediately following read, before the next tick).
//! Writes that imply a mode change (the box-command register, or a
//! direct write to the current-mode address) do not mutate the engine
//! directly — they only arm the single-slot deferred-command mailbox,
//! which the foreground applies at the top of its next pass, same as
//! spec §5's ordering guarantee requires for any asynchronous mode
//! request.

use mode_dispatch::{DeferredCommand, EngineContext};
use stim_persist::{PersistentStore, PowerLevel, SystemConfig};
use stim_protocol::address::{
    AddressRegion, ADDR_ADVANCED_BASE, ADDR_ADVANCED_END, ADDR_BOX_COMMAND, ADDR_BOX_MODEL,
    ADDR_CHANNEL_A_BASE, ADDR_CHANNEL_A_END, ADDR_CHANNEL_B_BASE, ADDR_CHANNEL_B_END,
    ADDR_CURRENT_LEVEL_A, ADDR_CURRENT_LEVEL_B, ADDR_CURRENT_MODE, ADDR_FW_VERSION_MAJOR,
    ADDR_FW_VERSION_MINOR, ADDR_FW_VERSION_PATCH, ADDR_KNOB, ADDR_POWER_LEVEL, RAM_BASE,
    STORE_BASE,
};
use stim_protocol::{mode_from_wire, mode_to_wire, BoxCommand};

/// Identifies this firmware to a host querying the read-only region.
/// The original device's exact byte value isn't load-bearing for
/// anything spec §8 tests; picked to be stable and nonzero.
pub const BOX_MODEL: u8 = 0x01;
pub const FW_VERSION_MAJOR: u8 = 0;
pub const FW_VERSION_MINOR: u8 = 1;
pub const FW_VERSION_PATCH: u8 = 0;

fn box_command_to_deferred(cmd: BoxCommand) -> DeferredCommand {
    match cmd {
        BoxCommand::ReloadMode | BoxCommand::RefreshMode => DeferredCommand::Reload,
        BoxCommand::NextMode => DeferredCommand::Next,
        BoxCommand::PrevMode => DeferredCommand::Prev,
        BoxCommand::PauseMute => DeferredCommand::Pause,
        BoxCommand::SwapChannels => DeferredCommand::SwapChannels,
        BoxCommand::CopyAToB => DeferredCommand::CopyAToB,
        BoxCommand::CopyBToA => DeferredCommand::CopyBToA,
        BoxCommand::StartRamp => DeferredCommand::StartRamp,
    }
}

/// Live mirrors and scratch storage the address map needs that don't
/// belong to any one of `chan-block`/`mode-dispatch`/`stim-persist`.
#[derive(Default)]
pub struct AddressMap {
    /// Out-of-range-and-unnamed-RAM scratch byte (spec §7).
    scratch: u8,
    /// Audio/level-pot telemetry the foreground refreshes from the ADC
    /// each pass; out of scope beyond being readable over serial.
    level_a: u8,
    level_b: u8,
    /// Armed by a box-command or current-mode write; drained by the
    /// foreground's top-of-pass step.
    pending: DeferredCommand,
}

impl AddressMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take and clear the pending deferred command (last-write-wins).
    pub fn take_pending(&mut self) -> DeferredCommand {
        core::mem::take(&mut self.pending)
    }

    pub fn set_levels(&mut self, level_a: u8, level_b: u8) {
        self.level_a = level_a;
        self.level_b = level_b;
    }

    pub fn read<S: PersistentStore>(
        &self,
        ctx: &EngineContext,
        config: &SystemConfig,
        power_level: PowerLevel,
        store: &mut S,
        addr: u16,
    ) -> u8 {
        match AddressRegion::of(addr) {
            AddressRegion::ReadOnly => match addr {
                ADDR_BOX_MODEL => BOX_MODEL,
                ADDR_FW_VERSION_MAJOR => FW_VERSION_MAJOR,
                ADDR_FW_VERSION_MINOR => FW_VERSION_MINOR,
                ADDR_FW_VERSION_PATCH => FW_VERSION_PATCH,
                _ => 0,
            },
            AddressRegion::Ram => self.read_ram(ctx, config, power_level, addr),
            AddressRegion::Store => {
                let mut buf = [0u8; 1];
                store.read(addr - STORE_BASE, &mut buf);
                buf[0]
            }
            AddressRegion::Unmapped => self.scratch,
        }
    }

    fn read_ram(&self, ctx: &EngineContext, _config: &SystemConfig, power_level: PowerLevel, addr: u16) -> u8 {
        if (ADDR_CHANNEL_A_BASE..ADDR_CHANNEL_A_END).contains(&addr)
            || (ADDR_CHANNEL_B_BASE..ADDR_CHANNEL_B_END).contains(&addr)
        {
            return ctx.registers.read(addr - RAM_BASE);
        }
        if (ADDR_ADVANCED_BASE..ADDR_ADVANCED_END).contains(&addr) {
            return read_advanced_byte(ctx, (addr - ADDR_ADVANCED_BASE) as u8);
        }
        match addr {
            ADDR_KNOB => ctx.knob,
            ADDR_CURRENT_MODE => mode_to_wire(ctx.current_mode.index()),
            ADDR_CURRENT_LEVEL_A => self.level_a,
            ADDR_CURRENT_LEVEL_B => self.level_b,
            ADDR_POWER_LEVEL => power_level.to_byte(),
            ADDR_BOX_COMMAND => self.scratch, // write-only register
            _ => self.scratch,
        }
    }

    pub fn write<S: PersistentStore>(
        &mut self,
        ctx: &mut EngineContext,
        power_level: &mut PowerLevel,
        store: &mut S,
        addr: u16,
        value: u8,
    ) {
        match AddressRegion::of(addr) {
            AddressRegion::ReadOnly => {}
            AddressRegion::Ram => self.write_ram(ctx, power_level, addr, value),
            AddressRegion::Store => store.write(addr - STORE_BASE, &[value]),
            AddressRegion::Unmapped => self.scratch = value,
        }
    }

    fn write_ram(&mut self, ctx: &mut EngineContext, power_level: &mut PowerLevel, addr: u16, value: u8) {
        if (ADDR_CHANNEL_A_BASE..ADDR_CHANNEL_A_END).contains(&addr)
            || (ADDR_CHANNEL_B_BASE..ADDR_CHANNEL_B_END).contains(&addr)
        {
            ctx.registers.write(addr - RAM_BASE, value);
            return;
        }
        if (ADDR_ADVANCED_BASE..ADDR_ADVANCED_END).contains(&addr) {
            write_advanced_byte(ctx, (addr - ADDR_ADVANCED_BASE) as u8, value);
            return;
        }
        match addr {
            ADDR_KNOB => ctx.knob = value,
            ADDR_CURRENT_MODE => self.pending = DeferredCommand::SetMode(mode_from_wire(value)),
            ADDR_CURRENT_LEVEL_A => self.level_a = value,
            ADDR_CURRENT_LEVEL_B => self.level_b = value,
            ADDR_POWER_LEVEL => *power_level = PowerLevel::from_byte(value),
            ADDR_BOX_COMMAND => {
                if let Some(cmd) = BoxCommand::from_byte(value) {
                    self.pending = box_command_to_deferred(cmd);
                }
            }
            _ => self.scratch = value,
        }
    }
}

fn read_advanced_byte(ctx: &EngineContext, offset: u8) -> u8 {
    let a = &ctx.advanced;
    match offset {
        0 => a.ramp_level,
        1 => a.ramp_time,
        2 => a.depth,
        3 => a.tempo,
        4 => a.frequency,
        5 => a.effect,
        6 => a.width,
        7 => a.pace,
        _ => 0,
    }
}

fn write_advanced_byte(ctx: &mut EngineContext, offset: u8, value: u8) {
    let a = &mut ctx.advanced;
    match offset {
        0 => a.ramp_level = value,
        1 => a.ramp_time = value,
        2 => a.depth = value,
        3 => a.tempo = value,
        4 => a.frequency = value,
        5 => a.effect = value,
        6 => a.width = value,
        7 => a.pace = value,
        _ => {}
    }
}
