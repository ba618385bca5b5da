//! `stimtool simulate`: a TCP stand-in for the whole device, built
//! directly on `stim-firmware::Foreground` so it runs the exact same
//! engine/address-map/persistence code the real firmware would.
//! Modeled on the reference host tool's `simulate` subcommand (a
//! `TcpListener` accepting one client at a time, looping read-or-tick
//! until disconnect), minus the bootloader/flash-session half of that
//! subcommand, which has no counterpart in this protocol.

use std::io::{Read, Write};
use std::time::{Duration, Instant};

use stim_firmware::{AdcRead, DacWrite, Foreground, PulseHardware, Watchdog};
use stim_persist::MockStore;

/// ~4 ms, matching the engine's tick cadence (spec §4.3).
const TICK_PERIOD: Duration = Duration::from_millis(4);

#[derive(clap::Args, Debug)]
pub struct SimulateOpts {
    #[arg(default_value = "127.0.0.1:8455")]
    bind: String,
}

/// Stand-in for the out-of-scope H-bridge/DAC/ADC/watchdog collaborators.
/// Knobs and level pots stay centered; nothing here is observable over
/// the wire except through the register/config addresses `Foreground`
/// already exposes.
struct NullHardware;

impl PulseHardware for NullHardware {
    fn set_pins_a(&mut self, _pins: pulse_gen::Pins) {}
    fn set_pins_b(&mut self, _pins: pulse_gen::Pins) {}
    fn reprogram_compare_a(&mut self, _duration_us: u16) {}
    fn reprogram_compare_b(&mut self, _duration_us: u16) {}
}

impl DacWrite for NullHardware {
    type Error = core::convert::Infallible;

    fn write(&mut self, _code_a: u16, _code_b: u16) -> nb::Result<(), Self::Error> {
        Ok(())
    }
}

impl AdcRead for NullHardware {
    type Error = core::convert::Infallible;

    fn read_knob(&mut self) -> nb::Result<u16, Self::Error> {
        Ok(512)
    }
    fn read_level_a(&mut self) -> nb::Result<u16, Self::Error> {
        Ok(512)
    }
    fn read_level_b(&mut self) -> nb::Result<u16, Self::Error> {
        Ok(512)
    }
    fn read_audio_a(&mut self) -> nb::Result<u16, Self::Error> {
        Ok(0)
    }
    fn read_audio_b(&mut self) -> nb::Result<u16, Self::Error> {
        Ok(0)
    }
    fn read_battery(&mut self) -> nb::Result<u16, Self::Error> {
        Ok(1023)
    }
}

impl Watchdog for NullHardware {
    fn feed(&mut self) {}
}

impl crate::ToolRun for SimulateOpts {
    fn run(&self) -> anyhow::Result<()> {
        let listener = std::net::TcpListener::bind(&self.bind)?;
        println!("Listening on {}.", self.bind);

        loop {
            let (stream, addr) = listener.accept()?;
            println!("Connected to {}.", addr);
            stream.set_read_timeout(Some(Duration::from_millis(1)))?;

            if let Err(e) = self.serve(stream) {
                println!("Disconnected from {addr}: {e}");
            } else {
                println!("Disconnected from {addr}.");
            }
        }
    }
}

impl SimulateOpts {
    fn serve(&self, mut stream: std::net::TcpStream) -> anyhow::Result<()> {
        let store: MockStore<512> = MockStore::new();
        let mut foreground = Foreground::new(0xC0FE, store);
        let mut hw = NullHardware;
        let mut last_tick = Instant::now();
        let mut buf = [0u8; 256];

        loop {
            match stream.read(&mut buf) {
                Ok(0) => return Ok(()),
                Ok(n) => {
                    for &byte in &buf[..n] {
                        if let Some(reply) = foreground.handle_serial_byte(byte) {
                            stream.write_all(&reply)?;
                            stream.flush()?;
                        }
                    }
                }
                Err(e) if matches!(e.kind(), std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock) => {}
                Err(e) => return Err(e.into()),
            }

            if last_tick.elapsed() >= TICK_PERIOD {
                last_tick = Instant::now();
                foreground
                    .run_pass(&mut hw)
                    .map_err(|e| anyhow::anyhow!("hardware collaborator error: {e}"))?;
            }
        }
    }
}
