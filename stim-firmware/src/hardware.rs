//! Collaborator traits the foreground and ISR sides depend on (spec
//! §6's "timer/IO contract required from the collaborator hardware
//! layer"). Concrete implementations are board-specific and out of
//! scope here: the DAC SPI transport, ADC sampling, and
//! persistent-store byte driver are left unspecified beyond the
//! interface they present.

use pulse_gen::Pins;

/// Drives the two channels' H-bridge gate pins from the pulse ISR side.
/// `reprogram_compare_*` reloads the hardware timer's compare register
/// with the next duration `on_compare` returned, in microseconds.
pub trait PulseHardware {
    fn set_pins_a(&mut self, pins: Pins);
    fn set_pins_b(&mut self, pins: Pins);
    fn reprogram_compare_a(&mut self, duration_us: u16);
    fn reprogram_compare_b(&mut self, duration_us: u16);
}

/// SPI send-16-bits to the two-channel 10-bit DAC. Foreground-exclusive
/// (spec §5's shared-resource policy); never touched by an ISR.
pub trait DacWrite {
    type Error;

    fn write(&mut self, code_a: u16, code_b: u16) -> nb::Result<(), Self::Error>;
}

/// The six ADC channels spec §6 requires: two level pots, one knob, two
/// audio inputs, one battery.
pub trait AdcRead {
    type Error;

    fn read_knob(&mut self) -> nb::Result<u16, Self::Error>;
    fn read_level_a(&mut self) -> nb::Result<u16, Self::Error>;
    fn read_level_b(&mut self) -> nb::Result<u16, Self::Error>;
    fn read_audio_a(&mut self) -> nb::Result<u16, Self::Error>;
    fn read_audio_b(&mut self) -> nb::Result<u16, Self::Error>;
    fn read_battery(&mut self) -> nb::Result<u16, Self::Error>;
}

/// Fed at the top of every foreground pass (spec §5's "feeds the
/// watchdog at the top of each pass"). A hardware fault that makes
/// `go()` return `Err` simply stops being fed, and the external
/// watchdog resets the device — spec §7's "unrecoverable hardware
/// faults are the collaborator's responsibility".
pub trait Watchdog {
    fn feed(&mut self);
}

/// Drives `PulseChannel::on_compare` against the hardware pins/timer for
/// one channel. Called from the chip-specific compare-match interrupt
/// handler, which is itself out of scope — this is what that handler
/// calls.
pub fn service_channel_a<H: PulseHardware, const MAX_COMPARE: u16>(
    channel: &mut pulse_gen::PulseChannel<MAX_COMPARE>,
    hw: &mut H,
) {
    let (pins, duration_us) = channel.on_compare();
    hw.set_pins_a(pins);
    hw.reprogram_compare_a(duration_us);
}

pub fn service_channel_b<H: PulseHardware, const MAX_COMPARE: u16>(
    channel: &mut pulse_gen::PulseChannel<MAX_COMPARE>,
    hw: &mut H,
) {
    let (pins, duration_us) = channel.on_compare();
    hw.set_pins_b(pins);
    hw.reprogram_compare_b(duration_us);
}

#[cfg(test)]
mod test {
    use super::*;
    use pulse_gen::WideChannel;

    #[derive(Default)]
    struct RecordingHardware {
        pins_a: Option<Pins>,
        compare_a: Option<u16>,
    }

    impl PulseHardware for RecordingHardware {
        fn set_pins_a(&mut self, pins: Pins) {
            self.pins_a = Some(pins);
        }
        fn set_pins_b(&mut self, _pins: Pins) {}
        fn reprogram_compare_a(&mut self, duration_us: u16) {
            self.compare_a = Some(duration_us);
        }
        fn reprogram_compare_b(&mut self, _duration_us: u16) {}
    }

    #[test]
    fn service_channel_a_applies_pins_and_reprograms_compare() {
        let mut channel: WideChannel = pulse_gen::PulseChannel::new();
        channel.submit(30, 1000).unwrap();
        channel.set_gate(true);
        let mut hw = RecordingHardware::default();

        // drains GAP until the channel enters Positive.
        loop {
            service_channel_a(&mut channel, &mut hw);
            if channel.phase() == pulse_gen::Phase::Positive {
                break;
            }
        }
        assert_eq!(hw.pins_a, Some(Pins::POSITIVE));
        assert_eq!(hw.compare_a, Some(30));
    }
}
