#![cfg_attr(not(feature = "std"), no_std)]

//! A five-phase biphasic pulse generator, driven one compare-match
//! event at a time.
//!
//! [`PulseChannel`] owns the interrupt-side state (active width/period,
//! current phase); the foreground submits new parameters with
//! [`PulseChannel::submit`], which are latched in at the start of the
//! next GAP phase, never mid-pulse. The caller (the firmware binary's
//! timer-compare interrupt handler) is responsible for calling
//! [`PulseChannel::on_compare`] on every compare match and reprogramming
//! the hardware compare register with the returned duration; this crate
//! has no knowledge of the actual timer peripheral.
//!
//! `MAX_COMPARE` is the widest single duration the backing timer's
//! compare register can hold. The wide channel uses `65535`; a
//! narrower (e.g. 8-bit) timer uses `255`, and [`PulseChannel`] will
//! split a GAP phase wider than that into consecutive segments.

/// Dead-time between a positive and negative half-pulse, in
/// microseconds. Both H-bridge legs are held low during this interval
/// to prevent shoot-through.
pub const DEADTIME_US: u16 = 4;

/// Minimum pulse half-width, in microseconds.
pub const WIDTH_MIN: u16 = 20;
/// Maximum pulse half-width, in microseconds.
pub const WIDTH_MAX: u16 = 255;
/// Minimum total period, in microseconds. Submissions below this are
/// rejected outright rather than clamped.
pub const PERIOD_MIN: u16 = 500;
/// Maximum total period, in microseconds.
pub const PERIOD_MAX: u16 = 65_535;

/// A submitted period was below the hard floor ([`PERIOD_MIN`]) and was
/// rejected outright. All other out-of-range values are clamped instead
/// of rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SubmissionRejected;

/// The five phases of one biphasic cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Phase {
    Positive,
    Deadtime1,
    Negative,
    Deadtime2,
    Gap,
}

/// The state of the two H-bridge legs for one channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Pins {
    pub p_plus: bool,
    pub p_minus: bool,
}

impl Pins {
    pub const LOW: Pins = Pins {
        p_plus: false,
        p_minus: false,
    };
    pub const POSITIVE: Pins = Pins {
        p_plus: true,
        p_minus: false,
    };
    pub const NEGATIVE: Pins = Pins {
        p_plus: false,
        p_minus: true,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Pending {
    width: u16,
    period: u16,
}

/// One channel's pulse state machine.
///
/// `MAX_COMPARE` bounds any single duration this channel's timer
/// compare register can hold; GAP phases wider than that are split into
/// segments of at most `MAX_COMPARE` microseconds.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PulseChannel<const MAX_COMPARE: u16> {
    phase: Phase,
    active_width: u16,
    active_period: u16,
    gap_remaining: u16,
    gate_on: bool,
    pending: Option<Pending>,
}

impl<const MAX_COMPARE: u16> Default for PulseChannel<MAX_COMPARE> {
    fn default() -> Self {
        Self {
            phase: Phase::Gap,
            active_width: WIDTH_MIN,
            active_period: PERIOD_MIN,
            gap_remaining: 0,
            gate_on: false,
            pending: None,
        }
    }
}

impl<const MAX_COMPARE: u16> PulseChannel<MAX_COMPARE> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Submit new (width, period) parameters from the foreground. These
    /// are latched in by the next GAP phase; an in-flight biphasic pair
    /// always completes with its original parameters. A second
    /// submission before the first is consumed overwrites it (last
    /// write wins).
    pub fn submit(&mut self, width_us: u16, period_us: u16) -> Result<(), SubmissionRejected> {
        if period_us < PERIOD_MIN {
            return Err(SubmissionRejected);
        }
        let width = width_us.clamp(WIDTH_MIN, WIDTH_MAX);
        let period = period_us.min(PERIOD_MAX);
        self.pending = Some(Pending { width, period });
        Ok(())
    }

    /// Set the gate. Turning the gate off immediately forces both
    /// H-bridge pins low (even mid-pulse) and holds the state machine
    /// in GAP until the gate is turned back on and a full GAP has
    /// elapsed. Turning the gate on does not itself start a pulse; the
    /// next compare match decides that once the current GAP (or
    /// GAP segment) elapses.
    pub fn set_gate(&mut self, on: bool) -> Pins {
        self.gate_on = on;
        if !on {
            self.phase = Phase::Gap;
            self.gap_remaining = 0;
            Pins::LOW
        } else {
            self.current_pins()
        }
    }

    pub fn gate_is_on(&self) -> bool {
        self.gate_on
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn active_width(&self) -> u16 {
        self.active_width
    }

    pub fn active_period(&self) -> u16 {
        self.active_period
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    fn current_pins(&self) -> Pins {
        match self.phase {
            Phase::Positive => Pins::POSITIVE,
            Phase::Negative => Pins::NEGATIVE,
            _ => Pins::LOW,
        }
    }

    fn compute_gap(&self) -> u16 {
        let used = 2 * self.active_width + 2 * DEADTIME_US;
        if self.active_period > used {
            self.active_period - used
        } else {
            // guarded invariant: never produce a negative gap
            DEADTIME_US
        }
    }

    fn gap_chunk(&mut self) -> (Pins, u16) {
        if self.gap_remaining > MAX_COMPARE {
            self.gap_remaining -= MAX_COMPARE;
            (Pins::LOW, MAX_COMPARE)
        } else {
            let d = self.gap_remaining;
            self.gap_remaining = 0;
            (Pins::LOW, d)
        }
    }

    /// Advance the state machine on a compare-match interrupt. Returns
    /// the pin state to drive immediately and the duration (in
    /// microseconds, capped at `MAX_COMPARE`) to reprogram the compare
    /// register with for the next match.
    pub fn on_compare(&mut self) -> (Pins, u16) {
        match self.phase {
            Phase::Positive => {
                self.phase = Phase::Deadtime1;
                (Pins::LOW, DEADTIME_US)
            }
            Phase::Deadtime1 => {
                self.phase = Phase::Negative;
                (Pins::NEGATIVE, self.active_width)
            }
            Phase::Negative => {
                self.phase = Phase::Deadtime2;
                (Pins::LOW, DEADTIME_US)
            }
            Phase::Deadtime2 => {
                // start of GAP: the one point where pending parameters
                // are latched in.
                if let Some(p) = self.pending.take() {
                    self.active_width = p.width;
                    self.active_period = p.period;
                }
                self.phase = Phase::Gap;
                self.gap_remaining = self.compute_gap();
                self.gap_chunk()
            }
            Phase::Gap => {
                if self.gap_remaining == 0 {
                    if self.gate_on {
                        self.phase = Phase::Positive;
                        (Pins::POSITIVE, self.active_width)
                    } else {
                        self.gap_remaining = self.compute_gap();
                        self.gap_chunk()
                    }
                } else {
                    self.gap_chunk()
                }
            }
        }
    }
}

/// The wide pulse channel: its timer can hold a full period in one
/// compare register, so GAP is never split.
pub type WideChannel = PulseChannel<{ PERIOD_MAX }>;

/// The short-counter channel: its timer's compare register is narrower
/// than a full period, so wide GAP phases are split into segments.
pub type ShortChannel = PulseChannel<255>;

#[cfg(test)]
mod test {
    use super::*;

    fn run_full_cycle<const M: u16>(ch: &mut PulseChannel<M>) -> (u16, u16, u16, u16) {
        // returns (deadtime1_dur, negative_dur, deadtime2_dur, positive_dur_of_next)
        // assumes ch.phase() == Phase::Positive on entry
        assert_eq!(ch.phase(), Phase::Positive);
        let (pins, d1) = ch.on_compare();
        assert_eq!(pins, Pins::LOW);
        assert_eq!(ch.phase(), Phase::Deadtime1);

        let (pins, neg_dur) = ch.on_compare();
        assert_eq!(pins, Pins::NEGATIVE);
        assert_eq!(ch.phase(), Phase::Negative);

        let (pins, d2) = ch.on_compare();
        assert_eq!(pins, Pins::LOW);
        assert_eq!(ch.phase(), Phase::Deadtime2);

        (d1, neg_dur, d2, 0)
    }

    fn drive_to_positive<const M: u16>(ch: &mut PulseChannel<M>) -> u16 {
        // drains Gap (possibly several segments) until phase becomes
        // Positive, returning the width used for that positive phase.
        loop {
            let (pins, dur) = ch.on_compare();
            if ch.phase() == Phase::Positive {
                assert_eq!(pins, Pins::POSITIVE);
                return dur;
            }
            assert_eq!(pins, Pins::LOW);
            let _ = dur;
        }
    }

    #[test]
    fn handoff_atomicity() {
        let mut ch: WideChannel = PulseChannel::new();
        ch.set_gate(true);
        ch.submit(30, 1000).unwrap();
        let pos_width = drive_to_positive(&mut ch);
        assert_eq!(pos_width, 30);

        // submit new params mid-pulse; must not affect this pair
        ch.submit(100, 2000).unwrap();
        let first_width = ch.active_width();
        let (d1, neg_dur, _d2, _) = run_full_cycle(&mut ch);
        assert_eq!(d1, DEADTIME_US);
        assert_eq!(neg_dur, first_width);
        assert_eq!(first_width, 30);

        // only now (entering gap) does the new submission take effect
        let next_width = drive_to_positive(&mut ch);
        assert_eq!(next_width, 100);
    }

    #[test]
    fn biphasic_balance() {
        let mut ch: WideChannel = PulseChannel::new();
        ch.set_gate(true);
        ch.submit(77, 900).unwrap();
        let pos_width = drive_to_positive(&mut ch);
        let (d1, neg_dur, d2, _) = run_full_cycle(&mut ch);
        assert_eq!(pos_width, neg_dur);
        assert_eq!(d1, DEADTIME_US);
        assert_eq!(d2, DEADTIME_US);
    }

    #[test]
    fn gate_off_is_tight() {
        let mut ch: WideChannel = PulseChannel::new();
        ch.set_gate(true);
        ch.submit(50, 1000).unwrap();
        drive_to_positive(&mut ch);

        let pins = ch.set_gate(false);
        assert_eq!(pins, Pins::LOW);
        assert_eq!(ch.phase(), Phase::Gap);

        // stays low no matter how many compare matches happen
        for _ in 0..20 {
            let (pins, _) = ch.on_compare();
            assert_eq!(pins, Pins::LOW);
        }

        ch.set_gate(true);
        // re-enabling the gate fires the pulse as soon as the current
        // gap segment ends, with no extra full gap required
        let (pins, _) = ch.on_compare();
        assert_eq!(pins, Pins::POSITIVE);
        assert_eq!(ch.phase(), Phase::Positive);
    }

    #[test]
    fn submission_rejected_below_floor() {
        let mut ch: WideChannel = PulseChannel::new();
        assert_eq!(ch.submit(50, PERIOD_MIN - 1), Err(SubmissionRejected));
        assert!(!ch.has_pending());
        assert_eq!(ch.submit(50, PERIOD_MIN), Ok(()));
        assert!(ch.has_pending());
    }

    #[test]
    fn width_and_period_are_clamped_not_rejected() {
        let mut ch: WideChannel = PulseChannel::new();
        ch.submit(5, 10_000).unwrap();
        ch.set_gate(true);
        let w = drive_to_positive(&mut ch);
        assert_eq!(w, WIDTH_MIN);
    }

    #[test]
    fn minimum_gap_guard_never_negative() {
        let mut ch: WideChannel = PulseChannel::new();
        // period smaller than 2*width + 2*deadtime after clamping
        ch.submit(255, PERIOD_MIN).unwrap();
        ch.set_gate(true);
        drive_to_positive(&mut ch);
        // run the rest of cycle; gap segment must be >= DEADTIME_US
        let (_, _, _, _) = run_full_cycle(&mut ch);
        assert!(ch.gap_remaining >= DEADTIME_US || ch.gap_remaining == 0);
    }

    #[test]
    fn short_channel_splits_gap() {
        let mut ch: ShortChannel = PulseChannel::new();
        ch.submit(20, 60_000).unwrap();
        ch.set_gate(true);
        let mut segments = 0;
        loop {
            let (pins, dur) = ch.on_compare();
            if ch.phase() == Phase::Positive {
                break;
            }
            assert_eq!(pins, Pins::LOW);
            assert!(dur <= 255);
            segments += 1;
            if segments > 1000 {
                panic!("gap never finished splitting");
            }
        }
        assert!(segments > 1, "a 60ms gap on an 8-bit timer must split");
    }
}
