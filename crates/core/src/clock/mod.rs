use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::{Result, TrafficJamError};

/// Pulses per quarter note of a standard MIDI clock.
pub const DEFAULT_PPQ: u32 = 24;

/// Transport position as seen by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClockPosition {
    pub ticks: u64,
    pub elapsed_ms: f64,
    pub bpm: f64,
}

impl ClockPosition {
    /// Position at `ticks` with the elapsed time derived from a constant
    /// tempo.
    pub fn at_tick(ticks: u64, bpm: f64, ppq: u32) -> Self {
        Self {
            ticks,
            elapsed_ms: ticks as f64 * tick_length_ms(bpm, ppq),
            bpm,
        }
    }

    /// Whether the tempo can be used to convert between ticks and time.
    pub fn has_tempo(&self) -> bool {
        is_valid_bpm(self.bpm)
    }
}

fn is_valid_bpm(bpm: f64) -> bool {
    bpm.is_finite() && bpm > 0.0
}

/// Length of one clock pulse in milliseconds.
pub fn tick_length_ms(bpm: f64, ppq: u32) -> f64 {
    60_000.0 / (bpm * f64::from(ppq.max(1)))
}

/// Converts a wall-clock offset into (fractional) ticks at `bpm`.
pub fn ms_to_ticks(ms: f64, bpm: f64, ppq: u32) -> f64 {
    ms * bpm * f64::from(ppq.max(1)) / 60_000.0
}

/// Source of the current transport position.
pub trait ClockAdapter {
    fn current_position(&self) -> ClockPosition;
}

impl ClockAdapter for ClockPosition {
    fn current_position(&self) -> ClockPosition {
        *self
    }
}

/// Transport manipulation requested by a control on the surface. The core
/// only reports these; whoever owns the clock applies them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportCommand {
    /// Start a paused clock or pause a running one.
    Toggle,
    /// Jump back to tick 0 and pause.
    Reset,
    Forward(u64),
    Rewind(u64),
}

/// Free-running clock that advances one pulse per tick period while
/// unlocked.
#[derive(Debug, Clone)]
pub struct InternalClock {
    bpm: f64,
    ppq: u32,
    ticks: u64,
    elapsed_ms: f64,
    locked: bool,
    next_due: Option<Instant>,
}

impl InternalClock {
    pub fn new(bpm: f64, ppq: u32, locked: bool) -> Result<Self> {
        if !is_valid_bpm(bpm) {
            return Err(TrafficJamError::config("clock", format!("invalid tempo {bpm}")));
        }
        Ok(Self {
            bpm,
            ppq: ppq.max(1),
            ticks: 0,
            elapsed_ms: 0.0,
            locked,
            next_due: None,
        })
    }

    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    pub fn ppq(&self) -> u32 {
        self.ppq
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn lock(&mut self) {
        self.locked = true;
    }

    pub fn unlock(&mut self) {
        self.locked = false;
    }

    pub fn toggle_lock(&mut self) {
        self.locked = !self.locked;
    }

    /// Changes the tempo. Ticks already elapsed keep the duration they had.
    pub fn set_bpm(&mut self, bpm: f64) {
        if is_valid_bpm(bpm) {
            self.bpm = bpm;
        }
    }

    pub fn tick_length(&self) -> Duration {
        Duration::from_secs_f64(tick_length_ms(self.bpm, self.ppq) / 1000.0)
    }

    /// Advances one pulse unless the clock is locked.
    pub fn tick(&mut self) {
        if self.locked {
            return;
        }
        self.ticks += 1;
        self.elapsed_ms += tick_length_ms(self.bpm, self.ppq);
    }

    /// Moves the playhead by `step` pulses without waiting for them.
    /// Rewinding stops at tick 0.
    pub fn warp(&mut self, step: u64, reverse: bool) {
        let target = if reverse {
            self.ticks.saturating_sub(step)
        } else {
            self.ticks.saturating_add(step)
        };
        self.seek(target);
    }

    /// Moves the playhead to `ticks`. Elapsed time shifts by the skipped
    /// pulses at the current tempo; tick 0 is always time 0.
    pub fn seek(&mut self, ticks: u64) {
        let delta = ticks as f64 - self.ticks as f64;
        self.elapsed_ms = if ticks == 0 {
            0.0
        } else {
            (self.elapsed_ms + delta * tick_length_ms(self.bpm, self.ppq)).max(0.0)
        };
        self.ticks = ticks;
    }

    pub fn apply(&mut self, command: TransportCommand) {
        match command {
            TransportCommand::Toggle => self.toggle_lock(),
            TransportCommand::Reset => {
                self.lock();
                self.seek(0);
            }
            TransportCommand::Forward(step) => self.warp(step, false),
            TransportCommand::Rewind(step) => self.warp(step, true),
        }
        tracing::debug!(
            ?command,
            ticks = self.ticks,
            locked = self.locked,
            "transport command applied"
        );
    }

    /// Returns how long until the next pulse is due. When the pulse is due
    /// (or overdue) the clock ticks and `Duration::ZERO` is returned. A
    /// clock that falls behind drops the missed pulses and treats the next
    /// one as due immediately.
    pub fn poll(&mut self, now: Instant) -> Duration {
        let due = *self.next_due.get_or_insert(now);
        if now < due {
            return due - now;
        }

        self.tick();
        let next = due + self.tick_length();
        if now > next {
            tracing::warn!(
                late_ms = (now - next).as_secs_f64() * 1000.0,
                "clock running late, catching up"
            );
            self.next_due = Some(now);
            return Duration::ZERO;
        }
        self.next_due = Some(next);
        Duration::ZERO
    }
}

impl ClockAdapter for InternalClock {
    fn current_position(&self) -> ClockPosition {
        ClockPosition {
            ticks: self.ticks,
            elapsed_ms: self.elapsed_ms,
            bpm: self.bpm,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_time_to_ticks_at_tempo() {
        // 120 bpm, 24 ppq: one beat is 500ms and 24 ticks.
        assert!((tick_length_ms(120.0, 24) - 500.0 / 24.0).abs() < 1e-9);
        assert!((ms_to_ticks(1000.0, 120.0, 24) - 48.0).abs() < 1e-9);
        assert!((ms_to_ticks(1000.0, 60.0, 24) - 24.0).abs() < 1e-9);
    }

    #[test]
    fn locked_clock_does_not_advance() {
        let mut clock = InternalClock::new(120.0, 24, true).unwrap();
        clock.tick();
        assert_eq!(clock.ticks(), 0);

        clock.apply(TransportCommand::Toggle);
        clock.tick();
        clock.tick();
        assert_eq!(clock.ticks(), 2);
        assert!(!clock.is_locked());
    }

    #[test]
    fn elapsed_time_follows_tempo_changes() {
        let mut clock = InternalClock::new(120.0, 24, false).unwrap();
        for _ in 0..24 {
            clock.tick();
        }
        clock.set_bpm(60.0);
        for _ in 0..24 {
            clock.tick();
        }

        let position = clock.current_position();
        assert_eq!(position.ticks, 48);
        assert!((position.elapsed_ms - 1500.0).abs() < 1e-6);
        assert_eq!(position.bpm, 60.0);
    }

    #[test]
    fn rejects_nonsensical_tempo() {
        let mut clock = InternalClock::new(120.0, 24, false).unwrap();
        clock.set_bpm(0.0);
        clock.set_bpm(f64::NAN);
        assert_eq!(clock.bpm(), 120.0);
    }

    #[test]
    fn refuses_to_start_without_a_usable_tempo() {
        for bpm in [0.0, -90.0, f64::NAN, f64::INFINITY] {
            let err = InternalClock::new(bpm, 24, false).unwrap_err();
            assert!(err.is_configuration());
        }
    }

    #[test]
    fn warping_keeps_time_already_elapsed() {
        let mut clock = InternalClock::new(120.0, 24, false).unwrap();
        for _ in 0..24 {
            clock.tick();
        }
        clock.set_bpm(60.0);

        clock.apply(TransportCommand::Forward(24));
        assert!((clock.current_position().elapsed_ms - 1500.0).abs() < 1e-6);
        clock.apply(TransportCommand::Rewind(24));
        assert!((clock.current_position().elapsed_ms - 500.0).abs() < 1e-6);
        clock.apply(TransportCommand::Reset);
        assert_eq!(clock.current_position().elapsed_ms, 0.0);
    }

    #[test]
    fn warps_and_resets() {
        let mut clock = InternalClock::new(120.0, 24, false).unwrap();
        clock.apply(TransportCommand::Forward(50));
        assert_eq!(clock.ticks(), 50);
        clock.apply(TransportCommand::Rewind(80));
        assert_eq!(clock.ticks(), 0);
        clock.apply(TransportCommand::Forward(10));
        clock.apply(TransportCommand::Reset);
        assert_eq!(clock.ticks(), 0);
        assert!(clock.is_locked());
    }

    #[test]
    fn poll_ticks_when_due_and_waits_otherwise() {
        let mut clock = InternalClock::new(120.0, 24, false).unwrap();
        let start = Instant::now();

        assert_eq!(clock.poll(start), Duration::ZERO);
        assert_eq!(clock.ticks(), 1);

        let wait = clock.poll(start);
        assert!(wait > Duration::ZERO);
        assert_eq!(clock.ticks(), 1);

        assert_eq!(clock.poll(start + clock.tick_length()), Duration::ZERO);
        assert_eq!(clock.ticks(), 2);
    }

    #[test]
    fn poll_skips_ahead_when_late() {
        let mut clock = InternalClock::new(120.0, 24, false).unwrap();
        let start = Instant::now();
        clock.poll(start);

        let late = start + Duration::from_secs(1);
        assert_eq!(clock.poll(late), Duration::ZERO);
        assert_eq!(clock.ticks(), 2);

        // The missed pulses are dropped: one more pulse is due right away,
        // then the regular period resumes.
        assert_eq!(clock.poll(late), Duration::ZERO);
        assert_eq!(clock.ticks(), 3);
        assert!(clock.poll(late) > Duration::ZERO);
        assert_eq!(clock.ticks(), 3);
    }
}
