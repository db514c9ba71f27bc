//! Pausable session timer.
//!
//! Counts only the time the process spends within tolerance of the set
//! point. While the temperature is out of tolerance the clock is frozen: the
//! gap is booked as stopped time and subtracted from wall-clock time, so the
//! session stretches through any excursion (lid opened, grain added).

use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PausableTimer {
    target_ms: u64,
    tolerance: f64,
    running_ms: u64,
    /// Session start plus every completed pause.
    total_stopped_ms: u64,
    pause_started_ms: Option<u64>,
    started: bool,
    elapsed: bool,
}

impl PausableTimer {
    /// Create a stopped timer for `target_ms` of in-tolerance time.
    pub fn new(target_ms: u64, tolerance: f64) -> Self {
        Self {
            target_ms,
            tolerance: tolerance.abs(),
            running_ms: 0,
            total_stopped_ms: 0,
            pause_started_ms: None,
            started: false,
            elapsed: false,
        }
    }

    /// Arm the timer at `now_ms`.
    pub fn start(&mut self, now_ms: u64) {
        self.total_stopped_ms = now_ms;
        self.running_ms = 0;
        self.pause_started_ms = None;
        self.started = true;
        self.elapsed = false;
    }

    /// Forget the session; the timer must be started again.
    pub fn reset(&mut self) {
        let target_ms = self.target_ms;
        let tolerance = self.tolerance;
        *self = Self::new(target_ms, tolerance);
    }

    /// Whether `process_value` is close enough to `set_point` for the clock to run.
    pub fn within_tolerance(&self, set_point: f64, process_value: f64) -> bool {
        (set_point - process_value).abs() <= self.tolerance
    }

    /// Update running time.
    ///
    /// With `verify_temperature` off the clock always runs. Otherwise it runs
    /// only while `|set_point - process_value| <= tolerance` and pauses when
    /// outside.
    pub fn refresh(
        &mut self,
        now_ms: u64,
        set_point: f64,
        process_value: f64,
        verify_temperature: bool,
    ) {
        if !self.started || self.elapsed {
            return;
        }
        if !verify_temperature || self.within_tolerance(set_point, process_value) {
            self.run(now_ms);
        } else {
            self.pause(now_ms);
        }
    }

    /// Freeze the clock at `now_ms` (no-op when already paused).
    pub fn pause(&mut self, now_ms: u64) {
        if !self.started || self.elapsed || self.pause_started_ms.is_some() {
            return;
        }
        debug!(now_ms, running_ms = self.running_ms, "timer paused");
        self.pause_started_ms = Some(now_ms);
    }

    fn run(&mut self, now_ms: u64) {
        if let Some(paused_at) = self.pause_started_ms.take() {
            let gap = now_ms.saturating_sub(paused_at);
            self.total_stopped_ms += gap;
            debug!(now_ms, gap_ms = gap, "timer resumed");
        }
        self.running_ms = now_ms
            .saturating_sub(self.total_stopped_ms)
            .min(self.target_ms);
        if self.running_ms >= self.target_ms {
            self.elapsed = true;
        }
    }

    pub fn running_ms(&self) -> u64 {
        self.running_ms
    }

    pub fn remaining_ms(&self) -> u64 {
        self.target_ms.saturating_sub(self.running_ms)
    }

    pub fn target_ms(&self) -> u64 {
        self.target_ms
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn is_paused(&self) -> bool {
        self.pause_started_ms.is_some()
    }

    pub fn is_elapsed(&self) -> bool {
        self.elapsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_wall_time_while_in_tolerance() {
        let mut timer = PausableTimer::new(60_000, 2.0);
        timer.start(1_000);
        for now in (1_000..=31_000).step_by(100) {
            timer.refresh(now, 68.0, 67.0, true);
        }
        assert_eq!(timer.running_ms(), 30_000);
        assert_eq!(timer.remaining_ms(), 30_000);
        assert!(!timer.is_paused());
    }

    #[test]
    fn excursion_is_subtracted() {
        let mut timer = PausableTimer::new(3_600_000, 2.0);
        timer.start(0);
        let mut now = 0;
        while now < 20_000 {
            timer.refresh(now, 68.0, 68.0, true);
            now += 1;
        }
        while now < 30_000 {
            timer.refresh(now, 68.0, 60.0, true);
            now += 1;
        }
        assert!(timer.is_paused());
        assert_eq!(timer.running_ms(), 19_999);
        while now <= 50_000 {
            timer.refresh(now, 68.0, 68.0, true);
            now += 1;
        }
        assert_eq!(timer.running_ms(), 50_000 - 10_000);
    }

    #[test]
    fn pause_start_recorded_once() {
        let mut timer = PausableTimer::new(100_000, 1.0);
        timer.start(0);
        timer.refresh(1_000, 68.0, 68.0, true);
        timer.refresh(2_000, 68.0, 50.0, true);
        timer.refresh(5_000, 68.0, 50.0, true);
        timer.refresh(7_000, 68.0, 68.0, true);
        // Paused from 2 s to 7 s.
        assert_eq!(timer.running_ms(), 2_000);
    }

    #[test]
    fn unverified_refresh_always_counts() {
        let mut timer = PausableTimer::new(100_000, 1.0);
        timer.start(0);
        timer.refresh(5_000, 68.0, 10.0, false);
        assert_eq!(timer.running_ms(), 5_000);
    }

    #[test]
    fn clamps_at_target_and_latches_elapsed() {
        let mut timer = PausableTimer::new(10_000, 2.0);
        timer.start(0);
        timer.refresh(9_999, 68.0, 68.0, true);
        assert!(!timer.is_elapsed());
        timer.refresh(12_000, 68.0, 68.0, true);
        assert!(timer.is_elapsed());
        assert_eq!(timer.running_ms(), 10_000);
        assert_eq!(timer.remaining_ms(), 0);
        timer.refresh(20_000, 68.0, 68.0, true);
        assert_eq!(timer.running_ms(), 10_000);
    }

    #[test]
    fn explicit_pause_then_resume() {
        let mut timer = PausableTimer::new(100_000, 2.0);
        timer.start(0);
        timer.refresh(1_000, 68.0, 68.0, true);
        timer.pause(1_000);
        timer.pause(3_000);
        timer.refresh(4_000, 68.0, 68.0, true);
        assert_eq!(timer.running_ms(), 1_000);
    }

    #[test]
    fn not_started_does_nothing() {
        let mut timer = PausableTimer::new(1_000, 2.0);
        timer.refresh(5_000, 68.0, 68.0, true);
        assert_eq!(timer.running_ms(), 0);
        assert!(!timer.is_elapsed());
        timer.start(5_000);
        timer.refresh(5_500, 68.0, 68.0, true);
        assert_eq!(timer.running_ms(), 500);
        timer.reset();
        assert!(!timer.is_started());
        assert_eq!(timer.target_ms(), 1_000);
    }
}
