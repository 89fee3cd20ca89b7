//! Queue state (§3 "Queue state"): pending FIFO, currently-processing pointer, duration
//! ring buffer, worker generation, circuit breaker.

use std::collections::VecDeque;
use std::time::Instant;

use overlay_models::JobId;

/// Default rolling-average duration before any job has completed (2 minutes).
pub const DEFAULT_AVG_DURATION_MS: u64 = 120_000;
/// Rolling average never drops below this fraction of the default.
pub const AVG_FLOOR_RATIO: f64 = 0.25;
/// Bounded ring of recent successful durations.
pub const DURATION_SAMPLES_CAP: usize = 20;
/// Supervisor's stall timeout floor, regardless of how fast the rolling average is.
pub const MIN_STALLED_JOB_TIMEOUT_MS: u64 = 3 * 60_000;
/// Supervisor timeout is `avgDuration * STALL_MULTIPLIER`, floored at the minimum above.
pub const STALL_MULTIPLIER: u64 = 4;
/// Consecutive stalls before the circuit breaker opens.
pub const DEFAULT_STALL_THRESHOLD: u32 = 2;
/// Circuit breaker cooldown before it closes automatically.
pub const DEFAULT_BREAKER_COOLDOWN_MS: u64 = 60_000;

#[derive(Debug)]
pub struct QueueState {
    pub pending: VecDeque<JobId>,
    pub currently_processing: Option<JobId>,
    durations_ms: VecDeque<u64>,
    pub generation: u64,
    pub breaker_open_at: Option<Instant>,
    pub consecutive_stalls: u32,
    stall_threshold: u32,
    breaker_cooldown_ms: u64,
}

impl QueueState {
    pub fn new(stall_threshold: u32, breaker_cooldown_ms: u64) -> Self {
        Self {
            pending: VecDeque::new(),
            currently_processing: None,
            durations_ms: VecDeque::new(),
            generation: 0,
            breaker_open_at: None,
            consecutive_stalls: 0,
            stall_threshold,
            breaker_cooldown_ms,
        }
    }

    /// Rolling average duration in ms, floored at 25% of the 2-minute default.
    pub fn average_duration_ms(&self) -> u64 {
        let floor = (DEFAULT_AVG_DURATION_MS as f64 * AVG_FLOOR_RATIO) as u64;
        if self.durations_ms.is_empty() {
            return DEFAULT_AVG_DURATION_MS.max(floor);
        }
        let sum: u64 = self.durations_ms.iter().sum();
        let avg = sum / self.durations_ms.len() as u64;
        avg.max(floor)
    }

    pub fn record_duration(&mut self, duration_ms: u64) {
        self.durations_ms.push_back(duration_ms);
        if self.durations_ms.len() > DURATION_SAMPLES_CAP {
            self.durations_ms.pop_front();
        }
    }

    /// `timeout = max(avgDuration * 4, 3 minutes)`, per §4.5.
    pub fn stall_timeout_ms(&self) -> u64 {
        (self.average_duration_ms() * STALL_MULTIPLIER).max(MIN_STALLED_JOB_TIMEOUT_MS)
    }

    pub fn is_breaker_open(&self) -> bool {
        match self.breaker_open_at {
            Some(opened_at) => opened_at.elapsed().as_millis() < self.breaker_cooldown_ms as u128,
            None => false,
        }
    }

    /// Records a stall, bumping the generation to fence the presumed-dead worker and
    /// opening the breaker once `stall_threshold` consecutive stalls accumulate.
    pub fn record_stall(&mut self) {
        self.consecutive_stalls += 1;
        self.generation += 1;
        if self.consecutive_stalls >= self.stall_threshold {
            self.breaker_open_at = Some(Instant::now());
        }
    }

    /// A successful job unconditionally resets both the stall counter and the breaker.
    pub fn record_success(&mut self, duration_ms: u64) {
        self.consecutive_stalls = 0;
        self.breaker_open_at = None;
        self.record_duration(duration_ms);
    }

    /// Index in the pending sequence plus one if a job is currently processing.
    pub fn queue_position_ahead(&self, id: &JobId) -> u32 {
        let ahead_in_pending = self.pending.iter().position(|p| p == id).unwrap_or(0) as u32;
        let processing_offset = if self.currently_processing.is_some() { 1 } else { 0 };
        ahead_in_pending + processing_offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn average_duration_defaults_to_two_minutes_when_no_samples() {
        let state = QueueState::new(2, 60_000);
        assert_eq!(state.average_duration_ms(), DEFAULT_AVG_DURATION_MS);
    }

    #[test]
    fn average_duration_never_drops_below_floor() {
        let mut state = QueueState::new(2, 60_000);
        state.record_duration(1);
        state.record_duration(1);
        let floor = (DEFAULT_AVG_DURATION_MS as f64 * AVG_FLOOR_RATIO) as u64;
        assert_eq!(state.average_duration_ms(), floor);
    }

    #[test]
    fn duration_samples_ring_buffer_caps_at_twenty() {
        let mut state = QueueState::new(2, 60_000);
        for i in 1..=25u64 {
            state.record_duration(i * 1000);
        }
        assert_eq!(state.durations_ms.len(), DURATION_SAMPLES_CAP);
        // Oldest five samples (1000..5000) should have been evicted.
        assert!(!state.durations_ms.contains(&1000));
        assert!(state.durations_ms.contains(&25000));
    }

    #[test]
    fn stall_timeout_is_floored_at_three_minutes() {
        let state = QueueState::new(2, 60_000);
        assert_eq!(state.stall_timeout_ms(), MIN_STALLED_JOB_TIMEOUT_MS);
    }

    #[test]
    fn stall_timeout_scales_with_average_once_it_exceeds_floor() {
        let mut state = QueueState::new(2, 60_000);
        for _ in 0..5 {
            state.record_duration(100_000);
        }
        assert_eq!(state.stall_timeout_ms(), 400_000);
    }

    #[test]
    fn breaker_opens_after_threshold_consecutive_stalls() {
        let mut state = QueueState::new(2, 60_000);
        assert!(!state.is_breaker_open());
        state.record_stall();
        assert!(!state.is_breaker_open());
        state.record_stall();
        assert!(state.is_breaker_open());
    }

    #[test]
    fn generation_bumps_on_every_stall() {
        let mut state = QueueState::new(2, 60_000);
        assert_eq!(state.generation, 0);
        state.record_stall();
        assert_eq!(state.generation, 1);
        state.record_stall();
        assert_eq!(state.generation, 2);
    }

    #[test]
    fn success_resets_counter_and_breaker_unconditionally() {
        let mut state = QueueState::new(2, 60_000);
        state.record_stall();
        state.record_stall();
        assert!(state.is_breaker_open());
        state.record_success(5_000);
        assert_eq!(state.consecutive_stalls, 0);
        assert!(!state.is_breaker_open());
    }

    #[test]
    fn queue_position_accounts_for_in_flight_job() {
        let mut state = QueueState::new(2, 60_000);
        let a = JobId::new();
        let b = JobId::new();
        state.currently_processing = Some(JobId::new());
        state.pending.push_back(a.clone());
        state.pending.push_back(b.clone());
        assert_eq!(state.queue_position_ahead(&a), 1);
        assert_eq!(state.queue_position_ahead(&b), 2);
    }
}
