//! Estimated-wait formulas (§4.4 "Estimated wait").

use overlay_models::JobState;

/// `completed`/`failed` => 0; `processing` => `max(avg - elapsed, avg * 0.1)`;
/// `pending` => `queuePositionAhead * avg`.
pub fn estimated_wait_ms(status: JobState, avg_duration_ms: u64, elapsed_ms: i64, queue_position_ahead: u32) -> i64 {
    match status {
        JobState::Completed | JobState::Failed => 0,
        JobState::Processing => {
            let remaining = avg_duration_ms as i64 - elapsed_ms;
            let floor = (avg_duration_ms as f64 * 0.1) as i64;
            remaining.max(floor)
        }
        JobState::Pending => queue_position_ahead as i64 * avg_duration_ms as i64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states_have_zero_wait() {
        assert_eq!(estimated_wait_ms(JobState::Completed, 120_000, 0, 0), 0);
        assert_eq!(estimated_wait_ms(JobState::Failed, 120_000, 999_999, 0), 0);
    }

    #[test]
    fn processing_wait_is_remaining_time_floored_at_ten_percent() {
        let wait = estimated_wait_ms(JobState::Processing, 100_000, 40_000, 0);
        assert_eq!(wait, 60_000);

        // Past the average entirely: clamps to the 10% floor, never negative.
        let wait = estimated_wait_ms(JobState::Processing, 100_000, 500_000, 0);
        assert_eq!(wait, 10_000);
    }

    #[test]
    fn pending_wait_scales_with_queue_position() {
        assert_eq!(estimated_wait_ms(JobState::Pending, 100_000, 0, 0), 0);
        assert_eq!(estimated_wait_ms(JobState::Pending, 100_000, 0, 3), 300_000);
    }
}
