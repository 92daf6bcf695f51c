//! Time-of-flight to distance conversion and pulse cycle evaluation.
//!
//! The measurement task pops two echo edge timestamps per cycle (rising then
//! falling, both in microseconds since boot) and turns them into a distance
//! in centimeters. The pure decision logic lives here so it can be tested on
//! the host; the task loop in the binary only does the timed queue pops.

/// Speed of sound expressed as centimeters per microsecond (343 m/s).
pub const SOUND_CM_PER_US: f32 = 0.034;

/// Outcome of one ranging cycle, given the two timed timestamp pops.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CycleOutcome {
    /// Both edges observed: a distance in centimeters.
    Distance(f32),
    /// No rising edge within the window. The cycle is skipped and nothing
    /// is published.
    NoEcho,
    /// A rising edge arrived but its falling edge did not. The start
    /// timestamp is discarded and nothing is published.
    PairingLost,
}

/// Convert an echo pulse bounded by `start_us..end_us` into centimeters.
///
/// The echo line is high for the round-trip time of the ultrasonic burst,
/// hence the division by two. Timestamps come out of the edge FIFO in
/// capture order, so `end_us >= start_us` always holds.
pub fn distance_cm(start_us: u64, end_us: u64) -> f32 {
    debug_assert!(end_us >= start_us);
    (end_us - start_us) as f32 * SOUND_CM_PER_US / 2.0
}

/// Evaluate one cycle from the results of the two timed pops.
///
/// `None` models a pop that timed out.
pub fn evaluate_cycle(start_us: Option<u64>, end_us: Option<u64>) -> CycleOutcome {
    match (start_us, end_us) {
        (Some(start), Some(end)) => CycleOutcome::Distance(distance_cm(start, end)),
        (Some(_), None) => CycleOutcome::PairingLost,
        (None, _) => CycleOutcome::NoEcho,
    }
}
