//! Compiled-in configuration constants.
//!
//! There is no runtime configuration: pulse widths, cycle periods, timeouts
//! and bus speed are all fixed at build time. Timing values are expressed in
//! plain integers (milliseconds / microseconds) so this module stays free of
//! embedded dependencies and usable from host tests; the binary wraps them in
//! `embassy_time::Duration` at the call sites.

// =============================================================================
// Ranging Cycle
// =============================================================================

/// Width of the trigger pulse driven onto the ranging output, in milliseconds.
pub const TRIGGER_PULSE_MS: u64 = 1;

/// Idle time between trigger pulses, in milliseconds. Together with the pulse
/// width this sets the ~100 ms ranging cadence.
pub const TRIGGER_IDLE_MS: u64 = 100;

/// How long the measurement task waits for each echo edge timestamp before
/// giving up on the current cycle, in milliseconds.
pub const ECHO_EDGE_TIMEOUT_MS: u64 = 100;

// =============================================================================
// Signaling
// =============================================================================

/// Capacity of the echo edge timestamp FIFO. Two entries per cycle at a
/// ~100 ms cadence, so 10 gives generous slack before edges are dropped.
pub const EDGE_QUEUE_DEPTH: usize = 10;

/// Capacity of the distance result channel.
pub const DISTANCE_QUEUE_DEPTH: usize = 10;

// =============================================================================
// Display Task
// =============================================================================

/// How long the display task waits for the "result ready" signal before
/// rendering the failure screen, in milliseconds.
pub const SIGNAL_TIMEOUT_MS: u64 = 100;

/// How long the display task waits for a distance value after the signal has
/// fired, in milliseconds.
pub const DISTANCE_TIMEOUT_MS: u64 = 100;

/// Settle time after pushing a frame to the panel, in milliseconds.
pub const RENDER_SETTLE_MS: u64 = 100;

// =============================================================================
// Display Bus
// =============================================================================

/// SPI clock frequency for the SSD1306, in Hz.
pub const DISPLAY_SPI_HZ: u32 = 2_000_000;

/// Upper bound on a single DMA page transfer before it is reported as a
/// stalled transfer instead of waited on forever, in milliseconds. A full
/// 128-byte page at 2 MHz is ~0.5 ms on the wire.
pub const DMA_TRANSFER_TIMEOUT_MS: u64 = 10;
