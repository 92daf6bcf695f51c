//! Ultrasonic Rangefinder Firmware for Raspberry Pi Pico (RP2040)
//!
//! Ranges with an HC-SR04 ultrasonic sensor and shows the distance (or a
//! failure message) on a 128x32 SSD1306 OLED over SPI.
//!
//! # Architecture
//!
//! Four embassy tasks share one [`SensorPipeline`]:
//! - Trigger task: drives the ranging pulse (1 ms high, 100 ms idle)
//! - Echo capture task: woken by the echo GPIO interrupt, timestamps each
//!   edge and pushes it into the edge FIFO without blocking
//! - Measurement task: pairs two timestamps into a distance, raises the
//!   ready signal and publishes the value
//! - Display task: waits on the signal with a timeout and renders either
//!   the reading or the failure screen, flushing pages via DMA
//!
//! # Pin map
//!
//! - HC-SR04: TRIG=GPIO16, ECHO=GPIO18 (interrupt on both edges)
//! - SSD1306 on SPI0: CLK=GPIO2, MOSI=GPIO3, CS=GPIO5, DC=GPIO6, RST=GPIO7

// Re-export testable modules from library for local use
// (These are defined in lib.rs with host-testable code)
mod config {
    pub use rangefinder_pico::config::*;
}
mod framebuffer {
    pub use rangefinder_pico::framebuffer::*;
}
mod measurement {
    pub use rangefinder_pico::measurement::*;
}
mod render {
    pub use rangefinder_pico::render::*;
}
mod ssd1306 {
    pub use rangefinder_pico::ssd1306::*;
}

use core::sync::atomic::{AtomicBool, Ordering};

use defmt::{Debug2Format, debug, info, warn};
use embassy_executor::Spawner;
use embassy_rp::gpio::{Input, Level, Output, Pull};
use embassy_rp::peripherals::SPI0;
use embassy_rp::spi::{self, Async, Spi};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;
use embassy_time::{Duration, Instant, Timer, with_timeout};
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use self::config::{
    DISPLAY_SPI_HZ,
    DISTANCE_QUEUE_DEPTH,
    DISTANCE_TIMEOUT_MS,
    DMA_TRANSFER_TIMEOUT_MS,
    ECHO_EDGE_TIMEOUT_MS,
    EDGE_QUEUE_DEPTH,
    RENDER_SETTLE_MS,
    SIGNAL_TIMEOUT_MS,
    TRIGGER_IDLE_MS,
    TRIGGER_PULSE_MS,
};
use self::framebuffer::{Framebuffer, PAGES};
use self::measurement::CycleOutcome;
use self::ssd1306::{DisplayError, DisplayInterface, Mode, Ssd1306};

// =============================================================================
// Sensor Pipeline
// =============================================================================

/// Shared handles connecting the sensing side to the display side.
///
/// Built exactly once in `main` and handed to every task as a `&'static`
/// reference; no ambient globals. All cross-task communication goes through
/// these handles, never through raw shared memory.
struct SensorPipeline {
    /// One-slot "fresh result available" signal.
    ready: Signal<CriticalSectionRawMutex, ()>,
    /// Echo edge timestamps in microseconds since boot, capture order.
    edges: Channel<CriticalSectionRawMutex, u64, EDGE_QUEUE_DEPTH>,
    /// Published distance measurements in centimeters.
    distances: Channel<CriticalSectionRawMutex, f32, DISTANCE_QUEUE_DEPTH>,
    /// Wind-down flag, observed after every bounded suspension.
    stop: AtomicBool,
}

impl SensorPipeline {
    const fn new() -> Self {
        Self {
            ready: Signal::new(),
            edges: Channel::new(),
            distances: Channel::new(),
            stop: AtomicBool::new(false),
        }
    }

    /// Ask all task loops to wind down. The production composition never
    /// calls this; the firmware runs until power-off.
    #[allow(dead_code)]
    fn request_stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    fn stopping(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }
}

// =============================================================================
// Sensing Tasks
// =============================================================================

/// Drive the ranging output: 1 ms high, then idle for the rest of the cycle.
#[embassy_executor::task]
async fn trigger_task(pipeline: &'static SensorPipeline, mut trigger: Output<'static>) {
    info!("Trigger task started");

    loop {
        trigger.set_high();
        Timer::after_millis(TRIGGER_PULSE_MS).await;
        trigger.set_low();
        Timer::after_millis(TRIGGER_IDLE_MS).await;

        if pipeline.stopping() {
            break;
        }
    }
}

/// Timestamp every edge on the echo input.
///
/// The GPIO interrupt only wakes this future; the timestamp is taken
/// immediately on wake and the enqueue is non-blocking, so nothing in the
/// interrupt path ever waits. A full queue drops the edge (logged).
#[embassy_executor::task]
async fn echo_capture_task(pipeline: &'static SensorPipeline, mut echo: Input<'static>) {
    info!("Echo capture task started");

    loop {
        echo.wait_for_any_edge().await;
        let timestamp_us = Instant::now().as_micros();
        if pipeline.edges.try_send(timestamp_us).is_err() {
            warn!("edge queue full, dropping timestamp");
        }

        if pipeline.stopping() {
            break;
        }
    }
}

/// Pair edge timestamps into distances and publish them.
///
/// Each cycle pops a start and an end timestamp with a bounded timeout. A
/// missing start means no echo: the cycle is skipped silently and the
/// display side times out on its own. A missing end discards the start; any
/// late falling edge left in the queue will then be paired as the next
/// cycle's start (behavior kept from the original firmware, see DESIGN.md).
#[embassy_executor::task]
async fn measurement_task(pipeline: &'static SensorPipeline) {
    info!("Measurement task started");
    let edge_timeout = Duration::from_millis(ECHO_EDGE_TIMEOUT_MS);

    loop {
        let start_us = with_timeout(edge_timeout, pipeline.edges.receive())
            .await
            .ok();
        let end_us = match start_us {
            Some(_) => with_timeout(edge_timeout, pipeline.edges.receive())
                .await
                .ok(),
            None => None,
        };

        match measurement::evaluate_cycle(start_us, end_us) {
            CycleOutcome::Distance(distance) => {
                debug!("measured {} cm", distance);
                pipeline.ready.signal(());
                if pipeline.distances.try_send(distance).is_err() {
                    warn!("distance queue full, dropping measurement");
                }
            }
            CycleOutcome::NoEcho => {}
            CycleOutcome::PairingLost => {
                warn!("echo end edge missed, discarding start timestamp");
            }
        }

        if pipeline.stopping() {
            break;
        }
    }
}

// =============================================================================
// Display
// =============================================================================

/// Real display interface: TX-only SPI0 with DMA plus the three control
/// lines. Select and reset are active-low on the panel; the DC mode line
/// is low for commands, high for data.
struct OledInterface {
    spi: Spi<'static, SPI0, Async>,
    dc: Output<'static>,
    cs: Output<'static>,
    rst: Output<'static>,
}

impl DisplayInterface for OledInterface {
    fn set_mode(&mut self, mode: Mode) {
        match mode {
            Mode::Command => self.dc.set_low(),
            Mode::Data => self.dc.set_high(),
        }
    }

    fn set_select(&mut self, selected: bool) {
        if selected {
            self.cs.set_low();
        } else {
            self.cs.set_high();
        }
    }

    fn set_reset(&mut self, active: bool) {
        if active {
            self.rst.set_low();
        } else {
            self.rst.set_high();
        }
    }

    fn write_blocking(&mut self, bytes: &[u8]) -> Result<(), DisplayError> {
        self.spi.blocking_write(bytes).map_err(|_| DisplayError::Bus)
    }

    async fn write_bulk(&mut self, bytes: &[u8]) -> Result<(), DisplayError> {
        // DMA transfer with a bounded wait: a transfer-complete that never
        // arrives is reported instead of stalling the display task forever.
        let timeout = Duration::from_millis(DMA_TRANSFER_TIMEOUT_MS);
        match with_timeout(timeout, self.spi.write(bytes)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err(DisplayError::Bus),
            Err(_) => Err(DisplayError::TransferTimeout),
        }
    }

    async fn delay_us(&mut self, us: u32) {
        Timer::after_micros(us as u64).await;
    }
}

/// Push every page of the frame to the panel. Flush errors are logged and
/// the task carries on; the next cycle repaints from scratch anyway.
async fn flush_frame(display: &mut Ssd1306<OledInterface>, frame: &Framebuffer) {
    for page in 0..PAGES {
        if let Err(e) = display.write_page(page as u8, 0, frame.page(page)).await {
            warn!("page {} flush failed: {}", page, Debug2Format(&e));
        }
    }
}

/// Rendering state machine: wait for a result with a timeout, then show
/// either the reading or the failure screen.
#[embassy_executor::task]
async fn display_task(pipeline: &'static SensorPipeline, iface: OledInterface) {
    info!("Display task started");

    let mut display = Ssd1306::new(iface);
    if let Err(e) = display.init().await {
        warn!("display bring-up failed: {}", Debug2Format(&e));
    }
    info!("Display initialized");

    let mut frame = Framebuffer::new();
    let signal_timeout = Duration::from_millis(SIGNAL_TIMEOUT_MS);
    let distance_timeout = Duration::from_millis(DISTANCE_TIMEOUT_MS);

    loop {
        match with_timeout(signal_timeout, pipeline.ready.wait()).await {
            Ok(()) => {
                // Signal fired: fetch the matching value. The producer raises
                // the signal before enqueueing, so tolerate a short wait here.
                if let Ok(distance) =
                    with_timeout(distance_timeout, pipeline.distances.receive()).await
                {
                    render::draw_reading(&mut frame, distance);
                    flush_frame(&mut display, &frame).await;
                    Timer::after_millis(RENDER_SETTLE_MS).await;
                }
                // Value missing despite the signal: no frame update this
                // iteration, the previous frame stays on the panel.
            }
            Err(_) => {
                render::draw_failure(&mut frame);
                flush_frame(&mut display, &frame).await;
                Timer::after_millis(RENDER_SETTLE_MS).await;
            }
        }

        if pipeline.stopping() {
            break;
        }
    }
}

// Program metadata for `picotool info`
#[unsafe(link_section = ".bi_entries")]
#[used]
pub static PICOTOOL_ENTRIES: [embassy_rp::binary_info::EntryAddr; 4] = [
    embassy_rp::binary_info::rp_program_name!(c"rangefinder"),
    embassy_rp::binary_info::rp_program_description!(
        c"HC-SR04 ultrasonic rangefinder with SSD1306 OLED readout"
    ),
    embassy_rp::binary_info::rp_cargo_version!(),
    embassy_rp::binary_info::rp_program_build_attribute!(),
];

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("Rangefinder starting...");
    let p = embassy_rp::init(Default::default());

    // HC-SR04 lines
    let trigger = Output::new(p.PIN_16, Level::Low);
    let echo = Input::new(p.PIN_18, Pull::None);

    // SSD1306 control lines, all idle: deselected, command mode, reset inactive
    let cs = Output::new(p.PIN_5, Level::High);
    let dc = Output::new(p.PIN_6, Level::Low);
    let rst = Output::new(p.PIN_7, Level::High);

    // TX-only SPI with DMA (the panel has no MISO)
    let mut spi_config = spi::Config::default();
    spi_config.frequency = DISPLAY_SPI_HZ;
    let spi = Spi::new_txonly(p.SPI0, p.PIN_2, p.PIN_3, p.DMA_CH0, spi_config);
    let iface = OledInterface { spi, dc, cs, rst };

    // Shared pipeline handles, built once and passed into every task
    static PIPELINE: StaticCell<SensorPipeline> = StaticCell::new();
    let pipeline: &'static SensorPipeline = PIPELINE.init(SensorPipeline::new());

    spawner.spawn(trigger_task(pipeline, trigger)).unwrap();
    spawner.spawn(echo_capture_task(pipeline, echo)).unwrap();
    spawner.spawn(measurement_task(pipeline)).unwrap();
    spawner.spawn(display_task(pipeline, iface)).unwrap();
    info!("Pipeline tasks spawned");
}
