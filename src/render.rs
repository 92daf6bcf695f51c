//! Screen rendering for the two display states.
//!
//! The display task shows exactly one of two screens per iteration:
//! - **Reading**: a label, the distance formatted to two decimals with a
//!   `cm` unit, and a horizontal bar twice the distance in pixels.
//! - **Failure**: the "Sensor Failed" message shown when no measurement
//!   arrived within the wait window.
//!
//! Rendering is pure frame manipulation (no hardware, no time), so the same
//! input always produces a byte-identical frame.

use core::fmt::Write;

use embedded_graphics::mono_font::MonoTextStyle;
use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::{Line, PrimitiveStyle};
use embedded_graphics::text::{Baseline, Text};
use profont::PROFONT_7_POINT;

use crate::framebuffer::Framebuffer;

/// Label shown above the distance value.
pub const DISTANCE_LABEL: &str = "Distance:";

/// Message shown when no echo was measured in time.
pub const FAILURE_TEXT: &str = "Sensor Failed";

/// Row of the proportional distance bar.
pub const BAR_ROW: i32 = 20;

/// Vertical offset of the value line below the label.
const VALUE_ROW: i32 = 10;

fn text_style() -> MonoTextStyle<'static, BinaryColor> {
    MonoTextStyle::new(&PROFONT_7_POINT, BinaryColor::On)
}

/// Format a distance as e.g. `"10.00 cm"`.
pub fn format_distance(distance_cm: f32) -> heapless::String<16> {
    let mut s = heapless::String::new();
    // Cannot overflow 16 bytes for any physically plausible reading.
    let _ = write!(s, "{distance_cm:.2} cm");
    s
}

/// X coordinate of the bar's right end: twice the distance in pixels,
/// truncated. The drawing surface clips anything past the panel edge.
pub fn bar_end_x(distance_cm: f32) -> i32 {
    (distance_cm * 2.0) as i32
}

/// Render the reading screen into `frame`.
pub fn draw_reading(frame: &mut Framebuffer, distance_cm: f32) {
    frame.clear_buffer();
    let style = text_style();
    Text::with_baseline(DISTANCE_LABEL, Point::zero(), style, Baseline::Top)
        .draw(frame)
        .ok();
    Text::with_baseline(
        &format_distance(distance_cm),
        Point::new(0, VALUE_ROW),
        style,
        Baseline::Top,
    )
    .draw(frame)
    .ok();
    Line::new(
        Point::new(0, BAR_ROW),
        Point::new(bar_end_x(distance_cm), BAR_ROW),
    )
    .into_styled(PrimitiveStyle::with_stroke(BinaryColor::On, 1))
    .draw(frame)
    .ok();
}

/// Render the failure screen into `frame`.
pub fn draw_failure(frame: &mut Framebuffer) {
    frame.clear_buffer();
    Text::with_baseline(FAILURE_TEXT, Point::zero(), text_style(), Baseline::Top)
        .draw(frame)
        .ok();
}
