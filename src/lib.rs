//! Rangefinder library - testable modules for the ultrasonic rangefinder.
//!
//! This library contains the core logic that can be tested on the host
//! machine: distance conversion, the page-addressed framebuffer, screen
//! rendering, and the SSD1306 wire protocol (driven against a mock
//! interface). The binary (`main.rs`) uses this library and adds the
//! embedded-specific code: embassy tasks, GPIO/SPI wiring and the real
//! display interface.
//!
//! # Testing
//!
//! Run tests on the host with plain `cargo test` (the binary builds as an
//! empty stub off-target). Tests run with `std` enabled (via `cfg_attr`),
//! allowing use of the standard test framework while the actual firmware
//! runs as `no_std`.

// Use no_std only when NOT testing (tests need std for the test harness)
#![cfg_attr(not(test), no_std)]
// Crate-level lints
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_sign_loss)]

// Configuration
pub mod config;

// Measurement pipeline logic
pub mod measurement;

// Rendering
pub mod framebuffer;
pub mod render;

// Display driver (hardware access behind `ssd1306::DisplayInterface`)
pub mod ssd1306;
