//! Firmware entry point.
//!
//! All embedded code lives in [`app`] and only builds for the ARM target;
//! on the host this binary is an empty stub so `cargo test` can build the
//! whole package. The testable logic is in the library crate.

#![cfg_attr(target_arch = "arm", no_std)]
#![cfg_attr(target_arch = "arm", no_main)]

#[cfg(target_arch = "arm")]
mod app;

#[cfg(not(target_arch = "arm"))]
fn main() {
    // Host builds have nothing to run; see the library tests.
}
