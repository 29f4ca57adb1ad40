// THEORY:
// This file is the main entry point for the `strand_sim` library crate.
// It follows the standard Rust convention of using `lib.rs` to define the
// public API that will be exposed to external consumers (like a GUI shell
// or a test harness).
//
// The primary goal is to export the `Emulator` and its associated data
// structures (`EmulatorConfig`, `RateSample`, etc.) as the clean, high-level
// interface for the whole strip emulator, with `feeder` as the matching
// client side. The internal modules (`core_modules`) stay reachable for
// consumers that want to drive the decoder or the mapping directly.

pub mod core_modules;
pub mod emulator;
pub mod feeder;
