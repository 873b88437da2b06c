#![no_std]

// Control logic for the bidirectional DC-DC converter.
//
// This crate stays portable across the MCU firmware and host tooling by
// avoiding the Rust standard library. Peripherals are reached only through the
// traits in `hal`, so the same control cycle runs against real registers on
// the board and against simulated backends in the emulator and tests.

pub mod acquisition;
pub mod config;
pub mod control;
pub mod fault;
pub mod hal;
pub mod pins;
pub mod power_stage;
pub mod session;
pub mod status;
pub mod telemetry;
