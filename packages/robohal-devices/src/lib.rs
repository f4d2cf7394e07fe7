//! Device drivers for robohal.
//!
//! # Overview
//!
//! This crate provides the GPIO capability devices are built on and the drivers for the
//! peripherals attached to the board:
//!
//! - [`gpio`]: digital lines, addressed by BCM number.
//! - [`drv8833`]: the DRV8833 dual H-bridge motor driver, which draws its PWM channels from a
//!   shared [`PwmEngine`](robohal_pwm::PwmEngine).
//!
//! Drivers are generic over their backends, so the same code runs on a Raspberry Pi (with the
//! `rpi` feature) and against the in-memory backends of the `mock` feature.

pub mod drv8833;
pub mod gpio;

pub use drv8833::{Drv8833, Drv8833Config, Drv8833Pins, Motor, MotorError};
pub use gpio::{GpioBackend, GpioError, LogicLevel};
