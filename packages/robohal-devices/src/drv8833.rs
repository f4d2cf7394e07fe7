//! DRV8833 dual H-bridge motor driver.
//!
//! The DRV8833 drives two brushed DC motors. Each motor is controlled by two inputs (xIN1 and
//! xIN2), both fed with PWM, plus two shared lines: nSLEEP, which puts the chip into a low
//! power state when pulled low, and nFAULT, an open-drain output the chip pulls low on
//! over-current, over-temperature or under-voltage.
//!
//! # Truth Table
//!
//! | xIN1 | xIN2 | Motor State                       |
//! |------|------|-----------------------------------|
//! | 0    | 0    | Coast (outputs high-Z)            |
//! | PWM  | 0    | Forward, slow decay               |
//! | 0    | PWM  | Reverse, slow decay               |
//! | 1    | 1    | Brake (both outputs low)          |
//!
//! # Lifecycle
//!
//! A [`Drv8833`] is brought up in two steps, [`configure_gpio`](Drv8833::configure_gpio) and
//! then [`configure_pwm`](Drv8833::configure_pwm), and must be torn down with
//! [`cleanup`](Drv8833::cleanup) so its PWM channels are returned to the engine.
//!
//! ```
//! use robohal_devices::{
//!     drv8833::{Drv8833, Drv8833Config, Drv8833Pins, Motor},
//!     gpio::MockGpio,
//! };
//! use robohal_pwm::{mock::MockPwmBackend, PwmEngine};
//!
//! let engine = PwmEngine::new(MockPwmBackend::new(16)).into_shared();
//! engine.lock().initialize(1, 10.0)?;
//!
//! let pins = Drv8833Pins {
//!     ain1: 12,
//!     ain2: 13,
//!     bin1: 20,
//!     bin2: 21,
//!     sleep: 5,
//!     fault: 6,
//! };
//! let mut driver = Drv8833::new(engine.clone(), MockGpio::new(), Drv8833Config::new(pins))?;
//! driver.configure_gpio()?;
//! driver.configure_pwm()?;
//!
//! driver.set_motor_speed(Motor::A, 128)?;
//! driver.set_motor_speed(Motor::B, -255)?;
//!
//! driver.cleanup()?;
//! engine.lock().shutdown()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use core::{fmt, ops::RangeInclusive};
use std::collections::BTreeSet;

use robohal_core::BcmPin;
use robohal_pwm::{ChannelHandle, PwmBackend, PwmEngine, PwmError, SharedEngine};
use snafu::{ensure, OptionExt, Snafu};

use crate::gpio::{GpioBackend, GpioError, LogicLevel};

/// Speeds accepted by [`Drv8833::set_motor_speed`].
pub const SPEED_RANGE: RangeInclusive<i32> = -255..=255;

/// Converts a speed magnitude into a duty cycle in percent.
///
/// The mapping is linear: `0` is 0% and `255` (in either direction) is 100%.
#[must_use]
pub fn speed_to_duty(speed: i32) -> f32 {
    (speed.unsigned_abs().min(255) as f32 * 100.0) / 255.0
}

const LEG_NAMES: [&str; 4] = ["AIN1", "AIN2", "BIN1", "BIN2"];

/// One of the two motors driven by a DRV8833.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Motor {
    /// The motor on outputs AOUT1/AOUT2.
    A,
    /// The motor on outputs BOUT1/BOUT2.
    B,
}

impl Motor {
    const fn index(self) -> usize {
        match self {
            Self::A => 0,
            Self::B => 1,
        }
    }

    /// Indices of the (xIN1, xIN2) channels.
    const fn legs(self) -> (usize, usize) {
        match self {
            Self::A => (0, 1),
            Self::B => (2, 3),
        }
    }
}

/// BCM numbers of the lines a DRV8833 is wired to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Drv8833Pins {
    /// Motor A, input 1.
    pub ain1: u8,
    /// Motor A, input 2.
    pub ain2: u8,
    /// Motor B, input 1.
    pub bin1: u8,
    /// Motor B, input 2.
    pub bin2: u8,
    /// nSLEEP (active low).
    pub sleep: u8,
    /// nFAULT (active low, open drain).
    pub fault: u8,
}

/// Configuration of a [`Drv8833`].
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Drv8833Config {
    /// The lines the driver is wired to.
    pub pins: Drv8833Pins,
    /// PWM frequency of the four inputs.
    #[cfg_attr(feature = "serde", serde(default = "Drv8833Config::default_frequency"))]
    pub frequency_hz: f32,
}

impl Drv8833Config {
    /// PWM frequency used unless configured otherwise.
    pub const DEFAULT_FREQUENCY_HZ: f32 = 100.0;

    /// Creates a configuration running at [`Self::DEFAULT_FREQUENCY_HZ`].
    #[must_use]
    pub const fn new(pins: Drv8833Pins) -> Self {
        Self {
            pins,
            frequency_hz: Self::DEFAULT_FREQUENCY_HZ,
        }
    }

    /// Changes the PWM frequency.
    #[must_use]
    pub const fn with_frequency(mut self, frequency_hz: f32) -> Self {
        self.frequency_hz = frequency_hz;
        self
    }

    #[cfg(feature = "serde")]
    const fn default_frequency() -> f32 {
        Self::DEFAULT_FREQUENCY_HZ
    }
}

/// Lifecycle of a [`Drv8833`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    /// Constructed, nothing claimed yet.
    Uninitialized,
    /// nSLEEP and nFAULT are claimed.
    GpioConfigured,
    /// The four PWM channels are running.
    PwmConfigured,
    /// The driver has been torn down. It may still own PWM channels whose free failed.
    CleanedUp,
}

impl fmt::Display for ControllerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Uninitialized => "uninitialized",
            Self::GpioConfigured => "GPIO configured",
            Self::PwmConfigured => "PWM configured",
            Self::CleanedUp => "cleaned up",
        })
    }
}

#[derive(Debug, Snafu)]
/// Errors that can occur when using a DRV8833.
pub enum MotorError {
    /// The speed is outside of [`SPEED_RANGE`].
    #[snafu(display("motor speed {speed} is outside of -255..=255"))]
    InvalidSpeed {
        /// The rejected speed.
        speed: i32,
    },

    /// The driver configuration is invalid.
    #[snafu(display("invalid DRV8833 configuration: {reason}"))]
    InvalidArgument {
        /// What is wrong with the configuration.
        reason: String,
    },

    /// The driver has already been cleaned up.
    #[snafu(display("the DRV8833 has already been cleaned up"))]
    AlreadyCleanedUp,

    /// The operation is not available in the driver's current state.
    #[snafu(display("operation not available while the DRV8833 is {state}"))]
    InvalidState {
        /// The driver's state.
        state: ControllerState,
    },

    /// The driver is signalling a fault on nFAULT.
    #[snafu(display("the DRV8833 reports a fault"))]
    DriverFault,

    /// Generic PWM engine failure.
    #[snafu(display("{source}"), context(false))]
    Pwm {
        /// The source of the error.
        source: PwmError,
    },

    /// Generic GPIO failure.
    #[snafu(display("{source}"), context(false))]
    Gpio {
        /// The source of the error.
        source: GpioError,
    },
}

/// A DRV8833 dual H-bridge motor driver.
///
/// Several drivers can share one engine; the engine guarantees they never end up on the same
/// PWM pin.
#[derive(Debug)]
pub struct Drv8833<P, G> {
    engine: SharedEngine<P>,
    gpio: G,
    pwm_pins: [BcmPin; 4],
    sleep: BcmPin,
    fault: BcmPin,
    frequency_hz: f32,
    state: ControllerState,
    channels: Vec<ChannelHandle>,
    speeds: [Option<i32>; 2],
}

impl<P: PwmBackend, G: GpioBackend> Drv8833<P, G> {
    /// Creates a driver. Nothing is claimed until [`Self::configure_gpio`].
    ///
    /// # Errors
    ///
    /// Returns [`MotorError::InvalidArgument`] if a pin is not a header GPIO, two lines share a
    /// pin, or the frequency is not a finite, positive number.
    pub fn new(
        engine: SharedEngine<P>,
        gpio: G,
        config: Drv8833Config,
    ) -> Result<Self, MotorError> {
        let mut seen = BTreeSet::new();
        let mut pin = |name: &str, number: u8| -> Result<BcmPin, MotorError> {
            let pin = BcmPin::new(number).map_err(|err| MotorError::InvalidArgument {
                reason: format!("{name}: {err}"),
            })?;
            ensure!(
                seen.insert(pin),
                InvalidArgumentSnafu {
                    reason: format!("{name} shares {pin} with another line"),
                }
            );
            Ok(pin)
        };

        let pins = config.pins;
        let pwm_pins = [
            pin("AIN1", pins.ain1)?,
            pin("AIN2", pins.ain2)?,
            pin("BIN1", pins.bin1)?,
            pin("BIN2", pins.bin2)?,
        ];
        let sleep = pin("nSLEEP", pins.sleep)?;
        let fault = pin("nFAULT", pins.fault)?;

        ensure!(
            config.frequency_hz.is_finite() && config.frequency_hz > 0.0,
            InvalidArgumentSnafu {
                reason: format!("{}Hz is not a valid PWM frequency", config.frequency_hz),
            }
        );

        Ok(Self {
            engine,
            gpio,
            pwm_pins,
            sleep,
            fault,
            frequency_hz: config.frequency_hz,
            state: ControllerState::Uninitialized,
            channels: Vec::new(),
            speeds: [None; 2],
        })
    }

    fn require(&self, allowed: &[ControllerState]) -> Result<(), MotorError> {
        ensure!(
            self.state != ControllerState::CleanedUp,
            AlreadyCleanedUpSnafu
        );
        ensure!(
            allowed.contains(&self.state),
            InvalidStateSnafu { state: self.state }
        );
        Ok(())
    }

    /// Claims nSLEEP as an output (driven high, so the chip is awake) and nFAULT as an input
    /// with its pull-up enabled.
    ///
    /// # Errors
    ///
    /// - [`MotorError::InvalidState`] unless the driver is uninitialized.
    /// - [`MotorError::Gpio`] if a line cannot be claimed. Nothing stays claimed in that case.
    pub fn configure_gpio(&mut self) -> Result<(), MotorError> {
        self.require(&[ControllerState::Uninitialized])?;

        self.gpio.configure_output(self.sleep, LogicLevel::High)?;
        if let Err(err) = self.gpio.configure_input(self.fault) {
            if let Err(release) = self.gpio.release(self.sleep) {
                log::error!("failed to release nSLEEP ({}): {release}", self.sleep);
            }
            return Err(err.into());
        }

        self.state = ControllerState::GpioConfigured;
        log::debug!(
            "DRV8833 GPIO configured (nSLEEP {}, nFAULT {})",
            self.sleep,
            self.fault
        );
        Ok(())
    }

    /// Requests, configures (to 0%) and enables the four PWM channels.
    ///
    /// The engine stays locked for the whole sequence. If any step fails, every channel
    /// acquired so far is disabled and freed again and the driver stays GPIO configured.
    /// Channels that could not be freed during such a rollback are kept and freed first by
    /// the next call (or by [`Self::cleanup`]).
    ///
    /// # Errors
    ///
    /// - [`MotorError::InvalidState`] unless the GPIO lines are configured.
    /// - [`MotorError::Pwm`] with the error that interrupted the sequence, e.g.
    ///   [`PwmError::InvalidGpio`] if another driver already uses one of the pins.
    pub fn configure_pwm(&mut self) -> Result<(), MotorError> {
        self.require(&[ControllerState::GpioConfigured])?;

        let mut engine = self.engine.lock();
        free_all(&mut *engine, &mut self.channels)?;

        let mut acquired = Vec::with_capacity(self.pwm_pins.len());
        for (leg, pin) in self.pwm_pins.iter().enumerate() {
            if let Err(err) = acquire(&mut *engine, *pin, self.frequency_hz, &mut acquired) {
                log::warn!(
                    "configuring {} on {pin} failed ({err}), rolling back {} channel(s)",
                    LEG_NAMES[leg],
                    acquired.len()
                );
                acquired.reverse();
                self.channels = acquired;
                if let Err(rollback) = free_all(&mut *engine, &mut self.channels) {
                    log::error!(
                        "rollback left {} channel(s) allocated: {rollback}",
                        self.channels.len()
                    );
                }
                return Err(err.into());
            }
        }
        drop(engine);

        self.channels = acquired;
        self.speeds = [Some(0); 2];
        self.state = ControllerState::PwmConfigured;
        log::debug!("DRV8833 PWM configured at {}Hz", self.frequency_hz);
        Ok(())
    }

    fn channel(&self, leg: usize) -> Result<&ChannelHandle, MotorError> {
        self.channels
            .get(leg)
            .context(InvalidStateSnafu { state: self.state })
    }

    fn drive(
        &self,
        motor: Motor,
        first: (usize, f32),
        second: (usize, f32),
    ) -> Result<(), MotorError> {
        let mut engine = self.engine.lock();
        engine.set_duty_cycle(self.channel(first.0)?, first.1)?;
        engine.set_duty_cycle(self.channel(second.0)?, second.1)?;
        drop(engine);

        log::trace!(
            "motor {motor:?}: {}={}%, {}={}%",
            LEG_NAMES[first.0],
            first.1,
            LEG_NAMES[second.0],
            second.1
        );
        Ok(())
    }

    /// Sets a motor's speed and direction.
    ///
    /// Positive speeds drive xIN1 and negative speeds drive xIN2 with a duty cycle of
    /// [`speed_to_duty`]; the other input is held at 0% (slow decay). A speed of zero coasts.
    ///
    /// # Errors
    ///
    /// - [`MotorError::InvalidState`] unless PWM is configured.
    /// - [`MotorError::InvalidSpeed`] if `speed` is outside of [`SPEED_RANGE`].
    /// - [`MotorError::DriverFault`] if the driver reports a fault and `speed` is not zero.
    /// - [`MotorError::Pwm`] if a channel cannot be updated.
    pub fn set_motor_speed(&mut self, motor: Motor, speed: i32) -> Result<(), MotorError> {
        self.require(&[ControllerState::PwmConfigured])?;
        ensure!(SPEED_RANGE.contains(&speed), InvalidSpeedSnafu { speed });
        if speed != 0 {
            ensure!(!self.get_fault()?, DriverFaultSnafu);
        }

        let (forward, reverse) = motor.legs();
        let duty = speed_to_duty(speed);
        if speed >= 0 {
            self.drive(motor, (reverse, 0.0), (forward, duty))?;
        } else {
            self.drive(motor, (forward, 0.0), (reverse, duty))?;
        }

        self.speeds[motor.index()] = Some(speed);
        Ok(())
    }

    /// Lets a motor spin freely (both inputs at 0%).
    ///
    /// # Errors
    ///
    /// - [`MotorError::InvalidState`] unless PWM is configured.
    /// - [`MotorError::Pwm`] if a channel cannot be updated.
    pub fn coast(&mut self, motor: Motor) -> Result<(), MotorError> {
        self.require(&[ControllerState::PwmConfigured])?;
        let (forward, reverse) = motor.legs();
        self.drive(motor, (forward, 0.0), (reverse, 0.0))?;
        self.speeds[motor.index()] = Some(0);
        Ok(())
    }

    /// Short-brakes a motor (both inputs at 100%).
    ///
    /// # Errors
    ///
    /// - [`MotorError::InvalidState`] unless PWM is configured.
    /// - [`MotorError::Pwm`] if a channel cannot be updated.
    pub fn brake(&mut self, motor: Motor) -> Result<(), MotorError> {
        self.require(&[ControllerState::PwmConfigured])?;
        let (forward, reverse) = motor.legs();
        self.drive(motor, (forward, 100.0), (reverse, 100.0))?;
        self.speeds[motor.index()] = Some(0);
        Ok(())
    }

    /// Coasts both motors.
    ///
    /// # Errors
    ///
    /// See [`Self::coast`].
    pub fn stop(&mut self) -> Result<(), MotorError> {
        self.coast(Motor::A)?;
        self.coast(Motor::B)
    }

    /// Puts the chip to sleep (`true`) or wakes it up (`false`).
    ///
    /// nSLEEP is active low, so sleeping drives the line low.
    ///
    /// # Errors
    ///
    /// - [`MotorError::InvalidState`] unless the GPIO lines are configured.
    /// - [`MotorError::Gpio`] if the line cannot be driven.
    pub fn set_sleep(&mut self, sleep: bool) -> Result<(), MotorError> {
        self.require(&[ControllerState::GpioConfigured, ControllerState::PwmConfigured])?;
        let level = match sleep {
            true => LogicLevel::Low,
            false => LogicLevel::High,
        };
        self.gpio.write(self.sleep, level)?;
        Ok(())
    }

    /// Returns `true` if the chip reports a fault.
    ///
    /// nFAULT is active low: the chip pulls it low on over-current, over-temperature or
    /// under-voltage.
    ///
    /// # Errors
    ///
    /// - [`MotorError::InvalidState`] unless the GPIO lines are configured.
    /// - [`MotorError::Gpio`] if the line cannot be read.
    pub fn get_fault(&self) -> Result<bool, MotorError> {
        self.require(&[ControllerState::GpioConfigured, ControllerState::PwmConfigured])?;
        Ok(self.gpio.read(self.fault)?.is_low())
    }

    /// Gives every resource back: disables and frees the PWM channels, puts the chip to sleep
    /// and releases both GPIO lines.
    ///
    /// Every step is attempted even if an earlier one fails. The driver is cleaned up
    /// afterwards either way, but channels that could not be freed stay owned by it: calling
    /// `cleanup` again retries freeing just those.
    ///
    /// # Errors
    ///
    /// - [`MotorError::AlreadyCleanedUp`] if called again once everything has been given back.
    /// - [`MotorError::InvalidState`] if the driver was never configured.
    /// - The first error encountered while tearing down.
    pub fn cleanup(&mut self) -> Result<(), MotorError> {
        if self.state == ControllerState::CleanedUp && !self.channels.is_empty() {
            free_all(&mut *self.engine.lock(), &mut self.channels)?;
            log::debug!("DRV8833 freed its remaining PWM channels");
            return Ok(());
        }
        self.require(&[ControllerState::GpioConfigured, ControllerState::PwmConfigured])?;

        let mut first: Option<MotorError> = None;
        if !self.channels.is_empty() {
            if let Err(err) = free_all(&mut *self.engine.lock(), &mut self.channels) {
                first = Some(err.into());
            }
        }

        let steps = [
            ("put the DRV8833 to sleep", self.gpio.write(self.sleep, LogicLevel::Low)),
            ("release nSLEEP", self.gpio.release(self.sleep)),
            ("release nFAULT", self.gpio.release(self.fault)),
        ];
        for (step, result) in steps {
            if let Err(err) = result {
                log::error!("failed to {step}: {err}");
                first.get_or_insert(err.into());
            }
        }

        self.state = ControllerState::CleanedUp;
        self.speeds = [None; 2];
        log::debug!("DRV8833 cleaned up");
        first.map_or(Ok(()), Err)
    }
}

impl<P, G> Drv8833<P, G> {
    /// Returns the driver's lifecycle state.
    pub const fn state(&self) -> ControllerState {
        self.state
    }

    /// Returns the last speed commanded to a motor, or `None` if PWM is not configured.
    pub const fn speed(&self, motor: Motor) -> Option<i32> {
        self.speeds[motor.index()]
    }

    /// Returns the PWM frequency of the four inputs.
    pub const fn frequency_hz(&self) -> f32 {
        self.frequency_hz
    }
}

impl<P, G> Drop for Drv8833<P, G> {
    fn drop(&mut self) {
        if matches!(
            self.state,
            ControllerState::GpioConfigured | ControllerState::PwmConfigured
        ) {
            log::warn!(
                "DRV8833 dropped while {} without calling cleanup(); its resources are leaked",
                self.state
            );
        } else if !self.channels.is_empty() {
            log::warn!(
                "DRV8833 dropped with {} PWM channel(s) it failed to free",
                self.channels.len()
            );
        }
    }
}

fn acquire<B: PwmBackend>(
    engine: &mut PwmEngine<B>,
    pin: BcmPin,
    frequency_hz: f32,
    acquired: &mut Vec<ChannelHandle>,
) -> Result<(), PwmError> {
    let handle = engine.request_channel(pin.number())?;
    let result = engine
        .configure_channel(&handle, frequency_hz, 0.0)
        .and_then(|()| engine.enable_channel(&handle));
    acquired.push(handle);
    result
}

/// Releases every handle in `channels`, keeping the ones that fail so they can be retried.
/// Returns the first failure.
fn free_all<B: PwmBackend>(
    engine: &mut PwmEngine<B>,
    channels: &mut Vec<ChannelHandle>,
) -> Result<(), PwmError> {
    let mut first = None;
    channels.retain(|handle| match release(&mut *engine, handle) {
        Ok(()) => false,
        Err(err) => {
            log::error!(
                "failed to free PWM channel {} on {}: {err}",
                handle.id(),
                handle.pin()
            );
            first.get_or_insert(err);
            true
        }
    });
    first.map_or(Ok(()), Err)
}

fn release<B: PwmBackend>(
    engine: &mut PwmEngine<B>,
    handle: &ChannelHandle,
) -> Result<(), PwmError> {
    let disabled = match engine.channel_state(handle) {
        Some(state) if state.enabled => engine.disable_channel(handle),
        _ => Ok(()),
    };
    let freed = engine.free_channel(handle);
    disabled.and(freed)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn duty_mapping() {
        assert_eq!(speed_to_duty(0), 0.0);
        assert_eq!(speed_to_duty(255), 100.0);
        assert_eq!(speed_to_duty(-255), 100.0);
        assert!((speed_to_duty(51) - 20.0).abs() < 1e-4);
        assert_eq!(speed_to_duty(-51), speed_to_duty(51));
    }

    #[test]
    fn states_display() {
        assert_eq!(ControllerState::PwmConfigured.to_string(), "PWM configured");
    }
}
