//! GPIO lines.
//!
//! Digital lines on the header carry binary signals using voltage levels (called
//! [logic levels](`LogicLevel`)). A line configured as an output drives the pin to 3.3V (high)
//! or 0V (low); a line configured as an input reports which of the two it sees.
//!
//! Devices never talk to the SoC directly. They go through a [`GpioBackend`], which claims,
//! drives and releases lines by their [`BcmPin`] number. [`RppalGpio`] is the backend for real
//! boards (feature `rpi`) and [`MockGpio`] simulates one in tests (feature `mock`).

use robohal_core::BcmPin;
use snafu::Snafu;

pub mod mock;
#[cfg(feature = "rpi")]
pub mod rpi;

#[cfg(any(test, feature = "mock"))]
pub use mock::MockGpio;
#[cfg(feature = "rpi")]
pub use rpi::RppalGpio;

/// Logic level of a digital pin.
///
/// This value is either [`High`](LogicLevel::High) or [`Low`](LogicLevel::Low) depending on
/// the voltage on the line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicLevel {
    /// A high digital signal.
    ///
    /// The header operates on 3.3V logic, so this value indicates a voltage of 3.3V.
    High,

    /// A low digital signal.
    ///
    /// The header operates on 3.3V logic, so this value indicates a voltage of 0V.
    Low,
}

impl LogicLevel {
    /// Returns `true` if the level is [`High`](LogicLevel::High).
    #[must_use]
    pub const fn is_high(&self) -> bool {
        match self {
            Self::High => true,
            Self::Low => false,
        }
    }

    /// Returns `true` if the level is [`Low`](LogicLevel::Low).
    #[must_use]
    pub const fn is_low(&self) -> bool {
        match self {
            Self::High => false,
            Self::Low => true,
        }
    }
}

impl core::ops::Not for LogicLevel {
    type Output = Self;

    fn not(self) -> Self::Output {
        match self {
            Self::Low => Self::High,
            Self::High => Self::Low,
        }
    }
}

/// How a claimed line is being used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinMode {
    /// The line is read, with its pull-up resistor enabled.
    Input,
    /// The line is driven.
    Output,
}

/// A GPIO controller.
///
/// Lines must be claimed with [`configure_output`](GpioBackend::configure_output) or
/// [`configure_input`](GpioBackend::configure_input) before they can be used, and are owned
/// by the backend until [`release`](GpioBackend::release)d.
pub trait GpioBackend {
    /// Claims `pin` as an output, driven to `initial` right away.
    ///
    /// # Errors
    ///
    /// Returns [`GpioError::PinInUse`] if the line is already claimed.
    fn configure_output(&mut self, pin: BcmPin, initial: LogicLevel) -> Result<(), GpioError>;

    /// Claims `pin` as an input with its pull-up resistor enabled.
    ///
    /// # Errors
    ///
    /// Returns [`GpioError::PinInUse`] if the line is already claimed.
    fn configure_input(&mut self, pin: BcmPin) -> Result<(), GpioError>;

    /// Drives an output line.
    ///
    /// # Errors
    ///
    /// - [`GpioError::NotConfigured`] if the line was never claimed.
    /// - [`GpioError::InvalidMode`] if the line is an input.
    fn write(&mut self, pin: BcmPin, level: LogicLevel) -> Result<(), GpioError>;

    /// Reads an input line.
    ///
    /// # Errors
    ///
    /// - [`GpioError::NotConfigured`] if the line was never claimed.
    /// - [`GpioError::InvalidMode`] if the line is an output.
    fn read(&self, pin: BcmPin) -> Result<LogicLevel, GpioError>;

    /// Gives up a claimed line.
    ///
    /// # Errors
    ///
    /// Returns [`GpioError::NotConfigured`] if the line was never claimed.
    fn release(&mut self, pin: BcmPin) -> Result<(), GpioError>;
}

#[derive(Debug, Snafu)]
/// Errors that can occur when working with GPIO lines.
pub enum GpioError {
    /// The line is already claimed.
    #[snafu(display("{pin} is already in use"))]
    PinInUse {
        /// The contested line.
        pin: BcmPin,
    },

    /// The line has not been claimed.
    #[snafu(display("{pin} has not been configured"))]
    NotConfigured {
        /// The line.
        pin: BcmPin,
    },

    /// The line is configured in the wrong direction for the operation.
    #[snafu(display("{pin} is configured as an {mode:?} line"))]
    InvalidMode {
        /// The line.
        pin: BcmPin,
        /// How the line is configured.
        mode: PinMode,
    },

    /// The GPIO peripheral reported an error.
    #[cfg(feature = "rpi")]
    #[snafu(display("{source}"), context(false))]
    Rppal {
        /// The source of the error.
        source: rppal::gpio::Error,
    },
}
