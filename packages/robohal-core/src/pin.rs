//! GPIO pin numbering.
//!
//! robohal numbers pins by their Broadcom SoC channel ("BCM" numbering), never by their
//! physical position on the 40-pin header. Board pin 12, for instance, is [`BcmPin`] 18.
//! The header exposes BCM lines 0 through 27, so those are the only pins that can be
//! constructed.

use core::fmt;

use snafu::Snafu;

/// A GPIO line on the 40-pin header, identified by its BCM number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "u8", into = "u8"))]
pub struct BcmPin(u8);

impl BcmPin {
    /// The highest BCM line routed to the header.
    pub const MAX: u8 = 27;

    /// Creates a pin from its BCM number.
    ///
    /// # Errors
    ///
    /// Returns [`PinError::OutOfRange`] if `number` is greater than [`BcmPin::MAX`].
    pub const fn new(number: u8) -> Result<Self, PinError> {
        if number > Self::MAX {
            return Err(PinError::OutOfRange { number });
        }
        Ok(Self(number))
    }

    /// Returns the BCM number of this pin.
    #[must_use]
    pub const fn number(self) -> u8 {
        self.0
    }
}

impl fmt::Display for BcmPin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GPIO{}", self.0)
    }
}

impl TryFrom<u8> for BcmPin {
    type Error = PinError;

    fn try_from(number: u8) -> Result<Self, Self::Error> {
        Self::new(number)
    }
}

impl From<BcmPin> for u8 {
    fn from(pin: BcmPin) -> Self {
        pin.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Snafu)]
/// Errors that can occur when naming a pin.
pub enum PinError {
    /// The number does not name a BCM line on the header.
    #[snafu(display("GPIO{number} is not routed to the 40-pin header"))]
    OutOfRange {
        /// The rejected pin number.
        number: u8,
    },
}
