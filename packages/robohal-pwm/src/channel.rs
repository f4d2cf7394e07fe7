//! PWM channel handles.

use core::ops::RangeInclusive;

use robohal_core::BcmPin;
use snafu::ensure;

use crate::error::{InvalidDutyCycleSnafu, PwmError};

/// Duty cycles accepted by the engine, in percent.
pub const DUTY_RANGE: RangeInclusive<f32> = 0.0..=100.0;

/// An allocated PWM output.
///
/// Handles are handed out by [`PwmEngine::request_channel`](crate::PwmEngine::request_channel)
/// and uniquely own their pin until they are passed back to
/// [`PwmEngine::free_channel`](crate::PwmEngine::free_channel). They cannot be cloned. A handle
/// that has been freed stays invalid even if the engine later reuses its channel id.
#[derive(Debug, PartialEq, Eq)]
pub struct ChannelHandle {
    id: u32,
    pin: BcmPin,
    generation: u64,
}

impl ChannelHandle {
    pub(crate) const fn new(id: u32, pin: BcmPin, generation: u64) -> Self {
        Self {
            id,
            pin,
            generation,
        }
    }

    /// Returns the engine's id for this channel.
    #[must_use]
    pub const fn id(&self) -> u32 {
        self.id
    }

    /// Returns the pin this channel drives.
    #[must_use]
    pub const fn pin(&self) -> BcmPin {
        self.pin
    }

    pub(crate) const fn generation(&self) -> u64 {
        self.generation
    }
}

/// The configured state of a live channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelState {
    /// Configured frequency, or `None` if the channel was never configured.
    pub frequency_hz: Option<f32>,
    /// Configured duty cycle in percent.
    pub duty: f32,
    /// Whether the signal is currently being generated.
    pub enabled: bool,
}

impl ChannelState {
    pub(crate) const UNCONFIGURED: Self = Self {
        frequency_hz: None,
        duty: 0.0,
        enabled: false,
    };

    /// Returns `true` once a frequency and duty cycle have been set.
    #[must_use]
    pub const fn is_configured(&self) -> bool {
        self.frequency_hz.is_some()
    }

    /// The duty cycle physically present on the pin: the configured duty while enabled, zero
    /// otherwise.
    #[must_use]
    pub fn output_duty(&self) -> f32 {
        match self.enabled {
            true => self.duty,
            false => 0.0,
        }
    }
}

pub(crate) fn validate_duty(duty: f32) -> Result<(), PwmError> {
    ensure!(DUTY_RANGE.contains(&duty), InvalidDutyCycleSnafu);
    Ok(())
}
