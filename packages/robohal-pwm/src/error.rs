//! PWM errors and status code translation.
//!
//! The control surface reports failures as small integers. [`PwmError::from_status`] (generated
//! by [`map_status!`]) turns any of them, known or not, into a [`PwmError`]. Errors raised by
//! local precondition checks share the same enum so callers only ever match on one type.

use robohal_core::{
    error::{FromStatus, RawStatus},
    map_status,
};
use snafu::Snafu;

/// Numeric status codes used by the DMA PWM control surface.
///
/// Commands report these either as positive values or negated; both spellings are accepted,
/// except for `-1` which is reserved for [`INVALID_ARG_COUNT`].
pub mod status {
    /// The engine refused to hand out a channel.
    pub const CHANNEL_REQUEST_FAILED: i32 = 1;
    /// Authentication failure of the control protocol.
    pub const INVALID_PASSWORD: i32 = 2;
    /// Every channel is in use.
    pub const NO_FREE_CHANNEL: i32 = 3;
    /// The channel id is not allocated.
    pub const INVALID_CHANNEL: i32 = 4;
    /// Duty cycle outside of 0-100%.
    pub const INVALID_DUTY_CYCLE: i32 = 5;
    /// The GPIO cannot be driven by the engine.
    pub const INVALID_GPIO: i32 = 6;
    /// The requested frequency cannot be produced by the DMA timebase.
    pub const FREQUENCY_NOT_MET: i32 = 7;
    /// The channel was used before it was configured.
    pub const CHANNEL_NOT_SET: i32 = 8;
    /// The board revision could not be determined.
    pub const NO_PI_VERSION: i32 = 9;
    /// Mapping peripheral or DMA memory failed.
    pub const MAP_FAILURE: i32 = 10;
    /// Installing the cleanup signal handlers failed.
    pub const SIGNAL_HANDLER_FAILURE: i32 = 11;
    /// A command was invoked with the wrong number of arguments.
    pub const INVALID_ARG_COUNT: i32 = -1;
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
/// Errors that can occur when working with the PWM engine and its channels.
pub enum PwmError {
    /// The engine refused to hand out a channel.
    #[snafu(display("the PWM engine failed to allocate a channel"))]
    ChannelRequestFailed,

    /// The control surface rejected its credentials.
    ///
    /// This is an artifact of the control protocol and should never happen on a local engine.
    #[snafu(display("the PWM control surface reported a protocol error"))]
    ProtocolError,

    /// Every hardware channel is already allocated.
    #[snafu(display("no free PWM channel is available"))]
    NoFreeChannel,

    /// The channel is not (or no longer) allocated.
    #[snafu(display("the PWM channel is not allocated"))]
    InvalidChannel,

    /// The duty cycle is outside of `0.0..=100.0` percent.
    #[snafu(display("the duty cycle is outside of 0-100%"))]
    InvalidDutyCycle,

    /// The pin is not a usable GPIO, or it is already bound to a live channel.
    #[snafu(display("the GPIO is invalid or already bound to a PWM channel"))]
    InvalidGpio,

    /// The frequency cannot be produced by the shared DMA timebase.
    #[snafu(display("the requested frequency cannot be met by the DMA timebase"))]
    FrequencyNotMet,

    /// The channel (or the engine behind it) has not been set up yet.
    #[snafu(display("the PWM channel has not been configured"))]
    ChannelNotSet,

    /// The board revision could not be determined.
    #[snafu(display("unable to determine the board revision"))]
    NoPiVersion,

    /// Mapping peripheral or DMA memory failed.
    #[snafu(display("failed to map DMA or peripheral memory"))]
    MapFailure,

    /// Installing the engine's signal handlers failed.
    #[snafu(display("failed to install the PWM engine's signal handlers"))]
    SignalHandlerFailure,

    /// A control command was invoked with the wrong number of arguments.
    #[snafu(display("a PWM control command received the wrong number of arguments"))]
    InvalidArgCount,

    /// The control surface returned a status code with no known meaning.
    #[snafu(display("the PWM control surface returned unknown status {code}"))]
    Unknown {
        /// The untranslated code.
        code: i32,
    },

    /// The engine parameters are out of range.
    #[snafu(display(
        "invalid engine parameters: {page_count} page(s), {pulse_width_us}us pulse width"
    ))]
    InvalidArgs {
        /// Requested number of DMA pages.
        page_count: u32,
        /// Requested pulse width in microseconds.
        pulse_width_us: f32,
    },

    /// The frequency is not a finite, positive number.
    #[snafu(display("{frequency_hz}Hz is not a valid PWM frequency"))]
    InvalidFrequency {
        /// The rejected frequency.
        frequency_hz: f32,
    },

    /// The engine cannot be shut down while channels are still allocated.
    #[snafu(display("the PWM engine still has {allocated} allocated channel(s)"))]
    ResourceBusy {
        /// Number of channels that have not been freed.
        allocated: usize,
    },

    /// The engine was already initialized in this process.
    #[snafu(display("the PWM engine has already been initialized"))]
    AlreadyInitialized,

    /// The engine is not running.
    #[snafu(display("the PWM engine is not initialized"))]
    NotInitialized,

    /// A control command could not be run.
    #[snafu(display("failed to run PWM control command `{command}`"))]
    ControlSurface {
        /// Name of the command.
        command: String,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// A control command succeeded but printed something other than a result value.
    #[snafu(display("PWM control command `{command}` replied with {output:?}"))]
    MalformedReply {
        /// Name of the command.
        command: String,
        /// What the command printed.
        output: String,
    },
}

map_status! {
    PwmError {
        status::INVALID_ARG_COUNT => Self::InvalidArgCount,
        1 => Self::ChannelRequestFailed,
        2 | -2 => Self::ProtocolError,
        3 | -3 => Self::NoFreeChannel,
        4 | -4 => Self::InvalidChannel,
        5 | -5 => Self::InvalidDutyCycle,
        6 | -6 => Self::InvalidGpio,
        7 | -7 => Self::FrequencyNotMet,
        8 | -8 => Self::ChannelNotSet,
        9 | -9 => Self::NoPiVersion,
        10 | -10 => Self::MapFailure,
        11 | -11 => Self::SignalHandlerFailure,
    }
    otherwise code => Self::Unknown { code };
}

impl PwmError {
    /// Translates a raw status code into an error.
    ///
    /// This never fails; codes outside of the documented set become [`PwmError::Unknown`].
    #[must_use]
    pub fn translate(code: i32) -> Self {
        Self::from_status(RawStatus::new(code))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn documented_codes() {
        assert!(matches!(
            PwmError::translate(status::CHANNEL_REQUEST_FAILED),
            PwmError::ChannelRequestFailed
        ));
        assert!(matches!(
            PwmError::translate(status::INVALID_PASSWORD),
            PwmError::ProtocolError
        ));
        assert!(matches!(
            PwmError::translate(status::NO_FREE_CHANNEL),
            PwmError::NoFreeChannel
        ));
        assert!(matches!(
            PwmError::translate(status::INVALID_CHANNEL),
            PwmError::InvalidChannel
        ));
        assert!(matches!(
            PwmError::translate(status::INVALID_DUTY_CYCLE),
            PwmError::InvalidDutyCycle
        ));
        assert!(matches!(
            PwmError::translate(status::INVALID_GPIO),
            PwmError::InvalidGpio
        ));
        assert!(matches!(
            PwmError::translate(status::FREQUENCY_NOT_MET),
            PwmError::FrequencyNotMet
        ));
        assert!(matches!(
            PwmError::translate(status::CHANNEL_NOT_SET),
            PwmError::ChannelNotSet
        ));
        assert!(matches!(
            PwmError::translate(status::NO_PI_VERSION),
            PwmError::NoPiVersion
        ));
        assert!(matches!(
            PwmError::translate(status::MAP_FAILURE),
            PwmError::MapFailure
        ));
        assert!(matches!(
            PwmError::translate(status::SIGNAL_HANDLER_FAILURE),
            PwmError::SignalHandlerFailure
        ));
    }

    #[test]
    fn negated_codes_and_sentinel() {
        assert!(matches!(PwmError::translate(-1), PwmError::InvalidArgCount));
        assert!(matches!(PwmError::translate(-3), PwmError::NoFreeChannel));
        assert!(matches!(PwmError::translate(-11), PwmError::SignalHandlerFailure));
    }

    #[test]
    fn translation_is_total() {
        for code in (-1000..=1000).chain([i32::MIN, i32::MAX, 0, 12, -12]) {
            let err = PwmError::translate(code);
            if !(-11..=11).contains(&code) || code == 0 {
                assert!(matches!(err, PwmError::Unknown { code: c } if c == code));
            }
        }
    }
}
