//! The PWM control surface.
//!
//! [`PwmBackend`] is the capability the engine drives. Every method corresponds to one command
//! of the DMA PWM control vocabulary and is treated as slow, fallible I/O: implementations are
//! free to spawn a process, talk to a daemon, or poke registers directly.

use crate::error::PwmError;

/// The value returned by a successful control command, such as an allocated channel id.
pub type Reply = Result<u32, PwmError>;

/// A control surface for a DMA PWM engine.
///
/// The engine validates arguments and tracks ownership before calling into a backend, so
/// backends only need to execute commands and report their outcome. Failures reported as
/// numeric codes should be converted with
/// [`PwmError::from_status`](robohal_core::error::FromStatus).
pub trait PwmBackend {
    /// Number of channels the DMA engine multiplexes.
    fn channel_count(&self) -> usize;

    /// Sets up the DMA engine with `page_count` pages of control blocks and a pulse width
    /// (the length of one DMA slot) of `pulse_width_us` microseconds.
    fn setup_engine(&mut self, page_count: u32, pulse_width_us: f32) -> Reply;

    /// Releases the DMA engine.
    fn teardown_engine(&mut self) -> Reply;

    /// Allocates a channel, returning its id.
    fn request_channel(&mut self) -> Reply;

    /// Frees the channel `channel`.
    fn free_channel(&mut self, channel: u32) -> Reply;

    /// Routes `channel` to `pin` and sets its frequency and duty cycle (in percent).
    fn configure_channel(&mut self, channel: u32, pin: u8, frequency_hz: f32, duty: f32) -> Reply;

    /// Starts generating the channel's signal.
    fn enable_pwm(&mut self, channel: u32) -> Reply;

    /// Stops generating the channel's signal without forgetting its configuration.
    fn disable_pwm(&mut self, channel: u32) -> Reply;
}

impl<B: PwmBackend + ?Sized> PwmBackend for Box<B> {
    fn channel_count(&self) -> usize {
        (**self).channel_count()
    }

    fn setup_engine(&mut self, page_count: u32, pulse_width_us: f32) -> Reply {
        (**self).setup_engine(page_count, pulse_width_us)
    }

    fn teardown_engine(&mut self) -> Reply {
        (**self).teardown_engine()
    }

    fn request_channel(&mut self) -> Reply {
        (**self).request_channel()
    }

    fn free_channel(&mut self, channel: u32) -> Reply {
        (**self).free_channel(channel)
    }

    fn configure_channel(&mut self, channel: u32, pin: u8, frequency_hz: f32, duty: f32) -> Reply {
        (**self).configure_channel(channel, pin, frequency_hz, duty)
    }

    fn enable_pwm(&mut self, channel: u32) -> Reply {
        (**self).enable_pwm(channel)
    }

    fn disable_pwm(&mut self, channel: u32) -> Reply {
        (**self).disable_pwm(channel)
    }
}
