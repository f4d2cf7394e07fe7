//! In-memory PWM control surface for testing.
//!
//! [`MockPwmBackend`] behaves like a DMA engine with a fixed number of channels and records
//! every command it receives. Failures can be scheduled for the n-th upcoming call of any
//! command, so error paths (rollbacks in particular) can be exercised without hardware.
//!
//! # Feature Gate
//!
//! This module is available during test builds and when the `mock` feature is enabled.

#![cfg(any(test, feature = "mock"))]

use std::collections::BTreeMap;

use robohal_core::error::RawStatus;

use crate::{
    backend::{PwmBackend, Reply},
    channel::DUTY_RANGE,
    error::{status, PwmError},
};

/// A command of the PWM control vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PwmCommand {
    /// `setup_engine`
    SetupEngine,
    /// `teardown_engine`
    TeardownEngine,
    /// `request_channel`
    RequestChannel,
    /// `free_channel`
    FreeChannel,
    /// `configure_channel`
    ConfigureChannel,
    /// `enable_pwm`
    EnablePwm,
    /// `disable_pwm`
    DisablePwm,
}

/// The simulated state of one allocated channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MockChannel {
    /// Pin the channel was routed to, or `None` before it is configured.
    pub pin: Option<u8>,
    /// Configured frequency.
    pub frequency_hz: f32,
    /// Configured duty cycle in percent.
    pub duty: f32,
    /// Whether the channel is generating its signal.
    pub enabled: bool,
}

impl MockChannel {
    /// The duty cycle physically present on the pin.
    #[must_use]
    pub fn output(&self) -> f32 {
        match self.enabled {
            true => self.duty,
            false => 0.0,
        }
    }
}

#[derive(Debug)]
struct ScheduledFailure {
    command: PwmCommand,
    call: usize,
    status: RawStatus,
}

/// An in-memory [`PwmBackend`].
#[derive(Debug)]
pub struct MockPwmBackend {
    channel_count: usize,
    engine: Option<(u32, f32)>,
    channels: BTreeMap<u32, MockChannel>,
    calls: Vec<PwmCommand>,
    failures: Vec<ScheduledFailure>,
}

impl MockPwmBackend {
    /// Creates a backend multiplexing `channel_count` channels.
    #[must_use]
    pub const fn new(channel_count: usize) -> Self {
        Self {
            channel_count,
            engine: None,
            channels: BTreeMap::new(),
            calls: Vec::new(),
            failures: Vec::new(),
        }
    }

    /// Makes the `n`-th upcoming call of `command` (1 being the next one) fail with `code`.
    pub fn fail_nth(&mut self, command: PwmCommand, n: usize, code: i32) {
        let call = self.call_count(command) + n;
        self.failures.push(ScheduledFailure {
            command,
            call,
            status: RawStatus::new(code),
        });
    }

    /// Every command received so far, in order.
    #[must_use]
    pub fn calls(&self) -> &[PwmCommand] {
        &self.calls
    }

    /// Number of times `command` has been received.
    #[must_use]
    pub fn call_count(&self, command: PwmCommand) -> usize {
        self.calls.iter().filter(|call| **call == command).count()
    }

    /// The `(page_count, pulse_width_us)` the engine was set up with, if it is running.
    #[must_use]
    pub const fn engine(&self) -> Option<(u32, f32)> {
        self.engine
    }

    /// Number of allocated channels.
    #[must_use]
    pub fn allocated(&self) -> usize {
        self.channels.len()
    }

    /// Returns an allocated channel.
    #[must_use]
    pub fn channel(&self, id: u32) -> Option<&MockChannel> {
        self.channels.get(&id)
    }

    /// Returns the allocated channel routed to `pin`.
    #[must_use]
    pub fn channel_on_pin(&self, pin: u8) -> Option<&MockChannel> {
        self.channels.values().find(|channel| channel.pin == Some(pin))
    }

    /// The duty cycle physically present on `pin`; zero if no channel drives it.
    #[must_use]
    pub fn output_on_pin(&self, pin: u8) -> f32 {
        self.channel_on_pin(pin).map_or(0.0, MockChannel::output)
    }

    fn receive(&mut self, command: PwmCommand) -> Result<(), PwmError> {
        self.calls.push(command);
        let call = self.call_count(command);

        if let Some(index) = self
            .failures
            .iter()
            .position(|failure| failure.command == command && failure.call == call)
        {
            let failure = self.failures.swap_remove(index);
            return Err(failure.status.into());
        }
        Ok(())
    }

    fn channel_mut(&mut self, id: u32) -> Result<&mut MockChannel, PwmError> {
        self.channels
            .get_mut(&id)
            .ok_or_else(|| PwmError::translate(status::INVALID_CHANNEL))
    }
}

impl PwmBackend for MockPwmBackend {
    fn channel_count(&self) -> usize {
        self.channel_count
    }

    fn setup_engine(&mut self, page_count: u32, pulse_width_us: f32) -> Reply {
        self.receive(PwmCommand::SetupEngine)?;
        self.engine = Some((page_count, pulse_width_us));
        Ok(0)
    }

    fn teardown_engine(&mut self) -> Reply {
        self.receive(PwmCommand::TeardownEngine)?;
        self.engine = None;
        self.channels.clear();
        Ok(0)
    }

    fn request_channel(&mut self) -> Reply {
        self.receive(PwmCommand::RequestChannel)?;
        let id = (0..self.channel_count as u32)
            .find(|id| !self.channels.contains_key(id))
            .ok_or_else(|| PwmError::translate(status::NO_FREE_CHANNEL))?;

        self.channels.insert(
            id,
            MockChannel {
                pin: None,
                frequency_hz: 0.0,
                duty: 0.0,
                enabled: false,
            },
        );
        Ok(id)
    }

    fn free_channel(&mut self, channel: u32) -> Reply {
        self.receive(PwmCommand::FreeChannel)?;
        self.channels
            .remove(&channel)
            .ok_or_else(|| PwmError::translate(status::INVALID_CHANNEL))?;
        Ok(0)
    }

    fn configure_channel(&mut self, channel: u32, pin: u8, frequency_hz: f32, duty: f32) -> Reply {
        self.receive(PwmCommand::ConfigureChannel)?;
        if !DUTY_RANGE.contains(&duty) {
            return Err(PwmError::translate(status::INVALID_DUTY_CYCLE));
        }

        let channel = self.channel_mut(channel)?;
        channel.pin = Some(pin);
        channel.frequency_hz = frequency_hz;
        channel.duty = duty;
        Ok(0)
    }

    fn enable_pwm(&mut self, channel: u32) -> Reply {
        self.receive(PwmCommand::EnablePwm)?;
        let channel = self.channel_mut(channel)?;
        if channel.pin.is_none() {
            return Err(PwmError::translate(status::CHANNEL_NOT_SET));
        }
        channel.enabled = true;
        Ok(0)
    }

    fn disable_pwm(&mut self, channel: u32) -> Reply {
        self.receive(PwmCommand::DisablePwm)?;
        self.channel_mut(channel)?.enabled = false;
        Ok(0)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn scheduled_failures_fire_once() {
        let mut backend = MockPwmBackend::new(4);
        backend.fail_nth(PwmCommand::RequestChannel, 2, status::CHANNEL_REQUEST_FAILED);

        assert_eq!(backend.request_channel().unwrap(), 0);
        assert!(matches!(
            backend.request_channel(),
            Err(PwmError::ChannelRequestFailed)
        ));
        assert_eq!(backend.request_channel().unwrap(), 1);
        assert_eq!(backend.call_count(PwmCommand::RequestChannel), 3);
    }

    #[test]
    fn outputs_follow_enable_state() {
        let mut backend = MockPwmBackend::new(1);
        let id = backend.request_channel().unwrap();
        assert!(matches!(
            backend.enable_pwm(id),
            Err(PwmError::ChannelNotSet)
        ));

        backend.configure_channel(id, 12, 100.0, 40.0).unwrap();
        assert_eq!(backend.output_on_pin(12), 0.0);
        backend.enable_pwm(id).unwrap();
        assert_eq!(backend.output_on_pin(12), 40.0);
        backend.disable_pwm(id).unwrap();
        assert_eq!(backend.output_on_pin(12), 0.0);

        assert!(matches!(
            backend.request_channel(),
            Err(PwmError::NoFreeChannel)
        ));
    }
}
