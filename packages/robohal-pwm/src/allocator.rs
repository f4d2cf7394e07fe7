//! Channel allocation and pin ownership.
//!
//! The allocator is the single source of truth for which channels are live and which pin each
//! one drives. It checks every precondition it can locally before touching the backend and only
//! records a change once the backend has confirmed it, so a failed command never leaves the
//! bookkeeping out of sync with the hardware.

use std::collections::BTreeMap;

use robohal_core::BcmPin;
use snafu::{ensure, OptionExt};

use crate::{
    backend::PwmBackend,
    channel::{validate_duty, ChannelHandle, ChannelState},
    config::EngineConfig,
    error::{
        ChannelNotSetSnafu, ChannelRequestFailedSnafu, InvalidChannelSnafu, InvalidGpioSnafu,
        NoFreeChannelSnafu, PwmError,
    },
};

#[derive(Debug)]
struct Slot {
    pin: BcmPin,
    generation: u64,
    state: ChannelState,
}

/// Tracks live channels and their pin bindings.
#[derive(Debug)]
pub struct ChannelAllocator {
    capacity: usize,
    live: BTreeMap<u32, Slot>,
    pins: BTreeMap<BcmPin, u32>,
    next_generation: u64,
}

impl ChannelAllocator {
    /// Creates an allocator for a pool of `capacity` channels.
    #[must_use]
    pub const fn new(capacity: usize) -> Self {
        Self {
            capacity,
            live: BTreeMap::new(),
            pins: BTreeMap::new(),
            next_generation: 0,
        }
    }

    /// Size of the channel pool.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of live channels.
    #[must_use]
    pub fn allocated_count(&self) -> usize {
        self.live.len()
    }

    /// Number of channels that can still be requested.
    #[must_use]
    pub fn free_count(&self) -> usize {
        self.capacity.saturating_sub(self.live.len())
    }

    /// Returns `true` if `pin` is bound to a live channel.
    #[must_use]
    pub fn is_bound(&self, pin: BcmPin) -> bool {
        self.pins.contains_key(&pin)
    }

    /// Returns the state of a live channel, or `None` if the handle is stale.
    #[must_use]
    pub fn state(&self, handle: &ChannelHandle) -> Option<ChannelState> {
        self.slot(handle).ok().map(|slot| slot.state)
    }

    fn slot(&self, handle: &ChannelHandle) -> Result<&Slot, PwmError> {
        self.live
            .get(&handle.id())
            .filter(|slot| slot.generation == handle.generation() && slot.pin == handle.pin())
            .context(InvalidChannelSnafu)
    }

    fn slot_mut(&mut self, handle: &ChannelHandle) -> Result<&mut Slot, PwmError> {
        self.live
            .get_mut(&handle.id())
            .filter(|slot| slot.generation == handle.generation() && slot.pin == handle.pin())
            .context(InvalidChannelSnafu)
    }

    /// Allocates a channel for `pin`.
    ///
    /// # Errors
    ///
    /// - [`PwmError::InvalidGpio`] if `pin` is not a header GPIO or is already bound.
    /// - [`PwmError::NoFreeChannel`] if the pool is exhausted.
    /// - [`PwmError::ChannelRequestFailed`] if the backend hands out a channel that is already
    ///   live. The duplicate is given back to the backend first.
    /// - Any error reported by the backend.
    pub fn request<B: PwmBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        pin: u8,
    ) -> Result<ChannelHandle, PwmError> {
        let pin = BcmPin::new(pin).ok().context(InvalidGpioSnafu)?;
        ensure!(!self.is_bound(pin), InvalidGpioSnafu);
        ensure!(self.live.len() < self.capacity, NoFreeChannelSnafu);

        let id = backend.request_channel()?;
        if self.live.contains_key(&id) {
            log::error!("PWM engine handed out channel {id}, which is already live");
            if let Err(err) = backend.free_channel(id) {
                log::error!("failed to give back duplicate PWM channel {id}: {err}");
            }
            return ChannelRequestFailedSnafu.fail();
        }

        let generation = self.next_generation;
        self.next_generation += 1;
        self.live.insert(
            id,
            Slot {
                pin,
                generation,
                state: ChannelState::UNCONFIGURED,
            },
        );
        self.pins.insert(pin, id);

        log::debug!("allocated PWM channel {id} on {pin}");
        Ok(ChannelHandle::new(id, pin, generation))
    }

    /// Frees a channel, unbinding its pin.
    ///
    /// # Errors
    ///
    /// - [`PwmError::InvalidChannel`] if the handle is not live, e.g. because it was already
    ///   freed.
    /// - Any error reported by the backend, in which case the channel stays allocated.
    pub fn free<B: PwmBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        handle: &ChannelHandle,
    ) -> Result<(), PwmError> {
        self.slot(handle)?;
        backend.free_channel(handle.id())?;

        self.live.remove(&handle.id());
        self.pins.remove(&handle.pin());

        log::debug!("freed PWM channel {} on {}", handle.id(), handle.pin());
        Ok(())
    }

    /// Sets a channel's frequency and duty cycle.
    ///
    /// # Errors
    ///
    /// - [`PwmError::InvalidChannel`] if the handle is not live.
    /// - [`PwmError::InvalidFrequency`] or [`PwmError::FrequencyNotMet`] if `timebase` cannot
    ///   produce `frequency_hz`.
    /// - [`PwmError::InvalidDutyCycle`] if `duty` is outside of 0-100%.
    /// - Any error reported by the backend.
    pub fn configure<B: PwmBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        timebase: &EngineConfig,
        handle: &ChannelHandle,
        frequency_hz: f32,
        duty: f32,
    ) -> Result<(), PwmError> {
        self.slot(handle)?;
        timebase.period_slots(frequency_hz)?;
        validate_duty(duty)?;

        backend.configure_channel(handle.id(), handle.pin().number(), frequency_hz, duty)?;

        let slot = self.slot_mut(handle)?;
        slot.state.frequency_hz = Some(frequency_hz);
        slot.state.duty = duty;
        Ok(())
    }

    /// Changes a configured channel's duty cycle, keeping its frequency.
    ///
    /// # Errors
    ///
    /// - [`PwmError::InvalidChannel`] if the handle is not live.
    /// - [`PwmError::ChannelNotSet`] if the channel was never configured.
    /// - [`PwmError::InvalidDutyCycle`] if `duty` is outside of 0-100%.
    /// - Any error reported by the backend.
    pub fn set_duty<B: PwmBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        handle: &ChannelHandle,
        duty: f32,
    ) -> Result<(), PwmError> {
        let frequency_hz = self.slot(handle)?.state.frequency_hz.context(ChannelNotSetSnafu)?;
        validate_duty(duty)?;

        backend.configure_channel(handle.id(), handle.pin().number(), frequency_hz, duty)?;

        self.slot_mut(handle)?.state.duty = duty;
        Ok(())
    }

    /// Starts or stops a configured channel's output. The configured duty cycle is kept either
    /// way.
    ///
    /// # Errors
    ///
    /// - [`PwmError::InvalidChannel`] if the handle is not live.
    /// - [`PwmError::ChannelNotSet`] if the channel was never configured.
    /// - Any error reported by the backend.
    pub fn set_enabled<B: PwmBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        handle: &ChannelHandle,
        enabled: bool,
    ) -> Result<(), PwmError> {
        ensure!(self.slot(handle)?.state.is_configured(), ChannelNotSetSnafu);

        match enabled {
            true => backend.enable_pwm(handle.id())?,
            false => backend.disable_pwm(handle.id())?,
        };

        self.slot_mut(handle)?.state.enabled = enabled;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::mock::MockPwmBackend;

    #[test]
    fn generations_reject_stale_handles() {
        let mut backend = MockPwmBackend::new(1);
        let mut allocator = ChannelAllocator::new(1);

        let first = allocator.request(&mut backend, 4).unwrap();
        allocator.free(&mut backend, &first).unwrap();

        let second = allocator.request(&mut backend, 4).unwrap();
        assert_eq!(first.id(), second.id());
        assert_ne!(first, second);

        assert!(allocator.state(&first).is_none());
        assert!(matches!(
            allocator.free(&mut backend, &first),
            Err(PwmError::InvalidChannel)
        ));
        assert!(allocator.state(&second).is_some());
    }

    #[test]
    fn backend_failure_keeps_bookkeeping() {
        let mut backend = MockPwmBackend::new(2);
        let mut allocator = ChannelAllocator::new(2);
        let handle = allocator.request(&mut backend, 5).unwrap();

        backend.fail_nth(crate::mock::PwmCommand::FreeChannel, 1, 4);
        assert!(matches!(
            allocator.free(&mut backend, &handle),
            Err(PwmError::InvalidChannel)
        ));
        assert_eq!(allocator.allocated_count(), 1);
        assert!(allocator.is_bound(handle.pin()));

        allocator.free(&mut backend, &handle).unwrap();
        assert_eq!(allocator.free_count(), 2);
    }

    #[test]
    fn duplicate_ids_are_given_back() {
        let mut backend = MockPwmBackend::new(2);
        let mut allocator = ChannelAllocator::new(2);
        let handle = allocator.request(&mut backend, 4).unwrap();

        // The backend forgets channel 0 behind the allocator's back and hands it out again.
        backend.free_channel(handle.id()).unwrap();
        assert!(matches!(
            allocator.request(&mut backend, 5),
            Err(PwmError::ChannelRequestFailed)
        ));

        assert_eq!(backend.allocated(), 0);
        assert_eq!(backend.call_count(crate::mock::PwmCommand::FreeChannel), 2);
        assert_eq!(allocator.allocated_count(), 1);
        assert!(!allocator.is_bound(BcmPin::new(5).unwrap()));
    }
}
