//! The PWM engine.
//!
//! [`PwmEngine`] is the context object every PWM user goes through. It owns the control surface
//! and the [`ChannelAllocator`], and it enforces the engine lifecycle: initialized exactly once,
//! used only while running, and shut down only after every channel has been freed.
//!
//! Engines are shared between devices as a [`SharedEngine`], which serializes every mutation
//! behind one lock.
//!
//! ```
//! # use robohal_pwm::{mock::MockPwmBackend, PwmEngine};
//! let mut engine = PwmEngine::new(MockPwmBackend::new(8));
//! engine.initialize(1, 10.0)?;
//!
//! let channel = engine.request_channel(18)?;
//! engine.configure_channel(&channel, 100.0, 50.0)?;
//! engine.enable_channel(&channel)?;
//!
//! engine.free_channel(&channel)?;
//! engine.shutdown()?;
//! # Ok::<(), robohal_pwm::PwmError>(())
//! ```

use std::sync::Arc;

use snafu::{ensure, OptionExt};
use spin::Mutex;

use crate::{
    allocator::ChannelAllocator,
    backend::PwmBackend,
    channel::{ChannelHandle, ChannelState},
    config::EngineConfig,
    error::{
        AlreadyInitializedSnafu, ChannelNotSetSnafu, NotInitializedSnafu, PwmError,
        ResourceBusySnafu,
    },
};

/// An engine shared between several devices.
///
/// The lock is a spinlock. Devices hold it for whole multi-channel sequences, and with a
/// [`CommandBackend`](crate::CommandBackend) every step of such a sequence spawns a helper
/// process, so a second thread waiting on the engine spins for the full duration. Drive an
/// engine from one thread; callers that need several threads should hand the engine to one of
/// them and send it commands.
pub type SharedEngine<B> = Arc<Mutex<PwmEngine<B>>>;

/// Lifecycle of a [`PwmEngine`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EngineState {
    /// [`PwmEngine::initialize`] has not been called yet.
    Uninitialized,
    /// The engine is running with the given timebase.
    Running(EngineConfig),
    /// The engine has been shut down and cannot be restarted.
    ShutDown,
}

/// A DMA PWM engine and the channels allocated from it.
#[derive(Debug)]
pub struct PwmEngine<B> {
    backend: B,
    state: EngineState,
    allocator: ChannelAllocator,
}

impl<B: PwmBackend> PwmEngine<B> {
    /// Creates an uninitialized engine driving `backend`.
    pub fn new(backend: B) -> Self {
        let capacity = backend.channel_count();
        Self {
            backend,
            state: EngineState::Uninitialized,
            allocator: ChannelAllocator::new(capacity),
        }
    }

    /// Wraps the engine so it can be shared between devices.
    pub fn into_shared(self) -> SharedEngine<B> {
        Arc::new(Mutex::new(self))
    }

    /// Initializes the DMA engine.
    ///
    /// # Errors
    ///
    /// - [`PwmError::AlreadyInitialized`] if the engine was initialized before, even if it has
    ///   since been shut down.
    /// - [`PwmError::InvalidArgs`] if the parameters are out of range.
    /// - Any error reported by the backend, such as [`PwmError::MapFailure`] or
    ///   [`PwmError::SignalHandlerFailure`].
    pub fn initialize(&mut self, page_count: u32, pulse_width_us: f32) -> Result<(), PwmError> {
        self.initialize_with(EngineConfig::new(page_count, pulse_width_us))
    }

    /// Initializes the DMA engine from a configuration.
    ///
    /// # Errors
    ///
    /// See [`Self::initialize`].
    pub fn initialize_with(&mut self, config: EngineConfig) -> Result<(), PwmError> {
        ensure!(
            matches!(self.state, EngineState::Uninitialized),
            AlreadyInitializedSnafu
        );
        config.validate()?;

        self.backend
            .setup_engine(config.page_count, config.pulse_width_us)
            .inspect_err(|err| log::error!("failed to set up the PWM engine: {err}"))?;
        self.state = EngineState::Running(config);

        log::info!(
            "PWM engine running: {} page(s), {}us pulse width, {} channel(s)",
            config.page_count,
            config.pulse_width_us,
            self.allocator.capacity()
        );
        Ok(())
    }

    /// Releases the DMA engine.
    ///
    /// # Errors
    ///
    /// - [`PwmError::NotInitialized`] if the engine is not running.
    /// - [`PwmError::ResourceBusy`] if channels are still allocated. The engine keeps running.
    /// - Any error reported by the backend.
    pub fn shutdown(&mut self) -> Result<(), PwmError> {
        self.timebase()?;
        let allocated = self.allocator.allocated_count();
        ensure!(allocated == 0, ResourceBusySnafu { allocated });

        self.backend.teardown_engine()?;
        self.state = EngineState::ShutDown;

        log::info!("PWM engine shut down");
        Ok(())
    }

    fn timebase(&self) -> Result<EngineConfig, PwmError> {
        match self.state {
            EngineState::Running(config) => Ok(config),
            _ => NotInitializedSnafu.fail(),
        }
    }

    /// Allocates a channel that drives `pin` (BCM numbering).
    ///
    /// # Errors
    ///
    /// - [`PwmError::NotInitialized`] if the engine is not running.
    /// - [`PwmError::InvalidGpio`] if `pin` is not a header GPIO or already drives a channel.
    /// - [`PwmError::NoFreeChannel`] if every channel is allocated.
    /// - Any error reported by the backend.
    pub fn request_channel(&mut self, pin: u8) -> Result<ChannelHandle, PwmError> {
        self.timebase()?;
        self.allocator.request(&mut self.backend, pin)
    }

    /// Frees a channel, making its pin available again.
    ///
    /// Freeing is not idempotent: a handle can only be freed once.
    ///
    /// # Errors
    ///
    /// - [`PwmError::NotInitialized`] if the engine is not running.
    /// - [`PwmError::InvalidChannel`] if the channel was already freed.
    /// - Any error reported by the backend.
    pub fn free_channel(&mut self, handle: &ChannelHandle) -> Result<(), PwmError> {
        self.timebase()?;
        self.allocator.free(&mut self.backend, handle)
    }

    /// Sets a channel's frequency and duty cycle (in percent).
    ///
    /// # Errors
    ///
    /// - [`PwmError::ChannelNotSet`] if the engine is not running.
    /// - [`PwmError::InvalidChannel`] if the channel is not allocated.
    /// - [`PwmError::InvalidFrequency`] or [`PwmError::FrequencyNotMet`] if the engine's
    ///   timebase cannot produce `frequency_hz`.
    /// - [`PwmError::InvalidDutyCycle`] if `duty` is outside of 0-100%.
    /// - Any error reported by the backend.
    pub fn configure_channel(
        &mut self,
        handle: &ChannelHandle,
        frequency_hz: f32,
        duty: f32,
    ) -> Result<(), PwmError> {
        let timebase = self.timebase().ok().context(ChannelNotSetSnafu)?;
        self.allocator
            .configure(&mut self.backend, &timebase, handle, frequency_hz, duty)
    }

    /// Changes a configured channel's duty cycle (in percent), keeping its frequency.
    ///
    /// # Errors
    ///
    /// - [`PwmError::NotInitialized`] if the engine is not running.
    /// - [`PwmError::InvalidChannel`] if the channel is not allocated.
    /// - [`PwmError::ChannelNotSet`] if the channel was never configured.
    /// - [`PwmError::InvalidDutyCycle`] if `duty` is outside of 0-100%.
    /// - Any error reported by the backend.
    pub fn set_duty_cycle(&mut self, handle: &ChannelHandle, duty: f32) -> Result<(), PwmError> {
        self.timebase()?;
        self.allocator.set_duty(&mut self.backend, handle, duty)
    }

    /// Starts generating a configured channel's signal.
    ///
    /// # Errors
    ///
    /// - [`PwmError::NotInitialized`] if the engine is not running.
    /// - [`PwmError::InvalidChannel`] if the channel is not allocated.
    /// - [`PwmError::ChannelNotSet`] if the channel was never configured.
    /// - Any error reported by the backend.
    pub fn enable_channel(&mut self, handle: &ChannelHandle) -> Result<(), PwmError> {
        self.timebase()?;
        self.allocator.set_enabled(&mut self.backend, handle, true)
    }

    /// Stops generating a channel's signal. The configured duty cycle is kept, so enabling the
    /// channel again restores the previous output.
    ///
    /// # Errors
    ///
    /// See [`Self::enable_channel`].
    pub fn disable_channel(&mut self, handle: &ChannelHandle) -> Result<(), PwmError> {
        self.timebase()?;
        self.allocator.set_enabled(&mut self.backend, handle, false)
    }
}

impl<B> PwmEngine<B> {
    /// Returns the engine's lifecycle state.
    pub const fn state(&self) -> EngineState {
        self.state
    }

    /// Returns `true` while the engine is running.
    pub const fn is_initialized(&self) -> bool {
        matches!(self.state, EngineState::Running(_))
    }

    /// Returns the timebase the engine is running with.
    pub const fn config(&self) -> Option<EngineConfig> {
        match self.state {
            EngineState::Running(config) => Some(config),
            _ => None,
        }
    }

    /// Number of channels that can still be requested.
    pub fn free_channel_count(&self) -> usize {
        self.allocator.free_count()
    }

    /// Number of channels currently allocated.
    pub fn allocated_channel_count(&self) -> usize {
        self.allocator.allocated_count()
    }

    /// Returns the state of a live channel, or `None` if the handle has been freed.
    pub fn channel_state(&self, handle: &ChannelHandle) -> Option<ChannelState> {
        self.allocator.state(handle)
    }

    /// Returns the control surface.
    pub const fn backend(&self) -> &B {
        &self.backend
    }

    /// Returns the control surface mutably.
    ///
    /// Commands issued directly through the backend bypass the allocator's bookkeeping.
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::mock::{MockPwmBackend, PwmCommand};

    #[test]
    fn lifecycle() {
        let mut engine = PwmEngine::new(MockPwmBackend::new(4));
        assert!(matches!(
            engine.request_channel(4),
            Err(PwmError::NotInitialized)
        ));
        assert!(matches!(engine.shutdown(), Err(PwmError::NotInitialized)));

        engine.initialize(1, 10.0).unwrap();
        assert!(engine.is_initialized());
        assert_eq!(engine.config(), Some(EngineConfig::new(1, 10.0)));
        assert!(matches!(
            engine.initialize(1, 10.0),
            Err(PwmError::AlreadyInitialized)
        ));

        engine.shutdown().unwrap();
        assert_eq!(engine.state(), EngineState::ShutDown);
        assert!(matches!(
            engine.initialize(1, 10.0),
            Err(PwmError::AlreadyInitialized)
        ));
        assert_eq!(
            engine.backend().calls(),
            [PwmCommand::SetupEngine, PwmCommand::TeardownEngine]
        );
    }

    #[test]
    fn failed_setup_leaves_engine_uninitialized() {
        let mut backend = MockPwmBackend::new(4);
        backend.fail_nth(PwmCommand::SetupEngine, 1, crate::error::status::MAP_FAILURE);
        let mut engine = PwmEngine::new(backend);

        assert!(matches!(
            engine.initialize(1, 10.0),
            Err(PwmError::MapFailure)
        ));
        assert!(!engine.is_initialized());
        engine.initialize(1, 10.0).unwrap();
    }

    #[test]
    fn invalid_parameters_never_reach_the_backend() {
        let mut engine = PwmEngine::new(MockPwmBackend::new(4));
        assert!(matches!(
            engine.initialize(0, 10.0),
            Err(PwmError::InvalidArgs { .. })
        ));
        assert!(matches!(
            engine.initialize(1, -3.0),
            Err(PwmError::InvalidArgs { .. })
        ));
        assert!(engine.backend().calls().is_empty());
    }
}
