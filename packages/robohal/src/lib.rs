//! # robohal
//!
//! Hardware abstraction layer for small Raspberry Pi robots. robohal drives any header pin with
//! DMA-generated PWM and builds motor drivers on top of it.
//!
//! # Usage
//!
//! Create one [`PwmEngine`](crate::pwm::PwmEngine) for the process, share it between devices,
//! and shut it down once every device has been cleaned up:
//!
//! ```no_run
//! use robohal::prelude::*;
//!
//! let backend =
//!     CommandBackend::take(CommandBackend::DEFAULT_DIR).ok_or("engine already claimed")?;
//! let engine = PwmEngine::new(backend).into_shared();
//! engine.lock().initialize_with(EngineConfig::default())?;
//!
//! // ... construct devices with `engine.clone()` ...
//!
//! engine.lock().shutdown()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! Check out the `examples` directory of this crate for complete programs.

#[doc(inline)]
#[cfg(feature = "core")]
pub use robohal_core::{error, pin};
#[doc(inline)]
#[cfg(feature = "devices")]
pub use robohal_devices::{drv8833, gpio};
#[doc(inline)]
#[cfg(feature = "pwm")]
pub use robohal_pwm as pwm;

/// Commonly used features of robohal.
///
/// This module is meant to be glob imported.
pub mod prelude {
    #[cfg(feature = "core")]
    pub use crate::pin::BcmPin;
    #[cfg(feature = "pwm")]
    pub use crate::pwm::{
        ChannelHandle, CommandBackend, EngineConfig, PwmBackend, PwmEngine, PwmError,
        SharedEngine,
    };
    #[cfg(feature = "devices")]
    pub use crate::{
        drv8833::{Drv8833, Drv8833Config, Drv8833Pins, Motor, MotorError},
        gpio::{GpioBackend, GpioError, LogicLevel},
    };
    #[cfg(feature = "mock")]
    pub use crate::{gpio::MockGpio, pwm::mock::MockPwmBackend};
    #[cfg(feature = "rpi")]
    pub use crate::gpio::RppalGpio;
}
