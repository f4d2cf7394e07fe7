//! DMA-backed PWM channels for robohal.
//!
//! # Overview
//!
//! The Raspberry Pi only has two hardware PWM peripherals, which is not enough to drive even a
//! single dual H-bridge. robohal instead uses a DMA engine that toggles GPIO lines from a ring
//! of control blocks, which lets any header pin output PWM. The engine multiplexes a fixed
//! number of channels over one shared timebase.
//!
//! Everything goes through a [`PwmEngine`], which owns the control surface (a [`PwmBackend`])
//! and the bookkeeping of which channel drives which pin:
//!
//! ```
//! use robohal_pwm::{mock::MockPwmBackend, PwmEngine};
//!
//! let engine = PwmEngine::new(MockPwmBackend::new(8)).into_shared();
//! engine.lock().initialize(1, 10.0)?;
//!
//! // Pin 18 in BCM numbering (physical pin 12).
//! let channel = engine.lock().request_channel(18)?;
//! engine.lock().configure_channel(&channel, 1_000.0, 25.0)?;
//! engine.lock().enable_channel(&channel)?;
//! # engine.lock().free_channel(&channel)?;
//! # Ok::<(), robohal_pwm::PwmError>(())
//! ```
//!
//! On a real board the engine is driven by a [`CommandBackend`], which can only be claimed once
//! per process.

pub mod allocator;
pub mod backend;
pub mod channel;
pub mod command;
pub mod config;
pub mod engine;
pub mod error;
pub mod mock;

pub use allocator::ChannelAllocator;
pub use backend::{PwmBackend, Reply};
pub use channel::{ChannelHandle, ChannelState};
pub use command::CommandBackend;
pub use config::EngineConfig;
pub use engine::{EngineState, PwmEngine, SharedEngine};
pub use error::PwmError;
