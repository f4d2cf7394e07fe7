//! Low level core functionality for robohal.
//! The core crate is used in all other crates in the robohal ecosystem.
//!
//! Included in this crate:
//! - Status code handling: [`error`]
//! - BCM pin numbering: [`pin`]

pub mod error;
pub mod pin;

pub use pin::BcmPin;
