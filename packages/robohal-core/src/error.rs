//! Helpers for dealing with status codes.
//!
//! Every operation on the external PWM control surface finishes with a small integer status.
//! Zero means success; anything else is an error code that needs translating into one of the
//! typed errors exposed by the higher level crates. This module provides the raw status type
//! and the [`map_status!`](crate::map_status) macro used to build those translations.

use core::fmt;

/// A raw, untranslated status code reported by an external control surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawStatus(i32);

impl RawStatus {
    /// Creates a status from its numeric code.
    #[must_use]
    pub const fn new(code: i32) -> Self {
        Self(code)
    }

    /// Creates a status from a process exit code.
    ///
    /// Exit codes only carry the low byte of the value a program returned, so they are
    /// reinterpreted as a signed byte: a program that returned `-1` exits with `255`.
    #[must_use]
    pub const fn from_exit_code(code: u8) -> Self {
        Self(code as i8 as i32)
    }

    /// Returns the numeric code.
    #[must_use]
    pub const fn code(self) -> i32 {
        self.0
    }

    /// Returns `true` if this status reports success.
    #[must_use]
    pub const fn is_ok(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for RawStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "status {}", self.0)
    }
}

impl From<i32> for RawStatus {
    fn from(code: i32) -> Self {
        Self(code)
    }
}

/// A trait for converting a raw status into an error type.
///
/// Implementations must be total: every status, including ones the control surface was never
/// documented to return, maps to *some* error.
pub trait FromStatus {
    /// Translates `status` into `Self`.
    fn from_status(status: RawStatus) -> Self;
}

/// Generate an implementation of [`FromStatus`] (and `From<RawStatus>`) for the given type.
///
/// The `otherwise` arm binds the unmatched code and must produce a fallback, which keeps the
/// translation total.
///
/// Example:
/// ```ignore
/// map_status! {
///     PwmError {
///         3 | -3 => Self::NoFreeChannel,
///     }
///     otherwise code => Self::Unknown { code };
/// }
/// ```
#[macro_export]
macro_rules! map_status {
    {
        $err_ty:ty { $($status:pat => $err:expr),*$(,)? }
        otherwise $code:ident => $fallback:expr;
    } => {
        impl $crate::error::FromStatus for $err_ty {
            fn from_status(status: $crate::error::RawStatus) -> Self {
                match status.code() {
                    $($status => $err,)*
                    $code => $fallback,
                }
            }
        }

        impl ::core::convert::From<$crate::error::RawStatus> for $err_ty {
            fn from(status: $crate::error::RawStatus) -> Self {
                <Self as $crate::error::FromStatus>::from_status(status)
            }
        }
    }
}
