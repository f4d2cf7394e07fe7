//! DMA timebase configuration.
//!
//! Every channel shares a single DMA timebase. The engine splits each PWM period into slots of
//! `pulse_width_us` microseconds, and a period can span at most `page_count` pages of control
//! blocks. A channel's frequency is therefore only realizable when its period is between two
//! slots and the full buffer long.

use core::ops::RangeInclusive;

use snafu::ensure;

use crate::error::{FrequencyNotMetSnafu, InvalidArgsSnafu, InvalidFrequencySnafu, PwmError};

const MICROS_PER_SECOND: f64 = 1_000_000.0;

/// Parameters the DMA engine is initialized with.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct EngineConfig {
    /// Number of 4KiB pages of DMA control blocks.
    pub page_count: u32,
    /// Length of one DMA slot in microseconds.
    pub pulse_width_us: f32,
}

impl EngineConfig {
    /// DMA slots that fit in a single page.
    pub const SLOTS_PER_PAGE: u32 = 1024;

    /// Accepted page counts.
    pub const PAGE_COUNT_RANGE: RangeInclusive<u32> = 1..=64;

    /// Accepted pulse widths in microseconds.
    pub const PULSE_WIDTH_RANGE_US: RangeInclusive<f32> = 1.0..=1000.0;

    /// Creates a new configuration.
    #[must_use]
    pub const fn new(page_count: u32, pulse_width_us: f32) -> Self {
        Self {
            page_count,
            pulse_width_us,
        }
    }

    /// Checks that the parameters are within the ranges the engine accepts.
    ///
    /// # Errors
    ///
    /// Returns [`PwmError::InvalidArgs`] if the page count is outside of
    /// [`Self::PAGE_COUNT_RANGE`] or the pulse width is outside of
    /// [`Self::PULSE_WIDTH_RANGE_US`] (including NaN).
    pub fn validate(&self) -> Result<(), PwmError> {
        ensure!(
            Self::PAGE_COUNT_RANGE.contains(&self.page_count)
                && Self::PULSE_WIDTH_RANGE_US.contains(&self.pulse_width_us),
            InvalidArgsSnafu {
                page_count: self.page_count,
                pulse_width_us: self.pulse_width_us,
            }
        );
        Ok(())
    }

    /// Total number of slots in the DMA buffer.
    #[must_use]
    pub const fn slot_count(&self) -> u32 {
        self.page_count * Self::SLOTS_PER_PAGE
    }

    /// The lowest and highest frequencies the timebase can produce.
    #[must_use]
    pub fn frequency_range(&self) -> RangeInclusive<f32> {
        let pulse_width = f64::from(self.pulse_width_us);
        let lowest = MICROS_PER_SECOND / (f64::from(self.slot_count()) * pulse_width);
        let highest = MICROS_PER_SECOND / (2.0 * pulse_width);
        (lowest as f32)..=(highest as f32)
    }

    /// Returns the number of slots one period of `frequency_hz` occupies.
    ///
    /// # Errors
    ///
    /// - [`PwmError::InvalidFrequency`] if the frequency is not finite and positive.
    /// - [`PwmError::FrequencyNotMet`] if the period is shorter than two slots or longer than the
    ///   buffer.
    pub fn period_slots(&self, frequency_hz: f32) -> Result<u32, PwmError> {
        ensure!(
            frequency_hz.is_finite() && frequency_hz > 0.0,
            InvalidFrequencySnafu { frequency_hz }
        );

        let slots = (MICROS_PER_SECOND
            / (f64::from(frequency_hz) * f64::from(self.pulse_width_us)))
        .round();
        ensure!(
            slots >= 2.0 && slots <= f64::from(self.slot_count()),
            FrequencyNotMetSnafu
        );

        Ok(slots as u32)
    }

    /// Returns the frequency the timebase actually produces when asked for `frequency_hz`.
    ///
    /// # Errors
    ///
    /// See [`Self::period_slots`].
    pub fn realized_frequency(&self, frequency_hz: f32) -> Result<f32, PwmError> {
        let slots = self.period_slots(frequency_hz)?;
        Ok((MICROS_PER_SECOND / (f64::from(slots) * f64::from(self.pulse_width_us))) as f32)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new(1, 10.0)
    }
}
