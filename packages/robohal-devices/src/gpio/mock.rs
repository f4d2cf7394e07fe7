//! Simulated GPIO lines for testing.
//!
//! Clones of a [`MockGpio`] share one pin table, so several devices can be handed "the same
//! board" while a test drives input levels and inspects outputs from the outside.

#![cfg(any(test, feature = "mock"))]

use std::{collections::BTreeMap, sync::Arc};

use robohal_core::BcmPin;
use snafu::{ensure, OptionExt};
use spin::Mutex;

use super::{
    GpioBackend, GpioError, InvalidModeSnafu, LogicLevel, NotConfiguredSnafu, PinInUseSnafu,
    PinMode,
};

#[derive(Debug, Clone, Copy)]
struct Line {
    mode: PinMode,
    level: LogicLevel,
}

#[derive(Debug, Default)]
struct Board {
    lines: BTreeMap<BcmPin, Line>,
    inputs: BTreeMap<BcmPin, LogicLevel>,
}

/// An in-memory [`GpioBackend`].
///
/// Input lines read [`LogicLevel::High`] (their pull-up) unless a level has been injected with
/// [`MockGpio::set_input_level`].
#[derive(Debug, Clone, Default)]
pub struct MockGpio {
    board: Arc<Mutex<Board>>,
}

impl MockGpio {
    /// Creates a board with every line unclaimed.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the level an external circuit drives onto `pin`.
    pub fn set_input_level(&self, pin: BcmPin, level: LogicLevel) {
        self.board.lock().inputs.insert(pin, level);
    }

    /// Returns the level of a claimed line.
    #[must_use]
    pub fn level(&self, pin: BcmPin) -> Option<LogicLevel> {
        let board = self.board.lock();
        let line = board.lines.get(&pin)?;
        Some(match line.mode {
            PinMode::Output => line.level,
            PinMode::Input => Self::input_level(&board, pin),
        })
    }

    /// Returns how a line is claimed, or `None` if it is free.
    #[must_use]
    pub fn mode(&self, pin: BcmPin) -> Option<PinMode> {
        self.board.lock().lines.get(&pin).map(|line| line.mode)
    }

    /// Returns `true` if the line is claimed.
    #[must_use]
    pub fn is_claimed(&self, pin: BcmPin) -> bool {
        self.board.lock().lines.contains_key(&pin)
    }

    fn input_level(board: &Board, pin: BcmPin) -> LogicLevel {
        board.inputs.get(&pin).copied().unwrap_or(LogicLevel::High)
    }

    fn claim(&self, pin: BcmPin, line: Line) -> Result<(), GpioError> {
        let mut board = self.board.lock();
        ensure!(!board.lines.contains_key(&pin), PinInUseSnafu { pin });
        board.lines.insert(pin, line);
        Ok(())
    }
}

impl GpioBackend for MockGpio {
    fn configure_output(&mut self, pin: BcmPin, initial: LogicLevel) -> Result<(), GpioError> {
        self.claim(
            pin,
            Line {
                mode: PinMode::Output,
                level: initial,
            },
        )
    }

    fn configure_input(&mut self, pin: BcmPin) -> Result<(), GpioError> {
        self.claim(
            pin,
            Line {
                mode: PinMode::Input,
                level: LogicLevel::High,
            },
        )
    }

    fn write(&mut self, pin: BcmPin, level: LogicLevel) -> Result<(), GpioError> {
        let mut board = self.board.lock();
        let line = board.lines.get_mut(&pin).context(NotConfiguredSnafu { pin })?;
        ensure!(
            line.mode == PinMode::Output,
            InvalidModeSnafu {
                pin,
                mode: line.mode
            }
        );
        line.level = level;
        Ok(())
    }

    fn read(&self, pin: BcmPin) -> Result<LogicLevel, GpioError> {
        let board = self.board.lock();
        let line = board.lines.get(&pin).context(NotConfiguredSnafu { pin })?;
        ensure!(
            line.mode == PinMode::Input,
            InvalidModeSnafu {
                pin,
                mode: line.mode
            }
        );
        Ok(Self::input_level(&board, pin))
    }

    fn release(&mut self, pin: BcmPin) -> Result<(), GpioError> {
        self.board
            .lock()
            .lines
            .remove(&pin)
            .context(NotConfiguredSnafu { pin })?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn pin(number: u8) -> BcmPin {
        BcmPin::new(number).unwrap()
    }

    #[test]
    fn clones_share_lines() {
        let mut a = MockGpio::new();
        let mut b = a.clone();

        a.configure_output(pin(4), LogicLevel::High).unwrap();
        assert!(matches!(
            b.configure_input(pin(4)),
            Err(GpioError::PinInUse { .. })
        ));

        b.write(pin(4), LogicLevel::Low).unwrap();
        assert_eq!(a.level(pin(4)), Some(LogicLevel::Low));

        a.release(pin(4)).unwrap();
        assert!(!b.is_claimed(pin(4)));
        assert!(matches!(
            b.release(pin(4)),
            Err(GpioError::NotConfigured { .. })
        ));
    }

    #[test]
    fn inputs_default_to_pull_up() {
        let mut gpio = MockGpio::new();
        gpio.configure_input(pin(27)).unwrap();
        assert_eq!(gpio.read(pin(27)).unwrap(), LogicLevel::High);

        gpio.set_input_level(pin(27), LogicLevel::Low);
        assert_eq!(gpio.read(pin(27)).unwrap(), LogicLevel::Low);
        assert!(matches!(
            gpio.write(pin(27), LogicLevel::High),
            Err(GpioError::InvalidMode {
                mode: PinMode::Input,
                ..
            })
        ));
    }
}
