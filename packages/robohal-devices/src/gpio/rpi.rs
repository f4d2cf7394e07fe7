//! GPIO on Raspberry Pi boards, through the `rppal` crate.

use std::collections::BTreeMap;

use robohal_core::BcmPin;
use rppal::gpio::{Gpio, InputPin, Level, OutputPin};
use snafu::{ensure, OptionExt};

use super::{
    GpioBackend, GpioError, InvalidModeSnafu, LogicLevel, NotConfiguredSnafu, PinInUseSnafu,
    PinMode,
};

#[derive(Debug)]
enum Line {
    Input(InputPin),
    Output(OutputPin),
}

impl Line {
    const fn mode(&self) -> PinMode {
        match self {
            Self::Input(_) => PinMode::Input,
            Self::Output(_) => PinMode::Output,
        }
    }
}

/// A [`GpioBackend`] for the SoC's GPIO peripheral.
///
/// Several `RppalGpio`s can exist at the same time; `rppal` tracks which lines are taken across
/// all of them, so two backends can never claim the same line.
///
/// Lines still claimed when the backend is dropped are reset to inputs.
#[derive(Debug)]
pub struct RppalGpio {
    gpio: Gpio,
    lines: BTreeMap<BcmPin, Line>,
}

impl RppalGpio {
    /// Opens the GPIO peripheral.
    ///
    /// # Errors
    ///
    /// Returns [`GpioError::Rppal`] if the peripheral cannot be mapped, e.g. because the board is
    /// not a Raspberry Pi.
    pub fn new() -> Result<Self, GpioError> {
        Ok(Self {
            gpio: Gpio::new()?,
            lines: BTreeMap::new(),
        })
    }

    fn line(&self, pin: BcmPin) -> Result<&Line, GpioError> {
        self.lines.get(&pin).context(NotConfiguredSnafu { pin })
    }
}

impl GpioBackend for RppalGpio {
    fn configure_output(&mut self, pin: BcmPin, initial: LogicLevel) -> Result<(), GpioError> {
        ensure!(!self.lines.contains_key(&pin), PinInUseSnafu { pin });

        let line = self.gpio.get(pin.number())?;
        let output = match initial {
            LogicLevel::High => line.into_output_high(),
            LogicLevel::Low => line.into_output_low(),
        };
        self.lines.insert(pin, Line::Output(output));
        Ok(())
    }

    fn configure_input(&mut self, pin: BcmPin) -> Result<(), GpioError> {
        ensure!(!self.lines.contains_key(&pin), PinInUseSnafu { pin });

        let input = self.gpio.get(pin.number())?.into_input_pullup();
        self.lines.insert(pin, Line::Input(input));
        Ok(())
    }

    fn write(&mut self, pin: BcmPin, level: LogicLevel) -> Result<(), GpioError> {
        match self.lines.get_mut(&pin).context(NotConfiguredSnafu { pin })? {
            Line::Output(output) => {
                match level {
                    LogicLevel::High => output.set_high(),
                    LogicLevel::Low => output.set_low(),
                }
                Ok(())
            }
            line => InvalidModeSnafu {
                pin,
                mode: line.mode(),
            }
            .fail(),
        }
    }

    fn read(&self, pin: BcmPin) -> Result<LogicLevel, GpioError> {
        match self.line(pin)? {
            Line::Input(input) => Ok(match input.read() {
                Level::High => LogicLevel::High,
                Level::Low => LogicLevel::Low,
            }),
            line => InvalidModeSnafu {
                pin,
                mode: line.mode(),
            }
            .fail(),
        }
    }

    fn release(&mut self, pin: BcmPin) -> Result<(), GpioError> {
        self.lines.remove(&pin).context(NotConfiguredSnafu { pin })?;
        Ok(())
    }
}
