//! Drives a DRV8833 on a Raspberry Pi forwards, backwards, then brakes.
//!
//! The PWM helper programs must be installed (see `CommandBackend::DEFAULT_DIR`) and the
//! program has to run as root for the DMA engine to map its memory.

use std::{thread, time::Duration};

use robohal::prelude::*;

struct StderrLogger;

impl log::Log for StderrLogger {
    fn enabled(&self, metadata: &log::Metadata<'_>) -> bool {
        metadata.level() <= log::Level::Info
    }

    fn log(&self, record: &log::Record<'_>) {
        if self.enabled(record.metadata()) {
            eprintln!("[{:<5}] {}", record.level(), record.args());
        }
    }

    fn flush(&self) {}
}

static LOGGER: StderrLogger = StderrLogger;

fn run(driver: &mut Drv8833<CommandBackend, RppalGpio>) -> Result<(), MotorError> {
    driver.configure_gpio()?;
    driver.configure_pwm()?;

    for speed in [96, 255, 0, -96, -255] {
        log::info!("speed {speed}");
        driver.set_motor_speed(Motor::A, speed)?;
        driver.set_motor_speed(Motor::B, speed)?;
        thread::sleep(Duration::from_secs(1));
    }

    driver.brake(Motor::A)?;
    driver.brake(Motor::B)?;
    thread::sleep(Duration::from_millis(250));
    driver.stop()
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    log::set_logger(&LOGGER)?;
    log::set_max_level(log::LevelFilter::Info);

    let backend = CommandBackend::take(CommandBackend::DEFAULT_DIR)
        .ok_or("the PWM engine is already claimed")?;
    let engine = PwmEngine::new(backend).into_shared();
    engine.lock().initialize_with(EngineConfig::default())?;

    let pins = Drv8833Pins {
        ain1: 12,
        ain2: 13,
        bin1: 20,
        bin2: 21,
        sleep: 5,
        fault: 6,
    };
    let mut driver = Drv8833::new(engine.clone(), RppalGpio::new()?, Drv8833Config::new(pins))?;

    // Always give the channels back, even if driving failed halfway.
    let result = run(&mut driver);
    let cleaned = match driver.state() {
        robohal::drv8833::ControllerState::Uninitialized => Ok(()),
        _ => driver.cleanup(),
    };
    result?;
    cleaned?;

    engine.lock().shutdown()?;
    Ok(())
}
