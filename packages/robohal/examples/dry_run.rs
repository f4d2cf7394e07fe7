//! Runs two DRV8833s against the in-memory backends and prints what each pin would output.

use robohal::prelude::*;

struct StderrLogger;

impl log::Log for StderrLogger {
    fn enabled(&self, _metadata: &log::Metadata<'_>) -> bool {
        true
    }

    fn log(&self, record: &log::Record<'_>) {
        eprintln!("[{:<5} {}] {}", record.level(), record.target(), record.args());
    }

    fn flush(&self) {}
}

static LOGGER: StderrLogger = StderrLogger;

const FRONT: Drv8833Pins = Drv8833Pins {
    ain1: 12,
    ain2: 13,
    bin1: 20,
    bin2: 21,
    sleep: 5,
    fault: 6,
};

const REAR: Drv8833Pins = Drv8833Pins {
    ain1: 16,
    ain2: 19,
    bin1: 26,
    bin2: 23,
    sleep: 24,
    fault: 25,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    log::set_logger(&LOGGER)?;
    log::set_max_level(log::LevelFilter::Debug);

    let engine = PwmEngine::new(MockPwmBackend::new(16)).into_shared();
    engine.lock().initialize_with(EngineConfig::default())?;

    let gpio = MockGpio::new();
    let mut front = Drv8833::new(engine.clone(), gpio.clone(), Drv8833Config::new(FRONT))?;
    let mut rear = Drv8833::new(
        engine.clone(),
        gpio.clone(),
        Drv8833Config::new(REAR).with_frequency(200.0),
    )?;

    for driver in [&mut front, &mut rear] {
        driver.configure_gpio()?;
        driver.configure_pwm()?;
    }

    for speed in [0, 64, 128, 255, -128, -255] {
        front.set_motor_speed(Motor::A, speed)?;
        rear.set_motor_speed(Motor::B, -speed)?;

        let engine = engine.lock();
        let backend = engine.backend();
        println!(
            "speed {speed:>4}: front AIN1 {:>5.1}% AIN2 {:>5.1}% \
             | rear BIN1 {:>5.1}% BIN2 {:>5.1}%",
            backend.output_on_pin(FRONT.ain1),
            backend.output_on_pin(FRONT.ain2),
            backend.output_on_pin(REAR.bin1),
            backend.output_on_pin(REAR.bin2),
        );
    }

    front.brake(Motor::A)?;
    rear.stop()?;
    println!("front fault: {}", front.get_fault()?);

    front.cleanup()?;
    rear.cleanup()?;
    engine.lock().shutdown()?;
    Ok(())
}
