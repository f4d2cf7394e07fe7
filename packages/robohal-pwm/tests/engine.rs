use robohal_core::error::{FromStatus, RawStatus};
use robohal_pwm::{
    error::status,
    mock::{MockPwmBackend, PwmCommand},
    PwmEngine, PwmError,
};

fn running(channels: usize) -> PwmEngine<MockPwmBackend> {
    let mut engine = PwmEngine::new(MockPwmBackend::new(channels));
    engine.initialize(1, 10.0).unwrap();
    engine
}

#[test]
fn pins_are_owned_by_one_channel() {
    let mut engine = running(8);
    let channel = engine.request_channel(17).unwrap();

    assert!(matches!(
        engine.request_channel(17),
        Err(PwmError::InvalidGpio)
    ));

    engine.free_channel(&channel).unwrap();
    let again = engine.request_channel(17).unwrap();
    engine.free_channel(&again).unwrap();
}

#[test]
fn double_free_is_rejected() {
    let mut engine = running(8);
    let channel = engine.request_channel(22).unwrap();

    engine.free_channel(&channel).unwrap();
    assert!(matches!(
        engine.free_channel(&channel),
        Err(PwmError::InvalidChannel)
    ));
    assert_eq!(engine.backend().call_count(PwmCommand::FreeChannel), 1);
}

#[test]
fn pool_exhaustion_and_bad_pins() {
    let mut engine = running(2);
    assert!(matches!(
        engine.request_channel(28),
        Err(PwmError::InvalidGpio)
    ));

    let a = engine.request_channel(5).unwrap();
    let b = engine.request_channel(6).unwrap();
    assert_eq!(engine.free_channel_count(), 0);
    assert!(matches!(
        engine.request_channel(13),
        Err(PwmError::NoFreeChannel)
    ));
    assert_eq!(engine.backend().call_count(PwmCommand::RequestChannel), 2);

    engine.free_channel(&a).unwrap();
    engine.free_channel(&b).unwrap();
    assert_eq!(engine.free_channel_count(), 2);
}

#[test]
fn toggling_preserves_duty() {
    let mut engine = running(4);
    let channel = engine.request_channel(12).unwrap();

    assert!(matches!(
        engine.enable_channel(&channel),
        Err(PwmError::ChannelNotSet)
    ));
    assert!(matches!(
        engine.set_duty_cycle(&channel, 10.0),
        Err(PwmError::ChannelNotSet)
    ));

    engine.configure_channel(&channel, 100.0, 37.5).unwrap();
    engine.enable_channel(&channel).unwrap();
    assert_eq!(engine.backend().output_on_pin(12), 37.5);

    engine.disable_channel(&channel).unwrap();
    assert_eq!(engine.backend().output_on_pin(12), 0.0);
    assert_eq!(engine.channel_state(&channel).unwrap().duty, 37.5);

    engine.enable_channel(&channel).unwrap();
    assert_eq!(engine.backend().output_on_pin(12), 37.5);

    engine.set_duty_cycle(&channel, 80.0).unwrap();
    let state = engine.channel_state(&channel).unwrap();
    assert_eq!(state.frequency_hz, Some(100.0));
    assert_eq!(state.output_duty(), 80.0);

    engine.free_channel(&channel).unwrap();
}

#[test]
fn configuration_is_validated_before_the_backend() {
    let mut engine = running(4);
    let channel = engine.request_channel(4).unwrap();

    assert!(matches!(
        engine.configure_channel(&channel, 100.0, 100.5),
        Err(PwmError::InvalidDutyCycle)
    ));
    assert!(matches!(
        engine.configure_channel(&channel, 100.0, f32::NAN),
        Err(PwmError::InvalidDutyCycle)
    ));
    assert!(matches!(
        engine.configure_channel(&channel, 0.0, 50.0),
        Err(PwmError::InvalidFrequency { .. })
    ));
    assert!(matches!(
        engine.configure_channel(&channel, 10.0, 50.0),
        Err(PwmError::FrequencyNotMet)
    ));
    assert_eq!(engine.backend().call_count(PwmCommand::ConfigureChannel), 0);

    engine.configure_channel(&channel, 100.0, 0.0).unwrap();
    engine.configure_channel(&channel, 100.0, 100.0).unwrap();
    engine.free_channel(&channel).unwrap();
}

#[test]
fn shutdown_requires_every_channel_freed() {
    let mut engine = running(4);
    let channel = engine.request_channel(23).unwrap();

    assert!(matches!(
        engine.shutdown(),
        Err(PwmError::ResourceBusy { allocated: 1 })
    ));
    assert!(engine.is_initialized());
    assert_eq!(engine.backend().call_count(PwmCommand::TeardownEngine), 0);

    engine.free_channel(&channel).unwrap();
    engine.shutdown().unwrap();
    assert!(matches!(
        engine.request_channel(23),
        Err(PwmError::NotInitialized)
    ));
    assert!(matches!(
        engine.configure_channel(&channel, 100.0, 0.0),
        Err(PwmError::ChannelNotSet)
    ));
}

#[test]
fn backend_failures_are_translated() {
    let mut backend = MockPwmBackend::new(4);
    backend.fail_nth(PwmCommand::RequestChannel, 1, status::CHANNEL_REQUEST_FAILED);
    backend.fail_nth(PwmCommand::ConfigureChannel, 1, 42);
    let mut engine = PwmEngine::new(backend);
    engine.initialize(1, 10.0).unwrap();

    assert!(matches!(
        engine.request_channel(9),
        Err(PwmError::ChannelRequestFailed)
    ));
    assert_eq!(engine.allocated_channel_count(), 0);

    let channel = engine.request_channel(9).unwrap();
    assert!(matches!(
        engine.configure_channel(&channel, 100.0, 50.0),
        Err(PwmError::Unknown { code: 42 })
    ));
    assert!(!engine.channel_state(&channel).unwrap().is_configured());
    engine.free_channel(&channel).unwrap();
}

#[test]
fn translation_never_panics() {
    for code in (-300..=300).chain([i32::MIN, i32::MIN + 1, i32::MAX]) {
        let _err = PwmError::from_status(RawStatus::new(code));
    }
    assert!(matches!(
        PwmError::from(RawStatus::from_exit_code(255)),
        PwmError::InvalidArgCount
    ));
}
