//! Loading channel configuration from the process environment.

use std::time::Duration;

use lossy_link::{Channel, ChannelConfig, ConfigError, Frame, Outcome};
use serial_test::serial;

const VARS: [&str; 5] = [
    "CHANNEL_LOSS_PROBABILITY",
    "CHANNEL_ERROR_PROBABILITY",
    "CHANNEL_MAX_DELAY",
    "CHANNEL_TIME_UNIT_MS",
    "CHANNEL_SEED",
];

fn set_env(pairs: &[(&str, &str)]) {
    for var in VARS {
        // SAFETY: tests touching the environment run serially.
        unsafe { std::env::remove_var(var) };
    }
    for (key, value) in pairs {
        // SAFETY: as above.
        unsafe { std::env::set_var(key, value) };
    }
}

#[test_log::test]
#[serial]
fn test_unset_variables_fall_back_to_defaults() {
    set_env(&[]);

    assert_eq!(ChannelConfig::from_env().unwrap(), ChannelConfig::default());
}

#[test_log::test]
#[serial]
fn test_variables_override_defaults() {
    set_env(&[
        ("CHANNEL_LOSS_PROBABILITY", "0"),
        ("CHANNEL_ERROR_PROBABILITY", "0"),
        ("CHANNEL_MAX_DELAY", "0"),
        ("CHANNEL_TIME_UNIT_MS", "10"),
        ("CHANNEL_SEED", "1234"),
    ]);

    let config = ChannelConfig::from_env().unwrap();
    assert_eq!(config.max_delay, 0);
    assert_eq!(config.time_unit, Duration::from_millis(10));
    assert_eq!(config.seed, Some(1234));

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap();
    let channel = Channel::new(config).unwrap();
    let outcome = runtime.block_on(channel.transmit(Frame::data(0, "env")));

    assert_eq!(
        outcome,
        Outcome::Delivered {
            frame: Frame::data(0, "env"),
            delay: 0,
            corrupted_at: None,
        }
    );
}

#[test_log::test]
#[serial]
fn test_negative_max_delay_is_rejected() {
    set_env(&[("CHANNEL_MAX_DELAY", "-1")]);

    assert_eq!(ChannelConfig::from_env(), Err(ConfigError::NegativeMaxDelay(-1)));
}

#[test_log::test]
#[serial]
fn test_out_of_range_probability_is_rejected() {
    set_env(&[("CHANNEL_ERROR_PROBABILITY", "1.01")]);

    let err = ChannelConfig::from_env().unwrap_err();
    assert_eq!(err.to_string(), "error probability must lie in [0, 1], got 1.01");
}
