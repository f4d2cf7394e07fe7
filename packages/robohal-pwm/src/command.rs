//! Process-spawning control surface.
//!
//! The DMA PWM engine ships as a set of small helper programs, one per command, that link
//! against the engine library and run as root. [`CommandBackend`] runs them and decodes their
//! replies:
//!
//! | command             | arguments                  | stdout on success |
//! |---------------------|----------------------------|-------------------|
//! | `setup_engine`      | `<pages> <pulse_width_us>` | -                 |
//! | `teardown_engine`   | -                          | -                 |
//! | `request_channel`   | -                          | channel id        |
//! | `free_channel`      | `<id>`                     | -                 |
//! | `configure_channel` | `<id> <pin> <freq> <duty>` | -                 |
//! | `enable_pwm`        | `<id>`                     | -                 |
//! | `disable_pwm`       | `<id>`                     | -                 |
//!
//! A zero exit status is success. Any other exit status is the engine's error code truncated to
//! a byte, so it is read back as a signed byte before translation (`255` is the `-1`
//! wrong-argument-count sentinel).

use std::{
    path::{Path, PathBuf},
    process::Command,
    sync::atomic::{AtomicBool, Ordering},
};

use robohal_core::error::RawStatus;
use snafu::{OptionExt, ResultExt};

use crate::{
    backend::{PwmBackend, Reply},
    error::{ControlSurfaceSnafu, MalformedReplySnafu, PwmError},
};

static ENGINE_CLAIMED: AtomicBool = AtomicBool::new(false);

/// A [`PwmBackend`] that runs one helper program per command.
#[derive(Debug)]
pub struct CommandBackend {
    dir: PathBuf,
    channel_count: usize,
}

impl CommandBackend {
    /// Directory the helper programs are installed to by default.
    pub const DEFAULT_DIR: &'static str = "/usr/local/lib/robohal/pwm";

    /// Number of channels the engine multiplexes unless configured otherwise.
    pub const DEFAULT_CHANNEL_COUNT: usize = 16;

    /// Claims the process' DMA engine, running helpers from `dir`.
    ///
    /// There is only one DMA engine per process. The first call returns `Some`; every later
    /// call returns `None`.
    pub fn take(dir: impl Into<PathBuf>) -> Option<Self> {
        if ENGINE_CLAIMED.swap(true, Ordering::AcqRel) {
            None
        } else {
            Some(Self {
                dir: dir.into(),
                channel_count: Self::DEFAULT_CHANNEL_COUNT,
            })
        }
    }

    /// Sets how many channels the engine multiplexes.
    #[must_use]
    pub fn with_channel_count(mut self, channel_count: usize) -> Self {
        self.channel_count = channel_count;
        self
    }

    /// Returns the directory helper programs are run from.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn run(&self, command: &str, args: &[String]) -> Reply {
        let program = self.dir.join(command);
        log::debug!("running {} {}", program.display(), args.join(" "));

        let output = Command::new(&program)
            .args(args)
            .output()
            .context(ControlSurfaceSnafu { command })?;

        decode_reply(command, output.status.code(), &output.stdout)
    }
}

/// Decodes the outcome of a helper program.
///
/// `exit_code` is `None` when the program was terminated by a signal.
pub(crate) fn decode_reply(command: &str, exit_code: Option<i32>, stdout: &[u8]) -> Reply {
    let code = exit_code.context(MalformedReplySnafu {
        command,
        output: "terminated by signal",
    })?;

    if code != 0 {
        return Err(PwmError::from(RawStatus::from_exit_code(code as u8)));
    }

    let text = String::from_utf8_lossy(stdout);
    let text = text.trim();
    if text.is_empty() {
        return Ok(0);
    }

    text.parse().ok().context(MalformedReplySnafu {
        command,
        output: text,
    })
}

impl PwmBackend for CommandBackend {
    fn channel_count(&self) -> usize {
        self.channel_count
    }

    fn setup_engine(&mut self, page_count: u32, pulse_width_us: f32) -> Reply {
        self.run(
            "setup_engine",
            &[page_count.to_string(), pulse_width_us.to_string()],
        )
    }

    fn teardown_engine(&mut self) -> Reply {
        self.run("teardown_engine", &[])
    }

    fn request_channel(&mut self) -> Reply {
        self.run("request_channel", &[])
    }

    fn free_channel(&mut self, channel: u32) -> Reply {
        self.run("free_channel", &[channel.to_string()])
    }

    fn configure_channel(&mut self, channel: u32, pin: u8, frequency_hz: f32, duty: f32) -> Reply {
        self.run(
            "configure_channel",
            &[
                channel.to_string(),
                pin.to_string(),
                frequency_hz.to_string(),
                duty.to_string(),
            ],
        )
    }

    fn enable_pwm(&mut self, channel: u32) -> Reply {
        self.run("enable_pwm", &[channel.to_string()])
    }

    fn disable_pwm(&mut self, channel: u32) -> Reply {
        self.run("disable_pwm", &[channel.to_string()])
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn replies() {
        assert_eq!(decode_reply("request_channel", Some(0), b"5\n").unwrap(), 5);
        assert_eq!(decode_reply("enable_pwm", Some(0), b"").unwrap(), 0);
        assert!(matches!(
            decode_reply("request_channel", Some(3), b""),
            Err(PwmError::NoFreeChannel)
        ));
        assert!(matches!(
            decode_reply("free_channel", Some(255), b""),
            Err(PwmError::InvalidArgCount)
        ));
        assert!(matches!(
            decode_reply("free_channel", Some(252), b""),
            Err(PwmError::InvalidChannel)
        ));
        assert!(matches!(
            decode_reply("request_channel", Some(0), b"channel?"),
            Err(PwmError::MalformedReply { .. })
        ));
        assert!(matches!(
            decode_reply("request_channel", None, b""),
            Err(PwmError::MalformedReply { .. })
        ));
    }

    #[test]
    fn engine_is_claimed_once() {
        let first = CommandBackend::take("/nonexistent/robohal");
        assert!(first.is_some());
        assert!(CommandBackend::take("/nonexistent/robohal").is_none());

        let mut backend = first.unwrap().with_channel_count(4);
        assert_eq!(backend.channel_count(), 4);
        assert!(matches!(
            backend.request_channel(),
            Err(PwmError::ControlSurface { .. })
        ));
    }
}
