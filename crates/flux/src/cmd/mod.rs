use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Subcommand};
use flux_effect::{EffectKind, EffectRegistry, SchedulerConfig};
use flux_frame::{FrameConfig, DEFAULT_MAX_FRAME};
use flux_session::{SessionConfig, ShutdownSignal};
use flux_transport::{DEFAULT_BAUD_RATE, DEFAULT_DEVICE};

use crate::exit::{effect_error, CliError, CliResult, FAILURE};
use crate::output::OutputFormat;

pub mod effects;
pub mod replay;
pub mod run;
pub mod send;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the controller; with --stomp, serve commands from a serial device.
    Run(RunArgs),
    /// Run one session over a captured byte stream and summarise it.
    Replay(ReplayArgs),
    /// Frame a single command and write it to a device or stdout.
    Send(SendArgs),
    /// List the effect catalog.
    Effects(EffectsArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Run(args) => run::run(args, format),
        Command::Replay(args) => replay::run(args, format),
        Command::Send(args) => send::run(args),
        Command::Effects(args) => effects::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

/// Session tuning shared by `run` and `replay`.
#[derive(Args, Debug)]
pub struct SessionArgs {
    /// Scheduling quantum (e.g. 20ms).
    #[arg(long, default_value = "20ms")]
    pub tick: String,
    /// How long a superseded effect may take to stop (e.g. 200ms, 1s).
    #[arg(long, default_value = "200ms")]
    pub stop_timeout: String,
    /// Do not write RECEIPT/ERROR frames back.
    #[arg(long)]
    pub no_ack: bool,
    /// Largest accepted frame in bytes.
    #[arg(long, default_value_t = DEFAULT_MAX_FRAME)]
    pub max_frame: usize,
}

impl SessionArgs {
    pub fn session_config(&self) -> CliResult<SessionConfig> {
        if self.max_frame == 0 {
            return Err(CliError::usage("--max-frame must be greater than zero"));
        }
        Ok(SessionConfig {
            frame: FrameConfig {
                max_frame_size: self.max_frame,
                ..FrameConfig::default()
            },
            scheduler: SchedulerConfig {
                tick_interval: parse_duration(&self.tick)?,
                stop_timeout: parse_duration(&self.stop_timeout)?,
            },
            acknowledge: !self.no_ack,
        })
    }
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Enable the serial subsystem.
    #[arg(long, env = "FLUX_STOMP")]
    pub stomp: bool,
    /// Serial device path.
    #[arg(long, default_value = DEFAULT_DEVICE, env = "FLUX_DEVICE")]
    pub device: String,
    /// Serial line speed.
    #[arg(long, default_value_t = DEFAULT_BAUD_RATE, env = "FLUX_BAUD")]
    pub baud: u32,
    /// Reopen the device after the line drops.
    #[arg(long)]
    pub reconnect: bool,
    /// Wait before each reconnect attempt (e.g. 2s).
    #[arg(long, default_value = "2s")]
    pub reconnect_delay: String,
    /// Consecutive failed reconnects before giving up (0 = never).
    #[arg(long, default_value_t = 5)]
    pub max_reconnects: u32,
    #[command(flatten)]
    pub session: SessionArgs,
}

#[derive(Args, Debug)]
pub struct ReplayArgs {
    /// Captured serial byte stream.
    pub file: PathBuf,
    /// Quiet read timeouts inserted after each frame, so effects get ticks.
    #[arg(long, default_value_t = 10)]
    pub gap_ticks: usize,
    #[command(flatten)]
    pub session: SessionArgs,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Command verb (e.g. PULSE).
    #[arg(long)]
    pub verb: String,
    /// Header as NAME=VALUE; repeatable.
    #[arg(long = "header", short = 'H', value_name = "NAME=VALUE")]
    pub headers: Vec<String>,
    /// Command body.
    #[arg(long)]
    pub body: Option<String>,
    /// Write to this serial device instead of stdout.
    #[arg(long, env = "FLUX_DEVICE")]
    pub device: Option<String>,
    /// Serial line speed.
    #[arg(long, default_value_t = DEFAULT_BAUD_RATE, env = "FLUX_BAUD")]
    pub baud: u32,
}

#[derive(Args, Debug, Default)]
pub struct EffectsArgs {}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Build the effect catalog from the built-in kinds.
pub fn catalog() -> CliResult<Arc<EffectRegistry>> {
    let mut registry = EffectRegistry::new();
    for kind in EffectKind::ALL {
        registry
            .register(kind.descriptor())
            .map_err(|err| effect_error("effect catalog", err))?;
    }
    Ok(Arc::new(registry))
}

pub fn install_ctrlc_handler(shutdown: ShutdownSignal) -> CliResult<()> {
    ctrlc::set_handler(move || shutdown.trigger()).map_err(|err| {
        CliError::new(FAILURE, format!("signal handler setup failed: {err}"))
    })
}

/// Longest accepted timing flag.
pub const MAX_DURATION: Duration = Duration::from_secs(24 * 60 * 60);

/// Parse `500ms`, `2s` or a bare number of seconds.
pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::usage("duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .trim()
        .parse()
        .map_err(|_| CliError::usage(format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::usage("duration must be greater than zero"));
    }

    let duration = match unit {
        "ms" => Duration::from_millis(value),
        _ => Duration::from_secs(value),
    };
    if duration > MAX_DURATION {
        return Err(CliError::usage(format!(
            "duration {input} exceeds the maximum of {}s",
            MAX_DURATION.as_secs()
        )));
    }
    Ok(duration)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exit::USAGE;

    #[test]
    fn parses_durations() {
        assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
        assert_eq!(parse_duration("86400s").unwrap(), MAX_DURATION);
    }

    #[test]
    fn rejects_bad_durations() {
        for input in ["", "0ms", "fast", "-1s", "86401s", "18446744073709551615s"] {
            let err = parse_duration(input).expect_err("duration should be rejected");
            assert_eq!(err.code, USAGE, "{input:?}");
        }
    }

    #[test]
    fn catalog_holds_every_builtin() {
        let registry = catalog().expect("catalog should build");
        assert_eq!(registry.len(), EffectKind::ALL.len());
    }
}
