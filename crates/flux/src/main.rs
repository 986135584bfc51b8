mod cmd;
mod exit;
mod logging;
mod output;

use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info};

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "flux", version, about = "Stomp serial effect controller")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format.
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Log at DEBUG instead of INFO.
    #[arg(long, global = true)]
    debug: bool,

    /// Write logs to FILE (truncated on start) instead of stderr.
    #[arg(long, value_name = "FILE", global = true)]
    log: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    if let Err(err) = init_logging(cli.log_format, cli.debug, cli.log.as_deref()) {
        eprintln!("error: {err}");
        std::process::exit(err.code);
    }
    info!(version = env!("CARGO_PKG_VERSION"), "flux started");

    match cmd::run(cli.command, format) {
        Ok(code) => {
            info!(code, "flux exiting");
            std::process::exit(code)
        }
        Err(err) => {
            error!(code = err.code, error = %err.message, "fatal error; exiting");
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_run_subcommand() {
        let cli = Cli::try_parse_from([
            "flux",
            "--debug",
            "run",
            "--stomp",
            "--device",
            "/dev/ttyUSB0",
            "--baud",
            "115200",
            "--reconnect",
            "--tick",
            "10ms",
        ])
        .expect("run args should parse");

        assert!(cli.debug);
        match cli.command {
            Command::Run(args) => {
                assert!(args.stomp);
                assert_eq!(args.device, "/dev/ttyUSB0");
                assert_eq!(args.baud, 115200);
                assert!(args.reconnect);
                assert_eq!(args.session.tick, "10ms");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parses_repeated_headers() {
        let cli = Cli::try_parse_from([
            "flux", "send", "--verb", "PULSE", "-H", "channel=front", "--header", "color=red",
        ])
        .expect("send args should parse");

        match cli.command {
            Command::Send(args) => assert_eq!(args.headers, vec!["channel=front", "color=red"]),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn replay_requires_a_file() {
        let err = Cli::try_parse_from(["flux", "replay"]).expect_err("missing file should fail");
        assert_eq!(
            err.kind(),
            clap::error::ErrorKind::MissingRequiredArgument
        );
    }
}
