use std::io;

use flux_command::Command;
use flux_frame::FrameWriter;
use flux_transport::{SerialConfig, SerialStream};
use tracing::info;

use crate::cmd::SendArgs;
use crate::exit::{frame_error, transport_error, CliError, CliResult, SUCCESS};

pub fn run(args: SendArgs) -> CliResult<i32> {
    let command = build_command(&args)?;
    let payload = command.to_bytes();

    match &args.device {
        Some(device) => {
            let stream = SerialStream::open(&SerialConfig {
                device: device.clone(),
                baud_rate: args.baud,
                ..SerialConfig::default()
            })
            .map_err(|err| transport_error("open failed", err))?;
            FrameWriter::new(stream)
                .send(&payload)
                .map_err(|err| frame_error("send failed", err))?;
            info!(
                device = %device,
                verb = %command.verb(),
                bytes = payload.len(),
                "command sent"
            );
        }
        None => {
            FrameWriter::new(io::stdout().lock())
                .send(&payload)
                .map_err(|err| frame_error("send failed", err))?;
        }
    }

    Ok(SUCCESS)
}

fn build_command(args: &SendArgs) -> CliResult<Command> {
    let verb = args.verb.trim();
    if verb.is_empty() || verb.chars().any(char::is_whitespace) {
        return Err(CliError::usage(format!(
            "--verb must be a single word, got {:?}",
            args.verb
        )));
    }

    let mut command = Command::new(verb);
    for header in &args.headers {
        let (name, value) = header
            .split_once('=')
            .ok_or_else(|| CliError::usage(format!("--header must be NAME=VALUE, got {header:?}")))?;
        let name = name.trim();
        if name.is_empty() {
            return Err(CliError::usage(format!(
                "--header name must not be empty: {header:?}"
            )));
        }
        command = command.with_header(name, value);
    }
    if let Some(body) = &args.body {
        command = command.with_body(body.clone().into_bytes());
    }
    Ok(command)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exit::USAGE;

    fn args(verb: &str, headers: &[&str]) -> SendArgs {
        SendArgs {
            verb: verb.to_string(),
            headers: headers.iter().map(|h| h.to_string()).collect(),
            body: None,
            device: None,
            baud: 9600,
        }
    }

    #[test]
    fn builds_parseable_command() {
        let command = build_command(&args("PULSE", &["channel=front", "color=#ff0000"]))
            .expect("command should build");
        let parsed = flux_command::parse(&command.to_bytes()).expect("command should parse");
        assert_eq!(parsed.verb(), "PULSE");
        assert_eq!(parsed.header("channel"), Some("front"));
        assert_eq!(parsed.header("color"), Some("#ff0000"));
    }

    #[test]
    fn header_values_may_contain_equals() {
        let command = build_command(&args("SOLID", &["note=a=b"])).expect("command should build");
        assert_eq!(command.header("note"), Some("a=b"));
    }

    #[test]
    fn rejects_usage_errors() {
        let cases = [
            ("", vec![]),
            ("TWO WORDS", vec![]),
            ("SOLID", vec!["color"]),
            ("SOLID", vec!["=red"]),
        ];
        for (verb, headers) in cases {
            let err = build_command(&args(verb, &headers)).expect_err("should be rejected");
            assert_eq!(err.code, USAGE);
        }
    }
}
