use std::fs;

use flux_effect::MemoryDriver;
use flux_session::{Session, ShutdownSignal};
use flux_transport::ReplayStream;
use tracing::info;

use crate::cmd::{catalog, install_ctrlc_handler, ReplayArgs};
use crate::exit::{io_error, session_error, CliResult, SUCCESS};
use crate::output::{print_replay, ChannelSummary, OutputFormat, ReplaySummary};

pub fn run(args: ReplayArgs, format: OutputFormat) -> CliResult<i32> {
    let registry = catalog()?;
    let config = args.session.session_config()?;
    let bytes = fs::read(&args.file)
        .map_err(|err| io_error(&format!("failed reading {}", args.file.display()), err))?;
    let source = args.file.display().to_string();

    let stream = script(&source, &bytes, config.frame.delimiter, args.gap_ticks);
    let driver = MemoryDriver::new();
    let probe = driver.probe();

    let shutdown = ShutdownSignal::new();
    install_ctrlc_handler(shutdown.clone())?;

    let mut session = Session::new(stream, registry, Box::new(driver), config)
        .map_err(|err| session_error("replay setup failed", err))?;
    // End of the capture reads as a dropped line; that is the normal end here.
    let exit = session.run(&shutdown);
    info!(source = %source, exit = ?exit, "replay finished");

    let summary = ReplaySummary {
        source,
        exit,
        stats: *session.stats(),
        channels: probe
            .snapshot()
            .into_iter()
            .map(|(channel, record)| ChannelSummary::new(channel, &record))
            .collect(),
    };
    print_replay(&summary, format);

    Ok(SUCCESS)
}

// One data event per frame, each followed by `gap` quiet reads.
fn script(name: &str, bytes: &[u8], delimiter: u8, gap: usize) -> ReplayStream {
    bytes
        .split_inclusive(|&b| b == delimiter)
        .fold(ReplayStream::new(name), |stream, chunk| {
            stream.data(chunk.to_vec()).idle(gap)
        })
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use super::*;

    fn read_all(mut stream: ReplayStream) -> (Vec<u8>, usize) {
        let mut bytes = Vec::new();
        let mut idles = 0;
        let mut buf = [0u8; 64];
        loop {
            match stream.read(&mut buf) {
                Ok(0) => return (bytes, idles),
                Ok(n) => bytes.extend_from_slice(&buf[..n]),
                Err(_) => idles += 1,
            }
        }
    }

    #[test]
    fn script_keeps_bytes_and_inserts_gaps() {
        let capture = b"SOLID\ncolor:red\n\n\0OFF\n\n\0PART";
        let (bytes, idles) = read_all(script("capture", capture, 0, 2));
        assert_eq!(bytes, capture);
        assert_eq!(idles, 6);
    }

    #[test]
    fn empty_capture_is_immediate_eof() {
        let (bytes, idles) = read_all(script("capture", b"", 0, 5));
        assert!(bytes.is_empty());
        assert_eq!(idles, 0);
    }
}
