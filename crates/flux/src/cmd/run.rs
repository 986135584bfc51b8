use std::thread;
use std::time::Duration;

use flux_effect::{OutputDriver, TracingDriver};
use flux_session::{ExitReason, ReconnectPolicy, SerialConnector, ShutdownSignal, Supervisor};
use flux_transport::SerialConfig;
use tracing::info;

use crate::cmd::{catalog, install_ctrlc_handler, parse_duration, RunArgs};
use crate::exit::{session_error, CliError, CliResult, FAILURE, SUCCESS};
use crate::output::OutputFormat;

const IDLE_POLL: Duration = Duration::from_millis(100);

pub fn run(args: RunArgs, _format: OutputFormat) -> CliResult<i32> {
    let registry = catalog()?;
    let config = args.session.session_config()?;
    let policy = ReconnectPolicy {
        enabled: args.reconnect,
        delay: parse_duration(&args.reconnect_delay)?,
        max_attempts: args.max_reconnects,
    };

    let shutdown = ShutdownSignal::new();
    install_ctrlc_handler(shutdown.clone())?;

    if !args.stomp {
        info!(
            effects = registry.len(),
            "serial subsystem disabled; waiting for shutdown"
        );
        while !shutdown.is_triggered() {
            thread::sleep(IDLE_POLL);
        }
        info!("shutdown requested");
        return Ok(SUCCESS);
    }

    let mut connector = SerialConnector::new(SerialConfig {
        device: args.device,
        baud_rate: args.baud,
        ..SerialConfig::default()
    });
    let mut supervisor = Supervisor::new(
        registry,
        config,
        policy,
        Box::new(|| Box::new(TracingDriver::new()) as Box<dyn OutputDriver>),
    );

    let reason = supervisor
        .run(&mut connector, &shutdown)
        .map_err(|err| session_error("serial session failed", err))?;
    info!(sessions = supervisor.sessions(), "controller stopped");

    match reason {
        ExitReason::Shutdown => Ok(SUCCESS),
        ExitReason::ConnectionLost => Err(CliError::new(
            FAILURE,
            format!("serial connection to {} lost", connector.config().device),
        )),
    }
}
