use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use flux_command::{headers, parse, Command};
use flux_effect::{EffectRegistry, OutputDriver, Scheduler, SchedulerConfig, DEFAULT_CHANNEL};
use flux_frame::{Frame, FrameConfig, FrameError, FrameReader, FrameWriter, DEFAULT_MAX_FRAME};
use flux_transport::Connection;
use serde::Serialize;
use tracing::{debug, error, info, trace, warn};

use crate::ack;
use crate::error::Result;

/// Session behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub frame: FrameConfig,
    pub scheduler: SchedulerConfig,
    /// Write `RECEIPT`/`ERROR` frames back to the controller.
    pub acknowledge: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            frame: FrameConfig::default(),
            scheduler: SchedulerConfig::default(),
            acknowledge: true,
        }
    }
}

/// Why [`Session::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExitReason {
    /// EOF, a read/write error, or a failed acknowledgment write.
    ConnectionLost,
    /// The shutdown signal was raised.
    Shutdown,
}

/// Process-wide stop flag, raised from the Ctrl-C handler.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
    flag: Arc<AtomicBool>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Counters for one session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    /// Complete frames read.
    pub frames: u64,
    /// Commands that started an effect.
    pub dispatched: u64,
    /// Frames rejected by the parser or the scheduler.
    pub rejected: u64,
    /// Oversized runs discarded by the framer.
    pub framing_errors: u64,
    /// Acknowledgments written.
    pub acks: u64,
    pub ticks: u64,
}

/// One open connection and the effects it drives.
pub struct Session<C: Connection> {
    reader: FrameReader<C>,
    scheduler: Scheduler,
    config: SessionConfig,
    ack_config: FrameConfig,
    name: String,
    stats: SessionStats,
}

impl<C: Connection> Session<C> {
    /// Set up a session. The connection's read timeout becomes the tick
    /// interval so the loop wakes up to tick while the line is quiet.
    pub fn new(
        mut connection: C,
        registry: Arc<EffectRegistry>,
        driver: Box<dyn OutputDriver>,
        config: SessionConfig,
    ) -> Result<Self> {
        connection.set_read_timeout(config.scheduler.tick_interval)?;
        let name = connection.describe();
        let reader = FrameReader::with_config(connection, config.frame.clone());
        let scheduler = Scheduler::new(registry, driver, config.scheduler);
        // Acknowledgments are not bound by a tight inbound frame limit.
        let ack_config = FrameConfig {
            max_frame_size: config.frame.max_frame_size.max(DEFAULT_MAX_FRAME),
            ..config.frame.clone()
        };

        Ok(Self {
            reader,
            scheduler,
            config,
            ack_config,
            name,
            stats: SessionStats::default(),
        })
    }

    /// Run until the connection drops or `shutdown` is raised.
    ///
    /// Framing, parse and dispatch failures are logged, acknowledged and
    /// skipped. On return every effect has been stopped and its actuator
    /// released.
    pub fn run(&mut self, shutdown: &ShutdownSignal) -> ExitReason {
        info!(
            connection = %self.name,
            effects = self.scheduler.registry().len(),
            tick_ms = self.config.scheduler.tick_interval.as_millis() as u64,
            max_frame = self.config.frame.max_frame_size,
            acknowledge = self.config.acknowledge,
            "session started"
        );

        let tick = self.config.scheduler.tick_interval;
        // `None` when the interval is too large to schedule: never tick.
        let mut next_tick = Instant::now().checked_add(tick);

        loop {
            if shutdown.is_triggered() {
                info!(connection = %self.name, "shutdown requested");
                self.teardown();
                return ExitReason::Shutdown;
            }

            let outcome = match self.reader.poll_frame() {
                Ok(Some(frame)) => self.handle_frame(&frame),
                Ok(None) => Ok(()),
                Err(err) if err.is_recoverable() => self.handle_framing_error(&err),
                Err(err) => Err(err),
            };
            if let Err(err) = outcome {
                error!(connection = %self.name, error = %err, "connection lost");
                self.teardown();
                return ExitReason::ConnectionLost;
            }

            let now = Instant::now();
            if next_tick.is_some_and(|deadline| now >= deadline) {
                self.scheduler.tick();
                self.stats.ticks += 1;
                next_tick = now.checked_add(tick);
            }
        }
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut Scheduler {
        &mut self.scheduler
    }

    pub fn connection(&self) -> &C {
        self.reader.get_ref()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    // Errors returned from here mean the connection is gone.
    fn handle_frame(&mut self, frame: &Frame) -> std::result::Result<(), FrameError> {
        self.stats.frames += 1;

        let command = match parse(&frame.payload) {
            Ok(command) => command,
            Err(err) => {
                self.stats.rejected += 1;
                error!(
                    connection = %self.name,
                    error = %err,
                    frame = %frame.excerpt(),
                    "malformed command"
                );
                return self.acknowledge(ack::error_frame("malformed-frame", None, &err.to_string()));
            }
        };

        match self.scheduler.dispatch(&command) {
            Ok(dispatched) => {
                self.stats.dispatched += 1;
                debug!(
                    verb = %dispatched.verb,
                    channel = %dispatched.channel,
                    instance = %dispatched.instance,
                    superseded = ?dispatched.superseded.as_ref().map(|s| s.outcome),
                    "command dispatched"
                );
                match command.receipt() {
                    Some(id) => self.acknowledge(ack::receipt_frame(id)),
                    None => Ok(()),
                }
            }
            Err(err) => {
                self.stats.rejected += 1;
                error!(
                    verb = %command.verb(),
                    channel = command.header(headers::CHANNEL).unwrap_or(DEFAULT_CHANNEL),
                    reason = err.kind(),
                    error = %err,
                    frame = %frame.excerpt(),
                    "command rejected"
                );
                self.acknowledge(ack::error_frame(err.kind(), command.receipt(), &err.to_string()))
            }
        }
    }

    fn handle_framing_error(&mut self, err: &FrameError) -> std::result::Result<(), FrameError> {
        self.stats.framing_errors += 1;
        self.stats.rejected += 1;
        error!(
            connection = %self.name,
            error = %err,
            "frame discarded; resynchronizing at next delimiter"
        );
        self.acknowledge(ack::error_frame("frame-too-large", None, &err.to_string()))
    }

    fn acknowledge(&mut self, frame: Command) -> std::result::Result<(), FrameError> {
        if !self.config.acknowledge {
            return Ok(());
        }

        let mut writer = FrameWriter::with_config(self.reader.get_mut(), self.ack_config.clone());
        match writer.send(&frame.to_bytes()) {
            Ok(()) => {
                self.stats.acks += 1;
                trace!(connection = %self.name, verb = frame.verb(), "acknowledgment sent");
                Ok(())
            }
            // The frame itself cannot be encoded; the line is still fine.
            Err(err @ (FrameError::DelimiterInPayload { .. } | FrameError::PayloadTooLarge { .. })) => {
                warn!(connection = %self.name, verb = frame.verb(), error = %err, "acknowledgment dropped");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    fn teardown(&mut self) {
        let report = self.scheduler.shutdown();
        let discarded = self.reader.buffered();
        self.reader.clear();
        info!(
            connection = %self.name,
            stopped = report.stopped,
            forced = report.forced,
            discarded,
            frames = self.stats.frames,
            dispatched = self.stats.dispatched,
            rejected = self.stats.rejected,
            "session closed"
        );
    }
}

#[cfg(test)]
mod tests {
    use std::fmt;
    use std::io::{ErrorKind, Read, Write};
    use std::sync::Mutex;
    use std::time::Duration;

    use flux_effect::{Channel, EffectState, MemoryDriver, MemoryProbe, Output};
    use flux_transport::ReplayStream;
    use tracing::field::{Field, Visit};
    use tracing::{Event, Level, Subscriber};
    use tracing_subscriber::layer::{Context, SubscriberExt};
    use tracing_subscriber::Layer;

    use super::*;

    // Raises the shutdown signal instead of reporting EOF, so a scripted
    // session ends with `Shutdown` and no connection-loss log.
    struct StopAtEnd {
        inner: ReplayStream,
        signal: ShutdownSignal,
    }

    impl Read for StopAtEnd {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            match self.inner.read(buf) {
                Ok(0) => {
                    self.signal.trigger();
                    Err(std::io::Error::from(ErrorKind::TimedOut))
                }
                other => other,
            }
        }
    }

    impl Write for StopAtEnd {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.inner.write(buf)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            self.inner.flush()
        }
    }

    impl Connection for StopAtEnd {
        fn describe(&self) -> String {
            self.inner.describe()
        }

        fn set_read_timeout(&mut self, timeout: Duration) -> flux_transport::Result<()> {
            self.inner.set_read_timeout(timeout)
        }
    }

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<(Level, String)>>>);

    impl Captured {
        fn count(&self, level: Level) -> usize {
            self.0
                .lock()
                .expect("log capture lock")
                .iter()
                .filter(|(l, _)| *l == level)
                .count()
        }
    }

    impl<S: Subscriber> Layer<S> for Captured {
        fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
            let mut message = MessageVisitor::default();
            event.record(&mut message);
            self.0
                .lock()
                .expect("log capture lock")
                .push((*event.metadata().level(), message.0));
        }
    }

    #[derive(Default)]
    struct MessageVisitor(String);

    impl Visit for MessageVisitor {
        fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
            if field.name() == "message" {
                self.0 = format!("{value:?}");
            }
        }
    }

    fn config() -> SessionConfig {
        SessionConfig {
            scheduler: SchedulerConfig {
                tick_interval: Duration::from_millis(1),
                stop_timeout: Duration::from_millis(100),
            },
            ..SessionConfig::default()
        }
    }

    fn session<C: Connection>(connection: C, config: SessionConfig) -> (Session<C>, MemoryProbe) {
        let driver = MemoryDriver::new();
        let probe = driver.probe();
        let session = Session::new(
            connection,
            Arc::new(EffectRegistry::builtin()),
            Box::new(driver),
            config,
        )
        .expect("session should start");
        (session, probe)
    }

    fn scripted(bytes: &[u8]) -> (StopAtEnd, ShutdownSignal) {
        let signal = ShutdownSignal::new();
        let stream = StopAtEnd {
            inner: ReplayStream::from_bytes("test", bytes.to_vec()),
            signal: signal.clone(),
        };
        (stream, signal)
    }

    fn channel(name: &str) -> Channel {
        Channel::new(name).expect("valid channel")
    }

    #[test]
    fn pulse_command_starts_effect_with_one_debug_event() {
        let captured = Captured::default();
        let subscriber = tracing_subscriber::registry().with(captured.clone());

        let (stream, signal) = scripted(b"PULSE\nchannel:front\ncolor:red\n\n\0");
        let (mut session, probe) = session(stream, config());

        let reason = tracing::subscriber::with_default(subscriber, || session.run(&signal));

        assert_eq!(reason, ExitReason::Shutdown);
        assert_eq!(captured.count(Level::DEBUG), 1);
        assert_eq!(captured.count(Level::ERROR), 0);
        assert_eq!(session.stats().dispatched, 1);

        let transitions = session.scheduler_mut().take_transitions();
        assert_eq!(transitions[0].channel, channel("front"));
        assert_eq!(transitions[0].from, EffectState::Idle);
        assert_eq!(transitions[0].to, EffectState::Running);
        assert_eq!(probe.record(&channel("front")).expect("front record").acquisitions, 1);
    }

    #[test]
    fn unknown_verb_is_rejected_once_and_session_continues() {
        let captured = Captured::default();
        let subscriber = tracing_subscriber::registry().with(captured.clone());

        let (stream, signal) = scripted(b"UNKNOWN\n\n\0SOLID\ncolor:blue\n\n\0");
        let written = stream.inner.written();
        let (mut session, probe) = session(stream, config());

        let reason = tracing::subscriber::with_default(subscriber, || session.run(&signal));

        assert_eq!(reason, ExitReason::Shutdown);
        assert_eq!(captured.count(Level::ERROR), 1);
        assert_eq!(session.stats().rejected, 1);
        assert_eq!(session.stats().dispatched, 1);
        assert!(probe.record(&Channel::default()).is_some());

        let written = written.lock().expect("written lock");
        assert!(written.starts_with(b"ERROR\nmessage:unknown-verb\n\n"));
        assert_eq!(written.last(), Some(&0));
    }

    #[test]
    fn receipt_is_acknowledged() {
        let (stream, signal) = scripted(b"SOLID\ncolor:red\nreceipt:42\n\n\0");
        let written = stream.inner.written();
        let (mut session, _probe) = session(stream, config());

        assert_eq!(session.run(&signal), ExitReason::Shutdown);
        assert_eq!(
            written.lock().expect("written lock").as_slice(),
            b"RECEIPT\nreceipt-id:42\n\n\0"
        );
        assert_eq!(session.stats().acks, 1);
    }

    #[test]
    fn rejection_echoes_receipt_id() {
        let (stream, signal) = scripted(b"PULSE\nreceipt:9\n\n\0");
        let written = stream.inner.written();
        let (mut session, _probe) = session(stream, config());

        session.run(&signal);
        let written = written.lock().expect("written lock");
        assert!(written.starts_with(b"ERROR\nmessage:missing-headers\nreceipt-id:9\n\n"));
    }

    #[test]
    fn acknowledgments_can_be_disabled() {
        let (stream, signal) = scripted(b"SOLID\ncolor:red\nreceipt:1\n\n\0BOGUS\n\n\0");
        let written = stream.inner.written();
        let (mut session, _probe) = session(
            stream,
            SessionConfig {
                acknowledge: false,
                ..config()
            },
        );

        session.run(&signal);
        assert!(written.lock().expect("written lock").is_empty());
    }

    #[test]
    fn connection_loss_tears_down_all_channels() {
        let stream = ReplayStream::from_bytes(
            "test",
            b"PULSE\nchannel:front\ncolor:red\n\n\0PULSE\nchannel:rear\ncolor:blue\n\n\0".to_vec(),
        )
        .idle(3);
        let (mut session, probe) = session(stream, config());

        assert_eq!(session.run(&ShutdownSignal::new()), ExitReason::ConnectionLost);
        assert!(session.scheduler().active_channels().is_empty());

        let transitions = session.scheduler_mut().take_transitions();
        for name in ["front", "rear"] {
            let ch = channel(name);
            assert!(transitions
                .iter()
                .any(|t| t.channel == ch && t.to == EffectState::Stopping));
            assert!(transitions
                .iter()
                .any(|t| t.channel == ch && t.to == EffectState::Stopped));

            let record = probe.record(&ch).expect("channel record");
            assert_eq!(record.releases, 1);
            assert!(!record.held);
            assert_eq!(record.current, Output::OFF);
        }
    }

    #[test]
    fn stalled_acknowledgment_write_is_retried() {
        let signal = ShutdownSignal::new();
        let stream = StopAtEnd {
            inner: ReplayStream::from_bytes("test", b"SOLID\ncolor:red\nreceipt:5\n\n\0".to_vec())
                .stall_writes(2),
            signal: signal.clone(),
        };
        let written = stream.inner.written();
        let (mut session, _probe) = session(stream, config());

        assert_eq!(session.run(&signal), ExitReason::Shutdown);
        assert_eq!(session.stats().acks, 1);
        assert_eq!(
            written.lock().unwrap().as_slice(),
            b"RECEIPT\nreceipt-id:5\n\n\0"
        );
    }

    #[test]
    fn unschedulable_tick_interval_never_ticks() {
        let mut config = config();
        config.scheduler.tick_interval = Duration::MAX;
        let stream = ReplayStream::from_bytes("test", b"SOLID\ncolor:red\n\n\0".to_vec());
        let (mut session, probe) = session(stream, config);

        assert_eq!(session.run(&ShutdownSignal::new()), ExitReason::ConnectionLost);
        assert_eq!(session.stats().dispatched, 1);
        assert_eq!(session.stats().ticks, 0);
        assert!(probe.held_channels().is_empty());
    }

    #[test]
    fn read_errors_are_connection_loss() {
        let stream = ReplayStream::from_bytes("test", b"SOLID\ncolor:red\n\n\0".to_vec())
            .fail(ErrorKind::BrokenPipe)
            .data(b"OFF\n\n\0".to_vec());
        let (mut session, _probe) = session(stream, config());

        assert_eq!(session.run(&ShutdownSignal::new()), ExitReason::ConnectionLost);
        assert_eq!(session.stats().dispatched, 1);
    }

    #[test]
    fn failed_acknowledgment_is_connection_loss() {
        let stream =
            ReplayStream::from_bytes("test", b"SOLID\ncolor:red\nreceipt:1\n\n\0OFF\n\n\0".to_vec())
                .fail_writes()
                .idle(100);
        let (mut session, probe) = session(stream, config());

        assert_eq!(session.run(&ShutdownSignal::new()), ExitReason::ConnectionLost);
        assert_eq!(session.stats().frames, 1);
        assert!(probe.held_channels().is_empty());
    }

    #[test]
    fn oversized_frame_is_skipped() {
        let mut bytes = vec![b'x'; 40];
        bytes.extend_from_slice(b"\0OFF\n\n\0");
        let (stream, signal) = scripted(&bytes);
        let written = stream.inner.written();
        let mut config = config();
        config.frame.max_frame_size = 16;
        let (mut session, _probe) = session(stream, config);

        session.run(&signal);
        assert_eq!(session.stats().framing_errors, 1);
        assert_eq!(session.stats().dispatched, 1);
        assert!(written
            .lock()
            .expect("written lock")
            .starts_with(b"ERROR\nmessage:frame-too-large\n\n"));
    }

    #[test]
    fn idle_reads_tick_effects() {
        let stream = ReplayStream::from_bytes(
            "test",
            b"FADE\nchannel:front\ncolor:white\nduration:2\n\n\0".to_vec(),
        )
        .idle(5);
        let (mut session, probe) = session(stream, config());

        session.run(&ShutdownSignal::new());
        assert!(session.stats().ticks >= 3);
        assert_eq!(session.scheduler().state(&channel("front")), Some(EffectState::Stopped));

        let record = probe.record(&channel("front")).expect("front record");
        assert!(record.history.contains(&Output::new(flux_effect::Rgb::WHITE, 255)));
        assert_eq!(record.current, Output::OFF);
    }
}
