use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use flux_effect::{EffectRegistry, OutputDriver};
use flux_transport::Connection;
use tracing::{error, info, warn};

use crate::connector::Connector;
use crate::error::{Result, SessionError};
use crate::session::{ExitReason, Session, SessionConfig, ShutdownSignal};

// Longest uninterrupted sleep while waiting to reconnect.
const SHUTDOWN_POLL: Duration = Duration::from_millis(50);

/// What to do when the line drops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub enabled: bool,
    /// Wait before each attempt.
    pub delay: Duration,
    /// Consecutive failed attempts before giving up. Zero retries forever.
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            enabled: false,
            delay: Duration::from_secs(2),
            max_attempts: 5,
        }
    }
}

/// Builds a fresh output driver for every session.
pub type DriverFactory = Box<dyn FnMut() -> Box<dyn OutputDriver>>;

/// Opens connections and runs one session per connection.
pub struct Supervisor {
    registry: Arc<EffectRegistry>,
    config: SessionConfig,
    policy: ReconnectPolicy,
    driver: DriverFactory,
    sessions: u64,
}

impl Supervisor {
    pub fn new(
        registry: Arc<EffectRegistry>,
        config: SessionConfig,
        policy: ReconnectPolicy,
        driver: DriverFactory,
    ) -> Self {
        Self {
            registry,
            config,
            policy,
            driver,
            sessions: 0,
        }
    }

    /// Sessions started so far.
    pub fn sessions(&self) -> u64 {
        self.sessions
    }

    /// Connect and run sessions until shutdown, or until the line drops and
    /// reconnecting is disabled or exhausted.
    ///
    /// Failing to open the first connection is a configuration error.
    pub fn run<K: Connector>(
        &mut self,
        connector: &mut K,
        shutdown: &ShutdownSignal,
    ) -> Result<ExitReason> {
        let connection = connector.connect().map_err(SessionError::Configuration)?;
        let mut session = self.open_session(connection)?;

        loop {
            match session.run(shutdown) {
                ExitReason::Shutdown => return Ok(ExitReason::Shutdown),
                ExitReason::ConnectionLost if !self.policy.enabled => {
                    return Ok(ExitReason::ConnectionLost)
                }
                ExitReason::ConnectionLost => {}
            }
            drop(session);

            session = match self.reconnect(connector, shutdown)? {
                Some(session) => session,
                None => return Ok(ExitReason::Shutdown),
            };
        }
    }

    fn open_session<C: Connection>(&mut self, connection: C) -> Result<Session<C>> {
        let session = Session::new(
            connection,
            Arc::clone(&self.registry),
            (self.driver)(),
            self.config.clone(),
        )?;
        self.sessions += 1;
        Ok(session)
    }

    // `Ok(None)` if shutdown was raised while waiting. A connection that
    // opens but cannot host a session counts as a failed attempt.
    fn reconnect<K: Connector>(
        &mut self,
        connector: &mut K,
        shutdown: &ShutdownSignal,
    ) -> Result<Option<Session<K::Connection>>> {
        let endpoint = connector.describe();
        let mut attempts = 0u32;

        loop {
            if !wait(self.policy.delay, shutdown) {
                return Ok(None);
            }
            attempts += 1;

            let opened = connector
                .connect()
                .map_err(SessionError::Transport)
                .and_then(|connection| self.open_session(connection));
            match opened {
                Ok(session) => {
                    info!(endpoint = %endpoint, attempt = attempts, "reconnected");
                    return Ok(Some(session));
                }
                Err(err) => {
                    warn!(
                        endpoint = %endpoint,
                        attempt = attempts,
                        max_attempts = self.policy.max_attempts,
                        error = %err,
                        "reconnect failed"
                    );
                    if self.policy.max_attempts != 0 && attempts >= self.policy.max_attempts {
                        error!(
                            endpoint = %endpoint,
                            attempts,
                            error = %err,
                            "reconnect attempts exhausted"
                        );
                        return Err(SessionError::ReconnectExhausted {
                            attempts,
                            source: Box::new(err),
                        });
                    }
                }
            }
        }
    }
}

// Sleep for `delay` unless shutdown is raised first. Returns false on
// shutdown.
fn wait(delay: Duration, shutdown: &ShutdownSignal) -> bool {
    // A delay past the end of time waits for shutdown only.
    let deadline = Instant::now().checked_add(delay);
    loop {
        if shutdown.is_triggered() {
            return false;
        }
        let now = Instant::now();
        match deadline {
            Some(deadline) if now >= deadline => return true,
            Some(deadline) => thread::sleep((deadline - now).min(SHUTDOWN_POLL)),
            None => thread::sleep(SHUTDOWN_POLL),
        }
    }
}
