//! Output hardware abstraction.
//!
//! The scheduler acquires one [`Actuator`] per running instance from an
//! [`OutputDriver`] and hands it to the effect on every step. Handles are
//! exclusive: a driver must not hand out a second handle for a channel until
//! the first has been released.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tracing::trace;

use crate::channel::Channel;
use crate::color::Output;
use crate::error::ActuatorError;

/// Outputs kept per channel by [`MemoryDriver`].
pub const HISTORY_LIMIT: usize = 256;

/// Exclusive handle to the hardware behind one channel.
pub trait Actuator: Send {
    /// Channel this handle drives.
    fn channel(&self) -> &Channel;

    /// Write an output.
    fn set(&mut self, output: Output) -> Result<(), ActuatorError>;

    /// Drive the channel off and give the hardware back.
    ///
    /// After release every further call fails with
    /// [`ActuatorError::Released`]. Releasing twice is a no-op.
    fn release(&mut self) -> Result<(), ActuatorError>;
}

/// Hands out actuators.
pub trait OutputDriver: Send {
    /// Acquire the actuator for `channel`.
    fn acquire(&mut self, channel: &Channel) -> Result<Box<dyn Actuator>, ActuatorError>;
}

/// Driver that only logs. Used when no hardware output is attached.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingDriver;

impl TracingDriver {
    pub fn new() -> Self {
        Self
    }
}

impl OutputDriver for TracingDriver {
    fn acquire(&mut self, channel: &Channel) -> Result<Box<dyn Actuator>, ActuatorError> {
        trace!(channel = %channel, "actuator acquired");
        Ok(Box::new(TracingActuator {
            channel: channel.clone(),
            last: None,
            released: false,
        }))
    }
}

struct TracingActuator {
    channel: Channel,
    last: Option<Output>,
    released: bool,
}

impl Actuator for TracingActuator {
    fn channel(&self) -> &Channel {
        &self.channel
    }

    fn set(&mut self, output: Output) -> Result<(), ActuatorError> {
        if self.released {
            return Err(ActuatorError::Released {
                channel: self.channel.clone(),
            });
        }
        if self.last != Some(output) {
            trace!(
                channel = %self.channel,
                color = %output.color,
                level = output.level,
                "output"
            );
            self.last = Some(output);
        }
        Ok(())
    }

    fn release(&mut self) -> Result<(), ActuatorError> {
        if self.released {
            return Ok(());
        }
        self.set(Output::OFF)?;
        self.released = true;
        trace!(channel = %self.channel, "actuator released");
        Ok(())
    }
}

/// Everything [`MemoryDriver`] saw on one channel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChannelRecord {
    /// Last output written.
    pub current: Output,
    /// Distinct outputs in write order, oldest dropped past [`HISTORY_LIMIT`].
    pub history: VecDeque<Output>,
    /// Total `set` calls.
    pub writes: u64,
    /// A handle is currently out.
    pub held: bool,
    pub acquisitions: u64,
    pub releases: u64,
}

impl ChannelRecord {
    fn record(&mut self, output: Output) {
        self.writes += 1;
        if self.history.back() != Some(&output) {
            if self.history.len() == HISTORY_LIMIT {
                self.history.pop_front();
            }
            self.history.push_back(output);
        }
        self.current = output;
    }
}

type Records = Arc<Mutex<BTreeMap<Channel, ChannelRecord>>>;

fn lock(records: &Records) -> MutexGuard<'_, BTreeMap<Channel, ChannelRecord>> {
    records.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Driver that records outputs in memory and enforces exclusive handles.
#[derive(Debug, Clone, Default)]
pub struct MemoryDriver {
    records: Records,
}

impl MemoryDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read-only view that stays valid after the driver is moved into a
    /// scheduler.
    pub fn probe(&self) -> MemoryProbe {
        MemoryProbe {
            records: Arc::clone(&self.records),
        }
    }
}

impl OutputDriver for MemoryDriver {
    fn acquire(&mut self, channel: &Channel) -> Result<Box<dyn Actuator>, ActuatorError> {
        let mut records = lock(&self.records);
        let record = records.entry(channel.clone()).or_default();
        if record.held {
            return Err(ActuatorError::Busy {
                channel: channel.clone(),
            });
        }
        record.held = true;
        record.acquisitions += 1;

        Ok(Box::new(MemoryActuator {
            channel: channel.clone(),
            records: Arc::clone(&self.records),
            released: false,
        }))
    }
}

struct MemoryActuator {
    channel: Channel,
    records: Records,
    released: bool,
}

impl Actuator for MemoryActuator {
    fn channel(&self) -> &Channel {
        &self.channel
    }

    fn set(&mut self, output: Output) -> Result<(), ActuatorError> {
        if self.released {
            return Err(ActuatorError::Released {
                channel: self.channel.clone(),
            });
        }
        lock(&self.records)
            .entry(self.channel.clone())
            .or_default()
            .record(output);
        Ok(())
    }

    fn release(&mut self) -> Result<(), ActuatorError> {
        if self.released {
            return Ok(());
        }
        self.released = true;

        let mut records = lock(&self.records);
        let record = records.entry(self.channel.clone()).or_default();
        record.record(Output::OFF);
        record.held = false;
        record.releases += 1;
        Ok(())
    }
}

/// Snapshot access to a [`MemoryDriver`]'s records.
#[derive(Debug, Clone)]
pub struct MemoryProbe {
    records: Records,
}

impl MemoryProbe {
    /// Record for one channel.
    pub fn record(&self, channel: &Channel) -> Option<ChannelRecord> {
        lock(&self.records).get(channel).cloned()
    }

    /// All records, ordered by channel.
    pub fn snapshot(&self) -> BTreeMap<Channel, ChannelRecord> {
        lock(&self.records).clone()
    }

    /// Channels that currently have a handle out.
    pub fn held_channels(&self) -> Vec<Channel> {
        lock(&self.records)
            .iter()
            .filter(|(_, record)| record.held)
            .map(|(channel, _)| channel.clone())
            .collect()
    }
}
