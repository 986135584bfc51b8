use std::any::Any;
use std::collections::VecDeque;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;

use serde::Serialize;
use tracing::trace;

use crate::actuator::Actuator;
use crate::channel::Channel;
use crate::effect::{Effect, Step, StopProgress, Tick};
use crate::error::{ActuatorError, EffectFault};

/// Transitions kept before the oldest are dropped.
pub const JOURNAL_LIMIT: usize = 1024;

/// Scheduler-assigned instance id, unique per scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct InstanceId(u64);

impl InstanceId {
    pub(crate) fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle state of an effect instance.
///
/// `Idle -> Running -> Stopping -> Stopped`, with `Failed` reachable from
/// `Running` and `Stopping`. Terminal states last until the next dispatch
/// on the channel collects the instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EffectState {
    Idle,
    Running,
    Stopping,
    Stopped,
    Failed,
}

impl EffectState {
    pub fn is_terminal(self) -> bool {
        matches!(self, EffectState::Stopped | EffectState::Failed)
    }

    pub fn is_active(self) -> bool {
        matches!(self, EffectState::Running | EffectState::Stopping)
    }
}

impl fmt::Display for EffectState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EffectState::Idle => "idle",
            EffectState::Running => "running",
            EffectState::Stopping => "stopping",
            EffectState::Stopped => "stopped",
            EffectState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// One journaled state change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transition {
    pub instance: InstanceId,
    pub verb: String,
    pub channel: Channel,
    pub from: EffectState,
    pub to: EffectState,
}

/// Observable view of an instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstanceInfo {
    pub id: InstanceId,
    pub verb: String,
    pub channel: Channel,
    pub state: EffectState,
    pub steps: u64,
}

pub(crate) struct EffectInstance {
    pub(crate) id: InstanceId,
    pub(crate) verb: String,
    pub(crate) channel: Channel,
    pub(crate) state: EffectState,
    effect: Box<dyn Effect>,
    actuator: Option<Box<dyn Actuator>>,
    steps: u64,
    stop_steps: u64,
}

impl EffectInstance {
    pub(crate) fn new(
        id: InstanceId,
        verb: String,
        channel: Channel,
        effect: Box<dyn Effect>,
        actuator: Box<dyn Actuator>,
    ) -> Self {
        Self {
            id,
            verb,
            channel,
            state: EffectState::Idle,
            effect,
            actuator: Some(actuator),
            steps: 0,
            stop_steps: 0,
        }
    }

    pub(crate) fn info(&self) -> InstanceInfo {
        InstanceInfo {
            id: self.id,
            verb: self.verb.clone(),
            channel: self.channel.clone(),
            state: self.state,
            steps: self.steps,
        }
    }

    pub(crate) fn stop_steps(&self) -> u64 {
        self.stop_steps
    }

    /// Run one step of the routine, catching panics.
    pub(crate) fn step(&mut self, quantum: Duration) -> Result<Step, EffectFault> {
        let tick = Tick {
            index: self.steps,
            quantum,
        };
        self.steps += 1;

        let actuator = self.actuator.as_deref_mut().ok_or_else(|| {
            EffectFault::Actuator(ActuatorError::Released {
                channel: self.channel.clone(),
            })
        })?;
        let effect = &mut self.effect;
        guarded(|| effect.step(tick, actuator))
    }

    /// Run one stop step of the routine, catching panics.
    pub(crate) fn stop_step(&mut self, quantum: Duration) -> Result<StopProgress, EffectFault> {
        let tick = Tick {
            index: self.stop_steps,
            quantum,
        };
        self.stop_steps += 1;

        let actuator = self.actuator.as_deref_mut().ok_or_else(|| {
            EffectFault::Actuator(ActuatorError::Released {
                channel: self.channel.clone(),
            })
        })?;
        let effect = &mut self.effect;
        guarded(|| effect.stop(tick, actuator))
    }

    /// Give the actuator back. A no-op once released.
    pub(crate) fn release(&mut self) -> Result<(), ActuatorError> {
        match self.actuator.take() {
            Some(mut actuator) => actuator.release(),
            None => Ok(()),
        }
    }

    pub(crate) fn holds_actuator(&self) -> bool {
        self.actuator.is_some()
    }
}

fn guarded<R>(f: impl FnOnce() -> Result<R, EffectFault>) -> Result<R, EffectFault> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => Err(EffectFault::Panicked(panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Bounded log of state changes.
#[derive(Debug, Default)]
pub(crate) struct Journal {
    entries: VecDeque<Transition>,
}

impl Journal {
    /// Move `instance` to `to` and record the change.
    pub(crate) fn transition(&mut self, instance: &mut EffectInstance, to: EffectState) {
        let from = instance.state;
        instance.state = to;
        trace!(
            instance = %instance.id,
            verb = %instance.verb,
            channel = %instance.channel,
            %from,
            %to,
            "effect state changed"
        );

        if self.entries.len() == JOURNAL_LIMIT {
            self.entries.pop_front();
        }
        self.entries.push_back(Transition {
            instance: instance.id,
            verb: instance.verb.clone(),
            channel: instance.channel.clone(),
            from,
            to,
        });
    }

    pub(crate) fn drain(&mut self) -> Vec<Transition> {
        self.entries.drain(..).collect()
    }
}
