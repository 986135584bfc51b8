use std::collections::BTreeMap;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use flux_command::Command;
use serde::Serialize;
use tracing::{error, trace, warn};

use crate::actuator::OutputDriver;
use crate::channel::Channel;
use crate::config::SchedulerConfig;
use crate::effect::{EffectParams, Step, StopProgress};
use crate::error::{DispatchError, EffectFault};
use crate::instance::{EffectInstance, EffectState, InstanceId, InstanceInfo, Journal, Transition};
use crate::registry::EffectRegistry;

/// A command that started an instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dispatched {
    pub instance: InstanceId,
    pub verb: String,
    pub channel: Channel,
    pub superseded: Option<Superseded>,
}

/// The instance a dispatch replaced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Superseded {
    pub instance: InstanceId,
    pub outcome: StopOutcome,
}

/// How a stop request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StopOutcome {
    /// The effect finished cleanup and released its actuator.
    Stopped,
    /// The stop budget ran out; the instance was forced to `Failed`.
    TimedOut,
    /// The effect faulted while stopping.
    Faulted,
}

/// What one [`Scheduler::tick`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TickReport {
    /// Running instances that stepped and keep running.
    pub advanced: usize,
    /// Single-shot instances that finished.
    pub completed: usize,
    /// Stopping instances that reached `Stopped`.
    pub stopped: usize,
    /// Instances that became `Failed`.
    pub failed: usize,
}

/// What [`Scheduler::shutdown`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ShutdownReport {
    /// Instances that stopped cleanly.
    pub stopped: usize,
    /// Instances forced to `Failed`.
    pub forced: usize,
}

/// Runs effect instances, one per channel.
///
/// All methods run on the caller's thread. Supersession and shutdown block
/// for at most the configured stop timeout.
pub struct Scheduler {
    registry: Arc<EffectRegistry>,
    driver: Box<dyn OutputDriver>,
    config: SchedulerConfig,
    instances: BTreeMap<Channel, EffectInstance>,
    journal: Journal,
    next_id: u64,
}

impl Scheduler {
    pub fn new(
        registry: Arc<EffectRegistry>,
        driver: Box<dyn OutputDriver>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            registry,
            driver,
            config,
            instances: BTreeMap::new(),
            journal: Journal::default(),
            next_id: 1,
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<EffectRegistry> {
        &self.registry
    }

    /// Start the effect `command` names on its channel.
    ///
    /// The command is fully validated and its effect built before an
    /// existing instance on the channel is touched, so a rejected command
    /// leaves the scheduler unchanged.
    pub fn dispatch(&mut self, command: &Command) -> Result<Dispatched, DispatchError> {
        let verb = command.verb();
        let descriptor = self
            .registry
            .lookup(verb)
            .map_err(|_| DispatchError::NotFound {
                verb: verb.to_string(),
            })?;

        let missing = descriptor.missing_headers(command);
        if !missing.is_empty() {
            return Err(DispatchError::MissingHeaders {
                verb: verb.to_string(),
                missing,
            });
        }

        let channel = Channel::for_command(command).ok_or_else(|| DispatchError::InvalidChannel {
            verb: verb.to_string(),
        })?;

        let effect = descriptor
            .build(&EffectParams::new(command))
            .map_err(|source| DispatchError::InvalidHeader {
                verb: verb.to_string(),
                source,
            })?;

        let superseded = match self.instances.remove(&channel) {
            Some(mut old) if old.state.is_active() => {
                let outcome = self.stop_now(&mut old);
                Some(Superseded {
                    instance: old.id,
                    outcome,
                })
            }
            // Terminal instances have already released their actuator.
            Some(_) | None => None,
        };

        let actuator = self
            .driver
            .acquire(&channel)
            .map_err(|source| DispatchError::Actuator {
                channel: channel.clone(),
                source,
            })?;

        let id = InstanceId::new(self.next_id);
        self.next_id += 1;

        let mut instance =
            EffectInstance::new(id, verb.to_string(), channel.clone(), effect, actuator);
        self.journal.transition(&mut instance, EffectState::Running);
        self.instances.insert(channel.clone(), instance);

        Ok(Dispatched {
            instance: id,
            verb: verb.to_string(),
            channel,
            superseded,
        })
    }

    /// Advance every active instance by one step.
    pub fn tick(&mut self) -> TickReport {
        let mut report = TickReport::default();
        let budget = self.config.stop_budget();
        let quantum = self.config.tick_interval;

        for instance in self.instances.values_mut() {
            match instance.state {
                EffectState::Running => match instance.step(quantum) {
                    Ok(Step::Continue) => report.advanced += 1,
                    Ok(Step::Complete) => {
                        if finish(&mut self.journal, instance) {
                            report.completed += 1;
                        } else {
                            report.failed += 1;
                        }
                    }
                    Err(fault) => {
                        fail(&mut self.journal, instance, &fault);
                        report.failed += 1;
                    }
                },
                EffectState::Stopping => match instance.stop_step(quantum) {
                    Ok(StopProgress::Done) => {
                        if finish(&mut self.journal, instance) {
                            report.stopped += 1;
                        } else {
                            report.failed += 1;
                        }
                    }
                    Ok(StopProgress::Pending) if instance.stop_steps() >= budget => {
                        force(&mut self.journal, instance, budget);
                        report.failed += 1;
                    }
                    Ok(StopProgress::Pending) => {}
                    Err(fault) => {
                        fail(&mut self.journal, instance, &fault);
                        report.failed += 1;
                    }
                },
                _ => {}
            }
        }

        if report != TickReport::default() {
            trace!(
                advanced = report.advanced,
                completed = report.completed,
                stopped = report.stopped,
                failed = report.failed,
                "tick"
            );
        }
        report
    }

    /// Ask the instance on `channel` to stop. Its stop steps run on later
    /// ticks. Returns false if nothing was running there.
    pub fn stop(&mut self, channel: &Channel) -> bool {
        match self.instances.get_mut(channel) {
            Some(instance) if instance.state == EffectState::Running => {
                self.journal.transition(instance, EffectState::Stopping);
                true
            }
            _ => false,
        }
    }

    /// Stop every active instance within the stop timeout, force the rest to
    /// `Failed`, and release every actuator.
    pub fn shutdown(&mut self) -> ShutdownReport {
        let mut report = ShutdownReport::default();
        let budget = self.config.stop_budget();
        let quantum = self.config.tick_interval;
        let deadline = self.config.stop_deadline(Instant::now());

        for instance in self.instances.values_mut() {
            if instance.state == EffectState::Running {
                self.journal.transition(instance, EffectState::Stopping);
            }
        }

        loop {
            let mut pending = 0usize;
            for instance in self.instances.values_mut() {
                if instance.state != EffectState::Stopping {
                    continue;
                }
                match instance.stop_step(quantum) {
                    Ok(StopProgress::Done) => {
                        if finish(&mut self.journal, instance) {
                            report.stopped += 1;
                        } else {
                            report.forced += 1;
                        }
                    }
                    Ok(StopProgress::Pending) if instance.stop_steps() >= budget => {
                        force(&mut self.journal, instance, budget);
                        report.forced += 1;
                    }
                    Ok(StopProgress::Pending) => pending += 1,
                    Err(fault) => {
                        fail(&mut self.journal, instance, &fault);
                        report.forced += 1;
                    }
                }
            }

            if pending == 0 {
                break;
            }
            let now = Instant::now();
            match deadline {
                Some(deadline) if now >= deadline => {
                    for instance in self.instances.values_mut() {
                        if instance.state == EffectState::Stopping {
                            force(&mut self.journal, instance, budget);
                            report.forced += 1;
                        }
                    }
                    break;
                }
                Some(deadline) => thread::sleep(quantum.min(deadline - now)),
                None => thread::sleep(quantum),
            }
        }

        // Terminal instances released on the way in; this catches any
        // release that failed earlier.
        for instance in self.instances.values_mut() {
            if instance.holds_actuator() {
                if let Err(err) = instance.release() {
                    warn!(instance = %instance.id, channel = %instance.channel, error = %err, "actuator release failed");
                }
            }
        }

        report
    }

    /// Drain the transition journal.
    pub fn take_transitions(&mut self) -> Vec<Transition> {
        self.journal.drain()
    }

    /// State of the instance on `channel`, including terminal ones not yet
    /// collected.
    pub fn state(&self, channel: &Channel) -> Option<EffectState> {
        self.instances.get(channel).map(|instance| instance.state)
    }

    /// Channels with a running or stopping instance.
    pub fn active_channels(&self) -> Vec<Channel> {
        self.instances
            .iter()
            .filter(|(_, instance)| instance.state.is_active())
            .map(|(channel, _)| channel.clone())
            .collect()
    }

    /// Every instance the scheduler holds, ordered by channel.
    pub fn instances(&self) -> Vec<InstanceInfo> {
        self.instances.values().map(EffectInstance::info).collect()
    }

    // Drive an instance's stop steps to completion now, pacing them one
    // tick apart, bounded by the stop budget and the stop timeout.
    fn stop_now(&mut self, instance: &mut EffectInstance) -> StopOutcome {
        if instance.state == EffectState::Running {
            self.journal.transition(instance, EffectState::Stopping);
        }

        let budget = self.config.stop_budget();
        let quantum = self.config.tick_interval;
        let deadline = self.config.stop_deadline(Instant::now());

        while instance.stop_steps() < budget {
            match instance.stop_step(quantum) {
                Ok(StopProgress::Done) => {
                    return if finish(&mut self.journal, instance) {
                        StopOutcome::Stopped
                    } else {
                        StopOutcome::Faulted
                    };
                }
                Ok(StopProgress::Pending) => {}
                Err(fault) => {
                    fail(&mut self.journal, instance, &fault);
                    return StopOutcome::Faulted;
                }
            }

            if instance.stop_steps() >= budget {
                break;
            }
            let now = Instant::now();
            match deadline {
                Some(deadline) if now >= deadline => break,
                Some(deadline) => thread::sleep(quantum.min(deadline - now)),
                None => thread::sleep(quantum),
            }
        }

        force(&mut self.journal, instance, budget);
        StopOutcome::TimedOut
    }
}

// Release the actuator and move to `Stopped`. A failed release leaves the
// instance `Failed` instead; returns whether it stopped cleanly.
fn finish(journal: &mut Journal, instance: &mut EffectInstance) -> bool {
    match instance.release() {
        Ok(()) => {
            journal.transition(instance, EffectState::Stopped);
            true
        }
        Err(err) => {
            error!(
                instance = %instance.id,
                verb = %instance.verb,
                channel = %instance.channel,
                error = %err,
                "actuator release failed"
            );
            journal.transition(instance, EffectState::Failed);
            false
        }
    }
}

fn fail(journal: &mut Journal, instance: &mut EffectInstance, fault: &EffectFault) {
    error!(
        instance = %instance.id,
        verb = %instance.verb,
        channel = %instance.channel,
        error = %fault,
        "effect failed"
    );
    release_best_effort(instance);
    journal.transition(instance, EffectState::Failed);
}

fn force(journal: &mut Journal, instance: &mut EffectInstance, budget: u64) {
    warn!(
        instance = %instance.id,
        verb = %instance.verb,
        channel = %instance.channel,
        stop_steps = instance.stop_steps(),
        budget,
        "effect did not stop in time; forcing release"
    );
    release_best_effort(instance);
    journal.transition(instance, EffectState::Failed);
}

fn release_best_effort(instance: &mut EffectInstance) {
    if let Err(err) = instance.release() {
        warn!(
            instance = %instance.id,
            channel = %instance.channel,
            error = %err,
            "actuator release failed"
        );
    }
}
