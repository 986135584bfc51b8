use std::time::Duration;

use flux_command::Command;

use crate::actuator::Actuator;
use crate::color::{Output, Rgb};
use crate::error::{EffectFault, ParamError};

/// One scheduling quantum as seen by an effect.
///
/// `index` counts the steps of the current phase: it starts at 0 on the
/// first `step` and again at 0 on the first `stop` call, so effects can be
/// written as pure functions of the tick count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    pub index: u64,
    pub quantum: Duration,
}

/// Result of a run step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Keep running.
    Continue,
    /// Finished on its own (single-shot effects).
    Complete,
}

/// Result of a stop step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopProgress {
    /// Cleanup needs more steps.
    Pending,
    /// The output is in a safe state.
    Done,
}

/// A running effect routine.
///
/// Effects never block and never hold on to the actuator between calls.
/// The scheduler releases the actuator once the effect reports
/// [`Step::Complete`] or [`StopProgress::Done`].
pub trait Effect: Send {
    fn step(&mut self, tick: Tick, actuator: &mut dyn Actuator) -> Result<Step, EffectFault>;

    /// Advance cleanup after a stop request. The default turns the output
    /// off immediately.
    fn stop(
        &mut self,
        tick: Tick,
        actuator: &mut dyn Actuator,
    ) -> Result<StopProgress, EffectFault> {
        let _ = tick;
        actuator.set(Output::OFF)?;
        Ok(StopProgress::Done)
    }
}

/// Typed access to a command's headers for effect factories.
#[derive(Debug, Clone, Copy)]
pub struct EffectParams<'a> {
    command: &'a Command,
}

impl<'a> EffectParams<'a> {
    pub fn new(command: &'a Command) -> Self {
        Self { command }
    }

    pub fn command(&self) -> &'a Command {
        self.command
    }

    /// Raw header value.
    pub fn raw(&self, header: &str) -> Option<&'a str> {
        self.command.header(header)
    }

    /// A color header. Absent counts as invalid.
    pub fn color(&self, header: &str) -> Result<Rgb, ParamError> {
        let value = self.raw(header).unwrap_or_default();
        Rgb::parse(value).ok_or_else(|| invalid(header, value, "a color name or #rrggbb"))
    }

    /// A positive integer header, or `default` if absent.
    pub fn positive_or(&self, header: &str, default: u32) -> Result<u32, ParamError> {
        Ok(self.positive(header)?.unwrap_or(default))
    }

    /// An optional positive integer header.
    pub fn positive(&self, header: &str) -> Result<Option<u32>, ParamError> {
        let Some(value) = self.raw(header) else {
            return Ok(None);
        };
        match value.trim().parse::<u32>() {
            Ok(n) if n > 0 => Ok(Some(n)),
            _ => Err(invalid(header, value, "a positive integer")),
        }
    }

    /// The `brightness` header (0-255), full brightness if absent.
    pub fn brightness(&self) -> Result<u8, ParamError> {
        let Some(value) = self.raw("brightness") else {
            return Ok(u8::MAX);
        };
        value
            .trim()
            .parse::<u8>()
            .map_err(|_| invalid("brightness", value, "an integer between 0 and 255"))
    }
}

fn invalid(header: &str, value: &str, expected: &'static str) -> ParamError {
    ParamError {
        header: header.to_string(),
        value: value.to_string(),
        expected,
    }
}
