//! Built-in effect routines.
//!
//! Periods and durations are counted in ticks. Every routine is a pure
//! function of the tick index, so replays are deterministic.

use crate::actuator::Actuator;
use crate::color::{Output, Rgb};
use crate::effect::{Effect, EffectParams, Step, StopProgress, Tick};
use crate::error::{EffectFault, ParamError};

pub const DEFAULT_PULSE_PERIOD: u32 = 50;
pub const DEFAULT_BLINK_PERIOD: u32 = 20;
pub const DEFAULT_RAINBOW_PERIOD: u32 = 120;
pub const DEFAULT_FADE_DURATION: u32 = 50;

/// Stop steps PULSE takes to fade out.
pub const PULSE_FADE_STEPS: u64 = 4;

type Built = Result<Box<dyn Effect>, ParamError>;

pub fn solid(params: &EffectParams<'_>) -> Built {
    let output = Output::new(params.color("color")?, params.brightness()?);
    Ok(Box::new(Solid { output }))
}

pub fn pulse(params: &EffectParams<'_>) -> Built {
    Ok(Box::new(Pulse {
        color: params.color("color")?,
        peak: params.brightness()?,
        period: u64::from(params.positive_or("period", DEFAULT_PULSE_PERIOD)?.max(2)),
        level: 0,
    }))
}

pub fn blink(params: &EffectParams<'_>) -> Built {
    Ok(Box::new(Blink {
        on: Output::new(params.color("color")?, params.brightness()?),
        period: u64::from(params.positive_or("period", DEFAULT_BLINK_PERIOD)?.max(2)),
        count: params.positive("count")?.map(u64::from),
    }))
}

pub fn rainbow(params: &EffectParams<'_>) -> Built {
    Ok(Box::new(Rainbow {
        period: u64::from(params.positive_or("period", DEFAULT_RAINBOW_PERIOD)?),
        level: params.brightness()?,
    }))
}

pub fn fade(params: &EffectParams<'_>) -> Built {
    Ok(Box::new(Fade {
        color: params.color("color")?,
        start: params.brightness()?,
        duration: u64::from(params.positive_or("duration", DEFAULT_FADE_DURATION)?),
    }))
}

pub fn off(_params: &EffectParams<'_>) -> Built {
    Ok(Box::new(Off))
}

// `value * num / den` without overflow, for levels.
fn scale(value: u8, num: u64, den: u64) -> u8 {
    (u64::from(value) * num / den.max(1)) as u8
}

struct Solid {
    output: Output,
}

impl Effect for Solid {
    fn step(&mut self, tick: Tick, actuator: &mut dyn Actuator) -> Result<Step, EffectFault> {
        if tick.index == 0 {
            actuator.set(self.output)?;
        }
        Ok(Step::Continue)
    }
}

struct Pulse {
    color: Rgb,
    peak: u8,
    period: u64,
    level: u8,
}

impl Pulse {
    // Triangle wave: dark at phase 0, peak at half period.
    fn level_at(&self, index: u64) -> u8 {
        let phase = index % self.period;
        let half = self.period / 2;
        if phase <= half {
            scale(self.peak, phase, half)
        } else {
            scale(self.peak, self.period - phase, self.period - half)
        }
    }
}

impl Effect for Pulse {
    fn step(&mut self, tick: Tick, actuator: &mut dyn Actuator) -> Result<Step, EffectFault> {
        self.level = self.level_at(tick.index);
        actuator.set(Output::new(self.color, self.level))?;
        Ok(Step::Continue)
    }

    fn stop(&mut self, tick: Tick, actuator: &mut dyn Actuator) -> Result<StopProgress, EffectFault> {
        let remaining = PULSE_FADE_STEPS.saturating_sub(tick.index + 1);
        if remaining == 0 || self.level == 0 {
            actuator.set(Output::OFF)?;
            return Ok(StopProgress::Done);
        }
        let level = scale(self.level, remaining, PULSE_FADE_STEPS);
        actuator.set(Output::new(self.color, level))?;
        Ok(StopProgress::Pending)
    }
}

struct Blink {
    on: Output,
    period: u64,
    count: Option<u64>,
}

impl Effect for Blink {
    fn step(&mut self, tick: Tick, actuator: &mut dyn Actuator) -> Result<Step, EffectFault> {
        if let Some(count) = self.count {
            if tick.index >= count * self.period {
                actuator.set(Output::OFF)?;
                return Ok(Step::Complete);
            }
        }

        let phase = tick.index % self.period;
        let half = self.period / 2;
        if phase == 0 {
            actuator.set(self.on)?;
        } else if phase == half {
            actuator.set(Output::OFF)?;
        }
        Ok(Step::Continue)
    }
}

struct Rainbow {
    period: u64,
    level: u8,
}

impl Effect for Rainbow {
    fn step(&mut self, tick: Tick, actuator: &mut dyn Actuator) -> Result<Step, EffectFault> {
        let hue = (tick.index % self.period) * 360 / self.period;
        actuator.set(Output::new(Rgb::from_hue(hue as u32), self.level))?;
        Ok(Step::Continue)
    }
}

struct Fade {
    color: Rgb,
    start: u8,
    duration: u64,
}

impl Effect for Fade {
    fn step(&mut self, tick: Tick, actuator: &mut dyn Actuator) -> Result<Step, EffectFault> {
        if tick.index >= self.duration {
            actuator.set(Output::OFF)?;
            return Ok(Step::Complete);
        }
        let level = scale(self.start, self.duration - tick.index, self.duration);
        actuator.set(Output::new(self.color, level))?;
        Ok(Step::Continue)
    }
}

struct Off;

impl Effect for Off {
    fn step(&mut self, _tick: Tick, actuator: &mut dyn Actuator) -> Result<Step, EffectFault> {
        actuator.set(Output::OFF)?;
        Ok(Step::Complete)
    }
}
