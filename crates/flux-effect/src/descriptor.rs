//! Effect descriptors and the fixed catalog of built-in effects.

use std::fmt;

use flux_command::Command;
use serde::Serialize;

use crate::builtin;
use crate::effect::{Effect, EffectParams};
use crate::error::ParamError;

/// Builds a running effect from a command's headers.
pub type EffectFactory = fn(&EffectParams<'_>) -> Result<Box<dyn Effect>, ParamError>;

/// Whether an effect runs until replaced or finishes by itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Lifecycle {
    Continuous,
    SingleShot,
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lifecycle::Continuous => f.write_str("continuous"),
            Lifecycle::SingleShot => f.write_str("single-shot"),
        }
    }
}

/// Catalog entry: a verb and how to build its effect.
#[derive(Debug, Clone)]
pub struct EffectDescriptor {
    verb: String,
    required: Vec<String>,
    optional: Vec<String>,
    summary: String,
    lifecycle: Lifecycle,
    factory: EffectFactory,
}

impl EffectDescriptor {
    /// A continuous effect with no headers and no summary.
    pub fn new(verb: impl Into<String>, factory: EffectFactory) -> Self {
        Self {
            verb: verb.into(),
            required: Vec::new(),
            optional: Vec::new(),
            summary: String::new(),
            lifecycle: Lifecycle::Continuous,
            factory,
        }
    }

    /// Headers that must be present for dispatch.
    pub fn requires(mut self, headers: &[&str]) -> Self {
        self.required = sorted(headers);
        self
    }

    /// Headers the effect reads when present.
    pub fn accepts(mut self, headers: &[&str]) -> Self {
        self.optional = sorted(headers);
        self
    }

    pub fn summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    pub fn lifecycle(mut self, lifecycle: Lifecycle) -> Self {
        self.lifecycle = lifecycle;
        self
    }

    pub fn verb(&self) -> &str {
        &self.verb
    }

    pub fn required_headers(&self) -> &[String] {
        &self.required
    }

    pub fn optional_headers(&self) -> &[String] {
        &self.optional
    }

    pub fn summary_text(&self) -> &str {
        &self.summary
    }

    pub fn kind(&self) -> Lifecycle {
        self.lifecycle
    }

    /// Required headers `command` lacks, sorted.
    pub fn missing_headers(&self, command: &Command) -> Vec<String> {
        self.required
            .iter()
            .filter(|name| !command.has_header(name))
            .cloned()
            .collect()
    }

    /// Run the factory.
    pub fn build(&self, params: &EffectParams<'_>) -> Result<Box<dyn Effect>, ParamError> {
        (self.factory)(params)
    }
}

fn sorted(headers: &[&str]) -> Vec<String> {
    let mut headers: Vec<String> = headers.iter().map(|h| h.to_string()).collect();
    headers.sort();
    headers.dedup();
    headers
}

/// The built-in effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EffectKind {
    Solid,
    Pulse,
    Blink,
    Rainbow,
    Fade,
    Off,
}

impl EffectKind {
    pub const ALL: [EffectKind; 6] = [
        EffectKind::Solid,
        EffectKind::Pulse,
        EffectKind::Blink,
        EffectKind::Rainbow,
        EffectKind::Fade,
        EffectKind::Off,
    ];

    pub fn verb(self) -> &'static str {
        match self {
            EffectKind::Solid => "SOLID",
            EffectKind::Pulse => "PULSE",
            EffectKind::Blink => "BLINK",
            EffectKind::Rainbow => "RAINBOW",
            EffectKind::Fade => "FADE",
            EffectKind::Off => "OFF",
        }
    }

    /// Exact, case-sensitive match.
    pub fn from_verb(verb: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.verb() == verb)
    }

    pub fn descriptor(self) -> EffectDescriptor {
        let descriptor = EffectDescriptor::new(self.verb(), self.factory());
        match self {
            EffectKind::Solid => descriptor
                .requires(&["color"])
                .accepts(&["brightness"])
                .summary("Hold a steady color"),
            EffectKind::Pulse => descriptor
                .requires(&["color"])
                .accepts(&["period", "brightness"])
                .summary("Breathe a color up and down, fading out when stopped"),
            EffectKind::Blink => descriptor
                .requires(&["color"])
                .accepts(&["period", "count", "brightness"])
                .summary("Flash a color on and off, optionally a fixed number of times"),
            EffectKind::Rainbow => descriptor
                .accepts(&["period", "brightness"])
                .summary("Cycle through the color wheel"),
            EffectKind::Fade => descriptor
                .requires(&["color"])
                .accepts(&["duration", "brightness"])
                .summary("Fade a color to dark once")
                .lifecycle(Lifecycle::SingleShot),
            EffectKind::Off => descriptor
                .summary("Turn the channel off")
                .lifecycle(Lifecycle::SingleShot),
        }
    }

    fn factory(self) -> EffectFactory {
        match self {
            EffectKind::Solid => builtin::solid,
            EffectKind::Pulse => builtin::pulse,
            EffectKind::Blink => builtin::blink,
            EffectKind::Rainbow => builtin::rainbow,
            EffectKind::Fade => builtin::fade,
            EffectKind::Off => builtin::off,
        }
    }
}

impl fmt::Display for EffectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.verb())
    }
}
