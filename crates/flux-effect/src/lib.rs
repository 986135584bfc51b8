//! Effect catalog and scheduler.
//!
//! A parsed [`Command`](flux_command::Command) names an effect by its verb.
//! The [`EffectRegistry`] maps verbs to descriptors (a fixed catalog of
//! built-in [`EffectKind`]s plus any descriptors registered at startup), and
//! the [`Scheduler`] turns commands into running effect instances:
//!
//! - at most one active instance per [`Channel`];
//! - a new command on a busy channel cooperatively stops the old instance
//!   first, forcing it to `Failed` if it does not stop in time;
//! - instances advance one step per [`Scheduler::tick`], never concurrently
//!   with dispatch;
//! - a failing or panicking effect only fails its own instance.
//!
//! Effects write [`Output`]s through an [`Actuator`] handle that the
//! scheduler acquires from an [`OutputDriver`] and holds exclusively for the
//! instance's lifetime.

pub mod actuator;
pub mod builtin;
pub mod channel;
pub mod color;
pub mod config;
pub mod descriptor;
pub mod effect;
pub mod error;
pub mod instance;
pub mod registry;
pub mod scheduler;

pub use actuator::{
    Actuator, ChannelRecord, MemoryDriver, MemoryProbe, OutputDriver, TracingDriver,
};
pub use channel::{Channel, DEFAULT_CHANNEL};
pub use color::{Output, Rgb};
pub use config::SchedulerConfig;
pub use descriptor::{EffectDescriptor, EffectFactory, EffectKind, Lifecycle};
pub use effect::{Effect, EffectParams, Step, StopProgress, Tick};
pub use error::{ActuatorError, DispatchError, EffectError, EffectFault, ParamError, Result};
pub use instance::{EffectState, InstanceId, InstanceInfo, Transition};
pub use registry::EffectRegistry;
pub use scheduler::{Dispatched, Scheduler, ShutdownReport, StopOutcome, Superseded, TickReport};
