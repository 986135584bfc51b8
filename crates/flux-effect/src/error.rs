use crate::channel::Channel;

/// Errors raised by the effect catalog.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EffectError {
    /// A descriptor with the same verb is already registered.
    ///
    /// Raised while building the catalog at startup; treated as fatal.
    #[error("effect verb {0:?} is already registered")]
    DuplicateVerb(String),

    /// No descriptor is registered for the verb.
    #[error("no effect registered for verb {0:?}")]
    NotFound(String),
}

/// A command was rejected by the scheduler. The session continues.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// The verb is not in the catalog.
    #[error("unknown effect verb {verb:?}")]
    NotFound { verb: String },

    /// Required headers are absent.
    #[error("{verb} is missing required headers: {}", missing.join(", "))]
    MissingHeaders { verb: String, missing: Vec<String> },

    /// A header value could not be used by the effect.
    #[error("{verb}: {source}")]
    InvalidHeader {
        verb: String,
        #[source]
        source: ParamError,
    },

    /// The `channel` header is empty.
    #[error("{verb}: channel name must not be empty")]
    InvalidChannel { verb: String },

    /// The output driver could not hand out the channel's actuator.
    #[error("channel {channel}: {source}")]
    Actuator {
        channel: Channel,
        #[source]
        source: ActuatorError,
    },
}

impl DispatchError {
    /// Short machine-friendly reason, used in `ERROR` frames.
    pub fn kind(&self) -> &'static str {
        match self {
            DispatchError::NotFound { .. } => "unknown-verb",
            DispatchError::MissingHeaders { .. } => "missing-headers",
            DispatchError::InvalidHeader { .. } => "invalid-header",
            DispatchError::InvalidChannel { .. } => "invalid-channel",
            DispatchError::Actuator { .. } => "actuator",
        }
    }
}

/// A header value an effect factory could not accept.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("header {header}:{value:?} is not {expected}")]
pub struct ParamError {
    pub header: String,
    pub value: String,
    pub expected: &'static str,
}

/// Errors reported by actuator handles and output drivers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActuatorError {
    /// Another instance still holds the channel.
    #[error("channel {channel} is already held")]
    Busy { channel: Channel },

    /// The handle was used after release.
    #[error("channel {channel} handle used after release")]
    Released { channel: Channel },

    /// The hardware rejected an operation.
    #[error("hardware error: {0}")]
    Hardware(String),
}

/// Fault raised by an effect while stepping. Isolated to its instance.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EffectFault {
    /// Writing to the actuator failed.
    #[error("actuator: {0}")]
    Actuator(#[from] ActuatorError),

    /// The effect routine reported a failure.
    #[error("{0}")]
    Routine(String),

    /// The effect routine panicked.
    #[error("panicked: {0}")]
    Panicked(String),
}

pub type Result<T> = std::result::Result<T, EffectError>;
