/// Errors produced while decoding a frame into a command.
///
/// Every variant rejects a single command; the stream stays usable.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// The frame held no bytes other than line endings.
    #[error("empty frame")]
    EmptyFrame,

    /// The first line carried no verb token.
    #[error("missing verb")]
    MissingVerb,

    /// A header line had no `:` separator or an empty name.
    #[error("malformed header line {line}: {content:?}")]
    MalformedHeaderLine { line: usize, content: String },

    /// A header contained an unknown `\` escape.
    #[error("invalid escape {sequence:?} in header line {line}")]
    InvalidEscape { line: usize, sequence: String },

    /// The verb or a header line was not valid UTF-8.
    #[error("line {line} is not valid UTF-8")]
    InvalidUtf8 { line: usize },
}

pub type Result<T> = std::result::Result<T, ParseError>;
