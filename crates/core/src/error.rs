/// Result alias that carries the custom [`StonerizmError`] type.
pub type Result<T> = std::result::Result<T, StonerizmError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum StonerizmError {
    /// Free-form message for failures that do not warrant their own variant,
    /// such as a poisoned telemetry lock or an unavailable audio backend.
    #[error("{0}")]
    Message(String),
    /// A caller handed the engine an argument it cannot act on.
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    /// Score data failed validation at load time.
    #[error("invalid score at {location}: {reason}")]
    InvalidScore { location: String, reason: String },
    /// A drum pattern contains a character outside the declared alphabet.
    #[error("invalid drum pattern `{pattern}`: unexpected `{found}` at column {column}")]
    InvalidPattern {
        pattern: String,
        found: char,
        column: usize,
    },
    /// Configuration or score JSON could not be parsed.
    #[error("{0}")]
    Config(#[from] serde_json::Error),
    /// Spectral analysis failed inside the FFT backend.
    #[error("{0}")]
    Fft(#[from] realfft::FftError),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
}

impl StonerizmError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    pub(crate) fn score(location: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidScore {
            location: location.into(),
            reason: reason.into(),
        }
    }
}

impl From<&str> for StonerizmError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for StonerizmError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
