/// Result alias that carries the custom [`TrafficJamError`] type.
pub type Result<T> = std::result::Result<T, TrafficJamError>;

/// Common error type for the core crate.
///
/// Only fatal conditions are represented here. Input on an unmapped control
/// and a clock that jumps backwards are ordinary runtime situations and are
/// reported through `tracing` instead.
#[derive(Debug, thiserror::Error)]
pub enum TrafficJamError {
    /// Invalid scene, palette or application configuration. Raised while a
    /// session is being assembled, never once the event loop runs.
    #[error("configuration error in {context}: {message}")]
    Configuration { context: String, message: String },
    /// Free-form failure surfaced by the application layer, e.g. a missing
    /// MIDI device.
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// Malformed JSON in a configuration file.
    #[error("{0}")]
    Json(#[from] serde_json::Error),
}

impl TrafficJamError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    /// Creates a configuration error tagged with the element that caused it.
    pub fn config(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Configuration {
            context: context.into(),
            message: message.into(),
        }
    }

    /// Returns true for errors raised by configuration validation.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration { .. })
    }
}

impl From<&str> for TrafficJamError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for TrafficJamError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_errors_name_their_context() {
        let err = TrafficJamError::config("scene `intro`", "duplicate control pad5");
        assert!(err.is_configuration());
        assert_eq!(
            err.to_string(),
            "configuration error in scene `intro`: duplicate control pad5"
        );
    }

    #[test]
    fn plain_messages_are_not_configuration_errors() {
        let err: TrafficJamError = "no device".into();
        assert!(!err.is_configuration());
        assert_eq!(err.to_string(), "no device");
    }
}
