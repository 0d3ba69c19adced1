/// Result alias that carries the custom [`RewindError`] type.
pub type Result<T> = std::result::Result<T, RewindError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum RewindError {
    /// Free-form failure surfaced to the caller as-is.
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// Configuration file could not be parsed.
    #[error("invalid configuration json: {0}")]
    Json(#[from] serde_json::Error),
    /// Configuration parsed but holds values the recorder cannot use.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// A tracked object does not expose one of the declared properties.
    #[error("target has no numeric property `{property}`")]
    UnknownProperty { property: String },
    /// The shared target's lock was poisoned by a panicking holder.
    #[error("target `{label}` has been poisoned")]
    TargetPoisoned { label: String },
}

impl RewindError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    pub(crate) fn unknown_property(property: &str) -> Self {
        Self::UnknownProperty {
            property: property.to_string(),
        }
    }
}

impl From<&str> for RewindError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for RewindError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
