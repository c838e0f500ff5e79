use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Python not found on system")]
    PythonNotFound,

    #[error("Invalid theme seed: {0}")]
    InvalidThemeSeed(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Unsupported by renderer: {0}")]
    Unsupported(String),

    #[error("Execution error: {0}")]
    Execution(String),

    #[error("AI provider error: {0}")]
    AiProviderError(String),

    #[error("AI provider rate limited: {0}")]
    RateLimited(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),
}

impl AppError {
    /// Whether a retry of the same call may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, AppError::RateLimited(_))
    }
}

// Reports embed errors as plain strings, so serialize as the Display text.
impl Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_serializes_as_display_string() {
        let err = AppError::InvalidThemeSeed("bad color 'red'".into());
        let json = serde_json::to_string(&err).unwrap();
        assert_eq!(json, "\"Invalid theme seed: bad color 'red'\"");
    }

    #[test]
    fn test_only_rate_limit_is_transient() {
        assert!(AppError::RateLimited("429".into()).is_transient());
        assert!(!AppError::AiProviderError("500".into()).is_transient());
        assert!(!AppError::PythonNotFound.is_transient());
    }
}
