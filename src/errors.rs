use thiserror::Error;

#[derive(Debug, Error)]
pub enum AutoProcessorError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid selector '{selector}': {reason}")]
    Selector { selector: String, reason: String },

    #[error("Stale node handle: rendered at generation {handle}, page is at {current}")]
    StaleNode { handle: u64, current: u64 },

    #[error("UI tree error: {0}")]
    UiTree(String),

    #[error("Sequence step failed: {0}")]
    Step(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialize error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),
}

impl serde::Serialize for AutoProcessorError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::ser::Serializer,
    {
        serializer.serialize_str(self.to_string().as_str())
    }
}

pub type AutoProcessorResult<T> = Result<T, AutoProcessorError>;
