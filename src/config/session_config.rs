use serde::{Deserialize, Serialize};

/// When the lock flag follows a write
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    /// Flip immediately, keep the flip even if the write fails
    #[default]
    Optimistic,
    /// Flip only once the peripheral acknowledges the write
    Confirmed,
}

/// Session behaviour settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub write_mode: WriteMode,
    /// Language for user-facing log lines, e.g. "ja-JP". Uses the system locale when unset.
    pub locale: Option<String>,
}
