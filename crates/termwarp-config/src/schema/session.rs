use serde::{Deserialize, Serialize};

/// The hijacked subprocess and its remote input mailbox.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Command line handed to `shell -c`.
    pub command: String,
    /// Shell used to interpret `command`.
    pub shell: String,
    /// Pending remote lines before submissions are rejected (valid range: 1-10000).
    pub queue_capacity: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            command: "claude".into(),
            shell: "sh".into(),
            queue_capacity: 100,
        }
    }
}
