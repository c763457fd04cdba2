//! Orchestrator configuration.

use std::env;
use std::time::Duration;

/// Conversation window and summarization thresholds.
#[derive(Debug, Clone)]
pub struct MemorySettings {
    /// Turns kept verbatim in the active window.
    pub max_history: usize,

    /// Summarize once the stored history exceeds `max_history + summary_margin`.
    pub summary_margin: usize,

    /// Skip summarization when fewer turns than this have left the window.
    pub min_overflow: usize,

    /// Upper bound on the summary length, in sentences.
    pub max_summary_sentences: usize,
}

impl Default for MemorySettings {
    fn default() -> Self {
        Self {
            max_history: 20,
            summary_margin: 10,
            min_overflow: 4,
            max_summary_sentences: 15,
        }
    }
}

impl MemorySettings {
    /// Load memory settings from environment variables.
    ///
    /// - `MAX_CONVERSATION_HISTORY` - active window size (default: 20)
    pub fn from_env() -> Self {
        let mut settings = Self::default();
        if let Some(value) = env_parse::<usize>("MAX_CONVERSATION_HISTORY").filter(|v| *v > 0) {
            settings.max_history = value;
        }
        settings
    }

    /// Stored turn count above which summarization runs.
    pub fn summary_threshold(&self) -> usize {
        self.max_history + self.summary_margin
    }
}

/// Settings for the chat turn pipeline.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub memory: MemorySettings,
    /// Deadline for one generator call.
    pub generation_timeout: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            memory: MemorySettings::default(),
            generation_timeout: Duration::from_secs(60),
        }
    }
}

impl OrchestratorConfig {
    /// Load from environment variables.
    ///
    /// - `MAX_CONVERSATION_HISTORY` - see [`MemorySettings::from_env`]
    /// - `AI_TIMEOUT_SECS` - generator deadline (default: 60)
    pub fn from_env() -> Self {
        let mut config = Self {
            memory: MemorySettings::from_env(),
            ..Self::default()
        };
        if let Some(secs) = env_parse::<u64>("AI_TIMEOUT_SECS").filter(|v| *v > 0) {
            config.generation_timeout = Duration::from_secs(secs);
        }
        config
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok()?.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_threshold() {
        let settings = MemorySettings::default();
        assert_eq!(settings.max_history, 20);
        assert_eq!(settings.summary_threshold(), 30);
        assert_eq!(OrchestratorConfig::default().generation_timeout, Duration::from_secs(60));
    }
}
