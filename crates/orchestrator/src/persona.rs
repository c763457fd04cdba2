//! Persona instruction handed to the generator on every turn.

use std::env;
use std::path::Path;

use brain_core::short_fingerprint;
use tracing::info;

/// Default persona prompt file name.
pub const DEFAULT_PROMPT_FILE: &str = "SYSTEM_PROMPT.md";

/// Built-in persona used when no prompt is configured.
pub const DEFAULT_PERSONA: &str = r#"You are a warm, attentive support companion in a private chat.

Listen carefully, reflect what the person tells you, and ask one gentle question at a time.
Keep replies short and conversational. Never diagnose, and never claim to be a human professional.
If the person mentions being in danger or wanting to hurt themselves, encourage them to contact local emergency services or a crisis line right away.
Answer in the language the person writes in."#;

/// A loaded persona with its fingerprint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Persona {
    pub text: String,
    /// Short SHA-256 prefix, logged so deployments can tell prompts apart.
    pub fingerprint: String,
}

impl Persona {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let fingerprint = short_fingerprint(&text);
        Self { text, fingerprint }
    }
}

impl Default for Persona {
    fn default() -> Self {
        Self::new(DEFAULT_PERSONA)
    }
}

/// Load the persona.
///
/// Priority:
/// 1. `SYSTEM_PROMPT` env var
/// 2. `PROMPT_FILE` env var, or `SYSTEM_PROMPT.md` in the working directory
/// 3. The built-in [`DEFAULT_PERSONA`]
pub fn load_persona() -> Persona {
    let persona = if let Some(prompt) = env::var("SYSTEM_PROMPT").ok().filter(|p| !p.trim().is_empty()) {
        info!("Using persona from SYSTEM_PROMPT env var");
        Persona::new(prompt.trim())
    } else {
        let prompt_file = env::var("PROMPT_FILE").unwrap_or_else(|_| DEFAULT_PROMPT_FILE.to_string());
        match load_prompt_file(&prompt_file) {
            Some(prompt) => {
                info!("Loaded persona from {}", prompt_file);
                Persona::new(prompt)
            }
            None => {
                info!("Using embedded default persona");
                Persona::default()
            }
        }
    };

    info!(fingerprint = %persona.fingerprint, "Persona ready");
    persona
}

/// Load a prompt from a file path.
///
/// Returns `Some(content)` if the file exists, is readable and not blank.
pub fn load_prompt_file(path: impl AsRef<Path>) -> Option<String> {
    let content = std::fs::read_to_string(path.as_ref()).ok()?;
    let trimmed = content.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_tracks_the_text() {
        let a = Persona::new("be kind");
        assert_eq!(a.fingerprint.len(), 12);
        assert_eq!(a, Persona::new("be kind"));
        assert_ne!(a.fingerprint, Persona::new("be brief").fingerprint);
    }

    #[test]
    fn prompt_files() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("persona-test-{}.md", std::process::id()));
        std::fs::write(&path, "\n  Be gentle.  \n").unwrap();
        assert_eq!(load_prompt_file(&path).as_deref(), Some("Be gentle."));

        std::fs::write(&path, "   \n").unwrap();
        assert_eq!(load_prompt_file(&path), None);
        std::fs::remove_file(&path).unwrap();

        assert_eq!(load_prompt_file(dir.join("does-not-exist.md")), None);
    }
}
