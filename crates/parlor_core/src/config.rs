//! Configuration system for Parlor
//!
//! Settings come from a TOML file (`parlor.toml`) and are then overridden by
//! environment variables, so a `.env` next to the binary is enough to run
//! the bot without any file at all.
//!
//! # Environment Variables
//!
//! - `ENDPOINT` -> endpoint.url
//! - `NAME` -> persona.name
//! - `PROMPT` -> persona.prompt
//! - `STOP_SEQUENCES` (comma-separated, `\n` escapes allowed) -> persona.stop_sequences
//! - `DISCORD_TOKEN` or `TOKEN` -> discord.token
//! - `CHANNELS` (comma-separated ids) -> discord.channels
//! - `MENTION` (`t`, `true`, `1`, `yes`) -> discord.mention

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::Result;
use crate::error::{ConfigError, CoreError};
use crate::model::GenerationParams;
use crate::prompt_template::{CHAR_PLACEHOLDER, PERSONA_PLACEHOLDER, PromptTemplate};
use crate::stop::StopSet;

pub const CONFIG_FILE_NAME: &str = "parlor.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ParlorConfig {
    pub endpoint: EndpointConfig,
    pub persona: PersonaConfig,
    pub memory: MemoryConfig,
    pub discord: DiscordConfig,
}

/// Inference endpoint settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    /// Base URL, e.g. `http://localhost:5001`
    pub url: Option<String>,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    #[serde(flatten)]
    pub generation: GenerationParams,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout_secs: 300,
            generation: GenerationParams::default(),
        }
    }
}

impl EndpointConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Who the bot is and how its prompt is laid out
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PersonaConfig {
    /// Display name, substituted for `{{char}}` in the prompt
    pub name: String,
    /// Persona description
    pub prompt: String,
    /// Custom template with `{history}` and `{input}` slots; `{{persona}}`
    /// marks where the persona prompt goes
    pub template: Option<String>,
    /// Canonical character card to take name and persona from
    pub character: Option<PathBuf>,
    /// Stop sequences every conversation starts with
    pub stop_sequences: Vec<String>,
}

impl Default for PersonaConfig {
    fn default() -> Self {
        Self {
            name: "Assistant".to_string(),
            prompt: "You are {{char}}, a friendly participant in a group chat.".to_string(),
            template: None,
            character: None,
            stop_sequences: Vec::new(),
        }
    }
}

impl PersonaConfig {
    /// The prompt template this persona renders with.
    pub fn template(&self) -> Result<PromptTemplate> {
        match &self.template {
            Some(template) => {
                let persona = self.prompt.replace(CHAR_PLACEHOLDER, &self.name);
                let template = template.replace(CHAR_PLACEHOLDER, &self.name);
                Ok(PromptTemplate::parse(&template)?.with_persona(&persona))
            }
            None => Ok(PromptTemplate::instruction(&self.prompt, &self.name)),
        }
    }

    pub fn stop_set(&self) -> StopSet {
        StopSet::new(self.stop_sequences.iter().cloned())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Estimated tokens kept verbatim before older lines are summarized
    pub token_budget: usize,
    /// Conversations kept in memory before the least recent is dropped
    pub max_conversations: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            token_budget: 800,
            max_conversations: 256,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscordConfig {
    pub token: Option<String>,
    /// Channels the bot listens in
    pub channels: Vec<u64>,
    /// Only reply when the bot's name is mentioned
    pub mention: bool,
    /// Recent messages per channel recorded when the bot starts
    pub backfill: usize,
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            token: None,
            channels: Vec::new(),
            mention: false,
            backfill: 10,
        }
    }
}

impl ParlorConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            config_error(
                path,
                "file",
                "a readable TOML file",
                ConfigError::Io(e.to_string()),
            )
        })?;
        toml::from_str(&content).map_err(|e| {
            config_error(
                path,
                "file",
                "valid parlor TOML",
                ConfigError::TomlParse(e.to_string()),
            )
        })
    }

    /// Load from `path`, or from the first default location that exists,
    /// falling back to built-in defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load(path);
        }
        match default_config_paths().into_iter().find(|p| p.exists()) {
            Some(path) => {
                tracing::info!("Loading config from {}", path.display());
                Self::load(&path)
            }
            None => {
                tracing::info!("No config file found, using defaults and environment");
                Ok(Self::default())
            }
        }
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key lookup.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(url) = lookup("ENDPOINT") {
            self.endpoint.url = Some(url);
        }
        if let Some(name) = lookup("NAME") {
            self.persona.name = name;
        }
        if let Some(prompt) = lookup("PROMPT") {
            self.persona.prompt = prompt;
        }
        if let Some(stops) = lookup("STOP_SEQUENCES") {
            self.persona.stop_sequences = parse_stop_sequences(&stops);
        }
        if let Some(token) = lookup("DISCORD_TOKEN").or_else(|| lookup("TOKEN")) {
            self.discord.token = Some(token);
        }
        if let Some(channels) = lookup("CHANNELS") {
            self.discord.channels = parse_comma_separated(&channels)
                .into_iter()
                .map(|id| {
                    id.parse::<u64>().map_err(|e| {
                        env_error("CHANNELS", format!("'{id}' is not a channel id: {e}"))
                    })
                })
                .collect::<Result<_>>()?;
        }
        if let Some(mention) = lookup("MENTION") {
            self.discord.mention = parse_bool(&mention);
        }
        Ok(())
    }

    /// Check the settings every command needs.
    pub fn validate(&self) -> Result<()> {
        match self.endpoint.url.as_deref() {
            None | Some("") => {
                return Err(invalid(
                    "endpoint.url",
                    "the inference endpoint base URL",
                    ConfigError::MissingField("endpoint.url".to_string()),
                ));
            }
            Some(url) if !url.starts_with("http://") && !url.starts_with("https://") => {
                return Err(invalid(
                    "endpoint.url",
                    "an http:// or https:// URL",
                    ConfigError::InvalidValue {
                        field: "endpoint.url".to_string(),
                        reason: format!("'{url}' has no http scheme"),
                    },
                ));
            }
            Some(_) => {}
        }
        if self.persona.name.trim().is_empty() {
            return Err(invalid(
                "persona.name",
                "a non-empty display name",
                ConfigError::MissingField("persona.name".to_string()),
            ));
        }
        if self.memory.max_conversations == 0 {
            return Err(invalid(
                "memory.max_conversations",
                "at least 1",
                ConfigError::InvalidValue {
                    field: "memory.max_conversations".to_string(),
                    reason: "must be positive".to_string(),
                },
            ));
        }
        let drops_persona = self.persona.character.is_some()
            && self
                .persona
                .template
                .as_deref()
                .is_some_and(|template| !template.contains(PERSONA_PLACEHOLDER));
        if drops_persona {
            return Err(invalid(
                "persona.template",
                "a template with a {{persona}} marker when a character card is set",
                ConfigError::InvalidValue {
                    field: "persona.template".to_string(),
                    reason: "the character's persona would never reach the prompt".to_string(),
                },
            ));
        }
        self.persona.template()?;
        Ok(())
    }
}

/// Default config file locations, most specific first.
pub fn default_config_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(CONFIG_FILE_NAME)];
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("parlor").join(CONFIG_FILE_NAME));
    }
    paths
}

/// Parse a comma-separated string into a Vec of trimmed, non-empty strings.
pub fn parse_comma_separated(s: &str) -> Vec<String> {
    s.split(',')
        .map(|part| part.trim().to_string())
        .filter(|part| !part.is_empty())
        .collect()
}

/// Comma-separated stop sequences. Entries keep their whitespace, since a
/// leading newline is usually the point, and `\n` escapes are expanded.
pub fn parse_stop_sequences(s: &str) -> Vec<String> {
    s.split(',')
        .map(|part| part.replace("\\n", "\n"))
        .filter(|part| !part.is_empty())
        .collect()
}

pub fn parse_bool(s: &str) -> bool {
    matches!(
        s.trim().to_lowercase().as_str(),
        "t" | "true" | "1" | "yes" | "y" | "on"
    )
}

fn config_error(path: &Path, field: &str, expected: &str, cause: ConfigError) -> CoreError {
    CoreError::ConfigurationError {
        config_path: path.display().to_string(),
        field: field.to_string(),
        expected: expected.to_string(),
        cause,
    }
}

fn invalid(field: &str, expected: &str, cause: ConfigError) -> CoreError {
    CoreError::ConfigurationError {
        config_path: "<merged config>".to_string(),
        field: field.to_string(),
        expected: expected.to_string(),
        cause,
    }
}

fn env_error(var: &str, reason: String) -> CoreError {
    CoreError::ConfigurationError {
        config_path: "<environment>".to_string(),
        field: var.to_string(),
        expected: "comma-separated numeric ids".to_string(),
        cause: ConfigError::InvalidValue {
            field: var.to_string(),
            reason,
        },
    }
}
