//! Load configuration via `config` crate with env-override support.

use std::{ops::Deref, sync::Arc};

use serde::Deserialize;

use crate::base::prompts;

use super::types::{Res, Void};

/// Default OpenAI model to use.
fn default_openai_model() -> String {
    "gpt-4.1".to_string()
}

/// Default max output tokens for OpenAI model.
fn default_openai_max_tokens() -> u32 {
    600
}

fn default_persona_name() -> String {
    "avery".to_string()
}

fn default_persona_display_name() -> String {
    "Avery".to_string()
}

/// Default system prompt for the persona.
fn default_persona_system_prompt() -> String {
    prompts::PERSONA_SYSTEM_PROMPT.to_string()
}

/// Default founder addendum for the persona.
fn default_persona_founder_directive() -> String {
    prompts::FOUNDER_DIRECTIVE.to_string()
}

/// Default relevance keywords for the persona.
fn default_persona_keywords() -> Vec<String> {
    prompts::PERSONA_KEYWORDS.iter().map(|k| k.to_string()).collect()
}

fn default_working_hours_start() -> u32 {
    9
}

fn default_working_hours_end() -> u32 {
    18
}

fn default_working_hours_timezone() -> String {
    "America/New_York".to_string()
}

fn default_working_days() -> Vec<String> {
    ["Mon", "Tue", "Wed", "Thu", "Fri"].iter().map(|d| d.to_string()).collect()
}

fn default_cooldown_secs() -> u64 {
    60
}

fn default_max_turns() -> u32 {
    4
}

fn default_stagger_min_ms() -> u64 {
    2000
}

fn default_stagger_max_ms() -> u64 {
    8000
}

fn default_true() -> bool {
    true
}

/// Default state store endpoint (in-memory SurrealDB).
fn default_db_endpoint() -> String {
    "mem://".to_string()
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

/// Configuration for the relay.
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub inner: Arc<ConfigInner>,
}

impl Deref for Config {
    type Target = ConfigInner;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ConfigInner {
    /// OpenAI API key (`OPENAI_API_KEY`).
    pub openai_api_key: String,
    /// OpenAI model to use (`OPENAI_MODEL`).
    #[serde(default = "default_openai_model")]
    pub openai_model: String,
    /// Max output tokens for OpenAI model (`OPENAI_MAX_TOKENS`).
    #[serde(default = "default_openai_max_tokens")]
    pub openai_max_tokens: u32,
    /// Slack bot token (`SLACK_BOT_TOKEN`).
    pub slack_bot_token: String,
    /// The bot's own Slack user ID (`SLACK_BOT_USER_ID`).  Discovered via `auth.test` when empty.
    #[serde(default)]
    pub slack_bot_user_id: String,
    /// Shared verification token checked against inbound envelopes (`SLACK_VERIFICATION_TOKEN`).
    /// Checking is disabled when empty.
    #[serde(default)]
    pub slack_verification_token: String,
    /// Channel to reply in when an event carries none (`SLACK_CHANNEL_ID`).
    #[serde(default)]
    pub slack_channel_id: String,
    /// The founder's Slack user ID (`FOUNDER_USER_ID`).
    pub founder_user_id: String,
    /// Key under which the persona's state is tracked (`PERSONA_NAME`).
    #[serde(default = "default_persona_name")]
    pub persona_name: String,
    /// Human-facing persona name (`PERSONA_DISPLAY_NAME`).
    #[serde(default = "default_persona_display_name")]
    pub persona_display_name: String,
    /// Optional custom system prompt to override the default (`PERSONA_SYSTEM_PROMPT`).
    #[serde(default = "default_persona_system_prompt")]
    pub persona_system_prompt: String,
    /// Optional custom founder addendum to override the default (`PERSONA_FOUNDER_DIRECTIVE`).
    #[serde(default = "default_persona_founder_directive")]
    pub persona_founder_directive: String,
    /// Relevance keywords, comma separated in the environment (`PERSONA_KEYWORDS`).
    #[serde(default = "default_persona_keywords")]
    pub persona_keywords: Vec<String>,
    /// First working hour, inclusive (`WORKING_HOURS_START`).
    #[serde(default = "default_working_hours_start")]
    pub working_hours_start: u32,
    /// Last working hour, exclusive (`WORKING_HOURS_END`).
    #[serde(default = "default_working_hours_end")]
    pub working_hours_end: u32,
    /// IANA time zone the working hours are expressed in (`WORKING_HOURS_TIMEZONE`).
    #[serde(default = "default_working_hours_timezone")]
    pub working_hours_timezone: String,
    /// Working weekdays, comma separated in the environment (`WORKING_DAYS`).
    #[serde(default = "default_working_days")]
    pub working_days: Vec<String>,
    /// Seconds after a response during which the persona stays quiet (`COOLDOWN_SECS`).
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
    /// Maximum responses per thread (`MAX_TURNS`).
    #[serde(default = "default_max_turns")]
    pub max_turns: u32,
    /// Lower bound of the stagger delay in milliseconds (`STAGGER_MIN_MS`).
    #[serde(default = "default_stagger_min_ms")]
    pub stagger_min_ms: u64,
    /// Upper bound of the stagger delay in milliseconds (`STAGGER_MAX_MS`).
    #[serde(default = "default_stagger_max_ms")]
    pub stagger_max_ms: u64,
    /// Let bot-authored messages through when they mention another bot (`ALLOW_INTERBOT`).
    #[serde(default = "default_true")]
    pub allow_interbot: bool,
    /// Skip messages that mention nobody (`REQUIRE_ADDRESSING`).
    #[serde(default = "default_true")]
    pub require_addressing: bool,
    /// State store endpoint (`DB_ENDPOINT`), e.g. `mem://` or `ws://localhost:8000`.
    #[serde(default = "default_db_endpoint")]
    pub db_endpoint: String,
    /// State store username (`DB_USERNAME`).  Sign-in is skipped when empty.
    #[serde(default)]
    pub db_username: String,
    /// State store password (`DB_PASSWORD`).
    #[serde(default)]
    pub db_password: String,
    /// Address the HTTP listener binds to (`BIND_ADDRESS`).
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// Port the HTTP listener binds to (`PORT`).
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Config {
    pub fn load(explicit_path: Option<&std::path::Path>) -> Res<Self> {
        let mut cfg = config::Config::builder();

        if let Some(p) = explicit_path {
            cfg = cfg.add_source(config::File::from(p.to_path_buf()));
        } else if std::path::Path::new(".hidden/config.toml").exists() {
            cfg = cfg.add_source(config::File::with_name(".hidden/config.toml"));
        }

        // The environment takes precedence over the file.
        cfg = cfg.add_source(
            config::Environment::with_prefix("PERSONA_RELAY")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("persona_keywords")
                .with_list_parse_key("working_days"),
        );

        let result = Config {
            inner: Arc::new(cfg.build()?.try_deserialize()?),
        };

        result.validate()?;

        Ok(result)
    }
}

impl ConfigInner {
    /// Check the ranges that `serde` cannot.
    pub fn validate(&self) -> Void {
        if self.openai_max_tokens < 1 || self.openai_max_tokens > 128000 {
            return Err(anyhow::anyhow!("OpenAI max tokens must be between 1 and 128000."));
        }

        if self.working_hours_end > 24 || self.working_hours_start >= self.working_hours_end {
            return Err(anyhow::anyhow!("Working hours must satisfy start < end <= 24."));
        }

        if self.stagger_min_ms > self.stagger_max_ms {
            return Err(anyhow::anyhow!("Stagger minimum must not exceed the stagger maximum."));
        }

        if self.max_turns < 1 {
            return Err(anyhow::anyhow!("Max turns must be at least 1."));
        }

        if self.founder_user_id.is_empty() {
            return Err(anyhow::anyhow!("A founder user ID is required."));
        }

        Ok(())
    }
}

// Tests.

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> ConfigInner {
        ConfigInner {
            openai_max_tokens: default_openai_max_tokens(),
            working_hours_start: default_working_hours_start(),
            working_hours_end: default_working_hours_end(),
            stagger_min_ms: default_stagger_min_ms(),
            stagger_max_ms: default_stagger_max_ms(),
            max_turns: default_max_turns(),
            founder_user_id: "UFOUNDER".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn defaults_validate() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn rejects_inverted_working_hours() {
        let config = ConfigInner {
            working_hours_start: 18,
            working_hours_end: 9,
            ..valid()
        };

        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_inverted_stagger_window() {
        let config = ConfigInner {
            stagger_min_ms: 10,
            stagger_max_ms: 5,
            ..valid()
        };

        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_out_of_range_max_tokens() {
        assert!(ConfigInner { openai_max_tokens: 0, ..valid() }.validate().is_err());
        assert!(ConfigInner { openai_max_tokens: 200000, ..valid() }.validate().is_err());
    }

    #[test]
    fn requires_founder() {
        assert!(ConfigInner { founder_user_id: String::new(), ..valid() }.validate().is_err());
    }
}
