//! The executive persona the relay speaks as.
//!
//! A [`Persona`] is built once from the [`Config`] at start-up and never changes.
//! It owns the pure predicates used by admission and response generation:
//! keyword relevance, working hours, and the stagger delay.

use std::{ops::RangeInclusive, time::Duration};

use anyhow::anyhow;
use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};
use chrono_tz::Tz;
use rand::Rng;
use regex::Regex;

use super::{
    config::Config,
    types::{Conversation, Res},
};

/// The hours during which a persona may start a conversation.
#[derive(Debug, Clone)]
pub struct WorkingHours {
    /// Inclusive.
    pub start_hour: u32,
    /// Exclusive.
    pub end_hour: u32,
    pub timezone: Tz,
    pub days: Vec<Weekday>,
}

impl WorkingHours {
    /// Whether `now` falls on a working day, within working hours, in the persona's time zone.
    pub fn contains(&self, now: DateTime<Utc>) -> bool {
        let local = now.with_timezone(&self.timezone);

        self.days.contains(&local.weekday()) && (self.start_hour..self.end_hour).contains(&local.hour())
    }
}

#[derive(Debug, Clone)]
pub struct Persona {
    /// Key for the persona's cooldown and turn state.
    pub name: String,
    pub display_name: String,
    pub system_prompt: String,
    pub founder_directive: String,
    pub founder_id: String,
    /// The persona's own chat user ID.
    pub self_id: String,
    pub working_hours: WorkingHours,
    pub cooldown: Duration,
    pub max_turns: u32,
    /// Stagger window in milliseconds.
    pub stagger_ms: RangeInclusive<u64>,
    pub allow_interbot: bool,
    pub require_addressing: bool,
    /// Reply channel for events that carry none.
    pub default_channel_id: Option<String>,
    keywords: Option<Regex>,
}

impl Persona {
    pub fn from_config(config: &Config, self_id: &str) -> Res<Self> {
        let timezone = config
            .working_hours_timezone
            .parse::<Tz>()
            .map_err(|e| anyhow!("Invalid working hours time zone `{}`: {}", config.working_hours_timezone, e))?;

        let days = config
            .working_days
            .iter()
            .map(|d| d.trim().parse::<Weekday>().map_err(|_| anyhow!("Invalid working day `{d}`.")))
            .collect::<Res<Vec<_>>>()?;

        Ok(Self {
            name: config.persona_name.clone(),
            display_name: config.persona_display_name.clone(),
            system_prompt: config.persona_system_prompt.clone(),
            founder_directive: config.persona_founder_directive.clone(),
            founder_id: config.founder_user_id.clone(),
            self_id: self_id.to_string(),
            working_hours: WorkingHours {
                start_hour: config.working_hours_start,
                end_hour: config.working_hours_end,
                timezone,
                days,
            },
            cooldown: Duration::from_secs(config.cooldown_secs),
            max_turns: config.max_turns,
            stagger_ms: config.stagger_min_ms..=config.stagger_max_ms,
            allow_interbot: config.allow_interbot,
            require_addressing: config.require_addressing,
            default_channel_id: Some(config.slack_channel_id.clone()).filter(|c| !c.is_empty()),
            keywords: build_keyword_regex(&config.persona_keywords)?,
        })
    }

    pub fn is_founder(&self, user_id: &str) -> bool {
        !user_id.is_empty() && user_id == self.founder_id
    }

    /// Whether the text contains any of the persona's keywords as whole words, ignoring case.
    pub fn is_relevant(&self, text: &str) -> bool {
        self.keywords.as_ref().is_some_and(|k| k.is_match(text))
    }

    pub fn within_working_hours(&self, now: DateTime<Utc>) -> bool {
        self.working_hours.contains(now)
    }

    /// A uniformly random pause from the stagger window.
    pub fn stagger_delay(&self) -> Duration {
        let ms = rand::thread_rng().gen_range(self.stagger_ms.clone());
        Duration::from_millis(ms)
    }

    /// Build the two-message prompt for a reply to `user_id`.
    pub fn conversation(&self, user_id: &str, text: &str) -> Conversation {
        let mut system_prompt = self.system_prompt.clone();

        if self.is_founder(user_id) {
            system_prompt.push('\n');
            system_prompt.push_str(&self.founder_directive);
        }

        Conversation::default().system(system_prompt).user(text)
    }
}

fn build_keyword_regex(keywords: &[String]) -> Res<Option<Regex>> {
    let alternatives = keywords
        .iter()
        .map(|k| k.trim())
        .filter(|k| !k.is_empty())
        .map(regex::escape)
        .collect::<Vec<_>>();

    if alternatives.is_empty() {
        return Ok(None);
    }

    let pattern = format!(r"(?i)\b(?:{})\b", alternatives.join("|"));

    Ok(Some(Regex::new(&pattern)?))
}

// Tests.
