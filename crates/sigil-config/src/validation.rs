// SPDX-FileCopyrightText: 2026 Sigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Collects every violation instead of failing on the first one.

use chrono_tz::Tz;

use crate::diagnostic::ConfigError;
use crate::model::SigilConfig;

/// Validate a deserialized configuration for semantic correctness.
pub fn validate_config(config: &SigilConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    let mut trigger = config.bot.trigger.chars();
    match (trigger.next(), trigger.next()) {
        (Some(c), None) if !c.is_alphanumeric() && !c.is_whitespace() => {}
        _ => errors.push(ConfigError::validation(format!(
            "bot.trigger must be a single non-alphanumeric character, got `{}`",
            config.bot.trigger
        ))),
    }

    if config.bot.data_dir.trim().is_empty() {
        errors.push(ConfigError::validation("bot.data_dir must not be empty"));
    }

    if let Some(account) = &config.signal.account
        && account.trim().is_empty()
    {
        errors.push(ConfigError::validation(
            "signal.account must not be empty when set",
        ));
    }

    if config.signal.cli_path.trim().is_empty() {
        errors.push(ConfigError::validation("signal.cli_path must not be empty"));
    }

    let positive = [
        ("signal.start_timeout_secs", config.signal.start_timeout_secs),
        ("signal.request_timeout_secs", config.signal.request_timeout_secs),
        (
            "signal.reconnect_base_delay_secs",
            config.signal.reconnect_base_delay_secs,
        ),
        ("signal.max_restarts", u64::from(config.signal.max_restarts)),
        (
            "signal.max_reconnect_attempts",
            u64::from(config.signal.max_reconnect_attempts),
        ),
        ("ai.continuation_window_secs", config.ai.continuation_window_secs),
        ("events.draft_ttl_secs", config.events.draft_ttl_secs),
        (
            "events.default_duration_mins",
            u64::from(config.events.default_duration_mins),
        ),
        (
            "onboarding.intro_timeout_hours",
            config.onboarding.intro_timeout_hours,
        ),
        ("usage.recent_capacity", config.usage.recent_capacity as u64),
    ];
    for (key, value) in positive {
        if value == 0 {
            errors.push(ConfigError::validation(format!(
                "{key} must be greater than zero"
            )));
        }
    }

    if config.events.default_timezone.parse::<Tz>().is_err() {
        errors.push(ConfigError::validation(format!(
            "events.default_timezone `{}` is not a known IANA time zone",
            config.events.default_timezone
        )));
    }

    if config.events.default_start_hour > 23 {
        errors.push(ConfigError::validation(format!(
            "events.default_start_hour must be between 0 and 23, got {}",
            config.events.default_start_hour
        )));
    }

    if config.onboarding.enabled
        && config
            .onboarding
            .entry_group_id
            .as_deref()
            .is_none_or(|g| g.trim().is_empty())
    {
        errors.push(ConfigError::validation(
            "onboarding.entry_group_id is required when onboarding is enabled",
        ));
    }

    for (name, endpoint) in [("openai", &config.ai.openai), ("claude", &config.ai.claude)] {
        if endpoint.is_enabled() && !endpoint.base_url.starts_with("http") {
            errors.push(ConfigError::validation(format!(
                "ai.{name}.base_url must be an http(s) URL, got `{}`",
                endpoint.base_url
            )));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
