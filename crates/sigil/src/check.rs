// SPDX-FileCopyrightText: 2026 Sigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `sigil check` command implementation.
//!
//! Loading and validation happen before this runs; invalid configuration
//! never reaches [`summary`].

use std::fmt::Write as _;

use sigil_config::SigilConfig;
use sigil_core::ProviderTag;

/// Renders a human-readable summary of a validated configuration.
pub fn summary(config: &SigilConfig) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "sigil: configuration OK");
    let _ = writeln!(
        out,
        "  bot:        {} (trigger '{}', {} admin(s))",
        config.bot.name,
        config.bot.trigger_char(),
        config.bot.admins.len()
    );
    let _ = writeln!(
        out,
        "  account:    {}",
        config.signal.account.as_deref().unwrap_or("<not set, required by serve>")
    );
    let daemon = if config.signal.spawn_daemon {
        format!("spawned via {}", config.signal.cli_path)
    } else {
        "external".to_string()
    };
    let _ = writeln!(
        out,
        "  daemon:     {daemon}, socket {}",
        config.socket_path().display()
    );

    let providers: Vec<String> = [ProviderTag::OpenAi, ProviderTag::Claude]
        .into_iter()
        .filter(|tag| config.ai.endpoint(*tag).is_enabled())
        .map(|tag| format!("{tag} ({})", config.ai.endpoint(tag).model))
        .collect();
    if providers.is_empty() {
        let _ = writeln!(out, "  ai:         disabled (no API keys)");
    } else {
        let _ = writeln!(
            out,
            "  ai:         {}, mentions answered by {}",
            providers.join(", "),
            config.ai.mention_provider
        );
    }

    let _ = writeln!(
        out,
        "  events:     {} (tz {})",
        config.event_sink_path().display(),
        config.events.default_timezone
    );
    match config.onboarding.entry_group_id.as_deref() {
        Some(group) if config.onboarding.enabled => {
            let _ = writeln!(
                out,
                "  onboarding: entry group {group}, {}h intro timeout",
                config.onboarding.intro_timeout_hours
            );
        }
        _ => {
            let _ = writeln!(out, "  onboarding: disabled");
        }
    }
    out
}
