// SPDX-FileCopyrightText: 2026 Sigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Layered config loading with Figment.
//!
//! Merge order (later overrides earlier):
//! 1. Compiled defaults
//! 2. `/etc/sigil/sigil.toml`
//! 3. `~/.config/sigil/sigil.toml`
//! 4. `./sigil.toml`
//! 5. The file passed with `--config`, if any
//! 6. `SIGIL_*` environment variables

#![allow(clippy::result_large_err)] // figment::Error is external

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::SigilConfig;

const SYSTEM_CONFIG: &str = "/etc/sigil/sigil.toml";
const LOCAL_CONFIG: &str = "sigil.toml";

/// Section names that env keys are split on. Order matters only for
/// readability; each key matches at most one prefix.
const SECTIONS: &[&str] = &["bot", "signal", "ai", "events", "onboarding", "usage"];

/// Load configuration from the standard hierarchy with env var overrides.
pub fn load_config(explicit: Option<&Path>) -> Result<SigilConfig, figment::Error> {
    build_figment(explicit).extract()
}

/// Load configuration from a TOML string on top of defaults only.
pub fn load_config_from_str(toml_content: &str) -> Result<SigilConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(SigilConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Build the Figment used for loading, before extraction.
pub fn build_figment(explicit: Option<&Path>) -> Figment {
    let mut figment = Figment::new().merge(Serialized::defaults(SigilConfig::default()));
    for path in candidate_files(explicit) {
        figment = figment.merge(Toml::file(path));
    }
    figment.merge(env_provider())
}

/// Every file that may contribute to the merged config, lowest priority first.
pub fn candidate_files(explicit: Option<&Path>) -> Vec<PathBuf> {
    let mut files = vec![PathBuf::from(SYSTEM_CONFIG)];
    if let Some(dir) = dirs::config_dir() {
        files.push(dir.join("sigil").join("sigil.toml"));
    }
    files.push(PathBuf::from(LOCAL_CONFIG));
    if let Some(path) = explicit {
        files.push(path.to_path_buf());
    }
    files
}

/// Env provider mapping `SIGIL_SIGNAL_REQUEST_TIMEOUT_SECS` to
/// `signal.request_timeout_secs`.
///
/// Uses an explicit section map rather than `split("_")` because field names
/// contain underscores. Nested provider tables use a second level:
/// `SIGIL_AI_OPENAI_API_KEY` becomes `ai.openai.api_key`.
fn env_provider() -> Env {
    Env::prefixed("SIGIL_").map(|key| map_env_key(key.as_str()).into())
}

pub(crate) fn map_env_key(key: &str) -> String {
    for section in SECTIONS {
        let Some(rest) = key.strip_prefix(section).and_then(|r| r.strip_prefix('_')) else {
            continue;
        };
        if *section == "ai" {
            for provider in ["openai", "claude"] {
                if let Some(field) = rest.strip_prefix(provider).and_then(|r| r.strip_prefix('_')) {
                    return format!("ai.{provider}.{field}");
                }
            }
        }
        return format!("{section}.{rest}");
    }
    key.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_keys_map_to_sections() {
        assert_eq!(map_env_key("bot_trigger"), "bot.trigger");
        assert_eq!(
            map_env_key("signal_request_timeout_secs"),
            "signal.request_timeout_secs"
        );
        assert_eq!(map_env_key("ai_openai_api_key"), "ai.openai.api_key");
        assert_eq!(map_env_key("ai_claude_model"), "ai.claude.model");
        assert_eq!(
            map_env_key("ai_continuation_window_secs"),
            "ai.continuation_window_secs"
        );
        assert_eq!(map_env_key("onboarding_enabled"), "onboarding.enabled");
    }

    #[test]
    fn explicit_file_has_highest_file_priority() {
        let files = candidate_files(Some(Path::new("/tmp/custom.toml")));
        assert_eq!(files.first(), Some(&PathBuf::from(SYSTEM_CONFIG)));
        assert_eq!(files.last(), Some(&PathBuf::from("/tmp/custom.toml")));
    }
}
