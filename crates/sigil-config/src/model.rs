// SPDX-FileCopyrightText: 2026 Sigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Sigil bot runtime.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sigil_core::ProviderTag;

/// Top-level Sigil configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SigilConfig {
    /// Bot identity and command behaviour.
    #[serde(default)]
    pub bot: BotConfig,

    /// Messaging daemon (signal-cli) settings.
    #[serde(default)]
    pub signal: SignalConfig,

    /// AI providers and thread continuation.
    #[serde(default)]
    pub ai: AiConfig,

    /// Event-creation follow-up settings.
    #[serde(default)]
    pub events: EventsConfig,

    /// Onboarding and vouching settings.
    #[serde(default)]
    pub onboarding: OnboardingConfig,

    /// Command usage recording.
    #[serde(default)]
    pub usage: UsageConfig,
}

impl SigilConfig {
    /// Directory handed to the daemon as its configuration directory.
    pub fn signal_config_dir(&self) -> PathBuf {
        self.signal
            .config_dir
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(&self.bot.data_dir).join("signal-cli"))
    }

    /// Local socket the daemon listens on.
    pub fn socket_path(&self) -> PathBuf {
        self.signal
            .socket_path
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(&self.bot.data_dir).join("signal-cli.sock"))
    }

    /// File confirmed events are appended to.
    pub fn event_sink_path(&self) -> PathBuf {
        self.events
            .sink_path
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(&self.bot.data_dir).join("events.jsonl"))
    }
}

/// Bot identity and command configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BotConfig {
    /// Display name of the bot, used in help output.
    #[serde(default = "default_bot_name")]
    pub name: String,

    /// Single character that prefixes commands.
    #[serde(default = "default_trigger")]
    pub trigger: String,

    /// Global admin allow-list (phone numbers or account uuids).
    #[serde(default)]
    pub admins: Vec<String>,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Directory for runtime state (daemon config, socket, event file).
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            name: default_bot_name(),
            trigger: default_trigger(),
            admins: Vec::new(),
            log_level: default_log_level(),
            data_dir: default_data_dir(),
        }
    }
}

impl BotConfig {
    /// The trigger as a char. Validation guarantees exactly one char.
    pub fn trigger_char(&self) -> char {
        self.trigger.chars().next().unwrap_or('!')
    }
}

fn default_bot_name() -> String {
    "sigil".to_string()
}

fn default_trigger() -> String {
    "!".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_data_dir() -> String {
    dirs::data_dir()
        .map(|p| p.join("sigil"))
        .unwrap_or_else(|| PathBuf::from(".sigil"))
        .to_string_lossy()
        .into_owned()
}

/// Messaging daemon configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SignalConfig {
    /// Phone number of the bot account. Required by `serve`.
    #[serde(default)]
    pub account: Option<String>,

    /// Account uuid of the bot, used to recognise its own messages and quotes.
    #[serde(default)]
    pub account_uuid: Option<String>,

    /// Path or name of the signal-cli executable.
    #[serde(default = "default_cli_path")]
    pub cli_path: String,

    /// Daemon configuration directory. Defaults to `<data_dir>/signal-cli`.
    #[serde(default)]
    pub config_dir: Option<String>,

    /// Daemon socket path. Defaults to `<data_dir>/signal-cli.sock`.
    #[serde(default)]
    pub socket_path: Option<String>,

    /// Launch and supervise the daemon. `false` connects to an existing socket.
    #[serde(default = "default_true")]
    pub spawn_daemon: bool,

    /// Ceiling for the daemon to expose its socket after launch.
    #[serde(default = "default_start_timeout_secs")]
    pub start_timeout_secs: u64,

    /// Daemon restarts allowed before the transport is declared failed.
    #[serde(default = "default_max_restarts")]
    pub max_restarts: u32,

    /// Delay before restarting an exited daemon.
    #[serde(default = "default_restart_delay_secs")]
    pub restart_delay_secs: u64,

    /// Reconnection attempts before the transport is declared failed.
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,

    /// Base of the linear reconnect backoff (delay = base x attempt).
    #[serde(default = "default_reconnect_base_delay_secs")]
    pub reconnect_base_delay_secs: u64,

    /// Per-request response deadline.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Time the daemon gets to exit after SIGTERM before it is killed.
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            account: None,
            account_uuid: None,
            cli_path: default_cli_path(),
            config_dir: None,
            socket_path: None,
            spawn_daemon: true,
            start_timeout_secs: default_start_timeout_secs(),
            max_restarts: default_max_restarts(),
            restart_delay_secs: default_restart_delay_secs(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
            reconnect_base_delay_secs: default_reconnect_base_delay_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            shutdown_grace_secs: default_shutdown_grace_secs(),
        }
    }
}

impl SignalConfig {
    pub fn start_timeout(&self) -> Duration {
        Duration::from_secs(self.start_timeout_secs)
    }

    pub fn restart_delay(&self) -> Duration {
        Duration::from_secs(self.restart_delay_secs)
    }

    pub fn reconnect_base_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_base_delay_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

fn default_cli_path() -> String {
    "signal-cli".to_string()
}

fn default_true() -> bool {
    true
}

fn default_start_timeout_secs() -> u64 {
    30
}

fn default_max_restarts() -> u32 {
    5
}

fn default_restart_delay_secs() -> u64 {
    5
}

fn default_max_reconnect_attempts() -> u32 {
    5
}

fn default_reconnect_base_delay_secs() -> u64 {
    2
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_shutdown_grace_secs() -> u64 {
    5
}

/// AI provider and thread configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AiConfig {
    /// How long a thread stays open for follow-ups.
    #[serde(default = "default_continuation_window_secs")]
    pub continuation_window_secs: u64,

    /// Previous turns replayed to the provider on a follow-up.
    #[serde(default = "default_max_history_turns")]
    pub max_history_turns: usize,

    /// Provider that answers when the bot is @-mentioned.
    #[serde(default = "default_mention_provider")]
    pub mention_provider: ProviderTag,

    /// System prompt sent with every completion.
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    /// OpenAI-compatible endpoint answering `!ai` / `!gpt`.
    #[serde(default = "ProviderEndpointConfig::openai")]
    pub openai: ProviderEndpointConfig,

    /// OpenAI-compatible endpoint answering `!claude`.
    #[serde(default = "ProviderEndpointConfig::claude")]
    pub claude: ProviderEndpointConfig,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            continuation_window_secs: default_continuation_window_secs(),
            max_history_turns: default_max_history_turns(),
            mention_provider: default_mention_provider(),
            system_prompt: default_system_prompt(),
            openai: ProviderEndpointConfig::openai(),
            claude: ProviderEndpointConfig::claude(),
        }
    }
}

impl AiConfig {
    pub fn continuation_window(&self) -> Duration {
        Duration::from_secs(self.continuation_window_secs)
    }

    /// Endpoint settings for a provider tag.
    pub fn endpoint(&self, tag: ProviderTag) -> &ProviderEndpointConfig {
        match tag {
            ProviderTag::OpenAi => &self.openai,
            ProviderTag::Claude => &self.claude,
        }
    }
}

fn default_continuation_window_secs() -> u64 {
    300
}

fn default_max_history_turns() -> usize {
    6
}

fn default_mention_provider() -> ProviderTag {
    ProviderTag::OpenAi
}

fn default_system_prompt() -> String {
    "You are a concise, friendly assistant in a group chat. Answer in plain text without markdown."
        .to_string()
}

/// Settings for one OpenAI-compatible chat-completions endpoint.
///
/// A provider without an API key is disabled.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderEndpointConfig {
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default)]
    pub base_url: String,

    #[serde(default)]
    pub model: String,

    /// Completion token cap.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl ProviderEndpointConfig {
    pub fn openai() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            max_tokens: default_max_tokens(),
        }
    }

    pub fn claude() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.anthropic.com/v1".to_string(),
            model: "claude-sonnet-4-20250514".to_string(),
            max_tokens: default_max_tokens(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }
}

fn default_max_tokens() -> u32 {
    1024
}

/// Event-creation follow-up configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EventsConfig {
    /// IANA time zone assumed for event descriptions.
    #[serde(default = "default_timezone")]
    pub default_timezone: String,

    /// Hour (0-23) used when a description names a date but no time.
    #[serde(default = "default_start_hour")]
    pub default_start_hour: u32,

    /// Length assumed when a description gives no end time.
    #[serde(default = "default_duration_mins")]
    pub default_duration_mins: u32,

    /// Age after which an unfinished draft is discarded.
    #[serde(default = "default_draft_ttl_secs")]
    pub draft_ttl_secs: u64,

    /// JSONL file confirmed events are appended to. Defaults to `<data_dir>/events.jsonl`.
    #[serde(default)]
    pub sink_path: Option<String>,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            default_timezone: default_timezone(),
            default_start_hour: default_start_hour(),
            default_duration_mins: default_duration_mins(),
            draft_ttl_secs: default_draft_ttl_secs(),
            sink_path: None,
        }
    }
}

impl EventsConfig {
    pub fn draft_ttl(&self) -> Duration {
        Duration::from_secs(self.draft_ttl_secs)
    }
}

fn default_timezone() -> String {
    "UTC".to_string()
}

fn default_start_hour() -> u32 {
    18
}

fn default_duration_mins() -> u32 {
    120
}

fn default_draft_ttl_secs() -> u64 {
    3600
}

/// Onboarding and vouching configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct OnboardingConfig {
    /// Enables `!onboard` and the onboarding flow.
    #[serde(default)]
    pub enabled: bool,

    /// Group newcomers are screened in.
    #[serde(default)]
    pub entry_group_id: Option<String>,

    /// Time a subject (or inviter) has to answer before removal.
    #[serde(default = "default_intro_timeout_hours")]
    pub intro_timeout_hours: u64,

    /// Only admins may start onboarding when set.
    #[serde(default = "default_true")]
    pub require_admin: bool,

    /// Link included in the credential message sent to approved members.
    #[serde(default)]
    pub welcome_link: Option<String>,
}

impl Default for OnboardingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            entry_group_id: None,
            intro_timeout_hours: default_intro_timeout_hours(),
            require_admin: true,
            welcome_link: None,
        }
    }
}

impl OnboardingConfig {
    pub fn intro_timeout(&self) -> Duration {
        Duration::from_secs(self.intro_timeout_hours * 3600)
    }
}

fn default_intro_timeout_hours() -> u64 {
    72
}

/// Usage recording configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct UsageConfig {
    /// Number of recent usage events kept in memory for `!stats`.
    #[serde(default = "default_recent_capacity")]
    pub recent_capacity: usize,
}

impl Default for UsageConfig {
    fn default() -> Self {
        Self {
            recent_capacity: default_recent_capacity(),
        }
    }
}

fn default_recent_capacity() -> usize {
    500
}
