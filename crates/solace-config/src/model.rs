// SPDX-FileCopyrightText: 2026 Solace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Solace engine.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup with actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level Solace configuration.
///
/// Loaded from TOML files following the XDG hierarchy, with environment
/// variable overrides. All sections are optional and default to sensible
/// values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SolaceConfig {
    /// Service identity and logging.
    #[serde(default)]
    pub service: ServiceConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// HTTP gateway settings.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Safety escalation settings.
    #[serde(default)]
    pub safety: SafetyConfig,

    /// AI responder settings.
    #[serde(default)]
    pub ai: AiConfig,

    /// Topic tag settings for message categorization.
    #[serde(default)]
    pub topics: TopicsConfig,
}

/// Service identity and logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    /// Display name of the service instance.
    #[serde(default = "default_service_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_service_name() -> String {
    "solace".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|d| d.join("solace/solace.db").display().to_string())
        .unwrap_or_else(|| "solace.db".to_string())
}

/// HTTP gateway configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// Host address to bind.
    #[serde(default = "default_gateway_host")]
    pub host: String,

    /// Port to bind.
    #[serde(default = "default_gateway_port")]
    pub port: u16,

    /// Bearer token for API auth (None = auth disabled, local use only).
    #[serde(default)]
    pub bearer_token: Option<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_gateway_host(),
            port: default_gateway_port(),
            bearer_token: None,
        }
    }
}

fn default_gateway_host() -> String {
    "127.0.0.1".to_string()
}

fn default_gateway_port() -> u16 {
    8720
}

/// Safety escalation configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SafetyConfig {
    /// Danger terms for the keyword fallback scan. Matched case-insensitively
    /// as substrings when the AI reply carries no structured assessment.
    #[serde(default = "default_danger_terms")]
    pub danger_terms: Vec<String>,

    /// Extra user ids notified on every escalation, on top of the assigned
    /// therapist roster (e.g. an on-call clinician).
    #[serde(default)]
    pub extra_alert_recipients: Vec<String>,

    /// Notice shown to patients while the conversation is paused.
    #[serde(default = "default_paused_notice")]
    pub paused_notice: String,

    /// Notice shown to patients while the conversation is blocked.
    #[serde(default = "default_blocked_notice")]
    pub blocked_notice: String,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            danger_terms: default_danger_terms(),
            extra_alert_recipients: Vec::new(),
            paused_notice: default_paused_notice(),
            blocked_notice: default_blocked_notice(),
        }
    }
}

fn default_danger_terms() -> Vec<String> {
    [
        "end my life",
        "kill myself",
        "suicide",
        "hurt myself",
        "self harm",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}

fn default_paused_notice() -> String {
    "This conversation is paused. Your care team will resume it shortly.".to_string()
}

fn default_blocked_notice() -> String {
    "A member of your care team will continue this conversation personally.".to_string()
}

/// AI responder configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AiConfig {
    /// Maximum number of history turns supplied per AI request.
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,

    /// Instruction block prepended when generating therapist draft replies.
    #[serde(default = "default_draft_instruction")]
    pub draft_instruction: String,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            history_limit: default_history_limit(),
            draft_instruction: default_draft_instruction(),
        }
    }
}

fn default_history_limit() -> usize {
    50
}

fn default_draft_instruction() -> String {
    "Draft a reply the therapist can review, edit, and send in their own name."
        .to_string()
}

/// Topic tag configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TopicsConfig {
    /// Recognized `#tag` topics. Used purely for categorization; a topic tag
    /// never suppresses the AI.
    #[serde(default)]
    pub tags: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sensible() {
        let config = SolaceConfig::default();
        assert_eq!(config.service.name, "solace");
        assert_eq!(config.service.log_level, "info");
        assert_eq!(config.gateway.host, "127.0.0.1");
        assert!(config.gateway.bearer_token.is_none());
        assert!(!config.safety.danger_terms.is_empty());
        assert!(config.safety.extra_alert_recipients.is_empty());
        assert!(config.topics.tags.is_empty());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let toml = r#"
            [service]
            naem = "oops"
        "#;
        let result: Result<SolaceConfig, _> = toml::from_str(toml);
        assert!(result.is_err());
    }
}
