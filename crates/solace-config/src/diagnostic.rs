// SPDX-FileCopyrightText: 2026 Solace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Figment-to-miette error bridge with fuzzy match suggestions.
//!
//! Converts Figment deserialization errors into miette diagnostics with
//! "did you mean?" suggestions using Jaro-Winkler string similarity.

use miette::Diagnostic;
use thiserror::Error;

/// Minimum Jaro-Winkler similarity score to suggest a correction.
/// 0.75 catches common typos like `naem` -> `name` while filtering noise.
const SUGGESTION_THRESHOLD: f64 = 0.75;

/// A configuration error with diagnostic information.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    /// An unknown key was found in the configuration.
    #[error("unknown configuration key `{key}`")]
    #[diagnostic(
        code(solace::config::unknown_key),
        help("{}", format_unknown_key_help(suggestion.as_deref()))
    )]
    UnknownKey {
        /// The unrecognized key name.
        key: String,
        /// Suggested correction via fuzzy matching, if any.
        suggestion: Option<String>,
    },

    /// A configuration value failed to deserialize.
    #[error("invalid configuration value: {detail}")]
    #[diagnostic(code(solace::config::invalid_value))]
    InvalidValue {
        /// Description of what went wrong.
        detail: String,
    },

    /// A semantic validation failure after successful deserialization.
    #[error("{message}")]
    #[diagnostic(code(solace::config::validation))]
    Validation {
        /// Human-readable validation message.
        message: String,
    },
}

fn format_unknown_key_help(suggestion: Option<&str>) -> String {
    match suggestion {
        Some(s) => format!("did you mean `{s}`?"),
        None => "remove the key or check the configuration reference".to_string(),
    }
}

/// All keys recognized anywhere in the config tree, used for suggestions.
const KNOWN_KEYS: &[&str] = &[
    "service",
    "storage",
    "gateway",
    "safety",
    "ai",
    "topics",
    "name",
    "log_level",
    "database_path",
    "host",
    "port",
    "bearer_token",
    "danger_terms",
    "extra_alert_recipients",
    "paused_notice",
    "blocked_notice",
    "history_limit",
    "draft_instruction",
    "tags",
];

/// Find the closest known key by Jaro-Winkler similarity, if close enough.
pub fn suggest_key(unknown: &str) -> Option<String> {
    KNOWN_KEYS
        .iter()
        .map(|k| (k, strsim::jaro_winkler(unknown, k)))
        .filter(|(_, score)| *score >= SUGGESTION_THRESHOLD)
        .max_by(|(_, a), (_, b)| a.total_cmp(b))
        .map(|(k, _)| k.to_string())
}

/// Convert a Figment extraction error into diagnostic config errors.
pub fn figment_to_config_errors(err: figment::Error) -> Vec<ConfigError> {
    let mut errors = Vec::new();
    for e in err {
        match e.kind {
            figment::error::Kind::UnknownField(ref field, _) => {
                errors.push(ConfigError::UnknownKey {
                    key: field.to_string(),
                    suggestion: suggest_key(field),
                });
            }
            _ => {
                errors.push(ConfigError::InvalidValue {
                    detail: e.to_string(),
                });
            }
        }
    }
    errors
}

/// Render collected config errors to stderr via miette.
pub fn render_errors(errors: &[ConfigError]) {
    for err in errors {
        eprintln!("{:?}", miette::Report::msg(err.to_string()));
        if let ConfigError::UnknownKey {
            suggestion: Some(s),
            ..
        } = err
        {
            eprintln!("  help: did you mean `{s}`?");
        }
    }
}
