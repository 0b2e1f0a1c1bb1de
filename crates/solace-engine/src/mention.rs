// SPDX-FileCopyrightText: 2026 Solace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Direct-address and topic-tag parsing.
//!
//! Two independent markers: `@name` directs a message at one or all
//! therapists (bypassing the AI), `#tag` categorizes it against the
//! configured topic list and never suppresses the AI.

use regex::Regex;
use solace_storage::User;

/// Who a message is directed at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectedAt {
    /// Not therapist-directed.
    Nobody,
    /// Broadcast to every assigned therapist.
    AllAssigned,
    /// Specific therapists, resolved from the roster.
    Therapists(Vec<String>),
}

/// The routing decision for one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingDecision {
    pub directed_at: DirectedAt,
    /// Recognized topic tags, in configured casing.
    pub topics: Vec<String>,
}

impl RoutingDecision {
    /// Tagged messages bypass the AI regardless of conversation mode.
    pub fn is_tagged(&self) -> bool {
        self.directed_at != DirectedAt::Nobody
    }
}

/// Generic address words that mean "any therapist".
const GENERIC_ADDRESSES: &[&str] = &["therapist", "therapists", "team"];

pub struct MentionResolver {
    mention_re: Regex,
    topic_re: Regex,
    topic_tags: Vec<String>,
}

impl MentionResolver {
    pub fn new(topic_tags: Vec<String>) -> Self {
        Self {
            // A name candidate after '@': letters, digits, and common name
            // punctuation. Multi-word display names match on first name.
            mention_re: Regex::new(r"@([\p{L}\d_'-]+)").expect("static mention pattern"),
            topic_re: Regex::new(r"#([\p{L}\d_-]+)").expect("static topic pattern"),
            topic_tags,
        }
    }

    /// Parse a message against the assigned-therapist roster.
    ///
    /// An unresolvable specific name falls back to broadcast, never to a
    /// silent drop: a patient asking for a person always reaches someone.
    pub fn resolve(&self, text: &str, roster: &[User]) -> RoutingDecision {
        let mut directed = DirectedAt::Nobody;
        let mut specific: Vec<String> = Vec::new();

        for capture in self.mention_re.captures_iter(text) {
            let candidate = &capture[1];
            if GENERIC_ADDRESSES
                .iter()
                .any(|g| candidate.eq_ignore_ascii_case(g))
            {
                directed = DirectedAt::AllAssigned;
                continue;
            }
            match resolve_name(candidate, roster) {
                Some(id) => {
                    if !specific.contains(&id) {
                        specific.push(id);
                    }
                }
                None => {
                    // Asked for someone we cannot identify: broadcast.
                    directed = DirectedAt::AllAssigned;
                }
            }
        }

        if directed != DirectedAt::AllAssigned && !specific.is_empty() {
            directed = DirectedAt::Therapists(specific);
        }

        let mut topics = Vec::new();
        for capture in self.topic_re.captures_iter(text) {
            let candidate = &capture[1];
            if let Some(tag) = self
                .topic_tags
                .iter()
                .find(|t| t.eq_ignore_ascii_case(candidate))
                && !topics.contains(tag)
            {
                topics.push(tag.clone());
            }
        }

        RoutingDecision {
            directed_at: directed,
            topics,
        }
    }
}

/// Case-insensitive match of a mention candidate against roster display
/// names: the full name with whitespace stripped, or the first name alone.
fn resolve_name(candidate: &str, roster: &[User]) -> Option<String> {
    let wanted = candidate.to_lowercase();
    roster
        .iter()
        .find(|user| {
            let name = user.display_name.to_lowercase();
            let collapsed: String = name.split_whitespace().collect();
            let first = name.split_whitespace().next().unwrap_or_default();
            collapsed == wanted || first == wanted
        })
        .map(|user| user.id.clone())
}
