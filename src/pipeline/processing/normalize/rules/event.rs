use serde::{Deserialize, Serialize};

use super::text::{fold_accents, upper_key};
use crate::constants::NO_EVENT;
use crate::pipeline::processing::normalize::ruleset::Ruleset;

/// What to do with an event nothing in the ruleset recognizes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnmatchedEventPolicy {
    /// Fall back to `SIN EVENTO` and let reclassification decide.
    #[default]
    Default,
    /// Keep the cleaned uppercase text as its own category.
    Passthrough,
}

/// Which step of the resolution chain produced the label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventRule {
    Empty,
    Alias,
    Canonical,
    Pattern,
    Keyword,
    Default,
    Passthrough,
}

impl EventRule {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventRule::Empty => "empty",
            EventRule::Alias => "alias",
            EventRule::Canonical => "canonical",
            EventRule::Pattern => "pattern",
            EventRule::Keyword => "keyword",
            EventRule::Default => "default",
            EventRule::Passthrough => "passthrough",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventResolution {
    /// Canonical label, or `None` when the record must be discarded.
    pub event: Option<String>,
    /// The label the rules produced, discarded or not.
    pub label: String,
    pub rule: EventRule,
}

/// Resolve a free-text event to a canonical label; `None` means discard.
pub fn resolve_event(raw_event: Option<&str>, ruleset: &Ruleset) -> Option<String> {
    resolve_event_detailed(raw_event, ruleset, UnmatchedEventPolicy::Default).event
}

pub fn resolve_event_detailed(
    raw_event: Option<&str>,
    ruleset: &Ruleset,
    unmatched: UnmatchedEventPolicy,
) -> EventResolution {
    let (label, rule) = match raw_event {
        Some(e) if !e.trim().is_empty() => match_event(&upper_key(e), ruleset, unmatched),
        _ => (NO_EVENT.to_string(), EventRule::Empty),
    };

    let event = if ruleset.is_discarded_event(&label) {
        None
    } else {
        Some(label.clone())
    };
    EventResolution { event, label, rule }
}

fn match_event(
    upper: &str,
    ruleset: &Ruleset,
    unmatched: UnmatchedEventPolicy,
) -> (String, EventRule) {
    if let Some(hit) = exact_match(upper, ruleset) {
        return hit;
    }

    // Several labels concatenated with hyphens: the first one wins.
    if let Some((head, _)) = upper.split_once('-') {
        let head = head.trim();
        if !head.is_empty() {
            if let Some(hit) = exact_match(head, ruleset) {
                return hit;
            }
        }
    }

    if let Some(p) = ruleset.event_patterns.iter().find(|p| p.regex.is_match(upper)) {
        return (p.category.clone(), EventRule::Pattern);
    }

    let folded = fold_accents(upper);
    if let Some(k) = ruleset
        .event_keywords
        .iter()
        .find(|k| folded.contains(k.keyword.as_str()))
    {
        return (k.category.clone(), EventRule::Keyword);
    }

    match unmatched {
        UnmatchedEventPolicy::Default => (NO_EVENT.to_string(), EventRule::Default),
        UnmatchedEventPolicy::Passthrough => (upper.to_string(), EventRule::Passthrough),
    }
}

fn exact_match(key: &str, ruleset: &Ruleset) -> Option<(String, EventRule)> {
    if let Some(alias) = ruleset.event_aliases.get(key) {
        return Some((alias.clone(), EventRule::Alias));
    }
    if ruleset.is_canonical_event(key) {
        return Some((key.to_string(), EventRule::Canonical));
    }
    None
}
