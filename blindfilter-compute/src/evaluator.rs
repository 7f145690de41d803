//! Plaintext rule evaluation used by the reference backend.
//!
//! A rule matches a URL when both its domain and its path pattern match.
//! The rule's score is the sum of the two component scores:
//!
//! | domain pattern     | score | path pattern     | score |
//! |--------------------|-------|------------------|-------|
//! | exact              | 60    | exact            | 40    |
//! | `*.suffix`         | 55    | `prefix*`        | 30    |
//! | `*`                | 10    | `*`, `/*`, empty | 25    |
//!
//! The outcome's score is the best block-rule score. The URL is blocked
//! when that score reaches the threshold, unless an allow rule scores at
//! least as high and also reaches the threshold.

use crate::codec::MatchOutcome;
use std::str::FromStr;

/// Whether a rule blocks or exempts what it matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    Block,
    Allow,
}

impl RuleKind {
    /// The plaintext encoding stored (encrypted) in a rule's type field.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Block => "block",
            Self::Allow => "allow",
        }
    }
}

impl FromStr for RuleKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "block" => Ok(Self::Block),
            "allow" => Ok(Self::Allow),
            other => Err(format!("unknown rule type {other:?}")),
        }
    }
}

/// A decrypted rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlainRule {
    pub domain_pattern: String,
    pub path_pattern: String,
    pub kind: RuleKind,
}

fn normalize_domain(domain: &str) -> String {
    domain.trim().trim_end_matches('.').to_ascii_lowercase()
}

fn domain_score(pattern: &str, domain: &str) -> u32 {
    let pattern = normalize_domain(pattern);
    if pattern == "*" {
        return 10;
    }
    if let Some(suffix) = pattern.strip_prefix("*.") {
        let matches = domain == suffix
            || domain
                .strip_suffix(suffix)
                .is_some_and(|head| head.ends_with('.'));
        return if matches { 55 } else { 0 };
    }
    if pattern == domain { 60 } else { 0 }
}

fn path_score(pattern: &str, path: &str) -> u32 {
    match pattern {
        "" | "*" | "/*" => 25,
        _ => match pattern.strip_suffix('*') {
            Some(prefix) if path.starts_with(prefix) => 30,
            Some(_) => 0,
            None if pattern == path => 40,
            None => 0,
        },
    }
}

/// Scores a single rule against a URL. Zero means no match.
pub fn score_rule(rule: &PlainRule, domain: &str, path: &str) -> u32 {
    let domain = normalize_domain(domain);
    let d = domain_score(&rule.domain_pattern, &domain);
    let p = path_score(rule.path_pattern.trim(), path);
    if d == 0 || p == 0 { 0 } else { d + p }
}

/// Evaluates every rule against a URL.
pub fn evaluate(rules: &[PlainRule], domain: &str, path: &str, min_match_score: u32) -> MatchOutcome {
    let mut best_block = 0;
    let mut best_allow = 0;
    for rule in rules {
        let score = score_rule(rule, domain, path);
        match rule.kind {
            RuleKind::Block => best_block = best_block.max(score),
            RuleKind::Allow => best_allow = best_allow.max(score),
        }
    }

    let blocked = best_block >= min_match_score;
    let exempted = best_allow >= min_match_score && best_allow >= best_block;
    MatchOutcome {
        match_score: best_block,
        should_block: blocked && !exempted,
    }
}
