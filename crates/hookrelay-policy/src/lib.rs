//! Static safety guard.
//!
//! Deny patterns are ordered lists, evaluated command patterns first and path
//! patterns second. The first match wins and is the one named in the reason.

use hookrelay_protocol::{GuardDecision, ProposedAction};
use regex::Regex;
use thiserror::Error;
use tracing::debug;

/// Command text patterns, matched anywhere in the command.
pub const DEFAULT_COMMAND_PATTERNS: [&str; 5] = [
    r"rm\s+-rf\s+/",
    r"rm\s+-rf\s+~",
    r">\s*/dev/sd",
    r"mkfs\.",
    r"dd\s+if=",
];

/// Secret and credential file patterns, matched against the target path.
pub const DEFAULT_PATH_PATTERNS: [&str; 6] = [
    r"\.env$",
    r"\.pem$",
    r"\.key$",
    r"id_rsa",
    r"id_ed25519",
    r"credentials\.json$",
];

#[derive(Debug, Error)]
pub enum PatternError {
    #[error("invalid deny pattern {pattern:?}: {source}")]
    Invalid {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

pub trait SafetyGuard: Send + Sync {
    fn evaluate(&self, action: &ProposedAction) -> GuardDecision;
}

#[derive(Debug, Clone)]
pub struct PatternGuard {
    command_patterns: Vec<Regex>,
    path_patterns: Vec<Regex>,
}

impl PatternGuard {
    pub fn new<C, P>(command_patterns: C, path_patterns: P) -> Result<Self, PatternError>
    where
        C: IntoIterator,
        C::Item: AsRef<str>,
        P: IntoIterator,
        P::Item: AsRef<str>,
    {
        Ok(Self {
            command_patterns: Self::compile(command_patterns)?,
            path_patterns: Self::compile(path_patterns)?,
        })
    }

    fn compile<I>(patterns: I) -> Result<Vec<Regex>, PatternError>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        patterns
            .into_iter()
            .map(|pattern| {
                let pattern = pattern.as_ref();
                Regex::new(pattern).map_err(|source| PatternError::Invalid {
                    pattern: pattern.to_owned(),
                    source,
                })
            })
            .collect()
    }

    pub fn command_patterns(&self) -> impl Iterator<Item = &str> {
        self.command_patterns.iter().map(Regex::as_str)
    }

    pub fn path_patterns(&self) -> impl Iterator<Item = &str> {
        self.path_patterns.iter().map(Regex::as_str)
    }

    fn first_match<'a>(patterns: &'a [Regex], text: &str) -> Option<&'a Regex> {
        patterns.iter().find(|pattern| pattern.is_match(text))
    }
}

impl Default for PatternGuard {
    fn default() -> Self {
        Self::new(DEFAULT_COMMAND_PATTERNS, DEFAULT_PATH_PATTERNS)
            .expect("default deny patterns are valid regexes")
    }
}

impl SafetyGuard for PatternGuard {
    fn evaluate(&self, action: &ProposedAction) -> GuardDecision {
        if let Some(command) = action.command.as_deref()
            && let Some(pattern) = Self::first_match(&self.command_patterns, command)
        {
            debug!(pattern = pattern.as_str(), "command matched deny pattern");
            return GuardDecision::block(format!(
                "Blocked dangerous command pattern: '{}'",
                pattern.as_str()
            ));
        }

        if let Some(path) = action.path.as_deref()
            && let Some(pattern) = Self::first_match(&self.path_patterns, path)
        {
            debug!(pattern = pattern.as_str(), "path matched deny pattern");
            return GuardDecision::block(format!(
                "Blocked access to sensitive file: '{path}' (pattern '{}')",
                pattern.as_str()
            ));
        }

        GuardDecision::allow()
    }
}
