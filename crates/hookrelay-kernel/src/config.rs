//! Relay configuration.
//!
//! Every setting has a default that lets the relay run fully fail-open with
//! no configuration at all. The binary fills this from flags and environment
//! variables.

use std::path::PathBuf;

use hookrelay_protocol::EnvelopeContext;
use hookrelay_runtime::FileMarker;

pub const DEFAULT_SERVER_URL: &str = "http://localhost:4000";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    /// Event collector base URL (`POST {server_url}/events`).
    pub server_url: String,
    /// Decision service base URL; the collector URL when unset.
    pub hitl_server_url: Option<String>,
    pub source_app: String,
    pub tags: Vec<String>,
    /// Treat the end-of-turn guard as already active.
    pub stop_hook_active: bool,
    pub stop_marker: PathBuf,
    pub hitl_enabled: bool,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_owned(),
            hitl_server_url: None,
            source_app: EnvelopeContext::UNKNOWN_APP.to_owned(),
            tags: Vec::new(),
            stop_hook_active: false,
            stop_marker: FileMarker::default_path(),
            hitl_enabled: true,
        }
    }
}

impl RelayConfig {
    pub fn decision_url(&self) -> &str {
        self.hitl_server_url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .unwrap_or(self.server_url.as_str())
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.tags = normalize_tags(tags);
        self
    }

    pub fn envelope_context(&self) -> EnvelopeContext {
        EnvelopeContext::new(self.source_app.clone(), self.tags.clone())
    }
}

/// Trim each tag and drop blanks, keeping order.
pub fn normalize_tags<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    tags.into_iter()
        .map(|tag| tag.as_ref().trim().to_owned())
        .filter(|tag| !tag.is_empty())
        .collect()
}

/// Split a comma-separated tag list.
pub fn parse_tag_list(raw: &str) -> Vec<String> {
    normalize_tags(raw.split(','))
}
