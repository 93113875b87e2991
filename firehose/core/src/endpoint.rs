//! Streaming endpoints and their filter bodies.

use std::fmt;

use crate::config::StreamConfig;

/// One of the fixed streaming endpoints
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// Statuses from a set of user ids
    Follow,
    /// Statuses matching a set of keywords
    Track,
    /// Unfiltered random sample
    Sample,
}

impl Endpoint {
    /// Short name for logs
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Follow => "follow",
            Self::Track => "track",
            Self::Sample => "sample",
        }
    }

    /// URL of this endpoint in the given configuration
    #[must_use]
    pub fn url(self, config: &StreamConfig) -> &str {
        match self {
            Self::Follow => &config.follow_url,
            Self::Track => &config.track_url,
            Self::Sample => &config.sample_url,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `follow=<ids joined by ','>`, form-urlencoded
#[must_use]
pub fn follow_body(ids: &[u64]) -> String {
    let joined = ids
        .iter()
        .map(u64::to_string)
        .collect::<Vec<_>>()
        .join(",");
    form_body("follow", &joined)
}

/// `track=<terms joined by ','>`, form-urlencoded
#[must_use]
pub fn track_body<S: AsRef<str>>(topics: &[S]) -> String {
    let joined = topics
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(",");
    form_body("track", &joined)
}

fn form_body(key: &str, value: &str) -> String {
    url::form_urlencoded::Serializer::new(String::new())
        .append_pair(key, value)
        .finish()
}
