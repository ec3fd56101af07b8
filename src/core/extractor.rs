use crate::error::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;
use url::Url;

/// A validated YouTube video identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VideoId(String);

impl VideoId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn watch_url(&self) -> String {
        format!("https://www.youtube.com/watch?v={}", self.0)
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for VideoId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

fn id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]{1,64}$").expect("valid id pattern"))
}

fn parse_id(candidate: &str) -> Option<VideoId> {
    id_pattern()
        .is_match(candidate)
        .then(|| VideoId(candidate.to_string()))
}

/// Resolves a video identifier from a bare id or any of the usual YouTube URL shapes.
pub fn extract_video_id(input: &str) -> Result<VideoId> {
    let input = input.trim();
    let invalid = || Error::InvalidSource(input.to_string());

    if let Some(id) = parse_id(input) {
        return Ok(id);
    }

    let normalized = if input.starts_with("//") {
        format!("https:{}", input)
    } else if !input.contains("://") {
        format!("https://{}", input)
    } else {
        input.to_string()
    };

    let url = Url::parse(&normalized).map_err(|_| invalid())?;
    extract_from_url(&url).ok_or_else(invalid)
}

fn extract_from_url(url: &Url) -> Option<VideoId> {
    let host = url.host_str()?;

    if host == "youtu.be" || host == "www.youtu.be" {
        return url.path_segments()?.next().and_then(parse_id);
    }

    if !(is_domain_or_subdomain(host, "youtube.com")
        || is_domain_or_subdomain(host, "youtube-nocookie.com"))
    {
        return None;
    }

    if let Some((_, v)) = url.query_pairs().find(|(key, _)| key == "v") {
        return parse_id(&v);
    }

    let mut segments = url.path_segments()?;
    match segments.next()? {
        "embed" | "v" | "shorts" | "live" | "e" => segments.next().and_then(parse_id),
        _ => None,
    }
}

fn is_domain_or_subdomain(host: &str, domain: &str) -> bool {
    host == domain
        || host
            .strip_suffix(domain)
            .is_some_and(|prefix| prefix.ends_with('.'))
}
