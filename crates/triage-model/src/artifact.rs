//! Artifacts and artifact type inference
//!
//! An artifact's type is derived once, when it is added to a ticket, by trying
//! a fixed list of matchers in order: IP, URL, email, MD5, SHA1, SHA256. The
//! first match wins; nothing matching yields [`ArtifactKind::Unknown`].

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

static URL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:(?:https?|ftp)://[^\s/?#]+[^\s]*|www\.[^\s]+|(?:[a-z0-9](?:[a-z0-9-]*[a-z0-9])?\.)+[a-z]{2,63}(?:/[^\s]*)?)$")
        .expect("url pattern")
});
static EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}$").expect("email pattern")
});
static MD5_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9a-fA-F]{32}$").expect("md5 pattern"));
static SHA1_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9a-fA-F]{40}$").expect("sha1 pattern"));
static SHA256_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9a-fA-F]{64}$").expect("sha256 pattern"));

/// Artifact type classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    /// IPv4 or IPv6 address
    Ip,
    /// URL or domain name
    Url,
    /// Email address
    Email,
    /// MD5 hex digest
    Md5,
    /// SHA-1 hex digest
    Sha1,
    /// SHA-256 hex digest
    Sha256,
    /// Nothing matched
    Unknown,
}

impl ArtifactKind {
    /// Persisted name of the kind
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ip => "ip",
            Self::Url => "url",
            Self::Email => "email",
            Self::Md5 => "md5",
            Self::Sha1 => "sha1",
            Self::Sha256 => "sha256",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Infer the artifact kind of a raw observable
#[must_use]
pub fn infer_kind(name: &str) -> ArtifactKind {
    let name = name.trim();
    if name.parse::<IpAddr>().is_ok() {
        ArtifactKind::Ip
    } else if URL_PATTERN.is_match(name) {
        ArtifactKind::Url
    } else if EMAIL_PATTERN.is_match(name) {
        ArtifactKind::Email
    } else if MD5_PATTERN.is_match(name) {
        ArtifactKind::Md5
    } else if SHA1_PATTERN.is_match(name) {
        ArtifactKind::Sha1
    } else if SHA256_PATTERN.is_match(name) {
        ArtifactKind::Sha256
    } else {
        ArtifactKind::Unknown
    }
}

/// Observable attached to a ticket
///
/// Artifacts have no key of their own; they are matched by value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    /// Raw observable
    pub name: String,
    /// Artifact type, filled by inference when absent
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Triage status
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl Artifact {
    /// Create an untyped artifact
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: None,
            status: None,
        }
    }

    /// With explicit type
    #[inline]
    #[must_use]
    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    /// With explicit status
    #[inline]
    #[must_use]
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    /// Fill status (`unknown`) and inferred type where unset
    #[must_use]
    pub fn with_defaults(mut self) -> Self {
        if self.status.is_none() {
            self.status = Some("unknown".to_string());
        }
        if self.kind.is_none() {
            self.kind = Some(infer_kind(&self.name).as_str().to_string());
        }
        self
    }
}
