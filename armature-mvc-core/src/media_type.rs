//! Media types and Accept header parsing.
//!
//! ```
//! use armature_mvc_core::media_type::{Accept, MediaType};
//!
//! let accept = Accept::parse("text/plain;q=0.5, application/json");
//! assert_eq!(accept.media_types[0].0, MediaType::json());
//!
//! let json = MediaType::parse("application/json; charset=utf-8").unwrap();
//! assert!(json.is_subset_of(&MediaType::parse("application/*").unwrap()));
//! ```

use crate::HttpRequest;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

// ============================================================================
// Media Types
// ============================================================================

/// A media type (MIME type) with optional parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaType {
    /// The type (e.g., "application", "text")
    pub type_: String,
    /// The subtype (e.g., "json", "problem+json")
    pub subtype: String,
    /// Parameters other than `q`, keyed by lowercase name
    pub params: BTreeMap<String, String>,
}

impl MediaType {
    pub fn new(type_: impl Into<String>, subtype: impl Into<String>) -> Self {
        Self {
            type_: type_.into().to_lowercase(),
            subtype: subtype.into().to_lowercase(),
            params: BTreeMap::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into().to_lowercase(), value.into());
        self
    }

    /// `application/json`
    pub fn json() -> Self {
        Self::new("application", "json")
    }

    /// `text/json`
    pub fn text_json() -> Self {
        Self::new("text", "json")
    }

    /// `application/*+json`
    pub fn any_json() -> Self {
        Self::new("application", "*+json")
    }

    /// `application/problem+json`
    pub fn problem_json() -> Self {
        Self::new("application", "problem+json")
    }

    /// `text/plain`
    pub fn plain_text() -> Self {
        Self::new("text", "plain")
    }

    /// `application/octet-stream`
    pub fn octet_stream() -> Self {
        Self::new("application", "octet-stream")
    }

    /// `*/*`
    pub fn any() -> Self {
        Self::new("*", "*")
    }

    /// Parse a media type from a string (quality parameters are dropped).
    pub fn parse(s: &str) -> Option<Self> {
        let mut parts = s.trim().split(';');

        let type_subtype = parts.next()?.trim();
        let (type_, subtype) = type_subtype.split_once('/')?;
        let type_ = type_.trim().to_lowercase();
        let subtype = subtype.trim().to_lowercase();
        if type_.is_empty() || subtype.is_empty() {
            return None;
        }

        let mut params = BTreeMap::new();
        for param in parts {
            if let Some((key, value)) = param.trim().split_once('=') {
                let key = key.trim().to_lowercase();
                if key != "q" {
                    params.insert(key, value.trim().trim_matches('"').to_string());
                }
            }
        }

        Some(Self {
            type_,
            subtype,
            params,
        })
    }

    /// `*/*`
    pub fn matches_all_types(&self) -> bool {
        self.type_ == "*" && self.subtype == "*"
    }

    /// `something/*`
    pub fn matches_all_subtypes(&self) -> bool {
        self.subtype == "*"
    }

    /// True when any wildcard appears, including suffix wildcards like `*+json`.
    pub fn has_wildcard(&self) -> bool {
        self.type_ == "*" || self.subtype.starts_with('*')
    }

    /// The structured syntax suffix, e.g. `json` for `problem+json`.
    pub fn suffix(&self) -> Option<&str> {
        self.subtype.rsplit_once('+').map(|(_, suffix)| suffix)
    }

    /// Subtype without its suffix.
    fn subtype_without_suffix(&self) -> &str {
        self.subtype
            .rsplit_once('+')
            .map(|(head, _)| head)
            .unwrap_or(&self.subtype)
    }

    pub fn charset(&self) -> Option<&str> {
        self.params.get("charset").map(String::as_str)
    }

    /// Whether this media type is contained in `set`.
    ///
    /// `application/json;charset=utf-8` is a subset of `application/json`,
    /// `application/*` and `*/*`; `application/problem+json` is a subset of
    /// `application/*+json`. Every parameter of `set` must appear in `self`
    /// with the same value (case-insensitive).
    pub fn is_subset_of(&self, set: &MediaType) -> bool {
        let type_ok = set.type_ == "*" || set.type_ == self.type_;
        if !type_ok {
            return false;
        }

        let subtype_ok = if set.subtype == "*" || set.subtype == self.subtype {
            true
        } else if let Some(set_suffix) = set.subtype.strip_prefix("*+") {
            self.suffix() == Some(set_suffix)
        } else if set.suffix().is_some() && self.suffix().is_none() {
            // `application/json` does not satisfy `application/foo+json`
            false
        } else {
            set.subtype_without_suffix() == "*" && self.suffix() == set.suffix()
        };
        if !subtype_ok {
            return false;
        }

        set.params.iter().all(|(key, value)| {
            self.params
                .get(key)
                .is_some_and(|own| own.eq_ignore_ascii_case(value))
        })
    }

    /// Whether either side contains the other.
    pub fn matches(&self, other: &MediaType) -> bool {
        self.is_subset_of(other) || other.is_subset_of(self)
    }

    pub fn mime_type(&self) -> String {
        format!("{}/{}", self.type_, self.subtype)
    }

    pub fn to_header_value(&self) -> String {
        let mut result = self.mime_type();
        for (key, value) in &self.params {
            result.push_str(&format!("; {}={}", key, value));
        }
        result
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_header_value())
    }
}

/// Render a list of media types for log lines and error messages.
pub fn join_media_types(types: &[MediaType]) -> String {
    types
        .iter()
        .map(MediaType::to_header_value)
        .collect::<Vec<_>>()
        .join(", ")
}

// ============================================================================
// Accept Header
// ============================================================================

/// A parsed `Accept` header.
#[derive(Debug, Clone, Default)]
pub struct Accept {
    /// Media types with quality, highest quality first. Entries with `q=0`
    /// are dropped; equal qualities keep header order.
    pub media_types: Vec<(MediaType, f32)>,
}

impl Accept {
    pub fn parse(header: &str) -> Self {
        let mut media_types: Vec<(MediaType, f32)> = header
            .split(',')
            .filter_map(|part| {
                let part = part.trim();
                if part.is_empty() {
                    return None;
                }
                let quality = Self::extract_quality(part);
                MediaType::parse(part).map(|mt| (mt, quality))
            })
            .filter(|(_, q)| *q > 0.0)
            .collect();

        // stable: ties keep their position in the header
        media_types.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));

        Self { media_types }
    }

    fn extract_quality(part: &str) -> f32 {
        part.split(';')
            .skip(1)
            .filter_map(|p| p.trim().split_once('='))
            .find(|(k, _)| k.trim().eq_ignore_ascii_case("q"))
            .and_then(|(_, v)| v.trim().parse::<f32>().ok())
            .unwrap_or(1.0)
            .clamp(0.0, 1.0)
    }

    pub fn is_empty(&self) -> bool {
        self.media_types.is_empty()
    }

    /// Whether any entry is `*/*`.
    pub fn contains_any(&self) -> bool {
        self.media_types.iter().any(|(mt, _)| mt.matches_all_types())
    }

    /// Quality the client assigns to `media_type`, 0 when unacceptable.
    pub fn quality_for(&self, media_type: &MediaType) -> f32 {
        self.media_types
            .iter()
            .find(|(mt, _)| media_type.is_subset_of(mt))
            .map(|(_, q)| *q)
            .unwrap_or(0.0)
    }

    pub fn preferred(&self) -> Option<&MediaType> {
        self.media_types.first().map(|(mt, _)| mt)
    }
}

/// Accept header access for requests.
pub trait AcceptExt {
    fn accept(&self) -> Accept;
}

impl AcceptExt for HttpRequest {
    fn accept(&self) -> Accept {
        self.header_joined(http::header::ACCEPT.as_str())
            .map(|h| Accept::parse(&h))
            .unwrap_or_default()
    }
}
