//! Entity tags, conditional request evaluation and byte ranges.
//!
//! File results evaluate the request's validators against the resource's
//! `ETag` and `Last-Modified` before writing anything:
//!
//! - `If-Match` / `If-Unmodified-Since` guard against lost updates (412)
//! - `If-None-Match` / `If-Modified-Since` allow cache revalidation (304)
//! - `Range` / `If-Range` select a partial representation (206/416)
//!
//! Evaluation is pure: the same headers and validators always produce the
//! same [`PreconditionState`]. Dates are compared at whole-second precision,
//! the granularity of HTTP date headers.
//!
//! ```
//! use armature_mvc_core::conditional::{ConditionalHeaders, ETag, PreconditionState, evaluate_preconditions};
//! use armature_mvc_core::HttpRequest;
//! use http::Method;
//!
//! let request = HttpRequest::get("/report.pdf").with_header("If-None-Match", "\"v2\"");
//! let headers = ConditionalHeaders::from_request(&request);
//!
//! let state = evaluate_preconditions(&headers, &Method::GET, Some(&ETag::strong("v2")), None);
//! assert_eq!(state, PreconditionState::NotModified);
//! ```

use crate::HttpRequest;
use http::Method;
use http::header::{IF_MATCH, IF_MODIFIED_SINCE, IF_NONE_MATCH, IF_RANGE, IF_UNMODIFIED_SINCE, RANGE};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::time::{Duration, SystemTime};

// ============================================================================
// ETag
// ============================================================================

/// An HTTP entity tag.
///
/// ```
/// use armature_mvc_core::conditional::ETag;
///
/// assert_eq!(ETag::strong("abc123").to_header_value(), "\"abc123\"");
/// assert_eq!(ETag::weak("abc123").to_header_value(), "W/\"abc123\"");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ETag {
    /// The tag value (without quotes)
    pub value: String,
    pub weak: bool,
}

impl ETag {
    /// Create a strong ETag (byte-for-byte identity).
    pub fn strong(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            weak: false,
        }
    }

    /// Create a weak ETag (semantic equivalence).
    pub fn weak(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            weak: true,
        }
    }

    /// Parse a single quoted tag, optionally prefixed with `W/`.
    ///
    /// ```
    /// use armature_mvc_core::conditional::ETag;
    ///
    /// let weak = ETag::parse("W/\"abc123\"").unwrap();
    /// assert!(weak.weak);
    /// assert_eq!(weak.value, "abc123");
    /// assert!(ETag::parse("abc123").is_none());
    /// ```
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();

        let (weak, value_part) = match s.strip_prefix("W/").or_else(|| s.strip_prefix("w/")) {
            Some(rest) => (true, rest),
            None => (false, s),
        };

        let value = value_part
            .strip_prefix('"')?
            .strip_suffix('"')?
            .to_string();

        Some(Self { value, weak })
    }

    /// Strong tag derived from a content hash.
    pub fn from_bytes(data: &[u8]) -> Self {
        use std::collections::hash_map::DefaultHasher;

        let mut hasher = DefaultHasher::new();
        data.hash(&mut hasher);
        Self::strong(format!("{:x}", hasher.finish()))
    }

    /// Strong tag derived from file size and modification time.
    pub fn from_file_metadata(size: u64, modified: SystemTime) -> Self {
        let modified_unix = modified
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        Self::strong(format!("{:x}-{:x}", size, modified_unix))
    }

    pub fn to_header_value(&self) -> String {
        if self.weak {
            format!("W/\"{}\"", self.value)
        } else {
            format!("\"{}\"", self.value)
        }
    }

    /// Both tags strong and equal.
    pub fn strong_match(&self, other: &ETag) -> bool {
        !self.weak && !other.weak && self.value == other.value
    }

    /// Values equal; the weak flag is ignored.
    pub fn weak_match(&self, other: &ETag) -> bool {
        self.value == other.value
    }
}

impl fmt::Display for ETag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_header_value())
    }
}

/// Tags listed in `If-Match` / `If-None-Match`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ETagList {
    pub etags: Vec<ETag>,
    /// The header was `*`
    pub any: bool,
}

impl ETagList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn any() -> Self {
        Self {
            etags: Vec::new(),
            any: true,
        }
    }

    /// ```
    /// use armature_mvc_core::conditional::ETagList;
    ///
    /// let list = ETagList::parse("\"abc\", \"def\", W/\"ghi\"");
    /// assert_eq!(list.etags.len(), 3);
    /// assert!(ETagList::parse("*").any);
    /// ```
    pub fn parse(header: &str) -> Self {
        let header = header.trim();
        if header == "*" {
            return Self::any();
        }

        let etags = header
            .split(',')
            .filter_map(|s| ETag::parse(s.trim()))
            .collect();

        Self { etags, any: false }
    }

    /// Weak comparison; `*` matches any current representation.
    pub fn contains_weak(&self, etag: Option<&ETag>) -> bool {
        match etag {
            _ if self.any => true,
            Some(etag) => self.etags.iter().any(|e| e.weak_match(etag)),
            None => false,
        }
    }

    /// Strong comparison; `*` matches any current representation.
    pub fn contains_strong(&self, etag: Option<&ETag>) -> bool {
        match etag {
            _ if self.any => true,
            Some(etag) => self.etags.iter().any(|e| e.strong_match(etag)),
            None => false,
        }
    }

    pub fn is_empty(&self) -> bool {
        !self.any && self.etags.is_empty()
    }
}

// ============================================================================
// Conditional headers
// ============================================================================

/// `If-Range` carries either an entity tag or a date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IfRange {
    ETag(ETag),
    Date(SystemTime),
}

/// The request's parsed validators. Unparseable headers are treated as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConditionalHeaders {
    pub if_match: Option<ETagList>,
    pub if_none_match: Option<ETagList>,
    pub if_modified_since: Option<SystemTime>,
    pub if_unmodified_since: Option<SystemTime>,
    pub if_range: Option<IfRange>,
}

impl ConditionalHeaders {
    pub fn from_request(request: &HttpRequest) -> Self {
        let date = |name: &str| {
            request
                .header(name)
                .and_then(|h| httpdate::parse_http_date(h).ok())
        };

        let if_range = request.header(IF_RANGE.as_str()).and_then(|h| {
            ETag::parse(h).map(IfRange::ETag).or_else(|| {
                httpdate::parse_http_date(h).ok().map(IfRange::Date)
            })
        });

        Self {
            if_match: request
                .header_joined(IF_MATCH.as_str())
                .map(|h| ETagList::parse(&h))
                .filter(|list| !list.is_empty()),
            if_none_match: request
                .header_joined(IF_NONE_MATCH.as_str())
                .map(|h| ETagList::parse(&h))
                .filter(|list| !list.is_empty()),
            if_modified_since: date(IF_MODIFIED_SINCE.as_str()),
            if_unmodified_since: date(IF_UNMODIFIED_SINCE.as_str()),
            if_range,
        }
    }
}

/// Outcome of precondition evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PreconditionState {
    /// Write the representation (possibly partial)
    ShouldProcess,
    /// 304 without a body
    NotModified,
    /// 412 without a body
    PreconditionFailed,
}

impl PreconditionState {
    // Unspecified < NotModified < ShouldProcess < PreconditionFailed
    fn rank(state: Option<Self>) -> u8 {
        match state {
            None => 0,
            Some(PreconditionState::NotModified) => 1,
            Some(PreconditionState::ShouldProcess) => 2,
            Some(PreconditionState::PreconditionFailed) => 3,
        }
    }
}

/// Drop sub-second precision.
pub fn truncate_to_seconds(time: SystemTime) -> SystemTime {
    match time.duration_since(SystemTime::UNIX_EPOCH) {
        Ok(since_epoch) => SystemTime::UNIX_EPOCH + Duration::from_secs(since_epoch.as_secs()),
        Err(_) => time,
    }
}

fn is_get_or_head(method: &Method) -> bool {
    method == Method::GET || method == Method::HEAD
}

/// Evaluate the request validators against the resource's current ones.
///
/// Each header yields its own state and the most restrictive wins.
/// `If-Modified-Since` is ignored when `If-None-Match` is present (and for
/// unsafe methods); `If-Unmodified-Since` is ignored when `If-Match` is.
pub fn evaluate_preconditions(
    headers: &ConditionalHeaders,
    method: &Method,
    etag: Option<&ETag>,
    last_modified: Option<SystemTime>,
) -> PreconditionState {
    let last_modified = last_modified.map(truncate_to_seconds);

    let if_match = headers.if_match.as_ref().map(|list| {
        if list.contains_strong(etag) {
            PreconditionState::ShouldProcess
        } else {
            PreconditionState::PreconditionFailed
        }
    });

    let if_none_match = headers.if_none_match.as_ref().map(|list| {
        if !list.contains_weak(etag) {
            PreconditionState::ShouldProcess
        } else if is_get_or_head(method) {
            PreconditionState::NotModified
        } else {
            PreconditionState::PreconditionFailed
        }
    });

    let if_modified_since = match (headers.if_modified_since, last_modified) {
        (Some(since), Some(modified))
            if headers.if_none_match.is_none() && is_get_or_head(method) =>
        {
            if since < modified {
                Some(PreconditionState::ShouldProcess)
            } else {
                Some(PreconditionState::NotModified)
            }
        }
        _ => None,
    };

    let if_unmodified_since = match (headers.if_unmodified_since, last_modified) {
        (Some(since), Some(modified)) if headers.if_match.is_none() => {
            if since >= modified {
                Some(PreconditionState::ShouldProcess)
            } else {
                Some(PreconditionState::PreconditionFailed)
            }
        }
        _ => None,
    };

    [if_match, if_none_match, if_modified_since, if_unmodified_since]
        .into_iter()
        .max_by_key(|state| PreconditionState::rank(*state))
        .flatten()
        .unwrap_or(PreconditionState::ShouldProcess)
}

// ============================================================================
// Byte ranges
// ============================================================================

/// An inclusive byte range within a representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// `bytes start-end/total`
    pub fn content_range(&self, total: u64) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, total)
    }
}

/// What to send for a request that may carry `Range`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeOutcome {
    /// Send the whole representation
    Full,
    /// 206 with this range
    Partial(ByteRange),
    /// 416 with `Content-Range: bytes */length`
    Unsatisfiable,
}

/// Decide how a GET for a `length`-byte representation honours `Range`.
///
/// Only a single `bytes=` range is supported; multiple or malformed ranges
/// fall back to the full body. A failed `If-Range` also means the full body.
pub fn evaluate_range(
    request: &HttpRequest,
    headers: &ConditionalHeaders,
    length: u64,
    etag: Option<&ETag>,
    last_modified: Option<SystemTime>,
) -> RangeOutcome {
    if request.method != Method::GET {
        return RangeOutcome::Full;
    }
    let Some(raw) = request.header(RANGE.as_str()) else {
        return RangeOutcome::Full;
    };

    if let Some(if_range) = &headers.if_range {
        let current = match if_range {
            IfRange::ETag(tag) => etag.is_some_and(|etag| tag.strong_match(etag)),
            IfRange::Date(date) => last_modified
                .map(truncate_to_seconds)
                .is_some_and(|modified| modified == *date),
        };
        if !current {
            return RangeOutcome::Full;
        }
    }

    let Some(spec) = parse_range_header(raw) else {
        return RangeOutcome::Full;
    };

    if length == 0 {
        return RangeOutcome::Unsatisfiable;
    }

    let range = match spec {
        (Some(start), _) if start >= length => return RangeOutcome::Unsatisfiable,
        (Some(start), Some(end)) => ByteRange {
            start,
            end: end.min(length - 1),
        },
        (Some(start), None) => ByteRange {
            start,
            end: length - 1,
        },
        (None, Some(0)) => return RangeOutcome::Unsatisfiable,
        (None, Some(suffix)) => ByteRange {
            start: length.saturating_sub(suffix),
            end: length - 1,
        },
        (None, None) => return RangeOutcome::Full,
    };

    RangeOutcome::Partial(range)
}

/// Parse `bytes=a-b`, `bytes=a-` or `bytes=-n`. `None` for anything else.
fn parse_range_header(raw: &str) -> Option<(Option<u64>, Option<u64>)> {
    let (unit, ranges) = raw.trim().split_once('=')?;
    if !unit.trim().eq_ignore_ascii_case("bytes") || ranges.contains(',') {
        return None;
    }

    let (start, end) = ranges.trim().split_once('-')?;
    let start = match start.trim() {
        "" => None,
        s => Some(s.parse::<u64>().ok()?),
    };
    let end = match end.trim() {
        "" => None,
        s => Some(s.parse::<u64>().ok()?),
    };

    match (start, end) {
        (None, None) => None,
        (Some(start), Some(end)) if end < start => None,
        spec => Some(spec),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(secs: u64) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(secs)
    }

    fn headers(request: &HttpRequest) -> ConditionalHeaders {
        ConditionalHeaders::from_request(request)
    }

    #[test]
    fn test_etag_parse() {
        assert_eq!(ETag::parse("\"abc\""), Some(ETag::strong("abc")));
        assert_eq!(ETag::parse("w/\"abc\""), Some(ETag::weak("abc")));
        assert_eq!(ETag::parse("\"unterminated"), None);
    }

    #[test]
    fn test_etag_comparison() {
        let strong = ETag::strong("a");
        let weak = ETag::weak("a");
        assert!(strong.strong_match(&ETag::strong("a")));
        assert!(!strong.strong_match(&weak));
        assert!(strong.weak_match(&weak));
    }

    #[test]
    fn test_etag_from_content() {
        assert_eq!(ETag::from_bytes(b"hello"), ETag::from_bytes(b"hello"));
        assert_ne!(ETag::from_bytes(b"hello"), ETag::from_bytes(b"world"));
        assert_eq!(ETag::from_file_metadata(16, at(256)).value, "10-100");
    }

    #[test]
    fn test_no_validators_should_process() {
        let request = HttpRequest::get("/");
        let state = evaluate_preconditions(&headers(&request), &Method::GET, None, None);
        assert_eq!(state, PreconditionState::ShouldProcess);
    }

    #[test]
    fn test_if_match() {
        let etag = ETag::strong("v1");
        let request = HttpRequest::new(Method::PUT, "/").with_header("If-Match", "\"v1\"");
        assert_eq!(
            evaluate_preconditions(&headers(&request), &Method::PUT, Some(&etag), None),
            PreconditionState::ShouldProcess
        );

        let request = HttpRequest::new(Method::PUT, "/").with_header("If-Match", "\"v0\"");
        assert_eq!(
            evaluate_preconditions(&headers(&request), &Method::PUT, Some(&etag), None),
            PreconditionState::PreconditionFailed
        );

        // weak tags never match strongly
        let request = HttpRequest::new(Method::PUT, "/").with_header("If-Match", "W/\"v1\"");
        assert_eq!(
            evaluate_preconditions(&headers(&request), &Method::PUT, Some(&etag), None),
            PreconditionState::PreconditionFailed
        );

        let request = HttpRequest::new(Method::PUT, "/").with_header("If-Match", "*");
        assert_eq!(
            evaluate_preconditions(&headers(&request), &Method::PUT, None, None),
            PreconditionState::ShouldProcess
        );
    }

    #[test]
    fn test_if_none_match() {
        let etag = ETag::strong("v1");
        let request = HttpRequest::get("/").with_header("If-None-Match", "W/\"v1\", \"v2\"");
        assert_eq!(
            evaluate_preconditions(&headers(&request), &Method::GET, Some(&etag), None),
            PreconditionState::NotModified
        );
        assert_eq!(
            evaluate_preconditions(&headers(&request), &Method::POST, Some(&etag), None),
            PreconditionState::PreconditionFailed
        );

        let request = HttpRequest::get("/").with_header("If-None-Match", "\"v3\"");
        assert_eq!(
            evaluate_preconditions(&headers(&request), &Method::GET, Some(&etag), None),
            PreconditionState::ShouldProcess
        );
    }

    #[test]
    fn test_if_modified_since_truncates_subseconds() {
        let modified = at(1_000) + Duration::from_millis(900);
        let request = HttpRequest::get("/")
            .with_header("If-Modified-Since", &httpdate::fmt_http_date(at(1_000)));

        assert_eq!(
            evaluate_preconditions(&headers(&request), &Method::GET, None, Some(modified)),
            PreconditionState::NotModified
        );
        assert_eq!(
            evaluate_preconditions(&headers(&request), &Method::GET, None, Some(at(1_001))),
            PreconditionState::ShouldProcess
        );
    }

    #[test]
    fn test_if_none_match_takes_precedence_over_date() {
        let etag = ETag::strong("v2");
        let request = HttpRequest::get("/")
            .with_header("If-None-Match", "\"v1\"")
            .with_header("If-Modified-Since", &httpdate::fmt_http_date(at(5_000)));

        assert_eq!(
            evaluate_preconditions(&headers(&request), &Method::GET, Some(&etag), Some(at(1_000))),
            PreconditionState::ShouldProcess
        );
    }

    #[test]
    fn test_if_unmodified_since() {
        let request = HttpRequest::new(Method::DELETE, "/")
            .with_header("If-Unmodified-Since", &httpdate::fmt_http_date(at(1_000)));
        let h = headers(&request);

        assert_eq!(
            evaluate_preconditions(&h, &Method::DELETE, None, Some(at(999))),
            PreconditionState::ShouldProcess
        );
        assert_eq!(
            evaluate_preconditions(&h, &Method::DELETE, None, Some(at(1_001))),
            PreconditionState::PreconditionFailed
        );
    }

    #[test]
    fn test_most_restrictive_state_wins() {
        let etag = ETag::strong("v1");
        let request = HttpRequest::get("/")
            .with_header("If-Match", "\"other\"")
            .with_header("If-None-Match", "\"v1\"");

        assert_eq!(
            evaluate_preconditions(&headers(&request), &Method::GET, Some(&etag), None),
            PreconditionState::PreconditionFailed
        );
    }

    #[test]
    fn test_evaluation_is_repeatable() {
        let etag = ETag::weak("v1");
        let request = HttpRequest::get("/")
            .with_header("If-None-Match", "\"v1\"")
            .with_header("If-Unmodified-Since", &httpdate::fmt_http_date(at(10)));
        let h = headers(&request);

        let first = evaluate_preconditions(&h, &Method::GET, Some(&etag), Some(at(20)));
        for _ in 0..5 {
            assert_eq!(
                evaluate_preconditions(&h, &Method::GET, Some(&etag), Some(at(20))),
                first
            );
        }
    }

    #[test]
    fn test_ranges() {
        let request = HttpRequest::get("/").with_header("Range", "bytes=2-5");
        assert_eq!(
            evaluate_range(&request, &headers(&request), 10, None, None),
            RangeOutcome::Partial(ByteRange { start: 2, end: 5 })
        );

        let request = HttpRequest::get("/").with_header("Range", "bytes=-3");
        assert_eq!(
            evaluate_range(&request, &headers(&request), 10, None, None),
            RangeOutcome::Partial(ByteRange { start: 7, end: 9 })
        );

        let request = HttpRequest::get("/").with_header("Range", "bytes=4-100");
        let outcome = evaluate_range(&request, &headers(&request), 10, None, None);
        assert_eq!(outcome, RangeOutcome::Partial(ByteRange { start: 4, end: 9 }));

        let request = HttpRequest::get("/").with_header("Range", "bytes=10-");
        assert_eq!(
            evaluate_range(&request, &headers(&request), 10, None, None),
            RangeOutcome::Unsatisfiable
        );
    }

    #[test]
    fn test_unsupported_ranges_send_everything() {
        for raw in ["bytes=0-1,4-5", "items=0-1", "bytes=5-2", "bytes=abc"] {
            let request = HttpRequest::get("/").with_header("Range", raw);
            assert_eq!(
                evaluate_range(&request, &headers(&request), 10, None, None),
                RangeOutcome::Full,
                "{}",
                raw
            );
        }

        let request = HttpRequest::new(Method::HEAD, "/").with_header("Range", "bytes=0-1");
        assert_eq!(
            evaluate_range(&request, &headers(&request), 10, None, None),
            RangeOutcome::Full
        );
    }

    #[test]
    fn test_if_range() {
        let etag = ETag::strong("v1");
        let request = HttpRequest::get("/")
            .with_header("Range", "bytes=0-1")
            .with_header("If-Range", "\"v1\"");
        assert!(matches!(
            evaluate_range(&request, &headers(&request), 10, Some(&etag), None),
            RangeOutcome::Partial(_)
        ));

        let stale = HttpRequest::get("/")
            .with_header("Range", "bytes=0-1")
            .with_header("If-Range", &httpdate::fmt_http_date(at(50)));
        assert_eq!(
            evaluate_range(&stale, &headers(&stale), 10, Some(&etag), Some(at(60))),
            RangeOutcome::Full
        );
    }

    #[test]
    fn test_content_range_header() {
        let range = ByteRange { start: 0, end: 499 };
        assert_eq!(range.len(), 500);
        assert_eq!(range.content_range(1234), "bytes 0-499/1234");
    }
}
