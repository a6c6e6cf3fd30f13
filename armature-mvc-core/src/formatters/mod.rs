//! Output formatters.
//!
//! A formatter serializes an object result's value for one family of media
//! types. The [`OutputFormatterSelector`] decides which formatter runs and
//! which content type it writes.

mod json;
mod selector;
mod text;

pub use json::JsonOutputFormatter;
pub use selector::{DefaultOutputFormatterSelector, FormatterSelection, OutputFormatterSelector};
pub use text::{NoContentOutputFormatter, StringOutputFormatter};

use crate::media_type::MediaType;
use crate::{HttpRequest, HttpResponse, MvcOptions, Result};
use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

/// What a formatter gets to look at while being selected and while writing.
#[derive(Debug)]
pub struct OutputFormatterContext<'a> {
    pub request: &'a HttpRequest,
    pub options: &'a MvcOptions,
    pub value: &'a Value,
    /// Declared value type, e.g. `"string"`, when the result carries one
    pub object_type: Option<&'a str>,
    /// Content type under consideration; set to the final choice by a
    /// formatter that accepts the result.
    pub content_type: Option<MediaType>,
    /// True when the content type came from the result rather than from
    /// the formatter's own defaults.
    pub content_type_is_server_defined: bool,
    pub request_aborted: &'a CancellationToken,
}

impl<'a> OutputFormatterContext<'a> {
    pub fn new(
        request: &'a HttpRequest,
        options: &'a MvcOptions,
        value: &'a Value,
        request_aborted: &'a CancellationToken,
    ) -> Self {
        Self {
            request,
            options,
            value,
            object_type: None,
            content_type: None,
            content_type_is_server_defined: false,
            request_aborted,
        }
    }

    pub fn with_object_type(mut self, object_type: Option<&'a str>) -> Self {
        self.object_type = object_type;
        self
    }
}

/// Serializes values to the response body.
#[async_trait]
pub trait OutputFormatter: Send + Sync {
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Media types this formatter writes, most preferred first.
    fn supported_media_types(&self) -> Vec<MediaType>;

    fn can_write_value(&self, _value: &Value, _object_type: Option<&str>) -> bool {
        true
    }

    /// Decide whether this formatter can write the result for
    /// `context.content_type`, narrowing the content type to what will
    /// actually be written.
    fn can_write_result(&self, context: &mut OutputFormatterContext<'_>) -> bool {
        if !self.can_write_value(context.value, context.object_type) {
            return false;
        }

        let supported = self.supported_media_types();
        let Some(requested) = context.content_type.clone() else {
            return match supported.into_iter().find(|mt| !mt.has_wildcard()) {
                Some(first) => {
                    context.content_type = Some(first);
                    true
                }
                None => false,
            };
        };

        for media_type in &supported {
            if !media_type.has_wildcard() && media_type.is_subset_of(&requested) {
                // requested was a range such as application/*; keep its charset
                let mut chosen = media_type.clone();
                if let Some(charset) = requested.charset() {
                    chosen = chosen.with_param("charset", charset);
                }
                context.content_type = Some(chosen);
                return true;
            }
            if !requested.has_wildcard() && requested.is_subset_of(media_type) {
                return true;
            }
        }
        false
    }

    async fn write(
        &self,
        context: &OutputFormatterContext<'_>,
        response: &mut HttpResponse,
    ) -> Result<()>;
}

/// Write `bytes` with `content_type`, adding `charset=utf-8` to text types
/// that don't name a charset.
pub(crate) fn write_text(
    context: &OutputFormatterContext<'_>,
    response: &mut HttpResponse,
    fallback: MediaType,
    bytes: &[u8],
) -> Result<()> {
    if context.request_aborted.is_cancelled() {
        return Err(crate::Error::RequestAborted);
    }

    let mut content_type = context.content_type.clone().unwrap_or(fallback);
    if content_type.charset().is_none() {
        content_type = content_type.with_param("charset", "utf-8");
    }
    response.set_header(http::header::CONTENT_TYPE, &content_type.to_header_value())?;
    response.set_header(http::header::CONTENT_LENGTH, &bytes.len().to_string())?;
    response.write_body(bytes);
    Ok(())
}
