use super::{OutputFormatter, OutputFormatterContext, write_text};
use crate::media_type::MediaType;
use crate::{HttpResponse, Result};
use async_trait::async_trait;
use http::StatusCode;
use serde_json::Value;

/// Writes string values as `text/plain`.
#[derive(Debug, Clone, Copy, Default)]
pub struct StringOutputFormatter;

#[async_trait]
impl OutputFormatter for StringOutputFormatter {
    fn name(&self) -> &str {
        "StringOutputFormatter"
    }

    fn supported_media_types(&self) -> Vec<MediaType> {
        vec![MediaType::plain_text()]
    }

    fn can_write_value(&self, value: &Value, object_type: Option<&str>) -> bool {
        value.is_string() || object_type == Some("string")
    }

    async fn write(
        &self,
        context: &OutputFormatterContext<'_>,
        response: &mut HttpResponse,
    ) -> Result<()> {
        let text = context.value.as_str().unwrap_or_default();
        write_text(context, response, MediaType::plain_text(), text.as_bytes())
    }
}

/// Turns a null value into an empty 204 response.
///
/// Only active while `treat_null_value_as_no_content` is set; accepts any
/// content type so it wins ahead of the serializing formatters.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoContentOutputFormatter;

#[async_trait]
impl OutputFormatter for NoContentOutputFormatter {
    fn name(&self) -> &str {
        "NoContentOutputFormatter"
    }

    fn supported_media_types(&self) -> Vec<MediaType> {
        Vec::new()
    }

    fn can_write_result(&self, context: &mut OutputFormatterContext<'_>) -> bool {
        context.options.treat_null_value_as_no_content && context.value.is_null()
    }

    async fn write(
        &self,
        _context: &OutputFormatterContext<'_>,
        response: &mut HttpResponse,
    ) -> Result<()> {
        if response.status == StatusCode::OK {
            response.status = StatusCode::NO_CONTENT;
        }
        response.set_header(http::header::CONTENT_LENGTH, "0")?;
        Ok(())
    }
}
