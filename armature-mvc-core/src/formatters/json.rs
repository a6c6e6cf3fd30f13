use super::{OutputFormatter, OutputFormatterContext, write_text};
use crate::media_type::MediaType;
use crate::{HttpResponse, Result};
use async_trait::async_trait;

/// Writes any value as JSON.
///
/// Handles `application/json`, `text/json` and structured `+json` types
/// such as `application/problem+json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonOutputFormatter;

#[async_trait]
impl OutputFormatter for JsonOutputFormatter {
    fn name(&self) -> &str {
        "JsonOutputFormatter"
    }

    fn supported_media_types(&self) -> Vec<MediaType> {
        vec![MediaType::json(), MediaType::text_json(), MediaType::any_json()]
    }

    async fn write(
        &self,
        context: &OutputFormatterContext<'_>,
        response: &mut HttpResponse,
    ) -> Result<()> {
        let body = serde_json::to_vec(context.value)?;
        write_text(context, response, MediaType::json(), &body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{HttpRequest, MvcOptions};
    use tokio_util::sync::CancellationToken;

    #[tokio::test]
    async fn test_writes_json_with_charset() {
        let request = HttpRequest::get("/");
        let options = MvcOptions::default();
        let token = CancellationToken::new();
        let value = serde_json::json!({"id": 7});
        let mut context = OutputFormatterContext::new(&request, &options, &value, &token);
        context.content_type = Some(MediaType::json());

        let mut response = HttpResponse::new();
        JsonOutputFormatter.write(&context, &mut response).await.unwrap();

        assert_eq!(
            response.header("content-type"),
            Some("application/json; charset=utf-8")
        );
        assert_eq!(response.body_string(), r#"{"id":7}"#);
    }

    #[tokio::test]
    async fn test_aborted_request_writes_nothing() {
        let request = HttpRequest::get("/");
        let options = MvcOptions::default();
        let token = CancellationToken::new();
        token.cancel();
        let value = serde_json::json!([1, 2]);
        let context = OutputFormatterContext::new(&request, &options, &value, &token);

        let mut response = HttpResponse::new();
        let result = JsonOutputFormatter.write(&context, &mut response).await;
        assert!(matches!(result, Err(crate::Error::RequestAborted)));
        assert!(!response.has_started());
    }
}
