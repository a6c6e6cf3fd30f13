use super::ActionResult;
use crate::media_type::MediaType;
use crate::{ActionContext, Result};
use async_trait::async_trait;
use http::StatusCode;

/// Leaves the response untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyResult;

#[async_trait]
impl ActionResult for EmptyResult {
    async fn execute(&self, _context: &mut ActionContext) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &str {
        "EmptyResult"
    }
}

/// Sets the status code and nothing else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusCodeResult {
    pub status: StatusCode,
}

impl StatusCodeResult {
    pub fn new(status: StatusCode) -> Self {
        Self { status }
    }

    pub fn ok() -> Self {
        Self::new(StatusCode::OK)
    }

    pub fn no_content() -> Self {
        Self::new(StatusCode::NO_CONTENT)
    }

    pub fn bad_request() -> Self {
        Self::new(StatusCode::BAD_REQUEST)
    }

    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED)
    }

    pub fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND)
    }

    pub fn conflict() -> Self {
        Self::new(StatusCode::CONFLICT)
    }

    pub fn unprocessable_entity() -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY)
    }
}

#[async_trait]
impl ActionResult for StatusCodeResult {
    async fn execute(&self, context: &mut ActionContext) -> Result<()> {
        context.response.status = self.status;
        Ok(())
    }

    fn name(&self) -> &str {
        "StatusCodeResult"
    }
}

/// Writes a string body as is.
#[derive(Debug, Clone, Default)]
pub struct ContentResult {
    pub content: Option<String>,
    /// Defaults to `text/plain; charset=utf-8`
    pub content_type: Option<MediaType>,
    pub status: Option<StatusCode>,
}

impl ContentResult {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Default::default()
        }
    }

    pub fn with_content_type(mut self, content_type: MediaType) -> Self {
        self.content_type = Some(content_type);
        self
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = Some(status);
        self
    }
}

#[async_trait]
impl ActionResult for ContentResult {
    async fn execute(&self, context: &mut ActionContext) -> Result<()> {
        context.ensure_not_aborted()?;

        let content_type = self
            .content_type
            .clone()
            .unwrap_or_else(|| MediaType::plain_text().with_param("charset", "utf-8"));

        let response = &mut context.response;
        if let Some(status) = self.status {
            response.status = status;
        }
        response.set_header(http::header::CONTENT_TYPE, &content_type.to_header_value())?;

        if let Some(content) = &self.content {
            response.set_header(http::header::CONTENT_LENGTH, &content.len().to_string())?;
            response.write_body(content.as_bytes());
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "ContentResult"
    }
}
