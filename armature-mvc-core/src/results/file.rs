// File results: in-memory bytes, streams, virtual and physical paths

use super::{ActionResult, ActionResultExecutor};
use crate::conditional::{
    ByteRange, ConditionalHeaders, ETag, PreconditionState, RangeOutcome, evaluate_preconditions,
    evaluate_range,
};
use crate::media_type::MediaType;
use crate::{ActionContext, Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use http::header::{
    ACCEPT_RANGES, CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE, ETAG,
    LAST_MODIFIED,
};
use http::{Method, StatusCode};
use parking_lot::Mutex;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeekExt};

/// Where a file result's bytes come from.
pub enum FileSource {
    Content(Bytes),
    /// Consumed on first execution
    Stream(Mutex<Option<Box<dyn AsyncRead + Send + Unpin>>>),
    /// Absolute file-system path
    Physical(PathBuf),
    /// Path relative to the configured web root, e.g. `~/docs/a.pdf`
    Virtual(String),
}

impl fmt::Debug for FileSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileSource::Content(bytes) => write!(f, "Content({} bytes)", bytes.len()),
            FileSource::Stream(_) => f.write_str("Stream"),
            FileSource::Physical(path) => write!(f, "Physical({})", path.display()),
            FileSource::Virtual(path) => write!(f, "Virtual({})", path),
        }
    }
}

/// Writes a file with conditional request and range support.
#[derive(Debug)]
pub struct FileResult {
    pub source: FileSource,
    pub content_type: MediaType,
    /// Sent as an attachment with this name when set
    pub file_download_name: Option<String>,
    pub last_modified: Option<SystemTime>,
    pub entity_tag: Option<ETag>,
    /// Overrides `MvcOptions::enable_range_processing`
    pub enable_range_processing: Option<bool>,
    kind: &'static str,
}

impl FileResult {
    fn with_source(source: FileSource, content_type: MediaType, kind: &'static str) -> Self {
        Self {
            source,
            content_type,
            file_download_name: None,
            last_modified: None,
            entity_tag: None,
            enable_range_processing: None,
            kind,
        }
    }

    pub fn from_bytes(content: impl Into<Bytes>, content_type: MediaType) -> Self {
        Self::with_source(FileSource::Content(content.into()), content_type, "FileContentResult")
    }

    pub fn from_stream(reader: impl AsyncRead + Send + Unpin + 'static, content_type: MediaType) -> Self {
        Self::with_source(
            FileSource::Stream(Mutex::new(Some(Box::new(reader)))),
            content_type,
            "FileStreamResult",
        )
    }

    pub fn physical(path: impl Into<PathBuf>, content_type: MediaType) -> Self {
        Self::with_source(FileSource::Physical(path.into()), content_type, "PhysicalFileResult")
    }

    pub fn virtual_path(path: impl Into<String>, content_type: MediaType) -> Self {
        Self::with_source(FileSource::Virtual(path.into()), content_type, "VirtualFileResult")
    }

    pub fn with_download_name(mut self, name: impl Into<String>) -> Self {
        self.file_download_name = Some(name.into());
        self
    }

    pub fn with_last_modified(mut self, time: SystemTime) -> Self {
        self.last_modified = Some(time);
        self
    }

    pub fn with_entity_tag(mut self, etag: ETag) -> Self {
        self.entity_tag = Some(etag);
        self
    }

    pub fn with_range_processing(mut self, enabled: bool) -> Self {
        self.enable_range_processing = Some(enabled);
        self
    }
}

#[async_trait]
impl ActionResult for FileResult {
    async fn execute(&self, context: &mut ActionContext) -> Result<()> {
        let executor = context.services.file_result_executor.clone();
        executor.execute(context, self).await
    }

    fn name(&self) -> &str {
        self.kind
    }
}

/// Bytes ready to send, with their total length.
enum Resolved {
    Memory(Bytes),
    File(PathBuf, u64),
}

impl Resolved {
    fn len(&self) -> u64 {
        match self {
            Resolved::Memory(bytes) => bytes.len() as u64,
            Resolved::File(_, len) => *len,
        }
    }

    async fn read(&self, range: Option<ByteRange>) -> Result<Bytes> {
        match (self, range) {
            (Resolved::Memory(bytes), None) => Ok(bytes.clone()),
            (Resolved::Memory(bytes), Some(range)) => {
                Ok(bytes.slice(range.start as usize..=range.end as usize))
            }
            (Resolved::File(path, _), None) => Ok(tokio::fs::read(path).await?.into()),
            (Resolved::File(path, _), Some(range)) => {
                let mut file = tokio::fs::File::open(path).await?;
                file.seek(std::io::SeekFrom::Start(range.start)).await?;
                let mut buf = vec![0u8; range.len() as usize];
                file.read_exact(&mut buf).await?;
                Ok(buf.into())
            }
        }
    }
}

/// Default executor for [`FileResult`].
#[derive(Debug, Clone, Copy, Default)]
pub struct FileResultExecutor;

impl FileResultExecutor {
    async fn resolve(
        &self,
        context: &ActionContext,
        result: &FileResult,
    ) -> Result<(Resolved, Option<SystemTime>)> {
        match &result.source {
            FileSource::Content(bytes) => Ok((Resolved::Memory(bytes.clone()), None)),
            FileSource::Stream(slot) => {
                let reader = slot.lock().take();
                let Some(mut reader) = reader else {
                    return Err(Error::InvalidOperation(
                        "The file stream has already been consumed.".to_string(),
                    ));
                };
                let mut buf = Vec::new();
                reader.read_to_end(&mut buf).await?;
                Ok((Resolved::Memory(buf.into()), None))
            }
            FileSource::Physical(path) => {
                if !path.is_absolute() {
                    return Err(Error::InvalidOperation(format!(
                        "Path '{}' was not rooted.",
                        path.display()
                    )));
                }
                self.resolve_file(path.clone()).await
            }
            FileSource::Virtual(path) => {
                let root = context.services.web_root()?;
                let relative = path.trim_start_matches('~').trim_start_matches('/');
                let relative = Path::new(relative);
                if relative
                    .components()
                    .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
                {
                    return Err(Error::NotFound(format!("Could not find file: {}", path)));
                }
                self.resolve_file(root.join(relative)).await
            }
        }
    }

    async fn resolve_file(&self, path: PathBuf) -> Result<(Resolved, Option<SystemTime>)> {
        let metadata = match tokio::fs::metadata(&path).await {
            Ok(metadata) if metadata.is_file() => metadata,
            Ok(_) => {
                return Err(Error::NotFound(format!("Could not find file: {}", path.display())));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::NotFound(format!("Could not find file: {}", path.display())));
            }
            Err(e) => return Err(e.into()),
        };
        let modified = metadata.modified().ok();
        Ok((Resolved::File(path, metadata.len()), modified))
    }
}

#[async_trait]
impl ActionResultExecutor<FileResult> for FileResultExecutor {
    async fn execute(&self, context: &mut ActionContext, result: &FileResult) -> Result<()> {
        context.ensure_not_aborted()?;

        let (resolved, file_modified) = self.resolve(context, result).await?;
        let last_modified = result.last_modified.or(file_modified);
        let etag = result.entity_tag.as_ref();
        let range_enabled = result
            .enable_range_processing
            .unwrap_or(context.options().enable_range_processing);
        let length = resolved.len();

        let response = &mut context.response;
        response.set_header(CONTENT_TYPE, &result.content_type.to_header_value())?;
        if let Some(name) = &result.file_download_name {
            response.set_header(CONTENT_DISPOSITION, &content_disposition(name))?;
        }
        if let Some(modified) = last_modified {
            response.set_header(LAST_MODIFIED, &httpdate::fmt_http_date(modified))?;
        }
        if let Some(etag) = etag {
            response.set_header(ETAG, &etag.to_header_value())?;
        }
        if range_enabled {
            response.set_header(ACCEPT_RANGES, "bytes")?;
        }

        let conditional = ConditionalHeaders::from_request(&context.request);
        match evaluate_preconditions(&conditional, &context.request.method, etag, last_modified) {
            PreconditionState::NotModified => {
                context.response.status = StatusCode::NOT_MODIFIED;
                return Ok(());
            }
            PreconditionState::PreconditionFailed => {
                context.response.status = StatusCode::PRECONDITION_FAILED;
                return Ok(());
            }
            PreconditionState::ShouldProcess => {}
        }

        let outcome = if range_enabled {
            evaluate_range(&context.request, &conditional, length, etag, last_modified)
        } else {
            RangeOutcome::Full
        };

        let range = match outcome {
            RangeOutcome::Unsatisfiable => {
                let response = &mut context.response;
                response.status = StatusCode::RANGE_NOT_SATISFIABLE;
                response.set_header(CONTENT_RANGE, &format!("bytes */{}", length))?;
                response.set_header(CONTENT_LENGTH, "0")?;
                return Ok(());
            }
            RangeOutcome::Partial(range) => {
                let response = &mut context.response;
                response.status = StatusCode::PARTIAL_CONTENT;
                response.set_header(CONTENT_RANGE, &range.content_range(length))?;
                response.set_header(CONTENT_LENGTH, &range.len().to_string())?;
                Some(range)
            }
            RangeOutcome::Full => {
                context
                    .response
                    .set_header(CONTENT_LENGTH, &length.to_string())?;
                None
            }
        };

        if context.request.method == Method::HEAD {
            return Ok(());
        }

        context.ensure_not_aborted()?;
        let body = resolved.read(range).await?;
        context.response.write_body(&body);
        Ok(())
    }
}

/// `attachment` disposition with an ASCII fallback and an RFC 5987 name.
fn content_disposition(name: &str) -> String {
    let fallback: String = name
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_ascii() && !c.is_ascii_control() => c,
            _ => '_',
        })
        .collect();

    if fallback == name {
        format!("attachment; filename=\"{}\"", name)
    } else {
        format!(
            "attachment; filename=\"{}\"; filename*=UTF-8''{}",
            fallback,
            urlencoding::encode(name)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::handler_fn;
    use crate::results::ActionOutput;
    use crate::{ActionDescriptor, ActionServices, HttpRequest, MvcOptions};
    use std::sync::Arc;
    use std::time::Duration;

    fn context_with(request: HttpRequest, services: ActionServices) -> ActionContext {
        let action = ActionDescriptor::new("files", "get", handler_fn(|_, _| Ok(ActionOutput::Empty)));
        ActionContext::new(request, Arc::new(action), Arc::new(services))
    }

    fn context(request: HttpRequest) -> ActionContext {
        context_with(request, ActionServices::new())
    }

    fn hello() -> FileResult {
        FileResult::from_bytes(&b"Hello World"[..], MediaType::plain_text())
    }

    #[tokio::test]
    async fn test_writes_content() {
        let mut ctx = context(HttpRequest::get("/"));
        hello()
            .with_download_name("hello.txt")
            .execute(&mut ctx)
            .await
            .unwrap();

        assert_eq!(ctx.response.status, StatusCode::OK);
        assert_eq!(ctx.response.body_string(), "Hello World");
        assert_eq!(ctx.response.header("content-length"), Some("11"));
        assert_eq!(ctx.response.header("content-type"), Some("text/plain"));
        assert_eq!(
            ctx.response.header("content-disposition"),
            Some("attachment; filename=\"hello.txt\"")
        );
    }

    #[test]
    fn test_content_disposition_encodes_unicode() {
        assert_eq!(
            content_disposition("résumé.pdf"),
            "attachment; filename=\"r_sum_.pdf\"; filename*=UTF-8''r%C3%A9sum%C3%A9.pdf"
        );
    }

    #[tokio::test]
    async fn test_not_modified() {
        let request = HttpRequest::get("/").with_header("If-None-Match", "\"v1\"");
        let mut ctx = context(request);
        hello()
            .with_entity_tag(ETag::strong("v1"))
            .execute(&mut ctx)
            .await
            .unwrap();

        assert_eq!(ctx.response.status, StatusCode::NOT_MODIFIED);
        assert!(ctx.response.body_bytes().is_empty());
        assert_eq!(ctx.response.header("etag"), Some("\"v1\""));
    }

    #[tokio::test]
    async fn test_precondition_failed() {
        let request = HttpRequest::new(Method::PUT, "/").with_header("If-Match", "\"v0\"");
        let mut ctx = context(request);
        hello()
            .with_entity_tag(ETag::strong("v1"))
            .execute(&mut ctx)
            .await
            .unwrap();

        assert_eq!(ctx.response.status, StatusCode::PRECONDITION_FAILED);
        assert!(ctx.response.body_bytes().is_empty());
    }

    #[tokio::test]
    async fn test_range_request() {
        let request = HttpRequest::get("/").with_header("Range", "bytes=0-4");
        let mut ctx = context(request);
        hello().with_range_processing(true).execute(&mut ctx).await.unwrap();

        assert_eq!(ctx.response.status, StatusCode::PARTIAL_CONTENT);
        assert_eq!(ctx.response.body_string(), "Hello");
        assert_eq!(ctx.response.header("content-range"), Some("bytes 0-4/11"));
        assert_eq!(ctx.response.header("accept-ranges"), Some("bytes"));
    }

    #[tokio::test]
    async fn test_unsatisfiable_range() {
        let request = HttpRequest::get("/").with_header("Range", "bytes=50-");
        let services = ActionServices::new()
            .with_options(MvcOptions::default().enable_range_processing(true));
        let mut ctx = context_with(request, services);
        hello().execute(&mut ctx).await.unwrap();

        assert_eq!(ctx.response.status, StatusCode::RANGE_NOT_SATISFIABLE);
        assert_eq!(ctx.response.header("content-range"), Some("bytes */11"));
        assert_eq!(ctx.response.header("content-length"), Some("0"));
    }

    #[tokio::test]
    async fn test_range_ignored_when_disabled() {
        let request = HttpRequest::get("/").with_header("Range", "bytes=0-4");
        let mut ctx = context(request);
        hello().with_range_processing(false).execute(&mut ctx).await.unwrap();

        assert_eq!(ctx.response.status, StatusCode::OK);
        assert_eq!(ctx.response.body_string(), "Hello World");
        assert!(ctx.response.header("accept-ranges").is_none());
    }

    #[tokio::test]
    async fn test_head_writes_headers_only() {
        let mut ctx = context(HttpRequest::new(Method::HEAD, "/"));
        hello().execute(&mut ctx).await.unwrap();
        assert_eq!(ctx.response.header("content-length"), Some("11"));
        assert!(ctx.response.body_bytes().is_empty());
    }

    #[tokio::test]
    async fn test_stream_is_consumed_once() {
        let result = FileResult::from_stream(std::io::Cursor::new(b"streamed".to_vec()), MediaType::octet_stream());

        let mut ctx = context(HttpRequest::get("/"));
        result.execute(&mut ctx).await.unwrap();
        assert_eq!(ctx.response.body_string(), "streamed");

        let mut ctx = context(HttpRequest::get("/"));
        let err = result.execute(&mut ctx).await.unwrap_err();
        assert!(matches!(err, Error::InvalidOperation(_)));
    }

    #[tokio::test]
    async fn test_physical_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.bin");
        std::fs::write(&path, b"0123456789").unwrap();

        let request = HttpRequest::get("/").with_header("Range", "bytes=-3");
        let mut ctx = context(request);
        FileResult::physical(&path, MediaType::octet_stream())
            .with_range_processing(true)
            .execute(&mut ctx)
            .await
            .unwrap();

        assert_eq!(ctx.response.status, StatusCode::PARTIAL_CONTENT);
        assert_eq!(ctx.response.body_string(), "789");
        assert!(ctx.response.header("last-modified").is_some());
    }

    #[tokio::test]
    async fn test_physical_path_must_be_rooted() {
        let mut ctx = context(HttpRequest::get("/"));
        let err = FileResult::physical("relative/file.txt", MediaType::plain_text())
            .execute(&mut ctx)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid operation: Path 'relative/file.txt' was not rooted.");
    }

    #[tokio::test]
    async fn test_missing_physical_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = context(HttpRequest::get("/"));
        let err = FileResult::physical(dir.path().join("absent.txt"), MediaType::plain_text())
            .execute(&mut ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_virtual_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("docs")).unwrap();
        std::fs::write(dir.path().join("docs/readme.txt"), b"read me").unwrap();
        let services = ActionServices::new().with_web_root(dir.path());

        let mut ctx = context_with(HttpRequest::get("/"), services.clone());
        FileResult::virtual_path("~/docs/readme.txt", MediaType::plain_text())
            .execute(&mut ctx)
            .await
            .unwrap();
        assert_eq!(ctx.response.body_string(), "read me");

        let mut ctx = context_with(HttpRequest::get("/"), services);
        let err = FileResult::virtual_path("~/../secret.txt", MediaType::plain_text())
            .execute(&mut ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_explicit_last_modified_wins() {
        let modified = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        let mut ctx = context(HttpRequest::get("/"));
        hello().with_last_modified(modified).execute(&mut ctx).await.unwrap();
        assert_eq!(
            ctx.response.header("last-modified"),
            Some(httpdate::fmt_http_date(modified).as_str())
        );
    }
}
