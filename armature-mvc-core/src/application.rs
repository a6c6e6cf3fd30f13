// Host entry point: global filters, shared services and the filter cache

use crate::authentication::Principal;
use crate::filters::{FilterCache, FilterDescriptor, FilterMetadata, FilterScope};
use crate::invoker::ActionInvoker;
use crate::{ActionContext, ActionDescriptor, ActionServices, HttpRequest, HttpResponse, Result};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Dispatches requests to actions through the filter pipeline.
///
/// Routing happens outside; the host hands over the matched action and the
/// request and gets the finished response back. Filter lists are ordered
/// once per action and cached.
///
/// ```no_run
/// use armature_mvc_core::{ActionDescriptor, HttpRequest, MvcApplication, handler_fn};
/// use armature_mvc_core::filters::builtin::ProblemDetailsExceptionFilter;
/// use armature_mvc_core::results::ActionOutput;
/// use std::sync::Arc;
///
/// # async fn run() -> armature_mvc_core::Result<()> {
/// let app = MvcApplication::default().with_global_filter(ProblemDetailsExceptionFilter::new());
/// let action = Arc::new(ActionDescriptor::new(
///     "health",
///     "get",
///     handler_fn(|_, _| Ok(ActionOutput::Value(serde_json::json!({"status": "up"})))),
/// ));
///
/// let response = app.handle(&action, HttpRequest::get("/health"), None).await?;
/// assert_eq!(response.status, 200);
/// # Ok(())
/// # }
/// ```
pub struct MvcApplication {
    services: Arc<ActionServices>,
    global_filters: Vec<FilterDescriptor>,
    cache: FilterCache,
}

impl MvcApplication {
    pub fn new(services: ActionServices) -> Self {
        Self {
            services: Arc::new(services),
            global_filters: Vec::new(),
            cache: FilterCache::new(),
        }
    }

    /// Register a filter that applies to every action.
    pub fn with_global_filter(self, filter: impl FilterMetadata) -> Self {
        self.with_global_filter_descriptor(FilterDescriptor::new(filter, FilterScope::Global))
    }

    pub fn with_global_filter_descriptor(mut self, descriptor: FilterDescriptor) -> Self {
        self.global_filters.push(descriptor);
        self
    }

    pub fn services(&self) -> &Arc<ActionServices> {
        &self.services
    }

    pub fn global_filters(&self) -> &[FilterDescriptor] {
        &self.global_filters
    }

    pub fn filter_cache(&self) -> &FilterCache {
        &self.cache
    }

    /// Run `action` for `request` and return the response.
    ///
    /// An `Err` is an exception no filter handled; the host decides how to
    /// answer it.
    pub async fn handle(
        &self,
        action: &Arc<ActionDescriptor>,
        request: HttpRequest,
        user: Option<Principal>,
    ) -> Result<HttpResponse> {
        self.handle_with_token(action, request, user, CancellationToken::new())
            .await
    }

    /// Like [`handle`](Self::handle), aborting once `aborted` is cancelled.
    pub async fn handle_with_token(
        &self,
        action: &Arc<ActionDescriptor>,
        request: HttpRequest,
        user: Option<Principal>,
        aborted: CancellationToken,
    ) -> Result<HttpResponse> {
        let plan = self
            .cache
            .get_filters(action, &self.global_filters, &self.services)?;

        let mut context = ActionContext::new(request, action.clone(), self.services.clone())
            .with_user(user)
            .with_abort_token(aborted);

        ActionInvoker::new(action.clone(), plan)
            .invoke(&mut context)
            .await?;
        Ok(context.response)
    }
}

impl Default for MvcApplication {
    fn default() -> Self {
        Self::new(ActionServices::new())
    }
}
