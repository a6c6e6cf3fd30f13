// Per-request action context and the action descriptor it runs against

use crate::authentication::{AuthenticationService, Principal};
use crate::binding::ParameterDescriptor;
use crate::filters::{FilterDescriptor, FilterMetadata, FilterScope};
use crate::results::ActionOutput;
use crate::services::ActionServices;
use crate::url_helper::UrlHelper;
use crate::{Error, HttpRequest, HttpResponse, MvcOptions, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Route values such as `controller`, `action` and `id`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteValues(BTreeMap<String, String>);

impl RouteValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.0.remove(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RouteValues {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Validation errors collected during model binding, keyed by field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelState {
    errors: BTreeMap<String, Vec<String>>,
}

impl ModelState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, key: impl Into<String>, message: impl Into<String>) {
        self.errors
            .entry(key.into())
            .or_default()
            .push(message.into());
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn error_count(&self) -> usize {
        self.errors.values().map(Vec::len).sum()
    }

    pub fn errors(&self) -> &BTreeMap<String, Vec<String>> {
        &self.errors
    }

    pub fn clear(&mut self) {
        self.errors.clear();
    }
}

/// Server features a filter may adjust before the body is consumed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpFeatures {
    /// `None` disables the limit.
    pub max_request_body_size: Option<u64>,
}

/// Bound action arguments by parameter name.
pub type Arguments = BTreeMap<String, serde_json::Value>;

/// The controller method behind an action.
#[async_trait]
pub trait ActionHandler: Send + Sync {
    async fn invoke(&self, context: &mut ActionContext, arguments: &Arguments)
    -> Result<ActionOutput>;
}

/// Wraps a synchronous closure as an [`ActionHandler`].
pub struct FnHandler<F>(F);

#[async_trait]
impl<F> ActionHandler for FnHandler<F>
where
    F: Fn(&mut ActionContext, &Arguments) -> Result<ActionOutput> + Send + Sync,
{
    async fn invoke(
        &self,
        context: &mut ActionContext,
        arguments: &Arguments,
    ) -> Result<ActionOutput> {
        (self.0)(context, arguments)
    }
}

/// Build a handler from a closure.
pub fn handler_fn<F>(f: F) -> FnHandler<F>
where
    F: Fn(&mut ActionContext, &Arguments) -> Result<ActionOutput> + Send + Sync,
{
    FnHandler(f)
}

/// Everything known about an action before any request arrives.
///
/// Descriptors are built once at startup and shared across requests.
pub struct ActionDescriptor {
    pub id: String,
    pub controller_name: String,
    pub action_name: String,
    pub display_name: String,
    pub route_values: RouteValues,
    /// Controller- and action-scoped filters; global filters live on the
    /// application.
    pub filters: Vec<FilterDescriptor>,
    pub handler: Arc<dyn ActionHandler>,
    pub parameters: Vec<ParameterDescriptor>,
}

impl ActionDescriptor {
    pub fn new(
        controller: impl Into<String>,
        action: impl Into<String>,
        handler: impl ActionHandler + 'static,
    ) -> Self {
        let controller_name = controller.into();
        let action_name = action.into();
        let route_values = RouteValues::new()
            .with("controller", controller_name.clone())
            .with("action", action_name.clone());

        Self {
            id: uuid::Uuid::new_v4().to_string(),
            display_name: format!("{}.{}", controller_name, action_name),
            controller_name,
            action_name,
            route_values,
            filters: Vec::new(),
            handler: Arc::new(handler),
            parameters: Vec::new(),
        }
    }

    /// Attach a filter declared on the controller.
    pub fn with_controller_filter(mut self, filter: impl FilterMetadata) -> Self {
        self.filters
            .push(FilterDescriptor::new(filter, FilterScope::Controller));
        self
    }

    /// Attach a filter declared on the action method.
    pub fn with_filter(mut self, filter: impl FilterMetadata) -> Self {
        self.filters
            .push(FilterDescriptor::new(filter, FilterScope::Action));
        self
    }

    pub fn with_filter_descriptor(mut self, descriptor: FilterDescriptor) -> Self {
        self.filters.push(descriptor);
        self
    }

    pub fn with_parameter(mut self, parameter: ParameterDescriptor) -> Self {
        self.parameters.push(parameter);
        self
    }

    pub fn with_route_value(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.route_values.insert(key, value);
        self
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }
}

impl fmt::Debug for ActionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionDescriptor")
            .field("id", &self.id)
            .field("display_name", &self.display_name)
            .field("route_values", &self.route_values)
            .field("filters", &self.filters.len())
            .field("parameters", &self.parameters)
            .finish()
    }
}

/// Per-request state threaded through every filter and result.
pub struct ActionContext {
    pub request: HttpRequest,
    pub response: HttpResponse,
    pub route_values: RouteValues,
    pub action: Arc<ActionDescriptor>,
    pub model_state: ModelState,
    pub user: Option<Principal>,
    pub trace_identifier: String,
    pub request_aborted: CancellationToken,
    pub services: Arc<ActionServices>,
    pub features: HttpFeatures,
}

impl ActionContext {
    pub fn new(
        request: HttpRequest,
        action: Arc<ActionDescriptor>,
        services: Arc<ActionServices>,
    ) -> Self {
        let mut route_values = action.route_values.clone();
        for (key, value) in &request.path_params {
            route_values.insert(key.clone(), value.clone());
        }

        let features = HttpFeatures {
            max_request_body_size: services.options.max_request_body_size,
        };

        Self {
            request,
            response: HttpResponse::new(),
            route_values,
            action,
            model_state: ModelState::new(),
            user: None,
            trace_identifier: uuid::Uuid::new_v4().to_string(),
            request_aborted: CancellationToken::new(),
            services,
            features,
        }
    }

    pub fn with_user(mut self, user: Option<Principal>) -> Self {
        self.user = user;
        self
    }

    pub fn with_abort_token(mut self, token: CancellationToken) -> Self {
        self.request_aborted = token;
        self
    }

    pub fn options(&self) -> &MvcOptions {
        &self.services.options
    }

    /// Fail with [`Error::RequestAborted`] once the client has gone away.
    pub fn ensure_not_aborted(&self) -> Result<()> {
        if self.request_aborted.is_cancelled() {
            Err(Error::RequestAborted)
        } else {
            Ok(())
        }
    }

    /// Fail with [`Error::PayloadTooLarge`] when the request body exceeds
    /// `features.max_request_body_size`.
    pub fn ensure_body_within_limit(&self) -> Result<()> {
        let Some(limit) = self.features.max_request_body_size else {
            return Ok(());
        };
        let length = self.request.content_length();
        if length > limit {
            return Err(Error::PayloadTooLarge(format!(
                "Request body of {} bytes exceeds the {} byte limit",
                length, limit
            )));
        }
        Ok(())
    }

    /// A URL helper bound to this request.
    pub fn url_helper(&self) -> Result<Arc<dyn UrlHelper>> {
        let factory = self.services.url_helper_factory()?;
        Ok(factory.get_url_helper(self))
    }

    pub fn authentication(&self) -> Result<Arc<dyn AuthenticationService>> {
        self.services.authentication().cloned()
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.as_ref().is_some_and(Principal::is_authenticated)
    }
}

impl fmt::Debug for ActionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionContext")
            .field("action", &self.action.display_name)
            .field("trace_identifier", &self.trace_identifier)
            .field("route_values", &self.route_values)
            .field("status", &self.response.status)
            .finish()
    }
}
