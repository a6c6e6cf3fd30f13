// Mock filters and collaborators for pipeline tests

use armature_mvc_core::authentication::{AuthenticationProperties, AuthenticationService, Principal};
use armature_mvc_core::filters::{
    ActionExecutedContext, ActionExecutingContext, ActionFilter, ActionNext,
    AsyncActionFilter, AsyncAuthorizationFilter, AsyncExceptionFilter, AsyncResourceFilter,
    AsyncResultFilter, AuthorizationFilter, AuthorizationFilterContext, ExceptionContext,
    ExceptionFilter, FilterMetadata, FilterOutcome, PolicyKind, ResourceExecutedContext,
    ResourceExecutingContext, ResourceFilter, ResourceNext, ResultExecutedContext,
    ResultExecutingContext, ResultFilter, ResultNext,
};
use armature_mvc_core::results::{ObjectResult, ProblemDetails, StatusCodeResult};
use armature_mvc_core::url_helper::{UrlActionContext, UrlHelper, UrlHelperFactory, UrlRouteContext};
use armature_mvc_core::{ActionContext, Error, Result};
use async_trait::async_trait;
use http::StatusCode;
use std::sync::{Arc, Mutex};

/// Shared, ordered record of `"<filter>:<hook>"` entries.
#[derive(Clone, Default)]
pub struct HookLog {
    entries: Arc<Mutex<Vec<String>>>,
}

impl HookLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, entry: impl Into<String>) {
        self.entries.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().unwrap().clone()
    }

    /// Entries recorded by `filter`, with the filter prefix stripped.
    pub fn hooks_of(&self, filter: &str) -> Vec<String> {
        let prefix = format!("{}:", filter);
        self.entries
            .lock()
            .unwrap()
            .iter()
            .filter_map(|e| e.strip_prefix(&prefix).map(str::to_string))
            .collect()
    }

    pub fn contains(&self, entry: &str) -> bool {
        self.entries.lock().unwrap().iter().any(|e| e == entry)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().unwrap().is_empty()
    }

    pub fn clear(&self) {
        self.entries.lock().unwrap().clear();
    }
}

/// Filter stage a [`RecordingFilter`] takes part in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Authorization,
    Resource,
    Action,
    Exception,
    Result,
}

const ALL_STAGES: [Stage; 5] = [
    Stage::Authorization,
    Stage::Resource,
    Stage::Action,
    Stage::Exception,
    Stage::Result,
];

/// A filter that records every hook it sees into a [`HookLog`].
///
/// By default it joins all five stages with the synchronous hooks and never
/// short-circuits.
///
/// ```
/// use armature_mvc_testing::{HookLog, RecordingFilter, Stage};
/// use http::StatusCode;
///
/// let log = HookLog::new();
/// let guard = RecordingFilter::new("guard", &log)
///     .only(&[Stage::Resource])
///     .short_circuit_at(Stage::Resource, StatusCode::FORBIDDEN);
/// ```
#[derive(Clone)]
pub struct RecordingFilter {
    name: String,
    log: HookLog,
    stages: Vec<Stage>,
    short_circuit: Option<(Stage, StatusCode)>,
    fails_at: Option<Stage>,
    handles_exceptions: Option<StatusCode>,
    order: i32,
    policy: Option<PolicyKind>,
    always_run: bool,
    asynchronous: bool,
}

impl RecordingFilter {
    pub fn new(name: impl Into<String>, log: &HookLog) -> Self {
        Self {
            name: name.into(),
            log: log.clone(),
            stages: ALL_STAGES.to_vec(),
            short_circuit: None,
            fails_at: None,
            handles_exceptions: None,
            order: 0,
            policy: None,
            always_run: false,
            asynchronous: false,
        }
    }

    /// Restrict participation to `stages`.
    pub fn only(mut self, stages: &[Stage]) -> Self {
        self.stages = stages.to_vec();
        self
    }

    /// Answer with `status` from the executing hook of `stage`.
    pub fn short_circuit_at(mut self, stage: Stage, status: StatusCode) -> Self {
        self.short_circuit = Some((stage, status));
        self
    }

    /// Fail the executing hook of `stage` with
    /// `Error::InvalidOperation("<name> failed")`.
    pub fn fails_at(mut self, stage: Stage) -> Self {
        self.fails_at = Some(stage);
        self
    }

    /// Handle exceptions with a problem response carrying `status`.
    pub fn handles_exceptions(mut self, status: StatusCode) -> Self {
        self.handles_exceptions = Some(status);
        self
    }

    pub fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    pub fn with_policy(mut self, policy: PolicyKind) -> Self {
        self.policy = Some(policy);
        self
    }

    pub fn always_run(mut self) -> Self {
        self.always_run = true;
        self
    }

    /// Use the `next`-continuation flavour of every stage.
    pub fn asynchronous(mut self) -> Self {
        self.asynchronous = true;
        self
    }

    fn joins(&self, stage: Stage) -> bool {
        self.stages.contains(&stage)
    }

    fn sync_in(&self, stage: Stage) -> bool {
        self.joins(stage) && !self.asynchronous
    }

    fn async_in(&self, stage: Stage) -> bool {
        self.joins(stage) && self.asynchronous
    }

    fn record(&self, hook: &str) {
        self.log.record(format!("{}:{}", self.name, hook));
    }

    /// Executed hooks note `(canceled)` or `(exception)` after the hook name.
    fn record_executed(&self, hook: &str, canceled: bool, exception: bool) {
        if canceled {
            self.record(&format!("{}(canceled)", hook));
        } else if exception {
            self.record(&format!("{}(exception)", hook));
        } else {
            self.record(hook);
        }
    }

    fn check(&self, stage: Stage) -> Result<()> {
        if self.fails_at == Some(stage) {
            return Err(Error::InvalidOperation(format!("{} failed", self.name)));
        }
        Ok(())
    }

    fn short_circuit_status(&self, stage: Stage) -> Option<StatusCode> {
        match self.short_circuit {
            Some((at, status)) if at == stage => Some(status),
            _ => None,
        }
    }

    fn outcome(&self, stage: Stage) -> Result<FilterOutcome> {
        self.check(stage)?;
        Ok(match self.short_circuit_status(stage) {
            Some(status) => FilterOutcome::short_circuit(StatusCodeResult::new(status)),
            None => FilterOutcome::Continue,
        })
    }

    fn on_exception_inner(&self, context: &mut ExceptionContext<'_>) {
        self.record("OnException");
        let Some(status) = self.handles_exceptions else {
            return;
        };
        let detail = context
            .exception
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_default();
        context.handle_with(ObjectResult::problem(
            ProblemDetails::for_status(status).with_detail(detail),
        ));
    }
}

impl AuthorizationFilter for RecordingFilter {
    fn on_authorization(&self, _context: &mut AuthorizationFilterContext<'_>) -> Result<FilterOutcome> {
        self.record("OnAuthorization");
        self.outcome(Stage::Authorization)
    }
}

#[async_trait]
impl AsyncAuthorizationFilter for RecordingFilter {
    async fn on_authorization_async(&self, context: &mut AuthorizationFilterContext<'_>) -> Result<FilterOutcome> {
        self.on_authorization(context)
    }
}

impl ResourceFilter for RecordingFilter {
    fn on_resource_executing(&self, _context: &mut ResourceExecutingContext<'_>) -> Result<FilterOutcome> {
        self.record("OnResourceExecuting");
        self.outcome(Stage::Resource)
    }

    fn on_resource_executed(&self, context: &mut ResourceExecutedContext, _action_context: &mut ActionContext) -> Result<()> {
        self.record_executed("OnResourceExecuted", context.canceled, context.exception.is_some());
        Ok(())
    }
}

#[async_trait]
impl AsyncResourceFilter for RecordingFilter {
    async fn on_resource_execution(
        &self,
        context: &mut ResourceExecutingContext<'_>,
        next: ResourceNext<'_>,
    ) -> Result<ResourceExecutedContext> {
        self.record("OnResourceExecuting");
        self.check(Stage::Resource)?;
        if let Some(status) = self.short_circuit_status(Stage::Resource) {
            return Ok(ResourceExecutedContext::short_circuited(StatusCodeResult::new(status)));
        }
        let executed = next.run(context).await;
        self.record_executed("OnResourceExecuted", executed.canceled, executed.exception.is_some());
        Ok(executed)
    }
}

impl ActionFilter for RecordingFilter {
    fn on_action_executing(&self, _context: &mut ActionExecutingContext<'_>) -> Result<FilterOutcome> {
        self.record("OnActionExecuting");
        self.outcome(Stage::Action)
    }

    fn on_action_executed(&self, context: &mut ActionExecutedContext, _action_context: &mut ActionContext) -> Result<()> {
        self.record_executed("OnActionExecuted", context.canceled, context.exception.is_some());
        Ok(())
    }
}

#[async_trait]
impl AsyncActionFilter for RecordingFilter {
    async fn on_action_execution(
        &self,
        context: &mut ActionExecutingContext<'_>,
        next: ActionNext<'_>,
    ) -> Result<ActionExecutedContext> {
        self.record("OnActionExecuting");
        self.check(Stage::Action)?;
        if let Some(status) = self.short_circuit_status(Stage::Action) {
            return Ok(ActionExecutedContext::short_circuited(StatusCodeResult::new(status)));
        }
        let executed = next.run(context).await;
        self.record_executed("OnActionExecuted", executed.canceled, executed.exception.is_some());
        Ok(executed)
    }
}

impl ExceptionFilter for RecordingFilter {
    fn on_exception(&self, context: &mut ExceptionContext<'_>) -> Result<()> {
        self.on_exception_inner(context);
        Ok(())
    }
}

#[async_trait]
impl AsyncExceptionFilter for RecordingFilter {
    async fn on_exception_async(&self, context: &mut ExceptionContext<'_>) -> Result<()> {
        self.on_exception_inner(context);
        Ok(())
    }
}

impl ResultFilter for RecordingFilter {
    fn on_result_executing(&self, _context: &mut ResultExecutingContext<'_>) -> Result<FilterOutcome> {
        self.record("OnResultExecuting");
        self.outcome(Stage::Result)
    }

    fn on_result_executed(&self, context: &mut ResultExecutedContext, _action_context: &mut ActionContext) -> Result<()> {
        self.record_executed("OnResultExecuted", context.canceled, context.exception.is_some());
        Ok(())
    }
}

#[async_trait]
impl AsyncResultFilter for RecordingFilter {
    async fn on_result_execution(
        &self,
        context: &mut ResultExecutingContext<'_>,
        next: ResultNext<'_>,
    ) -> Result<ResultExecutedContext> {
        self.record("OnResultExecuting");
        self.check(Stage::Result)?;
        let substituted = self.short_circuit_status(Stage::Result);
        if let Some(status) = substituted {
            context.result = Box::new(StatusCodeResult::new(status));
        }
        let mut executed = next.run(context).await;
        executed.canceled |= substituted.is_some();
        self.record_executed("OnResultExecuted", executed.canceled, executed.exception.is_some());
        Ok(executed)
    }
}

impl FilterMetadata for RecordingFilter {
    fn name(&self) -> &str {
        &self.name
    }

    fn order(&self) -> i32 {
        self.order
    }

    fn policy(&self) -> Option<PolicyKind> {
        self.policy
    }

    fn is_always_run_result_filter(&self) -> bool {
        self.always_run
    }

    fn as_authorization_filter(&self) -> Option<&dyn AuthorizationFilter> {
        self.sync_in(Stage::Authorization).then_some(self as &dyn AuthorizationFilter)
    }

    fn as_async_authorization_filter(&self) -> Option<&dyn AsyncAuthorizationFilter> {
        self.async_in(Stage::Authorization).then_some(self as &dyn AsyncAuthorizationFilter)
    }

    fn as_resource_filter(&self) -> Option<&dyn ResourceFilter> {
        self.sync_in(Stage::Resource).then_some(self as &dyn ResourceFilter)
    }

    fn as_async_resource_filter(&self) -> Option<&dyn AsyncResourceFilter> {
        self.async_in(Stage::Resource).then_some(self as &dyn AsyncResourceFilter)
    }

    fn as_action_filter(&self) -> Option<&dyn ActionFilter> {
        self.sync_in(Stage::Action).then_some(self as &dyn ActionFilter)
    }

    fn as_async_action_filter(&self) -> Option<&dyn AsyncActionFilter> {
        self.async_in(Stage::Action).then_some(self as &dyn AsyncActionFilter)
    }

    fn as_exception_filter(&self) -> Option<&dyn ExceptionFilter> {
        self.sync_in(Stage::Exception).then_some(self as &dyn ExceptionFilter)
    }

    fn as_async_exception_filter(&self) -> Option<&dyn AsyncExceptionFilter> {
        self.async_in(Stage::Exception).then_some(self as &dyn AsyncExceptionFilter)
    }

    fn as_result_filter(&self) -> Option<&dyn ResultFilter> {
        self.sync_in(Stage::Result).then_some(self as &dyn ResultFilter)
    }

    fn as_async_result_filter(&self) -> Option<&dyn AsyncResultFilter> {
        self.async_in(Stage::Result).then_some(self as &dyn AsyncResultFilter)
    }
}

// ============================================================================
// Collaborators
// ============================================================================

/// Authentication service that records calls as `"<operation>:<scheme>"`
/// (`default` when no scheme is named). Challenge answers 401 and forbid
/// answers 403.
#[derive(Clone, Default)]
pub struct RecordingAuthenticationService {
    calls: Arc<Mutex<Vec<String>>>,
}

impl RecordingAuthenticationService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, operation: &str, scheme: Option<&str>) {
        self.calls
            .lock()
            .unwrap()
            .push(format!("{}:{}", operation, scheme.unwrap_or("default")));
    }
}

#[async_trait]
impl AuthenticationService for RecordingAuthenticationService {
    async fn challenge(
        &self,
        context: &mut ActionContext,
        scheme: Option<&str>,
        _properties: Option<&AuthenticationProperties>,
    ) -> Result<()> {
        self.record("challenge", scheme);
        context.response.status = StatusCode::UNAUTHORIZED;
        Ok(())
    }

    async fn forbid(
        &self,
        context: &mut ActionContext,
        scheme: Option<&str>,
        _properties: Option<&AuthenticationProperties>,
    ) -> Result<()> {
        self.record("forbid", scheme);
        context.response.status = StatusCode::FORBIDDEN;
        Ok(())
    }

    async fn sign_in(
        &self,
        _context: &mut ActionContext,
        scheme: Option<&str>,
        _principal: &Principal,
        _properties: Option<&AuthenticationProperties>,
    ) -> Result<()> {
        self.record("sign_in", scheme);
        Ok(())
    }

    async fn sign_out(
        &self,
        _context: &mut ActionContext,
        scheme: Option<&str>,
        _properties: Option<&AuthenticationProperties>,
    ) -> Result<()> {
        self.record("sign_out", scheme);
        Ok(())
    }
}

/// URL helper that answers every action and route lookup with one fixed URL,
/// or with nothing.
#[derive(Debug, Clone, Default)]
pub struct StaticUrlHelper {
    url: Option<String>,
}

impl StaticUrlHelper {
    pub fn new(url: Option<&str>) -> Self {
        Self {
            url: url.map(str::to_string),
        }
    }
}

impl UrlHelper for StaticUrlHelper {
    fn action(&self, _context: &UrlActionContext) -> Option<String> {
        self.url.clone()
    }

    fn route_url(&self, _context: &UrlRouteContext) -> Option<String> {
        self.url.clone()
    }
}

/// Hands out a shared [`StaticUrlHelper`].
#[derive(Clone)]
pub struct StaticUrlHelperFactory {
    helper: Arc<StaticUrlHelper>,
}

impl StaticUrlHelperFactory {
    pub fn new(url: Option<&str>) -> Self {
        Self {
            helper: Arc::new(StaticUrlHelper::new(url)),
        }
    }
}

impl UrlHelperFactory for StaticUrlHelperFactory {
    fn get_url_helper(&self, _context: &ActionContext) -> Arc<dyn UrlHelper> {
        self.helper.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hook_log() {
        let log = HookLog::new();
        log.record("a:OnAuthorization");
        log.record("b:OnAuthorization");
        log.record("a:OnResourceExecuting");

        assert_eq!(log.len(), 3);
        assert_eq!(log.hooks_of("a"), vec!["OnAuthorization", "OnResourceExecuting"]);
        assert!(log.contains("b:OnAuthorization"));
        log.clear();
        assert!(log.is_empty());
    }

    #[test]
    fn test_stage_participation() {
        let log = HookLog::new();
        let filter = RecordingFilter::new("f", &log).only(&[Stage::Action]);
        assert!(filter.as_action_filter().is_some());
        assert!(filter.as_async_action_filter().is_none());
        assert!(filter.as_resource_filter().is_none());

        let filter = filter.asynchronous();
        assert!(filter.as_action_filter().is_none());
        assert!(filter.as_async_action_filter().is_some());
    }

    #[test]
    fn test_static_url_helper() {
        let helper = StaticUrlHelper::new(Some("testAction"));
        assert_eq!(helper.action(&UrlActionContext::new()).as_deref(), Some("testAction"));
        assert_eq!(StaticUrlHelper::new(None).route_url(&UrlRouteContext::new(None)), None);
    }
}
