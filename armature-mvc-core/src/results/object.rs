// Object results: negotiated bodies, optionally with a Location header

use super::problem::{ProblemDetails, ValidationProblemDetails};
use super::{ActionResult, ActionResultExecutor};
use crate::formatters::OutputFormatterContext;
use crate::media_type::MediaType;
use crate::url_helper::{UrlActionContext, UrlRouteContext};
use crate::{ActionContext, Error, Result, RouteValues};
use async_trait::async_trait;
use http::StatusCode;
use http::header::{LOCATION, VARY};
use serde_json::Value;

/// How a result finds the URL for its `Location` header.
#[derive(Debug, Clone)]
pub enum LocationSource {
    /// A literal URL; empty means "no Location header"
    Url(String),
    /// Generated from an action, failing when no route matches
    Action(UrlActionContext),
    /// Generated from a route, failing when no route matches
    Route(UrlRouteContext),
}

/// A value formatted by the negotiated output formatter.
///
/// The created/accepted constructors cover `CreatedResult`,
/// `CreatedAtActionResult`, `AcceptedAtRouteResult` and friends: they only
/// differ in status and in where the Location comes from.
#[derive(Debug, Clone)]
pub struct ObjectResult {
    pub value: Value,
    /// Declared type of the value, used by type-sensitive formatters
    pub declared_type: Option<String>,
    /// Explicit content types; wildcards are rejected at execution
    pub content_types: Vec<MediaType>,
    pub status: Option<StatusCode>,
    pub location: Option<LocationSource>,
    kind: &'static str,
}

impl ObjectResult {
    pub fn new(value: Value) -> Self {
        Self {
            value,
            declared_type: None,
            content_types: Vec::new(),
            status: None,
            location: None,
            kind: "ObjectResult",
        }
    }

    fn with_kind(mut self, kind: &'static str, status: StatusCode) -> Self {
        self.kind = kind;
        self.status = Some(status);
        self
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_content_type(mut self, content_type: MediaType) -> Self {
        self.content_types.push(content_type);
        self
    }

    pub fn with_declared_type(mut self, declared_type: impl Into<String>) -> Self {
        self.declared_type = Some(declared_type.into());
        self
    }

    pub fn with_location(mut self, location: LocationSource) -> Self {
        self.location = Some(location);
        self
    }

    pub fn ok(value: Value) -> Self {
        Self::new(value).with_kind("OkObjectResult", StatusCode::OK)
    }

    pub fn bad_request(value: Value) -> Self {
        Self::new(value).with_kind("BadRequestObjectResult", StatusCode::BAD_REQUEST)
    }

    pub fn unauthorized(value: Value) -> Self {
        Self::new(value).with_kind("UnauthorizedObjectResult", StatusCode::UNAUTHORIZED)
    }

    pub fn not_found(value: Value) -> Self {
        Self::new(value).with_kind("NotFoundObjectResult", StatusCode::NOT_FOUND)
    }

    pub fn conflict(value: Value) -> Self {
        Self::new(value).with_kind("ConflictObjectResult", StatusCode::CONFLICT)
    }

    pub fn unprocessable_entity(value: Value) -> Self {
        Self::new(value).with_kind(
            "UnprocessableEntityObjectResult",
            StatusCode::UNPROCESSABLE_ENTITY,
        )
    }

    /// 201 with a literal Location.
    pub fn created(location: impl Into<String>, value: Value) -> Self {
        Self::new(value)
            .with_kind("CreatedResult", StatusCode::CREATED)
            .with_location(LocationSource::Url(location.into()))
    }

    /// 201 with a Location generated for an action.
    pub fn created_at_action(
        action: Option<&str>,
        controller: Option<&str>,
        route_values: Option<RouteValues>,
        value: Value,
    ) -> Self {
        Self::new(value)
            .with_kind("CreatedAtActionResult", StatusCode::CREATED)
            .with_location(LocationSource::Action(action_context(
                action,
                controller,
                route_values,
            )))
    }

    /// 201 with a Location generated for a route.
    pub fn created_at_route(
        route_name: Option<&str>,
        route_values: Option<RouteValues>,
        value: Value,
    ) -> Self {
        Self::new(value)
            .with_kind("CreatedAtRouteResult", StatusCode::CREATED)
            .with_location(LocationSource::Route(route_context(route_name, route_values)))
    }

    /// 202, with a Location when one is given.
    pub fn accepted(location: Option<String>, value: Value) -> Self {
        let result = Self::new(value).with_kind("AcceptedResult", StatusCode::ACCEPTED);
        match location {
            Some(location) => result.with_location(LocationSource::Url(location)),
            None => result,
        }
    }

    /// 202 with a Location generated for an action.
    pub fn accepted_at_action(
        action: Option<&str>,
        controller: Option<&str>,
        route_values: Option<RouteValues>,
        value: Value,
    ) -> Self {
        Self::new(value)
            .with_kind("AcceptedAtActionResult", StatusCode::ACCEPTED)
            .with_location(LocationSource::Action(action_context(
                action,
                controller,
                route_values,
            )))
    }

    /// 202 with a Location generated for a route.
    pub fn accepted_at_route(
        route_name: Option<&str>,
        route_values: Option<RouteValues>,
        value: Value,
    ) -> Self {
        Self::new(value)
            .with_kind("AcceptedAtRouteResult", StatusCode::ACCEPTED)
            .with_location(LocationSource::Route(route_context(route_name, route_values)))
    }

    /// An RFC 7807 body with `application/problem+json`.
    pub fn problem(details: ProblemDetails) -> Self {
        let status = details
            .status
            .and_then(|s| StatusCode::from_u16(s).ok())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        Self::new(details.to_value())
            .with_kind("ProblemObjectResult", status)
            .with_content_type(MediaType::problem_json())
    }

    /// A 400 (by default) validation problem body.
    pub fn validation_problem(details: ValidationProblemDetails) -> Self {
        let status = details
            .problem
            .status
            .and_then(|s| StatusCode::from_u16(s).ok())
            .unwrap_or(StatusCode::BAD_REQUEST);
        Self::new(details.to_value())
            .with_kind("ValidationProblemObjectResult", status)
            .with_content_type(MediaType::problem_json())
    }

    /// Resolve the Location URL without touching the response.
    ///
    /// Fails with `InvalidOperation` when a generated location has no
    /// matching route.
    pub fn resolve_location(&self, context: &ActionContext) -> Result<Option<String>> {
        let url = match &self.location {
            None => return Ok(None),
            Some(LocationSource::Url(url)) if url.is_empty() => return Ok(None),
            Some(LocationSource::Url(url)) => url.clone(),
            Some(LocationSource::Action(target)) => context
                .url_helper()?
                .action(target)
                .filter(|url| !url.is_empty())
                .ok_or_else(Error::no_route_matches)?,
            Some(LocationSource::Route(target)) => context
                .url_helper()?
                .route_url(target)
                .filter(|url| !url.is_empty())
                .ok_or_else(Error::no_route_matches)?,
        };
        Ok(Some(url))
    }
}

fn action_context(
    action: Option<&str>,
    controller: Option<&str>,
    route_values: Option<RouteValues>,
) -> UrlActionContext {
    UrlActionContext {
        action: action.map(str::to_string),
        controller: controller.map(str::to_string),
        values: route_values.unwrap_or_default(),
        ..Default::default()
    }
}

fn route_context(route_name: Option<&str>, route_values: Option<RouteValues>) -> UrlRouteContext {
    UrlRouteContext::new(route_name.map(str::to_string)).values(route_values.unwrap_or_default())
}

#[async_trait]
impl ActionResult for ObjectResult {
    async fn execute(&self, context: &mut ActionContext) -> Result<()> {
        let executor = context.services.object_result_executor.clone();
        executor.execute(context, self).await
    }

    fn name(&self) -> &str {
        self.kind
    }

    fn as_object_result(&self) -> Option<&ObjectResult> {
        Some(self)
    }

    fn as_object_result_mut(&mut self) -> Option<&mut ObjectResult> {
        Some(self)
    }
}

/// Default executor: negotiate a formatter, set the status, write the body.
///
/// The Location URL is generated before anything else so a missing route
/// leaves the response untouched, but the header is only written once a
/// formatter has been selected. When nothing acceptable is found the
/// response becomes 406 with no body.
#[derive(Debug, Clone, Copy, Default)]
pub struct ObjectResultExecutor;

#[async_trait]
impl ActionResultExecutor<ObjectResult> for ObjectResultExecutor {
    async fn execute(&self, context: &mut ActionContext, result: &ObjectResult) -> Result<()> {
        context.ensure_not_aborted()?;
        let location = result.resolve_location(context)?;

        if let Some(wildcard) = result.content_types.iter().find(|ct| ct.has_wildcard()) {
            return Err(Error::Configuration(format!(
                "The content-type '{}' added to the result is invalid. \
                 Media types which match all types or match all subtypes are not supported.",
                wildcard
            )));
        }

        let ActionContext {
            request,
            response,
            services,
            request_aborted,
            ..
        } = context;

        let mut formatter_context =
            OutputFormatterContext::new(request, &services.options, &result.value, request_aborted)
                .with_object_type(result.declared_type.as_deref());

        let selection = services.formatter_selector.select(
            &mut formatter_context,
            &services.formatters,
            &result.content_types,
        )?;

        let Some(selection) = selection else {
            response.status = StatusCode::NOT_ACCEPTABLE;
            return Ok(());
        };

        if let Some(location) = &location {
            response.set_header(LOCATION, location)?;
        }
        if let Some(status) = result.status {
            response.status = status;
        }
        if selection.used_accept_header {
            response.append_header(VARY, "Accept")?;
        }

        selection.formatter.write(&formatter_context, response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::handler_fn;
    use crate::results::ActionOutput;
    use crate::url_helper::RouteTable;
    use crate::{ActionDescriptor, ActionServices, HttpRequest, MvcOptions};
    use serde_json::json;
    use std::sync::Arc;

    fn context_with(request: HttpRequest, services: ActionServices) -> ActionContext {
        let action = ActionDescriptor::new("orders", "create", handler_fn(|_, _| Ok(ActionOutput::Empty)));
        ActionContext::new(request, Arc::new(action), Arc::new(services))
    }

    fn routes() -> ActionServices {
        ActionServices::new().with_url_helper_factory(
            RouteTable::new()
                .default_template("/{controller}/{action}/{id?}")
                .map_route("order", "/orders/{id}")
                .into_factory(),
        )
    }

    #[tokio::test]
    async fn test_ok_object_writes_json() {
        let mut ctx = context_with(HttpRequest::get("/"), ActionServices::new());
        ObjectResult::ok(json!({"id": 1})).execute(&mut ctx).await.unwrap();

        assert_eq!(ctx.response.status, StatusCode::OK);
        assert_eq!(ctx.response.body_json::<Value>().unwrap(), json!({"id": 1}));
        assert!(ctx.response.header("vary").is_none());
    }

    #[tokio::test]
    async fn test_created_sets_location() {
        let mut ctx = context_with(HttpRequest::post("/orders"), ActionServices::new());
        ObjectResult::created("/orders/9", json!({"id": 9}))
            .execute(&mut ctx)
            .await
            .unwrap();

        assert_eq!(ctx.response.status, StatusCode::CREATED);
        assert_eq!(ctx.response.header("location"), Some("/orders/9"));
    }

    #[tokio::test]
    async fn test_created_at_route_overwrites_location() {
        let mut ctx = context_with(HttpRequest::post("/orders"), routes());
        ctx.response.set_header(LOCATION, "/stale").unwrap();

        ObjectResult::created_at_route(
            Some("order"),
            Some(RouteValues::new().with("id", "3")),
            json!({"id": 3}),
        )
        .execute(&mut ctx)
        .await
        .unwrap();

        let locations: Vec<_> = ctx.response.headers.get_all(LOCATION).iter().collect();
        assert_eq!(locations.len(), 1);
        assert_eq!(ctx.response.header("location"), Some("/orders/3"));
    }

    #[tokio::test]
    async fn test_unmatched_route_leaves_response_untouched() {
        let mut ctx = context_with(HttpRequest::post("/orders"), routes());
        let result = ObjectResult::created_at_route(Some("missing"), None, json!({}));

        let err = result.execute(&mut ctx).await.unwrap_err();
        assert!(matches!(err, Error::InvalidOperation(_)));
        assert_eq!(ctx.response.status, StatusCode::OK);
        assert!(ctx.response.headers.is_empty());
        assert!(!ctx.response.has_started());
    }

    #[tokio::test]
    async fn test_accepted_at_action_without_url_helper_is_configuration_error() {
        let mut ctx = context_with(HttpRequest::post("/orders"), ActionServices::new());
        let err = ObjectResult::accepted_at_action(Some("status"), None, None, json!({}))
            .execute(&mut ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[tokio::test]
    async fn test_not_acceptable() {
        let services = ActionServices::new()
            .with_options(MvcOptions::new().return_http_not_acceptable(true));
        let request = HttpRequest::get("/").with_header("Accept", "application/xml");
        let mut ctx = context_with(request, services);

        ObjectResult::ok(json!({"id": 1})).execute(&mut ctx).await.unwrap();
        assert_eq!(ctx.response.status, StatusCode::NOT_ACCEPTABLE);
        assert!(ctx.response.body_bytes().is_empty());
    }

    #[tokio::test]
    async fn test_location_skipped_when_nothing_is_written() {
        let services = ActionServices::new()
            .with_options(MvcOptions::new().return_http_not_acceptable(true));
        let request = HttpRequest::post("/orders").with_header("Accept", "application/xml");
        let mut ctx = context_with(request, services);

        ObjectResult::created("/orders/9", json!({"id": 9}))
            .execute(&mut ctx)
            .await
            .unwrap();
        assert_eq!(ctx.response.status, StatusCode::NOT_ACCEPTABLE);
        assert!(ctx.response.header("location").is_none());

        let mut ctx = context_with(HttpRequest::post("/orders"), ActionServices::new());
        let err = ObjectResult::created("/orders/9", json!({"id": 9}))
            .with_content_type(MediaType::new("application", "*"))
            .execute(&mut ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
        assert!(ctx.response.header("location").is_none());
    }

    #[tokio::test]
    async fn test_accept_negotiation_adds_vary() {
        let request = HttpRequest::get("/").with_header("Accept", "text/json");
        let mut ctx = context_with(request, ActionServices::new());

        ObjectResult::new(json!([1])).execute(&mut ctx).await.unwrap();
        assert_eq!(ctx.response.header("vary"), Some("Accept"));
        assert_eq!(ctx.response.header("content-type"), Some("text/json; charset=utf-8"));
    }

    #[tokio::test]
    async fn test_wildcard_content_type_is_rejected() {
        let mut ctx = context_with(HttpRequest::get("/"), ActionServices::new());
        let err = ObjectResult::new(json!(1))
            .with_content_type(MediaType::new("application", "*"))
            .execute(&mut ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[tokio::test]
    async fn test_problem_result() {
        let mut ctx = context_with(HttpRequest::get("/"), ActionServices::new());
        let details = ProblemDetails::for_status(StatusCode::CONFLICT).with_detail("version mismatch");
        ObjectResult::problem(details).execute(&mut ctx).await.unwrap();

        assert_eq!(ctx.response.status, StatusCode::CONFLICT);
        assert_eq!(
            ctx.response.header("content-type"),
            Some("application/problem+json; charset=utf-8")
        );
        let body: Value = ctx.response.body_json().unwrap();
        assert_eq!(body["status"], 409);
        assert_eq!(body["detail"], "version mismatch");
    }

    #[tokio::test]
    async fn test_null_value_becomes_no_content() {
        let mut ctx = context_with(HttpRequest::get("/"), ActionServices::new());
        ObjectResult::new(Value::Null).execute(&mut ctx).await.unwrap();
        assert_eq!(ctx.response.status, StatusCode::NO_CONTENT);
    }
}
