// Result factories for controllers

use crate::authentication::{AuthenticationProperties, Principal};
use crate::media_type::MediaType;
use crate::results::{
    ActionResult, ChallengeResult, ContentResult, FileResult, ForbidResult, LocalRedirectResult, ObjectResult,
    ProblemDetails, RedirectResult, RedirectToActionResult, RedirectToRouteResult, SignInResult,
    SignOutResult, StatusCodeResult, ValidationProblemDetails,
};
use crate::{Error, ModelState, Result, RouteValues};
use bytes::Bytes;
use http::StatusCode;
use serde::Serialize;
use serde_json::Value;
use std::path::PathBuf;

fn media_type(raw: &str) -> Result<MediaType> {
    MediaType::parse(raw)
        .ok_or_else(|| Error::Configuration(format!("'{}' is not a valid media type.", raw)))
}

/// Shorthand constructors for the results an action usually returns.
///
/// Every method has a default body, so a controller only needs
/// `impl ControllerBase for OrdersController {}`.
///
/// ```
/// use armature_mvc_core::controller::ControllerBase;
/// use http::StatusCode;
///
/// struct OrdersController;
/// impl ControllerBase for OrdersController {}
///
/// let result = OrdersController.created("/orders/7", serde_json::json!({"id": 7}));
/// assert_eq!(result.status, Some(StatusCode::CREATED));
/// ```
pub trait ControllerBase: Send + Sync + 'static {
    fn ok(&self) -> StatusCodeResult {
        StatusCodeResult::ok()
    }

    fn ok_object<T: Serialize>(&self, value: &T) -> Result<ObjectResult> {
        Ok(ObjectResult::ok(serde_json::to_value(value)?))
    }

    fn created(&self, location: impl Into<String>, value: Value) -> ObjectResult {
        ObjectResult::created(location, value)
    }

    fn created_at_action(
        &self,
        action: Option<&str>,
        controller: Option<&str>,
        route_values: Option<RouteValues>,
        value: Value,
    ) -> ObjectResult {
        ObjectResult::created_at_action(action, controller, route_values, value)
    }

    fn created_at_route(&self, route_name: Option<&str>, route_values: Option<RouteValues>, value: Value) -> ObjectResult {
        ObjectResult::created_at_route(route_name, route_values, value)
    }

    fn accepted(&self, location: Option<String>, value: Value) -> ObjectResult {
        ObjectResult::accepted(location, value)
    }

    fn accepted_at_action(
        &self,
        action: Option<&str>,
        controller: Option<&str>,
        route_values: Option<RouteValues>,
        value: Value,
    ) -> ObjectResult {
        ObjectResult::accepted_at_action(action, controller, route_values, value)
    }

    fn accepted_at_route(&self, route_name: Option<&str>, route_values: Option<RouteValues>, value: Value) -> ObjectResult {
        ObjectResult::accepted_at_route(route_name, route_values, value)
    }

    fn no_content(&self) -> StatusCodeResult {
        StatusCodeResult::no_content()
    }

    fn not_found(&self, value: Option<Value>) -> Box<dyn ActionResult> {
        match value {
            Some(value) => Box::new(ObjectResult::not_found(value)),
            None => Box::new(StatusCodeResult::not_found()),
        }
    }

    fn bad_request(&self, value: Option<Value>) -> Box<dyn ActionResult> {
        match value {
            Some(value) => Box::new(ObjectResult::bad_request(value)),
            None => Box::new(StatusCodeResult::bad_request()),
        }
    }

    fn conflict(&self, value: Option<Value>) -> Box<dyn ActionResult> {
        match value {
            Some(value) => Box::new(ObjectResult::conflict(value)),
            None => Box::new(StatusCodeResult::conflict()),
        }
    }

    fn unprocessable_entity(&self, value: Option<Value>) -> Box<dyn ActionResult> {
        match value {
            Some(value) => Box::new(ObjectResult::unprocessable_entity(value)),
            None => Box::new(StatusCodeResult::unprocessable_entity()),
        }
    }

    /// A problem response; status defaults to 500.
    fn problem(&self, detail: Option<&str>, status: Option<StatusCode>, title: Option<&str>) -> ObjectResult {
        let mut details = ProblemDetails::for_status(status.unwrap_or(StatusCode::INTERNAL_SERVER_ERROR));
        if let Some(detail) = detail {
            details = details.with_detail(detail);
        }
        if let Some(title) = title {
            details = details.with_title(title);
        }
        ObjectResult::problem(details)
    }

    fn validation_problem(&self, model_state: &ModelState) -> ObjectResult {
        ObjectResult::validation_problem(ValidationProblemDetails::from_model_state(model_state))
    }

    fn redirect(&self, url: impl Into<String>) -> Result<RedirectResult> {
        RedirectResult::new(url)
    }

    fn redirect_permanent(&self, url: impl Into<String>) -> Result<RedirectResult> {
        Ok(RedirectResult::new(url)?.permanent(true))
    }

    fn local_redirect(&self, url: impl Into<String>) -> Result<LocalRedirectResult> {
        LocalRedirectResult::new(url)
    }

    fn redirect_to_action(
        &self,
        action: Option<&str>,
        controller: Option<&str>,
        route_values: Option<RouteValues>,
    ) -> RedirectToActionResult {
        RedirectToActionResult::new(action, controller, route_values)
    }

    fn redirect_to_route(&self, route_name: Option<&str>, route_values: Option<RouteValues>) -> RedirectToRouteResult {
        RedirectToRouteResult::new(route_name, route_values)
    }

    fn file(&self, content: impl Into<Bytes>, content_type: &str) -> Result<FileResult> {
        Ok(FileResult::from_bytes(content, media_type(content_type)?))
    }

    fn physical_file(&self, path: impl Into<PathBuf>, content_type: &str) -> Result<FileResult> {
        Ok(FileResult::physical(path, media_type(content_type)?))
    }

    fn challenge(&self, schemes: &[&str]) -> Result<ChallengeResult> {
        ChallengeResult::with_schemes(schemes.iter().copied())
    }

    fn forbid(&self, schemes: &[&str]) -> Result<ForbidResult> {
        ForbidResult::with_schemes(schemes.iter().copied())
    }

    fn sign_in(&self, principal: Principal, scheme: Option<&str>) -> SignInResult {
        let result = SignInResult::new(principal);
        match scheme {
            Some(scheme) => result.with_scheme(scheme),
            None => result,
        }
    }

    fn sign_out(&self, schemes: &[&str], properties: Option<AuthenticationProperties>) -> Result<SignOutResult> {
        let result = SignOutResult::with_schemes(schemes.iter().copied())?;
        Ok(match properties {
            Some(properties) => result.with_properties(properties),
            None => result,
        })
    }

    fn status_code(&self, status: StatusCode) -> StatusCodeResult {
        StatusCodeResult::new(status)
    }

    fn content(&self, content: impl Into<String>, content_type: Option<&str>) -> Result<ContentResult> {
        let result = ContentResult::new(content);
        Ok(match content_type {
            Some(raw) => result.with_content_type(media_type(raw)?),
            None => result,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Orders;
    impl ControllerBase for Orders {}

    #[test]
    fn test_object_helpers() {
        let result = Orders.ok_object(&serde_json::json!({"id": 1})).unwrap();
        assert_eq!(result.status, Some(StatusCode::OK));

        let result = Orders.accepted_at_action(Some("testAction"), None, None, serde_json::json!({}));
        assert_eq!(result.status, Some(StatusCode::ACCEPTED));
        assert!(result.location.is_some());
    }

    #[test]
    fn test_optional_bodies() {
        assert_eq!(Orders.not_found(None).name(), "StatusCodeResult");
        assert_eq!(Orders.not_found(Some(serde_json::json!("gone"))).name(), "NotFoundObjectResult");
        assert_eq!(Orders.conflict(None).name(), "StatusCodeResult");
    }

    #[test]
    fn test_problem_defaults() {
        let result = Orders.problem(Some("boom"), None, None);
        assert_eq!(result.status, Some(StatusCode::INTERNAL_SERVER_ERROR));
        assert_eq!(result.value["detail"], "boom");

        let mut state = ModelState::new();
        state.add_error("name", "required");
        assert_eq!(Orders.validation_problem(&state).status, Some(StatusCode::BAD_REQUEST));
    }

    #[test]
    fn test_redirect_helpers() {
        assert!(Orders.redirect("").is_err());
        assert!(Orders.redirect_permanent("/home").unwrap().permanent);
        assert!(Orders.local_redirect("/home").is_ok());
    }

    #[test]
    fn test_invalid_content_type() {
        assert!(matches!(Orders.file(vec![1u8], "nonsense"), Err(Error::Configuration(_))));
        assert!(Orders.content("hi", Some("text/plain")).is_ok());
        assert!(Orders.challenge(&["Bearer"]).is_ok());
        assert!(Orders.forbid(&[" "]).is_err());
    }
}
