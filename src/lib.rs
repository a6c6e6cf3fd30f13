// Armature MVC - the action layer of the Armature HTTP framework
//
// Actions return results, a five-stage filter pipeline wraps them, and
// results are written through content negotiation, conditional requests
// and authentication handlers.

// Re-export core functionality
pub use armature_mvc_core::*;

#[cfg(feature = "testing")]
pub use armature_mvc_testing;

/// Everything an application usually needs in one import.
pub mod prelude {
    pub use armature_mvc_core::authentication::{AuthenticationProperties, AuthenticationService, Principal};
    pub use armature_mvc_core::controller::ControllerBase;
    pub use armature_mvc_core::filters::builtin::{
        AllowAnonymousFilter, AuthorizeFilter, ConsumesFilter, DisableRequestSizeLimitFilter,
        ModelStateInvalidFilter, ProblemDetailsExceptionFilter, ProducesFilter, RequestSizeLimitFilter,
        RequireHttpsFilter,
    };
    pub use armature_mvc_core::filters::{
        ActionExecutedContext, ActionExecutingContext, ActionFilter, ActionNext, AsyncActionFilter,
        AsyncAuthorizationFilter, AsyncExceptionFilter, AsyncResourceFilter, AsyncResultFilter,
        AuthorizationFilter, AuthorizationFilterContext, ExceptionContext, ExceptionFilter,
        FilterDescriptor, FilterMetadata, FilterOutcome, FilterScope, PolicyKind, ResourceExecutedContext,
        ResourceExecutingContext, ResourceFilter, ResourceNext, ResultExecutedContext,
        ResultExecutingContext, ResultFilter, ResultNext,
    };
    pub use armature_mvc_core::media_type::{Accept, MediaType};
    pub use armature_mvc_core::results::{
        ActionOutput, ActionResult, ChallengeResult, ContentResult, EmptyResult, FileResult,
        ForbidResult, LocalRedirectResult, ObjectResult, ProblemDetails, RedirectResult,
        RedirectToActionResult, RedirectToRouteResult, SignInResult, SignOutResult,
        StatusCodeResult, ValidationProblemDetails,
    };
    pub use armature_mvc_core::{
        ActionContext, ActionDescriptor, ActionServices, Error, HttpRequest, HttpResponse, Json,
        MvcApplication, MvcOptions, Result, handler_fn,
    };
}
