//! Filters shipped with the pipeline.
//!
//! | Filter | Stage | Policy |
//! |--------|-------|--------|
//! | [`RequestSizeLimitFilter`], [`DisableRequestSizeLimitFilter`] | authorization | `RequestSize` |
//! | [`RequireHttpsFilter`] | authorization | |
//! | [`AuthorizeFilter`], [`AllowAnonymousFilter`] | authorization | |
//! | [`ConsumesFilter`] | resource | `Consumes` |
//! | [`ModelStateInvalidFilter`] | action | |
//! | [`ProblemDetailsExceptionFilter`] | exception | |
//! | [`ProducesFilter`] | result | |

mod authorize;
mod consumes;
mod exception;
mod model_state;
mod produces;
mod request_size;
mod require_https;

pub use authorize::{AllowAnonymousFilter, AuthorizeFilter};
pub use consumes::ConsumesFilter;
pub use exception::ProblemDetailsExceptionFilter;
pub use model_state::ModelStateInvalidFilter;
pub use produces::ProducesFilter;
pub use request_size::{DisableRequestSizeLimitFilter, RequestSizeLimitFilter};
pub use require_https::RequireHttpsFilter;

#[cfg(test)]
pub(crate) mod test_support {
    use crate::context::handler_fn;
    use crate::results::ActionOutput;
    use crate::{ActionContext, ActionDescriptor, ActionServices, HttpRequest, MvcOptions};
    use std::sync::Arc;

    pub fn context(request: HttpRequest) -> ActionContext {
        context_with(request, MvcOptions::default())
    }

    pub fn context_with(request: HttpRequest, options: MvcOptions) -> ActionContext {
        let action = ActionDescriptor::new("orders", "create", handler_fn(|_, _| Ok(ActionOutput::Empty)));
        let services = ActionServices::new().with_options(options);
        ActionContext::new(request, Arc::new(action), Arc::new(services))
    }
}
