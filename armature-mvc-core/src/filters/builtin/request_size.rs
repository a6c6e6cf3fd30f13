// Request body size policy

use crate::filters::{
    AuthorizationFilter, AuthorizationFilterContext, FilterMetadata, FilterOutcome, PolicyKind,
};
use crate::results::StatusCodeResult;
use crate::Result;
use http::StatusCode;

/// Caps the request body at `bytes`.
///
/// Only the request size filter closest to the action applies, so an action
/// can raise or lower a limit declared on its controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestSizeLimitFilter {
    pub bytes: u64,
}

impl RequestSizeLimitFilter {
    pub fn new(bytes: u64) -> Self {
        Self { bytes }
    }
}

impl AuthorizationFilter for RequestSizeLimitFilter {
    fn on_authorization(&self, context: &mut AuthorizationFilterContext<'_>) -> Result<FilterOutcome> {
        let action_context = &mut *context.action_context;
        action_context.features.max_request_body_size = Some(self.bytes);

        if action_context.request.content_length() > self.bytes {
            return Ok(FilterOutcome::short_circuit(StatusCodeResult::new(
                StatusCode::PAYLOAD_TOO_LARGE,
            )));
        }
        Ok(FilterOutcome::Continue)
    }
}

impl FilterMetadata for RequestSizeLimitFilter {
    fn name(&self) -> &str {
        "RequestSizeLimitFilter"
    }

    fn policy(&self) -> Option<PolicyKind> {
        Some(PolicyKind::RequestSize)
    }

    fn as_authorization_filter(&self) -> Option<&dyn AuthorizationFilter> {
        Some(self)
    }
}

/// Lifts the request body limit.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisableRequestSizeLimitFilter;

impl AuthorizationFilter for DisableRequestSizeLimitFilter {
    fn on_authorization(&self, context: &mut AuthorizationFilterContext<'_>) -> Result<FilterOutcome> {
        context.action_context.features.max_request_body_size = None;
        Ok(FilterOutcome::Continue)
    }
}

impl FilterMetadata for DisableRequestSizeLimitFilter {
    fn name(&self) -> &str {
        "DisableRequestSizeLimitFilter"
    }

    fn policy(&self) -> Option<PolicyKind> {
        Some(PolicyKind::RequestSize)
    }

    fn as_authorization_filter(&self) -> Option<&dyn AuthorizationFilter> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::builtin::test_support::context;
    use crate::filters::FilterPlan;
    use crate::HttpRequest;
    use std::sync::Arc;

    fn authorize(filter: &dyn AuthorizationFilter, request: HttpRequest) -> (FilterOutcome, Option<u64>) {
        let mut ctx = context(request);
        let mut auth = AuthorizationFilterContext {
            action_context: &mut ctx,
            filters: &[],
        };
        let outcome = filter.on_authorization(&mut auth).unwrap();
        (outcome, ctx.features.max_request_body_size)
    }

    #[test]
    fn test_sets_limit() {
        let (outcome, limit) = authorize(&RequestSizeLimitFilter::new(1024), HttpRequest::post("/"));
        assert!(!outcome.is_short_circuit());
        assert_eq!(limit, Some(1024));
    }

    #[test]
    fn test_oversized_body_rejected() {
        let request = HttpRequest::post("/").with_body(vec![0u8; 64]);
        let (outcome, _) = authorize(&RequestSizeLimitFilter::new(16), request);
        assert!(outcome.is_short_circuit());

        let request = HttpRequest::post("/").with_header("content-length", "4096");
        let (outcome, _) = authorize(&RequestSizeLimitFilter::new(1024), request);
        assert!(outcome.is_short_circuit());
    }

    #[test]
    fn test_disable_clears_limit() {
        let (outcome, limit) = authorize(&DisableRequestSizeLimitFilter, HttpRequest::post("/"));
        assert!(!outcome.is_short_circuit());
        assert_eq!(limit, None);
    }

    #[test]
    fn test_closest_limit_wins() {
        let controller: Arc<dyn FilterMetadata> = Arc::new(RequestSizeLimitFilter::new(10));
        let action: Arc<dyn FilterMetadata> = Arc::new(DisableRequestSizeLimitFilter);
        let plan = FilterPlan::assemble(vec![controller.clone(), action.clone()]);

        assert!(plan.is_effective(&action));
        assert!(!plan.is_effective(&controller));
        assert_eq!(
            plan.effective_policy(PolicyKind::RequestSize).map(|f| f.name()),
            Some("DisableRequestSizeLimitFilter")
        );
    }
}
