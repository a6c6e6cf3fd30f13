// HTTPS requirement

use crate::filters::{AuthorizationFilter, AuthorizationFilterContext, FilterMetadata, FilterOutcome};
use crate::results::{RedirectResult, StatusCodeResult};
use crate::{ActionContext, Result};
use http::{Method, StatusCode};

/// Sends plain HTTP GET and HEAD requests to their HTTPS equivalent; other
/// methods are refused with 403 since a redirect would drop their body.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequireHttpsFilter {
    /// Overrides `MvcOptions::require_https_permanent` when set
    pub permanent: Option<bool>,
}

impl RequireHttpsFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn permanent(mut self, permanent: bool) -> Self {
        self.permanent = Some(permanent);
        self
    }

    fn https_url(context: &ActionContext) -> Option<String> {
        let request = &context.request;
        let host = request
            .host
            .as_deref()
            .or_else(|| request.header("host"))?;
        let hostname = host.rsplit_once(':').map_or(host, |(name, _)| name);

        let authority = match context.options().https_port {
            Some(port) if port != 443 => format!("{}:{}", hostname, port),
            _ => hostname.to_string(),
        };
        Some(format!(
            "https://{}{}{}",
            authority,
            request.path,
            request.query_string()
        ))
    }
}

impl AuthorizationFilter for RequireHttpsFilter {
    fn on_authorization(&self, context: &mut AuthorizationFilterContext<'_>) -> Result<FilterOutcome> {
        let action_context = &*context.action_context;
        if action_context.request.is_https() {
            return Ok(FilterOutcome::Continue);
        }

        let method = &action_context.request.method;
        let url = if *method == Method::GET || *method == Method::HEAD {
            Self::https_url(action_context)
        } else {
            None
        };
        let Some(url) = url else {
            return Ok(FilterOutcome::short_circuit(StatusCodeResult::new(StatusCode::FORBIDDEN)));
        };

        let permanent = self
            .permanent
            .unwrap_or(action_context.options().require_https_permanent);
        Ok(FilterOutcome::short_circuit(
            RedirectResult::new(url)?.permanent(permanent),
        ))
    }
}

impl FilterMetadata for RequireHttpsFilter {
    fn name(&self) -> &str {
        "RequireHttpsFilter"
    }

    fn as_authorization_filter(&self) -> Option<&dyn AuthorizationFilter> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::builtin::test_support::{context, context_with};
    use crate::{HttpRequest, MvcOptions};

    async fn run(filter: RequireHttpsFilter, mut ctx: ActionContext) -> ActionContext {
        let mut auth = AuthorizationFilterContext {
            action_context: &mut ctx,
            filters: &[],
        };
        if let FilterOutcome::ShortCircuit(result) = filter.on_authorization(&mut auth).unwrap() {
            result.execute(&mut ctx).await.unwrap();
        }
        ctx
    }

    #[tokio::test]
    async fn test_https_passes() {
        let request = HttpRequest::get("/orders").with_scheme("https").with_host("shop.test");
        let ctx = run(RequireHttpsFilter::new(), context(request)).await;
        assert_eq!(ctx.response.status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_get_redirects() {
        let request = HttpRequest::get("/orders")
            .with_host("shop.test:8080")
            .with_query("page", "2");
        let ctx = run(RequireHttpsFilter::new(), context(request)).await;

        assert_eq!(ctx.response.status, StatusCode::FOUND);
        assert_eq!(ctx.response.header("location"), Some("https://shop.test/orders?page=2"));
    }

    #[tokio::test]
    async fn test_permanent_with_port() {
        let request = HttpRequest::get("/").with_host("shop.test");
        let options = MvcOptions::new().https_port(8443).require_https_permanent(true);
        let ctx = run(RequireHttpsFilter::new(), context_with(request, options)).await;

        assert_eq!(ctx.response.status, StatusCode::MOVED_PERMANENTLY);
        assert_eq!(ctx.response.header("location"), Some("https://shop.test:8443/"));

        let request = HttpRequest::get("/").with_host("shop.test");
        let options = MvcOptions::new().require_https_permanent(true);
        let filter = RequireHttpsFilter::new().permanent(false);
        let ctx = run(filter, context_with(request, options)).await;
        assert_eq!(ctx.response.status, StatusCode::FOUND);
    }

    #[tokio::test]
    async fn test_post_forbidden() {
        let request = HttpRequest::post("/orders").with_host("shop.test");
        let ctx = run(RequireHttpsFilter::new(), context(request)).await;
        assert_eq!(ctx.response.status, StatusCode::FORBIDDEN);
        assert!(ctx.response.header("location").is_none());
    }
}
