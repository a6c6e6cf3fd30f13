// Redirect results

use super::ActionResult;
use crate::url_helper::{UrlActionContext, UrlRouteContext, is_local_url};
use crate::{ActionContext, Error, Result, RouteValues};
use async_trait::async_trait;
use http::StatusCode;
use http::header::LOCATION;

/// Status for a redirect: 301/302, or 308/307 when the method must be kept.
pub fn redirect_status(permanent: bool, preserve_method: bool) -> StatusCode {
    match (permanent, preserve_method) {
        (true, true) => StatusCode::PERMANENT_REDIRECT,
        (true, false) => StatusCode::MOVED_PERMANENTLY,
        (false, true) => StatusCode::TEMPORARY_REDIRECT,
        (false, false) => StatusCode::FOUND,
    }
}

/// Expand `~/` paths through the URL helper when one is registered.
fn content_url(context: &ActionContext, url: &str) -> Result<String> {
    if !url.starts_with("~/") {
        return Ok(url.to_string());
    }
    match context.services.url_helper_factory {
        Some(ref factory) => Ok(factory.get_url_helper(context).content(url)),
        None => Ok(format!("/{}", &url[2..])),
    }
}

fn write_redirect(
    context: &mut ActionContext,
    url: &str,
    permanent: bool,
    preserve_method: bool,
) -> Result<()> {
    context.response.status = redirect_status(permanent, preserve_method);
    context.response.set_header(LOCATION, url)
}

fn require_url(url: String) -> Result<String> {
    if url.is_empty() {
        return Err(Error::Configuration(
            "A redirect URL must not be empty.".to_string(),
        ));
    }
    Ok(url)
}

/// Redirect to a literal URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectResult {
    pub url: String,
    pub permanent: bool,
    pub preserve_method: bool,
}

impl RedirectResult {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        Ok(Self {
            url: require_url(url.into())?,
            permanent: false,
            preserve_method: false,
        })
    }

    pub fn permanent(mut self, permanent: bool) -> Self {
        self.permanent = permanent;
        self
    }

    pub fn preserve_method(mut self, preserve: bool) -> Self {
        self.preserve_method = preserve;
        self
    }
}

#[async_trait]
impl ActionResult for RedirectResult {
    async fn execute(&self, context: &mut ActionContext) -> Result<()> {
        let url = content_url(context, &self.url)?;
        write_redirect(context, &url, self.permanent, self.preserve_method)
    }

    fn name(&self) -> &str {
        "RedirectResult"
    }
}

/// Redirect that refuses to leave the current host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalRedirectResult {
    pub url: String,
    pub permanent: bool,
    pub preserve_method: bool,
}

impl LocalRedirectResult {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        Ok(Self {
            url: require_url(url.into())?,
            permanent: false,
            preserve_method: false,
        })
    }

    pub fn permanent(mut self, permanent: bool) -> Self {
        self.permanent = permanent;
        self
    }

    pub fn preserve_method(mut self, preserve: bool) -> Self {
        self.preserve_method = preserve;
        self
    }
}

#[async_trait]
impl ActionResult for LocalRedirectResult {
    async fn execute(&self, context: &mut ActionContext) -> Result<()> {
        let local = match context.services.url_helper_factory {
            Some(ref factory) => factory.get_url_helper(context).is_local_url(&self.url),
            None => is_local_url(&self.url),
        };
        if !local {
            return Err(Error::InvalidOperation(
                "The supplied URL is not local. A URL with an absolute path is considered local \
                 if it does not have a host/authority part. URLs using virtual paths ('~/') are \
                 also local."
                    .to_string(),
            ));
        }

        let url = content_url(context, &self.url)?;
        write_redirect(context, &url, self.permanent, self.preserve_method)
    }

    fn name(&self) -> &str {
        "LocalRedirectResult"
    }
}

/// Redirect to a URL generated for an action.
#[derive(Debug, Clone, Default)]
pub struct RedirectToActionResult {
    pub action: Option<String>,
    pub controller: Option<String>,
    pub route_values: RouteValues,
    pub fragment: Option<String>,
    pub permanent: bool,
    pub preserve_method: bool,
}

impl RedirectToActionResult {
    pub fn new(action: Option<&str>, controller: Option<&str>, route_values: Option<RouteValues>) -> Self {
        Self {
            action: action.map(str::to_string),
            controller: controller.map(str::to_string),
            route_values: route_values.unwrap_or_default(),
            ..Default::default()
        }
    }

    pub fn with_fragment(mut self, fragment: impl Into<String>) -> Self {
        self.fragment = Some(fragment.into());
        self
    }

    pub fn permanent(mut self, permanent: bool) -> Self {
        self.permanent = permanent;
        self
    }

    pub fn preserve_method(mut self, preserve: bool) -> Self {
        self.preserve_method = preserve;
        self
    }
}

#[async_trait]
impl ActionResult for RedirectToActionResult {
    async fn execute(&self, context: &mut ActionContext) -> Result<()> {
        let target = UrlActionContext {
            action: self.action.clone(),
            controller: self.controller.clone(),
            values: self.route_values.clone(),
            fragment: self.fragment.clone(),
            ..Default::default()
        };
        let url = context
            .url_helper()?
            .action(&target)
            .filter(|url| !url.is_empty())
            .ok_or_else(Error::no_route_matches)?;

        write_redirect(context, &url, self.permanent, self.preserve_method)
    }

    fn name(&self) -> &str {
        "RedirectToActionResult"
    }
}

/// Redirect to a URL generated for a route.
#[derive(Debug, Clone, Default)]
pub struct RedirectToRouteResult {
    pub route_name: Option<String>,
    pub route_values: RouteValues,
    pub fragment: Option<String>,
    pub permanent: bool,
    pub preserve_method: bool,
}

impl RedirectToRouteResult {
    pub fn new(route_name: Option<&str>, route_values: Option<RouteValues>) -> Self {
        Self {
            route_name: route_name.map(str::to_string),
            route_values: route_values.unwrap_or_default(),
            ..Default::default()
        }
    }

    pub fn with_fragment(mut self, fragment: impl Into<String>) -> Self {
        self.fragment = Some(fragment.into());
        self
    }

    pub fn permanent(mut self, permanent: bool) -> Self {
        self.permanent = permanent;
        self
    }

    pub fn preserve_method(mut self, preserve: bool) -> Self {
        self.preserve_method = preserve;
        self
    }
}

#[async_trait]
impl ActionResult for RedirectToRouteResult {
    async fn execute(&self, context: &mut ActionContext) -> Result<()> {
        let mut target = UrlRouteContext::new(self.route_name.clone()).values(self.route_values.clone());
        target.fragment = self.fragment.clone();

        let url = context
            .url_helper()?
            .route_url(&target)
            .filter(|url| !url.is_empty())
            .ok_or_else(Error::no_route_matches)?;

        write_redirect(context, &url, self.permanent, self.preserve_method)
    }

    fn name(&self) -> &str {
        "RedirectToRouteResult"
    }
}
