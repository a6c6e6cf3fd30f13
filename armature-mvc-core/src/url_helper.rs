//! URL generation collaborators.
//!
//! Location-writing results and redirects ask a [`UrlHelper`] for a URL and
//! treat `None` (or an empty string) as "no route matches". Routing itself
//! lives outside this crate; [`RouteTemplateUrlHelper`] is a small
//! template-based generator good enough for conventional routes and tests.
//!
//! ```
//! use armature_mvc_core::url_helper::{RouteTable, UrlActionContext, UrlHelper};
//!
//! let table = RouteTable::new().default_template("/{controller}/{action}/{id?}");
//! let helper = table.helper(Default::default());
//!
//! let url = helper.action(
//!     &UrlActionContext::new()
//!         .action("show")
//!         .controller("orders")
//!         .value("id", "7")
//!         .value("expand", "lines"),
//! );
//! assert_eq!(url.as_deref(), Some("/orders/show/7?expand=lines"));
//! ```

use crate::{ActionContext, RouteValues};
use std::collections::HashMap;
use std::sync::Arc;

/// Arguments for action-based URL generation.
#[derive(Debug, Clone, Default)]
pub struct UrlActionContext {
    pub action: Option<String>,
    pub controller: Option<String>,
    pub values: RouteValues,
    pub protocol: Option<String>,
    pub host: Option<String>,
    pub fragment: Option<String>,
}

impl UrlActionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    pub fn controller(mut self, controller: impl Into<String>) -> Self {
        self.controller = Some(controller.into());
        self
    }

    pub fn value(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key, value);
        self
    }

    pub fn values(mut self, values: RouteValues) -> Self {
        self.values = values;
        self
    }

    pub fn fragment(mut self, fragment: impl Into<String>) -> Self {
        self.fragment = Some(fragment.into());
        self
    }
}

/// Arguments for route-name based URL generation.
#[derive(Debug, Clone, Default)]
pub struct UrlRouteContext {
    pub route_name: Option<String>,
    pub values: RouteValues,
    pub protocol: Option<String>,
    pub host: Option<String>,
    pub fragment: Option<String>,
}

impl UrlRouteContext {
    pub fn new(route_name: Option<String>) -> Self {
        Self {
            route_name,
            ..Default::default()
        }
    }

    pub fn values(mut self, values: RouteValues) -> Self {
        self.values = values;
        self
    }

    pub fn fragment(mut self, fragment: impl Into<String>) -> Self {
        self.fragment = Some(fragment.into());
        self
    }
}

/// Generates URLs for actions and named routes.
pub trait UrlHelper: Send + Sync {
    fn action(&self, context: &UrlActionContext) -> Option<String>;

    fn route_url(&self, context: &UrlRouteContext) -> Option<String>;

    /// Resolve an application-relative `~/` path.
    fn content(&self, path: &str) -> String {
        match path.strip_prefix("~/") {
            Some(rest) => format!("/{}", rest),
            None => path.to_string(),
        }
    }

    /// Whether `url` stays on the current host.
    fn is_local_url(&self, url: &str) -> bool {
        is_local_url(url)
    }
}

/// Local URLs start with `/` (not `//` or `/\`) or with `~/`.
pub fn is_local_url(url: &str) -> bool {
    let bytes = url.as_bytes();
    match bytes {
        [] => false,
        [b'/'] => true,
        [b'/', second, ..] => *second != b'/' && *second != b'\\',
        [b'~', b'/', rest @ ..] => rest.first().is_none_or(|c| *c != b'/' && *c != b'\\'),
        _ => false,
    }
}

/// Creates a [`UrlHelper`] bound to the current request.
pub trait UrlHelperFactory: Send + Sync {
    fn get_url_helper(&self, context: &ActionContext) -> Arc<dyn UrlHelper>;
}

// ============================================================================
// Template-based generator
// ============================================================================

/// Route templates keyed by `(controller, action)` and by route name.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    actions: HashMap<(String, String), String>,
    named: HashMap<String, String>,
    default_template: Option<String>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Template used for actions without a dedicated mapping,
    /// e.g. `/{controller}/{action}/{id?}`.
    pub fn default_template(mut self, template: impl Into<String>) -> Self {
        self.default_template = Some(template.into());
        self
    }

    pub fn map_action(
        mut self,
        controller: impl Into<String>,
        action: impl Into<String>,
        template: impl Into<String>,
    ) -> Self {
        self.actions
            .insert((controller.into(), action.into()), template.into());
        self
    }

    pub fn map_route(mut self, name: impl Into<String>, template: impl Into<String>) -> Self {
        self.named.insert(name.into(), template.into());
        self
    }

    /// A helper using `ambient` (the current request's route values) to fill
    /// in unspecified controller/action names.
    pub fn helper(self, ambient: RouteValues) -> RouteTemplateUrlHelper {
        RouteTemplateUrlHelper {
            table: Arc::new(self),
            ambient,
            host: None,
            scheme: None,
        }
    }

    pub fn into_factory(self) -> RouteTemplateUrlHelperFactory {
        RouteTemplateUrlHelperFactory {
            table: Arc::new(self),
        }
    }
}

/// Template-based [`UrlHelper`].
#[derive(Debug, Clone)]
pub struct RouteTemplateUrlHelper {
    table: Arc<RouteTable>,
    ambient: RouteValues,
    host: Option<String>,
    scheme: Option<String>,
}

impl RouteTemplateUrlHelper {
    fn absolute(&self, path: String, protocol: &Option<String>, host: &Option<String>) -> String {
        if protocol.is_none() && host.is_none() {
            return path;
        }
        let scheme = protocol
            .clone()
            .or_else(|| self.scheme.clone())
            .unwrap_or_else(|| "http".to_string());
        let host = host
            .clone()
            .or_else(|| self.host.clone())
            .unwrap_or_else(|| "localhost".to_string());
        format!("{}://{}{}", scheme, host, path)
    }
}

impl UrlHelper for RouteTemplateUrlHelper {
    fn action(&self, context: &UrlActionContext) -> Option<String> {
        let controller = context
            .controller
            .clone()
            .or_else(|| self.ambient.get("controller").map(str::to_string))?;
        let action = context
            .action
            .clone()
            .or_else(|| self.ambient.get("action").map(str::to_string))?;

        let template = self
            .table
            .actions
            .get(&(controller.clone(), action.clone()))
            .or(self.table.default_template.as_ref())?;

        let mut values = context.values.clone();
        values.insert("controller", controller);
        values.insert("action", action);

        let path = expand_template(template, &values, &["controller", "action"])?;
        let path = append_fragment(path, context.fragment.as_deref());
        Some(self.absolute(path, &context.protocol, &context.host))
    }

    fn route_url(&self, context: &UrlRouteContext) -> Option<String> {
        let template = match &context.route_name {
            Some(name) => self.table.named.get(name)?,
            None => self.table.default_template.as_ref()?,
        };

        let mut values = context.values.clone();
        for key in ["controller", "action"] {
            if values.get(key).is_none()
                && let Some(ambient) = self.ambient.get(key)
            {
                values.insert(key, ambient);
            }
        }

        let path = expand_template(template, &values, &["controller", "action"])?;
        let path = append_fragment(path, context.fragment.as_deref());
        Some(self.absolute(path, &context.protocol, &context.host))
    }
}

/// Factory producing [`RouteTemplateUrlHelper`]s bound to the current
/// request's route values, host and scheme.
#[derive(Debug, Clone)]
pub struct RouteTemplateUrlHelperFactory {
    table: Arc<RouteTable>,
}

impl UrlHelperFactory for RouteTemplateUrlHelperFactory {
    fn get_url_helper(&self, context: &ActionContext) -> Arc<dyn UrlHelper> {
        Arc::new(RouteTemplateUrlHelper {
            table: self.table.clone(),
            ambient: context.route_values.clone(),
            host: context.request.host.clone(),
            scheme: Some(context.request.scheme.clone()),
        })
    }
}

/// Fill `template` from `values`. Required segments that have no value make
/// generation fail; a missing optional segment ends the path. Values not
/// consumed by the template (other than `ambient_only` keys) become the query.
fn expand_template(template: &str, values: &RouteValues, ambient_only: &[&str]) -> Option<String> {
    let mut used: Vec<&str> = Vec::new();
    let mut segments: Vec<String> = Vec::new();

    for segment in template.split('/').filter(|s| !s.is_empty()) {
        match segment.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
            Some(param) => {
                let (name, optional) = match param.strip_suffix('?') {
                    Some(name) => (name, true),
                    None => (param, false),
                };
                match values.get(name) {
                    Some(value) if !value.is_empty() => {
                        used.push(name);
                        segments.push(urlencoding::encode(value).into_owned());
                    }
                    _ if optional => break,
                    _ => return None,
                }
            }
            None => segments.push(segment.to_string()),
        }
    }

    let mut url = format!("/{}", segments.join("/"));

    let query: Vec<String> = values
        .iter()
        .filter(|(k, _)| !used.contains(&k.as_str()) && !ambient_only.contains(&k.as_str()))
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect();
    if !query.is_empty() {
        url.push('?');
        url.push_str(&query.join("&"));
    }

    Some(url)
}

fn append_fragment(mut url: String, fragment: Option<&str>) -> String {
    if let Some(fragment) = fragment.filter(|f| !f.is_empty()) {
        url.push('#');
        url.push_str(fragment);
    }
    url
}
