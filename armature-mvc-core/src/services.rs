// Explicit collaborator bundle handed to every request

use crate::authentication::AuthenticationService;
use crate::binding::{ArgumentBinder, DefaultArgumentBinder};
use crate::diagnostics::{DiagnosticListener, DiagnosticSource};
use crate::formatters::{
    DefaultOutputFormatterSelector, JsonOutputFormatter, NoContentOutputFormatter,
    OutputFormatter, OutputFormatterSelector, StringOutputFormatter,
};
use crate::results::{ActionResultExecutor, FileResult, FileResultExecutor, ObjectResult, ObjectResultExecutor};
use crate::url_helper::UrlHelperFactory;
use crate::{Error, MvcOptions, Result};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Services the pipeline and results depend on.
///
/// Everything here is shared read-only across concurrent requests.
/// Optional collaborators report a configuration error when a result needs
/// one that was never registered.
#[derive(Clone)]
pub struct ActionServices {
    pub options: Arc<MvcOptions>,
    /// Output formatters in priority order
    pub formatters: Vec<Arc<dyn OutputFormatter>>,
    pub formatter_selector: Arc<dyn OutputFormatterSelector>,
    pub object_result_executor: Arc<dyn ActionResultExecutor<ObjectResult>>,
    pub file_result_executor: Arc<dyn ActionResultExecutor<FileResult>>,
    pub url_helper_factory: Option<Arc<dyn UrlHelperFactory>>,
    pub authentication: Option<Arc<dyn AuthenticationService>>,
    pub binder: Arc<dyn ArgumentBinder>,
    /// Root directory for virtual file paths
    pub web_root: Option<PathBuf>,
    pub diagnostics: DiagnosticSource,
}

impl ActionServices {
    /// Default options, the built-in formatters and no optional collaborators.
    pub fn new() -> Self {
        Self {
            options: Arc::new(MvcOptions::default()),
            formatters: Self::default_formatters(),
            formatter_selector: Arc::new(DefaultOutputFormatterSelector),
            object_result_executor: Arc::new(ObjectResultExecutor),
            file_result_executor: Arc::new(FileResultExecutor),
            url_helper_factory: None,
            authentication: None,
            binder: Arc::new(DefaultArgumentBinder),
            web_root: None,
            diagnostics: DiagnosticSource::new(),
        }
    }

    /// No-content, plain text and JSON, in that order.
    pub fn default_formatters() -> Vec<Arc<dyn OutputFormatter>> {
        vec![
            Arc::new(NoContentOutputFormatter),
            Arc::new(StringOutputFormatter),
            Arc::new(JsonOutputFormatter),
        ]
    }

    pub fn with_options(mut self, options: MvcOptions) -> Self {
        self.options = Arc::new(options);
        self
    }

    /// Append a formatter after the existing ones.
    pub fn with_formatter(mut self, formatter: impl OutputFormatter + 'static) -> Self {
        self.formatters.push(Arc::new(formatter));
        self
    }

    /// Replace the formatter list.
    pub fn with_formatters(mut self, formatters: Vec<Arc<dyn OutputFormatter>>) -> Self {
        self.formatters = formatters;
        self
    }

    pub fn with_formatter_selector(mut self, selector: impl OutputFormatterSelector + 'static) -> Self {
        self.formatter_selector = Arc::new(selector);
        self
    }

    pub fn with_object_result_executor(
        mut self,
        executor: impl ActionResultExecutor<ObjectResult> + 'static,
    ) -> Self {
        self.object_result_executor = Arc::new(executor);
        self
    }

    pub fn with_file_result_executor(
        mut self,
        executor: impl ActionResultExecutor<FileResult> + 'static,
    ) -> Self {
        self.file_result_executor = Arc::new(executor);
        self
    }

    pub fn with_url_helper_factory(mut self, factory: impl UrlHelperFactory + 'static) -> Self {
        self.url_helper_factory = Some(Arc::new(factory));
        self
    }

    pub fn with_authentication(mut self, service: impl AuthenticationService + 'static) -> Self {
        self.authentication = Some(Arc::new(service));
        self
    }

    pub fn with_binder(mut self, binder: impl ArgumentBinder + 'static) -> Self {
        self.binder = Arc::new(binder);
        self
    }

    pub fn with_web_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.web_root = Some(root.into());
        self
    }

    pub fn with_diagnostic_listener(mut self, listener: Arc<dyn DiagnosticListener>) -> Self {
        self.diagnostics.add_listener(listener);
        self
    }

    pub fn url_helper_factory(&self) -> Result<&Arc<dyn UrlHelperFactory>> {
        self.url_helper_factory
            .as_ref()
            .ok_or_else(|| Error::missing_service("UrlHelperFactory"))
    }

    pub fn authentication(&self) -> Result<&Arc<dyn AuthenticationService>> {
        self.authentication
            .as_ref()
            .ok_or_else(|| Error::missing_service("AuthenticationService"))
    }

    pub fn web_root(&self) -> Result<&Path> {
        self.web_root
            .as_deref()
            .ok_or_else(|| Error::Configuration("No web root has been configured for virtual files.".into()))
    }
}

impl Default for ActionServices {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ActionServices {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionServices")
            .field("options", &self.options)
            .field(
                "formatters",
                &self.formatters.iter().map(|f| f.name().to_string()).collect::<Vec<_>>(),
            )
            .field("url_helper_factory", &self.url_helper_factory.is_some())
            .field("authentication", &self.authentication.is_some())
            .field("web_root", &self.web_root)
            .field("diagnostics", &self.diagnostics)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::url_helper::RouteTable;

    #[test]
    fn test_defaults() {
        let services = ActionServices::new();
        let names: Vec<&str> = services.formatters.iter().map(|f| f.name()).collect();
        assert_eq!(
            names,
            vec!["NoContentOutputFormatter", "StringOutputFormatter", "JsonOutputFormatter"]
        );
        assert!(services.url_helper_factory().is_err());
        assert!(services.web_root().is_err());
    }

    #[test]
    fn test_builder() {
        let services = ActionServices::new()
            .with_options(MvcOptions::new().return_http_not_acceptable(true))
            .with_url_helper_factory(RouteTable::new().into_factory())
            .with_web_root("/srv/www");

        assert!(services.options.return_http_not_acceptable);
        assert!(services.url_helper_factory().is_ok());
        assert_eq!(services.web_root().unwrap(), Path::new("/srv/www"));
    }

    #[test]
    fn test_missing_service_message() {
        let err = match ActionServices::new().authentication() {
            Err(e) => e,
            Ok(_) => panic!("expected a configuration error"),
        };
        assert!(err.to_string().contains("AuthenticationService"));
    }
}
