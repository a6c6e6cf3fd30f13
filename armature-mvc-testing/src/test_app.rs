// Test application builder

use crate::TestClient;
use armature_mvc_core::filters::FilterMetadata;
use armature_mvc_core::{ActionServices, MvcApplication};
use std::sync::Arc;

/// An [`MvcApplication`] prepared for tests.
pub struct TestApp {
    pub app: Arc<MvcApplication>,
}

impl TestApp {
    pub fn new(app: MvcApplication) -> Self {
        Self { app: Arc::new(app) }
    }

    pub fn client(&self) -> TestClient {
        TestClient::new(self.app.clone())
    }
}

/// Builder for test applications
pub struct TestAppBuilder {
    services: ActionServices,
    global_filters: Vec<Box<dyn FnOnce(MvcApplication) -> MvcApplication>>,
}

impl TestAppBuilder {
    pub fn new() -> Self {
        Self {
            services: ActionServices::new(),
            global_filters: Vec::new(),
        }
    }

    /// Replace the services with a customised set.
    pub fn with_services(mut self, services: ActionServices) -> Self {
        self.services = services;
        self
    }

    pub fn with_global_filter(mut self, filter: impl FilterMetadata) -> Self {
        self.global_filters
            .push(Box::new(move |app: MvcApplication| app.with_global_filter(filter)));
        self
    }

    pub fn build(self) -> TestApp {
        let app = self
            .global_filters
            .into_iter()
            .fold(MvcApplication::new(self.services), |app, add| add(app));
        TestApp::new(app)
    }
}

impl Default for TestAppBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{HookLog, RecordingFilter};
    use armature_mvc_core::results::ActionOutput;
    use armature_mvc_core::{ActionDescriptor, handler_fn};

    #[tokio::test]
    async fn test_builder_registers_global_filters() {
        let log = HookLog::new();
        let app = TestAppBuilder::new()
            .with_global_filter(RecordingFilter::new("global", &log))
            .build();
        assert_eq!(app.app.global_filters().len(), 1);

        let action = Arc::new(ActionDescriptor::new(
            "home",
            "index",
            handler_fn(|_, _| Ok(ActionOutput::Empty)),
        ));
        let response = app.client().get(&action, "/").await;
        assert_eq!(response.status(), Some(200));
        assert!(log.contains("global:OnResultExecuted"));
    }
}
