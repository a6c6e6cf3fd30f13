//! Testing utilities for Armature MVC.
//!
//! - **TestApp** - builds an [`MvcApplication`](armature_mvc_core::MvcApplication) for a test
//! - **TestClient** - sends requests to an action and captures the outcome
//! - **RecordingFilter** - a filter for every stage that logs its hooks into a [`HookLog`]
//! - **Mocks** - recording authentication service and fixed-URL helpers
//! - **Assertions** - status, header and body checks
//!
//! ## Quick Start
//!
//! ```
//! use armature_mvc_testing::*;
//! use armature_mvc_core::{ActionDescriptor, handler_fn};
//! use armature_mvc_core::results::ActionOutput;
//! use std::sync::Arc;
//!
//! # tokio_test::block_on(async {
//! let log = HookLog::new();
//! let app = TestAppBuilder::new()
//!     .with_global_filter(RecordingFilter::new("audit", &log).only(&[Stage::Action]))
//!     .build();
//!
//! let action = Arc::new(ActionDescriptor::new(
//!     "greetings",
//!     "hello",
//!     handler_fn(|_, _| Ok(ActionOutput::Value(serde_json::json!({"hello": "world"})))),
//! ));
//!
//! let response = app.client().get(&action, "/hello").await;
//! assert_status(&response, 200);
//! assert_eq!(log.hooks_of("audit"), vec!["OnActionExecuting", "OnActionExecuted"]);
//! # });
//! ```

mod assertions;
mod mock;
mod test_app;
mod test_client;

pub use assertions::{
    assert_body_contains, assert_error_kind, assert_header, assert_json, assert_status,
    assert_success,
};
pub use mock::{
    HookLog, RecordingAuthenticationService, RecordingFilter, Stage, StaticUrlHelper,
    StaticUrlHelperFactory,
};
pub use test_app::{TestApp, TestAppBuilder};
pub use test_client::{TestClient, TestRequestBuilder, TestResponse};

// Re-export common testing utilities
pub use tokio::test as tokio_test;
