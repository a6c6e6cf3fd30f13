// Core library for the Armature MVC layer
// Action results, the five-stage filter pipeline, output formatting and
// conditional file delivery

pub mod application;
pub mod authentication;
pub mod binding;
pub mod conditional;
pub mod context;
pub mod controller;
pub mod diagnostics;
pub mod error;
pub mod filters;
pub mod formatters;
pub mod http;
pub mod invoker;
pub mod logging;
pub mod media_type;
pub mod options;
pub mod results;
pub mod services;
pub mod url_helper;

// Re-export commonly used types
pub use crate::http::{HttpRequest, HttpResponse, Json};
pub use application::MvcApplication;
pub use context::{
    ActionContext, ActionDescriptor, ActionHandler, Arguments, HttpFeatures, ModelState,
    RouteValues, handler_fn,
};
pub use error::{Error, Result};
pub use invoker::ActionInvoker;
pub use options::MvcOptions;
pub use services::ActionServices;
