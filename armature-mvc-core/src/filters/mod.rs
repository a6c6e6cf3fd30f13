//! Filters around action execution.
//!
//! The pipeline runs five filter stages, outermost first:
//!
//! 1. **Authorization** - may short-circuit with a result (e.g. a challenge)
//! 2. **Resource** - wraps everything after authorization, including result execution
//! 3. **Exception** - handles failures from model binding, action filters and the action
//! 4. **Action** - wraps the action method and sees the bound arguments
//! 5. **Result** - wraps execution of the action result
//!
//! Each stage comes in a synchronous flavour (an executing hook that may
//! short-circuit plus an executed hook) and an asynchronous flavour that
//! receives a `next` continuation. A filter value exposes the stages it
//! takes part in through [`FilterMetadata`]:
//!
//! ```
//! use armature_mvc_core::filters::{ActionFilter, ActionExecutingContext, FilterMetadata, FilterOutcome};
//! use armature_mvc_core::Result;
//!
//! struct AuditFilter;
//!
//! impl ActionFilter for AuditFilter {
//!     fn on_action_executing(&self, context: &mut ActionExecutingContext<'_>) -> Result<FilterOutcome> {
//!         println!("calling {}", context.action_context.action.display_name);
//!         Ok(FilterOutcome::Continue)
//!     }
//! }
//!
//! impl FilterMetadata for AuditFilter {
//!     fn name(&self) -> &str {
//!         "AuditFilter"
//!     }
//!
//!     fn as_action_filter(&self) -> Option<&dyn ActionFilter> {
//!         Some(self)
//!     }
//! }
//! ```

pub mod builtin;
mod context;
mod provider;

pub use context::{
    ActionExecutedContext, ActionExecutingContext, ActionNext, AuthorizationFilterContext,
    ExceptionContext, ResourceExecutedContext, ResourceExecutingContext, ResourceNext,
    ResultExecutedContext, ResultExecutingContext, ResultNext,
};
pub use provider::{FilterCache, FilterPlan, order_descriptors};

use crate::results::ActionResult;
use crate::services::ActionServices;
use crate::{ActionContext, Result};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// What an executing hook decided.
pub enum FilterOutcome {
    /// Run the rest of the pipeline
    Continue,
    /// Stop here and execute this result instead
    ShortCircuit(Box<dyn ActionResult>),
}

impl FilterOutcome {
    pub fn short_circuit(result: impl ActionResult + 'static) -> Self {
        FilterOutcome::ShortCircuit(Box::new(result))
    }

    pub fn is_short_circuit(&self) -> bool {
        matches!(self, FilterOutcome::ShortCircuit(_))
    }
}

impl fmt::Debug for FilterOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterOutcome::Continue => f.write_str("Continue"),
            FilterOutcome::ShortCircuit(result) => write!(f, "ShortCircuit({})", result.name()),
        }
    }
}

/// Policy a filter enforces. Only the filter of each kind closest to the
/// action is effective; the others are left out of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PolicyKind {
    RequestSize,
    Consumes,
    Custom(&'static str),
}

impl PolicyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyKind::RequestSize => "RequestSize",
            PolicyKind::Consumes => "Consumes",
            PolicyKind::Custom(name) => name,
        }
    }
}

/// Where a filter was declared. Among filters with equal order, the one
/// declared closer to the action runs later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FilterScope {
    First = 0,
    Global = 10,
    Controller = 20,
    Action = 30,
    Last = 100,
}

// ============================================================================
// Stage traits
// ============================================================================

pub trait AuthorizationFilter: Send + Sync {
    fn on_authorization(&self, context: &mut AuthorizationFilterContext<'_>) -> Result<FilterOutcome>;
}

#[async_trait]
pub trait AsyncAuthorizationFilter: Send + Sync {
    async fn on_authorization_async(
        &self,
        context: &mut AuthorizationFilterContext<'_>,
    ) -> Result<FilterOutcome>;
}

pub trait ResourceFilter: Send + Sync {
    fn on_resource_executing(&self, context: &mut ResourceExecutingContext<'_>) -> Result<FilterOutcome>;

    fn on_resource_executed(
        &self,
        _context: &mut ResourceExecutedContext,
        _action_context: &mut ActionContext,
    ) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
pub trait AsyncResourceFilter: Send + Sync {
    /// Call `next.run(context)` to continue, or return
    /// [`ResourceExecutedContext::short_circuited`] without calling it.
    async fn on_resource_execution(
        &self,
        context: &mut ResourceExecutingContext<'_>,
        next: ResourceNext<'_>,
    ) -> Result<ResourceExecutedContext>;
}

pub trait ActionFilter: Send + Sync {
    fn on_action_executing(&self, context: &mut ActionExecutingContext<'_>) -> Result<FilterOutcome>;

    fn on_action_executed(
        &self,
        _context: &mut ActionExecutedContext,
        _action_context: &mut ActionContext,
    ) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
pub trait AsyncActionFilter: Send + Sync {
    async fn on_action_execution(
        &self,
        context: &mut ActionExecutingContext<'_>,
        next: ActionNext<'_>,
    ) -> Result<ActionExecutedContext>;
}

pub trait ExceptionFilter: Send + Sync {
    fn on_exception(&self, context: &mut ExceptionContext<'_>) -> Result<()>;
}

#[async_trait]
pub trait AsyncExceptionFilter: Send + Sync {
    async fn on_exception_async(&self, context: &mut ExceptionContext<'_>) -> Result<()>;
}

pub trait ResultFilter: Send + Sync {
    fn on_result_executing(&self, context: &mut ResultExecutingContext<'_>) -> Result<FilterOutcome>;

    fn on_result_executed(
        &self,
        _context: &mut ResultExecutedContext,
        _action_context: &mut ActionContext,
    ) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
pub trait AsyncResultFilter: Send + Sync {
    async fn on_result_execution(
        &self,
        context: &mut ResultExecutingContext<'_>,
        next: ResultNext<'_>,
    ) -> Result<ResultExecutedContext>;
}

/// A filter value and the stages it participates in.
///
/// When a filter offers both the synchronous and the asynchronous flavour
/// of a stage, the asynchronous one is used.
pub trait FilterMetadata: Send + Sync + 'static {
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Lower runs earlier (outer).
    fn order(&self) -> i32 {
        0
    }

    fn policy(&self) -> Option<PolicyKind> {
        None
    }

    /// Result filters that also run when an earlier stage short-circuited.
    fn is_always_run_result_filter(&self) -> bool {
        false
    }

    /// Marker honoured by authorization filters.
    fn allows_anonymous(&self) -> bool {
        false
    }

    fn as_authorization_filter(&self) -> Option<&dyn AuthorizationFilter> {
        None
    }

    fn as_async_authorization_filter(&self) -> Option<&dyn AsyncAuthorizationFilter> {
        None
    }

    fn as_resource_filter(&self) -> Option<&dyn ResourceFilter> {
        None
    }

    fn as_async_resource_filter(&self) -> Option<&dyn AsyncResourceFilter> {
        None
    }

    fn as_action_filter(&self) -> Option<&dyn ActionFilter> {
        None
    }

    fn as_async_action_filter(&self) -> Option<&dyn AsyncActionFilter> {
        None
    }

    fn as_exception_filter(&self) -> Option<&dyn ExceptionFilter> {
        None
    }

    fn as_async_exception_filter(&self) -> Option<&dyn AsyncExceptionFilter> {
        None
    }

    fn as_result_filter(&self) -> Option<&dyn ResultFilter> {
        None
    }

    fn as_async_result_filter(&self) -> Option<&dyn AsyncResultFilter> {
        None
    }
}

impl fmt::Debug for dyn FilterMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Builds filter instances that need services or per-request state.
pub trait FilterFactory: Send + Sync {
    /// Reusable instances are created once per action and cached.
    fn is_reusable(&self) -> bool {
        false
    }

    fn order(&self) -> i32 {
        0
    }

    fn create_instance(&self, services: &ActionServices) -> Result<Arc<dyn FilterMetadata>>;
}

#[derive(Clone)]
pub enum FilterSource {
    Instance(Arc<dyn FilterMetadata>),
    Factory(Arc<dyn FilterFactory>),
}

/// A filter as declared on the application, a controller or an action.
#[derive(Clone)]
pub struct FilterDescriptor {
    pub source: FilterSource,
    pub order: i32,
    pub scope: FilterScope,
}

impl FilterDescriptor {
    pub fn new(filter: impl FilterMetadata, scope: FilterScope) -> Self {
        Self::from_arc(Arc::new(filter), scope)
    }

    pub fn from_arc(filter: Arc<dyn FilterMetadata>, scope: FilterScope) -> Self {
        Self {
            order: filter.order(),
            source: FilterSource::Instance(filter),
            scope,
        }
    }

    pub fn factory(factory: impl FilterFactory + 'static, scope: FilterScope) -> Self {
        Self {
            order: factory.order(),
            source: FilterSource::Factory(Arc::new(factory)),
            scope,
        }
    }

    /// Override the declared order.
    pub fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }
}

impl fmt::Debug for FilterDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let source = match &self.source {
            FilterSource::Instance(filter) => filter.name().to_string(),
            FilterSource::Factory(_) => "<factory>".to_string(),
        };
        f.debug_struct("FilterDescriptor")
            .field("source", &source)
            .field("order", &self.order)
            .field("scope", &self.scope)
            .finish()
    }
}
