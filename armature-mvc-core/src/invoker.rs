// Drives one request through the filter stages, the action and its result

use crate::context::{ActionContext, ActionDescriptor};
use crate::diagnostics::{DiagnosticEvent, events};
use crate::filters::{
    ActionExecutedContext, ActionExecutingContext, ActionNext, AuthorizationFilterContext,
    ExceptionContext, FilterMetadata, FilterOutcome, FilterPlan, ResourceExecutedContext,
    ResourceExecutingContext, ResourceNext, ResultExecutedContext, ResultExecutingContext,
    ResultNext,
};
use crate::logging::pipeline;
use crate::results::{ActionResult, EmptyResult};
use crate::{Error, Result};
use futures_util::future::BoxFuture;
use std::sync::Arc;
use std::time::Instant;

const AUTHORIZATION: &str = "authorization";
const RESOURCE: &str = "resource";
const ACTION: &str = "action";
const EXCEPTION: &str = "exception";
const RESULT: &str = "result";

fn diagnose(context: &ActionContext, name: &'static str, subject: Option<&str>) {
    context.services.diagnostics.write(name, || DiagnosticEvent {
        name,
        action: &context.action.display_name,
        trace_identifier: &context.trace_identifier,
        subject,
    });
}

fn before_hook(context: &ActionContext, event: &'static str, stage: &str, hook: &str, filter: &str) {
    pipeline::before_filter(stage, hook, filter);
    diagnose(context, event, Some(filter));
}

fn after_hook(context: &ActionContext, event: &'static str, stage: &str, hook: &str, filter: &str) {
    pipeline::after_filter(stage, hook, filter);
    diagnose(context, event, Some(filter));
}

/// Runs an action through its filter pipeline.
///
/// Stages nest as authorization, then resource filters around everything
/// else; inside them the exception filters guard model binding, the action
/// filters and the action method, and the result filters wrap execution of
/// whatever result came out. Executing hooks run in plan order and executed
/// hooks unwind in reverse, short-circuit or not.
pub struct ActionInvoker {
    action: Arc<ActionDescriptor>,
    plan: Arc<FilterPlan>,
}

impl ActionInvoker {
    pub fn new(action: Arc<ActionDescriptor>, plan: Arc<FilterPlan>) -> Self {
        Self { action, plan }
    }

    pub fn plan(&self) -> &FilterPlan {
        &self.plan
    }

    /// Execute the pipeline against `context`.
    ///
    /// Errors are exceptions no filter handled; turning them into a response
    /// is the host's job.
    pub async fn invoke(&self, context: &mut ActionContext) -> Result<()> {
        let started = Instant::now();
        let action = self.action.display_name.as_str();

        pipeline::executing_action(action, &context.trace_identifier);
        self.log_plan();
        diagnose(context, events::BEFORE_ACTION, None);

        let outcome = self.invoke_filters(context).await;

        diagnose(context, events::AFTER_ACTION, None);
        if let Err(e) = &outcome {
            pipeline::unhandled_exception(action, e.kind(), &e.to_string());
        }
        pipeline::executed_action(action, context.response.status.as_u16(), started.elapsed());
        outcome
    }

    fn log_plan(&self) {
        let action = self.action.display_name.as_str();
        let stages = [
            (AUTHORIZATION, &self.plan.authorization),
            (RESOURCE, &self.plan.resource),
            (ACTION, &self.plan.action),
            (EXCEPTION, &self.plan.exception),
            (RESULT, &self.plan.result),
        ];
        for (stage, filters) in stages {
            pipeline::filter_execution_plan(action, stage, &FilterPlan::stage_names(filters));
        }
    }

    async fn invoke_filters(&self, context: &mut ActionContext) -> Result<()> {
        context.ensure_not_aborted()?;

        if let Some(result) = self.invoke_authorization(context).await? {
            let (_, executed) = self
                .run_results(&self.plan.always_run_result, context, result)
                .await;
            return into_result(executed);
        }

        let mut executing = ResourceExecutingContext {
            action_context: &mut *context,
            filters: self.plan.filters(),
        };
        let mut executed = self.invoke_resource(0, &mut executing).await;

        if let Some(error) = executed.exception.take() {
            if !executed.exception_handled {
                return Err(error);
            }
            if let Some(result) = executed.result.take()
                && !context.response.has_started()
            {
                let (_, executed) = self
                    .run_results(&self.plan.always_run_result, context, result)
                    .await;
                return into_result(executed);
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Authorization
    // ------------------------------------------------------------------

    async fn invoke_authorization(
        &self,
        context: &mut ActionContext,
    ) -> Result<Option<Box<dyn ActionResult>>> {
        for filter in &self.plan.authorization {
            context.ensure_not_aborted()?;
            let name = filter.name();

            let mut auth = AuthorizationFilterContext {
                action_context: &mut *context,
                filters: self.plan.filters(),
            };
            let outcome = if let Some(f) = filter.as_async_authorization_filter() {
                before_hook(auth.action_context, events::BEFORE_ON_AUTHORIZATION, AUTHORIZATION, "OnAuthorizationAsync", name);
                let outcome = f.on_authorization_async(&mut auth).await;
                after_hook(auth.action_context, events::AFTER_ON_AUTHORIZATION, AUTHORIZATION, "OnAuthorizationAsync", name);
                outcome
            } else if let Some(f) = filter.as_authorization_filter() {
                before_hook(auth.action_context, events::BEFORE_ON_AUTHORIZATION, AUTHORIZATION, "OnAuthorization", name);
                let outcome = f.on_authorization(&mut auth);
                after_hook(auth.action_context, events::AFTER_ON_AUTHORIZATION, AUTHORIZATION, "OnAuthorization", name);
                outcome
            } else {
                continue;
            };

            if let FilterOutcome::ShortCircuit(result) = outcome? {
                pipeline::authorization_failure(name);
                pipeline::short_circuited(AUTHORIZATION, name);
                return Ok(Some(result));
            }
        }
        Ok(None)
    }

    // ------------------------------------------------------------------
    // Resource
    // ------------------------------------------------------------------

    pub(crate) fn invoke_resource<'s, 'b: 's>(
        &'s self,
        index: usize,
        ctx: &'s mut ResourceExecutingContext<'b>,
    ) -> BoxFuture<'s, ResourceExecutedContext> {
        Box::pin(async move {
            if let Err(e) = ctx.action_context.ensure_not_aborted() {
                return ResourceExecutedContext::failed(e);
            }
            let Some(filter) = self.plan.resource.get(index) else {
                return self.invoke_resource_inner(ctx.action_context).await;
            };
            let name = filter.name();

            if let Some(f) = filter.as_async_resource_filter() {
                before_hook(ctx.action_context, events::BEFORE_ON_RESOURCE_EXECUTION, RESOURCE, "OnResourceExecutionAsync", name);
                let next = ResourceNext {
                    invoker: self,
                    index: index + 1,
                };
                let mut executed = f
                    .on_resource_execution(ctx, next)
                    .await
                    .unwrap_or_else(ResourceExecutedContext::failed);
                after_hook(ctx.action_context, events::AFTER_ON_RESOURCE_EXECUTION, RESOURCE, "OnResourceExecutionAsync", name);

                if let Some(result) = executed.take_short_circuit() {
                    pipeline::short_circuited(RESOURCE, name);
                    let (result, outcome) = self
                        .run_results(&self.plan.always_run_result, ctx.action_context, result)
                        .await;
                    executed.result = Some(result);
                    if outcome.has_unhandled_exception() {
                        executed.exception = outcome.exception;
                    }
                }
                return executed;
            }

            let Some(f) = filter.as_resource_filter() else {
                return self.invoke_resource(index + 1, ctx).await;
            };

            before_hook(ctx.action_context, events::BEFORE_ON_RESOURCE_EXECUTING, RESOURCE, "OnResourceExecuting", name);
            let outcome = f.on_resource_executing(ctx);
            after_hook(ctx.action_context, events::AFTER_ON_RESOURCE_EXECUTING, RESOURCE, "OnResourceExecuting", name);

            let mut executed = match outcome {
                Err(e) => return ResourceExecutedContext::failed(e),
                Ok(FilterOutcome::ShortCircuit(result)) => {
                    pipeline::short_circuited(RESOURCE, name);
                    let (result, outcome) = self
                        .run_results(&self.plan.always_run_result, ctx.action_context, result)
                        .await;
                    let mut executed = ResourceExecutedContext::completed(Some(result));
                    executed.canceled = true;
                    if outcome.has_unhandled_exception() {
                        executed.exception = outcome.exception;
                    }
                    executed
                }
                Ok(FilterOutcome::Continue) => self.invoke_resource(index + 1, ctx).await,
            };

            before_hook(ctx.action_context, events::BEFORE_ON_RESOURCE_EXECUTED, RESOURCE, "OnResourceExecuted", name);
            if let Err(e) = f.on_resource_executed(&mut executed, ctx.action_context) {
                executed = ResourceExecutedContext::failed(e);
            }
            after_hook(ctx.action_context, events::AFTER_ON_RESOURCE_EXECUTED, RESOURCE, "OnResourceExecuted", name);
            executed
        })
    }

    /// Everything inside the resource filters: exception-guarded action
    /// region, then the result filters.
    async fn invoke_resource_inner(&self, context: &mut ActionContext) -> ResourceExecutedContext {
        let result = match self.invoke_exception_region(context).await {
            Ok(result) => result,
            Err(e) => return ResourceExecutedContext::failed(e),
        };

        let (result, outcome) = self.run_results(&self.plan.result, context, result).await;
        let mut executed = ResourceExecutedContext::completed(Some(result));
        if outcome.has_unhandled_exception() {
            executed.exception = outcome.exception;
        }
        executed
    }

    // ------------------------------------------------------------------
    // Exception
    // ------------------------------------------------------------------

    async fn invoke_exception_region(&self, context: &mut ActionContext) -> Result<Box<dyn ActionResult>> {
        let error = match self.invoke_action_region(context).await {
            Ok(result) => return Ok(result),
            Err(e) => e,
        };

        let mut exception = ExceptionContext {
            action_context: context,
            exception: Some(error),
            exception_handled: false,
            result: None,
        };

        for filter in &self.plan.exception {
            if exception.is_handled() {
                break;
            }
            let name = filter.name();
            let kind = exception.exception.as_ref().map_or("None", Error::kind);

            let hook = if let Some(f) = filter.as_async_exception_filter() {
                before_hook(exception.action_context, events::BEFORE_ON_EXCEPTION, EXCEPTION, "OnExceptionAsync", name);
                let hook = f.on_exception_async(&mut exception).await;
                after_hook(exception.action_context, events::AFTER_ON_EXCEPTION, EXCEPTION, "OnExceptionAsync", name);
                hook
            } else if let Some(f) = filter.as_exception_filter() {
                before_hook(exception.action_context, events::BEFORE_ON_EXCEPTION, EXCEPTION, "OnException", name);
                let hook = f.on_exception(&mut exception);
                after_hook(exception.action_context, events::AFTER_ON_EXCEPTION, EXCEPTION, "OnException", name);
                hook
            } else {
                continue;
            };
            hook?;

            if exception.is_handled() {
                pipeline::exception_filter_handled(name, kind);
            }
        }

        match (exception.is_handled(), exception.exception.take()) {
            (false, Some(error)) => Err(error),
            _ => Ok(exception
                .result
                .take()
                .unwrap_or_else(|| Box::new(EmptyResult))),
        }
    }

    // ------------------------------------------------------------------
    // Action
    // ------------------------------------------------------------------

    async fn invoke_action_region(&self, context: &mut ActionContext) -> Result<Box<dyn ActionResult>> {
        context.ensure_not_aborted()?;
        context.ensure_body_within_limit()?;

        let binder = context.services.binder.clone();
        let arguments = binder.bind(context).await?;

        let mut executing = ActionExecutingContext {
            action_context: context,
            arguments,
            filters: self.plan.filters(),
        };
        let mut executed = self.invoke_action(0, &mut executing).await;

        if let Some(error) = executed.exception.take()
            && !executed.exception_handled
        {
            return Err(error);
        }
        Ok(executed
            .result
            .take()
            .unwrap_or_else(|| Box::new(EmptyResult)))
    }

    pub(crate) fn invoke_action<'s, 'b: 's>(
        &'s self,
        index: usize,
        ctx: &'s mut ActionExecutingContext<'b>,
    ) -> BoxFuture<'s, ActionExecutedContext> {
        Box::pin(async move {
            if let Err(e) = ctx.action_context.ensure_not_aborted() {
                return ActionExecutedContext::failed(e);
            }
            let Some(filter) = self.plan.action.get(index) else {
                return match self.invoke_action_method(ctx).await {
                    Ok(result) => ActionExecutedContext::completed(result),
                    Err(e) => ActionExecutedContext::failed(e),
                };
            };
            let name = filter.name();

            if let Some(f) = filter.as_async_action_filter() {
                before_hook(ctx.action_context, events::BEFORE_ON_ACTION_EXECUTION, ACTION, "OnActionExecutionAsync", name);
                let next = ActionNext {
                    invoker: self,
                    index: index + 1,
                };
                let executed = f
                    .on_action_execution(ctx, next)
                    .await
                    .unwrap_or_else(ActionExecutedContext::failed);
                after_hook(ctx.action_context, events::AFTER_ON_ACTION_EXECUTION, ACTION, "OnActionExecutionAsync", name);

                if executed.is_short_circuit() {
                    pipeline::short_circuited(ACTION, name);
                }
                return executed;
            }

            let Some(f) = filter.as_action_filter() else {
                return self.invoke_action(index + 1, ctx).await;
            };

            before_hook(ctx.action_context, events::BEFORE_ON_ACTION_EXECUTING, ACTION, "OnActionExecuting", name);
            let outcome = f.on_action_executing(ctx);
            after_hook(ctx.action_context, events::AFTER_ON_ACTION_EXECUTING, ACTION, "OnActionExecuting", name);

            let mut executed = match outcome {
                Err(e) => return ActionExecutedContext::failed(e),
                Ok(FilterOutcome::ShortCircuit(result)) => {
                    pipeline::short_circuited(ACTION, name);
                    let mut executed = ActionExecutedContext::completed(result);
                    executed.canceled = true;
                    executed
                }
                Ok(FilterOutcome::Continue) => self.invoke_action(index + 1, ctx).await,
            };

            before_hook(ctx.action_context, events::BEFORE_ON_ACTION_EXECUTED, ACTION, "OnActionExecuted", name);
            if let Err(e) = f.on_action_executed(&mut executed, ctx.action_context) {
                executed = ActionExecutedContext::failed(e);
            }
            after_hook(ctx.action_context, events::AFTER_ON_ACTION_EXECUTED, ACTION, "OnActionExecuted", name);
            executed
        })
    }

    async fn invoke_action_method(&self, ctx: &mut ActionExecutingContext<'_>) -> Result<Box<dyn ActionResult>> {
        let started = Instant::now();
        let action = self.action.display_name.as_str();
        let handler = self.action.handler.clone();

        pipeline::executing_method(action, ctx.arguments.len());
        diagnose(ctx.action_context, events::BEFORE_ACTION_METHOD, None);

        let output = handler.invoke(ctx.action_context, &ctx.arguments).await;

        diagnose(ctx.action_context, events::AFTER_ACTION_METHOD, None);
        let outcome = if output.is_ok() { "completed" } else { "faulted" };
        pipeline::executed_method(action, outcome, started.elapsed());

        Ok(output?.into_result())
    }

    // ------------------------------------------------------------------
    // Result
    // ------------------------------------------------------------------

    /// Run `result` through `filters`, handing back whichever result finally ran.
    async fn run_results(
        &self,
        filters: &[Arc<dyn FilterMetadata>],
        context: &mut ActionContext,
        result: Box<dyn ActionResult>,
    ) -> (Box<dyn ActionResult>, ResultExecutedContext) {
        let mut executing = ResultExecutingContext {
            action_context: context,
            result,
            filters: self.plan.filters(),
        };
        let executed = self.invoke_result(filters, 0, &mut executing).await;
        (executing.result, executed)
    }

    pub(crate) fn invoke_result<'s, 'b: 's>(
        &'s self,
        filters: &'s [Arc<dyn FilterMetadata>],
        index: usize,
        ctx: &'s mut ResultExecutingContext<'b>,
    ) -> BoxFuture<'s, ResultExecutedContext> {
        Box::pin(async move {
            if let Err(e) = ctx.action_context.ensure_not_aborted() {
                return ResultExecutedContext::failed(e);
            }
            let Some(filter) = filters.get(index) else {
                return match self.execute_result(ctx).await {
                    Ok(()) => ResultExecutedContext::completed(),
                    Err(e) => ResultExecutedContext::failed(e),
                };
            };
            let name = filter.name();

            if let Some(f) = filter.as_async_result_filter() {
                before_hook(ctx.action_context, events::BEFORE_ON_RESULT_EXECUTION, RESULT, "OnResultExecutionAsync", name);
                let next = ResultNext {
                    invoker: self,
                    filters,
                    index: index + 1,
                };
                let executed = f
                    .on_result_execution(ctx, next)
                    .await
                    .unwrap_or_else(ResultExecutedContext::failed);
                after_hook(ctx.action_context, events::AFTER_ON_RESULT_EXECUTION, RESULT, "OnResultExecutionAsync", name);
                return executed;
            }

            let Some(f) = filter.as_result_filter() else {
                return self.invoke_result(filters, index + 1, ctx).await;
            };

            before_hook(ctx.action_context, events::BEFORE_ON_RESULT_EXECUTING, RESULT, "OnResultExecuting", name);
            let outcome = f.on_result_executing(ctx);
            after_hook(ctx.action_context, events::AFTER_ON_RESULT_EXECUTING, RESULT, "OnResultExecuting", name);

            let mut executed = match outcome {
                Err(e) => return ResultExecutedContext::failed(e),
                Ok(FilterOutcome::ShortCircuit(result)) => {
                    pipeline::short_circuited(RESULT, name);
                    ctx.result = result;
                    let mut executed = match self.execute_result(ctx).await {
                        Ok(()) => ResultExecutedContext::completed(),
                        Err(e) => ResultExecutedContext::failed(e),
                    };
                    executed.canceled = true;
                    executed
                }
                Ok(FilterOutcome::Continue) => self.invoke_result(filters, index + 1, ctx).await,
            };

            before_hook(ctx.action_context, events::BEFORE_ON_RESULT_EXECUTED, RESULT, "OnResultExecuted", name);
            if let Err(e) = f.on_result_executed(&mut executed, ctx.action_context) {
                executed = ResultExecutedContext::failed(e);
            }
            after_hook(ctx.action_context, events::AFTER_ON_RESULT_EXECUTED, RESULT, "OnResultExecuted", name);
            executed
        })
    }

    async fn execute_result(&self, ctx: &mut ResultExecutingContext<'_>) -> Result<()> {
        let name = ctx.result.name();
        pipeline::executing_result(name);
        diagnose(ctx.action_context, events::BEFORE_ACTION_RESULT, Some(name));

        let outcome = ctx.result.execute(ctx.action_context).await;

        diagnose(ctx.action_context, events::AFTER_ACTION_RESULT, Some(name));
        outcome
    }
}

fn into_result(executed: ResultExecutedContext) -> Result<()> {
    match executed.exception {
        Some(error) if !executed.exception_handled => Err(error),
        _ => Ok(()),
    }
}
