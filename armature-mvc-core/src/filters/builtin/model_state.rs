// Automatic 400 for invalid model state

use crate::filters::{ActionExecutingContext, ActionFilter, FilterMetadata, FilterOutcome};
use crate::results::{ObjectResult, ValidationProblemDetails};
use crate::Result;

/// Answers 400 with the binding errors before the action runs.
///
/// Runs at order -2000 so user action filters with the default order see
/// only valid requests.
#[derive(Debug, Clone, Copy, Default)]
pub struct ModelStateInvalidFilter;

impl ModelStateInvalidFilter {
    pub const ORDER: i32 = -2000;
}

impl ActionFilter for ModelStateInvalidFilter {
    fn on_action_executing(&self, context: &mut ActionExecutingContext<'_>) -> Result<FilterOutcome> {
        let model_state = &context.action_context.model_state;
        if model_state.is_valid() {
            return Ok(FilterOutcome::Continue);
        }

        let mut details = ValidationProblemDetails::from_model_state(model_state);
        details.problem.instance = Some(context.action_context.request.path.clone());
        Ok(FilterOutcome::short_circuit(ObjectResult::validation_problem(details)))
    }
}

impl FilterMetadata for ModelStateInvalidFilter {
    fn name(&self) -> &str {
        "ModelStateInvalidFilter"
    }

    fn order(&self) -> i32 {
        Self::ORDER
    }

    fn as_action_filter(&self) -> Option<&dyn ActionFilter> {
        Some(self)
    }
}
