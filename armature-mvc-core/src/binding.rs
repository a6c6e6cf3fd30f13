// Argument binding seam
//
// Model binding proper is an external collaborator. The pipeline only needs
// something that turns the request into named arguments and records
// validation errors in `ModelState`; `DefaultArgumentBinder` covers route,
// query, header and JSON body parameters.

use crate::{ActionContext, Arguments, Result};
use async_trait::async_trait;
use serde_json::Value;

/// Where a parameter's value comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingSource {
    /// Route values, then the query string
    Route,
    Query,
    Header,
    /// The whole request body, parsed as JSON
    Body,
}

/// A named action parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterDescriptor {
    pub name: String,
    pub source: BindingSource,
    pub required: bool,
}

impl ParameterDescriptor {
    pub fn new(name: impl Into<String>, source: BindingSource) -> Self {
        Self {
            name: name.into(),
            source,
            required: false,
        }
    }

    pub fn route(name: impl Into<String>) -> Self {
        Self::new(name, BindingSource::Route)
    }

    pub fn query(name: impl Into<String>) -> Self {
        Self::new(name, BindingSource::Query)
    }

    pub fn header(name: impl Into<String>) -> Self {
        Self::new(name, BindingSource::Header)
    }

    pub fn body(name: impl Into<String>) -> Self {
        Self::new(name, BindingSource::Body)
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

/// Produces action arguments from the request.
///
/// Binding failures that the client caused belong in `context.model_state`;
/// an `Err` aborts the request.
#[async_trait]
pub trait ArgumentBinder: Send + Sync {
    async fn bind(&self, context: &mut ActionContext) -> Result<Arguments>;
}

/// Binds parameters declared on the action descriptor.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultArgumentBinder;

impl DefaultArgumentBinder {
    fn lookup(context: &ActionContext, parameter: &ParameterDescriptor) -> Option<Value> {
        match parameter.source {
            BindingSource::Route => context
                .route_values
                .get(&parameter.name)
                .or_else(|| context.request.query_value(&parameter.name))
                .map(scalar),
            BindingSource::Query => context.request.query_value(&parameter.name).map(scalar),
            BindingSource::Header => context.request.header(&parameter.name).map(scalar),
            BindingSource::Body => None,
        }
    }
}

#[async_trait]
impl ArgumentBinder for DefaultArgumentBinder {
    async fn bind(&self, context: &mut ActionContext) -> Result<Arguments> {
        let mut arguments = Arguments::new();
        let parameters = context.action.parameters.clone();

        for parameter in &parameters {
            let value = if parameter.source == BindingSource::Body {
                if context.request.body.is_empty() {
                    None
                } else {
                    match serde_json::from_slice::<Value>(&context.request.body) {
                        Ok(value) => Some(value),
                        Err(e) => {
                            context
                                .model_state
                                .add_error(parameter.name.clone(), format!("Invalid JSON body: {}", e));
                            continue;
                        }
                    }
                }
            } else {
                Self::lookup(context, parameter)
            };

            match value {
                Some(value) => {
                    arguments.insert(parameter.name.clone(), value);
                }
                None if parameter.required => {
                    context.model_state.add_error(
                        parameter.name.clone(),
                        format!("The {} field is required.", parameter.name),
                    );
                }
                None => {}
            }
        }

        Ok(arguments)
    }
}

/// Numbers and booleans bind as JSON scalars; everything else stays a string.
fn scalar(raw: &str) -> Value {
    if let Ok(n) = raw.parse::<i64>() {
        return Value::from(n);
    }
    if let Ok(n) = raw.parse::<f64>()
        && n.is_finite()
    {
        return Value::from(n);
    }
    match raw {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::String(raw.to_string()),
    }
}
