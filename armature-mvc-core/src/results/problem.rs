//! RFC 7807 problem details bodies.

use crate::context::ModelState;
use http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// RFC 7807 Problem Details.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProblemDetails {
    /// URI reference identifying the problem type
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
    /// Additional members such as `traceId`
    #[serde(flatten)]
    pub extensions: BTreeMap<String, Value>,
}

impl ProblemDetails {
    pub fn new() -> Self {
        Self::default()
    }

    /// Problem with the default type link and title for `status`.
    pub fn for_status(status: StatusCode) -> Self {
        Self {
            type_uri: default_type(status),
            title: status.canonical_reason().map(str::to_string),
            status: Some(status.as_u16()),
            ..Default::default()
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_instance(mut self, instance: impl Into<String>) -> Self {
        self.instance = Some(instance.into());
        self
    }

    pub fn with_extension(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extensions.insert(key.into(), value.into());
        self
    }

    pub fn to_value(&self) -> Value {
        // string keys and JSON values only, so this cannot fail
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Problem details carrying per-field validation errors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationProblemDetails {
    #[serde(flatten)]
    pub problem: ProblemDetails,
    pub errors: BTreeMap<String, Vec<String>>,
}

impl ValidationProblemDetails {
    pub const TITLE: &'static str = "One or more validation errors occurred.";

    pub fn new(errors: BTreeMap<String, Vec<String>>) -> Self {
        Self {
            problem: ProblemDetails::for_status(StatusCode::BAD_REQUEST).with_title(Self::TITLE),
            errors,
        }
    }

    pub fn from_model_state(model_state: &ModelState) -> Self {
        Self::new(model_state.errors().clone())
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// RFC 9110 section links for the statuses problem bodies commonly carry.
fn default_type(status: StatusCode) -> Option<String> {
    let section = match status.as_u16() {
        400 => "15.5.1",
        401 => "15.5.2",
        403 => "15.5.4",
        404 => "15.5.5",
        405 => "15.5.6",
        406 => "15.5.7",
        408 => "15.5.9",
        409 => "15.5.10",
        412 => "15.5.13",
        413 => "15.5.14",
        415 => "15.5.16",
        416 => "15.5.17",
        422 => "15.5.21",
        500 => "15.6.1",
        501 => "15.6.2",
        502 => "15.6.3",
        503 => "15.6.4",
        504 => "15.6.5",
        _ => return None,
    };
    Some(format!("https://tools.ietf.org/html/rfc9110#section-{}", section))
}
