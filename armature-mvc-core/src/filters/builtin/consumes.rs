// Request content type constraint

use crate::filters::{
    FilterMetadata, FilterOutcome, PolicyKind, ResourceExecutingContext, ResourceFilter,
};
use crate::media_type::{MediaType, join_media_types};
use crate::results::StatusCodeResult;
use crate::{Error, Result};
use http::StatusCode;

/// Restricts the request `Content-Type` to a declared set; anything else
/// gets 415.
#[derive(Debug, Clone)]
pub struct ConsumesFilter {
    pub content_types: Vec<MediaType>,
    /// Requests without a content type are let through
    pub is_optional: bool,
}

impl ConsumesFilter {
    pub fn new(content_types: &[&str]) -> Result<Self> {
        if content_types.is_empty() {
            return Err(Error::Configuration(
                "At least one content type must be declared.".to_string(),
            ));
        }
        let content_types = content_types
            .iter()
            .map(|raw| {
                MediaType::parse(raw).ok_or_else(|| {
                    Error::Configuration(format!("'{}' is not a valid media type.", raw))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            content_types,
            is_optional: false,
        })
    }

    pub fn optional(mut self, optional: bool) -> Self {
        self.is_optional = optional;
        self
    }

    fn accepts(&self, content_type: Option<&str>) -> bool {
        match content_type {
            None => self.is_optional,
            Some(raw) => MediaType::parse(raw).is_some_and(|requested| {
                self.content_types
                    .iter()
                    .any(|declared| requested.is_subset_of(declared))
            }),
        }
    }
}

impl ResourceFilter for ConsumesFilter {
    fn on_resource_executing(&self, context: &mut ResourceExecutingContext<'_>) -> Result<FilterOutcome> {
        if self.accepts(context.action_context.request.content_type()) {
            return Ok(FilterOutcome::Continue);
        }
        tracing::debug!(
            content_type = context.action_context.request.content_type().unwrap_or(""),
            consumes = %join_media_types(&self.content_types),
            "Unsupported request content type"
        );
        Ok(FilterOutcome::short_circuit(StatusCodeResult::new(
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
        )))
    }
}

impl FilterMetadata for ConsumesFilter {
    fn name(&self) -> &str {
        "ConsumesFilter"
    }

    fn policy(&self) -> Option<PolicyKind> {
        Some(PolicyKind::Consumes)
    }

    fn as_resource_filter(&self) -> Option<&dyn ResourceFilter> {
        Some(self)
    }
}
