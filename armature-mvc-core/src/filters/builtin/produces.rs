// Response content type constraint

use crate::filters::{FilterMetadata, FilterOutcome, ResultExecutingContext, ResultFilter};
use crate::media_type::MediaType;
use crate::{Error, Result};

/// Pins the content types an [`ObjectResult`](crate::results::ObjectResult)
/// may be formatted as, unless the result already names its own.
#[derive(Debug, Clone)]
pub struct ProducesFilter {
    pub content_types: Vec<MediaType>,
}

impl ProducesFilter {
    /// Wildcards are rejected; a response has one concrete type.
    pub fn new(content_types: &[&str]) -> Result<Self> {
        let mut parsed = Vec::with_capacity(content_types.len());
        for raw in content_types {
            let media_type = MediaType::parse(raw)
                .ok_or_else(|| Error::Configuration(format!("'{}' is not a valid media type.", raw)))?;
            if media_type.has_wildcard() {
                return Err(Error::Configuration(format!(
                    "The argument '{}' is invalid. Media types which match all types or match \
                     all subtypes are not supported.",
                    raw
                )));
            }
            parsed.push(media_type);
        }
        if parsed.is_empty() {
            return Err(Error::Configuration(
                "At least one content type must be declared.".to_string(),
            ));
        }
        Ok(Self { content_types: parsed })
    }
}

impl ResultFilter for ProducesFilter {
    fn on_result_executing(&self, context: &mut ResultExecutingContext<'_>) -> Result<FilterOutcome> {
        if let Some(object) = context.result.as_object_result_mut()
            && object.content_types.is_empty()
        {
            object.content_types = self.content_types.clone();
        }
        Ok(FilterOutcome::Continue)
    }
}

impl FilterMetadata for ProducesFilter {
    fn name(&self) -> &str {
        "ProducesFilter"
    }

    fn as_result_filter(&self) -> Option<&dyn ResultFilter> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::builtin::test_support::context;
    use crate::results::{ActionResult, ObjectResult, StatusCodeResult};
    use crate::HttpRequest;

    fn apply(filter: &ProducesFilter, result: Box<dyn ActionResult>) -> Box<dyn ActionResult> {
        let mut ctx = context(HttpRequest::get("/"));
        let mut executing = ResultExecutingContext {
            action_context: &mut ctx,
            result,
            filters: &[],
        };
        filter.on_result_executing(&mut executing).unwrap();
        executing.result
    }

    #[test]
    fn test_sets_content_types() {
        let filter = ProducesFilter::new(&["text/plain"]).unwrap();
        let result = apply(&filter, Box::new(ObjectResult::new(serde_json::json!("hi"))));
        let object = result.as_object_result().unwrap();
        assert_eq!(object.content_types, vec![MediaType::plain_text()]);
    }

    #[test]
    fn test_keeps_explicit_content_types() {
        let filter = ProducesFilter::new(&["text/plain"]).unwrap();
        let result = ObjectResult::new(serde_json::json!(1)).with_content_type(MediaType::json());
        let result = apply(&filter, Box::new(result));
        assert_eq!(result.as_object_result().unwrap().content_types, vec![MediaType::json()]);
    }

    #[test]
    fn test_ignores_other_results() {
        let filter = ProducesFilter::new(&["application/json"]).unwrap();
        let result = apply(&filter, Box::new(StatusCodeResult::no_content()));
        assert!(result.as_object_result().is_none());
    }

    #[test]
    fn test_wildcards_rejected() {
        assert!(matches!(ProducesFilter::new(&["application/*"]), Err(Error::Configuration(_))));
        assert!(ProducesFilter::new(&["*/*"]).is_err());
        assert!(ProducesFilter::new(&[]).is_err());
    }
}
