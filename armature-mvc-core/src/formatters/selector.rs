// Content negotiation: choose a formatter and the content type it writes

use super::{OutputFormatter, OutputFormatterContext};
use crate::logging::pipeline;
use crate::media_type::{Accept, AcceptExt, MediaType, join_media_types};
use crate::{Error, Result};
use std::sync::Arc;

/// The formatter chosen for a result.
#[derive(Clone)]
pub struct FormatterSelection {
    pub formatter: Arc<dyn OutputFormatter>,
    /// Whether the Accept header decided the outcome; the response then
    /// varies by Accept.
    pub used_accept_header: bool,
}

/// Picks an output formatter for an object result.
pub trait OutputFormatterSelector: Send + Sync {
    /// On success `context.content_type` holds the content type to write.
    /// `Ok(None)` means nothing acceptable was found.
    fn select(
        &self,
        context: &mut OutputFormatterContext<'_>,
        formatters: &[Arc<dyn OutputFormatter>],
        content_types: &[MediaType],
    ) -> Result<Option<FormatterSelection>>;
}

/// The negotiation tiers, tried in order:
///
/// 1. Accept header and explicit content types together: the first accepted
///    media type (by quality) that contains an explicit type wins.
/// 2. Accept header alone, when the result has no explicit types.
/// 3. Explicit content types alone, when the Accept header is absent or
///    ignored, or negotiation failed and 406 is not requested.
/// 4. The first formatter that can write the value at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultOutputFormatterSelector;

impl DefaultOutputFormatterSelector {
    fn acceptable_media_types(context: &OutputFormatterContext<'_>) -> Accept {
        let accept = context.request.accept();
        if !context.options.respect_browser_accept_header && accept.contains_any() {
            pipeline::ignored_accept_header();
            return Accept::default();
        }
        accept
    }

    fn try_formatters(
        context: &mut OutputFormatterContext<'_>,
        formatters: &[Arc<dyn OutputFormatter>],
        content_type: Option<&MediaType>,
        server_defined: bool,
    ) -> Option<Arc<dyn OutputFormatter>> {
        for formatter in formatters {
            context.content_type = content_type.cloned();
            context.content_type_is_server_defined = server_defined;
            if formatter.can_write_result(context) {
                return Some(formatter.clone());
            }
        }
        None
    }

    fn using_accept_and_content_types(
        context: &mut OutputFormatterContext<'_>,
        formatters: &[Arc<dyn OutputFormatter>],
        accept: &Accept,
        content_types: &[MediaType],
    ) -> Option<Arc<dyn OutputFormatter>> {
        for (accepted, _) in &accept.media_types {
            for content_type in content_types {
                if content_type.is_subset_of(accepted)
                    && let Some(f) = Self::try_formatters(context, formatters, Some(content_type), true)
                {
                    return Some(f);
                }
            }
        }
        None
    }

    fn using_accept(
        context: &mut OutputFormatterContext<'_>,
        formatters: &[Arc<dyn OutputFormatter>],
        accept: &Accept,
    ) -> Option<Arc<dyn OutputFormatter>> {
        accept
            .media_types
            .iter()
            .find_map(|(accepted, _)| Self::try_formatters(context, formatters, Some(accepted), false))
    }

    fn using_any_content_type(
        context: &mut OutputFormatterContext<'_>,
        formatters: &[Arc<dyn OutputFormatter>],
        content_types: &[MediaType],
    ) -> Option<Arc<dyn OutputFormatter>> {
        for formatter in formatters {
            for content_type in content_types {
                context.content_type = Some(content_type.clone());
                context.content_type_is_server_defined = true;
                if formatter.can_write_result(context) {
                    return Some(formatter.clone());
                }
            }
        }
        None
    }
}

impl OutputFormatterSelector for DefaultOutputFormatterSelector {
    fn select(
        &self,
        context: &mut OutputFormatterContext<'_>,
        formatters: &[Arc<dyn OutputFormatter>],
        content_types: &[MediaType],
    ) -> Result<Option<FormatterSelection>> {
        if formatters.is_empty() {
            return Err(Error::Configuration(
                "At least one output formatter must be registered to format object results.".into(),
            ));
        }

        let accept = Self::acceptable_media_types(context);
        let mut selected = None;
        let mut used_accept_header = false;
        let mut ignore_accept = accept.is_empty();

        if !accept.is_empty() {
            selected = if content_types.is_empty() {
                Self::using_accept(context, formatters, &accept)
            } else {
                Self::using_accept_and_content_types(context, formatters, &accept, content_types)
            };

            if selected.is_some() {
                used_accept_header = true;
            } else if !context.options.return_http_not_acceptable {
                ignore_accept = true;
            }
        }

        if ignore_accept {
            selected = if content_types.is_empty() {
                Self::try_formatters(context, formatters, None, false)
            } else {
                Self::using_any_content_type(context, formatters, content_types)
            };
        }

        match selected {
            Some(formatter) => {
                let content_type = context
                    .content_type
                    .as_ref()
                    .map(MediaType::to_header_value)
                    .unwrap_or_default();
                pipeline::formatter_selected(formatter.name(), &content_type);
                Ok(Some(FormatterSelection {
                    formatter,
                    used_accept_header,
                }))
            }
            None => {
                let wanted = if content_types.is_empty() {
                    accept
                        .media_types
                        .iter()
                        .map(|(mt, _)| mt.clone())
                        .collect::<Vec<_>>()
                } else {
                    content_types.to_vec()
                };
                pipeline::no_formatter(&join_media_types(&wanted));
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formatters::{JsonOutputFormatter, NoContentOutputFormatter, StringOutputFormatter};
    use crate::{HttpRequest, MvcOptions};
    use serde_json::{Value, json};
    use tokio_util::sync::CancellationToken;

    fn formatters() -> Vec<Arc<dyn OutputFormatter>> {
        vec![
            Arc::new(NoContentOutputFormatter),
            Arc::new(StringOutputFormatter),
            Arc::new(JsonOutputFormatter),
        ]
    }

    fn select(
        request: &HttpRequest,
        options: &MvcOptions,
        value: &Value,
        content_types: &[MediaType],
    ) -> Option<(String, Option<MediaType>, bool)> {
        let token = CancellationToken::new();
        let mut context = OutputFormatterContext::new(request, options, value, &token);
        DefaultOutputFormatterSelector
            .select(&mut context, &formatters(), content_types)
            .unwrap()
            .map(|s| (s.formatter.name().to_string(), context.content_type.clone(), s.used_accept_header))
    }

    #[test]
    fn test_no_accept_uses_first_capable_formatter() {
        let request = HttpRequest::get("/");
        let (name, ct, via_accept) = select(&request, &MvcOptions::default(), &json!({"a": 1}), &[]).unwrap();
        assert_eq!(name, "JsonOutputFormatter");
        assert_eq!(ct, Some(MediaType::json()));
        assert!(!via_accept);
    }

    #[test]
    fn test_string_value_prefers_plain_text() {
        let request = HttpRequest::get("/");
        let (name, _, _) = select(&request, &MvcOptions::default(), &json!("hi"), &[]).unwrap();
        assert_eq!(name, "StringOutputFormatter");
    }

    #[test]
    fn test_accept_header_negotiation() {
        let request = HttpRequest::get("/").with_header("Accept", "text/json");
        let (name, ct, via_accept) =
            select(&request, &MvcOptions::default(), &json!("hi"), &[]).unwrap();
        assert_eq!(name, "JsonOutputFormatter");
        assert_eq!(ct, Some(MediaType::text_json()));
        assert!(via_accept);
    }

    #[test]
    fn test_browser_wildcard_accept_is_ignored() {
        let request = HttpRequest::get("/").with_header("Accept", "text/html, */*;q=0.8");
        let (name, _, via_accept) =
            select(&request, &MvcOptions::default(), &json!({"a": 1}), &[]).unwrap();
        assert_eq!(name, "JsonOutputFormatter");
        assert!(!via_accept);
    }

    #[test]
    fn test_unacceptable_falls_back_unless_406_requested() {
        let request = HttpRequest::get("/").with_header("Accept", "application/xml");
        let value = json!({"a": 1});

        let fallback = select(&request, &MvcOptions::default(), &value, &[]).unwrap();
        assert_eq!(fallback.0, "JsonOutputFormatter");

        let strict = MvcOptions::default().return_http_not_acceptable(true);
        assert!(select(&request, &strict, &value, &[]).is_none());
    }

    #[test]
    fn test_explicit_content_types_intersect_accept() {
        let request = HttpRequest::get("/")
            .with_header("Accept", "application/problem+json, application/json;q=0.5");
        let content_types = [MediaType::json(), MediaType::problem_json()];
        let (_, ct, via_accept) =
            select(&request, &MvcOptions::default(), &json!({}), &content_types).unwrap();
        assert_eq!(ct, Some(MediaType::problem_json()));
        assert!(via_accept);
    }

    #[test]
    fn test_explicit_content_types_without_accept() {
        let request = HttpRequest::get("/");
        let content_types = [MediaType::problem_json()];
        let (name, ct, _) =
            select(&request, &MvcOptions::default(), &json!({}), &content_types).unwrap();
        assert_eq!(name, "JsonOutputFormatter");
        assert_eq!(ct, Some(MediaType::problem_json()));
    }

    #[test]
    fn test_no_capable_formatter() {
        let request = HttpRequest::get("/");
        let content_types = [MediaType::new("application", "xml")];
        assert!(select(&request, &MvcOptions::default(), &json!({}), &content_types).is_none());
    }

    #[test]
    fn test_empty_formatter_list_is_a_configuration_error() {
        let request = HttpRequest::get("/");
        let options = MvcOptions::default();
        let token = CancellationToken::new();
        let value = json!(1);
        let mut context = OutputFormatterContext::new(&request, &options, &value, &token);
        let result = DefaultOutputFormatterSelector.select(&mut context, &[], &[]);
        assert!(matches!(result, Err(Error::Configuration(_))));
    }
}
