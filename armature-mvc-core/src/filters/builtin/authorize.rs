// Authorization requirement and its anonymous escape hatch

use crate::filters::{AuthorizationFilter, AuthorizationFilterContext, FilterMetadata, FilterOutcome};
use crate::results::{ChallengeResult, ForbidResult};
use crate::{Error, Result};

/// Requires an authenticated caller, optionally in one of `roles`.
///
/// Unauthenticated callers are challenged; authenticated callers without a
/// matching role are forbidden. Both go through the given schemes, or the
/// default scheme when none are listed.
#[derive(Debug, Clone, Default)]
pub struct AuthorizeFilter {
    pub roles: Vec<String>,
    pub authentication_schemes: Vec<String>,
}

impl AuthorizeFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Caller must hold at least one of these roles.
    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles.extend(roles.into_iter().map(Into::into));
        self
    }

    pub fn with_schemes<I, S>(mut self, schemes: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for scheme in schemes {
            let scheme = scheme.into();
            if scheme.trim().is_empty() {
                return Err(Error::Configuration(
                    "Authentication scheme names must not be empty.".to_string(),
                ));
            }
            self.authentication_schemes.push(scheme);
        }
        Ok(self)
    }
}

impl AuthorizationFilter for AuthorizeFilter {
    fn on_authorization(&self, context: &mut AuthorizationFilterContext<'_>) -> Result<FilterOutcome> {
        if context.allows_anonymous() {
            return Ok(FilterOutcome::Continue);
        }

        let Some(user) = context
            .action_context
            .user
            .as_ref()
            .filter(|u| u.is_authenticated())
        else {
            let challenge = ChallengeResult::with_schemes(self.authentication_schemes.iter().cloned())?;
            return Ok(FilterOutcome::short_circuit(challenge));
        };

        if !self.roles.is_empty() && !self.roles.iter().any(|role| user.is_in_role(role)) {
            let forbid = ForbidResult::with_schemes(self.authentication_schemes.iter().cloned())?;
            return Ok(FilterOutcome::short_circuit(forbid));
        }
        Ok(FilterOutcome::Continue)
    }
}

impl FilterMetadata for AuthorizeFilter {
    fn name(&self) -> &str {
        "AuthorizeFilter"
    }

    fn as_authorization_filter(&self) -> Option<&dyn AuthorizationFilter> {
        Some(self)
    }
}

/// Opens an action to anonymous callers regardless of [`AuthorizeFilter`]s
/// declared further out.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAnonymousFilter;

impl FilterMetadata for AllowAnonymousFilter {
    fn name(&self) -> &str {
        "AllowAnonymousFilter"
    }

    fn allows_anonymous(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authentication::Principal;
    use crate::filters::builtin::test_support::context;
    use crate::HttpRequest;
    use std::sync::Arc;

    fn authorize(
        filter: &AuthorizeFilter,
        user: Option<Principal>,
        filters: &[Arc<dyn FilterMetadata>],
    ) -> Option<String> {
        let mut ctx = context(HttpRequest::get("/")).with_user(user);
        let mut auth = AuthorizationFilterContext {
            action_context: &mut ctx,
            filters,
        };
        match filter.on_authorization(&mut auth).unwrap() {
            FilterOutcome::Continue => None,
            FilterOutcome::ShortCircuit(result) => Some(result.name().to_string()),
        }
    }

    #[test]
    fn test_anonymous_is_challenged() {
        let filter = AuthorizeFilter::new();
        assert_eq!(authorize(&filter, None, &[]).as_deref(), Some("ChallengeResult"));
        assert_eq!(
            authorize(&filter, Some(Principal::anonymous()), &[]).as_deref(),
            Some("ChallengeResult")
        );
    }

    #[test]
    fn test_authenticated_passes() {
        let user = Principal::authenticated("ada", "Cookies");
        assert_eq!(authorize(&AuthorizeFilter::new(), Some(user), &[]), None);
    }

    #[test]
    fn test_missing_role_is_forbidden() {
        let filter = AuthorizeFilter::new().with_roles(["admin", "ops"]);
        let user = Principal::authenticated("ada", "Cookies");
        assert_eq!(authorize(&filter, Some(user), &[]).as_deref(), Some("ForbidResult"));

        let user = Principal::authenticated("ada", "Cookies").with_role("ops");
        assert_eq!(authorize(&filter, Some(user), &[]), None);
    }

    #[test]
    fn test_allow_anonymous_skips() {
        let filters: Vec<Arc<dyn FilterMetadata>> = vec![Arc::new(AllowAnonymousFilter)];
        assert_eq!(authorize(&AuthorizeFilter::new(), None, &filters), None);
    }

    #[test]
    fn test_blank_scheme_rejected() {
        assert!(AuthorizeFilter::new().with_schemes(["Bearer"]).is_ok());
        assert!(matches!(
            AuthorizeFilter::new().with_schemes([""]),
            Err(Error::Configuration(_))
        ));
    }
}
