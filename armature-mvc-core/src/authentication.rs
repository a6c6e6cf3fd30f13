// Authentication collaborator contract
//
// The pipeline never authenticates anyone itself. Results such as
// `ChallengeResult` hand the work to an `AuthenticationService` registered in
// `ActionServices`.

use crate::{ActionContext, Result};
use async_trait::async_trait;
use std::collections::HashMap;

/// An authenticated (or anonymous) user.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Principal {
    /// Display name, usually the `name` claim
    pub name: Option<String>,
    /// Scheme that produced this identity; `None` means anonymous
    pub authentication_type: Option<String>,
    pub roles: Vec<String>,
    pub claims: Vec<(String, String)>,
}

impl Principal {
    /// An identity authenticated by `scheme`.
    pub fn authenticated(name: impl Into<String>, scheme: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            authentication_type: Some(scheme.into()),
            roles: Vec::new(),
            claims: Vec::new(),
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.push(role.into());
        self
    }

    pub fn with_claim(mut self, kind: impl Into<String>, value: impl Into<String>) -> Self {
        self.claims.push((kind.into(), value.into()));
        self
    }

    pub fn is_authenticated(&self) -> bool {
        self.authentication_type.is_some()
    }

    pub fn is_in_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    pub fn find_claim(&self, kind: &str) -> Option<&str> {
        self.claims
            .iter()
            .find(|(k, _)| k == kind)
            .map(|(_, v)| v.as_str())
    }
}

/// Extra state carried to the authentication handler.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuthenticationProperties {
    pub redirect_uri: Option<String>,
    pub is_persistent: bool,
    pub items: HashMap<String, String>,
}

impl AuthenticationProperties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_redirect_uri(mut self, uri: impl Into<String>) -> Self {
        self.redirect_uri = Some(uri.into());
        self
    }

    pub fn persistent(mut self, persistent: bool) -> Self {
        self.is_persistent = persistent;
        self
    }

    pub fn with_item(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.items.insert(key.into(), value.into());
        self
    }
}

/// Authentication handler entry points used by the authentication results.
///
/// `scheme == None` means "the default scheme". Implementations write the
/// response (status, `WWW-Authenticate`, redirects, cookies) themselves.
#[async_trait]
pub trait AuthenticationService: Send + Sync {
    async fn challenge(
        &self,
        context: &mut ActionContext,
        scheme: Option<&str>,
        properties: Option<&AuthenticationProperties>,
    ) -> Result<()>;

    async fn forbid(
        &self,
        context: &mut ActionContext,
        scheme: Option<&str>,
        properties: Option<&AuthenticationProperties>,
    ) -> Result<()>;

    async fn sign_in(
        &self,
        context: &mut ActionContext,
        scheme: Option<&str>,
        principal: &Principal,
        properties: Option<&AuthenticationProperties>,
    ) -> Result<()>;

    async fn sign_out(
        &self,
        context: &mut ActionContext,
        scheme: Option<&str>,
        properties: Option<&AuthenticationProperties>,
    ) -> Result<()>;
}
