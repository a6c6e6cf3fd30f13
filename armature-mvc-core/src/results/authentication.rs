// Results that hand the response to the authentication service

use super::{ActionResult, ObjectResult};
use crate::authentication::{AuthenticationProperties, Principal};
use crate::{ActionContext, Error, Result};
use async_trait::async_trait;
use http::StatusCode;

fn validate_schemes(schemes: &[String]) -> Result<()> {
    if schemes.iter().any(|s| s.trim().is_empty()) {
        return Err(Error::Configuration(
            "Authentication scheme names must not be empty.".to_string(),
        ));
    }
    Ok(())
}

/// Asks each scheme (or the default one) to challenge the caller.
#[derive(Debug, Clone, Default)]
pub struct ChallengeResult {
    pub authentication_schemes: Vec<String>,
    pub properties: Option<AuthenticationProperties>,
}

impl ChallengeResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_schemes<I, S>(schemes: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let authentication_schemes: Vec<String> = schemes.into_iter().map(Into::into).collect();
        validate_schemes(&authentication_schemes)?;
        Ok(Self {
            authentication_schemes,
            properties: None,
        })
    }

    pub fn with_properties(mut self, properties: AuthenticationProperties) -> Self {
        self.properties = Some(properties);
        self
    }
}

#[async_trait]
impl ActionResult for ChallengeResult {
    async fn execute(&self, context: &mut ActionContext) -> Result<()> {
        let auth = context.authentication()?;
        let properties = self.properties.as_ref();

        if self.authentication_schemes.is_empty() {
            return auth.challenge(context, None, properties).await;
        }
        for scheme in &self.authentication_schemes {
            auth.challenge(context, Some(scheme), properties).await?;
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "ChallengeResult"
    }
}

/// Asks each scheme (or the default one) to forbid the caller, optionally
/// followed by a formatted body.
#[derive(Debug, Clone, Default)]
pub struct ForbidResult {
    pub authentication_schemes: Vec<String>,
    pub properties: Option<AuthenticationProperties>,
    /// Written through the object result executor after forbidding
    pub body: Option<ObjectResult>,
}

impl ForbidResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_schemes<I, S>(schemes: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let authentication_schemes: Vec<String> = schemes.into_iter().map(Into::into).collect();
        validate_schemes(&authentication_schemes)?;
        Ok(Self {
            authentication_schemes,
            ..Default::default()
        })
    }

    pub fn with_properties(mut self, properties: AuthenticationProperties) -> Self {
        self.properties = Some(properties);
        self
    }

    /// Also write `value` as a negotiated 403 body.
    pub fn with_body(mut self, value: serde_json::Value) -> Self {
        self.body = Some(ObjectResult::new(value).with_status(StatusCode::FORBIDDEN));
        self
    }
}

#[async_trait]
impl ActionResult for ForbidResult {
    async fn execute(&self, context: &mut ActionContext) -> Result<()> {
        let auth = context.authentication()?;
        let properties = self.properties.as_ref();

        if self.authentication_schemes.is_empty() {
            auth.forbid(context, None, properties).await?;
        } else {
            for scheme in &self.authentication_schemes {
                auth.forbid(context, Some(scheme), properties).await?;
            }
        }

        if let Some(body) = &self.body {
            let executor = context.services.object_result_executor.clone();
            executor.execute(context, body).await?;
        }
        Ok(())
    }

    fn name(&self) -> &str {
        if self.body.is_some() {
            "ForbidObjectResult"
        } else {
            "ForbidResult"
        }
    }
}

/// Signs `principal` in with the given (or default) scheme.
#[derive(Debug, Clone)]
pub struct SignInResult {
    pub authentication_scheme: Option<String>,
    pub principal: Principal,
    pub properties: Option<AuthenticationProperties>,
}

impl SignInResult {
    pub fn new(principal: Principal) -> Self {
        Self {
            authentication_scheme: None,
            principal,
            properties: None,
        }
    }

    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.authentication_scheme = Some(scheme.into());
        self
    }

    pub fn with_properties(mut self, properties: AuthenticationProperties) -> Self {
        self.properties = Some(properties);
        self
    }
}

#[async_trait]
impl ActionResult for SignInResult {
    async fn execute(&self, context: &mut ActionContext) -> Result<()> {
        let auth = context.authentication()?;
        auth.sign_in(
            context,
            self.authentication_scheme.as_deref(),
            &self.principal,
            self.properties.as_ref(),
        )
        .await
    }

    fn name(&self) -> &str {
        "SignInResult"
    }
}

/// Signs the caller out of each scheme (or the default one).
#[derive(Debug, Clone, Default)]
pub struct SignOutResult {
    pub authentication_schemes: Vec<String>,
    pub properties: Option<AuthenticationProperties>,
}

impl SignOutResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_schemes<I, S>(schemes: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let authentication_schemes: Vec<String> = schemes.into_iter().map(Into::into).collect();
        validate_schemes(&authentication_schemes)?;
        Ok(Self {
            authentication_schemes,
            properties: None,
        })
    }

    pub fn with_properties(mut self, properties: AuthenticationProperties) -> Self {
        self.properties = Some(properties);
        self
    }
}

#[async_trait]
impl ActionResult for SignOutResult {
    async fn execute(&self, context: &mut ActionContext) -> Result<()> {
        let auth = context.authentication()?;
        let properties = self.properties.as_ref();

        if self.authentication_schemes.is_empty() {
            return auth.sign_out(context, None, properties).await;
        }
        for scheme in &self.authentication_schemes {
            auth.sign_out(context, Some(scheme), properties).await?;
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "SignOutResult"
    }
}
