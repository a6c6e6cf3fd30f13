// Test client

use armature_mvc_core::authentication::Principal;
use armature_mvc_core::{ActionDescriptor, Error, HttpRequest, HttpResponse, MvcApplication};
use http::Method;
use std::sync::Arc;

/// Sends requests to actions through a shared [`MvcApplication`].
#[derive(Clone)]
pub struct TestClient {
    app: Arc<MvcApplication>,
    user: Option<Principal>,
}

impl TestClient {
    pub fn new(app: Arc<MvcApplication>) -> Self {
        Self { app, user: None }
    }

    /// Send every following request as `user`.
    pub fn with_user(mut self, user: Principal) -> Self {
        self.user = Some(user);
        self
    }

    pub async fn send(&self, action: &Arc<ActionDescriptor>, request: HttpRequest) -> TestResponse {
        match self.app.handle(action, request, self.user.clone()).await {
            Ok(response) => TestResponse::Success(response),
            Err(error) => TestResponse::Error(error),
        }
    }

    pub async fn get(&self, action: &Arc<ActionDescriptor>, path: &str) -> TestResponse {
        self.send(action, HttpRequest::get(path)).await
    }

    pub async fn post(&self, action: &Arc<ActionDescriptor>, path: &str, body: Vec<u8>) -> TestResponse {
        self.send(action, HttpRequest::post(path).with_body(body)).await
    }
}

/// Builder for test requests
pub struct TestRequestBuilder {
    request: HttpRequest,
}

impl TestRequestBuilder {
    pub fn new(method: Method, path: &str) -> Self {
        Self {
            request: HttpRequest::new(method, path),
        }
    }

    pub fn header(mut self, key: &str, value: &str) -> Self {
        self.request = self.request.with_header(key, value);
        self
    }

    pub fn body(mut self, body: Vec<u8>) -> Self {
        self.request = self.request.with_body(body);
        self
    }

    /// Set a JSON body and its content type.
    pub fn json<T: serde::Serialize>(self, data: &T) -> Result<Self, Error> {
        let body = serde_json::to_vec(data)?;
        Ok(self.header("content-type", "application/json").body(body))
    }

    pub fn query(mut self, key: &str, value: &str) -> Self {
        self.request = self.request.with_query(key, value);
        self
    }

    pub fn build(self) -> HttpRequest {
        self.request
    }
}

/// Outcome of a test request: the response, or the error no filter handled.
#[derive(Debug)]
pub enum TestResponse {
    Success(HttpResponse),
    Error(Error),
}

impl TestResponse {
    pub fn assert_success(&self) -> &HttpResponse {
        match self {
            TestResponse::Success(response) => response,
            TestResponse::Error(error) => {
                panic!("Expected a response, got error: {:?}", error)
            }
        }
    }

    pub fn assert_error(&self) -> &Error {
        match self {
            TestResponse::Error(error) => error,
            TestResponse::Success(response) => {
                panic!("Expected an error, got response with status {}", response.status)
            }
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            TestResponse::Success(response) => Some(response.status.as_u16()),
            TestResponse::Error(_) => None,
        }
    }

    pub fn body_string(&self) -> Option<String> {
        match self {
            TestResponse::Success(response) => Some(response.body_string()),
            TestResponse::Error(_) => None,
        }
    }

    pub fn body_json<T: serde::de::DeserializeOwned>(&self) -> Result<T, String> {
        match self {
            TestResponse::Success(response) => response.body_json().map_err(|e| e.to_string()),
            TestResponse::Error(error) => Err(format!("{:?}", error)),
        }
    }

    pub fn header(&self, key: &str) -> Option<&str> {
        match self {
            TestResponse::Success(response) => response.header(key),
            TestResponse::Error(_) => None,
        }
    }
}
