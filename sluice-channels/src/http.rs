//! Request/response channel
//!
//! Outgoing requests are tagged with the namespace of the component that
//! issued them, and the driver echoes each request on its response. A
//! source sees responses to requests issued anywhere below its scope, so
//! a parent can still observe what its isolated children fetched while
//! siblings never see each other's responses.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sluice_core::{NarrowableSource, Scoped, ScopedChannel, Stream};
use sluice_types::ScopePath;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub method: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default)]
    pub namespace: ScopePath,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

impl Request {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            category: None,
            namespace: ScopePath::root(),
            body: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new("GET", url)
    }

    pub fn post(url: impl Into<String>, body: Value) -> Self {
        Self::new("POST", url).with_body(body)
    }

    /// Label used by `HttpSource::select`
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

impl Scoped for Request {
    fn tag(mut self, path: &ScopePath) -> Self {
        self.namespace = path.join(&self.namespace);
        self
    }

    fn untag(mut self) -> Self {
        self.namespace = ScopePath::root();
        self
    }

    fn scope(&self) -> &ScopePath {
        &self.namespace
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub request: Request,
    pub status: u16,
    #[serde(default)]
    pub body: Value,
}

impl Response {
    pub fn new(request: Request, status: u16, body: Value) -> Self {
        Self {
            request,
            status,
            body,
        }
    }

    pub fn ok(request: Request, body: Value) -> Self {
        Self::new(request, 200, body)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Queryable view of the responses the driver delivers
#[derive(Debug, Clone)]
pub struct HttpSource {
    responses: Stream<Response>,
    scope: ScopePath,
}

impl HttpSource {
    pub fn new(responses: Stream<Response>) -> Self {
        Self {
            responses,
            scope: ScopePath::root(),
        }
    }

    /// Responses to requests issued at or below this scope
    pub fn responses(&self) -> Stream<Response> {
        let scope = self.scope.clone();
        self.responses
            .filter(move |response| response.request.namespace.starts_with(&scope))
    }

    /// Visible responses whose request carried `category`
    pub fn select(&self, category: impl Into<String>) -> Stream<Response> {
        let category = category.into();
        self.responses().filter(move |response| {
            response.request.category.as_deref() == Some(category.as_str())
        })
    }
}

impl NarrowableSource for HttpSource {
    fn narrow(&self, path: &ScopePath) -> Self {
        Self {
            responses: self.responses.clone(),
            scope: self.scope.join(path),
        }
    }

    fn scope(&self) -> &ScopePath {
        &self.scope
    }
}

/// Isolation pair for the `HTTP` channel
pub type HttpChannel = ScopedChannel<HttpSource, Request>;
