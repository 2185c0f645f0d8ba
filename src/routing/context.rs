//! Read-only request view handed to routers.

use axum::http::{header, Method, Request};

/// What a router is allowed to see about a request.
///
/// Built once per request before resolution and never mutated by it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    method: Method,
    host: Option<String>,
    path: String,
    protocol: String,
}

impl RequestContext {
    /// Create a context from its parts.
    pub fn new(
        method: Method,
        host: Option<&str>,
        path: impl Into<String>,
        protocol: impl Into<String>,
    ) -> Self {
        Self {
            method,
            host: host.map(str::to_string),
            path: path.into(),
            protocol: protocol.into(),
        }
    }

    /// Capture the routing-relevant parts of an inbound request.
    ///
    /// `protocol` is the literal of the already-terminated inbound
    /// connection (`"http:"` or `"https:"`). HTTP/2 requests carry no
    /// `Host` header, so the URI authority is used instead.
    pub fn from_request<B>(req: &Request<B>, protocol: &str) -> Self {
        let host = req
            .headers()
            .get(header::HOST)
            .and_then(|h| h.to_str().ok())
            .map(str::to_string)
            .or_else(|| req.uri().authority().map(|a| a.as_str().to_string()));

        Self {
            method: req.method().clone(),
            host,
            path: req.uri().path().to_string(),
            protocol: protocol.to_string(),
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Raw `Host` header value, if the request carried one.
    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Protocol literal of the inbound connection.
    pub fn protocol(&self) -> &str {
        &self.protocol
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    #[test]
    fn test_from_request() {
        let req = Request::builder()
            .method(Method::POST)
            .uri("/api/users?limit=5")
            .header("Host", "alpha.localhost:6000")
            .body(Body::empty())
            .unwrap();

        let ctx = RequestContext::from_request(&req, "http:");
        assert_eq!(*ctx.method(), Method::POST);
        assert_eq!(ctx.host(), Some("alpha.localhost:6000"));
        assert_eq!(ctx.path(), "/api/users");
        assert_eq!(ctx.protocol(), "http:");
    }

    #[test]
    fn test_authority_fallback() {
        let req = Request::builder()
            .uri("https://beta.localhost:6000/x")
            .body(Body::empty())
            .unwrap();

        let ctx = RequestContext::from_request(&req, "https:");
        assert_eq!(ctx.host(), Some("beta.localhost:6000"));
    }

    #[test]
    fn test_missing_host() {
        let req = Request::builder().uri("/").body(Body::empty()).unwrap();
        assert_eq!(RequestContext::from_request(&req, "http:").host(), None);
    }
}
