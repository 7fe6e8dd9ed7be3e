//! Per-request metadata shared by the filters and the logging middleware

use axum::extract::ConnectInfo;
use axum::http::{HeaderMap, Request};
use std::net::SocketAddr;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Caller identity attached to the request by the authentication layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub id: String,
}

/// Read-only view of the inbound request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub method: String,
    pub path: String,
    pub client_ip: String,
    /// Empty when the header is absent
    pub user_agent: String,
    pub user_id: Option<String>,
    /// Empty when the client sent none
    pub request_id: String,
}

impl RequestContext {
    pub fn from_request<B>(request: &Request<B>) -> Self {
        let headers = request.headers();
        Self {
            method: request.method().as_str().to_string(),
            path: request.uri().path().to_string(),
            client_ip: client_ip(headers, request.extensions().get::<ConnectInfo<SocketAddr>>()),
            user_agent: header_str(headers, "user-agent").unwrap_or_default(),
            user_id: request
                .extensions()
                .get::<AuthenticatedUser>()
                .map(|u| u.id.clone()),
            request_id: header_str(headers, REQUEST_ID_HEADER).unwrap_or_default(),
        }
    }

    /// User id for log lines; `anonymous` when unauthenticated
    pub fn identity(&self) -> &str {
        match self.user_id.as_deref() {
            Some(id) if !id.is_empty() => id,
            _ => "anonymous",
        }
    }
}

fn header_str(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string())
}

fn client_ip(headers: &HeaderMap, connect_info: Option<&ConnectInfo<SocketAddr>>) -> String {
    // Proxies put the originating client first
    if let Some(first) = header_str(headers, "x-forwarded-for")
        .and_then(|v| v.split(',').next().map(|ip| ip.trim().to_string()))
        .filter(|ip| !ip.is_empty())
    {
        return first;
    }

    if let Some(real_ip) = header_str(headers, "x-real-ip") {
        return real_ip.trim().to_string();
    }

    connect_info
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
pub(crate) fn test_context(method: &str, path: &str) -> RequestContext {
    RequestContext {
        method: method.to_string(),
        path: path.to_string(),
        client_ip: "127.0.0.1".to_string(),
        user_agent: "test-agent".to_string(),
        user_id: None,
        request_id: "req-1".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    #[test]
    fn test_context_from_request() {
        let mut request = Request::builder()
            .method("POST")
            .uri("/api/messages?draft=true")
            .header("user-agent", "curl/7.68")
            .header("x-forwarded-for", "10.0.0.5, 172.16.0.1")
            .header(REQUEST_ID_HEADER, "abc-123")
            .body(Body::empty())
            .unwrap();
        request.extensions_mut().insert(AuthenticatedUser {
            id: "u42".to_string(),
        });

        let ctx = RequestContext::from_request(&request);
        assert_eq!(ctx.method, "POST");
        assert_eq!(ctx.path, "/api/messages");
        assert_eq!(ctx.client_ip, "10.0.0.5");
        assert_eq!(ctx.user_agent, "curl/7.68");
        assert_eq!(ctx.request_id, "abc-123");
        assert_eq!(ctx.identity(), "u42");
    }

    #[test]
    fn test_missing_headers_default() {
        let request = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();

        let ctx = RequestContext::from_request(&request);
        assert_eq!(ctx.method, "GET");
        assert_eq!(ctx.user_agent, "");
        assert_eq!(ctx.request_id, "");
        assert_eq!(ctx.client_ip, "unknown");
        assert_eq!(ctx.identity(), "anonymous");
    }

    #[test]
    fn test_connect_info_and_real_ip() {
        let mut request = Request::builder()
            .uri("/")
            .body(Body::empty())
            .unwrap();
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([192, 168, 1, 1], 4000))));
        assert_eq!(RequestContext::from_request(&request).client_ip, "192.168.1.1");

        request
            .headers_mut()
            .insert("x-real-ip", "203.0.113.9".parse().unwrap());
        assert_eq!(RequestContext::from_request(&request).client_ip, "203.0.113.9");
    }

    #[test]
    fn test_empty_user_id_is_anonymous() {
        let mut ctx = test_context("GET", "/");
        ctx.user_id = Some(String::new());
        assert_eq!(ctx.identity(), "anonymous");
    }
}
