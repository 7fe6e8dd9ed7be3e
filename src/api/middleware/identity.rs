use axum::{extract::Request, http::HeaderValue, middleware::Next, response::Response};
use uuid::Uuid;

use crate::context::{AuthenticatedUser, REQUEST_ID_HEADER};

/// Header a trusted gateway uses to pass the authenticated user id
pub const USER_ID_HEADER: &str = "x-user-id";

/// Assign a request id when the client sent none and expose the caller's
/// identity to the layers below.
pub async fn identity_middleware(mut request: Request, next: Next) -> Response {
    let request_id = match request.headers().get(REQUEST_ID_HEADER) {
        Some(existing) => existing.clone(),
        None => {
            let generated = HeaderValue::from_str(&Uuid::new_v4().to_string())
                .unwrap_or_else(|_| HeaderValue::from_static("unknown"));
            request
                .headers_mut()
                .insert(REQUEST_ID_HEADER, generated.clone());
            generated
        }
    };

    let user_id = request
        .headers()
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string);
    if let Some(id) = user_id {
        request.extensions_mut().insert(AuthenticatedUser { id });
    }

    let mut response = next.run(request).await;
    response.headers_mut().insert(REQUEST_ID_HEADER, request_id);
    response
}
