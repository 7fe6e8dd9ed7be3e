use axum::{
    http::{Method, Uri},
    middleware,
    routing::{get, post},
    Json, Router,
};
use anyhow::Result;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;

use super::handlers::{create_message, generate_report, get_user, health, list_users, AppState};
use super::middleware::{
    exception_filter_middleware, identity_middleware, logging_middleware, throttle_middleware,
    LoggingInterceptor, Throttle,
};
use super::openapi::ApiDoc;
use crate::errors::ApiError;
use crate::filters::{ExceptionFilterPipeline, RateLimitPolicy};

/// Cross-cutting request layers, built once at startup
#[derive(Clone)]
pub struct LifecycleLayers {
    pub interceptor: LoggingInterceptor,
    pub throttle: Throttle,
    pub filters: Arc<ExceptionFilterPipeline>,
}

impl LifecycleLayers {
    pub fn new(policy: RateLimitPolicy) -> Result<Self> {
        Ok(Self {
            interceptor: LoggingInterceptor::new(),
            throttle: Throttle::new(&policy)?,
            filters: Arc::new(ExceptionFilterPipeline::standard(policy)),
        })
    }
}

pub fn create_router(state: AppState, layers: LifecycleLayers) -> Router {
    // Configure CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(health).fallback(method_not_allowed))
        // Demo API
        .route("/api/users", get(list_users).fallback(method_not_allowed))
        .route("/api/users/:id", get(get_user).fallback(method_not_allowed))
        .route("/api/messages", post(create_message).fallback(method_not_allowed))
        .route("/api/reports", get(generate_report).fallback(method_not_allowed))
        // OpenAPI documentation
        .route(
            "/api-docs/openapi.json",
            get(openapi_json).fallback(method_not_allowed),
        )
        .fallback(route_not_found)
        // Layers run outermost-last: identity -> filters -> throttle -> logging
        .layer(middleware::from_fn_with_state(
            layers.interceptor,
            logging_middleware,
        ))
        .layer(middleware::from_fn_with_state(
            layers.throttle,
            throttle_middleware,
        ))
        .layer(middleware::from_fn_with_state(
            layers.filters,
            exception_filter_middleware,
        ))
        .layer(middleware::from_fn(identity_middleware))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        // Add shared state
        .with_state(state)
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

async fn route_not_found(uri: Uri) -> ApiError {
    ApiError::not_found(format!("Route not found: {}", uri.path()))
}

async fn method_not_allowed(method: Method, uri: Uri) -> ApiError {
    ApiError::http(
        405,
        format!("Method not allowed: {} {}", method, uri.path()),
    )
}
