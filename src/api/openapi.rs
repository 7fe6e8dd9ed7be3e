use utoipa::OpenApi;

use crate::api::handlers::{CreateMessage, MessageResponse, User};
use crate::errors::{ErrorCode, ErrorEnvelope, FieldError};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Request Lifecycle Service",
        version = "0.1.0",
        description = "Demo API wrapped in the request logging, throttling and exception filter layers. Every failure is answered with the same error envelope.",
    ),
    paths(
        crate::api::handlers::health,
        crate::api::handlers::list_users,
        crate::api::handlers::get_user,
        crate::api::handlers::create_message,
        crate::api::handlers::generate_report,
    ),
    components(
        schemas(
            ErrorEnvelope,
            ErrorCode,
            FieldError,
            User,
            CreateMessage,
            MessageResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "users", description = "User lookup"),
        (name = "messages", description = "Message submission"),
        (name = "reports", description = "Slow report generation"),
    )
)]
pub struct ApiDoc;
