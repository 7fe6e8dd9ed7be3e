//! Request middleware, outermost first: identity, exception filters,
//! throttling, request logging.

pub mod exception_filter;
pub mod identity;
pub mod logging;
pub mod throttle;

pub use exception_filter::exception_filter_middleware;
pub use identity::identity_middleware;
pub use logging::{logging_middleware, LoggingInterceptor};
pub use throttle::{throttle_middleware, Throttle};
