// Library exports for testing
pub mod api;
pub mod config;
pub mod context;
pub mod errors;
pub mod filters;
pub mod logging;
