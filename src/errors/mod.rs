//! Error taxonomy, envelope construction and raised errors

pub mod codes;
pub mod exception;
pub mod response;

pub use codes::{code_for_raw_status, code_for_status, ErrorCode};
pub use exception::{ApiError, RaisedError};
pub use response::{ErrorEnvelope, FieldError};
