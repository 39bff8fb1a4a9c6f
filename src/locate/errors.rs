use thiserror::Error;

#[derive(Error, Debug)]
pub enum LocateError {
    #[error("invalid declaration pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("declaration not found: {target}")]
    NotFound { target: String },
}
