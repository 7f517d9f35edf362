use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Data source not found: {0}")]
    NotFound(String),

    #[error("API returned error (HTTP {status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("Request failed: {0}")]
    Transport(String),
}

impl ApiError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound(_) | ApiError::ApiError { status: 404, .. })
    }
}
