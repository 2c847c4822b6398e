//! Service level errors

/// Failure of a service operation. The API layer maps every variant to a status code.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{0}")]
    BadRequest(String),

    #[error("authentication required")]
    Unauthenticated,

    #[error("{0}")]
    Unauthorized(String),

    #[error("insufficient permissions")]
    Forbidden,

    #[error("{0} not found")]
    NotFound(&'static str),

    /// Unknown or deactivated tenant on a public endpoint.
    #[error("tenant not found or inactive")]
    TenantUnavailable,

    #[error("{0}")]
    Conflict(String),

    /// The external catalogue service could not complete the named operation.
    #[error("{0} failed in the catalogue service")]
    Upstream(&'static str),

    #[error("database error")]
    Database(#[from] sqlx::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    pub fn bad_request(message: impl Into<String>) -> Error {
        Error::BadRequest(message.into())
    }
}
