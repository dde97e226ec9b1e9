use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::storage::LedgerError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Session ID required")]
    SessionRequired,

    #[error("Access denied. Cast the secret spell correctly.")]
    AccessDenied,

    #[error("Source address could not be determined")]
    UnknownSource,

    #[error("Internal error: {0}")]
    Ledger(#[from] LedgerError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::SessionRequired => StatusCode::UNAUTHORIZED,
            AppError::AccessDenied => StatusCode::FORBIDDEN,
            AppError::UnknownSource => StatusCode::BAD_REQUEST,
            AppError::Ledger { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, self.to_string()).into_response()
    }
}
