use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use vault_checkout::{CheckoutError, FinalizeError};
use vault_reservation::ReservationError;

#[derive(Debug)]
pub enum AppError {
    AuthenticationError(String),
    ValidationError(String),
    NotFoundError(String),
    ConflictError(String),
    UpstreamError(String),
    Anyhow(anyhow::Error),
}

impl AppError {
    /// State-machine outcomes map onto the usual REST statuses: an unknown
    /// slot is 404, a lost race or terminal slot is 409.
    pub fn from_reservation(err: ReservationError) -> Self {
        match err {
            ReservationError::NotFound(_) => AppError::NotFoundError(err.to_string()),
            ReservationError::NotAvailable { .. }
            | ReservationError::NotReserved { .. }
            | ReservationError::AlreadySold(_) => AppError::ConflictError(err.to_string()),
            ReservationError::Store(e) => AppError::Anyhow(e.into()),
        }
    }

    pub fn from_checkout(err: CheckoutError) -> Self {
        match err {
            CheckoutError::MissingUser => AppError::AuthenticationError(err.to_string()),
            CheckoutError::MissingField(_) => AppError::ValidationError(err.to_string()),
            CheckoutError::SlotNotFound(_) => AppError::NotFoundError(err.to_string()),
            CheckoutError::NotReserved { .. } => AppError::ConflictError(err.to_string()),
            CheckoutError::Gateway(e) => AppError::UpstreamError(e.to_string()),
            CheckoutError::Store(e) => AppError::Anyhow(e.into()),
        }
    }

    pub fn from_finalize(err: FinalizeError) -> Self {
        match err {
            FinalizeError::Metadata(e) => AppError::ValidationError(e.to_string()),
            FinalizeError::Reservation(e) => AppError::from_reservation(e),
            FinalizeError::Store(e) => AppError::Anyhow(e.into()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::AuthenticationError(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFoundError(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::ConflictError(msg) => (StatusCode::CONFLICT, msg),
            AppError::UpstreamError(msg) => {
                tracing::error!("Payment gateway failure: {}", msg);
                (
                    StatusCode::BAD_GATEWAY,
                    "Payment gateway unavailable".to_string(),
                )
            }
            AppError::Anyhow(err) => {
                tracing::error!("Internal Server Error: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self::Anyhow(err.into())
    }
}
