//! API errors and their HTTP mapping.
//!
//! Every failure leaves the gateway as `{"error": "<message>"}`.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use ragent_core::error::{Error, ProviderError, RetrievalError};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug)]
pub enum ApiError {
    /// The body could not be read or decoded as the expected JSON.
    Rejected(JsonRejection),
    /// A well-formed request with an invalid value.
    BadRequest(String),
    /// The turn failed.
    Agent(Error),
    /// Document ingestion failed.
    Ingest(RetrievalError),
}

impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        Self::Rejected(e)
    }
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        Self::Agent(e)
    }
}

impl From<RetrievalError> for ApiError {
    fn from(e: RetrievalError) -> Self {
        Self::Ingest(e)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Rejected(e) => e.status(),
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Agent(Error::Provider(ProviderError::Timeout(_))) => StatusCode::GATEWAY_TIMEOUT,
            Self::Agent(Error::Provider(ProviderError::NotConfigured(_))) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            Self::Agent(Error::Provider(_)) => StatusCode::BAD_GATEWAY,
            Self::Agent(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Ingest(RetrievalError::InvalidDocument(_)) => StatusCode::BAD_REQUEST,
            Self::Ingest(RetrievalError::EmbeddingFailed(_)) => StatusCode::BAD_GATEWAY,
            Self::Ingest(RetrievalError::Timeout { .. }) => StatusCode::GATEWAY_TIMEOUT,
            Self::Ingest(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn message(&self) -> String {
        match self {
            Self::Rejected(e) => e.body_text(),
            Self::BadRequest(m) => m.clone(),
            Self::Agent(e) => e.to_string(),
            Self::Ingest(e) => e.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.message();
        if status.is_server_error() {
            error!(status = status.as_u16(), error = %message, "Request failed");
        } else {
            warn!(status = status.as_u16(), error = %message, "Request rejected");
        }
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_failures_are_bad_gateway() {
        let err = ApiError::from(Error::Provider(ProviderError::Network("refused".into())));
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);

        let err = ApiError::from(Error::Provider(ProviderError::Timeout("120s".into())));
        assert_eq!(err.status(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[test]
    fn invalid_document_is_client_error() {
        let err = ApiError::from(RetrievalError::InvalidDocument("content is empty".into()));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let err = ApiError::from(RetrievalError::Storage("down".into()));
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
