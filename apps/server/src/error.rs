use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use marketdesk_gateway::{FailureClass, GatewayError};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Gateway(#[from] GatewayError),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    BadRequest(String),
}

#[derive(Serialize)]
struct ErrorBody {
    code: u16,
    message: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Gateway(e) => match e.class() {
                FailureClass::RateLimited => StatusCode::TOO_MANY_REQUESTS,
                FailureClass::Connectivity => StatusCode::SERVICE_UNAVAILABLE,
                FailureClass::NotFound => StatusCode::NOT_FOUND,
                FailureClass::Auth | FailureClass::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        } else {
            tracing::debug!("Request failed: {}", self);
        }
        let body = Json(ErrorBody {
            code: status.as_u16(),
            message: self.to_string(),
        });
        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use marketdesk_gateway::SourceFailure;

    fn status_of(error: GatewayError) -> StatusCode {
        ApiError::from(error).status()
    }

    #[test]
    fn test_failure_classes_map_to_statuses() {
        let provider = "FRED".to_string();
        assert_eq!(
            status_of(GatewayError::RateLimited {
                provider: provider.clone()
            }),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            status_of(GatewayError::Timeout {
                provider: provider.clone()
            }),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_of(GatewayError::NotFound {
                provider: provider.clone(),
                resource: "DFF".to_string()
            }),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(GatewayError::AuthFailure {
                provider,
                message: "invalid_client".to_string()
            }),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_of(GatewayError::Configuration("missing key".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_exhausted_chain_uses_shared_class() {
        let attempt = |source: &str| SourceFailure {
            source: source.to_string(),
            error: GatewayError::RateLimited {
                provider: source.to_string(),
            },
        };
        let error = GatewayError::AllSourcesExhausted {
            dataset: "bond rates".to_string(),
            attempts: vec![attempt("FiscalDataJson"), attempt("FiscalDataCsv")],
        };
        assert_eq!(status_of(error), StatusCode::TOO_MANY_REQUESTS);
    }
}
