use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::pagination::PaginationError;
use crate::service::ServiceError;
use crate::storage::DatabaseError;

/// A failed API call, rendered as `{"error": message}`.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

fn pagination_status(err: &PaginationError) -> StatusCode {
    match err {
        PaginationError::StoreUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        PaginationError::Query(_) => StatusCode::INTERNAL_SERVER_ERROR,
        PaginationError::Cancelled | PaginationError::TimedOut => StatusCode::GATEWAY_TIMEOUT,
    }
}

fn database_status(err: &DatabaseError) -> StatusCode {
    match err {
        DatabaseError::Validation(_) => StatusCode::BAD_REQUEST,
        DatabaseError::NotFound(_) => StatusCode::NOT_FOUND,
        DatabaseError::Conflict(_) => StatusCode::CONFLICT,
        DatabaseError::Unavailable | DatabaseError::InstanceLocked => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        DatabaseError::Migration(_) | DatabaseError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        let status = match &err {
            ServiceError::Pagination(e) => pagination_status(e),
            ServiceError::Database(e) => database_status(e),
            ServiceError::Fetch(_) => StatusCode::BAD_GATEWAY,
            ServiceError::InvalidLink(_) | ServiceError::InvalidDate(_) => StatusCode::BAD_REQUEST,
        };

        let aborted = matches!(&err, ServiceError::Pagination(e) if e.is_cancellation());
        if aborted {
            tracing::warn!(status = status.as_u16(), error = %err, "Request aborted");
        } else if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %err, "Request failed");
        } else {
            tracing::debug!(status = status.as_u16(), error = %err, "Request rejected");
        }

        Self::new(status, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::FetchError;

    fn status_of(err: ServiceError) -> StatusCode {
        ApiError::from(err).status
    }

    #[test]
    fn test_pagination_statuses() {
        assert_eq!(
            status_of(PaginationError::StoreUnavailable.into()),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_of(PaginationError::from(sqlx::Error::RowNotFound).into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_of(PaginationError::Cancelled.into()),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            status_of(PaginationError::TimedOut.into()),
            StatusCode::GATEWAY_TIMEOUT
        );
    }

    #[test]
    fn test_database_statuses() {
        assert_eq!(
            status_of(DatabaseError::NotFound("feed 1".into()).into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(DatabaseError::Conflict("feed x".into()).into()),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(DatabaseError::Validation("title".into()).into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(DatabaseError::Unavailable.into()),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_fetch_and_input_statuses() {
        assert_eq!(
            status_of(FetchError::HttpStatus(404).into()),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status_of(ServiceError::InvalidDate("soon".into())),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_message_is_error_display() {
        let err = ApiError::from(ServiceError::from(DatabaseError::NotFound("article 7".into())));
        assert_eq!(err.message, "article 7 not found");
    }
}
