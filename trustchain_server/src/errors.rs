use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use log::error;
use thiserror::Error;
use trustchain_engine::traits::{ErrorKind, LedgerError};

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("Could not read request path: {0}")]
    InvalidRequestPath(String),
    #[error("Missing or invalid identity headers. {0}")]
    MissingIdentity(String),
    #[error("Insufficient Permissions. {0}")]
    InsufficientPermissions(String),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("{0}")]
    Ledger(#[from] LedgerError),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::InvalidRequestPath(_) => StatusCode::BAD_REQUEST,
            Self::MissingIdentity(_) => StatusCode::UNAUTHORIZED,
            Self::InsufficientPermissions(_) => StatusCode::FORBIDDEN,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::Ledger(e) => match e.kind() {
                ErrorKind::Validation => StatusCode::BAD_REQUEST,
                ErrorKind::StateConflict => StatusCode::CONFLICT,
                ErrorKind::NotFound => StatusCode::NOT_FOUND,
                ErrorKind::Forbidden => StatusCode::FORBIDDEN,
                ErrorKind::UpstreamFailure => StatusCode::BAD_GATEWAY,
                ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            error!("💻️ {self}");
        }
        HttpResponse::build(status)
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.to_string() }).to_string())
    }
}

#[cfg(test)]
mod test {
    use trustchain_engine::db_types::{OrderStatusType, PaymentStatusType};

    use super::*;

    #[test]
    fn ledger_errors_map_to_status_codes() {
        let cases = [
            (LedgerError::Validation("bad".into()), StatusCode::BAD_REQUEST),
            (
                LedgerError::OrderNotAvailable { order_id: 1, status: OrderStatusType::Assigned },
                StatusCode::CONFLICT,
            ),
            (LedgerError::OrderNotDelivered(1), StatusCode::CONFLICT),
            (
                LedgerError::PaymentNotInEscrow { order_id: 1, status: PaymentStatusType::Pending },
                StatusCode::CONFLICT,
            ),
            (LedgerError::OrderNotFound(1), StatusCode::NOT_FOUND),
            (LedgerError::NotAssignedDriver { order_id: 1, driver_id: "dave".into() }, StatusCode::FORBIDDEN),
            (LedgerError::Upstream("timeout".into()), StatusCode::BAD_GATEWAY),
            (LedgerError::DatabaseError("locked".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, expected) in cases {
            assert_eq!(ServerError::from(err).status_code(), expected);
        }
    }

    #[test]
    fn error_body_is_json() {
        let res = ServerError::from(LedgerError::OtpNotVerified(7)).error_response();
        assert_eq!(res.status(), StatusCode::CONFLICT);
        assert_eq!(res.headers().get("content-type").and_then(|v| v.to_str().ok()), Some("application/json"));
    }
}
