pub mod middleware;
pub mod models;
pub mod routes;

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde_json::json;

use crate::gateway::GatewayError;
use crate::tools::CommandError;

fn error_body(status: StatusCode, message: &str, kind: &str) -> HttpResponse {
    HttpResponse::build(status).json(json!({ "error": message, "kind": kind }))
}

impl ResponseError for GatewayError {
    fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::NotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::Validation(_) => StatusCode::BAD_REQUEST,
            GatewayError::Network(_) => StatusCode::BAD_GATEWAY,
            GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        error_body(self.status_code(), self.message(), self.kind())
    }
}

impl ResponseError for CommandError {
    fn status_code(&self) -> StatusCode {
        match self {
            CommandError::NotFound(_) => StatusCode::NOT_FOUND,
            CommandError::Validation(_) => StatusCode::BAD_REQUEST,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            CommandError::NotFound(m) | CommandError::Validation(m) => m,
        };
        error_body(self.status_code(), message, self.kind())
    }
}
