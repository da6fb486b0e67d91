use crate::config::ConfigError;
use crate::fixtures::FixtureImportError;
use crate::loader::LoaderError;
use crate::security::CheckError;
use crate::storage::ResolutionError;
use crate::telemetry::TelemetryError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    Server(axum::Error),
    Security(CheckError),
    Fixture(FixtureImportError),
    Loader(LoaderError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::Server(err) => write!(f, "server error: {}", err),
            AppError::Security(err) => write!(f, "security check error: {}", err),
            AppError::Fixture(err) => write!(f, "fixture error: {}", err),
            AppError::Loader(err) => write!(f, "loader error: {}", err),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::Server(err) => Some(err),
            AppError::Security(err) => Some(err),
            AppError::Fixture(err) => Some(err),
            AppError::Loader(err) => Some(err),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::Security(CheckError::Resolution(ResolutionError::ExpenseNotFound(_))) => {
                StatusCode::NOT_FOUND
            }
            AppError::Fixture(_) => StatusCode::BAD_REQUEST,
            AppError::Loader(LoaderError::Storage(_)) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Config(_)
            | AppError::Telemetry(_)
            | AppError::Io(_)
            | AppError::Server(_)
            | AppError::Security(_)
            | AppError::Loader(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TelemetryError> for AppError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<axum::Error> for AppError {
    fn from(value: axum::Error) -> Self {
        Self::Server(value)
    }
}

impl From<CheckError> for AppError {
    fn from(value: CheckError) -> Self {
        Self::Security(value)
    }
}

impl From<FixtureImportError> for AppError {
    fn from(value: FixtureImportError) -> Self {
        Self::Fixture(value)
    }
}

impl From<LoaderError> for AppError {
    fn from(value: LoaderError) -> Self {
        Self::Loader(value)
    }
}
